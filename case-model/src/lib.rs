//! Shared record model for Aarogya Engine
//!
//! This module defines the typed payloads stored in each record collection
//! and the validation applied at the record-store boundary:
//! - Case payloads captured by community health workers
//! - Patient payloads maintained by ASHA workers
//! - Vital-sign readings attached to cases
//! - The soft-delete flag convention shared by all collections
//!
//! Payloads travel through the sync layer as opaque JSON; this crate is the
//! single place that knows their shape.

pub mod error;
pub mod records;
pub mod vitals;

pub use error::{ValidationError, ValidationResult};
pub use records::{
    validate_payload, CasePayload, Collection, PatientPayload, RiskSummary, DELETED_FLAG,
};
pub use vitals::VitalSigns;
