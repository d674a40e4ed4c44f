//! Clinical risk scoring engine for Aarogya Engine
//!
//! Converts the structured inputs of a case (symptoms, vitals, age, chronic
//! conditions, optional AI-assist hint) into a triage assessment:
//! - Weighted multi-factor score in [0, 100]
//! - Risk level (LOW/MEDIUM/HIGH/CRITICAL) with urgency and priority
//! - Human-readable contributing factors and recommendations
//!
//! Scoring is a pure, total, synchronous function: identical input always
//! yields identical output, missing or invalid optional fields are skipped
//! rather than rejected, and nothing here performs I/O. Escalation and
//! notification decisions based on the assessment belong to the caller.

pub mod assessment;
pub mod factors;
pub mod scorer;
pub mod tables;

pub use assessment::{RiskAssessment, RiskLevel};
pub use factors::{AiHint, RiskFactors};
pub use scorer::{calculate_risk_score, quick_risk_check};
pub use tables::{symptom_severity, VitalTier};
