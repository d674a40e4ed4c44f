use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ValidationError, ValidationResult};
use crate::vitals::VitalSigns;

/// Payload key marking a record as soft-deleted.
///
/// Deletion never removes a record physically; the flag plus a version bump
/// preserves sync and audit history.
pub const DELETED_FLAG: &str = "_deleted";

/// Record collections known to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Cases,
    Patients,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Cases => "cases",
            Collection::Patients => "patients",
        }
    }

    pub fn from_str(s: &str) -> ValidationResult<Self> {
        match s {
            "cases" => Ok(Collection::Cases),
            "patients" => Ok(Collection::Patients),
            _ => Err(ValidationError::UnknownCollection(s.to_string())),
        }
    }
}

/// Risk assessment summary attached to a case after scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSummary {
    /// Risk score, 0-100
    pub score: u8,
    /// Risk level label (LOW/MEDIUM/HIGH/CRITICAL)
    pub level: String,
    /// Triage priority, 1-5
    pub priority: u8,
}

/// A patient case captured by a community health worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CasePayload {
    /// Stable record id; generated by the store when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Patient this case belongs to
    pub patient_id: String,

    /// Reported symptoms, free text
    #[serde(default)]
    pub symptoms: Vec<String>,

    /// Vitals measured at intake, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vital_signs: Option<VitalSigns>,

    /// Patient age in years (fractional for infants)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<f64>,

    /// Known chronic conditions
    #[serde(default)]
    pub existing_conditions: Vec<String>,

    /// CHW notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Attached risk assessment summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment: Option<RiskSummary>,

    /// Soft-delete marker
    #[serde(rename = "_deleted", default)]
    pub deleted: bool,
}

impl CasePayload {
    fn validate(&self) -> ValidationResult<()> {
        if self.patient_id.trim().is_empty() {
            return Err(ValidationError::MissingField {
                collection: Collection::Cases.as_str(),
                field: "patient_id",
            });
        }
        if let Some(age) = self.age {
            if !(0.0..=150.0).contains(&age) {
                return Err(ValidationError::InvalidPayload {
                    collection: Collection::Cases.as_str(),
                    reason: format!("age {} out of range", age),
                });
            }
        }
        Ok(())
    }
}

/// A patient registration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Patient name
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<f64>,

    /// Village or settlement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub village: Option<String>,

    /// Contact phone number, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(default)]
    pub existing_conditions: Vec<String>,

    /// Soft-delete marker
    #[serde(rename = "_deleted", default)]
    pub deleted: bool,
}

impl PatientPayload {
    fn validate(&self) -> ValidationResult<()> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField {
                collection: Collection::Patients.as_str(),
                field: "name",
            });
        }
        Ok(())
    }
}

/// Validate a raw payload against the schema of its collection.
///
/// Called at the record-store boundary; a payload rejected here never
/// reaches storage. Unknown extra fields are allowed, the payload stays
/// opaque JSON once admitted.
pub fn validate_payload(collection: Collection, payload: &Value) -> ValidationResult<()> {
    if !payload.is_object() {
        return Err(ValidationError::NotAnObject {
            collection: collection.as_str(),
        });
    }

    match collection {
        Collection::Cases => {
            let case: CasePayload =
                serde_json::from_value(payload.clone()).map_err(|e| {
                    ValidationError::InvalidPayload {
                        collection: collection.as_str(),
                        reason: e.to_string(),
                    }
                })?;
            case.validate()
        }
        Collection::Patients => {
            let patient: PatientPayload =
                serde_json::from_value(payload.clone()).map_err(|e| {
                    ValidationError::InvalidPayload {
                        collection: collection.as_str(),
                        reason: e.to_string(),
                    }
                })?;
            patient.validate()
        }
    }
}
