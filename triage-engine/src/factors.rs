use case_model::{CasePayload, VitalSigns};
use serde::{Deserialize, Serialize};

/// Hint from an AI-assist model attached to a case.
///
/// Only consulted when the model is confident (confidence above 0.8); a
/// low-confidence or missing hint never changes the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiHint {
    /// Model confidence in [0, 1]
    pub confidence: f64,
    /// Predicted label, free text
    pub prediction: String,
}

/// Structured clinical inputs for one scoring call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskFactors {
    /// Reported symptoms, free text
    #[serde(default)]
    pub symptoms: Vec<String>,

    /// Vitals measured at intake
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vital_signs: Option<VitalSigns>,

    /// Age in years (fractional for infants)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<f64>,

    /// Known chronic conditions
    #[serde(default)]
    pub existing_conditions: Vec<String>,

    /// Optional AI-assist hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_hint: Option<AiHint>,
}

impl RiskFactors {
    /// Build scoring inputs from a captured case payload.
    pub fn from_case(case: &CasePayload) -> Self {
        Self {
            symptoms: case.symptoms.clone(),
            vital_signs: case.vital_signs.clone(),
            age: case.age,
            existing_conditions: case.existing_conditions.clone(),
            ai_hint: None,
        }
    }

    /// Inputs containing only symptoms.
    pub fn from_symptoms<S: Into<String>>(symptoms: Vec<S>) -> Self {
        Self {
            symptoms: symptoms.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}
