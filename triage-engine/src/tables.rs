//! Fixed clinical lookup tables: symptom severities and vital-sign tiers.
//!
//! The numbers here are calibration constants for the scorer; changing any
//! of them changes triage outcomes for every device in the field.

/// Severity assumed for a symptom not present in the table.
pub const UNKNOWN_SYMPTOM_SEVERITY: u8 = 30;

/// Severity at or above which a symptom is reported as a critical factor.
pub const CRITICAL_SYMPTOM_THRESHOLD: u8 = 70;

/// Severity of a reported symptom in [0, 100].
///
/// Lookup is case-insensitive exact match; unknown symptoms fall back to
/// [`UNKNOWN_SYMPTOM_SEVERITY`].
pub fn symptom_severity(symptom: &str) -> u8 {
    match symptom.to_lowercase().as_str() {
        // Critical symptoms (80-100)
        "chest pain" => 90,
        "severe bleeding" => 95,
        "unconscious" => 100,
        "difficulty breathing" => 85,
        "seizure" => 90,
        "severe headache" => 75,
        "stroke symptoms" => 95,

        // High severity (60-79)
        "high fever" => 70,
        "persistent vomiting" => 65,
        "severe abdominal pain" => 70,
        "confusion" => 75,
        "severe weakness" => 65,
        "blood in stool" => 70,
        "blood in urine" => 70,

        // Medium severity (40-59)
        "fever" => 50,
        "cough" => 40,
        "headache" => 45,
        "nausea" => 45,
        "diarrhea" => 50,
        "rash" => 40,
        "joint pain" => 45,
        "fatigue" => 40,

        // Low severity (20-39)
        "mild fever" => 30,
        "sore throat" => 35,
        "runny nose" => 25,
        "mild cough" => 30,
        "body ache" => 35,

        _ => UNKNOWN_SYMPTOM_SEVERITY,
    }
}

/// Tier of a vital-sign reading against its fixed threshold boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VitalTier {
    Normal,
    Medium,
    High,
    Critical,
}

/// Classify a body temperature in degrees Celsius.
pub fn temperature_tier(temp: f64) -> VitalTier {
    if temp >= 40.0 || temp <= 35.0 {
        VitalTier::Critical
    } else if temp >= 39.0 || temp <= 36.0 {
        VitalTier::High
    } else if temp >= 38.5 || temp <= 36.5 {
        VitalTier::Medium
    } else {
        VitalTier::Normal
    }
}

/// Classify a heart rate in beats per minute.
pub fn heart_rate_tier(hr: f64) -> VitalTier {
    if hr >= 130.0 || hr <= 40.0 {
        VitalTier::Critical
    } else if hr >= 110.0 || hr <= 50.0 {
        VitalTier::High
    } else if hr >= 100.0 || hr <= 60.0 {
        VitalTier::Medium
    } else {
        VitalTier::Normal
    }
}

/// Classify an oxygen saturation percentage.
pub fn oxygen_saturation_tier(spo2: f64) -> VitalTier {
    if spo2 <= 90.0 {
        VitalTier::Critical
    } else if spo2 <= 93.0 {
        VitalTier::High
    } else if spo2 <= 95.0 {
        VitalTier::Medium
    } else {
        VitalTier::Normal
    }
}

/// Classify a respiratory rate in breaths per minute.
pub fn respiratory_rate_tier(rr: f64) -> VitalTier {
    if rr >= 30.0 || rr <= 8.0 {
        VitalTier::Critical
    } else if rr >= 25.0 || rr <= 10.0 {
        VitalTier::High
    } else if rr >= 22.0 || rr <= 12.0 {
        VitalTier::Medium
    } else {
        VitalTier::Normal
    }
}
