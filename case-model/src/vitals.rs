use serde::{Deserialize, Serialize};

/// Vital signs reported with a case.
///
/// All readings are optional; a CHW in the field often has only a subset of
/// instruments. Blood pressure is carried as the combined reading string
/// (e.g. "120/80") and is not part of risk scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VitalSigns {
    /// Body temperature in degrees Celsius
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Blood pressure as reported, systolic/diastolic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_pressure: Option<String>,

    /// Heart rate in beats per minute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<f64>,

    /// Peripheral oxygen saturation in percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oxygen_saturation: Option<f64>,

    /// Respiratory rate in breaths per minute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respiratory_rate: Option<f64>,
}

impl VitalSigns {
    /// Copy of these vitals with non-finite readings dropped.
    ///
    /// Callers constructing vitals programmatically can hand over NaN or
    /// infinite values; downstream consumers treat those as absent rather
    /// than erroring.
    pub fn sanitized(&self) -> Self {
        let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
        Self {
            temperature: finite(self.temperature),
            blood_pressure: self.blood_pressure.clone(),
            heart_rate: finite(self.heart_rate),
            oxygen_saturation: finite(self.oxygen_saturation),
            respiratory_rate: finite(self.respiratory_rate),
        }
    }

    /// True when no numeric reading is present.
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.heart_rate.is_none()
            && self.oxygen_saturation.is_none()
            && self.respiratory_rate.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitized_drops_non_finite_readings() {
        let vitals = VitalSigns {
            temperature: Some(f64::NAN),
            heart_rate: Some(f64::INFINITY),
            oxygen_saturation: Some(94.0),
            ..Default::default()
        };

        let clean = vitals.sanitized();
        assert_eq!(clean.temperature, None);
        assert_eq!(clean.heart_rate, None);
        assert_eq!(clean.oxygen_saturation, Some(94.0));
    }

    #[test]
    fn test_is_empty_ignores_blood_pressure() {
        let vitals = VitalSigns {
            blood_pressure: Some("120/80".to_string()),
            ..Default::default()
        };
        assert!(vitals.is_empty());
    }

    #[test]
    fn test_serde_round_trip() {
        let vitals = VitalSigns {
            temperature: Some(38.5),
            heart_rate: Some(92.0),
            ..Default::default()
        };

        let json = serde_json::to_string(&vitals).unwrap();
        let parsed: VitalSigns = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, vitals);
    }
}
