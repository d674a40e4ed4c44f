//! Multi-factor risk scoring.
//!
//! The score combines a weighted symptom sub-score, a weighted vital-sign
//! sub-score, and flat bonus points for age, comorbidities, and a confident
//! AI hint. The flat bonuses are intentionally added raw onto the weighted
//! sum, not rescaled; field calibration depends on this exact arithmetic.

use crate::assessment::{RiskAssessment, RiskLevel};
use crate::factors::RiskFactors;
use crate::tables::{self, VitalTier, CRITICAL_SYMPTOM_THRESHOLD};

const SYMPTOM_WEIGHT: f64 = 0.4;
const VITAL_WEIGHT: f64 = 0.3;

/// Compute a triage assessment from clinical inputs.
///
/// Total and deterministic: missing or non-finite optional fields are
/// skipped, identical input always yields identical output, and the
/// function never fails or suspends.
pub fn calculate_risk_score(factors: &RiskFactors) -> RiskAssessment {
    let mut score = 0.0_f64;
    let mut contributing = Vec::new();
    let mut recommendations = Vec::new();

    // Symptom contribution: the worst symptom dominates, so a long list of
    // mild complaints does not inflate risk by count alone.
    let mut symptom_score = 0.0_f64;
    for symptom in &factors.symptoms {
        let severity = tables::symptom_severity(symptom);
        symptom_score = symptom_score.max(f64::from(severity));

        if severity >= CRITICAL_SYMPTOM_THRESHOLD {
            contributing.push(format!("Critical symptom: {}", symptom));
        }
    }
    score += symptom_score * SYMPTOM_WEIGHT;

    // Vital-sign contribution: the worst vital dominates. Only critical and
    // high tiers score; critical tiers also carry a specific recommendation.
    if let Some(vitals) = &factors.vital_signs {
        let vitals = vitals.sanitized();
        let mut vital_score = 0.0_f64;

        if let Some(temp) = vitals.temperature {
            match tables::temperature_tier(temp) {
                VitalTier::Critical => {
                    vital_score = vital_score.max(90.0);
                    contributing.push("Critical temperature".to_string());
                    recommendations.push("Immediate medical attention required".to_string());
                }
                VitalTier::High => {
                    vital_score = vital_score.max(70.0);
                    contributing.push("Abnormal temperature".to_string());
                }
                _ => {}
            }
        }

        if let Some(hr) = vitals.heart_rate {
            match tables::heart_rate_tier(hr) {
                VitalTier::Critical => {
                    vital_score = vital_score.max(90.0);
                    contributing.push("Critical heart rate".to_string());
                    recommendations.push("Emergency cardiac evaluation".to_string());
                }
                VitalTier::High => {
                    vital_score = vital_score.max(70.0);
                    contributing.push("Abnormal heart rate".to_string());
                }
                _ => {}
            }
        }

        if let Some(spo2) = vitals.oxygen_saturation {
            match tables::oxygen_saturation_tier(spo2) {
                VitalTier::Critical => {
                    vital_score = vital_score.max(95.0);
                    contributing.push("Critical oxygen saturation".to_string());
                    recommendations.push("Oxygen support needed immediately".to_string());
                }
                VitalTier::High => {
                    vital_score = vital_score.max(75.0);
                    contributing.push("Low oxygen saturation".to_string());
                }
                _ => {}
            }
        }

        if let Some(rr) = vitals.respiratory_rate {
            match tables::respiratory_rate_tier(rr) {
                VitalTier::Critical => {
                    vital_score = vital_score.max(90.0);
                    contributing.push("Critical respiratory rate".to_string());
                    recommendations.push("Respiratory support may be needed".to_string());
                }
                VitalTier::High => {
                    vital_score = vital_score.max(70.0);
                    contributing.push("Abnormal respiratory rate".to_string());
                }
                _ => {}
            }
        }

        score += vital_score * VITAL_WEIGHT;
    }

    // Age bonus: flat points on top of the weighted sum. Infants take the
    // larger bonus; the vulnerable-age branch covers under-5s and elders.
    if let Some(age) = factors.age.filter(|a| a.is_finite()) {
        if age < 1.0 {
            score += 30.0;
            contributing.push("Infant - high risk".to_string());
            recommendations.push("Pediatric specialist consultation".to_string());
        } else if age < 5.0 || age >= 65.0 {
            score += 20.0;
            contributing.push("Vulnerable age group".to_string());
            recommendations.push("Extra monitoring recommended".to_string());
        }
    }

    // Comorbidity bonus, capped so a long history cannot dominate.
    if !factors.existing_conditions.is_empty() {
        let bonus = (factors.existing_conditions.len() as f64 * 5.0).min(15.0);
        score += bonus;
        contributing.push("Pre-existing medical conditions".to_string());
        recommendations.push("Review medical history".to_string());
    }

    // AI-assist hint, only when the model is confident.
    if let Some(hint) = &factors.ai_hint {
        if hint.confidence > 0.8 && !hint.prediction.is_empty() {
            let prediction = hint.prediction.to_lowercase();
            let bonus = if prediction.contains("critical") {
                30.0
            } else if prediction.contains("high") {
                20.0
            } else {
                10.0
            };
            score += bonus;
            contributing.push(format!(
                "AI prediction: {} ({:.1}% confidence)",
                hint.prediction,
                hint.confidence * 100.0
            ));
        }
    }

    let score = score.round().clamp(0.0, 100.0) as u8;
    let level = RiskLevel::from_score(score);

    recommendations.insert(0, level.headline().to_string());
    if score >= 60 {
        recommendations.push("Document all symptoms and vital signs".to_string());
        recommendations.push("Prepare for possible hospitalization".to_string());
    }

    RiskAssessment {
        score,
        level,
        urgency: level.urgency(),
        priority: level.priority(),
        factors: contributing,
        recommendations,
    }
}

/// Quick assessment from symptoms only.
pub fn quick_risk_check(symptoms: &[String]) -> (u8, RiskLevel) {
    let assessment = calculate_risk_score(&RiskFactors {
        symptoms: symptoms.to_vec(),
        ..Default::default()
    });
    (assessment.score, assessment.level)
}
