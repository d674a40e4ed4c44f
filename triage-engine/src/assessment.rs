use case_model::RiskSummary;
use serde::{Deserialize, Serialize};

/// Risk level derived from the final score by fixed thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Map a final score to its level. Thresholds are inclusive on the
    /// upper branch: 80 is CRITICAL, 79 is HIGH.
    pub fn from_score(score: u8) -> Self {
        if score >= 80 {
            RiskLevel::Critical
        } else if score >= 60 {
            RiskLevel::High
        } else if score >= 40 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }

    /// Urgency on a 1-10 scale.
    pub fn urgency(&self) -> u8 {
        match self {
            RiskLevel::Critical => 10,
            RiskLevel::High => 7,
            RiskLevel::Medium => 5,
            RiskLevel::Low => 3,
        }
    }

    /// Triage priority on a 1-5 scale, drives escalation channel choice.
    pub fn priority(&self) -> u8 {
        match self {
            RiskLevel::Critical => 5,
            RiskLevel::High => 4,
            RiskLevel::Medium => 2,
            RiskLevel::Low => 1,
        }
    }

    /// Headline recommendation prepended to every assessment.
    pub fn headline(&self) -> &'static str {
        match self {
            RiskLevel::Critical => "URGENT: Immediate hospital transfer required",
            RiskLevel::High => "High priority: Medical consultation within 24 hours",
            RiskLevel::Medium => "Monitor closely and follow up in 2-3 days",
            RiskLevel::Low => "Standard care and follow-up as needed",
        }
    }
}

/// Outcome of one scoring call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Final score in [0, 100]
    pub score: u8,
    /// Risk level derived from the score
    pub level: RiskLevel,
    /// Urgency, 1-10
    pub urgency: u8,
    /// Triage priority, 1-5
    pub priority: u8,
    /// Contributing factors, in the order the scorer found them
    pub factors: Vec<String>,
    /// Recommendations, most urgent first
    pub recommendations: Vec<String>,
}

impl RiskAssessment {
    /// Compact summary for attaching to a case payload.
    pub fn summary(&self) -> RiskSummary {
        RiskSummary {
            score: self.score,
            level: self.level.as_str().to_string(),
            priority: self.priority,
        }
    }
}
