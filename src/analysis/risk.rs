use crate::models::RiskLevel;

// Stands in for missing and non-finite scores.
pub const DEFAULT_RISK_SCORE: f64 = 50.0;

const CRITICAL_CUTOFF: f64 = 80.0;
const HIGH_CUTOFF: f64 = 60.0;
const MEDIUM_CUTOFF: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskAssessment {
    pub score: f64,
    pub level: RiskLevel,
}

impl RiskAssessment {
    pub fn survival_probability(&self) -> f64 {
        survival_probability(self.score)
    }
}

pub fn sanitize_score(raw: Option<f64>) -> f64 {
    match raw {
        Some(value) if value.is_finite() => value.clamp(0.0, 100.0),
        _ => DEFAULT_RISK_SCORE,
    }
}

pub fn level_for(score: f64) -> RiskLevel {
    if score >= CRITICAL_CUTOFF {
        RiskLevel::Critical
    } else if score >= HIGH_CUTOFF {
        RiskLevel::High
    } else if score >= MEDIUM_CUTOFF {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

pub fn classify(raw: Option<f64>) -> RiskAssessment {
    let score = sanitize_score(raw);
    RiskAssessment {
        score,
        level: level_for(score),
    }
}

pub fn survival_probability(score: f64) -> f64 {
    if score == DEFAULT_RISK_SCORE {
        return DEFAULT_RISK_SCORE;
    }
    (100.0 - score).clamp(0.0, 100.0)
}
