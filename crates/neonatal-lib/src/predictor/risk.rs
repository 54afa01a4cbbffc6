//! Threshold-based neonatal risk classification

use crate::models::{PredictionResult, RiskLevel, RiskSource};

/// Weights strictly above this are LOW risk
pub const LOW_RISK_ABOVE_GRAMS: f64 = 3000.0;

/// Weights strictly below this are HIGH risk
pub const HIGH_RISK_BELOW_GRAMS: f64 = 2500.0;

/// Classify a birth weight in grams
pub fn classify(weight_grams: f64) -> RiskLevel {
    if weight_grams > LOW_RISK_ABOVE_GRAMS {
        RiskLevel::Low
    } else if weight_grams >= HIGH_RISK_BELOW_GRAMS {
        RiskLevel::Moderate
    } else {
        RiskLevel::High
    }
}

/// Whether a model-supplied level agrees with the threshold policy.
/// `Unknown` carries no claim and is always consistent.
pub fn is_consistent(weight_grams: f64, level: RiskLevel) -> bool {
    level == RiskLevel::Unknown || classify(weight_grams) == level
}

/// Fill an UNKNOWN level from the thresholds; a model-supplied level is kept
pub fn fill_unknown(mut prediction: PredictionResult) -> PredictionResult {
    if prediction.risk_level == RiskLevel::Unknown {
        prediction.risk_level = classify(prediction.weight_grams);
        prediction.risk_source = RiskSource::Classifier;
    }
    prediction
}
