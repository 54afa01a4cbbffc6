//! Record normalization
//!
//! Converts imperial-unit maternal records into the metric clinical vector
//! used to build prompts.

use crate::models::{ClinicalVector, MaternalRecord};

pub const DAYS_PER_WEEK: f64 = 7.0;
pub const CM_PER_INCH: f64 = 2.54;
pub const KG_PER_POUND: f64 = 0.453592;

/// Convert a record to its canonical clinical vector
pub fn normalize(record: &MaternalRecord) -> ClinicalVector {
    ClinicalVector {
        gestation_weeks: round1(record.gestation_days / DAYS_PER_WEEK),
        parity: record.parity,
        age_years: record.age_years,
        height_cm: round1(record.height_in * CM_PER_INCH),
        weight_kg: round1(record.weight_lb * KG_PER_POUND),
        smoker: record.smoker,
    }
}

/// Round to one decimal place
fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
