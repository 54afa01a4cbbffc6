//! Offline risk classification

use anyhow::{bail, Result};
use neonatal_lib::predictor::classify;
use serde_json::json;

use crate::output::{color_risk, format_grams, print_json, OutputFormat};

/// Classify a birth weight and print the risk level
pub fn run(grams: f64, format: OutputFormat) -> Result<()> {
    if !grams.is_finite() || grams <= 0.0 {
        bail!("Birth weight must be a positive number of grams, got {}", grams);
    }

    let level = classify(grams);
    match format {
        OutputFormat::Json => print_json(&json!({
            "weight_grams": grams,
            "risk_level": level,
        }))?,
        OutputFormat::Table => {
            println!("{} g -> {}", format_grams(Some(grams)), color_risk(level));
        }
    }
    Ok(())
}
