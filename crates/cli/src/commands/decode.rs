//! Offline decoding of a saved model response

use anyhow::{Context, Result};
use colored::Colorize;
use neonatal_lib::predictor::{fill_unknown, ResponseDecoder};
use std::io::Read;
use std::path::Path;

use crate::output::{color_risk, format_grams, print_json, OutputFormat};

/// Decode a raw response read from `file`, or stdin when absent
pub fn run(file: Option<&Path>, format: OutputFormat) -> Result<()> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read response from stdin")?;
            buffer
        }
    };

    let prediction = ResponseDecoder::new()
        .decode(&raw)
        .map(fill_unknown)
        .context("Response could not be decoded")?;

    match format {
        OutputFormat::Json => print_json(&prediction)?,
        OutputFormat::Table => {
            println!("{}", "Decoded Prediction".bold());
            println!("{}", "=".repeat(40));
            println!(
                "Weight:     {} g",
                format_grams(Some(prediction.weight_grams)).cyan()
            );
            println!(
                "Risk:       {} ({:?})",
                color_risk(prediction.risk_level),
                prediction.risk_source
            );
            println!("Strategy:   {}", prediction.extraction_strategy.as_str());
            if !prediction.clinical_note.is_empty() {
                println!("Note:       {}", prediction.clinical_note);
            }
        }
    }
    Ok(())
}
