//! Core data models for the prediction pipeline

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Grams per ounce, used to convert ground-truth birth weights
pub const GRAMS_PER_OUNCE: f64 = 28.3495;

/// One maternal record as read from the input table (imperial units)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaternalRecord {
    /// Length of gestation in days
    pub gestation_days: f64,
    /// Number of prior births
    pub parity: u32,
    /// Mother's age in years
    pub age_years: f64,
    /// Mother's height in inches
    pub height_in: f64,
    /// Mother's pre-pregnancy weight in pounds
    pub weight_lb: f64,
    /// Mother smoked during pregnancy
    pub smoker: bool,
    /// Ground-truth birth weight in ounces; never sent to the model
    pub birth_weight_oz: f64,
}

impl MaternalRecord {
    /// Ground-truth birth weight in whole grams
    pub fn actual_weight_grams(&self) -> f64 {
        (self.birth_weight_oz * GRAMS_PER_OUNCE).round()
    }
}

/// Canonical metric representation of a maternal record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClinicalVector {
    pub gestation_weeks: f64,
    pub parity: u32,
    pub age_years: f64,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub smoker: bool,
}

impl ClinicalVector {
    pub fn smoke_token(&self) -> &'static str {
        if self.smoker {
            "yes"
        } else {
            "no"
        }
    }
}

/// Neonatal risk bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Unknown,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Moderate => "MODERATE",
            RiskLevel::High => "HIGH",
            RiskLevel::Unknown => "UNKNOWN",
        }
    }

    /// Parse a model-supplied label; anything unrecognized is `Unknown`
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or(RiskLevel::Unknown)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(RiskLevel::Low),
            "MODERATE" => Ok(RiskLevel::Moderate),
            "HIGH" => Ok(RiskLevel::High),
            "UNKNOWN" => Ok(RiskLevel::Unknown),
            other => Err(format!("unrecognized risk level: {}", other)),
        }
    }
}

/// Which decode strategy produced a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionStrategy {
    Direct,
    Embedded,
    RawEmbedded,
    NumericFallback,
}

impl ExtractionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStrategy::Direct => "direct",
            ExtractionStrategy::Embedded => "embedded",
            ExtractionStrategy::RawEmbedded => "raw-embedded",
            ExtractionStrategy::NumericFallback => "numeric-fallback",
        }
    }
}

impl fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the risk level of a prediction came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskSource {
    Model,
    Classifier,
}

/// A decoded prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub weight_grams: f64,
    pub risk_level: RiskLevel,
    pub clinical_note: String,
    pub extraction_strategy: ExtractionStrategy,
    pub risk_source: RiskSource,
}

impl PredictionResult {
    pub fn new(
        weight_grams: f64,
        risk_level: RiskLevel,
        clinical_note: impl Into<String>,
        extraction_strategy: ExtractionStrategy,
    ) -> Self {
        Self {
            weight_grams,
            risk_level,
            clinical_note: clinical_note.into(),
            extraction_strategy,
            risk_source: RiskSource::Model,
        }
    }
}
