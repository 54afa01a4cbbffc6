//! Batch run accumulation and summary statistics

use crate::models::{ExtractionStrategy, MaternalRecord, PredictionResult, RiskLevel};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Terminal state of one record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
    Decoded { prediction: PredictionResult },
    TransportFailed { error: String },
    DecodeFailed { response_len: usize },
}

impl RecordOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RecordOutcome::Decoded { .. } => "decoded",
            RecordOutcome::TransportFailed { .. } => "transport_failed",
            RecordOutcome::DecodeFailed { .. } => "decode_failed",
        }
    }

    pub fn prediction(&self) -> Option<&PredictionResult> {
        match self {
            RecordOutcome::Decoded { prediction } => Some(prediction),
            _ => None,
        }
    }
}

/// One processed record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchEntry {
    /// 0-based position in the input
    pub index: usize,
    pub record: MaternalRecord,
    pub outcome: RecordOutcome,
    pub actual_weight_grams: f64,
    /// Present only for decoded records
    pub absolute_error_grams: Option<f64>,
    /// The model's own risk label disagrees with the threshold policy
    pub risk_inconsistent: bool,
    pub elapsed_ms: u64,
}

impl BatchEntry {
    pub fn new(index: usize, record: MaternalRecord, outcome: RecordOutcome, elapsed_ms: u64) -> Self {
        let actual_weight_grams = record.actual_weight_grams();
        let absolute_error_grams = outcome
            .prediction()
            .map(|p| (p.weight_grams - actual_weight_grams).abs());
        Self {
            index,
            record,
            outcome,
            actual_weight_grams,
            absolute_error_grams,
            risk_inconsistent: false,
            elapsed_ms,
        }
    }

    pub fn prediction(&self) -> Option<&PredictionResult> {
        self.outcome.prediction()
    }

    pub fn predicted_weight_grams(&self) -> Option<f64> {
        self.prediction().map(|p| p.weight_grams)
    }

    pub fn risk_level(&self) -> Option<RiskLevel> {
        self.prediction().map(|p| p.risk_level)
    }

    pub fn succeeded(&self) -> bool {
        self.prediction().is_some()
    }
}

/// Aggregate statistics over a finished batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub transport_failures: usize,
    pub decode_failures: usize,
    pub inconsistent_risk_labels: usize,
    pub strategy_counts: BTreeMap<ExtractionStrategy, usize>,
    /// Mean over decoded records only; absent when none succeeded
    pub mean_absolute_error_grams: Option<f64>,
}

impl BatchSummary {
    pub fn from_entries(entries: &[BatchEntry]) -> Self {
        let mut summary = BatchSummary {
            attempted: entries.len(),
            succeeded: 0,
            transport_failures: 0,
            decode_failures: 0,
            inconsistent_risk_labels: 0,
            strategy_counts: BTreeMap::new(),
            mean_absolute_error_grams: None,
        };

        let mut error_sum = 0.0;
        for entry in entries {
            match &entry.outcome {
                RecordOutcome::Decoded { prediction } => {
                    summary.succeeded += 1;
                    *summary
                        .strategy_counts
                        .entry(prediction.extraction_strategy)
                        .or_insert(0) += 1;
                }
                RecordOutcome::TransportFailed { .. } => summary.transport_failures += 1,
                RecordOutcome::DecodeFailed { .. } => summary.decode_failures += 1,
            }
            if entry.risk_inconsistent {
                summary.inconsistent_risk_labels += 1;
            }
            if let Some(error) = entry.absolute_error_grams {
                error_sum += error;
            }
        }

        if summary.succeeded > 0 {
            summary.mean_absolute_error_grams = Some(error_sum / summary.succeeded as f64);
        }
        summary
    }
}

/// A finished batch: entries in input order plus summary
#[derive(Debug, Clone, Serialize)]
pub struct BatchRun {
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cancelled: bool,
    pub entries: Vec<BatchEntry>,
    pub summary: BatchSummary,
}

/// Append-only accumulator owned by the orchestrator during a run
#[derive(Debug)]
pub(crate) struct BatchAccumulator {
    model: String,
    started_at: DateTime<Utc>,
    entries: Vec<BatchEntry>,
}

impl BatchAccumulator {
    pub(crate) fn begin(model: impl Into<String>, capacity: usize) -> Self {
        Self {
            model: model.into(),
            started_at: Utc::now(),
            entries: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, entry: BatchEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn finalize(self, cancelled: bool) -> BatchRun {
        let summary = BatchSummary::from_entries(&self.entries);
        BatchRun {
            model: self.model,
            started_at: self.started_at,
            finished_at: Utc::now(),
            cancelled,
            entries: self.entries,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(birth_weight_oz: f64) -> MaternalRecord {
        MaternalRecord {
            gestation_days: 280.0,
            parity: 0,
            age_years: 27.0,
            height_in: 64.0,
            weight_lb: 130.0,
            smoker: false,
            birth_weight_oz,
        }
    }

    fn decoded(weight: f64, strategy: ExtractionStrategy) -> RecordOutcome {
        RecordOutcome::Decoded {
            prediction: PredictionResult::new(weight, RiskLevel::Low, "", strategy),
        }
    }

    #[test]
    fn test_entry_error_only_for_decoded() {
        // 100 oz -> 2835 g
        let ok = BatchEntry::new(0, record(100.0), decoded(3000.0, ExtractionStrategy::Direct), 5);
        assert_eq!(ok.actual_weight_grams, 2835.0);
        assert_eq!(ok.absolute_error_grams, Some(165.0));

        let failed = BatchEntry::new(
            1,
            record(100.0),
            RecordOutcome::TransportFailed {
                error: "timeout".into(),
            },
            5,
        );
        assert_eq!(failed.actual_weight_grams, 2835.0);
        assert_eq!(failed.absolute_error_grams, None);
        assert_eq!(failed.predicted_weight_grams(), None);
    }

    #[test]
    fn test_summary_excludes_failures_from_mean() {
        let entries = vec![
            BatchEntry::new(0, record(100.0), decoded(2935.0, ExtractionStrategy::Direct), 1),
            BatchEntry::new(1, record(100.0), RecordOutcome::DecodeFailed { response_len: 10 }, 1),
            BatchEntry::new(2, record(100.0), decoded(2535.0, ExtractionStrategy::NumericFallback), 1),
            BatchEntry::new(
                3,
                record(100.0),
                RecordOutcome::TransportFailed {
                    error: "boom".into(),
                },
                1,
            ),
        ];

        let summary = BatchSummary::from_entries(&entries);
        assert_eq!(summary.attempted, 4);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.decode_failures, 1);
        assert_eq!(summary.transport_failures, 1);
        // errors 100 and 300
        assert_eq!(summary.mean_absolute_error_grams, Some(200.0));
        assert_eq!(summary.strategy_counts[&ExtractionStrategy::Direct], 1);
        assert_eq!(summary.strategy_counts[&ExtractionStrategy::NumericFallback], 1);
    }

    #[test]
    fn test_summary_without_successes() {
        let entries = vec![BatchEntry::new(
            0,
            record(100.0),
            RecordOutcome::DecodeFailed { response_len: 0 },
            1,
        )];
        let summary = BatchSummary::from_entries(&entries);
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.mean_absolute_error_grams, None);
    }

    #[test]
    fn test_accumulator_preserves_order() {
        let mut acc = BatchAccumulator::begin("m", 3);
        for i in 0..3 {
            acc.push(BatchEntry::new(
                i,
                record(100.0),
                RecordOutcome::DecodeFailed { response_len: i },
                1,
            ));
        }
        assert_eq!(acc.len(), 3);
        let run = acc.finalize(false);
        let indices: Vec<usize> = run.entries.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(run.finished_at >= run.started_at);
        assert!(!run.cancelled);
    }
}
