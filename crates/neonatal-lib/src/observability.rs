//! Observability for batch prediction runs
//!
//! Provides:
//! - Prometheus metrics (records by outcome, successes by decode strategy,
//!   request latency, mean absolute error of the last batch)
//! - Structured logging with tracing

use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};
use tracing::{debug, info, warn};

/// Histogram buckets for model request latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0, 300.0];

/// Batch metrics for Prometheus exposition
///
/// Each instance owns its registry, so separate runs (and tests) never
/// collide on metric names.
#[derive(Clone)]
pub struct BatchMetrics {
    registry: Registry,
    records_total: IntCounterVec,
    decode_strategy_total: IntCounterVec,
    request_latency_seconds: Histogram,
    mean_absolute_error_grams: Gauge,
}

impl BatchMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let records_total = IntCounterVec::new(
            Opts::new(
                "neonatal_records_total",
                "Records processed, labelled by outcome",
            ),
            &["outcome"],
        )?;
        let decode_strategy_total = IntCounterVec::new(
            Opts::new(
                "neonatal_decode_strategy_total",
                "Successful decodes, labelled by the strategy that produced them",
            ),
            &["strategy"],
        )?;
        let request_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "neonatal_request_latency_seconds",
                "Time spent waiting on the remote model per record",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
        )?;
        let mean_absolute_error_grams = Gauge::new(
            "neonatal_mean_absolute_error_grams",
            "Mean absolute error over successful predictions in the last batch",
        )?;

        registry.register(Box::new(records_total.clone()))?;
        registry.register(Box::new(decode_strategy_total.clone()))?;
        registry.register(Box::new(request_latency_seconds.clone()))?;
        registry.register(Box::new(mean_absolute_error_grams.clone()))?;

        Ok(Self {
            registry,
            records_total,
            decode_strategy_total,
            request_latency_seconds,
            mean_absolute_error_grams,
        })
    }

    /// Count a record by outcome (`decoded`, `transport_failed`, `decode_failed`)
    pub fn inc_records(&self, outcome: &str) {
        self.records_total.with_label_values(&[outcome]).inc();
    }

    /// Count a successful decode by strategy
    pub fn inc_strategy(&self, strategy: &str) {
        self.decode_strategy_total.with_label_values(&[strategy]).inc();
    }

    /// Record a request latency observation
    pub fn observe_request_latency(&self, duration_secs: f64) {
        self.request_latency_seconds.observe(duration_secs);
    }

    pub fn set_mean_absolute_error(&self, grams: f64) {
        self.mean_absolute_error_grams.set(grams);
    }

    /// Current count for an outcome label
    pub fn records(&self, outcome: &str) -> u64 {
        self.records_total.with_label_values(&[outcome]).get()
    }

    /// Render all metrics in the Prometheus text format
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Structured logger for batch events
#[derive(Clone)]
pub struct StructuredLogger {
    model: String,
}

impl StructuredLogger {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }

    pub fn log_batch_started(&self, records: usize, pacing_ms: u64) {
        info!(
            event = "batch_started",
            model = %self.model,
            records = records,
            pacing_ms = pacing_ms,
            "Starting prediction batch"
        );
    }

    /// Log a decoded prediction
    pub fn log_prediction(
        &self,
        index: usize,
        actual_grams: f64,
        predicted_grams: f64,
        risk_level: &str,
        strategy: &str,
    ) {
        info!(
            event = "prediction_decoded",
            model = %self.model,
            row = index + 1,
            actual_grams = actual_grams,
            predicted_grams = predicted_grams,
            absolute_error_grams = (predicted_grams - actual_grams).abs(),
            risk_level = %risk_level,
            strategy = %strategy,
            "Prediction decoded"
        );
    }

    pub fn log_transport_failure(&self, index: usize, error: &str) {
        warn!(
            event = "transport_failed",
            model = %self.model,
            row = index + 1,
            error = %error,
            "Model request failed, continuing with next record"
        );
    }

    pub fn log_decode_failure(&self, index: usize, response_len: usize) {
        warn!(
            event = "decode_failed",
            model = %self.model,
            row = index + 1,
            response_len = response_len,
            "No prediction found in model response"
        );
    }

    /// Model-supplied risk disagrees with the threshold policy; surfaced, not corrected
    pub fn log_inconsistent_risk(&self, index: usize, predicted_grams: f64, model_risk: &str, policy_risk: &str) {
        warn!(
            event = "inconsistent_risk_label",
            model = %self.model,
            row = index + 1,
            predicted_grams = predicted_grams,
            model_risk = %model_risk,
            policy_risk = %policy_risk,
            "Model risk label disagrees with threshold policy"
        );
    }

    /// Log the length and tail of a raw response
    pub fn log_raw_response(&self, index: usize, raw: &str, tail_chars: usize) {
        let total = raw.chars().count();
        let tail: String = raw.chars().skip(total.saturating_sub(tail_chars)).collect();
        debug!(
            event = "raw_response",
            model = %self.model,
            row = index + 1,
            response_len = total,
            tail = ?tail,
            "Raw model response"
        );
    }

    pub fn log_cancelled(&self, processed: usize, remaining: usize) {
        warn!(
            event = "batch_cancelled",
            model = %self.model,
            processed = processed,
            remaining = remaining,
            "Batch cancelled between records"
        );
    }

    pub fn log_batch_finished(
        &self,
        attempted: usize,
        succeeded: usize,
        mean_absolute_error: Option<f64>,
    ) {
        info!(
            event = "batch_finished",
            model = %self.model,
            attempted = attempted,
            succeeded = succeeded,
            mean_absolute_error_grams = ?mean_absolute_error,
            "Prediction batch finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_are_instance_scoped() {
        let first = BatchMetrics::new().unwrap();
        let second = BatchMetrics::new().unwrap();

        first.inc_records("decoded");
        first.inc_records("decoded");
        second.inc_records("decoded");

        assert_eq!(first.records("decoded"), 2);
        assert_eq!(second.records("decoded"), 1);
    }

    #[test]
    fn test_encode_text() {
        let metrics = BatchMetrics::new().unwrap();
        metrics.inc_records("transport_failed");
        metrics.inc_strategy("direct");
        metrics.observe_request_latency(1.5);
        metrics.set_mean_absolute_error(212.0);

        let text = metrics.encode_text().unwrap();
        assert!(text.contains("neonatal_records_total{outcome=\"transport_failed\"} 1"));
        assert!(text.contains("neonatal_decode_strategy_total{strategy=\"direct\"} 1"));
        assert!(text.contains("neonatal_mean_absolute_error_grams 212"));
        assert!(text.contains("neonatal_request_latency_seconds_count 1"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-model");
        assert_eq!(logger.model, "test-model");
        logger.log_raw_response(0, "short", 300);
    }
}
