//! Sequential batch orchestration
//!
//! Drives one request per record, strictly in input order, with a fixed
//! pacing delay between remote invocations. Transport and decode failures are
//! recorded against the record and the batch continues.

use super::batch::{BatchAccumulator, BatchEntry, BatchRun, RecordOutcome};
use super::decoder::ResponseDecoder;
use super::normalize::normalize;
use super::prompt::PromptBuilder;
use super::risk;
use crate::error::PredictorError;
use crate::inference::ModelClient;
use crate::models::{MaternalRecord, PredictionResult, RiskSource};
use crate::observability::{BatchMetrics, StructuredLogger};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Default delay between successive model requests
pub const DEFAULT_PACING: Duration = Duration::from_millis(500);

/// Default number of raw responses logged verbatim
pub const DEFAULT_DEBUG_RESPONSES: usize = 2;

/// Characters of each debugged raw response to log
const RAW_RESPONSE_TAIL_CHARS: usize = 300;

/// Configuration for a batch run
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Delay between successive remote invocations
    pub pacing: Duration,
    /// Validate the credential before processing any record
    pub preflight: bool,
    /// Fill absent/UNKNOWN risk levels from the threshold classifier
    pub classify_unknown_risk: bool,
    /// Number of raw responses to log at debug level
    pub debug_responses: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            pacing: DEFAULT_PACING,
            preflight: true,
            classify_unknown_risk: true,
            debug_responses: DEFAULT_DEBUG_RESPONSES,
        }
    }
}

/// Runs a batch of records against a remote model
pub struct BatchOrchestrator {
    client: Arc<dyn ModelClient>,
    prompt_builder: PromptBuilder,
    decoder: ResponseDecoder,
    config: OrchestratorConfig,
    logger: StructuredLogger,
    metrics: Option<BatchMetrics>,
    progress_tx: Option<mpsc::UnboundedSender<BatchEntry>>,
    raw_responses_logged: usize,
}

impl BatchOrchestrator {
    pub fn new(
        client: Arc<dyn ModelClient>,
        prompt_builder: PromptBuilder,
        config: OrchestratorConfig,
    ) -> Self {
        let logger = StructuredLogger::new(prompt_builder.model());
        Self {
            client,
            prompt_builder,
            decoder: ResponseDecoder::new(),
            config,
            logger,
            metrics: None,
            progress_tx: None,
            raw_responses_logged: 0,
        }
    }

    pub fn with_decoder(mut self, decoder: ResponseDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_metrics(mut self, metrics: BatchMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Receive each entry as soon as it is recorded
    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<BatchEntry>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// Run the batch to completion
    pub async fn run(&mut self, records: &[MaternalRecord]) -> Result<BatchRun, PredictorError> {
        // Sender kept alive so the receiver never reports a change
        let (_tx, rx) = watch::channel(false);
        self.run_until(records, rx).await
    }

    /// Run the batch, stopping between records once `shutdown` becomes true.
    ///
    /// Only fatal errors (credential rejection during preflight) are returned
    /// as `Err`; per-record failures are recorded in the run.
    pub async fn run_until(
        &mut self,
        records: &[MaternalRecord],
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<BatchRun, PredictorError> {
        if self.config.preflight {
            self.client.preflight(self.prompt_builder.model()).await?;
        }

        self.logger
            .log_batch_started(records.len(), self.config.pacing.as_millis() as u64);
        let mut accumulator = BatchAccumulator::begin(self.prompt_builder.model(), records.len());
        let mut cancelled = false;

        for (index, record) in records.iter().enumerate() {
            cancelled = *shutdown.borrow();
            if !cancelled && index > 0 && !self.config.pacing.is_zero() {
                cancelled = self.pace(&mut shutdown).await;
            }
            if cancelled {
                self.logger
                    .log_cancelled(accumulator.len(), records.len() - accumulator.len());
                break;
            }

            let entry = self.process_record(index, record).await;
            if let Some(tx) = &self.progress_tx {
                let _ = tx.send(entry.clone());
            }
            accumulator.push(entry);
        }

        let run = accumulator.finalize(cancelled);
        if let (Some(metrics), Some(mae)) = (&self.metrics, run.summary.mean_absolute_error_grams) {
            metrics.set_mean_absolute_error(mae);
        }
        self.logger.log_batch_finished(
            run.summary.attempted,
            run.summary.succeeded,
            run.summary.mean_absolute_error_grams,
        );
        Ok(run)
    }

    /// Wait out the pacing delay; true if shutdown was requested meanwhile
    async fn pace(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let sleep = tokio::time::sleep(self.config.pacing);
        tokio::pin!(sleep);
        tokio::select! {
            _ = &mut sleep => false,
            changed = shutdown.changed() => {
                if changed.is_ok() && *shutdown.borrow() {
                    return true;
                }
                (&mut sleep).await;
                false
            }
        }
    }

    /// Pending -> Requested -> {Decoded | TransportFailed | DecodeFailed}
    async fn process_record(&mut self, index: usize, record: &MaternalRecord) -> BatchEntry {
        let start = Instant::now();
        let vector = normalize(record);
        let request = self.prompt_builder.build(&vector);

        debug!(row = index + 1, state = "requested", "Sending prediction request");
        let response = self.client.complete(&request).await;
        if let Some(metrics) = &self.metrics {
            metrics.observe_request_latency(start.elapsed().as_secs_f64());
        }

        let outcome = match response {
            Err(e) => {
                self.logger.log_transport_failure(index, &e.to_string());
                RecordOutcome::TransportFailed {
                    error: e.to_string(),
                }
            }
            Ok(raw) => {
                if self.raw_responses_logged < self.config.debug_responses {
                    self.raw_responses_logged += 1;
                    self.logger
                        .log_raw_response(index, &raw, RAW_RESPONSE_TAIL_CHARS);
                }
                match self.decoder.decode(&raw) {
                    Ok(prediction) => RecordOutcome::Decoded {
                        prediction: self.apply_risk_policy(prediction),
                    },
                    Err(failure) => {
                        self.logger.log_decode_failure(index, failure.response_len);
                        RecordOutcome::DecodeFailed {
                            response_len: failure.response_len,
                        }
                    }
                }
            }
        };

        let risk_inconsistent = outcome.prediction().is_some_and(|p| {
            p.risk_source == RiskSource::Model && !risk::is_consistent(p.weight_grams, p.risk_level)
        });
        let mut entry = BatchEntry::new(
            index,
            record.clone(),
            outcome,
            start.elapsed().as_millis() as u64,
        );
        entry.risk_inconsistent = risk_inconsistent;

        if let Some(prediction) = entry.prediction() {
            if risk_inconsistent {
                self.logger.log_inconsistent_risk(
                    index,
                    prediction.weight_grams,
                    prediction.risk_level.as_str(),
                    risk::classify(prediction.weight_grams).as_str(),
                );
            }
            self.logger.log_prediction(
                index,
                entry.actual_weight_grams,
                prediction.weight_grams,
                prediction.risk_level.as_str(),
                prediction.extraction_strategy.as_str(),
            );
            if let Some(metrics) = &self.metrics {
                metrics.inc_strategy(prediction.extraction_strategy.as_str());
            }
        }
        if let Some(metrics) = &self.metrics {
            metrics.inc_records(entry.outcome.label());
        }

        debug!(row = index + 1, state = "recorded", outcome = entry.outcome.label(), "Record finished");
        entry
    }

    /// Model-supplied risk wins; the classifier only fills UNKNOWN
    fn apply_risk_policy(&self, prediction: PredictionResult) -> PredictionResult {
        if self.config.classify_unknown_risk {
            risk::fill_unknown(prediction)
        } else {
            prediction
        }
    }
}
