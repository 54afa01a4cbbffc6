//! Batch prediction over a CSV of maternal records

use anyhow::{Context, Result};
use colored::Colorize;
use neonatal_lib::dataset;
use neonatal_lib::predictor::{
    BatchEntry, BatchOrchestrator, BatchRun, OrchestratorConfig, PromptBuilder, RecordOutcome,
};
use neonatal_lib::BatchMetrics;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tabled::{settings::Style, Table, Tabled};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use super::check::build_client;
use crate::config::Settings;
use crate::output::{
    color_error, color_risk, format_grams, print_error, print_info, print_json, print_success,
    print_warning, OutputFormat,
};
use crate::PredictArgs;

/// Row for the results table
#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "Row")]
    row: usize,
    #[tabled(rename = "Actual (g)")]
    actual: String,
    #[tabled(rename = "Predicted (g)")]
    predicted: String,
    #[tabled(rename = "Risk")]
    risk: String,
    #[tabled(rename = "Error (g)")]
    error: String,
    #[tabled(rename = "Strategy")]
    strategy: String,
}

impl From<&BatchEntry> for ResultRow {
    fn from(entry: &BatchEntry) -> Self {
        let prediction = entry.prediction();
        let mut risk = prediction
            .map(|p| color_risk(p.risk_level))
            .unwrap_or_else(|| "-".to_string());
        if entry.risk_inconsistent {
            risk = format!("{} {}", risk, "⚠".yellow());
        }

        Self {
            row: entry.index + 1,
            actual: format_grams(Some(entry.actual_weight_grams)),
            predicted: format_grams(entry.predicted_weight_grams()),
            risk,
            error: color_error(entry.absolute_error_grams),
            strategy: match &entry.outcome {
                RecordOutcome::Decoded { prediction } => {
                    prediction.extraction_strategy.as_str().to_string()
                }
                other => other.label().red().to_string(),
            },
        }
    }
}

/// One progress line per recorded entry
fn print_progress(entry: &BatchEntry) {
    let row = entry.index + 1;
    let actual = format_grams(Some(entry.actual_weight_grams));
    match &entry.outcome {
        RecordOutcome::Decoded { prediction } => {
            println!(
                "  Row {} | Actual: {}g | Predicted: {}g | Risk: {}",
                row,
                actual,
                format_grams(Some(prediction.weight_grams)),
                color_risk(prediction.risk_level)
            );
            if !prediction.clinical_note.is_empty() {
                println!("           Note: {}", prediction.clinical_note.dimmed());
            }
        }
        RecordOutcome::TransportFailed { error } => {
            print_warning(&format!("Row {} | Actual: {}g | request failed: {}", row, actual, error));
        }
        RecordOutcome::DecodeFailed { response_len } => {
            print_warning(&format!(
                "Row {} | Actual: {}g | no prediction found in response ({} chars)",
                row, actual, response_len
            ));
        }
    }
}

fn apply_overrides(settings: &mut Settings, args: &PredictArgs) {
    if let Some(sample_size) = args.sample_size {
        settings.sample_size = sample_size;
    }
    if let Some(pacing_ms) = args.pacing_ms {
        settings.pacing_ms = pacing_ms;
    }
    if let Some(debug_responses) = args.debug_responses {
        settings.debug_responses = debug_responses;
    }
    if let Some(max_tokens) = args.max_tokens {
        settings.max_tokens = max_tokens;
    }
    if let Some(temperature) = args.temperature {
        settings.temperature = temperature;
    }
    if let Some(timeout_secs) = args.timeout_secs {
        settings.timeout_secs = timeout_secs;
    }
}

/// First interrupt requests a graceful stop; returns `true` on a second one
async fn forward_interrupts<F, Fut>(mut next_signal: F, shutdown_tx: watch::Sender<bool>) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if next_signal().await.is_err() {
        return false;
    }
    let _ = shutdown_tx.send(true);
    warn!(event = "shutdown_requested", "Interrupt received, stopping after the current record");
    print_warning("Stopping after the current record; press Ctrl-C again to abort");

    next_signal().await.is_ok()
}

/// Run predictions for the input table and save the results
pub async fn run(mut settings: Settings, args: PredictArgs, format: OutputFormat) -> Result<()> {
    apply_overrides(&mut settings, &args);
    let table = format == OutputFormat::Table;

    // Fail on a missing key before touching the dataset
    let client = build_client(&settings)?;

    let records = dataset::load_records(&args.input, settings.sample_size)
        .with_context(|| format!("Failed to load records from {}", args.input.display()))?;
    if table {
        print_info(&format!(
            "Running predictions on {} rows from {} with {}",
            records.len(),
            args.input.display(),
            settings.model.cyan()
        ));
    }

    let metrics = BatchMetrics::new().context("Failed to register metrics")?;
    let prompt_builder = PromptBuilder::new(settings.model.clone())
        .with_generation(settings.max_tokens, settings.temperature);
    let config = OrchestratorConfig {
        pacing: Duration::from_millis(settings.pacing_ms),
        preflight: !args.skip_preflight,
        classify_unknown_risk: true,
        debug_responses: settings.debug_responses,
    };

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<BatchEntry>();
    let printer = tokio::spawn(async move {
        while let Some(entry) = progress_rx.recv().await {
            if table {
                print_progress(&entry);
            }
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if forward_interrupts(tokio::signal::ctrl_c, shutdown_tx).await {
            std::process::exit(130);
        }
    });

    let mut orchestrator = BatchOrchestrator::new(Arc::new(client), prompt_builder, config)
        .with_metrics(metrics.clone())
        .with_progress(progress_tx);

    let result = orchestrator.run_until(&records, shutdown_rx).await;
    // Closes the progress channel so the printer drains and exits
    drop(orchestrator);
    printer.await.context("Progress printer task failed")?;

    let run = match result {
        Ok(run) => run,
        Err(e) if e.is_fatal() => {
            print_error(&format!("Credential check failed: {}", e));
            return Err(e).context(
                "Check MINIMAX_API_KEY and the account balance, or pass --skip-preflight",
            );
        }
        Err(e) => return Err(e.into()),
    };

    dataset::write_results(&args.output, &run)
        .with_context(|| format!("Failed to write results to {}", args.output.display()))?;

    if let Some(path) = &args.metrics_file {
        let text = metrics.encode_text().context("Failed to encode metrics")?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
        info!(event = "metrics_written", path = %path.display(), "Saved batch metrics");
    }

    match format {
        OutputFormat::Json => print_json(&run)?,
        OutputFormat::Table => {
            print_results(&run, records.len());
            print_success(&format!("Saved to {}", args.output.display()));
        }
    }
    Ok(())
}

fn print_results(run: &BatchRun, total: usize) {
    println!();
    println!("{}", "Results".bold());
    println!("{}", "=".repeat(60));

    if run.entries.is_empty() {
        print_warning("No records were processed");
    } else {
        let rows: Vec<ResultRow> = run.entries.iter().map(ResultRow::from).collect();
        println!("{}", Table::new(rows).with(Style::rounded()));
    }

    let summary = &run.summary;
    println!();
    println!(
        "Succeeded:            {}/{}",
        summary.succeeded.to_string().green(),
        summary.attempted
    );
    if summary.transport_failures > 0 {
        println!("Request failures:     {}", summary.transport_failures.to_string().red());
    }
    if summary.decode_failures > 0 {
        println!("Decode failures:      {}", summary.decode_failures.to_string().red());
    }
    for (strategy, count) in &summary.strategy_counts {
        println!("  via {:<16} {}", strategy.as_str(), count);
    }
    match summary.mean_absolute_error_grams {
        Some(mae) => println!(
            "{} {} g",
            "Average prediction error:".bold(),
            format_grams(Some(mae)).cyan()
        ),
        None => print_warning("No successful predictions, average error unavailable"),
    }
    if summary.inconsistent_risk_labels > 0 {
        print_warning(&format!(
            "{} risk label(s) disagree with the weight thresholds",
            summary.inconsistent_risk_labels
        ));
    }
    if run.cancelled {
        print_warning(&format!(
            "Batch cancelled; {} record(s) were not processed",
            total.saturating_sub(summary.attempted)
        ));
    }
}
