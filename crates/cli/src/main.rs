//! LqahCare prediction CLI
//!
//! Estimates newborn birth weight for a table of maternal records through a
//! remote chat model, and offers offline decoding and risk classification.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use commands::{check, classify, decode, predict};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// LqahCare neonatal birth-weight risk prediction
#[derive(Parser)]
#[command(name = "lqah")]
#[command(author, version, about = "LqahCare neonatal birth-weight risk prediction", long_about = None)]
pub struct Cli {
    /// Path to a .env file with MINIMAX_* settings
    #[arg(long, env = "LQAH_ENV_FILE", default_value = ".env", global = true)]
    pub env_file: PathBuf,

    /// Chat-completions endpoint URL (overrides MINIMAX_BASE_URL)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Model name (overrides MINIMAX_MODEL)
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long, short, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Predict birth weights for a CSV of maternal records
    Predict(PredictArgs),

    /// Validate the API key against the endpoint
    Check,

    /// Decode a raw model response (from a file or stdin)
    Decode {
        /// File holding the response text; reads stdin when omitted
        file: Option<PathBuf>,
    },

    /// Classify a birth weight in grams into a risk level
    Classify {
        /// Birth weight in grams
        grams: f64,
    },
}

#[derive(Args)]
pub struct PredictArgs {
    /// Input CSV with gestation, parity, age, height, weight, smoke, bwt columns
    #[arg(long, short, default_value = "babies_cleaned.csv")]
    pub input: PathBuf,

    /// Where to write the results CSV
    #[arg(long, short, default_value = "predictions_output.csv")]
    pub output: PathBuf,

    /// Number of rows to process, 0 for all (overrides MINIMAX_SAMPLE_SIZE)
    #[arg(long)]
    pub sample_size: Option<usize>,

    /// Delay between model requests in milliseconds
    #[arg(long)]
    pub pacing_ms: Option<u64>,

    /// Skip the credential check before the batch
    #[arg(long)]
    pub skip_preflight: bool,

    /// Number of raw responses to log at debug level
    #[arg(long)]
    pub debug_responses: Option<usize>,

    /// Write Prometheus metrics for the run to this file
    #[arg(long)]
    pub metrics_file: Option<PathBuf>,

    /// Maximum output tokens per request
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

fn init_tracing(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

/// Layered settings with the global flag overrides applied
fn load_settings(
    env_file: &Path,
    base_url: Option<String>,
    model: Option<String>,
) -> Result<config::Settings> {
    let mut settings = config::Settings::load(env_file)?;
    if let Some(base_url) = base_url {
        settings.base_url = base_url;
    }
    if let Some(model) = model {
        settings.model = model;
    }
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    // Execute command; decode and classify run offline without settings
    match cli.command {
        Commands::Predict(args) => {
            let settings = load_settings(&cli.env_file, cli.base_url, cli.model)?;
            predict::run(settings, args, cli.format).await?;
        }
        Commands::Check => {
            let settings = load_settings(&cli.env_file, cli.base_url, cli.model)?;
            check::run(&settings, cli.format).await?;
        }
        Commands::Decode { file } => {
            decode::run(file.as_deref(), cli.format)?;
        }
        Commands::Classify { grams } => {
            classify::run(grams, cli.format)?;
        }
    }

    Ok(())
}
