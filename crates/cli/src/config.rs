//! Configuration management for the CLI
//!
//! Sources, lowest precedence first: built-in defaults, the optional
//! `~/.config/lqah/config.json`, `MINIMAX_*` entries of a `.env` file, then
//! `MINIMAX_*` process environment variables. Command-line flags are applied
//! on top by the caller.

use anyhow::{anyhow, Context, Result};
use neonatal_lib::inference::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
use neonatal_lib::predictor::{
    DEFAULT_DEBUG_RESPONSES, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_PACING,
    DEFAULT_TEMPERATURE,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Prefix shared by every environment setting
pub const ENV_PREFIX: &str = "MINIMAX";

/// Resolved CLI settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Bearer credential for the chat endpoint
    #[serde(default)]
    pub api_key: Option<String>,

    /// Chat-completions URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Rows to process; 0 means every row
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Delay between model requests in milliseconds
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Raw responses logged at debug level
    #[serde(default = "default_debug_responses")]
    pub debug_responses: usize,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_sample_size() -> usize {
    10
}

fn default_pacing_ms() -> u64 {
    DEFAULT_PACING.as_millis() as u64
}

fn default_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_debug_responses() -> usize {
    DEFAULT_DEBUG_RESPONSES
}

impl Settings {
    /// Load settings from the config file, `env_file` and the process environment
    pub fn load(env_file: &Path) -> Result<Self> {
        let dotenv = read_env_file(env_file)?;
        Self::from_sources(config_path().as_deref(), dotenv, None)
    }

    /// Build settings from explicit sources; `process_env` of `None` reads the real environment
    pub fn from_sources(
        config_file: Option<&Path>,
        dotenv: HashMap<String, String>,
        process_env: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = config_file {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Json)
                    .required(false),
            );
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(Some(dotenv)),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(process_env),
            )
            .build()
            .context("Failed to assemble configuration")?;

        config
            .try_deserialize()
            .context("Invalid configuration value")
    }

    /// The API key, or a fatal error explaining how to provide one
    pub fn require_api_key(&self) -> Result<&str> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(anyhow!(
                "{}_API_KEY is not set. Add it to your .env file or export it in the environment",
                ENV_PREFIX
            )),
        }
    }
}

/// Get the configuration file path
fn config_path() -> Option<PathBuf> {
    let home = dirs_next::home_dir()?;
    Some(home.join(".config").join("lqah").join("config.json"))
}

/// Read `KEY=VALUE` lines from a `.env` file; a missing file yields no entries
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(parse_env(&content))
}

fn parse_env(content: &str) -> HashMap<String, String> {
    let mut entries = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
            .unwrap_or(value);
        entries.insert(key.trim().to_string(), value.to_string());
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_sources(None, HashMap::new(), Some(HashMap::new())).unwrap();
        assert_eq!(settings.api_key, None);
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.model, "MiniMax-M2.5");
        assert_eq!(settings.sample_size, 10);
        assert_eq!(settings.pacing_ms, 500);
        assert_eq!(settings.timeout_secs, 300);
        assert_eq!(settings.max_tokens, 4000);
        assert_eq!(settings.debug_responses, 2);
    }

    #[test]
    fn test_process_env_wins_over_dotenv() {
        let dotenv = env(&[("MINIMAX_API_KEY", "from-file"), ("MINIMAX_MODEL", "file-model")]);
        let process = env(&[("MINIMAX_API_KEY", "from-env")]);

        let settings = Settings::from_sources(None, dotenv, Some(process)).unwrap();
        assert_eq!(settings.api_key.as_deref(), Some("from-env"));
        assert_eq!(settings.model, "file-model");
    }

    #[test]
    fn test_numeric_values_from_env() {
        let process = env(&[("MINIMAX_SAMPLE_SIZE", "0"), ("MINIMAX_PACING_MS", "1500")]);
        let settings = Settings::from_sources(None, HashMap::new(), Some(process)).unwrap();
        assert_eq!(settings.sample_size, 0);
        assert_eq!(settings.pacing_ms, 1500);
    }

    #[test]
    fn test_config_file_is_lowest_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"{{"model": "json-model", "sample_size": 25}}"#).unwrap();

        let process = env(&[("MINIMAX_MODEL", "env-model")]);
        let settings = Settings::from_sources(Some(&path), HashMap::new(), Some(process)).unwrap();
        assert_eq!(settings.model, "env-model");
        assert_eq!(settings.sample_size, 25);
    }

    #[test]
    fn test_missing_api_key_is_an_error() {
        let settings = Settings::from_sources(None, HashMap::new(), Some(HashMap::new())).unwrap();
        let err = settings.require_api_key().unwrap_err();
        assert!(err.to_string().contains("MINIMAX_API_KEY"));

        let blank = Settings::from_sources(
            None,
            HashMap::new(),
            Some(env(&[("MINIMAX_API_KEY", "   ")])),
        )
        .unwrap();
        assert!(blank.require_api_key().is_err());
    }

    #[test]
    fn test_parse_env() {
        let parsed = parse_env(
            "# credentials\n\
             MINIMAX_API_KEY=\"sk-123\"\n\
             export MINIMAX_MODEL='custom'\n\
             \n\
             not a pair\n\
             MINIMAX_BASE_URL = https://example.test/v1/chat\n",
        );
        assert_eq!(parsed["MINIMAX_API_KEY"], "sk-123");
        assert_eq!(parsed["MINIMAX_MODEL"], "custom");
        assert_eq!(parsed["MINIMAX_BASE_URL"], "https://example.test/v1/chat");
        assert_eq!(parsed.len(), 3);
    }

    #[test]
    fn test_missing_env_file() {
        let entries = read_env_file(Path::new("/nonexistent/.env")).unwrap();
        assert!(entries.is_empty());
    }
}
