//! Credential check against the chat endpoint

use anyhow::{Context, Result};
use neonatal_lib::inference::{HttpClientConfig, HttpModelClient, ModelClient};
use serde_json::json;
use std::time::Duration;

use crate::config::Settings;
use crate::output::{print_error, print_json, print_success, OutputFormat};

/// Send the preflight probe and report whether the key is accepted
pub async fn run(settings: &Settings, format: OutputFormat) -> Result<()> {
    let client = build_client(settings)?;

    if let Err(e) = client.preflight(&settings.model).await {
        print_error(&format!("Endpoint rejected the request: {}", e));
        return Err(e).context("Check your MINIMAX_API_KEY and account balance");
    }

    match format {
        OutputFormat::Json => print_json(&json!({
            "endpoint": client.endpoint().as_str(),
            "model": settings.model,
            "status": "ok",
        }))?,
        OutputFormat::Table => print_success(&format!(
            "API key accepted by {} for model {}",
            client.endpoint(),
            settings.model
        )),
    }
    Ok(())
}

/// Build the HTTP client from resolved settings
pub fn build_client(settings: &Settings) -> Result<HttpModelClient> {
    let api_key = settings.require_api_key()?;
    let config = HttpClientConfig {
        endpoint: settings.base_url.clone(),
        api_key: api_key.to_string(),
        request_timeout: Duration::from_secs(settings.timeout_secs),
    };
    Ok(HttpModelClient::new(config)?)
}
