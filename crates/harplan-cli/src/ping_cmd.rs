//! `harplan ping` -- provider connectivity check.

use anyhow::{Context, Result};

use harplan_core::provider::OpenAiClient;

use crate::config::{HarplanConfig, mask_secret};

pub async fn run_ping(config: &HarplanConfig) -> Result<()> {
    let provider = &config.provider;
    println!("Endpoint: {}", provider.endpoint);
    println!("Model:    {} ({:?})", provider.model, provider.family());
    if let Some(version) = &provider.api_version {
        println!("Version:  {version}");
    }
    println!("API key:  {}", mask_secret(&provider.api_key));

    let client = OpenAiClient::new(provider.clone()).context("failed to create provider client")?;
    let reply = client
        .ping()
        .await
        .with_context(|| format!("connection test against {} failed", provider.endpoint))?;

    println!();
    println!("Connected. Model replied: {}", reply.trim());
    Ok(())
}
