//! HTTP server command

use anyhow::{Context, Result};
use testgen_core::{AppState, TestGenerator};
use tracing::{info, warn};

use crate::config::CliConfigLoader;

/// Run the HTTP boundary until interrupted
pub async fn serve_command(config_loader: CliConfigLoader) -> Result<()> {
    let config = config_loader.load().await?;
    let selector = super::build_selector(&config)?;

    // Missing credentials only disable the affected models
    let failures = selector.warm_up().await;
    for (provider, err) in &failures {
        warn!("{} models are unavailable: {}", provider, err);
    }
    if failures.len() == testgen_core::ProviderKind::ALL.len() {
        warn!("No provider is configured, every generation request will fail");
    }

    info!(
        default_model = %config.generation.default_model,
        default_framework = %config.generation.default_framework,
        "Starting testgen {}",
        testgen_core::VERSION
    );

    let state = AppState::new(TestGenerator::new(selector), config.generation.clone());
    testgen_core::serve(&config.server, state)
        .await
        .with_context(|| format!("Server on {} failed", config.server.bind_address()))
}
