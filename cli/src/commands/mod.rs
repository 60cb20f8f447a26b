//! CLI command implementations

pub mod generate;
pub mod models;
pub mod serve;

pub use generate::{generate_command, GenerateArgs};
pub use models::models_command;
pub use serve::serve_command;

use anyhow::{Context, Result};
use std::sync::Arc;
use testgen_core::{AppConfig, ModelRegistry, ProviderSelector};

/// Selector over lazily constructed provider clients
pub(crate) fn build_selector(config: &AppConfig) -> Result<Arc<ProviderSelector>> {
    let registry = Arc::new(ModelRegistry::builtin());
    let selector = ProviderSelector::new(registry, config)
        .context("Failed to initialize provider clients")?;
    Ok(Arc::new(selector))
}
