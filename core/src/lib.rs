//! # testgen Core
//!
//! Core library for testgen - unit test generation for JavaScript and
//! TypeScript snippets backed by hosted LLMs.
//!
//! This library provides the model registry, the provider clients for OpenAI,
//! Anthropic and Hugging Face, the prompt builder, the generation orchestrator
//! and the HTTP boundary serving `POST /generate-test`.

// Core modules
pub mod config;
pub mod error;
pub mod generator;
pub mod llm;
pub mod prompt;
pub mod registry;
pub mod selector;
pub mod server;

// Re-export commonly used types
pub use config::{AppConfig, GenerationSettings, ProviderSettings, ServerConfig};
pub use error::{Error, Result};
pub use generator::TestGenerator;
pub use llm::{GenerationRequest, GenerationResult, ProviderClient, TextStream};
pub use registry::{CodeLanguage, ModelDescriptor, ModelId, ModelRegistry, ProviderKind, TestFramework};
pub use selector::ProviderSelector;
pub use server::{router, serve, AppState};

/// Current version of the testgen-core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for the library
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

/// Initialize tracing with a specific debug mode
///
/// `RUST_LOG` still wins when it is set.
pub fn init_tracing_with_debug(debug: bool) {
    let fallback = if debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
