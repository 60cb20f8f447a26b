//! Minimal configuration module for testgen core
//!
//! Only exports pure data types. All loading logic is in CLI layer.

pub mod types;

pub use types::{AppConfig, GenerationSettings, ProviderSettings, ProvidersConfig, ServerConfig};
