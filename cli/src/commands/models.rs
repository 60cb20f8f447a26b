//! Model and framework listing command

use anyhow::Result;
use testgen_core::ModelRegistry;
use tracing::info;

/// Show the model registry and the supported test frameworks
pub async fn models_command(json: bool) -> Result<()> {
    info!("Listing registered models");
    let registry = ModelRegistry::builtin();

    if json {
        let listing = serde_json::json!({
            "models": registry.models(),
            "frameworks": registry.frameworks(),
        });
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!("Models\n");
    for model in registry.models() {
        let streaming = if model.supports_streaming {
            "streaming"
        } else {
            "buffered"
        };
        println!(
            "  {:<26} {:<12} {:<10} {}",
            model.id.as_str(),
            model.provider.as_str(),
            streaming,
            model.name
        );
        println!("  {:<26} {}", "", model.description);
    }

    println!("\nTest frameworks\n");
    for framework in registry.frameworks() {
        println!("  {:<26} {}", framework.id.as_str(), framework.description);
    }

    Ok(())
}
