//! One-shot generation command

use anyhow::{Context, Result};
use futures::StreamExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use testgen_core::{
    CodeLanguage, GenerationRequest, GenerationResult, ModelId, TestFramework, TestGenerator,
};
use tokio::io::AsyncReadExt;
use tracing::info;

use crate::config::CliConfigLoader;

/// Arguments of `testgen generate`
#[derive(Debug, Clone)]
pub struct GenerateArgs {
    /// Source file, or `-` for stdin
    pub file: PathBuf,
    pub framework: Option<TestFramework>,
    pub model: Option<ModelId>,
    pub code_type: Option<CodeLanguage>,
    pub stream: bool,
}

/// Generate a test suite for one file and print it to stdout
pub async fn generate_command(config_loader: CliConfigLoader, args: GenerateArgs) -> Result<()> {
    let config = config_loader.load().await?;
    let code = read_source(&args.file).await?;

    let mut request = GenerationRequest::new(
        code,
        args.framework.unwrap_or(config.generation.default_framework),
        args.model.unwrap_or(config.generation.default_model),
    )
    .with_streaming(args.stream);
    if let Some(code_type) = args.code_type {
        request = request.with_code_type(code_type);
    }

    info!(
        "Generating {} tests with {} for {}",
        request.test_framework,
        request.model,
        args.file.display()
    );

    let generator = TestGenerator::new(super::build_selector(&config)?);
    let result = generator
        .generate(request)
        .await
        .context("Failed to generate test")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut last = String::new();

    match result {
        GenerationResult::Complete(text) => {
            out.write_all(text.as_bytes())?;
            last = text;
        }
        GenerationResult::Stream(mut stream) => {
            while let Some(fragment) = stream.next().await {
                let fragment = fragment.context("Generation stream aborted")?;
                out.write_all(fragment.as_bytes())?;
                out.flush()?;
                if !fragment.is_empty() {
                    last = fragment;
                }
            }
        }
    }

    if !last.ends_with('\n') {
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

async fn read_source(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut code = String::new();
        tokio::io::stdin()
            .read_to_string(&mut code)
            .await
            .context("Failed to read code from stdin")?;
        return Ok(code);
    }

    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read source file: {}", path.display()))
}
