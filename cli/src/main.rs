//! # testgen CLI
//!
//! Command-line interface for testgen - unit test generation with hosted LLMs.
//!
//! ## Usage
//!
//! - `testgen serve` - Run the HTTP API (`POST /generate-test`)
//! - `testgen generate src/add.ts` - Generate tests for one file
//! - `testgen models` - Show the supported models and test frameworks

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use testgen_core::{CodeLanguage, ModelId, TestFramework};

mod commands;
mod config;

use commands::{generate_command, models_command, serve_command, GenerateArgs};
use config::CliConfigLoader;

/// testgen - Generate unit tests for JavaScript and TypeScript code
#[derive(Parser)]
#[command(name = "testgen")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate unit tests for JavaScript and TypeScript snippets with hosted LLMs")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file or directory path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Model used when a request names none
        #[arg(long)]
        default_model: Option<ModelId>,

        /// Test framework used when a request names none
        #[arg(long)]
        default_framework: Option<TestFramework>,
    },

    /// Generate a test suite for a source file
    Generate {
        /// Source file, or `-` to read from stdin
        file: PathBuf,

        /// Test framework (jest, vitest, mocha)
        #[arg(short, long)]
        framework: Option<TestFramework>,

        /// Model identifier, see `testgen models`
        #[arg(short, long)]
        model: Option<ModelId>,

        /// Source language (javascript, typescript); detected when omitted
        #[arg(long)]
        code_type: Option<CodeLanguage>,

        /// Print fragments as they arrive when the model supports it
        #[arg(short, long)]
        stream: bool,
    },

    /// Show supported models and test frameworks
    Models {
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Build a configuration loader from CLI arguments
fn build_config_loader(cli: &Cli) -> CliConfigLoader {
    let mut loader = CliConfigLoader::new();

    if let Some(config_path) = &cli.config {
        loader = loader.with_config_override(config_path.clone());
    }

    loader
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    testgen_core::init_tracing_with_debug(cli.verbose);

    let mut config_loader = build_config_loader(&cli);

    match cli.command {
        Commands::Serve {
            host,
            port,
            default_model,
            default_framework,
        } => {
            if let Some(host) = host {
                config_loader = config_loader.with_host_override(host);
            }
            if let Some(port) = port {
                config_loader = config_loader.with_port_override(port);
            }
            if let Some(model) = default_model {
                config_loader = config_loader.with_model_override(model);
            }
            if let Some(framework) = default_framework {
                config_loader = config_loader.with_framework_override(framework);
            }
            serve_command(config_loader).await
        }
        Commands::Generate {
            file,
            framework,
            model,
            code_type,
            stream,
        } => {
            let args = GenerateArgs {
                file,
                framework,
                model,
                code_type,
                stream,
            };
            generate_command(config_loader, args).await
        }
        Commands::Models { json } => models_command(json).await,
    }
}
