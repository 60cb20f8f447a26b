//! CLI configuration loader for testgen
//!
//! Implements single-source priority loading with overrides:
//! 1. --config file/dir (highest priority)
//! 2. Current working directory: ./testgen.json or ./.testgen/config.json
//! 3. XDG config: $XDG_CONFIG_HOME/testgen/config.json or the platform config dir
//! 4. Built-in defaults (no files)
//!
//! Environment overrides are applied on top of the loaded file, then flag
//! overrides on top of those.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use testgen_core::{AppConfig, ModelId, ProviderKind, TestFramework};
use tracing::debug;

const FILE_NAME: &str = "testgen.json";
const DIR_NAME: &str = ".testgen";
const APP_NAME: &str = "testgen";

/// CLI configuration loader
#[derive(Debug, Default)]
pub struct CliConfigLoader {
    /// Override config file/directory path
    config_override: Option<PathBuf>,
    /// Flag overrides
    host_override: Option<String>,
    port_override: Option<u16>,
    model_override: Option<ModelId>,
    framework_override: Option<TestFramework>,
}

impl CliConfigLoader {
    /// Create a new loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Set config file/directory override
    pub fn with_config_override(mut self, path: PathBuf) -> Self {
        self.config_override = Some(path);
        self
    }

    /// Set listener host override
    pub fn with_host_override(mut self, host: String) -> Self {
        self.host_override = Some(host);
        self
    }

    /// Set listener port override
    pub fn with_port_override(mut self, port: u16) -> Self {
        self.port_override = Some(port);
        self
    }

    /// Set default model override
    pub fn with_model_override(mut self, model: ModelId) -> Self {
        self.model_override = Some(model);
        self
    }

    /// Set default framework override
    pub fn with_framework_override(mut self, framework: TestFramework) -> Self {
        self.framework_override = Some(framework);
        self
    }

    /// Load and resolve configuration
    pub async fn load(&self) -> Result<AppConfig> {
        // Step 1: Find and load base configuration
        let mut config = match &self.config_override {
            Some(override_path) => {
                let path = expand_path(override_path);
                self.load_from_path(&path).await.with_context(|| {
                    format!(
                        "Failed to load config from override path: {}",
                        path.display()
                    )
                })?
            }
            None => {
                let cwd = std::env::current_dir()?;
                self.search_and_load(&cwd, xdg_config_dir()).await?
            }
        };

        // Step 2: Environment overrides
        apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

        // Step 3: Flag overrides
        self.apply_flag_overrides(&mut config);

        config
            .validate()
            .map_err(|e| anyhow!("Configuration validation failed: {}", e))?;

        Ok(config)
    }

    /// Search for config in priority order, falling back to defaults
    async fn search_and_load(&self, cwd: &Path, config_home: Option<PathBuf>) -> Result<AppConfig> {
        for candidate in candidate_paths(cwd, config_home) {
            if candidate.is_file() {
                debug!("Loading configuration from {}", candidate.display());
                return self.load_file(&candidate).await;
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(AppConfig::default())
    }

    /// Load configuration from a specific path (file or directory)
    async fn load_from_path(&self, path: &Path) -> Result<AppConfig> {
        if path.is_file() {
            self.load_file(path).await
        } else if path.is_dir() {
            // Try config.json in the directory
            let config_file = path.join("config.json");
            if config_file.exists() {
                self.load_file(&config_file).await
            } else {
                Err(anyhow!(
                    "No config.json found in directory: {}",
                    path.display()
                ))
            }
        } else {
            Err(anyhow!("Config path does not exist: {}", path.display()))
        }
    }

    /// Load a single config file
    async fn load_file(&self, path: &Path) -> Result<AppConfig> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn apply_flag_overrides(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host_override {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port_override {
            config.server.port = port;
        }
        if let Some(model) = self.model_override {
            config.generation.default_model = model;
        }
        if let Some(framework) = self.framework_override {
            config.generation.default_framework = framework;
        }
    }
}

/// Files checked when no explicit path is given, highest priority first
fn candidate_paths(cwd: &Path, config_home: Option<PathBuf>) -> Vec<PathBuf> {
    let mut paths = vec![cwd.join(FILE_NAME), cwd.join(DIR_NAME).join("config.json")];
    if let Some(config_home) = config_home {
        paths.push(config_home.join(APP_NAME).join("config.json"));
    }
    paths
}

/// Get XDG config directory
fn xdg_config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::config_dir)
}

/// Expand `~` and environment variables in a user supplied path
fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(&raw).as_ref()),
    }
}

/// Apply `TESTGEN_*` and `<PROVIDER>_BASE_URL` overrides read through `lookup`
fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

    if let Some(host) = var("TESTGEN_HOST") {
        config.server.host = host;
    }
    if let Some(port) = var("TESTGEN_PORT") {
        config.server.port = port
            .trim()
            .parse::<u16>()
            .with_context(|| format!("Invalid TESTGEN_PORT: {}", port))?;
    }
    if let Some(model) = var("TESTGEN_DEFAULT_MODEL") {
        config.generation.default_model = model
            .parse::<ModelId>()
            .with_context(|| format!("Invalid TESTGEN_DEFAULT_MODEL: {}", model))?;
    }
    if let Some(framework) = var("TESTGEN_DEFAULT_FRAMEWORK") {
        config.generation.default_framework = framework
            .parse::<TestFramework>()
            .with_context(|| format!("Invalid TESTGEN_DEFAULT_FRAMEWORK: {}", framework))?;
    }

    for kind in ProviderKind::ALL {
        if let Some(base_url) = var(kind.base_url_env()) {
            config.providers.get_mut(*kind).base_url = Some(base_url);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[tokio::test]
    async fn test_cwd_file_takes_priority_over_dot_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("testgen.json"), r#"{"server": {"port": 4000}}"#).unwrap();
        std::fs::create_dir(dir.path().join(".testgen")).unwrap();
        std::fs::write(
            dir.path().join(".testgen").join("config.json"),
            r#"{"server": {"port": 5000}}"#,
        )
        .unwrap();

        let config = CliConfigLoader::new()
            .search_and_load(dir.path(), None)
            .await
            .unwrap();
        assert_eq!(config.server.port, 4000);
    }

    #[tokio::test]
    async fn test_xdg_file_used_when_cwd_has_none() {
        let cwd = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        std::fs::create_dir_all(home.path().join("testgen")).unwrap();
        std::fs::write(
            home.path().join("testgen").join("config.json"),
            r#"{"generation": {"default_framework": "mocha"}}"#,
        )
        .unwrap();

        let config = CliConfigLoader::new()
            .search_and_load(cwd.path(), Some(home.path().to_path_buf()))
            .await
            .unwrap();
        assert_eq!(config.generation.default_framework, TestFramework::Mocha);
    }

    #[tokio::test]
    async fn test_defaults_without_any_file() {
        let cwd = TempDir::new().unwrap();
        let config = CliConfigLoader::new()
            .search_and_load(cwd.path(), None)
            .await
            .unwrap();
        assert_eq!(config.server.bind_address(), "127.0.0.1:3000");
    }

    #[tokio::test]
    async fn test_override_directory_and_missing_path() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{"providers": {"openai": {"api_key": "sk-file"}}}"#,
        )
        .unwrap();

        let loader = CliConfigLoader::new();
        let config = loader.load_from_path(dir.path()).await.unwrap();
        assert_eq!(config.providers.openai.api_key.as_deref(), Some("sk-file"));

        let missing = dir.path().join("nope.json");
        assert!(loader.load_from_path(&missing).await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_file_names_the_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("testgen.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = CliConfigLoader::new().load_file(&path).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("TESTGEN_HOST", "0.0.0.0"),
                ("TESTGEN_PORT", "8080"),
                ("TESTGEN_DEFAULT_MODEL", "claude-3-5-sonnet-latest"),
                ("TESTGEN_DEFAULT_FRAMEWORK", "vitest"),
                ("ANTHROPIC_BASE_URL", "http://localhost:9000"),
                ("OPENAI_BASE_URL", "  "),
            ]),
        )
        .unwrap();

        assert_eq!(config.server.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.generation.default_model, ModelId::Claude35Sonnet);
        assert_eq!(config.generation.default_framework, TestFramework::Vitest);
        assert_eq!(
            config.providers.anthropic.base_url.as_deref(),
            Some("http://localhost:9000")
        );
        assert!(config.providers.openai.base_url.is_none());
    }

    #[test]
    fn test_invalid_env_values_are_errors() {
        let mut config = AppConfig::default();
        assert!(apply_env_overrides(&mut config, env(&[("TESTGEN_PORT", "http")])).is_err());
        assert!(
            apply_env_overrides(&mut config, env(&[("TESTGEN_DEFAULT_MODEL", "gpt-5")])).is_err()
        );
    }

    #[test]
    fn test_flags_win_over_file_and_env() {
        let mut config = AppConfig::default();
        config.server.port = 4000;
        config.generation.default_framework = TestFramework::Vitest;
        CliConfigLoader::new()
            .with_host_override("0.0.0.0".to_string())
            .with_port_override(5555)
            .with_model_override(ModelId::CodeLlama70b)
            .with_framework_override(TestFramework::Mocha)
            .apply_flag_overrides(&mut config);

        assert_eq!(config.server.bind_address(), "0.0.0.0:5555");
        assert_eq!(config.generation.default_model, ModelId::CodeLlama70b);
        assert_eq!(config.generation.default_framework, TestFramework::Mocha);
    }

    #[test]
    fn test_tilde_is_expanded() {
        let expanded = expand_path(Path::new("~/testgen.json"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("testgen.json"));
        }
    }
}
