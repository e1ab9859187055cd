//! Configuration loading
//!
//! Layers the embedded defaults, optional config files and `PLUGSMITH_*`
//! environment variables into an [`AppConfig`].

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use plugsmith_core::{ContextConfig, CoreConfig, GuardrailConfig, HookConfig, ToolConfig};
use serde::{Deserialize, Serialize};

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub guardrails: GuardrailConfig,
    #[serde(default)]
    pub hooks: HookConfig,
    #[serde(default)]
    pub tools: ToolConfig,
}

impl AppConfig {
    /// Settings handed to the coordination core
    pub fn core(&self) -> CoreConfig {
        CoreConfig {
            context: self.context.clone(),
            guardrails: self.guardrails.clone(),
            hooks: self.hooks.clone(),
            tools: self.tools.clone(),
        }
    }
}

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let config = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. External overrides (optional)
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            File::with_name(&format!(
                "config/{}",
                std::env::var("PLUGSMITH_ENV").unwrap_or_else(|_| "development".to_string())
            ))
            .required(false),
        )
        .add_source(File::with_name("config/local").required(false))
        // 3. Environment variables (highest priority)
        // prefix_separator("_") makes PLUGSMITH_HOOKS__X work with a single
        // underscore after the prefix.
        .add_source(
            Environment::with_prefix("PLUGSMITH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let app: AppConfig = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;
    app.core()
        .validate()
        .context("Configuration failed validation")?;
    Ok(app)
}
