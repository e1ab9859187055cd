//! Configuration types for the coordination core.
//!
//! Every field carries a serde default so partial TOML sections and
//! environment overrides deserialize cleanly.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Constants
// ============================================================================

/// Plugsmith data directory name (under the user's home)
pub const PLUGSMITH_DIR_NAME: &str = ".plugsmith";

/// Fallback context directory when no home directory is available
pub const FALLBACK_CONTEXT_DIR: &str = ".context";

/// Default retry limit for a session
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default age after which persisted sessions are cleaned up
pub const DEFAULT_RETENTION_DAYS: u64 = 7;

// ============================================================================
// Sections
// ============================================================================

/// Session context persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Directory holding one JSON file per session
    #[serde(default = "default_context_dir")]
    pub context_dir: PathBuf,

    /// Retry limit given to newly created sessions
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Age in days after which `cleanup` removes a session file
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
}

/// Returns `~/.plugsmith/context`, or `./.context` without a home directory.
pub fn default_context_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(PLUGSMITH_DIR_NAME).join("context"))
        .unwrap_or_else(|| PathBuf::from(FALLBACK_CONTEXT_DIR))
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retention_days() -> u64 {
    DEFAULT_RETENTION_DAYS
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            context_dir: default_context_dir(),
            max_retries: default_max_retries(),
            retention_days: default_retention_days(),
        }
    }
}

/// Guardrail limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// Inputs longer than this many characters are flagged (medium)
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// Inputs with more than this many line breaks are flagged (low)
    #[serde(default = "default_max_input_lines")]
    pub max_input_lines: usize,

    /// Outputs shorter than this after trimming are flagged (high)
    #[serde(default = "default_min_output_chars")]
    pub min_output_chars: usize,
}

fn default_max_input_chars() -> usize {
    10_000
}

fn default_max_input_lines() -> usize {
    100
}

fn default_min_output_chars() -> usize {
    10
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            max_input_chars: default_max_input_chars(),
            max_input_lines: default_max_input_lines(),
            min_output_chars: default_min_output_chars(),
        }
    }
}

/// Hook bus settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookConfig {
    /// Events older than this are dropped by `prune_expired`
    #[serde(default = "default_event_max_age_hours")]
    pub event_max_age_hours: u64,

    /// Agent runs longer than this are logged as slow
    #[serde(default = "default_slow_agent_secs")]
    pub slow_agent_secs: f64,

    /// Tools whose results go through the security check on success
    #[serde(default = "default_watched_tools")]
    pub watched_tools: Vec<String>,

    /// Broadcast channel capacity for live subscribers
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Samples kept per performance series
    #[serde(default = "default_max_samples")]
    pub max_samples_per_series: usize,
}

fn default_event_max_age_hours() -> u64 {
    24
}

fn default_slow_agent_secs() -> f64 {
    30.0
}

fn default_watched_tools() -> Vec<String> {
    vec!["generate_plugin_files".to_string(), "write_file".to_string()]
}

fn default_channel_capacity() -> usize {
    256
}

fn default_max_samples() -> usize {
    100
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            event_max_age_hours: default_event_max_age_hours(),
            slow_agent_secs: default_slow_agent_secs(),
            watched_tools: default_watched_tools(),
            channel_capacity: default_channel_capacity(),
            max_samples_per_series: default_max_samples(),
        }
    }
}

/// Tool invocation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Upper bound on a single tool call
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_timeout_secs(),
        }
    }
}

/// All coordination core settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Session persistence
    #[serde(default)]
    pub context: ContextConfig,
    /// Guardrail limits
    #[serde(default)]
    pub guardrails: GuardrailConfig,
    /// Hook bus
    #[serde(default)]
    pub hooks: HookConfig,
    /// Tool invocation
    #[serde(default)]
    pub tools: ToolConfig,
}

impl CoreConfig {
    /// Check values that would make the core misbehave
    pub fn validate(&self) -> crate::Result<()> {
        if self.hooks.channel_capacity == 0 {
            return Err(crate::Error::InvalidConfig {
                field: "hooks.channel_capacity".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.tools.default_timeout_secs == 0 {
            return Err(crate::Error::InvalidConfig {
                field: "tools.default_timeout_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.hooks.slow_agent_secs <= 0.0 {
            return Err(crate::Error::InvalidConfig {
                field: "hooks.slow_agent_secs".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
