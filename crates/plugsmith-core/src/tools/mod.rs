//! Tools - the boundary to external agent tools.
//!
//! The core does not know how a tool produces its result. It only times the
//! call, turns timeouts and failures into a failed [`ToolOutcome`] and
//! reports both ends to the hook bus.

use crate::config::ToolConfig;
use crate::context::PluginFile;
use crate::hooks::HookBus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, instrument};
use uuid::Uuid;

/// Failure reported by a tool
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    /// Arguments rejected by the tool
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// External tooling is missing
    #[error("tool not available: {0}")]
    Unavailable(String),

    /// An invoked process exited non-zero
    #[error("process exited with status {code}: {stderr}")]
    ExitStatus {
        /// Exit code
        code: i32,
        /// Captured standard error
        stderr: String,
    },

    /// Any other failure
    #[error("execution failed: {0}")]
    Failed(String),
}

/// What a tool hands back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolOutput {
    /// Generated plugin files
    Files(Vec<PluginFile>),
    /// Plain text
    Text(String),
    /// Any other JSON value
    Structured(Value),
}

impl ToolOutput {
    /// Interpret raw tool text: a JSON list of `{path, content}` records
    /// becomes [`ToolOutput::Files`], anything else stays text.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        match serde_json::from_str::<Vec<PluginFile>>(&raw) {
            Ok(files) => ToolOutput::Files(files),
            Err(_) => ToolOutput::Text(raw),
        }
    }

    /// Approximate payload size in bytes
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            ToolOutput::Files(files) => files.iter().map(|f| f.path.len() + f.content.len()).sum(),
            ToolOutput::Text(text) => text.len(),
            ToolOutput::Structured(value) => value.to_string().len(),
        }
    }
}

/// An external tool the agents can call
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AgentTool: Send + Sync {
    /// Identifier used in hooks and the watch list
    fn name(&self) -> &str;

    /// Run the tool
    async fn call(&self, args: Value) -> Result<ToolOutput, ToolError>;
}

/// Result of one invocation; failures are values, never errors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// Tool name
    pub tool: String,
    /// Calling agent
    pub agent: String,
    /// Whether the call returned a value in time
    pub success: bool,
    /// Returned value
    pub output: Option<ToolOutput>,
    /// Failure text
    pub error: Option<String>,
    /// Wall time in milliseconds
    pub duration_ms: u64,
    /// Whether the call was cut off
    pub timed_out: bool,
}

/// Runs tools under a timeout and reports them to the hook bus
#[derive(Debug, Clone)]
pub struct ToolInvoker {
    hooks: Arc<HookBus>,
    timeout: Duration,
}

impl ToolInvoker {
    /// Create an invoker using the configured default timeout
    #[must_use]
    pub fn new(hooks: Arc<HookBus>, config: &ToolConfig) -> Self {
        Self {
            hooks,
            timeout: Duration::from_secs(config.default_timeout_secs),
        }
    }

    /// Override the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Invoke `tool` on behalf of `agent`
    #[instrument(skip(self, tool, args), fields(tool = tool.name()))]
    pub async fn invoke(
        &self,
        agent: &str,
        tool: &dyn AgentTool,
        args: Value,
        session: Option<Uuid>,
    ) -> ToolOutcome {
        let name = tool.name().to_string();
        self.hooks.on_tool_start(&name, agent, session);

        let started = Instant::now();
        let result = timeout(self.timeout, tool.call(args)).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let (output, error, timed_out) = match result {
            Ok(Ok(output)) => (Some(output), None, false),
            Ok(Err(e)) => (None, Some(e.to_string()), false),
            Err(_) => (
                None,
                Some(format!("timed out after {}s", self.timeout.as_secs_f64())),
                true,
            ),
        };
        let success = error.is_none();

        if let Some(e) = &error {
            error!(tool = %name, agent = %agent, timed_out, error = %e, "Tool invocation failed");
        } else {
            debug!(tool = %name, duration_ms, "Tool invocation completed");
        }

        self.hooks.on_tool_end(
            &name,
            agent,
            success,
            error.as_deref(),
            output.as_ref(),
            session,
        );

        ToolOutcome {
            tool: name,
            agent: agent.to_string(),
            success,
            output,
            error,
            duration_ms,
            timed_out,
        }
    }
}

#[cfg(test)]
mod tests;
