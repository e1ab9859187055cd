use crate::context::Phase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Lifecycle transition observed by the hook bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    /// An agent began running
    AgentStart,
    /// An agent finished
    AgentEnd,
    /// A tool call began
    ToolStart,
    /// A tool call finished
    ToolEnd,
    /// Control moved between agents
    Handoff,
    /// An error was reported
    Error,
    /// Content went through a guardrail check
    Validation,
    /// A tool result went through the security scan
    SecurityCheck,
}

impl HookKind {
    /// Every kind
    pub const ALL: [HookKind; 8] = [
        HookKind::AgentStart,
        HookKind::AgentEnd,
        HookKind::ToolStart,
        HookKind::ToolEnd,
        HookKind::Handoff,
        HookKind::Error,
        HookKind::Validation,
        HookKind::SecurityCheck,
    ];

    /// Wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::AgentStart => "agent_start",
            HookKind::AgentEnd => "agent_end",
            HookKind::ToolStart => "tool_start",
            HookKind::ToolEnd => "tool_end",
            HookKind::Handoff => "handoff",
            HookKind::Error => "error",
            HookKind::Validation => "validation",
            HookKind::SecurityCheck => "security_check",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookEvent {
    /// What happened
    #[serde(rename = "type")]
    pub kind: HookKind,
    /// Agent the event is about
    pub agent_name: String,
    /// Tool, for tool and security events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// When it happened
    pub timestamp: DateTime<Utc>,
    /// Elapsed seconds, when a matching start was seen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    /// Whether the step succeeded
    pub success: bool,
    /// Error text on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Session the event belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    /// Session phase at the time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    /// Kind-specific extras
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl HookEvent {
    /// Create a successful event stamped now
    pub fn new(kind: HookKind, agent_name: impl Into<String>) -> Self {
        Self {
            kind,
            agent_name: agent_name.into(),
            tool_name: None,
            timestamp: Utc::now(),
            duration_secs: None,
            success: true,
            error: None,
            session_id: None,
            phase: None,
            metadata: Map::new(),
        }
    }

    /// Set the tool name
    #[must_use]
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool_name = Some(tool.into());
        self
    }

    /// Set the duration
    #[must_use]
    pub fn with_duration(mut self, secs: Option<f64>) -> Self {
        self.duration_secs = secs;
        self
    }

    /// Set outcome and error text
    #[must_use]
    pub fn with_outcome(mut self, success: bool, error: Option<&str>) -> Self {
        self.success = success;
        self.error = error.map(str::to_string);
        self
    }

    /// Attach session id and phase
    #[must_use]
    pub fn with_session(mut self, session_id: Option<Uuid>, phase: Option<Phase>) -> Self {
        self.session_id = session_id;
        self.phase = phase;
        self
    }

    /// Add one metadata entry
    #[must_use]
    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}
