use super::phase::{Phase, CANONICAL_PHASES};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Number of errors shown in rendered context instructions
const INSTRUCTION_ERROR_WINDOW: usize = 3;

/// One generated plugin file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginFile {
    /// Path relative to the plugin root
    pub path: String,
    /// File body
    #[serde(default)]
    pub content: String,
}

impl PluginFile {
    /// Create a file record
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// A coding-standards finding reported by the compliance stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceIssue {
    /// Reported severity (free text from the checker)
    pub severity: String,
    /// Finding text
    pub message: String,
    /// File the finding refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Line number within `file`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Rule identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

/// Entry of the append-only error ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Error class, e.g. `agent_failure` or `security_violation`
    #[serde(rename = "type")]
    pub error_type: String,
    /// Human readable text
    pub message: String,
    /// Agent that was active when the error happened
    pub agent: Option<String>,
    /// When it was recorded
    pub timestamp: DateTime<Utc>,
    /// Phase at the time
    pub phase: Phase,
}

/// Kind of an audit message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Progress note
    Info,
    /// Step completed
    Success,
    /// Non-fatal problem
    Warning,
    /// Failure
    Error,
    /// Control passed to another agent
    Handoff,
}

/// Entry of the append-only message ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Agent that wrote the message
    pub agent: String,
    /// Message text
    pub message: String,
    /// Message kind
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// When it was recorded
    pub timestamp: DateTime<Utc>,
    /// Phase at the time
    pub phase: Phase,
}

/// State of one plugin generation run.
///
/// The identity, the phase list and both ledgers are only reachable through
/// methods, so ids never change, phases never repeat and ledgers only grow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    session_id: Uuid,

    /// Plugin display name
    pub plugin_name: Option<String>,
    /// Plugin slug
    pub plugin_slug: Option<String>,
    /// Plugin version
    pub plugin_version: Option<String>,
    /// Plugin author
    pub plugin_author: Option<String>,

    /// Phase the run is in
    pub current_phase: Phase,
    phases_completed: Vec<Phase>,
    /// When the run started
    pub start_time: DateTime<Utc>,

    /// Free-form user preferences
    #[serde(default)]
    pub user_preferences: BTreeMap<String, Value>,
    /// Features the user asked for
    #[serde(default)]
    pub requested_features: Vec<String>,
    /// Optional test suites the user asked for
    #[serde(default)]
    pub advanced_tests_requested: Vec<String>,

    /// Files produced so far
    #[serde(default)]
    pub generated_files: Vec<PluginFile>,
    /// Findings from the compliance stage
    #[serde(default)]
    pub compliance_issues: Vec<ComplianceIssue>,
    /// Results from the testing stage
    #[serde(default)]
    pub test_results: BTreeMap<String, Value>,

    /// Model the agents ran on
    #[serde(default)]
    pub model_used: Option<String>,
    /// Where the plugin is written
    #[serde(default)]
    pub output_directory: Option<String>,

    errors_encountered: Vec<ErrorRecord>,
    /// Retries used so far
    pub retry_count: u32,
    /// Retry limit
    pub max_retries: u32,

    agent_messages: Vec<AgentMessage>,
    /// Agent that currently owns the run
    pub current_agent: Option<String>,
}

impl SessionContext {
    /// Create a fresh context with a new identity
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            plugin_name: None,
            plugin_slug: None,
            plugin_version: Some("1.0.0".to_string()),
            plugin_author: Some("Anonymous".to_string()),
            current_phase: Phase::Initialization,
            phases_completed: Vec::new(),
            start_time: Utc::now(),
            user_preferences: BTreeMap::new(),
            requested_features: Vec::new(),
            advanced_tests_requested: Vec::new(),
            generated_files: Vec::new(),
            compliance_issues: Vec::new(),
            test_results: BTreeMap::new(),
            model_used: None,
            output_directory: None,
            errors_encountered: Vec::new(),
            retry_count: 0,
            max_retries,
            agent_messages: Vec::new(),
            current_agent: None,
        }
    }

    /// Session identity
    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Completed phases in completion order
    #[must_use]
    pub fn phases_completed(&self) -> &[Phase] {
        &self.phases_completed
    }

    /// Full error ledger
    #[must_use]
    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors_encountered
    }

    /// Last `n` errors, oldest first
    #[must_use]
    pub fn recent_errors(&self, n: usize) -> &[ErrorRecord] {
        let start = self.errors_encountered.len().saturating_sub(n);
        &self.errors_encountered[start..]
    }

    /// Full message ledger
    #[must_use]
    pub fn messages(&self) -> &[AgentMessage] {
        &self.agent_messages
    }

    /// Append to the error ledger. Without an explicit agent the current one is used.
    pub fn add_error(
        &mut self,
        error_type: impl Into<String>,
        message: impl Into<String>,
        agent: Option<&str>,
    ) {
        let agent = agent
            .map(str::to_string)
            .or_else(|| self.current_agent.clone());
        self.errors_encountered.push(ErrorRecord {
            error_type: error_type.into(),
            message: message.into(),
            agent,
            timestamp: Utc::now(),
            phase: self.current_phase,
        });
    }

    /// Append to the message ledger
    pub fn add_agent_message(
        &mut self,
        agent: impl Into<String>,
        message: impl Into<String>,
        kind: MessageKind,
    ) {
        self.agent_messages.push(AgentMessage {
            agent: agent.into(),
            message: message.into(),
            kind,
            timestamp: Utc::now(),
            phase: self.current_phase,
        });
    }

    /// Record a phase as done and make it current
    pub fn mark_phase_complete(&mut self, phase: Phase) {
        if !self.phases_completed.contains(&phase) {
            self.phases_completed.push(phase);
        }
        self.current_phase = phase;
    }

    /// Share of canonical phases completed, 0.0 to 100.0
    #[must_use]
    pub fn progress_percentage(&self) -> f64 {
        let done = self
            .phases_completed
            .iter()
            .filter(|p| p.is_canonical())
            .count();
        done as f64 / CANONICAL_PHASES.len() as f64 * 100.0
    }

    /// Whether the retry budget is used up
    #[must_use]
    pub fn retries_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    /// Render the context-aware preamble handed to agents
    #[must_use]
    pub fn context_instructions(&self) -> String {
        let mut lines = Vec::new();

        if let Some(name) = &self.plugin_name {
            lines.push(format!("Working on plugin: {}", name));
        }
        lines.push(format!("Current phase: {}", self.current_phase));

        let recent = self.recent_errors(INSTRUCTION_ERROR_WINDOW);
        if !recent.is_empty() {
            let messages: Vec<&str> = recent.iter().map(|e| e.message.as_str()).collect();
            lines.push(format!("Recent errors to avoid: {}", messages.join("; ")));
        }

        if !self.user_preferences.is_empty() {
            let prefs: Vec<String> = self
                .user_preferences
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            lines.push(format!("User preferences: {}", prefs.join(", ")));
        }

        if !self.advanced_tests_requested.is_empty() {
            lines.push(format!(
                "Advanced tests requested: {}",
                self.advanced_tests_requested.join(", ")
            ));
        }

        lines.push(format!(
            "Progress: {:.1}% complete",
            self.progress_percentage()
        ));
        lines.join("\n")
    }

    /// Apply every field set in `patch`
    pub fn apply(&mut self, patch: ContextPatch) {
        let ContextPatch {
            plugin_name,
            plugin_slug,
            plugin_version,
            plugin_author,
            current_phase,
            user_preferences,
            requested_features,
            advanced_tests_requested,
            generated_files,
            compliance_issues,
            test_results,
            model_used,
            output_directory,
            retry_count,
            max_retries,
            current_agent,
        } = patch;

        if let Some(v) = plugin_name {
            self.plugin_name = Some(v);
        }
        if let Some(v) = plugin_slug {
            self.plugin_slug = Some(v);
        }
        if let Some(v) = plugin_version {
            self.plugin_version = Some(v);
        }
        if let Some(v) = plugin_author {
            self.plugin_author = Some(v);
        }
        if let Some(v) = current_phase {
            self.current_phase = v;
        }
        if let Some(v) = user_preferences {
            self.user_preferences = v;
        }
        if let Some(v) = requested_features {
            self.requested_features = v;
        }
        if let Some(v) = advanced_tests_requested {
            self.advanced_tests_requested = v;
        }
        if let Some(v) = generated_files {
            self.generated_files = v;
        }
        if let Some(v) = compliance_issues {
            self.compliance_issues = v;
        }
        if let Some(v) = test_results {
            self.test_results = v;
        }
        if let Some(v) = model_used {
            self.model_used = Some(v);
        }
        if let Some(v) = output_directory {
            self.output_directory = Some(v);
        }
        if let Some(v) = retry_count {
            self.retry_count = v;
        }
        if let Some(v) = max_retries {
            self.max_retries = v;
        }
        if let Some(v) = current_agent {
            self.current_agent = Some(v);
        }
    }
}

/// Partial update of a [`SessionContext`].
///
/// Deserializes from a JSON object keyed by field name; unknown names are
/// rejected rather than ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(missing_docs)]
pub struct ContextPatch {
    pub plugin_name: Option<String>,
    pub plugin_slug: Option<String>,
    pub plugin_version: Option<String>,
    pub plugin_author: Option<String>,
    pub current_phase: Option<Phase>,
    pub user_preferences: Option<BTreeMap<String, Value>>,
    pub requested_features: Option<Vec<String>>,
    pub advanced_tests_requested: Option<Vec<String>>,
    pub generated_files: Option<Vec<PluginFile>>,
    pub compliance_issues: Option<Vec<ComplianceIssue>>,
    pub test_results: Option<BTreeMap<String, Value>>,
    pub model_used: Option<String>,
    pub output_directory: Option<String>,
    pub retry_count: Option<u32>,
    pub max_retries: Option<u32>,
    pub current_agent: Option<String>,
}

impl ContextPatch {
    /// Parse a by-name update from a JSON object
    pub fn from_json(value: Value) -> crate::Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}
