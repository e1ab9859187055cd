//! Driver-facing report types returned by [`super::WorkflowService`].

use crate::context::{Phase, SessionContext};
use crate::handoff::{HandoffError, HandoffKind, HandoffSummary, Participant, WorkflowState};
use crate::hooks::SessionMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current session as seen by the hand-off status view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextInfo {
    /// Session id
    pub session_id: Uuid,
    /// Plugin name, if known
    pub plugin_name: Option<String>,
    /// Current phase
    pub current_phase: Phase,
    /// Progress percentage
    pub progress: f64,
    /// Agent owning the run
    pub current_agent: Option<String>,
    /// Completed phases in order
    pub phases_completed: Vec<Phase>,
}

impl From<&SessionContext> for ContextInfo {
    fn from(ctx: &SessionContext) -> Self {
        Self {
            session_id: ctx.session_id(),
            plugin_name: ctx.plugin_name.clone(),
            current_phase: ctx.current_phase,
            progress: ctx.progress_percentage(),
            current_agent: ctx.current_agent.clone(),
            phases_completed: ctx.phases_completed().to_vec(),
        }
    }
}

/// A hand-off the driver could issue next
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedHandoff {
    /// Kind to request
    pub handoff_type: HandoffKind,
    /// Receiving stage
    pub to_agent: Participant,
    /// Why it is suggested
    pub reason: String,
}

/// Chain statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffStatistics {
    /// Recorded hand-offs
    pub total_handoffs: usize,
    /// Recorded hand-offs with security clearance
    pub cleared_handoffs: usize,
    /// Share of cleared hand-offs, 100 for an empty chain
    pub success_rate: f64,
}

/// Everything a driver needs to pick the next hand-off
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffStatus {
    /// Coordinator snapshot
    pub workflow_state: WorkflowState,
    /// Current session, if any
    pub context_info: Option<ContextInfo>,
    /// Chain as history rows
    pub handoff_history: Vec<HandoffSummary>,
    /// Chain statistics
    pub statistics: HandoffStatistics,
    /// Hand-offs offered to the current agent
    pub available_handoffs: Vec<RecommendedHandoff>,
    /// Suggested next steps
    pub next_recommended_handoffs: Vec<RecommendedHandoff>,
}

/// Outcome of the checks beyond required fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalChecks {
    /// Session is not in the failed phase
    pub context_consistency: bool,
    /// Payload carries what the receiving stage needs
    pub data_completeness: bool,
    /// The chain allows the kind next
    pub workflow_sequence: bool,
    /// No high or critical findings in carried files, and no missing clearance
    pub security_clearance: bool,
    /// One line per failed check
    pub errors: Vec<String>,
}

impl AdditionalChecks {
    /// All checks passed
    #[must_use]
    pub fn valid(&self) -> bool {
        self.context_consistency
            && self.data_completeness
            && self.workflow_sequence
            && self.security_clearance
    }
}

impl Default for AdditionalChecks {
    fn default() -> Self {
        Self {
            context_consistency: true,
            data_completeness: true,
            workflow_sequence: true,
            security_clearance: true,
            errors: Vec::new(),
        }
    }
}

/// Result of a dry-run validation of hand-off data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataValidationReport {
    /// Every required field is present
    pub valid: bool,
    /// `valid` and every additional check passed
    pub ready: bool,
    /// Kind as requested
    pub handoff_type: String,
    /// Serialized payload length
    pub data_size: usize,
    /// Required-field, kind or JSON failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<HandoffError>,
    /// Further checks, absent when the input could not be parsed
    pub additional_checks: Option<AdditionalChecks>,
    /// Follow-ups
    pub recommendations: Vec<String>,
}

/// Result of a workflow reset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowReset {
    /// Confirmation text
    pub message: String,
    /// Coordinator snapshot before the reset
    pub previous_state: WorkflowState,
    /// When the reset happened
    pub reset_at: DateTime<Utc>,
}

/// Session facts attached to session metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDetails {
    /// Plugin name, if known
    pub plugin_name: Option<String>,
    /// Current phase
    pub current_phase: Phase,
    /// Completed phases in order
    pub phases_completed: Vec<Phase>,
    /// Progress percentage
    pub progress: f64,
    /// Length of the error ledger
    pub errors_encountered: usize,
    /// Optional test suites the user asked for
    pub advanced_tests_requested: Vec<String>,
}

impl From<&SessionContext> for SessionDetails {
    fn from(ctx: &SessionContext) -> Self {
        Self {
            plugin_name: ctx.plugin_name.clone(),
            current_phase: ctx.current_phase,
            phases_completed: ctx.phases_completed().to_vec(),
            progress: ctx.progress_percentage(),
            errors_encountered: ctx.errors().len(),
            advanced_tests_requested: ctx.advanced_tests_requested.clone(),
        }
    }
}

/// Session metrics with the session's own state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionMetricsReport {
    /// Event-derived metrics
    #[serde(flatten)]
    pub metrics: SessionMetrics,
    /// Session state, when the session is still loaded
    pub context: Option<SessionDetails>,
}
