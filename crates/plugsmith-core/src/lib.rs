//! Plugsmith Core - Workflow Coordination Engine
//!
//! This crate provides the coordination core shared by the agents of the
//! Plugsmith plugin generator, including:
//! - Context: Per-session state with JSON file persistence
//! - Guardrails: Pattern-based content, code and output checks
//! - Hooks: Lifecycle event bus with performance and health monitoring
//! - Handoff: Validated, ordered hand-offs between participants
//! - Tools: Timed invocation of agent tools with hook reporting
//! - Workflow: The driver-facing service that wires it all together

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod error;
pub mod guardrails;
pub mod handoff;
pub mod hooks;
pub mod tools;
pub mod workflow;

pub use config::{ContextConfig, CoreConfig, GuardrailConfig, HookConfig, ToolConfig};
pub use context::{
    AgentMessage, ComplianceIssue, ContextPatch, ContextStore, ErrorRecord, MessageKind, Phase,
    PluginFile, SessionContext, SessionSummary, CANONICAL_PHASES,
};
pub use error::{format_error_for_cli, Error, Result, UserFriendlyError};
pub use guardrails::{
    Guardrails, GuardrailTripwire, OutputKind, Severity, SeveritySummary, Violation,
    ViolationCategory,
};
pub use handoff::{
    FilteredPayload, HandoffCoordinator, HandoffError, HandoffKind, HandoffRecord,
    HandoffRequest, HandoffResult, HandoffSummary, Participant, WorkflowState,
};
pub use hooks::{HookBus, HookCallback, HookEvent, HookKind};
pub use tools::{AgentTool, ToolError, ToolInvoker, ToolOutcome, ToolOutput};
pub use workflow::WorkflowService;
