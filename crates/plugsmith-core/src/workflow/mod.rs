//! Workflow - the driver-facing service composing the coordination core.
//!
//! [`WorkflowService`] owns the context store, guardrails, hook bus,
//! hand-off coordinator and tool invoker. Drivers talk to it with strings
//! and JSON text; every contract failure comes back as data.

/// Report types returned to drivers.
pub mod report;

pub use report::{
    AdditionalChecks, ContextInfo, DataValidationReport, HandoffStatistics, HandoffStatus,
    RecommendedHandoff, SessionDetails, SessionMetricsReport, WorkflowReset,
};

use crate::config::CoreConfig;
use crate::context::{ContextPatch, ContextStore, MessageKind, Phase, SessionContext};
use crate::error::Result;
use crate::guardrails::{GuardrailTripwire, Guardrails, Severity, Violation, ViolationCategory};
use crate::handoff::coordinator::join_kinds;
use crate::handoff::{
    HandoffCoordinator, HandoffError, HandoffKind, HandoffPayload, HandoffRequest, HandoffResult,
    Participant,
};
use crate::hooks::{ErrorAnalysis, HealthStatus, HookBus, PerformanceMetrics};
use crate::tools::{AgentTool, ToolInvoker, ToolOutcome};
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Order in which hand-offs are suggested
const RECOMMENDED_SEQUENCE: [(HandoffKind, Participant); 6] = [
    (HandoffKind::Specification, Participant::Specification),
    (HandoffKind::Generation, Participant::FileGenerator),
    (HandoffKind::Compliance, Participant::Compliance),
    (HandoffKind::Testing, Participant::Testing),
    (HandoffKind::Security, Participant::Compliance),
    (HandoffKind::Completion, Participant::Manager),
];

/// Participant used when the session has no current agent
const DEFAULT_AGENT: Participant = Participant::Manager;

/// Driver-facing service over the coordination core
#[derive(Debug)]
pub struct WorkflowService {
    store: Arc<ContextStore>,
    guardrails: Arc<Guardrails>,
    hooks: Arc<HookBus>,
    coordinator: Arc<HandoffCoordinator>,
    tools: ToolInvoker,
}

impl WorkflowService {
    /// Build every component from configuration
    pub fn new(config: &CoreConfig) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(ContextStore::new(&config.context)?);
        let guardrails = Arc::new(Guardrails::new(config.guardrails.clone()));
        let hooks = Arc::new(HookBus::with_default_callbacks(
            config.hooks.clone(),
            Arc::clone(&store),
            Arc::clone(&guardrails),
        ));
        let coordinator = Arc::new(HandoffCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&hooks),
        ));
        let tools = ToolInvoker::new(Arc::clone(&hooks), &config.tools);

        info!(context_dir = ?store.context_dir(), "Workflow service ready");
        Ok(Self::from_parts(store, guardrails, hooks, coordinator, tools))
    }

    /// Assemble from already constructed components
    #[must_use]
    pub fn from_parts(
        store: Arc<ContextStore>,
        guardrails: Arc<Guardrails>,
        hooks: Arc<HookBus>,
        coordinator: Arc<HandoffCoordinator>,
        tools: ToolInvoker,
    ) -> Self {
        Self {
            store,
            guardrails,
            hooks,
            coordinator,
            tools,
        }
    }

    /// Context store
    #[must_use]
    pub fn store(&self) -> &Arc<ContextStore> {
        &self.store
    }

    /// Hook bus
    #[must_use]
    pub fn hooks(&self) -> &Arc<HookBus> {
        &self.hooks
    }

    /// Guardrail engine
    #[must_use]
    pub fn guardrails(&self) -> &Arc<Guardrails> {
        &self.guardrails
    }

    /// Hand-off coordinator
    #[must_use]
    pub fn coordinator(&self) -> &Arc<HandoffCoordinator> {
        &self.coordinator
    }

    /// Start a new session; it becomes the current one
    pub fn start_session(&self, patch: ContextPatch) -> Result<SessionContext> {
        let ctx = self.store.create_with(patch)?;
        info!(session_id = %ctx.session_id(), "Session started");
        Ok(ctx)
    }

    /// Run user text through the input guardrail for the current session.
    ///
    /// Findings are recorded as a validation event before a critical one
    /// is raised.
    pub fn check_input(&self, text: &str) -> std::result::Result<Vec<Violation>, GuardrailTripwire> {
        let context = self.current_context();
        let violations = self.guardrails.validate_input(text, context.as_ref());
        self.hooks.on_validation(
            &Self::agent_of(context.as_ref()),
            "user_input",
            &violations,
            context.as_ref().map(SessionContext::session_id),
        );
        Guardrails::check_and_raise_critical(&violations)?;
        Ok(violations)
    }

    /// Invoke a tool for `agent` within the current session
    pub async fn invoke_tool(&self, agent: &str, tool: &dyn AgentTool, args: Value) -> ToolOutcome {
        let session = self.current_session_id();
        self.tools.invoke(agent, tool, args, session).await
    }

    /// Hand off from the current agent to `to_agent`.
    ///
    /// `data` is forwarded to the receiving stage after projection;
    /// `validation_data`, or `data` when it is absent or empty, is checked
    /// for the kind's required fields.
    pub fn initiate_handoff(
        &self,
        to_agent: &str,
        handoff_type: &str,
        data: &str,
        validation_data: Option<&str>,
    ) -> Result<HandoffResult> {
        info!(to = %to_agent, kind = %handoff_type, "Initiating handoff");

        let context = self.current_context();
        let from = Self::agent_of(context.as_ref());
        let kind = handoff_type.parse::<HandoffKind>().ok();
        let reject = |error: HandoffError| {
            warn!(from = %from, to = %to_agent, error = %error, "Handoff failed");
            self.hooks
                .on_error("handoff_rejected", &error.to_string(), &from, None);
            Ok(HandoffResult::rejected(from.clone(), to_agent, kind, error))
        };

        let data = match parse_object(data) {
            Some(data) => data,
            None => return reject(HandoffError::InvalidJson { parameter: "data" }),
        };
        let validation = match validation_data.map(parse_object) {
            None => Map::new(),
            Some(Some(v)) => v,
            Some(None) => {
                return reject(HandoffError::InvalidJson {
                    parameter: "validation_data",
                })
            }
        };
        let kind = match kind {
            Some(kind) => kind,
            None => {
                return reject(HandoffError::InvalidKind {
                    given: handoff_type.to_string(),
                    valid: HandoffKind::valid_names(),
                })
            }
        };

        let validation = if validation.is_empty() {
            data.clone()
        } else {
            validation
        };
        let request = HandoffRequest::new(from.clone(), to_agent, kind)
            .with_validation(validation)
            .with_data(data);

        let result = self
            .coordinator
            .create_handoff(request, context.as_ref().map(SessionContext::session_id))?;
        if result.is_accepted() {
            info!(from = %from, to = %to_agent, "Handoff successful");
        }
        Ok(result)
    }

    /// Workflow state, history, statistics and suggested next hand-offs
    pub fn handoff_status(&self) -> Result<HandoffStatus> {
        let context = self.current_context();
        let workflow_state = self
            .coordinator
            .workflow_state(context.as_ref().map(SessionContext::session_id))?;
        let handoff_history = workflow_state.handoff_chain.clone();

        let total = handoff_history.len();
        let cleared = handoff_history
            .iter()
            .filter(|h| h.security_clearance)
            .count();
        let statistics = HandoffStatistics {
            total_handoffs: total,
            cleared_handoffs: cleared,
            success_rate: if total > 0 {
                cleared as f64 / total as f64 * 100.0
            } else {
                100.0
            },
        };

        let current = context
            .as_ref()
            .and_then(|ctx| ctx.current_agent.as_deref())
            .and_then(|name| name.parse::<Participant>().ok())
            .or(workflow_state.current_agent)
            .unwrap_or(DEFAULT_AGENT);
        let available_handoffs = current
            .available_handoffs()
            .iter()
            .map(|(to, kind)| RecommendedHandoff {
                handoff_type: *kind,
                to_agent: *to,
                reason: format!("Available to {}", current),
            })
            .collect();

        let mut next_recommended_handoffs = Vec::new();
        if let Some((kind, to)) = RECOMMENDED_SEQUENCE
            .iter()
            .find(|(kind, _)| !workflow_state.workflow_state.contains_key(kind))
        {
            next_recommended_handoffs.push(RecommendedHandoff {
                handoff_type: *kind,
                to_agent: *to,
                reason: "Next step in workflow sequence".to_string(),
            });
        }
        let advanced = context
            .as_ref()
            .is_some_and(|ctx| !ctx.advanced_tests_requested.is_empty());
        if advanced
            && !workflow_state
                .workflow_state
                .contains_key(&HandoffKind::Testing)
            && !next_recommended_handoffs
                .iter()
                .any(|r| r.handoff_type == HandoffKind::Testing)
        {
            next_recommended_handoffs.push(RecommendedHandoff {
                handoff_type: HandoffKind::Testing,
                to_agent: Participant::Testing,
                reason: "Advanced testing requested".to_string(),
            });
        }

        info!(total_handoffs = total, "Handoff status retrieved");
        Ok(HandoffStatus {
            workflow_state,
            context_info: context.as_ref().map(ContextInfo::from),
            handoff_history,
            statistics,
            available_handoffs,
            next_recommended_handoffs,
        })
    }

    /// Check data for a hand-off without performing it.
    ///
    /// `valid` covers the required fields only; `ready` also needs the
    /// additional checks to pass.
    pub fn validate_handoff_data(&self, handoff_type: &str, data: &str) -> Result<DataValidationReport> {
        let invalid = |error: HandoffError, data_size: usize| DataValidationReport {
            valid: false,
            ready: false,
            handoff_type: handoff_type.to_string(),
            data_size,
            error: Some(error),
            additional_checks: None,
            recommendations: vec!["Fix validation errors and retry".to_string()],
        };

        let data = match parse_object(data) {
            Some(data) => data,
            None => return Ok(invalid(HandoffError::InvalidJson { parameter: "data" }, 0)),
        };
        let data_size = Value::Object(data.clone()).to_string().len();
        let kind = match handoff_type.parse::<HandoffKind>() {
            Ok(kind) => kind,
            Err(_) => {
                return Ok(invalid(
                    HandoffError::InvalidKind {
                        given: handoff_type.to_string(),
                        valid: HandoffKind::valid_names(),
                    },
                    data_size,
                ))
            }
        };

        let context = self.current_context();
        let fields = HandoffCoordinator::validate_data(kind, &data).err();
        let checks = self.additional_checks(kind, &data, context.as_ref())?;
        let recommendations = recommendations(kind, &data, fields.as_ref(), &checks);
        let valid = fields.is_none();
        let ready = valid && checks.valid();

        let violations: Vec<Violation> = fields
            .iter()
            .map(ToString::to_string)
            .chain(checks.errors.iter().cloned())
            .map(|message| Violation::new(ViolationCategory::InputValidation, Severity::Medium, message))
            .collect();
        self.hooks.on_validation(
            &Self::agent_of(context.as_ref()),
            &format!("handoff_data:{}", kind),
            &violations,
            context.as_ref().map(SessionContext::session_id),
        );

        if ready {
            info!(kind = %kind, "Handoff data validation passed");
        } else {
            warn!(kind = %kind, valid, "Handoff data validation failed");
        }
        Ok(DataValidationReport {
            valid,
            ready,
            handoff_type: kind.to_string(),
            data_size,
            error: fields,
            additional_checks: Some(checks),
            recommendations,
        })
    }

    fn additional_checks(
        &self,
        kind: HandoffKind,
        data: &Map<String, Value>,
        context: Option<&SessionContext>,
    ) -> Result<AdditionalChecks> {
        let mut checks = AdditionalChecks::default();

        if context.is_some_and(|ctx| ctx.current_phase == Phase::Failed) {
            checks.context_consistency = false;
            checks.errors.push("Context is in failed state".to_string());
        }

        if kind == HandoffKind::Generation && !is_truthy(data.get("plugin_spec")) {
            checks.data_completeness = false;
            checks
                .errors
                .push("Missing plugin specification for generation handoff".to_string());
        }
        if kind == HandoffKind::Compliance && !is_truthy(data.get("generated_files")) {
            checks.data_completeness = false;
            checks
                .errors
                .push("Missing generated files for compliance handoff".to_string());
        }

        let missing = self
            .coordinator
            .missing_prerequisites(kind, context.map(SessionContext::session_id))?;
        if !missing.is_empty() {
            checks.workflow_sequence = false;
            checks.errors.push(format!(
                "{} handoff requires {} to be completed first",
                capitalize(kind.as_str()),
                join_kinds(&missing)
            ));
        }

        if is_truthy(data.get("security_scan_required")) && !is_truthy(data.get("security_clearance")) {
            checks.security_clearance = false;
            checks
                .errors
                .push("Security clearance required but not provided".to_string());
        }
        match HandoffPayload::project(kind, data) {
            Ok(payload) => {
                let findings = Guardrails::scan_plugin_files(&payload.source_files())
                    .into_iter()
                    .filter(|v| v.severity.at_least(Severity::High))
                    .count();
                if findings > 0 {
                    checks.security_clearance = false;
                    checks.errors.push(format!(
                        "Carried files have {} high or critical security findings",
                        findings
                    ));
                }
            }
            Err(e) => {
                checks.data_completeness = false;
                checks.errors.push(format!("Invalid {} payload: {}", kind, e));
            }
        }

        debug!(kind = %kind, valid = checks.valid(), "Additional handoff checks done");
        Ok(checks)
    }

    /// Clear the current session's chain and current agent
    pub fn reset_workflow(&self) -> Result<WorkflowReset> {
        let session = self.current_session_id();
        let previous_state = self.coordinator.reset(session)?;

        if let Some(id) = session {
            self.store.mutate(id, |ctx| {
                ctx.current_agent = None;
                ctx.add_agent_message("System", "Workflow reset", MessageKind::Info);
            })?;
        }

        info!("Handoff workflow reset successfully");
        Ok(WorkflowReset {
            message: "Handoff workflow reset successfully".to_string(),
            previous_state,
            reset_at: Utc::now(),
        })
    }

    /// Performance overview from the hook bus
    #[must_use]
    pub fn performance_metrics(&self) -> PerformanceMetrics {
        self.hooks.performance_metrics()
    }

    /// Metrics of a session, the current one by default.
    ///
    /// `None` when there is no such session or it has no events yet.
    pub fn session_metrics(&self, session: Option<Uuid>) -> Result<Option<SessionMetricsReport>> {
        let id = match session.or(self.store.current_id()?) {
            Some(id) => id,
            None => return Ok(None),
        };
        let metrics = match self.hooks.session_metrics(id) {
            Some(metrics) => metrics,
            None => return Ok(None),
        };
        let context = self.store.get(Some(id))?;
        Ok(Some(SessionMetricsReport {
            metrics,
            context: context.as_ref().map(SessionDetails::from),
        }))
    }

    /// Breakdown of failed events
    #[must_use]
    pub fn error_analysis(&self) -> ErrorAnalysis {
        self.hooks.error_analysis()
    }

    /// Composite health
    #[must_use]
    pub fn health_status(&self) -> HealthStatus {
        self.hooks.health_status()
    }

    fn current_context(&self) -> Option<SessionContext> {
        match self.store.current() {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!(error = %e, "Could not read current session");
                None
            }
        }
    }

    fn current_session_id(&self) -> Option<Uuid> {
        self.current_context().map(|ctx| ctx.session_id())
    }

    fn agent_of(context: Option<&SessionContext>) -> String {
        context
            .and_then(|ctx| ctx.current_agent.clone())
            .unwrap_or_else(|| DEFAULT_AGENT.name().to_string())
    }
}

/// Parse JSON object text; blank text is an empty object
fn parse_object(text: &str) -> Option<Map<String, Value>> {
    if text.trim().is_empty() {
        return Some(Map::new());
    }
    match serde_json::from_str(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn recommendations(
    kind: HandoffKind,
    data: &Map<String, Value>,
    fields: Option<&HandoffError>,
    checks: &AdditionalChecks,
) -> Vec<String> {
    let mut out = Vec::new();

    if let Some(e) = fields {
        out.push(format!("Fix data validation errors: {}", e));
    }
    out.extend(checks.errors.iter().map(|e| format!("Address: {}", e)));

    match kind {
        HandoffKind::Generation if !is_truthy(data.get("features")) => {
            out.push("Ensure plugin features are clearly defined".to_string());
        }
        HandoffKind::Compliance if !is_truthy(data.get("file_paths")) => {
            out.push("Provide file paths for compliance checking".to_string());
        }
        HandoffKind::Testing if !is_truthy(data.get("test_requirements")) => {
            out.push("Define specific testing requirements".to_string());
        }
        _ => {}
    }

    if out.is_empty() {
        out.push("Data validation passed - ready for handoff".to_string());
    }
    out
}
