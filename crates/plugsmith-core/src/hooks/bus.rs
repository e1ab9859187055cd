use super::types::{HookEvent, HookKind};
use crate::config::HookConfig;
use crate::context::{ContextStore, MessageKind, Phase, SessionContext};
use crate::guardrails::{Guardrails, OutputKind, Severity, Violation};
use crate::tools::ToolOutput;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Observer invoked for every event of the kind it was registered for
pub type HookCallback = Arc<dyn Fn(&HookEvent) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
pub(super) struct HookState {
    pub(super) events: Vec<HookEvent>,
    pub(super) agent_durations: HashMap<String, VecDeque<f64>>,
    pub(super) tool_durations: HashMap<String, VecDeque<f64>>,
    pub(super) error_counts: HashMap<String, usize>,
    pub(super) agent_runs: HashMap<String, usize>,
    active: HashMap<String, Instant>,
}

/// Event log, callback registry and broadcast channel for lifecycle events.
///
/// Each `on_*` method updates the session (when one is given), appends an
/// event and notifies observers. None of them fail: telemetry problems are
/// logged and the workflow carries on.
pub struct HookBus {
    pub(super) config: HookConfig,
    store: Arc<ContextStore>,
    guardrails: Arc<Guardrails>,
    pub(super) state: RwLock<HookState>,
    callbacks: RwLock<HashMap<HookKind, Vec<HookCallback>>>,
    sender: broadcast::Sender<HookEvent>,
}

impl std::fmt::Debug for HookBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookBus")
            .field("config", &self.config)
            .field("events", &self.read_state().events.len())
            .finish_non_exhaustive()
    }
}

impl HookBus {
    /// Create a bus without callbacks
    #[must_use]
    pub fn new(config: HookConfig, store: Arc<ContextStore>, guardrails: Arc<Guardrails>) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            config,
            store,
            guardrails,
            state: RwLock::new(HookState::default()),
            callbacks: RwLock::new(HashMap::new()),
            sender,
        }
    }

    /// Create a bus with the slow-agent and security-alert callbacks installed
    #[must_use]
    pub fn with_default_callbacks(
        config: HookConfig,
        store: Arc<ContextStore>,
        guardrails: Arc<Guardrails>,
    ) -> Self {
        let bus = Self::new(config, store, guardrails);
        bus.install_default_callbacks();
        bus
    }

    /// Register the slow-agent warning and the security alert
    pub fn install_default_callbacks(&self) {
        let threshold = self.config.slow_agent_secs;
        self.register_callback(HookKind::AgentEnd, move |event| {
            if let Some(duration) = event.duration_secs.filter(|d| *d > threshold) {
                warn!(
                    agent = %event.agent_name,
                    duration_secs = duration,
                    "Slow agent execution"
                );
            }
            Ok(())
        });
        self.register_callback(HookKind::SecurityCheck, |event| {
            if !event.success {
                error!(
                    agent = %event.agent_name,
                    tool = event.tool_name.as_deref().unwrap_or("unknown"),
                    "Security violation detected"
                );
            }
            Ok(())
        });
    }

    /// Register an observer for one event kind
    pub fn register_callback<F>(&self, kind: HookKind, callback: F)
    where
        F: Fn(&HookEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push(Arc::new(callback));
        debug!(kind = %kind, "Registered hook callback");
    }

    /// Subscribe to every future event
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HookEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Tools whose results are security checked
    #[must_use]
    pub fn is_watched_tool(&self, tool: &str) -> bool {
        self.config.watched_tools.iter().any(|t| t == tool)
    }

    /// An agent began running
    pub fn on_agent_start(&self, agent: &str, session: Option<Uuid>) {
        self.write_state()
            .active
            .insert(agent.to_string(), Instant::now());

        let phase = self.touch_session(session, |ctx| {
            ctx.current_agent = Some(agent.to_string());
            ctx.add_agent_message(agent, "Agent started", MessageKind::Info);
        });

        self.record(HookEvent::new(HookKind::AgentStart, agent).with_session(session, phase));
        info!(agent = %agent, "Agent started");
    }

    /// An agent finished
    pub fn on_agent_end(
        &self,
        agent: &str,
        success: bool,
        error: Option<&str>,
        session: Option<Uuid>,
    ) {
        let (duration, average) = {
            let mut state = self.write_state();
            let duration = state
                .active
                .remove(agent)
                .map(|started| started.elapsed().as_secs_f64());
            if let Some(d) = duration {
                push_sample(
                    &mut state.agent_durations,
                    agent,
                    d,
                    self.config.max_samples_per_series,
                );
            }
            *state.agent_runs.entry(agent.to_string()).or_insert(0) += 1;
            if !success && error.is_some() {
                *state.error_counts.entry(agent.to_string()).or_insert(0) += 1;
            }
            let average = state
                .agent_durations
                .get(agent)
                .filter(|s| !s.is_empty())
                .map(|s| s.iter().sum::<f64>() / s.len() as f64)
                .unwrap_or(0.0);
            (duration, average)
        };

        let phase = self.touch_session(session, |ctx| {
            if success {
                ctx.add_agent_message(agent, "Agent completed successfully", MessageKind::Success);
            } else {
                ctx.add_agent_message(
                    agent,
                    format!("Agent failed: {}", error.unwrap_or("unknown error")),
                    MessageKind::Error,
                );
            }
            if let Some(e) = error {
                ctx.add_error("agent_execution", e, Some(agent));
            }
        });

        self.record(
            HookEvent::new(HookKind::AgentEnd, agent)
                .with_duration(duration)
                .with_outcome(success, error)
                .with_session(session, phase)
                .with_meta("performance_avg", average),
        );

        if success {
            info!(agent = %agent, duration_secs = ?duration, "Agent ended");
        } else {
            error!(agent = %agent, error = error.unwrap_or("unknown error"), "Agent failed");
        }
    }

    /// A tool call began
    pub fn on_tool_start(&self, tool: &str, agent: &str, session: Option<Uuid>) {
        self.write_state()
            .active
            .insert(operation_key(agent, tool), Instant::now());

        let phase = self.touch_session(session, |ctx| {
            ctx.add_agent_message(agent, format!("Using tool: {}", tool), MessageKind::Info);
        });

        self.record(
            HookEvent::new(HookKind::ToolStart, agent)
                .with_tool(tool)
                .with_session(session, phase),
        );
        debug!(tool = %tool, agent = %agent, "Tool started");
    }

    /// A tool call finished.
    ///
    /// Successful results of watched tools are security checked before the
    /// tool-end event is recorded.
    pub fn on_tool_end(
        &self,
        tool: &str,
        agent: &str,
        success: bool,
        error: Option<&str>,
        result: Option<&ToolOutput>,
        session: Option<Uuid>,
    ) {
        let key = operation_key(agent, tool);
        let duration = {
            let mut state = self.write_state();
            let duration = state
                .active
                .remove(&key)
                .map(|started| started.elapsed().as_secs_f64());
            if let Some(d) = duration {
                push_sample(
                    &mut state.tool_durations,
                    &key,
                    d,
                    self.config.max_samples_per_series,
                );
            }
            duration
        };

        let phase = self.touch_session(session, |ctx| {
            if success {
                ctx.add_agent_message(agent, format!("Tool {} completed", tool), MessageKind::Success);
            } else {
                ctx.add_agent_message(
                    agent,
                    format!("Tool {} failed: {}", tool, error.unwrap_or("unknown error")),
                    MessageKind::Error,
                );
            }
            if let Some(e) = error {
                ctx.add_error("tool_execution", e, Some(agent));
            }
        });

        if success && self.is_watched_tool(tool) {
            if let Some(output) = result {
                self.on_security_check(tool, agent, output, session);
            }
        }

        let result_size = result.map(ToolOutput::size).unwrap_or(0);
        self.record(
            HookEvent::new(HookKind::ToolEnd, agent)
                .with_tool(tool)
                .with_duration(duration)
                .with_outcome(success, error)
                .with_session(session, phase)
                .with_meta("result_size", result_size),
        );

        if success {
            debug!(tool = %tool, duration_secs = ?duration, "Tool ended");
        } else {
            error!(tool = %tool, agent = %agent, error = error.unwrap_or("unknown error"), "Tool failed");
        }
    }

    /// Control moved from one agent to another
    pub fn on_handoff(&self, from: &str, to: &str, handoff_type: Option<&str>, session: Option<Uuid>) {
        let phase = self.touch_session(session, |ctx| {
            ctx.current_agent = Some(to.to_string());
            ctx.add_agent_message(from, format!("Handing off to {}", to), MessageKind::Info);
        });

        let mut event = HookEvent::new(HookKind::Handoff, from)
            .with_session(session, phase)
            .with_meta("to_agent", to);
        if let Some(kind) = handoff_type {
            event = event.with_meta("handoff_type", kind);
        }
        self.record(event);
        info!(from = %from, to = %to, "Handoff");
    }

    /// An error was reported by a component or agent
    pub fn on_error(&self, error_type: &str, message: &str, agent: &str, session: Option<Uuid>) {
        let phase = self.touch_session(session, |ctx| {
            ctx.add_error(error_type, message, Some(agent));
        });

        self.record(
            HookEvent::new(HookKind::Error, agent)
                .with_outcome(false, Some(message))
                .with_session(session, phase)
                .with_meta("error_type", error_type),
        );
        error!(agent = %agent, error_type = %error_type, "{}", message);
    }

    /// Content went through a guardrail check
    pub fn on_validation(
        &self,
        agent: &str,
        subject: &str,
        violations: &[Violation],
        session: Option<Uuid>,
    ) {
        let summary = Guardrails::violations_summary(violations);
        let phase = self.touch_session(session, |_| ());

        let mut event = HookEvent::new(HookKind::Validation, agent)
            .with_outcome(violations.is_empty(), None)
            .with_session(session, phase)
            .with_meta("subject", subject)
            .with_meta("violations_count", violations.len());
        if let Ok(value) = serde_json::to_value(summary) {
            event = event.with_meta("severity_summary", value);
        }
        self.record(event);
        debug!(agent = %agent, subject = %subject, violations = violations.len(), "Validation recorded");
    }

    /// Run a tool result through the output validator.
    ///
    /// Findings are written to the session's error ledger. Returns the
    /// number of findings; never fails.
    pub fn on_security_check(
        &self,
        tool: &str,
        agent: &str,
        content: &ToolOutput,
        session: Option<Uuid>,
    ) -> usize {
        let violations = self.scan_output(tool, content);

        let phase = self.touch_session(session, |ctx| {
            for v in &violations {
                ctx.add_error("security_violation", v.message.clone(), Some(agent));
            }
        });

        self.record(
            HookEvent::new(HookKind::SecurityCheck, agent)
                .with_tool(tool)
                .with_outcome(violations.is_empty(), None)
                .with_session(session, phase)
                .with_meta("violations_count", violations.len()),
        );

        if violations.iter().any(|v| v.severity == Severity::Critical) {
            error!(tool = %tool, count = violations.len(), "Critical security violations in tool output");
        } else if !violations.is_empty() {
            warn!(tool = %tool, count = violations.len(), "Security violations in tool output");
        } else {
            debug!(tool = %tool, "Security check passed");
        }
        violations.len()
    }

    fn scan_output(&self, tool: &str, content: &ToolOutput) -> Vec<Violation> {
        match content {
            ToolOutput::Text(text) => self.guardrails.validate_output(text, OutputKind::Code),
            ToolOutput::Files(files) => match serde_json::to_string(files) {
                Ok(json) => self.guardrails.validate_output(&json, OutputKind::PluginFiles),
                Err(e) => {
                    warn!(tool = %tool, error = %e, "Could not serialize tool output for security check");
                    Vec::new()
                }
            },
            ToolOutput::Structured(Value::String(text)) => {
                self.guardrails.validate_output(text, OutputKind::Code)
            }
            ToolOutput::Structured(value)
                if value
                    .as_array()
                    .is_some_and(|items| items.iter().all(Value::is_object)) =>
            {
                self.guardrails
                    .validate_output(&value.to_string(), OutputKind::PluginFiles)
            }
            ToolOutput::Structured(_) => {
                debug!(tool = %tool, "Structured tool output has no scannable shape");
                Vec::new()
            }
        }
    }

    /// Apply `f` to the session and return its phase afterwards
    fn touch_session(
        &self,
        session: Option<Uuid>,
        f: impl FnOnce(&mut SessionContext),
    ) -> Option<Phase> {
        let id = session?;
        match self.store.mutate(id, |ctx| {
            f(ctx);
            ctx.current_phase
        }) {
            Ok(phase) => Some(phase),
            Err(e) => {
                warn!(session_id = %id, error = %e, "Hook could not update session context");
                self.store
                    .get(Some(id))
                    .ok()
                    .flatten()
                    .map(|ctx| ctx.current_phase)
            }
        }
    }

    fn record(&self, event: HookEvent) {
        self.write_state().events.push(event.clone());
        let _ = self.sender.send(event.clone());
        self.trigger_callbacks(&event);
    }

    fn trigger_callbacks(&self, event: &HookEvent) {
        let callbacks: Vec<HookCallback> = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event.kind)
            .cloned()
            .unwrap_or_default();

        for callback in callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(kind = %event.kind, error = %e, "Hook callback failed");
                }
                Err(_) => {
                    error!(kind = %event.kind, "Hook callback panicked");
                }
            }
        }
    }

    pub(super) fn read_state(&self) -> RwLockReadGuard<'_, HookState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn write_state(&self) -> RwLockWriteGuard<'_, HookState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn operation_key(agent: &str, tool: &str) -> String {
    format!("{}:{}", agent, tool)
}

fn push_sample(series: &mut HashMap<String, VecDeque<f64>>, key: &str, value: f64, cap: usize) {
    let samples = series.entry(key.to_string()).or_default();
    samples.push_back(value);
    while samples.len() > cap.max(1) {
        samples.pop_front();
    }
}
