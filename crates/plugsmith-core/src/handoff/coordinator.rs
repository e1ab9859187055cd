//! Handoff Coordinator
//!
//! Gates every transfer of control between stages and keeps the ordered,
//! append-only chain of accepted hand-offs.

use super::kind::HandoffKind;
use super::participant::Participant;
use super::payload::{ContextSummary, FilteredPayload, HandoffPayload};
use super::record::{
    HandoffAccepted, HandoffError, HandoffRecord, HandoffRequest, HandoffResult, HandoffSummary,
    KindCompletion, ValidationSnapshot, WorkflowState,
};
use crate::context::{ContextStore, MessageKind, Phase, SessionContext};
use crate::error::{handle_lock_poison, Result};
use crate::guardrails::{Guardrails, Severity};
use crate::hooks::HookBus;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

/// Errors copied into each record
const PREVIOUS_ERRORS_WINDOW: usize = 5;

#[derive(Debug, Default)]
struct CoordinatorState {
    chain: Vec<HandoffRecord>,
    current_agent: Option<Participant>,
    completed: BTreeMap<HandoffKind, KindCompletion>,
}

impl CoordinatorState {
    fn recorded_kinds(&self) -> Vec<HandoffKind> {
        self.chain.iter().map(HandoffRecord::kind).collect()
    }

    fn snapshot(&self) -> WorkflowState {
        WorkflowState {
            current_agent: self.current_agent,
            completed_handoffs: self.chain.len(),
            workflow_state: self.completed.clone(),
            handoff_chain: self.chain.iter().map(HandoffSummary::from).collect(),
        }
    }
}

/// Validates, records and announces hand-offs.
///
/// Each session has its own chain; hand-offs made without a session share
/// the `None` chain. The chain lock is taken before the context store lock
/// and released before the hook bus is notified.
#[derive(Debug)]
pub struct HandoffCoordinator {
    store: Arc<ContextStore>,
    hooks: Arc<HookBus>,
    state: RwLock<HashMap<Option<Uuid>, CoordinatorState>>,
}

impl HandoffCoordinator {
    /// Create a coordinator with an empty chain
    #[must_use]
    pub fn new(store: Arc<ContextStore>, hooks: Arc<HookBus>) -> Self {
        Self {
            store,
            hooks,
            state: RwLock::new(HashMap::new()),
        }
    }

    /// Validate and record a hand-off.
    ///
    /// Checks run in order and stop at the first failure: participants,
    /// sequence, required fields, session state, payload shape. Sequence
    /// and session state are only checked when a session is given. A refused
    /// hand-off leaves the chain and the session untouched and comes back
    /// as [`HandoffResult::Rejected`]. `Err` is reserved for lock and
    /// persistence failures.
    pub fn create_handoff(
        &self,
        request: HandoffRequest,
        session: Option<Uuid>,
    ) -> Result<HandoffResult> {
        let mut sessions = self.state.write().map_err(handle_lock_poison)?;

        let context = match session {
            Some(id) => match self.store.get(Some(id))? {
                Some(ctx) => Some(ctx),
                None => {
                    drop(sessions);
                    return Ok(self.reject(&request, HandoffError::UnknownSession(id)));
                }
            },
            None => None,
        };

        let recorded = sessions
            .get(&session)
            .map(CoordinatorState::recorded_kinds)
            .unwrap_or_default();
        let checked = match Self::validate(&request, &recorded, context.as_ref()) {
            Ok(checked) => checked,
            Err(e) => {
                drop(sessions);
                return Ok(self.reject(&request, e));
            }
        };

        let instructions = Self::instructions(request.kind, context.as_ref(), &checked.payload);
        let files = checked.payload.payload.source_files();
        let security_clearance = Guardrails::scan_plugin_files(&files)
            .iter()
            .all(|v| !v.severity.at_least(Severity::High));
        if !security_clearance {
            warn!(kind = %request.kind, "Hand-off payload carries high severity findings");
        }

        if let Some(id) = session {
            let (from, to, kind) = (checked.from, checked.to, request.kind);
            self.store.mutate(id, |ctx| {
                ctx.current_agent = Some(to.name().to_string());
                ctx.add_agent_message(
                    from.name(),
                    format!("Handing off to {} for {}", to, kind),
                    MessageKind::Handoff,
                );
            })?;
        }

        let previous_errors = context
            .as_ref()
            .map(|ctx| ctx.recent_errors(PREVIOUS_ERRORS_WINDOW).to_vec())
            .unwrap_or_default();
        let state = sessions.entry(session).or_default();
        let handoff_id = state.chain.len();
        let record = HandoffRecord::new(
            handoff_id,
            checked.from,
            checked.to,
            request.kind,
            session,
            checked.payload.clone(),
            checked.snapshot,
            previous_errors,
            security_clearance,
        );
        state.completed.insert(
            request.kind,
            KindCompletion {
                completed: true,
                agent: checked.from,
                timestamp: record.timestamp(),
            },
        );
        state.chain.push(record);
        state.current_agent = Some(checked.to);
        drop(sessions);

        self.hooks.on_handoff(
            checked.from.name(),
            checked.to.name(),
            Some(request.kind.as_str()),
            session,
        );
        info!(
            from = %checked.from,
            to = %checked.to,
            kind = %request.kind,
            handoff_id,
            "Handoff created"
        );

        Ok(HandoffResult::Accepted(HandoffAccepted {
            handoff_id,
            from_agent: checked.from,
            to_agent: checked.to,
            handoff_type: request.kind,
            filtered_data: checked.payload,
            instructions,
            security_clearance,
        }))
    }

    fn validate(
        request: &HandoffRequest,
        recorded: &[HandoffKind],
        context: Option<&SessionContext>,
    ) -> std::result::Result<Checked, HandoffError> {
        let kind = request.kind;

        let (from, to) = match (
            request.from.parse::<Participant>(),
            request.to.parse::<Participant>(),
        ) {
            (Ok(from), Ok(to)) => (from, to),
            _ => {
                return Err(HandoffError::InvalidParticipant {
                    from: request.from.clone(),
                    to: request.to.clone(),
                })
            }
        };

        if context.is_some() {
            let missing = kind.missing_prerequisites(recorded);
            if !missing.is_empty() {
                return Err(HandoffError::OutOfSequence {
                    kind,
                    requires: join_kinds(&missing),
                });
            }
        }

        let checked_fields = match request.validation.as_ref().filter(|v| !v.is_empty()) {
            Some(validation) => {
                Self::check_required(kind, validation)?;
                kind.required_fields().to_vec()
            }
            None => Vec::new(),
        };

        if context.is_some_and(|ctx| ctx.current_phase == Phase::Failed) {
            return Err(HandoffError::FailedState);
        }

        let payload = HandoffPayload::project(kind, &request.data).map_err(|e| {
            HandoffError::InvalidPayload {
                kind,
                message: e.to_string(),
            }
        })?;

        Ok(Checked {
            from,
            to,
            payload: FilteredPayload {
                context: context.map(ContextSummary::from),
                payload,
            },
            snapshot: ValidationSnapshot {
                satisfied_by: kind
                    .prerequisites()
                    .iter()
                    .filter(|k| recorded.contains(k))
                    .copied()
                    .collect(),
                checked_fields,
                message: "Handoff validation passed".to_string(),
            },
        })
    }

    fn check_required(
        kind: HandoffKind,
        data: &Map<String, Value>,
    ) -> std::result::Result<(), HandoffError> {
        let missing: Vec<String> = kind
            .required_fields()
            .iter()
            .filter(|field| !data.contains_key(**field))
            .map(|field| field.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(HandoffError::MissingFields {
                kind,
                fields: missing,
            })
        }
    }

    fn instructions(
        kind: HandoffKind,
        context: Option<&SessionContext>,
        payload: &FilteredPayload,
    ) -> String {
        let mut instruction = kind.base_instruction().to_string();

        if let Some(ctx) = context {
            if !ctx.errors().is_empty() {
                instruction.push_str(&format!(
                    "\n\nNote: Previous errors encountered: {} issues. Please address these patterns.",
                    ctx.errors().len()
                ));
            }
            if !ctx.advanced_tests_requested.is_empty() {
                instruction.push_str(&format!(
                    "\n\nAdvanced testing requested: {}",
                    ctx.advanced_tests_requested.join(", ")
                ));
            }
        }

        let requirements = payload.payload.requirement_count();
        if requirements > 0 {
            instruction.push_str(&format!(
                "\n\nSpecific requirements: {} items to address.",
                requirements
            ));
        }
        instruction
    }

    fn reject(&self, request: &HandoffRequest, error: HandoffError) -> HandoffResult {
        warn!(
            from = %request.from,
            to = %request.to,
            kind = %request.kind,
            error = %error,
            "Handoff validation failed"
        );
        self.hooks
            .on_error("handoff_rejected", &error.to_string(), &request.from, None);
        HandoffResult::rejected(
            request.from.clone(),
            request.to.clone(),
            Some(request.kind),
            error,
        )
    }

    /// Check a payload against the required fields of `kind`, even when empty
    pub fn validate_data(
        kind: HandoffKind,
        data: &Map<String, Value>,
    ) -> std::result::Result<(), HandoffError> {
        Self::check_required(kind, data)
    }

    /// Whether the session's chain allows `kind` next.
    ///
    /// Always true without a session, matching `create_handoff`.
    pub fn check_sequence(&self, kind: HandoffKind, session: Option<Uuid>) -> Result<bool> {
        Ok(self.missing_prerequisites(kind, session)?.is_empty())
    }

    /// Prerequisites of `kind` the session's chain still lacks
    pub fn missing_prerequisites(
        &self,
        kind: HandoffKind,
        session: Option<Uuid>,
    ) -> Result<Vec<HandoffKind>> {
        if session.is_none() {
            return Ok(Vec::new());
        }
        self.read_session(session, |state| {
            kind.missing_prerequisites(&state.recorded_kinds())
        })
    }

    /// History rows of a session, oldest first
    pub fn history(&self, session: Option<Uuid>) -> Result<Vec<HandoffSummary>> {
        self.read_session(session, |state| {
            state.chain.iter().map(HandoffSummary::from).collect()
        })
    }

    /// Full records of a session, oldest first
    pub fn records(&self, session: Option<Uuid>) -> Result<Vec<HandoffRecord>> {
        self.read_session(session, |state| state.chain.clone())
    }

    /// Kinds a session has recorded so far, in workflow order
    pub fn completed_kinds(&self, session: Option<Uuid>) -> Result<Vec<HandoffKind>> {
        self.read_session(session, |state| state.completed.keys().copied().collect())
    }

    /// Current agent, per-kind completion and the chain of a session
    pub fn workflow_state(&self, session: Option<Uuid>) -> Result<WorkflowState> {
        self.read_session(session, CoordinatorState::snapshot)
    }

    /// Clear a session's chain and current agent; returns the state before the reset
    pub fn reset(&self, session: Option<Uuid>) -> Result<WorkflowState> {
        let mut sessions = self.state.write().map_err(handle_lock_poison)?;
        let previous = sessions
            .remove(&session)
            .unwrap_or_default()
            .snapshot();
        info!(
            session_id = ?session,
            cleared = previous.completed_handoffs,
            "Workflow state reset"
        );
        Ok(previous)
    }

    fn read_session<T>(
        &self,
        session: Option<Uuid>,
        f: impl FnOnce(&CoordinatorState) -> T,
    ) -> Result<T> {
        let sessions = self.state.read().map_err(handle_lock_poison)?;
        Ok(match sessions.get(&session) {
            Some(state) => f(state),
            None => f(&CoordinatorState::default()),
        })
    }
}

/// Kind names joined with "and"
pub(crate) fn join_kinds(kinds: &[HandoffKind]) -> String {
    kinds
        .iter()
        .map(HandoffKind::as_str)
        .collect::<Vec<_>>()
        .join(" and ")
}

struct Checked {
    from: Participant,
    to: Participant,
    payload: FilteredPayload,
    snapshot: ValidationSnapshot,
}
