use super::kind::HandoffKind;
use super::participant::Participant;
use super::payload::FilteredPayload;
use crate::context::ErrorRecord;
use crate::error::UserFriendlyError;
use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// Why a hand-off was refused.
///
/// These are contract failures the driver can fix by correcting its call;
/// they travel inside [`HandoffResult::Rejected`] and are never raised.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HandoffError {
    /// One of the stage names is not a known participant
    #[error("Invalid agent names: {from} → {to}")]
    InvalidParticipant {
        /// Sending stage as given
        from: String,
        /// Receiving stage as given
        to: String,
    },

    /// A prerequisite kind has not been recorded yet
    #[error("Handoff {kind} requires {requires} to be completed first")]
    OutOfSequence {
        /// Requested kind
        kind: HandoffKind,
        /// Missing prerequisite kinds, joined with "and"
        requires: String,
    },

    /// The validation payload lacks required fields
    #[error("Missing required fields for {kind}: {}", .fields.join(", "))]
    MissingFields {
        /// Requested kind
        kind: HandoffKind,
        /// Absent field names, in declaration order
        fields: Vec<String>,
    },

    /// The session is in the failed phase
    #[error("Cannot perform handoff in failed state")]
    FailedState,

    /// A kept payload key has the wrong shape
    #[error("Invalid {kind} payload: {message}")]
    InvalidPayload {
        /// Requested kind
        kind: HandoffKind,
        /// Deserializer message
        message: String,
    },

    /// The session id is not known to the context store
    #[error("Session not found: {0}")]
    UnknownSession(Uuid),

    /// A JSON parameter could not be parsed as an object
    #[error("Invalid JSON in {parameter} parameter")]
    InvalidJson {
        /// Parameter name
        parameter: &'static str,
    },

    /// The kind name is not in the closed vocabulary
    #[error("Invalid handoff type: {given} (valid: {valid})")]
    InvalidKind {
        /// Name that was supplied
        given: String,
        /// Comma separated list of accepted names
        valid: String,
    },
}

impl UserFriendlyError for HandoffError {
    fn user_message(&self) -> String {
        format!("🔀 {}", self)
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            HandoffError::InvalidParticipant { .. } => Some(format!(
                "💡 Use one of: {}.",
                Participant::ALL.map(|p| p.name()).join(", ")
            )),
            HandoffError::OutOfSequence { requires, .. } => {
                Some(format!("💡 Record the {} hand-off first.", requires))
            }
            HandoffError::MissingFields { fields, .. } => {
                Some(format!("💡 Add {} to the validation payload.", fields.join(", ")))
            }
            HandoffError::FailedState => {
                Some("💡 Start a new session or reset the failed phase.".to_string())
            }
            HandoffError::InvalidKind { valid, .. } => Some(format!("💡 Use one of: {}.", valid)),
            _ => None,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            HandoffError::InvalidParticipant { .. } => "invalid_agent",
            HandoffError::OutOfSequence { .. } => "out_of_sequence",
            HandoffError::MissingFields { .. } => "missing_fields",
            HandoffError::FailedState => "failed_state",
            HandoffError::InvalidPayload { .. } => "invalid_payload",
            HandoffError::UnknownSession(_) => "session_not_found",
            HandoffError::InvalidJson { .. } => "invalid_json",
            HandoffError::InvalidKind { .. } => "invalid_handoff_type",
        }
    }
}

impl Serialize for HandoffError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("HandoffError", 2)?;
        state.serialize_field("error_type", self.error_type())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// A request to move control from one stage to another
#[derive(Debug, Clone, PartialEq)]
pub struct HandoffRequest {
    /// Sending stage name
    pub from: String,
    /// Receiving stage name
    pub to: String,
    /// Hand-off kind
    pub kind: HandoffKind,
    /// Data checked for required fields; `None` or empty skips the check
    pub validation: Option<Map<String, Value>>,
    /// Data projected onto the receiving stage's payload
    pub data: Map<String, Value>,
}

impl HandoffRequest {
    /// Request without payloads
    pub fn new(from: impl Into<String>, to: impl Into<String>, kind: HandoffKind) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            kind,
            validation: None,
            data: Map::new(),
        }
    }

    /// Set the validation payload
    #[must_use]
    pub fn with_validation(mut self, validation: Map<String, Value>) -> Self {
        self.validation = Some(validation);
        self
    }

    /// Set the forwarded data
    #[must_use]
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }
}

/// Checks a recorded hand-off passed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationSnapshot {
    /// Recorded kinds that unlocked this one, empty for first-eligible kinds
    pub satisfied_by: Vec<HandoffKind>,
    /// Required fields that were checked, empty when the check was skipped
    pub checked_fields: Vec<&'static str>,
    /// Outcome text
    pub message: String,
}

/// One accepted hand-off. Never changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandoffRecord {
    id: usize,
    from: Participant,
    to: Participant,
    kind: HandoffKind,
    timestamp: DateTime<Utc>,
    session_id: Option<Uuid>,
    payload: FilteredPayload,
    validation: ValidationSnapshot,
    previous_errors: Vec<ErrorRecord>,
    security_clearance: bool,
}

impl HandoffRecord {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        id: usize,
        from: Participant,
        to: Participant,
        kind: HandoffKind,
        session_id: Option<Uuid>,
        payload: FilteredPayload,
        validation: ValidationSnapshot,
        previous_errors: Vec<ErrorRecord>,
        security_clearance: bool,
    ) -> Self {
        Self {
            id,
            from,
            to,
            kind,
            timestamp: Utc::now(),
            session_id,
            payload,
            validation,
            previous_errors,
            security_clearance,
        }
    }

    /// Position in the chain
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Sending stage
    #[must_use]
    pub fn from(&self) -> Participant {
        self.from
    }

    /// Receiving stage
    #[must_use]
    pub fn to(&self) -> Participant {
        self.to
    }

    /// Hand-off kind
    #[must_use]
    pub fn kind(&self) -> HandoffKind {
        self.kind
    }

    /// When it was recorded
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Session it belonged to, if any
    #[must_use]
    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    /// Filtered payload as delivered
    #[must_use]
    pub fn payload(&self) -> &FilteredPayload {
        &self.payload
    }

    /// Checks that passed
    #[must_use]
    pub fn validation(&self) -> &ValidationSnapshot {
        &self.validation
    }

    /// Last five session errors at hand-off time
    #[must_use]
    pub fn previous_errors(&self) -> &[ErrorRecord] {
        &self.previous_errors
    }

    /// No high or critical findings in the carried source files
    #[must_use]
    pub fn security_clearance(&self) -> bool {
        self.security_clearance
    }
}

/// History row for one recorded hand-off
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffSummary {
    /// Position in the chain
    pub id: usize,
    /// Sending stage
    pub from_agent: Participant,
    /// Receiving stage
    pub to_agent: Participant,
    /// Hand-off kind
    pub handoff_type: HandoffKind,
    /// When it was recorded
    pub timestamp: DateTime<Utc>,
    /// Serialized payload length
    pub data_size: usize,
    /// See [`HandoffRecord::security_clearance`]
    pub security_clearance: bool,
    /// Errors carried over from the session
    pub previous_errors: usize,
}

impl From<&HandoffRecord> for HandoffSummary {
    fn from(r: &HandoffRecord) -> Self {
        Self {
            id: r.id,
            from_agent: r.from,
            to_agent: r.to,
            handoff_type: r.kind,
            timestamp: r.timestamp,
            data_size: r.payload.data_size(),
            security_clearance: r.security_clearance,
            previous_errors: r.previous_errors.len(),
        }
    }
}

/// Completion flag of one kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindCompletion {
    /// Always true once present
    pub completed: bool,
    /// Stage that handed off
    pub agent: Participant,
    /// When
    pub timestamp: DateTime<Utc>,
}

/// Snapshot of the coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Stage that received the last hand-off
    pub current_agent: Option<Participant>,
    /// Length of the chain
    pub completed_handoffs: usize,
    /// Completion per kind
    pub workflow_state: BTreeMap<HandoffKind, KindCompletion>,
    /// The chain as history rows
    pub handoff_chain: Vec<HandoffSummary>,
}

/// A hand-off that passed validation and was recorded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandoffAccepted {
    /// Position in the chain
    pub handoff_id: usize,
    /// Sending stage
    pub from_agent: Participant,
    /// Receiving stage
    pub to_agent: Participant,
    /// Hand-off kind
    pub handoff_type: HandoffKind,
    /// What the receiving stage gets
    pub filtered_data: FilteredPayload,
    /// Instructions for the receiving stage
    pub instructions: String,
    /// See [`HandoffRecord::security_clearance`]
    pub security_clearance: bool,
}

/// A hand-off that failed validation; nothing was recorded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandoffRejected {
    /// Sending stage as given
    pub from_agent: String,
    /// Receiving stage as given
    pub to_agent: String,
    /// Requested kind, when it parsed
    pub handoff_type: Option<HandoffKind>,
    /// Reason
    pub error: HandoffError,
}

/// Outcome of a hand-off attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HandoffResult {
    /// Recorded
    Accepted(HandoffAccepted),
    /// Refused
    Rejected(HandoffRejected),
}

impl HandoffResult {
    pub(crate) fn rejected(
        from: impl Into<String>,
        to: impl Into<String>,
        kind: Option<HandoffKind>,
        error: HandoffError,
    ) -> Self {
        HandoffResult::Rejected(HandoffRejected {
            from_agent: from.into(),
            to_agent: to.into(),
            handoff_type: kind,
            error,
        })
    }

    /// Whether the hand-off was recorded
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, HandoffResult::Accepted(_))
    }

    /// Accepted details, if any
    #[must_use]
    pub fn accepted(&self) -> Option<&HandoffAccepted> {
        match self {
            HandoffResult::Accepted(a) => Some(a),
            HandoffResult::Rejected(_) => None,
        }
    }

    /// Rejection reason, if any
    #[must_use]
    pub fn error(&self) -> Option<&HandoffError> {
        match self {
            HandoffResult::Accepted(_) => None,
            HandoffResult::Rejected(r) => Some(&r.error),
        }
    }
}
