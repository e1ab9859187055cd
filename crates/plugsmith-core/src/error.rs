//! Error types for plugsmith-core
//!
//! This module provides error types and user-friendly error formatting.

use thiserror::Error;
use uuid::Uuid;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Session id not known to the context store
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),

    /// Phase name outside the closed vocabulary
    #[error("invalid phase: {0}")]
    InvalidPhase(String),

    /// Hand-off kind name outside the closed vocabulary
    #[error("invalid handoff type: {given} (valid: {valid})")]
    InvalidHandoffKind {
        /// Name that was supplied
        given: String,
        /// Comma separated list of accepted names
        valid: String,
    },

    /// Participant name outside the fixed set
    #[error("invalid agent name: {0}")]
    InvalidParticipant(String),

    /// Reading or writing persisted state failed
    #[error("persistence error: {0}")]
    Persistence(String),

    /// JSON (de)serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("invalid configuration: {field}")]
    InvalidConfig {
        /// Config field name
        field: String,
        /// Detailed message
        message: String,
    },

    /// Internal error (lock poisoning, etc.)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Handle lock poison errors consistently
pub fn handle_lock_poison<T>(e: std::sync::PoisonError<T>) -> Error {
    Error::Internal(format!("Lock poisoned: {}", e))
}

/// Trait for user-friendly error messages
///
/// Provides human-readable error messages and suggestions for fixing.
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get a suggestion for how to fix the error
    fn suggestion(&self) -> Option<String>;

    /// Short machine-checkable tag for the error class
    fn error_type(&self) -> &'static str;
}

impl UserFriendlyError for Error {
    fn user_message(&self) -> String {
        match self {
            Error::SessionNotFound(id) => format!("🔍 Session {} was not found.", id),
            Error::InvalidPhase(name) => format!("📋 '{}' is not a workflow phase.", name),
            Error::InvalidHandoffKind { given, .. } => {
                format!("🔀 '{}' is not a hand-off type.", given)
            }
            Error::InvalidParticipant(name) => format!("🤖 '{}' is not a known agent.", name),
            Error::Persistence(msg) => format!("💾 Could not persist session state: {}", msg),
            Error::Serialization(e) => format!("📄 Malformed data: {}", e),
            Error::InvalidConfig { field, message } => {
                format!("⚙️ Configuration error in '{}': {}", field, message)
            }
            Error::Internal(msg) => format!("❌ Internal error: {}", msg),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            Error::SessionNotFound(_) => {
                Some("💡 Run `plugsmith sessions list` to see stored sessions.".to_string())
            }
            Error::InvalidPhase(_) => {
                Some("💡 Run `plugsmith phases` to see the accepted phase names.".to_string())
            }
            Error::InvalidHandoffKind { valid, .. } => {
                Some(format!("💡 Use one of: {}.", valid))
            }
            Error::Persistence(_) => Some(
                "💡 Check that the context directory exists and is writable.".to_string(),
            ),
            Error::InvalidConfig { field, .. } => Some(format!(
                "💡 Check the '{}' setting in config/default.toml or the PLUGSMITH_ environment.",
                field
            )),
            _ => None,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            Error::SessionNotFound(_) => "session_not_found",
            Error::InvalidPhase(_) => "invalid_phase",
            Error::InvalidHandoffKind { .. } => "invalid_handoff_type",
            Error::InvalidParticipant(_) => "invalid_agent",
            Error::Persistence(_) => "persistence",
            Error::Serialization(_) => "serialization",
            Error::InvalidConfig { .. } => "invalid_config",
            Error::Internal(_) => "internal",
        }
    }
}

/// Format an error for display in the CLI
pub fn format_error_for_cli(error: &Error) -> String {
    let mut output = error.user_message();

    if let Some(suggestion) = error.suggestion() {
        output.push_str("\n\n");
        output.push_str(&suggestion);
    }

    output
}

#[cfg(test)]
mod tests;
