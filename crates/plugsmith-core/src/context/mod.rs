//! Session context - the shared record of one plugin generation run.
//!
//! A [`SessionContext`] carries the workflow phase, accumulated artifacts and
//! the append-only error and message ledgers. The [`ContextStore`] owns every
//! live context behind one coarse lock and writes each mutation to a JSON
//! file before releasing it.

/// Closed phase vocabulary.
pub mod phase;
/// Session record and its ledgers.
pub mod session;
/// Lock-protected table of contexts with JSON file persistence.
pub mod store;

pub use phase::{Phase, CANONICAL_PHASES};
pub use session::{
    AgentMessage, ComplianceIssue, ContextPatch, ErrorRecord, MessageKind, PluginFile,
    SessionContext,
};
pub use store::{ContextStore, SessionSummary};
