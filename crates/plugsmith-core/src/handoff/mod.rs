//! Handoff - the state-gated protocol for moving control between stages.
//!
//! A [`HandoffRequest`] names the sending and receiving [`Participant`], a
//! [`HandoffKind`] and two payloads. The [`HandoffCoordinator`] checks it,
//! narrows the data to a [`FilteredPayload`] and appends an immutable
//! [`HandoffRecord`] to the chain.

/// The coordinator and its chain.
pub mod coordinator;
/// Closed hand-off kind vocabulary with its dependency table.
pub mod kind;
/// Closed participant set.
pub mod participant;
/// Per-kind payload projections.
pub mod payload;
/// Records, requests, results and errors.
pub mod record;

pub use coordinator::HandoffCoordinator;
pub use kind::HandoffKind;
pub use participant::Participant;
pub use payload::{
    CompletionPayload, CompliancePayload, ContextSummary, FilteredPayload, GenerationPayload,
    HandoffPayload, SecurityPayload, SpecificationPayload, TestingPayload,
};
pub use record::{
    HandoffAccepted, HandoffError, HandoffRecord, HandoffRejected, HandoffRequest, HandoffResult,
    HandoffSummary, KindCompletion, ValidationSnapshot, WorkflowState,
};

#[cfg(test)]
mod tests;
