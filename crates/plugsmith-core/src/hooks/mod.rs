//! Hooks - lifecycle telemetry for agents and tools.
//!
//! Every observed transition becomes a [`HookEvent`] that is appended to an
//! in-memory log, broadcast to live subscribers and handed to registered
//! callbacks. Callbacks are best effort: failures are logged and dropped.

/// Hook bus implementation.
pub mod bus;
/// Derived reports over the event log.
pub mod reports;
/// Event type definitions.
pub mod types;

pub use bus::{HookBus, HookCallback};
pub use reports::{
    ErrorAnalysis, ErrorSummary, HealthCheck, HealthLevel, HealthStatus, PerformanceMetrics,
    PerformanceStats, SessionAnalysis, SessionMetrics, SessionReport, TimelineEntry,
};
pub use types::{HookEvent, HookKind};
