//! Guardrails - pattern-based policy checks on text crossing the agent boundary.
//!
//! Inbound user text goes through [`Guardrails::validate_input`], agent output
//! through [`Guardrails::validate_output`]. Both return every finding; only
//! [`Guardrails::check_and_raise_critical`] turns a critical finding into an
//! error.

/// The checking engine.
pub mod engine;
/// Fixed pattern tables.
pub mod patterns;
/// Violation and severity types.
pub mod types;

pub use engine::Guardrails;
pub use patterns::PlatformCheck;
pub use types::{
    GuardrailTripwire, OutputKind, Severity, SeveritySummary, Violation, ViolationCategory,
};

#[cfg(test)]
mod tests;
