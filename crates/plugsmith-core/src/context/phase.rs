use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Workflow phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Freshly created, nothing has run yet
    Initialization,
    /// Request analysis
    Planning,
    /// Plugin specification
    Specification,
    /// Source generation
    Generation,
    /// Writing files to the output directory
    Writing,
    /// Coding standards review
    Compliance,
    /// Automated testing
    Testing,
    /// Zip packaging
    Packaging,
    /// Security review (outside the canonical list)
    Security,
    /// Run finished
    Completed,
    /// Run aborted
    Failed,
}

/// The seven phases that count toward progress, in workflow order.
pub const CANONICAL_PHASES: [Phase; 7] = [
    Phase::Planning,
    Phase::Specification,
    Phase::Generation,
    Phase::Writing,
    Phase::Compliance,
    Phase::Testing,
    Phase::Packaging,
];

impl Phase {
    /// Every phase name, canonical and otherwise
    pub const ALL: [Phase; 11] = [
        Phase::Initialization,
        Phase::Planning,
        Phase::Specification,
        Phase::Generation,
        Phase::Writing,
        Phase::Compliance,
        Phase::Testing,
        Phase::Packaging,
        Phase::Security,
        Phase::Completed,
        Phase::Failed,
    ];

    /// Wire name of the phase
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Initialization => "initialization",
            Phase::Planning => "planning",
            Phase::Specification => "specification",
            Phase::Generation => "generation",
            Phase::Writing => "writing",
            Phase::Compliance => "compliance",
            Phase::Testing => "testing",
            Phase::Packaging => "packaging",
            Phase::Security => "security",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
        }
    }

    /// Whether the phase counts toward progress
    #[must_use]
    pub fn is_canonical(&self) -> bool {
        CANONICAL_PHASES.contains(self)
    }

    /// `completed` or `failed`
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| Error::InvalidPhase(s.to_string()))
    }
}
