use super::kind::HandoffKind;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named stage of the workflow that can give or receive control.
///
/// The display name is the wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Participant {
    /// Orchestrates the run
    #[serde(rename = "Plugin Manager Agent")]
    Manager,
    /// Writes the plugin specification
    #[serde(rename = "Plugin Specification Agent")]
    Specification,
    /// Produces and writes plugin files
    #[serde(rename = "Plugin File Generator Agent")]
    FileGenerator,
    /// Checks coding standards
    #[serde(rename = "Plugin Compliance Agent")]
    Compliance,
    /// Runs the test suites
    #[serde(rename = "Plugin Testing Agent")]
    Testing,
}

impl Participant {
    /// Every participant
    pub const ALL: [Participant; 5] = [
        Participant::Manager,
        Participant::Specification,
        Participant::FileGenerator,
        Participant::Compliance,
        Participant::Testing,
    ];

    /// Display name, also used on the wire
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Participant::Manager => "Plugin Manager Agent",
            Participant::Specification => "Plugin Specification Agent",
            Participant::FileGenerator => "Plugin File Generator Agent",
            Participant::Compliance => "Plugin Compliance Agent",
            Participant::Testing => "Plugin Testing Agent",
        }
    }

    /// Hand-offs this participant is offered, as `(receiver, kind)` pairs
    #[must_use]
    pub fn available_handoffs(&self) -> &'static [(Participant, HandoffKind)] {
        match self {
            Participant::Manager => &[
                (Participant::Specification, HandoffKind::Specification),
                (Participant::FileGenerator, HandoffKind::Generation),
                (Participant::Compliance, HandoffKind::Compliance),
                (Participant::Testing, HandoffKind::Testing),
            ],
            Participant::Specification => &[
                (Participant::FileGenerator, HandoffKind::Generation),
                (Participant::Manager, HandoffKind::Completion),
            ],
            Participant::FileGenerator => &[
                (Participant::Compliance, HandoffKind::Compliance),
                (Participant::Manager, HandoffKind::Completion),
            ],
            Participant::Compliance => &[
                (Participant::Testing, HandoffKind::Testing),
                (Participant::Manager, HandoffKind::Completion),
            ],
            Participant::Testing => &[(Participant::Manager, HandoffKind::Completion)],
        }
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Participant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| Error::InvalidParticipant(s.to_string()))
    }
}
