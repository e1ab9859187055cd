use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a hand-off between workflow stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffKind {
    /// Turn the user request into a plugin specification
    Specification,
    /// Generate plugin files from the specification
    Generation,
    /// Review generated files against coding standards
    Compliance,
    /// Test the generated plugin
    Testing,
    /// Security review of the generated plugin
    Security,
    /// Compile the final report
    Completion,
}

impl HandoffKind {
    /// Every kind, in workflow order
    pub const ALL: [HandoffKind; 6] = [
        HandoffKind::Specification,
        HandoffKind::Generation,
        HandoffKind::Compliance,
        HandoffKind::Testing,
        HandoffKind::Security,
        HandoffKind::Completion,
    ];

    /// Wire name of the kind
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            HandoffKind::Specification => "specification",
            HandoffKind::Generation => "generation",
            HandoffKind::Compliance => "compliance",
            HandoffKind::Testing => "testing",
            HandoffKind::Security => "security",
            HandoffKind::Completion => "completion",
        }
    }

    /// Comma separated list of every wire name
    #[must_use]
    pub fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(HandoffKind::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Kinds that must all be recorded before this one.
    ///
    /// An empty slice means the kind is always eligible.
    #[must_use]
    pub fn prerequisites(&self) -> &'static [HandoffKind] {
        match self {
            HandoffKind::Specification => &[],
            HandoffKind::Generation => &[HandoffKind::Specification],
            HandoffKind::Compliance => &[HandoffKind::Generation],
            HandoffKind::Testing => &[HandoffKind::Compliance],
            HandoffKind::Security => &[HandoffKind::Generation, HandoffKind::Compliance],
            HandoffKind::Completion => &[HandoffKind::Testing, HandoffKind::Security],
        }
    }

    /// Whether every prerequisite is among the recorded kinds
    #[must_use]
    pub fn is_unlocked_by(&self, recorded: &[HandoffKind]) -> bool {
        self.missing_prerequisites(recorded).is_empty()
    }

    /// Prerequisites not yet recorded, in declaration order
    #[must_use]
    pub fn missing_prerequisites(&self, recorded: &[HandoffKind]) -> Vec<HandoffKind> {
        self.prerequisites()
            .iter()
            .filter(|k| !recorded.contains(k))
            .copied()
            .collect()
    }

    /// Fields a validation payload must carry
    #[must_use]
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            HandoffKind::Specification => &["name", "description"],
            HandoffKind::Generation => &["name", "slug", "features"],
            HandoffKind::Compliance => &["files"],
            HandoffKind::Testing => &["files"],
            HandoffKind::Security => &["files", "content"],
            HandoffKind::Completion => &["results"],
        }
    }

    /// Fixed opening of the instructions given to the receiving stage
    #[must_use]
    pub fn base_instruction(&self) -> &'static str {
        match self {
            HandoffKind::Specification => {
                "Analyze the user requirements and create a detailed plugin specification."
            }
            HandoffKind::Generation => {
                "Generate complete plugin files based on the provided specification."
            }
            HandoffKind::Compliance => {
                "Review the generated files for WordPress compliance and coding standards."
            }
            HandoffKind::Testing => "Perform comprehensive testing of the generated plugin files.",
            HandoffKind::Security => "Conduct security analysis and vulnerability assessment.",
            HandoffKind::Completion => "Compile final report and prepare plugin for delivery.",
        }
    }
}

impl fmt::Display for HandoffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandoffKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::InvalidHandoffKind {
                given: s.to_string(),
                valid: Self::valid_names(),
            })
    }
}
