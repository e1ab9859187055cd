use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Severity of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Unusual but probably fine
    Low,
    /// Worth a look
    Medium,
    /// Should be fixed before shipping
    High,
    /// Aborts the operation that produced it
    Critical,
}

impl Severity {
    /// Wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Is this severity at or above `threshold`?
    #[must_use]
    pub fn at_least(&self, threshold: Severity) -> bool {
        *self >= threshold
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which check produced a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCategory {
    /// Shape and limits of inbound text
    InputValidation,
    /// Quality of agent output
    OutputValidation,
    /// Dangerous code constructs
    SecurityScan,
    /// Banned terms and bypass requests
    ContentFilter,
    /// Platform coding rules
    PluginCompliance,
}

/// A single guardrail finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Check that fired
    pub category: ViolationCategory,
    /// How bad it is
    pub severity: Severity,
    /// Short description
    pub message: String,
    /// Longer explanation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// File the finding was found in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// 1-based line of the first match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<usize>,
    /// Canned remediation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
}

impl Violation {
    /// Create a finding without locator or fix
    pub fn new(category: ViolationCategory, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            category,
            severity,
            message: message.into(),
            details: None,
            file_path: None,
            line_number: None,
            suggested_fix: None,
        }
    }

    /// Attach details
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Attach a suggested fix
    #[must_use]
    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }

    /// Attach a line number
    #[must_use]
    pub fn at_line(mut self, line: usize) -> Self {
        self.line_number = Some(line);
        self
    }

    /// Whether this finding aborts the operation
    #[must_use]
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)?;
        if let Some(path) = &self.file_path {
            write!(f, " ({}", path)?;
            if let Some(line) = self.line_number {
                write!(f, ":{}", line)?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

/// Raised when a critical finding is present
#[derive(Debug, Clone, Error)]
#[error("Critical guardrail violation: {}", violation.message)]
pub struct GuardrailTripwire {
    /// The first critical finding
    pub violation: Violation,
}

/// Count of findings per severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeveritySummary {
    /// Critical findings
    pub critical: usize,
    /// High findings
    pub high: usize,
    /// Medium findings
    pub medium: usize,
    /// Low findings
    pub low: usize,
}

impl SeveritySummary {
    /// All findings
    #[must_use]
    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

/// Shape of an agent output handed to `validate_output`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// A single source file or snippet
    Code,
    /// JSON list of `{path, content}` records
    PluginFiles,
    /// Free text from the compliance stage
    ComplianceReport,
}

impl OutputKind {
    /// Wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputKind::Code => "code",
            OutputKind::PluginFiles => "plugin_files",
            OutputKind::ComplianceReport => "compliance_report",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "code" => Ok(OutputKind::Code),
            "plugin_files" => Ok(OutputKind::PluginFiles),
            "compliance_report" => Ok(OutputKind::ComplianceReport),
            other => Err(format!(
                "unknown output kind '{}' (valid: code, plugin_files, compliance_report)",
                other
            )),
        }
    }
}
