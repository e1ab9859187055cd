//! Typed, per-kind payloads handed to the receiving stage.
//!
//! A driver sends an open JSON object; [`HandoffPayload::project`] keeps only
//! the keys the receiving stage reads and gives each a concrete type.
//! Missing or `null` keys take their empty default, unknown keys are dropped.

use super::kind::HandoffKind;
use crate::context::{Phase, PluginFile, SessionContext};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Input for the specification stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecificationPayload {
    /// Raw request text
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_input: String,
    /// Explicit requirements
    #[serde(default, deserialize_with = "null_as_default")]
    pub requirements: Vec<Value>,
    /// User preferences
    #[serde(default, deserialize_with = "null_as_default")]
    pub preferences: Map<String, Value>,
}

/// Input for the generation stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationPayload {
    /// Plugin specification
    #[serde(default, deserialize_with = "null_as_default")]
    pub plugin_spec: Map<String, Value>,
    /// Explicit requirements
    #[serde(default, deserialize_with = "null_as_default")]
    pub requirements: Vec<Value>,
    /// Features to implement
    #[serde(default, deserialize_with = "null_as_default")]
    pub features: Vec<Value>,
}

/// Input for the compliance stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompliancePayload {
    /// Generated files
    #[serde(default, deserialize_with = "null_as_default")]
    pub generated_files: Vec<Value>,
    /// Plugin specification
    #[serde(default, deserialize_with = "null_as_default")]
    pub plugin_spec: Map<String, Value>,
    /// Paths of written files
    #[serde(default, deserialize_with = "null_as_default")]
    pub file_paths: Vec<String>,
}

/// Input for the testing stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestingPayload {
    /// Generated files
    #[serde(default, deserialize_with = "null_as_default")]
    pub generated_files: Vec<Value>,
    /// Compliance findings
    #[serde(default, deserialize_with = "null_as_default")]
    pub compliance_results: Map<String, Value>,
    /// Paths of written files
    #[serde(default, deserialize_with = "null_as_default")]
    pub file_paths: Vec<String>,
}

/// Input for the security stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityPayload {
    /// Generated files
    #[serde(default, deserialize_with = "null_as_default")]
    pub generated_files: Vec<Value>,
    /// Source text to review
    #[serde(default, deserialize_with = "null_as_default")]
    pub file_content: String,
    /// Compliance findings
    #[serde(default, deserialize_with = "null_as_default")]
    pub compliance_results: Map<String, Value>,
}

/// Input for the final report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionPayload {
    /// Plugin specification
    #[serde(default, deserialize_with = "null_as_default")]
    pub plugin_spec: Map<String, Value>,
    /// Generated files
    #[serde(default, deserialize_with = "null_as_default")]
    pub generated_files: Vec<Value>,
    /// Compliance findings
    #[serde(default, deserialize_with = "null_as_default")]
    pub compliance_results: Map<String, Value>,
    /// Test outcomes
    #[serde(default, deserialize_with = "null_as_default")]
    pub test_results: Map<String, Value>,
    /// Security findings
    #[serde(default, deserialize_with = "null_as_default")]
    pub security_results: Map<String, Value>,
    /// Paths of written files
    #[serde(default, deserialize_with = "null_as_default")]
    pub file_paths: Vec<String>,
}

/// Payload narrowed to what one kind of receiving stage reads
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HandoffPayload {
    /// See [`SpecificationPayload`]
    Specification(SpecificationPayload),
    /// See [`GenerationPayload`]
    Generation(GenerationPayload),
    /// See [`CompliancePayload`]
    Compliance(CompliancePayload),
    /// See [`TestingPayload`]
    Testing(TestingPayload),
    /// See [`SecurityPayload`]
    Security(SecurityPayload),
    /// See [`CompletionPayload`]
    Completion(CompletionPayload),
}

impl HandoffPayload {
    /// Project an open JSON object onto the payload of `kind`.
    ///
    /// Fails only when a kept key holds a value of the wrong shape.
    pub fn project(kind: HandoffKind, data: &Map<String, Value>) -> serde_json::Result<Self> {
        let value = Value::Object(data.clone());
        Ok(match kind {
            HandoffKind::Specification => Self::Specification(serde_json::from_value(value)?),
            HandoffKind::Generation => Self::Generation(serde_json::from_value(value)?),
            HandoffKind::Compliance => Self::Compliance(serde_json::from_value(value)?),
            HandoffKind::Testing => Self::Testing(serde_json::from_value(value)?),
            HandoffKind::Security => Self::Security(serde_json::from_value(value)?),
            HandoffKind::Completion => Self::Completion(serde_json::from_value(value)?),
        })
    }

    /// Kind this payload belongs to
    #[must_use]
    pub fn kind(&self) -> HandoffKind {
        match self {
            Self::Specification(_) => HandoffKind::Specification,
            Self::Generation(_) => HandoffKind::Generation,
            Self::Compliance(_) => HandoffKind::Compliance,
            Self::Testing(_) => HandoffKind::Testing,
            Self::Security(_) => HandoffKind::Security,
            Self::Completion(_) => HandoffKind::Completion,
        }
    }

    /// Number of explicit requirements carried
    #[must_use]
    pub fn requirement_count(&self) -> usize {
        match self {
            Self::Specification(p) => p.requirements.len(),
            Self::Generation(p) => p.requirements.len(),
            _ => 0,
        }
    }

    /// Source files carried by the payload, for security scanning.
    ///
    /// `generated_files` entries count when they are `{path, content}`
    /// records; a non-empty `file_content` counts as one unnamed file.
    #[must_use]
    pub fn source_files(&self) -> Vec<PluginFile> {
        let (records, loose) = match self {
            Self::Specification(_) | Self::Generation(_) => return Vec::new(),
            Self::Compliance(p) => (&p.generated_files, None),
            Self::Testing(p) => (&p.generated_files, None),
            Self::Security(p) => (&p.generated_files, Some(p.file_content.as_str())),
            Self::Completion(p) => (&p.generated_files, None),
        };

        let mut files: Vec<PluginFile> = records
            .iter()
            .filter_map(|record| {
                let content = record.get("content")?.as_str()?;
                let path = record
                    .get("path")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                Some(PluginFile::new(path, content))
            })
            .collect();
        if let Some(content) = loose.filter(|c| !c.trim().is_empty()) {
            files.push(PluginFile::new("file_content", content));
        }
        files
    }
}

/// Session facts attached to every filtered payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSummary {
    /// Session id
    pub session_id: Uuid,
    /// Plugin name, if known
    pub plugin_name: Option<String>,
    /// Plugin slug, if known
    pub plugin_slug: Option<String>,
    /// Phase at hand-off time
    pub current_phase: Phase,
    /// Progress percentage at hand-off time
    pub progress: f64,
    /// Optional test suites the user asked for
    pub advanced_tests_requested: Vec<String>,
}

impl From<&SessionContext> for ContextSummary {
    fn from(ctx: &SessionContext) -> Self {
        Self {
            session_id: ctx.session_id(),
            plugin_name: ctx.plugin_name.clone(),
            plugin_slug: ctx.plugin_slug.clone(),
            current_phase: ctx.current_phase,
            progress: ctx.progress_percentage(),
            advanced_tests_requested: ctx.advanced_tests_requested.clone(),
        }
    }
}

/// What the receiving stage gets: the projected payload plus a context summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredPayload {
    /// Session summary, absent for context-free hand-offs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextSummary>,
    /// Kind-specific fields
    #[serde(flatten)]
    pub payload: HandoffPayload,
}

impl FilteredPayload {
    /// JSON object form
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Length of the serialized payload
    #[must_use]
    pub fn data_size(&self) -> usize {
        serde_json::to_string(self).map(|s| s.len()).unwrap_or(0)
    }
}
