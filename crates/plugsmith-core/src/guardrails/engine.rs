use super::patterns::{
    line_of, PlatformCheck, BYPASS_REGEXES, DANGEROUS_FUNCTION_REGEXES, ERROR_PHRASE_REGEXES,
    PROHIBITED_TERMS, SQL_INJECTION_REGEXES,
};
use super::types::{
    GuardrailTripwire, OutputKind, Severity, SeveritySummary, Violation, ViolationCategory,
};
use crate::config::GuardrailConfig;
use crate::context::{PluginFile, SessionContext};
use serde::Deserialize;
use tracing::{debug, warn};

/// Loose shape of one entry of a plugin-files payload
#[derive(Deserialize)]
struct FileRecord {
    path: Option<String>,
    content: Option<String>,
}

/// Stateless guardrail engine.
///
/// Holds only its limits; every check is a pure function of its input.
#[derive(Debug, Clone, Default)]
pub struct Guardrails {
    config: GuardrailConfig,
}

impl Guardrails {
    /// Create an engine with the given limits
    #[must_use]
    pub fn new(config: GuardrailConfig) -> Self {
        Self { config }
    }

    /// Check inbound user text.
    ///
    /// Runs banned terms, bypass requests, size limits and, with a context,
    /// session state checks, in that order.
    #[must_use]
    pub fn validate_input(&self, text: &str, context: Option<&SessionContext>) -> Vec<Violation> {
        let mut violations = Vec::new();

        violations.extend(Self::check_prohibited_content(text));
        violations.extend(Self::check_bypass_requests(text));
        violations.extend(self.check_input_limits(text));
        if let Some(ctx) = context {
            violations.extend(Self::check_context_state(ctx));
        }

        if !violations.is_empty() {
            debug!(count = violations.len(), "Input guardrail findings");
        }
        violations
    }

    /// Check agent output of the given kind, followed by the generic quality check
    #[must_use]
    pub fn validate_output(&self, text: &str, kind: OutputKind) -> Vec<Violation> {
        let mut violations = match kind {
            OutputKind::Code => Self::scan_code(text),
            OutputKind::PluginFiles => Self::check_plugin_files(text),
            OutputKind::ComplianceReport => Self::check_compliance_report(text),
        };
        violations.extend(self.check_output_quality(text));

        if !violations.is_empty() {
            debug!(kind = %kind, count = violations.len(), "Output guardrail findings");
        }
        violations
    }

    /// Validate input and fail on the first critical finding
    pub fn input_guardrail(
        &self,
        text: &str,
        context: Option<&SessionContext>,
    ) -> Result<Vec<Violation>, GuardrailTripwire> {
        let violations = self.validate_input(text, context);
        Self::check_and_raise_critical(&violations)?;
        Ok(violations)
    }

    /// Validate output and fail on the first critical finding
    pub fn output_guardrail(
        &self,
        text: &str,
        kind: OutputKind,
    ) -> Result<Vec<Violation>, GuardrailTripwire> {
        let violations = self.validate_output(text, kind);
        Self::check_and_raise_critical(&violations)?;
        Ok(violations)
    }

    /// Fail with the first critical finding, if any
    pub fn check_and_raise_critical(violations: &[Violation]) -> Result<(), GuardrailTripwire> {
        match violations.iter().find(|v| v.is_critical()) {
            Some(violation) => {
                warn!(message = %violation.message, "Critical guardrail violation");
                Err(GuardrailTripwire {
                    violation: violation.clone(),
                })
            }
            None => Ok(()),
        }
    }

    /// Count findings per severity
    #[must_use]
    pub fn violations_summary(violations: &[Violation]) -> SeveritySummary {
        violations
            .iter()
            .fold(SeveritySummary::default(), |mut summary, v| {
                match v.severity {
                    Severity::Critical => summary.critical += 1,
                    Severity::High => summary.high += 1,
                    Severity::Medium => summary.medium += 1,
                    Severity::Low => summary.low += 1,
                }
                summary
            })
    }

    /// Scan each file with the code checker, tagging findings with its path
    #[must_use]
    pub fn scan_plugin_files(files: &[PluginFile]) -> Vec<Violation> {
        files
            .iter()
            .flat_map(|file| {
                Self::scan_code(&file.content)
                    .into_iter()
                    .map(|mut v| {
                        v.file_path = Some(file.path.clone());
                        v
                    })
            })
            .collect()
    }

    /// Code security checker: dangerous calls, SQL injection shapes and platform rules
    #[must_use]
    pub fn scan_code(code: &str) -> Vec<Violation> {
        let mut violations = Vec::new();

        for (func, re) in DANGEROUS_FUNCTION_REGEXES.iter() {
            if let Some(m) = re.find(code) {
                violations.push(
                    Violation::new(
                        ViolationCategory::SecurityScan,
                        Severity::High,
                        format!("Dangerous PHP function detected: {}", func),
                    )
                    .with_details(format!(
                        "Function '{}' can be used for malicious purposes",
                        func
                    ))
                    .with_fix(format!(
                        "Replace '{}' with safer WordPress alternatives",
                        func
                    ))
                    .at_line(line_of(code, m.start())),
                );
            }
        }

        for (pattern, re) in SQL_INJECTION_REGEXES.iter() {
            if let Some(m) = re.find(code) {
                violations.push(
                    Violation::new(
                        ViolationCategory::SecurityScan,
                        Severity::Critical,
                        "Potential SQL injection vulnerability",
                    )
                    .with_details(format!("Code matches SQL injection pattern: {}", pattern))
                    .with_fix("Use WordPress $wpdb prepared statements")
                    .at_line(line_of(code, m.start())),
                );
            }
        }

        for check in PlatformCheck::ALL {
            if let Some(line) = check.detect(code) {
                violations.push(
                    Violation::new(
                        ViolationCategory::SecurityScan,
                        check.severity(),
                        format!("WordPress security issue: {}", check.name()),
                    )
                    .with_details(check.description())
                    .with_fix(check.suggested_fix())
                    .at_line(line),
                );
            }
        }

        violations
    }

    fn check_prohibited_content(text: &str) -> Vec<Violation> {
        let lowered = text.to_lowercase();
        PROHIBITED_TERMS
            .iter()
            .filter(|term| lowered.contains(*term))
            .map(|term| {
                Violation::new(
                    ViolationCategory::ContentFilter,
                    Severity::Critical,
                    format!("Prohibited content detected: {}", term),
                )
                .with_details(format!(
                    "Input contains potentially malicious content matching '{}'",
                    term
                ))
                .with_fix("Remove or rephrase the problematic content")
            })
            .collect()
    }

    fn check_bypass_requests(text: &str) -> Vec<Violation> {
        BYPASS_REGEXES
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(pattern, _)| {
                Violation::new(
                    ViolationCategory::ContentFilter,
                    Severity::Critical,
                    "Inappropriate security bypass request detected",
                )
                .with_details(format!("Content matches security bypass pattern: {}", pattern))
                .with_fix("Request legitimate WordPress functionality instead")
            })
            .collect()
    }

    fn check_input_limits(&self, text: &str) -> Vec<Violation> {
        let mut violations = Vec::new();

        let chars = text.chars().count();
        if chars > self.config.max_input_chars {
            violations.push(
                Violation::new(
                    ViolationCategory::InputValidation,
                    Severity::Medium,
                    "Input exceeds maximum length limit",
                )
                .with_details(format!(
                    "Input length: {} characters (max: {})",
                    chars, self.config.max_input_chars
                ))
                .with_fix("Reduce input length or break into multiple requests"),
            );
        }

        let lines = text.matches('\n').count();
        if lines > self.config.max_input_lines {
            violations.push(
                Violation::new(
                    ViolationCategory::InputValidation,
                    Severity::Low,
                    "Input has excessive complexity",
                )
                .with_details(format!("Input contains {} lines", lines))
                .with_fix("Simplify the request or break into smaller parts"),
            );
        }

        violations
    }

    fn check_context_state(ctx: &SessionContext) -> Vec<Violation> {
        let mut violations = Vec::new();

        if ctx.current_phase.is_terminal() {
            violations.push(
                Violation::new(
                    ViolationCategory::InputValidation,
                    Severity::Medium,
                    format!("Input received for {} session", ctx.current_phase),
                )
                .with_details(format!("Session is already marked as {}", ctx.current_phase))
                .with_fix("Start a new session for additional requests"),
            );
        }

        if ctx.retries_exhausted() {
            violations.push(
                Violation::new(
                    ViolationCategory::InputValidation,
                    Severity::High,
                    "Maximum retry attempts exceeded",
                )
                .with_details(format!(
                    "Retry count: {} (max: {})",
                    ctx.retry_count, ctx.max_retries
                ))
                .with_fix("Review and fix underlying issues before retrying"),
            );
        }

        violations
    }

    fn check_plugin_files(text: &str) -> Vec<Violation> {
        match serde_json::from_str::<Vec<serde_json::Value>>(text) {
            Ok(records) => records
                .into_iter()
                .filter_map(|value| serde_json::from_value::<FileRecord>(value).ok())
                .filter_map(|record| {
                    record.content.map(|content| {
                        PluginFile::new(record.path.unwrap_or_else(|| "unknown".to_string()), content)
                    })
                })
                .flat_map(|file| Self::scan_plugin_files(std::slice::from_ref(&file)))
                .collect(),
            Err(_) => {
                debug!("Plugin files payload is not a JSON list, scanning as raw code");
                Self::scan_code(text)
            }
        }
    }

    fn check_compliance_report(report: &str) -> Vec<Violation> {
        let lowered = report.to_lowercase();
        if lowered.contains("error") && lowered.contains("critical") {
            vec![Violation::new(
                ViolationCategory::OutputValidation,
                Severity::Medium,
                "Compliance report indicates critical errors",
            )
            .with_details("Generated plugin may have critical compliance issues")
            .with_fix("Review and fix compliance issues before proceeding")]
        } else {
            Vec::new()
        }
    }

    fn check_output_quality(&self, text: &str) -> Vec<Violation> {
        let mut violations = Vec::new();

        if text.trim().chars().count() < self.config.min_output_chars {
            violations.push(
                Violation::new(
                    ViolationCategory::OutputValidation,
                    Severity::High,
                    "Output is too short or empty",
                )
                .with_details(format!("Output length: {} characters", text.chars().count()))
                .with_fix("Regenerate with more detailed specifications"),
            );
        }

        for (pattern, re) in ERROR_PHRASE_REGEXES.iter() {
            if re.is_match(text) {
                violations.push(
                    Violation::new(
                        ViolationCategory::OutputValidation,
                        Severity::Medium,
                        "Error indication in output",
                    )
                    .with_details(format!("Output contains error pattern: {}", pattern))
                    .with_fix("Check for underlying issues and regenerate"),
                );
            }
        }

        violations
    }
}
