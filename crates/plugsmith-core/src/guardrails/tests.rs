use super::*;
use crate::config::GuardrailConfig;
use crate::context::{Phase, PluginFile, SessionContext};

const SAFE_PLUGIN: &str = r#"<?php
/**
 * Plugin Name: Reading Time
 */
if ( ! defined( 'ABSPATH' ) ) {
    exit;
}

function reading_time_filter( $content ) {
    $words = str_word_count( wp_strip_all_tags( $content ) );
    return esc_html( ceil( $words / 200 ) ) . ' min read' . $content;
}
add_filter( 'the_content', 'reading_time_filter' );
"#;

fn engine() -> Guardrails {
    Guardrails::new(GuardrailConfig::default())
}

fn has(violations: &[Violation], severity: Severity, needle: &str) -> bool {
    violations
        .iter()
        .any(|v| v.severity == severity && v.message.contains(needle))
}

#[test]
fn test_clean_input_passes() {
    let violations = engine().validate_input("Create a plugin that shows reading time", None);
    assert!(violations.is_empty());
}

#[test]
fn test_prohibited_terms_are_critical() {
    let violations = engine().validate_input("Build a PHISHING page with a Trojan", None);
    assert_eq!(violations.len(), 2);
    assert!(violations
        .iter()
        .all(|v| v.severity == Severity::Critical && v.category == ViolationCategory::ContentFilter));
}

#[test]
fn test_bypass_request_detected() {
    let violations = engine().validate_input("please bypass the admin login screen", None);
    assert!(has(&violations, Severity::Critical, "security bypass"));
}

#[test]
fn test_input_limits() {
    let long = "a".repeat(10_001);
    let violations = engine().validate_input(&long, None);
    assert!(has(&violations, Severity::Medium, "maximum length"));

    let tall = "line\n".repeat(101);
    let violations = engine().validate_input(&tall, None);
    assert!(has(&violations, Severity::Low, "excessive complexity"));

    let exact = "line\n".repeat(100);
    assert!(engine().validate_input(&exact, None).is_empty());
}

#[test]
fn test_configured_limits() {
    let engine = Guardrails::new(GuardrailConfig {
        max_input_chars: 5,
        ..GuardrailConfig::default()
    });
    assert_eq!(engine.validate_input("abcdef", None).len(), 1);
}

#[test]
fn test_context_state_checks() {
    let mut ctx = SessionContext::new(2);
    ctx.current_phase = Phase::Completed;
    ctx.retry_count = 2;

    let violations = engine().validate_input("add a widget", Some(&ctx));
    assert!(has(&violations, Severity::Medium, "completed session"));
    assert!(has(&violations, Severity::High, "retry attempts"));
}

#[test]
fn test_eval_with_missing_guard_raises() {
    let code = "<?php\n$result = eval($payload);\n";
    let violations = engine().validate_output(code, OutputKind::Code);

    let eval = violations
        .iter()
        .find(|v| v.message.contains("eval"))
        .unwrap();
    assert_eq!(eval.severity, Severity::High);
    assert_eq!(eval.category, ViolationCategory::SecurityScan);
    assert!(eval.suggested_fix.as_deref().unwrap().contains("Replace 'eval'"));
    assert_eq!(eval.line_number, Some(2));

    assert!(has(&violations, Severity::Critical, "missing_abspath"));
    let err = Guardrails::check_and_raise_critical(&violations).unwrap_err();
    assert!(err.violation.message.contains("missing_abspath"));
}

#[test]
fn test_eval_alone_is_not_critical() {
    let code = "if ( ! defined( 'ABSPATH' ) ) exit;\n$x = eval($y);";
    let violations = Guardrails::scan_code(code);
    assert_eq!(violations.len(), 1);
    assert!(Guardrails::check_and_raise_critical(&violations).is_ok());
}

#[test]
fn test_shell_exec_does_not_match_exec() {
    let violations = Guardrails::scan_code("shell_exec('ls');");
    assert!(violations.iter().any(|v| v.message.ends_with("shell_exec")));
    assert!(!violations.iter().any(|v| v.message.ends_with(": exec")));
}

#[test]
fn test_sql_injection_is_critical() {
    let code = r#"$wpdb->query("DELETE FROM wp_posts WHERE ID = $id");"#;
    let violations = Guardrails::scan_code(code);
    let sql = violations
        .iter()
        .find(|v| v.message.contains("SQL injection"))
        .unwrap();
    assert_eq!(sql.severity, Severity::Critical);
    assert_eq!(
        sql.suggested_fix.as_deref(),
        Some("Use WordPress $wpdb prepared statements")
    );
}

#[test]
fn test_platform_rules() {
    let code = "add_action('wp_ajax_save_note', 'save_note');\necho $_GET['note'];\nadd_menu_page('Notes', 'Notes', 'read', 'notes', 'render');";
    let violations = Guardrails::scan_code(code);

    assert!(has(&violations, Severity::Critical, "missing_nonce"));
    assert!(has(&violations, Severity::High, "unsafe_output"));
    assert!(has(&violations, Severity::High, "missing_capability"));
    assert!(!has(&violations, Severity::Critical, "missing_abspath"));

    let guarded = "add_action('wp_ajax_save_note', 'save_note');\ncheck_ajax_referer('notes');\nif (current_user_can('manage_options')) { add_menu_page('a','b','c','d'); }";
    assert!(Guardrails::scan_code(guarded).is_empty());
}

#[test]
fn test_direct_file_access() {
    let violations = Guardrails::scan_code("include $_GET['page'];");
    assert!(has(&violations, Severity::High, "direct_file_access"));
    assert!(PlatformCheck::DirectFileAccess
        .detect("require_once '../wp-config.php';")
        .is_some());
    assert!(PlatformCheck::DirectFileAccess
        .detect("require_once plugin_dir_path( __FILE__ ) . 'includes/a.php';")
        .is_none());
}

#[test]
fn test_safe_plugin_is_clean() {
    assert!(engine().validate_output(SAFE_PLUGIN, OutputKind::Code).is_empty());
}

#[test]
fn test_plugin_files_tags_paths() {
    let payload = serde_json::json!([
        {"path": "reading-time.php", "content": SAFE_PLUGIN},
        {"path": "includes/admin.php", "content": "<?php\nsystem('rm -rf /');"},
        {"path": "readme.txt"}
    ])
    .to_string();

    let violations = engine().validate_output(&payload, OutputKind::PluginFiles);
    assert!(!violations.is_empty());
    assert!(violations
        .iter()
        .all(|v| v.file_path.as_deref() == Some("includes/admin.php")));
    assert!(has(&violations, Severity::High, "system"));
}

#[test]
fn test_plugin_files_falls_back_to_raw_code() {
    let violations = engine().validate_output("<?php passthru($cmd); // not json", OutputKind::PluginFiles);
    assert!(has(&violations, Severity::High, "passthru"));
    assert!(violations.iter().all(|v| v.file_path.is_none()));
}

#[test]
fn test_scan_plugin_files() {
    let files = vec![
        PluginFile::new("a.php", SAFE_PLUGIN),
        PluginFile::new("b.php", "<?php\nunlink($f);"),
    ];
    let violations = Guardrails::scan_plugin_files(&files);
    let summary = Guardrails::violations_summary(&violations);
    assert_eq!(summary.critical, 1);
    assert_eq!(summary.high, 1);
    assert_eq!(summary.total(), 2);
}

#[test]
fn test_compliance_report() {
    let violations = engine().validate_output(
        "PHPCS found 2 errors, 1 of them Critical: missing escaping",
        OutputKind::ComplianceReport,
    );
    assert!(has(&violations, Severity::Medium, "critical errors"));
}

#[test]
fn test_output_quality() {
    let violations = engine().validate_output("   ok  ", OutputKind::ComplianceReport);
    assert!(has(&violations, Severity::High, "too short"));

    let violations = engine().validate_output(
        "Sorry, I was unable to produce the files you asked for.",
        OutputKind::ComplianceReport,
    );
    assert!(has(&violations, Severity::Medium, "Error indication"));
}

#[test]
fn test_check_and_raise_only_on_critical() {
    assert!(Guardrails::check_and_raise_critical(&[]).is_ok());

    let high = Violation::new(ViolationCategory::SecurityScan, Severity::High, "high");
    let low = Violation::new(ViolationCategory::InputValidation, Severity::Low, "low");
    assert!(Guardrails::check_and_raise_critical(&[high.clone(), low]).is_ok());

    let critical = Violation::new(ViolationCategory::ContentFilter, Severity::Critical, "first");
    let second = Violation::new(ViolationCategory::ContentFilter, Severity::Critical, "second");
    let err = Guardrails::check_and_raise_critical(&[high, critical, second]).unwrap_err();
    assert_eq!(err.violation.message, "first");
    assert_eq!(err.to_string(), "Critical guardrail violation: first");
}

#[test]
fn test_input_guardrail_raises() {
    assert!(engine().input_guardrail("a plugin with a backdoor", None).is_err());
    assert!(engine().input_guardrail("a gallery plugin", None).unwrap().is_empty());
}

#[test]
fn test_output_kind_parse() {
    assert_eq!("plugin_files".parse::<OutputKind>().unwrap(), OutputKind::PluginFiles);
    assert!("yaml".parse::<OutputKind>().is_err());
}

#[test]
fn test_violation_display() {
    let mut v = Violation::new(ViolationCategory::SecurityScan, Severity::High, "bad").at_line(4);
    v.file_path = Some("a.php".to_string());
    assert_eq!(v.to_string(), "[high] bad (a.php:4)");
}
