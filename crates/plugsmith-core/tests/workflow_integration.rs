use plugsmith_core::{
    AgentTool, ContextConfig, ContextPatch, CoreConfig, Guardrails, HandoffKind, HookKind,
    OutputKind, Participant, Phase, PluginFile, Severity, ToolError, ToolOutput, WorkflowService,
    CANONICAL_PHASES,
};
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;

/// Pretends to write generated plugin files
#[derive(Debug)]
struct WriteFileTool {
    files: Vec<PluginFile>,
}

#[async_trait::async_trait]
impl AgentTool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    async fn call(&self, _args: Value) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::Files(self.files.clone()))
    }
}

fn service_at(dir: &Path) -> WorkflowService {
    let config = CoreConfig {
        context: ContextConfig {
            context_dir: dir.to_path_buf(),
            ..ContextConfig::default()
        },
        ..CoreConfig::default()
    };
    WorkflowService::new(&config).unwrap()
}

const SAFE_MAIN: &str = "<?php\n/**\n * Plugin Name: Hello Notice\n */\nif (!defined('ABSPATH')) {\n    exit;\n}\n\nadd_action('admin_notices', function () {\n    echo esc_html__('Hello', 'hello-notice');\n});\n";

#[tokio::test]
async fn test_full_generation_run() {
    let dir = TempDir::new().unwrap();
    let service = service_at(dir.path());
    let session = service
        .start_session(ContextPatch {
            plugin_name: Some("Hello Notice".into()),
            plugin_slug: Some("hello-notice".into()),
            ..ContextPatch::default()
        })
        .unwrap()
        .session_id();

    assert!(service
        .check_input("Create a plugin that shows an admin notice")
        .unwrap()
        .is_empty());

    let steps = [
        (
            "Plugin Specification Agent",
            "specification",
            json!({"user_input": "admin notice", "name": "Hello Notice", "description": "Shows a notice"}),
        ),
        (
            "Plugin File Generator Agent",
            "generation",
            json!({"plugin_spec": {"name": "Hello Notice"}, "name": "Hello Notice", "slug": "hello-notice", "features": ["notice"]}),
        ),
    ];
    for (to, kind, data) in &steps {
        let result = service
            .initiate_handoff(to, kind, &data.to_string(), None)
            .unwrap();
        assert!(result.is_accepted(), "{kind}: {:?}", result.error());
    }

    let tool = WriteFileTool {
        files: vec![PluginFile::new("hello-notice/hello-notice.php", SAFE_MAIN)],
    };
    let outcome = service
        .invoke_tool("Plugin File Generator Agent", &tool, json!({}))
        .await;
    assert!(outcome.success);

    let files = json!([{"path": "hello-notice/hello-notice.php", "content": SAFE_MAIN}]);
    let remaining = [
        ("Plugin Compliance Agent", "compliance", json!({"files": files, "generated_files": files, "file_paths": ["hello-notice/hello-notice.php"]})),
        ("Plugin Testing Agent", "testing", json!({"files": files, "generated_files": files})),
        ("Plugin Compliance Agent", "security", json!({"files": files, "content": SAFE_MAIN, "file_content": SAFE_MAIN})),
        ("Plugin Manager Agent", "completion", json!({"results": {"tests": "passed"}, "test_results": {"phpunit": "ok"}})),
    ];
    for (to, kind, data) in &remaining {
        let result = service
            .initiate_handoff(to, kind, &data.to_string(), None)
            .unwrap();
        let accepted = result.accepted().unwrap_or_else(|| panic!("{kind}: {:?}", result.error()));
        assert!(accepted.security_clearance, "{kind} lost clearance");
    }

    for phase in CANONICAL_PHASES {
        service
            .store()
            .mutate(session, |ctx| ctx.mark_phase_complete(phase))
            .unwrap();
    }

    let status = service.handoff_status().unwrap();
    let kinds: Vec<HandoffKind> = status
        .handoff_history
        .iter()
        .map(|h| h.handoff_type)
        .collect();
    assert_eq!(kinds, HandoffKind::ALL.to_vec());
    assert_eq!(status.statistics.success_rate, 100.0);
    assert!(status.next_recommended_handoffs.is_empty());
    assert_eq!(status.workflow_state.current_agent, Some(Participant::Manager));
    assert_eq!(status.context_info.unwrap().progress, 100.0);

    let security_checks = service
        .hooks()
        .events()
        .into_iter()
        .filter(|e| e.kind == HookKind::SecurityCheck)
        .count();
    assert_eq!(security_checks, 1);
    assert!(service.store().get(Some(session)).unwrap().unwrap().errors().is_empty());

    let metrics = service.session_metrics(Some(session)).unwrap().unwrap();
    assert_eq!(metrics.metrics.report.errors, 0);
}

#[tokio::test]
async fn test_unsafe_tool_output_is_recorded() {
    let dir = TempDir::new().unwrap();
    let service = service_at(dir.path());
    let session = service
        .start_session(ContextPatch::default())
        .unwrap()
        .session_id();

    let tool = WriteFileTool {
        files: vec![PluginFile::new("bad.php", "<?php\necho $_GET['q'];\neval($_POST['c']);")],
    };
    let outcome = service.invoke_tool("Plugin File Generator Agent", &tool, json!({})).await;
    assert!(outcome.success);

    let ctx = service.store().get(Some(session)).unwrap().unwrap();
    let kinds: Vec<&str> = ctx.errors().iter().map(|e| e.error_type.as_str()).collect();
    assert!(kinds.len() >= 3);
    assert!(kinds.iter().all(|k| *k == "security_violation"));

    let health = service.health_status();
    assert_ne!(
        health.checks["security_status"].status,
        plugsmith_core::hooks::HealthLevel::Healthy
    );
}

#[test]
fn test_generation_requires_specification() {
    let dir = TempDir::new().unwrap();
    let service = service_at(dir.path());
    service.start_session(ContextPatch::default()).unwrap();
    let validation = r#"{"name": "x", "slug": "x", "features": ["a"]}"#;

    let first = service
        .initiate_handoff("Plugin File Generator Agent", "generation", "{}", Some(validation))
        .unwrap();
    assert!(!first.is_accepted());

    service
        .initiate_handoff("Plugin Specification Agent", "specification", "{}", None)
        .unwrap();
    let second = service
        .initiate_handoff("Plugin File Generator Agent", "generation", "{}", Some(validation))
        .unwrap();

    let mut keys: Vec<String> = second
        .accepted()
        .unwrap()
        .filtered_data
        .to_value()
        .as_object()
        .unwrap()
        .keys()
        .cloned()
        .collect();
    keys.sort();
    assert_eq!(keys, vec!["context", "features", "plugin_spec", "requirements"]);
}

#[test]
fn test_eval_without_guard_trips_critical() {
    let code = "<?php\n$result = eval($input);\n";
    let violations = Guardrails::default().validate_output(code, OutputKind::Code);

    let eval = violations
        .iter()
        .find(|v| v.message.contains("eval"))
        .unwrap();
    assert_eq!(eval.severity, Severity::High);
    assert!(eval.suggested_fix.as_deref().unwrap().contains("Replace 'eval'"));
    assert!(violations.iter().any(|v| v.severity == Severity::Critical));

    let tripwire = Guardrails::check_and_raise_critical(&violations).unwrap_err();
    assert!(tripwire.violation.is_critical());
}

#[test]
fn test_session_survives_restart() {
    let dir = TempDir::new().unwrap();
    let session = {
        let service = service_at(dir.path());
        let ctx = service
            .start_session(ContextPatch {
                plugin_name: Some("Persisted".into()),
                plugin_slug: Some("persisted".into()),
                ..ContextPatch::default()
            })
            .unwrap();
        service
            .initiate_handoff("Plugin Specification Agent", "specification", "{}", None)
            .unwrap();
        service
            .store()
            .mutate(ctx.session_id(), |c| {
                c.mark_phase_complete(Phase::Planning);
                c.add_error("syntax", "unexpected '}'", None);
            })
            .unwrap();
        service.store().get(Some(ctx.session_id())).unwrap().unwrap()
    };

    let restarted = service_at(dir.path());
    assert!(restarted.store().current().unwrap().is_none());
    let loaded = restarted.store().load(session.session_id()).unwrap().unwrap();

    assert_eq!(loaded, session);
    assert_eq!(loaded.errors()[0].agent.as_deref(), Some("Plugin Specification Agent"));
    assert_eq!(restarted.store().current_id().unwrap(), Some(session.session_id()));

    let listed = restarted.store().list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].plugin_name.as_deref(), Some("Persisted"));
}

#[test]
fn test_reset_restarts_sequence() {
    let dir = TempDir::new().unwrap();
    let service = service_at(dir.path());
    service.start_session(ContextPatch::default()).unwrap();
    service
        .initiate_handoff("Plugin Specification Agent", "specification", "{}", None)
        .unwrap();
    service.reset_workflow().unwrap();

    let result = service
        .initiate_handoff("Plugin File Generator Agent", "generation", "{}", None)
        .unwrap();
    assert_eq!(
        result.error().unwrap().to_string(),
        "Handoff generation requires specification to be completed first"
    );
}
