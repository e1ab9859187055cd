use super::*;
use crate::config::HookConfig;
use crate::context::ContextStore;
use crate::guardrails::Guardrails;
use crate::hooks::HookKind;
use serde_json::json;
use tempfile::TempDir;

struct SlowTool;

#[async_trait]
impl AgentTool for SlowTool {
    fn name(&self) -> &str {
        "run_phpunit"
    }

    async fn call(&self, _args: Value) -> Result<ToolOutput, ToolError> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Ok(ToolOutput::Text("never".to_string()))
    }
}

fn setup() -> (TempDir, Arc<ContextStore>, Arc<HookBus>) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(ContextStore::with_path(dir.path()).unwrap());
    let hooks = Arc::new(HookBus::new(
        HookConfig::default(),
        Arc::clone(&store),
        Arc::new(Guardrails::default()),
    ));
    (dir, store, hooks)
}

fn mock_tool(name: &'static str, output: Result<ToolOutput, ToolError>) -> MockAgentTool {
    let mut tool = MockAgentTool::new();
    tool.expect_name().return_const(name.to_string());
    tool.expect_call().times(1).returning(move |_| output.clone());
    tool
}

#[test]
fn test_from_raw() {
    let files = ToolOutput::from_raw(r#"[{"path": "a.php", "content": "<?php"}]"#);
    assert_eq!(
        files,
        ToolOutput::Files(vec![PluginFile::new("a.php", "<?php")])
    );
    assert_eq!(
        ToolOutput::from_raw("plain words"),
        ToolOutput::Text("plain words".to_string())
    );
    assert_eq!(ToolOutput::from_raw("plain words").size(), 11);
}

#[tokio::test]
async fn test_successful_invocation_fires_hooks() {
    let (_dir, store, hooks) = setup();
    let session = store.create().unwrap().session_id();
    let invoker = ToolInvoker::new(Arc::clone(&hooks), &ToolConfig::default());

    let tool = mock_tool("validate_php", Ok(ToolOutput::Text("No syntax errors detected".into())));
    let outcome = invoker
        .invoke("Plugin Compliance Agent", &tool, json!({"path": "a.php"}), Some(session))
        .await;

    assert!(outcome.success);
    assert!(!outcome.timed_out);
    assert_eq!(outcome.tool, "validate_php");

    let kinds: Vec<HookKind> = hooks.events().iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![HookKind::ToolStart, HookKind::ToolEnd]);

    let ctx = store.get(Some(session)).unwrap().unwrap();
    assert_eq!(ctx.messages().len(), 2);
    assert!(ctx.errors().is_empty());
}

#[tokio::test]
async fn test_tool_error_becomes_failed_outcome() {
    let (_dir, store, hooks) = setup();
    let session = store.create().unwrap().session_id();
    let invoker = ToolInvoker::new(Arc::clone(&hooks), &ToolConfig::default());

    let tool = mock_tool(
        "wp_cli",
        Err(ToolError::ExitStatus {
            code: 127,
            stderr: "wp: command not found".to_string(),
        }),
    );
    let outcome = invoker
        .invoke("Plugin Testing Agent", &tool, json!({}), Some(session))
        .await;

    assert!(!outcome.success);
    assert!(outcome.error.as_deref().unwrap().contains("status 127"));

    let ctx = store.get(Some(session)).unwrap().unwrap();
    assert_eq!(ctx.errors().len(), 1);
    assert_eq!(ctx.errors()[0].error_type, "tool_execution");
    assert_eq!(hooks.error_analysis().tool_errors.get("wp_cli"), Some(&1));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_becomes_failed_outcome() {
    let (_dir, _store, hooks) = setup();
    let invoker = ToolInvoker::new(Arc::clone(&hooks), &ToolConfig::default())
        .with_timeout(Duration::from_secs(5));

    let outcome = invoker
        .invoke("Plugin Testing Agent", &SlowTool, json!({}), None)
        .await;

    assert!(!outcome.success);
    assert!(outcome.timed_out);
    assert!(outcome.error.unwrap().contains("timed out"));
    assert!(hooks.events().iter().any(|e| e.kind == HookKind::ToolEnd && !e.success));
}

#[tokio::test]
async fn test_watched_tool_output_is_security_checked() {
    let (_dir, store, hooks) = setup();
    let session = store.create().unwrap().session_id();
    let invoker = ToolInvoker::new(Arc::clone(&hooks), &ToolConfig::default());

    let files = vec![PluginFile::new("admin.php", "<?php\nshell_exec($_GET['cmd']);")];
    let tool = mock_tool("generate_plugin_files", Ok(ToolOutput::Files(files)));
    let outcome = invoker
        .invoke("Plugin File Generator Agent", &tool, json!({}), Some(session))
        .await;
    assert!(outcome.success);

    let security: Vec<_> = hooks
        .events()
        .into_iter()
        .filter(|e| e.kind == HookKind::SecurityCheck)
        .collect();
    assert_eq!(security.len(), 1);
    assert!(!security[0].success);

    let ctx = store.get(Some(session)).unwrap().unwrap();
    assert!(ctx
        .errors()
        .iter()
        .any(|e| e.error_type == "security_violation" && e.message.contains("shell_exec")));
}

#[tokio::test]
async fn test_unwatched_tool_is_not_checked() {
    let (_dir, _store, hooks) = setup();
    let invoker = ToolInvoker::new(Arc::clone(&hooks), &ToolConfig::default());

    let tool = mock_tool("read_file", Ok(ToolOutput::Text("<?php eval($x);".into())));
    invoker.invoke("Plugin Manager Agent", &tool, json!({}), None).await;

    assert!(!hooks
        .events()
        .iter()
        .any(|e| e.kind == HookKind::SecurityCheck));
}
