use super::*;
use crate::config::HookConfig;
use crate::context::{ContextPatch, ContextStore, MessageKind, Phase};
use crate::error::UserFriendlyError;
use crate::guardrails::Guardrails;
use crate::hooks::{HookBus, HookKind};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    store: Arc<ContextStore>,
    hooks: Arc<HookBus>,
    coordinator: HandoffCoordinator,
}

fn setup() -> Fixture {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(ContextStore::with_path(dir.path()).unwrap());
    let hooks = Arc::new(HookBus::new(
        HookConfig::default(),
        Arc::clone(&store),
        Arc::new(Guardrails::default()),
    ));
    let coordinator = HandoffCoordinator::new(Arc::clone(&store), Arc::clone(&hooks));
    Fixture {
        _dir: dir,
        store,
        hooks,
        coordinator,
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

fn request(kind: HandoffKind) -> HandoffRequest {
    let (from, to) = match kind {
        HandoffKind::Specification => (Participant::Manager, Participant::Specification),
        HandoffKind::Generation => (Participant::Specification, Participant::FileGenerator),
        HandoffKind::Compliance => (Participant::FileGenerator, Participant::Compliance),
        HandoffKind::Testing => (Participant::Compliance, Participant::Testing),
        HandoffKind::Security => (Participant::Manager, Participant::Compliance),
        HandoffKind::Completion => (Participant::Testing, Participant::Manager),
    };
    HandoffRequest::new(from.name(), to.name(), kind)
}

fn accept(fx: &Fixture, kind: HandoffKind, session: Option<uuid::Uuid>) -> HandoffAccepted {
    match fx.coordinator.create_handoff(request(kind), session).unwrap() {
        HandoffResult::Accepted(accepted) => accepted,
        HandoffResult::Rejected(r) => panic!("{} rejected: {}", kind, r.error),
    }
}

fn rejection(result: HandoffResult) -> HandoffError {
    match result {
        HandoffResult::Rejected(r) => r.error,
        HandoffResult::Accepted(a) => panic!("{} unexpectedly accepted", a.handoff_type),
    }
}

#[test]
fn test_kind_parse() {
    assert_eq!("generation".parse::<HandoffKind>().unwrap(), HandoffKind::Generation);
    assert!(" Specification".parse::<HandoffKind>().is_err());
    assert!("Testing".parse::<HandoffKind>().is_err());

    let err = "deployment".parse::<HandoffKind>().unwrap_err();
    assert_eq!(err.error_type(), "invalid_handoff_type");
    assert!(err
        .to_string()
        .contains("specification, generation, compliance, testing, security, completion"));
}

#[test]
fn test_prerequisites_all_required() {
    use HandoffKind::*;

    assert!(Specification.is_unlocked_by(&[]));
    assert!(!Generation.is_unlocked_by(&[]));
    assert!(!Security.is_unlocked_by(&[Specification, Generation]));
    assert!(Security.is_unlocked_by(&[Specification, Generation, Compliance]));
    assert!(!Completion.is_unlocked_by(&[Security]));
    assert!(Completion.is_unlocked_by(&[Testing, Security]));
    assert_eq!(Completion.missing_prerequisites(&[Testing]), vec![Security]);
}

#[test]
fn test_participant_names() {
    let p: Participant = "Plugin File Generator Agent".parse().unwrap();
    assert_eq!(p, Participant::FileGenerator);
    assert!(" Plugin Testing Agent".parse::<Participant>().is_err());
    assert!("Plugin Deploy Agent".parse::<Participant>().is_err());

    assert_eq!(
        serde_json::to_value(Participant::Testing).unwrap(),
        json!("Plugin Testing Agent")
    );
    assert_eq!(Participant::Manager.available_handoffs().len(), 4);
    assert!(Participant::ALL.iter().skip(1).all(|p| p
        .available_handoffs()
        .contains(&(Participant::Manager, HandoffKind::Completion))));
}

#[test]
fn test_projection_narrows_payload() {
    let data = object(json!({
        "plugin_spec": {"name": "Hello"},
        "features": ["shortcode"],
        "requirements": null,
        "user_input": "dropped",
        "api_key": "dropped"
    }));
    let payload = HandoffPayload::project(HandoffKind::Generation, &data).unwrap();
    assert_eq!(payload.kind(), HandoffKind::Generation);

    let value = serde_json::to_value(&payload).unwrap();
    assert_eq!(
        value,
        json!({"plugin_spec": {"name": "Hello"}, "requirements": [], "features": ["shortcode"]})
    );
}

#[test]
fn test_projection_rejects_wrong_shape() {
    let data = object(json!({"features": "shortcode"}));
    assert!(HandoffPayload::project(HandoffKind::Generation, &data).is_err());
}

#[test]
fn test_source_files() {
    let data = object(json!({
        "generated_files": [
            {"path": "hello.php", "content": "<?php echo 1;"},
            "readme.txt",
            {"content": "<?php"}
        ],
        "file_content": "<?php eval($x);"
    }));
    let payload = HandoffPayload::project(HandoffKind::Security, &data).unwrap();
    let files = payload.source_files();

    let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["hello.php", "unknown", "file_content"]);
}

#[test]
fn test_specification_always_first_eligible() {
    let fx = setup();
    let accepted = accept(&fx, HandoffKind::Specification, None);
    assert_eq!(accepted.handoff_id, 0);
    assert!(accepted.filtered_data.context.is_none());

    let again = accept(&fx, HandoffKind::Specification, None);
    assert_eq!(again.handoff_id, 1);
}

#[test]
fn test_sequence_enforced_for_every_kind() {
    use HandoffKind::*;
    let paths: [(HandoffKind, &[HandoffKind]); 5] = [
        (Generation, &[Specification]),
        (Compliance, &[Specification, Generation]),
        (Testing, &[Specification, Generation, Compliance]),
        (Security, &[Specification, Generation, Compliance]),
        (Completion, &[Specification, Generation, Compliance, Testing, Security]),
    ];

    for (kind, path) in paths {
        let fx = setup();
        let session = fx.store.create().unwrap().session_id();

        let err = rejection(fx.coordinator.create_handoff(request(kind), Some(session)).unwrap());
        assert!(matches!(err, HandoffError::OutOfSequence { .. }), "{kind}: {err}");
        assert!(fx.coordinator.history(Some(session)).unwrap().is_empty());

        for prerequisite in path {
            accept(&fx, *prerequisite, Some(session));
        }
        accept(&fx, kind, Some(session));
    }
}

#[test]
fn test_out_of_sequence_message() {
    let fx = setup();
    let session = fx.store.create().unwrap().session_id();
    let err = rejection(
        fx.coordinator
            .create_handoff(request(HandoffKind::Completion), Some(session))
            .unwrap(),
    );
    assert_eq!(
        err.to_string(),
        "Handoff completion requires testing and security to be completed first"
    );
    assert_eq!(err.error_type(), "out_of_sequence");
}

#[test]
fn test_security_needs_compliance() {
    let fx = setup();
    let session = Some(fx.store.create().unwrap().session_id());
    accept(&fx, HandoffKind::Specification, session);
    accept(&fx, HandoffKind::Generation, session);

    let err = rejection(
        fx.coordinator
            .create_handoff(request(HandoffKind::Security), session)
            .unwrap(),
    );
    assert_eq!(
        err.to_string(),
        "Handoff security requires compliance to be completed first"
    );
    assert_eq!(fx.coordinator.history(session).unwrap().len(), 2);

    accept(&fx, HandoffKind::Compliance, session);
    let accepted = accept(&fx, HandoffKind::Security, session);
    assert_eq!(accepted.handoff_id, 3);
}

#[test]
fn test_sessions_have_separate_chains() {
    let fx = setup();
    let first = Some(fx.store.create().unwrap().session_id());
    let second = Some(fx.store.create().unwrap().session_id());
    accept(&fx, HandoffKind::Specification, first);

    let err = rejection(
        fx.coordinator
            .create_handoff(request(HandoffKind::Generation), second)
            .unwrap(),
    );
    assert!(matches!(err, HandoffError::OutOfSequence { .. }));
    assert!(fx.coordinator.history(second).unwrap().is_empty());
    assert!(fx.coordinator.check_sequence(HandoffKind::Generation, first).unwrap());
    assert!(!fx.coordinator.check_sequence(HandoffKind::Generation, second).unwrap());

    let accepted = accept(&fx, HandoffKind::Specification, second);
    assert_eq!(accepted.handoff_id, 0);
    assert_eq!(fx.coordinator.history(first).unwrap().len(), 1);
}

#[test]
fn test_no_session_skips_sequence() {
    let fx = setup();
    let accepted = accept(&fx, HandoffKind::Completion, None);
    assert_eq!(accepted.handoff_id, 0);
    assert!(fx.coordinator.check_sequence(HandoffKind::Security, None).unwrap());

    let req = request(HandoffKind::Generation).with_validation(object(json!({"name": "x"})));
    let err = rejection(fx.coordinator.create_handoff(req, None).unwrap());
    assert!(matches!(err, HandoffError::MissingFields { .. }));
}

#[test]
fn test_persist_failure_leaves_state_unchanged() {
    let fx = setup();
    let session = fx.store.create().unwrap().session_id();
    std::fs::remove_dir_all(fx.store.context_dir()).unwrap();

    let result = fx
        .coordinator
        .create_handoff(request(HandoffKind::Specification), Some(session));
    assert!(result.is_err());

    let ctx = fx.store.get(Some(session)).unwrap().unwrap();
    assert!(ctx.current_agent.is_none());
    assert!(ctx.messages().is_empty());
    assert!(fx.coordinator.history(Some(session)).unwrap().is_empty());
    assert!(fx.hooks.events().iter().all(|e| e.kind != HookKind::Handoff));
}

#[test]
fn test_generation_scenario() {
    let fx = setup();
    let session = fx.store.create().unwrap().session_id();
    let generation = || {
        request(HandoffKind::Generation)
            .with_validation(object(json!({"name": "x", "slug": "x", "features": ["a"]})))
            .with_data(object(json!({
                "plugin_spec": {"name": "x"},
                "features": ["a"],
                "file_content": "ignored"
            })))
    };

    let err = rejection(fx.coordinator.create_handoff(generation(), Some(session)).unwrap());
    assert!(matches!(err, HandoffError::OutOfSequence { .. }));

    accept(&fx, HandoffKind::Specification, Some(session));
    let result = fx.coordinator.create_handoff(generation(), Some(session)).unwrap();
    let accepted = result.accepted().unwrap();

    let keys: BTreeSet<String> = accepted
        .filtered_data
        .to_value()
        .as_object()
        .unwrap()
        .keys()
        .cloned()
        .collect();
    let expected: BTreeSet<String> = ["context", "plugin_spec", "requirements", "features"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(keys, expected);
    assert_eq!(
        accepted.filtered_data.context.as_ref().unwrap().session_id,
        session
    );
}

#[test]
fn test_invalid_participant_leaves_chain_unchanged() {
    let fx = setup();
    accept(&fx, HandoffKind::Specification, None);

    let result = fx
        .coordinator
        .create_handoff(
            HandoffRequest::new("Rogue Agent", "Plugin Testing Agent", HandoffKind::Specification),
            None,
        )
        .unwrap();
    let err = rejection(result);

    assert_eq!(
        err.to_string(),
        "Invalid agent names: Rogue Agent → Plugin Testing Agent"
    );
    assert_eq!(err.error_type(), "invalid_agent");
    assert_eq!(fx.coordinator.history(None).unwrap().len(), 1);

    let last = fx.hooks.events().pop().unwrap();
    assert_eq!(last.kind, HookKind::Error);
    assert_eq!(last.metadata["error_type"], "handoff_rejected");
}

#[test]
fn test_missing_fields_listed() {
    let fx = setup();
    accept(&fx, HandoffKind::Specification, None);

    let req = request(HandoffKind::Generation).with_validation(object(json!({"name": "x"})));
    let err = rejection(fx.coordinator.create_handoff(req, None).unwrap());
    assert_eq!(
        err.to_string(),
        "Missing required fields for generation: slug, features"
    );
}

#[test]
fn test_empty_validation_skips_field_check() {
    let fx = setup();
    let req = request(HandoffKind::Specification).with_validation(Map::new());
    let accepted = fx.coordinator.create_handoff(req, None).unwrap();
    assert!(accepted.is_accepted());
    assert!(fx.coordinator.records(None).unwrap()[0]
        .validation()
        .checked_fields
        .is_empty());
}

#[test]
fn test_validate_data_always_checks() {
    let err = HandoffCoordinator::validate_data(HandoffKind::Security, &Map::new()).unwrap_err();
    assert_eq!(
        err,
        HandoffError::MissingFields {
            kind: HandoffKind::Security,
            fields: vec!["files".to_string(), "content".to_string()],
        }
    );
    assert!(HandoffCoordinator::validate_data(
        HandoffKind::Completion,
        &object(json!({"results": {}}))
    )
    .is_ok());
}

#[test]
fn test_failed_session_rejects() {
    let fx = setup();
    let session = fx.store.create().unwrap().session_id();
    fx.store
        .update(
            session,
            ContextPatch {
                current_phase: Some(Phase::Failed),
                ..ContextPatch::default()
            },
        )
        .unwrap();

    let err = rejection(
        fx.coordinator
            .create_handoff(request(HandoffKind::Specification), Some(session))
            .unwrap(),
    );
    assert_eq!(err, HandoffError::FailedState);

    let ctx = fx.store.get(Some(session)).unwrap().unwrap();
    assert!(ctx.messages().is_empty());
    assert!(ctx.current_agent.is_none());
}

#[test]
fn test_invalid_payload_rejected() {
    let fx = setup();
    let req = request(HandoffKind::Specification).with_data(object(json!({"requirements": 5})));
    let err = rejection(fx.coordinator.create_handoff(req, None).unwrap());
    assert!(matches!(err, HandoffError::InvalidPayload { kind: HandoffKind::Specification, .. }));
}

#[test]
fn test_unknown_session_rejected() {
    let fx = setup();
    let missing = uuid::Uuid::new_v4();
    let err = rejection(
        fx.coordinator
            .create_handoff(request(HandoffKind::Specification), Some(missing))
            .unwrap(),
    );
    assert_eq!(err, HandoffError::UnknownSession(missing));
}

#[test]
fn test_accepted_handoff_updates_session() {
    let fx = setup();
    let session = fx.store.create().unwrap().session_id();
    accept(&fx, HandoffKind::Specification, Some(session));

    let ctx = fx.store.get(Some(session)).unwrap().unwrap();
    assert_eq!(ctx.current_agent.as_deref(), Some("Plugin Specification Agent"));
    let handoff_message = ctx
        .messages()
        .iter()
        .find(|m| m.kind == MessageKind::Handoff)
        .unwrap();
    assert_eq!(handoff_message.agent, "Plugin Manager Agent");
    assert_eq!(
        handoff_message.message,
        "Handing off to Plugin Specification Agent for specification"
    );

    let reloaded = fx.store.load(session).unwrap().unwrap();
    assert_eq!(reloaded.current_agent, ctx.current_agent);

    let event = fx.hooks.events().pop().unwrap();
    assert_eq!(event.kind, HookKind::Handoff);
    assert_eq!(event.session_id, Some(session));
    assert_eq!(event.metadata["handoff_type"], "specification");
}

#[test]
fn test_instructions_include_dynamic_clauses() {
    let fx = setup();
    let session = fx.store.create().unwrap().session_id();
    fx.store
        .mutate(session, |ctx| {
            ctx.add_error("syntax", "unexpected token", None);
            ctx.add_error("syntax", "missing semicolon", None);
            ctx.advanced_tests_requested = vec!["phpunit".into(), "e2e".into()];
        })
        .unwrap();

    let req = request(HandoffKind::Specification)
        .with_data(object(json!({"user_input": "a plugin", "requirements": ["a", "b", "c"]})));
    let result = fx.coordinator.create_handoff(req, Some(session)).unwrap();

    assert_eq!(
        result.accepted().unwrap().instructions,
        "Analyze the user requirements and create a detailed plugin specification.\
         \n\nNote: Previous errors encountered: 2 issues. Please address these patterns.\
         \n\nAdvanced testing requested: phpunit, e2e\
         \n\nSpecific requirements: 3 items to address."
    );
}

#[test]
fn test_previous_errors_snapshot() {
    let fx = setup();
    let session = fx.store.create().unwrap().session_id();
    fx.store
        .mutate(session, |ctx| {
            for i in 0..7 {
                ctx.add_error("tool", format!("error {}", i), None);
            }
        })
        .unwrap();
    accept(&fx, HandoffKind::Specification, Some(session));
    fx.store
        .mutate(session, |ctx| ctx.add_error("tool", "later", None))
        .unwrap();

    let record = &fx.coordinator.records(Some(session)).unwrap()[0];
    assert_eq!(record.previous_errors().len(), 5);
    assert_eq!(record.previous_errors()[0].message, "error 2");
    assert_eq!(fx.coordinator.history(Some(session)).unwrap()[0].previous_errors, 5);
}

#[test]
fn test_security_clearance_reflects_findings() {
    let fx = setup();
    accept(&fx, HandoffKind::Specification, None);
    accept(&fx, HandoffKind::Generation, None);

    let risky = request(HandoffKind::Compliance).with_data(object(json!({
        "generated_files": [{"path": "x.php", "content": "<?php\nif (!defined('ABSPATH')) exit;\neval($_POST['c']);"}]
    })));
    let accepted = fx.coordinator.create_handoff(risky, None).unwrap();
    assert!(!accepted.accepted().unwrap().security_clearance);

    let clean = request(HandoffKind::Testing).with_data(object(json!({
        "generated_files": [{"path": "x.php", "content": "<?php\nif (!defined('ABSPATH')) exit;\n"}]
    })));
    let accepted = fx.coordinator.create_handoff(clean, None).unwrap();
    assert!(accepted.accepted().unwrap().security_clearance);

    let history = fx.coordinator.history(None).unwrap();
    assert_eq!(
        history.iter().map(|h| h.security_clearance).collect::<Vec<_>>(),
        vec![true, true, false, true]
    );
}

#[test]
fn test_workflow_state_and_reset() {
    let fx = setup();
    let session = Some(fx.store.create().unwrap().session_id());
    accept(&fx, HandoffKind::Specification, session);
    accept(&fx, HandoffKind::Generation, session);
    accept(&fx, HandoffKind::Specification, None);

    let state = fx.coordinator.workflow_state(session).unwrap();
    assert_eq!(state.current_agent, Some(Participant::FileGenerator));
    assert_eq!(state.completed_handoffs, 2);
    assert_eq!(
        state.workflow_state[&HandoffKind::Generation].agent,
        Participant::Specification
    );
    assert_eq!(
        fx.coordinator.completed_kinds(session).unwrap(),
        vec![HandoffKind::Specification, HandoffKind::Generation]
    );

    let previous = fx.coordinator.reset(session).unwrap();
    assert_eq!(previous, state);

    let after = fx.coordinator.workflow_state(session).unwrap();
    assert_eq!(after.completed_handoffs, 0);
    assert!(after.current_agent.is_none());
    assert!(after.workflow_state.is_empty());
    assert!(!fx.coordinator.check_sequence(HandoffKind::Generation, session).unwrap());
    assert_eq!(fx.coordinator.history(None).unwrap().len(), 1);
}

#[test]
fn test_result_serialization() {
    let fx = setup();
    let session = fx.store.create().unwrap().session_id();
    let result = fx
        .coordinator
        .create_handoff(request(HandoffKind::Testing), Some(session))
        .unwrap();

    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["outcome"], "rejected");
    assert_eq!(value["handoff_type"], "testing");
    assert_eq!(value["error"]["error_type"], "out_of_sequence");

    let accepted = serde_json::to_value(
        fx.coordinator
            .create_handoff(request(HandoffKind::Specification), None)
            .unwrap(),
    )
    .unwrap();
    assert_eq!(accepted["outcome"], "accepted");
    assert_eq!(accepted["to_agent"], "Plugin Specification Agent");
    assert!(accepted["filtered_data"].get("context").is_none());
}
