use super::*;

#[test]
fn test_invalid_kind_lists_valid_names() {
    let err = Error::InvalidHandoffKind {
        given: "deploy".to_string(),
        valid: "specification, generation".to_string(),
    };
    assert!(err.to_string().contains("deploy"));
    assert!(err
        .suggestion()
        .is_some_and(|s| s.contains("specification, generation")));
}

#[test]
fn test_format_error_for_cli() {
    let err = Error::SessionNotFound(Uuid::nil());
    let output = format_error_for_cli(&err);
    assert!(output.contains("was not found"));
    assert!(output.contains("sessions list"));
}

#[test]
fn test_internal_has_no_suggestion() {
    let err = Error::Internal("boom".to_string());
    assert!(err.suggestion().is_none());
    assert_eq!(format_error_for_cli(&err), "❌ Internal error: boom");
}

#[test]
fn test_lock_poison_maps_to_internal() {
    use std::sync::{Arc, Mutex};

    let lock = Arc::new(Mutex::new(0));
    let poisoner = Arc::clone(&lock);
    let _ = std::thread::spawn(move || {
        let _guard = poisoner.lock().unwrap();
        panic!("poison");
    })
    .join();

    let err = lock.lock().map_err(handle_lock_poison).unwrap_err();
    assert!(matches!(err, Error::Internal(msg) if msg.starts_with("Lock poisoned")));
}

#[test]
fn test_error_type_tags() {
    assert_eq!(Error::InvalidPhase("x".into()).error_type(), "invalid_phase");
    assert_eq!(
        Error::Persistence("disk full".into()).error_type(),
        "persistence"
    );
}
