#![cfg(feature = "web")]

use chrono::Duration;
use predictables::Error;
use predictables::login::{SessionStore, UserStore};
use predictables::validation::Registration;
use std::fs;
use tempfile::tempdir;

fn ada() -> Registration {
    Registration {
        username: "ada".to_string(),
        email: "ada@example.com".to_string(),
        password: "analytical-engine".to_string(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
    }
}

#[test]
fn open_creates_an_empty_users_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("database/users.json");

    let store = UserStore::open(&path).unwrap();
    assert!(store.is_empty());
    assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
}

#[test]
fn registered_users_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("users.json");

    let store = UserStore::open(&path).unwrap();
    let user = store.register(&ada()).unwrap();
    assert_ne!(user.password_hash, "analytical-engine");
    assert!(!fs::read_to_string(&path).unwrap().contains("analytical-engine"));

    let reopened = UserStore::open(&path).unwrap();
    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened.get_by_username("ada"), Some(user.clone()));
    assert_eq!(reopened.get_by_email("ada@example.com"), Some(user));
}

#[test]
fn duplicates_are_rejected_by_the_pipeline() {
    let dir = tempdir().unwrap();
    let store = UserStore::open(dir.path().join("users.json")).unwrap();
    store.register(&ada()).unwrap();

    let err = store.register(&ada()).unwrap_err();
    assert_eq!(err.to_string(), "User already exists");

    let same_email = Registration {
        username: "countess".to_string(),
        ..ada()
    };
    let err = store.register(&same_email).unwrap_err();
    assert_eq!(err.to_string(), "Email is already registered");
    assert_eq!(store.len(), 1);
}

#[test]
fn verify_checks_the_password_hash() {
    let dir = tempdir().unwrap();
    let store = UserStore::open(dir.path().join("users.json")).unwrap();
    store.register(&ada()).unwrap();

    assert!(store.verify("ada", "analytical-engine").unwrap());
    assert!(!store.verify("ada", "difference-engine").unwrap());
    assert!(!store.verify("babbage", "analytical-engine").unwrap());
}

#[test]
fn change_password_flow() {
    let dir = tempdir().unwrap();
    let store = UserStore::open(dir.path().join("users.json")).unwrap();
    store.register(&ada()).unwrap();

    let err = store
        .change_password("ada", "wrong", "new-password", "new-password")
        .unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));

    let err = store
        .change_password("ada", "analytical-engine", "new-password", "other-password")
        .unwrap_err();
    assert!(matches!(err, Error::Validation { field: "confirm_password", .. }));

    let err = store
        .change_password("ada", "analytical-engine", "short", "short")
        .unwrap_err();
    assert_eq!(err.to_string(), "Password is not at least 8 characters long");

    store
        .change_password("ada", "analytical-engine", "new-password", "new-password")
        .unwrap();
    assert!(store.verify("ada", "new-password").unwrap());
    assert!(!store.verify("ada", "analytical-engine").unwrap());
}

#[test]
fn sessions_validate_and_revoke() {
    let sessions = SessionStore::new(Duration::hours(1));
    let token = sessions.create("ada").unwrap();

    assert_eq!(sessions.validate(&token).as_deref(), Some("ada"));
    assert_eq!(sessions.validate("not-a-token"), None);

    assert!(sessions.revoke(&token));
    assert!(!sessions.revoke(&token));
    assert_eq!(sessions.validate(&token), None);
}

#[test]
fn expired_sessions_are_invalid() {
    let sessions = SessionStore::new(Duration::seconds(-1));
    let token = sessions.create("ada").unwrap();

    assert_eq!(sessions.validate(&token), None);
    assert!(!sessions.revoke(&token));
}

#[test]
fn expired_sessions_are_purged_when_new_ones_start() {
    let sessions = SessionStore::new(Duration::seconds(-1));
    for _ in 0..3 {
        sessions.create("ada").unwrap();
    }
    assert_eq!(sessions.len(), 1);

    let live = SessionStore::new(Duration::hours(1));
    live.create("ada").unwrap();
    live.create("grace").unwrap();
    assert_eq!(live.len(), 2);
}

#[test]
fn lifetimes_past_the_clock_fail_without_panicking() {
    let sessions = SessionStore::new(Duration::hours(3_000_000_000));
    assert!(matches!(sessions.create("ada"), Err(Error::Internal(_))));
    assert!(sessions.is_empty());
}

// Swap the users file for a directory so the next save fails
fn break_users_file(path: &std::path::Path) {
    fs::remove_file(path).unwrap();
    fs::create_dir(path).unwrap();
}

#[test]
fn failed_registration_save_keeps_nothing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("users.json");
    let store = UserStore::open(&path).unwrap();
    break_users_file(&path);

    let err = store.register(&ada()).unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
    assert!(store.is_empty());
    assert_eq!(store.get_by_username("ada"), None);
    assert!(!store.verify("ada", "analytical-engine").unwrap());
}

#[test]
fn failed_password_save_keeps_the_old_password() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("users.json");
    let store = UserStore::open(&path).unwrap();
    store.register(&ada()).unwrap();
    break_users_file(&path);

    let err = store
        .change_password("ada", "analytical-engine", "new-password", "new-password")
        .unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
    assert!(store.verify("ada", "analytical-engine").unwrap());
    assert!(!store.verify("ada", "new-password").unwrap());
}
