use predictables::config::MAX_SESSION_HOURS;
use predictables::{Error, Settings};
use std::fs;
use tempfile::tempdir;

#[test]
fn settings_file_overrides_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("predictables.toml");
    fs::write(&path, "chunk_dir = \"/srv/chunks\"\nsession_hours = 12\n").unwrap();

    let settings = Settings::from_file(&path).unwrap();
    assert_eq!(settings.chunk_dir.to_str(), Some("/srv/chunks"));
    assert_eq!(settings.session_hours, 12);
    assert_eq!(settings.bind_addr, Settings::default().bind_addr);
    assert_eq!(settings.session_ttl().unwrap().num_hours(), 12);
}

#[test]
fn session_hours_out_of_range_are_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("predictables.toml");

    for hours in [0, -3, MAX_SESSION_HOURS + 1, 3_000_000_000] {
        fs::write(&path, format!("session_hours = {hours}\n")).unwrap();
        assert!(
            matches!(Settings::from_file(&path), Err(Error::Config(_))),
            "session_hours = {hours}"
        );
    }
}

#[test]
fn hand_built_settings_are_checked_too() {
    let settings = Settings {
        session_hours: i64::MAX,
        ..Settings::default()
    };
    assert!(matches!(settings.validate(), Err(Error::Config(_))));
    assert!(Settings::default().validate().is_ok());
}
