use std::fs;

use project::{load_or_default, load_session, parse_session, ConfigError};
use tempfile::tempdir;

#[test]
fn test_load_session_fixture() {
    let result = load_session("tests/fixtures/basic-beat.toml");
    assert!(result.is_ok(), "Session loading failed: {:?}", result.as_ref().err());
    let session = result.unwrap();

    assert_eq!(session.session.name, "Basic Beat");
    assert_eq!(session.session.steps, 8);
    assert_eq!(session.session.bpm, 100);
    // Not given in the file
    assert_eq!(session.session.steps_per_beat, 4);

    let instruments = session.instruments();
    assert_eq!(instruments.len(), 3);
    assert_eq!(instruments[0].label, "Kick");
    // Label falls back to the id
    assert_eq!(instruments[1].label, "snare");

    let pattern = session.initial_pattern().unwrap().unwrap();
    assert_eq!(pattern.len(), 3);
    assert_eq!(pattern[0], vec![true, false, false, false, true, false, false, false]);
    assert!(pattern[1][2] && pattern[1][6]);
    assert!(pattern[2].iter().all(|&cell| !cell));
}

#[test]
fn test_out_of_range_bpm_is_clamped() {
    let session = parse_session(
        r#"
        [session]
        name = "Fast"
        bpm = 400

        [[instruments]]
        id = "kick"
        "#,
    )
    .unwrap();
    assert_eq!(session.session.bpm, 180);
    assert_eq!(session.session.steps, 16);
}

#[test]
fn test_bad_pattern_length_is_rejected() {
    let result = parse_session(
        r#"
        [session]
        name = "Broken"
        steps = 4

        [[instruments]]
        id = "kick"
        pattern = "x.x.x"
        "#,
    );
    match result {
        Err(ConfigError::Invalid(msg)) => assert!(msg.contains("kick"), "{}", msg),
        other => panic!("Expected Invalid, got {:?}", other),
    }
}

#[test]
fn test_syntax_error_is_a_parse_error() {
    let result = parse_session("[session\nname = ");
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn test_load_from_temp_dir() {
    let dir = tempdir().expect("Failed to create temp directory");
    let path = dir.path().join("session.toml");
    fs::write(
        &path,
        "[session]\nname = \"Temp\"\nsteps = 4\n\n\
         [[instruments]]\nid = \"clap\"\npattern = \"...x\"\n",
    )
    .expect("Failed to write session file");

    let session = load_or_default(Some(path.as_path())).unwrap();
    assert_eq!(session.session.name, "Temp");
    assert_eq!(
        session.initial_pattern().unwrap(),
        Some(vec![vec![false, false, false, true]])
    );
}

#[test]
fn test_missing_file_is_an_io_error() {
    let dir = tempdir().expect("Failed to create temp directory");
    let result = load_session(dir.path().join("nope.toml"));
    assert!(matches!(result, Err(ConfigError::Io { .. })));
}

use project::get_session_path;

#[test]
fn resolves_dev_or_config_path() {
    let path = get_session_path("my-beat");
    assert!(path.ends_with("my-beat.toml"));
}
