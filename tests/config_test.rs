//! Configuration loading tests
//!
//! Tests that configuration files load correctly and provide expected
//! default values

use std::fs;
use storyteller::session::config::Config;
use storyteller::speech::BackendKind;
use storyteller::story::StoryLength;
use tempfile::TempDir;

#[test]
fn test_config_created_with_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(".storyteller.cfg");

    let config = Config::load_from(&path).expect("Failed to load config");
    assert!(path.exists());
    assert_eq!(config.path(), path.as_path());

    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("[speech]"));
    assert!(written.contains("[story]"));
    assert!(written.contains("credential_env=STORYTELLER_API_KEY"));

    assert_eq!(config.backend(), BackendKind::Auto);
    let story = config.story_defaults();
    assert_eq!(story.genre, "any");
    assert_eq!(story.length, StoryLength::Medium);
}

#[test]
fn test_saved_voice_survives_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(".storyteller.cfg");

    let mut config = Config::load_from(&path).unwrap();
    config.set("speech", "voice", "English (Great Britain)");
    config.set("speech", "rate", "1.25");
    config.save().unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.voice().as_deref(), Some("English (Great Britain)"));
    assert_eq!(config.rate(), 1.25);

    // An empty voice means the platform default
    let mut config = config;
    config.set("speech", "voice", "");
    config.save().unwrap();
    assert_eq!(Config::load_from(&path).unwrap().voice(), None);
}

#[test]
fn test_unparsable_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(".storyteller.cfg");
    fs::write(&path, "[speech\nbackend=silent\n").unwrap();

    assert!(Config::load_from(&path).is_err());
}

#[test]
fn test_credential_from_named_variable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(".storyteller.cfg");
    fs::write(
        &path,
        "[generator]\ncredential_env=STORYTELLER_CONFIG_TEST_KEY\n",
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.credential_env(), "STORYTELLER_CONFIG_TEST_KEY");

    std::env::set_var("STORYTELLER_CONFIG_TEST_KEY", "secret");
    assert_eq!(config.credential().as_deref(), Some("secret"));
    std::env::set_var("STORYTELLER_CONFIG_TEST_KEY", "  ");
    assert_eq!(config.credential(), None);
    std::env::remove_var("STORYTELLER_CONFIG_TEST_KEY");
}
