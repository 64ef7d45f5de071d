//! Tests for path utilities

use std::path::PathBuf;
use taskpilot_config::paths::{config_path, data_dir, expand_tilde};

#[test]
fn test_data_dir() {
    let dir = data_dir();
    let home = dirs::home_dir().expect("No home dir");

    assert_eq!(dir, home.join(".taskpilot"));
}

#[test]
fn test_config_path() {
    let path = config_path();

    assert!(path.ends_with(".taskpilot/config.json"));
    assert_eq!(path.parent(), Some(data_dir().as_path()));
}

#[test]
fn test_expand_tilde() {
    let home = dirs::home_dir().expect("Should have home dir");

    assert_eq!(expand_tilde("~/notes.txt"), home.join("notes.txt"));
    assert_eq!(expand_tilde("~"), home);
    assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
    assert_eq!(expand_tilde("rel/path"), PathBuf::from("rel/path"));
}

#[test]
fn test_expand_tilde_only_leading() {
    assert_eq!(expand_tilde("a/~/b"), PathBuf::from("a/~/b"));
    assert_eq!(expand_tilde("~user/x"), PathBuf::from("~user/x"));
}
