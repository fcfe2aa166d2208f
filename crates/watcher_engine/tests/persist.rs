use std::fs;

use tempfile::TempDir;
use watcher_engine::{
    ensure_state_dir, read_optional, remove_if_exists, write_atomically, PersistError,
};

#[test]
fn creates_missing_state_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("space-watcher");
    assert!(!new_dir.exists());
    ensure_state_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn state_dir_that_is_a_file_is_rejected() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let err = ensure_state_dir(&file_path).unwrap_err();
    assert!(matches!(err, PersistError::StateDir { .. }));
}

#[test]
fn atomic_write_replaces_existing() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("wakeup.ron");

    write_atomically(&path, "first").unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "first");

    write_atomically(&path, "second").unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "second");

    // Only the target is left behind, no temp siblings.
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
}

#[test]
fn no_partial_file_on_error() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("not_a_dir");
    fs::write(&blocker, "x").unwrap();

    let result = write_atomically(&blocker.join("settings.ron"), "data");
    assert!(result.is_err());
    assert_eq!(fs::read_to_string(&blocker).unwrap(), "x");
}

#[test]
fn read_and_remove_tolerate_missing_files() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("wakeup.ron");

    assert_eq!(read_optional(&path).unwrap(), None);
    assert!(!remove_if_exists(&path).unwrap());

    write_atomically(&path, "due").unwrap();
    assert_eq!(read_optional(&path).unwrap().as_deref(), Some("due"));
    assert!(remove_if_exists(&path).unwrap());
    assert!(!path.exists());
}
