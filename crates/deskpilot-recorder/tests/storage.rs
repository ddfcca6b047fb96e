use chrono::{TimeZone, Utc};
use deskpilot_core::{ErrorCode, MouseButton};
use deskpilot_recorder::{EventData, RecordedEvent, Workflow, WorkflowStorage};
use std::fs;

fn sample(name: &str) -> Workflow {
    Workflow::new(
        name,
        3.3000000000000003,
        vec![
            RecordedEvent::new(EventData::MouseClick { x: 10, y: -4, button: MouseButton::Left }, 0.1 + 0.2),
            RecordedEvent::new(EventData::MouseScroll { x: 10, y: -4, dx: 0, dy: -120 }, 1.0 / 3.0),
            RecordedEvent::new(EventData::KeyPress { key: "shift_r".into() }, 7.0 / 9.0),
        ],
    )
}

#[test]
fn save_then_load_is_exact() {
    let dir = tempfile::tempdir().unwrap();
    let storage = WorkflowStorage::with_dir(dir.path()).unwrap();
    let workflow = sample("round trip");

    let id = storage.save(&workflow).unwrap();
    assert!(id.starts_with("round_trip_"));
    assert!(id.ends_with(".json"));
    assert!(storage.exists(&id));

    let loaded = storage.load(&id).unwrap();
    assert_eq!(loaded, workflow);
}

#[test]
fn same_name_same_second_gets_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let storage = WorkflowStorage::with_dir(dir.path()).unwrap();
    let mut a = sample("dup");
    a.created_at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    let b = a.clone();

    let first = storage.save(&a).unwrap();
    let second = storage.save(&b).unwrap();
    assert_eq!(first, "dup_20240501_100000.json");
    assert_eq!(second, "dup_20240501_100000_1.json");
}

#[test]
fn list_is_newest_first_and_skips_corrupt_files() {
    let dir = tempfile::tempdir().unwrap();
    let storage = WorkflowStorage::with_dir(dir.path()).unwrap();

    let mut old = sample("old");
    old.created_at = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    let mut new = sample("new");
    new.created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    storage.save(&old).unwrap();
    storage.save(&new).unwrap();
    fs::write(dir.path().join("broken.json"), "{not json").unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let list = storage.list().unwrap();
    let names: Vec<_> = list.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["new", "old"]);
    assert_eq!(list[0].actions_count, 3);
}

#[test]
fn load_and_delete_missing_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let storage = WorkflowStorage::with_dir(dir.path()).unwrap();
    assert_eq!(storage.load("ghost").unwrap_err().code, ErrorCode::NotFound);
    assert_eq!(storage.delete("ghost").unwrap_err().code, ErrorCode::NotFound);

    let id = storage.save(&sample("gone")).unwrap();
    storage.delete(&id).unwrap();
    assert!(!storage.exists(&id));
}

#[test]
fn corrupt_file_is_a_persistence_error() {
    let dir = tempfile::tempdir().unwrap();
    let storage = WorkflowStorage::with_dir(dir.path()).unwrap();
    fs::write(dir.path().join("bad.json"), "[]").unwrap();
    assert_eq!(storage.load("bad").unwrap_err().code, ErrorCode::PersistenceFailure);
}
