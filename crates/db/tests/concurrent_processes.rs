#![forbid(unsafe_code)]

// Two facades over one storage directory stand in for two processes.

use std::path::{Path, PathBuf};
use td_db::{Config, SqliteReplica, StoreError, Task, TaskDb, TaskDbError};

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = base.join(format!("td_db_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn open(dir: &Path) -> TaskDb<SqliteReplica> {
    TaskDb::open(dir, true, true, Config::new()).expect("open task db")
}

fn add(db: &mut TaskDb<SqliteReplica>, description: &str) -> Task {
    let mut task = Task::new();
    task.set("description", description);
    db.add(&mut task).expect("add task");
    task
}

#[test]
fn modify_after_another_process_purged_fails_cleanly() {
    let dir = temp_dir("purge_then_modify");
    let mut first = open(&dir);
    let mut second = open(&dir);

    let task = add(&mut first, "contested");
    let mut mine = first.get(task.uuid()).expect("get").expect("exists");

    let theirs = second.get(task.uuid()).expect("get").expect("visible");
    second.purge(&theirs).expect("purge");

    let before = first.num_local_changes().expect("count");
    mine.set("project", "late");
    let err = first.modify(&mut mine).expect_err("task was purged");
    assert!(matches!(err, TaskDbError::NotFound(_)), "{err:?}");
    assert_eq!(first.num_local_changes().expect("count"), before);
    assert!(first.get(task.uuid()).expect("get").is_none());
    assert!(first.all_tasks().expect("all").is_empty());
}

#[test]
fn the_last_full_replacement_wins() {
    let dir = temp_dir("lost_update");
    let mut first = open(&dir);
    let mut second = open(&dir);

    let task = add(&mut first, "shared");
    let mut mine = first.get(task.uuid()).expect("get").expect("exists");
    let mut theirs = second.get(task.uuid()).expect("get").expect("exists");

    mine.set("project", "mine");
    first.modify(&mut mine).expect("first modify");
    theirs.set("priority", "H");
    second.modify(&mut theirs).expect("second modify");

    first.invalidate();
    let stored = first.get(task.uuid()).expect("get").expect("exists");
    assert_eq!(stored.get("priority"), "H");
    assert!(!stored.has("project"));
}

#[test]
fn writes_from_elsewhere_appear_after_invalidate() {
    let dir = temp_dir("stale_snapshot");
    let mut first = open(&dir);
    let mut second = open(&dir);

    add(&mut first, "one");
    assert_eq!(second.pending_tasks().expect("pending").len(), 1);

    let added = add(&mut first, "two");
    assert_eq!(added.id, Some(2));
    assert_eq!(second.pending_tasks().expect("pending").len(), 1);
    assert_eq!(second.latest_id().expect("latest"), 1);

    second.invalidate();
    assert_eq!(second.pending_tasks().expect("pending").len(), 2);
    assert_eq!(second.id(added.uuid()).expect("id"), Some(2));
}

#[test]
fn each_process_gets_its_own_undo_point() {
    let dir = temp_dir("undo_points");
    let mut first = open(&dir);
    add(&mut first, "one");
    add(&mut first, "two");
    drop(first);

    let mut second = open(&dir);
    add(&mut second, "three");
    assert_eq!(second.num_reverts_possible().expect("undo points"), 2);

    assert!(second.revert().expect("revert"));
    let descriptions: Vec<String> = second
        .all_tasks()
        .expect("all")
        .iter()
        .map(|task| task.get("description").to_string())
        .collect();
    assert_eq!(descriptions.len(), 2);
    assert!(!descriptions.contains(&"three".to_string()));
}

#[test]
fn read_only_facades_reject_writes() {
    let dir = temp_dir("read_only");
    let mut writer = open(&dir);
    let task = add(&mut writer, "fixed");

    let mut reader = TaskDb::open(&dir, false, false, Config::new()).expect("open read-only");
    assert!(reader.has(task.uuid()).expect("has"));

    let mut extra = Task::new();
    extra.set("description", "nope");
    let err = reader.add(&mut extra).expect_err("read-only");
    assert!(
        matches!(err, TaskDbError::Engine(StoreError::ReadOnly)),
        "{err:?}"
    );
}

#[test]
fn opening_a_missing_replica_without_create_fails() {
    let dir = temp_dir("missing").join("nothing_here");
    let err = TaskDb::open(&dir, false, true, Config::new())
        .err()
        .expect("no replica");
    assert!(
        matches!(err, TaskDbError::Engine(StoreError::MissingReplica(_))),
        "{err:?}"
    );
}

#[test]
fn sqlite_replicas_have_no_sync_transport() {
    let dir = temp_dir("no_transport");
    let mut config = Config::new();
    config.set("sync.local.server_dir", dir.join("server").display().to_string());
    let mut db = TaskDb::open(&dir, true, true, config).expect("open task db");

    let err = db.sync().expect_err("unsupported");
    assert!(
        matches!(err, TaskDbError::Engine(StoreError::SyncUnavailable("local"))),
        "{err:?}"
    );
}
