#![forbid(unsafe_code)]

use std::path::PathBuf;
use td_db::{
    AwsCredentials, Config, Replica, Status, SyncTarget, Task, TaskDb, TaskDbError, sync_target,
};
use td_storage::Operations;
use uuid::Uuid;

const CLIENT_ID: &str = "0f6d5a3e-2b1c-4d7e-9f80-123456789abc";

fn config(pairs: &[(&str, &str)]) -> Config {
    let mut config = Config::new();
    for (key, value) in pairs {
        config.set(*key, *value);
    }
    config
}

fn configuration_message(result: Result<SyncTarget, TaskDbError>) -> String {
    match result {
        Err(TaskDbError::Configuration(message)) => message,
        other => panic!("expected Configuration error, got {other:?}"),
    }
}

#[test]
fn nothing_configured_is_not_found() {
    match sync_target(&Config::new()) {
        Err(TaskDbError::NotFound(message)) => {
            assert_eq!(message, "No sync.* settings are configured. See task-sync(5).");
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn local_directory_takes_precedence() {
    let target = sync_target(&config(&[
        ("sync.local.server_dir", "/srv/tasks"),
        ("sync.aws.bucket", "ignored"),
        ("sync.server.url", "https://ignored.example"),
    ]))
    .expect("local target");
    assert_eq!(
        target,
        SyncTarget::Local {
            server_dir: PathBuf::from("/srv/tasks")
        }
    );
}

#[test]
fn aws_accepts_exactly_one_credential_method() {
    let base = [
        ("sync.aws.bucket", "tasks"),
        ("sync.aws.region", "us-east-1"),
        ("sync.encryption_secret", "s3cret"),
    ];

    let with = |extra: &[(&'static str, &'static str)]| {
        let mut pairs = base.to_vec();
        pairs.extend_from_slice(extra);
        sync_target(&config(&pairs))
    };

    let profile = with(&[("sync.aws.profile", "work")]).expect("profile");
    assert_eq!(
        profile,
        SyncTarget::Aws {
            region: "us-east-1".to_string(),
            bucket: "tasks".to_string(),
            credentials: AwsCredentials::Profile("work".to_string()),
            encryption_secret: "s3cret".to_string(),
        }
    );

    let keys = with(&[
        ("sync.aws.access_key_id", "AKIA"),
        ("sync.aws.secret_access_key", "shh"),
    ])
    .expect("keys");
    assert!(matches!(
        keys,
        SyncTarget::Aws {
            credentials: AwsCredentials::AccessKey { .. },
            ..
        }
    ));

    let default = with(&[("sync.aws.default_credentials", "true")]).expect("default");
    assert!(matches!(
        default,
        SyncTarget::Aws {
            credentials: AwsCredentials::Default,
            ..
        }
    ));

    let expected = "exactly one method of specifying AWS credentials is required";
    assert_eq!(configuration_message(with(&[])), expected);
    assert_eq!(
        configuration_message(with(&[
            ("sync.aws.profile", "work"),
            ("sync.aws.access_key_id", "AKIA"),
        ])),
        expected
    );
    assert_eq!(
        configuration_message(with(&[
            ("sync.aws.profile", "work"),
            ("sync.aws.default_credentials", "true"),
        ])),
        expected
    );
}

#[test]
fn aws_requires_region_and_secret() {
    let message = configuration_message(sync_target(&config(&[
        ("sync.aws.bucket", "tasks"),
        ("sync.encryption_secret", "s3cret"),
        ("sync.aws.profile", "work"),
    ])));
    assert!(message.contains("sync.aws.region"), "{message}");

    let message = configuration_message(sync_target(&config(&[
        ("sync.aws.bucket", "tasks"),
        ("sync.aws.region", "eu-west-1"),
        ("sync.aws.profile", "work"),
    ])));
    assert!(message.contains("sync.encryption_secret"), "{message}");
}

#[test]
fn gcp_credential_path_is_optional() {
    let target = sync_target(&config(&[
        ("sync.gcp.bucket", "tasks"),
        ("sync.encryption_secret", "s3cret"),
    ]))
    .expect("gcp");
    assert_eq!(
        target,
        SyncTarget::Gcp {
            bucket: "tasks".to_string(),
            credential_path: None,
            encryption_secret: "s3cret".to_string(),
        }
    );

    let message = configuration_message(sync_target(&config(&[("sync.gcp.bucket", "tasks")])));
    assert!(message.contains("sync.encryption_secret"), "{message}");
}

#[test]
fn remote_server_falls_back_to_origin() {
    let target = sync_target(&config(&[
        ("sync.server.origin", "https://tasks.example"),
        ("sync.server.client_id", CLIENT_ID),
        ("sync.encryption_secret", "s3cret"),
    ]))
    .expect("remote");
    assert_eq!(
        target,
        SyncTarget::Remote {
            url: "https://tasks.example".to_string(),
            client_id: Uuid::parse_str(CLIENT_ID).expect("uuid"),
            encryption_secret: "s3cret".to_string(),
        }
    );

    let target = sync_target(&config(&[
        ("sync.server.origin", "https://old.example"),
        ("sync.server.url", "https://new.example"),
        ("sync.server.client_id", CLIENT_ID),
        ("sync.encryption_secret", "s3cret"),
    ]))
    .expect("remote");
    assert_eq!(target.location(), "https://new.example");
}

#[test]
fn remote_server_needs_a_valid_client_id() {
    let message = configuration_message(sync_target(&config(&[
        ("sync.server.url", "https://tasks.example"),
        ("sync.encryption_secret", "s3cret"),
    ])));
    assert!(message.contains("client_id"), "{message}");

    let message = configuration_message(sync_target(&config(&[
        ("sync.server.url", "https://tasks.example"),
        ("sync.server.client_id", "not-a-uuid"),
        ("sync.encryption_secret", "s3cret"),
    ])));
    assert!(message.contains("not-a-uuid"), "{message}");
}

#[test]
fn sync_hands_the_target_to_the_engine() {
    let mut db = TaskDb::in_memory(config(&[("sync.local.server_dir", "/srv/tasks")]));
    let mut task = Task::new();
    task.set("description", "ship it");
    db.add(&mut task).expect("add");
    assert!(db.num_local_changes().expect("count") > 0);

    let target = db.sync().expect("sync");
    assert_eq!(target.kind(), "local");
    assert_eq!(db.replica().synced_to(), &[target]);
    assert_eq!(db.num_local_changes().expect("count"), 0);
    assert!(db.has(task.uuid()).expect("has"));
}

#[test]
fn sync_without_settings_leaves_the_engine_alone() {
    let mut db = TaskDb::in_memory(Config::new());
    let err = db.sync().expect_err("nothing configured");
    assert!(matches!(err, TaskDbError::NotFound(_)), "{err:?}");
    assert!(db.replica().synced_to().is_empty());
}

#[test]
fn purge_on_sync_expires_old_deleted_tasks() {
    for (purge, remaining) in [("0", 1), ("1", 0)] {
        let mut db = TaskDb::in_memory(config(&[
            ("sync.local.server_dir", "/srv/tasks"),
            ("purge.on-sync", purge),
        ]));
        let mut task = Task::new();
        task.set("description", "gone");
        task.set_status(Status::Deleted);
        db.add(&mut task).expect("add");

        let uuid = Uuid::parse_str(task.uuid()).expect("uuid");
        let mut stored = db
            .replica()
            .get_task_data(uuid)
            .expect("read")
            .expect("stored");
        let mut ops = Operations::new();
        stored.update("modified", "100", &mut ops);
        db.replica_mut().commit_operations(ops).expect("age task");

        db.sync().expect("sync");
        assert_eq!(db.all_tasks().expect("all").len(), remaining, "purge.on-sync={purge}");
    }
}
