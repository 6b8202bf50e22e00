#![forbid(unsafe_code)]

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("task {0} already exists")]
    TaskAlreadyExists(Uuid),
    #[error("task {0} does not exist")]
    TaskDoesNotExist(Uuid),
    #[error("replica is read-only")]
    ReadOnly,
    #[error("no replica at {}", .0.display())]
    MissingReplica(PathBuf),
    #[error("corrupt replica: {0}")]
    Corrupt(String),
    #[error("sync to {0} is not supported by this replica")]
    SyncUnavailable(&'static str),
}
