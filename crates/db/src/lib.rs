#![forbid(unsafe_code)]

mod changes;
mod config;
mod error;
mod hooks;
mod sync;
mod tdb;

pub use changes::ChangeTracker;
pub use config::Config;
pub use error::TaskDbError;
pub use hooks::{HookError, Hooks, NoHooks};
pub use sync::sync_target;
pub use tdb::TaskDb;

pub use td_core::{Status, Task, TaskDefaults, ValidationError};
pub use td_storage::{
    AwsCredentials, InMemoryReplica, Replica, SqliteReplica, StoreError, SyncTarget,
};
