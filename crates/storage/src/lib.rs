#![forbid(unsafe_code)]

mod error;
mod memory;
mod operation;
mod replica;
mod sqlite;
mod staged;
mod task_data;
mod working_set;

pub use error::StoreError;
pub use memory::InMemoryReplica;
pub use operation::{Operation, Operations};
pub use replica::{AwsCredentials, EXPIRE_AFTER_SECS, Replica, SyncTarget};
pub use sqlite::SqliteReplica;
pub use task_data::{TaskData, TaskMap};
pub use working_set::WorkingSet;
