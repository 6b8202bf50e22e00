#![forbid(unsafe_code)]

use crate::error::StoreError;
use crate::operation::Operations;
use crate::task_data::TaskData;
use crate::working_set::WorkingSet;
use std::path::PathBuf;
use td_core::Status;
use uuid::Uuid;

/// Deleted tasks untouched for this long are removed by `expire_tasks`.
pub const EXPIRE_AFTER_SECS: i64 = 180 * 86_400;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AwsCredentials {
    Profile(String),
    AccessKey {
        access_key_id: String,
        secret_access_key: String,
    },
    Default,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncTarget {
    Local {
        server_dir: PathBuf,
    },
    Remote {
        url: String,
        client_id: Uuid,
        encryption_secret: String,
    },
    Aws {
        region: String,
        bucket: String,
        credentials: AwsCredentials,
        encryption_secret: String,
    },
    Gcp {
        bucket: String,
        credential_path: Option<String>,
        encryption_secret: String,
    },
}

impl SyncTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            SyncTarget::Local { .. } => "local",
            SyncTarget::Remote { .. } => "remote",
            SyncTarget::Aws { .. } => "aws",
            SyncTarget::Gcp { .. } => "gcp",
        }
    }

    /// Where the data goes, without any secret material.
    pub fn location(&self) -> String {
        match self {
            SyncTarget::Local { server_dir } => server_dir.display().to_string(),
            SyncTarget::Remote { url, .. } => url.clone(),
            SyncTarget::Aws { region, bucket, .. } => format!("{bucket} ({region})"),
            SyncTarget::Gcp { bucket, .. } => bucket.clone(),
        }
    }
}

/// The storage engine: an operation-log replica of the task database.
pub trait Replica {
    fn get_task_data(&self, uuid: Uuid) -> Result<Option<TaskData>, StoreError>;

    /// Every stored task, ordered by uuid.
    fn all_task_data(&self) -> Result<Vec<TaskData>, StoreError>;

    /// Tasks referenced by the working set, in index order.
    fn pending_task_data(&self) -> Result<Vec<TaskData>, StoreError> {
        let working_set = self.working_set()?;
        let mut tasks = Vec::with_capacity(working_set.len());
        for (_, uuid) in working_set.iter() {
            if let Some(task) = self.get_task_data(uuid)? {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }

    fn commit_operations(&mut self, ops: Operations) -> Result<(), StoreError>;

    fn working_set(&self) -> Result<WorkingSet, StoreError>;

    fn rebuild_working_set(&mut self, renumber: bool) -> Result<(), StoreError>;

    /// Removes long-deleted tasks. Returns how many were removed.
    fn expire_tasks(&mut self) -> Result<usize, StoreError> {
        let cutoff = td_core::now_epoch() - EXPIRE_AFTER_SECS;
        let mut ops = Operations::new();
        let mut expired = 0;
        for task in self.all_task_data()? {
            let deleted = task.get("status").and_then(Status::parse) == Some(Status::Deleted);
            let stale = task
                .get("modified")
                .and_then(|modified| modified.parse::<i64>().ok())
                .is_some_and(|modified| modified < cutoff);
            if deleted && stale {
                task.delete(&mut ops);
                expired += 1;
            }
        }
        if !ops.is_empty() {
            self.commit_operations(ops)?;
        }
        Ok(expired)
    }

    fn num_local_operations(&self) -> Result<usize, StoreError>;

    fn num_undo_points(&self) -> Result<usize, StoreError>;

    /// Reverts local operations back to the latest undo point. Returns false
    /// when there was nothing to revert.
    fn undo(&mut self) -> Result<bool, StoreError>;

    fn sync(&mut self, target: &SyncTarget, avoid_snapshots: bool) -> Result<(), StoreError>;
}

impl<R: Replica + ?Sized> Replica for Box<R> {
    fn get_task_data(&self, uuid: Uuid) -> Result<Option<TaskData>, StoreError> {
        (**self).get_task_data(uuid)
    }

    fn all_task_data(&self) -> Result<Vec<TaskData>, StoreError> {
        (**self).all_task_data()
    }

    fn pending_task_data(&self) -> Result<Vec<TaskData>, StoreError> {
        (**self).pending_task_data()
    }

    fn commit_operations(&mut self, ops: Operations) -> Result<(), StoreError> {
        (**self).commit_operations(ops)
    }

    fn working_set(&self) -> Result<WorkingSet, StoreError> {
        (**self).working_set()
    }

    fn rebuild_working_set(&mut self, renumber: bool) -> Result<(), StoreError> {
        (**self).rebuild_working_set(renumber)
    }

    fn expire_tasks(&mut self) -> Result<usize, StoreError> {
        (**self).expire_tasks()
    }

    fn num_local_operations(&self) -> Result<usize, StoreError> {
        (**self).num_local_operations()
    }

    fn num_undo_points(&self) -> Result<usize, StoreError> {
        (**self).num_undo_points()
    }

    fn undo(&mut self) -> Result<bool, StoreError> {
        (**self).undo()
    }

    fn sync(&mut self, target: &SyncTarget, avoid_snapshots: bool) -> Result<(), StoreError> {
        (**self).sync(target, avoid_snapshots)
    }
}
