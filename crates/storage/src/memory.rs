#![forbid(unsafe_code)]

use crate::error::StoreError;
use crate::operation::{Operation, Operations};
use crate::replica::{Replica, SyncTarget};
use crate::staged::{StagedChanges, eligible_in_order};
use crate::task_data::{TaskData, TaskMap};
use crate::working_set::WorkingSet;
use std::collections::BTreeMap;
use uuid::Uuid;

/// A replica that lives only as long as the process. Sync has no transport:
/// it records the target and marks local operations as synced.
#[derive(Debug, Default)]
pub struct InMemoryReplica {
    tasks: BTreeMap<Uuid, TaskMap>,
    working_set: WorkingSet,
    local_operations: Vec<Operation>,
    synced_to: Vec<SyncTarget>,
}

impl InMemoryReplica {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unsynced operations, oldest first.
    pub fn local_operations(&self) -> &[Operation] {
        &self.local_operations
    }

    /// Targets passed to `sync`, oldest first.
    pub fn synced_to(&self) -> &[SyncTarget] {
        &self.synced_to
    }

    fn write_staged(&mut self, staged: &StagedChanges) {
        for (uuid, state) in staged.iter() {
            match state {
                Some(task) => {
                    self.tasks.insert(uuid, task.clone());
                }
                None => {
                    self.tasks.remove(&uuid);
                }
            }
        }
    }
}

impl Replica for InMemoryReplica {
    fn get_task_data(&self, uuid: Uuid) -> Result<Option<TaskData>, StoreError> {
        Ok(self
            .tasks
            .get(&uuid)
            .map(|task| TaskData::new(uuid, task.clone())))
    }

    fn all_task_data(&self) -> Result<Vec<TaskData>, StoreError> {
        Ok(self
            .tasks
            .iter()
            .map(|(uuid, task)| TaskData::new(*uuid, task.clone()))
            .collect())
    }

    fn commit_operations(&mut self, mut ops: Operations) -> Result<(), StoreError> {
        if ops.is_empty() {
            return Ok(());
        }
        let staged =
            StagedChanges::stage_commit(&mut ops, |uuid| Ok(self.tasks.get(&uuid).cloned()))?;
        self.write_staged(&staged);
        staged.update_working_set(&mut self.working_set);
        tracing::debug!(ops = ops.len(), "committed operations");
        self.local_operations.extend(ops);
        Ok(())
    }

    fn working_set(&self) -> Result<WorkingSet, StoreError> {
        Ok(self.working_set.clone())
    }

    fn rebuild_working_set(&mut self, renumber: bool) -> Result<(), StoreError> {
        let eligible = eligible_in_order(&self.all_task_data()?);
        self.working_set.rebuild(&eligible, renumber);
        Ok(())
    }

    fn num_local_operations(&self) -> Result<usize, StoreError> {
        Ok(self
            .local_operations
            .iter()
            .filter(|op| !op.is_undo_point())
            .count())
    }

    fn num_undo_points(&self) -> Result<usize, StoreError> {
        Ok(self
            .local_operations
            .iter()
            .filter(|op| op.is_undo_point())
            .count())
    }

    fn undo(&mut self) -> Result<bool, StoreError> {
        if self.local_operations.is_empty() {
            return Ok(false);
        }
        let start = self
            .local_operations
            .iter()
            .rposition(Operation::is_undo_point)
            .unwrap_or(0);
        let staged = StagedChanges::stage(
            self.local_operations[start..].iter().rev(),
            Operation::revert,
            |uuid| Ok(self.tasks.get(&uuid).cloned()),
        )?;
        self.write_staged(&staged);
        let undone = self.local_operations.split_off(start);
        tracing::debug!(ops = undone.len(), "reverted local operations");
        self.rebuild_working_set(false)?;
        Ok(true)
    }

    fn sync(&mut self, target: &SyncTarget, _avoid_snapshots: bool) -> Result<(), StoreError> {
        self.local_operations.clear();
        self.synced_to.push(target.clone());
        self.rebuild_working_set(false)
    }
}
