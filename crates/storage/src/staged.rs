#![forbid(unsafe_code)]

use crate::error::StoreError;
use crate::operation::{Operation, Operations};
use crate::task_data::{TaskData, TaskMap};
use crate::working_set::WorkingSet;
use std::collections::{HashMap, HashSet};
use td_core::Status;
use uuid::Uuid;

/// Final state of every task touched by a batch, computed before anything is
/// written so that a failing operation leaves storage untouched.
pub(crate) struct StagedChanges {
    order: Vec<Uuid>,
    states: HashMap<Uuid, Option<TaskMap>>,
    status_written: HashSet<Uuid>,
}

impl StagedChanges {
    pub(crate) fn stage<'a, I, S, L>(ops: I, step: S, mut load: L) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = &'a Operation>,
        S: Fn(&Operation, Option<TaskMap>) -> Result<Option<TaskMap>, StoreError>,
        L: FnMut(Uuid) -> Result<Option<TaskMap>, StoreError>,
    {
        let mut staged = Self::empty();
        for op in ops {
            let Some(uuid) = op.uuid() else {
                continue;
            };
            let current = staged.current(uuid, &mut load)?;
            let next = step(op, current)?;
            staged.record(uuid, op, next);
        }
        Ok(staged)
    }

    /// Stages a batch for commit. Each operation's recorded prior state is
    /// rewritten to the state it actually replaces, which may differ from the
    /// handle the batch was built from if another writer got in first.
    pub(crate) fn stage_commit<L>(ops: &mut Operations, mut load: L) -> Result<Self, StoreError>
    where
        L: FnMut(Uuid) -> Result<Option<TaskMap>, StoreError>,
    {
        let mut staged = Self::empty();
        for op in ops.iter_mut() {
            let Some(uuid) = op.uuid() else {
                continue;
            };
            let current = staged.current(uuid, &mut load)?;
            op.rebase(current.as_ref());
            let next = op.apply(current)?;
            staged.record(uuid, op, next);
        }
        Ok(staged)
    }

    fn empty() -> Self {
        Self {
            order: Vec::new(),
            states: HashMap::new(),
            status_written: HashSet::new(),
        }
    }

    fn current<L>(&mut self, uuid: Uuid, load: &mut L) -> Result<Option<TaskMap>, StoreError>
    where
        L: FnMut(Uuid) -> Result<Option<TaskMap>, StoreError>,
    {
        match self.states.remove(&uuid) {
            Some(state) => Ok(state),
            None => {
                self.order.push(uuid);
                load(uuid)
            }
        }
    }

    fn record(&mut self, uuid: Uuid, op: &Operation, state: Option<TaskMap>) {
        self.states.insert(uuid, state);
        if op.sets_status() {
            self.status_written.insert(uuid);
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (Uuid, Option<&TaskMap>)> {
        self.order
            .iter()
            .map(|uuid| (*uuid, self.states.get(uuid).and_then(Option::as_ref)))
    }

    /// Deleted tasks leave a hole; tasks whose status became pending-like are
    /// appended if they are not indexed yet.
    pub(crate) fn update_working_set(&self, working_set: &mut WorkingSet) {
        for (uuid, state) in self.iter() {
            match state {
                None => {
                    working_set.remove(uuid);
                }
                Some(task) => {
                    if self.status_written.contains(&uuid)
                        && in_working_set(task)
                        && working_set.by_uuid(uuid).is_none()
                    {
                        working_set.append(uuid);
                    }
                }
            }
        }
    }
}

pub(crate) fn in_working_set(task: &TaskMap) -> bool {
    task.get("status")
        .map(String::as_str)
        .and_then(Status::parse)
        .is_some_and(Status::in_working_set)
}

/// Working-set eligible tasks ordered by entry time, then uuid.
pub(crate) fn eligible_in_order(tasks: &[TaskData]) -> Vec<Uuid> {
    let mut eligible: Vec<(i64, Uuid)> = tasks
        .iter()
        .filter(|task| {
            task.get("status")
                .and_then(Status::parse)
                .is_some_and(Status::in_working_set)
        })
        .map(|task| {
            let entry = task
                .get("entry")
                .and_then(|entry| entry.parse::<i64>().ok())
                .unwrap_or(i64::MAX);
            (entry, task.uuid())
        })
        .collect();
    eligible.sort();
    eligible.into_iter().map(|(_, uuid)| uuid).collect()
}
