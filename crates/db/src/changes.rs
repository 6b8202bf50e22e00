#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use td_core::Task;
use td_storage::Operations;

/// Every task written during this invocation, keyed by uuid.
///
/// While it is empty the next mutation opens a new undo point, so one undo
/// step reverts the whole invocation.
#[derive(Clone, Debug, Default)]
pub struct ChangeTracker {
    changes: BTreeMap<String, Task>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn maybe_add_undo_point(&self, ops: &mut Operations) {
        if self.is_empty() {
            ops.add_undo_point();
        }
    }

    pub fn record(&mut self, task: &Task) {
        self.changes.insert(task.uuid().to_string(), task.clone());
    }

    pub fn get(&self, uuid: &str) -> Option<&Task> {
        self.changes.get(uuid)
    }

    pub fn changes(&self) -> Vec<Task> {
        self.changes.values().cloned().collect()
    }
}
