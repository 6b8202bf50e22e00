#![forbid(unsafe_code)]

use crate::error::StoreError;
use crate::task_data::TaskMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Create {
        uuid: Uuid,
    },
    Delete {
        uuid: Uuid,
        old_task: TaskMap,
    },
    Update {
        uuid: Uuid,
        property: String,
        old_value: Option<String>,
        value: Option<String>,
        timestamp: i64,
    },
    UndoPoint,
}

impl Operation {
    pub fn uuid(&self) -> Option<Uuid> {
        match self {
            Operation::Create { uuid }
            | Operation::Delete { uuid, .. }
            | Operation::Update { uuid, .. } => Some(*uuid),
            Operation::UndoPoint => None,
        }
    }

    pub fn is_undo_point(&self) -> bool {
        matches!(self, Operation::UndoPoint)
    }

    /// Whether this operation writes a task's `status`.
    pub(crate) fn sets_status(&self) -> bool {
        matches!(self, Operation::Update { property, .. } if property == "status")
    }

    pub(crate) fn apply(&self, current: Option<TaskMap>) -> Result<Option<TaskMap>, StoreError> {
        match self {
            Operation::Create { uuid } => match current {
                Some(_) => Err(StoreError::TaskAlreadyExists(*uuid)),
                None => Ok(Some(TaskMap::new())),
            },
            Operation::Delete { uuid, .. } => match current {
                Some(_) => Ok(None),
                None => Err(StoreError::TaskDoesNotExist(*uuid)),
            },
            Operation::Update {
                uuid,
                property,
                value,
                ..
            } => {
                let mut task = current.ok_or(StoreError::TaskDoesNotExist(*uuid))?;
                match value {
                    Some(value) => task.insert(property.clone(), value.clone()),
                    None => task.remove(property),
                };
                Ok(Some(task))
            }
            Operation::UndoPoint => Ok(current),
        }
    }

    /// Replaces the recorded prior state with `current`, the state this
    /// operation is about to be applied to.
    pub(crate) fn rebase(&mut self, current: Option<&TaskMap>) {
        match self {
            Operation::Update {
                property,
                old_value,
                ..
            } => *old_value = current.and_then(|task| task.get(property.as_str()).cloned()),
            Operation::Delete { old_task, .. } => {
                if let Some(task) = current {
                    *old_task = task.clone();
                }
            }
            Operation::Create { .. } | Operation::UndoPoint => {}
        }
    }

    /// Inverse of `apply`, used when undoing local operations newest-first.
    /// Relies on the prior state captured by `rebase` at commit time.
    pub(crate) fn revert(&self, current: Option<TaskMap>) -> Result<Option<TaskMap>, StoreError> {
        match self {
            Operation::Create { .. } => Ok(None),
            Operation::Delete { old_task, .. } => Ok(Some(old_task.clone())),
            Operation::Update {
                uuid,
                property,
                old_value,
                ..
            } => {
                let mut task = current.ok_or(StoreError::TaskDoesNotExist(*uuid))?;
                match old_value {
                    Some(old) => task.insert(property.clone(), old.clone()),
                    None => task.remove(property),
                };
                Ok(Some(task))
            }
            Operation::UndoPoint => Ok(current),
        }
    }
}

/// An ordered batch of operations, committed atomically.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Operations(Vec<Operation>);

impl Operations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: Operation) {
        self.0.push(op);
    }

    pub fn add_undo_point(&mut self) {
        self.0.push(Operation::UndoPoint);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.0.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Operation> {
        self.0.iter_mut()
    }

    pub fn into_vec(self) -> Vec<Operation> {
        self.0
    }
}

impl From<Vec<Operation>> for Operations {
    fn from(value: Vec<Operation>) -> Self {
        Self(value)
    }
}

impl IntoIterator for Operations {
    type Item = Operation;
    type IntoIter = std::vec::IntoIter<Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Operations {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
