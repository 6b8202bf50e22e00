#![forbid(unsafe_code)]

use td_core::Task;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct HookError(pub String);

/// Extension points run before a change is written. Both may edit the task
/// being written; returning an error aborts the change.
pub trait Hooks {
    fn on_add(&mut self, _task: &mut Task) -> Result<(), HookError> {
        Ok(())
    }

    fn on_modify(&mut self, _original: &Task, _modified: &mut Task) -> Result<(), HookError> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl Hooks for NoHooks {}
