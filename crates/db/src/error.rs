#![forbid(unsafe_code)]

use crate::hooks::HookError;
use td_core::ValidationError;
use td_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskDbError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Configuration(String),
    #[error(transparent)]
    Engine(#[from] StoreError),
    #[error("hook rejected the change: {0}")]
    Hook(#[from] HookError),
}
