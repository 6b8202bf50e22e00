#![forbid(unsafe_code)]

mod deps;
mod matching;
mod task;
mod validate;

pub use deps::dependency_scan;
pub use matching::close_enough;
pub use task::{Status, Task, now_epoch};
pub use validate::{TaskDefaults, ValidationError};
