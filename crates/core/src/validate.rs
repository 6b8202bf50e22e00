#![forbid(unsafe_code)]

use crate::task::{Status, Task, now_epoch};
use thiserror::Error;
use uuid::Uuid;

/// Values filled in by `Task::validate` when defaults are requested.
#[derive(Clone, Debug, Default)]
pub struct TaskDefaults {
    pub project: Option<String>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Not a valid UUID '{0}'.")]
    InvalidUuid(String),
    #[error("A task must have a description.")]
    MissingDescription,
    #[error("A recurring task must also have a 'recur' attribute.")]
    RecurringWithoutRecur,
    #[error("A recurring task must also have a 'due' date.")]
    RecurWithoutDue,
}

impl Task {
    /// Checks the record for consistency and fills in derived attributes.
    ///
    /// Passing `None` validates without applying configured defaults, which is
    /// what an update of an existing task wants.
    pub fn validate(&mut self, defaults: Option<&TaskDefaults>) -> Result<(), ValidationError> {
        let mut status = if self.has_value("status") {
            self.status()
        } else {
            Status::Pending
        };

        let uuid = self.get("uuid");
        if uuid.is_empty() {
            self.set("uuid", Uuid::new_v4().to_string());
        } else if uuid.len() != 36 || Uuid::try_parse(uuid).is_err() {
            return Err(ValidationError::InvalidUuid(uuid.to_string()));
        }

        if status == Status::Pending
            && self.has_value("due")
            && self.has_value("recur")
            && !self.has_value("parent")
            && !self.has_value("template")
        {
            status = Status::Recurring;
        } else if status == Status::Pending && self.has_value("wait") {
            status = Status::Waiting;
        }

        if status == Status::Recurring && !self.has_value("rtype") {
            self.set("rtype", "periodic");
        }
        self.set_status(status);

        let now = now_epoch();
        if !self.has_value("entry") {
            self.set_timestamp("entry", now);
        }
        if status.is_closed() && !self.has_value("end") {
            self.set_timestamp("end", now);
        }
        if status == Status::Pending && self.has_value("end") {
            self.remove("end");
        }
        if !self.has_value("modified") {
            self.set_timestamp("modified", now);
        }

        if let Some(defaults) = defaults
            && !self.has_value("parent")
            && !self.has("project")
            && let Some(project) = defaults.project.as_deref().filter(|p| !p.is_empty())
        {
            self.set("project", project);
        }

        if self.get("description").trim().is_empty() {
            return Err(ValidationError::MissingDescription);
        }
        if status == Status::Recurring && !self.has_value("recur") {
            return Err(ValidationError::RecurringWithoutRecur);
        }
        if self.has_value("recur") && !self.has_value("due") {
            return Err(ValidationError::RecurWithoutDue);
        }

        Ok(())
    }
}
