#![forbid(unsafe_code)]

use std::collections::BTreeMap;

const DEP_PREFIX: &str = "dep_";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Pending,
    Completed,
    Deleted,
    Waiting,
    Recurring,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Completed => "completed",
            Status::Deleted => "deleted",
            Status::Waiting => "waiting",
            Status::Recurring => "recurring",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "pending" => Some(Status::Pending),
            "completed" => Some(Status::Completed),
            "deleted" => Some(Status::Deleted),
            "waiting" => Some(Status::Waiting),
            "recurring" => Some(Status::Recurring),
            _ => None,
        }
    }

    /// Statuses that keep a task addressable by a working-set index.
    pub fn in_working_set(self) -> bool {
        matches!(self, Status::Pending | Status::Waiting | Status::Recurring)
    }

    pub fn is_closed(self) -> bool {
        matches!(self, Status::Completed | Status::Deleted)
    }
}

/// One task as an attribute map, plus fields derived when it was loaded.
///
/// `id` is only meaningful for the working-set snapshot the task was read
/// from. `is_blocked` and `is_blocking` are recomputed on every load and are
/// never written back.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Task {
    data: BTreeMap<String, String>,
    pub id: Option<usize>,
    pub is_blocked: bool,
    pub is_blocking: bool,
}

impl Task {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a task from stored properties. Storage does not keep the uuid as
    /// a property, so it is injected here.
    pub fn from_data<I>(uuid: impl Into<String>, properties: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut data: BTreeMap<String, String> = properties.into_iter().collect();
        data.insert("uuid".to_string(), uuid.into());
        Self {
            data,
            ..Self::default()
        }
    }

    /// Absent attributes read as the empty string.
    pub fn get(&self, name: &str) -> &str {
        self.data.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn has(&self, name: &str) -> bool {
        self.data.contains_key(name)
    }

    pub(crate) fn has_value(&self, name: &str) -> bool {
        !self.get(name).is_empty()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.data.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.data.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn uuid(&self) -> &str {
        self.get("uuid")
    }

    pub fn status(&self) -> Status {
        Status::parse(self.get("status")).unwrap_or(Status::Pending)
    }

    pub fn set_status(&mut self, status: Status) {
        self.set("status", status.as_str());
    }

    pub fn set_as_now(&mut self, name: &str) {
        self.set_timestamp(name, now_epoch());
    }

    pub fn set_timestamp(&mut self, name: &str, epoch: i64) {
        self.set(name, epoch.to_string());
    }

    pub fn dependency_uuids(&self) -> Vec<String> {
        self.data
            .keys()
            .filter_map(|name| name.strip_prefix(DEP_PREFIX))
            .map(ToString::to_string)
            .collect()
    }

    pub fn depends_on(&self, uuid: &str) -> bool {
        self.has(&format!("{DEP_PREFIX}{uuid}"))
    }

    pub fn add_dependency(&mut self, uuid: &str) {
        self.set(format!("{DEP_PREFIX}{uuid}"), "x");
    }

    pub fn remove_dependency(&mut self, uuid: &str) -> bool {
        self.remove(&format!("{DEP_PREFIX}{uuid}")).is_some()
    }
}

pub fn now_epoch() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}
