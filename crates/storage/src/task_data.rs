#![forbid(unsafe_code)]

use crate::operation::{Operation, Operations};
use std::collections::BTreeMap;
use uuid::Uuid;

pub type TaskMap = BTreeMap<String, String>;

/// A stored task as seen by the engine. Mutators never touch storage; they
/// record operations into a batch that is committed separately.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskData {
    uuid: Uuid,
    properties: TaskMap,
}

impl TaskData {
    pub fn new(uuid: Uuid, properties: TaskMap) -> Self {
        Self { uuid, properties }
    }

    pub fn create(uuid: Uuid, ops: &mut Operations) -> Self {
        ops.push(Operation::Create { uuid });
        Self::new(uuid, TaskMap::new())
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.properties.get(property).map(String::as_str)
    }

    pub fn has(&self, property: &str) -> bool {
        self.properties.contains_key(property)
    }

    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn into_properties(self) -> TaskMap {
        self.properties
    }

    pub fn update(&mut self, property: &str, value: &str, ops: &mut Operations) {
        let old_value = self
            .properties
            .insert(property.to_string(), value.to_string());
        ops.push(Operation::Update {
            uuid: self.uuid,
            property: property.to_string(),
            old_value,
            value: Some(value.to_string()),
            timestamp: td_core::now_epoch(),
        });
    }

    pub fn update_remove(&mut self, property: &str, ops: &mut Operations) {
        let old_value = self.properties.remove(property);
        ops.push(Operation::Update {
            uuid: self.uuid,
            property: property.to_string(),
            old_value,
            value: None,
            timestamp: td_core::now_epoch(),
        });
    }

    pub fn delete(self, ops: &mut Operations) {
        ops.push(Operation::Delete {
            uuid: self.uuid,
            old_task: self.properties,
        });
    }
}
