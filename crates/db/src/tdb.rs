#![forbid(unsafe_code)]

use crate::changes::ChangeTracker;
use crate::config::Config;
use crate::error::TaskDbError;
use crate::hooks::{Hooks, NoHooks};
use crate::sync::sync_target;
use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;
use td_core::{Task, ValidationError, close_enough, dependency_scan};
use td_storage::{
    InMemoryReplica, Operations, Replica, SqliteReplica, SyncTarget, TaskData, WorkingSet,
};
use uuid::Uuid;

/// The task database as seen by commands.
///
/// Reads are served from process-local snapshots that are dropped after every
/// successful write made through this facade. Writes made by other processes
/// are not observed until the next write or an explicit `invalidate`.
pub struct TaskDb<R: Replica> {
    replica: R,
    config: Config,
    hooks: Box<dyn Hooks>,
    changes: ChangeTracker,
    working_set: Option<WorkingSet>,
    pending_tasks: Option<Vec<Task>>,
    completed_tasks: Option<Vec<Task>>,
}

impl TaskDb<SqliteReplica> {
    pub fn open(
        location: impl AsRef<Path>,
        create_if_missing: bool,
        read_write: bool,
        config: Config,
    ) -> Result<Self, TaskDbError> {
        let replica = SqliteReplica::open(location, create_if_missing, read_write)?;
        Ok(Self::new(replica, config))
    }
}

impl TaskDb<InMemoryReplica> {
    pub fn in_memory(config: Config) -> Self {
        Self::new(InMemoryReplica::new(), config)
    }
}

impl<R: Replica> TaskDb<R> {
    pub fn new(replica: R, config: Config) -> Self {
        Self {
            replica,
            config,
            hooks: Box::new(NoHooks),
            changes: ChangeTracker::new(),
            working_set: None,
            pending_tasks: None,
            completed_tasks: None,
        }
    }

    pub fn with_hooks(mut self, hooks: impl Hooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn replica(&self) -> &R {
        &self.replica
    }

    /// Direct engine access. Writes made here bypass the caches until the
    /// next `invalidate`.
    pub fn replica_mut(&mut self) -> &mut R {
        &mut self.replica
    }

    /// Adds a new task. On return `task.id` holds its working-set index, or
    /// `None` if the task is not pending.
    pub fn add(&mut self, task: &mut Task) -> Result<(), TaskDbError> {
        task.validate(Some(&self.config.task_defaults()))?;

        let mut ops = Operations::new();
        self.changes.maybe_add_undo_point(&mut ops);

        let uuid = parse_uuid(task.uuid())?;
        self.hooks.on_add(task)?;

        // uuid and id are derived, never stored as properties.
        let mut data = TaskData::create(uuid, &mut ops);
        for (name, value) in task.attributes() {
            if name == "uuid" || name == "id" || value.is_empty() {
                continue;
            }
            data.update(name, value, &mut ops);
        }
        self.replica.commit_operations(ops)?;
        self.invalidate();

        task.id = self.working_set()?.by_uuid(uuid);
        self.changes.record(task);
        tracing::debug!(%uuid, id = ?task.id, "added task");
        Ok(())
    }

    /// Makes the stored task match `task` exactly.
    ///
    /// The diff is taken against the task as currently stored, not as it was
    /// when `task` was read, so a concurrent writer's changes to attributes
    /// that `task` also carries are overwritten.
    pub fn modify(&mut self, task: &mut Task) -> Result<(), TaskDbError> {
        let now = td_core::now_epoch();
        task.set_timestamp("modified", now);
        task.validate(None)?;
        let uuid = parse_uuid(task.uuid())?;

        let mut ops = Operations::new();
        self.changes.maybe_add_undo_point(&mut ops);

        let Some(mut stored) = self.replica.get_task_data(uuid)? else {
            // Someone else removed it; our snapshots are stale.
            self.invalidate();
            return Err(TaskDbError::NotFound("task no longer exists".to_string()));
        };

        // Pending snapshot first so the hook sees blocked/blocking flags.
        let uuid_str = uuid.to_string();
        let original = match self
            .pending_tasks()?
            .into_iter()
            .find(|candidate| candidate.uuid() == uuid_str)
        {
            Some(original) => original,
            None => task_from_data(self.working_set()?, stored.clone()),
        };
        self.hooks.on_modify(&original, task)?;
        task.set_timestamp("modified", now);

        let mut seen = HashSet::new();
        for (name, value) in task.attributes() {
            if name == "uuid" || name == "id" {
                continue;
            }
            seen.insert(name);
            let current = stored.get(name);
            if current == Some(value) || (current.is_none() && value.is_empty()) {
                continue;
            }
            // An empty value means the attribute should go away.
            if value.is_empty() {
                stored.update_remove(name, &mut ops);
            } else {
                stored.update(name, value, &mut ops);
            }
        }

        let dropped: Vec<String> = stored
            .properties()
            .filter(|name| !seen.contains(name))
            .map(ToString::to_string)
            .collect();
        for name in &dropped {
            stored.update_remove(name, &mut ops);
        }

        let op_count = ops.len();
        self.replica.commit_operations(ops)?;
        self.invalidate();

        self.changes.record(task);
        tracing::debug!(%uuid, ops = op_count, "modified task");
        Ok(())
    }

    /// Removes the task from storage outright. Missing tasks are ignored, and
    /// no undo point is recorded.
    pub fn purge(&mut self, task: &Task) -> Result<(), TaskDbError> {
        let uuid = parse_uuid(task.uuid())?;
        if let Some(stored) = self.replica.get_task_data(uuid)? {
            let mut ops = Operations::new();
            stored.delete(&mut ops);
            self.replica.commit_operations(ops)?;
            tracing::debug!(%uuid, "purged task");
        }
        self.invalidate();
        Ok(())
    }

    /// Looks a task up by working-set index.
    pub fn get_by_id(&mut self, id: usize) -> Result<Option<Task>, TaskDbError> {
        let Some(uuid) = self.working_set()?.by_index(id) else {
            return Ok(None);
        };
        let uuid = uuid.to_string();
        // The full pending set is loaded so blocked/blocking flags are right.
        Ok(self
            .pending_tasks()?
            .into_iter()
            .find(|task| task.uuid() == uuid))
    }

    /// Looks a task up by full or abbreviated uuid: pending tasks first, then
    /// a scan of everything stored. The first match wins.
    pub fn get(&mut self, identifier: &str) -> Result<Option<Task>, TaskDbError> {
        if identifier.is_empty() {
            return Ok(None);
        }
        let min_length = identifier.len();

        if let Some(task) = self
            .pending_tasks()?
            .into_iter()
            .find(|task| close_enough(task.uuid(), identifier, min_length))
        {
            return Ok(Some(task));
        }

        let working_set = self.working_set()?.clone();
        for data in self.replica.all_task_data()? {
            if close_enough(&data.uuid().to_string(), identifier, min_length) {
                return Ok(Some(task_from_data(&working_set, data)));
            }
        }
        Ok(None)
    }

    pub fn has(&mut self, identifier: &str) -> Result<bool, TaskDbError> {
        Ok(self.get(identifier)?.is_some())
    }

    pub fn all_tasks(&mut self) -> Result<Vec<Task>, TaskDbError> {
        let started = Instant::now();
        let data = self.replica.all_task_data()?;
        let working_set = self.working_set()?;
        let mut tasks: Vec<Task> = data
            .into_iter()
            .map(|data| task_from_data(working_set, data))
            .collect();
        dependency_scan(&mut tasks);
        tracing::debug!(
            count = tasks.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "loaded all tasks"
        );
        Ok(tasks)
    }

    pub fn pending_tasks(&mut self) -> Result<Vec<Task>, TaskDbError> {
        let tasks = match self.pending_tasks.take() {
            Some(tasks) => tasks,
            None => self.load_pending_tasks()?,
        };
        Ok(self.pending_tasks.insert(tasks).clone())
    }

    /// Every stored task outside the working set.
    pub fn completed_tasks(&mut self) -> Result<Vec<Task>, TaskDbError> {
        let tasks = match self.completed_tasks.take() {
            Some(tasks) => tasks,
            None => self.load_completed_tasks()?,
        };
        Ok(self.completed_tasks.insert(tasks).clone())
    }

    /// Open pending tasks sharing `task`'s parent, excluding `task` itself.
    pub fn siblings(&mut self, task: &Task) -> Result<Vec<Task>, TaskDbError> {
        let parent = task.get("parent");
        if parent.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .pending_tasks()?
            .into_iter()
            .filter(|candidate| {
                candidate.uuid() != task.uuid()
                    && !candidate.status().is_closed()
                    && candidate.get("parent") == parent
            })
            .collect())
    }

    /// Working-set tasks whose `parent` is `parent`'s uuid.
    pub fn children(&mut self, parent: &Task) -> Result<Vec<Task>, TaskDbError> {
        let parent_uuid = parse_uuid(parent.uuid())?;
        let parent_str = parent_uuid.to_string();
        let working_set = self.working_set()?.clone();

        let mut children = Vec::new();
        for index in 0..=working_set.largest_index() {
            let Some(uuid) = working_set.by_index(index) else {
                continue;
            };
            if uuid == parent_uuid {
                continue;
            }
            let Some(data) = self.replica.get_task_data(uuid)? else {
                continue;
            };
            if data.get("parent") != Some(parent_str.as_str()) {
                continue;
            }
            children.push(task_from_data(&working_set, data));
        }
        Ok(children)
    }

    pub fn uuid(&mut self, id: usize) -> Result<Option<String>, TaskDbError> {
        Ok(self
            .working_set()?
            .by_index(id)
            .map(|uuid| uuid.to_string()))
    }

    pub fn id(&mut self, uuid: &str) -> Result<Option<usize>, TaskDbError> {
        let uuid = parse_uuid(uuid)?;
        Ok(self.working_set()?.by_uuid(uuid))
    }

    /// Largest working-set index, i.e. the id of the newest pending task.
    pub fn latest_id(&mut self) -> Result<usize, TaskDbError> {
        Ok(self.working_set()?.largest_index())
    }

    pub fn num_local_changes(&self) -> Result<usize, TaskDbError> {
        Ok(self.replica.num_local_operations()?)
    }

    pub fn num_reverts_possible(&self) -> Result<usize, TaskDbError> {
        Ok(self.replica.num_undo_points()?)
    }

    /// Tasks added or modified through this facade, ordered by uuid.
    pub fn get_changes(&self) -> Vec<Task> {
        self.changes.changes()
    }

    pub fn change_tracker(&self) -> &ChangeTracker {
        &self.changes
    }

    /// Renumbers the working set when `gc` is enabled.
    pub fn gc(&mut self) -> Result<(), TaskDbError> {
        if !self.config.get_bool("gc") {
            return Ok(());
        }
        let started = Instant::now();
        self.replica.rebuild_working_set(true)?;
        self.invalidate();
        tracing::info!(
            elapsed_us = started.elapsed().as_micros() as u64,
            "rebuilt working set"
        );
        Ok(())
    }

    pub fn expire_tasks(&mut self) -> Result<usize, TaskDbError> {
        let expired = self.replica.expire_tasks()?;
        self.invalidate();
        if expired > 0 {
            tracing::info!(expired, "expired deleted tasks");
        }
        Ok(expired)
    }

    /// Syncs with the backend named by the `sync.*` settings.
    pub fn sync(&mut self) -> Result<SyncTarget, TaskDbError> {
        let target = sync_target(&self.config)?;
        tracing::info!(
            kind = target.kind(),
            location = %target.location(),
            "syncing replica"
        );
        self.replica.sync(&target, false)?;
        self.invalidate();

        if self.config.get_bool("purge.on-sync") {
            self.expire_tasks()?;
        }
        Ok(target)
    }

    /// Reverts the most recent undo point's worth of local changes.
    pub fn revert(&mut self) -> Result<bool, TaskDbError> {
        let reverted = self.replica.undo()?;
        self.invalidate();
        Ok(reverted)
    }

    /// Drops the cached working set and task snapshots.
    pub fn invalidate(&mut self) {
        self.pending_tasks = None;
        self.completed_tasks = None;
        self.working_set = None;
    }

    fn working_set(&mut self) -> Result<&WorkingSet, TaskDbError> {
        let working_set = match self.working_set.take() {
            Some(working_set) => working_set,
            None => self.replica.working_set()?,
        };
        Ok(self.working_set.insert(working_set))
    }

    fn load_pending_tasks(&mut self) -> Result<Vec<Task>, TaskDbError> {
        let started = Instant::now();
        let data = self.replica.pending_task_data()?;
        let working_set = self.working_set()?;
        let mut tasks: Vec<Task> = data
            .into_iter()
            .map(|data| task_from_data(working_set, data))
            .collect();
        dependency_scan(&mut tasks);
        tracing::debug!(
            count = tasks.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "loaded pending tasks"
        );
        Ok(tasks)
    }

    fn load_completed_tasks(&mut self) -> Result<Vec<Task>, TaskDbError> {
        let data = self.replica.all_task_data()?;
        let working_set = self.working_set()?;
        Ok(data
            .into_iter()
            .filter(|data| working_set.by_uuid(data.uuid()).is_none())
            .map(|data| task_from_data(working_set, data))
            .collect())
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid, TaskDbError> {
    Uuid::try_parse(raw).map_err(|_| ValidationError::InvalidUuid(raw.to_string()).into())
}

fn task_from_data(working_set: &WorkingSet, data: TaskData) -> Task {
    let uuid = data.uuid();
    let mut task = Task::from_data(uuid.to_string(), data.into_properties());
    task.id = working_set.by_uuid(uuid);
    task
}
