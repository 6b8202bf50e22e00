#![forbid(unsafe_code)]

mod schema;

use crate::error::StoreError;
use crate::operation::{Operation, Operations};
use crate::replica::{Replica, SyncTarget};
use crate::staged::{StagedChanges, eligible_in_order};
use crate::task_data::{TaskData, TaskMap};
use crate::working_set::WorkingSet;
use rusqlite::{
    Connection, OpenFlags, OptionalExtension, Transaction, TransactionBehavior, params,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

const DB_FILE: &str = "taskdb.sqlite3";

/// A replica stored in a SQLite database inside `storage_dir`.
///
/// There is no sync transport; `sync` always fails with `SyncUnavailable`.
#[derive(Debug)]
pub struct SqliteReplica {
    conn: Connection,
    storage_dir: PathBuf,
    read_write: bool,
}

impl SqliteReplica {
    pub fn open(
        storage_dir: impl AsRef<Path>,
        create_if_missing: bool,
        read_write: bool,
    ) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        let db_path = storage_dir.join(DB_FILE);
        if !db_path.exists() {
            if !create_if_missing || !read_write {
                return Err(StoreError::MissingReplica(db_path));
            }
            std::fs::create_dir_all(&storage_dir)?;
        }

        let flags = if read_write {
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
        } else {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        };
        let conn = Connection::open_with_flags(&db_path, flags | OpenFlags::SQLITE_OPEN_NO_MUTEX)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        if read_write {
            schema::install_schema(&conn)?;
        }

        Ok(Self {
            conn,
            storage_dir,
            read_write,
        })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn is_read_write(&self) -> bool {
        self.read_write
    }

    /// Write lock is taken before the first read of the batch.
    fn write_transaction(&mut self) -> Result<Transaction<'_>, StoreError> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    fn ensure_writable(&self) -> Result<(), StoreError> {
        if self.read_write {
            Ok(())
        } else {
            Err(StoreError::ReadOnly)
        }
    }
}

impl Replica for SqliteReplica {
    fn get_task_data(&self, uuid: Uuid) -> Result<Option<TaskData>, StoreError> {
        Ok(load_task(&self.conn, uuid)?.map(|task| TaskData::new(uuid, task)))
    }

    fn all_task_data(&self) -> Result<Vec<TaskData>, StoreError> {
        all_tasks(&self.conn)
    }

    fn commit_operations(&mut self, mut ops: Operations) -> Result<(), StoreError> {
        self.ensure_writable()?;
        if ops.is_empty() {
            return Ok(());
        }

        let tx = self.write_transaction()?;
        let staged = StagedChanges::stage_commit(&mut ops, |uuid| load_task(&tx, uuid))?;
        write_staged_tx(&tx, &staged)?;

        let mut working_set = load_working_set(&tx)?;
        staged.update_working_set(&mut working_set);
        store_working_set_tx(&tx, &working_set)?;

        for op in &ops {
            tx.execute(
                "INSERT INTO operations(data, synced) VALUES (?1, 0)",
                params![serde_json::to_string(op)?],
            )?;
        }
        tx.commit()?;
        tracing::debug!(ops = ops.len(), "committed operations");
        Ok(())
    }

    fn working_set(&self) -> Result<WorkingSet, StoreError> {
        load_working_set(&self.conn)
    }

    fn rebuild_working_set(&mut self, renumber: bool) -> Result<(), StoreError> {
        self.ensure_writable()?;
        let tx = self.write_transaction()?;
        rebuild_working_set_tx(&tx, renumber)?;
        tx.commit()?;
        Ok(())
    }

    fn num_local_operations(&self) -> Result<usize, StoreError> {
        count_local_operations(
            &self.conn,
            "SELECT count(*) FROM operations WHERE synced = 0 AND data <> ?1",
        )
    }

    fn num_undo_points(&self) -> Result<usize, StoreError> {
        count_local_operations(
            &self.conn,
            "SELECT count(*) FROM operations WHERE synced = 0 AND data = ?1",
        )
    }

    fn undo(&mut self) -> Result<bool, StoreError> {
        self.ensure_writable()?;
        let tx = self.write_transaction()?;
        let local = local_operations(&tx)?;
        if local.is_empty() {
            return Ok(false);
        }
        let start = local
            .iter()
            .rposition(|(_, op)| op.is_undo_point())
            .unwrap_or(0);

        let undone = &local[start..];
        let staged = StagedChanges::stage(
            undone.iter().rev().map(|(_, op)| op),
            Operation::revert,
            |uuid| load_task(&tx, uuid),
        )?;
        write_staged_tx(&tx, &staged)?;
        tx.execute(
            "DELETE FROM operations WHERE synced = 0 AND id >= ?1",
            params![undone[0].0],
        )?;
        rebuild_working_set_tx(&tx, false)?;
        tx.commit()?;
        tracing::debug!(ops = undone.len(), "reverted local operations");
        Ok(true)
    }

    fn sync(&mut self, target: &SyncTarget, _avoid_snapshots: bool) -> Result<(), StoreError> {
        Err(StoreError::SyncUnavailable(target.kind()))
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::try_parse(raw).map_err(|_| StoreError::Corrupt(format!("invalid uuid {raw:?}")))
}

fn load_task(conn: &Connection, uuid: Uuid) -> Result<Option<TaskMap>, StoreError> {
    let data: Option<String> = conn
        .query_row(
            "SELECT data FROM tasks WHERE uuid = ?1",
            params![uuid.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    match data {
        Some(data) => Ok(Some(serde_json::from_str(&data)?)),
        None => Ok(None),
    }
}

fn all_tasks(conn: &Connection) -> Result<Vec<TaskData>, StoreError> {
    let mut stmt = conn.prepare("SELECT uuid, data FROM tasks ORDER BY uuid ASC")?;
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let uuid = parse_uuid(&row.get::<_, String>(0)?)?;
        let task: TaskMap = serde_json::from_str(&row.get::<_, String>(1)?)?;
        out.push(TaskData::new(uuid, task));
    }
    Ok(out)
}

fn local_operations(conn: &Connection) -> Result<Vec<(i64, Operation)>, StoreError> {
    let mut stmt = conn.prepare("SELECT id, data FROM operations WHERE synced = 0 ORDER BY id ASC")?;
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let id: i64 = row.get(0)?;
        let op: Operation = serde_json::from_str(&row.get::<_, String>(1)?)?;
        out.push((id, op));
    }
    Ok(out)
}

/// `sql` takes the serialized undo point as `?1`.
fn count_local_operations(conn: &Connection, sql: &str) -> Result<usize, StoreError> {
    let undo_point = serde_json::to_string(&Operation::UndoPoint)?;
    let count: i64 = conn.query_row(sql, params![undo_point], |row| row.get(0))?;
    usize::try_from(count)
        .map_err(|_| StoreError::Corrupt(format!("invalid operation count {count}")))
}

fn load_working_set(conn: &Connection) -> Result<WorkingSet, StoreError> {
    let mut stmt = conn.prepare("SELECT id, uuid FROM working_set ORDER BY id ASC")?;
    let mut rows = stmt.query([])?;
    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        let index: i64 = row.get(0)?;
        let index = usize::try_from(index)
            .map_err(|_| StoreError::Corrupt(format!("invalid working set index {index}")))?;
        let uuid = row
            .get::<_, Option<String>>(1)?
            .map(|raw| parse_uuid(&raw))
            .transpose()?;
        entries.push((index, uuid));
    }
    Ok(WorkingSet::from_entries(entries))
}

fn write_staged_tx(tx: &Transaction<'_>, staged: &StagedChanges) -> Result<(), StoreError> {
    for (uuid, state) in staged.iter() {
        match state {
            Some(task) => {
                tx.execute(
                    "INSERT INTO tasks(uuid, data) VALUES (?1, ?2) \
                     ON CONFLICT(uuid) DO UPDATE SET data = excluded.data",
                    params![uuid.to_string(), serde_json::to_string(task)?],
                )?;
            }
            None => {
                tx.execute(
                    "DELETE FROM tasks WHERE uuid = ?1",
                    params![uuid.to_string()],
                )?;
            }
        }
    }
    Ok(())
}

fn store_working_set_tx(tx: &Transaction<'_>, working_set: &WorkingSet) -> Result<(), StoreError> {
    tx.execute("DELETE FROM working_set", [])?;
    let mut stmt = tx.prepare("INSERT INTO working_set(id, uuid) VALUES (?1, ?2)")?;
    for (index, uuid) in working_set.slots() {
        let index = i64::try_from(index)
            .map_err(|_| StoreError::Corrupt(format!("invalid working set index {index}")))?;
        stmt.execute(params![index, uuid.map(|uuid| uuid.to_string())])?;
    }
    Ok(())
}

fn rebuild_working_set_tx(tx: &Transaction<'_>, renumber: bool) -> Result<(), StoreError> {
    let eligible = eligible_in_order(&all_tasks(tx)?);
    let mut working_set = load_working_set(tx)?;
    working_set.rebuild(&eligible, renumber);
    store_working_set_tx(tx, &working_set)
}
