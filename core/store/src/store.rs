//! Transactional task store over SQLite.
//!
//! All mutating operations run inside a single transaction scoped to the
//! affected object stores; a failure mid-commit rolls the whole mutation
//! back and no partial state is observable. Validation happens before the
//! transaction opens.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, Row, Transaction};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use taskvault_common::{CategoryId, Error, OperationId, Result, TaskId};

use crate::model::{
    OperationKind, QueueMode, SyncOperation, Task, TaskDraft, TaskFilter, TaskPatch, TaskPriority,
    TaskStatus,
};
use crate::schema;
use crate::validate::{validate_draft, validate_patch};

/// Handle to the persistent store. Cheap to clone; all clones share one
/// serialized connection.
#[derive(Clone)]
pub struct Store {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) a store at the given path.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = schema::open_connection(path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory store (for tests and ephemeral contexts).
    pub async fn in_memory() -> Result<Self> {
        let conn = schema::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create a task.
    ///
    /// Validation and sanitization run before the transaction opens. With
    /// `QueueMode::Queue` the matching outbox entry commits atomically with
    /// the task row.
    pub async fn create_task(&self, draft: TaskDraft, queue: QueueMode) -> Result<Task> {
        let mut draft = draft;
        validate_draft(&mut draft)?;

        let now = Utc::now();
        let status = TaskStatus::parse_or_default(draft.status.as_deref().unwrap_or("pending"));
        let task = Task {
            id: TaskId::generate(),
            title: draft.title,
            description: draft.description,
            status,
            priority: TaskPriority::parse_or_default(draft.priority.as_deref().unwrap_or("medium")),
            category_id: draft.category_id,
            due_date: draft.due_date,
            created_at: now,
            modified_at: now,
            completed_at: (status == TaskStatus::Completed).then_some(now),
            tags: draft.tags,
            metadata: draft.metadata,
        };

        let mut conn = self.conn.lock().await;
        let tx = begin(&mut conn)?;
        insert_task(&tx, &task).map_err(abort)?;
        if queue == QueueMode::Queue {
            append_queue_row(
                &tx,
                OperationKind::Create,
                &task.id,
                Some(&task),
                None,
            )
            .map_err(abort)?;
        }
        tx.commit().map_err(abort)?;

        debug!(task = %task.id, "task created");
        Ok(task)
    }

    /// Read a task by id.
    pub async fn get_task(&self, id: &TaskId) -> Result<Option<Task>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS))
            .map_err(storage)?;
        match stmt.query_row([id.as_str()], task_from_row) {
            Ok(task) => Ok(Some(task)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(storage(e)),
        }
    }

    /// Apply a partial update to a task.
    ///
    /// `modified_at` never decreases. Transitioning status to Completed sets
    /// `completed_at`; transitioning away clears it.
    pub async fn update_task(
        &self,
        id: &TaskId,
        patch: TaskPatch,
        queue: QueueMode,
    ) -> Result<Task> {
        let mut patch = patch;
        validate_patch(&mut patch)?;

        let mut conn = self.conn.lock().await;
        let tx = begin(&mut conn)?;

        let existing = select_task(&tx, id)?
            .ok_or_else(|| Error::NotFound(format!("task {}", id)))?;
        let base_modified_at = existing.modified_at;
        let updated = apply_patch(existing, patch);

        replace_task(&tx, &updated).map_err(abort)?;
        if queue == QueueMode::Queue {
            append_queue_row(
                &tx,
                OperationKind::Update,
                &updated.id,
                Some(&updated),
                Some(base_modified_at),
            )
            .map_err(abort)?;
        }
        tx.commit().map_err(abort)?;

        debug!(task = %updated.id, "task updated");
        Ok(updated)
    }

    /// Delete a task.
    ///
    /// # Errors
    /// - `NotFound` if no such task exists
    pub async fn delete_task(&self, id: &TaskId, queue: QueueMode) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = begin(&mut conn)?;

        let existing = select_task(&tx, id)?
            .ok_or_else(|| Error::NotFound(format!("task {}", id)))?;
        tx.execute("DELETE FROM tasks WHERE id = ?1", [id.as_str()])
            .map_err(abort)?;
        if queue == QueueMode::Queue {
            append_queue_row(
                &tx,
                OperationKind::Delete,
                id,
                None,
                Some(existing.modified_at),
            )
            .map_err(abort)?;
        }
        tx.commit().map_err(abort)?;

        debug!(task = %id, "task deleted");
        Ok(())
    }

    /// Write a driver-confirmed record verbatim, bypassing patch semantics.
    ///
    /// Used when a resolved merge has been accepted remotely; the record was
    /// sanitized when it first entered a store, and its `modified_at` is the
    /// merge maximum, so monotonicity holds.
    pub async fn apply_synced_task(&self, task: &Task) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = begin(&mut conn)?;
        replace_task(&tx, task).map_err(abort)?;
        tx.commit().map_err(abort)?;
        Ok(())
    }

    /// Query tasks matching a filter, ordered by creation time.
    ///
    /// Finite and restartable: each call re-executes the underlying query.
    pub async fn query_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let mut sql = format!("SELECT {} FROM tasks", TASK_COLUMNS);
        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            args.push(Box::new(status.as_str().to_string()));
            clauses.push(format!("status = ?{}", args.len()));
        }
        if let Some(priority) = filter.priority {
            args.push(Box::new(priority.as_str().to_string()));
            clauses.push(format!("priority = ?{}", args.len()));
        }
        if let Some(category) = &filter.category_id {
            args.push(Box::new(category.as_str().to_string()));
            clauses.push(format!("category_id = ?{}", args.len()));
        }
        if let Some(due_before) = filter.due_before {
            args.push(Box::new(due_before.timestamp_micros()));
            clauses.push(format!(
                "due_date IS NOT NULL AND due_date < ?{}",
                args.len()
            ));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at ASC, id ASC");

        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&sql).map_err(storage)?;
        let params = rusqlite::params_from_iter(args.iter().map(|a| a.as_ref()));
        let rows = stmt.query_map(params, task_from_row).map_err(storage)?;

        let mut tasks = Vec::new();
        for row in rows {
            let task = row.map_err(storage)?;
            // Tags live in a JSON column; match them here rather than in SQL.
            if let Some(tag) = &filter.tag {
                if !task.tags.iter().any(|t| t == tag) {
                    continue;
                }
            }
            tasks.push(task);
        }
        Ok(tasks)
    }

    /// Append an outbox row outside of a task mutation (used by the outbox
    /// when re-queueing). `enqueued_at` stays strictly increasing.
    pub async fn enqueue_operation(
        &self,
        kind: OperationKind,
        target: &TaskId,
        payload: Option<&Task>,
        base_modified_at: Option<DateTime<Utc>>,
    ) -> Result<SyncOperation> {
        let mut conn = self.conn.lock().await;
        let tx = begin(&mut conn)?;
        let op = append_queue_row(&tx, kind, target, payload, base_modified_at).map_err(abort)?;
        tx.commit().map_err(abort)?;
        Ok(op)
    }

    /// All pending queue rows in enqueue order.
    ///
    /// Safe to call against a database whose queue table has never been
    /// created; degrades to "no pending operations".
    pub async fn list_queue(&self) -> Result<Vec<SyncOperation>> {
        let conn = self.conn.lock().await;
        if !table_exists(&conn, "sync_queue")? {
            return Ok(Vec::new());
        }
        let mut stmt = conn
            .prepare(
                "SELECT id, kind, target, payload, base_modified_at, enqueued_at, attempts \
                 FROM sync_queue ORDER BY enqueued_at ASC",
            )
            .map_err(storage)?;
        let rows = stmt.query_map([], operation_from_row).map_err(storage)?;
        let mut ops = Vec::new();
        for row in rows {
            ops.push(row.map_err(storage)?);
        }
        Ok(ops)
    }

    /// Remove a queue row. Returns whether a row was actually removed;
    /// removing an unknown id is not an error.
    pub async fn delete_queue_row(&self, id: &OperationId) -> Result<bool> {
        let conn = self.conn.lock().await;
        if !table_exists(&conn, "sync_queue")? {
            return Ok(false);
        }
        let changed = conn
            .execute("DELETE FROM sync_queue WHERE id = ?1", [id.as_str()])
            .map_err(storage)?;
        Ok(changed > 0)
    }

    /// Increment the attempt counter of a queue row, if it still exists.
    pub async fn increment_queue_attempts(&self, id: &OperationId) -> Result<()> {
        let conn = self.conn.lock().await;
        let changed = conn
            .execute(
                "UPDATE sync_queue SET attempts = attempts + 1 WHERE id = ?1",
                [id.as_str()],
            )
            .map_err(storage)?;
        if changed == 0 {
            warn!(operation = %id, "attempt recorded for unknown queue row");
        }
        Ok(())
    }

    /// Number of pending queue rows.
    pub async fn queue_len(&self) -> Result<usize> {
        let conn = self.conn.lock().await;
        if !table_exists(&conn, "sync_queue")? {
            return Ok(0);
        }
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))
            .map_err(storage)?;
        Ok(count as usize)
    }
}

pub(crate) const TASK_COLUMNS: &str = "id, title, description, status, priority, category_id, \
     due_date, created_at, modified_at, completed_at, tags, metadata";

pub(crate) fn begin(conn: &mut Connection) -> Result<Transaction<'_>> {
    conn.transaction()
        .map_err(|e| Error::Storage(e.to_string()))
}

pub(crate) fn storage(e: rusqlite::Error) -> Error {
    match &e {
        rusqlite::Error::SqliteFailure(f, _) if f.code == rusqlite::ErrorCode::DiskFull => {
            Error::QuotaExceeded(e.to_string())
        }
        _ => Error::Storage(e.to_string()),
    }
}

/// Failures after the transaction has opened; the whole mutation unwinds.
pub(crate) fn abort(e: rusqlite::Error) -> Error {
    match &e {
        rusqlite::Error::SqliteFailure(f, _) if f.code == rusqlite::ErrorCode::DiskFull => {
            Error::QuotaExceeded(e.to_string())
        }
        _ => Error::TransactionAbort(e.to_string()),
    }
}

pub(crate) fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )
        .map_err(storage)?;
    Ok(count > 0)
}

fn insert_task(tx: &Transaction<'_>, task: &Task) -> rusqlite::Result<()> {
    write_task(tx, task, "INSERT INTO")
}

fn replace_task(tx: &Transaction<'_>, task: &Task) -> rusqlite::Result<()> {
    write_task(tx, task, "INSERT OR REPLACE INTO")
}

fn write_task(tx: &Transaction<'_>, task: &Task, verb: &str) -> rusqlite::Result<()> {
    let tags = serde_json::to_string(&task.tags).map_err(json_err)?;
    let metadata = serde_json::to_string(&task.metadata).map_err(json_err)?;
    tx.execute(
        &format!(
            "{verb} tasks (id, title, description, status, priority, category_id, due_date, \
             created_at, modified_at, completed_at, tags, metadata) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            task.id.as_str(),
            task.title,
            task.description,
            task.status.as_str(),
            task.priority.as_str(),
            task.category_id.as_ref().map(|c| c.as_str()),
            task.due_date.map(|t| t.timestamp_micros()),
            task.created_at.timestamp_micros(),
            task.modified_at.timestamp_micros(),
            task.completed_at.map(|t| t.timestamp_micros()),
            tags,
            metadata,
        ],
    )?;
    Ok(())
}

fn select_task(tx: &Transaction<'_>, id: &TaskId) -> Result<Option<Task>> {
    let mut stmt = tx
        .prepare(&format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS))
        .map_err(storage)?;
    match stmt.query_row([id.as_str()], task_from_row) {
        Ok(task) => Ok(Some(task)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(storage(e)),
    }
}

fn apply_patch(existing: Task, patch: TaskPatch) -> Task {
    let now = Utc::now();
    let mut task = existing;

    if let Some(title) = patch.title {
        task.title = title;
    }
    if let Some(description) = patch.description {
        task.description = description;
    }
    if let Some(raw_status) = patch.status {
        let new_status = TaskStatus::parse_or_default(&raw_status);
        if new_status == TaskStatus::Completed && task.status != TaskStatus::Completed {
            task.completed_at = Some(now);
        } else if new_status != TaskStatus::Completed {
            task.completed_at = None;
        }
        task.status = new_status;
    }
    if let Some(raw_priority) = patch.priority {
        task.priority = TaskPriority::parse_or_default(&raw_priority);
    }
    if let Some(category) = patch.category_id {
        task.category_id = category;
    }
    if let Some(due) = patch.due_date {
        task.due_date = due;
    }
    if let Some(tags) = patch.tags {
        task.tags = tags;
    }
    if let Some(metadata) = patch.metadata {
        task.metadata = metadata;
    }

    // Monotonic even if the wall clock stepped backwards.
    task.modified_at = now.max(task.modified_at);
    task
}

fn append_queue_row(
    tx: &Transaction<'_>,
    kind: OperationKind,
    target: &TaskId,
    payload: Option<&Task>,
    base_modified_at: Option<DateTime<Utc>>,
) -> rusqlite::Result<SyncOperation> {
    let last: i64 = tx.query_row(
        "SELECT COALESCE(MAX(enqueued_at), 0) FROM sync_queue",
        [],
        |row| row.get(0),
    )?;
    let enqueued_us = Utc::now().timestamp_micros().max(last + 1);
    let enqueued_at = micros_to_datetime(enqueued_us).map_err(|e| json_err_boxed(6, e))?;

    let op = SyncOperation {
        id: OperationId::generate(),
        kind,
        target: target.clone(),
        payload: payload.cloned(),
        base_modified_at,
        enqueued_at,
        attempts: 0,
    };

    let payload_json = op
        .payload
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(json_err)?;

    tx.execute(
        "INSERT INTO sync_queue (id, kind, target, payload, base_modified_at, enqueued_at, attempts) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            op.id.as_str(),
            op.kind.as_str(),
            op.target.as_str(),
            payload_json,
            op.base_modified_at.map(|t| t.timestamp_micros()),
            enqueued_us,
            op.attempts,
        ],
    )?;
    Ok(op)
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let id: String = row.get(0)?;
    let category_id: Option<String> = row.get(5)?;
    let tags_json: String = row.get(10)?;
    let metadata_json: String = row.get(11)?;

    let tags: Vec<String> =
        serde_json::from_str(&tags_json).map_err(|e| json_err_boxed(10, Box::new(e)))?;
    let metadata: Map<String, Value> =
        serde_json::from_str(&metadata_json).map_err(|e| json_err_boxed(11, Box::new(e)))?;

    Ok(Task {
        id: TaskId::new(id).map_err(|e| json_err_boxed(0, Box::new(e)))?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: TaskStatus::parse_or_default(&row.get::<_, String>(3)?),
        priority: TaskPriority::parse_or_default(&row.get::<_, String>(4)?),
        category_id: match category_id {
            Some(c) => Some(CategoryId::new(c).map_err(|e| json_err_boxed(5, Box::new(e)))?),
            None => None,
        },
        due_date: opt_micros(row, 6)?,
        created_at: req_micros(row, 7)?,
        modified_at: req_micros(row, 8)?,
        completed_at: opt_micros(row, 9)?,
        tags,
        metadata,
    })
}

fn operation_from_row(row: &Row<'_>) -> rusqlite::Result<SyncOperation> {
    let id: String = row.get(0)?;
    let kind_raw: String = row.get(1)?;
    let target: String = row.get(2)?;
    let payload_json: Option<String> = row.get(3)?;

    let kind = OperationKind::parse(&kind_raw).ok_or_else(|| {
        json_err_boxed(
            1,
            format!("unknown operation kind: {kind_raw}").into(),
        )
    })?;
    let payload: Option<Task> = match payload_json {
        Some(json) => {
            Some(serde_json::from_str(&json).map_err(|e| json_err_boxed(3, Box::new(e)))?)
        }
        None => None,
    };

    Ok(SyncOperation {
        id: OperationId::new(id).map_err(|e| json_err_boxed(0, Box::new(e)))?,
        kind,
        target: TaskId::new(target).map_err(|e| json_err_boxed(2, Box::new(e)))?,
        payload,
        base_modified_at: opt_micros(row, 4)?,
        enqueued_at: req_micros(row, 5)?,
        attempts: row.get(6)?,
    })
}

fn req_micros(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: i64 = row.get(idx)?;
    micros_to_datetime(raw).map_err(|e| json_err_boxed(idx, e))
}

fn opt_micros(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<i64> = row.get(idx)?;
    match raw {
        Some(v) => Ok(Some(micros_to_datetime(v).map_err(|e| json_err_boxed(idx, e))?)),
        None => Ok(None),
    }
}

fn micros_to_datetime(
    micros: i64,
) -> std::result::Result<DateTime<Utc>, Box<dyn std::error::Error + Send + Sync + 'static>> {
    Utc.timestamp_micros(micros)
        .single()
        .ok_or_else(|| format!("timestamp out of range: {micros}").into())
}

fn json_err(e: serde_json::Error) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(e))
}

fn json_err_boxed(
    idx: usize,
    e: Box<dyn std::error::Error + Send + Sync + 'static>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> Store {
        Store::in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn create_then_read_returns_sanitized_record() {
        let store = store().await;
        let draft = TaskDraft::new("Buy <script>alert(1)</script>milk")
            .with_description("from the <b>corner</b> shop");
        let created = store.create_task(draft, QueueMode::Skip).await.unwrap();

        let read = store.get_task(&created.id).await.unwrap().unwrap();
        assert_eq!(read, created);
        assert_eq!(read.title, "Buy alert(1)milk");
        assert_eq!(read.description, "from the corner shop");
        assert!(!read.id.as_str().is_empty());
    }

    #[tokio::test]
    async fn create_rejects_invalid_titles_before_any_write() {
        let store = store().await;
        assert!(matches!(
            store
                .create_task(TaskDraft::new(""), QueueMode::Skip)
                .await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            store
                .create_task(TaskDraft::new("x".repeat(201)), QueueMode::Skip)
                .await,
            Err(Error::Validation(_))
        ));
        assert_eq!(store.query_tasks(&TaskFilter::default()).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn unknown_enum_values_coerce_to_defaults() {
        let store = store().await;
        let draft = TaskDraft {
            title: "t".to_string(),
            status: Some("snoozed".to_string()),
            priority: Some("critical".to_string()),
            ..TaskDraft::default()
        };
        let task = store.create_task(draft, QueueMode::Skip).await.unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, TaskPriority::Medium);
    }

    #[tokio::test]
    async fn update_never_decreases_modified_at() {
        let store = store().await;
        let task = store
            .create_task(TaskDraft::new("t"), QueueMode::Skip)
            .await
            .unwrap();

        let mut last = task.modified_at;
        for i in 0..5 {
            let updated = store
                .update_task(&task.id, TaskPatch::title(format!("t{i}")), QueueMode::Skip)
                .await
                .unwrap();
            assert!(updated.modified_at >= last);
            last = updated.modified_at;
        }
    }

    #[tokio::test]
    async fn completed_at_tracks_status_both_ways() {
        let store = store().await;
        let task = store
            .create_task(TaskDraft::new("t"), QueueMode::Skip)
            .await
            .unwrap();
        assert!(task.completed_at.is_none());

        let done = store
            .update_task(&task.id, TaskPatch::status("completed"), QueueMode::Skip)
            .await
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert!(done.completed_at.is_some());

        let reopened = store
            .update_task(&task.id, TaskPatch::status("pending"), QueueMode::Skip)
            .await
            .unwrap();
        assert_eq!(reopened.status, TaskStatus::Pending);
        assert!(reopened.completed_at.is_none());
    }

    #[tokio::test]
    async fn delete_then_read_is_none_and_second_delete_fails() {
        let store = store().await;
        let task = store
            .create_task(TaskDraft::new("t"), QueueMode::Skip)
            .await
            .unwrap();

        store.delete_task(&task.id, QueueMode::Skip).await.unwrap();
        assert!(store.get_task(&task.id).await.unwrap().is_none());

        assert!(matches!(
            store.delete_task(&task.id, QueueMode::Skip).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_of_missing_task_is_not_found() {
        let store = store().await;
        let missing = TaskId::generate();
        assert!(matches!(
            store
                .update_task(&missing, TaskPatch::title("x"), QueueMode::Skip)
                .await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn queued_mutation_appends_exactly_one_entry_atomically() {
        let store = store().await;
        let task = store
            .create_task(TaskDraft::new("offline"), QueueMode::Queue)
            .await
            .unwrap();

        let queue = store.list_queue().await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].kind, OperationKind::Create);
        assert_eq!(queue[0].target, task.id);
        assert_eq!(queue[0].payload.as_ref().unwrap().title, "offline");
        assert!(queue[0].base_modified_at.is_none());

        // Confirmed mutations must not enqueue.
        store
            .update_task(&task.id, TaskPatch::title("online"), QueueMode::Skip)
            .await
            .unwrap();
        assert_eq!(store.queue_len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn queue_order_is_strictly_increasing() {
        let store = store().await;
        for i in 0..10 {
            store
                .create_task(TaskDraft::new(format!("t{i}")), QueueMode::Queue)
                .await
                .unwrap();
        }
        let queue = store.list_queue().await.unwrap();
        assert_eq!(queue.len(), 10);
        for pair in queue.windows(2) {
            assert!(pair[0].enqueued_at < pair[1].enqueued_at);
        }
    }

    #[tokio::test]
    async fn queue_row_deletion_is_idempotent() {
        let store = store().await;
        store
            .create_task(TaskDraft::new("t"), QueueMode::Queue)
            .await
            .unwrap();
        let op = store.list_queue().await.unwrap().remove(0);

        assert!(store.delete_queue_row(&op.id).await.unwrap());
        assert!(!store.delete_queue_row(&op.id).await.unwrap());
        assert!(!store
            .delete_queue_row(&OperationId::generate())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn query_filters_by_status_priority_and_tag() {
        let store = store().await;
        store
            .create_task(
                TaskDraft::new("a")
                    .with_priority("urgent")
                    .with_tags(vec!["home".to_string()]),
                QueueMode::Skip,
            )
            .await
            .unwrap();
        let b = store
            .create_task(TaskDraft::new("b"), QueueMode::Skip)
            .await
            .unwrap();
        store
            .update_task(&b.id, TaskPatch::status("completed"), QueueMode::Skip)
            .await
            .unwrap();

        let completed = store
            .query_tasks(&TaskFilter {
                status: Some(TaskStatus::Completed),
                ..TaskFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].title, "b");

        let urgent = store
            .query_tasks(&TaskFilter {
                priority: Some(TaskPriority::Urgent),
                ..TaskFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(urgent.len(), 1);

        let tagged = store
            .query_tasks(&TaskFilter {
                tag: Some("home".to_string()),
                ..TaskFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].title, "a");
    }

    #[tokio::test]
    async fn query_is_restartable() {
        let store = store().await;
        store
            .create_task(TaskDraft::new("t"), QueueMode::Skip)
            .await
            .unwrap();
        let filter = TaskFilter::default();
        let first = store.query_tasks(&filter).await.unwrap();
        let second = store.query_tasks(&filter).await.unwrap();
        assert_eq!(first, second);
    }
}
