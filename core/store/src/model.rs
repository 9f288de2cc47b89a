//! Record types persisted by the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use taskvault_common::{CategoryId, OperationId, TaskId};

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    Archived,
}

impl TaskStatus {
    /// Parse a raw status string, coercing unknown values to `Pending`.
    pub fn parse_or_default(raw: &str) -> Self {
        match raw {
            "pending" => TaskStatus::Pending,
            "completed" => TaskStatus::Completed,
            "archived" => TaskStatus::Archived,
            _ => TaskStatus::Pending,
        }
    }

    /// Stable string form used in the database and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Archived => "archived",
        }
    }
}

/// Priority of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    /// Parse a raw priority string, coercing unknown values to `Medium`.
    pub fn parse_or_default(raw: &str) -> Self {
        match raw {
            "low" => TaskPriority::Low,
            "medium" => TaskPriority::Medium,
            "high" => TaskPriority::High,
            "urgent" => TaskPriority::Urgent,
            _ => TaskPriority::Medium,
        }
    }

    /// Stable string form used in the database and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Urgent => "urgent",
        }
    }
}

/// A task record.
///
/// Owned exclusively by the store; other components receive clones and
/// mutate only through store operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Opaque, immutable, globally unique id.
    pub id: TaskId,
    /// Non-empty, sanitized, at most 200 characters.
    pub title: String,
    /// Sanitized free text.
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    /// Weak reference: the category may be deleted out from under it.
    pub category_id: Option<CategoryId>,
    pub due_date: Option<DateTime<Utc>>,
    /// Set once at creation.
    pub created_at: DateTime<Utc>,
    /// Strictly non-decreasing across the record's lifetime.
    pub modified_at: DateTime<Utc>,
    /// Some iff `status == Completed`.
    pub completed_at: Option<DateTime<Utc>>,
    /// Ordered, each entry sanitized.
    pub tags: Vec<String>,
    /// Opaque key/value bag.
    pub metadata: Map<String, Value>,
}

impl Task {
    /// Whether the task is past due and not yet completed.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.due_date {
            Some(due) => due < now && self.status != TaskStatus::Completed,
            None => false,
        }
    }
}

/// Input for creating a task. Status and priority arrive as raw strings and
/// are coerced to documented defaults when unknown.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl TaskDraft {
    /// Create a draft with the given title and defaults everywhere else.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    pub fn with_due_date(mut self, due: DateTime<Utc>) -> Self {
        self.due_date = Some(due);
        self
    }

    pub fn with_category(mut self, category: CategoryId) -> Self {
        self.category_id = Some(category);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Partial update applied to an existing task.
///
/// `category_id` and `due_date` are doubly optional: the outer level means
/// "change this field", the inner level is the new nullable value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub category_id: Option<Option<CategoryId>>,
    #[serde(default)]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl TaskPatch {
    /// Patch that transitions the task's status.
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Self::default()
        }
    }

    /// Patch that retitles the task.
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }
}

/// Filter for task queries. Empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub category_id: Option<CategoryId>,
    pub due_before: Option<DateTime<Utc>>,
    pub tag: Option<String>,
}

/// A category record. Referenced weakly by tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    /// Unique, sanitized, non-empty.
    pub name: String,
    pub color: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryDraft {
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub description: String,
}

impl CategoryDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }
}

/// Partial update applied to an existing category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Kind of a queued sync operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }

    /// Parse the stored string form.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "create" => Some(OperationKind::Create),
            "update" => Some(OperationKind::Update),
            "delete" => Some(OperationKind::Delete),
            _ => None,
        }
    }
}

/// A durable outbox entry: a mutation awaiting remote confirmation.
///
/// Never mutated after enqueue except for the attempt counter; destroyed
/// only once the sync driver has confirmed successful application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOperation {
    pub id: OperationId,
    pub kind: OperationKind,
    pub target: TaskId,
    /// Snapshot of the record at enqueue time. None for deletes.
    pub payload: Option<Task>,
    /// The remote `modified_at` this snapshot was derived from, used for
    /// divergence detection during drain. None for creates.
    pub base_modified_at: Option<DateTime<Utc>>,
    /// Strictly increasing across the queue.
    pub enqueued_at: DateTime<Utc>,
    pub attempts: u32,
}

/// Whether a mutation should append an outbox entry in the same transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
    /// Mutation is confirmed synchronously; no outbox entry.
    Skip,
    /// Mutation must be confirmed later; append exactly one outbox entry.
    Queue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_coerces_to_pending() {
        assert_eq!(TaskStatus::parse_or_default("snoozed"), TaskStatus::Pending);
        assert_eq!(
            TaskStatus::parse_or_default("completed"),
            TaskStatus::Completed
        );
    }

    #[test]
    fn unknown_priority_coerces_to_medium() {
        assert_eq!(
            TaskPriority::parse_or_default("critical"),
            TaskPriority::Medium
        );
        assert_eq!(TaskPriority::parse_or_default("urgent"), TaskPriority::Urgent);
    }

    #[test]
    fn overdue_requires_due_date_in_past_and_open_status() {
        let now = Utc::now();
        let mut task = Task {
            id: TaskId::generate(),
            title: "t".to_string(),
            description: String::new(),
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            category_id: None,
            due_date: Some(now - chrono::Duration::hours(1)),
            created_at: now,
            modified_at: now,
            completed_at: None,
            tags: Vec::new(),
            metadata: Map::new(),
        };
        assert!(task.is_overdue(now));

        task.status = TaskStatus::Completed;
        assert!(!task.is_overdue(now));

        task.status = TaskStatus::Pending;
        task.due_date = None;
        assert!(!task.is_overdue(now));
    }

    #[test]
    fn operation_kind_round_trips() {
        for kind in [
            OperationKind::Create,
            OperationKind::Update,
            OperationKind::Delete,
        ] {
            assert_eq!(OperationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(OperationKind::parse("upsert"), None);
    }
}
