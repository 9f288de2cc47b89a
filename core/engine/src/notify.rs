//! Notification payloads and action routing for completed/overdue tasks.

use serde::{Deserialize, Serialize};

use taskvault_common::{Error, Result, TaskId};
use taskvault_store::Task;

use crate::engine::Engine;

/// Notification action identifiers.
pub const ACTION_COMPLETE: &str = "complete";
pub const ACTION_VIEW: &str = "view";

/// A button on a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
}

/// Payload data carried by a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    #[serde(rename = "taskId")]
    pub task_id: TaskId,
}

/// A notification ready for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub data: NotificationData,
    pub actions: Vec<NotificationAction>,
}

fn notification(title: String, body: String, task: &Task) -> Notification {
    Notification {
        title,
        body,
        data: NotificationData {
            task_id: task.id.clone(),
        },
        actions: vec![
            NotificationAction {
                action: ACTION_COMPLETE.to_string(),
            },
            NotificationAction {
                action: ACTION_VIEW.to_string(),
            },
        ],
    }
}

/// Notification for a task that just completed elsewhere.
pub fn completed_notification(task: &Task) -> Notification {
    notification(
        "Task completed".to_string(),
        task.title.clone(),
        task,
    )
}

/// Notification for a task past its due date.
pub fn overdue_notification(task: &Task) -> Notification {
    notification(
        "Task overdue".to_string(),
        format!("\"{}\" is past due", task.title),
        task,
    )
}

/// Deep link to a specific task record.
pub fn deep_link(id: &TaskId) -> String {
    format!("taskvault://task/{id}")
}

/// Result of a notification action click.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// The task was completed through the regular update path.
    Completed(Task),
    /// The caller should navigate to this deep link.
    View(String),
}

/// Route a notification action click.
///
/// `complete` goes through the same store update path as the in-app
/// completion toggle; `view` resolves to a deep link for the record.
pub async fn handle_action(engine: &Engine, action: &str, task_id: &TaskId) -> Result<ActionOutcome> {
    match action {
        ACTION_COMPLETE => Ok(ActionOutcome::Completed(engine.complete_task(task_id).await?)),
        ACTION_VIEW => Ok(ActionOutcome::View(deep_link(task_id))),
        other => Err(Error::Validation(format!(
            "unknown notification action: {other}"
        ))),
    }
}
