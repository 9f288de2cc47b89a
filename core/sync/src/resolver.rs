//! Conflict resolution between divergent versions of one record.

use tracing::debug;

use taskvault_store::{Task, TaskStatus};

/// Merge two versions of the same record whose histories diverged.
///
/// Policy, in priority order:
/// 1. Completion precedence: if either side is completed, the merge is
///    completed. A concurrent edit never silently undoes completion.
/// 2. Timestamp precedence: otherwise the side with the greater
///    `modified_at` wins wholesale; ties favor the local copy, which keeps
///    replaying an already-applied snapshot idempotent.
/// 3. Priority carry-over: a local priority edit survives even when the
///    remote wins on timestamp. Every queued local snapshot postdates the
///    remote version it superseded, so a remote win must not quietly reset
///    the priority the user just chose.
///
/// Resolution never deletes a record; delete-versus-update is decided by
/// the sync driver, where an explicit delete is terminal.
///
/// The merged `modified_at` is the maximum of both sides.
pub fn resolve(local: &Task, remote: &Task) -> Task {
    let local_wins = local.modified_at >= remote.modified_at;
    let mut merged = if local_wins {
        local.clone()
    } else {
        remote.clone()
    };

    if local.status == TaskStatus::Completed || remote.status == TaskStatus::Completed {
        if merged.status != TaskStatus::Completed {
            let completed_side = if local.status == TaskStatus::Completed {
                local
            } else {
                remote
            };
            merged.status = TaskStatus::Completed;
            merged.completed_at = completed_side
                .completed_at
                .or(Some(completed_side.modified_at));
        }
    } else {
        // Status invariant: completed_at only exists alongside Completed.
        merged.completed_at = None;
    }

    if !local_wins && local.priority != remote.priority {
        debug!(task = %local.id, "carrying local priority through remote win");
        merged.priority = local.priority;
    }

    merged.modified_at = local.modified_at.max(remote.modified_at);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use proptest::prelude::*;
    use serde_json::Map;
    use taskvault_common::TaskId;
    use taskvault_store::TaskPriority;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    fn task(id: &TaskId, status: TaskStatus, modified: i64) -> Task {
        Task {
            id: id.clone(),
            title: "t".to_string(),
            description: String::new(),
            status,
            priority: TaskPriority::Medium,
            category_id: None,
            due_date: None,
            created_at: at(0),
            modified_at: at(modified),
            completed_at: (status == TaskStatus::Completed).then(|| at(modified)),
            tags: Vec::new(),
            metadata: Map::new(),
        }
    }

    #[test]
    fn completion_precedence_beats_older_timestamp() {
        let id = TaskId::generate();
        let local = task(&id, TaskStatus::Pending, 100);
        let remote = task(&id, TaskStatus::Completed, 90);

        let merged = resolve(&local, &remote);
        assert_eq!(merged.status, TaskStatus::Completed);
        assert!(merged.completed_at.is_some());
        assert_eq!(merged.modified_at, at(100));
    }

    #[test]
    fn newer_side_wins_wholesale() {
        let id = TaskId::generate();
        let mut local = task(&id, TaskStatus::Pending, 50);
        local.title = "local title".to_string();
        let mut remote = task(&id, TaskStatus::Archived, 80);
        remote.title = "remote title".to_string();

        let merged = resolve(&local, &remote);
        assert_eq!(merged.title, "remote title");
        assert_eq!(merged.status, TaskStatus::Archived);
    }

    #[test]
    fn local_priority_survives_remote_win() {
        let id = TaskId::generate();
        let mut local = task(&id, TaskStatus::Pending, 50);
        local.priority = TaskPriority::Urgent;
        let remote = task(&id, TaskStatus::Pending, 80);

        let merged = resolve(&local, &remote);
        assert_eq!(merged.priority, TaskPriority::Urgent);
        // Everything else still comes from the remote side.
        assert_eq!(merged.modified_at, at(80));
    }

    #[test]
    fn ties_favor_local() {
        let id = TaskId::generate();
        let mut local = task(&id, TaskStatus::Pending, 60);
        local.title = "local".to_string();
        let mut remote = task(&id, TaskStatus::Pending, 60);
        remote.title = "remote".to_string();

        assert_eq!(resolve(&local, &remote).title, "local");
    }

    fn arb_status() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![
            Just(TaskStatus::Pending),
            Just(TaskStatus::Completed),
            Just(TaskStatus::Archived),
        ]
    }

    fn arb_priority() -> impl Strategy<Value = TaskPriority> {
        prop_oneof![
            Just(TaskPriority::Low),
            Just(TaskPriority::Medium),
            Just(TaskPriority::High),
            Just(TaskPriority::Urgent),
        ]
    }

    fn arb_task(id: TaskId) -> impl Strategy<Value = Task> {
        (arb_status(), arb_priority(), 0i64..10_000).prop_map(move |(status, priority, modified)| {
            let mut t = task(&id, status, modified);
            t.priority = priority;
            t
        })
    }

    proptest! {
        #[test]
        fn resolve_preserves_completion(
            (local, remote) in {
                let id = TaskId::generate();
                (arb_task(id.clone()), arb_task(id))
            }
        ) {
            let merged = resolve(&local, &remote);
            if local.status == TaskStatus::Completed || remote.status == TaskStatus::Completed {
                prop_assert_eq!(merged.status, TaskStatus::Completed);
                prop_assert!(merged.completed_at.is_some());
            }
        }

        #[test]
        fn resolve_never_decreases_modified_at(
            (local, remote) in {
                let id = TaskId::generate();
                (arb_task(id.clone()), arb_task(id))
            }
        ) {
            let merged = resolve(&local, &remote);
            prop_assert!(merged.modified_at >= local.modified_at);
            prop_assert!(merged.modified_at >= remote.modified_at);
        }

        #[test]
        fn resolve_maintains_completed_at_invariant(
            (local, remote) in {
                let id = TaskId::generate();
                (arb_task(id.clone()), arb_task(id))
            }
        ) {
            let merged = resolve(&local, &remote);
            prop_assert_eq!(
                merged.completed_at.is_some(),
                merged.status == TaskStatus::Completed
            );
        }

        #[test]
        fn resolve_is_idempotent(task in arb_task(TaskId::generate())) {
            let merged = resolve(&task, &task);
            prop_assert_eq!(merged, task);
        }
    }
}
