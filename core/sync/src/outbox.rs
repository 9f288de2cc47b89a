//! Durable outbox of not-yet-confirmed mutations.

use chrono::{DateTime, Utc};
use tracing::debug;

use taskvault_common::{OperationId, Result, TaskId};
use taskvault_store::{OperationKind, Store, SyncOperation, Task};

/// Ordered, durable log of mutations awaiting remote confirmation.
///
/// Built on the store: entries appended by queued mutations commit in the
/// same transaction as the mutation itself, so the log can never disagree
/// with the records it describes.
#[derive(Clone)]
pub struct Outbox {
    store: Store,
}

impl Outbox {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Append an entry directly, outside of a store mutation.
    ///
    /// `enqueued_at` is assigned strictly increasing.
    pub async fn enqueue(
        &self,
        kind: OperationKind,
        target: &TaskId,
        payload: Option<&Task>,
        base_modified_at: Option<DateTime<Utc>>,
    ) -> Result<SyncOperation> {
        let op = self
            .store
            .enqueue_operation(kind, target, payload, base_modified_at)
            .await?;
        debug!(operation = %op.id, kind = op.kind.as_str(), "operation enqueued");
        Ok(op)
    }

    /// All pending entries in enqueue order.
    ///
    /// Never fails on an uninitialized queue; a first-run store simply has
    /// no pending operations.
    pub async fn drain(&self) -> Result<Vec<SyncOperation>> {
        self.store.list_queue().await
    }

    /// Remove a confirmed entry.
    ///
    /// Idempotent: completing twice, or with an unknown id, is a no-op.
    /// The driver may retry after an ambiguous failure.
    pub async fn complete(&self, id: &OperationId) -> Result<()> {
        let removed = self.store.delete_queue_row(id).await?;
        if removed {
            debug!(operation = %id, "operation completed");
        }
        Ok(())
    }

    /// Record a failed application attempt on an entry.
    pub async fn record_attempt(&self, id: &OperationId) -> Result<()> {
        self.store.increment_queue_attempts(id).await
    }

    /// Number of pending entries.
    pub async fn len(&self) -> Result<usize> {
        self.store.queue_len().await
    }

    /// Whether the outbox has no pending entries.
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskvault_store::{QueueMode, TaskDraft};

    async fn outbox() -> (Store, Outbox) {
        let store = Store::in_memory().await.unwrap();
        (store.clone(), Outbox::new(store))
    }

    #[tokio::test]
    async fn fresh_outbox_drains_empty() {
        let (_store, outbox) = outbox().await;
        assert!(outbox.drain().await.unwrap().is_empty());
        assert!(outbox.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn drain_preserves_enqueue_order() {
        let (store, outbox) = outbox().await;
        let mut ids = Vec::new();
        for i in 0..5 {
            let task = store
                .create_task(TaskDraft::new(format!("t{i}")), QueueMode::Queue)
                .await
                .unwrap();
            ids.push(task.id);
        }

        let ops = outbox.drain().await.unwrap();
        let targets: Vec<_> = ops.iter().map(|op| op.target.clone()).collect();
        assert_eq!(targets, ids);
    }

    #[tokio::test]
    async fn complete_is_idempotent() {
        let (store, outbox) = outbox().await;
        store
            .create_task(TaskDraft::new("t"), QueueMode::Queue)
            .await
            .unwrap();
        let op = outbox.drain().await.unwrap().remove(0);

        outbox.complete(&op.id).await.unwrap();
        assert!(outbox.is_empty().await.unwrap());

        // Second completion and unknown ids are no-ops, not errors.
        outbox.complete(&op.id).await.unwrap();
        outbox.complete(&OperationId::generate()).await.unwrap();
        assert!(outbox.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn attempts_survive_drain_cycles() {
        let (store, outbox) = outbox().await;
        store
            .create_task(TaskDraft::new("t"), QueueMode::Queue)
            .await
            .unwrap();
        let op = outbox.drain().await.unwrap().remove(0);

        outbox.record_attempt(&op.id).await.unwrap();
        outbox.record_attempt(&op.id).await.unwrap();

        let again = outbox.drain().await.unwrap().remove(0);
        assert_eq!(again.attempts, 2);
        assert_eq!(again.id, op.id);
    }
}
