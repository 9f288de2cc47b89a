//! Cross-context broadcast.
//!
//! Publish/subscribe fan-out that propagates already-applied mutations to
//! every other open execution context, so siblings can update their
//! in-memory view without re-reading the store. Best-effort notification,
//! not a source of truth: a receiver that lags gets an explicit error and
//! must re-read the store, as must any context resuming from suspension.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use taskvault_common::{CategoryId, ContextId, Error, Result, TaskId};
use taskvault_store::Task;

/// Default channel capacity per receiver.
const DEFAULT_CAPACITY: usize = 256;

/// An engine event announced to sibling contexts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    #[serde(rename = "TASK_CREATED")]
    TaskCreated(Task),
    #[serde(rename = "TASK_UPDATED")]
    TaskUpdated(Task),
    #[serde(rename = "TASK_DELETED")]
    TaskDeleted { id: TaskId },
    #[serde(rename = "CATEGORY_CHANGED")]
    CategoryChanged { id: CategoryId },
    #[serde(rename = "SYNC_COMPLETE")]
    SyncComplete { count: usize },
}

/// A broadcast message: transient, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMessage {
    #[serde(flatten)]
    pub event: Event,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "originId")]
    pub origin: ContextId,
}

/// Shared fan-out hub. One per process; contexts register for a handle.
pub struct BroadcastBus {
    tx: broadcast::Sender<ContextMessage>,
    // Keeps the channel open so publishing with no live sibling succeeds.
    _guard: broadcast::Receiver<ContextMessage>,
}

impl BroadcastBus {
    /// Create a bus with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with an explicit per-receiver capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, guard) = broadcast::channel(capacity);
        Self { tx, _guard: guard }
    }

    /// Register a new execution context and return its handle.
    pub fn register(&self) -> ContextHandle {
        let id = ContextId::generate();
        debug!(context = %id, "context registered on broadcast bus");
        ContextHandle {
            id,
            tx: self.tx.clone(),
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A single context's endpoint on the bus.
pub struct ContextHandle {
    id: ContextId,
    tx: broadcast::Sender<ContextMessage>,
    rx: broadcast::Receiver<ContextMessage>,
}

impl ContextHandle {
    /// This context's identity, stamped on everything it publishes.
    pub fn id(&self) -> &ContextId {
        &self.id
    }

    /// Announce an applied mutation to every other context.
    pub fn publish(&self, event: Event) -> Result<()> {
        let message = ContextMessage {
            event,
            timestamp: Utc::now(),
            origin: self.id.clone(),
        };
        self.tx
            .send(message)
            .map(|_| ())
            .map_err(|_| Error::Channel("broadcast bus closed".to_string()))
    }

    /// Wait for the next message from a sibling context.
    ///
    /// Messages this context published itself are filtered out. A lagged
    /// receiver gets `Error::Channel` and must re-read the store.
    pub async fn recv(&mut self) -> Result<ContextMessage> {
        loop {
            match self.rx.recv().await {
                Ok(message) if message.origin == self.id => continue,
                Ok(message) => return Ok(message),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    return Err(Error::Channel(format!(
                        "receiver lagged by {n} messages; re-read the store"
                    )));
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(Error::Channel("broadcast bus closed".to_string()));
                }
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Result<Option<ContextMessage>> {
        loop {
            match self.rx.try_recv() {
                Ok(message) if message.origin == self.id => continue,
                Ok(message) => return Ok(Some(message)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Err(Error::Channel(format!(
                        "receiver lagged by {n} messages; re-read the store"
                    )));
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(Error::Channel("broadcast bus closed".to_string()));
                }
            }
        }
    }
}
