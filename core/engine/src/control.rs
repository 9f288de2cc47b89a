//! Background-worker control protocol.
//!
//! Foreground contexts post control messages into the worker; the worker
//! answers over the broadcast bus (`SYNC_COMPLETE{count}` after a drain).
//! The background-drain trigger is the well-known tag [`SYNC_TAG`], shared
//! by producer and consumer.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use taskvault_cache::{CacheStore, CachedFetcher};
use taskvault_common::{Error, Result, SYNC_TAG};
use taskvault_store::Task;
use taskvault_sync::SyncTrigger;

/// Messages posted into the background worker context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ControlMessage {
    /// Cache a task snapshot for offline reads.
    #[serde(rename = "CACHE_TASK")]
    CacheTask(Task),
    /// Drain the outbox now.
    #[serde(rename = "REQUEST_SYNC")]
    RequestSync,
    /// Drop every cached entry.
    #[serde(rename = "CLEAR_CACHE")]
    ClearCache,
}

/// Cache key for a task snapshot.
pub fn task_cache_key(task: &Task) -> String {
    format!("task/{}", task.id)
}

/// Handle for posting control messages into the worker.
pub struct WorkerHandle {
    tx: mpsc::Sender<ControlMessage>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Post a control message.
    pub async fn post(&self, message: ControlMessage) -> Result<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| Error::Channel("background worker stopped".to_string()))
    }

    /// Route a background-sync event by tag. Unknown tags are ignored.
    pub async fn handle_sync_event(&self, tag: &str) -> Result<()> {
        if tag == SYNC_TAG {
            self.post(ControlMessage::RequestSync).await
        } else {
            debug!(tag, "ignoring unknown sync tag");
            Ok(())
        }
    }

    /// Stop the worker and wait for its loop to finish.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.tx);
        self.join
            .await
            .map_err(|e| Error::Channel(format!("worker task failed: {e}")))
    }
}

/// Spawn the background worker loop.
///
/// The worker owns a cache fetcher for `CACHE_TASK`/`CLEAR_CACHE` and a
/// drain trigger for `REQUEST_SYNC`. It runs until every [`WorkerHandle`]
/// sender is gone.
pub fn spawn_worker(fetcher: CachedFetcher, trigger: SyncTrigger) -> WorkerHandle {
    let (tx, mut rx) = mpsc::channel::<ControlMessage>(32);

    let join = tokio::spawn(async move {
        info!("background worker started");
        while let Some(message) = rx.recv().await {
            match message {
                ControlMessage::CacheTask(task) => {
                    let key = task_cache_key(&task);
                    match serde_json::to_vec(&task) {
                        Ok(bytes) => {
                            if let Err(e) = fetcher.cache().put(&key, bytes).await {
                                warn!(key, "failed to cache task: {e}");
                            }
                        }
                        Err(e) => warn!(key, "failed to serialize task: {e}"),
                    }
                }
                ControlMessage::RequestSync => {
                    if let Err(e) = trigger.request_sync() {
                        warn!("sync request dropped: {e}");
                    }
                }
                ControlMessage::ClearCache => {
                    if let Err(e) = fetcher.cache().clear().await {
                        warn!("failed to clear cache: {e}");
                    }
                }
            }
        }
        info!("background worker stopped");
    });

    WorkerHandle { tx, join }
}
