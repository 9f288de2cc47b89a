//! Sync driver: a background state machine that drains the outbox.

use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use taskvault_broadcast::{ContextHandle, Event};
use taskvault_common::{Error, Result};
use taskvault_store::{OperationKind, Provisional, Store, SyncOperation, Task};

use crate::connectivity::ConnectivityMonitor;
use crate::outbox::Outbox;
use crate::remote::RemoteStore;
use crate::resolver::resolve;
use crate::retry::{RetryConfig, RetryExecutor};

/// Configuration for the sync driver.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SyncConfig {
    /// Retry policy for network-bound calls within a drain.
    pub retry: RetryConfig,
    /// Trigger channel capacity; overflowing triggers coalesce.
    pub trigger_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            trigger_capacity: 8,
        }
    }
}

/// Observable driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DriverState {
    /// Nothing queued, nothing running.
    Idle,
    /// Operations queued, waiting for a trigger or for connectivity.
    Pending,
    /// Actively replaying the outbox.
    Draining,
    /// The last drain pass visited every queued operation.
    Completed,
    /// The last drain pass was interrupted by connectivity loss. Remaining
    /// entries stay queued untouched; any later trigger retries them.
    Failed,
}

/// Outcome of a single drain pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrainOutcome {
    /// Operations confirmed and removed from the outbox.
    pub completed: usize,
    /// Operations that failed and stay queued.
    pub failed: usize,
    /// Whether the pass stopped early on connectivity loss.
    pub interrupted: bool,
}

enum DriverRequest {
    Sync,
    Shutdown,
}

/// Cloneable trigger endpoint for contexts that only need to request
/// drains, such as the background worker.
#[derive(Clone)]
pub struct SyncTrigger {
    request_tx: mpsc::Sender<DriverRequest>,
}

impl SyncTrigger {
    /// Request a drain. Triggers arriving while a drain is already running
    /// coalesce into a no-op.
    pub fn request_sync(&self) -> Result<()> {
        match self.request_tx.try_send(DriverRequest::Sync) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(Error::Channel("sync driver stopped".to_string()))
            }
        }
    }
}

/// Handle to a spawned driver.
pub struct DriverHandle {
    request_tx: mpsc::Sender<DriverRequest>,
    state_rx: watch::Receiver<DriverState>,
    join: JoinHandle<()>,
}

impl DriverHandle {
    /// Request a drain. See [`SyncTrigger::request_sync`].
    pub fn request_sync(&self) -> Result<()> {
        self.trigger().request_sync()
    }

    /// A cloneable trigger sharing this driver's request channel.
    pub fn trigger(&self) -> SyncTrigger {
        SyncTrigger {
            request_tx: self.request_tx.clone(),
        }
    }

    /// Current driver state.
    pub fn state(&self) -> DriverState {
        *self.state_rx.borrow()
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<DriverState> {
        self.state_rx.clone()
    }

    /// Stop the driver and wait for the background task to finish.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.request_tx.send(DriverRequest::Shutdown).await;
        self.join
            .await
            .map_err(|e| Error::Channel(format!("sync driver task failed: {e}")))
    }
}

/// The drain state machine. Lives in a spawned background task; interact
/// through the [`DriverHandle`].
pub struct SyncDriver {
    store: Store,
    outbox: Outbox,
    remote: Arc<dyn RemoteStore>,
    connectivity: ConnectivityMonitor,
    bus: ContextHandle,
    retry: RetryExecutor,
    state_tx: watch::Sender<DriverState>,
}

impl SyncDriver {
    /// Spawn the driver in a background task.
    pub fn spawn(
        store: Store,
        remote: Arc<dyn RemoteStore>,
        connectivity: ConnectivityMonitor,
        bus: ContextHandle,
        config: SyncConfig,
    ) -> DriverHandle {
        let (request_tx, request_rx) = mpsc::channel(config.trigger_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(DriverState::Idle);

        let driver = Self {
            outbox: Outbox::new(store.clone()),
            store,
            remote,
            connectivity,
            bus,
            retry: RetryExecutor::new(config.retry),
            state_tx,
        };
        let join = tokio::spawn(driver.run(request_rx));

        DriverHandle {
            request_tx,
            state_rx,
            join,
        }
    }

    async fn run(self, mut request_rx: mpsc::Receiver<DriverRequest>) {
        let mut conn_rx = self.connectivity.subscribe();
        let mut was_online = self.connectivity.is_online();

        info!(remote = self.remote.name(), "sync driver started");

        // Work queued before the driver came up (a previous session, or
        // mutations racing the spawn) must not wait for the next edge.
        if matches!(self.outbox.len().await, Ok(n) if n > 0) {
            if was_online {
                if self.handle_trigger(&mut request_rx).await.is_break() {
                    info!("sync driver stopped");
                    return;
                }
            } else {
                self.set_state(DriverState::Pending);
            }
        }

        loop {
            tokio::select! {
                request = request_rx.recv() => match request {
                    None | Some(DriverRequest::Shutdown) => break,
                    Some(DriverRequest::Sync) => {
                        if self.handle_trigger(&mut request_rx).await.is_break() {
                            break;
                        }
                    }
                },
                changed = conn_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let online = *conn_rx.borrow_and_update();
                    let came_online = online && !was_online;
                    was_online = online;
                    if came_online {
                        debug!("connectivity restored, draining outbox");
                        if self.handle_trigger(&mut request_rx).await.is_break() {
                            break;
                        }
                    }
                }
            }
        }

        info!("sync driver stopped");
    }

    async fn handle_trigger(
        &self,
        request_rx: &mut mpsc::Receiver<DriverRequest>,
    ) -> ControlFlow<()> {
        if !self.connectivity.is_online() {
            // Cannot drain; remember that work is waiting.
            if matches!(self.outbox.len().await, Ok(n) if n > 0) {
                self.set_state(DriverState::Pending);
            }
            return ControlFlow::Continue(());
        }

        self.set_state(DriverState::Draining);
        let outcome = self.drain_pass().await;

        if outcome.interrupted {
            warn!(
                completed = outcome.completed,
                "drain interrupted; remaining operations stay queued"
            );
            self.set_state(DriverState::Failed);
        } else {
            self.set_state(DriverState::Completed);
            if let Err(e) = self.bus.publish(Event::SyncComplete {
                count: outcome.completed,
            }) {
                warn!("failed to announce sync completion: {e}");
            }
            let remaining = self.outbox.len().await.unwrap_or(0);
            self.set_state(if remaining == 0 {
                DriverState::Idle
            } else {
                DriverState::Pending
            });
        }

        // Triggers that arrived mid-drain are satisfied by the pass that
        // just ran; coalesce them.
        loop {
            match request_rx.try_recv() {
                Ok(DriverRequest::Sync) => continue,
                Ok(DriverRequest::Shutdown) => return ControlFlow::Break(()),
                Err(_) => break,
            }
        }
        ControlFlow::Continue(())
    }

    /// Replay every queued operation, strictly one at a time in enqueue
    /// order. A failed operation is logged and left queued; it never aborts
    /// the rest of the pass.
    async fn drain_pass(&self) -> DrainOutcome {
        let operations = match self.outbox.drain().await {
            Ok(ops) => ops,
            Err(e) => {
                error!("failed to read outbox: {e}");
                return DrainOutcome {
                    interrupted: true,
                    ..DrainOutcome::default()
                };
            }
        };

        debug!(total = operations.len(), "drain pass started");
        let mut outcome = DrainOutcome::default();

        for operation in operations {
            if !self.connectivity.is_online() {
                warn!("connectivity lost mid-drain");
                outcome.interrupted = true;
                break;
            }

            match self.apply_operation(&operation).await {
                Ok(applied) => {
                    // Nothing counts as complete until the outbox entry is
                    // actually gone.
                    if let Err(e) = self.outbox.complete(&operation.id).await {
                        error!(
                            operation = %operation.id,
                            "applied remotely but completion failed: {e}"
                        );
                        outcome.failed += 1;
                        continue;
                    }
                    outcome.completed += 1;
                    if let Some(task) = applied {
                        // A confirmed merge rewrote the local record.
                        let _ = self.bus.publish(Event::TaskUpdated(task));
                    }
                }
                Err(e) => {
                    warn!(
                        operation = %operation.id,
                        kind = operation.kind.as_str(),
                        "sync operation failed: {e}"
                    );
                    if let Err(attempt_err) = self.outbox.record_attempt(&operation.id).await {
                        error!("failed to record attempt: {attempt_err}");
                    }
                    outcome.failed += 1;
                }
            }
        }

        debug!(
            completed = outcome.completed,
            failed = outcome.failed,
            interrupted = outcome.interrupted,
            "drain pass finished"
        );
        outcome
    }

    /// Apply one queued operation against the remote replica.
    ///
    /// Returns the merged record when conflict resolution rewrote the local
    /// copy, so the caller can announce it.
    async fn apply_operation(&self, operation: &SyncOperation) -> Result<Option<Task>> {
        match operation.kind {
            OperationKind::Delete => {
                // Explicit removal is terminal; it wins over any concurrent
                // remote update to the same id.
                self.retry
                    .execute(|| self.remote.remove(&operation.target))
                    .await?;
                Ok(None)
            }
            OperationKind::Create | OperationKind::Update => {
                let snapshot = operation.payload.as_ref().ok_or_else(|| {
                    Error::Sync(format!(
                        "queued {} operation without payload",
                        operation.kind.as_str()
                    ))
                })?;

                let current = self
                    .retry
                    .execute(|| self.remote.fetch(&operation.target))
                    .await?;

                let Some(remote_task) = current else {
                    self.retry
                        .execute(|| self.remote.upsert(snapshot))
                        .await?;
                    return Ok(None);
                };

                let diverged = match operation.base_modified_at {
                    Some(base) => remote_task.modified_at != base,
                    // A create colliding with an existing remote record.
                    None => true,
                };
                if !diverged {
                    self.retry
                        .execute(|| self.remote.upsert(snapshot))
                        .await?;
                    return Ok(None);
                }

                debug!(task = %operation.target, "remote diverged, resolving");
                let merged = resolve(snapshot, &remote_task);
                let prior = self
                    .store
                    .get_task(&operation.target)
                    .await?
                    .unwrap_or_else(|| snapshot.clone());
                let staged = Provisional::new(prior, merged);

                match self
                    .retry
                    .execute(|| self.remote.upsert(staged.provisional()))
                    .await
                {
                    Ok(()) => {
                        let committed = staged.confirm();
                        self.store.apply_synced_task(&committed).await?;
                        Ok(Some(committed))
                    }
                    Err(e) => {
                        // Revert to the prior local state; the entry stays
                        // queued for the next pass.
                        drop(staged.discard());
                        Err(e)
                    }
                }
            }
        }
    }

    fn set_state(&self, state: DriverState) {
        debug!(?state, "driver state");
        self.state_tx.send_replace(state);
    }
}
