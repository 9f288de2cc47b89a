//! The engine context: explicit construction and teardown of every
//! component, replacing any notion of global shared state.

use std::sync::Arc;
use tracing::{info, warn};

use taskvault_broadcast::{BroadcastBus, ContextHandle, Event};
use taskvault_common::{CategoryId, Result, TaskId};
use taskvault_store::{
    Category, CategoryDraft, CategoryPatch, QueueMode, Store, Task, TaskDraft, TaskFilter,
    TaskPatch,
};
use taskvault_sync::{
    ConnectivityMonitor, DriverHandle, DriverState, Outbox, RemoteStore, SyncDriver, SyncTrigger,
};

use crate::config::EngineConfig;

/// One execution context's engine instance.
///
/// Owns the storage connection, the outbox, the broadcast bus, the
/// connectivity monitor and the spawned sync driver. Constructed explicitly
/// with [`open`](Self::open) and released with [`teardown`](Self::teardown);
/// nothing engine-level lives in a global.
pub struct Engine {
    store: Store,
    outbox: Outbox,
    connectivity: ConnectivityMonitor,
    bus: BroadcastBus,
    ctx: ContextHandle,
    driver: Option<DriverHandle>,
    always_queue: bool,
}

impl Engine {
    /// Construct and wire an engine context against the given remote.
    pub async fn open(config: EngineConfig, remote: Arc<dyn RemoteStore>) -> Result<Self> {
        let store = match &config.db_path {
            Some(path) => Store::open(path).await?,
            None => Store::in_memory().await?,
        };
        let connectivity = ConnectivityMonitor::new(config.start_online);
        let bus = BroadcastBus::new();
        let ctx = bus.register();
        let driver = SyncDriver::spawn(
            store.clone(),
            remote,
            connectivity.clone(),
            bus.register(),
            config.sync.clone(),
        );

        info!(always_queue = config.always_queue, "engine context opened");
        Ok(Self {
            outbox: Outbox::new(store.clone()),
            store,
            connectivity,
            bus,
            ctx,
            driver: Some(driver),
            always_queue: config.always_queue,
        })
    }

    /// The underlying store, for direct reads and queries.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The outbox, for observing pending work.
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// The connectivity monitor. The host environment reports transitions
    /// here; the driver reacts to the offline-to-online edge.
    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    /// Register another execution context on the broadcast bus.
    pub fn register_context(&self) -> ContextHandle {
        self.bus.register()
    }

    /// Cloneable drain trigger (for the background worker).
    pub fn sync_trigger(&self) -> Option<SyncTrigger> {
        self.driver.as_ref().map(|d| d.trigger())
    }

    /// Explicitly request a drain.
    pub fn request_sync(&self) -> Result<()> {
        match &self.driver {
            Some(driver) => driver.request_sync(),
            None => Ok(()),
        }
    }

    /// Current sync driver state.
    pub fn driver_state(&self) -> Option<DriverState> {
        self.driver.as_ref().map(|d| d.state())
    }

    fn queue_mode(&self) -> QueueMode {
        if self.always_queue || !self.connectivity.is_online() {
            QueueMode::Queue
        } else {
            QueueMode::Skip
        }
    }

    fn nudge_driver(&self, mode: QueueMode) {
        if mode == QueueMode::Queue {
            if let Some(driver) = &self.driver {
                // Parks in Pending while offline; drains otherwise.
                let _ = driver.request_sync();
            }
        }
    }

    fn announce(&self, event: Event) {
        if let Err(e) = self.ctx.publish(event) {
            warn!("failed to announce mutation: {e}");
        }
    }

    /// Create a task, queueing it for confirmation when needed, and
    /// announce it to sibling contexts.
    pub async fn create_task(&self, draft: TaskDraft) -> Result<Task> {
        let mode = self.queue_mode();
        let task = self.store.create_task(draft, mode).await?;
        self.announce(Event::TaskCreated(task.clone()));
        self.nudge_driver(mode);
        Ok(task)
    }

    /// Apply a partial update to a task.
    pub async fn update_task(&self, id: &TaskId, patch: TaskPatch) -> Result<Task> {
        let mode = self.queue_mode();
        let task = self.store.update_task(id, patch, mode).await?;
        self.announce(Event::TaskUpdated(task.clone()));
        self.nudge_driver(mode);
        Ok(task)
    }

    /// Mark a task completed. The in-app toggle and the notification
    /// `complete` action both land here.
    pub async fn complete_task(&self, id: &TaskId) -> Result<Task> {
        self.update_task(id, TaskPatch::status("completed")).await
    }

    /// Delete a task.
    pub async fn delete_task(&self, id: &TaskId) -> Result<()> {
        let mode = self.queue_mode();
        self.store.delete_task(id, mode).await?;
        self.announce(Event::TaskDeleted { id: id.clone() });
        self.nudge_driver(mode);
        Ok(())
    }

    /// Query tasks through the store.
    pub async fn query_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.store.query_tasks(filter).await
    }

    /// Create a category.
    pub async fn create_category(&self, draft: CategoryDraft) -> Result<Category> {
        let category = self.store.create_category(draft).await?;
        self.announce(Event::CategoryChanged {
            id: category.id.clone(),
        });
        Ok(category)
    }

    /// Update a category.
    pub async fn update_category(
        &self,
        id: &CategoryId,
        patch: CategoryPatch,
    ) -> Result<Category> {
        let category = self.store.update_category(id, patch).await?;
        self.announce(Event::CategoryChanged {
            id: category.id.clone(),
        });
        Ok(category)
    }

    /// Delete a category, clearing task references.
    pub async fn delete_category(&self, id: &CategoryId) -> Result<()> {
        self.store.delete_category(id).await?;
        self.announce(Event::CategoryChanged { id: id.clone() });
        Ok(())
    }

    /// Release the context: stop the driver task and drop the broadcast
    /// registration and storage handle.
    pub async fn teardown(mut self) -> Result<()> {
        if let Some(driver) = self.driver.take() {
            driver.shutdown().await?;
        }
        info!("engine context released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use taskvault_store::{OperationKind, TaskStatus};
    use taskvault_sync::MemoryRemote;
    use tokio::time::timeout;

    async fn next_sync_complete(sibling: &mut ContextHandle) -> usize {
        timeout(Duration::from_secs(2), async {
            loop {
                if let Event::SyncComplete { count } = sibling.recv().await.unwrap().event {
                    return count;
                }
            }
        })
        .await
        .expect("no SYNC_COMPLETE observed")
    }

    #[tokio::test]
    async fn offline_create_queues_then_drains_on_reconnect() {
        let remote = Arc::new(MemoryRemote::new());
        let engine = Engine::open(
            EngineConfig::default().starting_offline(),
            remote.clone(),
        )
        .await
        .unwrap();
        let mut sibling = engine.register_context();

        // Offline create succeeds immediately and is readable.
        let task = engine.create_task(TaskDraft::new("Buy milk")).await.unwrap();
        let read = engine.store().get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(read.title, "Buy milk");

        // Exactly one outbox entry, kind create.
        let queued = engine.store().list_queue().await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].kind, OperationKind::Create);

        // Reconnect; the drain empties the outbox and reports count 1.
        engine.connectivity().set_online(true);
        assert_eq!(next_sync_complete(&mut sibling).await, 1);
        assert!(engine.outbox().is_empty().await.unwrap());
        assert_eq!(remote.record(&task.id).unwrap().title, "Buy milk");

        engine.teardown().await.unwrap();
    }

    #[tokio::test]
    async fn online_mutations_skip_the_outbox_by_default() {
        let remote = Arc::new(MemoryRemote::new());
        let engine = Engine::open(EngineConfig::default(), remote)
            .await
            .unwrap();

        engine.create_task(TaskDraft::new("quick")).await.unwrap();
        assert!(engine.outbox().is_empty().await.unwrap());

        engine.teardown().await.unwrap();
    }

    #[tokio::test]
    async fn always_queue_confirms_through_the_driver() {
        let remote = Arc::new(MemoryRemote::new());
        let engine = Engine::open(
            EngineConfig::default().with_always_queue(true),
            remote.clone(),
        )
        .await
        .unwrap();
        let mut sibling = engine.register_context();

        let task = engine.create_task(TaskDraft::new("tracked")).await.unwrap();
        assert_eq!(next_sync_complete(&mut sibling).await, 1);
        assert!(remote.record(&task.id).is_some());
        assert!(engine.outbox().is_empty().await.unwrap());

        engine.teardown().await.unwrap();
    }

    #[tokio::test]
    async fn mutations_are_announced_to_siblings() {
        let remote = Arc::new(MemoryRemote::new());
        let engine = Engine::open(EngineConfig::default(), remote).await.unwrap();
        let mut sibling = engine.register_context();

        let task = engine.create_task(TaskDraft::new("observed")).await.unwrap();
        let message = timeout(Duration::from_secs(2), sibling.recv())
            .await
            .unwrap()
            .unwrap();
        match message.event {
            Event::TaskCreated(created) => assert_eq!(created.id, task.id),
            other => panic!("expected TASK_CREATED, got {other:?}"),
        }

        engine.delete_task(&task.id).await.unwrap();
        let message = timeout(Duration::from_secs(2), sibling.recv())
            .await
            .unwrap()
            .unwrap();
        match message.event {
            Event::TaskDeleted { id } => assert_eq!(id, task.id),
            other => panic!("expected TASK_DELETED, got {other:?}"),
        }

        engine.teardown().await.unwrap();
    }

    #[tokio::test]
    async fn complete_task_routes_through_the_update_path() {
        let remote = Arc::new(MemoryRemote::new());
        let engine = Engine::open(EngineConfig::default(), remote).await.unwrap();

        let task = engine.create_task(TaskDraft::new("toggle me")).await.unwrap();
        let completed = engine.complete_task(&task.id).await.unwrap();
        assert_eq!(completed.status, TaskStatus::Completed);
        assert!(completed.completed_at.is_some());
        assert!(completed.modified_at >= task.modified_at);

        engine.teardown().await.unwrap();
    }

    #[tokio::test]
    async fn queued_work_survives_a_context_restart() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tasks.db");
        let remote = Arc::new(MemoryRemote::new());

        let first = Engine::open(
            EngineConfig::default()
                .with_db_path(&path)
                .starting_offline(),
            remote.clone(),
        )
        .await
        .unwrap();
        let task = first.create_task(TaskDraft::new("durable")).await.unwrap();
        assert_eq!(first.store().queue_len().await.unwrap(), 1);
        first.teardown().await.unwrap();

        // A new context over the same database still sees the record and
        // the pending outbox entry.
        let second = Engine::open(
            EngineConfig::default()
                .with_db_path(&path)
                .starting_offline(),
            remote,
        )
        .await
        .unwrap();
        let read = second.store().get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(read.title, "durable");
        assert_eq!(second.store().queue_len().await.unwrap(), 1);
        second.teardown().await.unwrap();
    }

    #[tokio::test]
    async fn teardown_stops_the_driver() {
        let remote = Arc::new(MemoryRemote::new());
        let engine = Engine::open(EngineConfig::default(), remote).await.unwrap();
        let trigger = engine.sync_trigger().unwrap();

        engine.teardown().await.unwrap();
        assert!(trigger.request_sync().is_err());
    }
}
