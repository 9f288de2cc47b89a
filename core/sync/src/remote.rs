//! Remote replica seam.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use taskvault_common::{Error, Result, TaskId};
use taskvault_store::Task;

/// The remote/other-replica state the outbox is drained against.
///
/// Implementations handle their own transport and authentication; the
/// driver only sees `Result`s, with transport faults reported as
/// `Error::Network` so the retry policy can recognize them.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Read the remote version of a record, if any.
    async fn fetch(&self, id: &TaskId) -> Result<Option<Task>>;

    /// Create or overwrite the remote version of a record.
    async fn upsert(&self, task: &Task) -> Result<()>;

    /// Remove a record. Removing an absent record is a no-op, so a retried
    /// delete cannot fail on its second application.
    async fn remove(&self, id: &TaskId) -> Result<()>;
}

/// In-memory remote replica.
///
/// Used by tests and development contexts. Supports an online/offline
/// switch and scripted fault injection so drain behavior under failure is
/// testable.
pub struct MemoryRemote {
    records: Arc<RwLock<HashMap<String, Task>>>,
    online: AtomicBool,
    failures: AtomicU32,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            online: AtomicBool::new(true),
            failures: AtomicU32::new(0),
        }
    }

    /// Flip the simulated transport.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Fail the next `n` operations with a network error.
    pub fn inject_failures(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Seed a record directly, bypassing the transport simulation.
    pub fn seed(&self, task: Task) {
        self.records
            .write()
            .expect("remote lock poisoned")
            .insert(task.id.as_str().to_string(), task);
    }

    /// Read a record directly, bypassing the transport simulation.
    pub fn record(&self, id: &TaskId) -> Option<Task> {
        self.records
            .read()
            .expect("remote lock poisoned")
            .get(id.as_str())
            .cloned()
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.records.read().expect("remote lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_transport(&self) -> Result<()> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::Network("remote unreachable".to_string()));
        }
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Network("injected fault".to_string()));
        }
        Ok(())
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch(&self, id: &TaskId) -> Result<Option<Task>> {
        self.check_transport()?;
        Ok(self.record(id))
    }

    async fn upsert(&self, task: &Task) -> Result<()> {
        self.check_transport()?;
        self.records
            .write()
            .map_err(|_| Error::Storage("remote lock poisoned".to_string()))?
            .insert(task.id.as_str().to_string(), task.clone());
        Ok(())
    }

    async fn remove(&self, id: &TaskId) -> Result<()> {
        self.check_transport()?;
        self.records
            .write()
            .map_err(|_| Error::Storage("remote lock poisoned".to_string()))?
            .remove(id.as_str());
        Ok(())
    }
}
