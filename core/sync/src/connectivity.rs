//! Connectivity state shared between mutation paths and the sync driver.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Observable online/offline state.
///
/// The host environment reports transitions via [`set_online`](Self::set_online);
/// the sync driver subscribes and reacts to the offline-to-online edge.
/// Mutation paths sample [`is_online`](Self::is_online) to decide whether a
/// mutation needs queueing.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    /// Create a monitor with the given initial state.
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    /// Monitor that starts online.
    pub fn online() -> Self {
        Self::new(true)
    }

    /// Monitor that starts offline.
    pub fn offline() -> Self {
        Self::new(false)
    }

    /// Report a connectivity transition. Redundant reports are harmless.
    pub fn set_online(&self, online: bool) {
        let previous = *self.tx.borrow();
        if previous != online {
            info!(online, "connectivity changed");
        }
        self.tx.send_replace(online);
    }

    /// Current connectivity state.
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Subscribe to connectivity changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transitions_are_observable() {
        let monitor = ConnectivityMonitor::offline();
        assert!(!monitor.is_online());

        let mut rx = monitor.subscribe();
        monitor.set_online(true);

        rx.changed().await.unwrap();
        assert!(*rx.borrow());
        assert!(monitor.is_online());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let monitor = ConnectivityMonitor::online();
        let clone = monitor.clone();
        clone.set_online(false);
        assert!(!monitor.is_online());
    }
}
