//! TaskVault engine facade.
//!
//! Wires the store, outbox, sync driver, broadcast bus and cache into one
//! explicitly-constructed context per execution environment, with a defined
//! teardown. Also hosts the background-worker control protocol and the
//! notification payload/action layer.

pub mod config;
pub mod control;
pub mod engine;
pub mod notify;

pub use config::EngineConfig;
pub use control::{spawn_worker, task_cache_key, ControlMessage, WorkerHandle};
pub use engine::Engine;
pub use notify::{
    completed_notification, deep_link, handle_action, overdue_notification, ActionOutcome,
    Notification, NotificationAction, NotificationData, ACTION_COMPLETE, ACTION_VIEW,
};

/// Install a process-wide tracing subscriber honoring `RUST_LOG`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
