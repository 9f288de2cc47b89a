//! TaskVault sync engine.
//!
//! Everything between a committed local mutation and its confirmation on
//! the remote replica:
//! - Durable outbox of not-yet-confirmed mutations
//! - Pure conflict resolution for divergent record histories
//! - Connectivity monitoring and a retry policy for transport faults
//! - The background sync driver that drains the outbox

pub mod connectivity;
pub mod driver;
pub mod outbox;
pub mod remote;
pub mod resolver;
pub mod retry;

pub use connectivity::ConnectivityMonitor;
pub use driver::{DrainOutcome, DriverHandle, DriverState, SyncConfig, SyncDriver, SyncTrigger};
pub use outbox::Outbox;
pub use remote::{MemoryRemote, RemoteStore};
pub use resolver::resolve;
pub use retry::{RetryConfig, RetryExecutor};
