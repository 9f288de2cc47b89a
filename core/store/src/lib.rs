//! TaskVault persistent store.
//!
//! Transactional CRUD over the structured record types (tasks, categories),
//! the durable sync-queue rows the outbox builds on, and a small settings
//! store. Every other component reads and writes through this crate.

pub mod categories;
pub mod model;
pub mod provisional;
pub mod schema;
pub mod store;
pub mod validate;

pub use model::{
    Category, CategoryDraft, CategoryPatch, OperationKind, QueueMode, SyncOperation, Task,
    TaskDraft, TaskFilter, TaskPatch, TaskPriority, TaskStatus,
};
pub use provisional::Provisional;
pub use store::Store;
pub use validate::MAX_TITLE_LEN;
