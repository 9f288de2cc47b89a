//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use taskvault_sync::SyncConfig;

/// Configuration for an engine context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Database location. `None` opens an in-memory store, which is what
    /// tests and throwaway contexts want.
    pub db_path: Option<PathBuf>,
    /// Queue every mutation for remote confirmation, even while online.
    /// With `false`, only mutations made offline are queued.
    pub always_queue: bool,
    /// Whether the context assumes connectivity at startup.
    pub start_online: bool,
    /// Sync driver configuration.
    pub sync: SyncConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            always_queue: false,
            start_online: true,
            sync: SyncConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = Some(path.into());
        self
    }

    pub fn with_always_queue(mut self, always_queue: bool) -> Self {
        self.always_queue = always_queue;
        self
    }

    pub fn starting_offline(mut self) -> Self {
        self.start_online = false;
        self
    }
}
