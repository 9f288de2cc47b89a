//! In-memory cache store for tests and development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use taskvault_common::{Error, Result};

use crate::fetcher::CacheStore;

/// Cache store backed by a process-local map. Contents are lost on drop.
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .entries
            .read()
            .map_err(|_| Error::Storage("cache lock poisoned".to_string()))?
            .get(key)
            .cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.entries
            .write()
            .map_err(|_| Error::Storage("cache lock poisoned".to_string()))?
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries
            .write()
            .map_err(|_| Error::Storage("cache lock poisoned".to_string()))?
            .remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries
            .write()
            .map_err(|_| Error::Storage("cache lock poisoned".to_string()))?
            .clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_remove_round_trip() {
        let cache = MemoryCache::new();
        assert!(cache.get("k").await.unwrap().is_none());

        cache.put("k", b"v".to_vec()).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some(&b"v"[..]));

        cache.remove("k").await.unwrap();
        assert!(cache.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_empties_the_cache() {
        let cache = MemoryCache::new();
        cache.put("a", b"1".to_vec()).await.unwrap();
        cache.put("b", b"2".to_vec()).await.unwrap();
        assert_eq!(cache.len(), 2);

        cache.clear().await.unwrap();
        assert!(cache.is_empty());
    }
}
