//! Strategy-driven fetch over cache and network seams.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use taskvault_common::{Error, Result};

use crate::strategy::{classify, Resource, Strategy};

/// Cache backend seam.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// Network backend seam. Transport faults surface as `Error::Network`.
#[async_trait]
pub trait NetworkFetch: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>>;
}

/// Where a fetched value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Network,
}

/// A successfully fetched value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub value: Vec<u8>,
    pub source: Source,
}

/// Executes fetches under the policy selected for each resource.
#[derive(Clone)]
pub struct CachedFetcher {
    cache: Arc<dyn CacheStore>,
    network: Arc<dyn NetworkFetch>,
}

impl CachedFetcher {
    pub fn new(cache: Arc<dyn CacheStore>, network: Arc<dyn NetworkFetch>) -> Self {
        Self { cache, network }
    }

    /// The cache seam, for direct population (e.g. worker `CACHE_TASK`).
    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    /// Fetch a resource under its classified strategy.
    pub async fn fetch(&self, resource: &Resource) -> Result<Fetched> {
        match classify(resource.class) {
            Strategy::CacheFirst => self.cache_first(&resource.key).await,
            Strategy::NetworkFirst => self.network_first(&resource.key).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(&resource.key).await,
        }
    }

    /// Cached value wins immediately; the cache is refreshed from the
    /// network in the background regardless. On a miss the cache is
    /// populated before the value is returned.
    async fn cache_first(&self, key: &str) -> Result<Fetched> {
        if let Some(value) = self.cache.get(key).await? {
            self.refresh_in_background(key);
            return Ok(Fetched {
                value,
                source: Source::Cache,
            });
        }
        let value = self.network.fetch(key).await?;
        self.cache.put(key, value.clone()).await?;
        Ok(Fetched {
            value,
            source: Source::Network,
        })
    }

    /// Network wins; on success the cache is overwritten. On failure fall
    /// back to the cache, and only if neither side has the value report it
    /// unavailable.
    async fn network_first(&self, key: &str) -> Result<Fetched> {
        match self.network.fetch(key).await {
            Ok(value) => {
                self.cache.put(key, value.clone()).await?;
                Ok(Fetched {
                    value,
                    source: Source::Network,
                })
            }
            Err(network_err) => match self.cache.get(key).await? {
                Some(value) => {
                    debug!(key, "network failed, serving cached value: {network_err}");
                    Ok(Fetched {
                        value,
                        source: Source::Cache,
                    })
                }
                None => Err(Error::Unavailable(format!(
                    "{key}: network failed and no cached value ({network_err})"
                ))),
            },
        }
    }

    /// Cached value returns immediately, even stale, while a concurrent
    /// fetch updates the cache for the next request. On a miss the caller
    /// waits on the network; caching the result is best-effort.
    async fn stale_while_revalidate(&self, key: &str) -> Result<Fetched> {
        if let Some(value) = self.cache.get(key).await? {
            self.refresh_in_background(key);
            return Ok(Fetched {
                value,
                source: Source::Cache,
            });
        }
        let value = self.network.fetch(key).await?;
        if let Err(e) = self.cache.put(key, value.clone()).await {
            warn!(key, "failed to cache fetched value: {e}");
        }
        Ok(Fetched {
            value,
            source: Source::Network,
        })
    }

    fn refresh_in_background(&self, key: &str) {
        let cache = self.cache.clone();
        let network = self.network.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            match network.fetch(&key).await {
                Ok(value) => {
                    if let Err(e) = cache.put(&key, value).await {
                        warn!(key, "background cache refresh failed to store: {e}");
                    }
                }
                Err(e) => debug!(key, "background cache refresh failed: {e}"),
            }
        });
    }
}
