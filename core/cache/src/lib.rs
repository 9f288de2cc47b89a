//! TaskVault cache strategy selector.
//!
//! Decides, per requested resource, which caching policy governs a fetch
//! (cache-first, network-first, stale-while-revalidate) and executes it
//! over pluggable cache and network seams. Orthogonal to the sync engine.

pub mod fetcher;
pub mod memory;
pub mod strategy;

pub use fetcher::{CacheStore, CachedFetcher, Fetched, NetworkFetch, Source};
pub use memory::MemoryCache;
pub use strategy::{classify, Resource, ResourceClass, Strategy};
