//! Per-resource cache strategy selection.

use serde::{Deserialize, Serialize};

/// Static classification of a requested resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceClass {
    /// Application shell: the frame that must render offline.
    AppShell,
    /// Immutable static assets (scripts, styles, images).
    StaticAsset,
    /// Live API data where freshness beats latency.
    ApiData,
    /// Task snapshots and listings: show something now, refresh behind.
    TaskSnapshot,
}

/// The three caching policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
}

/// A requested resource: an opaque cache key plus its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub key: String,
    pub class: ResourceClass,
}

impl Resource {
    pub fn new(key: impl Into<String>, class: ResourceClass) -> Self {
        Self {
            key: key.into(),
            class,
        }
    }
}

/// Select the policy governing a fetch.
///
/// The mapping is a fixed table keyed on the resource class; there are no
/// dynamic heuristics.
pub fn classify(class: ResourceClass) -> Strategy {
    match class {
        ResourceClass::AppShell | ResourceClass::StaticAsset => Strategy::CacheFirst,
        ResourceClass::ApiData => Strategy::NetworkFirst,
        ResourceClass::TaskSnapshot => Strategy::StaleWhileRevalidate,
    }
}
