//! Cache Manager Module
//!
//! Process-wide registry of named cache groups.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::info;

use crate::cache::{CacheGroup, CacheStats, GetOptions, GroupConfig, Loader};
use crate::error::{CacheError, Result};
use crate::peer::PeerPicker;

// == Cache Manager ==
/// Owns every cache group for the lifetime of the process.
///
/// Constructed once at startup and shared by reference; groups created through
/// it are wired to the manager's peer picker.
#[derive(Default)]
pub struct CacheManager {
    groups: RwLock<HashMap<String, Arc<CacheGroup>>>,
    peers: Option<Arc<dyn PeerPicker>>,
}

impl CacheManager {
    /// Creates a manager whose groups serve only from the local process.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager whose groups route misses through `peers`.
    pub fn with_peers(peers: Arc<dyn PeerPicker>) -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
            peers: Some(peers),
        }
    }

    // == Get Or Create ==
    /// Returns the group called `name`, creating it from `config` and `loader`
    /// if it does not exist yet. Creation happens under the registry's write
    /// lock, so racing callers all receive the same group.
    pub async fn get_or_create(
        &self,
        name: &str,
        config: GroupConfig,
        loader: Option<Arc<dyn Loader>>,
    ) -> Arc<CacheGroup> {
        if let Some(group) = self.groups.read().await.get(name) {
            return group.clone();
        }

        let mut groups = self.groups.write().await;
        groups
            .entry(name.to_string())
            .or_insert_with(|| {
                let mut group = CacheGroup::new(name, config);
                if let Some(loader) = loader {
                    group = group.with_loader(loader);
                }
                if let Some(peers) = &self.peers {
                    group = group.with_peers(peers.clone());
                }
                info!(group = name, max_bytes = config.max_bytes, "cache group created");
                Arc::new(group)
            })
            .clone()
    }

    /// Looks up an existing group.
    pub async fn group(&self, name: &str) -> Option<Arc<CacheGroup>> {
        self.groups.read().await.get(name).cloned()
    }

    pub async fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    // == Group API ==
    /// `Get` against a named group.
    pub async fn get(&self, group: &str, key: &str, options: GetOptions) -> Result<Option<Bytes>> {
        self.require(group).await?.get(key, options).await
    }

    /// `Add` against a named group.
    pub async fn add(&self, group: &str, key: &str, value: Bytes, ttl: Option<u64>) -> Result<()> {
        self.require(group).await?.add(key, value, ttl).await
    }

    /// `Del` against a named group.
    pub async fn del(&self, group: &str, key: &str) -> Result<bool> {
        Ok(self.require(group).await?.del(key).await)
    }

    /// Statistics for every registered group, keyed by name.
    pub async fn stats(&self) -> BTreeMap<String, CacheStats> {
        let groups: Vec<Arc<CacheGroup>> = self.groups.read().await.values().cloned().collect();
        let mut out = BTreeMap::new();
        for group in groups {
            out.insert(group.name().to_string(), group.stats().await);
        }
        out
    }

    /// Sweeps expired entries from every group, returning the total removed.
    pub async fn cleanup_expired(&self) -> usize {
        let groups: Vec<Arc<CacheGroup>> = self.groups.read().await.values().cloned().collect();
        let mut removed = 0;
        for group in groups {
            removed += group.cleanup_expired().await;
        }
        removed
    }

    async fn require(&self, name: &str) -> Result<Arc<CacheGroup>> {
        self.group(name)
            .await
            .ok_or_else(|| CacheError::NotFound(format!("cache group '{}'", name)))
    }
}
