//! Peer Module
//!
//! Consistent-hash routing of keys to nodes and the HTTP transport between them.

mod client;
mod pool;
mod ring;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

pub use client::HttpPeer;
pub use pool::PeerPool;
pub use ring::{default_hash, HashFn, HashRing};

/// First path segment of the peer-to-peer cache endpoint.
pub const CACHE_BASE_PATH: &str = "_cache";

// == Peer Fetcher ==
/// A remote node that can answer `(group, key)` lookups.
#[async_trait]
pub trait PeerFetcher: Send + Sync {
    /// `Ok(None)` is the remote's explicit "not found"; transport failures and
    /// missed deadlines are `Err(CacheError::Transport)`.
    async fn fetch(&self, group: &str, key: &str, deadline: Duration) -> Result<Option<Bytes>>;

    fn address(&self) -> &str;
}

// == Peer Picker ==
/// Chooses the remote owner of a key.
pub trait PeerPicker: Send + Sync {
    /// None when the ring is empty or the key is owned by this node.
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerFetcher>>;
}
