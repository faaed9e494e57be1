//! Peer Pool
//!
//! Ring membership plus one HTTP client per remote node.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::info;

use crate::config::normalize_host;
use crate::error::{CacheError, Result};
use crate::peer::{HashRing, HttpPeer, PeerFetcher, PeerPicker};

#[derive(Debug)]
struct Membership {
    ring: HashRing,
    clients: HashMap<String, Arc<HttpPeer>>,
}

// == Peer Pool ==
/// The node's view of the cluster. This node is always a ring member; keys it
/// owns are never forwarded.
#[derive(Debug)]
pub struct PeerPool {
    self_host: String,
    client: Client,
    members: RwLock<Membership>,
}

impl PeerPool {
    pub fn new(self_host: &str, replicas: usize) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| CacheError::Internal(format!("failed to build peer client: {}", e)))?;
        let self_host = normalize_host(self_host);
        let mut ring = HashRing::new(replicas);
        ring.add_peer(&self_host);

        Ok(Self {
            self_host,
            client,
            members: RwLock::new(Membership {
                ring,
                clients: HashMap::new(),
            }),
        })
    }

    pub fn self_host(&self) -> &str {
        &self.self_host
    }

    // == Add Peer ==
    /// Adds `host` to the ring, returning false if it was already a member.
    pub fn add_peer(&self, host: &str) -> bool {
        let host = normalize_host(host);
        let mut members = self.write();
        if members.ring.contains(&host) {
            return false;
        }
        members.ring.add_peer(&host);
        if host != self.self_host {
            members
                .clients
                .insert(host.clone(), Arc::new(HttpPeer::new(host.clone(), self.client.clone())));
        }
        info!(peer = %host, "peer added to ring");
        true
    }

    // == Remove Peer ==
    /// Removes `host` from the ring and returns the remaining members.
    ///
    /// This node cannot be removed from its own ring.
    pub fn remove_peer(&self, host: &str) -> Result<Vec<String>> {
        let host = normalize_host(host);
        if host == self.self_host {
            return Err(CacheError::InvalidRequest(
                "a node cannot remove itself from its ring".to_string(),
            ));
        }
        let mut members = self.write();
        if members.ring.remove_peer(&host) {
            members.clients.remove(&host);
            info!(peer = %host, "peer removed from ring");
        }
        Ok(members.ring.peers())
    }

    pub fn peers(&self) -> Vec<String> {
        self.read().ring.peers()
    }

    /// Asks the coordinator at `main_host` to add this node to its ring.
    pub async fn register_with(&self, main_host: &str) -> Result<()> {
        let url = format!("{}/peers", normalize_host(main_host));
        let response = self
            .client
            .post(&url)
            .json(&json!({ "host": self.self_host }))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                info!(main_host, "registered with coordinator");
                Ok(())
            }
            status => Err(CacheError::Transport(format!(
                "coordinator {} rejected registration: {}",
                main_host, status
            ))),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Membership> {
        self.members.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Membership> {
        self.members.write().unwrap_or_else(|p| p.into_inner())
    }
}

impl PeerPicker for PeerPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerFetcher>> {
        let members = self.read();
        let owner = members.ring.get_peer(key)?;
        if owner == self.self_host {
            return None;
        }
        members
            .clients
            .get(owner)
            .map(|peer| peer.clone() as Arc<dyn PeerFetcher>)
    }
}
