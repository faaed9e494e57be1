//! Consistent Hash Ring
//!
//! Maps keys to peers through virtual points on a 32-bit ring.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

/// Hash function used to place points and keys on the ring.
pub type HashFn = fn(&[u8]) -> u32;

/// First four bytes of SHA-256, big endian.
pub fn default_hash(data: &[u8]) -> u32 {
    let digest = Sha256::digest(data);
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

// == Hash Ring ==
/// Consistent hash ring with `replicas` virtual points per physical peer.
///
/// Point `i` of peer `p` is placed at `hash("{i}{p}")`. A key belongs to the
/// first point at or after the key's hash, wrapping to the smallest point.
#[derive(Debug, Clone)]
pub struct HashRing {
    replicas: usize,
    hash: HashFn,
    /// Sorted point hashes
    points: Vec<u32>,
    /// Point hash -> owning peer
    owners: HashMap<u32, String>,
}

impl HashRing {
    pub fn new(replicas: usize) -> Self {
        Self::with_hasher(replicas, default_hash)
    }

    pub fn with_hasher(replicas: usize, hash: HashFn) -> Self {
        Self {
            replicas: replicas.max(1),
            hash,
            points: Vec::new(),
            owners: HashMap::new(),
        }
    }

    // == Add Peer ==
    /// Places `peer` on the ring. Adding an existing peer is a no-op.
    pub fn add_peer(&mut self, peer: &str) {
        if self.contains(peer) {
            return;
        }
        for i in 0..self.replicas {
            let point = (self.hash)(format!("{}{}", i, peer).as_bytes());
            // On a point collision the earlier owner keeps the point.
            self.owners.entry(point).or_insert_with(|| peer.to_string());
        }
        self.rebuild_points();
    }

    // == Remove Peer ==
    /// Takes `peer` off the ring, returning whether it was a member.
    pub fn remove_peer(&mut self, peer: &str) -> bool {
        let before = self.owners.len();
        self.owners.retain(|_, owner| owner != peer);
        if self.owners.len() == before {
            return false;
        }
        self.rebuild_points();
        true
    }

    // == Get Peer ==
    /// Returns the peer owning `key`, or None on an empty ring.
    pub fn get_peer(&self, key: &str) -> Option<&str> {
        if self.points.is_empty() {
            return None;
        }
        let hash = (self.hash)(key.as_bytes());
        let idx = self.points.partition_point(|&p| p < hash);
        let point = self.points[idx % self.points.len()];
        self.owners.get(&point).map(String::as_str)
    }

    /// Distinct members, sorted.
    pub fn peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.owners.values().cloned().collect();
        peers.sort();
        peers.dedup();
        peers
    }

    pub fn contains(&self, peer: &str) -> bool {
        self.owners.values().any(|owner| owner == peer)
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn rebuild_points(&mut self) {
        self.points = self.owners.keys().copied().collect();
        self.points.sort_unstable();
    }
}
