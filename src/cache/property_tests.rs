//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the store's budget and recency rules, and the
//! ring's routing stability under membership changes.

use proptest::prelude::*;
use std::collections::HashMap;

use bytes::Bytes;

use crate::cache::{CacheStore, Lookup, LruTracker, MAX_KEY_LENGTH};
use crate::peer::HashRing;

// == Test Configuration ==
const TEST_REPLICAS: usize = 50;
const SAMPLE_KEYS: usize = 2000;

// == Strategies ==
/// Generates valid cache keys (non-empty, within length limit)
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,16}".prop_map(|s| s)
}

fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..200)
}

/// Distinct peer addresses, `min..max` of them.
fn peers_strategy(min: usize, max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(1u8..=250, min..max).prop_map(|ids| {
        ids.into_iter()
            .map(|id| format!("http://10.0.0.{}:3000", id))
            .collect()
    })
}

fn ring_of(peers: &[String]) -> HashRing {
    let mut ring = HashRing::new(TEST_REPLICAS);
    for peer in peers {
        ring.add_peer(peer);
    }
    ring
}

fn owners(ring: &HashRing, salt: &str) -> Vec<String> {
    (0..SAMPLE_KEYS)
        .map(|i| {
            ring.get_peer(&format!("{}{}", salt, i))
                .map(str::to_string)
                .unwrap_or_default()
        })
        .collect()
}

#[derive(Debug, Clone)]
enum CacheOp {
    Add { key: String, value: Vec<u8> },
    Get { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (valid_key_strategy(), value_strategy())
            .prop_map(|(key, value)| CacheOp::Add { key, value }),
        valid_key_strategy().prop_map(|key| CacheOp::Get { key }),
        valid_key_strategy().prop_map(|key| CacheOp::Delete { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // For a fixed membership, routing is a pure function of the key.
    #[test]
    fn prop_ring_routing_is_deterministic(
        peers in peers_strategy(1, 8),
        keys in prop::collection::vec(valid_key_strategy(), 1..100),
    ) {
        let ring = ring_of(&peers);
        let rebuilt = ring_of(&peers);

        for key in &keys {
            let owner = ring.get_peer(key);
            prop_assert!(owner.is_some());
            prop_assert_eq!(owner, ring.get_peer(key));
            prop_assert_eq!(owner, rebuilt.get_peer(key));
            prop_assert!(peers.iter().any(|p| Some(p.as_str()) == owner));
        }
    }

    // Adding a peer only moves keys onto the new peer, and only about 1/n of them.
    #[test]
    fn prop_adding_peer_remaps_bounded_fraction(
        peers in peers_strategy(3, 8),
        salt in "[a-z]{0,6}",
    ) {
        let (existing, newcomer) = peers.split_at(peers.len() - 1);
        let newcomer = &newcomer[0];
        let mut ring = ring_of(existing);
        let before = owners(&ring, &salt);

        ring.add_peer(newcomer);
        let after = owners(&ring, &salt);

        let mut moved = 0;
        for (old, new) in before.iter().zip(&after) {
            if old != new {
                moved += 1;
                prop_assert_eq!(new, newcomer);
            }
        }
        let bound = 2.5 / peers.len() as f64;
        prop_assert!(
            (moved as f64 / SAMPLE_KEYS as f64) <= bound,
            "moved {} of {} keys with {} peers",
            moved,
            SAMPLE_KEYS,
            peers.len()
        );
    }

    // Removing a peer only moves the keys that peer owned.
    #[test]
    fn prop_removing_peer_keeps_other_assignments(
        peers in peers_strategy(2, 8),
        victim in any::<prop::sample::Index>(),
        salt in "[a-z]{0,6}",
    ) {
        let victim = &peers[victim.index(peers.len())];
        let mut ring = ring_of(&peers);
        let before = owners(&ring, &salt);

        prop_assert!(ring.remove_peer(victim));
        let after = owners(&ring, &salt);

        for (old, new) in before.iter().zip(&after) {
            if old == victim {
                prop_assert_ne!(new, victim);
            } else {
                prop_assert_eq!(old, new);
            }
        }
    }

    // The byte budget holds after every operation, whatever the mix.
    #[test]
    fn prop_byte_budget_never_exceeded(
        max_bytes in 64usize..2048,
        ops in prop::collection::vec(cache_op_strategy(), 1..100),
    ) {
        let mut store = CacheStore::new(max_bytes);

        for op in ops {
            match op {
                CacheOp::Add { key, value } => {
                    let _ = store.add(&key, Some(Bytes::from(value)), None);
                }
                CacheOp::Get { key } => {
                    let _ = store.get(&key);
                }
                CacheOp::Delete { key } => {
                    store.delete(&key);
                }
            }
            prop_assert!(store.current_bytes() <= store.max_bytes());
            prop_assert_eq!(store.stats().current_bytes, store.current_bytes());
        }
    }

    // Overflowing a full store evicts exactly the least recently used entry.
    #[test]
    fn prop_eviction_follows_recency(
        capacity in 2usize..20,
        touches in prop::collection::vec(any::<prop::sample::Index>(), 0..40),
    ) {
        // every entry charges 16 bytes: 4-byte key + 12-byte value
        let value = Bytes::from_static(b"abcdefghijkl");
        let mut store = CacheStore::new(16 * capacity);
        let mut recency: Vec<String> = Vec::new();

        for i in 0..capacity {
            let key = format!("k{:03}", i);
            store.add(&key, Some(value.clone()), None).unwrap();
            recency.push(key);
        }
        for touch in touches {
            let key = recency.remove(touch.index(recency.len()));
            prop_assert_eq!(store.get(&key), Lookup::Hit(value.clone()));
            recency.push(key);
        }

        store.add("zzzz", Some(value.clone()), None).unwrap();

        let evicted = &recency[0];
        prop_assert_eq!(store.len(), capacity);
        prop_assert_eq!(store.stats().evictions, 1);
        prop_assert_eq!(store.peek(evicted), Lookup::Miss);
        for key in &recency[1..] {
            prop_assert_eq!(store.peek(key), Lookup::Hit(value.clone()));
        }
    }

    // The tracker pops keys oldest-first after any sequence of touches.
    #[test]
    fn prop_lru_tracker_matches_model(
        touches in prop::collection::vec(0u8..16, 1..80),
    ) {
        let mut tracker = LruTracker::new();
        let mut model: Vec<String> = Vec::new();

        for id in touches {
            let key = format!("key{}", id);
            tracker.touch(&key);
            model.retain(|k| k != &key);
            model.push(key);
        }

        prop_assert_eq!(tracker.len(), model.len());
        for expected in model {
            prop_assert_eq!(tracker.evict_oldest(), Some(expected));
        }
        prop_assert!(tracker.is_empty());
    }

    // Hits and misses count exactly the lookups that did and did not find a value.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let mut store = CacheStore::new(1 << 20);
        let mut model: HashMap<String, Vec<u8>> = HashMap::new();
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Add { key, value } => {
                    store.add(&key, Some(Bytes::from(value.clone())), None).unwrap();
                    model.insert(key, value);
                }
                CacheOp::Get { key } => {
                    match model.get(&key) {
                        Some(value) => {
                            expected_hits += 1;
                            prop_assert_eq!(store.get(&key), Lookup::Hit(Bytes::from(value.clone())));
                        }
                        None => {
                            expected_misses += 1;
                            prop_assert_eq!(store.get(&key), Lookup::Miss);
                        }
                    }
                }
                CacheOp::Delete { key } => {
                    prop_assert_eq!(store.delete(&key), model.remove(&key).is_some());
                }
            }
        }

        let stats = store.stats();
        prop_assert_eq!(stats.hits, expected_hits);
        prop_assert_eq!(stats.misses, expected_misses);
        prop_assert_eq!(stats.evictions, 0);
        prop_assert_eq!(stats.total_entries, model.len());
    }

    // Keys longer than the limit are rejected and leave the store untouched.
    #[test]
    fn prop_oversized_keys_rejected(extra in 1usize..64) {
        let mut store = CacheStore::new(1 << 20);
        let key = "k".repeat(MAX_KEY_LENGTH + extra);

        prop_assert!(store.add(&key, Some(Bytes::from_static(b"v")), None).is_err());
        prop_assert!(store.is_empty());
    }
}

