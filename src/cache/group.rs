//! Cache Group Module
//!
//! A named read-through cache: local store first, then the peer that owns the
//! key on the hash ring, then the group's loader.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::{CacheStats, CacheStore, Loader, Lookup, SingleFlight};
use crate::error::{CacheError, Result};
use crate::peer::{PeerFetcher, PeerPicker};

// == Lookup Strategy ==
/// Which resolution stages a `get` may use. The local store is always consulted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStrategy {
    /// Local store only
    LocalOnly,
    /// Local store, then the owning peer
    LocalThenPeer,
    /// Local store, then the loader
    LocalThenGetter,
    /// Local store, then the owning peer, then the loader
    Full,
}

impl LookupStrategy {
    pub fn uses_peer(self) -> bool {
        matches!(self, LookupStrategy::LocalThenPeer | LookupStrategy::Full)
    }

    pub fn uses_loader(self) -> bool {
        matches!(self, LookupStrategy::LocalThenGetter | LookupStrategy::Full)
    }
}

/// Per-call lookup options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetOptions {
    pub strategy: LookupStrategy,
    /// TTL in seconds for a value filled by the loader; group default when None
    pub ttl: Option<u64>,
}

impl GetOptions {
    pub fn new(strategy: LookupStrategy) -> Self {
        Self {
            strategy,
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl = Some(ttl_secs);
        self
    }
}

impl Default for GetOptions {
    fn default() -> Self {
        Self::new(LookupStrategy::Full)
    }
}

// == Group Config ==
/// Sizing and timing for one cache group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupConfig {
    /// Byte budget for the group's store
    pub max_bytes: usize,
    /// TTL in seconds for values filled from a peer or the loader
    pub default_ttl: u64,
    /// Deadline for a single peer fetch
    pub peer_timeout: Duration,
}

impl GroupConfig {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            default_ttl: 300,
            peer_timeout: Duration::from_secs(3),
        }
    }

    pub fn with_default_ttl(mut self, ttl_secs: u64) -> Self {
        self.default_ttl = ttl_secs;
        self
    }

    pub fn with_peer_timeout(mut self, timeout: Duration) -> Self {
        self.peer_timeout = timeout;
        self
    }
}

enum FillSource {
    Peer,
    Loader,
}

// == Cache Group ==
/// One named cache with its own budget, loader and peer routing.
///
/// All mutation goes through the group's store lock; concurrent misses for the
/// same key are collapsed into a single peer fetch or load.
pub struct CacheGroup {
    name: String,
    config: GroupConfig,
    store: Mutex<CacheStore>,
    loader: Option<Arc<dyn Loader>>,
    peers: Option<Arc<dyn PeerPicker>>,
    flight: SingleFlight<Option<Bytes>>,
}

impl CacheGroup {
    pub fn new(name: impl Into<String>, config: GroupConfig) -> Self {
        Self {
            name: name.into(),
            config,
            store: Mutex::new(CacheStore::new(config.max_bytes)),
            loader: None,
            peers: None,
            flight: SingleFlight::new(),
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn Loader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn with_peers(mut self, peers: Arc<dyn PeerPicker>) -> Self {
        self.peers = Some(peers);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> GroupConfig {
        self.config
    }

    // == Get ==
    /// Resolves `key` through the stages allowed by `options`.
    ///
    /// Returns `Ok(None)` when the key is absent everywhere that was consulted.
    /// Loader failures are returned as errors and nothing is cached. A peer
    /// transport failure falls through to the loader when the strategy allows
    /// one, and is returned otherwise.
    pub async fn get(&self, key: &str, options: GetOptions) -> Result<Option<Bytes>> {
        match self.store.lock().await.get(key) {
            Lookup::Hit(bytes) => return Ok(Some(bytes)),
            Lookup::Absent => return Ok(None),
            Lookup::Miss => {}
        }

        if options.strategy == LookupStrategy::LocalOnly {
            return Ok(None);
        }

        // callers only share a flight when they would run the same stages
        let flight_key = format!("{:?}|{:?}|{}", options.strategy, options.ttl, key);
        self.flight
            .run(&flight_key, || self.resolve_miss(key, options))
            .await
    }

    // == Add ==
    /// Stores `value` under `key`; `ttl` in seconds, None for no expiry.
    pub async fn add(&self, key: &str, value: Bytes, ttl: Option<u64>) -> Result<()> {
        self.store.lock().await.add(key, Some(value), ttl)
    }

    // == Adjust ==
    /// Adds `delta` to the decimal integer cached under `key` and writes the
    /// result back with `ttl`, all under one store lock.
    ///
    /// Returns the new value, or `Ok(None)` when nothing is cached for `key`.
    /// A value that does not parse is dropped and reported as `Internal`.
    pub async fn adjust(&self, key: &str, delta: i64, ttl: Option<u64>) -> Result<Option<i64>> {
        let mut store = self.store.lock().await;
        let current = match store.peek(key) {
            Lookup::Hit(bytes) => bytes,
            Lookup::Absent | Lookup::Miss => return Ok(None),
        };
        let parsed = std::str::from_utf8(&current)
            .ok()
            .and_then(|text| text.trim().parse::<i64>().ok());
        let Some(value) = parsed else {
            store.delete(key);
            return Err(CacheError::Internal(format!(
                "cached value for {} in {} is not an integer",
                key, self.name
            )));
        };
        let next = value + delta;
        store.add(key, Some(Bytes::from(next.to_string())), ttl)?;
        Ok(Some(next))
    }

    // == Del ==
    /// Drops `key` from the local store, returning whether it was present.
    pub async fn del(&self, key: &str) -> bool {
        self.store.lock().await.delete(key)
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.lock().await.stats()
    }

    /// Sweeps expired entries, returning how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        self.store.lock().await.cleanup_expired()
    }

    async fn resolve_miss(&self, key: &str, options: GetOptions) -> Result<Option<Bytes>> {
        // a previous flight may have filled the key after our miss
        match self.store.lock().await.peek(key) {
            Lookup::Hit(bytes) => return Ok(Some(bytes)),
            Lookup::Absent => return Ok(None),
            Lookup::Miss => {}
        }

        let mut transport_error = None;

        if options.strategy.uses_peer() {
            if let Some(peer) = self.peers.as_ref().and_then(|p| p.pick_peer(key)) {
                match self.fetch_from_peer(peer.as_ref(), key).await {
                    Ok(Some(bytes)) => {
                        self.fill(key, Some(bytes.clone()), self.config.default_ttl, FillSource::Peer)
                            .await;
                        return Ok(Some(bytes));
                    }
                    Ok(None) => {
                        debug!(group = %self.name, key, peer = peer.address(), "peer reports key absent");
                    }
                    Err(err) => {
                        warn!(group = %self.name, key, peer = peer.address(), error = %err, "peer fetch failed");
                        self.store.lock().await.stats_mut().record_peer_error();
                        transport_error = Some(err);
                    }
                }
            }
        }

        if options.strategy.uses_loader() {
            if let Some(loader) = &self.loader {
                let value = loader.load(key).await.map_err(|err| match err {
                    CacheError::Loader(_) => err,
                    other => CacheError::Loader(other.to_string()),
                })?;
                let ttl = options.ttl.unwrap_or(self.config.default_ttl);
                self.fill(key, value.clone(), ttl, FillSource::Loader).await;
                return Ok(value);
            }
        }

        match transport_error {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }

    async fn fetch_from_peer(&self, peer: &dyn PeerFetcher, key: &str) -> Result<Option<Bytes>> {
        let deadline = self.config.peer_timeout;
        tokio::time::timeout(deadline, peer.fetch(&self.name, key, deadline))
            .await
            .map_err(|_| {
                CacheError::Transport(format!(
                    "peer {} did not answer within {:?}",
                    peer.address(),
                    deadline
                ))
            })?
    }

    async fn fill(&self, key: &str, value: Option<Bytes>, ttl: u64, source: FillSource) {
        let mut store = self.store.lock().await;
        match source {
            FillSource::Peer => store.stats_mut().record_peer_load(),
            FillSource::Loader => store.stats_mut().record_load(),
        }
        if let Err(err) = store.add(key, value, Some(ttl)) {
            warn!(group = %self.name, key, error = %err, "value not cached");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LoaderFn;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    struct FixedPeer {
        reply: Result<Option<Bytes>>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FixedPeer {
        fn new(reply: Result<Option<Bytes>>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(Some(Bytes::from_static(b"late"))),
                delay,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PeerFetcher for FixedPeer {
        async fn fetch(&self, _group: &str, _key: &str, _deadline: Duration) -> Result<Option<Bytes>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.reply.clone()
        }

        fn address(&self) -> &str {
            "http://peer"
        }
    }

    struct AlwaysRemote(Arc<FixedPeer>);

    impl PeerPicker for AlwaysRemote {
        fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerFetcher>> {
            Some(self.0.clone())
        }
    }

    fn counting_loader(calls: Arc<AtomicUsize>) -> Arc<dyn Loader> {
        Arc::new(LoaderFn(move |key: String| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                if key.starts_with("missing") {
                    Ok::<_, CacheError>(None)
                } else {
                    Ok(Some(Bytes::from(format!("db:{}", key))))
                }
            }
        }))
    }

    fn group() -> CacheGroup {
        CacheGroup::new("test", GroupConfig::new(1024))
    }

    #[tokio::test]
    async fn test_add_then_get() {
        let group = group();

        group.add("k", Bytes::from_static(b"v"), Some(60)).await.unwrap();

        let value = group.get("k", GetOptions::new(LookupStrategy::LocalOnly)).await.unwrap();
        assert_eq!(value, Some(Bytes::from_static(b"v")));
    }

    #[tokio::test]
    async fn test_add_expires_after_ttl() {
        let group = group();

        group.add("k", Bytes::from_static(b"v"), Some(1)).await.unwrap();
        sleep(Duration::from_millis(1100)).await;

        let value = group.get("k", GetOptions::default()).await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_del_removes_key() {
        let group = group();

        group.add("k", Bytes::from_static(b"v"), None).await.unwrap();
        assert!(group.del("k").await);

        assert_eq!(group.get("k", GetOptions::default()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_local_only_never_loads() {
        let calls = Arc::new(AtomicUsize::new(0));
        let group = group().with_loader(counting_loader(calls.clone()));

        let value = group.get("k", GetOptions::new(LookupStrategy::LocalOnly)).await.unwrap();

        assert_eq!(value, None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_loader_fills_local_store() {
        let calls = Arc::new(AtomicUsize::new(0));
        let group = group().with_loader(counting_loader(calls.clone()));

        let first = group.get("42", GetOptions::default()).await.unwrap();
        let second = group.get("42", GetOptions::default()).await.unwrap();

        assert_eq!(first, Some(Bytes::from_static(b"db:42")));
        assert_eq!(second, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(group.stats().await.loads, 1);
    }

    #[tokio::test]
    async fn test_confirmed_absent_is_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let group = group().with_loader(counting_loader(calls.clone()));

        assert_eq!(group.get("missing-1", GetOptions::default()).await.unwrap(), None);
        assert_eq!(group.get("missing-1", GetOptions::default()).await.unwrap(), None);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_loader_error_is_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let group = group().with_loader(Arc::new(LoaderFn(move |_key: String| {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(CacheError::Store("connection reset".into()))
                } else {
                    Ok(Some(Bytes::from_static(b"ok")))
                }
            }
        })));

        let err = group.get("k", GetOptions::default()).await.unwrap_err();
        assert!(matches!(err, CacheError::Loader(_)));

        let value = group.get("k", GetOptions::default()).await.unwrap();
        assert_eq!(value, Some(Bytes::from_static(b"ok")));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_misses_load_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let group = Arc::new(group().with_loader(counting_loader(calls.clone())));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let group = group.clone();
            handles.push(tokio::spawn(async move {
                group.get("hot", GetOptions::default()).await
            }));
        }

        for handle in handles {
            let value = handle.await.unwrap().unwrap();
            assert_eq!(value, Some(Bytes::from_static(b"db:hot")));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_peer_hit_is_cached_locally() {
        let peer = FixedPeer::new(Ok(Some(Bytes::from_static(b"remote"))));
        let group = group().with_peers(Arc::new(AlwaysRemote(peer.clone())));

        let first = group.get("k", GetOptions::new(LookupStrategy::LocalThenPeer)).await.unwrap();
        let second = group.get("k", GetOptions::new(LookupStrategy::LocalOnly)).await.unwrap();

        assert_eq!(first, Some(Bytes::from_static(b"remote")));
        assert_eq!(second, first);
        assert_eq!(peer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(group.stats().await.peer_loads, 1);
    }

    #[tokio::test]
    async fn test_peer_not_found_falls_through_to_loader() {
        let calls = Arc::new(AtomicUsize::new(0));
        let peer = FixedPeer::new(Ok(None));
        let group = group()
            .with_peers(Arc::new(AlwaysRemote(peer)))
            .with_loader(counting_loader(calls.clone()));

        let value = group.get("7", GetOptions::default()).await.unwrap();

        assert_eq!(value, Some(Bytes::from_static(b"db:7")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_peer_error_without_loader_is_returned() {
        let peer = FixedPeer::new(Err(CacheError::Transport("connection refused".into())));
        let group = group().with_peers(Arc::new(AlwaysRemote(peer)));

        let err = group
            .get("k", GetOptions::new(LookupStrategy::LocalThenPeer))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(group.stats().await.peer_errors, 1);
    }

    #[tokio::test]
    async fn test_peer_timeout_falls_through() {
        let calls = Arc::new(AtomicUsize::new(0));
        let peer = FixedPeer::slow(Duration::from_secs(10));
        let group = CacheGroup::new(
            "test",
            GroupConfig::new(1024).with_peer_timeout(Duration::from_millis(100)),
        )
        .with_peers(Arc::new(AlwaysRemote(peer)))
        .with_loader(counting_loader(calls.clone()));

        let value = tokio::time::timeout(Duration::from_secs(2), group.get("9", GetOptions::default()))
            .await
            .expect("get must honor the peer deadline")
            .unwrap();

        assert_eq!(value, Some(Bytes::from_static(b"db:9")));
    }

    #[tokio::test]
    async fn test_loader_ttl_option() {
        let calls = Arc::new(AtomicUsize::new(0));
        let group = group().with_loader(counting_loader(calls.clone()));

        group
            .get("k", GetOptions::new(LookupStrategy::LocalThenGetter).with_ttl(1))
            .await
            .unwrap();
        sleep(Duration::from_millis(1100)).await;
        group
            .get("k", GetOptions::new(LookupStrategy::LocalThenGetter))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_overlapping_strategies_do_not_share_a_flight() {
        let calls = Arc::new(AtomicUsize::new(0));
        let peer = Arc::new(FixedPeer {
            reply: Ok(None),
            delay: Duration::from_millis(200),
            calls: AtomicUsize::new(0),
        });
        let group = Arc::new(
            group()
                .with_peers(Arc::new(AlwaysRemote(peer)))
                .with_loader(counting_loader(calls.clone())),
        );

        let peer_only = tokio::spawn({
            let group = group.clone();
            async move { group.get("k", GetOptions::new(LookupStrategy::LocalThenPeer)).await }
        });
        sleep(Duration::from_millis(50)).await;
        let full = group.get("k", GetOptions::new(LookupStrategy::Full)).await.unwrap();

        assert_eq!(full, Some(Bytes::from_static(b"db:k")));
        assert!(peer_only.await.unwrap().is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_overlapping_ttls_do_not_share_a_flight() {
        let calls = Arc::new(AtomicUsize::new(0));
        let group = Arc::new(group().with_loader(counting_loader(calls.clone())));

        let short = tokio::spawn({
            let group = group.clone();
            async move {
                group
                    .get("k", GetOptions::new(LookupStrategy::LocalThenGetter).with_ttl(1))
                    .await
            }
        });
        let long = group
            .get("k", GetOptions::new(LookupStrategy::LocalThenGetter).with_ttl(600))
            .await
            .unwrap();
        short.await.unwrap().unwrap();

        assert_eq!(long, Some(Bytes::from_static(b"db:k")));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_adjust_applies_delta() {
        let group = group();
        group.add("cap", Bytes::from_static(b"5"), Some(60)).await.unwrap();

        assert_eq!(group.adjust("cap", -1, Some(60)).await.unwrap(), Some(4));
        assert_eq!(group.adjust("cap", 2, Some(60)).await.unwrap(), Some(6));

        let value = group.get("cap", GetOptions::new(LookupStrategy::LocalOnly)).await.unwrap();
        assert_eq!(value, Some(Bytes::from_static(b"6")));
    }

    #[tokio::test]
    async fn test_adjust_skips_uncached_key() {
        let group = group();

        assert_eq!(group.adjust("cap", -1, None).await.unwrap(), None);
        assert_eq!(group.get("cap", GetOptions::new(LookupStrategy::LocalOnly)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_adjust_drops_non_integer() {
        let group = group();
        group.add("cap", Bytes::from_static(b"lots"), None).await.unwrap();

        let err = group.adjust("cap", -1, None).await.unwrap_err();

        assert!(matches!(err, CacheError::Internal(_)));
        assert_eq!(group.get("cap", GetOptions::new(LookupStrategy::LocalOnly)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_concurrent_adjustments_are_not_lost() {
        let group = Arc::new(group());
        group.add("cap", Bytes::from_static(b"100"), None).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..40 {
            let group = group.clone();
            let delta = if i % 2 == 0 { -1 } else { -2 };
            handles.push(tokio::spawn(async move { group.adjust("cap", delta, None).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let value = group.get("cap", GetOptions::new(LookupStrategy::LocalOnly)).await.unwrap();
        assert_eq!(value, Some(Bytes::from_static(b"40")));
    }
}
