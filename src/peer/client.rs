//! HTTP Peer Client
//!
//! Fetches a group's key from a remote node over the peer cache endpoint.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, Url};
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::peer::{PeerFetcher, CACHE_BASE_PATH};

/// Remote node reachable at `base_url`.
#[derive(Debug, Clone)]
pub struct HttpPeer {
    base_url: String,
    client: Client,
}

impl HttpPeer {
    pub fn new(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// `{base}/_cache/{group}/{key}` with both segments percent-encoded.
    pub fn cache_url(&self, group: &str, key: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| CacheError::Transport(format!("bad peer url {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| CacheError::Transport(format!("peer url {} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .push(CACHE_BASE_PATH)
            .push(group)
            .push(key);
        Ok(url)
    }
}

#[async_trait]
impl PeerFetcher for HttpPeer {
    async fn fetch(&self, group: &str, key: &str, deadline: Duration) -> Result<Option<Bytes>> {
        let url = self.cache_url(group, key)?;
        debug!(peer = %self.base_url, group, key, "fetching from peer");

        let response = self.client.get(url).timeout(deadline).send().await?;
        match response.status() {
            StatusCode::OK => Ok(Some(response.bytes().await?)),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(CacheError::Transport(format!(
                "peer {} answered {}",
                self.base_url, status
            ))),
        }
    }

    fn address(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_url_encodes_segments() {
        let peer = HttpPeer::new("http://10.0.0.1:3000", Client::new());

        let url = peer.cache_url("student_course", "7_12").unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.1:3000/_cache/student_course/7_12");

        let url = peer.cache_url("login", "a b/c").unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.1:3000/_cache/login/a%20b%2Fc");
    }

    #[test]
    fn test_cache_url_rejects_garbage() {
        let peer = HttpPeer::new("not a url", Client::new());
        assert!(matches!(
            peer.cache_url("g", "k"),
            Err(CacheError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_transport_error() {
        // port 9 (discard) on localhost is expected to refuse connections
        let peer = HttpPeer::new("http://127.0.0.1:9", Client::new());

        let err = peer
            .fetch("g", "k", Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
