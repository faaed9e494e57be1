//! Loader Module
//!
//! Miss handlers that fetch authoritative data for a cache group.

use std::future::Future;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

// == Loader ==
/// Fetches the authoritative bytes for `key` on a cache miss.
///
/// `Ok(None)` means the backing store confirmed there is no such record; it is
/// cached as an absent-marker. Errors are never cached.
#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<Bytes>>;
}

/// Adapts an async closure into a [`Loader`].
pub struct LoaderFn<F>(pub F);

#[async_trait]
impl<F, Fut> Loader for LoaderFn<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<Bytes>>> + Send,
{
    async fn load(&self, key: &str) -> Result<Option<Bytes>> {
        (self.0)(key.to_string()).await
    }
}
