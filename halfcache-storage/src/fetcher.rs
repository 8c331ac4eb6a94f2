//! Direct-fetch collaborator.
//!
//! The expensive bulk lookup the cache sits in front of. It resolves a batch
//! of keys in one call; keys it cannot resolve are simply left out of the
//! returned map. An `Err` means the whole batch failed.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use halfcache_core::FetchError;

/// Result of one direct fetch.
pub type FetchResult = Result<HashMap<String, Vec<u8>>, FetchError>;

/// Bulk lookup against the backing system (remote store, database, ...).
#[async_trait]
pub trait DirectFetcher: Send + Sync {
    /// Resolve `keys` in a single round-trip.
    async fn fetch(&self, keys: &[String]) -> FetchResult;
}

#[async_trait]
impl<T: DirectFetcher + ?Sized> DirectFetcher for Arc<T> {
    async fn fetch(&self, keys: &[String]) -> FetchResult {
        (**self).fetch(keys).await
    }
}

/// [`DirectFetcher`] backed by an async closure.
///
/// ```ignore
/// let fetcher = FnFetcher::new(|keys: Vec<String>| async move {
///     db.multi_get(&keys).await.map_err(|e| FetchError::failed(keys.len(), e.to_string()))
/// });
/// ```
pub struct FnFetcher<F> {
    f: F,
}

impl<F> FnFetcher<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> DirectFetcher for FnFetcher<F>
where
    F: Fn(Vec<String>) -> Fut + Send + Sync,
    Fut: Future<Output = FetchResult> + Send,
{
    async fn fetch(&self, keys: &[String]) -> FetchResult {
        (self.f)(keys.to_vec()).await
    }
}
