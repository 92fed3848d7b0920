use std::sync::Arc;

use crate::redirector::Redirector;
use async_trait::async_trait;
use keyhole_core::{ReadRepository, ShortKey, UrlRecord};
use tracing::{debug, trace};

/// Service for handling URL redirects.
///
/// Uses a read-only repository; it never sees uncommitted records.
#[derive(Debug, Clone)]
pub struct RedirectorService<R> {
    repository: Arc<R>,
}

impl<R: ReadRepository> RedirectorService<R> {
    /// Creates a new RedirectorService with the given repository.
    pub fn new(repository: R) -> Self {
        Self {
            repository: Arc::new(repository),
        }
    }

    /// Resolves a key to its record.
    pub async fn resolve(&self, key: &ShortKey) -> crate::Result<Option<UrlRecord>> {
        Redirector::resolve(self, key).await
    }

    /// Resolves a key taken straight from a request path.
    ///
    /// Text that can never be a key resolves to `None` without touching the
    /// repository.
    pub async fn resolve_str(&self, key: &str) -> crate::Result<Option<UrlRecord>> {
        match ShortKey::parse(key) {
            Some(key) => self.resolve(&key).await,
            None => {
                trace!(key, "Rejected malformed key");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl<R: ReadRepository> Redirector for RedirectorService<R> {
    async fn resolve(&self, key: &ShortKey) -> crate::Result<Option<UrlRecord>> {
        trace!(key = %key, "Resolving key");

        match self.repository.get(key).await? {
            Some(record) => {
                debug!(key = %key, url = %record.original_url, "Resolved key");
                Ok(Some(record))
            }
            None => {
                trace!(key = %key, "Key not found");
                Ok(None)
            }
        }
    }
}
