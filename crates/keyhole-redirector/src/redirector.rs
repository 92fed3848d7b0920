use crate::Result;
use async_trait::async_trait;
use keyhole_core::{ShortKey, UrlRecord};

#[async_trait]
pub trait Redirector: Send + Sync + 'static {
    /// Resolves a key to its stored record by exact match.
    /// Returns `None` if no record owns the key.
    async fn resolve(&self, key: &ShortKey) -> Result<Option<UrlRecord>>;
}
