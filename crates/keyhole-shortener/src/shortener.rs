use crate::service::{ShortenParams, ShortenerService};
use async_trait::async_trait;
use keyhole_core::Repository;

/// The shortening entry points, independent of the backing repository.
#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Returns the short URL for `original_url`, or `original_url` itself if
    /// shortening failed.
    async fn shorten(&self, original_url: &str, params: ShortenParams) -> String;

    /// Returns `None` only when `original_url` is absent.
    async fn shorten_optional(
        &self,
        original_url: Option<&str>,
        params: ShortenParams,
    ) -> Option<String>;
}

#[async_trait]
impl<R: Repository> Shortener for ShortenerService<R> {
    async fn shorten(&self, original_url: &str, params: ShortenParams) -> String {
        ShortenerService::shorten(self, original_url, params).await
    }

    async fn shorten_optional(
        &self,
        original_url: Option<&str>,
        params: ShortenParams,
    ) -> Option<String> {
        ShortenerService::shorten_optional(self, original_url, params).await
    }
}
