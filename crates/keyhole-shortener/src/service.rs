use crate::config::ShortenerConfig;
use crate::reporter::report;
use keyhole_core::{
    normalize, CreateOrFind, Fingerprint, ReadRepository, Repository, RepositoryTransaction,
    ShortenError, UrlOptions, UrlRecord, DEFAULT_NAMESPACE,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use typed_builder::TypedBuilder;

/// Attempts at finding an unused key before giving up.
pub const MAX_KEY_ATTEMPTS: usize = 10;

/// Per-call options for [`ShortenerService::shorten`].
#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct ShortenParams {
    /// Partition for deduplication. The same URL in two namespaces gets two keys.
    #[builder(default = DEFAULT_NAMESPACE.to_string(), setter(into))]
    pub namespace: String,
    /// Merged on top of the configured [`ShortenerConfig::url_options`].
    #[builder(default)]
    pub url_options: UrlOptions,
}

impl ShortenParams {
    pub fn in_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Self::default()
        }
    }
}

/// Issues short URLs, deduplicating equivalent inputs.
///
/// Cross-caller correctness rests entirely on the repository's transactions
/// and unique constraints; the service keeps no state besides its
/// configuration snapshot.
pub struct ShortenerService<R> {
    repository: R,
    config: RwLock<Arc<ShortenerConfig>>,
}

impl<R: Repository> ShortenerService<R> {
    pub fn new(repository: R, config: ShortenerConfig) -> Self {
        Self {
            repository,
            config: RwLock::new(Arc::new(config)),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// The current configuration snapshot.
    pub fn config(&self) -> Arc<ShortenerConfig> {
        Arc::clone(&self.config.read())
    }

    /// Updates the configuration in place.
    ///
    /// Concurrent callers are serialized, so read-modify-write closures never
    /// lose updates. Calls already in flight keep the snapshot they started with.
    pub fn configure<F>(&self, f: F)
    where
        F: FnOnce(&mut ShortenerConfig),
    {
        let mut current = self.config.write();
        let mut next = ShortenerConfig::clone(&current);
        f(&mut next);
        *current = Arc::new(next);
    }

    /// Shortens `original_url`, returning the public short URL.
    ///
    /// Never fails: on any error the error is handed to the configured
    /// reporter and `original_url` is returned unchanged.
    pub async fn shorten(&self, original_url: &str, params: ShortenParams) -> String {
        let config = self.config();

        match self.try_shorten(&config, original_url, &params).await {
            Ok(url) => url,
            Err(error) => {
                report(config.reporter.as_ref(), &error, Some(original_url));
                original_url.to_owned()
            }
        }
    }

    /// Like [`shorten`](Self::shorten), for callers whose input may be absent.
    ///
    /// `None` is reported as [`ShortenError::MissingInput`] and returned as is.
    pub async fn shorten_optional(
        &self,
        original_url: Option<&str>,
        params: ShortenParams,
    ) -> Option<String> {
        match original_url {
            Some(url) => Some(self.shorten(url, params).await),
            None => {
                let config = self.config();
                report(config.reporter.as_ref(), &ShortenError::MissingInput, None);
                None
            }
        }
    }

    /// Finds the record any URL equivalent to `url` was shortened to.
    pub async fn find_by_url(
        &self,
        url: &str,
        namespace: &str,
    ) -> Result<Option<UrlRecord>, ShortenError> {
        let config = self.config();
        let fingerprint = fingerprint(&config, url, namespace)?;
        Ok(self.repository.find_by_fingerprint(&fingerprint).await?)
    }

    async fn try_shorten(
        &self,
        config: &ShortenerConfig,
        original_url: &str,
        params: &ShortenParams,
    ) -> Result<String, ShortenError> {
        let fingerprint = fingerprint(config, original_url, &params.namespace)?;
        let url_options = config.url_options.merge(&params.url_options);

        let mut tx = self.repository.begin().await?;
        let outcome = find_or_create(tx.as_mut(), config, original_url, fingerprint)
            .await
            .and_then(|record| record.shortened_url(&url_options));

        match outcome {
            Ok(url) => {
                tx.commit().await?;
                Ok(url)
            }
            Err(error) => {
                if let Err(rollback_error) = tx.rollback().await {
                    warn!(error = %rollback_error, "Failed to roll back shorten transaction");
                }
                Err(error)
            }
        }
    }
}

fn fingerprint(
    config: &ShortenerConfig,
    url: &str,
    namespace: &str,
) -> Result<Fingerprint, ShortenError> {
    let normalized = normalize(url)?;
    Ok(config.fingerprinter.fingerprint(&normalized, namespace))
}

async fn find_or_create(
    tx: &mut dyn RepositoryTransaction,
    config: &ShortenerConfig,
    original_url: &str,
    fingerprint: Fingerprint,
) -> Result<UrlRecord, ShortenError> {
    if let Some(existing) = tx.find_by_fingerprint(&fingerprint).await? {
        trace!(key = %existing.key, "Reusing existing record");
        return Ok(existing);
    }

    let generator = config.generator();
    let rules = config.validation_rules();

    for attempt in 1..=MAX_KEY_ATTEMPTS {
        let key = generator.generate();
        let record = UrlRecord::build(original_url, fingerprint.clone(), key, &rules)?;

        match tx.create_or_find(record).await? {
            CreateOrFind::Created(record) => {
                debug!(key = %record.key, attempt, "Created record");
                return Ok(record);
            }
            CreateOrFind::Found(record) => {
                debug!(key = %record.key, "Record created concurrently, reusing it");
                return Ok(record);
            }
            CreateOrFind::KeyConflict => {
                debug!(attempt, "Generated key is taken, retrying");
            }
        }
    }

    Err(ShortenError::KeyCollisionExhausted {
        attempts: MAX_KEY_ATTEMPTS,
    })
}
