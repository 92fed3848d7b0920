use crate::error::{Result, ShortenError, ValidationFailure};
use crate::fingerprint::Fingerprint;
use crate::key::{ShortKey, DEFAULT_KEY_LENGTH};
use async_trait::async_trait;
use jiff::Timestamp;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default upper bound for `original_url`, in bytes.
pub const DEFAULT_MAX_URL_LENGTH: usize = 10_000;

/// Default structural pattern for `original_url`.
pub const DEFAULT_URL_PATTERN: &str = r"^(?:https?://\w+|/)";

/// A stored shortened URL. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// The URL exactly as the first caller passed it in.
    pub original_url: String,
    /// Fingerprint of `(namespace, normalized original_url)`.
    pub fingerprint: Fingerprint,
    /// The public key.
    pub key: ShortKey,
    /// When the record was created.
    pub created_at: Timestamp,
}

impl UrlRecord {
    /// Builds a record that is about to be inserted, checking it against `rules`.
    pub fn build(
        original_url: &str,
        fingerprint: Fingerprint,
        key: ShortKey,
        rules: &ValidationRules,
    ) -> std::result::Result<Self, ShortenError> {
        rules
            .check(original_url, &key)
            .map_err(|failure| ShortenError::Validation {
                url: original_url.to_owned(),
                failure,
            })?;

        Ok(Self {
            original_url: original_url.to_owned(),
            fingerprint,
            key,
            created_at: Timestamp::now(),
        })
    }
}

/// Constraints a new record must satisfy.
#[derive(Debug, Clone)]
pub struct ValidationRules {
    pub max_url_length: usize,
    pub url_pattern: Regex,
    pub key_length: usize,
}

impl ValidationRules {
    pub fn check(&self, url: &str, key: &ShortKey) -> std::result::Result<(), ValidationFailure> {
        if url.trim().is_empty() {
            return Err(ValidationFailure::Blank);
        }
        if url.len() > self.max_url_length {
            return Err(ValidationFailure::TooLong {
                max: self.max_url_length,
                actual: url.len(),
            });
        }
        if !self.url_pattern.is_match(url) {
            return Err(ValidationFailure::PatternMismatch);
        }
        if key.len() != self.key_length {
            return Err(ValidationFailure::KeyLength {
                expected: self.key_length,
                actual: key.len(),
            });
        }
        Ok(())
    }
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            max_url_length: DEFAULT_MAX_URL_LENGTH,
            url_pattern: default_url_pattern(),
            key_length: DEFAULT_KEY_LENGTH,
        }
    }
}

/// The compiled [`DEFAULT_URL_PATTERN`].
pub fn default_url_pattern() -> Regex {
    Regex::new(DEFAULT_URL_PATTERN).expect("default url pattern is a valid regex")
}

/// Outcome of [`RepositoryTransaction::create_or_find`].
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOrFind {
    /// The record was inserted.
    Created(UrlRecord),
    /// A record with the same fingerprint already existed (possibly inserted
    /// concurrently by another caller); nothing was inserted.
    Found(UrlRecord),
    /// The key is owned by a record with a different fingerprint.
    KeyConflict,
}

/// A read-only view of a repository.
///
/// This is all the redirector needs.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Looks up a committed record by its public key.
    async fn get(&self, key: &ShortKey) -> Result<Option<UrlRecord>>;

    /// Looks up a committed record by fingerprint.
    async fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<UrlRecord>>;
}

#[async_trait]
pub trait Repository: ReadRepository {
    /// Opens a transaction. Nothing written through it is visible to other
    /// callers until [`RepositoryTransaction::commit`].
    async fn begin(&self) -> Result<Box<dyn RepositoryTransaction>>;
}

/// A scoped unit of work. Dropping it without committing rolls it back.
#[async_trait]
pub trait RepositoryTransaction: Send {
    async fn find_by_fingerprint(&mut self, fingerprint: &Fingerprint)
        -> Result<Option<UrlRecord>>;

    /// Inserts `record` unless its fingerprint is already taken.
    ///
    /// Both uniqueness constraints are enforced by the store. A fingerprint
    /// conflict resolves to [`CreateOrFind::Found`] with the existing row, a
    /// key conflict to [`CreateOrFind::KeyConflict`]; neither is an error.
    async fn create_or_find(&mut self, record: UrlRecord) -> Result<CreateOrFind>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
