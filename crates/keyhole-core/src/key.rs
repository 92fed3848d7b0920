use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Default length of a generated key.
pub const DEFAULT_KEY_LENGTH: usize = 20;

/// Longest key that can ever be resolved.
pub const MAX_KEY_LENGTH: usize = 64;

/// The public identifier of a shortened URL, as it appears in the short link.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShortKey(String);

impl ShortKey {
    /// Parses a key received from the outside world (e.g. a request path).
    ///
    /// Accepts 1-64 ASCII alphanumeric characters. Anything else can never have
    /// been issued by a [`KeyGenerator`] that respects the store layout, so the
    /// caller can treat `None` as "not found".
    pub fn parse(key: &str) -> Option<Self> {
        if key.is_empty() || key.len() > MAX_KEY_LENGTH {
            return None;
        }
        if !key.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(Self(key.to_owned()))
    }

    /// Creates a `ShortKey` without validation.
    ///
    /// Use this only for keys produced by trusted internal sources
    /// (generators, rows read back from the store).
    pub fn new_unchecked(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for ShortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Produces fresh public keys.
///
/// Implementations are pure generators that don't interact with storage:
/// uniqueness is enforced by the store, and a colliding key is simply
/// replaced by another call to [`KeyGenerator::generate`].
pub trait KeyGenerator: Send + Sync + 'static {
    fn generate(&self) -> ShortKey;
}

impl<F> KeyGenerator for F
where
    F: Fn() -> ShortKey + Send + Sync + 'static,
{
    fn generate(&self) -> ShortKey {
        self()
    }
}

/// Random alphanumeric keys drawn from the thread-local CSPRNG.
///
/// With the default length of 20 the key space is 62^20, so collisions are
/// practically impossible and a small fixed retry budget is enough.
#[derive(Debug, Clone, Copy)]
pub struct RandomKeyGenerator {
    length: usize,
}

impl RandomKeyGenerator {
    pub fn new(length: usize) -> Self {
        Self { length }
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for RandomKeyGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_LENGTH)
    }
}

impl KeyGenerator for RandomKeyGenerator {
    fn generate(&self) -> ShortKey {
        let key: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect();
        ShortKey(key)
    }
}
