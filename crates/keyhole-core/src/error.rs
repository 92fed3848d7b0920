use thiserror::Error;

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("transaction failed: {0}")]
    Transaction(String),
}

/// Why a URL record was rejected before it reached the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("url can't be blank")]
    Blank,
    #[error("url is too long (maximum is {max} bytes, got {actual})")]
    TooLong { max: usize, actual: usize },
    #[error("url does not match the allowed pattern")]
    PatternMismatch,
    #[error("key must be {expected} characters, got {actual}")]
    KeyLength { expected: usize, actual: usize },
}

/// Everything that can go wrong while shortening a URL.
///
/// None of these ever escapes `shorten`: they are handed to the configured
/// exception reporter and the caller gets the original URL back.
#[derive(Debug, Clone, Error)]
pub enum ShortenError {
    #[error("original url should be present")]
    MissingInput,
    #[error("invalid url {url:?}: {failure}")]
    Validation {
        url: String,
        #[source]
        failure: ValidationFailure,
    },
    #[error("malformed url {url:?}: {source}")]
    MalformedUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("generated keys kept colliding after {attempts} attempts")]
    KeyCollisionExhausted { attempts: usize },
    #[error("cannot build shortened url: {0}")]
    OutputConstruction(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
