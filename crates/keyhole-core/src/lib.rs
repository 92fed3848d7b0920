//! Core types and traits for the Keyhole URL shortener.
//!
//! This crate provides the pieces shared by the shortener, the storage
//! backends and the redirector: keys, fingerprints, URL normalization and the
//! repository contract.

pub mod error;
pub mod fingerprint;
pub mod key;
pub mod normalize;
pub mod options;
pub mod repository;

pub use error::{ShortenError, StorageError, ValidationFailure};
pub use fingerprint::{Fingerprint, Fingerprinter, Sha512Fingerprinter, DEFAULT_NAMESPACE};
pub use key::{KeyGenerator, RandomKeyGenerator, ShortKey, DEFAULT_KEY_LENGTH, MAX_KEY_LENGTH};
pub use normalize::normalize;
pub use options::{UrlOptions, DEFAULT_PATH_PREFIX};
pub use repository::{
    CreateOrFind, ReadRepository, Repository, RepositoryTransaction, UrlRecord, ValidationRules,
    DEFAULT_MAX_URL_LENGTH, DEFAULT_URL_PATTERN,
};
