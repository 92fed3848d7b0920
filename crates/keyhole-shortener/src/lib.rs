//! The shortening path of Keyhole.
//!
//! [`ShortenerService`] turns long URLs into short ones: it normalizes and
//! fingerprints the input, finds or creates the record inside one repository
//! transaction, and builds the public URL. It never fails; errors go to the
//! configured [`ExceptionReporter`] and the caller gets its input back.

pub mod config;
pub mod reporter;
pub mod service;
pub mod shortener;

pub use config::ShortenerConfig;
pub use keyhole_core::UrlOptions;
pub use reporter::{ExceptionReporter, LogReporter};
pub use service::{ShortenParams, ShortenerService, MAX_KEY_ATTEMPTS};
pub use shortener::Shortener;
