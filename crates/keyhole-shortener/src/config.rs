use crate::reporter::{ExceptionReporter, LogReporter};
use keyhole_core::repository::default_url_pattern;
use keyhole_core::{
    Fingerprinter, KeyGenerator, RandomKeyGenerator, Sha512Fingerprinter, UrlOptions,
    ValidationRules, DEFAULT_KEY_LENGTH, DEFAULT_MAX_URL_LENGTH,
};
use regex::Regex;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use typed_builder::TypedBuilder;

/// Settings for [`ShortenerService`](crate::ShortenerService).
///
/// ```
/// use keyhole_shortener::ShortenerConfig;
/// use keyhole_core::UrlOptions;
///
/// let config = ShortenerConfig::builder()
///     .key_length(12)
///     .url_options(UrlOptions::with_host("sho.rt"))
///     .build();
/// assert_eq!(config.validation_rules().key_length, 12);
/// ```
#[derive(Clone, TypedBuilder)]
pub struct ShortenerConfig {
    /// Longest accepted `original_url`, in bytes.
    #[builder(default = DEFAULT_MAX_URL_LENGTH)]
    pub max_url_length: usize,

    /// Pattern every `original_url` must match.
    #[builder(default = default_url_pattern())]
    pub url_pattern: Regex,

    /// Exact length of every issued key.
    #[builder(default = DEFAULT_KEY_LENGTH)]
    pub key_length: usize,

    #[builder(default = Arc::new(Sha512Fingerprinter) as Arc<dyn Fingerprinter>)]
    pub fingerprinter: Arc<dyn Fingerprinter>,

    /// Falls back to a [`RandomKeyGenerator`] of `key_length` characters.
    #[builder(default, setter(strip_option))]
    pub key_generator: Option<Arc<dyn KeyGenerator>>,

    #[builder(default = Arc::new(LogReporter) as Arc<dyn ExceptionReporter>)]
    pub reporter: Arc<dyn ExceptionReporter>,

    /// Defaults for building shortened URLs; per-call options are merged on top.
    #[builder(default)]
    pub url_options: UrlOptions,
}

impl ShortenerConfig {
    pub fn validation_rules(&self) -> ValidationRules {
        ValidationRules {
            max_url_length: self.max_url_length,
            url_pattern: self.url_pattern.clone(),
            key_length: self.key_length,
        }
    }

    pub fn generator(&self) -> Arc<dyn KeyGenerator> {
        match &self.key_generator {
            Some(generator) => Arc::clone(generator),
            None => Arc::new(RandomKeyGenerator::new(self.key_length)),
        }
    }
}

impl Default for ShortenerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Debug for ShortenerConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShortenerConfig")
            .field("max_url_length", &self.max_url_length)
            .field("url_pattern", &self.url_pattern.as_str())
            .field("key_length", &self.key_length)
            .field("custom_key_generator", &self.key_generator.is_some())
            .field("url_options", &self.url_options)
            .finish_non_exhaustive()
    }
}
