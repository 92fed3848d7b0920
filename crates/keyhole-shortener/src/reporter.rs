use keyhole_core::ShortenError;
use std::panic::{self, AssertUnwindSafe};
use tracing::{error, warn};

/// Receives every error swallowed by `ShortenerService::shorten`.
///
/// Closures with the same signature are reporters too.
pub trait ExceptionReporter: Send + Sync + 'static {
    fn report(&self, error: &ShortenError, original_url: Option<&str>);
}

impl<F> ExceptionReporter for F
where
    F: Fn(&ShortenError, Option<&str>) + Send + Sync + 'static,
{
    fn report(&self, error: &ShortenError, original_url: Option<&str>) {
        self(error, original_url)
    }
}

/// Logs each error as a warning. This is the default reporter.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ExceptionReporter for LogReporter {
    fn report(&self, error: &ShortenError, original_url: Option<&str>) {
        warn!(%error, original_url, "Failed to shorten url");
    }
}

/// Hands `error` to `reporter`, containing a panicking reporter.
pub(crate) fn report(reporter: &dyn ExceptionReporter, error: &ShortenError, original_url: Option<&str>) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| reporter.report(error, original_url)));
    if outcome.is_err() {
        error!(%error, "Exception reporter panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn closures_are_reporters() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = move |error: &ShortenError, url: Option<&str>| {
            sink.lock().push((error.to_string(), url.map(str::to_owned)));
        };

        report(&reporter, &ShortenError::MissingInput, None);
        report(
            &reporter,
            &ShortenError::OutputConstruction("missing host to link to".into()),
            Some("https://example.com/"),
        );

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], ("original url should be present".to_string(), None));
        assert_eq!(seen[1].1.as_deref(), Some("https://example.com/"));
    }

    #[test]
    fn panicking_reporter_is_contained() {
        let reporter = |_: &ShortenError, _: Option<&str>| panic!("reporter exploded");

        report(&reporter, &ShortenError::MissingInput, None);
    }
}
