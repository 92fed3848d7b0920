use crate::error::ShortenError;
use crate::key::ShortKey;
use crate::repository::UrlRecord;
use serde::{Deserialize, Serialize};
use url::{form_urlencoded, Url};

/// Path under which keys are served when no prefix is configured.
pub const DEFAULT_PATH_PREFIX: &str = "/t";

/// How a key is turned into a public, absolute URL.
///
/// Every field is optional so that per-call overrides can be merged on top of
/// the configured defaults with [`UrlOptions::merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlOptions {
    /// `http` when unset. A trailing `://` or `:` is ignored.
    pub protocol: Option<String>,
    pub host: Option<String>,
    /// Omitted from the output when it is the protocol's default port.
    pub port: Option<u16>,
    /// [`DEFAULT_PATH_PREFIX`] when unset.
    pub path_prefix: Option<String>,
    /// Extra query parameters appended to every shortened URL.
    #[serde(default)]
    pub params: Vec<(String, String)>,
}

impl UrlOptions {
    /// Options that only set the host.
    pub fn with_host(host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ..Self::default()
        }
    }

    /// Layers `overrides` on top of `self`. Set fields win; override params
    /// replace base params with the same name.
    pub fn merge(&self, overrides: &UrlOptions) -> UrlOptions {
        let mut params = self.params.clone();
        for (name, value) in &overrides.params {
            params.retain(|(existing, _)| existing != name);
            params.push((name.clone(), value.clone()));
        }

        UrlOptions {
            protocol: overrides.protocol.clone().or_else(|| self.protocol.clone()),
            host: overrides.host.clone().or_else(|| self.host.clone()),
            port: overrides.port.or(self.port),
            path_prefix: overrides
                .path_prefix
                .clone()
                .or_else(|| self.path_prefix.clone()),
            params,
        }
    }

    /// Builds the public URL for `key`, e.g. `https://google.com:50443/t/KEY`.
    pub fn build(&self, key: &ShortKey) -> Result<String, ShortenError> {
        let host = self
            .host
            .as_deref()
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .ok_or_else(|| ShortenError::OutputConstruction("missing host to link to".into()))?;

        let protocol = self
            .protocol
            .as_deref()
            .map(|protocol| protocol.trim_end_matches("://").trim_end_matches(':'))
            .filter(|protocol| !protocol.is_empty())
            .unwrap_or("http");

        let mut out = format!("{protocol}://{host}");
        match (protocol, self.port) {
            (_, None) | ("http", Some(80)) | ("https", Some(443)) => {}
            (_, Some(port)) => {
                out.push(':');
                out.push_str(&port.to_string());
            }
        }

        let prefix = self
            .path_prefix
            .as_deref()
            .unwrap_or(DEFAULT_PATH_PREFIX)
            .trim_end_matches('/');
        if !prefix.is_empty() && !prefix.starts_with('/') {
            out.push('/');
        }
        out.push_str(prefix);
        out.push('/');
        out.push_str(key.as_str());

        if !self.params.is_empty() {
            out.push('?');
            out.push_str(
                &form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(&self.params)
                    .finish(),
            );
        }

        Url::parse(&out).map_err(|e| {
            ShortenError::OutputConstruction(format!("invalid shortened url {out:?}: {e}"))
        })?;

        Ok(out)
    }
}

impl UrlRecord {
    /// The public URL of this record under `options`.
    pub fn shortened_url(&self, options: &UrlOptions) -> Result<String, ShortenError> {
        options.build(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ShortKey {
        ShortKey::new_unchecked("abcdefghij0123456789")
    }

    #[test]
    fn builds_with_host_only() {
        let url = UrlOptions::with_host("google.com").build(&key()).unwrap();
        assert_eq!(url, "http://google.com/t/abcdefghij0123456789");
    }

    #[test]
    fn builds_with_protocol_and_port() {
        let options = UrlOptions {
            protocol: Some("https".into()),
            port: Some(50443),
            ..UrlOptions::with_host("google.com")
        };

        assert_eq!(
            options.build(&key()).unwrap(),
            "https://google.com:50443/t/abcdefghij0123456789"
        );
    }

    #[test]
    fn omits_default_ports_and_trims_protocol_separators() {
        let https = UrlOptions {
            protocol: Some("https://".into()),
            port: Some(443),
            ..UrlOptions::with_host("x.com")
        };
        let http = UrlOptions {
            protocol: Some("http:".into()),
            port: Some(80),
            ..UrlOptions::with_host("x.com")
        };

        assert_eq!(https.build(&key()).unwrap(), "https://x.com/t/abcdefghij0123456789");
        assert_eq!(http.build(&key()).unwrap(), "http://x.com/t/abcdefghij0123456789");
    }

    #[test]
    fn custom_prefix_and_params() {
        let options = UrlOptions {
            path_prefix: Some("go/".into()),
            params: vec![("utm source".into(), "a&b".into())],
            ..UrlOptions::with_host("x.com")
        };

        assert_eq!(
            options.build(&key()).unwrap(),
            "http://x.com/go/abcdefghij0123456789?utm+source=a%26b"
        );
    }

    #[test]
    fn missing_host_is_an_output_error() {
        for options in [UrlOptions::default(), UrlOptions::with_host("  ")] {
            let err = options.build(&key()).unwrap_err();
            assert!(matches!(err, ShortenError::OutputConstruction(ref m) if m == "missing host to link to"));
        }
    }

    #[test]
    fn unusable_host_is_an_output_error() {
        let err = UrlOptions::with_host("exa mple.com").build(&key()).unwrap_err();
        assert!(matches!(err, ShortenError::OutputConstruction(_)));
    }

    #[test]
    fn merge_prefers_overrides() {
        let base = UrlOptions {
            protocol: Some("https".into()),
            port: Some(8443),
            params: vec![("a".into(), "1".into()), ("b".into(), "2".into())],
            ..UrlOptions::with_host("base.example")
        };
        let overrides = UrlOptions {
            host: Some("other.example".into()),
            params: vec![("a".into(), "9".into())],
            ..UrlOptions::default()
        };

        let merged = base.merge(&overrides);

        assert_eq!(merged.host.as_deref(), Some("other.example"));
        assert_eq!(merged.protocol.as_deref(), Some("https"));
        assert_eq!(merged.port, Some(8443));
        assert_eq!(
            merged.params,
            vec![("b".to_string(), "2".to_string()), ("a".to_string(), "9".to_string())]
        );
    }

    #[test]
    fn record_builds_its_shortened_url() {
        let record = UrlRecord {
            original_url: "https://example.com/".into(),
            fingerprint: crate::Fingerprint::new("fp"),
            key: key(),
            created_at: jiff::Timestamp::UNIX_EPOCH,
        };

        assert_eq!(
            record.shortened_url(&UrlOptions::with_host("google.com")).unwrap(),
            "http://google.com/t/abcdefghij0123456789"
        );
    }
}
