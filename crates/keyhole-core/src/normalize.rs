//! URL canonicalization.
//!
//! Two URLs that normalize to the same string are considered the same link
//! and share one record (per namespace). The exact output format is therefore
//! part of the storage contract: changing it changes fingerprints.

use crate::error::ShortenError;
use percent_encoding::percent_decode_str;
use url::{form_urlencoded, Position, Url};

/// Placeholder origin used to resolve absolute-path references.
const RELATIVE_BASE: &str = "http://relative.invalid/";

/// Rewrites `input` into its canonical form.
///
/// - scheme and host are lower-cased, default ports and dot segments removed
/// - query pairs are form-decoded, re-encoded and stably sorted by encoded key,
///   so duplicate keys (`a[]=1&a[]=2`) keep their relative order
/// - escapes in the path and fragment are normalized: unreserved characters
///   are decoded, the rest use upper-case hex
/// - an empty query or fragment is dropped, an empty path becomes `/`
///
/// Inputs without a scheme are treated as relative references. `/path` and
/// `//host/path` are canonicalized like absolute URLs, rootless paths such as
/// `not-a-url` keep their path verbatim.
pub fn normalize(input: &str) -> Result<String, ShortenError> {
    let malformed = |source| ShortenError::MalformedUrl {
        url: input.to_owned(),
        source,
    };

    if input.is_empty() {
        return Ok(String::new());
    }

    if has_scheme(input) {
        let mut url = Url::parse(input).map_err(malformed)?;
        normalize_components(&mut url);
        return Ok(url.into());
    }

    if input.starts_with('/') {
        let mut url = Url::parse(RELATIVE_BASE)
            .and_then(|base| base.join(input))
            .map_err(malformed)?;
        normalize_components(&mut url);

        let normalized = if input.starts_with("//") {
            url.as_str().trim_start_matches(url.scheme()).trim_start_matches(':')
        } else {
            &url[Position::BeforePath..]
        };
        return Ok(normalized.to_owned());
    }

    Ok(normalize_rootless(input))
}

fn normalize_components(url: &mut Url) {
    let query = url.query().map(normalize_query);
    url.set_query(query.as_deref().filter(|q| !q.is_empty()));

    let fragment = url.fragment().map(normalize_escapes);
    url.set_fragment(fragment.as_deref().filter(|f| !f.is_empty()));

    if !url.cannot_be_a_base() {
        let path = normalize_escapes(url.path());
        url.set_path(if path.is_empty() { "/" } else { path.as_str() });
    }
}

fn normalize_rootless(input: &str) -> String {
    let (rest, fragment) = match input.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (input, None),
    };
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };

    let mut normalized = String::with_capacity(input.len() + 1);
    if path.is_empty() {
        normalized.push('/');
    } else {
        normalized.push_str(&normalize_escapes(path));
    }

    if let Some(query) = query.map(normalize_query).filter(|q| !q.is_empty()) {
        normalized.push('?');
        normalized.push_str(&query);
    }
    if let Some(fragment) = fragment.filter(|f| !f.is_empty()) {
        normalized.push('#');
        normalized.push_str(&normalize_escapes(fragment));
    }

    normalized
}

/// Decodes a raw query into ordered pairs and re-encodes it sorted by key.
///
/// A segment without `=` stays a bare key, so `?flag` does not turn into
/// `?flag=`.
fn normalize_query(query: &str) -> String {
    let mut pairs: Vec<(String, Option<String>)> = query
        .split('&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.split_once('=') {
            Some((key, value)) => (reencode(key), Some(reencode(value))),
            None => (reencode(segment), None),
        })
        .collect();

    // `sort_by` is stable: equal keys keep their input order.
    pairs.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    pairs
        .into_iter()
        .map(|(key, value)| match value {
            Some(value) => format!("{key}={value}"),
            None => key,
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Form-decodes `component` to raw bytes and encodes it again.
///
/// Decoding stays at the byte level: `%FF` and `%FE` are not valid UTF-8 and
/// must not collapse into the same replacement character.
fn reencode(component: &str) -> String {
    let spaced = component.replace('+', " ");
    let bytes: Vec<u8> = percent_decode_str(&spaced).collect();
    form_urlencoded::byte_serialize(&bytes).collect()
}

/// Decodes escapes of unreserved characters and upper-cases the hex digits of
/// every other escape, so `%7e`, `%7E` and `~` compare equal.
fn normalize_escapes(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    let mut rest = component;

    while let Some(at) = rest.find('%') {
        out.push_str(&rest[..at]);
        let escape = &rest[at..];

        let byte = escape
            .get(1..3)
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());

        rest = match byte {
            Some(byte) if is_unreserved(byte) => {
                out.push(char::from(byte));
                &escape[3..]
            }
            Some(_) => {
                out.push_str(&escape[..3].to_ascii_uppercase());
                &escape[3..]
            }
            None => {
                out.push('%');
                &escape[1..]
            }
        };
    }

    out.push_str(rest);
    out
}

fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~')
}

fn has_scheme(input: &str) -> bool {
    let Some((scheme, _)) = input.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(url: &str) -> String {
        normalize(url).unwrap()
    }

    #[test]
    fn equivalent_roots_collapse() {
        for url in [
            "https://google.com/",
            "https://google.com",
            "https://google.com/?",
            "https://google.com?",
        ] {
            assert_eq!(norm(url), "https://google.com/", "{url}");
        }
    }

    #[test]
    fn trailing_slash_is_preserved_beyond_the_root() {
        assert_eq!(norm("https://google.com/foo"), "https://google.com/foo");
        assert_eq!(norm("https://google.com/foo?"), "https://google.com/foo");
        assert_eq!(norm("https://google.com/foo/"), "https://google.com/foo/");
        assert_eq!(norm("https://google.com/foo/?"), "https://google.com/foo/");
    }

    #[test]
    fn query_keys_are_sorted() {
        let cases = [
            ("https://google.com/?foo=1", "https://google.com/?foo=1"),
            ("https://google.com/?foo=1&bar=2", "https://google.com/?bar=2&foo=1"),
            ("https://google.com/?bar=2&foo=1", "https://google.com/?bar=2&foo=1"),
            ("https://google.com/?foo=1&bar=2&", "https://google.com/?bar=2&foo=1"),
            ("https://google.com/?foo=1&&bar=2", "https://google.com/?bar=2&foo=1"),
            (
                "https://google.com/?foo=1&bar=2&baz=3",
                "https://google.com/?bar=2&baz=3&foo=1",
            ),
        ];
        for (original, normalized) in cases {
            assert_eq!(norm(original), normalized, "{original}");
        }
    }

    #[test]
    fn nested_keys_are_encoded() {
        assert_eq!(
            norm("https://google.com/?foo=1&bar=2&a[b][c]=4&a[b][d]=5"),
            "https://google.com/?a%5Bb%5D%5Bc%5D=4&a%5Bb%5D%5Bd%5D=5&bar=2&foo=1"
        );
    }

    #[test]
    fn array_parameters_keep_their_order() {
        assert_eq!(
            norm("https://google.com/?foo=1&bar=2&a[]=4&a[]=5&a[]=6"),
            "https://google.com/?a%5B%5D=4&a%5B%5D=5&a%5B%5D=6&bar=2&foo=1"
        );
        assert_eq!(
            norm("https://google.com/?a[]=6&b=0&a[]=4&a[]=5"),
            "https://google.com/?a%5B%5D=6&a%5B%5D=4&a%5B%5D=5&b=0"
        );
    }

    #[test]
    fn bare_keys_and_encoded_values() {
        assert_eq!(norm("https://x.com/?flag&a=1"), "https://x.com/?a=1&flag");
        assert_eq!(norm("https://x.com/?q=a+b"), "https://x.com/?q=a+b");
        assert_eq!(norm("https://x.com/?q=a%20b"), "https://x.com/?q=a+b");
        assert_eq!(norm("https://x.com/?q=a=b"), "https://x.com/?q=a%3Db");
    }

    #[test]
    fn scheme_host_and_port_are_canonical() {
        assert_eq!(
            norm("HTTPS://Google.COM:443/a/../b"),
            "https://google.com/b"
        );
        assert_eq!(norm("http://google.com:8080"), "http://google.com:8080/");
    }

    #[test]
    fn fragment_is_reattached() {
        assert_eq!(
            norm("https://x.com/page?b=2&a=1#section-2"),
            "https://x.com/page?a=1&b=2#section-2"
        );
        assert_eq!(norm("https://x.com/page#"), "https://x.com/page");
    }

    #[test]
    fn invalid_utf8_escapes_stay_distinct() {
        let ff = norm("https://x.com/?t=%FF");
        let fe = norm("https://x.com/?t=%FE");
        let replacement = norm("https://x.com/?t=%EF%BF%BD");

        assert_eq!(ff, "https://x.com/?t=%FF");
        assert_eq!(fe, "https://x.com/?t=%FE");
        assert_eq!(replacement, "https://x.com/?t=%EF%BF%BD");
        assert_eq!(norm("https://x.com/?t=%ff"), ff);
    }

    #[test]
    fn path_and_fragment_escapes_are_normalized() {
        assert_eq!(norm("https://x.com/#%7e"), norm("https://x.com/#~"));
        assert_eq!(norm("https://x.com/#%7e"), "https://x.com/#~");
        assert_eq!(norm("https://x.com/a%2fb#x%2fy"), "https://x.com/a%2Fb#x%2Fy");
        assert_eq!(norm("https://x.com/%7Euser/%41"), "https://x.com/~user/A");
        assert_eq!(norm("/%7euser#%7e"), "/~user#~");
        assert_eq!(norm("rootless%7e#top%2f"), "rootless~#top%2F");
        assert_eq!(norm("https://x.com/100%"), "https://x.com/100%");
    }

    #[test]
    fn relative_references() {
        assert_eq!(norm("/"), "/");
        assert_eq!(norm("/path?b=1&a=2"), "/path?a=2&b=1");
        assert_eq!(norm("/path/../other?"), "/other");
        assert_eq!(norm("//Example.com?b=1&a=2"), "//example.com/?a=2&b=1");
        assert_eq!(norm("not-a-url"), "not-a-url");
        assert_eq!(norm("?b=1&a=2"), "/?a=2&b=1");
        assert_eq!(norm(""), "");
    }

    #[test]
    fn normalization_is_idempotent() {
        let inputs = [
            "https://google.com",
            "https://google.com/?foo=1&bar=2&a[]=4&a[]=5&a[]=6",
            "https://x.com/?q=a%20b&flag&z=%E3%81%82",
            "https://x.com/?bad=%FF",
            "https://x.com/%7ea%2fb#%7e%2f",
            "HTTP://Example.com:80/a/./b/?x=1#frag ment",
            "/path?b=1&a=2#top",
            "//Example.com",
            "not-a-url?b&a",
            "?b=1",
            "mailto:someone@example.com?subject=hi",
        ];
        for input in inputs {
            let once = norm(input);
            assert_eq!(norm(&once), once, "{input}");
        }
    }

    #[test]
    fn malformed_urls_are_rejected() {
        for input in ["http://", "http://[bad", "https://x.com:99999/"] {
            let err = normalize(input).unwrap_err();
            assert!(
                matches!(err, ShortenError::MalformedUrl { ref url, .. } if url == input),
                "{input}: {err:?}"
            );
        }
    }
}
