use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use std::fmt::Display;

/// The namespace used when the caller does not ask for one.
pub const DEFAULT_NAMESPACE: &str = "";

/// Deduplication key of a `(namespace, normalized URL)` pair.
///
/// The store keeps a unique index on this value, which is what turns
/// "create" into "create or find".
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps a normalized URL and a namespace to a [`Fingerprint`].
///
/// Must be deterministic. Different `(namespace, url)` pairs should map to
/// different fingerprints with overwhelming probability.
pub trait Fingerprinter: Send + Sync + 'static {
    fn fingerprint(&self, normalized_url: &str, namespace: &str) -> Fingerprint;
}

impl<F> Fingerprinter for F
where
    F: Fn(&str, &str) -> Fingerprint + Send + Sync + 'static,
{
    fn fingerprint(&self, normalized_url: &str, namespace: &str) -> Fingerprint {
        self(normalized_url, namespace)
    }
}

/// Lowercase hex SHA-512 of `namespace + normalized_url` (128 characters).
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha512Fingerprinter;

impl Sha512Fingerprinter {
    /// Width of the produced fingerprint in characters.
    pub const WIDTH: usize = 128;
}

impl Fingerprinter for Sha512Fingerprinter {
    fn fingerprint(&self, normalized_url: &str, namespace: &str) -> Fingerprint {
        let mut hasher = Sha512::new();
        hasher.update(namespace.as_bytes());
        hasher.update(normalized_url.as_bytes());
        Fingerprint(hex::encode(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha512(url: &str) -> String {
        Sha512Fingerprinter
            .fingerprint(url, DEFAULT_NAMESPACE)
            .to_string()
    }

    #[test]
    fn known_digests() {
        assert_eq!(
            sha512("https://google.com/"),
            "b5bac6dda08881f53df1535ce71d209e2fcc83cd0a98034116abee9da5ed87969a72811f2b9ec273dbeaa08f29c43ae7be290e67a47bc43ccb88557cd77f2061"
        );
        assert_eq!(
            sha512("https://google.com/?bar=2&foo=1"),
            "220c365881bac0d4cbe8bea7e705c56c29a32d2781e8b6268b783c4d112a4cb3a1cfa7ef24687a64b9aa40e483807c06e116315e11031d4b10aa3e572a9313d8"
        );
    }

    #[test]
    fn digest_width_is_fixed() {
        for url in ["/", "https://google.com/foo", &"x".repeat(10_000)] {
            assert_eq!(sha512(url).len(), Sha512Fingerprinter::WIDTH);
        }
    }

    #[test]
    fn namespace_is_a_prefix_of_the_hashed_input() {
        let with_namespace = Sha512Fingerprinter.fingerprint("https://google.com/", "a");
        let concatenated = Sha512Fingerprinter.fingerprint("ahttps://google.com/", "");
        assert_eq!(with_namespace, concatenated);

        let other = Sha512Fingerprinter.fingerprint("https://google.com/", "b");
        assert_ne!(with_namespace, other);
    }

    #[test]
    fn closures_are_fingerprinters() {
        let plain = |url: &str, ns: &str| Fingerprint::new(format!("{ns}|{url}"));
        assert_eq!(plain.fingerprint("/x", "n").as_str(), "n|/x");
    }
}
