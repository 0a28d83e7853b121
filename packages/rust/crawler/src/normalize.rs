//! URL canonicalization.
//!
//! Every URL the crawler stores or compares is a [`CanonicalUrl`]: absolute,
//! `http`/`https`, with the fragment removed. Query strings are kept.

use std::fmt;

use serde::Serialize;
use url::Url;

/// Why a discovered link was not turned into a [`CanonicalUrl`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    /// The reference could not be resolved to an absolute URL.
    #[error("malformed link '{href}': {source}")]
    Malformed {
        href: String,
        source: url::ParseError,
    },

    /// The reference resolved to a scheme the crawler cannot fetch.
    #[error("unsupported scheme '{scheme}' in link '{href}'")]
    UnsupportedScheme { href: String, scheme: String },
}

/// An absolute, fragment-free `http`/`https` URL.
///
/// Two canonical URLs are equal iff their serialized forms are byte-equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CanonicalUrl(Url);

impl CanonicalUrl {
    /// Canonicalize an already-absolute URL string (used for the seed).
    pub fn parse(raw: &str) -> Result<Self, LinkError> {
        let url = Url::parse(raw.trim()).map_err(|source| LinkError::Malformed {
            href: raw.to_string(),
            source,
        })?;
        Self::from_url(url, raw)
    }

    /// Resolve `href` against `base` and canonicalize the result.
    ///
    /// Handles absolute references, scheme-relative (`//host/x`), root-relative
    /// and dot-segment paths per WHATWG URL resolution.
    pub fn resolve(base: &CanonicalUrl, href: &str) -> Result<Self, LinkError> {
        let url = base
            .0
            .join(href.trim())
            .map_err(|source| LinkError::Malformed {
                href: href.to_string(),
                source,
            })?;
        Self::from_url(url, href)
    }

    fn from_url(mut url: Url, href: &str) -> Result<Self, LinkError> {
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(LinkError::UnsupportedScheme {
                    href: href.to_string(),
                    scheme: other.to_string(),
                });
            }
        }

        // http(s) URLs always parse with a non-empty host; a missing one is a
        // parse error, reported as `Malformed` above.
        debug_assert!(url.host_str().is_some_and(|h| !h.is_empty()));

        url.set_fragment(None);
        Ok(Self(url))
    }

    /// Host used for same-site admission (lowercased by the parser, no port).
    pub fn host(&self) -> &str {
        // Guaranteed present by construction.
        self.0.host_str().unwrap_or_default()
    }

    /// The serialized canonical form.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Borrow the underlying [`Url`].
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Unwrap into the underlying [`Url`].
    pub fn into_url(self) -> Url {
        self.0
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}
