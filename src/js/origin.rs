// Security origins attached to scripts and messages

use url::Url;
use std::fmt;

/// Identifies the security context a script or message came from
///
/// Two origins are equal when scheme, host and port match. The full URL the
/// origin was derived from is kept so relative worker URLs can be resolved
/// against it, but it does not take part in comparisons.
#[derive(Debug, Clone)]
pub struct SecurityOrigin {
    origin: String,
    full_url: Url,
}

impl SecurityOrigin {
    pub fn from_url(url: &str) -> Result<Self, url::ParseError> {
        Url::parse(url).map(Self::from_parsed)
    }

    pub fn from_parsed(url: Url) -> Self {
        Self {
            origin: url.origin().ascii_serialization(),
            full_url: url,
        }
    }

    /// Serialized origin, e.g. `https://example.com:8443`
    pub fn url(&self) -> &str {
        &self.origin
    }

    pub fn full_url(&self) -> &Url {
        &self.full_url
    }

    pub fn is_same_origin(&self, other: &SecurityOrigin) -> bool {
        self == other
    }

    /// Resolve a (possibly relative) URL against this origin's full URL
    pub fn resolve(&self, reference: &str) -> Result<Url, url::ParseError> {
        self.full_url.join(reference)
    }
}

impl PartialEq for SecurityOrigin {
    fn eq(&self, other: &Self) -> bool {
        self.origin == other.origin
    }
}

impl Eq for SecurityOrigin {}

impl fmt::Display for SecurityOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.origin)
    }
}
