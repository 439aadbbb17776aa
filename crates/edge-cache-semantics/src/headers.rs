//! Case-insensitive header collection shared by request and response views.

use http::header::{HeaderMap, HeaderName, HeaderValue};
use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, Result};

/// Lower-cased names of the headers the policy engine reads or writes.
pub mod header_names {
    /// Age of a response in seconds (RFC 7234 §5.1).
    pub const AGE: &str = "age";
    /// Request credentials.
    pub const AUTHORIZATION: &str = "authorization";
    /// Range request support.
    pub const ACCEPT_RANGES: &str = "accept-ranges";
    /// Caching directives.
    pub const CACHE_CONTROL: &str = "cache-control";
    /// Connection-specific header names.
    pub const CONNECTION: &str = "connection";
    /// Body encoding.
    pub const CONTENT_ENCODING: &str = "content-encoding";
    /// Body length in bytes.
    pub const CONTENT_LENGTH: &str = "content-length";
    /// Range carried by a partial body.
    pub const CONTENT_RANGE: &str = "content-range";
    /// Origination time of the message.
    pub const DATE: &str = "date";
    /// Entity tag validator.
    pub const ETAG: &str = "etag";
    /// Absolute expiry time.
    pub const EXPIRES: &str = "expires";
    /// Request host and port.
    pub const HOST: &str = "host";
    /// Precondition on a current entity tag.
    pub const IF_MATCH: &str = "if-match";
    /// Date-based revalidation.
    pub const IF_MODIFIED_SINCE: &str = "if-modified-since";
    /// Entity-tag revalidation.
    pub const IF_NONE_MATCH: &str = "if-none-match";
    /// Conditional range request.
    pub const IF_RANGE: &str = "if-range";
    /// Precondition on last modification time.
    pub const IF_UNMODIFIED_SINCE: &str = "if-unmodified-since";
    /// Last modification time validator.
    pub const LAST_MODIFIED: &str = "last-modified";
    /// HTTP/1.0 `no-cache` fallback.
    pub const PRAGMA: &str = "pragma";
    /// Per-user state set by the origin.
    pub const SET_COOKIE: &str = "set-cookie";
    /// Hop-by-hop transfer coding.
    pub const TRANSFER_ENCODING: &str = "transfer-encoding";
    /// Request headers that select the response.
    pub const VARY: &str = "vary";
    /// Warning codes (RFC 7234 §5.5).
    pub const WARNING: &str = "warning";
}

/// Ordered header map with case-insensitive names.
///
/// Names are stored lower-cased; insertion order is preserved so that
/// emitted headers come out in the order they were received. Repeated
/// fields are folded into one comma-joined value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "IndexMap<String, String>", into = "IndexMap<String, String>")]
pub struct Headers {
    entries: IndexMap<String, String>,
}

impl Headers {
    /// Create an empty header collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a header value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(name.to_ascii_lowercase().as_str())
            .map(String::as_str)
    }

    /// Check whether a header is present.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name.to_ascii_lowercase().as_str())
    }

    /// Set a header, replacing any previous value.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) -> Option<String> {
        self.entries
            .insert(name.as_ref().to_ascii_lowercase(), value.into())
    }

    /// Add a value to a header, comma-joining with any existing value.
    pub fn append(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let value = value.into();
        match self.entries.entry(name.as_ref().to_ascii_lowercase()) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                existing.push_str(", ");
                existing.push_str(&value);
            }
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
        }
    }

    /// Remove a header, keeping the order of the others.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.shift_remove(name.to_ascii_lowercase().as_str())
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate over header names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no headers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert to an `http::HeaderMap`.
    pub fn to_header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::with_capacity(self.entries.len());
        for (name, value) in &self.entries {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| PolicyError::InvalidHeader(format!("{name}: {e}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| PolicyError::InvalidHeader(format!("{name}: {e}")))?;
            map.append(header_name, header_value);
        }
        Ok(map)
    }
}

impl From<IndexMap<String, String>> for Headers {
    fn from(map: IndexMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<Headers> for IndexMap<String, String> {
    fn from(headers: Headers) -> Self {
        headers.entries
    }
}

impl From<&HeaderMap> for Headers {
    fn from(map: &HeaderMap) -> Self {
        let mut headers = Headers::new();
        for (name, value) in map {
            headers.append(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
        }
        headers
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        headers.extend(iter);
        headers
    }
}

impl<K: AsRef<str>, V: Into<String>> Extend<(K, V)> for Headers {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.insert(name, value);
        }
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a String, &'a String);
    type IntoIter = indexmap::map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
