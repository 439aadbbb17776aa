//! Policy construction options.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default fraction of the `Last-Modified` age used as heuristic freshness.
pub const DEFAULT_CACHE_HEURISTIC: f64 = 0.1;

/// Default minimum freshness granted to `immutable` responses.
pub const DEFAULT_IMMUTABLE_MIN_TTL: Duration = Duration::from_secs(24 * 3600);

/// Options controlling how a [`CachePolicy`](crate::CachePolicy) evaluates
/// a response.
///
/// Every field has a default, so hosts can embed this in their own
/// configuration and only spell out what they change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyOptions {
    /// Shared (proxy) cache semantics. Private caches ignore `private`
    /// and `s-maxage` and may store authenticated responses.
    pub shared: bool,
    /// Fraction of the time since `Last-Modified` used as freshness
    /// when the response gives no explicit expiration.
    pub cache_heuristic: f64,
    /// Minimum freshness for responses marked `immutable`.
    pub immutable_min_ttl: Duration,
    /// Ignore the `pre-check`/`post-check` boilerplate some servers send
    /// together with `no-cache`, `no-store` and `must-revalidate`.
    pub ignore_cargo_cult: bool,
    /// Use the response `Date` header instead of the local receipt time.
    pub trust_server_date: bool,
}

impl Default for PolicyOptions {
    fn default() -> Self {
        Self {
            shared: true,
            cache_heuristic: DEFAULT_CACHE_HEURISTIC,
            immutable_min_ttl: DEFAULT_IMMUTABLE_MIN_TTL,
            ignore_cargo_cult: false,
            trust_server_date: true,
        }
    }
}

impl PolicyOptions {
    /// Options for a shared (proxy) cache.
    pub fn shared() -> Self {
        Self::default()
    }

    /// Options for a private (single-user) cache.
    pub fn private() -> Self {
        Self {
            shared: false,
            ..Default::default()
        }
    }

    /// Set the heuristic freshness fraction, clamped to `[0, 1]`.
    pub fn with_cache_heuristic(mut self, fraction: f64) -> Self {
        self.cache_heuristic = if fraction.is_nan() {
            DEFAULT_CACHE_HEURISTIC
        } else {
            fraction.clamp(0.0, 1.0)
        };
        self
    }

    /// Set the minimum freshness for `immutable` responses.
    pub fn with_immutable_min_ttl(mut self, ttl: Duration) -> Self {
        self.immutable_min_ttl = ttl;
        self
    }

    /// Ignore `pre-check`/`post-check` boilerplate.
    pub fn ignore_cargo_cult(mut self) -> Self {
        self.ignore_cargo_cult = true;
        self
    }

    /// Set whether the response `Date` header is trusted.
    pub fn with_trust_server_date(mut self, trust: bool) -> Self {
        self.trust_server_date = trust;
        self
    }
}
