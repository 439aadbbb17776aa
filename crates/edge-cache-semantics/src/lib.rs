//! HTTP caching decisions for a single request/response exchange.
//!
//! This crate implements the RFC 7234 rules (plus `Pragma`,
//! `stale-if-error`, `stale-while-revalidate` and `immutable`) as a pure
//! decision engine. It does no I/O and stores nothing; the host supplies
//! requests and responses and keeps the resulting [`CachePolicy`] next to
//! the cached body.
//!
//! This crate provides:
//! - `CachePolicy` - Storability, freshness and reuse decisions for one response
//! - `RequestView` / `ResponseView` - What the engine reads from transport types
//! - `Headers` - Case-insensitive header collection
//! - `CacheControl` - Parsed `Cache-Control` directives
//! - `PolicyOptions` - Shared/private cache behavior and heuristics
//! - `CachePolicyObject` - Versioned persisted form
//!
//! # Example
//!
//! ```ignore
//! use edge_cache_semantics::{CachePolicy, CacheRequest, CacheResponse};
//!
//! let req = CacheRequest::get("/products/42").header("host", "shop.example");
//! let res = CacheResponse::ok().header("cache-control", "public, max-age=300");
//!
//! let policy = CachePolicy::new(&req, &res)?;
//! if policy.storable() {
//!     // store body + policy.to_json()? in the host's cache
//! }
//!
//! // Later, for a new request:
//! if policy.satisfies_without_revalidation(&req)? {
//!     let headers = policy.response_headers();
//!     // serve the stored body with `headers`
//! } else {
//!     let conditional = policy.revalidation_headers(&req)?;
//!     // send `conditional` to the origin, then:
//!     // let outcome = policy.revalidated_policy(&req, Some(&origin_response))?;
//! }
//! ```

mod clock;
mod directives;
mod error;
mod forward;
mod freshness;
mod headers;
mod options;
mod policy;
mod revalidation;
mod serialize;
mod view;

pub use clock::{format_http_date, Clock, ManualClock, SharedClock, SystemClock};
pub use directives::{CacheControl, Directive};
pub use error::{PolicyError, Result};
pub use forward::strip_hop_by_hop;
pub use headers::{header_names, Headers};
pub use options::{PolicyOptions, DEFAULT_CACHE_HEURISTIC, DEFAULT_IMMUTABLE_MIN_TTL};
pub use policy::CachePolicy;
pub use revalidation::Revalidation;
pub use serialize::{CachePolicyObject, SERIALIZATION_VERSION};
pub use view::{CacheRequest, CacheResponse, RequestView, ResponseView};

/// Re-exported so hosts can name request methods without depending on `http` directly.
pub use http::Method;
