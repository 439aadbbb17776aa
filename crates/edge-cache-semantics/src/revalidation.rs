//! Conditional requests and merging of validation responses (RFC 7234 §4.3).

use http::Method;
use tracing::debug;

use crate::error::{PolicyError, Result};
use crate::forward::strip_hop_by_hop;
use crate::headers::{header_names, Headers};
use crate::policy::CachePolicy;
use crate::view::{CacheResponse, RequestView, ResponseView};

/// Stored headers a `304 Not Modified` must not overwrite: they describe
/// the stored body, not the (empty) validation response.
const EXCLUDED_FROM_REVALIDATION_UPDATE: &[&str] = &[
    "content-length",
    "content-encoding",
    "transfer-encoding",
    "content-range",
];

/// Origin failures that let a `stale-if-error` response stand in.
const ERROR_STATUSES: &[u16] = &[500, 502, 503, 504];

/// Outcome of [`CachePolicy::revalidated_policy`].
#[derive(Debug, Clone)]
pub struct Revalidation {
    /// Policy to use from now on.
    pub policy: CachePolicy,
    /// The origin sent a new body; the stored one must be replaced.
    pub modified: bool,
    /// The validation response confirmed the stored response.
    pub matches: bool,
}

fn is_weak(etag: &str) -> bool {
    etag.trim_start().starts_with("W/")
}

fn strip_weak(etag: &str) -> &str {
    etag.trim_start().strip_prefix("W/").unwrap_or(etag)
}

impl CachePolicy {
    /// Headers for a conditional request revalidating the stored response.
    ///
    /// Starts from `incoming`'s headers and adds `If-None-Match` /
    /// `If-Modified-Since` from the stored validators. Weak validators are
    /// left out where they are not allowed.
    pub fn revalidation_headers<Req>(&self, incoming: &Req) -> Result<Headers>
    where
        Req: RequestView + ?Sized,
    {
        let incoming_headers = incoming
            .headers()
            .ok_or_else(PolicyError::missing_request_headers)?;
        let mut headers = strip_hop_by_hop(&incoming_headers);
        headers.remove(header_names::IF_RANGE);

        if !self.matches_request(incoming, &incoming_headers, true) || !self.storable() {
            // Validators would be checked against a different resource.
            headers.remove(header_names::IF_NONE_MATCH);
            headers.remove(header_names::IF_MODIFIED_SINCE);
            return Ok(headers);
        }

        if let Some(etag) = self.res_headers.get(header_names::ETAG) {
            headers.append(header_names::IF_NONE_MATCH, etag);
        }

        let forbids_weak_validators = headers.contains(header_names::ACCEPT_RANGES)
            || headers.contains(header_names::IF_MATCH)
            || headers.contains(header_names::IF_UNMODIFIED_SINCE)
            || self.method != Method::GET;

        if forbids_weak_validators {
            headers.remove(header_names::IF_MODIFIED_SINCE);

            let strong_etags = headers.get(header_names::IF_NONE_MATCH).map(|value| {
                value
                    .split(',')
                    .filter(|etag| !is_weak(etag))
                    .collect::<Vec<_>>()
                    .join(",")
                    .trim()
                    .to_string()
            });
            match strong_etags {
                Some(etags) if !etags.is_empty() => {
                    headers.insert(header_names::IF_NONE_MATCH, etags);
                }
                Some(_) => {
                    headers.remove(header_names::IF_NONE_MATCH);
                }
                None => {}
            }
        } else if let Some(last_modified) = self.res_headers.get(header_names::LAST_MODIFIED) {
            if !headers.contains(header_names::IF_MODIFIED_SINCE) {
                headers.insert(header_names::IF_MODIFIED_SINCE, last_modified);
            }
        }

        Ok(headers)
    }

    /// Combine the stored response with the origin's answer to a
    /// conditional request.
    ///
    /// `response` is `None` when the origin could not be reached. If the
    /// stored response is still inside its `stale-if-error` window and the
    /// origin failed, this policy is kept as-is. A matching `304` yields a
    /// policy over the stored response with refreshed headers; anything
    /// else yields a policy for the new response.
    pub fn revalidated_policy<Req, Res>(
        &self,
        request: &Req,
        response: Option<&Res>,
    ) -> Result<Revalidation>
    where
        Req: RequestView + ?Sized,
        Res: ResponseView + ?Sized,
    {
        if request.headers().is_none() {
            return Err(PolicyError::missing_request_headers());
        }

        let origin_failed = response.map_or(true, |res| ERROR_STATUSES.contains(&res.status()));
        if origin_failed && self.use_stale_if_error_at(self.now()) {
            debug!("origin failed, keeping stale-if-error response");
            return Ok(Revalidation {
                policy: self.clone(),
                modified: false,
                matches: false,
            });
        }

        let response = response.ok_or_else(PolicyError::missing_response_headers)?;
        let response_headers = response
            .headers()
            .ok_or_else(PolicyError::missing_response_headers)?;
        let status = response.status();

        let old_etag = self.res_headers.get(header_names::ETAG);
        let old_last_modified = self.res_headers.get(header_names::LAST_MODIFIED);
        let new_etag = response_headers.get(header_names::ETAG);
        let new_last_modified = response_headers.get(header_names::LAST_MODIFIED);

        let matches = if status != 304 {
            false
        } else if let Some(new_etag) = new_etag.filter(|etag| !is_weak(etag)) {
            old_etag.is_some_and(|old| strip_weak(old) == new_etag)
        } else if let (Some(old), Some(new)) = (old_etag, new_etag) {
            strip_weak(old) == strip_weak(new)
        } else if let Some(old) = old_last_modified {
            new_last_modified == Some(old)
        } else {
            // Without any validator a 304 can only refer to what we have.
            old_etag.is_none()
                && old_last_modified.is_none()
                && new_etag.is_none()
                && new_last_modified.is_none()
        };

        if !matches {
            let modified = status != 304;
            debug!(status, modified, "validation response replaces stored response");
            let policy = Self::with_clock(request, response, self.options(), self.clock.clone())?;
            return Ok(Revalidation {
                policy,
                modified,
                matches: false,
            });
        }

        let mut merged = Headers::new();
        for (name, old_value) in self.res_headers.iter() {
            let value = match response_headers.get(name) {
                Some(new_value) if !EXCLUDED_FROM_REVALIDATION_UPDATE.contains(&name) => new_value,
                _ => old_value,
            };
            merged.insert(name, value);
        }

        let refreshed = CacheResponse {
            status: self.status,
            headers: Some(merged),
        };
        let policy = Self::with_clock(request, &refreshed, self.options(), self.clock.clone())?;
        debug!(status = self.status, "stored response revalidated");

        Ok(Revalidation {
            policy,
            modified: false,
            matches: true,
        })
    }
}
