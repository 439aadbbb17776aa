//! Headers for forwarding: hop-by-hop stripping and the cached response
//! headers sent to clients.

use crate::clock::format_http_date;
use crate::headers::{header_names, Headers};
use crate::policy::CachePolicy;

/// Headers that only apply to a single connection (RFC 7230 §6.1), plus
/// `date`, which is regenerated when a cached response is served.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "date",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Warning attached to heuristically fresh responses older than a day.
const HEURISTIC_EXPIRATION_WARNING: &str = "113 - \"rfc7234 5.5.4\"";

const ONE_DAY_SECS: f64 = 24.0 * 3600.0;

/// Copy `headers` without hop-by-hop headers, without any header the
/// `Connection` header names, and without 1xx warnings.
pub fn strip_hop_by_hop(headers: &Headers) -> Headers {
    let mut out: Headers = headers
        .iter()
        .filter(|(name, _)| !HOP_BY_HOP_HEADERS.contains(name))
        .collect();

    if let Some(connection) = headers.get(header_names::CONNECTION) {
        for token in connection.split(',') {
            out.remove(token.trim());
        }
    }

    if let Some(warning) = out.get(header_names::WARNING) {
        let kept: Vec<&str> = warning
            .split(',')
            .filter(|entry| !is_transient_warning(entry))
            .collect();
        if kept.is_empty() {
            out.remove(header_names::WARNING);
        } else {
            let joined = kept.join(",").trim().to_string();
            out.insert(header_names::WARNING, joined);
        }
    }

    out
}

/// 1xx warn-codes describe freshness and must be dropped once the
/// response is revalidated or forwarded (RFC 7234 §5.5).
fn is_transient_warning(entry: &str) -> bool {
    let code = entry.trim_start().as_bytes();
    code.len() >= 3 && code[0] == b'1' && code[1].is_ascii_digit() && code[2].is_ascii_digit()
}

impl CachePolicy {
    /// Headers to send with the cached response.
    ///
    /// Hop-by-hop headers are removed, `Age` and `Date` reflect the current
    /// time, and a `113` warning is added to heuristically fresh responses
    /// older than a day.
    pub fn response_headers(&self) -> Headers {
        let now = self.now();
        let mut headers = strip_hop_by_hop(&self.res_headers);
        // A clock stepping backwards must not produce a negative Age.
        let age = self.age_secs(now).max(0.0);

        if age > ONE_DAY_SECS && !self.has_explicit_expiration() && self.max_age_secs() > ONE_DAY_SECS
        {
            headers.append(header_names::WARNING, HEURISTIC_EXPIRATION_WARNING);
        }

        headers.insert(header_names::AGE, format!("{}", age.round()));
        headers.insert(header_names::DATE, format_http_date(now));
        headers
    }
}
