//! The cache policy: construction, storability and request matching.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use http::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::clock::{from_millis, whole_millis, SharedClock, SystemClock};
use crate::directives::{CacheControl, Directive};
use crate::error::{PolicyError, Result};
use crate::headers::{header_names, Headers};
use crate::options::PolicyOptions;
use crate::serialize::CachePolicyObject;
use crate::view::{RequestView, ResponseView};

/// Statuses whose semantics are understood well enough to store.
/// 206 is left out: partial content is not assembled here.
const UNDERSTOOD_STATUSES: &[u16] = &[
    200, 203, 204, 300, 301, 302, 303, 307, 308, 404, 405, 410, 414, 501,
];

/// Statuses that are cacheable without explicit freshness information.
const CACHEABLE_BY_DEFAULT: &[u16] = &[
    200, 203, 204, 206, 300, 301, 308, 404, 405, 410, 414, 501,
];

/// Directives dropped when `pre-check`/`post-check` boilerplate is ignored.
const CARGO_CULT_DIRECTIVES: &[&str] = &[
    "pre-check",
    "post-check",
    "no-cache",
    "no-store",
    "must-revalidate",
];

/// Caching decisions for one stored response.
///
/// Built from the request/response pair when the response arrives, or
/// restored from its persisted form. It is never modified afterwards;
/// revalidation produces a new policy.
///
/// Serializes through [`CachePolicyObject`]; a deserialized policy reads
/// the system clock.
#[derive(Clone, Serialize, Deserialize)]
#[serde(into = "CachePolicyObject", try_from = "CachePolicyObject")]
pub struct CachePolicy {
    pub(crate) response_time: SystemTime,
    pub(crate) is_shared: bool,
    pub(crate) cache_heuristic: f64,
    pub(crate) immutable_min_ttl: Duration,
    pub(crate) trust_server_date: bool,
    pub(crate) status: u16,
    pub(crate) res_headers: Headers,
    pub(crate) rescc: CacheControl,
    pub(crate) method: Method,
    pub(crate) url: Option<String>,
    pub(crate) host: Option<String>,
    pub(crate) no_authorization: bool,
    pub(crate) req_headers: Option<Headers>,
    pub(crate) reqcc: CacheControl,
    pub(crate) clock: SharedClock,
}

impl CachePolicy {
    /// Evaluate a response with default options (shared cache).
    pub fn new<Req, Res>(req: &Req, res: &Res) -> Result<Self>
    where
        Req: RequestView + ?Sized,
        Res: ResponseView + ?Sized,
    {
        Self::with_options(req, res, PolicyOptions::default())
    }

    /// Evaluate a response with the given options.
    pub fn with_options<Req, Res>(req: &Req, res: &Res, options: PolicyOptions) -> Result<Self>
    where
        Req: RequestView + ?Sized,
        Res: ResponseView + ?Sized,
    {
        Self::with_clock(req, res, options, Arc::new(SystemClock))
    }

    /// Evaluate a response, reading the current time from `clock`.
    pub fn with_clock<Req, Res>(
        req: &Req,
        res: &Res,
        options: PolicyOptions,
        clock: SharedClock,
    ) -> Result<Self>
    where
        Req: RequestView + ?Sized,
        Res: ResponseView + ?Sized,
    {
        let original_res_headers = res
            .headers()
            .ok_or_else(PolicyError::missing_response_headers)?;
        let req_headers = req
            .headers()
            .ok_or_else(PolicyError::missing_request_headers)?;

        let mut res_headers = original_res_headers.clone().into_owned();
        let mut rescc = CacheControl::parse(res_headers.get(header_names::CACHE_CONTROL));

        if options.ignore_cargo_cult && rescc.has("pre-check") && rescc.has("post-check") {
            for directive in CARGO_CULT_DIRECTIVES {
                rescc.remove(directive);
            }
            if rescc.is_empty() {
                res_headers.remove(header_names::CACHE_CONTROL);
            } else {
                res_headers.insert(header_names::CACHE_CONTROL, rescc.to_string());
            }
            res_headers.remove(header_names::EXPIRES);
            res_headers.remove(header_names::PRAGMA);
            debug!("ignored pre-check/post-check cache-control boilerplate");
        }

        if !original_res_headers.contains(header_names::CACHE_CONTROL)
            && original_res_headers
                .get(header_names::PRAGMA)
                .is_some_and(mentions_no_cache)
        {
            rescc.insert("no-cache", Directive::Flag);
        }

        let policy = Self {
            response_time: from_millis(whole_millis(clock.now())),
            is_shared: options.shared,
            cache_heuristic: options.cache_heuristic,
            immutable_min_ttl: options.immutable_min_ttl,
            trust_server_date: options.trust_server_date,
            status: res.status(),
            method: req.method(),
            url: req.url().map(|url| url.into_owned()),
            host: req_headers.get(header_names::HOST).map(str::to_string),
            no_authorization: req_headers
                .get(header_names::AUTHORIZATION)
                .map_or(true, str::is_empty),
            reqcc: CacheControl::parse(req_headers.get(header_names::CACHE_CONTROL)),
            req_headers: res_headers
                .contains(header_names::VARY)
                .then(|| req_headers.into_owned()),
            res_headers,
            rescc,
            clock,
        };

        debug!(
            status = policy.status,
            method = %policy.method,
            shared = policy.is_shared,
            storable = policy.storable(),
            "created cache policy"
        );

        Ok(policy)
    }

    /// Options this policy was evaluated with.
    pub fn options(&self) -> PolicyOptions {
        PolicyOptions {
            shared: self.is_shared,
            cache_heuristic: self.cache_heuristic,
            immutable_min_ttl: self.immutable_min_ttl,
            ignore_cargo_cult: false,
            trust_server_date: self.trust_server_date,
        }
    }

    /// When the response was received.
    pub fn response_time(&self) -> SystemTime {
        self.response_time
    }

    /// Stored response status.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Method of the request that produced the response.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Parsed response `Cache-Control`.
    pub fn response_cache_control(&self) -> &CacheControl {
        &self.rescc
    }

    /// Parsed request `Cache-Control`.
    pub fn request_cache_control(&self) -> &CacheControl {
        &self.reqcc
    }

    pub(crate) fn now(&self) -> SystemTime {
        self.clock.now()
    }

    /// Whether the response may be stored at all (RFC 7234 §3).
    pub fn storable(&self) -> bool {
        !self.reqcc.has("no-store")
            && (self.method == Method::GET
                || self.method == Method::HEAD
                || (self.method == Method::POST && self.has_explicit_expiration()))
            && UNDERSTOOD_STATUSES.contains(&self.status)
            && !self.rescc.has("no-store")
            && (!self.is_shared || !self.rescc.has("private"))
            && (!self.is_shared || self.no_authorization || self.allows_storing_authenticated())
            && (self.res_headers.contains(header_names::EXPIRES)
                || self.rescc.has("max-age")
                || (self.is_shared && self.rescc.has("s-maxage"))
                || self.rescc.has("public")
                || CACHEABLE_BY_DEFAULT.contains(&self.status))
    }

    pub(crate) fn has_explicit_expiration(&self) -> bool {
        (self.is_shared && self.rescc.has("s-maxage"))
            || self.rescc.has("max-age")
            || self.res_headers.contains(header_names::EXPIRES)
    }

    /// RFC 7234 §3.2: directives that let a shared cache store a response
    /// to an authenticated request.
    fn allows_storing_authenticated(&self) -> bool {
        self.rescc.has("must-revalidate") || self.rescc.has("public") || self.rescc.has("s-maxage")
    }

    /// Whether the stored response can answer `req` without contacting
    /// the origin.
    pub fn satisfies_without_revalidation<Req>(&self, req: &Req) -> Result<bool>
    where
        Req: RequestView + ?Sized,
    {
        let headers = req.headers().ok_or_else(PolicyError::missing_request_headers)?;
        let now = self.now();
        let request_cc = CacheControl::parse(headers.get(header_names::CACHE_CONTROL));

        if request_cc.has("no-cache")
            || headers.get(header_names::PRAGMA).is_some_and(mentions_no_cache)
        {
            trace!("request forbids cached response");
            return Ok(false);
        }

        let age = self.age_secs(now);

        if let Some(max_age) = request_cc.seconds("max-age") {
            if age > max_age {
                trace!(age, max_age, "response older than request max-age");
                return Ok(false);
            }
        }

        if let Some(min_fresh) = request_cc.seconds("min-fresh") {
            if self.time_to_live_millis(now) < 1000.0 * min_fresh {
                trace!(min_fresh, "response not fresh enough for request min-fresh");
                return Ok(false);
            }
        }

        let max_age = self.max_age_secs();
        if max_age <= age {
            let allows_stale = !self.rescc.has("must-revalidate")
                && match request_cc.get("max-stale") {
                    Some(Directive::Flag) => true,
                    Some(bound) => bound.seconds() > age - max_age,
                    None => false,
                };
            if !allows_stale {
                trace!(age, max_age, "stale response not acceptable");
                return Ok(false);
            }
        }

        Ok(self.matches_request(req, &headers, false))
    }

    /// Whether `req` asks for the same resource as the stored request:
    /// URL, `Host`, method and the `Vary`-nominated headers.
    ///
    /// With `allow_head_method`, a HEAD request matches a stored GET.
    pub fn request_matches<Req>(&self, req: &Req, allow_head_method: bool) -> Result<bool>
    where
        Req: RequestView + ?Sized,
    {
        let headers = req.headers().ok_or_else(PolicyError::missing_request_headers)?;
        Ok(self.matches_request(req, &headers, allow_head_method))
    }

    pub(crate) fn matches_request<Req>(
        &self,
        req: &Req,
        headers: &Headers,
        allow_head_method: bool,
    ) -> bool
    where
        Req: RequestView + ?Sized,
    {
        let url_matches = match &self.url {
            Some(url) => req.url().as_deref() == Some(url.as_str()),
            None => true,
        };
        let method = req.method();

        url_matches
            && self.host.as_deref() == headers.get(header_names::HOST)
            && (self.method == method || (allow_head_method && method == Method::HEAD))
            && self.vary_headers_match(headers)
    }

    /// Whether every header named by the stored `Vary` has the same value
    /// in `req` as in the original request.
    pub fn vary_matches<Req>(&self, req: &Req) -> Result<bool>
    where
        Req: RequestView + ?Sized,
    {
        let headers = req.headers().ok_or_else(PolicyError::missing_request_headers)?;
        Ok(self.vary_headers_match(&headers))
    }

    fn vary_headers_match(&self, headers: &Headers) -> bool {
        let Some(vary) = self.res_headers.get(header_names::VARY) else {
            return true;
        };
        if self.varies_on_everything() {
            return false;
        }
        // Restored state without the original request headers cannot be compared.
        let Some(stored) = &self.req_headers else {
            return false;
        };

        vary_fields(vary).all(|name| headers.get(&name) == stored.get(&name))
    }

    pub(crate) fn varies_on_everything(&self) -> bool {
        self.res_headers
            .get(header_names::VARY)
            .is_some_and(|vary| vary_fields(vary).any(|name| name == "*"))
    }
}

impl fmt::Debug for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachePolicy")
            .field("response_time", &self.response_time)
            .field("is_shared", &self.is_shared)
            .field("status", &self.status)
            .field("method", &self.method)
            .field("url", &self.url)
            .field("host", &self.host)
            .field("rescc", &self.rescc)
            .field("reqcc", &self.reqcc)
            .finish_non_exhaustive()
    }
}

fn vary_fields(vary: &str) -> impl Iterator<Item = String> + '_ {
    vary.split(',')
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
}

fn mentions_no_cache(pragma: &str) -> bool {
    pragma.to_ascii_lowercase().contains("no-cache")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::view::{CacheRequest, CacheResponse};

    fn req() -> CacheRequest {
        CacheRequest::get("/").header("host", "www.example.com")
    }

    fn res(cache_control: &str) -> CacheResponse {
        CacheResponse::ok().header("cache-control", cache_control)
    }

    fn policy_at(
        req: &CacheRequest,
        res: &CacheResponse,
        options: PolicyOptions,
    ) -> (CachePolicy, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_secs(1_700_000_000));
        let policy = CachePolicy::with_clock(req, res, options, clock.clone()).unwrap();
        (policy, clock)
    }

    #[test]
    fn test_missing_response_headers() {
        let err = CachePolicy::new(&req(), &CacheResponse::headerless(200)).unwrap_err();
        assert!(matches!(err, PolicyError::MissingHeaders { what: "response" }));
    }

    #[test]
    fn test_missing_request_headers() {
        let err = CachePolicy::new(&CacheRequest::headerless(), &res("max-age=1")).unwrap_err();
        assert!(matches!(err, PolicyError::MissingHeaders { what: "request" }));
    }

    #[test]
    fn test_request_headers_kept_only_with_vary() {
        let policy = CachePolicy::new(&req(), &res("max-age=60")).unwrap();
        assert!(policy.req_headers.is_none());

        let varied = res("max-age=60").header("vary", "accept");
        let policy = CachePolicy::new(&req(), &varied).unwrap();
        assert!(policy.req_headers.is_some());
    }

    #[test]
    fn test_no_store() {
        let policy = CachePolicy::new(&req(), &res("no-store, public, max-age=1")).unwrap();
        assert!(!policy.storable());

        let no_store_req = req().header("cache-control", "no-store");
        let policy = CachePolicy::new(&no_store_req, &res("public, max-age=1")).unwrap();
        assert!(!policy.storable());
    }

    #[test]
    fn test_private_only_in_private_cache() {
        let response = res("private, max-age=60");
        let shared = CachePolicy::new(&req(), &response).unwrap();
        assert!(!shared.storable());

        let private = CachePolicy::with_options(&req(), &response, PolicyOptions::private()).unwrap();
        assert!(private.storable());
    }

    #[test]
    fn test_post_needs_explicit_expiration() {
        let post = req().with_method(Method::POST);
        assert!(CachePolicy::new(&post, &res("max-age=100")).unwrap().storable());
        assert!(!CachePolicy::new(&post, &res("public")).unwrap().storable());

        let expires = CacheResponse::ok().header("expires", "Sun, 06 Nov 2094 08:49:37 GMT");
        assert!(CachePolicy::new(&post, &expires).unwrap().storable());

        let s_maxage = res("s-maxage=10");
        assert!(CachePolicy::new(&post, &s_maxage).unwrap().storable());
        let private = CachePolicy::with_options(&post, &s_maxage, PolicyOptions::private()).unwrap();
        assert!(!private.storable());
    }

    #[test]
    fn test_other_methods_not_storable() {
        let put = req().with_method(Method::PUT);
        assert!(!CachePolicy::new(&put, &res("max-age=100")).unwrap().storable());
        let head = req().with_method(Method::HEAD);
        assert!(CachePolicy::new(&head, &res("max-age=100")).unwrap().storable());
    }

    #[test]
    fn test_status_sets() {
        let partial = CacheResponse::new(206).header("cache-control", "max-age=60");
        assert!(!CachePolicy::new(&req(), &partial).unwrap().storable());

        let redirect = CacheResponse::new(302);
        assert!(!CachePolicy::new(&req(), &redirect).unwrap().storable());
        let redirect = CacheResponse::new(302).header("cache-control", "max-age=60");
        assert!(CachePolicy::new(&req(), &redirect).unwrap().storable());

        assert!(CachePolicy::new(&req(), &CacheResponse::new(404)).unwrap().storable());
        assert!(!CachePolicy::new(&req(), &CacheResponse::new(500)).unwrap().storable());
    }

    #[test]
    fn test_authorization_in_shared_cache() {
        let authed = req().header("authorization", "Bearer abc");
        assert!(!CachePolicy::new(&authed, &res("max-age=60")).unwrap().storable());
        assert!(CachePolicy::new(&authed, &res("public, max-age=60")).unwrap().storable());
        assert!(CachePolicy::new(&authed, &res("must-revalidate, max-age=60")).unwrap().storable());
        assert!(CachePolicy::new(&authed, &res("s-maxage=60")).unwrap().storable());

        let private =
            CachePolicy::with_options(&authed, &res("max-age=60"), PolicyOptions::private()).unwrap();
        assert!(private.storable());
    }

    #[test]
    fn test_pragma_no_cache_without_cache_control() {
        let response = CacheResponse::ok().header("pragma", "no-cache");
        let policy = CachePolicy::new(&req(), &response).unwrap();
        assert!(policy.response_cache_control().has("no-cache"));

        let response = res("max-age=60").header("pragma", "no-cache");
        let policy = CachePolicy::new(&req(), &response).unwrap();
        assert!(!policy.response_cache_control().has("no-cache"));
    }

    #[test]
    fn test_cargo_cult_stripped_only_when_enabled() {
        let response = res("pre-check=0, post-check=0, no-store, no-cache, max-age=100")
            .header("expires", "Thu, 01 Jan 1970 00:00:00 GMT")
            .header("pragma", "no-cache");

        let strict = CachePolicy::new(&req(), &response).unwrap();
        assert!(!strict.storable());

        let lenient = CachePolicy::with_options(
            &req(),
            &response,
            PolicyOptions::default().ignore_cargo_cult(),
        )
        .unwrap();
        assert!(lenient.storable());
        assert_eq!(lenient.res_headers.get("cache-control"), Some("max-age=100"));
        assert!(!lenient.res_headers.contains("expires"));
        assert!(!lenient.res_headers.contains("pragma"));

        // Caller's headers untouched.
        let original = response.headers.as_ref().unwrap();
        assert!(original.contains("expires"));
        assert!(original.get("cache-control").unwrap().contains("pre-check"));
    }

    #[test]
    fn test_cargo_cult_needs_both_directives() {
        let response = res("pre-check=0, no-store");
        let policy = CachePolicy::with_options(
            &req(),
            &response,
            PolicyOptions::default().ignore_cargo_cult(),
        )
        .unwrap();
        assert!(!policy.storable());
    }

    #[test]
    fn test_cargo_cult_empty_cache_control_removed() {
        let response = res("pre-check=0, post-check=0, no-cache");
        let policy = CachePolicy::with_options(
            &req(),
            &response,
            PolicyOptions::default().ignore_cargo_cult(),
        )
        .unwrap();
        assert!(!policy.res_headers.contains("cache-control"));
        assert!(policy.response_cache_control().is_empty());
    }

    #[test]
    fn test_request_matches() {
        let (policy, _) = policy_at(&req(), &res("max-age=60"), PolicyOptions::default());

        assert!(policy.request_matches(&req(), false).unwrap());
        assert!(!policy.request_matches(&CacheRequest::get("/other").header("host", "www.example.com"), false).unwrap());
        assert!(!policy.request_matches(&CacheRequest::get("/").header("host", "other.example"), false).unwrap());

        let head = req().with_method(Method::HEAD);
        assert!(!policy.request_matches(&head, false).unwrap());
        assert!(policy.request_matches(&head, true).unwrap());
    }

    #[test]
    fn test_request_matches_without_stored_url() {
        let stored = CacheRequest::default().header("host", "a");
        let (policy, _) = policy_at(&stored, &res("max-age=60"), PolicyOptions::default());
        assert!(policy.request_matches(&CacheRequest::get("/anything").header("host", "a"), false).unwrap());
    }

    #[test]
    fn test_vary_matches() {
        let stored = req().header("accept-language", "en");
        let response = res("max-age=60").header("vary", "Accept-Language");
        let (policy, _) = policy_at(&stored, &response, PolicyOptions::default());

        assert!(policy.vary_matches(&req().header("Accept-Language", "en")).unwrap());
        assert!(!policy.vary_matches(&req().header("accept-language", "EN")).unwrap());
        assert!(!policy.vary_matches(&req()).unwrap());
    }

    #[test]
    fn test_vary_absent_on_both_sides_matches() {
        let response = res("max-age=60").header("vary", "accept-encoding, , user-agent");
        let (policy, _) = policy_at(&req(), &response, PolicyOptions::default());
        assert!(policy.vary_matches(&req()).unwrap());
        assert!(!policy.vary_matches(&req().header("user-agent", "curl")).unwrap());
    }

    #[test]
    fn test_vary_star() {
        let response = res("max-age=60").header("vary", "*");
        let (policy, _) = policy_at(&req(), &response, PolicyOptions::default());
        assert!(!policy.vary_matches(&req()).unwrap());
        assert!(!policy.satisfies_without_revalidation(&req()).unwrap());
    }

    #[test]
    fn test_satisfies_fresh() {
        let (policy, clock) = policy_at(&req(), &res("max-age=60"), PolicyOptions::default());
        assert!(policy.satisfies_without_revalidation(&req()).unwrap());

        clock.advance(Duration::from_secs(61));
        assert!(!policy.satisfies_without_revalidation(&req()).unwrap());
    }

    #[test]
    fn test_satisfies_request_no_cache() {
        let (policy, _) = policy_at(&req(), &res("max-age=60"), PolicyOptions::default());
        assert!(!policy.satisfies_without_revalidation(&req().header("cache-control", "no-cache")).unwrap());
        assert!(!policy.satisfies_without_revalidation(&req().header("pragma", "no-cache")).unwrap());
    }

    #[test]
    fn test_satisfies_request_max_age() {
        let (policy, clock) = policy_at(&req(), &res("max-age=600"), PolicyOptions::default());
        clock.advance(Duration::from_secs(30));
        assert!(policy.satisfies_without_revalidation(&req().header("cache-control", "max-age=60")).unwrap());
        assert!(!policy.satisfies_without_revalidation(&req().header("cache-control", "max-age=10")).unwrap());
    }

    #[test]
    fn test_satisfies_request_min_fresh() {
        let (policy, _) = policy_at(&req(), &res("max-age=100"), PolicyOptions::default());
        assert!(policy.satisfies_without_revalidation(&req().header("cache-control", "min-fresh=50")).unwrap());
        assert!(!policy.satisfies_without_revalidation(&req().header("cache-control", "min-fresh=150")).unwrap());
    }

    #[test]
    fn test_satisfies_max_stale() {
        let response = res("max-age=120").header("age", "360");
        let (policy, _) = policy_at(&req(), &response, PolicyOptions::private());
        assert!(policy.stale());
        assert!(!policy.satisfies_without_revalidation(&req()).unwrap());
        assert!(policy.satisfies_without_revalidation(&req().header("cache-control", "max-stale")).unwrap());
        assert!(policy.satisfies_without_revalidation(&req().header("cache-control", "max-stale=241")).unwrap());
        assert!(!policy.satisfies_without_revalidation(&req().header("cache-control", "max-stale=240")).unwrap());
    }

    #[test]
    fn test_request_cache_control_kept() {
        let stored = req().header("cache-control", "Max-Stale, max-age=10");
        let (policy, _) = policy_at(&stored, &res("max-age=60"), PolicyOptions::default());
        let reqcc = policy.request_cache_control();
        assert!(reqcc.get("max-stale").is_some_and(Directive::is_flag));
        assert_eq!(reqcc.seconds("max-age"), Some(10.0));
        assert!(policy.response_cache_control().has("max-age"));

        let (policy, _) = policy_at(&req(), &res("max-age=60"), PolicyOptions::default());
        assert!(policy.request_cache_control().is_empty());
    }

    #[test]
    fn test_satisfies_missing_headers() {
        let (policy, _) = policy_at(&req(), &res("max-age=60"), PolicyOptions::default());
        assert!(matches!(
            policy.satisfies_without_revalidation(&CacheRequest::headerless()),
            Err(PolicyError::MissingHeaders { .. })
        ));
    }

    #[test]
    fn test_options_round_trip() {
        let options = PolicyOptions::private().with_cache_heuristic(0.3);
        let (policy, _) = policy_at(&req(), &res("max-age=60"), options);
        assert_eq!(policy.options(), options);
    }
}
