//! Freshness lifetime and age calculation (RFC 7234 §4.2).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::trace;

use crate::clock::{parse_http_date, secs_to_duration, to_millis};
use crate::directives::parse_leading_int;
use crate::headers::header_names;
use crate::policy::CachePolicy;

/// Server dates further than this from the local receipt time are ignored.
const MAX_CLOCK_DRIFT_MS: f64 = 8.0 * 3600.0 * 1000.0;

impl CachePolicy {
    /// When the response was generated.
    ///
    /// The response `Date` header when it is trusted, parsable and within
    /// eight hours of the local receipt time; the receipt time otherwise.
    pub fn date(&self) -> SystemTime {
        let millis = self.date_millis();
        if millis >= 0.0 {
            UNIX_EPOCH + secs_to_duration(millis / 1000.0)
        } else {
            UNIX_EPOCH - secs_to_duration(-millis / 1000.0)
        }
    }

    pub(crate) fn date_millis(&self) -> f64 {
        let response_time = to_millis(self.response_time);
        if !self.trust_server_date {
            return response_time;
        }

        match self.res_headers.get(header_names::DATE).and_then(parse_http_date) {
            Some(server_date) if (response_time - server_date).abs() < MAX_CLOCK_DRIFT_MS => {
                server_date
            }
            Some(server_date) => {
                trace!(server_date, response_time, "server date rejected for clock drift");
                response_time
            }
            None => response_time,
        }
    }

    /// Current age of the response: the larger of the apparent age and the
    /// `Age` header, plus the time it has been resident here.
    pub fn age(&self) -> Duration {
        secs_to_duration(self.age_secs(self.now()))
    }

    pub(crate) fn age_secs(&self, now: SystemTime) -> f64 {
        let response_time = to_millis(self.response_time);
        let mut age = ((response_time - self.date_millis()) / 1000.0).max(0.0);

        if let Some(age_header) = self.res_headers.get(header_names::AGE) {
            let age_value = parse_leading_int(age_header);
            if age_value > age {
                age = age_value;
            }
        }

        let resident_time = (to_millis(now) - response_time) / 1000.0;
        age + resident_time
    }

    /// Freshness lifetime: how long after generation the response may be
    /// served without revalidation.
    pub fn max_age(&self) -> Duration {
        secs_to_duration(self.max_age_secs())
    }

    pub(crate) fn max_age_secs(&self) -> f64 {
        if !self.storable() || self.rescc.has("no-cache") {
            return 0.0;
        }

        // Shared caches must not hand one user's cookie to another unless
        // the response is explicitly public.
        if self.is_shared
            && self.res_headers.contains(header_names::SET_COOKIE)
            && !self.rescc.has("public")
            && !self.rescc.has("immutable")
        {
            return 0.0;
        }

        if self.varies_on_everything() {
            return 0.0;
        }

        if self.is_shared {
            if self.rescc.has("proxy-revalidate") {
                return 0.0;
            }
            if let Some(s_maxage) = self.rescc.seconds("s-maxage") {
                return s_maxage;
            }
        }

        if let Some(max_age) = self.rescc.seconds("max-age") {
            return max_age;
        }

        let default_min_ttl = if self.rescc.has("immutable") {
            self.immutable_min_ttl.as_secs_f64()
        } else {
            0.0
        };

        let server_date = self.date_millis();

        if let Some(expires) = self.res_headers.get(header_names::EXPIRES) {
            return match parse_http_date(expires) {
                Some(expires) if expires >= server_date => {
                    default_min_ttl.max((expires - server_date) / 1000.0)
                }
                _ => 0.0,
            };
        }

        if let Some(last_modified) = self
            .res_headers
            .get(header_names::LAST_MODIFIED)
            .and_then(parse_http_date)
        {
            if server_date > last_modified {
                let heuristic = (server_date - last_modified) / 1000.0 * self.cache_heuristic;
                return default_min_ttl.max(heuristic);
            }
        }

        default_min_ttl
    }

    /// Time until the response can no longer be served from cache, counting
    /// the `stale-if-error` and `stale-while-revalidate` grace periods.
    pub fn time_to_live(&self) -> Duration {
        Duration::from_millis(self.time_to_live_millis(self.now()) as u64)
    }

    pub(crate) fn time_to_live_millis(&self, now: SystemTime) -> f64 {
        let fresh = self.max_age_secs() - self.age_secs(now);
        let stale_if_error = fresh + self.rescc.seconds_or_zero("stale-if-error");
        let stale_while_revalidate = fresh + self.rescc.seconds_or_zero("stale-while-revalidate");

        (0.0_f64
            .max(fresh)
            .max(stale_if_error)
            .max(stale_while_revalidate)
            * 1000.0)
            .round()
    }

    /// Whether the freshness lifetime has run out.
    pub fn stale(&self) -> bool {
        self.stale_at(self.now())
    }

    pub(crate) fn stale_at(&self, now: SystemTime) -> bool {
        self.max_age_secs() <= self.age_secs(now)
    }

    /// Whether a stale response may be served while it is revalidated in
    /// the background (`stale-while-revalidate`).
    pub fn use_stale_while_revalidate(&self) -> bool {
        self.within_grace(self.now(), "stale-while-revalidate")
    }

    /// Whether a stale response may be served when revalidation fails
    /// (`stale-if-error`).
    pub fn use_stale_if_error(&self) -> bool {
        self.use_stale_if_error_at(self.now())
    }

    pub(crate) fn use_stale_if_error_at(&self, now: SystemTime) -> bool {
        self.within_grace(now, "stale-if-error")
    }

    fn within_grace(&self, now: SystemTime, directive: &str) -> bool {
        self.max_age_secs() + self.rescc.seconds_or_zero(directive) > self.age_secs(now)
    }
}
