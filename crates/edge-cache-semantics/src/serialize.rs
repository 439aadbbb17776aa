//! Persisted form of a [`CachePolicy`].
//!
//! The layout uses short keys and a version tag so stored entries stay
//! compact and can be rejected when the format changes.

use std::sync::Arc;
use std::time::Duration;

use http::Method;
use serde::{Deserialize, Serialize};

use crate::clock::{from_millis, whole_millis, SharedClock, SystemClock};
use crate::directives::CacheControl;
use crate::error::{PolicyError, Result};
use crate::headers::Headers;
use crate::policy::CachePolicy;

/// Current persisted layout version.
pub const SERIALIZATION_VERSION: u32 = 1;

/// Persisted policy state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachePolicyObject {
    /// Layout version, always [`SERIALIZATION_VERSION`] when written.
    pub v: u32,
    /// Response time, milliseconds since the epoch.
    pub t: u64,
    /// Shared cache.
    pub sh: bool,
    /// Heuristic freshness fraction.
    pub ch: f64,
    /// Minimum `immutable` lifetime in milliseconds.
    pub imm: u64,
    /// Response status.
    pub st: u16,
    /// Response headers.
    pub resh: Headers,
    /// Parsed response `Cache-Control`.
    pub rescc: CacheControl,
    /// Request method.
    pub m: String,
    /// Request URL.
    #[serde(default)]
    pub u: Option<String>,
    /// Request `Host`.
    #[serde(default)]
    pub h: Option<String>,
    /// The request carried no `Authorization`.
    pub a: bool,
    /// Request headers, kept only when the response has `Vary`.
    #[serde(default)]
    pub reqh: Option<Headers>,
    /// Parsed request `Cache-Control`.
    pub reqcc: CacheControl,
    /// Trust the response `Date` header. Absent in older entries.
    #[serde(default = "default_trust_server_date")]
    pub tsd: bool,
}

fn default_trust_server_date() -> bool {
    true
}

impl From<CachePolicy> for CachePolicyObject {
    fn from(policy: CachePolicy) -> Self {
        policy.to_object()
    }
}

impl TryFrom<CachePolicyObject> for CachePolicy {
    type Error = PolicyError;

    fn try_from(obj: CachePolicyObject) -> Result<Self> {
        Self::from_object(obj)
    }
}

impl CachePolicy {
    /// Snapshot this policy for storage.
    pub fn to_object(&self) -> CachePolicyObject {
        CachePolicyObject {
            v: SERIALIZATION_VERSION,
            t: whole_millis(self.response_time),
            sh: self.is_shared,
            ch: self.cache_heuristic,
            imm: u64::try_from(self.immutable_min_ttl.as_millis()).unwrap_or(u64::MAX),
            st: self.status,
            resh: self.res_headers.clone(),
            rescc: self.rescc.clone(),
            m: self.method.as_str().to_string(),
            u: self.url.clone(),
            h: self.host.clone(),
            a: self.no_authorization,
            reqh: self.req_headers.clone(),
            reqcc: self.reqcc.clone(),
            tsd: self.trust_server_date,
        }
    }

    /// Restore a policy from storage, using the system clock.
    pub fn from_object(obj: CachePolicyObject) -> Result<Self> {
        Self::from_object_with_clock(obj, Arc::new(SystemClock))
    }

    /// Restore a policy from storage, reading the time from `clock`.
    pub fn from_object_with_clock(obj: CachePolicyObject, clock: SharedClock) -> Result<Self> {
        if obj.v != SERIALIZATION_VERSION {
            return Err(PolicyError::InvalidSerialization(format!(
                "unsupported version {}",
                obj.v
            )));
        }

        let method = Method::from_bytes(obj.m.as_bytes())
            .map_err(|_| PolicyError::InvalidSerialization(format!("invalid method {:?}", obj.m)))?;

        Ok(Self {
            response_time: from_millis(obj.t),
            is_shared: obj.sh,
            cache_heuristic: obj.ch,
            immutable_min_ttl: Duration::from_millis(obj.imm),
            trust_server_date: obj.tsd,
            status: obj.st,
            res_headers: obj.resh,
            rescc: obj.rescc,
            method,
            url: obj.u,
            host: obj.h,
            no_authorization: obj.a,
            req_headers: obj.reqh,
            reqcc: obj.reqcc,
            clock,
        })
    }

    /// Restore a policy from an untyped JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        if value.is_null() {
            return Err(PolicyError::InvalidSerialization(
                "missing policy object".to_string(),
            ));
        }
        let obj: CachePolicyObject = serde_json::from_value(value)
            .map_err(|e| PolicyError::InvalidSerialization(e.to_string()))?;
        Self::from_object(obj)
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_object())?)
    }

    /// Restore a policy from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| PolicyError::InvalidSerialization(e.to_string()))?;
        Self::from_value(value)
    }
}
