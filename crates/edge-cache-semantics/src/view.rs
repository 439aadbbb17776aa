//! Request and response capabilities the policy reads from.
//!
//! The engine never owns transport types. Anything that can report a
//! method, URL, status and headers can be evaluated: the plain
//! [`CacheRequest`]/[`CacheResponse`] values below, or `http` crate
//! requests and responses.

use std::borrow::Cow;

use http::Method;

use crate::headers::{header_names, Headers};

/// Read access to a request.
pub trait RequestView {
    /// Request method.
    fn method(&self) -> Method {
        Method::GET
    }

    /// Request URL, compared verbatim when matching.
    fn url(&self) -> Option<Cow<'_, str>> {
        None
    }

    /// Request headers, or `None` if this view carries none.
    fn headers(&self) -> Option<Cow<'_, Headers>>;
}

/// Read access to a response.
pub trait ResponseView {
    /// Response status code.
    fn status(&self) -> u16 {
        200
    }

    /// Response headers, or `None` if this view carries none.
    fn headers(&self) -> Option<Cow<'_, Headers>>;
}

/// A plain request description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRequest {
    /// Request method.
    pub method: Method,
    /// Request URL.
    pub url: Option<String>,
    /// Request headers.
    pub headers: Option<Headers>,
}

impl Default for CacheRequest {
    fn default() -> Self {
        Self {
            method: Method::GET,
            url: None,
            headers: Some(Headers::new()),
        }
    }
}

impl CacheRequest {
    /// Create a request with the given method and URL.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Create a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Create a request with no header capability.
    pub fn headerless() -> Self {
        Self {
            headers: None,
            ..Default::default()
        }
    }

    /// Set the method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Add a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Headers::new)
            .insert(name, value);
        self
    }

    /// Replace all headers.
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }
}

impl RequestView for CacheRequest {
    fn method(&self) -> Method {
        self.method.clone()
    }

    fn url(&self) -> Option<Cow<'_, str>> {
        self.url.as_deref().map(Cow::Borrowed)
    }

    fn headers(&self) -> Option<Cow<'_, Headers>> {
        self.headers.as_ref().map(Cow::Borrowed)
    }
}

/// A plain response description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheResponse {
    /// Status code.
    pub status: u16,
    /// Response headers.
    pub headers: Option<Headers>,
}

impl Default for CacheResponse {
    fn default() -> Self {
        Self::new(200)
    }
}

impl CacheResponse {
    /// Create a response with the given status and no headers set.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Some(Headers::new()),
        }
    }

    /// Create a `200 OK` response.
    pub fn ok() -> Self {
        Self::new(200)
    }

    /// Create a `304 Not Modified` response.
    pub fn not_modified() -> Self {
        Self::new(304)
    }

    /// Create a response with no header capability.
    pub fn headerless(status: u16) -> Self {
        Self {
            status,
            headers: None,
        }
    }

    /// Add a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Headers::new)
            .insert(name, value);
        self
    }

    /// Replace all headers.
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }
}

impl ResponseView for CacheResponse {
    fn status(&self) -> u16 {
        self.status
    }

    fn headers(&self) -> Option<Cow<'_, Headers>> {
        self.headers.as_ref().map(Cow::Borrowed)
    }
}

/// Headers of an `http` request, with `Host` taken from the URI authority
/// when the header itself is absent (HTTP/2 `:authority`).
fn http_request_headers(parts_headers: &http::HeaderMap, uri: &http::Uri) -> Headers {
    let mut headers = Headers::from(parts_headers);
    if !headers.contains(header_names::HOST) {
        if let Some(authority) = uri.authority() {
            headers.insert(header_names::HOST, authority.as_str());
        }
    }
    headers
}

impl RequestView for http::request::Parts {
    fn method(&self) -> Method {
        self.method.clone()
    }

    fn url(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Owned(self.uri.to_string()))
    }

    fn headers(&self) -> Option<Cow<'_, Headers>> {
        Some(Cow::Owned(http_request_headers(&self.headers, &self.uri)))
    }
}

impl<B> RequestView for http::Request<B> {
    fn method(&self) -> Method {
        self.method().clone()
    }

    fn url(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Owned(self.uri().to_string()))
    }

    fn headers(&self) -> Option<Cow<'_, Headers>> {
        Some(Cow::Owned(http_request_headers(
            http::Request::headers(self),
            self.uri(),
        )))
    }
}

impl ResponseView for http::response::Parts {
    fn status(&self) -> u16 {
        self.status.as_u16()
    }

    fn headers(&self) -> Option<Cow<'_, Headers>> {
        Some(Cow::Owned(Headers::from(&self.headers)))
    }
}

impl<B> ResponseView for http::Response<B> {
    fn status(&self) -> u16 {
        http::Response::status(self).as_u16()
    }

    fn headers(&self) -> Option<Cow<'_, Headers>> {
        Some(Cow::Owned(Headers::from(http::Response::headers(self))))
    }
}

impl<T: RequestView + ?Sized> RequestView for &T {
    fn method(&self) -> Method {
        (**self).method()
    }

    fn url(&self) -> Option<Cow<'_, str>> {
        (**self).url()
    }

    fn headers(&self) -> Option<Cow<'_, Headers>> {
        (**self).headers()
    }
}

impl<T: ResponseView + ?Sized> ResponseView for &T {
    fn status(&self) -> u16 {
        (**self).status()
    }

    fn headers(&self) -> Option<Cow<'_, Headers>> {
        (**self).headers()
    }
}
