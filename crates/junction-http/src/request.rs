//! The request seen by handlers.
//!
//! [`Request`] keeps three views of the URL:
//!
//! - [`Request::url`] is the path view of the router currently dispatching,
//!   with the prefixes of enclosing mounts stripped. Handlers may rewrite it.
//! - [`Request::base_url`] is the prefix that was stripped to get there.
//! - [`Request::original_url`] is the URL as received, never changed.

use std::collections::HashMap;

use http::{Extensions, HeaderMap, Method};

use crate::cookies;
use crate::method::HttpMethod;
use crate::negotiation;
use crate::routing::Params;

/// An incoming HTTP request.
///
/// # Examples
///
/// ```
/// use junction_http::Request;
///
/// let request = Request::builder()
///     .method(http::Method::POST)
///     .url("/users/42?expand=true")
///     .build();
///
/// assert_eq!(request.method(), &http::Method::POST);
/// assert_eq!(request.path(), "/users/42");
/// assert_eq!(request.query().get("expand").map(String::as_str), Some("true"));
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    url: String,
    original_url: String,
    base_url: String,
    params: Params,
    headers: HeaderMap,
    body: Vec<u8>,
    extensions: Extensions,
    route_path: Option<String>,
}

impl Request {
    /// Creates a new [`RequestBuilder`].
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// Creates a `Request` from the parts of an axum request and its body.
    pub fn from_axum(parts: http::request::Parts, body: Vec<u8>) -> Self {
        let url = parts
            .uri
            .path_and_query()
            .map_or_else(|| "/".to_string(), |pq| pq.as_str().to_string());

        Self {
            method: parts.method,
            original_url: url.clone(),
            url,
            base_url: String::new(),
            params: Params::new(),
            headers: parts.headers,
            body,
            extensions: parts.extensions,
            route_path: None,
        }
    }

    /// Returns the request method.
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the method as a routable [`HttpMethod`], if it is one.
    pub fn http_method(&self) -> Option<HttpMethod> {
        HttpMethod::from_http(&self.method)
    }

    /// Rewrites the method; later layers match against the new value.
    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// Returns the URL relative to the current mount point, query included.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Rewrites the URL; later layers match against the new value.
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    /// Returns the path portion of [`Request::url`].
    pub fn path(&self) -> &str {
        self.url.split_once('?').map_or(self.url.as_str(), |(path, _)| path)
    }

    /// Returns the raw query string, without the leading `?`.
    pub fn query_string(&self) -> &str {
        self.url.split_once('?').map_or("", |(_, query)| query)
    }

    /// Parses the query string. Later values for a repeated key win.
    pub fn query(&self) -> HashMap<String, String> {
        url::form_urlencoded::parse(self.query_string().as_bytes())
            .into_owned()
            .collect()
    }

    /// Returns the URL as it was received.
    pub fn original_url(&self) -> &str {
        &self.original_url
    }

    /// Returns the mount prefix stripped from [`Request::url`].
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn set_base_url(&mut self, base_url: String) {
        self.base_url = base_url;
    }

    /// Returns the parameters visible to the current layer.
    pub const fn params(&self) -> &Params {
        &self.params
    }

    /// Returns the parameters mutably, e.g. for a param callback to
    /// replace a raw value with a normalised one.
    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    /// Replaces the parameter set, returning the previous one.
    pub fn set_params(&mut self, params: Params) -> Params {
        std::mem::replace(&mut self.params, params)
    }

    /// Returns a named parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Returns the request headers.
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the request headers mutably.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns a header value, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the raw body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Parses the `Cookie` header.
    pub fn cookies(&self) -> HashMap<String, String> {
        self.header(http::header::COOKIE.as_str())
            .map_or_else(HashMap::new, cookies::parse_cookie_header)
    }

    /// Returns one cookie value.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies().remove(name)
    }

    /// Returns the offered type the client prefers according to `Accept`.
    ///
    /// Offers may be extensions (`"json"`) or full types (`"text/html"`).
    /// Without an `Accept` header the first offer wins.
    pub fn accepts<'a>(&self, offered: &[&'a str]) -> Option<&'a str> {
        negotiation::preferred(self.header(http::header::ACCEPT.as_str()), offered)
    }

    /// Returns the request extensions.
    pub const fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Returns the request extensions mutably.
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Returns one extension value by type.
    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }

    /// Returns the path spec of the route currently handling the request.
    pub fn route_path(&self) -> Option<&str> {
        self.route_path.as_deref()
    }

    pub(crate) fn set_route_path(&mut self, route_path: Option<String>) {
        self.route_path = route_path;
    }
}

/// Builder for [`Request`], mainly for tests and adapters.
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self {
            method: Method::GET,
            url: "/".to_string(),
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }
}

impl RequestBuilder {
    /// Sets the method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the URL, query string included.
    #[must_use]
    pub fn url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    /// Adds a header. Invalid names or values are ignored.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::from_bytes(name.as_bytes()),
            http::header::HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Builds the request.
    pub fn build(self) -> Request {
        Request {
            method: self.method,
            original_url: self.url.clone(),
            url: self.url,
            base_url: String::new(),
            params: Params::new(),
            headers: self.headers,
            body: self.body,
            extensions: Extensions::new(),
            route_path: None,
        }
    }
}
