//! The response handlers write to.
//!
//! A [`Response`] is filled in place while a request is dispatched and
//! converted into an axum response once dispatch returns. Calling one of the
//! sending helpers ([`Response::send`], [`Response::json`],
//! [`Response::send_status`], [`Response::end`]) marks it finished.

use axum::response::IntoResponse;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, SET_COOKIE};
use http::{Extensions, HeaderMap, StatusCode};
use serde::Serialize;

use junction_core::{JunctionError, JunctionResult};

use crate::cookies::Cookie;
use crate::mime_types;

/// An outgoing HTTP response.
///
/// # Examples
///
/// ```
/// use junction_http::Response;
///
/// let mut res = Response::new();
/// res.set("X-Request-Id", "abc").unwrap();
/// res.send("<p>hello</p>");
///
/// assert!(res.is_finished());
/// assert_eq!(res.header("content-type"), Some("text/html; charset=utf-8"));
/// assert_eq!(res.text(), "<p>hello</p>");
/// ```
#[derive(Debug, Default)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    finished: bool,
    locals: serde_json::Map<String, serde_json::Value>,
    extensions: Extensions,
}

fn header_name(name: &str) -> JunctionResult<HeaderName> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| JunctionError::InternalServerError(format!("invalid header name '{name}'")))
}

fn header_value(name: &str, value: &str) -> JunctionResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| {
        JunctionError::InternalServerError(format!("invalid value for header '{name}'"))
    })
}

impl Response {
    /// Creates an empty `200 OK` response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the status code.
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Sets the status code.
    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    /// Returns the headers.
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the headers mutably.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns the first value of a header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns every value of a header, in the order they were added.
    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// Sets a header, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`JunctionError::InternalServerError`] if the name or value is
    /// not a valid header.
    pub fn set(&mut self, name: &str, value: &str) -> JunctionResult<&mut Self> {
        let value = header_value(name, value)?;
        self.headers.insert(header_name(name)?, value);
        Ok(self)
    }

    /// Appends a value to a header.
    ///
    /// `Set-Cookie` keeps one entry per value. Any other header keeps a single
    /// entry with the values joined by `", "`.
    ///
    /// # Errors
    ///
    /// Returns [`JunctionError::InternalServerError`] if the name or value is
    /// not a valid header.
    pub fn append(&mut self, name: &str, value: &str) -> JunctionResult<&mut Self> {
        let name_key = header_name(name)?;
        if name_key == SET_COOKIE {
            let value = header_value(name, value)?;
            self.headers.append(name_key, value);
            return Ok(self);
        }

        let joined = match self.headers.get(&name_key).and_then(|v| v.to_str().ok()) {
            Some(existing) => format!("{existing}, {value}"),
            None => value.to_string(),
        };
        let value = header_value(name, &joined)?;
        self.headers.insert(name_key, value);
        Ok(self)
    }

    /// Appends several values to a header.
    ///
    /// # Errors
    ///
    /// Fails like [`Response::append`].
    pub fn append_all(&mut self, name: &str, values: &[&str]) -> JunctionResult<&mut Self> {
        for value in values {
            self.append(name, value)?;
        }
        Ok(self)
    }

    /// Sets `Content-Type`.
    ///
    /// A value containing `/` is used as given. Anything else is treated as
    /// a file extension and looked up, falling back to
    /// `application/octet-stream`. Text types get `; charset=utf-8` unless
    /// a charset is already present.
    pub fn set_type(&mut self, ty: &str) -> &mut Self {
        let mime = if ty.contains('/') {
            ty.to_string()
        } else {
            mime_types::lookup(ty)
                .unwrap_or("application/octet-stream")
                .to_string()
        };
        let full = match mime_types::charset(&mime) {
            Some(charset) if !mime.to_ascii_lowercase().contains("charset=") => {
                format!("{mime}; charset={charset}")
            }
            _ => mime,
        };
        if let Ok(value) = HeaderValue::from_str(&full) {
            self.headers.insert(CONTENT_TYPE, value);
        }
        self
    }

    /// Adds a `Set-Cookie` header.
    pub fn cookie(&mut self, cookie: &Cookie) -> &mut Self {
        if let Ok(value) = HeaderValue::from_str(&cookie.to_set_cookie_header()) {
            self.headers.append(SET_COOKIE, value);
        }
        self
    }

    /// Tells the client to forget a cookie.
    pub fn clear_cookie(&mut self, name: &str) -> &mut Self {
        self.cookie(&Cookie::expired(name))
    }

    /// Sends a text body, defaulting `Content-Type` to HTML.
    pub fn send(&mut self, body: impl Into<String>) {
        if !self.headers.contains_key(CONTENT_TYPE) {
            self.set_type("html");
        }
        self.body = body.into().into_bytes();
        self.finished = true;
    }

    /// Sends a binary body, defaulting `Content-Type` to
    /// `application/octet-stream`.
    pub fn send_bytes(&mut self, body: impl Into<Vec<u8>>) {
        if !self.headers.contains_key(CONTENT_TYPE) {
            self.set_type("bin");
        }
        self.body = body.into();
        self.finished = true;
    }

    /// Sends a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`JunctionError::SerializationError`] if `value` cannot be
    /// serialized; the response is left untouched.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> JunctionResult<()> {
        let body = serde_json::to_vec(value)?;
        if !self.headers.contains_key(CONTENT_TYPE) {
            self.set_type("json");
        }
        self.body = body;
        self.finished = true;
        Ok(())
    }

    /// Sets the status and sends its reason phrase as plain text.
    pub fn send_status(&mut self, status: StatusCode) {
        self.status = status;
        self.set_type("txt");
        let reason = status
            .canonical_reason()
            .map_or_else(|| status.as_str().to_string(), str::to_string);
        self.body = reason.into_bytes();
        self.finished = true;
    }

    /// Finishes the response without touching the body.
    pub fn end(&mut self) {
        self.finished = true;
    }

    /// Returns true once a sending helper has been called.
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns the body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns the body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Returns the values made available to views rendered for this response.
    pub const fn locals(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.locals
    }

    /// Returns the view locals mutably.
    pub fn locals_mut(&mut self) -> &mut serde_json::Map<String, serde_json::Value> {
        &mut self.locals
    }

    /// Returns the response extensions.
    pub const fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Returns the response extensions mutably.
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Returns one extension value by type.
    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let mut response = axum::response::Response::new(axum::body::Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
