//! Cookies for the request and response helpers.
//!
//! [`Cookie`] builds `Set-Cookie` values for [`Response::cookie`](crate::Response::cookie);
//! [`parse_cookie_header`] reads the request's `Cookie` header.

use std::collections::HashMap;
use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters escaped in cookie values: everything except the unreserved
/// set `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
const COOKIE_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// The `SameSite` attribute for cookies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    /// Only same-site requests carry the cookie.
    Strict,
    /// Top-level navigations also carry the cookie.
    Lax,
    /// Every request carries the cookie (requires Secure).
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "Strict"),
            Self::Lax => write!(f, "Lax"),
            Self::None => write!(f, "None"),
        }
    }
}

/// A cookie to be set on a response.
///
/// # Examples
///
/// ```
/// use junction_http::cookies::Cookie;
///
/// let cookie = Cookie::new("foo", "bar").http_only(true);
/// assert_eq!(cookie.to_set_cookie_header(), "foo=bar; Path=/; HttpOnly");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    /// The cookie name.
    pub name: String,
    /// The cookie value, unencoded.
    pub value: String,
    /// Maximum age in seconds. `None` means a session cookie.
    pub max_age: Option<u64>,
    /// Expiration date string (HTTP date format).
    pub expires: Option<String>,
    /// The path for which the cookie is valid, `/` by default.
    pub path: String,
    /// The domain for which the cookie is valid.
    pub domain: Option<String>,
    /// Whether the cookie is only sent over HTTPS.
    pub secure: bool,
    /// Whether the cookie is hidden from scripts.
    pub http_only: bool,
    /// The `SameSite` attribute.
    pub same_site: Option<SameSite>,
}

impl Cookie {
    /// Creates a session cookie valid for the whole site.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            max_age: None,
            expires: None,
            path: "/".to_string(),
            domain: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }

    /// Creates a cookie that tells the client to forget `name`.
    pub fn expired(name: impl Into<String>) -> Self {
        Self::new(name, "").expires("Thu, 01 Jan 1970 00:00:00 GMT")
    }

    /// Sets the max age in seconds.
    #[must_use]
    pub const fn max_age(mut self, max_age: u64) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Sets the expires date string.
    #[must_use]
    pub fn expires(mut self, expires: impl Into<String>) -> Self {
        self.expires = Some(expires.into());
        self
    }

    /// Sets the path.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the domain.
    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Sets the secure flag.
    #[must_use]
    pub const fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Sets the http-only flag.
    #[must_use]
    pub const fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Sets the `SameSite` attribute.
    #[must_use]
    pub const fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Formats this cookie as a `Set-Cookie` header value.
    pub fn to_set_cookie_header(&self) -> String {
        let value = utf8_percent_encode(&self.value, COOKIE_VALUE);
        let mut parts = vec![format!("{}={value}", self.name)];

        if let Some(max_age) = self.max_age {
            parts.push(format!("Max-Age={max_age}"));
        }
        if let Some(ref domain) = self.domain {
            parts.push(format!("Domain={domain}"));
        }
        parts.push(format!("Path={}", self.path));
        if let Some(ref expires) = self.expires {
            parts.push(format!("Expires={expires}"));
        }
        if self.http_only {
            parts.push("HttpOnly".to_string());
        }
        if self.secure {
            parts.push("Secure".to_string());
        }
        if let Some(same_site) = self.same_site {
            parts.push(format!("SameSite={same_site}"));
        }

        parts.join("; ")
    }
}

/// Parses a `Cookie` header value into a map of name-value pairs.
///
/// Values are percent-decoded when possible and kept verbatim otherwise.
/// Entries without `=` are skipped; the first occurrence of a name wins.
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();

    for part in header.split(';') {
        let Some((name, value)) = part.trim().split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() || cookies.contains_key(name) {
            continue;
        }
        let value = value.trim().trim_matches('"');
        let decoded = percent_decode_str(value)
            .decode_utf8()
            .map_or_else(|_| value.to_string(), |v| v.into_owned());
        cookies.insert(name.to_string(), decoded);
    }

    cookies
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_basic_set_header() {
        assert_eq!(Cookie::new("foo", "bar").to_set_cookie_header(), "foo=bar; Path=/");
    }

    #[test]
    fn test_cookie_value_is_encoded() {
        let header = Cookie::new("name", "tobi ferret;").to_set_cookie_header();
        assert_eq!(header, "name=tobi%20ferret%3B; Path=/");
    }

    #[test]
    fn test_cookie_full_attributes() {
        let header = Cookie::new("sid", "abc")
            .max_age(3600)
            .domain("example.com")
            .path("/admin")
            .secure(true)
            .http_only(true)
            .same_site(SameSite::Lax)
            .to_set_cookie_header();
        assert_eq!(
            header,
            "sid=abc; Max-Age=3600; Domain=example.com; Path=/admin; HttpOnly; Secure; SameSite=Lax"
        );
    }

    #[test]
    fn test_expired_cookie() {
        let header = Cookie::expired("sid").to_set_cookie_header();
        assert_eq!(header, "sid=; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT");
    }

    #[test]
    fn test_parse_multiple_cookies() {
        let cookies = parse_cookie_header("a=1; b=hello%20world; c");
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies["a"], "1");
        assert_eq!(cookies["b"], "hello world");
    }

    #[test]
    fn test_parse_keeps_first_duplicate_and_bad_escapes() {
        let cookies = parse_cookie_header("a=1; a=2; bad=%E0%A4%A");
        assert_eq!(cookies["a"], "1");
        assert_eq!(cookies["bad"], "%E0%A4%A");
    }

    #[test]
    fn test_samesite_display() {
        assert_eq!(SameSite::Strict.to_string(), "Strict");
        assert_eq!(SameSite::None.to_string(), "None");
    }
}
