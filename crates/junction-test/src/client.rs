//! In-process HTTP test client.
//!
//! [`TestClient`] sends requests straight into an `axum::Router` through
//! [`tower::ServiceExt::oneshot`] and collects the result into a
//! [`TestResponse`]. Cookies set by responses are replayed on later requests.
//!
//! ```rust,no_run
//! use junction_test::TestClient;
//! use axum::routing::get;
//!
//! async fn example() {
//!     let app = axum::Router::new().route("/hello", get(|| async { "Hello, World!" }));
//!     let mut client = TestClient::new(app);
//!
//!     let response = client.get("/hello").await;
//!     assert_eq!(response.status_code(), 200);
//!     assert_eq!(response.text(), "Hello, World!");
//! }
//! ```

use std::collections::BTreeMap;

use axum::Router;
use bytes::Bytes;
use http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use junction_core::JunctionError;

/// A client that sends simulated requests to an axum router.
pub struct TestClient {
    app: Router,
    cookies: BTreeMap<String, String>,
}

impl TestClient {
    /// Creates a client for `app`.
    pub fn new(app: Router) -> Self {
        Self {
            app,
            cookies: BTreeMap::new(),
        }
    }

    /// Sends a `GET` request.
    pub async fn get(&mut self, path: &str) -> TestResponse {
        self.request(Method::GET, path, &[]).await
    }

    /// Sends a `POST` request with a body.
    pub async fn post(&mut self, path: &str, body: &str, content_type: &str) -> TestResponse {
        self.request_with_body(Method::POST, path, &[("content-type", content_type)], body)
            .await
    }

    /// Sends a `PUT` request with a body.
    pub async fn put(&mut self, path: &str, body: &str, content_type: &str) -> TestResponse {
        self.request_with_body(Method::PUT, path, &[("content-type", content_type)], body)
            .await
    }

    /// Sends a `DELETE` request.
    pub async fn delete(&mut self, path: &str) -> TestResponse {
        self.request(Method::DELETE, path, &[]).await
    }

    /// Sends a `HEAD` request.
    pub async fn head(&mut self, path: &str) -> TestResponse {
        self.request(Method::HEAD, path, &[]).await
    }

    /// Sends an `OPTIONS` request.
    pub async fn options(&mut self, path: &str) -> TestResponse {
        self.request(Method::OPTIONS, path, &[]).await
    }

    /// Sends a body-less request with any method and extra headers.
    pub async fn request(
        &mut self,
        method: Method,
        path: &str,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        self.request_with_body(method, path, headers, "").await
    }

    /// Sends a request with any method, extra headers and a body.
    pub async fn request_with_body(
        &mut self,
        method: Method,
        path: &str,
        headers: &[(&str, &str)],
        body: &str,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        if let Some(cookie) = self.cookie_header() {
            builder = builder.header("cookie", cookie);
        }

        let req = builder
            .body(axum::body::Body::from(body.to_string()))
            .expect("request builder should not fail");

        self.send(req).await
    }

    /// Sets a cookie sent with every later request.
    pub fn set_cookie(&mut self, name: &str, value: &str) {
        self.cookies.insert(name.to_string(), value.to_string());
    }

    /// Forgets every cookie.
    pub fn clear_cookies(&mut self) {
        self.cookies.clear();
    }

    /// Returns the cookie jar.
    pub const fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    async fn send(&mut self, req: Request<axum::body::Body>) -> TestResponse {
        let response = self
            .app
            .clone()
            .oneshot(req)
            .await
            .expect("router should not error");

        let status = response.status();
        let headers = response.headers().clone();

        for value in headers.get_all(http::header::SET_COOKIE) {
            let Some(pair) = value.to_str().ok().and_then(|v| v.split(';').next()) else {
                continue;
            };
            if let Some((name, val)) = pair.split_once('=') {
                self.cookies
                    .insert(name.trim().to_string(), val.trim().to_string());
            }
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map_or_else(|_| Bytes::new(), http_body_util::Collected::to_bytes);

        TestResponse {
            status,
            headers,
            body: body.to_vec(),
        }
    }
}

impl std::fmt::Debug for TestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestClient")
            .field("cookies", &self.cookies)
            .finish_non_exhaustive()
    }
}

/// The collected result of a test request.
#[derive(Debug)]
pub struct TestResponse {
    /// The status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// The body bytes.
    pub body: Vec<u8>,
}

impl TestResponse {
    /// Returns the body as text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Deserializes the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, JunctionError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Returns the numeric status code.
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns the first value of a header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns every value of a header.
    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// Returns true if the header is present.
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }
}
