//! Response and request helpers seen through the server adapter.

use http::StatusCode;
use serde::Deserialize;

use junction_app::App;
use junction_core::Settings;
use junction_http::cookies::Cookie;
use junction_http::{handler, Flow};
use junction_test::TestClient;

#[derive(Debug, Deserialize)]
struct User {
    name: String,
    admin: bool,
}

fn client(app: App) -> TestClient {
    TestClient::new(app.into_axum_router())
}

#[tokio::test]
async fn test_json_body() {
    let mut app = App::with_settings(Settings::default());
    app.get(
        "/user",
        handler(|_req, res| {
            Box::pin(async move {
                res.set_status(StatusCode::CREATED);
                res.json(&serde_json::json!({ "name": "tobi", "admin": false }))?;
                Ok(Flow::Done)
            })
        }),
    )
    .unwrap();

    let response = client(app).get("/user").await;
    assert_eq!(response.status_code(), 201);
    assert!(response
        .header("content-type")
        .is_some_and(|ct| ct.starts_with("application/json")));
    let user: User = response.json().unwrap();
    assert_eq!(user.name, "tobi");
    assert!(!user.admin);
}

#[tokio::test]
async fn test_headers_and_cookies() {
    let mut app = App::with_settings(Settings::default());
    app.get(
        "/",
        handler(|_req, res| {
            Box::pin(async move {
                res.set("X-Mode", "a")?.set("X-Mode", "b")?;
                res.append("Vary", "Accept")?.append("Vary", "Origin")?;
                res.cookie(&Cookie::new("session", "abc").path("/"))
                    .cookie(&Cookie::new("theme", "dark"));
                res.set_type("txt");
                res.send("ok");
                Ok(Flow::Done)
            })
        }),
    )
    .unwrap()
    .get(
        "/whoami",
        handler(|req, res| {
            Box::pin(async move {
                let session = req.cookie("session").unwrap_or_default();
                res.send(session);
                Ok(Flow::Done)
            })
        }),
    )
    .unwrap();

    let mut client = client(app);
    let response = client.get("/").await;
    assert_eq!(response.header("x-mode"), Some("b"));
    assert_eq!(response.header("vary"), Some("Accept, Origin"));
    assert_eq!(response.header_all("set-cookie").len(), 2);
    assert_eq!(
        response.header("content-type"),
        Some("text/plain; charset=utf-8")
    );
    assert_eq!(client.get("/whoami").await.text(), "abc");
}

#[tokio::test]
async fn test_send_status() {
    let mut app = App::with_settings(Settings::default());
    app.delete(
        "/item",
        handler(|_req, res| {
            Box::pin(async move {
                res.send_status(StatusCode::NO_CONTENT);
                Ok(Flow::Done)
            })
        }),
    )
    .unwrap()
    .get(
        "/teapot",
        handler(|_req, res| {
            Box::pin(async move {
                res.send_status(StatusCode::IM_A_TEAPOT);
                Ok(Flow::Done)
            })
        }),
    )
    .unwrap();

    let mut client = client(app);
    assert_eq!(client.delete("/item").await.status_code(), 204);
    let teapot = client.get("/teapot").await;
    assert_eq!(teapot.status_code(), 418);
    assert_eq!(teapot.text(), "I'm a teapot");
}

#[tokio::test]
async fn test_content_negotiation() {
    let mut app = App::with_settings(Settings::default());
    app.get(
        "/",
        handler(|req, res| {
            Box::pin(async move {
                match req.accepts(&["json", "html"]) {
                    Some("json") => res.json(&serde_json::json!({ "format": "json" }))?,
                    Some(_) => res.send("<b>html</b>"),
                    None => res.send_status(StatusCode::NOT_ACCEPTABLE),
                }
                Ok(Flow::Done)
            })
        }),
    )
    .unwrap();

    let mut client = client(app);
    let json = client
        .request(http::Method::GET, "/", &[("accept", "application/json")])
        .await;
    assert_eq!(json.text(), r#"{"format":"json"}"#);

    let html = client
        .request(http::Method::GET, "/", &[("accept", "text/html;q=0.9, */*;q=0.1")])
        .await;
    assert_eq!(html.text(), "<b>html</b>");

    let none = client
        .request(http::Method::GET, "/", &[("accept", "image/png")])
        .await;
    assert_eq!(none.status_code(), 406);

    let default = client.get("/").await;
    assert_eq!(default.text(), r#"{"format":"json"}"#);
}

#[tokio::test]
async fn test_query_string() {
    let mut app = App::with_settings(Settings::default());
    app.get(
        "/search",
        handler(|req, res| {
            Box::pin(async move {
                let query = req.query();
                let body = format!("{} {}", req.path(), query.get("q").cloned().unwrap_or_default());
                res.send(body);
                Ok(Flow::Done)
            })
        }),
    )
    .unwrap();

    let response = client(app).get("/search?q=rust+router").await;
    assert_eq!(response.text(), "/search rust router");
}
