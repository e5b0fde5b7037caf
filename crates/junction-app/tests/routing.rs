//! End-to-end routing through `App` and axum.

use std::sync::Arc;

use http::Method;
use junction_app::App;
use junction_core::{JunctionError, Setting, Settings};
use junction_http::routing::{Callback, Router, RouterOptions};
use junction_http::{error_handler, handler, param_handler, Flow};
use junction_test::TestClient;

fn app() -> App {
    App::with_settings(Settings::default())
}

fn send(body: &'static str) -> Callback {
    handler(move |_req, res| {
        Box::pin(async move {
            res.send(body);
            Ok(Flow::Done)
        })
    })
}

fn echo_param(name: &'static str) -> Callback {
    handler(move |req, res| {
        Box::pin(async move {
            let value = req.param(name).unwrap_or("<none>").to_string();
            res.send(value);
            Ok(Flow::Done)
        })
    })
}

#[tokio::test]
async fn test_method_functions() {
    let mut app = app();
    app.get("/foo", send("get"))
        .unwrap()
        .post("/foo", send("post"))
        .unwrap()
        .put("/foo", send("put"))
        .unwrap()
        .delete("/foo", send("delete"))
        .unwrap();
    let mut client = TestClient::new(app.into_axum_router());

    assert_eq!(client.get("/foo").await.text(), "get");
    assert_eq!(client.post("/foo", "", "text/plain").await.text(), "post");
    assert_eq!(client.put("/foo", "", "text/plain").await.text(), "put");
    assert_eq!(client.delete("/foo").await.text(), "delete");
}

#[tokio::test]
async fn test_extension_methods_are_routable() {
    let mut app = app();
    app.m_search("/", send("m-search"))
        .unwrap()
        .propfind("/", send("propfind"))
        .unwrap();
    let mut client = TestClient::new(app.into_axum_router());

    let m_search = Method::from_bytes(b"M-SEARCH").unwrap();
    assert_eq!(client.request(m_search, "/", &[]).await.text(), "m-search");
    let propfind = Method::from_bytes(b"PROPFIND").unwrap();
    assert_eq!(client.request(propfind, "/", &[]).await.text(), "propfind");
}

#[tokio::test]
async fn test_unknown_method_only_reaches_all() {
    let mut app = app();
    app.get("/", send("get")).unwrap().all("/", send("all")).unwrap();
    let mut client = TestClient::new(app.into_axum_router());

    let custom = Method::from_bytes(b"BREW").unwrap();
    assert_eq!(client.request(custom, "/", &[]).await.text(), "all");
}

#[tokio::test]
async fn test_case_insensitive_by_default() {
    let mut app = app();
    app.get("/user", send("tj")).unwrap();
    let mut client = TestClient::new(app.into_axum_router());
    assert_eq!(client.get("/USER").await.text(), "tj");
}

#[tokio::test]
async fn test_case_sensitive_routing() {
    let mut app = app();
    app.enable(Setting::CaseSensitiveRouting).unwrap();
    app.get("/user", send("tj")).unwrap();
    let mut client = TestClient::new(app.into_axum_router());
    assert_eq!(client.get("/user").await.text(), "tj");
    assert_eq!(client.get("/USER").await.status_code(), 404);
}

#[tokio::test]
async fn test_strict_routing() {
    let mut app = app();
    app.enable(Setting::StrictRouting).unwrap();
    app.get("/user/", send("tj")).unwrap();
    let mut client = TestClient::new(app.into_axum_router());
    assert_eq!(client.get("/user/").await.text(), "tj");
    assert_eq!(client.get("/user").await.status_code(), 404);
}

#[tokio::test]
async fn test_trailing_slash_optional_without_strict() {
    let mut app = app();
    app.get("/user", send("tj")).unwrap();
    let mut client = TestClient::new(app.into_axum_router());
    assert_eq!(client.get("/user/").await.text(), "tj");
}

#[tokio::test]
async fn test_named_params() {
    let mut app = app();
    app.get(
        "/user/:user/:op",
        handler(|req, res| {
            Box::pin(async move {
                let body = format!(
                    "{} {}",
                    req.param("op").unwrap_or_default(),
                    req.param("user").unwrap_or_default()
                );
                res.send(body);
                Ok(Flow::Done)
            })
        }),
    )
    .unwrap();
    let mut client = TestClient::new(app.into_axum_router());
    assert_eq!(client.get("/user/tj/edit").await.text(), "edit tj");
}

#[tokio::test]
async fn test_optional_param() {
    let mut app = app();
    app.get("/user/:user/:op?", echo_param("op")).unwrap();
    let mut client = TestClient::new(app.into_axum_router());
    assert_eq!(client.get("/user/tj").await.text(), "<none>");
    assert_eq!(client.get("/user/tj/edit").await.text(), "edit");
}

#[tokio::test]
async fn test_format_param() {
    let mut app = app();
    app.get("/user.:format", echo_param("format")).unwrap();
    let mut client = TestClient::new(app.into_axum_router());
    assert_eq!(client.get("/user.json").await.text(), "json");
}

#[tokio::test]
async fn test_wildcard_captures_rest() {
    let mut app = app();
    app.get("/api/*", echo_param("0")).unwrap();
    let mut client = TestClient::new(app.into_axum_router());
    assert_eq!(client.get("/api/users/foo.bar").await.text(), "users/foo.bar");
}

#[tokio::test]
async fn test_params_are_decoded() {
    let mut app = app();
    app.get("/user/:name", echo_param("name")).unwrap();
    let mut client = TestClient::new(app.into_axum_router());
    assert_eq!(client.get("/user/foo%20bar").await.text(), "foo bar");
}

#[tokio::test]
async fn test_malformed_param_is_400_and_skips_error_handlers() {
    let mut app = app();
    app.get("/user/:name", echo_param("name"))
        .unwrap()
        .middleware(error_handler(|_err, _req, res| {
            Box::pin(async move {
                res.send("error handler ran");
                Ok(Flow::Done)
            })
        }))
        .unwrap();
    let mut client = TestClient::new(app.into_axum_router());

    let response = client.get("/user/%foo").await;
    assert_eq!(response.status_code(), 400);
    assert_eq!(response.text(), "Failed to decode param '%foo'");
}

#[tokio::test]
async fn test_next_route() {
    let mut app = app();
    app.get(
        "/user/:id",
        [
            handler(|req, _res| {
                Box::pin(async move {
                    if req.param("id") == Some("0") {
                        Ok(Flow::Next)
                    } else {
                        Ok(Flow::NextRoute)
                    }
                })
            }),
            send("special"),
        ],
    )
    .unwrap();
    app.get("/user/:id", send("regular")).unwrap();

    let mut client = TestClient::new(app.into_axum_router());
    assert_eq!(client.get("/user/1").await.text(), "regular");
    assert_eq!(client.get("/user/0").await.text(), "special");
}

#[tokio::test]
async fn test_next_route_skips_rest_of_route() {
    let mut app = app();
    app.route("/foo")
        .unwrap()
        .get([
            handler(|_req, _res| Box::pin(async { Ok(Flow::NextRoute) })),
            send("never"),
        ])
        .unwrap();
    app.get("/foo", send("second route")).unwrap();

    let mut client = TestClient::new(app.into_axum_router());
    assert_eq!(client.get("/foo").await.text(), "second route");
}

#[tokio::test]
async fn test_next_router_returns_to_parent() {
    let mut inner = Router::new();
    inner
        .middleware(handler(|_req, _res| Box::pin(async { Ok(Flow::NextRouter) })))
        .unwrap()
        .get("/", send("inner"))
        .unwrap();

    let mut app = app();
    app.mount("/", inner)
        .unwrap()
        .get("/", send("outer"))
        .unwrap();

    let mut client = TestClient::new(app.into_axum_router());
    assert_eq!(client.get("/").await.text(), "outer");
}

#[tokio::test]
async fn test_middleware_order_and_prefix() {
    let mut app = app();
    app.middleware(handler(|_req, res| {
        Box::pin(async move {
            res.append("X-Trail", "root")?;
            Ok(Flow::Next)
        })
    }))
    .unwrap()
    .middleware_at(
        "/blog",
        handler(|req, res| {
            Box::pin(async move {
                let seen = format!("{}|{}", req.base_url(), req.url());
                res.append("X-Trail", &seen)?;
                Ok(Flow::Next)
            })
        }),
    )
    .unwrap()
    .get("/blog/post", send("post"))
    .unwrap();

    let mut client = TestClient::new(app.into_axum_router());
    let response = client.get("/blog/post").await;
    assert_eq!(response.text(), "post");
    assert_eq!(response.header("x-trail"), Some("root, /blog|/post"));

    let other = client.get("/blogger").await;
    assert_eq!(other.status_code(), 404);
    assert_eq!(other.header("x-trail"), None);
}

#[tokio::test]
async fn test_mounted_router_sees_stripped_url() {
    let mut users = Router::new();
    users
        .get(
            "/:id",
            handler(|req, res| {
                Box::pin(async move {
                    let body = format!(
                        "{} {} {} {}",
                        req.base_url(),
                        req.url(),
                        req.original_url(),
                        req.param("id").unwrap_or_default()
                    );
                    res.send(body);
                    Ok(Flow::Done)
                })
            }),
        )
        .unwrap();

    let mut app = app();
    app.mount("/users", users).unwrap();

    let mut client = TestClient::new(app.into_axum_router());
    assert_eq!(
        client.get("/users/7?full=1").await.text(),
        "/users /7?full=1 /users/7?full=1 7"
    );
}

#[tokio::test]
async fn test_merge_params_through_mount() {
    let mut items = Router::with_options(RouterOptions::new().merge_params(true));
    items
        .get(
            "/:item",
            handler(|req, res| {
                Box::pin(async move {
                    let body = format!(
                        "{}/{}",
                        req.param("user").unwrap_or_default(),
                        req.param("item").unwrap_or_default()
                    );
                    res.send(body);
                    Ok(Flow::Done)
                })
            }),
        )
        .unwrap();

    let mut app = app();
    app.mount("/user/:user/items", items).unwrap();

    let mut client = TestClient::new(app.into_axum_router());
    assert_eq!(client.get("/user/tj/items/42").await.text(), "tj/42");
}

#[tokio::test]
async fn test_errors_reach_error_handlers() {
    let mut app = app();
    app.get(
        "/",
        handler(|_req, _res| Box::pin(async { Err(JunctionError::status(418, "teapot")) })),
    )
    .unwrap()
    .middleware(send("skipped while erroring"))
    .unwrap()
    .middleware(error_handler(|err, _req, res| {
        Box::pin(async move {
            res.set_status(http::StatusCode::from_u16(err.status_code()).unwrap_or_default());
            res.send(format!("caught {err}"));
            Ok(Flow::Done)
        })
    }))
    .unwrap();

    let mut client = TestClient::new(app.into_axum_router());
    let response = client.get("/").await;
    assert_eq!(response.status_code(), 418);
    assert_eq!(response.text(), "caught teapot");
}

#[tokio::test]
async fn test_panics_become_500() {
    let mut app = app();
    app.get(
        "/",
        handler(|req, _res| {
            Box::pin(async move {
                if req.url() == "/" {
                    panic!("handler blew up");
                }
                Ok(Flow::Done)
            })
        }),
    )
    .unwrap();

    let mut client = TestClient::new(app.into_axum_router());
    let response = client.get("/").await;
    assert_eq!(response.status_code(), 500);
    assert_eq!(response.text(), "Handler panicked: handler blew up");
}

#[tokio::test]
async fn test_automatic_options() {
    let mut app = app();
    app.get("/users", send("list"))
        .unwrap()
        .put("/users", send("replace"))
        .unwrap()
        .post("/other", send("other"))
        .unwrap();

    let mut client = TestClient::new(app.into_axum_router());
    let response = client.options("/users").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.header("allow"), Some("GET,HEAD,PUT"));
    assert_eq!(response.text(), "GET,HEAD,PUT");
}

#[tokio::test]
async fn test_options_without_routes_is_404() {
    let mut app = app();
    app.get("/users", send("list")).unwrap();
    let mut client = TestClient::new(app.into_axum_router());
    assert_eq!(client.options("/nothing").await.status_code(), 404);
}

#[tokio::test]
async fn test_param_callbacks() {
    let mut app = app();
    app.param(
        "user",
        param_handler(|req, _res, value| {
            Box::pin(async move {
                if value == "ghost" {
                    return Err(JunctionError::NotFound("no such user".into()));
                }
                req.params_mut().insert("user", value.to_uppercase());
                Ok(Flow::Next)
            })
        }),
    )
    .unwrap()
    .get("/user/:user", echo_param("user"))
    .unwrap();

    let mut client = TestClient::new(app.into_axum_router());
    assert_eq!(client.get("/user/tj").await.text(), "TJ");

    let missing = client.get("/user/ghost").await;
    assert_eq!(missing.status_code(), 404);
    assert_eq!(missing.text(), "Not found: no such user");
}

#[tokio::test]
async fn test_url_rewrite_changes_matching() {
    let mut app = app();
    app.middleware(handler(|req, _res| {
        Box::pin(async move {
            if req.path() == "/old" {
                req.set_url("/new");
            }
            Ok(Flow::Next)
        })
    }))
    .unwrap()
    .get("/new", handler(|req, res| {
        Box::pin(async move {
            let body = format!("new via {}", req.original_url());
            res.send(body);
            Ok(Flow::Done)
        })
    }))
    .unwrap();

    let mut client = TestClient::new(app.into_axum_router());
    assert_eq!(client.get("/old").await.text(), "new via /old");
}

#[tokio::test]
async fn test_method_override() {
    let mut app = app();
    app.middleware(handler(|req, _res| {
        Box::pin(async move {
            let wanted = req.header("x-http-method-override").map(str::to_string);
            if let Some(method) = wanted.and_then(|m| Method::from_bytes(m.as_bytes()).ok()) {
                req.set_method(method);
            }
            Ok(Flow::Next)
        })
    }))
    .unwrap()
    .delete("/item", send("deleted"))
    .unwrap();

    let mut client = TestClient::new(app.into_axum_router());
    let response = client
        .request_with_body(
            Method::POST,
            "/item",
            &[("x-http-method-override", "DELETE")],
            "",
        )
        .await;
    assert_eq!(response.text(), "deleted");
}

#[tokio::test]
async fn test_route_path_is_exposed() {
    let mut app = app();
    app.get(
        "/user/:id",
        handler(|req, res| {
            Box::pin(async move {
                let body = req.route_path().unwrap_or_default().to_string();
                res.send(body);
                Ok(Flow::Done)
            })
        }),
    )
    .unwrap();

    let mut client = TestClient::new(app.into_axum_router());
    assert_eq!(client.get("/user/3").await.text(), "/user/:id");
}

#[tokio::test]
async fn test_shared_router_mounted_twice() {
    let mut shared = Router::new();
    shared
        .get(
            "/",
            handler(|req, res| {
                Box::pin(async move {
                    let body = req.base_url().to_string();
                    res.send(body);
                    Ok(Flow::Done)
                })
            }),
        )
        .unwrap();
    let shared = Arc::new(shared);

    let mut app = app();
    app.mount("/a", Arc::clone(&shared))
        .unwrap()
        .mount("/b", shared)
        .unwrap();

    let mut client = TestClient::new(app.into_axum_router());
    assert_eq!(client.get("/a").await.text(), "/a");
    assert_eq!(client.get("/b/").await.text(), "/b");
}
