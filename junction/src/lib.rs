//! # junction
//!
//! An Express-style routing and dispatch engine for Rust.
//!
//! This is the meta-crate that re-exports the sub-crates. Depend on
//! `junction` for the whole framework, or on individual crates for
//! finer-grained control.
//!
//! ```rust,no_run
//! use junction::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> JunctionResult<()> {
//!     let mut app = App::new();
//!     app.get("/user/:id", handler(|req, res| Box::pin(async move {
//!         res.send(format!("user {}", req.param("id").unwrap_or_default()));
//!         Ok(Flow::Done)
//!     })))?;
//!     app.run("127.0.0.1:3000").await
//! }
//! ```

/// Errors, settings and logging.
pub use junction_core as core;

/// Requests, responses, path patterns and the router.
pub use junction_http as http;

/// Applications, sub-app mounting, views and the axum server.
#[cfg(feature = "app")]
pub use junction_app as app;

/// The in-process test client.
#[cfg(feature = "testing")]
pub use junction_test as test;

// Re-export common third-party crates.
pub use async_trait;
pub use axum;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tracing;

/// The types most handlers and applications need.
pub mod prelude {
    pub use junction_core::{JunctionError, JunctionResult, Setting, Settings};
    pub use junction_http::cookies::Cookie;
    pub use junction_http::routing::{Callbacks, ErrorHandler, Handler, ParamHandler, PathSpec};
    pub use junction_http::{
        error_handler, handler, param_handler, Callback, Flow, HandlerResult, HttpMethod,
        Outcome, Request, Response, Route, Router, RouterOptions,
    };

    #[cfg(feature = "app")]
    pub use junction_app::{App, AppContext, Application, RenderExt, ViewEngine};
}
