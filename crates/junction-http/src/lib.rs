//! # junction-http
//!
//! The HTTP side of junction: [`Request`], [`Response`], the [`HttpMethod`]
//! table, cookies, `Accept` negotiation, and the [`routing`] engine that
//! dispatches requests through ordered layers of middleware, routes and
//! mounted routers.
//!
//! ## Modules
//!
//! - [`request`] - the request seen by handlers
//! - [`response`] - the response handlers write to
//! - [`method`] - the HTTP methods routes can be registered for
//! - [`routing`] - path patterns, handlers, routes and routers
//! - [`cookies`] - `Set-Cookie` building and `Cookie` parsing
//! - [`negotiation`] - `Accept` header negotiation
//! - [`mime_types`] - extension to MIME type lookup

pub mod cookies;
pub mod method;
pub mod mime_types;
pub mod negotiation;
pub mod request;
pub mod response;
pub mod routing;

pub use method::HttpMethod;
pub use request::{Request, RequestBuilder};
pub use response::Response;
pub use routing::{
    error_handler, handler, param_handler, Callback, Flow, HandlerResult, Outcome, Route, Router,
    RouterOptions,
};
