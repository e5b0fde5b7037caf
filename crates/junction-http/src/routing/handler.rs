//! Handler traits and the control-flow values they return.
//!
//! A handler finishes by returning a [`HandlerResult`]:
//!
//! | Return | Effect |
//! |---|---|
//! | `Ok(Flow::Next)` | continue with the next matching layer |
//! | `Ok(Flow::NextRoute)` | skip the rest of the current route |
//! | `Ok(Flow::NextRouter)` | leave the current router |
//! | `Ok(Flow::Done)` | the response is complete; stop dispatching |
//! | `Err(err)` | hand `err` to the next error handler |
//!
//! Panics inside a handler are caught and treated as `Err`.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;

use junction_core::{JunctionError, JunctionResult};

use super::router::{Outcome, Router};
use crate::request::Request;
use crate::response::Response;

/// A boxed, sendable future borrowing from `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// How dispatch continues after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Continue with the next matching layer.
    Next,
    /// Skip the remaining callbacks of the current route.
    NextRoute,
    /// Skip the remaining layers of the current router.
    NextRouter,
    /// The response is complete.
    Done,
}

/// What every handler returns. `Err` puts the error in flight.
pub type HandlerResult = JunctionResult<Flow>;

/// A request handler.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handles the request.
    async fn call(&self, req: &mut Request, res: &mut Response) -> HandlerResult;
}

/// A handler that only runs while an error is in flight.
///
/// Returning `Ok(Flow::Next)` clears the error; returning `Err` passes it (or
/// a replacement) on.
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    /// Handles the in-flight error.
    async fn call(&self, err: JunctionError, req: &mut Request, res: &mut Response)
        -> HandlerResult;
}

/// A callback registered with [`Router::param`], run before the first layer
/// that captures the parameter.
#[async_trait]
pub trait ParamHandler: Send + Sync {
    /// Pre-processes the captured `value`.
    async fn call(&self, req: &mut Request, res: &mut Response, value: String) -> HandlerResult;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    async fn call(&self, req: &mut Request, res: &mut Response) -> HandlerResult {
        (self.0)(req, res).await
    }
}

struct FnErrorHandler<F>(F);

#[async_trait]
impl<F> ErrorHandler for FnErrorHandler<F>
where
    F: for<'a> Fn(JunctionError, &'a mut Request, &'a mut Response) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    async fn call(
        &self,
        err: JunctionError,
        req: &mut Request,
        res: &mut Response,
    ) -> HandlerResult {
        (self.0)(err, req, res).await
    }
}

struct FnParamHandler<F>(F);

#[async_trait]
impl<F> ParamHandler for FnParamHandler<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response, String) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    async fn call(&self, req: &mut Request, res: &mut Response, value: String) -> HandlerResult {
        (self.0)(req, res, value).await
    }
}

/// Wraps a closure as a request handler.
///
/// # Examples
///
/// ```
/// use junction_http::routing::{handler, Flow};
///
/// let hello = handler(|_req, res| Box::pin(async move {
///     res.send("hello");
///     Ok(Flow::Done)
/// }));
/// ```
pub fn handler<F>(f: F) -> Callback
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    Callback::Handler(Arc::new(FnHandler(f)))
}

/// Wraps a closure as an error handler.
pub fn error_handler<F>(f: F) -> Callback
where
    F: for<'a> Fn(JunctionError, &'a mut Request, &'a mut Response) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    Callback::ErrorHandler(Arc::new(FnErrorHandler(f)))
}

/// Wraps a closure as a parameter callback.
pub fn param_handler<F>(f: F) -> Arc<dyn ParamHandler>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response, String) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnParamHandler(f))
}

/// One callback in a layer or route.
///
/// The variant decides when it runs: handlers and routers only while no
/// error is in flight, error handlers only while one is.
#[derive(Clone)]
pub enum Callback {
    /// A request handler.
    Handler(Arc<dyn Handler>),
    /// An error handler.
    ErrorHandler(Arc<dyn ErrorHandler>),
    /// A mounted router.
    Router(Arc<Router>),
}

impl Callback {
    /// Wraps a [`Handler`] implementation.
    pub fn from_handler(handler: impl Handler + 'static) -> Self {
        Self::Handler(Arc::new(handler))
    }

    /// Wraps an [`ErrorHandler`] implementation.
    pub fn from_error_handler(handler: impl ErrorHandler + 'static) -> Self {
        Self::ErrorHandler(Arc::new(handler))
    }

    pub(crate) const fn kind(&self) -> &'static str {
        match self {
            Self::Handler(_) => "handler",
            Self::ErrorHandler(_) => "error handler",
            Self::Router(_) => "router",
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Router(router) => f.debug_tuple("Router").field(router).finish(),
            other => f.write_str(other.kind()),
        }
    }
}

impl From<Router> for Callback {
    fn from(router: Router) -> Self {
        Self::Router(Arc::new(router))
    }
}

impl From<Arc<Router>> for Callback {
    fn from(router: Arc<Router>) -> Self {
        Self::Router(router)
    }
}

/// One or more callbacks passed to a registration function.
#[derive(Debug, Clone, Default)]
pub struct Callbacks(Vec<Callback>);

impl Callbacks {
    /// Unwraps the list, rejecting an empty one.
    ///
    /// # Errors
    ///
    /// Returns [`JunctionError::ImproperlyConfigured`] naming `context` when
    /// no callback was given.
    pub fn require(self, context: &str) -> JunctionResult<Vec<Callback>> {
        if self.0.is_empty() {
            return Err(JunctionError::ImproperlyConfigured(format!(
                "{context} requires at least one callback"
            )));
        }
        Ok(self.0)
    }
}

impl From<Callback> for Callbacks {
    fn from(callback: Callback) -> Self {
        Self(vec![callback])
    }
}

impl From<Router> for Callbacks {
    fn from(router: Router) -> Self {
        Self(vec![router.into()])
    }
}

impl From<Arc<Router>> for Callbacks {
    fn from(router: Arc<Router>) -> Self {
        Self(vec![router.into()])
    }
}

impl From<Vec<Callback>> for Callbacks {
    fn from(callbacks: Vec<Callback>) -> Self {
        Self(callbacks)
    }
}

impl<const N: usize> From<[Callback; N]> for Callbacks {
    fn from(callbacks: [Callback; N]) -> Self {
        Self(callbacks.into())
    }
}

/// Where dispatch goes after one layer or route has run.
#[derive(Debug)]
pub(crate) enum Signal {
    /// Keep scanning, possibly with an error in flight.
    Continue(Option<JunctionError>),
    /// Leave the current router without an error.
    ExitRouter,
    /// The response is complete.
    Done,
}

impl Signal {
    pub(crate) fn from_result(result: HandlerResult) -> Self {
        match result {
            Ok(Flow::Next | Flow::NextRoute) => Self::Continue(None),
            Ok(Flow::NextRouter) => Self::ExitRouter,
            Ok(Flow::Done) => Self::Done,
            Err(err) => Self::Continue(Some(err)),
        }
    }

    pub(crate) fn from_outcome(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Handled => Self::Done,
            Outcome::Unhandled(err) => Self::Continue(err),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}

/// Awaits a handler future, turning a panic into an in-flight error.
pub(crate) async fn invoke<F>(future: F) -> HandlerResult
where
    F: Future<Output = HandlerResult>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(&*payload);
            tracing::warn!(panic = %message, "handler panicked");
            Err(JunctionError::HandlerPanicked(message))
        }
    }
}
