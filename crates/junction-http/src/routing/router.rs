//! The dispatch engine.
//!
//! A [`Router`] holds [`Layer`]s in registration order. [`Router::dispatch`]
//! walks them once per request: each layer whose pattern matches the current
//! path view and that is eligible (see below) runs, and its [`Flow`] decides
//! what happens next.
//!
//! Eligibility while walking:
//!
//! - routes run only with no error in flight and only if they handle the
//!   request method;
//! - handlers and mounted routers run only with no error in flight;
//! - error handlers run only with an error in flight.
//!
//! Non-route layers see the request with the matched prefix moved from
//! [`Request::url`] to [`Request::base_url`]. Both are put back when the
//! layer returns. On leaving the router the parameter set, the base URL and
//! any scope extensions are restored whatever the outcome.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::{Extensions, Method};
use tracing::{debug, trace};

use junction_core::{JunctionError, JunctionResult};

use super::handler::{
    invoke, BoxFuture, Callback, Callbacks, Flow, HandlerResult, ParamHandler, Signal,
};
use super::layer::{Layer, LayerKind};
use super::params::{ParamKey, Params};
use super::pattern::{PathMatch, PathPattern, PathSpec, PatternOptions};
use super::route::Route;
use crate::method::HttpMethod;
use crate::request::Request;
use crate::response::Response;

/// Router configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterOptions {
    /// Match path letter case exactly.
    pub case_sensitive: bool,
    /// Treat `/foo` and `/foo/` as different routes.
    pub strict: bool,
    /// Let handlers see the parameters captured by enclosing routers.
    pub merge_params: bool,
}

impl RouterOptions {
    /// Default options: case-insensitive, non-strict, unmerged.
    pub const fn new() -> Self {
        Self {
            case_sensitive: false,
            strict: false,
            merge_params: false,
        }
    }

    /// Sets `case_sensitive`.
    #[must_use]
    pub const fn case_sensitive(mut self, value: bool) -> Self {
        self.case_sensitive = value;
        self
    }

    /// Sets `strict`.
    #[must_use]
    pub const fn strict(mut self, value: bool) -> Self {
        self.strict = value;
        self
    }

    /// Sets `merge_params`.
    #[must_use]
    pub const fn merge_params(mut self, value: bool) -> Self {
        self.merge_params = value;
        self
    }
}

/// Extensions a router makes visible while it is dispatching.
///
/// They are added to the request and response on entry. On exit both
/// extension tables are put back exactly as they were.
#[derive(Debug, Clone, Default)]
pub struct RouterScope {
    /// Added to [`Request::extensions_mut`].
    pub request: Extensions,
    /// Added to [`Response::extensions_mut`].
    pub response: Extensions,
}

/// A param callback run remembered for the rest of one dispatch.
#[derive(Debug)]
struct ParamCall {
    /// The value as captured.
    captured: String,
    /// The value after the callbacks ran.
    value: String,
    /// Status and message of the error the callbacks returned, if any.
    failure: Option<(u16, String)>,
}

/// How a dispatch ended.
#[derive(Debug)]
pub enum Outcome {
    /// A layer finished the response.
    Handled,
    /// The router ran out of layers, possibly with an error in flight.
    Unhandled(Option<JunctionError>),
}

/// An ordered set of layers and the engine that dispatches through them.
///
/// # Examples
///
/// ```
/// use junction_http::routing::{handler, Flow, Outcome, Router};
/// use junction_http::{Request, Response};
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let mut router = Router::new();
/// router
///     .get("/user/:id", handler(|req, res| Box::pin(async move {
///         res.send(format!("user {}", req.param("id").unwrap_or_default()));
///         Ok(Flow::Done)
///     })))
///     .unwrap();
///
/// let mut req = Request::builder().url("/user/42").build();
/// let mut res = Response::new();
/// let outcome = router.dispatch(&mut req, &mut res).await.unwrap();
/// assert!(matches!(outcome, Outcome::Handled));
/// assert_eq!(res.text(), "user 42");
/// # });
/// ```
#[derive(Default)]
pub struct Router {
    layers: Vec<Layer>,
    options: RouterOptions,
    params: HashMap<String, Vec<Arc<dyn ParamHandler>>>,
    scope: Option<RouterScope>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut param_names: Vec<&String> = self.params.keys().collect();
        param_names.sort();
        f.debug_struct("Router")
            .field("layers", &self.layers.len())
            .field("options", &self.options)
            .field("params", &param_names)
            .field("scoped", &self.scope.is_some())
            .finish()
    }
}

macro_rules! router_methods {
    ($($fn_name:ident => $variant:ident, $name:literal;)+) => {
        impl Router {
            $(
                #[doc = concat!("Registers callbacks for `", $name, "` requests to `path`.")]
                ///
                /// # Errors
                ///
                /// Fails if the path does not compile or no callback is given.
                pub fn $fn_name(
                    &mut self,
                    path: impl Into<PathSpec>,
                    callbacks: impl Into<Callbacks>,
                ) -> JunctionResult<&mut Self> {
                    self.method(HttpMethod::$variant, path, callbacks)
                }
            )+
        }
    };
}

crate::for_each_method!(router_methods);

impl Router {
    /// Creates a router with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a router with the given options.
    pub fn with_options(options: RouterOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Returns the router's options.
    pub const fn router_options(&self) -> RouterOptions {
        self.options
    }

    /// Returns the layers in dispatch order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Sets the extensions made visible while this router dispatches.
    pub fn set_scope(&mut self, scope: RouterScope) {
        self.scope = Some(scope);
    }

    /// Returns the scope extensions, if any.
    pub const fn scope(&self) -> Option<&RouterScope> {
        self.scope.as_ref()
    }

    /// Registers middleware for every path.
    ///
    /// # Errors
    ///
    /// Returns [`JunctionError::ImproperlyConfigured`] if no callback is given.
    pub fn middleware(&mut self, callbacks: impl Into<Callbacks>) -> JunctionResult<&mut Self> {
        self.middleware_at("/", callbacks)
    }

    /// Registers middleware for paths starting with `path`.
    ///
    /// Each callback becomes its own layer. The callbacks see the request
    /// with the matched prefix stripped from its URL.
    ///
    /// # Errors
    ///
    /// Fails if the path does not compile or no callback is given.
    pub fn middleware_at(
        &mut self,
        path: impl Into<PathSpec>,
        callbacks: impl Into<Callbacks>,
    ) -> JunctionResult<&mut Self> {
        let callbacks = callbacks.into().require("Router.use()")?;
        let pattern = PathPattern::compile(
            path.into(),
            PatternOptions::prefix(self.options.case_sensitive),
        )?;
        for callback in callbacks {
            trace!(path = %pattern, kind = callback.kind(), "registered layer");
            self.layers
                .push(Layer::new(pattern.clone(), LayerKind::Callback(callback)));
        }
        Ok(self)
    }

    /// Mounts another router under `path`.
    ///
    /// # Errors
    ///
    /// Fails if the path does not compile.
    pub fn mount(
        &mut self,
        path: impl Into<PathSpec>,
        router: impl Into<Arc<Self>>,
    ) -> JunctionResult<&mut Self> {
        self.middleware_at(path, Callback::Router(router.into()))
    }

    /// Creates a route for `path` and returns it for method registration.
    ///
    /// # Errors
    ///
    /// Returns [`JunctionError::InvalidPattern`] if the path does not compile.
    ///
    /// # Examples
    ///
    /// ```
    /// use junction_http::routing::{handler, Flow, Router};
    ///
    /// let mut router = Router::new();
    /// router
    ///     .route("/users")
    ///     .unwrap()
    ///     .get(handler(|_req, res| Box::pin(async move { res.send("list"); Ok(Flow::Done) })))
    ///     .unwrap()
    ///     .post(handler(|_req, res| Box::pin(async move { res.send("create"); Ok(Flow::Done) })))
    ///     .unwrap();
    /// assert_eq!(router.layers().len(), 1);
    /// ```
    pub fn route(&mut self, path: impl Into<PathSpec>) -> JunctionResult<&mut Route> {
        let spec = path.into();
        let route = Route::new(spec.to_string());
        let pattern = PathPattern::compile(
            spec,
            PatternOptions::route(self.options.case_sensitive, self.options.strict),
        )?;
        trace!(path = %pattern, "registered route");
        self.layers.push(Layer::new(pattern, LayerKind::Route(route)));

        self.layers
            .last_mut()
            .and_then(Layer::route_mut)
            .ok_or_else(|| JunctionError::ImproperlyConfigured("route was not registered".into()))
    }

    /// Registers callbacks for one method on a new route.
    ///
    /// # Errors
    ///
    /// Fails if the path does not compile or no callback is given.
    pub fn method(
        &mut self,
        method: HttpMethod,
        path: impl Into<PathSpec>,
        callbacks: impl Into<Callbacks>,
    ) -> JunctionResult<&mut Self> {
        self.route(path)?.method(method, callbacks)?;
        Ok(self)
    }

    /// Registers callbacks for every method on a new route.
    ///
    /// # Errors
    ///
    /// Fails if the path does not compile or no callback is given.
    pub fn all(
        &mut self,
        path: impl Into<PathSpec>,
        callbacks: impl Into<Callbacks>,
    ) -> JunctionResult<&mut Self> {
        self.route(path)?.all(callbacks)?;
        Ok(self)
    }

    /// Registers a callback for the named route parameter.
    ///
    /// It runs before the first eligible layer capturing `name`, at most
    /// once per distinct value per dispatch. Its result is handled like a
    /// handler's, except that `Flow::NextRoute` skips that layer.
    ///
    /// # Errors
    ///
    /// Returns [`JunctionError::ImproperlyConfigured`] for an empty name.
    pub fn param(
        &mut self,
        name: &str,
        handler: Arc<dyn ParamHandler>,
    ) -> JunctionResult<&mut Self> {
        let name = name.strip_prefix(':').unwrap_or(name);
        if name.is_empty() {
            return Err(JunctionError::ImproperlyConfigured(
                "Router.param() requires a parameter name".into(),
            ));
        }
        self.params.entry(name.to_string()).or_default().push(handler);
        Ok(self)
    }

    /// Dispatches a request through the layers.
    ///
    /// # Errors
    ///
    /// Returns `Err` only for failures that must not reach error handlers,
    /// such as a malformed percent-escape in a captured parameter. Errors
    /// raised by handlers come back as [`Outcome::Unhandled`].
    pub fn dispatch<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
    ) -> BoxFuture<'a, JunctionResult<Outcome>> {
        Box::pin(async move {
            let parent_params = req.params().clone();
            let parent_base = req.base_url().to_string();
            let saved_extensions = self.scope.as_ref().map(|scope| {
                let saved = (req.extensions().clone(), res.extensions().clone());
                req.extensions_mut().extend(scope.request.clone());
                res.extensions_mut().extend(scope.response.clone());
                saved
            });

            let result = self.scan(req, res, &parent_params, &parent_base).await;

            req.set_params(parent_params);
            req.set_base_url(parent_base);
            if let Some((request_extensions, response_extensions)) = saved_extensions {
                *req.extensions_mut() = request_extensions;
                *res.extensions_mut() = response_extensions;
            }
            result
        })
    }

    async fn scan(
        &self,
        req: &mut Request,
        res: &mut Response,
        parent_params: &Params,
        parent_base: &str,
    ) -> JunctionResult<Outcome> {
        let mut pending: Option<JunctionError> = None;
        let mut allowed: Vec<HttpMethod> = Vec::new();
        let mut called: HashMap<String, ParamCall> = HashMap::new();

        for layer in &self.layers {
            let path = req.path().to_string();
            let Some(PathMatch {
                path: matched,
                params,
            }) = layer.matches(&path)?
            else {
                continue;
            };

            match layer.kind() {
                LayerKind::Route(route) => {
                    if pending.is_some() {
                        continue;
                    }
                    if !route.handles_method(req.http_method()) {
                        if req.method() == Method::OPTIONS {
                            for method in route.allowed_methods() {
                                if !allowed.contains(&method) {
                                    allowed.push(method);
                                }
                            }
                        }
                        continue;
                    }
                }
                LayerKind::Callback(callback) => {
                    let eligible = match callback {
                        Callback::ErrorHandler(_) => pending.is_some(),
                        Callback::Handler(_) | Callback::Router(_) => pending.is_none(),
                    };
                    if !eligible {
                        continue;
                    }
                    if !on_boundary(&path, &matched) {
                        continue;
                    }
                }
            }

            trace!(layer = %layer.pattern(), path = %path, "layer matched");
            let params = if self.options.merge_params {
                params.merged_over(parent_params)
            } else {
                params
            };
            req.set_params(params);

            if pending.is_none() {
                match self.process_params(layer, &mut called, req, res).await {
                    Ok(Flow::Next) => {}
                    Ok(Flow::NextRoute) => continue,
                    Ok(Flow::NextRouter) => return Ok(Outcome::Unhandled(None)),
                    Ok(Flow::Done) => return Ok(Outcome::Handled),
                    Err(err) => {
                        pending = Some(err);
                        continue;
                    }
                }
                // Param callbacks may rewrite the URL out from under a prefix.
                if matches!(layer.kind(), LayerKind::Callback(_))
                    && !on_boundary(req.path(), &matched)
                {
                    continue;
                }
            }

            let signal = match layer.kind() {
                LayerKind::Route(route) => {
                    req.set_route_path(Some(route.path().to_string()));
                    route.dispatch(req, res).await?
                }
                LayerKind::Callback(callback) => {
                    let err = pending.take();
                    Self::run_callback(callback, &matched, parent_base, err, req, res).await?
                }
            };

            match signal {
                Signal::Continue(err) => pending = err,
                Signal::ExitRouter => return Ok(Outcome::Unhandled(None)),
                Signal::Done => return Ok(Outcome::Handled),
            }
        }

        if pending.is_none() && req.method() == Method::OPTIONS && !allowed.is_empty() {
            let body = allowed
                .iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(",");
            debug!(allow = %body, "answering OPTIONS");
            res.set("Allow", &body)?;
            res.send(body);
            return Ok(Outcome::Handled);
        }

        Ok(Outcome::Unhandled(pending))
    }

    async fn process_params(
        &self,
        layer: &Layer,
        called: &mut HashMap<String, ParamCall>,
        req: &mut Request,
        res: &mut Response,
    ) -> HandlerResult {
        if self.params.is_empty() {
            return Ok(Flow::Next);
        }

        for key in layer.pattern().keys() {
            let ParamKey::Name(name) = key else {
                continue;
            };
            let Some(handlers) = self.params.get(name) else {
                continue;
            };
            let Some(value) = req.param(name).map(str::to_string) else {
                continue;
            };

            if let Some(previous) = called.get(name).filter(|call| call.captured == value) {
                if let Some((status, message)) = &previous.failure {
                    return Err(JunctionError::status(*status, message.clone()));
                }
                req.params_mut().insert(name.as_str(), previous.value.clone());
                continue;
            }

            let mut flow = Ok(Flow::Next);
            for handler in handlers {
                flow = invoke(handler.call(req, res, value.clone())).await;
                if !matches!(flow, Ok(Flow::Next)) {
                    break;
                }
            }
            let current = req.param(name).unwrap_or(&value).to_string();
            called.insert(
                name.clone(),
                ParamCall {
                    captured: value,
                    value: current,
                    failure: flow
                        .as_ref()
                        .err()
                        .map(|err| (err.status_code(), err.to_string())),
                },
            );
            if !matches!(flow, Ok(Flow::Next)) {
                return flow;
            }
        }
        Ok(Flow::Next)
    }

    /// Runs a non-route layer with `prefix` moved from the URL to the base URL.
    async fn run_callback(
        callback: &Callback,
        prefix: &str,
        parent_base: &str,
        err: Option<JunctionError>,
        req: &mut Request,
        res: &mut Response,
    ) -> JunctionResult<Signal> {
        let mut slash_added = false;
        if !prefix.is_empty() {
            let Some(rest) = req.url().get(prefix.len()..) else {
                return Ok(Signal::Continue(err));
            };
            let mut rest = rest.to_string();
            if !rest.starts_with('/') {
                rest.insert(0, '/');
                slash_added = true;
            }
            req.set_url(rest);
            req.set_base_url(format!(
                "{parent_base}{}",
                prefix.strip_suffix('/').unwrap_or(prefix)
            ));
        }

        let result = match callback {
            Callback::Handler(handler) => Ok(Signal::from_result(invoke(handler.call(req, res)).await)),
            Callback::ErrorHandler(handler) => match err {
                Some(err) => Ok(Signal::from_result(invoke(handler.call(err, req, res)).await)),
                None => Ok(Signal::Continue(None)),
            },
            Callback::Router(router) => {
                debug!(base_url = %req.base_url(), url = %req.url(), "entering mounted router");
                let outcome = router.dispatch(req, res).await;
                debug!(url = %prefix, "left mounted router");
                outcome.map(Signal::from_outcome)
            }
        };

        if !prefix.is_empty() {
            let url = req.url();
            let url = if slash_added {
                let mut chars = url.chars();
                chars.next();
                chars.as_str()
            } else {
                url
            };
            let restored = format!("{prefix}{url}");
            req.set_url(restored);
            req.set_base_url(parent_base.to_string());
        }
        result
    }
}

/// Whether `path` starts with `prefix` and the prefix ends on a segment boundary.
fn on_boundary(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| matches!(rest.chars().next(), None | Some('/' | '.')))
}
