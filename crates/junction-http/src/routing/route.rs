//! Routes: callbacks grouped under one path and filtered by method.

use junction_core::{JunctionError, JunctionResult};

use super::handler::{invoke, Callback, Callbacks, Flow, Signal};
use super::router::Outcome;
use crate::method::HttpMethod;
use crate::request::Request;
use crate::response::Response;

#[derive(Debug)]
struct RouteEntry {
    /// `None` for callbacks registered with [`Route::all`].
    method: Option<HttpMethod>,
    callback: Callback,
}

/// The callbacks registered for one path, in registration order.
///
/// A `HEAD` request runs the `GET` callbacks unless `HEAD` callbacks exist.
#[derive(Debug)]
pub struct Route {
    path: String,
    methods: Vec<HttpMethod>,
    all: bool,
    stack: Vec<RouteEntry>,
}

macro_rules! route_methods {
    ($($fn_name:ident => $variant:ident, $name:literal;)+) => {
        impl Route {
            $(
                #[doc = concat!("Appends callbacks for `", $name, "` requests.")]
                ///
                /// # Errors
                ///
                /// Fails if no callback is given.
                pub fn $fn_name(&mut self, callbacks: impl Into<Callbacks>) -> JunctionResult<&mut Self> {
                    self.method(HttpMethod::$variant, callbacks)
                }
            )+
        }
    };
}

crate::for_each_method!(route_methods);

impl Route {
    /// Creates an empty route for `path`, the path spec as written.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            methods: Vec::new(),
            all: false,
            stack: Vec::new(),
        }
    }

    /// Returns the path spec this route was registered with.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Appends callbacks for one method.
    ///
    /// # Errors
    ///
    /// Returns [`JunctionError::ImproperlyConfigured`] if no callback is given.
    pub fn method(
        &mut self,
        method: HttpMethod,
        callbacks: impl Into<Callbacks>,
    ) -> JunctionResult<&mut Self> {
        let callbacks = callbacks
            .into()
            .require(&format!("Route.{}()", method.as_str().to_ascii_lowercase()))?;
        if !self.methods.contains(&method) {
            self.methods.push(method);
        }
        self.stack.extend(callbacks.into_iter().map(|callback| RouteEntry {
            method: Some(method),
            callback,
        }));
        Ok(self)
    }

    /// Appends callbacks for every method.
    ///
    /// # Errors
    ///
    /// Returns [`JunctionError::ImproperlyConfigured`] if no callback is given.
    pub fn all(&mut self, callbacks: impl Into<Callbacks>) -> JunctionResult<&mut Self> {
        let callbacks = callbacks.into().require("Route.all()")?;
        self.all = true;
        self.stack.extend(
            callbacks
                .into_iter()
                .map(|callback| RouteEntry { method: None, callback }),
        );
        Ok(self)
    }

    /// Returns true if some callback would run for `method`.
    ///
    /// `None` stands for a request method outside the table; only `all`
    /// callbacks handle it.
    pub fn handles_method(&self, method: Option<HttpMethod>) -> bool {
        if self.all {
            return true;
        }
        method.is_some_and(|m| self.methods.contains(&self.effective_method(m)))
    }

    /// Returns the methods with dedicated callbacks, in registration order.
    /// `HEAD` is listed after them when only `GET` is registered.
    pub fn allowed_methods(&self) -> Vec<HttpMethod> {
        let mut methods = self.methods.clone();
        if methods.contains(&HttpMethod::Get) && !methods.contains(&HttpMethod::Head) {
            methods.push(HttpMethod::Head);
        }
        methods
    }

    fn effective_method(&self, method: HttpMethod) -> HttpMethod {
        if method == HttpMethod::Head && !self.methods.contains(&HttpMethod::Head) {
            HttpMethod::Get
        } else {
            method
        }
    }

    /// Runs the callbacks that apply to the request's method.
    pub(crate) async fn dispatch(
        &self,
        req: &mut Request,
        res: &mut Response,
    ) -> JunctionResult<Signal> {
        let method = req.http_method().map(|m| self.effective_method(m));
        let mut pending: Option<JunctionError> = None;

        for entry in &self.stack {
            if entry.method.is_some() && entry.method != method {
                continue;
            }

            let result = match &entry.callback {
                Callback::Handler(handler) => {
                    if pending.is_some() {
                        continue;
                    }
                    invoke(handler.call(req, res)).await
                }
                Callback::ErrorHandler(handler) => {
                    let Some(err) = pending.take() else {
                        continue;
                    };
                    invoke(handler.call(err, req, res)).await
                }
                Callback::Router(router) => {
                    if pending.is_some() {
                        continue;
                    }
                    match router.dispatch(req, res).await? {
                        Outcome::Handled => Ok(Flow::Done),
                        Outcome::Unhandled(None) => Ok(Flow::Next),
                        Outcome::Unhandled(Some(err)) => Err(err),
                    }
                }
            };

            match result {
                Ok(Flow::Next) => {}
                Ok(Flow::NextRoute) => return Ok(Signal::Continue(None)),
                Ok(Flow::NextRouter) => return Ok(Signal::ExitRouter),
                Ok(Flow::Done) => return Ok(Signal::Done),
                Err(err) => pending = Some(err),
            }
        }

        Ok(Signal::Continue(pending))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::routing::{error_handler, handler};

    fn record(log: &Arc<Mutex<Vec<String>>>, name: &'static str, flow: Flow) -> Callback {
        let log = Arc::clone(log);
        handler(move |_req, _res| {
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().unwrap().push(name.to_string());
                Ok(flow)
            })
        })
    }

    fn request(method: http::Method) -> Request {
        Request::builder().method(method).url("/").build()
    }

    #[test]
    fn test_handles_method() {
        let mut route = Route::new("/");
        let log = Arc::new(Mutex::new(Vec::new()));
        route.get(record(&log, "get", Flow::Done)).unwrap();
        assert!(route.handles_method(Some(HttpMethod::Get)));
        assert!(route.handles_method(Some(HttpMethod::Head)));
        assert!(!route.handles_method(Some(HttpMethod::Post)));
        assert!(!route.handles_method(None));

        route.all(record(&log, "all", Flow::Done)).unwrap();
        assert!(route.handles_method(Some(HttpMethod::Post)));
        assert!(route.handles_method(None));
    }

    #[test]
    fn test_allowed_methods_adds_head_after_get() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut route = Route::new("/");
        route
            .get(record(&log, "a", Flow::Done))
            .unwrap()
            .put(record(&log, "b", Flow::Done))
            .unwrap();
        assert_eq!(
            route.allowed_methods(),
            vec![HttpMethod::Get, HttpMethod::Put, HttpMethod::Head]
        );
    }

    #[test]
    fn test_empty_registration_rejected() {
        let mut route = Route::new("/");
        let err = route.post(Vec::new()).unwrap_err();
        assert!(err.to_string().contains("Route.post()"));
    }

    #[tokio::test]
    async fn test_runs_callbacks_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut route = Route::new("/");
        route
            .get([record(&log, "one", Flow::Next), record(&log, "two", Flow::Done)])
            .unwrap()
            .post(record(&log, "post", Flow::Done))
            .unwrap();

        let mut req = request(http::Method::GET);
        let mut res = Response::new();
        let signal = route.dispatch(&mut req, &mut res).await.unwrap();
        assert!(matches!(signal, Signal::Done));
        assert_eq!(*log.lock().unwrap(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_head_uses_get_callbacks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut route = Route::new("/");
        route.get(record(&log, "get", Flow::Done)).unwrap();

        let mut req = request(http::Method::HEAD);
        let mut res = Response::new();
        route.dispatch(&mut req, &mut res).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["get"]);
    }

    #[tokio::test]
    async fn test_next_route_skips_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut route = Route::new("/");
        route
            .get([record(&log, "skip", Flow::NextRoute), record(&log, "never", Flow::Done)])
            .unwrap();

        let mut req = request(http::Method::GET);
        let mut res = Response::new();
        let signal = route.dispatch(&mut req, &mut res).await.unwrap();
        assert!(matches!(signal, Signal::Continue(None)));
        assert_eq!(*log.lock().unwrap(), vec!["skip"]);
    }

    #[tokio::test]
    async fn test_error_skips_to_error_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let failing = handler(|_req, _res| {
            Box::pin(async { Err(JunctionError::status(500, "boom")) })
        });
        let recover = error_handler(|err, _req, res| {
            Box::pin(async move {
                res.send(err.to_string());
                Ok(Flow::Done)
            })
        });
        let mut route = Route::new("/");
        route
            .all([failing, record(&log, "skipped", Flow::Next), recover])
            .unwrap();

        let mut req = request(http::Method::GET);
        let mut res = Response::new();
        let signal = route.dispatch(&mut req, &mut res).await.unwrap();
        assert!(matches!(signal, Signal::Done));
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(res.text(), "boom");
    }

    #[tokio::test]
    async fn test_unhandled_error_is_returned() {
        let mut route = Route::new("/");
        route
            .get(handler(|_req, _res| {
                Box::pin(async { Err(JunctionError::BadRequest("nope".into())) })
            }))
            .unwrap();

        let mut req = request(http::Method::GET);
        let mut res = Response::new();
        let signal = route.dispatch(&mut req, &mut res).await.unwrap();
        assert!(matches!(signal, Signal::Continue(Some(JunctionError::BadRequest(_)))));
    }
}
