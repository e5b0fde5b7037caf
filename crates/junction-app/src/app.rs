//! The application builder.
//!
//! [`App`] is where routes, middleware, settings, view engines and locals are
//! registered. Everything a request may need at runtime lives in a shared
//! [`AppContext`], which the app's router makes visible to handlers through
//! the request and response extensions:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use junction_app::{App, AppContext};
//! use junction_http::{handler, Flow};
//!
//! let mut app = App::new();
//! app.get("/", handler(|req, res| Box::pin(async move {
//!     let path = req.extension::<Arc<AppContext>>().map(|app| app.path());
//!     res.send(format!("mounted at {path:?}"));
//!     Ok(Flow::Done)
//! })))
//! .unwrap();
//! ```
//!
//! Sub-apps are mounted with [`App::mount_app`]. At mount time the child
//! inherits every setting it has not set itself, along with locals and view
//! engines it does not define.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use http::header::{HeaderName, HeaderValue};
use http::{Extensions, StatusCode};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use junction_core::settings_loader;
use junction_core::{JunctionError, JunctionResult, Setting, Settings};
use junction_http::routing::{Callbacks, ParamHandler, PathSpec, RouterScope};
use junction_http::{HttpMethod, Outcome, Request, Response, Route, Router, RouterOptions};

use crate::view::{dotted, View, ViewEngine};

/// Where a sub-app is mounted.
#[derive(Debug, Clone)]
pub struct MountPoint {
    /// The path spec the app was mounted at, as written.
    pub mountpath: String,
    /// The app it was mounted in.
    pub parent: Arc<AppContext>,
}

/// The runtime state of one application.
///
/// Shared between the [`App`] that builds it and every request the app
/// dispatches.
pub struct AppContext {
    settings: RwLock<Settings>,
    locals: RwLock<Map<String, Value>>,
    engines: RwLock<HashMap<String, Arc<dyn ViewEngine>>>,
    views: Mutex<HashMap<String, View>>,
    mount: OnceLock<MountPoint>,
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("path", &self.path())
            .field("settings", &*self.settings())
            .finish_non_exhaustive()
    }
}

impl AppContext {
    fn new(settings: Settings) -> Self {
        Self {
            settings: RwLock::new(settings),
            locals: RwLock::new(Map::new()),
            engines: RwLock::new(HashMap::new()),
            views: Mutex::new(HashMap::new()),
            mount: OnceLock::new(),
        }
    }

    /// Returns the current settings.
    pub fn settings(&self) -> RwLockReadGuard<'_, Settings> {
        self.settings.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn settings_mut(&self) -> RwLockWriteGuard<'_, Settings> {
        self.settings.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the locals shared by every render.
    pub fn locals(&self) -> Map<String, Value> {
        self.locals
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns where this app is mounted, if it is a sub-app.
    pub fn mount_point(&self) -> Option<&MountPoint> {
        self.mount.get()
    }

    /// Returns the mount path spec, `"/"` for a root app.
    pub fn mountpath(&self) -> &str {
        self.mount.get().map_or("/", |mount| mount.mountpath.as_str())
    }

    /// Returns the full mount path: the parent's path followed by the
    /// mount path. Empty for a root app.
    pub fn path(&self) -> String {
        match self.mount.get() {
            Some(mount) => format!("{}{}", mount.parent.path(), mount.mountpath),
            None => String::new(),
        }
    }

    /// Renders a view with the app locals overlaid by `locals`.
    ///
    /// When view caching is enabled the resolved file is remembered by name.
    ///
    /// # Errors
    ///
    /// Returns lookup errors from [`View::lookup`] and whatever the engine
    /// returns.
    pub fn render(&self, name: &str, locals: Map<String, Value>) -> JunctionResult<String> {
        let (cache, roots, default_engine) = {
            let settings = self.settings();
            (
                settings.view_cache,
                settings.views.clone(),
                settings.view_engine.clone(),
            )
        };

        let cached = if cache {
            self.views
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(name)
                .cloned()
        } else {
            None
        };

        let view = match cached {
            Some(view) => view,
            None => {
                let engines = self.engines.read().unwrap_or_else(PoisonError::into_inner);
                let view = View::lookup(name, &roots, default_engine.as_deref(), &engines)?;
                drop(engines);
                if cache {
                    self.views
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(name.to_string(), view.clone());
                }
                view
            }
        };

        let mut merged = self.locals();
        merged.extend(locals);
        view.render(&merged)
    }

    fn inherit(&self, parent: &Self, own: &BTreeSet<Setting>) {
        self.settings_mut().inherit_from(&parent.settings(), own);

        let parent_locals = parent.locals();
        let mut locals = self.locals.write().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in parent_locals {
            locals.entry(key).or_insert(value);
        }
        drop(locals);

        let parent_engines = parent
            .engines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let mut engines = self.engines.write().unwrap_or_else(PoisonError::into_inner);
        for (ext, engine) in parent_engines {
            engines.entry(ext).or_insert(engine);
        }
    }
}

/// An application under construction.
///
/// # Examples
///
/// ```
/// use junction_app::App;
/// use junction_core::{Setting, Settings};
/// use junction_http::{handler, Flow};
///
/// let mut app = App::with_settings(Settings::default());
/// app.enable(Setting::StrictRouting).unwrap();
/// app.get("/hello", handler(|_req, res| Box::pin(async move {
///     res.send("hello");
///     Ok(Flow::Done)
/// })))
/// .unwrap();
/// assert!(app.enabled(Setting::StrictRouting));
/// ```
pub struct App {
    context: Arc<AppContext>,
    own: BTreeSet<Setting>,
    router: Option<Router>,
    request_extensions: Extensions,
    response_extensions: Extensions,
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("context", &self.context)
            .field("own", &self.own)
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! app_methods {
    ($($fn_name:ident => $variant:ident, $name:literal;)+) => {
        impl App {
            $(
                #[doc = concat!("Registers callbacks for `", $name, "` requests to `path`.")]
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

junction_http::for_each_method!(app_methods);

impl App {
    /// Creates an app configured from the environment.
    pub fn new() -> Self {
        Self::with_settings(settings_loader::from_env())
    }

    /// Creates an app with explicit settings.
    ///
    /// Settings passed here count as unset for inheritance: a mounted app
    /// only keeps values changed through its setters afterwards.
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            context: Arc::new(AppContext::new(settings)),
            own: BTreeSet::new(),
            router: None,
            request_extensions: Extensions::new(),
            response_extensions: Extensions::new(),
        }
    }

    /// Returns the shared runtime context.
    pub const fn context(&self) -> &Arc<AppContext> {
        &self.context
    }

    /// Returns the current settings.
    pub fn settings(&self) -> RwLockReadGuard<'_, Settings> {
        self.context.settings()
    }

    /// Sets a boolean setting to true.
    ///
    /// # Errors
    ///
    /// Returns [`JunctionError::ConfigurationError`] for a setting that is
    /// not boolean.
    pub fn enable(&mut self, setting: Setting) -> JunctionResult<&mut Self> {
        self.set_flag(setting, true)
    }

    /// Sets a boolean setting to false.
    ///
    /// # Errors
    ///
    /// Returns [`JunctionError::ConfigurationError`] for a setting that is
    /// not boolean.
    pub fn disable(&mut self, setting: Setting) -> JunctionResult<&mut Self> {
        self.set_flag(setting, false)
    }

    /// Returns true if a boolean setting is on.
    pub fn enabled(&self, setting: Setting) -> bool {
        self.settings().flag(setting).unwrap_or(false)
    }

    /// Returns true if a boolean setting is off.
    pub fn disabled(&self, setting: Setting) -> bool {
        !self.enabled(setting)
    }

    fn set_flag(&mut self, setting: Setting, value: bool) -> JunctionResult<&mut Self> {
        if !self.context.settings_mut().set_flag(setting, value) {
            return Err(JunctionError::ConfigurationError(format!(
                "\"{setting}\" is not a boolean setting"
            )));
        }
        self.own.insert(setting);
        Ok(self)
    }

    /// Sets the environment name.
    pub fn set_env(&mut self, env: impl Into<String>) -> &mut Self {
        self.context.settings_mut().env = env.into();
        self.own.insert(Setting::Env);
        self
    }

    /// Sets the directories searched for views.
    pub fn set_views<I, P>(&mut self, views: I) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.context.settings_mut().views = views.into_iter().map(Into::into).collect();
        self.own.insert(Setting::Views);
        self
    }

    /// Sets the extension used for view names without one.
    pub fn set_view_engine(&mut self, ext: impl Into<String>) -> &mut Self {
        self.context.settings_mut().view_engine = Some(ext.into());
        self.own.insert(Setting::ViewEngine);
        self
    }

    /// Registers a view engine for an extension (`"html"` or `".html"`).
    pub fn engine(&mut self, ext: &str, engine: impl ViewEngine + 'static) -> &mut Self {
        self.context
            .engines
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(dotted(ext), Arc::new(engine));
        self
    }

    /// Sets a local visible to every render of this app.
    pub fn local(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.context
            .locals
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
        self
    }

    /// Returns a copy of the app locals.
    pub fn locals(&self) -> Map<String, Value> {
        self.context.locals()
    }

    /// Makes `value` available through `Request::extension` while this app
    /// dispatches a request.
    pub fn request_extension<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.request_extensions.insert(value);
        self
    }

    /// Makes `value` available through `Response::extension` while this app
    /// dispatches a request.
    pub fn response_extension<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.response_extensions.insert(value);
        self
    }

    /// Returns the mount path spec, `"/"` for a root app.
    pub fn mountpath(&self) -> String {
        self.context.mountpath().to_string()
    }

    /// Returns the full mount path, empty for a root app.
    pub fn path(&self) -> String {
        self.context.path()
    }

    /// Renders a view outside of any request.
    ///
    /// # Errors
    ///
    /// See [`AppContext::render`].
    pub fn render(&self, name: &str, locals: Map<String, Value>) -> JunctionResult<String> {
        self.context.render(name, locals)
    }

    /// Returns the root router, creating it from the routing settings on
    /// first use.
    pub fn router(&mut self) -> &mut Router {
        let options = self.router_options();
        self.router
            .get_or_insert_with(|| Router::with_options(options))
    }

    fn router_options(&self) -> RouterOptions {
        let settings = self.settings();
        RouterOptions::new()
            .case_sensitive(settings.case_sensitive_routing)
            .strict(settings.strict_routing)
    }

    /// Registers middleware for every path.
    pub fn middleware(&mut self, callbacks: impl Into<Callbacks>) -> JunctionResult<&mut Self> {
        self.router().middleware(callbacks)?;
        Ok(self)
    }

    /// Registers middleware for paths starting with `path`.
    pub fn middleware_at(
        &mut self,
        path: impl Into<PathSpec>,
        callbacks: impl Into<Callbacks>,
    ) -> JunctionResult<&mut Self> {
        self.router().middleware_at(path, callbacks)?;
        Ok(self)
    }

    /// Mounts a plain router under `path`.
    pub fn mount(
        &mut self,
        path: impl Into<PathSpec>,
        router: impl Into<Arc<Router>>,
    ) -> JunctionResult<&mut Self> {
        self.router().mount(path, router)?;
        Ok(self)
    }

    /// Mounts a sub-app under `path`.
    ///
    /// The child inherits the settings it did not set itself, plus locals
    /// and view engines it does not define. While it dispatches, its
    /// context and extensions are visible to handlers and replaced by the
    /// parent's again once it returns.
    ///
    /// # Errors
    ///
    /// Fails if the path does not compile.
    pub fn mount_app(&mut self, path: impl Into<PathSpec>, child: Self) -> JunctionResult<&mut Self> {
        let spec = path.into();
        let mountpath = spec.to_string();

        child.context.inherit(&self.context, &child.own);
        child
            .context
            .mount
            .set(MountPoint {
                mountpath: mountpath.clone(),
                parent: Arc::clone(&self.context),
            })
            .map_err(|_| {
                JunctionError::ImproperlyConfigured(format!("app mounted at \"{mountpath}\" twice"))
            })?;

        debug!(mountpath = %mountpath, parent = %self.path(), "mounted sub-app");
        let router = child.into_router();
        self.router().mount(spec, router)?;
        Ok(self)
    }

    /// Creates a route for `path`.
    pub fn route(&mut self, path: impl Into<PathSpec>) -> JunctionResult<&mut Route> {
        self.router().route(path)
    }

    /// Registers callbacks for one method on a new route.
    pub fn method(
        &mut self,
        method: HttpMethod,
        path: impl Into<PathSpec>,
        callbacks: impl Into<Callbacks>,
    ) -> JunctionResult<&mut Self> {
        self.router().method(method, path, callbacks)?;
        Ok(self)
    }

    /// Registers callbacks for every method on a new route.
    pub fn all(
        &mut self,
        path: impl Into<PathSpec>,
        callbacks: impl Into<Callbacks>,
    ) -> JunctionResult<&mut Self> {
        self.router().all(path, callbacks)?;
        Ok(self)
    }

    /// Registers a callback for a route parameter.
    pub fn param(&mut self, name: &str, handler: Arc<dyn ParamHandler>) -> JunctionResult<&mut Self> {
        self.router().param(name, handler)?;
        Ok(self)
    }

    /// Turns the app into its root router, scoped to the app's context and
    /// extensions.
    fn into_router(self) -> Router {
        let options = self.router_options();
        let mut router = self.router.unwrap_or_else(|| Router::with_options(options));

        let mut request = self.request_extensions;
        request.insert(Arc::clone(&self.context));
        let mut response = self.response_extensions;
        response.insert(Arc::clone(&self.context));
        router.set_scope(RouterScope { request, response });
        router
    }

    /// Freezes the app so it can serve requests.
    pub fn into_application(self) -> Application {
        let context = Arc::clone(&self.context);
        Application {
            router: self.into_router(),
            context,
        }
    }
}

/// A frozen app, ready to serve.
#[derive(Debug)]
pub struct Application {
    router: Router,
    context: Arc<AppContext>,
}

impl Application {
    /// Returns the shared runtime context.
    pub const fn context(&self) -> &Arc<AppContext> {
        &self.context
    }

    /// Dispatches one request and finishes it.
    ///
    /// A request no layer handled becomes `404 Cannot <METHOD> <path>`. An
    /// error that escaped every error handler becomes a response with the
    /// error's status; outside production its message is the body.
    pub async fn handle(&self, mut req: Request) -> Response {
        let (powered_by, production) = {
            let settings = self.context.settings();
            (settings.x_powered_by, settings.is_production())
        };

        let mut res = Response::new();
        if powered_by {
            res.headers_mut().insert(
                HeaderName::from_static("x-powered-by"),
                HeaderValue::from_static("Junction"),
            );
        }

        match self.router.dispatch(&mut req, &mut res).await {
            Ok(Outcome::Handled) => {}
            Ok(Outcome::Unhandled(None)) => not_found(&req, &mut res),
            Ok(Outcome::Unhandled(Some(err))) | Err(err) => {
                respond_with_error(&err, production, &mut res);
            }
        }
        res
    }
}

fn not_found(req: &Request, res: &mut Response) {
    let path = req
        .original_url()
        .split_once('?')
        .map_or(req.original_url(), |(path, _)| path);
    debug!(method = %req.method(), path = %path, "no layer handled the request");
    if res.is_finished() {
        return;
    }
    reset(res);
    res.set_status(StatusCode::NOT_FOUND);
    res.send(format!("Cannot {} {path}", req.method()));
}

fn respond_with_error(err: &JunctionError, production: bool, res: &mut Response) {
    let status = StatusCode::from_u16(err.status_code())
        .ok()
        .filter(|status| status.is_client_error() || status.is_server_error())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if status.is_server_error() {
        error!(status = status.as_u16(), error = %err, "unhandled error");
    } else {
        debug!(status = status.as_u16(), error = %err, "unhandled error");
    }

    if res.is_finished() {
        warn!(error = %err, "error raised after the response was finished");
        return;
    }

    reset(res);
    res.set_status(status);
    if production {
        res.send(status.canonical_reason().unwrap_or("Error"));
    } else {
        res.send(err.to_string());
    }
}

/// Drops headers a handler set before failing, keeping `X-Powered-By`.
fn reset(res: &mut Response) {
    let powered_by = res.headers().get("x-powered-by").cloned();
    res.headers_mut().clear();
    if let Some(value) = powered_by {
        res.headers_mut()
            .insert(HeaderName::from_static("x-powered-by"), value);
    }
    res.headers_mut().insert(
        HeaderName::from_static("content-security-policy"),
        HeaderValue::from_static("default-src 'none'"),
    );
    res.headers_mut().insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use junction_http::{error_handler, handler, Flow};

    fn settings() -> Settings {
        Settings::default()
    }

    #[test]
    fn test_enable_disable() {
        let mut app = App::with_settings(settings());
        assert!(app.disabled(Setting::CaseSensitiveRouting));
        app.enable(Setting::CaseSensitiveRouting).unwrap();
        assert!(app.enabled(Setting::CaseSensitiveRouting));
        app.disable(Setting::CaseSensitiveRouting).unwrap();
        assert!(app.disabled(Setting::CaseSensitiveRouting));
    }

    #[test]
    fn test_enable_rejects_non_boolean() {
        let mut app = App::with_settings(settings());
        let err = app.enable(Setting::Views).unwrap_err();
        assert!(matches!(err, JunctionError::ConfigurationError(_)));
    }

    #[test]
    fn test_router_created_from_settings() {
        let mut app = App::with_settings(settings());
        app.enable(Setting::StrictRouting).unwrap();
        let options = app.router().router_options();
        assert!(options.strict);
        assert!(!options.case_sensitive);
    }

    #[test]
    fn test_root_paths() {
        let app = App::with_settings(settings());
        assert_eq!(app.path(), "");
        assert_eq!(app.mountpath(), "/");
    }

    #[test]
    fn test_mount_records_parent() {
        let mut root = App::with_settings(settings());
        let mut blog = App::with_settings(settings());
        let admin = App::with_settings(settings());
        let admin_context = Arc::clone(admin.context());
        let blog_context = Arc::clone(blog.context());

        blog.mount_app("/admin", admin).unwrap();
        root.mount_app("/blog", blog).unwrap();

        assert_eq!(blog_context.path(), "/blog");
        assert_eq!(admin_context.path(), "/blog/admin");
        assert_eq!(admin_context.mountpath(), "/admin");
        let parent = &admin_context.mount_point().unwrap().parent;
        assert!(Arc::ptr_eq(parent, &blog_context));
    }

    #[test]
    fn test_mount_inherits_unset_settings() {
        let mut parent = App::with_settings(settings());
        parent.set_env("production").set_view_engine("tmpl");
        parent.local("title", "parent");

        let mut child = App::with_settings(settings());
        child.set_view_engine("html");
        child.local("title", "child");
        let context = Arc::clone(child.context());
        parent.mount_app("/child", child).unwrap();

        let settings = context.settings();
        assert_eq!(settings.env, "production");
        assert_eq!(settings.view_engine.as_deref(), Some("html"));
        drop(settings);
        assert_eq!(context.locals()["title"], "child");
    }

    #[tokio::test]
    async fn test_handle_not_found() {
        let app = App::with_settings(settings()).into_application();
        let req = Request::builder().url("/missing?x=1").build();
        let res = app.handle(req).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.text(), "Cannot GET /missing");
        assert_eq!(res.header("x-powered-by"), Some("Junction"));
        assert_eq!(res.header("x-content-type-options"), Some("nosniff"));
    }

    #[tokio::test]
    async fn test_handle_error_status() {
        let mut app = App::with_settings(settings());
        app.get(
            "/",
            handler(|_req, res| {
                Box::pin(async move {
                    res.set("X-Leak", "1")?;
                    Err(JunctionError::status(403, "no entry"))
                })
            }),
        )
        .unwrap();
        let res = app.into_application().handle(Request::builder().build()).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(res.text(), "no entry");
        assert!(res.header("x-leak").is_none());
    }

    #[tokio::test]
    async fn test_handle_error_hides_message_in_production() {
        let mut app = App::with_settings(Settings::for_env("production"));
        app.get(
            "/",
            handler(|_req, _res| Box::pin(async { Err(JunctionError::other("secret detail")) })),
        )
        .unwrap();
        let res = app.into_application().handle(Request::builder().build()).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.text(), "Internal Server Error");
    }

    #[tokio::test]
    async fn test_handle_out_of_range_status_is_500() {
        let mut app = App::with_settings(settings());
        app.get(
            "/",
            handler(|_req, _res| Box::pin(async { Err(JunctionError::status(302, "odd")) })),
        )
        .unwrap();
        let res = app.into_application().handle(Request::builder().build()).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_error_handler_recovers() {
        let mut app = App::with_settings(settings());
        app.get(
            "/",
            handler(|_req, _res| Box::pin(async { Err(JunctionError::BadRequest("bad".into())) })),
        )
        .unwrap()
        .middleware(error_handler(|err, _req, res| {
            Box::pin(async move {
                res.send(format!("handled {}", err.status_code()));
                Ok(Flow::Done)
            })
        }))
        .unwrap();
        let res = app.into_application().handle(Request::builder().build()).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.text(), "handled 400");
    }

    #[tokio::test]
    async fn test_x_powered_by_disabled() {
        let mut app = App::with_settings(settings());
        app.disable(Setting::XPoweredBy).unwrap();
        let res = app.into_application().handle(Request::builder().build()).await;
        assert!(res.header("x-powered-by").is_none());
    }
}
