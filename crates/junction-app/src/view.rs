//! View lookup and rendering.
//!
//! A view name is resolved to a file by trying each configured views
//! directory in order. A name without an extension gets the default engine's
//! extension. For every directory `<dir>/<name>` is tried first, then
//! `<dir>/<stem>/index.<ext>`. The file is then rendered by the engine
//! registered for its extension.
//!
//! Template syntax is up to the engine: anything implementing [`ViewEngine`]
//! (including a plain closure) can be registered with
//! [`App::engine`](crate::App::engine).

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use junction_core::{JunctionError, JunctionResult};
use junction_http::Response;

use crate::app::AppContext;

/// Renders a view file with a set of locals.
pub trait ViewEngine: Send + Sync {
    /// Renders the file at `path`. `locals` is always a JSON object.
    fn render(&self, path: &Path, locals: &Value) -> JunctionResult<String>;
}

impl<F> ViewEngine for F
where
    F: Fn(&Path, &Value) -> JunctionResult<String> + Send + Sync,
{
    fn render(&self, path: &Path, locals: &Value) -> JunctionResult<String> {
        self(path, locals)
    }
}

/// Normalizes an engine extension to its dotted form (`"html"` -> `".html"`).
pub(crate) fn dotted(ext: &str) -> String {
    if ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{ext}")
    }
}

/// A view name resolved to a file and an engine.
#[derive(Clone)]
pub struct View {
    name: String,
    ext: String,
    path: PathBuf,
    engine: Arc<dyn ViewEngine>,
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("name", &self.name)
            .field("ext", &self.ext)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl View {
    /// Resolves `name` against `roots`.
    ///
    /// # Errors
    ///
    /// - [`JunctionError::ImproperlyConfigured`] if the name has no extension
    ///   and there is no default engine.
    /// - [`JunctionError::EngineNotFound`] if no engine handles the extension.
    /// - [`JunctionError::ViewNotFound`] if no file exists in any root.
    pub fn lookup(
        name: &str,
        roots: &[PathBuf],
        default_engine: Option<&str>,
        engines: &HashMap<String, Arc<dyn ViewEngine>>,
    ) -> JunctionResult<Self> {
        let (ext, file_name) = match Path::new(name).extension() {
            Some(ext) => (format!(".{}", ext.to_string_lossy()), name.to_string()),
            None => {
                let Some(default_engine) = default_engine else {
                    return Err(JunctionError::ImproperlyConfigured(
                        "No default engine was specified and no extension was provided.".into(),
                    ));
                };
                let ext = dotted(default_engine);
                let file_name = format!("{name}{ext}");
                (ext, file_name)
            }
        };

        let engine = engines
            .get(&ext)
            .cloned()
            .ok_or_else(|| JunctionError::EngineNotFound(ext.clone()))?;

        let path = roots
            .iter()
            .find_map(|root| resolve(&root.join(&file_name), &ext))
            .ok_or_else(|| JunctionError::ViewNotFound(not_found_message(name, roots)))?;

        tracing::debug!(view = name, path = %path.display(), "resolved view");
        Ok(Self {
            name: name.to_string(),
            ext,
            path,
            engine,
        })
    }

    /// Returns the name the view was looked up by.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the dotted extension selecting the engine.
    pub fn ext(&self) -> &str {
        &self.ext
    }

    /// Returns the resolved file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Renders the view. A panicking engine becomes a render error.
    ///
    /// # Errors
    ///
    /// Returns whatever the engine returns, or [`JunctionError::RenderError`]
    /// if it panics.
    pub fn render(&self, locals: &Map<String, Value>) -> JunctionResult<String> {
        let locals = Value::Object(locals.clone());
        catch_unwind(AssertUnwindSafe(|| self.engine.render(&self.path, &locals))).unwrap_or_else(
            |payload| {
                let message = panic_message(&*payload);
                tracing::warn!(view = %self.name, panic = %message, "view engine panicked");
                Err(JunctionError::RenderError(message))
            },
        )
    }
}

fn resolve(loc: &Path, ext: &str) -> Option<PathBuf> {
    if loc.is_file() {
        return Some(loc.to_path_buf());
    }
    let stem = loc.file_stem()?;
    let index = loc
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(stem)
        .join(format!("index{ext}"));
    index.is_file().then_some(index)
}

fn not_found_message(name: &str, roots: &[PathBuf]) -> String {
    let dirs = match roots {
        [] => "directory \"\"".to_string(),
        [root] => format!("directory \"{}\"", root.display()),
        [rest @ .., last] => format!(
            "directories \"{}\" or \"{}\"",
            rest.iter()
                .map(|root| root.display().to_string())
                .collect::<Vec<_>>()
                .join("\", \""),
            last.display()
        ),
    };
    format!("Failed to lookup view \"{name}\" in views {dirs}")
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "view engine panicked".to_string())
}

/// Rendering through the application that is dispatching the request.
pub trait RenderExt {
    /// Renders `name` and sends the result as HTML.
    ///
    /// Locals are merged in order: application locals, then response
    /// locals, then `locals`. `locals` must be a JSON object or `null`.
    fn render(&mut self, name: &str, locals: Value) -> JunctionResult<()>;
}

impl RenderExt for Response {
    fn render(&mut self, name: &str, locals: Value) -> JunctionResult<()> {
        let context = self.extension::<Arc<AppContext>>().cloned().ok_or_else(|| {
            JunctionError::ImproperlyConfigured(
                "render() requires a response dispatched by an application".into(),
            )
        })?;

        let mut merged = self.locals().clone();
        match locals {
            Value::Null => {}
            Value::Object(call_locals) => merged.extend(call_locals),
            other => {
                return Err(JunctionError::RenderError(format!(
                    "render locals must be an object, got {other}"
                )))
            }
        }

        let html = context.render(name, merged)?;
        self.send(html);
        Ok(())
    }
}
