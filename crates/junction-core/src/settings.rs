//! Settings for junction applications.
//!
//! Each application owns one [`Settings`] value. There is no global instance:
//! a mounted sub-application inherits from its parent through
//! [`Settings::inherit_from`], which copies every setting the child has not
//! set itself.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The environment name used when none is configured.
pub const DEFAULT_ENV: &str = "development";

/// Names of the individually settable application settings.
///
/// The boolean settings can be toggled with `enable`/`disable` on an
/// application; the others have dedicated setters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Setting {
    /// The environment name (`env`).
    Env,
    /// Whether route matching is case sensitive.
    CaseSensitiveRouting,
    /// Whether trailing slashes must match exactly.
    StrictRouting,
    /// The directories searched for views.
    Views,
    /// The default view engine extension.
    ViewEngine,
    /// Whether resolved views are cached.
    ViewCache,
    /// Whether the `X-Powered-By` header is sent.
    XPoweredBy,
    /// The log level filter.
    LogLevel,
}

impl Setting {
    /// Every setting, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Env,
        Self::CaseSensitiveRouting,
        Self::StrictRouting,
        Self::Views,
        Self::ViewEngine,
        Self::ViewCache,
        Self::XPoweredBy,
        Self::LogLevel,
    ];

    /// Returns the human-readable name of this setting.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Env => "env",
            Self::CaseSensitiveRouting => "case sensitive routing",
            Self::StrictRouting => "strict routing",
            Self::Views => "views",
            Self::ViewEngine => "view engine",
            Self::ViewCache => "view cache",
            Self::XPoweredBy => "x-powered-by",
            Self::LogLevel => "log level",
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The complete set of application settings.
///
/// # Examples
///
/// ```
/// use junction_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert_eq!(settings.env, "development");
/// assert!(!settings.view_cache);
///
/// let production = Settings::for_env("production");
/// assert!(production.view_cache);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// The environment name, `"development"` unless configured.
    pub env: String,
    /// Whether `/Foo` and `/foo` are different routes.
    pub case_sensitive_routing: bool,
    /// Whether `/foo` and `/foo/` are different routes.
    pub strict_routing: bool,
    /// Directories searched, in order, when looking up a view.
    pub views: Vec<PathBuf>,
    /// Extension used for view names that have none (e.g. `"html"`).
    pub view_engine: Option<String>,
    /// Whether resolved views are cached by name.
    pub view_cache: bool,
    /// Whether responses carry `X-Powered-By: Junction`.
    pub x_powered_by: bool,
    /// The tracing filter directive (e.g. "debug", "info").
    pub log_level: String,
    /// Application-defined values.
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::for_env(DEFAULT_ENV)
    }
}

impl Settings {
    /// Returns the default settings for the named environment.
    ///
    /// View caching is enabled only in `"production"`.
    pub fn for_env(env: &str) -> Self {
        Self {
            env: env.to_string(),
            case_sensitive_routing: false,
            strict_routing: false,
            views: vec![PathBuf::from("views")],
            view_engine: None,
            view_cache: env == "production",
            x_powered_by: true,
            log_level: "info".to_string(),
            extra: HashMap::new(),
        }
    }

    /// Returns true when running in the production environment.
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }

    /// Returns the value of a boolean setting, or `None` for non-boolean ones.
    pub const fn flag(&self, setting: Setting) -> Option<bool> {
        match setting {
            Setting::CaseSensitiveRouting => Some(self.case_sensitive_routing),
            Setting::StrictRouting => Some(self.strict_routing),
            Setting::ViewCache => Some(self.view_cache),
            Setting::XPoweredBy => Some(self.x_powered_by),
            Setting::Env | Setting::Views | Setting::ViewEngine | Setting::LogLevel => None,
        }
    }

    /// Sets a boolean setting. Returns false if `setting` is not boolean.
    pub fn set_flag(&mut self, setting: Setting, value: bool) -> bool {
        let slot = match setting {
            Setting::CaseSensitiveRouting => &mut self.case_sensitive_routing,
            Setting::StrictRouting => &mut self.strict_routing,
            Setting::ViewCache => &mut self.view_cache,
            Setting::XPoweredBy => &mut self.x_powered_by,
            Setting::Env | Setting::Views | Setting::ViewEngine | Setting::LogLevel => {
                return false
            }
        };
        *slot = value;
        true
    }

    /// Copies from `parent` every setting not listed in `own`.
    ///
    /// `extra` values are merged, with the child's entries taking precedence.
    pub fn inherit_from(&mut self, parent: &Self, own: &BTreeSet<Setting>) {
        for setting in Setting::ALL {
            if own.contains(&setting) {
                continue;
            }
            match setting {
                Setting::Env => self.env.clone_from(&parent.env),
                Setting::Views => self.views.clone_from(&parent.views),
                Setting::ViewEngine => self.view_engine.clone_from(&parent.view_engine),
                Setting::LogLevel => self.log_level.clone_from(&parent.log_level),
                flag => {
                    if let Some(value) = parent.flag(flag) {
                        self.set_flag(flag, value);
                    }
                }
            }
        }
        for (key, value) in &parent.extra {
            self.extra
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
}
