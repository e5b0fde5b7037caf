//! Settings loading from configuration files.
//!
//! ## Loading Order
//!
//! 1. Start with the defaults for the configured environment.
//! 2. Load from a TOML or JSON file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `JUNCTION_ENV` | `env` |
//! | `JUNCTION_LOG_LEVEL` | `log_level` |
//! | `JUNCTION_VIEWS` | `views` (comma-separated) |
//! | `JUNCTION_VIEW_ENGINE` | `view_engine` |
//! | `JUNCTION_VIEW_CACHE` | `view_cache` |
//! | `JUNCTION_CASE_SENSITIVE_ROUTING` | `case_sensitive_routing` |
//! | `JUNCTION_STRICT_ROUTING` | `strict_routing` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use junction_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("config/junction.toml").unwrap();
//! ```

use std::path::{Path, PathBuf};

use crate::error::JunctionError;
use crate::settings::{Settings, DEFAULT_ENV};

/// Loads settings from a TOML string.
///
/// Fields not present in the TOML keep the defaults of the environment named
/// by its `env` key (or `"development"`).
///
/// # Errors
///
/// Returns an error if the TOML is malformed or cannot be deserialized.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, JunctionError> {
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| JunctionError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;
    merge_with_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, JunctionError> {
    let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        JunctionError::ConfigurationError(format!(
            "Failed to read TOML file '{}': {e}",
            path.as_ref().display()
        ))
    })?;
    from_toml_str(&content)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, JunctionError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a JSON string.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or cannot be deserialized.
pub fn from_json_str(json_str: &str) -> Result<Settings, JunctionError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| JunctionError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;
    merge_with_defaults(json_value, "JSON")
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let env = std::env::var("JUNCTION_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());
    let mut settings = Settings::for_env(&env);
    apply_env_overrides(&mut settings);
    settings
}

/// Applies environment variable overrides to a settings struct.
///
/// Boolean variables accept "true"/"1"/"yes"; anything else is false.
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(val) = std::env::var("JUNCTION_ENV") {
        settings.env = val;
    }

    if let Ok(val) = std::env::var("JUNCTION_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Ok(val) = std::env::var("JUNCTION_VIEWS") {
        settings.views = val
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect();
    }

    if let Ok(val) = std::env::var("JUNCTION_VIEW_ENGINE") {
        settings.view_engine = Some(val).filter(|v| !v.is_empty());
    }

    if let Ok(val) = std::env::var("JUNCTION_VIEW_CACHE") {
        settings.view_cache = parse_bool(&val);
    }

    if let Ok(val) = std::env::var("JUNCTION_CASE_SENSITIVE_ROUTING") {
        settings.case_sensitive_routing = parse_bool(&val);
    }

    if let Ok(val) = std::env::var("JUNCTION_STRICT_ROUTING") {
        settings.strict_routing = parse_bool(&val);
    }
}

// ============================================================
// Helpers
// ============================================================

fn parse_bool(val: &str) -> bool {
    matches!(val.to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Merges a parsed document over the defaults of the environment it names.
fn merge_with_defaults(value: serde_json::Value, format: &str) -> Result<Settings, JunctionError> {
    let env = value
        .get("env")
        .and_then(serde_json::Value::as_str)
        .unwrap_or(DEFAULT_ENV);
    let default_json = serde_json::to_value(Settings::for_env(env)).map_err(|e| {
        JunctionError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, value);
    serde_json::from_value(merged).map_err(|e| {
        JunctionError::ConfigurationError(format!("Failed to deserialize settings from {format}: {e}"))
    })
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, serde_json::Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = if let Some(base_v) = base_map.remove(&key) {
                    merge_json(base_v, override_v)
                } else {
                    override_v
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml_str_basic() {
        let settings = from_toml_str(
            r#"
            strict_routing = true
            view_engine = "tmpl"
            views = ["templates", "shared"]
        "#,
        )
        .unwrap();
        assert!(settings.strict_routing);
        assert_eq!(settings.view_engine.as_deref(), Some("tmpl"));
        assert_eq!(
            settings.views,
            vec![PathBuf::from("templates"), PathBuf::from("shared")]
        );
        assert_eq!(settings.env, "development");
    }

    #[test]
    fn test_from_toml_str_production_defaults() {
        let settings = from_toml_str(r#"env = "production""#).unwrap();
        assert!(settings.view_cache);

        let settings = from_toml_str("env = \"production\"\nview_cache = false").unwrap();
        assert!(!settings.view_cache);
    }

    #[test]
    fn test_from_toml_str_empty() {
        let settings = from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_from_toml_str_invalid() {
        assert!(from_toml_str("this is [not valid").is_err());
    }

    #[test]
    fn test_from_toml_str_extra() {
        let settings = from_toml_str(
            r#"
            [extra]
            title = "junction"
        "#,
        )
        .unwrap();
        assert_eq!(settings.extra["title"], "junction");
    }

    #[test]
    fn test_from_json_str_basic() {
        let settings =
            from_json_str(r#"{"case_sensitive_routing": true, "log_level": "debug"}"#).unwrap();
        assert!(settings.case_sensitive_routing);
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn test_from_json_str_invalid() {
        assert!(from_json_str("{not json").is_err());
        assert!(from_json_str(r#"{"strict_routing": "nope"}"#).is_err());
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junction.toml");
        std::fs::write(&path, "strict_routing = true\nlog_level = \"warn\"").unwrap();

        let settings = from_toml_file(&path).unwrap();
        assert!(settings.strict_routing);
        assert_eq!(settings.log_level, "warn");
    }

    #[test]
    fn test_from_toml_file_missing() {
        let result = from_toml_file("/nonexistent/path/junction.toml");
        assert!(result.is_err());
    }

    // ── Environment variable overrides ──────────────────────────────

    #[test]
    fn test_apply_env_overrides_views() {
        let mut settings = Settings::default();
        std::env::set_var("JUNCTION_VIEWS", "a, b");
        apply_env_overrides(&mut settings);
        assert_eq!(settings.views, vec![PathBuf::from("a"), PathBuf::from("b")]);
        std::env::remove_var("JUNCTION_VIEWS");
    }

    #[test]
    fn test_apply_env_overrides_strict_routing() {
        let mut settings = Settings::default();
        std::env::set_var("JUNCTION_STRICT_ROUTING", "1");
        apply_env_overrides(&mut settings);
        assert!(settings.strict_routing);
        std::env::remove_var("JUNCTION_STRICT_ROUTING");
    }

    #[test]
    fn test_apply_env_overrides_view_engine() {
        let mut settings = Settings::default();
        std::env::set_var("JUNCTION_VIEW_ENGINE", "html");
        apply_env_overrides(&mut settings);
        assert_eq!(settings.view_engine.as_deref(), Some("html"));
        std::env::remove_var("JUNCTION_VIEW_ENGINE");
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("yes"));
        assert!(!parse_bool("off"));
    }

    // ── merge_json helper ───────────────────────────────────────────

    #[test]
    fn test_merge_json_nested() {
        let base = serde_json::json!({"outer": {"a": 1, "b": 2}});
        let over = serde_json::json!({"outer": {"b": 3}});
        let merged = merge_json(base, over);
        assert_eq!(merged["outer"]["a"], 1);
        assert_eq!(merged["outer"]["b"], 3);
    }

    #[test]
    fn test_merge_json_array_override() {
        let base = serde_json::json!({"list": [1, 2, 3]});
        let over = serde_json::json!({"list": [4, 5]});
        let merged = merge_json(base, over);
        assert_eq!(merged["list"], serde_json::json!([4, 5]));
    }
}
