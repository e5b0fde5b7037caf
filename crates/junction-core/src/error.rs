//! Core error types for the junction framework.
//!
//! [`JunctionError`] covers HTTP errors raised by handlers, registration
//! errors raised while building a router, view lookup and rendering errors,
//! and configuration errors. Every variant maps to an HTTP status code via
//! [`JunctionError::status_code`], which the application's final handler uses
//! when an error escapes every error-handling layer.

use thiserror::Error;

/// The primary error type for the junction framework.
///
/// Handlers return this type in the `Err` arm of their result to hand an
/// error to the next error-handling layer.
#[derive(Error, Debug)]
pub enum JunctionError {
    // ── HTTP errors ──────────────────────────────────────────────────

    /// HTTP 400 Bad Request.
    #[error("{0}")]
    BadRequest(String),

    /// HTTP 404 Not Found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// HTTP 405 Method Not Allowed.
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// HTTP 500 Internal Server Error.
    #[error("Internal server error: {0}")]
    InternalServerError(String),

    /// An error carrying an explicit status chosen by the handler.
    #[error("{message}")]
    Status {
        /// The HTTP status code to respond with.
        status: u16,
        /// The message shown in the error response.
        message: String,
    },

    // ── Registration ─────────────────────────────────────────────────

    /// A path specification could not be compiled into a matcher.
    #[error("Invalid path pattern: {0}")]
    InvalidPattern(String),

    /// A router or application was configured incorrectly.
    #[error("Improperly configured: {0}")]
    ImproperlyConfigured(String),

    /// An HTTP method name outside the supported method table.
    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    // ── Views ────────────────────────────────────────────────────────

    /// No view file could be found for a view name.
    #[error("{0}")]
    ViewNotFound(String),

    /// No engine is registered for a view's extension.
    #[error("No engine registered for extension \"{0}\"")]
    EngineNotFound(String),

    /// A view engine failed while rendering.
    #[error("Render error: {0}")]
    RenderError(String),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ── Dispatch ─────────────────────────────────────────────────────

    /// A handler panicked while processing a request.
    #[error("Handler panicked: {0}")]
    HandlerPanicked(String),

    // ── Wrapped errors ───────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Any other error raised by application code.
    #[error("{0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl JunctionError {
    /// Creates an error that responds with the given status code.
    ///
    /// # Examples
    ///
    /// ```
    /// use junction_core::JunctionError;
    ///
    /// let err = JunctionError::status(418, "short and stout");
    /// assert_eq!(err.status_code(), 418);
    /// assert_eq!(err.to_string(), "short and stout");
    /// ```
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Wraps an arbitrary error raised by application code.
    pub fn other(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Other(err.into())
    }

    /// Returns the HTTP status code associated with this error.
    ///
    /// - `BadRequest` -> 400
    /// - `NotFound` -> 404
    /// - `MethodNotAllowed` -> 405
    /// - `Status` -> its own status
    /// - Everything else -> 500
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::NotFound(_) => 404,
            Self::MethodNotAllowed(_) => 405,
            Self::Status { status, .. } => *status,
            Self::InternalServerError(_)
            | Self::InvalidPattern(_)
            | Self::ImproperlyConfigured(_)
            | Self::UnsupportedMethod(_)
            | Self::ViewNotFound(_)
            | Self::EngineNotFound(_)
            | Self::RenderError(_)
            | Self::ConfigurationError(_)
            | Self::HandlerPanicked(_)
            | Self::IoError(_)
            | Self::SerializationError(_)
            | Self::Other(_) => 500,
        }
    }
}

/// A convenience type alias for `Result<T, JunctionError>`.
pub type JunctionResult<T> = Result<T, JunctionError>;
