//! Serving an [`Application`] with axum.
//!
//! Every request, whatever its method or path, is routed to a single axum
//! handler that assigns a request id, reads the body and hands the request
//! to [`Application::handle`].

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::any;
use http::StatusCode;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use junction_core::logging::{request_span, setup_logging};
use junction_core::{JunctionError, JunctionResult};
use junction_http::Request;

use crate::app::{App, Application};

impl Application {
    /// Converts the application into an axum router.
    pub fn into_axum_router(self) -> axum::Router {
        let app = Arc::new(self);
        axum::Router::new()
            .route("/", any(handle))
            .route("/{*path}", any(handle))
            .with_state(app)
            .layer(TraceLayer::new_for_http())
    }

    /// Binds `addr` and serves until the server fails.
    ///
    /// # Errors
    ///
    /// Returns [`JunctionError::ImproperlyConfigured`] if the address cannot
    /// be bound, or [`JunctionError::InternalServerError`] if serving fails.
    pub async fn run(self, addr: &str) -> JunctionResult<()> {
        setup_logging(&self.context().settings());
        let router = self.into_axum_router();
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            JunctionError::ImproperlyConfigured(format!("Failed to bind to {addr}: {e}"))
        })?;

        tracing::info!("Listening on http://{addr}/");

        axum::serve(listener, router)
            .await
            .map_err(|e| JunctionError::InternalServerError(format!("Server error: {e}")))?;

        Ok(())
    }
}

impl App {
    /// Freezes the app and converts it into an axum router.
    pub fn into_axum_router(self) -> axum::Router {
        self.into_application().into_axum_router()
    }

    /// Freezes the app and serves it on `addr`.
    ///
    /// # Errors
    ///
    /// See [`Application::run`].
    pub async fn run(self, addr: &str) -> JunctionResult<()> {
        self.into_application().run(addr).await
    }
}

async fn handle(
    State(app): State<Arc<Application>>,
    req: axum::extract::Request,
) -> axum::response::Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = request_span(&request_id, req.method().as_str(), req.uri().path());

    async move {
        let (parts, body) = req.into_parts();
        let body = match axum::body::to_bytes(body, usize::MAX).await {
            Ok(bytes) => bytes.to_vec(),
            Err(err) => {
                tracing::warn!(error = %err, "failed to read request body");
                return (StatusCode::BAD_REQUEST, "Failed to read request body").into_response();
            }
        };

        app.handle(Request::from_axum(parts, body))
            .await
            .into_response()
    }
    .instrument(span)
    .await
}
