use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// The one body clients ever see for a server-side failure. Detail stays in the log.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong!";

/// AppError
///
/// The single failure type that reaches the edge of the request pipeline. Every
/// fallible collaborator (repository, session store, static file reads, pipeline
/// stages) converts into this enum, and `into_response` is the only place a failure
/// becomes an HTTP answer: the full detail goes to the server log, the client gets
/// the fixed generic body.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("session store error: {0}")]
    SessionStore(String),

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pipeline stage error: {0}")]
    Stage(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Detail is for operators only. Clients always receive the same opaque
        // body, so nothing about schema names, paths, or queries leaks outward.
        tracing::error!(error = %self, "request failed");
        generic_error_response()
    }
}

/// generic_error_response
///
/// The terminal backstop answer: `500 Internal Server Error` with a fixed JSON
/// body. Shared between `AppError` and the panic hook so both failure paths are
/// indistinguishable on the wire.
pub fn generic_error_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": GENERIC_ERROR_MESSAGE })),
    )
        .into_response()
}

/// handle_panic
///
/// Converts a panicking request handler into the same generic 500 the error path
/// produces. Installed via `CatchPanicLayer::custom`, so a panic tears down the
/// request task and nothing else; the process keeps serving.
pub fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    tracing::error!(panic = %detail, "request handler panicked");
    generic_error_response()
}
