use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Jobs Router Module
///
/// Defines the posting endpoints nested under `/api/jobs`. Listing and detail are
/// public; creation and deletion require an authenticated employer, enforced by
/// the `AuthUser` extractor and the handlers' role checks.
///
/// When nested, this router carries a pass-through tracing layer (see
/// `create_router`) that records every hit with no behavioral impact.
pub fn job_routes() -> Router<AppState> {
    Router::new()
        // GET /api/jobs?search=...&location=...
        // Public filtered listing. POST on the same path submits a new posting,
        // restricted to the employer role inside the handler.
        .route("/", get(handlers::get_jobs).post(handlers::create_job))
        // GET /api/jobs/{id}
        // Public detail view. DELETE on the same path is owner-only removal.
        .route("/{id}", get(handlers::get_job).delete(handlers::delete_job))
}
