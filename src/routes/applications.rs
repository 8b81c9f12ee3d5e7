use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Applications Router Module
///
/// Defines the application endpoints nested under `/api/applications`. All routes
/// require an authenticated session (the `require_session` layer is applied where
/// this router is nested).
///
/// Security Mandate:
/// The applicant recorded on a submission is always the session identity, and the
/// per-job listing is restricted to the employer who owns the posting. Neither
/// identity ever comes from the payload.
pub fn application_routes() -> Router<AppState> {
    Router::new()
        // POST /api/applications
        // Submits an application for the authenticated seeker. A repeat submission
        // for the same job answers 409.
        .route("/", post(handlers::create_application))
        // GET /api/applications/mine
        // Every application the caller has submitted.
        .route("/mine", get(handlers::get_my_applications))
        // GET /api/applications/job/{id}
        // All applications for one posting, readable only by the posting owner.
        .route("/job/{id}", get(handlers::get_job_applications))
}
