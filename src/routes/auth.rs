use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Auth Router Module
///
/// Defines the account lifecycle endpoints nested under `/api/auth`. Registration
/// and login are the only two places in the application that create a session
/// record; logout is the only place (besides expiry) that removes one.
///
/// Security Mandate:
/// Credential failures must never reveal whether an email is registered; login
/// answers the same 401 for unknown accounts and wrong passwords.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        // POST /api/auth/register
        // Creates the account, digests the password, and signs the caller in.
        .route("/register", post(handlers::register))
        // POST /api/auth/login
        // Verifies credentials and establishes a fresh session.
        .route("/login", post(handlers::login))
        // POST /api/auth/logout
        // Destroys the caller's session record and expires the cookie.
        .route("/logout", post(handlers::logout))
}
