use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Users Router Module
///
/// Defines the profile endpoints nested under `/api/users`. Every route requires
/// an authenticated session: the router is wrapped in the `require_session` layer
/// where it is nested (see `create_router`), and each handler additionally takes
/// `AuthUser` so the identity it acts on always comes from the session.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        // GET /api/users/me
        // The caller's own profile. PUT on the same path applies a partial update,
        // changing only the fields present in the payload.
        .route("/me", get(handlers::get_me).put(handlers::update_me))
}
