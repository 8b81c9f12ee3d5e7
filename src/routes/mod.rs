/// Router Module Index
///
/// Organizes the application's routing logic into one module per mounted
/// collaborator, mirroring the `/api/*` prefixes the pipeline dispatches to.
/// Access control is applied explicitly where the routers are nested (via Axum
/// layers and the `AuthUser` extractor), preventing accidental exposure of
/// protected endpoints.

/// Account lifecycle: registration, credential login, logout.
pub mod auth;

/// Job postings: public listing/detail, employer-only creation and deletion.
pub mod jobs;

/// The authenticated user's own profile.
pub mod users;

/// Job applications: submission and the two applicant/owner listings.
pub mod applications;
