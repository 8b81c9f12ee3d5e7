use axum::{
    Json, Router,
    extract::{FromRef, Request},
    http::{HeaderName, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod repository;
pub mod session;

// Module for routing segregation (one router per mounted collaborator).
pub mod routes;
use auth::AuthUser; // The resolved authenticated user identity.
use models::MessageResponse;
use pipeline::Pipeline;
use routes::{applications, auth as auth_routes_mod, jobs, users};

// --- Public Re-exports ---

// Makes core state types easily accessible to the main application entry point (main.rs).
pub use config::{AppConfig, Env};
pub use error::AppError;
pub use repository::{MockRepository, PostgresRepository, RepositoryState};
pub use session::{MemorySessionStore, SessionManager, SessionState};

/// ApiDoc
///
/// This struct auto-generates the OpenAPI documentation (Swagger JSON) for the application.
/// It aggregates all API paths and data schemas that have been decorated with
/// the `#[utoipa::path]` and `#[derive(utoipa::ToSchema)]` macros.
/// The resulting JSON is served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    // List all public handler functions here for documentation generation.
    paths(
        handlers::register, handlers::login, handlers::logout,
        handlers::get_jobs, handlers::get_job, handlers::create_job, handlers::delete_job,
        handlers::get_me, handlers::update_me,
        handlers::create_application, handlers::get_my_applications,
        handlers::get_job_applications
    ),
    // List all models (schemas) used in the request/response bodies.
    components(
        schemas(
            models::UserProfile, models::RegisterRequest, models::LoginRequest,
            models::Job, models::CreateJobRequest, models::UpdateProfileRequest,
            models::Application, models::CreateApplicationRequest, models::MessageResponse,
        )
    ),
    tags(
        (name = "job-portal", description = "Job Portal API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Implements the **Unified State Pattern**. This is the single, thread-safe, and immutable
/// container holding all essential application services and configuration.
/// The application state is shared across all incoming requests.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: Abstracts database access via the PgPool connection.
    pub repo: RepositoryState,
    /// Session Layer: Cookie codec, attribute policy, and the injected store.
    pub sessions: SessionState,
    /// Configuration: The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// These implementations allow handlers to selectively pull components from the shared AppState.
// This is critical for dependency injection and keeping collaborator boundaries clean.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for SessionState {
    fn from_ref(app_state: &AppState) -> SessionState {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// require_session
///
/// A middleware function that enforces authentication for fully-protected routers.
///
/// *Mechanism*: It attempts to extract `AuthUser` from the request. The extractor
/// reads the session annotation the pipeline attached; if the request is anonymous
/// it rejects immediately with 401 Unauthorized, preventing execution of the
/// handler. If successful, the request proceeds unchanged.
async fn require_session(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// log_job_route
///
/// Pass-through observability layer for the jobs router: records every hit at info
/// level and forwards the request untouched. It has no behavioral impact, and a
/// request rejected by the CORS stage never reaches it.
async fn log_job_route(request: Request, next: Next) -> Response {
    tracing::info!(method = %request.method(), path = %request.uri().path(), "job route hit");
    next.run(request).await
}

/// fallback_404
///
/// JSON fallback for paths no router matched, including `/uploads/*` requests
/// whose file does not exist (the static stage falls through to dispatch).
async fn fallback_404() -> (StatusCode, Json<MessageResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(MessageResponse {
            message: "Route not found".to_string(),
        }),
    )
}

/// create_router
///
/// Assembles the application's entire routing structure, wires the request
/// pipeline in front of dispatch, applies global and scoped middleware, and
/// registers the application state.
pub fn create_router(state: AppState) -> Router {
    // The four-stage pipeline is built once and shared across requests; it owns
    // the CORS policy and the session manager handle.
    let request_pipeline = Arc::new(Pipeline::standard(&state.config, state.sessions.clone()));

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 1. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load balancer checks.
        .route("/health", get(|| async { "ok" }))
        // Collaborator Routers: one nest per mounted prefix.
        .nest("/api/auth", auth_routes_mod::auth_routes())
        // The jobs router carries its pass-through logging layer.
        .nest(
            "/api/jobs",
            jobs::job_routes().layer(middleware::from_fn(log_job_route)),
        )
        // Fully-protected routers: `require_session` rejects anonymous requests
        // before any handler runs. This implements the first layer of
        // Defense-in-Depth; the handlers' `AuthUser` arguments are the second.
        .nest(
            "/api/users",
            users::user_routes().route_layer(middleware::from_fn(require_session)),
        )
        .nest(
            "/api/applications",
            applications::application_routes()
                .route_layer(middleware::from_fn(require_session)),
        )
        // Unmatched paths (missing uploads included) answer a JSON 404.
        .fallback(fallback_404)
        // Apply the Unified State to all routes.
        .with_state(state);

    // 2. Observability, Safety, and Pipeline Layers (outermost first)
    base_router.layer(
        ServiceBuilder::new()
            // 2a. Request ID Generation: Generates a unique UUID for every incoming request.
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            // 2b. Request Tracing: Wraps the entire request/response lifecycle in a
            // tracing span, so even pipeline short-circuits are traced.
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace_span_logger)
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(tower_http::LatencyUnit::Millis),
                    ),
            )
            // 2c. Request ID Propagation: Ensures the generated x-request-id header
            // is returned to the client on every response.
            .layer(PropagateRequestIdLayer::new(x_request_id))
            // 2d. Panic Backstop: A panicking handler answers the same generic 500
            // as any other failure, and the process keeps serving.
            .layer(CatchPanicLayer::custom(error::handle_panic))
            // 2e. The Request Pipeline: CORS, cookies, session, static files, in
            // declared order, wrapping route dispatch.
            .layer(middleware::from_fn(move |request: Request, next: Next| {
                let request_pipeline = request_pipeline.clone();
                async move { request_pipeline.handle(request, next).await }
            })),
    )
}

/// trace_span_logger
///
/// Helper function used by `TraceLayer` to customize the tracing span creation.
/// It extracts the `x-request-id` header (if present) and includes it in the
/// structured logging metadata alongside the HTTP method and URI.
///
/// *Goal*: Ensure every log line for a single request is correlated by a unique ID.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    // The structured log format used by the tracing macros.
    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
