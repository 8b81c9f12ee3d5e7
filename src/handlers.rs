use crate::{
    AppState,
    auth::{AuthUser, hash_password, verify_password},
    error::AppError,
    models::{
        Application, CreateApplicationRequest, CreateJobRequest, Job, LoginRequest,
        MessageResponse, RegisterRequest, UpdateProfileRequest, User, UserProfile,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

// --- Filter Structs ---

/// JobFilter
///
/// Defines the accepted query parameters for the public job listing endpoint (GET /api/jobs).
/// Used by Axum's Query extractor to safely bind HTTP query parameters for filtering and search.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct JobFilter {
    /// Optional keyword matched against job title, description, and company.
    pub search: Option<String>,
    /// Optional location substring filter.
    pub location: Option<String>,
}

// --- Response Assembly Helpers ---

/// with_session_cookie
///
/// Attaches a `Set-Cookie` header to a response. Login, registration, and logout
/// all answer with both a JSON body and a cookie mutation, so the assembly lives
/// in one place.
fn with_session_cookie(mut response: Response, cookie: &str) -> Result<Response, AppError> {
    let value = header::HeaderValue::from_str(cookie)
        .map_err(|e| AppError::Stage(format!("invalid session cookie header: {e}")))?;
    response.headers_mut().append(header::SET_COOKIE, value);
    Ok(response)
}

fn message(status: StatusCode, text: &str) -> Response {
    (
        status,
        Json(MessageResponse {
            message: text.to_string(),
        }),
    )
        .into_response()
}

// --- Auth Handlers ---

/// register
///
/// [Public Route] Creates a new account and signs the caller in.
///
/// *Flow*: Validates the requested role, digests the password under a fresh salt,
/// inserts the account, and establishes a session; the response carries both the
/// public profile and the signed session cookie. A duplicate email answers 409
/// without touching the session store.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered and signed in", body = UserProfile),
        (status = 400, description = "Invalid payload", body = MessageResponse),
        (status = 409, description = "Email already registered", body = MessageResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response, AppError> {
    if payload.role != "seeker" && payload.role != "employer" {
        return Ok(message(
            StatusCode::BAD_REQUEST,
            "Role must be 'seeker' or 'employer'",
        ));
    }
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Ok(message(
            StatusCode::BAD_REQUEST,
            "Email and password are required",
        ));
    }

    let user = User {
        id: Uuid::new_v4(),
        name: payload.name,
        email: payload.email.trim().to_string(),
        password_hash: hash_password(&payload.password),
        role: payload.role,
        created_at: Utc::now(),
    };

    let Some(created) = state.repo.create_user(user).await? else {
        return Ok(message(StatusCode::CONFLICT, "Email already registered"));
    };

    let (_, cookie) = state.sessions.establish(created.id, &created.role).await?;
    let response = (StatusCode::CREATED, Json(UserProfile::from(&created))).into_response();
    with_session_cookie(response, &cookie)
}

/// login
///
/// [Public Route] Verifies credentials and establishes a session.
///
/// *Security*: An unknown email and a wrong password produce the identical 401
/// answer, so the endpoint does not reveal which accounts exist.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = UserProfile),
        (status = 401, description = "Invalid credentials", body = MessageResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let Some(user) = state.repo.get_user_by_email(&payload.email).await? else {
        return Ok(message(StatusCode::UNAUTHORIZED, "Invalid credentials"));
    };
    if !verify_password(&payload.password, &user.password_hash) {
        return Ok(message(StatusCode::UNAUTHORIZED, "Invalid credentials"));
    }

    let (_, cookie) = state.sessions.establish(user.id, &user.role).await?;
    let response = (StatusCode::OK, Json(UserProfile::from(&user))).into_response();
    with_session_cookie(response, &cookie)
}

/// logout
///
/// [Authenticated Route] Destroys the caller's session.
///
/// The store record is deleted and the response carries an immediately-expiring
/// `Set-Cookie`, so both halves of the session die together.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Signed out", body = MessageResponse),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout(
    AuthUser { session_id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let cookie = state.sessions.destroy(&session_id).await?;
    let response = message(StatusCode::OK, "Logged out");
    with_session_cookie(response, &cookie)
}

// --- Job Handlers ---

/// get_jobs
///
/// [Public Route] Lists job postings with keyword and location filtering.
#[utoipa::path(
    get,
    path = "/api/jobs",
    params(JobFilter),
    responses((status = 200, description = "List filtered jobs", body = [Job]))
)]
pub async fn get_jobs(
    State(state): State<AppState>,
    Query(filter): Query<JobFilter>,
) -> Result<Json<Vec<Job>>, AppError> {
    let jobs = state.repo.get_jobs(filter.search, filter.location).await?;
    Ok(Json(jobs))
}

/// get_job
///
/// [Public Route] Retrieves a single posting by ID.
#[utoipa::path(
    get,
    path = "/api/jobs/{id}",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Found", body = Job),
        (status = 404, description = "Not Found", body = MessageResponse)
    )
)]
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    match state.repo.get_job(id).await? {
        Some(job) => Ok(Json(job).into_response()),
        None => Ok(message(StatusCode::NOT_FOUND, "Job not found")),
    }
}

/// create_job
///
/// [Authenticated Route] Submits a new posting.
///
/// *Authorization*: Only the 'employer' role may post. The owner recorded on the
/// posting is always the session identity, never a payload field.
#[utoipa::path(
    post,
    path = "/api/jobs",
    request_body = CreateJobRequest,
    responses(
        (status = 201, description = "Created", body = Job),
        (status = 403, description = "Not an employer", body = MessageResponse)
    )
)]
pub async fn create_job(
    AuthUser { id, role, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateJobRequest>,
) -> Result<Response, AppError> {
    if role != "employer" {
        return Ok(message(
            StatusCode::FORBIDDEN,
            "Only employers can post jobs",
        ));
    }
    let job = state.repo.create_job(payload, id).await?;
    Ok((StatusCode::CREATED, Json(job)).into_response())
}

/// delete_job
///
/// [Authenticated Route] Allows an employer to delete their own posting.
///
/// *Authorization*: The repository enforces an **Owner-Only** check against the
/// session identity. A missing posting and a foreign posting are indistinguishable
/// to the caller: both answer 404.
#[utoipa::path(
    delete,
    path = "/api/jobs/{id}",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found or Not Owner")
    )
)]
pub async fn delete_job(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.repo.delete_job(id, user_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

// --- User Handlers ---

/// get_me
///
/// [Authenticated Route] Provides the authenticated user's profile information.
///
/// A valid session whose account has since been deleted answers 404 rather than
/// fabricating a profile.
#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 404, description = "Account no longer exists", body = MessageResponse)
    )
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    match state.repo.get_user(id).await? {
        Some(user) => Ok(Json(UserProfile::from(&user)).into_response()),
        None => Ok(message(StatusCode::NOT_FOUND, "Account no longer exists")),
    }
}

/// update_me
///
/// [Authenticated Route] Partially updates the authenticated user's profile.
/// Only fields present in the payload change.
#[utoipa::path(
    put,
    path = "/api/users/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 404, description = "Account no longer exists", body = MessageResponse)
    )
)]
pub async fn update_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Response, AppError> {
    match state.repo.update_user(id, payload).await? {
        Some(user) => Ok(Json(UserProfile::from(&user)).into_response()),
        None => Ok(message(StatusCode::NOT_FOUND, "Account no longer exists")),
    }
}

// --- Application Handlers ---

/// create_application
///
/// [Authenticated Route] Applies to a posting.
///
/// *Flow*: The posting must exist (404 otherwise), and the (job, applicant) pair
/// must be new; a repeat application answers 409, enforced by the repository's
/// uniqueness handling rather than a racy pre-check.
#[utoipa::path(
    post,
    path = "/api/applications",
    request_body = CreateApplicationRequest,
    responses(
        (status = 201, description = "Application submitted", body = Application),
        (status = 404, description = "Job not found", body = MessageResponse),
        (status = 409, description = "Already applied", body = MessageResponse)
    )
)]
pub async fn create_application(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateApplicationRequest>,
) -> Result<Response, AppError> {
    if state.repo.get_job(payload.job_id).await?.is_none() {
        return Ok(message(StatusCode::NOT_FOUND, "Job not found"));
    }
    match state.repo.create_application(payload, id).await? {
        Some(application) => Ok((StatusCode::CREATED, Json(application)).into_response()),
        None => Ok(message(
            StatusCode::CONFLICT,
            "You have already applied to this job",
        )),
    }
}

/// get_my_applications
///
/// [Authenticated Route] Lists every application the caller has submitted.
#[utoipa::path(
    get,
    path = "/api/applications/mine",
    responses((status = 200, description = "My Applications", body = [Application]))
)]
pub async fn get_my_applications(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Application>>, AppError> {
    let applications = state.repo.get_my_applications(id).await?;
    Ok(Json(applications))
}

/// get_job_applications
///
/// [Authenticated Route] Lists the applications submitted to one posting.
///
/// *Authorization*: Only the employer who posted the job may read its applicant
/// list; everyone else answers 403.
#[utoipa::path(
    get,
    path = "/api/applications/job/{id}",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Applications for the posting", body = [Application]),
        (status = 403, description = "Not the posting owner", body = MessageResponse),
        (status = 404, description = "Job not found", body = MessageResponse)
    )
)]
pub async fn get_job_applications(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let Some(job) = state.repo.get_job(job_id).await? else {
        return Ok(message(StatusCode::NOT_FOUND, "Job not found"));
    };
    if job.posted_by != user_id {
        return Ok(message(
            StatusCode::FORBIDDEN,
            "Only the posting owner can view its applications",
        ));
    }
    let applications = state.repo.get_applications_for_job(job_id).await?;
    Ok(Json(applications).into_response())
}
