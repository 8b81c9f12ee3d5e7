use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Raw Database Row (Internal Use). Maps to the `public.users` table, including the
/// salted password digest. This struct deliberately does not implement `Serialize`:
/// the credential digest must never travel outward, so the API surface only ever
/// sees the `UserProfile` projection below.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    // The user's primary identifier; unique at the database layer.
    pub email: String,
    // Salted HMAC-SHA256 digest in the form "<salt_b64>.<digest_b64>".
    pub password_hash: String,
    // The role field: 'seeker' or 'employer'.
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// UserProfile
///
/// Output schema for a user's public identity (login/register responses and GET /me).
/// This is the only user shape that serializes outward.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
        }
    }
}

/// Job
///
/// Represents a job posting from the `public.jobs` table.
/// This is the primary data structure for the core business logic.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Job {
    pub id: Uuid,
    // FK to public.users.id (the employer who posted it).
    pub posted_by: Uuid,
    pub title: String,
    pub description: String,
    pub company: String,
    pub location: String,
    // Annual salary; optional because many postings omit it.
    pub salary: Option<i64>,

    // Timestamp handling for database integration and JSON serialization.
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Application
///
/// Represents a single job application record in the `public.applications` table.
/// A (job_id, applicant_id) pair is unique: applying twice is a conflict, not a
/// second row.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Application {
    pub id: Uuid,
    // The posting being applied to.
    pub job_id: Uuid,
    // The seeker who applied.
    pub applicant_id: Uuid,
    pub cover_letter: Option<String>,
    // Workflow state: 'submitted', 'reviewed', 'rejected', 'accepted'.
    pub status: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input payload for the public registration endpoint (POST /api/auth/register).
/// The password is digested with a per-user salt before persistence and is never
/// stored or logged in clear text.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub name: String,
    #[schema(example = "ada@example.com")]
    pub email: String,
    pub password: String,
    #[schema(example = "seeker")]
    pub role: String,
}

/// LoginRequest
///
/// Input payload for the credential login endpoint (POST /api/auth/login).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// CreateJobRequest
///
/// Input payload for posting a new job (POST /api/jobs). Only authenticated
/// employers may submit it; the poster's identity comes from the session, never
/// from the payload.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateJobRequest {
    pub title: String,
    pub description: String,
    pub company: String,
    pub location: String,
    pub salary: Option<i64>,
}

/// UpdateProfileRequest
///
/// Partial update payload for the authenticated profile (PUT /api/users/me).
///
/// Uses `Option<T>` for all fields and `#[serde(skip_serializing_if = "Option::is_none")]`
/// to handle partial updates, ensuring only provided fields are included in the JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// CreateApplicationRequest
///
/// Input payload for applying to a job (POST /api/applications). The applicant's
/// identity comes from the session.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateApplicationRequest {
    pub job_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_letter: Option<String>,
}

// --- Generic Response Schemas (Output) ---

/// MessageResponse
///
/// Minimal JSON envelope for endpoints whose only payload is a human-readable
/// message (logout confirmation, the 404 fallback, the generic error body).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}
