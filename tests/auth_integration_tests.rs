use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, Uri, request::Parts},
};
use chrono::{Duration, Utc};
use job_portal::{
    auth::{AuthUser, hash_password, verify_password},
    session::{CurrentSession, SessionRecord},
};
use uuid::Uuid;

// --- Helper Functions ---

const TEST_USER_ID: Uuid = Uuid::from_u128(1);

fn live_session(user_id: Uuid, role: &str) -> SessionRecord {
    let now = Utc::now();
    SessionRecord {
        id: "session-record-0001".to_string(),
        user_id,
        role: role.to_string(),
        created_at: now,
        expires_at: now + Duration::hours(24),
    }
}

/// Helper to get the mutable Parts struct from a generated Request
fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

// --- Extractor Tests ---

#[tokio::test]
async fn test_extractor_success_with_session_annotation() {
    let mut parts = get_request_parts(Method::GET, "/api/users/me".parse().unwrap());
    // The pipeline's session stage attaches this after verifying the cookie
    parts
        .extensions
        .insert(CurrentSession(live_session(TEST_USER_ID, "employer")));

    let auth_user = AuthUser::from_request_parts(&mut parts, &()).await;

    assert!(auth_user.is_ok());
    let user = auth_user.unwrap();
    assert_eq!(user.id, TEST_USER_ID);
    assert_eq!(user.role, "employer");
    assert_eq!(user.session_id, "session-record-0001");
}

#[tokio::test]
async fn test_extractor_rejects_anonymous_requests() {
    // No session annotation: covers missing, tampered, unknown, and expired
    // cookies alike, since none of those produce an annotation
    let mut parts = get_request_parts(Method::GET, "/api/users/me".parse().unwrap());

    let auth_user = AuthUser::from_request_parts(&mut parts, &()).await;

    assert!(auth_user.is_err());
    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

// --- Password Digest Tests ---

#[test]
fn test_password_roundtrip() {
    let stored = hash_password("correct horse battery staple");

    assert!(verify_password("correct horse battery staple", &stored));
    assert!(!verify_password("wrong password", &stored));
}

#[test]
fn test_password_hashes_are_salted() {
    let first = hash_password("same password");
    let second = hash_password("same password");

    // A fresh salt per digest: equal inputs never produce equal stored values
    assert_ne!(first, second);
    assert!(verify_password("same password", &first));
    assert!(verify_password("same password", &second));
}

#[test]
fn test_password_stored_form_shape() {
    let stored = hash_password("anything");

    let (salt, digest) = stored.split_once('.').expect("missing salt separator");
    assert!(!salt.is_empty());
    assert!(!digest.is_empty());
    // Neither half is the clear text
    assert_ne!(salt, "anything");
    assert_ne!(digest, "anything");
}

#[test]
fn test_malformed_stored_values_never_verify() {
    assert!(!verify_password("password", ""));
    assert!(!verify_password("password", "no-separator"));
    assert!(!verify_password("password", "!!.not-base64"));
    assert!(!verify_password("password", "c2FsdA==.!!"));
}
