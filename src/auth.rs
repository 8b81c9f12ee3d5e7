use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use uuid::Uuid;

use crate::session::CurrentSession;

type HmacSha256 = Hmac<Sha256>;

/// AuthUser Extractor Result
///
/// This struct represents the resolved identity of an authenticated request.
/// It is the core output of the AuthUser extractor implementation.
/// Handlers use this struct to retrieve the user's ID and verify permissions.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The unique identifier of the user, mapped to public.users.id.
    pub id: Uuid,
    /// The user's role, 'seeker' or 'employer'. Used for access control in handlers.
    pub role: String,
    /// Identifier of the session record backing this identity. Logout destroys
    /// exactly this record.
    pub session_id: String,
}

/// AuthUser Extractor Implementation
///
/// Implements Axum's FromRequestParts trait, making AuthUser usable as a function
/// argument in any authenticated handler. This cleanly separates authentication
/// (the pipeline's session stage) from business logic (the handler): the stage has
/// already verified the cookie signature and loaded the record, so by the time a
/// handler runs, identity is either present or the request is anonymous.
///
/// Rejection: Returns StatusCode::UNAUTHORIZED (401) when no session annotation
/// exists, which covers missing, unsigned, tampered, unknown, and expired cookies
/// alike.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let CurrentSession(record) = parts
            .extensions
            .get::<CurrentSession>()
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(AuthUser {
            id: record.user_id,
            role: record.role.clone(),
            session_id: record.id.clone(),
        })
    }
}

// --- Password Digests ---

/// hash_password
///
/// Digests a clear-text password under a fresh random 128-bit salt, producing the
/// storable form `<salt_b64>.<digest_b64>` where the digest is
/// HMAC-SHA256(key = salt, message = password). The clear text is never persisted
/// or logged.
pub fn hash_password(password: &str) -> String {
    let salt: [u8; 16] = rand::rng().random();
    let mut mac = HmacSha256::new_from_slice(&salt).expect("HMAC accepts any key length");
    mac.update(password.as_bytes());
    let digest = mac.finalize().into_bytes();
    format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(salt),
        URL_SAFE_NO_PAD.encode(digest)
    )
}

/// verify_password
///
/// Recomputes the digest under the stored salt and compares through the
/// constant-time `Mac` interface. Malformed stored values verify as `false`,
/// never as an error.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_b64, digest_b64)) = stored.split_once('.') else {
        return false;
    };
    let Ok(salt) = URL_SAFE_NO_PAD.decode(salt_b64) else {
        return false;
    };
    let Ok(expected) = URL_SAFE_NO_PAD.decode(digest_b64) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(&salt) else {
        return false;
    };
    mac.update(password.as_bytes());
    mac.verify_slice(&expected).is_ok()
}
