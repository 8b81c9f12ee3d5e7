use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::{AppConfig, SameSite};
use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Name of the session cookie issued to browsers.
pub const SESSION_COOKIE_NAME: &str = "sid";

/// SessionRecord
///
/// Server-side session state keyed by a random 256-bit identifier. The browser only
/// ever holds the (signed) identifier; everything else stays in the store. Records
/// are created exclusively by login and registration, refreshed on every request
/// that presents a valid cookie, and deleted on logout or on first sight after
/// expiry. Anonymous traffic never creates one.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: Uuid,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// CurrentSession
///
/// Request-extension annotation attached by the session stage when a valid cookie
/// resolves. The `AuthUser` extractor reads this; its absence means anonymous.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub SessionRecord);

// 1. SessionStore Contract
/// SessionStore
///
/// Defines the abstract contract for session persistence. This trait allows us to
/// swap the concrete implementation (the in-memory store below today, an external
/// backend later) without affecting the pipeline or the auth collaborator, and it is
/// the injection seam the tests use to observe persistence behavior.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetches a live record by identifier. An expired record is removed on sight
    /// and reported as absent, so callers never observe a stale session.
    async fn load(&self, id: &str) -> Result<Option<SessionRecord>, AppError>;

    /// Inserts or replaces a record under its identifier.
    async fn save(&self, record: SessionRecord) -> Result<(), AppError>;

    /// Removes a record. Deleting an unknown identifier is not an error.
    async fn delete(&self, id: &str) -> Result<(), AppError>;

    /// Number of records currently held.
    async fn count(&self) -> Result<usize, AppError>;
}

// 2. The In-Memory Implementation
/// MemorySessionStore
///
/// Process-local session persistence behind an async read-write lock. Sessions do
/// not survive a restart, which matches the single-node deployment this server
/// targets; the `SessionStore` trait is the seam for anything longer-lived.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> Result<Option<SessionRecord>, AppError> {
        // Fast path: shared read lock covers the common case of a live session.
        {
            let sessions = self.sessions.read().await;
            match sessions.get(id) {
                None => return Ok(None),
                Some(record) if !record.is_expired() => return Ok(Some(record.clone())),
                Some(_) => {}
            }
        }
        // Expired: take the write lock and purge. Re-check under the write lock
        // because another task may have replaced the entry in between.
        let mut sessions = self.sessions.write().await;
        if let Some(record) = sessions.get(id) {
            if record.is_expired() {
                sessions.remove(id);
                return Ok(None);
            }
            return Ok(Some(record.clone()));
        }
        Ok(None)
    }

    async fn save(&self, record: SessionRecord) -> Result<(), AppError> {
        self.sessions
            .write()
            .await
            .insert(record.id.clone(), record);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.sessions.write().await.remove(id);
        Ok(())
    }

    async fn count(&self) -> Result<usize, AppError> {
        Ok(self.sessions.read().await.len())
    }
}

// 3. Cookie Signing
/// CookieSigner
///
/// Produces and verifies the tamper-evident cookie value `<id>.<base64url(hmac)>`.
/// The MAC key is the SHA-256 digest of the configured session secret, giving a
/// fixed-width key regardless of the secret's length.
#[derive(Clone)]
pub struct CookieSigner {
    key: [u8; 32],
}

impl CookieSigner {
    pub fn new(secret: &str) -> Self {
        let key = Sha256::digest(secret.as_bytes()).into();
        Self { key }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length")
    }

    /// sign
    ///
    /// Appends the base64url MAC of the identifier: `<id>.<signature>`.
    pub fn sign(&self, id: &str) -> String {
        let mut mac = self.mac();
        mac.update(id.as_bytes());
        let tag = mac.finalize().into_bytes();
        format!("{id}.{}", URL_SAFE_NO_PAD.encode(tag))
    }

    /// verify
    ///
    /// Splits `<id>.<signature>` and checks the MAC. Returns the identifier only
    /// when the signature matches; tampered, truncated, or unsigned values yield
    /// `None`.
    pub fn verify(&self, value: &str) -> Option<String> {
        let (id, sig_b64) = value.rsplit_once('.')?;
        if id.is_empty() {
            return None;
        }
        let sig = URL_SAFE_NO_PAD.decode(sig_b64).ok()?;
        let mut mac = self.mac();
        mac.update(id.as_bytes());
        // Constant-time comparison via the Mac interface.
        mac.verify_slice(&sig).ok()?;
        Some(id.to_string())
    }
}

/// new_session_id
///
/// 256 bits from the thread-local CSPRNG, base64url-encoded (43 chars, no padding).
fn new_session_id() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(bytes)
}

// 4. The Session Manager (Injectable Collaborator)
/// SessionManager
///
/// The one object the rest of the application talks to about sessions. It owns the
/// cookie codec, the store handle, and the cookie attribute policy, all fed from
/// `AppConfig` at construction and injected into the pipeline and the auth
/// collaborator. Three operations cover the whole lifecycle:
///
/// - `resolve`: raw cookie value → live record, sliding the expiry forward,
/// - `establish`: authenticated identity → persisted record + `Set-Cookie` value,
/// - `destroy`: record id → store delete + expiring `Set-Cookie` value.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    signer: CookieSigner,
    max_age: Duration,
    cookie_secure: bool,
    cookie_same_site: SameSite,
}

impl SessionManager {
    /// new
    ///
    /// Builds the manager over an injected store, taking the secret, the max-age,
    /// and the cookie attribute policy from configuration.
    pub fn new(store: Arc<dyn SessionStore>, config: &AppConfig) -> Self {
        Self {
            store,
            signer: CookieSigner::new(&config.session_secret),
            max_age: config.session_max_age,
            cookie_secure: config.cookie_secure,
            cookie_same_site: config.cookie_same_site,
        }
    }

    /// resolve
    ///
    /// Verifies a raw cookie value and loads the record behind it. On success the
    /// expiry slides forward by the configured max-age, the refresh is persisted,
    /// and the returned `Set-Cookie` value re-issues the cookie so the browser's
    /// copy slides too. Tampered, unknown, and expired cookies resolve to `None`
    /// (anonymous); only store I/O surfaces as an error.
    pub async fn resolve(
        &self,
        cookie_value: &str,
    ) -> Result<Option<(SessionRecord, String)>, AppError> {
        let Some(id) = self.signer.verify(cookie_value) else {
            return Ok(None);
        };
        let Some(mut record) = self.store.load(&id).await? else {
            return Ok(None);
        };

        // Sliding expiry: every valid presentation pushes the deadline forward.
        record.expires_at = Utc::now() + self.max_age;
        self.store.save(record.clone()).await?;

        let cookie = self.issue_cookie(&record.id);
        Ok(Some((record, cookie)))
    }

    /// establish
    ///
    /// Creates and persists a brand-new session for an authenticated user. Login
    /// and registration are the only callers; this is the single point where a
    /// session record comes into existence.
    pub async fn establish(
        &self,
        user_id: Uuid,
        role: &str,
    ) -> Result<(SessionRecord, String), AppError> {
        let now = Utc::now();
        let record = SessionRecord {
            id: new_session_id(),
            user_id,
            role: role.to_string(),
            created_at: now,
            expires_at: now + self.max_age,
        };
        self.store.save(record.clone()).await?;
        let cookie = self.issue_cookie(&record.id);
        Ok((record, cookie))
    }

    /// destroy
    ///
    /// Deletes the record and returns a `Set-Cookie` value that immediately
    /// expires the browser's copy.
    pub async fn destroy(&self, id: &str) -> Result<String, AppError> {
        self.store.delete(id).await?;
        Ok(self.expired_cookie())
    }

    /// issue_cookie
    ///
    /// Formats the full `Set-Cookie` value: signed identifier plus the attribute
    /// policy. `HttpOnly` is unconditional; `Secure` and `SameSite` follow the
    /// configuration resolved at startup.
    fn issue_cookie(&self, id: &str) -> String {
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}={}; Path=/; HttpOnly; SameSite={}; Max-Age={}",
            self.signer.sign(id),
            self.cookie_same_site.as_str(),
            self.max_age.num_seconds(),
        );
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    fn expired_cookie(&self) -> String {
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite={}; Max-Age=0",
            self.cookie_same_site.as_str(),
        );
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

// 5. The Mock Implementation (For Unit Tests)
/// FailingSessionStore
///
/// A store whose every operation reports an I/O failure. Used exclusively in tests
/// to drive the pipeline's store-error path without a real backend misbehaving.
pub struct FailingSessionStore;

#[async_trait]
impl SessionStore for FailingSessionStore {
    async fn load(&self, _id: &str) -> Result<Option<SessionRecord>, AppError> {
        Err(AppError::SessionStore(
            "mock store failure: simulation requested".to_string(),
        ))
    }

    async fn save(&self, _record: SessionRecord) -> Result<(), AppError> {
        Err(AppError::SessionStore(
            "mock store failure: simulation requested".to_string(),
        ))
    }

    async fn delete(&self, _id: &str) -> Result<(), AppError> {
        Err(AppError::SessionStore(
            "mock store failure: simulation requested".to_string(),
        ))
    }

    async fn count(&self) -> Result<usize, AppError> {
        Err(AppError::SessionStore(
            "mock store failure: simulation requested".to_string(),
        ))
    }
}

/// SessionState
///
/// The concrete type used to share the session manager across the application state.
pub type SessionState = Arc<SessionManager>;
