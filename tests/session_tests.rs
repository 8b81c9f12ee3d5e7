use chrono::{Duration, Utc};
use job_portal::config::{AppConfig, SameSite};
use job_portal::session::{
    CookieSigner, FailingSessionStore, MemorySessionStore, SESSION_COOKIE_NAME, SessionManager,
    SessionRecord, SessionStore,
};
use std::sync::Arc;
use uuid::Uuid;

// --- Test Utilities ---

fn live_record(id: &str) -> SessionRecord {
    let now = Utc::now();
    SessionRecord {
        id: id.to_string(),
        user_id: Uuid::new_v4(),
        role: "seeker".to_string(),
        created_at: now,
        expires_at: now + Duration::hours(24),
    }
}

fn expired_record(id: &str) -> SessionRecord {
    let now = Utc::now();
    SessionRecord {
        id: id.to_string(),
        user_id: Uuid::new_v4(),
        role: "seeker".to_string(),
        created_at: now - Duration::hours(48),
        expires_at: now - Duration::hours(24),
    }
}

/// Extracts the cookie value (the part before the first attribute) from a full
/// Set-Cookie string, asserting the cookie name along the way.
fn cookie_value(set_cookie: &str) -> String {
    let first = set_cookie
        .split(';')
        .next()
        .expect("Set-Cookie string was empty");
    let (name, value) = first
        .split_once('=')
        .expect("Set-Cookie carried no name=value pair");
    assert_eq!(name, SESSION_COOKIE_NAME);
    value.to_string()
}

#[cfg(test)]
mod signer_tests {
    use super::*;

    #[test]
    fn test_sign_verify_roundtrip() {
        let signer = CookieSigner::new("a-test-secret");
        let signed = signer.sign("session-id-123");

        assert!(signed.starts_with("session-id-123."));
        assert_eq!(signer.verify(&signed), Some("session-id-123".to_string()));
    }

    #[test]
    fn test_verify_rejects_tampered_signature() {
        let signer = CookieSigner::new("a-test-secret");

        assert_eq!(signer.verify("session-id-123.AAAAAAAA"), None);
    }

    #[test]
    fn test_verify_rejects_tampered_identifier() {
        let signer = CookieSigner::new("a-test-secret");
        let signed = signer.sign("session-id-123");
        // Keep the valid signature but swap the identifier in front of it
        let (_, sig) = signed.rsplit_once('.').unwrap();
        let forged = format!("other-session.{sig}");

        assert_eq!(signer.verify(&forged), None);
    }

    #[test]
    fn test_verify_rejects_foreign_secret() {
        let signer = CookieSigner::new("a-test-secret");
        let other = CookieSigner::new("a-different-secret");
        let signed = signer.sign("session-id-123");

        assert_eq!(other.verify(&signed), None);
    }

    #[test]
    fn test_verify_rejects_malformed_values() {
        let signer = CookieSigner::new("a-test-secret");

        // No signature separator at all
        assert_eq!(signer.verify("just-an-identifier"), None);
        // Empty identifier
        assert_eq!(signer.verify(".c2lnbmF0dXJl"), None);
        // Signature that is not valid base64url
        assert_eq!(signer.verify("session-id-123.!!!"), None);
        assert_eq!(signer.verify(""), None);
    }
}

#[cfg(test)]
mod store_tests {
    use super::*;

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let store = MemorySessionStore::new();
        let record = live_record("abc");

        store.save(record.clone()).await.unwrap();

        let loaded = store.load("abc").await.unwrap().expect("record missing");
        assert_eq!(loaded.user_id, record.user_id);
        assert_eq!(loaded.role, "seeker");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_load_unknown_id_is_none() {
        let store = MemorySessionStore::new();

        assert!(store.load("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_record_and_tolerates_unknown() {
        let store = MemorySessionStore::new();
        store.save(live_record("abc")).await.unwrap();

        store.delete("abc").await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);

        // Deleting again is not an error
        store.delete("abc").await.unwrap();
    }

    #[tokio::test]
    async fn test_load_purges_expired_record() {
        let store = MemorySessionStore::new();
        store.save(expired_record("old")).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        // The expired record is reported absent AND removed on sight
        assert!(store.load("old").await.unwrap().is_none());
        assert_eq!(store.count().await.unwrap(), 0);
    }
}

#[cfg(test)]
mod manager_tests {
    use super::*;

    fn manager_over(store: Arc<MemorySessionStore>) -> SessionManager {
        SessionManager::new(store, &AppConfig::default())
    }

    #[tokio::test]
    async fn test_establish_persists_and_issues_cookie() {
        let store = Arc::new(MemorySessionStore::new());
        let manager = manager_over(store.clone());
        let user_id = Uuid::new_v4();

        let (record, set_cookie) = manager.establish(user_id, "employer").await.unwrap();

        assert_eq!(record.user_id, user_id);
        assert_eq!(record.role, "employer");
        assert_eq!(store.count().await.unwrap(), 1);

        // Attribute policy from the default (local) config
        assert!(set_cookie.contains("; Path=/"));
        assert!(set_cookie.contains("; HttpOnly"));
        assert!(set_cookie.contains("; SameSite=Lax"));
        assert!(set_cookie.contains("; Max-Age=86400"));
        assert!(!set_cookie.contains("Secure"));

        // The cookie value is the signed record identifier
        let config = AppConfig::default();
        let signer = CookieSigner::new(&config.session_secret);
        assert_eq!(signer.verify(&cookie_value(&set_cookie)), Some(record.id));
    }

    #[tokio::test]
    async fn test_resolve_slides_expiry_forward() {
        let store = Arc::new(MemorySessionStore::new());
        let manager = manager_over(store.clone());

        let (record, set_cookie) = manager.establish(Uuid::new_v4(), "seeker").await.unwrap();
        let first_deadline = record.expires_at;

        // Let the clock move so the refreshed deadline is strictly later
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let resolved = manager
            .resolve(&cookie_value(&set_cookie))
            .await
            .unwrap()
            .expect("valid cookie should resolve");

        assert_eq!(resolved.0.id, record.id);
        assert!(resolved.0.expires_at > first_deadline);

        // The refresh was persisted, and the response re-issues the cookie
        let stored = store.load(&record.id).await.unwrap().unwrap();
        assert!(stored.expires_at > first_deadline);
        assert!(resolved.1.contains("Max-Age=86400"));
    }

    #[tokio::test]
    async fn test_resolve_unknown_session_is_anonymous() {
        let store = Arc::new(MemorySessionStore::new());
        let manager = manager_over(store.clone());

        // Correctly signed, but nothing was ever stored under this identifier
        let config = AppConfig::default();
        let signed = CookieSigner::new(&config.session_secret).sign("never-stored");

        assert!(manager.resolve(&signed).await.unwrap().is_none());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_resolve_tampered_cookie_is_anonymous() {
        let store = Arc::new(MemorySessionStore::new());
        let manager = manager_over(store.clone());

        assert!(manager.resolve("garbage").await.unwrap().is_none());
        assert!(
            manager
                .resolve("some-id.fakesignature")
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_resolve_expired_session_is_anonymous_and_purged() {
        let store = Arc::new(MemorySessionStore::new());
        let manager = manager_over(store.clone());

        store.save(expired_record("stale")).await.unwrap();
        let config = AppConfig::default();
        let signed = CookieSigner::new(&config.session_secret).sign("stale");

        assert!(manager.resolve(&signed).await.unwrap().is_none());
        // First sight after expiry removed the record
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_destroy_deletes_record_and_expires_cookie() {
        let store = Arc::new(MemorySessionStore::new());
        let manager = manager_over(store.clone());
        let (record, _) = manager.establish(Uuid::new_v4(), "seeker").await.unwrap();

        let set_cookie = manager.destroy(&record.id).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 0);
        assert!(set_cookie.starts_with("sid=;"));
        assert!(set_cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_production_cookie_attributes() {
        let config = AppConfig {
            cookie_secure: true,
            cookie_same_site: SameSite::None,
            ..AppConfig::default()
        };
        let manager = SessionManager::new(Arc::new(MemorySessionStore::new()), &config);

        let (_, set_cookie) = manager.establish(Uuid::new_v4(), "seeker").await.unwrap();

        assert!(set_cookie.contains("; SameSite=None"));
        assert!(set_cookie.contains("; Secure"));
    }

    #[tokio::test]
    async fn test_failing_store_surfaces_errors() {
        let config = AppConfig::default();
        let manager = SessionManager::new(Arc::new(FailingSessionStore), &config);

        assert!(manager.establish(Uuid::new_v4(), "seeker").await.is_err());

        // A verified signature still fails once the store is consulted
        let signed = CookieSigner::new(&config.session_secret).sign("any-id");
        assert!(manager.resolve(&signed).await.is_err());
        assert!(manager.destroy("any-id").await.is_err());
    }
}
