//! Session lifecycle: persisting and clearing the credential triple, and
//! the event the hosting application watches to learn the session is gone.

use tracing::{debug, warn};

use crate::models::AuthPayload;

use super::credentials::{
    CredentialStore, StoreError, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY,
};

/// Broadcast channel depth for session events.
/// The host only cares about the latest event; a small buffer is plenty.
pub(crate) const SESSION_EVENT_CAPACITY: usize = 8;

/// Session lifecycle notification.
///
/// `Ended` fires when renewal fails and the stored credentials have been
/// purged; the hosting application is expected to navigate to its sign-in
/// entry point. It does not fire on an explicit logout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Ended,
}

/// Persist a freshly issued credential pair, plus the user profile when the
/// backend sent one. The pair is written before the user blob so a partial
/// failure still leaves a usable session.
pub(crate) async fn persist(
    store: &dyn CredentialStore,
    payload: &AuthPayload,
) -> Result<(), StoreError> {
    store.set(ACCESS_TOKEN_KEY, &payload.access_token).await?;
    store.set(REFRESH_TOKEN_KEY, &payload.refresh_token).await?;
    if let Some(user) = &payload.user {
        store.set(USER_KEY, &user.to_string()).await?;
    }
    debug!("session credentials persisted");
    Ok(())
}

/// Remove every persisted session key. Best-effort per key so one backend
/// failure does not leave the others behind.
pub(crate) async fn clear(store: &dyn CredentialStore) {
    for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
        if let Err(e) = store.delete(key).await {
            warn!(key, error = %e, "failed to clear stored credential");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::MemoryStore;

    fn payload(user: Option<serde_json::Value>) -> AuthPayload {
        AuthPayload {
            access_token: "a1".to_string(),
            refresh_token: "r1".to_string(),
            token_type: Some("Bearer".to_string()),
            user,
        }
    }

    #[tokio::test]
    async fn test_persist_writes_all_keys() {
        let store = MemoryStore::new();
        persist(&store, &payload(Some(serde_json::json!({"id": 7}))))
            .await
            .unwrap();

        assert_eq!(
            store.get(ACCESS_TOKEN_KEY).await.unwrap().as_deref(),
            Some("a1")
        );
        assert_eq!(
            store.get(REFRESH_TOKEN_KEY).await.unwrap().as_deref(),
            Some("r1")
        );
        assert_eq!(
            store.get(USER_KEY).await.unwrap().as_deref(),
            Some(r#"{"id":7}"#)
        );
    }

    #[tokio::test]
    async fn test_persist_without_user_keeps_cached_profile_out() {
        let store = MemoryStore::new();
        persist(&store, &payload(None)).await.unwrap();
        assert!(store.get(USER_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_removes_the_triple() {
        let store = MemoryStore::new();
        persist(&store, &payload(Some(serde_json::json!({"id": 7}))))
            .await
            .unwrap();

        clear(&store).await;

        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
            assert!(store.get(key).await.unwrap().is_none());
        }
    }
}
