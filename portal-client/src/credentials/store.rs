//! Credential store persisted to the key/value backend.

use std::sync::Arc;

use log::*;
use secrecy::ExposeSecret;
use tokio::sync::RwLock;

use super::{Credentials, Identity};
use crate::cache::ResourceCache;
use crate::error::Error;
use crate::storage::KeyValueStore;

const ACCESS_TOKEN_KEY: &str = "accessToken";
const REFRESH_TOKEN_KEY: &str = "refreshToken";
const USER_KEY: &str = "user";

/// Cache namespace used when nobody is logged in.
pub const GUEST_USER_ID: &str = "guest";

#[derive(Debug, Clone)]
struct Session {
    credentials: Credentials,
    identity: Option<Identity>,
}

impl Session {
    fn new(credentials: Credentials) -> Self {
        let identity = Identity::from_token(credentials.access_token.expose_secret());
        Self {
            credentials,
            identity,
        }
    }
}

/// Holder of the current credential pair and the identity derived from it.
///
/// The in-memory snapshot is swapped under a write lock only after the backend
/// has been updated, so a reader sees either the old pair or the new one.
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
    cache: ResourceCache,
    session: RwLock<Option<Session>>,
}

impl CredentialStore {
    /// Create an empty store.
    pub fn new(backend: Arc<dyn KeyValueStore>, cache: ResourceCache) -> Self {
        Self {
            backend,
            cache,
            session: RwLock::new(None),
        }
    }

    /// Create a store holding whatever session a previous process persisted.
    pub async fn restore(backend: Arc<dyn KeyValueStore>, cache: ResourceCache) -> Result<Self, Error> {
        let store = Self::new(backend, cache);

        if let Some(access_token) = store.backend.get(ACCESS_TOKEN_KEY).await? {
            let refresh_token = store.backend.get(REFRESH_TOKEN_KEY).await?;
            let session = Session::new(Credentials::new(access_token, refresh_token));
            debug!(
                "Restored session for user {}",
                session
                    .identity
                    .as_ref()
                    .map(|identity| identity.user_id.as_str())
                    .unwrap_or(GUEST_USER_ID)
            );
            *store.session.write().await = Some(session);
        }

        Ok(store)
    }

    /// The current credential pair, if any.
    pub async fn read(&self) -> Option<Credentials> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|session| session.credentials.clone())
    }

    /// The identity decoded from the current access token.
    pub async fn identity(&self) -> Option<Identity> {
        self.session
            .read()
            .await
            .as_ref()
            .and_then(|session| session.identity.clone())
    }

    /// The cache namespace of the current user, `"guest"` when unknown.
    pub async fn user_id(&self) -> String {
        self.identity()
            .await
            .map(|identity| identity.user_id)
            .unwrap_or_else(|| GUEST_USER_ID.to_string())
    }

    /// Persist a new credential pair and recompute the identity.
    pub async fn write(&self, credentials: Credentials) -> Result<(), Error> {
        let session = Session::new(credentials);
        let mut current = self.session.write().await;

        self.backend
            .set(
                ACCESS_TOKEN_KEY,
                session.credentials.access_token.expose_secret().clone(),
            )
            .await?;

        match &session.credentials.refresh_token {
            Some(refresh_token) => {
                self.backend
                    .set(REFRESH_TOKEN_KEY, refresh_token.expose_secret().clone())
                    .await?
            }
            None => self.backend.remove(REFRESH_TOKEN_KEY).await?,
        }

        match &session.identity {
            Some(identity) => {
                self.backend
                    .set(USER_KEY, serde_json::to_string(&identity.claims)?)
                    .await?
            }
            None => self.backend.remove(USER_KEY).await?,
        }

        *current = Some(session);
        Ok(())
    }

    /// Remove the credential pair, the identity and every cache entry of the current user.
    pub async fn clear(&self) -> Result<(), Error> {
        let mut current = self.session.write().await;

        let user_id = current
            .as_ref()
            .and_then(|session| session.identity.as_ref())
            .map(|identity| identity.user_id.clone())
            .unwrap_or_else(|| GUEST_USER_ID.to_string());

        self.backend
            .remove_many(&[
                ACCESS_TOKEN_KEY.to_string(),
                REFRESH_TOKEN_KEY.to_string(),
                USER_KEY.to_string(),
            ])
            .await?;
        self.cache.invalidate_all(&user_id).await?;

        *current = None;
        info!("Cleared session for user {}", user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResourceKind;
    use crate::storage::MemoryStore;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use chrono::Utc;
    use serde_json::json;

    fn token_for(user_id: &str) -> String {
        let exp = Utc::now().timestamp() + 900;
        let body = URL_SAFE_NO_PAD.encode(format!(r#"{{"userId":"{}","exp":{}}}"#, user_id, exp));
        format!("eyJhbGciOiJIUzI1NiJ9.{}.sig", body)
    }

    fn store_with_backend() -> (CredentialStore, Arc<MemoryStore>, ResourceCache) {
        let backend = Arc::new(MemoryStore::new());
        let cache = ResourceCache::new(backend.clone());
        let store = CredentialStore::new(backend.clone(), cache.clone());
        (store, backend, cache)
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let (store, backend, _cache) = store_with_backend();
        assert!(store.read().await.is_none());
        assert_eq!(store.user_id().await, GUEST_USER_ID);

        store
            .write(Credentials::new(token_for("u1"), Some("refresh".to_string())))
            .await
            .unwrap();

        let credentials = store.read().await.unwrap();
        assert_eq!(credentials.refresh_token.unwrap().expose_secret(), "refresh");
        assert_eq!(store.user_id().await, "u1");
        assert!(backend.get(ACCESS_TOKEN_KEY).await.unwrap().is_some());
        assert!(backend.get(USER_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear_removes_session_and_user_cache() {
        let (store, backend, cache) = store_with_backend();
        store
            .write(Credentials::new(token_for("u1"), Some("refresh".to_string())))
            .await
            .unwrap();
        cache.write("u1", ResourceKind::LoanDetail, Some("L1"), json!({"x": 1})).await.unwrap();
        cache.write("u2", ResourceKind::LoanDetail, Some("L1"), json!({"x": 2})).await.unwrap();

        store.clear().await.unwrap();

        assert!(store.read().await.is_none());
        assert!(store.identity().await.is_none());
        assert!(backend.get(ACCESS_TOKEN_KEY).await.unwrap().is_none());
        assert!(backend.get(REFRESH_TOKEN_KEY).await.unwrap().is_none());
        assert!(cache.read("u1", ResourceKind::LoanDetail, Some("L1")).await.unwrap().is_none());
        assert_eq!(
            cache.read("u2", ResourceKind::LoanDetail, Some("L1")).await.unwrap(),
            Some(json!({"x": 2}))
        );
    }

    #[tokio::test]
    async fn test_restore_picks_up_persisted_session() {
        let (store, backend, cache) = store_with_backend();
        store
            .write(Credentials::new(token_for("u1"), Some("refresh".to_string())))
            .await
            .unwrap();
        drop(store);

        let restored = CredentialStore::restore(backend, cache).await.unwrap();
        assert_eq!(restored.user_id().await, "u1");
        assert!(restored.read().await.unwrap().expires_at.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reads_never_see_mixed_pair() {
        let (store, _backend, _cache) = store_with_backend();
        let store = Arc::new(store);
        let first = token_for("u1");
        let second = token_for("u2");
        store
            .write(Credentials::new(first.clone(), Some("r1".to_string())))
            .await
            .unwrap();

        let writer = {
            let store = Arc::clone(&store);
            let (first, second) = (first.clone(), second.clone());
            tokio::spawn(async move {
                for round in 0..200 {
                    let credentials = if round % 2 == 0 {
                        Credentials::new(second.clone(), Some("r2".to_string()))
                    } else {
                        Credentials::new(first.clone(), Some("r1".to_string()))
                    };
                    store.write(credentials).await.unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                let (first, second) = (first.clone(), second.clone());
                tokio::spawn(async move {
                    for _ in 0..200 {
                        let credentials = store.read().await.unwrap();
                        let access = credentials.access_token.expose_secret().clone();
                        let refresh = credentials.refresh_token.unwrap().expose_secret().clone();
                        if access == first {
                            assert_eq!(refresh, "r1");
                        } else {
                            assert_eq!(access, second);
                            assert_eq!(refresh, "r2");
                        }
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_write_without_refresh_token_drops_old_one() {
        let (store, backend, _cache) = store_with_backend();
        store
            .write(Credentials::new(token_for("u1"), Some("refresh".to_string())))
            .await
            .unwrap();
        store.write(Credentials::new(token_for("u1"), None)).await.unwrap();

        assert!(backend.get(REFRESH_TOKEN_KEY).await.unwrap().is_none());
        assert!(store.read().await.unwrap().refresh_token.is_none());
    }
}
