//! Shared helpers for the crate's unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;

use crate::cache::ResourceCache;
use crate::credentials::{CredentialStore, Credentials};
use crate::error::{auth_error, AuthErrorKind, Error};
use crate::refresh::{RefreshedTokens, TokenExchange};
use crate::storage::MemoryStore;

/// Mint a signed access token for `user_id` expiring `expires_in_secs` from now.
pub(crate) fn access_token(user_id: &str, expires_in_secs: i64) -> String {
    let claims = json!({
        "userId": user_id,
        "email": format!("{}@example.com", user_id),
        "exp": Utc::now().timestamp() + expires_in_secs,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"test-signing-key"),
    )
    .unwrap()
}

/// Credential store over a fresh in-memory backend, optionally pre-populated.
pub(crate) async fn credential_store(
    credentials: Option<Credentials>,
) -> (Arc<CredentialStore>, ResourceCache) {
    let backend = Arc::new(MemoryStore::new());
    let cache = ResourceCache::new(backend.clone());
    let store = Arc::new(CredentialStore::new(backend, cache.clone()));
    if let Some(credentials) = credentials {
        store.write(credentials).await.unwrap();
    }
    (store, cache)
}

/// Token exchange that counts calls and issues a fixed token, or rejects.
pub(crate) struct CountingExchange {
    calls: AtomicUsize,
    issue: Option<String>,
}

impl CountingExchange {
    pub(crate) fn issuing(access_token: String) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            issue: Some(access_token),
        })
    }

    pub(crate) fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            issue: None,
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenExchange for CountingExchange {
    async fn refresh(&self, _refresh_token: &str) -> Result<RefreshedTokens, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.issue {
            Some(access_token) => Ok(RefreshedTokens {
                access_token: access_token.clone(),
                refresh_token: None,
            }),
            None => Err(auth_error(AuthErrorKind::RefreshRejected, "401 Unauthorized")),
        }
    }
}
