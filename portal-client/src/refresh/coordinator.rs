//! Single-flight refresh of the access token.

use std::sync::Arc;
use std::time::Duration;

use log::*;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, OnceCell};

use super::TokenExchange;
use crate::credentials::CredentialStore;
use crate::error::{auth_error, AuthErrorKind, Error};

/// Tokens expiring within this window are refreshed before use.
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(60);

/// Why a refresh ended the session. Cloned to every waiter.
#[derive(Debug, Clone)]
struct RefreshFailure {
    reason: String,
}

type Outcome = Result<SecretString, RefreshFailure>;

/// Shared handle for one refresh exchange. Settles exactly once.
type Ticket = Arc<OnceCell<Outcome>>;

/// Coordinates access-token refreshes so at most one exchange is in flight.
///
/// The first caller that finds the token missing or near expiry opens a ticket
/// and runs the exchange. Callers arriving while the ticket is open wait on it
/// and receive the same token, or the same failure. A failed exchange clears
/// the credential store.
pub struct RefreshCoordinator {
    store: Arc<CredentialStore>,
    exchange: Arc<dyn TokenExchange>,
    safety_margin: chrono::Duration,
    ticket: Mutex<Option<Ticket>>,
}

impl RefreshCoordinator {
    pub fn new(store: Arc<CredentialStore>, exchange: Arc<dyn TokenExchange>) -> Self {
        Self::with_safety_margin(store, exchange, DEFAULT_SAFETY_MARGIN)
    }

    pub fn with_safety_margin(
        store: Arc<CredentialStore>,
        exchange: Arc<dyn TokenExchange>,
        safety_margin: Duration,
    ) -> Self {
        Self {
            store,
            exchange,
            safety_margin: chrono::Duration::from_std(safety_margin)
                .unwrap_or_else(|_| chrono::Duration::seconds(60)),
            ticket: Mutex::new(None),
        }
    }

    pub fn credential_store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// True while a refresh exchange is underway.
    pub async fn is_refreshing(&self) -> bool {
        self.ticket
            .lock()
            .await
            .as_ref()
            .is_some_and(|ticket| !ticket.initialized())
    }

    /// Get a valid access token, refreshing it first if needed.
    ///
    /// Returns immediately without network access when the stored token is
    /// outside the safety margin. Fails with `SessionExpired` when the session
    /// cannot be refreshed.
    pub async fn ensure_valid(&self) -> Result<SecretString, Error> {
        if let Some(credentials) = self.store.read().await {
            if !credentials.is_expiring(self.safety_margin) {
                return Ok(credentials.access_token);
            }
        }

        let ticket = self.join_or_open_ticket().await;
        let outcome = ticket.get_or_init(|| self.run_exchange()).await.clone();
        self.retire_ticket(&ticket).await;

        outcome.map_err(|failure| auth_error(AuthErrorKind::SessionExpired, &failure.reason))
    }

    /// Attach to the open ticket, or open a new one. The check-and-set happens
    /// under the slot lock before any network call.
    async fn join_or_open_ticket(&self) -> Ticket {
        let mut slot = self.ticket.lock().await;
        match slot.as_ref() {
            Some(ticket) if !ticket.initialized() => {
                debug!("Joining in-flight token refresh");
                Arc::clone(ticket)
            }
            _ => {
                let ticket: Ticket = Arc::new(OnceCell::new());
                *slot = Some(Arc::clone(&ticket));
                ticket
            }
        }
    }

    async fn retire_ticket(&self, ticket: &Ticket) {
        let mut slot = self.ticket.lock().await;
        if slot
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, ticket))
        {
            *slot = None;
        }
    }

    async fn run_exchange(&self) -> Outcome {
        let current = self.store.read().await;

        // A ticket opened right after another one settled finds a fresh token.
        if let Some(credentials) = &current {
            if !credentials.is_expiring(self.safety_margin) {
                debug!("Token was refreshed by another request");
                return Ok(credentials.access_token.clone());
            }
        }

        let Some(credentials) = current else {
            return self.expire_session("No credentials stored").await;
        };
        let Some(refresh_token) = credentials.refresh_token.clone() else {
            return self.expire_session("No refresh token available").await;
        };

        debug!("Access token missing or near expiry, refreshing");

        let refreshed = match self.exchange.refresh(refresh_token.expose_secret()).await {
            Ok(refreshed) => refreshed,
            Err(e) => {
                warn!("Token refresh failed: {}", e);
                return self
                    .expire_session(&format!("Token refresh failed: {}", e))
                    .await;
            }
        };

        let rotated = refreshed.refresh_token.is_some();
        let updated = credentials.refreshed(refreshed.access_token, refreshed.refresh_token);

        if let Err(e) = self.store.write(updated.clone()).await {
            warn!("Failed to store refreshed tokens: {}", e);
            return self
                .expire_session(&format!("Failed to store refreshed tokens: {}", e))
                .await;
        }

        info!(
            "Access token refreshed successfully (refresh token rotated: {})",
            rotated
        );
        Ok(updated.access_token)
    }

    async fn expire_session(&self, reason: &str) -> Outcome {
        if let Err(e) = self.store.clear().await {
            error!("Failed to clear credentials after refresh failure: {}", e);
        }
        Err(RefreshFailure {
            reason: reason.to_string(),
        })
    }
}
