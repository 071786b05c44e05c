//! Top-level client wiring every component together.

use std::sync::Arc;
use std::time::Duration;

use log::*;

use crate::auth::AuthService;
use crate::cache::ResourceCache;
use crate::credentials::CredentialStore;
use crate::error::Error;
use crate::http::{Gateway, HttpClientBuilder, HttpClientConfig, HttpTransport};
use crate::portfolio::PortfolioApi;
use crate::refresh::{RefreshCoordinator, DEFAULT_SAFETY_MARGIN};
use crate::storage::KeyValueStore;

/// Portal client configuration.
#[derive(Debug, Clone)]
pub struct PortalClientConfig {
    /// Base URL every request path is appended to.
    pub base_url: String,
    /// Tokens expiring within this window are refreshed before use.
    pub refresh_margin: Duration,
    /// Request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub user_agent: String,
}

impl PortalClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            refresh_margin: DEFAULT_SAFETY_MARGIN,
            timeout: None,
            user_agent: HttpClientConfig::default().user_agent,
        }
    }

    pub fn with_refresh_margin(mut self, refresh_margin: Duration) -> Self {
        self.refresh_margin = refresh_margin;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// One authenticated session against the portal backend.
///
/// Owns its refresh coordinator, so two clients never share a refresh.
pub struct PortalClient {
    credentials: Arc<CredentialStore>,
    cache: ResourceCache,
    coordinator: Arc<RefreshCoordinator>,
    gateway: Gateway,
    auth: Arc<AuthService>,
    portfolio: PortfolioApi,
}

impl PortalClient {
    /// Build a client on top of `backend`, restoring any persisted session.
    pub async fn new(config: PortalClientConfig, backend: Arc<dyn KeyValueStore>) -> Result<Self, Error> {
        let http_client = HttpClientBuilder::from_config(HttpClientConfig {
            timeout: config.timeout,
            user_agent: config.user_agent,
        })
        .build()?;
        let transport = Arc::new(HttpTransport::new(http_client, &config.base_url));

        let cache = ResourceCache::new(Arc::clone(&backend));
        let credentials = Arc::new(CredentialStore::restore(backend, cache.clone()).await?);
        let auth = Arc::new(AuthService::new(transport.clone(), Arc::clone(&credentials)));
        let coordinator = Arc::new(RefreshCoordinator::with_safety_margin(
            Arc::clone(&credentials),
            auth.clone(),
            config.refresh_margin,
        ));
        let gateway = Gateway::new(transport, Arc::clone(&coordinator));
        let portfolio = PortfolioApi::new(gateway.clone(), cache.clone());

        debug!("Portal client ready for {}", config.base_url);

        Ok(Self {
            credentials,
            cache,
            coordinator,
            gateway,
            auth,
            portfolio,
        })
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn portfolio(&self) -> &PortfolioApi {
        &self.portfolio
    }
}
