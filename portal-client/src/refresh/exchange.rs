//! The refresh exchange seam.

use async_trait::async_trait;

use crate::error::Error;

/// Tokens returned by a successful refresh exchange.
#[derive(Debug, Clone)]
pub struct RefreshedTokens {
    pub access_token: String,
    /// Present only when the server rotated the refresh token.
    pub refresh_token: Option<String>,
}

/// Trait for exchanging a refresh token for a new access token.
///
/// Implementations talk to the remote authentication endpoint directly and must
/// never go through the request gateway.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Exchange `refresh_token` for a new access token.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, Error>;
}
