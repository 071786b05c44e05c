//! Credential pair types.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};

use super::claims::{decode_claims, expiry};

/// Access/refresh credential pair.
///
/// `expires_at` is decoded from the access token's `exp` claim and is `None`
/// when the token cannot be decoded.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Access token for resource requests.
    pub access_token: SecretString,
    /// Refresh token for obtaining new access tokens.
    pub refresh_token: Option<SecretString>,
    /// When the access token expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Build a credential pair, decoding the expiry from the access token.
    pub fn new(access_token: String, refresh_token: Option<String>) -> Self {
        let expires_at = decode_claims(&access_token)
            .ok()
            .and_then(|claims| expiry(&claims));

        Self {
            access_token: SecretString::new(access_token),
            refresh_token: refresh_token
                .filter(|token| !token.is_empty())
                .map(SecretString::new),
            expires_at,
        }
    }

    /// Replace the access token after a refresh exchange.
    ///
    /// A rotated refresh token replaces the current one; otherwise the current one is kept.
    pub fn refreshed(&self, access_token: String, rotated_refresh_token: Option<String>) -> Self {
        let refresh_token = rotated_refresh_token
            .filter(|token| !token.is_empty())
            .or_else(|| {
                self.refresh_token
                    .as_ref()
                    .map(|token| token.expose_secret().clone())
            });

        Self::new(access_token, refresh_token)
    }

    /// True if the access token is undecodable, expired, or expires within `margin`.
    ///
    /// An expiry too close to the representable minimum to subtract the margin
    /// from counts as expiring.
    pub fn is_expiring(&self, margin: Duration) -> bool {
        self.expires_at
            .and_then(|expires| expires.checked_sub_signed(margin))
            .map_or(true, |deadline| Utc::now() > deadline)
    }

    /// Get the remaining time until expiration.
    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expires_at.map(|expires| expires - Utc::now())
    }
}
