//! Decoding of access-token claims.
//!
//! Access tokens are JWTs. Only the payload segment is read: the signature is
//! the server's business, the client only needs the expiry and who the token
//! belongs to.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{auth_error, AuthErrorKind, Error};

/// Claim names checked, in order, for the user identifier.
const USER_ID_CLAIMS: [&str; 3] = ["userId", "sub", "id"];

/// Identity decoded from an access token.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    /// Every claim carried by the token.
    #[serde(skip)]
    pub claims: Map<String, Value>,
}

impl Identity {
    /// Build an identity from decoded claims. Returns `None` when no user id claim is present.
    pub fn from_claims(claims: Map<String, Value>) -> Option<Self> {
        let user_id = USER_ID_CLAIMS
            .iter()
            .find_map(|name| claim_as_string(&claims, name))?;

        Some(Self {
            user_id,
            email: claim_as_string(&claims, "email"),
            name: claim_as_string(&claims, "name"),
            claims,
        })
    }

    /// Decode the identity carried by an access token.
    pub fn from_token(token: &str) -> Option<Self> {
        decode_claims(token).ok().and_then(Self::from_claims)
    }
}

fn claim_as_string(claims: &Map<String, Value>, name: &str) -> Option<String> {
    match claims.get(name)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decode the payload segment of a JWT into its claim map.
pub fn decode_claims(token: &str) -> Result<Map<String, Value>, Error> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next()) {
        (Some(_header), Some(payload)) if !payload.is_empty() => payload,
        _ => return Err(auth_error(AuthErrorKind::InvalidToken, "Token is not a JWT")),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| auth_error(AuthErrorKind::InvalidToken, &format!("Invalid token payload: {}", e)))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(claims)) => Ok(claims),
        Ok(_) => Err(auth_error(AuthErrorKind::InvalidToken, "Token payload is not an object")),
        Err(e) => Err(auth_error(AuthErrorKind::InvalidToken, &format!("Invalid token payload: {}", e))),
    }
}

/// The `exp` claim as an absolute timestamp.
pub(crate) fn expiry(claims: &Map<String, Value>) -> Option<DateTime<Utc>> {
    let exp = claims.get("exp")?.as_f64()?;
    DateTime::from_timestamp(exp.trunc() as i64, 0)
}
