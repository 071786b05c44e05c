use std::sync::Arc;

use async_trait::async_trait;
use log::*;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{LOGIN_PATH, REFRESH_PATH, REGISTER_PATH};
use crate::credentials::{CredentialStore, Credentials, Identity};
use crate::error::{auth_error, http_error, AuthErrorKind, Error, HttpErrorKind};
use crate::http::{ApiRequest, ApiResponse, Dispatch};
use crate::refresh::{RefreshedTokens, TokenExchange};

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Client for the authentication routes.
///
/// These routes sit on the gateway allow-list, so requests go straight to the
/// transport. The service is also the [`TokenExchange`] used by the refresh
/// coordinator.
pub struct AuthService {
    transport: Arc<dyn Dispatch>,
    store: Arc<CredentialStore>,
}

impl AuthService {
    pub fn new(transport: Arc<dyn Dispatch>, store: Arc<CredentialStore>) -> Self {
        Self { transport, store }
    }

    /// Exchange email and password for a credential pair and store it.
    ///
    /// Returns the identity decoded from the new access token, `None` if the
    /// token carries no user id.
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<Option<Identity>, Error> {
        let body = serde_json::to_value(LoginRequest {
            email,
            password: password.expose_secret(),
        })?;
        let response = self.transport.dispatch(ApiRequest::post(LOGIN_PATH, body)).await?;

        if !response.is_success() {
            warn!("Login rejected with status {}", response.status);
            return Err(auth_error(
                AuthErrorKind::LoginFailed,
                &format!("status {}: {}", response.status.as_u16(), response.text()),
            ));
        }

        let tokens = Self::token_response(&response)?;
        self.store
            .write(Credentials::new(tokens.access_token, tokens.refresh_token))
            .await?;

        let identity = self.store.identity().await;
        match &identity {
            Some(identity) => info!("Logged in as {}", identity.user_id),
            None => warn!("Logged in, but the access token carries no user id"),
        }
        Ok(identity)
    }

    /// Create an account. The response body is returned as is.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<Value, Error> {
        let body = serde_json::to_value(RegisterRequest {
            name,
            email,
            password: password.expose_secret(),
        })?;
        let response = self
            .transport
            .dispatch(ApiRequest::post(REGISTER_PATH, body))
            .await?;

        if !response.is_success() {
            return Err(http_error(
                HttpErrorKind::Status(response.status.as_u16()),
                &response.text(),
            ));
        }
        response.json()
    }

    /// Forget the session and the current user's cached resources.
    pub async fn logout(&self) -> Result<(), Error> {
        self.store.clear().await
    }

    fn token_response(response: &ApiResponse) -> Result<TokenResponse, Error> {
        let tokens: TokenResponse = response.json()?;
        if tokens.access_token.is_empty() {
            return Err(http_error(
                HttpErrorKind::InvalidResponse,
                "Response carried an empty access token",
            ));
        }
        Ok(tokens)
    }
}

#[async_trait]
impl TokenExchange for AuthService {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, Error> {
        let body = serde_json::to_value(RefreshRequest { refresh_token })?;
        let response = self
            .transport
            .dispatch(ApiRequest::post(REFRESH_PATH, body))
            .await?;

        if !response.is_success() {
            return Err(auth_error(
                AuthErrorKind::RefreshRejected,
                &format!("status {}: {}", response.status.as_u16(), response.text()),
            ));
        }

        let tokens = Self::token_response(&response)?;
        Ok(RefreshedTokens {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token.filter(|token| !token.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::http::HttpTransport;
    use crate::test_support::{access_token, credential_store};
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;

    async fn service(server: &ServerGuard, credentials: Option<Credentials>) -> AuthService {
        let (store, _cache) = credential_store(credentials).await;
        let transport = Arc::new(HttpTransport::new(reqwest::Client::new(), &server.url()));
        AuthService::new(transport, store)
    }

    fn password() -> SecretString {
        SecretString::new("hunter2".to_string())
    }

    #[tokio::test]
    async fn test_login_stores_credentials() {
        let mut server = Server::new_async().await;
        let token = access_token("u1", 900);
        let mock = server
            .mock("POST", "/auth/login")
            .match_header("authorization", Matcher::Missing)
            .match_body(Matcher::Json(json!({"email": "u1@example.com", "password": "hunter2"})))
            .with_status(200)
            .with_body(
                json!({"accessToken": token, "refreshToken": "r1", "user": {"id": "u1"}})
                    .to_string(),
            )
            .create_async()
            .await;

        let auth = service(&server, None).await;
        let identity = auth.login("u1@example.com", &password()).await.unwrap().unwrap();

        assert_eq!(identity.user_id, "u1");
        assert_eq!(identity.email.as_deref(), Some("u1@example.com"));
        let stored = auth.store.read().await.unwrap();
        assert_eq!(stored.access_token.expose_secret(), &token);
        assert_eq!(stored.refresh_token.unwrap().expose_secret(), "r1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/auth/login")
            .with_status(401)
            .with_body(r#"{"message":"Invalid credentials"}"#)
            .create_async()
            .await;

        let auth = service(&server, None).await;
        let err = auth.login("u1@example.com", &password()).await.unwrap_err();

        assert_eq!(err.error_kind, ErrorKind::Auth(AuthErrorKind::LoginFailed));
        assert!(auth.store.read().await.is_none());
    }

    #[tokio::test]
    async fn test_register_returns_body() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/auth/register")
            .match_body(Matcher::Json(
                json!({"name": "Ada", "email": "ada@example.com", "password": "hunter2"}),
            ))
            .with_status(201)
            .with_body(r#"{"id":"u9"}"#)
            .create_async()
            .await;

        let auth = service(&server, None).await;
        let body = auth
            .register("Ada", "ada@example.com", &password())
            .await
            .unwrap();

        assert_eq!(body, json!({"id": "u9"}));
    }

    #[tokio::test]
    async fn test_logout_clears_store() {
        let server = Server::new_async().await;
        let auth = service(
            &server,
            Some(Credentials::new(access_token("u1", 900), Some("r1".to_string()))),
        )
        .await;

        auth.logout().await.unwrap();

        assert!(auth.store.read().await.is_none());
    }

    #[tokio::test]
    async fn test_refresh_posts_refresh_token() {
        let mut server = Server::new_async().await;
        let fresh = access_token("u1", 900);
        let mock = server
            .mock("POST", "/auth/refresh")
            .match_body(Matcher::Json(json!({"refreshToken": "r1"})))
            .with_status(200)
            .with_body(json!({"accessToken": fresh, "refreshToken": "r2"}).to_string())
            .expect(1)
            .create_async()
            .await;

        let auth = service(&server, None).await;
        let refreshed = auth.refresh("r1").await.unwrap();

        assert_eq!(refreshed.access_token, fresh);
        assert_eq!(refreshed.refresh_token.as_deref(), Some("r2"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_without_rotation() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/auth/refresh")
            .with_status(200)
            .with_body(r#"{"accessToken":"a2"}"#)
            .create_async()
            .await;

        let auth = service(&server, None).await;

        assert!(auth.refresh("r1").await.unwrap().refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_rejected_refresh() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/auth/refresh")
            .with_status(401)
            .with_body(r#"{"message":"invalid refresh token"}"#)
            .create_async()
            .await;

        let auth = service(&server, None).await;
        let err = auth.refresh("stale").await.unwrap_err();

        assert_eq!(err.error_kind, ErrorKind::Auth(AuthErrorKind::RefreshRejected));
    }
}
