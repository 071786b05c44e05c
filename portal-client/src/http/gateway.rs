//! Authenticated request gateway.

use std::sync::Arc;

use log::*;
use serde_json::Value;

use super::{ApiRequest, ApiResponse, Dispatch};
use crate::auth::{LOGIN_PATH, REFRESH_PATH, REGISTER_PATH};
use crate::error::{http_error, Error, HttpErrorKind};
use crate::refresh::RefreshCoordinator;

/// Authentication routes that are dispatched without credentials.
///
/// Routing them through the coordinator would recurse into the refresh exchange.
pub const AUTH_ALLOW_LIST: [&str; 3] = [LOGIN_PATH, REGISTER_PATH, REFRESH_PATH];

/// True if `path` targets one of the authentication routes.
pub fn is_allow_listed(path: &str) -> bool {
    AUTH_ALLOW_LIST.iter().any(|route| path.contains(route))
}

/// Uniform entry point for outbound resource calls.
///
/// Every request outside the allow-list gets a valid bearer token from the
/// refresh coordinator first. A session that cannot be refreshed fails the
/// call before anything is dispatched. There is no retry: a 401 from the
/// resource itself is returned to the caller as is.
#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn Dispatch>,
    coordinator: Arc<RefreshCoordinator>,
}

impl Gateway {
    pub fn new(transport: Arc<dyn Dispatch>, coordinator: Arc<RefreshCoordinator>) -> Self {
        Self {
            transport,
            coordinator,
        }
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    /// Send a request, attaching credentials unless the route is allow-listed.
    ///
    /// Fails with `SessionExpired` when no valid token can be obtained,
    /// `Http(Status(code))` on a non-success response and `Http(Network)` when
    /// no response was received.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        let request = if is_allow_listed(&request.path) {
            trace!("Dispatching {} without credentials", request.path);
            request
        } else {
            let access_token = self.coordinator.ensure_valid().await?;
            request.bearer_auth(&access_token)?
        };

        let method = request.method.clone();
        let path = request.path.clone();
        let response = self.transport.dispatch(request).await?;

        if !response.is_success() {
            let status = response.status.as_u16();
            warn!("{} {} failed with status {}", method, path, status);
            return Err(http_error(HttpErrorKind::Status(status), &response.text()));
        }

        Ok(response)
    }

    /// `GET` a JSON resource.
    pub async fn get_json(&self, path: &str) -> Result<Value, Error> {
        self.send(ApiRequest::get(path)).await?.json()
    }

    /// `POST` a JSON body and read a JSON response.
    pub async fn post_json(&self, path: &str, body: Value) -> Result<Value, Error> {
        self.send(ApiRequest::post(path, body)).await?.json()
    }
}
