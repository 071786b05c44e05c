//! Raw request dispatch.

use async_trait::async_trait;
use log::*;

use super::{ApiRequest, ApiResponse};
use crate::error::Error;

/// Trait for sending a request and reading the whole response.
///
/// Implementations attach nothing: credentials are the gateway's concern.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, request: ApiRequest) -> Result<ApiResponse, Error>;
}

/// reqwest-backed transport rooted at the API base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a path relative to the base URL.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Dispatch for HttpTransport {
    async fn dispatch(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        let url = self.url_for(&request.path);
        debug!("{} {}", request.method, url);

        let mut builder = self
            .client
            .request(request.method, url.as_str())
            .headers(request.headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        trace!("{} answered {} ({} bytes)", url, status, body.len());

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}
