//! HTTP plumbing: client construction, request/response values, the raw
//! transport and the authenticated request gateway.

mod client;
mod gateway;
mod request;
mod transport;

pub use client::{HttpClientBuilder, HttpClientConfig};
pub use gateway::{is_allow_listed, Gateway, AUTH_ALLOW_LIST};
pub use request::{ApiRequest, ApiResponse};
pub use transport::{Dispatch, HttpTransport};
