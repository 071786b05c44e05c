//! # portal-client
//!
//! Client-side session and data access layer for the loan portal API:
//! - Credential store persisting the access/refresh token pair and the
//!   identity decoded from the access token
//! - Single-flight refresh coordination with a pre-expiry safety margin
//! - Authenticated request gateway that attaches bearer tokens and bypasses
//!   the authentication routes
//! - Per-user cache-aside layer with background prefetch and logout isolation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use portal_client::{storage::FileStore, PortalClient, PortalClientConfig};
//!
//! let backend = Arc::new(FileStore::open("portal.json").await?);
//! let client = PortalClient::new(PortalClientConfig::new("http://localhost:3000"), backend).await?;
//! let loans = client.portfolio().loans().await?;
//! ```

pub mod auth;
pub mod cache;
pub mod client;
pub mod credentials;
pub mod error;
pub mod http;
pub mod portfolio;
pub mod refresh;
pub mod storage;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use client::{PortalClient, PortalClientConfig};
pub use error::{Error, ErrorKind};
