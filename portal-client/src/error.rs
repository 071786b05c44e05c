//! Error types for the `portal-client` crate.
//!
//! A root Error struct holds the error kind and an optional source for chaining.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for portal-client.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in portal-client.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    Auth(AuthErrorKind),
    Http(HttpErrorKind),
    Storage(StorageErrorKind),
}

/// Errors from credential handling and the auth endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// The session can no longer be refreshed; the user must log in again.
    SessionExpired,
    /// The remote auth endpoint rejected the refresh token.
    RefreshRejected,
    /// The login endpoint rejected the credentials.
    LoginFailed,
    /// An access token could not be decoded.
    InvalidToken,
}

/// Errors from dispatching requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpErrorKind {
    /// The remote responded with a non-success status code.
    Status(u16),
    /// Transport failure before any response was received.
    Network,
    BuilderFailed,
    InvalidResponse,
}

/// Errors from the key/value backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    Io,
    Serialization,
}

impl Error {
    /// True when the caller has to force a full re-login.
    pub fn is_auth_expired(&self) -> bool {
        self.error_kind == ErrorKind::Auth(AuthErrorKind::SessionExpired)
    }

    /// The remote status code, if the error came from a non-success response.
    pub fn status(&self) -> Option<u16> {
        match self.error_kind {
            ErrorKind::Http(HttpErrorKind::Status(code)) => Some(code),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Auth(AuthErrorKind::SessionExpired) => write!(f, "Session expired")?,
            ErrorKind::Auth(kind) => write!(f, "Auth error: {:?}", kind)?,
            ErrorKind::Http(HttpErrorKind::Status(code)) => write!(f, "HTTP error: status {}", code)?,
            ErrorKind::Http(kind) => write!(f, "HTTP error: {:?}", kind)?,
            ErrorKind::Storage(kind) => write!(f, "Storage error: {:?}", kind)?,
        }
        if let Some(source) = &self.source {
            write!(f, " ({})", source)?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let error_kind = if err.is_builder() {
            ErrorKind::Http(HttpErrorKind::BuilderFailed)
        } else if err.is_decode() {
            ErrorKind::Http(HttpErrorKind::InvalidResponse)
        } else if let Some(status) = err.status() {
            ErrorKind::Http(HttpErrorKind::Status(status.as_u16()))
        } else {
            ErrorKind::Http(HttpErrorKind::Network)
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Storage(StorageErrorKind::Serialization),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Storage(StorageErrorKind::Io),
        }
    }
}

/// Helper function to create auth errors.
pub fn auth_error(kind: AuthErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Auth(kind),
    }
}

/// Helper function to create HTTP errors.
pub fn http_error(kind: HttpErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Http(kind),
    }
}
