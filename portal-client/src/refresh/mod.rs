//! Access-token refresh coordination.

mod coordinator;
mod exchange;

pub use coordinator::{RefreshCoordinator, DEFAULT_SAFETY_MARGIN};
pub use exchange::{RefreshedTokens, TokenExchange};
