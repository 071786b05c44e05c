//! Credential pair, decoded identity and the store that owns them.

mod claims;
mod store;
mod tokens;

pub use claims::{decode_claims, Identity};
pub use store::{CredentialStore, GUEST_USER_ID};
pub use tokens::Credentials;
