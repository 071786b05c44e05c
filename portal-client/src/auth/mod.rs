//! Login, registration, logout and the refresh exchange against the remote
//! authentication endpoints.

mod service;

pub use service::AuthService;

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const REFRESH_PATH: &str = "/auth/refresh";
