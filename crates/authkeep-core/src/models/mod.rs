//! Data models shared across the session core.
//!
//! - `CredentialToken`: opaque bearer token, redacted in debug output
//! - `UserProfile`: opaque identity blob returned by the backend
//! - `Route`: navigation destinations emitted by session operations

pub mod route;
pub mod token;
pub mod user;

pub use route::Route;
pub use token::CredentialToken;
pub use user::UserProfile;
