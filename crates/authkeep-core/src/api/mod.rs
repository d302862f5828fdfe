//! Identity backend module.
//!
//! This module provides the `IdentityClient` trait the session manager
//! talks to, and `ApiClient`, its HTTP+JSON implementation.
//!
//! The backend uses bearer token authentication; tokens are obtained
//! through the login endpoint.

pub mod client;
pub mod error;
pub mod identity;

pub use client::ApiClient;
pub use error::{ApiError, IdentityFetchError, LoginError, RegisterError};
pub use identity::IdentityClient;
