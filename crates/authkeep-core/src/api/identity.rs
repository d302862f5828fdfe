use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::models::{CredentialToken, UserProfile};

use super::{IdentityFetchError, LoginError, RegisterError};

/// Remote identity service consumed by the session manager.
///
/// Implementations only translate requests and responses; they hold no
/// session state of their own.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Exchange a token for the profile it belongs to
    async fn fetch_identity(&self, token: &CredentialToken) -> Result<UserProfile, IdentityFetchError>;

    /// Trade credentials for a new token
    async fn login(&self, username: &str, password: &str) -> Result<CredentialToken, LoginError>;

    /// Create an account. Does not log the new user in.
    async fn register(&self, profile: &Value) -> Result<(), RegisterError>;
}

#[async_trait]
impl<T: IdentityClient + ?Sized> IdentityClient for Arc<T> {
    async fn fetch_identity(&self, token: &CredentialToken) -> Result<UserProfile, IdentityFetchError> {
        (**self).fetch_identity(token).await
    }

    async fn login(&self, username: &str, password: &str) -> Result<CredentialToken, LoginError> {
        (**self).login(username, password).await
    }

    async fn register(&self, profile: &Value) -> Result<(), RegisterError> {
        (**self).register(profile).await
    }
}
