//! HTTP client for the identity backend.
//!
//! `ApiClient` implements [`IdentityClient`] over JSON endpoints rooted at a
//! configured base URL:
//!
//! - `GET  /user/me`   bearer token in, `{ "user": ... }` out
//! - `POST /login`     `{ username, password }` in, `{ "token" }` out
//! - `POST /register`  arbitrary profile in, body ignored

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{CredentialToken, UserProfile};

use super::{ApiError, IdentityClient, IdentityFetchError, LoginError, RegisterError};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds when none is configured
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const USER_AGENT: &str = concat!("authkeep/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct IdentityResponse {
    user: UserProfile,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Identity backend client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for `base_url` with the default request timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_timeout(
            config.api_base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Pull the display message out of a rejected login response.
    fn rejection_message(status: reqwest::StatusCode, body: &str) -> String {
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| format!("Login failed (HTTP {})", status.as_u16()))
    }
}

#[async_trait]
impl IdentityClient for ApiClient {
    async fn fetch_identity(&self, token: &CredentialToken) -> Result<UserProfile, IdentityFetchError> {
        let url = self.url("/user/me");
        debug!(url = %url, "Fetching identity");

        let response = self
            .client
            .get(&url)
            .bearer_auth(token.expose())
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(ApiError::from)?;

        let response = Self::check_response(response).await?;

        let identity: IdentityResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse identity response: {}", e)))?;

        Ok(identity.user)
    }

    async fn login(&self, username: &str, password: &str) -> Result<CredentialToken, LoginError> {
        let url = self.url("/login");
        debug!(url = %url, username = username, "Sending login request");

        let response = self
            .client
            .post(&url)
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(|e| LoginError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                body = %ApiError::truncate_body(&body),
                "Login rejected"
            );
            return Err(LoginError::Rejected(Self::rejection_message(status, &body)));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| LoginError::Transport(format!("Failed to parse login response: {}", e)))?;

        Ok(CredentialToken::from(login.token))
    }

    async fn register(&self, profile: &Value) -> Result<(), RegisterError> {
        let url = self.url("/register");
        debug!(url = %url, "Sending registration request");

        let response = self
            .client
            .post(&url)
            .json(profile)
            .send()
            .await
            .map_err(|e| RegisterError::Transport(e.to_string()))?;

        match Self::check_response(response).await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(error = %e, "Registration rejected");
                Err(RegisterError::Rejected)
            }
        }
    }
}
