use thiserror::Error;

/// Low-level failure of a single backend request.
///
/// Session code never branches on these variants; they are wrapped in the
/// operation-level errors below and kept for logging.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - token may be invalid or expired")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }
}

/// Any failure exchanging a token for a user profile.
///
/// Rejected tokens and unreachable backends are deliberately the same kind.
#[derive(Error, Debug)]
#[error("Failed to resolve identity: {0}")]
pub struct IdentityFetchError(#[from] pub ApiError);

/// Failure of a login request. Both variants carry text meant for display.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    /// The backend answered with a non-success status
    #[error("{0}")]
    Rejected(String),

    /// The request could not be completed
    #[error("{0}")]
    Transport(String),
}

impl LoginError {
    pub fn message(&self) -> &str {
        match self {
            LoginError::Rejected(message) | LoginError::Transport(message) => message,
        }
    }

    pub fn into_message(self) -> String {
        match self {
            LoginError::Rejected(message) | LoginError::Transport(message) => message,
        }
    }
}

/// Failure of a registration request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
    /// The backend refused the registration. No message is surfaced.
    #[error("Registration rejected")]
    Rejected,

    /// The request could not be completed
    #[error("{0}")]
    Transport(String),
}

impl RegisterError {
    /// Text to show the user, if this kind of failure is surfaced at all
    pub fn into_message(self) -> Option<String> {
        match self {
            RegisterError::Rejected => None,
            RegisterError::Transport(message) => Some(message),
        }
    }
}
