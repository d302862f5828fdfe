use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque bearer token proving identity to the backend.
///
/// Equality is by value. `Debug` never prints the token itself so it can
/// travel through `tracing` fields safely; use [`CredentialToken::expose`]
/// when the raw value is actually needed.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialToken(String);

impl CredentialToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for CredentialToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialToken(<redacted, {} chars>)", self.0.len())
    }
}

impl From<String> for CredentialToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CredentialToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
