use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use keyring::Entry;
use tracing::debug;

use crate::models::CredentialToken;

/// Default keychain service name
pub const DEFAULT_SERVICE_NAME: &str = "authkeep";

/// Durable slot for a single credential token.
///
/// `set` overwrites unconditionally and `clear` on an empty store succeeds.
/// Errors only report a broken backing medium (unreadable file, locked
/// keychain); an absent token is `Ok(None)`.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Result<Option<CredentialToken>>;
    fn set(&self, token: &CredentialToken) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

impl<T: CredentialStore + ?Sized> CredentialStore for Box<T> {
    fn get(&self) -> Result<Option<CredentialToken>> {
        (**self).get()
    }

    fn set(&self, token: &CredentialToken) -> Result<()> {
        (**self).set(token)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}

impl<T: CredentialStore + ?Sized> CredentialStore for Arc<T> {
    fn get(&self) -> Result<Option<CredentialToken>> {
        (**self).get()
    }

    fn set(&self, token: &CredentialToken) -> Result<()> {
        (**self).set(token)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}

/// Process-local store. Clones share the same slot, so a second manager
/// built over a clone sees what the first one persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    slot: Arc<Mutex<Option<CredentialToken>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<CredentialToken>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(token.into()))),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Result<Option<CredentialToken>> {
        let slot = self.slot.lock().map_err(|_| anyhow!("Credential slot poisoned"))?;
        Ok(slot.clone())
    }

    fn set(&self, token: &CredentialToken) -> Result<()> {
        let mut slot = self.slot.lock().map_err(|_| anyhow!("Credential slot poisoned"))?;
        *slot = Some(token.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut slot = self.slot.lock().map_err(|_| anyhow!("Credential slot poisoned"))?;
        *slot = None;
        Ok(())
    }
}

/// Token kept in the OS keychain under `(service, account)`.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service: String,
    account: String,
}

impl KeyringCredentialStore {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, &self.account).context("Failed to create keyring entry")
    }
}

impl CredentialStore for KeyringCredentialStore {
    /// Retrieve the token from the OS keychain
    fn get(&self) -> Result<Option<CredentialToken>> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(CredentialToken::from(token))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve token from keychain"),
        }
    }

    /// Store the token in the OS keychain
    fn set(&self, token: &CredentialToken) -> Result<()> {
        self.entry()?
            .set_password(token.expose())
            .context("Failed to store token in keychain")?;
        debug!(service = %self.service, account = %self.account, "Token stored in keychain");
        Ok(())
    }

    /// Delete the stored token
    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}
