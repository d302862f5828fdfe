//! Application configuration management.
//!
//! This module handles loading and saving the configuration, which names
//! the identity backend, the request timeout and where the credential
//! token is persisted.
//!
//! Configuration is stored at `~/.config/authkeep/config.json`. Selected
//! fields can be overridden from the environment (see `apply_env`).

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::client::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::auth::credentials::DEFAULT_SERVICE_NAME;
use crate::auth::{
    CredentialStore, EncryptedFileCredentialStore, FileCredentialStore, KeyringCredentialStore,
    MemoryCredentialStore,
};

/// Application name used for config/data directory paths
const APP_NAME: &str = "authkeep";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_KEYRING_ACCOUNT: &str = "default";

pub const ENV_API_URL: &str = "AUTHKEEP_API_URL";
pub const ENV_CREDENTIAL_BACKEND: &str = "AUTHKEEP_CREDENTIAL_BACKEND";
pub const ENV_PASSPHRASE: &str = "AUTHKEEP_PASSPHRASE";

/// Where the credential token lives between runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialBackend {
    #[default]
    Keyring,
    File,
    EncryptedFile,
    Memory,
}

impl std::str::FromStr for CredentialBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyring" => Ok(CredentialBackend::Keyring),
            "file" => Ok(CredentialBackend::File),
            "encrypted_file" | "encrypted-file" => Ok(CredentialBackend::EncryptedFile),
            "memory" => Ok(CredentialBackend::Memory),
            other => Err(anyhow!("Unknown credential backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub credential_backend: CredentialBackend,
    pub keyring_service: String,
    pub keyring_account: String,
    /// Overrides the platform data directory for file-backed stores
    pub data_dir: Option<PathBuf>,
    /// Daily-rolling log file; stderr only when unset
    pub log_file: Option<PathBuf>,
    /// Only read from the environment, never written to disk
    #[serde(skip)]
    pub passphrase: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            credential_backend: CredentialBackend::default(),
            keyring_service: DEFAULT_SERVICE_NAME.to_string(),
            keyring_account: DEFAULT_KEYRING_ACCOUNT.to_string(),
            data_dir: None,
            log_file: None,
            passphrase: None,
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            debug!(path = ?path, "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply overrides from `lookup` (normally the process environment)
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(backend) = lookup(ENV_CREDENTIAL_BACKEND).filter(|v| !v.is_empty()) {
            self.credential_backend = backend
                .parse()
                .with_context(|| format!("Invalid {}", ENV_CREDENTIAL_BACKEND))?;
        }
        if let Some(passphrase) = lookup(ENV_PASSPHRASE).filter(|v| !v.is_empty()) {
            self.passphrase = Some(passphrase);
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Construct the configured credential store
    pub fn build_store(&self) -> Result<Box<dyn CredentialStore>> {
        let store: Box<dyn CredentialStore> = match self.credential_backend {
            CredentialBackend::Keyring => Box::new(KeyringCredentialStore::new(
                self.keyring_service.clone(),
                self.keyring_account.clone(),
            )),
            CredentialBackend::File => Box::new(FileCredentialStore::in_dir(self.data_dir()?)),
            CredentialBackend::EncryptedFile => {
                let passphrase = self.passphrase.clone().ok_or_else(|| {
                    anyhow!("{} must be set for the encrypted_file backend", ENV_PASSPHRASE)
                })?;
                Box::new(EncryptedFileCredentialStore::in_dir(self.data_dir()?, passphrase))
            }
            CredentialBackend::Memory => Box::new(MemoryCredentialStore::new()),
        };
        debug!(backend = ?self.credential_backend, "Credential store configured");
        Ok(store)
    }
}
