//! Credential persistence.
//!
//! This module provides the `CredentialStore` trait and its backends:
//! - `MemoryCredentialStore`: process-local, for tests and ephemeral sessions
//! - `KeyringCredentialStore`: OS-level keychain via keyring
//! - `FileCredentialStore`: plain JSON file in the data directory
//! - `EncryptedFileCredentialStore`: passphrase-sealed JSON file
//!
//! The session manager only sees the trait, so the medium can be swapped
//! through configuration.

pub mod credentials;
pub mod encrypted;
pub mod file_store;

pub use credentials::{CredentialStore, KeyringCredentialStore, MemoryCredentialStore};
pub use encrypted::EncryptedFileCredentialStore;
pub use file_store::{FileCredentialStore, StoredToken};
