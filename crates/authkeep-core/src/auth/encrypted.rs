use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use argon2::Argon2;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::CredentialToken;

use super::file_store::{remove_if_exists, write_private};
use super::CredentialStore;

/// Encrypted token file name in the data directory
pub const ENCRYPTED_TOKEN_FILE: &str = "token.enc.json";

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

#[derive(Debug, Serialize, Deserialize)]
struct SealedToken {
    salt: Vec<u8>,
    nonce: Vec<u8>,
    ciphertext: Vec<u8>,
    saved_at: DateTime<Utc>,
}

/// Token persisted as a ChaCha20-Poly1305 sealed file.
///
/// The key is derived with Argon2 from a passphrase and a salt that is
/// regenerated on every write. A file that fails to decrypt (wrong
/// passphrase, tampering) reads as "no token".
#[derive(Clone)]
pub struct EncryptedFileCredentialStore {
    path: PathBuf,
    passphrase: String,
}

impl fmt::Debug for EncryptedFileCredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedFileCredentialStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl EncryptedFileCredentialStore {
    pub fn new(path: impl Into<PathBuf>, passphrase: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            passphrase: passphrase.into(),
        }
    }

    /// Store at `<dir>/token.enc.json`
    pub fn in_dir(dir: impl AsRef<Path>, passphrase: impl Into<String>) -> Self {
        Self::new(dir.as_ref().join(ENCRYPTED_TOKEN_FILE), passphrase)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn cipher(&self, salt: &[u8]) -> Result<ChaCha20Poly1305> {
        let mut key = [0u8; KEY_LEN];
        Argon2::default()
            .hash_password_into(self.passphrase.as_bytes(), salt, &mut key)
            .map_err(|e| anyhow!("Failed to derive encryption key: {}", e))?;
        Ok(ChaCha20Poly1305::new(Key::from_slice(&key)))
    }

    fn seal(&self, token: &CredentialToken) -> Result<SealedToken> {
        let mut rng = rand::thread_rng();
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher(&salt)?
            .encrypt(Nonce::from_slice(&nonce), token.expose().as_bytes())
            .map_err(|e| anyhow!("Failed to encrypt token: {}", e))?;

        Ok(SealedToken {
            salt: salt.to_vec(),
            nonce: nonce.to_vec(),
            ciphertext,
            saved_at: Utc::now(),
        })
    }

    fn open(&self, sealed: &SealedToken) -> Result<CredentialToken> {
        if sealed.nonce.len() != NONCE_LEN {
            return Err(anyhow!("Invalid nonce length {}", sealed.nonce.len()));
        }
        let plaintext = self
            .cipher(&sealed.salt)?
            .decrypt(Nonce::from_slice(&sealed.nonce), sealed.ciphertext.as_slice())
            .map_err(|e| anyhow!("Failed to decrypt token: {}", e))?;
        let token = String::from_utf8(plaintext).context("Decrypted token is not UTF-8")?;
        Ok(CredentialToken::from(token))
    }
}

impl CredentialStore for EncryptedFileCredentialStore {
    fn get(&self) -> Result<Option<CredentialToken>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents =
            std::fs::read_to_string(&self.path).context("Failed to read encrypted token file")?;
        let sealed: SealedToken = match serde_json::from_str(&contents) {
            Ok(sealed) => sealed,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Ignoring unparseable encrypted token file");
                return Ok(None);
            }
        };

        match self.open(&sealed) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Ignoring undecryptable token file");
                Ok(None)
            }
        }
    }

    fn set(&self, token: &CredentialToken) -> Result<()> {
        let sealed = self.seal(token)?;
        let contents = serde_json::to_string(&sealed)?;
        write_private(&self.path, contents.as_bytes())?;
        debug!(path = ?self.path, "Encrypted token saved");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        remove_if_exists(&self.path)
    }
}
