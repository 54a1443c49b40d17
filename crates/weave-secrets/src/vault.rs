//! AES-256-GCM vault for secret values at rest.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use sha2::{Digest, Sha256};
use weave_core::{Error, Result};

/// Encrypts and decrypts secret values. Holds no state besides the key.
pub struct NativeVault {
    cipher: Aes256Gcm,
}

/// A sealed secret value.
#[derive(Clone, PartialEq, Eq)]
pub struct Sealed {
    ciphertext: Vec<u8>,
    nonce: [u8; 12],
}

impl std::fmt::Debug for Sealed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sealed")
            .field("len", &self.ciphertext.len())
            .finish_non_exhaustive()
    }
}

impl NativeVault {
    /// Create a vault with a 32-byte key.
    pub fn new(key: &[u8; 32]) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(key);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Create from a master key string (hashed to 32 bytes).
    pub fn from_master_key(master_key: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(master_key.as_bytes());
        let key: [u8; 32] = hasher.finalize().into();
        Self::new(&key)
    }

    pub fn seal(&self, value: &str) -> Result<Sealed> {
        let nonce: [u8; 12] = rand::random();
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), value.as_bytes())
            .map_err(|e| Error::Internal(format!("Encryption failed: {e}")))?;
        Ok(Sealed { ciphertext, nonce })
    }

    pub fn open(&self, sealed: &Sealed) -> Result<String> {
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&sealed.nonce), sealed.ciphertext.as_ref())
            .map_err(|e| Error::Internal(format!("Decryption failed: {e}")))?;
        String::from_utf8(plaintext).map_err(|e| Error::Internal(format!("Invalid UTF-8: {e}")))
    }
}
