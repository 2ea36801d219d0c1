use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::crypto::{decrypt, encrypt};
use super::error::{CustodyError, CustodyResult};
use super::key::EncryptionKey;

/// The owner's credential as handed to the contract's `claim` function.
///
/// Both parts are ASCII because they travel as Clarity `string-ascii`
/// arguments. The struct is wiped on drop and never printed.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SecretFragments {
    password: String,
    salt: String,
}

impl SecretFragments {
    pub fn new(password: impl Into<String>, salt: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            salt: salt.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn salt(&self) -> &str {
        &self.salt
    }

    /// Serialize and encrypt the fragments under `key`.
    pub fn seal(&self, key: &EncryptionKey) -> CustodyResult<SealedSecret> {
        let plaintext = Zeroizing::new(
            serde_json::to_vec(self).map_err(|e| CustodyError::Encryption(e.to_string()))?,
        );
        let ciphertext = encrypt(&plaintext, key)?;
        Ok(SealedSecret(ciphertext))
    }
}

impl std::fmt::Debug for SecretFragments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretFragments")
            .field("password", &"[REDACTED]")
            .field("salt", &"[REDACTED]")
            .finish()
    }
}

/// Envelope-encrypted [`SecretFragments`], stored in the vault record.
///
/// Opaque ciphertext; hex encoded when serialized.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealedSecret(#[serde(with = "hex")] Vec<u8>);

impl SealedSecret {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Decrypt and parse the fragments.
    pub fn open(&self, key: &EncryptionKey) -> CustodyResult<SecretFragments> {
        let plaintext = decrypt(&self.0, key)?;
        serde_json::from_slice(&plaintext).map_err(|_| CustodyError::MalformedSecret)
    }
}

impl std::fmt::Debug for SealedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SealedSecret({} bytes)", self.0.len())
    }
}
