use aes_gcm::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::error::{CustodyError, CustodyResult};
use super::key::EncryptionKey;

/// Nonce size for AES-GCM (96 bits = 12 bytes)
const NONCE_SIZE: usize = 12;

/// Authentication tag appended by AES-GCM
const TAG_SIZE: usize = 16;

const DIGEST_SIZE: usize = 32;

/// A SHA-256 digest, hex encoded when serialized.
///
/// Used for the passphrase verifier and for the secret commitment published
/// on-chain. Neither can be reversed to its input.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(#[serde(with = "hex")] [u8; DIGEST_SIZE]);

impl Digest {
    /// Parse a digest from 64 hex characters (an optional `0x` prefix is accepted).
    pub fn from_hex(encoded: &str) -> CustodyResult<Self> {
        let encoded = encoded.trim();
        let encoded = encoded.strip_prefix("0x").unwrap_or(encoded);
        let mut bytes = [0u8; DIGEST_SIZE];
        hex::decode_to_slice(encoded, &mut bytes).map_err(|_| {
            CustodyError::InvalidDigest(format!(
                "expected {} hex characters",
                DIGEST_SIZE * 2
            ))
        })?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    /// Check `candidate` against this digest in constant time.
    pub fn verify(&self, candidate: impl AsRef<[u8]>) -> bool {
        let computed = hash(candidate);
        self.0[..].ct_eq(&computed.0[..]).into()
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

/// Deterministic SHA-256 digest of `input`.
pub fn hash(input: impl AsRef<[u8]>) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(input.as_ref());
    Digest(hasher.finalize().into())
}

/// Encrypt `plaintext` under `key`.
///
/// Format: `[12-byte nonce][ciphertext with 16-byte auth tag]`
pub fn encrypt(plaintext: &[u8], key: &EncryptionKey) -> CustodyResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CustodyError::InvalidKey(e.to_string()))?;

    // Generate random nonce
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CustodyError::Encryption(e.to_string()))?;

    // Prepend nonce to ciphertext
    let mut output = nonce_bytes.to_vec();
    output.extend(ciphertext);
    Ok(output)
}

/// Decrypt data produced by [`encrypt`].
///
/// Tampered, truncated or foreign-key input fails with
/// [`CustodyError::DecryptionFailure`]. The plaintext is wiped when dropped.
pub fn decrypt(encrypted: &[u8], key: &EncryptionKey) -> CustodyResult<Zeroizing<Vec<u8>>> {
    if encrypted.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CustodyError::DecryptionFailure);
    }

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CustodyError::InvalidKey(e.to_string()))?;

    let (nonce_bytes, ciphertext) = encrypted.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| CustodyError::DecryptionFailure)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        let hash1 = hash("p@ss1");
        let hash2 = hash("p@ss1");
        let hash3 = hash("p@ss2");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
    }

    #[test]
    fn test_hash_known_vector() {
        assert_eq!(
            hash("abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_digest_from_hex() {
        let digest = hash("secret");
        let parsed = Digest::from_hex(&digest.to_hex()).unwrap();
        assert_eq!(digest, parsed);

        let prefixed = Digest::from_hex(&format!("0x{}", digest)).unwrap();
        assert_eq!(digest, prefixed);

        assert!(Digest::from_hex("0x00").is_err());
        assert!(Digest::from_hex(&"g".repeat(64)).is_err());
    }

    #[test]
    fn test_digest_verify() {
        let verifier = hash("p@ss1");
        assert!(verifier.verify("p@ss1"));
        assert!(!verifier.verify("wrong"));
        assert!(!verifier.verify(""));
    }

    #[test]
    fn test_encrypt_decrypt() {
        let key = EncryptionKey::generate();
        let encrypted = encrypt(b"credential", &key).unwrap();
        let decrypted = decrypt(&encrypted, &key).unwrap();
        assert_eq!(decrypted.as_slice(), b"credential");
    }

    #[test]
    fn test_encrypt_is_randomized() {
        let key = EncryptionKey::generate();
        let first = encrypt(b"credential", &key).unwrap();
        let second = encrypt(b"credential", &key).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_decrypt_with_other_key_fails() {
        let key = EncryptionKey::generate();
        let other = EncryptionKey::generate();
        let encrypted = encrypt(b"credential", &key).unwrap();

        let err = decrypt(&encrypted, &other).unwrap_err();
        assert!(matches!(err, CustodyError::DecryptionFailure));
    }

    #[test]
    fn test_decrypt_tampered_fails() {
        let key = EncryptionKey::generate();
        let mut encrypted = encrypt(b"credential", &key).unwrap();
        let last = encrypted.len() - 1;
        encrypted[last] ^= 0x01;

        assert!(matches!(
            decrypt(&encrypted, &key),
            Err(CustodyError::DecryptionFailure)
        ));
    }

    #[test]
    fn test_decrypt_truncated_fails() {
        let key = EncryptionKey::generate();
        assert!(matches!(
            decrypt(&[0u8; NONCE_SIZE], &key),
            Err(CustodyError::DecryptionFailure)
        ));
    }
}
