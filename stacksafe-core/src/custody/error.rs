//! Error types for custody operations.

use thiserror::Error;

use crate::error::StackSafeError;

/// Errors raised while sealing, opening or hashing custodial data.
///
/// None of the variants carry key material or plaintext.
#[derive(Error, Debug)]
pub enum CustodyError {
    /// Key material has the wrong length or encoding.
    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    /// The AEAD refused to encrypt.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Ciphertext was tampered with, truncated, or sealed under another key.
    #[error("Decryption failed")]
    DecryptionFailure,

    /// A digest string is not 64 hex characters.
    #[error("Invalid digest: {0}")]
    InvalidDigest(String),

    /// The envelope opened but does not hold secret fragments.
    #[error("Sealed secret is malformed")]
    MalformedSecret,
}

pub type CustodyResult<T> = std::result::Result<T, CustodyError>;

impl From<CustodyError> for StackSafeError {
    fn from(err: CustodyError) -> Self {
        match err {
            CustodyError::InvalidKey(msg) => {
                StackSafeError::Encryption(format!("Invalid key: {}", msg))
            }
            CustodyError::Encryption(msg) => StackSafeError::Encryption(msg),
            CustodyError::DecryptionFailure | CustodyError::MalformedSecret => {
                StackSafeError::DecryptionFailure
            }
            CustodyError::InvalidDigest(msg) => StackSafeError::Validation(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_custody_error_conversion() {
        let err: StackSafeError = CustodyError::MalformedSecret.into();
        assert!(matches!(err, StackSafeError::DecryptionFailure));
        assert_eq!(err.kind(), ErrorKind::Integrity);

        let err: StackSafeError = CustodyError::InvalidDigest("short".into()).into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
