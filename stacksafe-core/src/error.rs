use thiserror::Error;

use crate::vault::VaultState;

/// Broad category of a [`StackSafeError`].
///
/// Outer layers branch on this (retry, abandon, re-prompt) instead of
/// parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed input. Nothing was attempted.
    Validation,
    /// Unknown vault or contact.
    NotFound,
    /// The caller is not allowed to perform this transition.
    Authorization,
    /// An external system rejected the request.
    Upstream,
    /// Key mismatch or data corruption.
    Integrity,
    /// The registry store failed.
    Storage,
}

impl ErrorKind {
    /// Whether repeating the same request later could succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Upstream | ErrorKind::Storage)
    }
}

#[derive(Error, Debug)]
pub enum StackSafeError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid or expired OTP")]
    OtpInvalid,

    #[error("Incorrect passphrase")]
    PassphraseMismatch,

    #[error("Nominee is already enrolled")]
    AlreadyEnrolled,

    #[error("Nominee is not enrolled for this vault")]
    NotEnrolled,

    #[error("Vault has already been claimed")]
    AlreadyClaimed,

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: VaultState, to: VaultState },

    #[error("Vault already exists: {0}")]
    DuplicateVault(String),

    #[error("OTP delivery failed: {0}")]
    DeliveryFailure(String),

    #[error("Transaction rejected: {reason}")]
    BroadcastRejected { reason: String },

    #[error("Identity provisioning failed: {0}")]
    IdentityProvisioningFailure(String),

    #[error("Transaction signing failed: {0}")]
    Signing(String),

    #[error("Decryption failed")]
    DecryptionFailure,

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StackSafeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StackSafeError::Validation(_) => ErrorKind::Validation,
            StackSafeError::NotFound(_) => ErrorKind::NotFound,
            StackSafeError::OtpInvalid
            | StackSafeError::PassphraseMismatch
            | StackSafeError::AlreadyEnrolled
            | StackSafeError::NotEnrolled
            | StackSafeError::AlreadyClaimed
            | StackSafeError::InvalidTransition { .. }
            | StackSafeError::DuplicateVault(_) => ErrorKind::Authorization,
            StackSafeError::DeliveryFailure(_)
            | StackSafeError::BroadcastRejected { .. }
            | StackSafeError::IdentityProvisioningFailure(_)
            | StackSafeError::Signing(_) => ErrorKind::Upstream,
            StackSafeError::DecryptionFailure | StackSafeError::Encryption(_) => {
                ErrorKind::Integrity
            }
            StackSafeError::Storage(_)
            | StackSafeError::Io(_)
            | StackSafeError::Serialization(_) => ErrorKind::Storage,
        }
    }

    /// Stable identifier including which challenge factor failed.
    ///
    /// Only for logs and operators; callers facing the nominee get
    /// [`StackSafeError::public_code`].
    pub fn internal_code(&self) -> &'static str {
        match self {
            StackSafeError::Validation(_) => "VALIDATION_ERROR",
            StackSafeError::NotFound(_) => "NOT_FOUND",
            StackSafeError::OtpInvalid => "OTP_INVALID",
            StackSafeError::PassphraseMismatch => "PASSPHRASE_MISMATCH",
            StackSafeError::AlreadyEnrolled => "ALREADY_ENROLLED",
            StackSafeError::NotEnrolled => "NOT_ENROLLED",
            StackSafeError::AlreadyClaimed => "ALREADY_CLAIMED",
            StackSafeError::InvalidTransition { .. } => "INVALID_TRANSITION",
            StackSafeError::DuplicateVault(_) => "DUPLICATE_VAULT",
            StackSafeError::DeliveryFailure(_) => "DELIVERY_FAILURE",
            StackSafeError::BroadcastRejected { .. } => "BROADCAST_REJECTED",
            StackSafeError::IdentityProvisioningFailure(_) => "IDENTITY_PROVISIONING_FAILURE",
            StackSafeError::Signing(_) => "SIGNING_ERROR",
            StackSafeError::DecryptionFailure => "DECRYPTION_FAILURE",
            StackSafeError::Encryption(_) => "ENCRYPTION_ERROR",
            StackSafeError::Storage(_) => "STORAGE_ERROR",
            StackSafeError::Io(_) => "IO_ERROR",
            StackSafeError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Identifier safe to hand to the party answering the challenge.
    ///
    /// A wrong OTP and a wrong passphrase share one code so the response does
    /// not reveal which factor was wrong.
    pub fn public_code(&self) -> &'static str {
        match self {
            StackSafeError::OtpInvalid | StackSafeError::PassphraseMismatch => "CHALLENGE_FAILED",
            other => other.internal_code(),
        }
    }

    fn public_message(&self) -> String {
        match self {
            StackSafeError::OtpInvalid | StackSafeError::PassphraseMismatch => {
                "Verification failed".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl serde::Serialize for StackSafeError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("StackSafeError", 2)?;
        state.serialize_field("code", self.public_code())?;
        state.serialize_field("message", &self.public_message())?;
        state.end()
    }
}

pub type Result<T> = std::result::Result<T, StackSafeError>;
