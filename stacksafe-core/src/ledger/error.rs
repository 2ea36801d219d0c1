use thiserror::Error;

use crate::error::StackSafeError;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid contract template: {0}")]
    InvalidTemplate(String),

    #[error("Invalid contract parameter: {0}")]
    InvalidParameter(String),

    /// The network refused the transaction synchronously (bad nonce, fee, ...).
    #[error("Transaction rejected: {reason}")]
    BroadcastRejected { reason: String },

    /// The ledger node could not be reached.
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Transaction encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

impl From<LedgerError> for StackSafeError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidTemplate(msg) | LedgerError::InvalidParameter(msg) => {
                StackSafeError::Validation(msg)
            }
            LedgerError::BroadcastRejected { reason } => {
                StackSafeError::BroadcastRejected { reason }
            }
            LedgerError::Unavailable(msg) => StackSafeError::BroadcastRejected {
                reason: format!("ledger unavailable: {}", msg),
            },
            LedgerError::Signing(msg) => StackSafeError::Signing(msg),
            LedgerError::Encoding(e) => StackSafeError::Serialization(e),
        }
    }
}
