use thiserror::Error;

use super::record::VaultId;
use crate::error::StackSafeError;
use crate::vault::VaultState;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("No vault found for {0}")]
    NotFound(String),

    #[error("Vault already exists: {0}")]
    DuplicateVault(String),

    /// The stored state moved on since the caller read it.
    #[error("Vault {vault_id} is {found}, expected {expected}")]
    StaleState {
        vault_id: VaultId,
        expected: VaultState,
        found: VaultState,
    },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: VaultState, to: VaultState },

    /// `claim_tx_id` may only be written by the transition into `Claimed`.
    #[error("Claim transaction can only be recorded when entering Claimed")]
    UnexpectedClaimTx,

    #[error("Registry file is corrupted: {0}")]
    Corrupted(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

impl From<RegistryError> for StackSafeError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(what) => StackSafeError::NotFound(what),
            RegistryError::DuplicateVault(what) => StackSafeError::DuplicateVault(what),
            // Lost a race: report what the winner did
            RegistryError::StaleState { found, .. } => match found {
                VaultState::Claimed => StackSafeError::AlreadyClaimed,
                VaultState::NomineeEnrolled => StackSafeError::AlreadyEnrolled,
                VaultState::Registered => StackSafeError::NotEnrolled,
            },
            RegistryError::InvalidTransition { from, to } => {
                StackSafeError::InvalidTransition { from, to }
            }
            RegistryError::UnexpectedClaimTx => {
                StackSafeError::Storage("claim transaction recorded outside a claim".into())
            }
            RegistryError::Corrupted(msg) => {
                StackSafeError::Storage(format!("Registry corrupted: {}", msg))
            }
            RegistryError::Io(e) => StackSafeError::Io(e),
            RegistryError::Serialization(e) => StackSafeError::Serialization(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_state_maps_to_winner() {
        let err: StackSafeError = RegistryError::StaleState {
            vault_id: VaultId::new(),
            expected: VaultState::NomineeEnrolled,
            found: VaultState::Claimed,
        }
        .into();
        assert!(matches!(err, StackSafeError::AlreadyClaimed));
    }

    #[test]
    fn test_not_found_conversion() {
        let err: StackSafeError = RegistryError::NotFound("vault".into()).into();
        assert!(matches!(err, StackSafeError::NotFound(_)));
    }
}
