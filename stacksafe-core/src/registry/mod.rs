//! Vault registry: durable mapping from vault identity to vault record.
//!
//! Pure data access. The lifecycle state machine decides *whether* a
//! transition is allowed; the registry only guarantees that a conditional
//! update observes and replaces the stored state atomically.

pub mod error;
mod file;
mod memory;
mod record;
mod table;

use async_trait::async_trait;

use crate::ledger::{LedgerReference, TxId};
use crate::vault::VaultState;

pub use error::{RegistryError, RegistryResult};
pub use file::FileVaultRegistry;
pub use memory::MemoryVaultRegistry;
pub use record::{normalize_contact, VaultId, VaultRecord};

#[async_trait]
pub trait VaultRegistry: Send + Sync {
    /// Insert a new record.
    ///
    /// Fails with `DuplicateVault` when a non-terminal vault already binds
    /// the same owner/nominee pair or the same nominee contact, or when the
    /// id or ledger reference is taken.
    async fn create(&self, record: VaultRecord) -> RegistryResult<VaultId>;

    async fn get_by_id(&self, vault_id: &VaultId) -> RegistryResult<VaultRecord>;

    async fn get_by_ledger_reference(
        &self,
        reference: &LedgerReference,
    ) -> RegistryResult<VaultRecord>;

    /// The non-terminal vault for `contact`, else the most recent one.
    async fn get_by_contact(&self, contact: &str) -> RegistryResult<VaultRecord>;

    /// The non-terminal vault a new registration would collide with.
    async fn find_conflict(
        &self,
        owner_identity: &str,
        nominee_identity: &str,
        nominee_contact: &str,
    ) -> RegistryResult<Option<VaultId>>;

    /// Move `vault_id` from `expected` to `next`, optionally recording the claim tx.
    ///
    /// Atomic: fails with `StaleState` without writing if the stored state is
    /// no longer `expected`.
    async fn update_state(
        &self,
        vault_id: &VaultId,
        expected: VaultState,
        next: VaultState,
        claim_tx_id: Option<TxId>,
    ) -> RegistryResult<VaultRecord>;

    /// Every record, oldest first.
    async fn list(&self) -> RegistryResult<Vec<VaultRecord>>;
}
