use async_trait::async_trait;
use tokio::sync::RwLock;

use super::error::RegistryResult;
use super::record::{VaultId, VaultRecord};
use super::table::VaultTable;
use super::VaultRegistry;
use crate::ledger::{LedgerReference, TxId};
use crate::vault::VaultState;

/// Registry held entirely in process memory.
#[derive(Default)]
pub struct MemoryVaultRegistry {
    table: RwLock<VaultTable>,
}

impl MemoryVaultRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VaultRegistry for MemoryVaultRegistry {
    async fn create(&self, record: VaultRecord) -> RegistryResult<VaultId> {
        self.table.write().await.insert(record)
    }

    async fn get_by_id(&self, vault_id: &VaultId) -> RegistryResult<VaultRecord> {
        self.table.read().await.get(vault_id)
    }

    async fn get_by_ledger_reference(
        &self,
        reference: &LedgerReference,
    ) -> RegistryResult<VaultRecord> {
        self.table.read().await.by_reference(reference)
    }

    async fn get_by_contact(&self, contact: &str) -> RegistryResult<VaultRecord> {
        self.table.read().await.by_contact(contact)
    }

    async fn find_conflict(
        &self,
        owner_identity: &str,
        nominee_identity: &str,
        nominee_contact: &str,
    ) -> RegistryResult<Option<VaultId>> {
        Ok(self
            .table
            .read()
            .await
            .conflict(owner_identity, nominee_identity, nominee_contact))
    }

    async fn update_state(
        &self,
        vault_id: &VaultId,
        expected: VaultState,
        next: VaultState,
        claim_tx_id: Option<TxId>,
    ) -> RegistryResult<VaultRecord> {
        // Check and write under one guard
        self.table
            .write()
            .await
            .transition(vault_id, expected, next, claim_tx_id)
    }

    async fn list(&self) -> RegistryResult<Vec<VaultRecord>> {
        Ok(self.table.read().await.records())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::registry::table::tests::sample_record;
    use crate::registry::RegistryError;

    #[tokio::test]
    async fn test_lookups_return_created_record() {
        let registry = MemoryVaultRegistry::new();
        let record = sample_record("nom@example.com");
        let reference = record.ledger_reference.clone();
        let id = registry.create(record).await.unwrap();

        assert_eq!(registry.get_by_id(&id).await.unwrap().vault_id, id);
        assert_eq!(
            registry
                .get_by_ledger_reference(&reference)
                .await
                .unwrap()
                .vault_id,
            id
        );
        assert_eq!(
            registry
                .get_by_contact(" NOM@example.com")
                .await
                .unwrap()
                .vault_id,
            id
        );
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_updates_only_one_wins() {
        let registry = Arc::new(MemoryVaultRegistry::new());
        let id = registry.create(sample_record("nom@example.com")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .update_state(
                        &id,
                        VaultState::Registered,
                        VaultState::NomineeEnrolled,
                        None,
                    )
                    .await
            }));
        }

        let mut wins = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(RegistryError::StaleState { found, .. }) => {
                    assert_eq!(found, VaultState::NomineeEnrolled)
                }
                Err(other) => panic!("unexpected error {:?}", other),
            }
        }
        assert_eq!(wins, 1);
    }
}
