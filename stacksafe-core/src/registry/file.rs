//! JSON-file-backed registry.
//!
//! The whole table lives in memory and is rewritten to disk on every
//! mutation. A mutation is applied to a copy first; the in-memory table is
//! only replaced once the file write succeeded, so a failed write leaves
//! both copies at the prior state.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::error::{RegistryError, RegistryResult};
use super::record::{VaultId, VaultRecord};
use super::table::VaultTable;
use super::VaultRegistry;
use crate::ledger::{LedgerReference, TxId};
use crate::vault::VaultState;

const FORMAT_VERSION: u32 = 1;

/// On-disk layout.
#[derive(Serialize, Deserialize)]
struct RegistryFile {
    version: u32,
    vaults: Vec<VaultRecord>,
}

pub struct FileVaultRegistry {
    path: PathBuf,
    table: RwLock<VaultTable>,
}

impl FileVaultRegistry {
    /// Open the registry at `path`, creating an empty one if the file is missing.
    pub async fn open(path: impl Into<PathBuf>) -> RegistryResult<Self> {
        let path = path.into();

        let table = if tokio::fs::try_exists(&path).await? {
            let content = tokio::fs::read(&path).await?;
            let file: RegistryFile = serde_json::from_slice(&content)
                .map_err(|e| RegistryError::Corrupted(e.to_string()))?;
            if file.version != FORMAT_VERSION {
                return Err(RegistryError::Corrupted(format!(
                    "unsupported format version {}",
                    file.version
                )));
            }
            info!("Loaded {} vaults from {:?}", file.vaults.len(), path);
            VaultTable::from_records(file.vaults)?
        } else {
            info!("Creating new vault registry at {:?}", path);
            VaultTable::default()
        };

        Ok(Self {
            path,
            table: RwLock::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the table atomically (temp file, then rename).
    async fn persist(&self, table: &VaultTable) -> RegistryResult<()> {
        let file = RegistryFile {
            version: FORMAT_VERSION,
            vaults: table.records(),
        };
        let content = serde_json::to_vec_pretty(&file)?;

        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &content).await?;

        // Set restrictive permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))
                .await?;
        }

        tokio::fs::rename(&temp_path, &self.path).await?;
        debug!("Registry flushed to {:?}", self.path);
        Ok(())
    }
}

#[async_trait]
impl VaultRegistry for FileVaultRegistry {
    async fn create(&self, record: VaultRecord) -> RegistryResult<VaultId> {
        let mut table = self.table.write().await;
        let mut next = table.clone();
        let vault_id = next.insert(record)?;
        self.persist(&next).await?;
        *table = next;
        Ok(vault_id)
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
        next_state: VaultState,
        claim_tx_id: Option<TxId>,
    ) -> RegistryResult<VaultRecord> {
        let mut table = self.table.write().await;
        let mut next = table.clone();
        let record = next.transition(vault_id, expected, next_state, claim_tx_id)?;
        self.persist(&next).await?;
        *table = next;
        Ok(record)
    }

    async fn list(&self) -> RegistryResult<Vec<VaultRecord>> {
        Ok(self.table.read().await.records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::table::tests::sample_record;

    #[tokio::test]
    async fn test_registry_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vaults.json");

        let id = {
            let registry = FileVaultRegistry::open(&path).await.unwrap();
            let id = registry.create(sample_record("nom@example.com")).await.unwrap();
            registry
                .update_state(&id, VaultState::Registered, VaultState::NomineeEnrolled, None)
                .await
                .unwrap();
            id
        };

        let reopened = FileVaultRegistry::open(&path).await.unwrap();
        let record = reopened.get_by_id(&id).await.unwrap();
        assert_eq!(record.state, VaultState::NomineeEnrolled);
        assert_eq!(record.nominee_contact, "nom@example.com");
    }

    #[tokio::test]
    async fn test_file_never_contains_plaintext_secret() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vaults.json");

        let registry = FileVaultRegistry::open(&path).await.unwrap();
        registry.create(sample_record("nom@example.com")).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("hunter2"));
        assert!(!content.contains("p@ss1"));
    }

    #[tokio::test]
    async fn test_rejected_create_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vaults.json");

        let registry = FileVaultRegistry::open(&path).await.unwrap();
        registry.create(sample_record("nom@example.com")).await.unwrap();
        let before = std::fs::read(&path).unwrap();

        assert!(registry.create(sample_record("nom@example.com")).await.is_err());
        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupted_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vaults.json");
        std::fs::write(&path, b"{not json").unwrap();

        assert!(matches!(
            FileVaultRegistry::open(&path).await,
            Err(RegistryError::Corrupted(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_registry_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vaults.json");
        let registry = FileVaultRegistry::open(&path).await.unwrap();
        registry.create(sample_record("nom@example.com")).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
