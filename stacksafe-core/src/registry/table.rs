//! Registry logic shared by the in-memory and file-backed stores.

use std::collections::HashMap;

use chrono::Utc;

use super::error::{RegistryError, RegistryResult};
use super::record::{normalize_contact, VaultId, VaultRecord};
use crate::ledger::{LedgerReference, TxId};
use crate::vault::VaultState;

#[derive(Debug, Clone, Default)]
pub(crate) struct VaultTable {
    vaults: HashMap<VaultId, VaultRecord>,
}

impl VaultTable {
    pub fn from_records(records: Vec<VaultRecord>) -> RegistryResult<Self> {
        let mut vaults = HashMap::with_capacity(records.len());
        for record in records {
            if vaults.insert(record.vault_id, record).is_some() {
                return Err(RegistryError::Corrupted("duplicate vault id".into()));
            }
        }
        Ok(Self { vaults })
    }

    /// All records, oldest first.
    pub fn records(&self) -> Vec<VaultRecord> {
        let mut records: Vec<VaultRecord> = self.vaults.values().cloned().collect();
        records.sort_by_key(|r| (r.created_at, r.vault_id));
        records
    }

    pub fn insert(&mut self, record: VaultRecord) -> RegistryResult<VaultId> {
        if self.vaults.contains_key(&record.vault_id) {
            return Err(RegistryError::DuplicateVault(format!(
                "vault id {} is taken",
                record.vault_id
            )));
        }
        if self
            .vaults
            .values()
            .any(|r| r.ledger_reference == record.ledger_reference)
        {
            return Err(RegistryError::DuplicateVault(format!(
                "ledger reference {} is taken",
                record.ledger_reference
            )));
        }
        if let Some(existing) = self.conflict(
            &record.owner_identity,
            &record.nominee_identity,
            &record.nominee_contact,
        ) {
            return Err(RegistryError::DuplicateVault(format!(
                "active vault {} already binds this owner, nominee or contact",
                existing
            )));
        }

        let vault_id = record.vault_id;
        self.vaults.insert(vault_id, record);
        Ok(vault_id)
    }

    pub fn get(&self, vault_id: &VaultId) -> RegistryResult<VaultRecord> {
        self.vaults
            .get(vault_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(format!("vault {}", vault_id)))
    }

    pub fn by_reference(&self, reference: &LedgerReference) -> RegistryResult<VaultRecord> {
        self.vaults
            .values()
            .find(|r| &r.ledger_reference == reference)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(format!("ledger reference {}", reference)))
    }

    pub fn by_contact(&self, contact: &str) -> RegistryResult<VaultRecord> {
        let contact = normalize_contact(contact);
        let mut matching: Vec<&VaultRecord> = self
            .vaults
            .values()
            .filter(|r| normalize_contact(&r.nominee_contact) == contact)
            .collect();

        if let Some(active) = matching.iter().find(|r| r.is_active()) {
            return Ok((*active).clone());
        }
        matching.sort_by_key(|r| r.created_at);
        matching
            .last()
            .map(|r| (*r).clone())
            .ok_or_else(|| RegistryError::NotFound("no vault for this contact".into()))
    }

    pub fn conflict(
        &self,
        owner_identity: &str,
        nominee_identity: &str,
        nominee_contact: &str,
    ) -> Option<VaultId> {
        let contact = normalize_contact(nominee_contact);
        self.vaults
            .values()
            .filter(|r| r.is_active())
            .find(|r| {
                (r.owner_identity == owner_identity && r.nominee_identity == nominee_identity)
                    || normalize_contact(&r.nominee_contact) == contact
            })
            .map(|r| r.vault_id)
    }

    pub fn transition(
        &mut self,
        vault_id: &VaultId,
        expected: VaultState,
        next: VaultState,
        claim_tx_id: Option<TxId>,
    ) -> RegistryResult<VaultRecord> {
        let record = self
            .vaults
            .get_mut(vault_id)
            .ok_or_else(|| RegistryError::NotFound(format!("vault {}", vault_id)))?;

        if record.state != expected {
            return Err(RegistryError::StaleState {
                vault_id: *vault_id,
                expected,
                found: record.state,
            });
        }
        if !expected.can_advance_to(next) {
            return Err(RegistryError::InvalidTransition {
                from: expected,
                to: next,
            });
        }
        if claim_tx_id.is_some() && next != VaultState::Claimed {
            return Err(RegistryError::UnexpectedClaimTx);
        }

        record.state = next;
        if claim_tx_id.is_some() {
            record.claim_tx_id = claim_tx_id;
        }
        record.updated_at = Utc::now();
        Ok(record.clone())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::custody::{hash, EncryptionKey, SecretFragments};

    pub(crate) const DEPLOYER: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3KZJ273ANAFSF";
    pub(crate) const OWNER: &str = "ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG";
    pub(crate) const NOMINEE: &str = "ST2JHG361ZXG51QTKY2NQCVBPPRRE2KZB1HR05NNC";

    /// A freshly registered record for `contact`.
    pub(crate) fn sample_record(contact: &str) -> VaultRecord {
        let vault_id = VaultId::new();
        let contract = format!("stacksafe-vault-{}", &vault_id.as_uuid().simple().to_string()[..16]);
        let now = Utc::now();
        VaultRecord {
            vault_id,
            owner_identity: OWNER.into(),
            nominee_identity: NOMINEE.into(),
            nominee_contact: normalize_contact(contact),
            nominee_auth_id: "auth-1".into(),
            secret_commitment: hash("NaClhunter2"),
            passphrase_verifier: hash("p@ss1"),
            encrypted_secret: SecretFragments::new("hunter2", "NaCl")
                .seal(&EncryptionKey::generate())
                .unwrap(),
            heartbeat_interval: 4320,
            grace_period: 1008,
            ledger_reference: LedgerReference::new(DEPLOYER, contract).unwrap(),
            state: VaultState::Registered,
            deployment_tx_id: TxId::new("0xdeploy"),
            claim_tx_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_insert_rejects_active_duplicate_pair() {
        let mut table = VaultTable::default();
        table.insert(sample_record("a@example.com")).unwrap();

        let err = table.insert(sample_record("b@example.com")).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateVault(_)));
    }

    #[test]
    fn test_insert_rejects_active_duplicate_contact() {
        let mut table = VaultTable::default();
        table.insert(sample_record("a@example.com")).unwrap();

        let mut other = sample_record("A@Example.com");
        other.owner_identity = DEPLOYER.into();
        assert!(matches!(
            table.insert(other),
            Err(RegistryError::DuplicateVault(_))
        ));
    }

    #[test]
    fn test_claimed_vault_does_not_block_new_registration() {
        let mut table = VaultTable::default();
        let first = table.insert(sample_record("a@example.com")).unwrap();
        table
            .transition(&first, VaultState::Registered, VaultState::NomineeEnrolled, None)
            .unwrap();
        table
            .transition(
                &first,
                VaultState::NomineeEnrolled,
                VaultState::Claimed,
                Some(TxId::new("0xclaim")),
            )
            .unwrap();

        let second = table.insert(sample_record("a@example.com")).unwrap();
        assert_eq!(table.by_contact("a@example.com").unwrap().vault_id, second);
    }

    #[test]
    fn test_transition_requires_expected_state() {
        let mut table = VaultTable::default();
        let id = table.insert(sample_record("a@example.com")).unwrap();

        let err = table
            .transition(
                &id,
                VaultState::NomineeEnrolled,
                VaultState::Claimed,
                Some(TxId::new("0xclaim")),
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::StaleState { .. }));
        assert_eq!(table.get(&id).unwrap().state, VaultState::Registered);
        assert!(table.get(&id).unwrap().claim_tx_id.is_none());
    }

    #[test]
    fn test_transition_rejects_skips_and_reversals() {
        let mut table = VaultTable::default();
        let id = table.insert(sample_record("a@example.com")).unwrap();

        assert!(matches!(
            table.transition(&id, VaultState::Registered, VaultState::Claimed, None),
            Err(RegistryError::InvalidTransition { .. })
        ));
        assert!(matches!(
            table.transition(&id, VaultState::Registered, VaultState::Registered, None),
            Err(RegistryError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_claim_tx_only_recorded_on_claim() {
        let mut table = VaultTable::default();
        let id = table.insert(sample_record("a@example.com")).unwrap();

        assert!(matches!(
            table.transition(
                &id,
                VaultState::Registered,
                VaultState::NomineeEnrolled,
                Some(TxId::new("0xclaim"))
            ),
            Err(RegistryError::UnexpectedClaimTx)
        ));
    }

    #[test]
    fn test_lookup_not_found() {
        let table = VaultTable::default();
        assert!(matches!(
            table.by_contact("ghost@example.com"),
            Err(RegistryError::NotFound(_))
        ));
        assert!(matches!(
            table.get(&VaultId::new()),
            Err(RegistryError::NotFound(_))
        ));
    }
}
