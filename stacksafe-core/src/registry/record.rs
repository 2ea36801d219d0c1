use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::custody::{Digest, SealedSecret};
use crate::ledger::{LedgerReference, TxId};
use crate::vault::VaultState;

/// Globally unique vault identifier, assigned at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VaultId(Uuid);

impl VaultId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for VaultId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for VaultId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for VaultId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Canonical form of a contact address used for storage and lookups.
pub fn normalize_contact(contact: &str) -> String {
    contact.trim().to_ascii_lowercase()
}

/// One vault: an owner's sealed secret bound to one nominee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultRecord {
    pub vault_id: VaultId,
    pub owner_identity: String,
    pub nominee_identity: String,
    /// Where one-time codes are delivered (normalized)
    pub nominee_contact: String,
    /// Identity-provider handle created for the nominee at registration
    pub nominee_auth_id: String,
    pub secret_commitment: Digest,
    pub passphrase_verifier: Digest,
    pub encrypted_secret: SealedSecret,
    pub heartbeat_interval: u64,
    pub grace_period: u64,
    pub ledger_reference: LedgerReference,
    pub state: VaultState,
    pub deployment_tx_id: TxId,
    #[serde(default)]
    pub claim_tx_id: Option<TxId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VaultRecord {
    /// Whether this record still blocks a new registration for the same parties.
    pub fn is_active(&self) -> bool {
        !self.state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vault_id_parse_roundtrip() {
        let id = VaultId::new();
        let parsed: VaultId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<VaultId>().is_err());
    }

    #[test]
    fn test_normalize_contact() {
        assert_eq!(normalize_contact("  Nom@Example.COM "), "nom@example.com");
    }
}
