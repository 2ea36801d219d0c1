//! Typed requests accepted by [`VaultLifecycle`](super::VaultLifecycle) and the
//! outcomes it returns.
//!
//! Every request is validated in full before the state machine touches a
//! collaborator, so a malformed request never has side effects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::VaultState;
use crate::custody::Digest;
use crate::error::{Result, StackSafeError};
use crate::ledger::{validate_principal, LedgerReference, TxId};
use crate::logging::mask_contact;
use crate::registry::{normalize_contact, VaultId, VaultRecord};

/// Longest `password` fragment the vault contract accepts (`string-ascii 128`).
pub const MAX_PASSWORD_LEN: usize = 128;
/// Longest `salt` fragment the vault contract accepts (`string-ascii 64`).
pub const MAX_SALT_LEN: usize = 64;
const MAX_PASSPHRASE_LEN: usize = 1024;
const MAX_CONTACT_LEN: usize = 254;

#[derive(Clone, Deserialize)]
pub struct RegisterRequest {
    pub owner_wallet: String,
    pub nominee_wallet: String,
    pub nominee_contact: String,
    /// Hex SHA-256 commitment rendered into the contract
    pub secret_commitment: String,
    pub heartbeat_interval: u64,
    pub grace_period: u64,
    pub password: String,
    pub salt: String,
    pub passphrase: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<()> {
        validate_wallet("owner_wallet", &self.owner_wallet)?;
        validate_wallet("nominee_wallet", &self.nominee_wallet)?;
        if self.owner_wallet.trim() == self.nominee_wallet.trim() {
            return Err(StackSafeError::Validation(
                "owner and nominee must be different wallets".into(),
            ));
        }
        validate_contact(&self.nominee_contact)?;
        self.commitment()?;
        if self.heartbeat_interval == 0 {
            return Err(StackSafeError::Validation(
                "heartbeat_interval must be positive".into(),
            ));
        }
        if self.grace_period == 0 {
            return Err(StackSafeError::Validation(
                "grace_period must be positive".into(),
            ));
        }
        validate_fragment("password", &self.password, MAX_PASSWORD_LEN)?;
        validate_fragment("salt", &self.salt, MAX_SALT_LEN)?;
        validate_passphrase(&self.passphrase)
    }

    pub(crate) fn commitment(&self) -> Result<Digest> {
        Digest::from_hex(self.secret_commitment.trim()).map_err(|e| {
            StackSafeError::Validation(format!("secret_commitment: {}", e))
        })
    }
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("owner_wallet", &self.owner_wallet)
            .field("nominee_wallet", &self.nominee_wallet)
            .field("nominee_contact", &mask_contact(&self.nominee_contact))
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("grace_period", &self.grace_period)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartEnrollRequest {
    pub contact: String,
}

impl StartEnrollRequest {
    pub fn validate(&self) -> Result<()> {
        validate_contact(&self.contact)
    }
}

#[derive(Clone, Deserialize)]
pub struct VerifyEnrollRequest {
    pub ledger_reference: String,
    pub contact: String,
    pub otp: String,
    pub passphrase: String,
}

impl VerifyEnrollRequest {
    pub fn validate(&self) -> Result<()> {
        self.reference()?;
        validate_contact(&self.contact)?;
        validate_otp(&self.otp)?;
        validate_passphrase(&self.passphrase)
    }

    pub(crate) fn reference(&self) -> Result<LedgerReference> {
        parse_reference(&self.ledger_reference)
    }
}

impl std::fmt::Debug for VerifyEnrollRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifyEnrollRequest")
            .field("ledger_reference", &self.ledger_reference)
            .field("contact", &mask_contact(&self.contact))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartClaimRequest {
    pub ledger_reference: String,
}

impl StartClaimRequest {
    pub fn validate(&self) -> Result<()> {
        self.reference().map(|_| ())
    }

    pub(crate) fn reference(&self) -> Result<LedgerReference> {
        parse_reference(&self.ledger_reference)
    }
}

#[derive(Clone, Deserialize)]
pub struct ExecuteClaimRequest {
    pub ledger_reference: String,
    pub otp: String,
    pub passphrase: String,
}

impl ExecuteClaimRequest {
    pub fn validate(&self) -> Result<()> {
        self.reference()?;
        validate_otp(&self.otp)?;
        validate_passphrase(&self.passphrase)
    }

    pub(crate) fn reference(&self) -> Result<LedgerReference> {
        parse_reference(&self.ledger_reference)
    }
}

impl std::fmt::Debug for ExecuteClaimRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecuteClaimRequest")
            .field("ledger_reference", &self.ledger_reference)
            .finish_non_exhaustive()
    }
}

/// Owner liveness signal for the vault contract.
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatRequest {
    pub ledger_reference: String,
}

impl HeartbeatRequest {
    pub fn validate(&self) -> Result<()> {
        self.reference().map(|_| ())
    }

    pub(crate) fn reference(&self) -> Result<LedgerReference> {
        parse_reference(&self.ledger_reference)
    }
}

/// Outcome of a successful Register.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub vault_id: VaultId,
    pub ledger_reference: LedgerReference,
    pub deployment_tx_id: TxId,
    pub state: VaultState,
}

/// A one-time code was handed to the identity provider for delivery.
#[derive(Debug, Clone, Serialize)]
pub struct ChallengeIssued {
    pub vault_id: VaultId,
    /// Masked delivery address, e.g. `n***@example.com`
    pub delivered_to: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Enrollment {
    pub vault_id: VaultId,
    pub ledger_reference: LedgerReference,
    pub state: VaultState,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClaimReceipt {
    pub vault_id: VaultId,
    pub ledger_reference: LedgerReference,
    pub claim_tx_id: TxId,
    pub state: VaultState,
}

#[derive(Debug, Clone, Serialize)]
pub struct Heartbeat {
    pub vault_id: VaultId,
    pub ledger_reference: LedgerReference,
    pub tx_id: TxId,
    pub state: VaultState,
}

/// Public view of a vault. Never carries the sealed secret or the verifier.
#[derive(Debug, Clone, Serialize)]
pub struct VaultView {
    pub vault_id: VaultId,
    pub owner_identity: String,
    pub nominee_identity: String,
    pub nominee_contact: String,
    pub ledger_reference: LedgerReference,
    pub state: VaultState,
    pub heartbeat_interval: u64,
    pub grace_period: u64,
    pub secret_commitment: Digest,
    pub deployment_tx_id: TxId,
    pub claim_tx_id: Option<TxId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&VaultRecord> for VaultView {
    fn from(record: &VaultRecord) -> Self {
        Self {
            vault_id: record.vault_id,
            owner_identity: record.owner_identity.clone(),
            nominee_identity: record.nominee_identity.clone(),
            nominee_contact: mask_contact(&record.nominee_contact),
            ledger_reference: record.ledger_reference.clone(),
            state: record.state,
            heartbeat_interval: record.heartbeat_interval,
            grace_period: record.grace_period,
            secret_commitment: record.secret_commitment.clone(),
            deployment_tx_id: record.deployment_tx_id.clone(),
            claim_tx_id: record.claim_tx_id.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

fn validate_wallet(field: &str, wallet: &str) -> Result<()> {
    validate_principal(wallet.trim())
        .map_err(|e| StackSafeError::Validation(format!("{}: {}", field, e)))
}

/// Minimal email shape check: `local@domain.tld`, no whitespace.
fn validate_contact(contact: &str) -> Result<()> {
    let contact = normalize_contact(contact);
    let invalid = || StackSafeError::Validation("contact must be an email address".into());

    if contact.is_empty() || contact.len() > MAX_CONTACT_LEN {
        return Err(invalid());
    }
    if contact.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid());
    }
    let (local, domain) = contact.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels_ok = domain
        .split('.')
        .all(|label| !label.is_empty() && !label.starts_with('-') && !label.ends_with('-'));
    if !domain.contains('.') || !labels_ok {
        return Err(invalid());
    }
    Ok(())
}

fn validate_fragment(field: &str, value: &str, max_len: usize) -> Result<()> {
    if value.is_empty() {
        return Err(StackSafeError::Validation(format!("{} is required", field)));
    }
    if !value.is_ascii() || value.chars().any(|c| c.is_ascii_control()) {
        return Err(StackSafeError::Validation(format!(
            "{} must be printable ASCII",
            field
        )));
    }
    if value.len() > max_len {
        return Err(StackSafeError::Validation(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }
    Ok(())
}

fn validate_passphrase(passphrase: &str) -> Result<()> {
    if passphrase.is_empty() {
        return Err(StackSafeError::Validation("passphrase is required".into()));
    }
    if passphrase.len() > MAX_PASSPHRASE_LEN {
        return Err(StackSafeError::Validation(format!(
            "passphrase must be at most {} bytes",
            MAX_PASSPHRASE_LEN
        )));
    }
    Ok(())
}

// Shape is checked by the coordinator; here we only refuse an absent code.
fn validate_otp(otp: &str) -> Result<()> {
    if otp.trim().is_empty() {
        return Err(StackSafeError::Validation("otp is required".into()));
    }
    Ok(())
}

fn parse_reference(raw: &str) -> Result<LedgerReference> {
    raw.parse::<LedgerReference>()
        .map_err(|e| StackSafeError::Validation(format!("ledger_reference: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::hash;

    const OWNER: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3KZJ273ANAFSF";
    const NOMINEE: &str = "ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG";

    fn register_request() -> RegisterRequest {
        RegisterRequest {
            owner_wallet: OWNER.into(),
            nominee_wallet: NOMINEE.into(),
            nominee_contact: "nom@example.com".into(),
            secret_commitment: hash("hunter2").to_hex(),
            heartbeat_interval: 144,
            grace_period: 1008,
            password: "hunter2".into(),
            salt: "NaCl".into(),
            passphrase: "p@ss1".into(),
        }
    }

    #[test]
    fn test_register_request_valid() {
        assert!(register_request().validate().is_ok());
    }

    #[test]
    fn test_register_request_rejects_bad_fields() {
        let cases: [fn(&mut RegisterRequest); 11] = [
            |r| r.owner_wallet = "0xabc".into(),
            |r| r.nominee_wallet = OWNER.into(),
            |r| r.nominee_contact = "not-an-email".into(),
            |r| r.nominee_contact = "nom@localhost".into(),
            |r| r.secret_commitment = "zz".into(),
            |r| r.heartbeat_interval = 0,
            |r| r.grace_period = 0,
            |r| r.password = String::new(),
            |r| r.password = "pässword".into(),
            |r| r.salt = "s".repeat(MAX_SALT_LEN + 1),
            |r| r.passphrase = String::new(),
        ];

        for mutate in cases {
            let mut request = register_request();
            mutate(&mut request);
            let err = request.validate().unwrap_err();
            assert!(matches!(err, StackSafeError::Validation(_)), "{:?}", request);
        }
    }

    #[test]
    fn test_register_request_debug_hides_secrets() {
        let debug = format!("{:?}", register_request());
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("p@ss1"));
        assert!(!debug.contains("nom@example.com"));
    }

    #[test]
    fn test_claim_request_requires_reference() {
        let request = ExecuteClaimRequest {
            ledger_reference: "no-dot-here".into(),
            otp: "123456".into(),
            passphrase: "p@ss1".into(),
        };
        assert!(matches!(
            request.validate(),
            Err(StackSafeError::Validation(_))
        ));

        let request = StartClaimRequest {
            ledger_reference: format!("{}.stacksafe-vault-0123456789abcdef", OWNER),
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_verify_request_requires_otp() {
        let request = VerifyEnrollRequest {
            ledger_reference: format!("{}.stacksafe-vault-0123456789abcdef", OWNER),
            contact: "nom@example.com".into(),
            otp: "   ".into(),
            passphrase: "p@ss1".into(),
        };
        assert!(matches!(
            request.validate(),
            Err(StackSafeError::Validation(_))
        ));
    }
}
