use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::locks::VaultLocks;
use super::requests::{
    ChallengeIssued, ClaimReceipt, Enrollment, ExecuteClaimRequest, Heartbeat, HeartbeatRequest,
    RegisterRequest, Registration, StartClaimRequest, StartEnrollRequest, VaultView,
    VerifyEnrollRequest,
};
use super::VaultState;
use crate::config::VaultConfig;
use crate::custody::{hash, Digest, SecretFragments};
use crate::error::{Result, StackSafeError};
use crate::identity::{IdentityId, IdentityProvider, OtpCoordinator, ProvisionedIdentity};
use crate::ledger::{
    ClarityValue, ContractTemplate, LedgerClient, LedgerOrchestrator, LedgerReference,
    TransactionSigner, TxId, VaultContractParams, CLAIM_FUNCTION,
};
use crate::logging::mask_contact;
use crate::registry::{normalize_contact, VaultId, VaultRecord, VaultRegistry};

/// Drives vaults through Registered -> NomineeEnrolled -> Claimed.
///
/// Transitions on the same vault are serialised by a per-vault lock held
/// across the whole read-check-act-commit sequence; the registry's
/// conditional update backs that up when several processes share a store.
pub struct VaultLifecycle {
    config: Arc<VaultConfig>,
    registry: Arc<dyn VaultRegistry>,
    identity: Arc<dyn IdentityProvider>,
    otp: OtpCoordinator,
    ledger: LedgerOrchestrator,
    template: ContractTemplate,
    vault_locks: VaultLocks,
    /// Keyed by owner/nominee pair and by normalized nominee contact
    register_locks: VaultLocks,
    /// Claims broadcast but not yet recorded in the registry
    pending_claims: Mutex<HashMap<VaultId, TxId>>,
}

impl VaultLifecycle {
    /// Build a lifecycle deploying the bundled vault contract.
    pub fn new(
        config: Arc<VaultConfig>,
        registry: Arc<dyn VaultRegistry>,
        identity: Arc<dyn IdentityProvider>,
        ledger_client: Arc<dyn LedgerClient>,
        signer: Arc<dyn TransactionSigner>,
    ) -> Result<Self> {
        let template = ContractTemplate::vault()?;
        Ok(Self::with_template(
            config,
            registry,
            identity,
            ledger_client,
            signer,
            template,
        ))
    }

    pub fn with_template(
        config: Arc<VaultConfig>,
        registry: Arc<dyn VaultRegistry>,
        identity: Arc<dyn IdentityProvider>,
        ledger_client: Arc<dyn LedgerClient>,
        signer: Arc<dyn TransactionSigner>,
        template: ContractTemplate,
    ) -> Self {
        Self {
            otp: OtpCoordinator::new(identity.clone()),
            ledger: LedgerOrchestrator::new(config.clone(), ledger_client, signer),
            config,
            registry,
            identity,
            template,
            vault_locks: VaultLocks::default(),
            register_locks: VaultLocks::default(),
            pending_claims: Mutex::new(HashMap::new()),
        }
    }

    /// Create a vault: provision the nominee identity, seal the secret,
    /// deploy the contract and persist the record as `Registered`.
    ///
    /// If a step fails after the identity was newly created, the identity is
    /// deleted again before the error is returned.
    pub async fn register(&self, request: RegisterRequest) -> Result<Registration> {
        request.validate()?;
        let commitment = request.commitment()?;
        let contact = normalize_contact(&request.nominee_contact);
        let owner = request.owner_wallet.trim();
        let nominee = request.nominee_wallet.trim();

        // Both uniqueness rules need a lock, or two requests sharing only
        // one of them could both pass the conflict check and both deploy
        let _guards = self
            .register_locks
            .acquire_all([
                format!("pair:{}|{}", owner, nominee),
                format!("contact:{}", contact),
            ])
            .await;

        if let Some(existing) = self
            .registry
            .find_conflict(owner, nominee, &contact)
            .await?
        {
            warn!(
                "Register for {} refused: vault {} is still active",
                mask_contact(&contact),
                existing
            );
            return Err(StackSafeError::DuplicateVault(format!(
                "vault {} already binds this owner, nominee or contact",
                existing
            )));
        }

        let provisioned = self
            .identity
            .create_identity(&contact)
            .await
            .map_err(|e| {
                error!(
                    "Identity provisioning for {} failed: {}",
                    mask_contact(&contact),
                    e
                );
                StackSafeError::IdentityProvisioningFailure(e.to_string())
            })?;
        debug!(
            "Identity {} ready for {} (new: {})",
            provisioned.id,
            mask_contact(&contact),
            provisioned.created
        );

        match self
            .deploy_and_persist(&request, commitment, &contact, owner, nominee, &provisioned)
            .await
        {
            Ok(registration) => Ok(registration),
            Err(e) => {
                if provisioned.created {
                    self.compensate_identity(&provisioned.id).await;
                }
                Err(e)
            }
        }
    }

    async fn deploy_and_persist(
        &self,
        request: &RegisterRequest,
        commitment: Digest,
        contact: &str,
        owner: &str,
        nominee: &str,
        provisioned: &ProvisionedIdentity,
    ) -> Result<Registration> {
        let vault_id = VaultId::new();
        let contract_name = self.ledger.contract_name_for(&vault_id);
        let ledger_reference = self.ledger.reference_for(&vault_id)?;

        let passphrase_verifier = hash(&request.passphrase);
        let encrypted_secret = SecretFragments::new(request.password.as_str(), request.salt.as_str())
            .seal(&self.config.encryption_key)?;

        let params = VaultContractParams {
            nominee_address: nominee.to_string(),
            secret_commitment: commitment.clone(),
            heartbeat_interval: request.heartbeat_interval,
            grace_period: request.grace_period,
        };
        let deployment_tx_id = self
            .ledger
            .deploy(&self.template, &params, &contract_name)
            .await?;

        let now = Utc::now();
        let record = VaultRecord {
            vault_id,
            owner_identity: owner.to_string(),
            nominee_identity: nominee.to_string(),
            nominee_contact: contact.to_string(),
            nominee_auth_id: provisioned.id.to_string(),
            secret_commitment: commitment,
            passphrase_verifier,
            encrypted_secret,
            heartbeat_interval: request.heartbeat_interval,
            grace_period: request.grace_period,
            ledger_reference: ledger_reference.clone(),
            state: VaultState::Registered,
            deployment_tx_id: deployment_tx_id.clone(),
            claim_tx_id: None,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.registry.create(record).await {
            // The deployment is on the ledger already and cannot be retracted
            error!(
                "Orphan deployment: contract {} (tx {}) has no vault record: {}",
                ledger_reference, deployment_tx_id, e
            );
            return Err(e.into());
        }

        info!(
            "Registered vault {} at {} (tx {})",
            vault_id, ledger_reference, deployment_tx_id
        );
        Ok(Registration {
            vault_id,
            ledger_reference,
            deployment_tx_id,
            state: VaultState::Registered,
        })
    }

    async fn compensate_identity(&self, identity: &IdentityId) {
        match self.identity.delete_identity(identity).await {
            Ok(()) => info!("Rolled back identity {}", identity),
            Err(e) => error!("Failed to roll back identity {}: {}", identity, e),
        }
    }

    /// Send an enrollment code to the nominee of the vault bound to `contact`.
    pub async fn start_enroll(&self, request: StartEnrollRequest) -> Result<ChallengeIssued> {
        request.validate()?;
        let contact = normalize_contact(&request.contact);

        let record = self.registry.get_by_contact(&contact).await?;
        if record.state != VaultState::Registered {
            return Err(StackSafeError::AlreadyEnrolled);
        }

        self.otp.issue_challenge(&record.nominee_contact).await?;
        info!("Enrollment challenge issued for vault {}", record.vault_id);
        Ok(ChallengeIssued {
            vault_id: record.vault_id,
            delivered_to: mask_contact(&record.nominee_contact),
        })
    }

    /// Confirm the nominee with OTP and passphrase and move the vault to
    /// `NomineeEnrolled`.
    pub async fn verify_enroll(&self, request: VerifyEnrollRequest) -> Result<Enrollment> {
        request.validate()?;
        let reference = request.reference()?;
        let contact = normalize_contact(&request.contact);

        let vault_id = self.registry.get_by_ledger_reference(&reference).await?.vault_id;
        let _guard = self.vault_locks.acquire(&vault_id.to_string()).await;
        let record = self.registry.get_by_id(&vault_id).await?;

        // Same answer as an unknown reference
        if record.nominee_contact != contact {
            return Err(StackSafeError::NotFound(format!("vault {}", reference)));
        }
        if record.state != VaultState::Registered {
            return Err(StackSafeError::AlreadyEnrolled);
        }

        self.check_challenge(&record, &request.otp, &request.passphrase)
            .await?;

        let updated = self
            .registry
            .update_state(
                &vault_id,
                VaultState::Registered,
                VaultState::NomineeEnrolled,
                None,
            )
            .await?;
        info!("Nominee enrolled for vault {}", vault_id);
        Ok(Enrollment {
            vault_id,
            ledger_reference: updated.ledger_reference,
            state: updated.state,
        })
    }

    /// Send a claim code to the enrolled nominee.
    pub async fn start_claim(&self, request: StartClaimRequest) -> Result<ChallengeIssued> {
        request.validate()?;
        let reference = request.reference()?;

        let record = self.registry.get_by_ledger_reference(&reference).await?;
        ensure_claimable(&record)?;

        self.otp.issue_challenge(&record.nominee_contact).await?;
        info!("Claim challenge issued for vault {}", record.vault_id);
        Ok(ChallengeIssued {
            vault_id: record.vault_id,
            delivered_to: mask_contact(&record.nominee_contact),
        })
    }

    /// Verify the nominee, open the sealed secret, call `claim` on the vault
    /// contract and record the vault as `Claimed`.
    ///
    /// The ledger is called at most once per vault. If recording the claim
    /// fails after the broadcast, the tx id is kept and the next successful
    /// attempt records it instead of broadcasting again.
    pub async fn execute_claim(&self, request: ExecuteClaimRequest) -> Result<ClaimReceipt> {
        request.validate()?;
        let reference = request.reference()?;

        let vault_id = self.registry.get_by_ledger_reference(&reference).await?.vault_id;
        let _guard = self.vault_locks.acquire(&vault_id.to_string()).await;
        let record = self.registry.get_by_id(&vault_id).await?;

        ensure_claimable(&record)?;
        if record.claim_tx_id.is_some() {
            return Err(StackSafeError::AlreadyClaimed);
        }

        self.check_challenge(&record, &request.otp, &request.passphrase)
            .await?;

        let pending = self.pending_claims.lock().await.get(&vault_id).cloned();
        let claim_tx_id = match pending {
            Some(tx_id) => {
                warn!(
                    "Recording earlier claim tx {} for vault {} without a new broadcast",
                    tx_id, vault_id
                );
                tx_id
            }
            None => self.broadcast_claim(&record).await?,
        };

        let updated = match self
            .registry
            .update_state(
                &vault_id,
                VaultState::NomineeEnrolled,
                VaultState::Claimed,
                Some(claim_tx_id.clone()),
            )
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                error!(
                    "Claim tx {} for vault {} was broadcast but not recorded: {}",
                    claim_tx_id, vault_id, e
                );
                self.pending_claims
                    .lock()
                    .await
                    .insert(vault_id, claim_tx_id);
                return Err(e.into());
            }
        };
        self.pending_claims.lock().await.remove(&vault_id);

        info!("Vault {} claimed in tx {}", vault_id, claim_tx_id);
        Ok(ClaimReceipt {
            vault_id,
            ledger_reference: updated.ledger_reference,
            claim_tx_id,
            state: updated.state,
        })
    }

    async fn broadcast_claim(&self, record: &VaultRecord) -> Result<TxId> {
        let args = {
            let fragments = record
                .encrypted_secret
                .open(&self.config.encryption_key)
                .map_err(|e| {
                    error!(
                        "Sealed secret of vault {} could not be opened",
                        record.vault_id
                    );
                    StackSafeError::from(e)
                })?;
            vec![
                ClarityValue::string_ascii(fragments.salt())?,
                ClarityValue::string_ascii(fragments.password())?,
            ]
        };

        Ok(self
            .ledger
            .invoke(&record.ledger_reference, CLAIM_FUNCTION, args)
            .await?)
    }

    /// Record an owner heartbeat on the vault contract, pushing back the
    /// moment a claim becomes possible. No registry state changes.
    pub async fn heartbeat(&self, request: HeartbeatRequest) -> Result<Heartbeat> {
        request.validate()?;
        let reference = request.reference()?;

        let vault_id = self.registry.get_by_ledger_reference(&reference).await?.vault_id;
        let _guard = self.vault_locks.acquire(&vault_id.to_string()).await;
        let record = self.registry.get_by_id(&vault_id).await?;
        if record.state == VaultState::Claimed {
            return Err(StackSafeError::AlreadyClaimed);
        }

        let tx_id = self.ledger.ping(&record.ledger_reference).await?;
        info!("Heartbeat for vault {} in tx {}", vault_id, tx_id);
        Ok(Heartbeat {
            vault_id,
            ledger_reference: record.ledger_reference,
            tx_id,
            state: record.state,
        })
    }

    /// Public view of the vault at `ledger_reference`.
    pub async fn describe(&self, ledger_reference: &str) -> Result<VaultView> {
        let reference: LedgerReference = ledger_reference
            .parse()
            .map_err(|e| StackSafeError::Validation(format!("ledger_reference: {}", e)))?;
        let record = self.registry.get_by_ledger_reference(&reference).await?;
        Ok(VaultView::from(&record))
    }

    /// Evaluate both factors, then report the OTP failure first.
    async fn check_challenge(&self, record: &VaultRecord, otp: &str, passphrase: &str) -> Result<()> {
        let otp_ok = self.otp.verify_challenge(&record.nominee_contact, otp).await;
        let passphrase_ok = record.passphrase_verifier.verify(passphrase);

        if !otp_ok {
            warn!("OTP check failed for vault {}", record.vault_id);
            return Err(StackSafeError::OtpInvalid);
        }
        if !passphrase_ok {
            warn!("Passphrase check failed for vault {}", record.vault_id);
            return Err(StackSafeError::PassphraseMismatch);
        }
        Ok(())
    }
}

fn ensure_claimable(record: &VaultRecord) -> Result<()> {
    match record.state {
        VaultState::NomineeEnrolled => Ok(()),
        VaultState::Claimed => Err(StackSafeError::AlreadyClaimed),
        VaultState::Registered => Err(StackSafeError::NotEnrolled),
    }
}
