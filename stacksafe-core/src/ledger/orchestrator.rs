use std::sync::Arc;

use tracing::{debug, error, info};

use super::client::{LedgerClient, TransactionSigner};
use super::error::LedgerResult;
use super::template::{ContractTemplate, VaultContractParams};
use super::transaction::{
    ClarityValue, LedgerReference, Transaction, TransactionPayload, TxId, MAX_CONTRACT_NAME_LEN,
};
use crate::config::VaultConfig;
use crate::registry::VaultId;

/// Contract function releasing the vault to the nominee.
pub const CLAIM_FUNCTION: &str = "claim";
/// Contract function recording an owner heartbeat.
pub const PING_FUNCTION: &str = "ping";

/// Hex characters of the vault id appended to the contract name prefix.
const CONTRACT_SUFFIX_LEN: usize = 16;

/// Builds, signs and broadcasts ledger transactions on behalf of the deployer.
pub struct LedgerOrchestrator {
    config: Arc<VaultConfig>,
    client: Arc<dyn LedgerClient>,
    signer: Arc<dyn TransactionSigner>,
}

impl LedgerOrchestrator {
    pub fn new(
        config: Arc<VaultConfig>,
        client: Arc<dyn LedgerClient>,
        signer: Arc<dyn TransactionSigner>,
    ) -> Self {
        Self {
            config,
            client,
            signer,
        }
    }

    /// Contract name bound to `vault_id`: `<prefix>-<16 hex chars of the id>`.
    pub fn contract_name_for(&self, vault_id: &VaultId) -> String {
        let suffix: String = vault_id
            .as_uuid()
            .simple()
            .to_string()
            .chars()
            .take(CONTRACT_SUFFIX_LEN)
            .collect();
        let name = format!("{}-{}", self.config.contract_name_prefix, suffix);
        debug_assert!(name.len() <= MAX_CONTRACT_NAME_LEN);
        name
    }

    /// Where the contract for `vault_id` will live once deployed.
    pub fn reference_for(&self, vault_id: &VaultId) -> LedgerResult<LedgerReference> {
        LedgerReference::new(
            self.config.deployer_address.clone(),
            self.contract_name_for(vault_id),
        )
    }

    /// Render `template` with `params` and deploy it as `contract_name`.
    pub async fn deploy(
        &self,
        template: &ContractTemplate,
        params: &VaultContractParams,
        contract_name: &str,
    ) -> LedgerResult<TxId> {
        let code_body = template.render(params)?;
        debug!(
            "Rendered contract {} ({} bytes)",
            contract_name,
            code_body.len()
        );

        let transaction = self.build(TransactionPayload::SmartContract {
            contract_name: contract_name.to_string(),
            code_body,
        });
        let tx_id = self.submit_and_confirm(transaction).await?;
        info!("Deployed contract {} in tx {}", contract_name, tx_id);
        Ok(tx_id)
    }

    /// Call `function_name` on a deployed contract.
    pub async fn invoke(
        &self,
        contract: &LedgerReference,
        function_name: &str,
        args: Vec<ClarityValue>,
    ) -> LedgerResult<TxId> {
        let transaction = self.build(TransactionPayload::ContractCall {
            contract: contract.clone(),
            function_name: function_name.to_string(),
            function_args: args,
        });
        let tx_id = self.submit_and_confirm(transaction).await?;
        info!("Called {}::{} in tx {}", contract, function_name, tx_id);
        Ok(tx_id)
    }

    /// Record an owner heartbeat on a deployed vault contract.
    pub async fn ping(&self, contract: &LedgerReference) -> LedgerResult<TxId> {
        self.invoke(contract, PING_FUNCTION, Vec::new()).await
    }

    /// Sign and broadcast `transaction`, returning its id without waiting for a block.
    ///
    /// A submitted transaction cannot be retracted; callers must record the
    /// returned id before reporting success.
    pub async fn submit_and_confirm(&self, transaction: Transaction) -> LedgerResult<TxId> {
        let signed = self.signer.sign(transaction)?;
        match self.client.broadcast(&signed).await {
            Ok(tx_id) => Ok(tx_id),
            Err(e) => {
                error!("Transaction broadcast error: {}", e);
                Err(e)
            }
        }
    }

    fn build(&self, payload: TransactionPayload) -> Transaction {
        Transaction {
            sender: self.config.deployer_address.clone(),
            network: self.config.network,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::{hash, EncryptionKey};
    use crate::ledger::{DigestSigner, LedgerError, MemoryLedger};

    const DEPLOYER: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3KZJ273ANAFSF";
    const NOMINEE: &str = "ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG";

    fn orchestrator() -> (LedgerOrchestrator, Arc<MemoryLedger>) {
        let config = Arc::new(VaultConfig::new(EncryptionKey::generate(), DEPLOYER));
        let ledger = Arc::new(MemoryLedger::new());
        let orchestrator = LedgerOrchestrator::new(
            config,
            ledger.clone(),
            Arc::new(DigestSigner::new([7u8; 32])),
        );
        (orchestrator, ledger)
    }

    fn params() -> VaultContractParams {
        VaultContractParams {
            nominee_address: NOMINEE.into(),
            secret_commitment: hash("commitment"),
            heartbeat_interval: 4320,
            grace_period: 1008,
        }
    }

    #[test]
    fn test_contract_name_is_valid_and_stable() {
        let (orchestrator, _) = orchestrator();
        let vault_id = VaultId::new();

        let name = orchestrator.contract_name_for(&vault_id);
        assert_eq!(name, orchestrator.contract_name_for(&vault_id));
        assert!(name.starts_with("stacksafe-vault-"));
        assert!(orchestrator.reference_for(&vault_id).is_ok());
        assert_ne!(name, orchestrator.contract_name_for(&VaultId::new()));
    }

    #[tokio::test]
    async fn test_deploy_broadcasts_rendered_contract() {
        let (orchestrator, ledger) = orchestrator();
        let template = ContractTemplate::vault().unwrap();

        let tx_id = orchestrator
            .deploy(&template, &params(), "stacksafe-vault-test")
            .await
            .unwrap();
        assert!(!tx_id.is_empty());

        let transactions = ledger.transactions().await;
        assert_eq!(transactions.len(), 1);
        match &transactions[0].transaction.payload {
            TransactionPayload::SmartContract {
                contract_name,
                code_body,
            } => {
                assert_eq!(contract_name, "stacksafe-vault-test");
                assert!(code_body.contains("u4320"));
            }
            other => panic!("unexpected payload {:?}", other),
        }
        assert_eq!(transactions[0].transaction.sender, DEPLOYER);
    }

    #[tokio::test]
    async fn test_invalid_params_never_broadcast() {
        let (orchestrator, ledger) = orchestrator();
        let mut bad = params();
        bad.nominee_address = "not-an-address".into();

        let err = orchestrator
            .deploy(&ContractTemplate::vault().unwrap(), &bad, "stacksafe-vault-test")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidParameter(_)));
        assert!(ledger.transactions().await.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_broadcast_surfaces_reason() {
        let (orchestrator, ledger) = orchestrator();
        ledger.reject_next("ConflictingNonceInMempool").await;

        let contract: LedgerReference = format!("{}.stacksafe-vault-test", DEPLOYER)
            .parse()
            .unwrap();
        let err = orchestrator
            .invoke(&contract, CLAIM_FUNCTION, vec![])
            .await
            .unwrap_err();

        match err {
            LedgerError::BroadcastRejected { reason } => {
                assert_eq!(reason, "ConflictingNonceInMempool")
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(ledger.transactions().await.is_empty());
    }

    #[tokio::test]
    async fn test_ping_calls_contract_without_arguments() {
        let (orchestrator, ledger) = orchestrator();
        let contract: LedgerReference = format!("{}.stacksafe-vault-test", DEPLOYER)
            .parse()
            .unwrap();

        let tx_id = orchestrator.ping(&contract).await.unwrap();
        assert!(!tx_id.is_empty());
        assert_eq!(ledger.calls(PING_FUNCTION).await, vec![Vec::<ClarityValue>::new()]);
        assert!(ledger.calls(CLAIM_FUNCTION).await.is_empty());
    }
}
