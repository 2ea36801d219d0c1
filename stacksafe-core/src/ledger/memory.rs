//! In-process ledger for local simulation and tests.
//!
//! `MemoryLedger` accepts every signed transaction into an in-memory list
//! unless told to reject the next one. `DigestSigner` "signs" by hashing the
//! encoded transaction with a local seed; it proves nothing to a real node.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::debug;

use super::client::{LedgerClient, TransactionSigner};
use super::error::{LedgerError, LedgerResult};
use super::transaction::{
    ClarityValue, SignedTransaction, Transaction, TransactionPayload, TxId,
};

/// Signs with SHA-256 over a local seed and the transaction bytes.
pub struct DigestSigner {
    seed: [u8; 32],
}

impl DigestSigner {
    pub fn new(seed: [u8; 32]) -> Self {
        Self { seed }
    }
}

impl TransactionSigner for DigestSigner {
    fn sign(&self, transaction: Transaction) -> LedgerResult<SignedTransaction> {
        let mut hasher = Sha256::new();
        hasher.update(self.seed);
        hasher.update(transaction.encode()?);
        Ok(SignedTransaction {
            transaction,
            signature: hasher.finalize().to_vec(),
        })
    }
}

#[derive(Default)]
struct MemoryLedgerState {
    accepted: Vec<SignedTransaction>,
    reject_next: Option<String>,
}

#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<MemoryLedgerState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next broadcast with `reason`.
    pub async fn reject_next(&self, reason: impl Into<String>) {
        self.state.lock().await.reject_next = Some(reason.into());
    }

    /// Every accepted transaction, in broadcast order.
    pub async fn transactions(&self) -> Vec<SignedTransaction> {
        self.state.lock().await.accepted.clone()
    }

    /// Arguments of every accepted call to `function_name`.
    pub async fn calls(&self, function_name: &str) -> Vec<Vec<ClarityValue>> {
        self.state
            .lock()
            .await
            .accepted
            .iter()
            .filter_map(|signed| match &signed.transaction.payload {
                TransactionPayload::ContractCall {
                    function_name: name,
                    function_args,
                    ..
                } if name == function_name => Some(function_args.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn broadcast(&self, transaction: &SignedTransaction) -> LedgerResult<TxId> {
        let mut state = self.state.lock().await;

        if let Some(reason) = state.reject_next.take() {
            return Err(LedgerError::BroadcastRejected { reason });
        }
        if transaction.signature.is_empty() {
            return Err(LedgerError::BroadcastRejected {
                reason: "SignatureValidation".into(),
            });
        }

        let mut hasher = Sha256::new();
        hasher.update(transaction.transaction.encode()?);
        hasher.update(&transaction.signature);
        hasher.update((state.accepted.len() as u64).to_be_bytes());
        let tx_id = TxId::new(format!("0x{}", hex::encode(hasher.finalize())));

        debug!("Accepted transaction {}", tx_id);
        state.accepted.push(transaction.clone());
        Ok(tx_id)
    }
}
