use async_trait::async_trait;

use super::error::LedgerResult;
use super::transaction::{SignedTransaction, Transaction, TxId};

/// Holds the deployer's private key and signs transactions with it.
pub trait TransactionSigner: Send + Sync {
    fn sign(&self, transaction: Transaction) -> LedgerResult<SignedTransaction>;
}

/// Connection to a ledger node.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit a signed transaction to the mempool.
    ///
    /// Returns once the node has accepted or rejected it; does not wait for a
    /// block. Synchronous rejections surface as
    /// [`LedgerError::BroadcastRejected`](super::LedgerError::BroadcastRejected).
    async fn broadcast(&self, transaction: &SignedTransaction) -> LedgerResult<TxId>;
}
