//! Ledger transaction orchestration.
//!
//! Renders the vault contract, builds deploy and call transactions, and
//! funnels them through [`LedgerOrchestrator::submit_and_confirm`]. Signing
//! and broadcasting are delegated to [`TransactionSigner`] and
//! [`LedgerClient`] implementations supplied by the host.

mod client;
pub mod error;
pub mod memory;
mod orchestrator;
pub mod template;
mod transaction;

pub use client::{LedgerClient, TransactionSigner};
pub use error::{LedgerError, LedgerResult};
pub use memory::{DigestSigner, MemoryLedger};
pub use orchestrator::{LedgerOrchestrator, CLAIM_FUNCTION, PING_FUNCTION};
pub use template::{validate_principal, ContractTemplate, VaultContractParams};
pub use transaction::{
    ClarityValue, LedgerReference, Network, SignedTransaction, Transaction, TransactionPayload,
    TxId,
};
