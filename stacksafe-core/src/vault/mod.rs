//! Vault lifecycle state machine.
//!
//! [`VaultLifecycle`] is the only component allowed to move a vault between
//! states. Each transition validates its typed request, checks the stored
//! state, gathers every required proof (OTP, passphrase, decryption, ledger
//! acceptance) and commits to the registry last.

mod lifecycle;
mod locks;
pub mod requests;
mod state;

pub use lifecycle::VaultLifecycle;
pub use requests::{
    ChallengeIssued, ClaimReceipt, Enrollment, ExecuteClaimRequest, Heartbeat, HeartbeatRequest,
    RegisterRequest, Registration, StartClaimRequest, StartEnrollRequest, VaultView,
    VerifyEnrollRequest,
};
pub use state::VaultState;
