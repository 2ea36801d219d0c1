//! StackSafe custody engine.
//!
//! An owner registers a credential that is released to a designated nominee
//! only after the nominee passes a two-factor challenge: a one-time code
//! delivered out-of-band plus a shared passphrase. This crate holds the parts
//! that enforce that rule:
//!
//! - [`custody`]: AES-256-GCM envelope for the stored credential, SHA-256
//!   verifiers and commitments
//! - [`registry`]: durable vault records (in-memory and JSON file stores)
//! - [`identity`]: the identity provider contract and the OTP coordinator
//! - [`ledger`]: contract rendering, transaction building and broadcast
//! - [`vault`]: the lifecycle state machine tying everything together
//!
//! HTTP routing, OTP transport and the on-chain contract logic live outside
//! this crate; they are reached through the traits in [`identity`],
//! [`registry`] and [`ledger`].

pub mod config;
pub mod custody;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod logging;
pub mod registry;
pub mod vault;

pub use config::VaultConfig;
pub use error::{ErrorKind, Result, StackSafeError};
pub use vault::{VaultLifecycle, VaultState};
