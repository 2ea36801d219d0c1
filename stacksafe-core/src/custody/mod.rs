//! Secret custody: the only code that touches the custodial key.
//!
//! This module provides:
//! - `EncryptionKey`: the process-wide AES-256 key, zeroized on drop
//! - `encrypt` / `decrypt`: AES-256-GCM with a random nonce per call
//! - `hash` / `Digest`: SHA-256 verifiers and commitments
//! - `SecretFragments` / `SealedSecret`: the owner's credential and its envelope

mod crypto;
pub mod error;
mod key;
mod secret;

pub use crypto::{decrypt, encrypt, hash, Digest};
pub use error::{CustodyError, CustodyResult};
pub use key::EncryptionKey;
pub use secret::{SealedSecret, SecretFragments};
