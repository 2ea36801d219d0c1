//! Identity provider contract and the OTP challenge coordinator.
//!
//! The provider owns nominee identities and the issue/verify mechanics of
//! one-time codes (storage, delivery, expiry). This crate only consumes that
//! contract through [`IdentityProvider`].

pub mod memory;
mod otp;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryIdentityProvider;
pub use otp::OtpCoordinator;

/// Provider-side handle for a nominee identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(String);

impl IdentityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of [`IdentityProvider::create_identity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedIdentity {
    pub id: IdentityId,
    /// False when the contact already had an identity
    pub created: bool,
}

#[derive(Error, Debug)]
pub enum IdentityError {
    /// The provider refused the request.
    #[error("Rejected by identity provider: {0}")]
    Rejected(String),

    #[error("Identity not found: {0}")]
    NotFound(String),

    /// The provider could not be reached or timed out.
    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
}

pub type IdentityResult<T> = std::result::Result<T, IdentityError>;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create (or return the existing) identity for `contact`.
    async fn create_identity(&self, contact: &str) -> IdentityResult<ProvisionedIdentity>;

    async fn delete_identity(&self, identity: &IdentityId) -> IdentityResult<()>;

    /// Deliver a fresh single-use code to `contact`.
    async fn issue_otp(&self, contact: &str) -> IdentityResult<()>;

    /// Check `code` for `contact`, consuming it on success.
    async fn verify_otp(&self, contact: &str, code: &str) -> IdentityResult<bool>;
}
