use std::sync::Arc;

use tracing::{debug, warn};

use super::IdentityProvider;
use crate::error::{Result, StackSafeError};
use crate::logging::mask_contact;

const MIN_CODE_LEN: usize = 6;
const MAX_CODE_LEN: usize = 10;

/// Turns the provider's OTP contract into one boolean per attempt.
///
/// Whether a vault may be challenged at all is decided by the lifecycle
/// state machine, not here.
#[derive(Clone)]
pub struct OtpCoordinator {
    provider: Arc<dyn IdentityProvider>,
}

impl OtpCoordinator {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    /// Ask the provider to deliver a code to `contact`.
    pub async fn issue_challenge(&self, contact: &str) -> Result<()> {
        self.provider.issue_otp(contact).await.map_err(|e| {
            warn!("OTP delivery to {} failed: {}", mask_contact(contact), e);
            StackSafeError::DeliveryFailure(e.to_string())
        })?;
        debug!("OTP issued to {}", mask_contact(contact));
        Ok(())
    }

    /// Whether `code` is a live code for `contact`.
    ///
    /// Fails closed: malformed codes and provider errors both yield `false`.
    pub async fn verify_challenge(&self, contact: &str, code: &str) -> bool {
        let code = code.trim();
        if !is_well_formed(code) {
            debug!("Malformed OTP for {}", mask_contact(contact));
            return false;
        }

        match self.provider.verify_otp(contact, code).await {
            Ok(verified) => verified,
            Err(e) => {
                warn!(
                    "OTP verification for {} failed closed: {}",
                    mask_contact(contact),
                    e
                );
                false
            }
        }
    }
}

fn is_well_formed(code: &str) -> bool {
    (MIN_CODE_LEN..=MAX_CODE_LEN).contains(&code.len()) && code.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{
        IdentityError, IdentityId, IdentityResult, MemoryIdentityProvider, ProvisionedIdentity,
    };
    use async_trait::async_trait;

    /// Provider whose every call errors.
    struct BrokenProvider;

    #[async_trait]
    impl IdentityProvider for BrokenProvider {
        async fn create_identity(&self, _contact: &str) -> IdentityResult<ProvisionedIdentity> {
            Err(IdentityError::Unavailable("timeout".into()))
        }

        async fn delete_identity(&self, _identity: &IdentityId) -> IdentityResult<()> {
            Err(IdentityError::Unavailable("timeout".into()))
        }

        async fn issue_otp(&self, _contact: &str) -> IdentityResult<()> {
            Err(IdentityError::Unavailable("timeout".into()))
        }

        async fn verify_otp(&self, _contact: &str, _code: &str) -> IdentityResult<bool> {
            Err(IdentityError::Unavailable("timeout".into()))
        }
    }

    #[tokio::test]
    async fn test_code_is_single_use() {
        let provider = Arc::new(MemoryIdentityProvider::new());
        let coordinator = OtpCoordinator::new(provider.clone());

        coordinator.issue_challenge("nom@example.com").await.unwrap();
        let code = provider.last_code("nom@example.com").await.unwrap();

        assert!(coordinator.verify_challenge("nom@example.com", &code).await);
        assert!(!coordinator.verify_challenge("nom@example.com", &code).await);
    }

    #[tokio::test]
    async fn test_code_is_bound_to_contact() {
        let provider = Arc::new(MemoryIdentityProvider::new());
        let coordinator = OtpCoordinator::new(provider.clone());

        coordinator.issue_challenge("nom@example.com").await.unwrap();
        let code = provider.last_code("nom@example.com").await.unwrap();

        assert!(!coordinator.verify_challenge("other@example.com", &code).await);
        assert!(coordinator.verify_challenge("nom@example.com", &code).await);
    }

    #[tokio::test]
    async fn test_malformed_code_rejected() {
        let coordinator = OtpCoordinator::new(Arc::new(MemoryIdentityProvider::new()));
        assert!(!coordinator.verify_challenge("nom@example.com", "").await);
        assert!(!coordinator.verify_challenge("nom@example.com", "12ab56").await);
        assert!(!coordinator.verify_challenge("nom@example.com", "123").await);
    }

    #[tokio::test]
    async fn test_provider_error_fails_closed() {
        let coordinator = OtpCoordinator::new(Arc::new(BrokenProvider));
        assert!(!coordinator.verify_challenge("nom@example.com", "123456").await);
    }

    #[tokio::test]
    async fn test_rejected_delivery_is_delivery_failure() {
        let coordinator = OtpCoordinator::new(Arc::new(BrokenProvider));
        let err = coordinator
            .issue_challenge("nom@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, StackSafeError::DeliveryFailure(_)));
    }
}
