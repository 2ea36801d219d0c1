//! In-process identity provider for local simulation and tests.
//!
//! Codes are six digits, single-use, expire after a configurable window and
//! are "delivered" to an outbox the simulated nominee reads from.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{IdentityError, IdentityId, IdentityProvider, IdentityResult, ProvisionedIdentity};
use crate::registry::normalize_contact;

/// Wrong guesses tolerated before an outstanding code is discarded.
const MAX_ATTEMPTS: u32 = 5;

struct PendingCode {
    code: String,
    issued_at: DateTime<Utc>,
    attempts: u32,
}

#[derive(Default)]
struct ProviderState {
    identities: HashMap<String, IdentityId>,
    pending: HashMap<String, PendingCode>,
    outbox: HashMap<String, Vec<String>>,
    deleted: Vec<IdentityId>,
    reject_next_delivery: Option<String>,
    reject_next_identity: Option<String>,
}

pub struct MemoryIdentityProvider {
    ttl: Duration,
    state: Mutex<ProviderState>,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self::with_ttl(Duration::minutes(5))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(ProviderState::default()),
        }
    }

    /// The most recent code delivered to `contact`.
    pub async fn last_code(&self, contact: &str) -> Option<String> {
        self.state
            .lock()
            .await
            .outbox
            .get(&normalize_contact(contact))
            .and_then(|codes| codes.last().cloned())
    }

    /// How many codes were delivered to `contact`.
    pub async fn delivered_count(&self, contact: &str) -> usize {
        self.state
            .lock()
            .await
            .outbox
            .get(&normalize_contact(contact))
            .map_or(0, Vec::len)
    }

    pub async fn identity_for(&self, contact: &str) -> Option<IdentityId> {
        self.state
            .lock()
            .await
            .identities
            .get(&normalize_contact(contact))
            .cloned()
    }

    pub async fn deleted_identities(&self) -> Vec<IdentityId> {
        self.state.lock().await.deleted.clone()
    }

    pub async fn reject_next_delivery(&self, reason: impl Into<String>) {
        self.state.lock().await.reject_next_delivery = Some(reason.into());
    }

    pub async fn reject_next_identity(&self, reason: impl Into<String>) {
        self.state.lock().await.reject_next_identity = Some(reason.into());
    }

    /// Age the outstanding code for `contact` past its expiry.
    pub async fn expire_code(&self, contact: &str) {
        let ttl = self.ttl;
        if let Some(pending) = self
            .state
            .lock()
            .await
            .pending
            .get_mut(&normalize_contact(contact))
        {
            pending.issued_at = pending.issued_at - ttl - Duration::seconds(1);
        }
    }
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_code() -> String {
    let mut rng = rand::rng();
    let code: u32 = rng.random_range(0..1_000_000);
    format!("{:06}", code)
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn create_identity(&self, contact: &str) -> IdentityResult<ProvisionedIdentity> {
        let mut state = self.state.lock().await;
        if let Some(reason) = state.reject_next_identity.take() {
            return Err(IdentityError::Rejected(reason));
        }

        let contact = normalize_contact(contact);
        if let Some(existing) = state.identities.get(&contact) {
            return Ok(ProvisionedIdentity {
                id: existing.clone(),
                created: false,
            });
        }

        let id = IdentityId::new(Uuid::new_v4().to_string());
        state.identities.insert(contact, id.clone());
        Ok(ProvisionedIdentity { id, created: true })
    }

    async fn delete_identity(&self, identity: &IdentityId) -> IdentityResult<()> {
        let mut state = self.state.lock().await;
        let before = state.identities.len();
        state.identities.retain(|_, id| id != identity);
        if state.identities.len() == before {
            return Err(IdentityError::NotFound(identity.to_string()));
        }
        state.deleted.push(identity.clone());
        Ok(())
    }

    async fn issue_otp(&self, contact: &str) -> IdentityResult<()> {
        let mut state = self.state.lock().await;
        if let Some(reason) = state.reject_next_delivery.take() {
            return Err(IdentityError::Rejected(reason));
        }

        let contact = normalize_contact(contact);
        let code = generate_code();
        // A new code replaces any outstanding one
        state.pending.insert(
            contact.clone(),
            PendingCode {
                code: code.clone(),
                issued_at: Utc::now(),
                attempts: 0,
            },
        );
        state.outbox.entry(contact).or_default().push(code);
        Ok(())
    }

    async fn verify_otp(&self, contact: &str, code: &str) -> IdentityResult<bool> {
        let mut state = self.state.lock().await;
        let contact = normalize_contact(contact);

        let Some(pending) = state.pending.get_mut(&contact) else {
            return Ok(false);
        };

        if Utc::now().signed_duration_since(pending.issued_at) > self.ttl {
            state.pending.remove(&contact);
            return Ok(false);
        }

        if bool::from(pending.code.as_bytes().ct_eq(code.as_bytes())) {
            state.pending.remove(&contact);
            return Ok(true);
        }

        pending.attempts += 1;
        if pending.attempts >= MAX_ATTEMPTS {
            state.pending.remove(&contact);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_code_format() {
        let code = generate_code();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_create_identity_is_idempotent_by_contact() {
        let provider = MemoryIdentityProvider::new();
        let first = provider.create_identity("nom@example.com").await.unwrap();
        let second = provider.create_identity(" NOM@example.com").await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_delete_identity() {
        let provider = MemoryIdentityProvider::new();
        let identity = provider.create_identity("nom@example.com").await.unwrap();

        provider.delete_identity(&identity.id).await.unwrap();
        assert!(provider.identity_for("nom@example.com").await.is_none());
        assert_eq!(provider.deleted_identities().await, vec![identity.id.clone()]);
        assert!(provider.delete_identity(&identity.id).await.is_err());
    }

    #[tokio::test]
    async fn test_expired_code_rejected() {
        let provider = MemoryIdentityProvider::new();
        provider.issue_otp("nom@example.com").await.unwrap();
        let code = provider.last_code("nom@example.com").await.unwrap();

        provider.expire_code("nom@example.com").await;
        assert!(!provider.verify_otp("nom@example.com", &code).await.unwrap());
    }

    #[tokio::test]
    async fn test_reissue_invalidates_previous_code() {
        let provider = MemoryIdentityProvider::new();
        provider.issue_otp("nom@example.com").await.unwrap();
        let first = provider.last_code("nom@example.com").await.unwrap();
        provider.issue_otp("nom@example.com").await.unwrap();
        let second = provider.last_code("nom@example.com").await.unwrap();

        if first != second {
            assert!(!provider.verify_otp("nom@example.com", &first).await.unwrap());
        }
        assert!(provider.verify_otp("nom@example.com", &second).await.unwrap());
        assert_eq!(provider.delivered_count("nom@example.com").await, 2);
    }

    #[tokio::test]
    async fn test_too_many_wrong_guesses_discard_code() {
        let provider = MemoryIdentityProvider::new();
        provider.issue_otp("nom@example.com").await.unwrap();
        let code = provider.last_code("nom@example.com").await.unwrap();
        let wrong = if code == "000000" { "111111" } else { "000000" };

        for _ in 0..MAX_ATTEMPTS {
            assert!(!provider.verify_otp("nom@example.com", wrong).await.unwrap());
        }
        assert!(!provider.verify_otp("nom@example.com", &code).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejected_delivery() {
        let provider = MemoryIdentityProvider::new();
        provider.reject_next_delivery("rate limited").await;

        assert!(matches!(
            provider.issue_otp("nom@example.com").await,
            Err(IdentityError::Rejected(_))
        ));
        assert!(provider.last_code("nom@example.com").await.is_none());
        assert!(provider.issue_otp("nom@example.com").await.is_ok());
    }
}
