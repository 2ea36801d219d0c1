//! Tracing setup and log-safe rendering of personal data.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` (e.g.
/// `"stacksafe_core=info"`) applies. Calling this twice is harmless.
pub fn init_tracing(default_filter: &str) {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Mask a contact address for logs: `nom@example.com` becomes `n***@example.com`.
pub fn mask_contact(contact: &str) -> String {
    let contact = contact.trim();
    match contact.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().map(String::from).unwrap_or_default();
            format!("{}***@{}", first, domain)
        }
        None => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_contact() {
        assert_eq!(mask_contact("nom@example.com"), "n***@example.com");
        assert_eq!(mask_contact("@example.com"), "***@example.com");
        assert_eq!(mask_contact("+15551234567"), "***");
    }
}
