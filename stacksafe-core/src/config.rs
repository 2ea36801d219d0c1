use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::custody::EncryptionKey;
use crate::error::{Result, StackSafeError};
use crate::ledger::{validate_principal, Network};

pub const DEFAULT_CONTRACT_NAME_PREFIX: &str = "stacksafe-vault";
pub const DEFAULT_OTP_TTL_SECS: u64 = 300;
/// One-time codes never outlive a day.
pub const MAX_OTP_TTL_SECS: u64 = 86_400;

/// Longest prefix that still leaves room for `-<16 hex chars>` in a contract name.
const MAX_CONTRACT_NAME_PREFIX_LEN: usize = 23;

/// Process-wide configuration, built once at start-up and shared read-only.
///
/// ```json
/// {
///   "encryption_key": "<64 hex chars>",
///   "deployer_address": "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3KZJ273ANAFSF",
///   "network": "testnet",
///   "registry_path": "/var/lib/stacksafe/vaults.json"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct VaultConfig {
    /// Key sealing every stored secret
    pub encryption_key: EncryptionKey,
    #[serde(default)]
    pub network: Network,
    /// Principal that deploys vault contracts and sends claim calls
    pub deployer_address: String,
    #[serde(default = "default_contract_name_prefix")]
    pub contract_name_prefix: String,
    /// Lifetime of issued one-time codes, for providers that take it from us
    #[serde(default = "default_otp_ttl_secs")]
    pub otp_ttl_secs: u64,
    /// JSON file backing the vault registry; in-memory when absent
    #[serde(default)]
    pub registry_path: Option<PathBuf>,
}

fn default_contract_name_prefix() -> String {
    DEFAULT_CONTRACT_NAME_PREFIX.to_string()
}

fn default_otp_ttl_secs() -> u64 {
    DEFAULT_OTP_TTL_SECS
}

impl VaultConfig {
    pub fn new(encryption_key: EncryptionKey, deployer_address: impl Into<String>) -> Self {
        Self {
            encryption_key,
            network: Network::default(),
            deployer_address: deployer_address.into(),
            contract_name_prefix: default_contract_name_prefix(),
            otp_ttl_secs: default_otp_ttl_secs(),
            registry_path: None,
        }
    }

    /// Read and validate a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: VaultConfig = serde_json::from_str(&content)?;
        config.validate()?;
        info!(
            "Loaded configuration from {:?} (network: {})",
            path, config.network
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_principal(&self.deployer_address)?;

        let prefix = &self.contract_name_prefix;
        let valid_prefix = prefix.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
            && prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            && prefix.len() <= MAX_CONTRACT_NAME_PREFIX_LEN;
        if !valid_prefix {
            return Err(StackSafeError::Validation(format!(
                "contract name prefix must be a letter followed by letters, digits, '-' or '_', \
                 at most {} characters",
                MAX_CONTRACT_NAME_PREFIX_LEN
            )));
        }

        if self.otp_ttl_secs == 0 || self.otp_ttl_secs > MAX_OTP_TTL_SECS {
            return Err(StackSafeError::Validation(format!(
                "otp_ttl_secs must be between 1 and {}",
                MAX_OTP_TTL_SECS
            )));
        }
        Ok(())
    }

    /// Code lifetime, clamped to [`MAX_OTP_TTL_SECS`] for unvalidated configs.
    pub fn otp_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.otp_ttl_secs.min(MAX_OTP_TTL_SECS) as i64)
    }
}
