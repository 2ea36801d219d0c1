//! Structured rendering of the vault contract.
//!
//! The contract source carries four named placeholders. Parameters are typed
//! and validated before anything is substituted, and substitution is a single
//! pass, so a value can never introduce a new placeholder or break out of its
//! literal.

use super::error::{LedgerError, LedgerResult};
use crate::custody::Digest;

const VAULT_TEMPLATE: &str = include_str!("../../contracts/vault.clar");

pub const NOMINEE_ADDRESS: &str = "nominee_address";
pub const SECRET_COMMITMENT: &str = "secret_commitment";
pub const HEARTBEAT_INTERVAL: &str = "heartbeat_interval";
pub const GRACE_PERIOD: &str = "grace_period";

const PLACEHOLDERS: [&str; 4] = [
    NOMINEE_ADDRESS,
    SECRET_COMMITMENT,
    HEARTBEAT_INTERVAL,
    GRACE_PERIOD,
];

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Crockford-style base32 alphabet used by Stacks addresses.
const C32_ALPHABET: &str = "0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Check that `address` looks like a standard Stacks principal.
///
/// Only the shape is checked (prefix, alphabet, length), not the checksum.
pub fn validate_principal(address: &str) -> LedgerResult<()> {
    let valid_prefix = ["SP", "ST", "SM", "SN"]
        .iter()
        .any(|prefix| address.starts_with(prefix));
    let valid_len = (28..=41).contains(&address.len());
    let valid_chars = address
        .chars()
        .skip(2)
        .all(|c| C32_ALPHABET.contains(c));

    if !(valid_prefix && valid_len && valid_chars) {
        return Err(LedgerError::InvalidParameter(format!(
            "{:?} is not a Stacks principal",
            address
        )));
    }
    Ok(())
}

/// Values substituted into the vault contract.
#[derive(Debug, Clone)]
pub struct VaultContractParams {
    pub nominee_address: String,
    pub secret_commitment: Digest,
    /// Blocks between owner heartbeats
    pub heartbeat_interval: u64,
    /// Extra blocks after a missed heartbeat before a claim is allowed
    pub grace_period: u64,
}

impl VaultContractParams {
    pub fn validate(&self) -> LedgerResult<()> {
        validate_principal(&self.nominee_address)?;
        if self.heartbeat_interval == 0 {
            return Err(LedgerError::InvalidParameter(
                "heartbeat interval must be positive".into(),
            ));
        }
        if self.grace_period == 0 {
            return Err(LedgerError::InvalidParameter(
                "grace period must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Clarity literal for a placeholder.
    fn literal(&self, placeholder: &str) -> Option<String> {
        match placeholder {
            NOMINEE_ADDRESS => Some(format!("'{}", self.nominee_address)),
            SECRET_COMMITMENT => Some(format!("0x{}", self.secret_commitment.to_hex())),
            HEARTBEAT_INTERVAL => Some(format!("u{}", self.heartbeat_interval)),
            GRACE_PERIOD => Some(format!("u{}", self.grace_period)),
            _ => None,
        }
    }
}

/// A contract source with named `{{placeholder}}` substitution points.
#[derive(Debug, Clone)]
pub struct ContractTemplate {
    source: String,
}

impl ContractTemplate {
    /// Parse a template, requiring every known placeholder and no unknown ones.
    pub fn parse(source: impl Into<String>) -> LedgerResult<Self> {
        let source = source.into();
        let found = scan_placeholders(&source)?;

        for name in &found {
            if !PLACEHOLDERS.contains(name) {
                return Err(LedgerError::InvalidTemplate(format!(
                    "unknown placeholder {{{{{}}}}}",
                    name
                )));
            }
        }
        for required in PLACEHOLDERS {
            if !found.contains(&required) {
                return Err(LedgerError::InvalidTemplate(format!(
                    "missing placeholder {{{{{}}}}}",
                    required
                )));
            }
        }

        Ok(Self { source })
    }

    /// The bundled StackSafe vault contract.
    pub fn vault() -> LedgerResult<Self> {
        Self::parse(VAULT_TEMPLATE)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render the contract for `params`.
    pub fn render(&self, params: &VaultContractParams) -> LedgerResult<String> {
        params.validate()?;

        let mut output = String::with_capacity(self.source.len());
        let mut rest = self.source.as_str();

        while let Some(start) = rest.find(OPEN) {
            output.push_str(&rest[..start]);
            let after_open = &rest[start + OPEN.len()..];
            let end = after_open
                .find(CLOSE)
                .ok_or_else(|| LedgerError::InvalidTemplate("unterminated placeholder".into()))?;
            let name = after_open[..end].trim();
            let literal = params.literal(name).ok_or_else(|| {
                LedgerError::InvalidTemplate(format!("unknown placeholder {{{{{}}}}}", name))
            })?;
            output.push_str(&literal);
            rest = &after_open[end + CLOSE.len()..];
        }
        output.push_str(rest);

        Ok(output)
    }
}

fn scan_placeholders(source: &str) -> LedgerResult<Vec<&str>> {
    let mut found = Vec::new();
    let mut rest = source;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let end = after_open
            .find(CLOSE)
            .ok_or_else(|| LedgerError::InvalidTemplate("unterminated placeholder".into()))?;
        found.push(after_open[..end].trim());
        rest = &after_open[end + CLOSE.len()..];
    }

    Ok(found)
}
