//! Transaction and reference types for the Stacks ledger.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::{LedgerError, LedgerResult};
use super::template::validate_principal;

/// Longest contract name the ledger accepts.
pub const MAX_CONTRACT_NAME_LEN: usize = 40;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Testnet,
    Mainnet,
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Testnet => write!(f, "testnet"),
            Self::Mainnet => write!(f, "mainnet"),
        }
    }
}

/// Identifier of a broadcast transaction.
///
/// A pending reference: the transaction was accepted into the mempool, not
/// necessarily mined.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(String);

impl TxId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address of a deployed contract: `<deployer>.<contract-name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerReference {
    deployer: String,
    contract_name: String,
}

impl LedgerReference {
    pub fn new(deployer: impl Into<String>, contract_name: impl Into<String>) -> LedgerResult<Self> {
        let deployer = deployer.into();
        let contract_name = contract_name.into();
        validate_principal(&deployer)?;
        validate_contract_name(&contract_name)?;
        Ok(Self {
            deployer,
            contract_name,
        })
    }

    pub fn deployer(&self) -> &str {
        &self.deployer
    }

    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }
}

impl std::fmt::Display for LedgerReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.deployer, self.contract_name)
    }
}

impl std::str::FromStr for LedgerReference {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (deployer, contract_name) = s.trim().split_once('.').ok_or_else(|| {
            LedgerError::InvalidParameter(format!(
                "ledger reference must be <deployer>.<contract-name>, got {:?}",
                s
            ))
        })?;
        Self::new(deployer, contract_name)
    }
}

impl Serialize for LedgerReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LedgerReference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Contract names start with a letter and continue with letters, digits, `-` or `_`.
pub fn validate_contract_name(name: &str) -> LedgerResult<()> {
    let mut chars = name.chars();
    let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let rest_valid = chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if !starts_with_letter || !rest_valid || name.len() > MAX_CONTRACT_NAME_LEN {
        return Err(LedgerError::InvalidParameter(format!(
            "invalid contract name {:?}",
            name
        )));
    }
    Ok(())
}

/// A typed function argument.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum ClarityValue {
    StringAscii(String),
}

impl ClarityValue {
    pub fn string_ascii(value: impl Into<String>) -> LedgerResult<Self> {
        let value = value.into();
        if !value.is_ascii() {
            return Err(LedgerError::InvalidParameter(
                "string-ascii argument contains non-ASCII characters".into(),
            ));
        }
        Ok(Self::StringAscii(value))
    }
}

impl std::fmt::Debug for ClarityValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Claim arguments carry the released secret
        match self {
            Self::StringAscii(s) => write!(f, "StringAscii(<{} chars>)", s.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionPayload {
    SmartContract {
        contract_name: String,
        code_body: String,
    },
    ContractCall {
        contract: LedgerReference,
        function_name: String,
        function_args: Vec<ClarityValue>,
    },
}

/// An unsigned transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub network: Network,
    pub payload: TransactionPayload,
}

impl Transaction {
    /// Canonical bytes covered by the signature.
    pub fn encode(&self) -> LedgerResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub signature: Vec<u8>,
}
