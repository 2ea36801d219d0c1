//! StackSafe operator tool
//!
//! Utilities around the custody engine: key generation, commitments,
//! contract rendering, registry inspection and a local end-to-end simulation
//! of the vault lifecycle against in-process collaborators.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use stacksafe_core::custody::{hash, Digest, EncryptionKey};
use stacksafe_core::identity::MemoryIdentityProvider;
use stacksafe_core::ledger::{ContractTemplate, DigestSigner, MemoryLedger, VaultContractParams};
use stacksafe_core::logging::init_tracing;
use stacksafe_core::registry::{FileVaultRegistry, MemoryVaultRegistry, VaultRegistry};
use stacksafe_core::vault::{
    ExecuteClaimRequest, HeartbeatRequest, RegisterRequest, StartClaimRequest, StartEnrollRequest, VaultView,
    VerifyEnrollRequest,
};
use stacksafe_core::{VaultConfig, VaultLifecycle};

/// Testnet deployer used when no configuration file is given.
const DEFAULT_DEPLOYER: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3KZJ273ANAFSF";
const DEFAULT_NOMINEE: &str = "ST2JHG361ZXG51QTKY2NQCVBPPRRE2KZB1HR05NNC";
const DEFAULT_OWNER: &str = "ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG";

/// StackSafe operator tool
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON configuration file
    #[arg(long, env = "STACKSAFE_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a fresh 256-bit encryption key as hex
    Keygen,

    /// Print the SHA-256 digest of a string (passphrase verifier or secret commitment)
    Hash { input: String },

    /// Render the bundled vault contract
    Render {
        #[arg(long)]
        nominee: String,
        /// Hex SHA-256 commitment
        #[arg(long)]
        commitment: String,
        #[arg(long, default_value = "4320")]
        heartbeat_interval: u64,
        #[arg(long, default_value = "1008")]
        grace_period: u64,
    },

    /// Run register, heartbeat, enroll and claim against in-process collaborators
    Simulate {
        #[arg(long, default_value = "nom@example.com")]
        contact: String,
        #[arg(long, default_value = "p@ss1")]
        passphrase: String,
        #[arg(long, default_value = "hunter2")]
        password: String,
        #[arg(long, default_value = "NaCl")]
        salt: String,
        #[arg(long, default_value = DEFAULT_OWNER)]
        owner: String,
        #[arg(long, default_value = DEFAULT_NOMINEE)]
        nominee: String,
    },

    /// List the vaults in the configured registry file, or show one
    Inspect {
        /// `<deployer>.<contract-name>` of a single vault
        #[arg(long)]
        reference: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("stacksafe_core=info,stacksafe=info");

    let args = Args::parse();

    match args.command {
        Command::Keygen => {
            let key = EncryptionKey::generate();
            println!("{}", key.to_hex().as_str());
        }
        Command::Hash { input } => {
            println!("{}", hash(&input));
        }
        Command::Render {
            nominee,
            commitment,
            heartbeat_interval,
            grace_period,
        } => {
            let params = VaultContractParams {
                nominee_address: nominee,
                secret_commitment: Digest::from_hex(&commitment).context("Invalid commitment")?,
                heartbeat_interval,
                grace_period,
            };
            let template = ContractTemplate::vault()?;
            print!("{}", template.render(&params)?);
        }
        Command::Simulate {
            contact,
            passphrase,
            password,
            salt,
            owner,
            nominee,
        } => {
            let config = load_config(args.config.as_ref())?;
            simulate(
                config,
                RegisterRequest {
                    owner_wallet: owner,
                    nominee_wallet: nominee,
                    secret_commitment: hash(format!("{}{}", salt, password)).to_hex(),
                    nominee_contact: contact,
                    heartbeat_interval: 4320,
                    grace_period: 1008,
                    password,
                    salt,
                    passphrase,
                },
            )
            .await?;
        }
        Command::Inspect { reference } => {
            let config = load_config(args.config.as_ref())?;
            let Some(path) = config.registry_path.as_ref() else {
                bail!("Configuration has no registry_path to inspect");
            };
            let registry = FileVaultRegistry::open(path).await?;
            let views: Vec<VaultView> = registry
                .list()
                .await?
                .iter()
                .filter(|r| {
                    reference
                        .as_deref()
                        .is_none_or(|wanted| r.ledger_reference.to_string() == wanted.trim())
                })
                .map(VaultView::from)
                .collect();
            if reference.is_some() && views.is_empty() {
                bail!("No vault at {}", reference.unwrap_or_default());
            }
            print_json(&views)?;
        }
    }

    Ok(())
}

/// Configuration file if given, otherwise an ephemeral testnet setup.
///
/// `STACKSAFE_ENCRYPTION_KEY` supplies the key for the ephemeral setup.
fn load_config(path: Option<&PathBuf>) -> Result<VaultConfig> {
    if let Some(path) = path {
        return VaultConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path));
    }

    let key = match std::env::var("STACKSAFE_ENCRYPTION_KEY") {
        Ok(hex) => EncryptionKey::from_hex(&hex).context("Invalid STACKSAFE_ENCRYPTION_KEY")?,
        Err(_) => {
            warn!("No configuration given, using a throwaway encryption key");
            EncryptionKey::generate()
        }
    };
    let config = VaultConfig::new(key, DEFAULT_DEPLOYER);
    config.validate()?;
    Ok(config)
}

async fn simulate(config: VaultConfig, request: RegisterRequest) -> Result<()> {
    let config = Arc::new(config);
    let registry: Arc<dyn VaultRegistry> = match &config.registry_path {
        Some(path) => Arc::new(FileVaultRegistry::open(path).await?),
        None => Arc::new(MemoryVaultRegistry::new()),
    };
    let identity = Arc::new(MemoryIdentityProvider::with_ttl(config.otp_ttl()));
    let ledger = Arc::new(MemoryLedger::new());
    let lifecycle = VaultLifecycle::new(
        config.clone(),
        registry,
        identity.clone(),
        ledger.clone(),
        Arc::new(DigestSigner::new(*hash(config.deployer_address.as_bytes()).as_bytes())),
    )?;

    let contact = request.nominee_contact.clone();
    let passphrase = request.passphrase.clone();

    let registration = lifecycle.register(request).await?;
    print_json(&registration)?;
    let reference = registration.ledger_reference.to_string();

    print_json(
        &lifecycle
            .heartbeat(HeartbeatRequest {
                ledger_reference: reference.clone(),
            })
            .await?,
    )?;

    print_json(
        &lifecycle
            .start_enroll(StartEnrollRequest {
                contact: contact.clone(),
            })
            .await?,
    )?;
    let code = identity
        .last_code(&contact)
        .await
        .context("No enrollment code delivered")?;
    print_json(
        &lifecycle
            .verify_enroll(VerifyEnrollRequest {
                ledger_reference: reference.clone(),
                contact: contact.clone(),
                otp: code,
                passphrase: passphrase.clone(),
            })
            .await?,
    )?;

    print_json(
        &lifecycle
            .start_claim(StartClaimRequest {
                ledger_reference: reference.clone(),
            })
            .await?,
    )?;
    let code = identity
        .last_code(&contact)
        .await
        .context("No claim code delivered")?;
    print_json(
        &lifecycle
            .execute_claim(ExecuteClaimRequest {
                ledger_reference: reference.clone(),
                otp: code,
                passphrase,
            })
            .await?,
    )?;

    print_json(&lifecycle.describe(&reference).await?)?;
    info!(
        "Simulation finished with {} ledger transactions",
        ledger.transactions().await.len()
    );
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
