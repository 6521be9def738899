//! Command-line configuration.
//!
//! Values come from an optional TOML file, then `SATCHEL_*` environment
//! variables, then built-in defaults for anything left unset.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bitcoin::Network;
use satchel_core::constants::{DEFAULT_GAP_LIMIT, DEFAULT_MAX_FEE};
use satchel_core::network::NetworkPolicy;
use satchel_wallet::{TxOrdering, WalletConfig};
use serde::Deserialize;

/// File and environment settings, before conversion to [`WalletConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// `mainnet`, `testnet`, `signet` or `regtest`.
    pub network: String,
    /// Path of the wallet state file.
    pub wallet_path: Option<PathBuf>,
    pub fee_per_kb: Option<u64>,
    pub dust_threshold: Option<u64>,
    pub dust_soft_threshold: Option<u64>,
    pub min_confirmations: u32,
    pub max_fee: u64,
    pub gap_limit: usize,
    pub ordering: TxOrdering,
    pub reject_dust_outputs: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            network: "testnet".into(),
            wallet_path: None,
            fee_per_kb: None,
            dust_threshold: None,
            dust_soft_threshold: None,
            min_confirmations: 1,
            max_fee: DEFAULT_MAX_FEE,
            gap_limit: DEFAULT_GAP_LIMIT,
            ordering: TxOrdering::default(),
            reject_dust_outputs: true,
        }
    }
}

impl CliConfig {
    /// Load from `path` (if it exists) layered under the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder
            .add_source(config::Environment::with_prefix("SATCHEL").try_parsing(true))
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Wallet settings for the configured network.
    pub fn wallet_config(&self) -> Result<WalletConfig> {
        let mut policy = NetworkPolicy::for_network(parse_network(&self.network)?);
        if let Some(rate) = self.fee_per_kb {
            policy = policy.with_fee_per_kb(rate);
        }
        if let Some(threshold) = self.dust_threshold {
            policy.dust_threshold = threshold;
        }
        if let Some(threshold) = self.dust_soft_threshold {
            policy = policy.with_soft_dust_threshold(threshold);
        }

        let config = WalletConfig {
            policy,
            min_confirmations: self.min_confirmations,
            max_fee: self.max_fee,
            gap_limit: self.gap_limit,
            ordering: self.ordering,
            reject_dust_outputs: self.reject_dust_outputs,
        };
        config.validate()?;
        Ok(config)
    }

    /// Configured wallet path, or `<data dir>/satchel/<network>/wallet.json`.
    pub fn wallet_path(&self) -> Result<PathBuf> {
        if let Some(p) = &self.wallet_path {
            return Ok(p.clone());
        }
        let data = dirs::data_dir().context("Could not determine data directory")?;
        Ok(data
            .join("satchel")
            .join(self.network.to_lowercase())
            .join("wallet.json"))
    }
}

/// Parse a network name.
pub fn parse_network(s: &str) -> Result<Network> {
    match s.to_lowercase().as_str() {
        "mainnet" | "bitcoin" => Ok(Network::Bitcoin),
        "testnet" => Ok(Network::Testnet),
        "signet" => Ok(Network::Signet),
        "regtest" => Ok(Network::Regtest),
        other => bail!("Invalid network {other:?} (must be mainnet, testnet, signet or regtest)"),
    }
}
