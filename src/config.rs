//! Configuration module for the batch transfer orchestrator
//!
//! This module handles configuration loading from TOML files and environment
//! variables, and provides structured configuration types. Configuration is
//! read once at startup and injected into the components that need it.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::str::FromStr;

use crate::errors::TransferError;
use crate::tx_builder::amount::{DecimalAmount, NATIVE_DECIMALS};

/// Upper bound on recipients per transaction.
///
/// Twenty native transfers plus the fee transfer fill the 1232-byte packet.
pub const MAX_BATCH_SIZE: usize = 20;

/// Upper bound on recipients per token batch.
///
/// A token recipient may cost two instructions and two account keys (wallet
/// and associated token account), so ten of them no longer fit in one packet.
pub const MAX_TOKEN_BATCH_SIZE: usize = 9;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// RPC endpoint configuration
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Batching, retry and confirmation settings
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Commission charged once per transaction
    #[serde(default)]
    pub fee: FeeConfig,

    /// Signer provider configuration
    #[serde(default)]
    pub signer: SignerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// JSON-RPC endpoint
    #[serde(default = "default_rpc_url")]
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,

    /// Commitment used for anchors and confirmation ("processed", "confirmed", "finalized")
    #[serde(default = "default_commitment")]
    pub commitment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Recipients per transaction
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pipeline attempts per batch (including the first)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between attempts of the same batch
    #[serde(default = "default_delay_ms")]
    pub retry_delay_ms: u64,

    /// Pacing delay between batches
    #[serde(default = "default_delay_ms")]
    pub batch_delay_ms: u64,

    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_ms: u64,

    #[serde(default = "default_delay_ms")]
    pub polling_interval_ms: u64,

    /// Send retries performed by the RPC node for one submission
    #[serde(default = "default_send_max_retries")]
    pub send_max_retries: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Address receiving the commission
    #[serde(default)]
    pub destination: String,

    /// Commission in SOL per transaction
    #[serde(default)]
    pub amount: String,
}

/// Resolved fee transfer parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedFee {
    pub destination: Pubkey,
    pub lamports: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Path to keypair file for the local signer provider
    #[serde(default = "default_keypair_path")]
    pub keypair_path: String,

    /// Upper bound on one signature request
    #[serde(default = "default_signer_timeout")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

// Default value functions
fn default_rpc_url() -> String { "https://api.mainnet-beta.solana.com".to_string() }
fn default_rpc_timeout() -> u64 { 30 }
fn default_commitment() -> String { "confirmed".to_string() }
fn default_batch_size() -> usize { 9 }
fn default_max_retries() -> u32 { 3 }
fn default_delay_ms() -> u64 { 1_000 }
fn default_confirmation_timeout() -> u64 { 120_000 }
fn default_send_max_retries() -> usize { 5 }
fn default_keypair_path() -> String { "~/.config/solana/id.json".to_string() }
fn default_signer_timeout() -> u64 { 120_000 }
fn default_log_level() -> String { "info".to_string() }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            timeout_secs: default_rpc_timeout(),
            commitment: default_commitment(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_delay_ms(),
            batch_delay_ms: default_delay_ms(),
            confirmation_timeout_ms: default_confirmation_timeout(),
            polling_interval_ms: default_delay_ms(),
            send_max_retries: default_send_max_retries(),
        }
    }
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            keypair_path: default_keypair_path(),
            timeout_ms: default_signer_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl RpcConfig {
    pub fn commitment_config(&self) -> Result<CommitmentConfig, TransferError> {
        match self.commitment.as_str() {
            "processed" => Ok(CommitmentConfig::processed()),
            "confirmed" => Ok(CommitmentConfig::confirmed()),
            "finalized" => Ok(CommitmentConfig::finalized()),
            other => Err(TransferError::FatalConfig(format!(
                "unknown commitment level '{}'",
                other
            ))),
        }
    }
}

impl FeeConfig {
    /// Parse the destination and amount; any problem is fatal for the request
    pub fn resolve(&self) -> Result<ResolvedFee, TransferError> {
        let destination = Pubkey::from_str(self.destination.trim()).map_err(|e| {
            TransferError::FatalConfig(format!(
                "invalid fee destination '{}': {}",
                self.destination, e
            ))
        })?;

        let amount = DecimalAmount::from_str(&self.amount).map_err(|e| {
            TransferError::FatalConfig(format!("invalid fee amount '{}': {}", self.amount, e))
        })?;
        let lamports = amount.to_minimal_units(NATIVE_DECIMALS).map_err(|e| {
            TransferError::FatalConfig(format!("invalid fee amount '{}': {}", self.amount, e))
        })?;

        Ok(ResolvedFee {
            destination,
            lamports,
        })
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;
        Ok(config)
    }

    /// Load configuration with `.env` and environment variable overrides
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, used when no file is present
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply the process-wide overrides (`BATCH_SIZE`, `MAX_RETRIES`, ...)
    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        override_parsed(&lookup, "BATCH_SIZE", &mut self.transfer.batch_size)?;
        override_parsed(&lookup, "MAX_RETRIES", &mut self.transfer.max_retries)?;
        override_parsed(&lookup, "RETRY_DELAY_MS", &mut self.transfer.retry_delay_ms)?;
        override_parsed(&lookup, "BATCH_DELAY_MS", &mut self.transfer.batch_delay_ms)?;
        override_parsed(
            &lookup,
            "CONFIRMATION_TIMEOUT_MS",
            &mut self.transfer.confirmation_timeout_ms,
        )?;
        override_parsed(
            &lookup,
            "POLLING_INTERVAL_MS",
            &mut self.transfer.polling_interval_ms,
        )?;
        override_parsed(&lookup, "FEE_DESTINATION_ADDRESS", &mut self.fee.destination)?;
        override_parsed(&lookup, "FEE_AMOUNT", &mut self.fee.amount)?;
        override_parsed(&lookup, "RPC_URL", &mut self.rpc.url)?;
        Ok(())
    }

    /// Check the settings that would make every transfer fail
    pub fn validate(&self) -> Result<(), TransferError> {
        let t = &self.transfer;
        if t.batch_size == 0 || t.batch_size > MAX_BATCH_SIZE {
            return Err(TransferError::FatalConfig(format!(
                "batch_size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, t.batch_size
            )));
        }
        if t.max_retries == 0 {
            return Err(TransferError::FatalConfig(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if t.polling_interval_ms == 0 {
            return Err(TransferError::FatalConfig(
                "polling_interval_ms must be positive".to_string(),
            ));
        }
        if t.confirmation_timeout_ms == 0 {
            return Err(TransferError::FatalConfig(
                "confirmation_timeout_ms must be positive".to_string(),
            ));
        }
        self.rpc.commitment_config()?;
        self.fee.resolve()?;
        Ok(())
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: '{}' ({})", key, raw, e))?;
    }
    Ok(())
}
