//! BRIT configuration from environment variables
//!
//! Controls the Bitcoin network, the fee policy handed to the fee scheduler,
//! and where wallet-local BRIT state is stored.

use std::env;
use std::path::PathBuf;

use bitcoin::Network;

use crate::{BritError, Result};

const DEFAULT_FEE_INTERVAL: u64 = 10;
const DEFAULT_FEE_AMOUNT_SATS: u64 = 10_000;
const DEFAULT_ROTATION_DAYS: u32 = 7;

/// Fee policy: how often and how much
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeConfig {
    /// Outgoing transactions between two fee payments
    pub fee_interval: u64,
    /// Fee paid per scheduled payment, in satoshi
    pub fee_amount_sats: u64,
}

impl FeeConfig {
    pub fn new(fee_interval: u64, fee_amount_sats: u64) -> Result<Self> {
        let config = Self {
            fee_interval,
            fee_amount_sats,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fee_interval == 0 {
            return Err(BritError::invalid_input("fee interval must be at least 1"));
        }
        Ok(())
    }
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            fee_interval: DEFAULT_FEE_INTERVAL,
            fee_amount_sats: DEFAULT_FEE_AMOUNT_SATS,
        }
    }
}

/// Matcher-side settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatcherConfig {
    /// Network the fee addresses are encoded for
    pub network: Network,
    /// Days before the Matcher moves on to the next fee address
    pub rotation_days: u32,
}

impl MatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.rotation_days == 0 {
            return Err(BritError::invalid_input("rotation period must be at least 1 day"));
        }
        Ok(())
    }
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            network: Network::Bitcoin,
            rotation_days: DEFAULT_ROTATION_DAYS,
        }
    }
}

/// Payer-side settings
#[derive(Clone, Debug)]
pub struct BritConfig {
    /// Network used to validate fee addresses
    pub network: Network,
    /// Fee policy
    pub fee: FeeConfig,
    /// Directory holding fee state and encounter records
    pub data_dir: PathBuf,
    /// Armored Matcher public key file, if configured
    pub matcher_public_key_path: Option<PathBuf>,
}

impl BritConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `BRIT_NETWORK`: "bitcoin" (default), "testnet", "signet" or "regtest"
    /// - `BRIT_FEE_INTERVAL`: sends between fee payments (default 10)
    /// - `BRIT_FEE_AMOUNT_SATS`: fee per payment in satoshi (default 10000)
    /// - `BRIT_DATA_DIR`: state directory (default `./brit`)
    /// - `BRIT_MATCHER_PUBLIC_KEY`: path to the Matcher public key file (optional)
    pub fn from_env() -> Self {
        let network = parse_network(
            &env::var("BRIT_NETWORK").unwrap_or_else(|_| "bitcoin".to_string()),
        );

        let defaults = FeeConfig::default();
        let mut fee = FeeConfig {
            fee_interval: parse_u64_var("BRIT_FEE_INTERVAL", defaults.fee_interval),
            fee_amount_sats: parse_u64_var("BRIT_FEE_AMOUNT_SATS", defaults.fee_amount_sats),
        };
        if fee.fee_interval == 0 {
            log::warn!("BRIT_FEE_INTERVAL must be positive, using {}", defaults.fee_interval);
            fee.fee_interval = defaults.fee_interval;
        }
        log::info!(
            "Fee policy: {} sats every {} sends",
            fee.fee_amount_sats,
            fee.fee_interval
        );

        let data_dir = env::var("BRIT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./brit"));
        log::info!("BRIT data directory: {}", data_dir.display());

        let matcher_public_key_path = env::var("BRIT_MATCHER_PUBLIC_KEY").ok().map(PathBuf::from);
        if let Some(ref path) = matcher_public_key_path {
            log::info!("Matcher public key: {}", path.display());
        }

        Self {
            network,
            fee,
            data_dir,
            matcher_public_key_path,
        }
    }
}

impl Default for BritConfig {
    fn default() -> Self {
        Self {
            network: Network::Bitcoin,
            fee: FeeConfig::default(),
            data_dir: PathBuf::from("./brit"),
            matcher_public_key_path: None,
        }
    }
}

/// Map a network name to a `bitcoin::Network`, defaulting to mainnet
pub fn parse_network(name: &str) -> Network {
    match name.trim().to_lowercase().as_str() {
        "bitcoin" | "mainnet" | "" => Network::Bitcoin,
        "testnet" => Network::Testnet,
        "signet" => Network::Signet,
        "regtest" => Network::Regtest,
        other => {
            log::warn!("Unknown network '{}', defaulting to bitcoin", other);
            Network::Bitcoin
        }
    }
}

fn parse_u64_var(name: &str, default: u64) -> u64 {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("Ignoring unparseable {}='{}', using {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}
