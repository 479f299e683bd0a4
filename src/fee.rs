//! Fee scheduling
//!
//! Decides when a fee output is attached to an outgoing transaction, and where
//! it goes. State transitions are pure: every operation takes the current
//! `FeeState` and returns the next one, so a failed exchange can never leave a
//! half-updated state behind.
//!
//! ## Lifecycle
//!
//! ```text
//! initial_state ─► apply_exchange(Success | Failure) ─► decide(send count)
//!                                                        │
//!                         record_fee_sent ◄──────────────┤ fee output included
//!                         record_fee_skipped ◄───────────┘ fee output dropped
//! ```
//!
//! ## Fee deficit
//!
//! A skipped payment adds `fee_amount` to `fee_owed` and reschedules the fee for
//! the very next send; a payment that goes out subtracts `fee_amount` (clamped
//! at zero).
//!
//! ## Overdue fees
//!
//! `decide` only fires on the exact scheduled count. If the send count has
//! already moved past it (several sends between two builds, or a fee build that
//! was never reported back), the next exchange reschedules it: a failed
//! exchange to the following send, a successful one an interval ahead.

use bitcoin::Network;
use serde::{Deserialize, Serialize};

use crate::config::{BritConfig, FeeConfig};
use crate::hardwired::{hardwired_addresses, wallet_index, HARDWIRED_ADDRESSES_VERSION};
use crate::response::MatcherResponse;
use crate::wallet_id::BritWalletId;
use crate::{BritError, Result};

/// Persisted per-wallet fee state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeState {
    /// True while fees go to the bundled fallback list
    pub using_hardwired_addresses: bool,
    pub next_fee_address: String,
    /// Send count at which the next fee is due
    pub next_send_count: u64,
    /// Satoshi per fee payment
    pub fee_amount: u64,
    /// Satoshi of skipped payments still to catch up on
    pub fee_owed: u64,
}

/// Fee decision for a single transaction build
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SendFeeDto {
    pub send_fee_count: Option<u64>,
    pub send_fee_address: Option<String>,
}

impl SendFeeDto {
    /// No fee this time
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_fee_due(&self) -> bool {
        self.send_fee_count.is_some() && self.send_fee_address.is_some()
    }
}

/// Result of the latest Matcher exchange
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Success(MatcherResponse),
    /// The exchange failed; the reason is kept for logging only
    Failure(String),
}

impl From<Result<MatcherResponse>> for ExchangeOutcome {
    fn from(result: Result<MatcherResponse>) -> Self {
        match result {
            Ok(response) => Self::Success(response),
            Err(e) => Self::Failure(e.to_string()),
        }
    }
}

/// Per-wallet fee scheduler
#[derive(Clone, Debug)]
pub struct FeeScheduler {
    wallet_id: BritWalletId,
    config: FeeConfig,
    hardwired: Vec<String>,
}

impl FeeScheduler {
    /// Scheduler using the bundled hardwired addresses encoded for `network`
    pub fn new(wallet_id: BritWalletId, config: FeeConfig, network: Network) -> Result<Self> {
        Self::with_hardwired_addresses(wallet_id, config, hardwired_addresses(network)?)
    }

    /// Scheduler for the configured fee policy and network
    pub fn from_config(wallet_id: BritWalletId, config: &BritConfig) -> Result<Self> {
        Self::new(wallet_id, config.fee, config.network)
    }

    /// Scheduler with a custom fallback list (e.g. for test networks)
    pub fn with_hardwired_addresses(
        wallet_id: BritWalletId,
        config: FeeConfig,
        hardwired: Vec<String>,
    ) -> Result<Self> {
        config.validate()?;
        if hardwired.is_empty() {
            return Err(BritError::invalid_input("hardwired address list is empty"));
        }
        Ok(Self {
            wallet_id,
            config,
            hardwired,
        })
    }

    pub fn config(&self) -> &FeeConfig {
        &self.config
    }

    pub fn hardwired_addresses(&self) -> &[String] {
        &self.hardwired
    }

    fn hardwired_address(&self) -> &str {
        &self.hardwired[wallet_index(&self.wallet_id, self.hardwired.len())]
    }

    /// State for a freshly created wallet: fallback address, first fee after one interval
    pub fn initial_state(&self) -> FeeState {
        FeeState {
            using_hardwired_addresses: true,
            next_fee_address: self.hardwired_address().to_string(),
            next_send_count: self.config.fee_interval,
            fee_amount: self.config.fee_amount_sats,
            fee_owed: 0,
        }
    }

    /// Fold the outcome of a Matcher exchange into the fee state
    ///
    /// A success without any usable address is handled as a failure.
    pub fn apply_exchange(
        &self,
        state: &FeeState,
        current_send_count: u64,
        outcome: &ExchangeOutcome,
    ) -> FeeState {
        match outcome {
            ExchangeOutcome::Success(response) if response.has_addresses() => {
                self.apply_success(state, current_send_count, response)
            }
            ExchangeOutcome::Success(_) => {
                log::warn!(
                    "Matcher returned no usable fee address for wallet {}",
                    self.wallet_id
                );
                self.apply_failure(state, current_send_count)
            }
            ExchangeOutcome::Failure(reason) => {
                log::warn!(
                    "Matcher exchange failed for wallet {}: {}",
                    self.wallet_id,
                    reason
                );
                self.apply_failure(state, current_send_count)
            }
        }
    }

    fn apply_success(
        &self,
        state: &FeeState,
        current_send_count: u64,
        response: &MatcherResponse,
    ) -> FeeState {
        let addresses = response.addresses();
        let index = wallet_index(&self.wallet_id, addresses.len());
        let next_fee_address = addresses
            .iter()
            .nth(index)
            .cloned()
            .unwrap_or_default();

        let next_send_count = current_send_count
            .saturating_add(self.config.fee_interval)
            .max(state.next_send_count);

        log::info!(
            "Using Matcher fee address for wallet {}, next fee at send {}",
            self.wallet_id,
            next_send_count
        );

        FeeState {
            using_hardwired_addresses: false,
            next_fee_address,
            next_send_count,
            fee_amount: self.config.fee_amount_sats,
            fee_owed: state.fee_owed,
        }
    }

    fn apply_failure(&self, state: &FeeState, current_send_count: u64) -> FeeState {
        log::info!(
            "Falling back to hardwired fee addresses (list v{}) for wallet {}",
            HARDWIRED_ADDRESSES_VERSION,
            self.wallet_id
        );

        let next_send_count = if state.next_send_count < current_send_count {
            log::info!(
                "Fee scheduled at send {} is overdue, moving it to send {}",
                state.next_send_count,
                current_send_count.saturating_add(1)
            );
            current_send_count.saturating_add(1)
        } else {
            state.next_send_count
        };

        FeeState {
            using_hardwired_addresses: true,
            next_fee_address: self.hardwired_address().to_string(),
            next_send_count,
            ..state.clone()
        }
    }

    /// Whether the transaction being built at `current_send_count` carries a fee
    ///
    /// A due fee must be reported back through [`record_fee_sent`](Self::record_fee_sent)
    /// or [`record_fee_skipped`](Self::record_fee_skipped).
    pub fn decide(&self, state: &FeeState, current_send_count: u64) -> SendFeeDto {
        if current_send_count == state.next_send_count {
            log::debug!(
                "Fee of {} sats due at send {} to {}",
                state.fee_amount,
                current_send_count,
                state.next_fee_address
            );
            SendFeeDto {
                send_fee_count: Some(current_send_count),
                send_fee_address: Some(state.next_fee_address.clone()),
            }
        } else {
            SendFeeDto::none()
        }
    }

    /// The scheduled fee was included in a confirmed transaction
    pub fn record_fee_sent(&self, state: &FeeState, current_send_count: u64) -> FeeState {
        FeeState {
            fee_owed: state.fee_owed.saturating_sub(state.fee_amount),
            next_send_count: current_send_count
                .saturating_add(self.config.fee_interval)
                .max(state.next_send_count),
            ..state.clone()
        }
    }

    /// The scheduled fee was left out; owe it and retry on the next send
    pub fn record_fee_skipped(&self, state: &FeeState, current_send_count: u64) -> FeeState {
        log::info!(
            "Fee skipped at send {} for wallet {}, owed now {} sats",
            current_send_count,
            self.wallet_id,
            state.fee_owed.saturating_add(state.fee_amount)
        );
        FeeState {
            fee_owed: state.fee_owed.saturating_add(state.fee_amount),
            next_send_count: current_send_count
                .saturating_add(1)
                .max(state.next_send_count),
            ..state.clone()
        }
    }
}
