//! BRIT: Bitcoin Rich Interactive Transactions
//!
//! Client-side development fees for a Bitcoin wallet. A wallet (the Payer)
//! periodically asks a fee service (the Matcher) for the addresses fees should go
//! to, over an end-to-end encrypted request/response exchange, and attaches a fee
//! output to every N-th outgoing transaction.
//!
//! # Architecture
//!
//! - **Wallet id**: a one-way 20-byte identifier derived from the wallet seed
//! - **Protocol**: hybrid-encrypted `PayerRequest`, session-key-encrypted `MatcherResponse`
//! - **Matcher**: deterministic per-period fee addresses from a secret seed
//! - **Fee scheduler**: pure state machine deciding when and where a fee is paid,
//!   falling back to a bundled address list whenever the Matcher is unreachable
//!
//! # Example
//!
//! ```ignore
//! use brit::{BritConfig, BritWalletId, FeeScheduler, Payer};
//!
//! let wallet_id = BritWalletId::derive(&seed)?;
//! let config = BritConfig::from_env();
//! let payer = Payer::from_config(wallet_id, &config)?;
//! let scheduler = FeeScheduler::from_config(wallet_id, &config)?;
//!
//! let outcome = payer.run_exchange(&transport, first_tx_date)?;
//! let state = scheduler.apply_exchange(&state, send_count, &outcome);
//!
//! let fee = scheduler.decide(&state, send_count);
//! if fee.is_fee_due() {
//!     // add an output of state.fee_amount to fee.send_fee_address
//! }
//! ```

// Public modules
pub mod address_generator;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod fee;
pub mod hardwired;
pub mod keys;
pub mod matcher;
pub mod payer;
pub mod request;
pub mod response;
pub mod storage;
pub mod wallet_id;

// Re-exports for convenience
pub use address_generator::AddressGenerator;
pub use config::{BritConfig, FeeConfig, MatcherConfig};
pub use error::{BritError, StorageError};
pub use fee::{ExchangeOutcome, FeeScheduler, FeeState, SendFeeDto};
pub use hardwired::{hardwired_addresses, select_hardwired_address, HARDWIRED_ADDRESSES_VERSION};
pub use keys::{MatcherKeyPair, MatcherPublicKey};
pub use matcher::Matcher;
pub use payer::{ExchangeGuard, ExchangeLocks, MatcherTransport, Payer, PendingExchange};
pub use request::{EncryptedPayerRequest, PayerRequest};
pub use response::{EncryptedMatcherResponse, MatcherResponse};
pub use storage::{EncounterDateStore, MemoryEncounterStore, Storage, WalletToEncounterDateLink};
pub use wallet_id::BritWalletId;

/// Result type for BRIT operations
pub type Result<T> = std::result::Result<T, BritError>;
