//! Payer-side exchange driver
//!
//! One exchange is a single blocking round trip:
//!
//! ```text
//! Idle ─► RequestBuilt ─► Sent ─► ResponseReceived ─► Applied
//!              │            │             │
//!              └────────────┴─────────────┴──► Failed
//! ```
//!
//! `Applied` and `Failed` are both terminal and are reported to the caller as an
//! [`ExchangeOutcome`]; the fee scheduler turns `Failed` into the hardwired
//! fallback. The session key lives only inside [`PendingExchange`] and is wiped
//! when it is dropped.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use bitcoin::Network;
use chrono::{DateTime, Utc};

use crate::config::BritConfig;
use crate::fee::ExchangeOutcome;
use crate::keys::MatcherPublicKey;
use crate::matcher::Matcher;
use crate::request::{EncryptedPayerRequest, PayerRequest};
use crate::response::{EncryptedMatcherResponse, MatcherResponse};
use crate::storage::{EncounterDateStore, WalletToEncounterDateLink};
use crate::wallet_id::BritWalletId;
use crate::{BritError, Result};

/// Moves opaque request bytes to a Matcher and brings the response back
///
/// Timeouts and connection problems are reported as [`BritError::Transport`].
pub trait MatcherTransport {
    fn exchange(&self, request: &EncryptedPayerRequest) -> Result<EncryptedMatcherResponse>;
}

/// In-process transport
impl MatcherTransport for Matcher {
    fn exchange(&self, request: &EncryptedPayerRequest) -> Result<EncryptedMatcherResponse> {
        self.process(request)
    }
}

/// Wallet ids with an exchange in flight
#[derive(Clone, Debug, Default)]
pub struct ExchangeLocks {
    in_flight: Arc<Mutex<HashSet<BritWalletId>>>,
}

impl ExchangeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `wallet_id` until the returned guard is dropped
    ///
    /// # Errors
    /// `ExchangeInProgress` if another guard for the same wallet id is alive.
    pub fn try_lock(&self, wallet_id: &BritWalletId) -> Result<ExchangeGuard> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(*wallet_id) {
            return Err(BritError::ExchangeInProgress(wallet_id.to_hex()));
        }
        Ok(ExchangeGuard {
            locks: self.clone(),
            wallet_id: *wallet_id,
        })
    }

    pub fn is_locked(&self, wallet_id: &BritWalletId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(wallet_id)
    }
}

/// Releases the wallet's exchange slot on drop
#[derive(Debug)]
pub struct ExchangeGuard {
    locks: ExchangeLocks,
    wallet_id: BritWalletId,
}

impl Drop for ExchangeGuard {
    fn drop(&mut self) {
        self.locks
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.wallet_id);
    }
}

/// A request that has been built and encrypted, awaiting the Matcher's answer
#[derive(Debug)]
pub struct PendingExchange {
    request: PayerRequest,
    encrypted: EncryptedPayerRequest,
    network: Network,
}

impl PendingExchange {
    /// Bytes to hand to the transport
    pub fn encrypted_request(&self) -> &EncryptedPayerRequest {
        &self.encrypted
    }

    pub fn wallet_id(&self) -> &BritWalletId {
        self.request.wallet_id()
    }

    /// Decrypt and parse the Matcher's answer; consumes the session key
    pub fn complete(self, response: &EncryptedMatcherResponse) -> Result<MatcherResponse> {
        let parsed = response.decrypt(self.request.session_key(), self.network)?;
        log::debug!(
            "Matcher answered wallet {} with {} fee address(es)",
            self.request.wallet_id(),
            parsed.addresses().len()
        );
        Ok(parsed)
    }
}

/// Drives Matcher exchanges for one wallet
#[derive(Debug, Clone)]
pub struct Payer {
    wallet_id: BritWalletId,
    matcher_key: MatcherPublicKey,
    network: Network,
    locks: ExchangeLocks,
}

impl Payer {
    pub fn new(wallet_id: BritWalletId, matcher_key: MatcherPublicKey, network: Network) -> Self {
        Self {
            wallet_id,
            matcher_key,
            network,
            locks: ExchangeLocks::new(),
        }
    }

    /// Payer for the configured network and Matcher public key
    ///
    /// # Errors
    /// `KeyNotFound` if no key path is configured or the key file is missing.
    pub fn from_config(wallet_id: BritWalletId, config: &BritConfig) -> Result<Self> {
        let path = config
            .matcher_public_key_path
            .as_ref()
            .ok_or_else(|| BritError::KeyNotFound("BRIT_MATCHER_PUBLIC_KEY not set".into()))?;
        let matcher_key = MatcherPublicKey::load(path)?;
        Ok(Self::new(wallet_id, matcher_key, config.network))
    }

    /// Share an in-flight registry with other `Payer`s of the same process
    pub fn with_exchange_locks(mut self, locks: ExchangeLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn wallet_id(&self) -> &BritWalletId {
        &self.wallet_id
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn exchange_locks(&self) -> &ExchangeLocks {
        &self.locks
    }

    /// Build and encrypt a request with a fresh session key
    pub fn begin_exchange(
        &self,
        first_transaction_date: Option<DateTime<Utc>>,
    ) -> Result<PendingExchange> {
        let request = PayerRequest::new(self.wallet_id, first_transaction_date);
        let encrypted = request.encrypt(&self.matcher_key)?;
        Ok(PendingExchange {
            request,
            encrypted,
            network: self.network,
        })
    }

    /// Full round trip through `transport`
    ///
    /// Every exchange failure comes back as `Ok(ExchangeOutcome::Failure)`.
    ///
    /// # Errors
    /// `ExchangeInProgress` if this wallet already has an exchange in flight.
    pub fn run_exchange<T: MatcherTransport + ?Sized>(
        &self,
        transport: &T,
        first_transaction_date: Option<DateTime<Utc>>,
    ) -> Result<ExchangeOutcome> {
        let _guard = self.locks.try_lock(&self.wallet_id)?;

        match self.exchange(transport, first_transaction_date) {
            Ok(response) => Ok(ExchangeOutcome::Success(response)),
            Err(e) if e.is_exchange_failure() => {
                log::warn!("Exchange for wallet {} failed: {}", self.wallet_id, e);
                Ok(ExchangeOutcome::Failure(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    fn exchange<T: MatcherTransport + ?Sized>(
        &self,
        transport: &T,
        first_transaction_date: Option<DateTime<Utc>>,
    ) -> Result<MatcherResponse> {
        let pending = self.begin_exchange(first_transaction_date)?;
        log::debug!(
            "Sending {} byte request for wallet {}",
            pending.encrypted_request().as_bytes().len(),
            self.wallet_id
        );
        let response = transport.exchange(pending.encrypted_request())?;
        pending.complete(&response)
    }

    /// Record a successful exchange in the wallet-side encounter store
    ///
    /// Dates already stored are kept; absent ones are filled from the Matcher's
    /// replay date (or `now`) and the wallet's first transaction date.
    pub fn record_encounter(
        &self,
        store: &dyn EncounterDateStore,
        response: &MatcherResponse,
        first_transaction_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<WalletToEncounterDateLink> {
        let existing = store.load(&self.wallet_id)?;
        let (stored_encounter, stored_first_tx) = existing
            .map(|link| (link.encounter_date, link.first_transaction_date))
            .unwrap_or((None, None));

        let link = WalletToEncounterDateLink::new(
            self.wallet_id,
            stored_encounter
                .or_else(|| response.replay_date().copied())
                .or(Some(now)),
            stored_first_tx.or(first_transaction_date),
        );
        store.save(&link)?;
        Ok(link)
    }
}
