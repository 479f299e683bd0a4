//! Matcher service
//!
//! Decrypts a Payer's request, answers with the fee addresses of the current and
//! next rotation period, and encrypts the answer under the Payer's session key.
//!
//! ## Rotation
//!
//! ```text
//! epoch = (days since 1970-01-01) / rotation_days
//! addresses = [generator(epoch), generator(epoch + 1)]
//! ```
//!
//! Handing out the next period's address too lets a Payer that refreshes late
//! keep paying to a live address across the boundary.
//!
//! ## Replay date
//!
//! The first time a wallet id is seen, the response carries a replay date (the
//! wallet's first transaction date if it sent one, otherwise now) and the encounter
//! is recorded. Known wallets get no replay date. Recording is a single
//! `insert_if_absent`, so racing first requests yield one replay date between them.

use std::sync::Arc;

use bitcoin::Network;
use chrono::{DateTime, Utc};

use crate::address_generator::AddressGenerator;
use crate::config::MatcherConfig;
use crate::keys::{MatcherKeyPair, MatcherPublicKey};
use crate::request::{EncryptedPayerRequest, PayerRequest};
use crate::response::{EncryptedMatcherResponse, MatcherResponse};
use crate::storage::{EncounterDateStore, WalletToEncounterDateLink};
use crate::{BritError, Result};

const SECONDS_PER_DAY: i64 = 86_400;

pub struct Matcher {
    key_pair: MatcherKeyPair,
    generator: AddressGenerator,
    config: MatcherConfig,
    encounters: Arc<dyn EncounterDateStore>,
}

impl Matcher {
    pub fn new(
        key_pair: MatcherKeyPair,
        generator: AddressGenerator,
        config: MatcherConfig,
        encounters: Arc<dyn EncounterDateStore>,
    ) -> Result<Self> {
        config.validate()?;
        log::info!(
            "Matcher ready on {:?}, rotating every {} days",
            config.network,
            config.rotation_days
        );
        Ok(Self {
            key_pair,
            generator,
            config,
            encounters,
        })
    }

    /// Public key Payers encrypt their requests to
    pub fn public_key(&self) -> MatcherPublicKey {
        self.key_pair.public_key()
    }

    pub fn network(&self) -> Network {
        self.config.network
    }

    /// Handle one encrypted request
    pub fn process(&self, request: &EncryptedPayerRequest) -> Result<EncryptedMatcherResponse> {
        self.process_at(request, Utc::now())
    }

    /// [`process`](Self::process) with an explicit clock
    pub fn process_at(
        &self,
        request: &EncryptedPayerRequest,
        now: DateTime<Utc>,
    ) -> Result<EncryptedMatcherResponse> {
        let request = request.decrypt(&self.key_pair)?;
        log::debug!("Processing request from wallet {}", request.wallet_id());

        let response = self.respond(&request, now)?;
        response.encrypt(request.session_key())
    }

    /// Build the plaintext response for a decrypted request
    pub fn respond(&self, request: &PayerRequest, now: DateTime<Utc>) -> Result<MatcherResponse> {
        let replay_date = self.replay_date_for(request, now)?;
        let addresses = self
            .addresses_at(now)?
            .into_iter()
            .map(|address| address.to_string());

        Ok(MatcherResponse::new(replay_date, addresses))
    }

    fn replay_date_for(
        &self,
        request: &PayerRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        let first_transaction_date = request.first_transaction_date().copied();
        let link =
            WalletToEncounterDateLink::new(*request.wallet_id(), Some(now), first_transaction_date);
        if !self.encounters.insert_if_absent(&link)? {
            return Ok(None);
        }
        log::info!("First encounter with wallet {}", request.wallet_id());

        Ok(Some(first_transaction_date.unwrap_or(now)))
    }

    /// Rotation period containing `now`
    pub fn rotation_epoch(&self, now: DateTime<Utc>) -> u64 {
        let days = now.timestamp().div_euclid(SECONDS_PER_DAY).max(0) as u64;
        days / u64::from(self.config.rotation_days)
    }

    /// Current and next fee address at `now`
    pub fn addresses_at(&self, now: DateTime<Utc>) -> Result<Vec<bitcoin::Address>> {
        let epoch = u32::try_from(self.rotation_epoch(now))
            .map_err(|_| BritError::invalid_input("rotation epoch exceeds address index range"))?;
        let addresses = self.generator.create_addresses(epoch, 2, self.config.network)?;
        Ok(addresses.into_iter().map(|(_, address)| address).collect())
    }
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher")
            .field("public_key", &self.key_pair.public_key().to_hex())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryEncounterStore;
    use crate::wallet_id::BritWalletId;

    fn matcher(store: Arc<MemoryEncounterStore>) -> Matcher {
        Matcher::new(
            MatcherKeyPair::generate(),
            AddressGenerator::new(b"matcher unit seed").unwrap(),
            MatcherConfig::default(),
            store,
        )
        .unwrap()
    }

    fn at(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    #[test]
    fn test_epoch_boundaries() {
        let m = matcher(Arc::new(MemoryEncounterStore::new()));
        let day = 86_400_000;
        assert_eq!(m.rotation_epoch(at(0)), 0);
        assert_eq!(m.rotation_epoch(at(7 * day - 1)), 0);
        assert_eq!(m.rotation_epoch(at(7 * day)), 1);
        assert_eq!(m.rotation_epoch(at(-day)), 0);
    }

    #[test]
    fn test_next_period_overlaps() {
        let m = matcher(Arc::new(MemoryEncounterStore::new()));
        let week = 7 * 86_400_000;
        let this_week = m.addresses_at(at(10 * week)).unwrap();
        let next_week = m.addresses_at(at(11 * week)).unwrap();
        assert_eq!(this_week.len(), 2);
        assert_ne!(this_week[0], this_week[1]);
        assert_eq!(this_week[1], next_week[0]);
    }

    #[test]
    fn test_replay_date_only_on_first_contact() {
        let store = Arc::new(MemoryEncounterStore::new());
        let m = matcher(store.clone());
        let id = BritWalletId::from_bytes([6u8; 20]);
        let first_tx = at(1_300_000_000_000);
        let request = PayerRequest::new(id, Some(first_tx));

        let first = m.respond(&request, at(1_400_000_000_000)).unwrap();
        assert_eq!(first.replay_date(), Some(&first_tx));

        let second = m.respond(&request, at(1_400_000_100_000)).unwrap();
        assert_eq!(second.replay_date(), None);

        let link = store.load(&id).unwrap().unwrap();
        assert_eq!(link.encounter_date, Some(at(1_400_000_000_000)));
        assert_eq!(link.first_transaction_date, Some(first_tx));
    }

    #[test]
    fn test_concurrent_first_contact_replays_once() {
        let m = Arc::new(matcher(Arc::new(MemoryEncounterStore::new())));
        let request = Arc::new(PayerRequest::new(BritWalletId::from_bytes([9u8; 20]), None));
        let threads = 8;
        let barrier = Arc::new(std::sync::Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let (m, request, barrier) = (m.clone(), request.clone(), barrier.clone());
                std::thread::spawn(move || {
                    barrier.wait();
                    m.respond(&request, at(1_600_000_000_000)).unwrap()
                })
            })
            .collect();

        let replays = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|response| response.replay_date().is_some())
            .count();
        assert_eq!(replays, 1);
    }

    #[test]
    fn test_unknown_first_transaction_replays_from_now() {
        let m = matcher(Arc::new(MemoryEncounterStore::new()));
        let now = at(1_500_000_000_000);
        let request = PayerRequest::new(BritWalletId::from_bytes([7u8; 20]), None);
        assert_eq!(m.respond(&request, now).unwrap().replay_date(), Some(&now));
    }

    #[test]
    fn test_foreign_ciphertext_rejected() {
        let m = matcher(Arc::new(MemoryEncounterStore::new()));
        let other = MatcherKeyPair::generate();
        let request = PayerRequest::new(BritWalletId::from_bytes([8u8; 20]), None)
            .encrypt(&other.public_key())
            .unwrap();
        assert!(m.process(&request).is_err());
    }
}
