//! Shared helpers for BRIT integration tests
#![allow(dead_code)]

use std::sync::Arc;

use bitcoin::Network;
use brit::{AddressGenerator, Matcher, MatcherConfig, MatcherKeyPair, MemoryEncounterStore};
use chrono::{DateTime, Utc};

/// Generator seed of the test Matcher
pub const MATCHER_SEED: &[u8] = b"brit integration test matcher seed";

/// Wallet seed used by the end-to-end scenario
pub const WALLET_SEED: &[u8] = b"correct horse battery staple";

pub fn init_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

pub fn millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).expect("Valid timestamp")
}

/// Matcher with a fixed generator seed and a fresh in-memory encounter store
pub fn test_matcher(network: Network) -> (Matcher, Arc<MemoryEncounterStore>) {
    let store = Arc::new(MemoryEncounterStore::new());
    let matcher = Matcher::new(
        MatcherKeyPair::generate(),
        AddressGenerator::new(MATCHER_SEED).expect("Valid generator seed"),
        MatcherConfig {
            network,
            ..Default::default()
        },
        store.clone(),
    )
    .expect("Valid matcher config");
    (matcher, store)
}
