//! End-to-End Payer/Matcher Tests
//!
//! Full flow: wallet seed → wallet id → encrypted request → Matcher → encrypted
//! response → fee schedule → fee decision.
//!
//! Run with: cargo test --test end_to_end_test -- --nocapture

mod common;

use std::sync::Arc;

use bitcoin::Network;
use brit::{
    AddressGenerator, BritError, BritWalletId, EncounterDateStore, EncryptedMatcherResponse,
    EncryptedPayerRequest, ExchangeOutcome, FeeConfig, FeeScheduler, MatcherKeyPair,
    MatcherTransport, MemoryEncounterStore, Payer, Storage,
};
use common::{init_logger, millis, test_matcher, MATCHER_SEED, WALLET_SEED};
use tempfile::TempDir;

/// Transport that never reaches a Matcher
struct OfflineTransport;

impl MatcherTransport for OfflineTransport {
    fn exchange(&self, _: &EncryptedPayerRequest) -> brit::Result<EncryptedMatcherResponse> {
        Err(BritError::Transport("timed out".to_string()))
    }
}

// ============================================================================
// Test 1: Seed to Fee Decision
// ============================================================================

#[test]
fn test_seed_to_fee_decision() {
    init_logger();

    // Step 1: Wallet identity and Payer
    let wallet_id = BritWalletId::derive(WALLET_SEED).expect("Wallet id derives");
    let (matcher, _) = test_matcher(Network::Bitcoin);
    let payer = Payer::new(wallet_id, matcher.public_key(), Network::Bitcoin);

    // Step 2: One round trip, inside the first rotation period (indices 0 and 1)
    let pending = payer.begin_exchange(None).expect("Request encrypts");
    let encrypted_response = matcher
        .process_at(pending.encrypted_request(), millis(3_600_000))
        .expect("Matcher answers");
    let response = pending
        .complete(&encrypted_response)
        .expect("Response decrypts");
    assert_eq!(response.addresses().len(), 2);
    assert_eq!(response.replay_date(), Some(&millis(3_600_000)));

    // Step 3: Fee schedule
    let scheduler =
        FeeScheduler::new(wallet_id, FeeConfig::new(3, 1_000).unwrap(), Network::Bitcoin).unwrap();
    let state = scheduler.apply_exchange(
        &scheduler.initial_state(),
        0,
        &ExchangeOutcome::Success(response),
    );
    assert!(!state.using_hardwired_addresses);

    // Step 4: Fee decision at the scheduled send
    let fee = scheduler.decide(&state, state.next_send_count);
    assert!(fee.is_fee_due());
    assert_eq!(fee.send_fee_count, Some(state.next_send_count));

    let generator = AddressGenerator::new(MATCHER_SEED).unwrap();
    let expected = [
        generator.create_address(0, Network::Bitcoin).unwrap().to_string(),
        generator.create_address(1, Network::Bitcoin).unwrap().to_string(),
    ];
    let address = fee.send_fee_address.expect("Fee address present");
    assert!(expected.contains(&address), "{} not generated by the Matcher", address);
}

// ============================================================================
// Test 2: Exchange Through a Transport
// ============================================================================

#[test]
fn test_run_exchange_with_in_process_matcher() {
    init_logger();

    let wallet_id = BritWalletId::from_bytes([0x77; 20]);
    let (matcher, matcher_store) = test_matcher(Network::Bitcoin);
    let payer = Payer::new(wallet_id, matcher.public_key(), Network::Bitcoin);
    let first_tx = millis(1_234_000_000_000);

    let outcome = payer.run_exchange(&matcher, Some(first_tx)).unwrap();
    let response = match outcome {
        ExchangeOutcome::Success(response) => response,
        ExchangeOutcome::Failure(reason) => panic!("exchange failed: {}", reason),
    };
    assert_eq!(response.replay_date(), Some(&first_tx));
    assert!(matcher_store.load(&wallet_id).unwrap().is_some());

    // Known wallet: no replay date the second time
    match payer.run_exchange(&matcher, Some(first_tx)).unwrap() {
        ExchangeOutcome::Success(again) => assert!(again.replay_date().is_none()),
        ExchangeOutcome::Failure(reason) => panic!("exchange failed: {}", reason),
    }

    // Payer keeps its own record of the encounter
    let payer_store = MemoryEncounterStore::new();
    let link = payer
        .record_encounter(&payer_store, &response, Some(first_tx), millis(2_000_000_000_000))
        .unwrap();
    assert_eq!(link.encounter_date, Some(first_tx));
    assert_eq!(link.first_transaction_date, Some(first_tx));
}

#[test]
fn test_wrong_matcher_key_falls_back() {
    init_logger();

    let wallet_id = BritWalletId::from_bytes([0x78; 20]);
    let (matcher, _) = test_matcher(Network::Bitcoin);
    let stale_key = MatcherKeyPair::generate().public_key();
    let payer = Payer::new(wallet_id, stale_key, Network::Bitcoin);

    let outcome = payer.run_exchange(&matcher, None).unwrap();
    assert!(matches!(outcome, ExchangeOutcome::Failure(_)));

    let scheduler =
        FeeScheduler::new(wallet_id, FeeConfig::default(), Network::Bitcoin).unwrap();
    let state = scheduler.apply_exchange(&scheduler.initial_state(), 0, &outcome);
    assert!(state.using_hardwired_addresses);
    assert!(scheduler.hardwired_addresses().contains(&state.next_fee_address));
}

#[test]
fn test_network_mismatch_yields_no_addresses() {
    let wallet_id = BritWalletId::from_bytes([0x79; 20]);
    let (matcher, _) = test_matcher(Network::Testnet);
    let payer = Payer::new(wallet_id, matcher.public_key(), Network::Bitcoin);

    let outcome = payer.run_exchange(&matcher, None).unwrap();
    let scheduler =
        FeeScheduler::new(wallet_id, FeeConfig::default(), Network::Bitcoin).unwrap();
    let state = scheduler.apply_exchange(&scheduler.initial_state(), 0, &outcome);
    assert!(state.using_hardwired_addresses);
}

// ============================================================================
// Test 3: Offline Wallet Lifecycle With Persistence
// ============================================================================

#[test]
fn test_offline_then_online_with_persisted_state() {
    init_logger();

    let temp_dir = TempDir::new().unwrap();
    let storage = Storage::new_with_base_dir(temp_dir.path().to_path_buf());
    let wallet_id = BritWalletId::from_bytes([0x7a; 20]);
    let scheduler =
        FeeScheduler::new(wallet_id, FeeConfig::new(2, 500).unwrap(), Network::Bitcoin).unwrap();
    let (matcher, _) = test_matcher(Network::Bitcoin);
    let payer = Payer::new(wallet_id, matcher.public_key(), Network::Bitcoin);

    // Offline: fee goes to a hardwired address, and is skipped
    let outcome = payer.run_exchange(&OfflineTransport, None).unwrap();
    let mut state = scheduler.apply_exchange(&scheduler.initial_state(), 0, &outcome);
    assert!(state.using_hardwired_addresses);
    let due_at = state.next_send_count;
    assert!(scheduler.decide(&state, due_at).is_fee_due());
    state = scheduler.record_fee_skipped(&state, due_at);
    storage.save_fee_state(&wallet_id, &state).unwrap();

    // Back online after a restart
    let mut state = storage
        .load_fee_state(&wallet_id)
        .unwrap()
        .expect("Fee state persisted");
    assert_eq!(state.fee_owed, 500);

    let send_count = state.next_send_count;
    let outcome = payer.run_exchange(&matcher, None).unwrap();
    state = scheduler.apply_exchange(&state, send_count, &outcome);
    assert!(!state.using_hardwired_addresses);
    assert_eq!(state.fee_owed, 500);

    let fee = scheduler.decide(&state, state.next_send_count);
    assert!(fee.is_fee_due());
    state = scheduler.record_fee_sent(&state, state.next_send_count);
    assert_eq!(state.fee_owed, 0);
    storage.save_fee_state(&wallet_id, &state).unwrap();
}

// ============================================================================
// Test 4: Concurrent Matcher Use
// ============================================================================

#[test]
fn test_matcher_serves_payers_concurrently() {
    init_logger();

    let (matcher, store) = test_matcher(Network::Bitcoin);
    let matcher = Arc::new(matcher);

    let handles: Vec<_> = (0u8..8)
        .map(|i| {
            let matcher = Arc::clone(&matcher);
            std::thread::spawn(move || {
                let wallet_id = BritWalletId::from_bytes([i; 20]);
                let payer = Payer::new(wallet_id, matcher.public_key(), Network::Bitcoin);
                payer.run_exchange(matcher.as_ref(), None)
            })
        })
        .collect();

    for handle in handles {
        let outcome = handle.join().expect("Thread completes").unwrap();
        assert!(matches!(outcome, ExchangeOutcome::Success(_)));
    }
    assert_eq!(store.len(), 8);
}
