//! Fee Scheduler Integration Tests
//!
//! Exercises the fee state machine: scheduling, debt accounting for skipped
//! fees, and the switch between Matcher and hardwired addresses.
//!
//! Run with: cargo test --test fee_scheduler_test -- --nocapture

mod common;

use std::str::FromStr;

use bitcoin::{Address, Network};
use brit::crypto::generate_session_key;
use brit::hardwired::hardwired_addresses;
use brit::{
    BritWalletId, EncryptedMatcherResponse, ExchangeOutcome, FeeConfig, FeeScheduler, FeeState,
    MatcherResponse,
};
use common::{init_logger, test_matcher};

const FEE_AMOUNT: u64 = 2_500;
const FEE_INTERVAL: u64 = 4;

// ============================================================================
// Helper Functions
// ============================================================================

fn scheduler() -> FeeScheduler {
    FeeScheduler::new(
        BritWalletId::from_bytes([0x42; 20]),
        FeeConfig::new(FEE_INTERVAL, FEE_AMOUNT).expect("Valid fee config"),
        Network::Bitcoin,
    )
    .expect("Valid scheduler")
}

fn matcher_response() -> MatcherResponse {
    let (matcher, _) = test_matcher(Network::Bitcoin);
    let addresses = matcher
        .addresses_at(common::millis(0))
        .expect("Addresses derive");
    MatcherResponse::new(None, addresses.iter().map(|a| a.to_string()))
}

fn is_hardwired(address: &str) -> bool {
    hardwired_addresses(Network::Bitcoin)
        .expect("Hardwired list derives")
        .iter()
        .any(|a| a == address)
}

// ============================================================================
// Test 1: Skipped Fees Accumulate
// ============================================================================

#[test]
fn test_skipped_fees_accumulate_debt() {
    init_logger();

    let s = scheduler();
    let mut state = s.initial_state();
    assert_eq!(state.fee_owed, 0);
    assert_eq!(state.fee_amount, FEE_AMOUNT);

    let mut send_count = 0;
    let mut skipped = 0;
    while skipped < 7 {
        send_count += 1;
        if s.decide(&state, send_count).is_fee_due() {
            state = s.record_fee_skipped(&state, send_count);
            skipped += 1;
            assert_eq!(state.fee_owed, skipped * FEE_AMOUNT);
        }
    }
    assert_eq!(state.fee_owed, 7 * FEE_AMOUNT);

    // Consecutive: after the first scheduled fee, every send was due
    assert_eq!(send_count, FEE_INTERVAL + 6);
}

#[test]
fn test_debt_never_negative() {
    let s = scheduler();
    let mut state = s.initial_state();

    state = s.record_fee_skipped(&state, state.next_send_count);
    for _ in 0..3 {
        let due_at = state.next_send_count;
        assert!(s.decide(&state, due_at).is_fee_due());
        state = s.record_fee_sent(&state, due_at);
    }
    assert_eq!(state.fee_owed, 0);
}

#[test]
fn test_fee_due_only_at_scheduled_count() {
    let s = scheduler();
    let state = s.initial_state();

    let due: Vec<u64> = (0..=3 * FEE_INTERVAL)
        .filter(|n| s.decide(&state, *n).is_fee_due())
        .collect();
    assert_eq!(due, vec![FEE_INTERVAL]);
}

// ============================================================================
// Test 2: Hardwired Fallback
// ============================================================================

#[test]
fn test_failure_then_success_switches_address_source() {
    init_logger();

    let s = scheduler();
    let initial = s.initial_state();

    let matched = s.apply_exchange(&initial, 1, &ExchangeOutcome::Success(matcher_response()));
    assert!(!matched.using_hardwired_addresses);
    assert!(!is_hardwired(&matched.next_fee_address));

    let failed = s.apply_exchange(
        &matched,
        2,
        &ExchangeOutcome::Failure("connection refused".to_string()),
    );
    assert!(failed.using_hardwired_addresses);
    assert!(is_hardwired(&failed.next_fee_address));

    let recovered = s.apply_exchange(&failed, 3, &ExchangeOutcome::Success(matcher_response()));
    assert!(!recovered.using_hardwired_addresses);
    assert_eq!(recovered.next_fee_address, matched.next_fee_address);
}

#[test]
fn test_failure_keeps_debt() {
    let s = scheduler();
    let mut state = s.initial_state();
    state = s.record_fee_skipped(&state, state.next_send_count);
    state = s.record_fee_skipped(&state, state.next_send_count);

    let before_due = state.next_send_count - 1;
    let failed = s.apply_exchange(&state, before_due, &ExchangeOutcome::Failure("timeout".into()));
    assert_eq!(failed.fee_owed, 2 * FEE_AMOUNT);
    assert_eq!(failed.next_send_count, state.next_send_count);
}

#[test]
fn test_tampered_response_falls_back_whole() {
    let s = scheduler();
    let state = FeeState {
        using_hardwired_addresses: false,
        next_fee_address: "previous".to_string(),
        next_send_count: 20,
        fee_amount: FEE_AMOUNT,
        fee_owed: 0,
    };

    let key = generate_session_key();
    let mut bytes = matcher_response().encrypt(&key).unwrap().into_bytes();
    bytes[20] ^= 0xff;
    let outcome: ExchangeOutcome = EncryptedMatcherResponse::from(bytes)
        .decrypt(&key, Network::Bitcoin)
        .into();

    let next = s.apply_exchange(&state, 18, &outcome);
    assert!(next.using_hardwired_addresses);
    assert!(is_hardwired(&next.next_fee_address));
    assert_eq!(next.next_send_count, 20);
    assert_eq!(next.fee_amount, FEE_AMOUNT);
}

#[test]
fn test_matcher_address_selection_is_stable() {
    let s = scheduler();
    let state = s.initial_state();
    let a = s.apply_exchange(&state, 0, &ExchangeOutcome::Success(matcher_response()));
    let b = s.apply_exchange(&state, 0, &ExchangeOutcome::Success(matcher_response()));
    assert_eq!(a, b);
}

// ============================================================================
// Test 3: Offline Wallets Keep Paying
// ============================================================================

#[test]
fn test_offline_wallet_fees_not_stalled_by_count_jumps() {
    init_logger();

    let s = scheduler();
    let mut state = s.initial_state();
    let mut due = 0;

    // Every build happens after a failed refresh; the first one already
    // overshoots the scheduled count and no fee is ever reported back
    for send_count in (FEE_INTERVAL + 1)..200 {
        state = s.apply_exchange(&state, send_count, &ExchangeOutcome::Failure("offline".into()));
        if s.decide(&state, send_count).is_fee_due() {
            due += 1;
        }
    }

    assert!(due > 0, "no fee became due after the schedule was overshot");
    assert!(state.next_send_count >= 199);
}

#[test]
fn test_fallback_address_matches_wallet_network() {
    for network in [Network::Testnet, Network::Signet, Network::Regtest] {
        let s = FeeScheduler::new(
            BritWalletId::from_bytes([0x43; 20]),
            FeeConfig::default(),
            network,
        )
        .unwrap();
        let state = s.apply_exchange(
            &s.initial_state(),
            0,
            &ExchangeOutcome::Failure("offline".into()),
        );

        let address = Address::from_str(&state.next_fee_address).unwrap();
        assert!(
            address.require_network(network).is_ok(),
            "{} is not a {:?} address",
            state.next_fee_address,
            network
        );
    }
}
