mod common;

use std::{
    sync::{atomic::Ordering, Arc},
    time::Duration,
};

use alloy::{
    primitives::{address, Address, U256},
    signers::local::PrivateKeySigner,
    sol_types::SolCall,
};
use bridge_smith::{
    bridge::{
        quote::QuoteError,
        routes::{depositETHCall, withdrawCall, L1_STANDARD_BRIDGE, L2_STANDARD_BRIDGE},
        BridgeOrchestrator,
    },
    chain::RpcFailure,
    config::Settings,
    proxy::ProxyPool,
    types::{Direction, OperationOutcome},
    wallet::WalletSession,
};
use common::*;
use serde_json::{json, Value};
use tokio::time::Instant;

const ACROSS_POOL: Address = address!("5c7BCd6E7De5423a257D81B442095A1a6ced35C5");

struct Harness {
    home: Arc<MockRpc>,
    companion: Arc<MockRpc>,
    quotes: Arc<MockQuotes>,
    session: WalletSession,
    orchestrator: BridgeOrchestrator,
}

fn harness(overrides: Value, quotes: Vec<Result<Value, QuoteError>>) -> Harness {
    let settings: Settings = settings(overrides);
    let home = MockRpc::new();
    let companion = MockRpc::new();
    let connector = MockConnector::new(home.clone(), companion.clone());
    let quotes = MockQuotes::new(quotes);
    let session = WalletSession::new(
        PrivateKeySigner::random(),
        &settings,
        Arc::new(ProxyPool::disabled()),
        connector,
    )
    .unwrap();
    let orchestrator = BridgeOrchestrator::new(settings.bridge.clone(), quotes.clone());
    Harness {
        home,
        companion,
        quotes,
        session,
        orchestrator,
    }
}

fn assert_bridge_amount(value: U256) {
    assert!(value >= eth(0.0001) && value <= eth(0.0004), "amount {}", value);
}

#[tokio::test(start_paused = true)]
async fn test_home_to_companion_settles_when_balance_rises() {
    let mut h = harness(json!({}), vec![Ok(quote_body("Across", ACROSS_POOL))]);
    h.companion.push_balance(Ok(eth(0.1)));
    h.companion.push_balance(Ok(eth(0.1)));
    h.companion.push_balance(Ok(eth(0.1002)));

    let start = Instant::now();
    let outcome = h
        .orchestrator
        .bridge(&mut h.session, Direction::HomeToCompanion)
        .await;

    assert!(matches!(outcome, OperationOutcome::Completed { settled: true, .. }));
    assert_eq!(start.elapsed(), Duration::from_secs(60));

    let sent = h.home.sent_transactions();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, Some(ACROSS_POOL.into()));
    assert_eq!(&sent[0].input.input().unwrap()[..], &[0xab, 0xcd, 0xef, 0x01]);
    assert_bridge_amount(sent[0].value.unwrap());
    assert!(h.companion.sent_transactions().is_empty());

    let requests = h.quotes.requests.lock();
    let request = &requests[0];
    assert_eq!(request.from_chain_id, HOME_CHAIN_ID.to_string());
    assert_eq!(request.to_chain_id, COMPANION_CHAIN_ID.to_string());
    assert_eq!(request.sender, h.session.address());
    assert_eq!(request.recipient, h.session.address());
    assert_eq!(request.amount, sent[0].value.unwrap().to_string());
    assert!(!request.force_via_l1);
}

#[tokio::test(start_paused = true)]
async fn test_settlement_timeout_still_reports_success() {
    let mut h = harness(json!({}), vec![Ok(quote_body("Across", ACROSS_POOL))]);
    h.companion.set_balance(eth(0.1));

    let start = Instant::now();
    let outcome = h
        .orchestrator
        .bridge(&mut h.session, Direction::HomeToCompanion)
        .await;

    assert!(outcome.is_success());
    assert!(matches!(outcome, OperationOutcome::Completed { settled: false, .. }));
    assert_eq!(start.elapsed(), Duration::from_secs(20 * 30));
    // one baseline read plus twenty polls
    assert_eq!(h.companion.balance_calls.load(Ordering::SeqCst), 21);
}

#[tokio::test(start_paused = true)]
async fn test_failed_baseline_read_does_not_count_as_settled() {
    let mut h = harness(json!({}), vec![Ok(quote_body("Across", ACROSS_POOL))]);
    // preflight destination read fails, the balance itself never moves
    h.companion
        .push_balance(Err(RpcFailure::new("header not found")));
    h.companion.set_balance(eth(1.0));

    let outcome = h
        .orchestrator
        .bridge(&mut h.session, Direction::HomeToCompanion)
        .await;

    assert!(matches!(outcome, OperationOutcome::Completed { settled: false, .. }));
    assert_eq!(h.companion.balance_calls.load(Ordering::SeqCst), 21);
}

#[tokio::test(start_paused = true)]
async fn test_first_poll_becomes_baseline_after_failed_read() {
    let mut h = harness(json!({}), vec![Ok(quote_body("Across", ACROSS_POOL))]);
    h.companion
        .push_balance(Err(RpcFailure::new("header not found")));
    h.companion.push_balance(Ok(eth(1.0)));
    h.companion.push_balance(Ok(eth(1.0)));
    h.companion.push_balance(Ok(eth(1.0003)));

    let start = Instant::now();
    let outcome = h
        .orchestrator
        .bridge(&mut h.session, Direction::HomeToCompanion)
        .await;

    assert!(matches!(outcome, OperationOutcome::Completed { settled: true, .. }));
    assert_eq!(start.elapsed(), Duration::from_secs(90));
}

#[tokio::test(start_paused = true)]
async fn test_missing_route_id_uses_fallback() {
    let mut h = harness(json!({}), vec![Ok(quote_body("Hop", ACROSS_POOL))]);
    h.companion.push_balance(Ok(eth(0.1)));
    h.companion.push_balance(Ok(eth(0.2)));

    let outcome = h
        .orchestrator
        .bridge(&mut h.session, Direction::HomeToCompanion)
        .await;
    assert!(outcome.is_success());
    assert_eq!(h.quotes.calls(), 2);

    let sent = h.home.sent_transactions();
    assert_eq!(sent[0].to, Some(L1_STANDARD_BRIDGE.into()));
    let data = sent[0].input.input().unwrap();
    assert_eq!(&data[..4], depositETHCall::SELECTOR.as_slice());
    assert_bridge_amount(sent[0].value.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_quote_failures_fall_back_after_one_retry() {
    let mut h = harness(json!({}), vec![Err(QuoteError::Status(500))]);

    let start = Instant::now();
    let outcome = h
        .orchestrator
        .bridge(&mut h.session, Direction::CompanionToHome)
        .await;

    assert!(matches!(outcome, OperationOutcome::Completed { settled: true, .. }));
    assert_eq!(h.quotes.calls(), 2);
    assert_eq!(start.elapsed(), Duration::ZERO);

    let sent = h.companion.sent_transactions();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, Some(L2_STANDARD_BRIDGE.into()));
    let call = withdrawCall::abi_decode(sent[0].input.input().unwrap(), true).unwrap();
    assert_eq!(call._amount, sent[0].value.unwrap());
    // companion → home never polls
    assert_eq!(h.home.balance_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_insufficient_balance_stops_before_routing() {
    let mut h = harness(json!({}), vec![Ok(quote_body("Across", ACROSS_POOL))]);
    h.home.set_balance(eth(0.00001));

    let outcome = h
        .orchestrator
        .bridge(&mut h.session, Direction::HomeToCompanion)
        .await;

    assert!(matches!(outcome, OperationOutcome::Failed(ref msg) if msg.contains("insufficient balance")));
    assert_eq!(h.quotes.calls(), 0);
    assert!(h.home.sent_transactions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_submission_failure_is_reported() {
    let mut h = harness(json!({}), vec![Ok(quote_body("OptimismDeposit", ACROSS_POOL))]);
    h.companion
        .push_send_failure("insufficient funds for gas * price + value");

    let outcome = h
        .orchestrator
        .bridge(&mut h.session, Direction::CompanionToHome)
        .await;

    assert!(matches!(outcome, OperationOutcome::Failed(ref msg) if msg.starts_with("INSUFFICIENT_FUNDS")));
}

#[tokio::test(start_paused = true)]
async fn test_disabled_direction_is_skipped() {
    let mut h = harness(
        json!({ "bridge": { "companion_to_home": false } }),
        vec![Ok(quote_body("OptimismDeposit", ACROSS_POOL))],
    );

    let outcome = h
        .orchestrator
        .bridge(&mut h.session, Direction::CompanionToHome)
        .await;

    assert!(matches!(outcome, OperationOutcome::Skipped(_)));
    assert_eq!(h.companion.balance_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_batch_tallies_with_cooldowns() {
    let mut h = harness(
        json!({ "bridge": { "repeat_times": 2, "poll_attempts": 1 } }),
        vec![Ok(quote_body("Across", ACROSS_POOL))],
    );
    h.home.set_nonce(7);
    h.companion.set_nonce(3);
    // first companion → home submission is rejected
    h.companion.push_send_failure("insufficient funds for gas * price + value");

    let start = Instant::now();
    let summary = h.orchestrator.run_batch(&mut h.session).await;

    assert_eq!(summary.total_operations, 4);
    assert_eq!(summary.success_count, 3);
    assert!(summary.succeeded());
    assert_eq!(summary.to_string(), "3/4");
    // three cooldowns between four operations, one 30 s poll per home → companion
    assert_eq!(start.elapsed(), Duration::from_secs(3 * 60 + 2 * 30));

    assert_eq!(h.home.sent_nonces(), vec![Some(7), Some(8)]);
    assert_eq!(h.companion.sent_nonces(), vec![Some(3), Some(4)]);
    assert_eq!(h.home.count_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_batch_fails_when_nothing_succeeds() {
    let mut h = harness(
        json!({ "bridge": { "home_to_companion": false } }),
        vec![Ok(quote_body("OptimismDeposit", ACROSS_POOL))],
    );
    h.companion.set_balance(U256::ZERO);

    let summary = h.orchestrator.run_batch(&mut h.session).await;
    assert_eq!(summary.total_operations, 1);
    assert!(!summary.succeeded());
}

#[tokio::test(start_paused = true)]
async fn test_batch_resets_cached_nonces() {
    let mut h = harness(
        json!({ "bridge": { "home_to_companion": false } }),
        vec![Ok(quote_body("OptimismDeposit", ACROSS_POOL))],
    );
    h.companion.set_nonce(1);
    h.orchestrator.run_batch(&mut h.session).await;
    // another process moved the account forward
    h.companion.set_nonce(9);
    h.orchestrator.run_batch(&mut h.session).await;

    assert_eq!(h.companion.sent_nonces(), vec![Some(1), Some(9)]);
}
