//! Integration tests exercising the full pipeline:
//! broker payload → gateway → store + fanout → reward workers → chain node.
//!
//! The node is wired with the in-memory store (or LMDB on a temp dir) and the
//! scripted chain node, so nothing leaves the process.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use srt_ledger::{ChainRpc, RewardAttempt, RewardOutcome, SessionState, UnavailableReason};
use srt_node::{IngestOutcome, NodeConfig, NodeError, RewardScheduling, SensorNode};
use srt_nullables::{NullChainNode, NullTelemetryStore};
use srt_store::{ReadingFilter, ReadingQuery, TelemetryStore};
use srt_store_lmdb::{environment::DEFAULT_MAP_SIZE, LmdbEnvironment};
use srt_types::parse_timestamp;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const ADMIN_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const CONTRACT: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";
const WALLET_TEMP: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";
const WALLET_HUM: &str = "0x3c44cdddb6a900fa2b585dd299e03d12fa4293bc";
const WALLET_CO2: &str = "0x90f79bf6eb2c4f870365e785982e1f101e93b906";

fn config() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.broker.enabled = false;
    config.websocket.enabled = false;
    config.ledger.admin_private_key = Some(ADMIN_KEY.into());
    config.ledger.contract_address = Some(CONTRACT.into());
    config.ledger.receipt_poll_interval_ms = 5;
    config.ledger.receipt_timeout_secs = 5;
    for (sensor, wallet) in [("TEMP-1", WALLET_TEMP), ("HUM-1", WALLET_HUM), ("CO2-1", WALLET_CO2)] {
        config.wallets.insert(sensor.into(), wallet.into());
    }
    config
}

fn node_with(config: NodeConfig, chain: &Arc<NullChainNode>) -> (SensorNode, Arc<NullTelemetryStore>) {
    let store = Arc::new(NullTelemetryStore::new());
    let rpc: Arc<dyn ChainRpc> = chain.clone();
    let node = SensorNode::with_components(config, store.clone(), rpc).expect("node");
    (node, store)
}

fn payload(sensor_type: &str, sensor_id: &str, value: f64) -> Vec<u8> {
    format!(
        r#"{{"sensorType":"{sensor_type}","sensorId":"{sensor_id}","location":"Room","value":{value},"unit":"°C","timestamp":"2024-01-01T00:00:00Z"}}"#
    )
    .into_bytes()
}

async fn next_attempt(rx: &mut mpsc::UnboundedReceiver<RewardAttempt>) -> RewardAttempt {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for reward attempt")
        .expect("observer closed")
}

// ---------------------------------------------------------------------------
// 1. Accepted readings
// ---------------------------------------------------------------------------

#[tokio::test]
async fn accepted_reading_is_stored_broadcast_and_rewarded() {
    let chain = Arc::new(NullChainNode::with_reward_flow());
    let (mut node, store) = node_with(config(), &chain);
    let mut attempts = node.observe_rewards();
    let mut subscriber = node.ws_state().subscribe();
    node.start().await.unwrap();

    let outcome = node
        .gateway()
        .handle_message("sensors/TEMP/TEMP-1", &payload("TEMP", "TEMP-1", 21.5));
    assert_eq!(
        outcome,
        IngestOutcome::Accepted {
            stored: true,
            subscribers: Some(1),
            reward: RewardScheduling::Queued,
        }
    );

    // Store and fanout both happened before the handler returned.
    let stored = store.all();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].sensor_id, "TEMP-1");
    assert_eq!(stored[0].value, 21.5);
    let frame: serde_json::Value = serde_json::from_str(&subscriber.try_recv().unwrap()).unwrap();
    assert_eq!(frame["event"], "NewReading");
    assert_eq!(frame["data"]["sensorId"], "TEMP-1");
    assert_eq!(frame["data"]["unit"], "°C");

    let attempt = next_attempt(&mut attempts).await;
    assert_eq!(attempt.sensor_id, "TEMP-1");
    assert_eq!(attempt.wallet, Some(WALLET_TEMP.parse().unwrap()));
    assert!(attempt.is_rewarded(), "unexpected outcome {:?}", attempt.outcome);
    assert_eq!(chain.sent_transactions().len(), 1);

    node.stop().await.unwrap();
    assert_eq!(node.metrics().rewards_succeeded.get(), 1);
}

#[tokio::test]
async fn malformed_messages_leave_no_trace() {
    let chain = Arc::new(NullChainNode::with_reward_flow());
    let (mut node, store) = node_with(config(), &chain);
    let mut subscriber = node.ws_state().subscribe();
    node.start().await.unwrap();

    let bad_payloads: [&[u8]; 4] = [
        b"not json",
        br#"{"sensorType":"TEMP"}"#,
        br#"{"sensorType":"TEMP","sensorId":"TEMP-1","location":"R","value":"hot","unit":"C","timestamp":"2024-01-01T00:00:00Z"}"#,
        br#"{"sensorType":"TEMP","sensorId":"TEMP-1","location":"R","value":1,"unit":"C","timestamp":"yesterday"}"#,
    ];
    for bad in bad_payloads {
        assert_eq!(node.gateway().handle_message("sensors/TEMP/TEMP-1", bad), IngestOutcome::Dropped);
    }

    assert!(store.all().is_empty());
    assert!(subscriber.try_recv().is_err());
    node.stop().await.unwrap();
    assert!(chain.calls().is_empty());
    assert_eq!(node.metrics().messages_dropped.get(), 4);
}

#[tokio::test]
async fn store_failure_still_broadcasts_and_rewards() {
    let chain = Arc::new(NullChainNode::with_reward_flow());
    let (mut node, store) = node_with(config(), &chain);
    store.set_fail_inserts(true);
    let mut attempts = node.observe_rewards();
    let mut subscriber = node.ws_state().subscribe();
    node.start().await.unwrap();

    let outcome = node
        .gateway()
        .handle_message("sensors/HUM/HUM-1", &payload("HUM", "HUM-1", 40.0));
    assert!(matches!(outcome, IngestOutcome::Accepted { stored: false, .. }));
    assert!(subscriber.try_recv().is_ok());
    assert!(next_attempt(&mut attempts).await.is_rewarded());

    node.stop().await.unwrap();
    assert_eq!(node.metrics().store_failures.get(), 1);
}

// ---------------------------------------------------------------------------
// 2. Unavailable rewards
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unbound_sensor_is_not_rewarded_and_chain_is_untouched() {
    let chain = Arc::new(NullChainNode::with_reward_flow());
    let (mut node, store) = node_with(config(), &chain);
    let mut attempts = node.observe_rewards();
    node.start().await.unwrap();

    node.gateway()
        .handle_message("sensors/PRES/PRES-9", &payload("PRES", "PRES-9", 1013.0));

    let attempt = next_attempt(&mut attempts).await;
    assert!(matches!(
        attempt.outcome,
        RewardOutcome::Unavailable(UnavailableReason::SensorUnbound)
    ));
    assert_eq!(attempt.wallet, None);
    assert_eq!(store.all().len(), 1);
    assert!(chain.calls().is_empty());
    node.stop().await.unwrap();
    assert_eq!(node.metrics().rewards_unavailable.get(), 1);
}

#[tokio::test]
async fn uninitialized_session_is_not_rewarded() {
    let chain = Arc::new(NullChainNode::with_reward_flow());
    let mut config = config();
    config.ledger.contract_address = None;
    config.ledger.deployment_delay_secs = 3600;
    let (mut node, _store) = node_with(config, &chain);
    let mut attempts = node.observe_rewards();
    node.start().await.unwrap();
    assert_eq!(node.ledger().session_state(), SessionState::Uninitialized);

    node.gateway()
        .handle_message("sensors/TEMP/TEMP-1", &payload("TEMP", "TEMP-1", 20.0));

    let attempt = next_attempt(&mut attempts).await;
    assert!(matches!(
        attempt.outcome,
        RewardOutcome::Unavailable(UnavailableReason::SessionUninitialized)
    ));
    assert!(chain.calls().is_empty());
    node.stop().await.unwrap();
}

#[tokio::test]
async fn deployment_descriptor_binds_session_after_delay() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deployment.json");
    std::fs::write(
        &path,
        format!(r#"{{"contractAddress":"{CONTRACT}","network":"localhost"}}"#),
    )
    .unwrap();

    let chain = Arc::new(NullChainNode::with_reward_flow());
    let mut config = config();
    config.ledger.contract_address = None;
    config.ledger.deployment_path = path;
    config.ledger.deployment_delay_secs = 0;
    let (mut node, _store) = node_with(config, &chain);
    let mut attempts = node.observe_rewards();
    node.start().await.unwrap();

    for _ in 0..100 {
        if node.ledger().session_state() == SessionState::Initialized {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(node.ledger().contract_address(), Some(CONTRACT.parse().unwrap()));

    node.gateway()
        .handle_message("sensors/TEMP/TEMP-1", &payload("TEMP", "TEMP-1", 20.0));
    assert!(next_attempt(&mut attempts).await.is_rewarded());
    node.stop().await.unwrap();
}

// ---------------------------------------------------------------------------
// 3. Rewards never hold up ingestion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn slow_ledger_does_not_block_ingestion() {
    let chain = Arc::new(NullChainNode::with_reward_flow());
    chain.set_latency(Duration::from_millis(100));
    let (mut node, store) = node_with(config(), &chain);
    let mut attempts = node.observe_rewards();
    node.start().await.unwrap();

    node.gateway()
        .handle_message("sensors/TEMP/TEMP-1", &payload("TEMP", "TEMP-1", 1.0));
    node.gateway()
        .handle_message("sensors/HUM/HUM-1", &payload("HUM", "HUM-1", 2.0));

    let started = Instant::now();
    let third = node
        .gateway()
        .handle_message("sensors/CO2/CO2-1", &payload("CO2", "CO2-1", 3.0));
    assert!(third.is_accepted());
    assert!(started.elapsed() < Duration::from_millis(100));
    assert_eq!(store.all().len(), 3);

    let mut rewarded = Vec::new();
    for _ in 0..3 {
        let attempt = next_attempt(&mut attempts).await;
        assert!(attempt.is_rewarded(), "unexpected outcome {:?}", attempt.outcome);
        rewarded.push(attempt.sensor_id);
    }
    rewarded.sort();
    assert_eq!(rewarded, ["CO2-1", "HUM-1", "TEMP-1"]);

    // One nonce lookup; later transactions reuse the cached sequence.
    assert_eq!(chain.call_count("eth_getTransactionCount"), 1);
    assert_eq!(chain.sent_transactions().len(), 3);
    node.stop().await.unwrap();
}

#[tokio::test]
async fn failed_reward_is_contained() {
    let chain = Arc::new(NullChainNode::with_reward_flow());
    chain.fail_once("eth_estimateGas", -32000, "execution reverted");
    let (mut node, _store) = node_with(config(), &chain);
    let mut attempts = node.observe_rewards();
    node.start().await.unwrap();

    node.gateway()
        .handle_message("sensors/TEMP/TEMP-1", &payload("TEMP", "TEMP-1", 1.0));
    let first = next_attempt(&mut attempts).await;
    assert!(matches!(first.outcome, RewardOutcome::Failed(_)));

    node.gateway()
        .handle_message("sensors/TEMP/TEMP-1", &payload("TEMP", "TEMP-1", 2.0));
    assert!(next_attempt(&mut attempts).await.is_rewarded());

    node.stop().await.unwrap();
    assert_eq!(node.metrics().rewards_failed.get(), 1);
    assert_eq!(node.metrics().rewards_succeeded.get(), 1);
}

#[tokio::test]
async fn stop_drains_queued_rewards() {
    let chain = Arc::new(NullChainNode::with_reward_flow());
    chain.set_latency(Duration::from_millis(20));
    let mut config = config();
    config.rewards.workers = 1;
    let (mut node, _store) = node_with(config, &chain);
    let mut attempts = node.observe_rewards();
    node.start().await.unwrap();

    for i in 0..3 {
        node.gateway()
            .handle_message("sensors/TEMP/TEMP-1", &payload("TEMP", "TEMP-1", i as f64));
    }
    node.stop().await.unwrap();

    let mut resolved = 0;
    while let Some(attempt) = attempts.recv().await {
        assert!(attempt.is_rewarded());
        resolved += 1;
    }
    assert_eq!(resolved, 3);

    // After stop, readings are still accepted but no reward is queued.
    let late = node
        .gateway()
        .handle_message("sensors/TEMP/TEMP-1", &payload("TEMP", "TEMP-1", 9.0));
    assert!(matches!(
        late,
        IngestOutcome::Accepted {
            reward: RewardScheduling::Closed,
            ..
        }
    ));
}

// ---------------------------------------------------------------------------
// 4. Persistence and queries through LMDB
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lmdb_backed_query_finds_example_reading() {
    let dir = tempfile::tempdir().unwrap();
    let env = LmdbEnvironment::open(dir.path(), DEFAULT_MAP_SIZE).unwrap();
    let store: Arc<dyn TelemetryStore> = Arc::new(env.telemetry_store());
    let chain = Arc::new(NullChainNode::with_reward_flow());
    let rpc: Arc<dyn ChainRpc> = chain.clone();
    let mut node = SensorNode::with_components(config(), store, rpc).unwrap();
    node.start().await.unwrap();

    node.gateway()
        .handle_message("sensors/TEMP/TEMP-1", &payload("TEMP", "TEMP-1", 21.5));
    node.gateway()
        .handle_message("sensors/HUM/HUM-1", &payload("HUM", "HUM-1", 40.0));

    let filter = ReadingFilter::default()
        .from(parse_timestamp("2024-01-01").unwrap())
        .sensor_type("TEMP");
    let page = node.store().query(&ReadingQuery::new(filter)).unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.data.len(), 1);
    let reading = &page.data[0];
    assert_eq!(reading.sensor_type, "TEMP");
    assert_eq!(reading.sensor_id, "TEMP-1");
    assert_eq!(reading.location, "Room");
    assert_eq!(reading.value, 21.5);
    assert_eq!(reading.unit, "°C");
    assert_eq!(reading.timestamp, parse_timestamp("2024-01-01T00:00:00Z").unwrap());

    node.stop().await.unwrap();
}

// ---------------------------------------------------------------------------
// 5. WebSocket server and metrics endpoint
// ---------------------------------------------------------------------------

#[tokio::test]
async fn websocket_clients_receive_readings_and_metrics_are_served() {
    let chain = Arc::new(NullChainNode::with_reward_flow());
    let mut config = config();
    config.websocket.enabled = true;
    config.websocket.port = 0;
    config.enable_metrics = true;
    let (mut node, _store) = node_with(config, &chain);
    node.start().await.unwrap();
    let port = node.websocket_addr().expect("bound").port();

    let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{port}/ws")).await.unwrap();
    node.gateway()
        .handle_message("sensors/TEMP/TEMP-1", &payload("TEMP", "TEMP-1", 22.0));

    let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let text = match msg {
        Message::Text(text) => text,
        other => panic!("expected text frame, got {other:?}"),
    };
    let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(frame["event"], "NewReading");
    assert_eq!(frame["data"]["value"], 22.0);

    let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    stream
        .write_all(b"GET /metrics HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut body = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut body))
        .await
        .unwrap()
        .unwrap();
    let body = String::from_utf8_lossy(&body);
    assert!(body.contains("srt_messages_received_total 1"));
    assert!(body.contains("srt_readings_stored_total 1"));

    node.stop().await.unwrap();
}

// ---------------------------------------------------------------------------
// 6. Startup validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_admin_key_is_fatal() {
    let chain = Arc::new(NullChainNode::new());
    let rpc: Arc<dyn ChainRpc> = chain;
    let mut config = config();
    config.ledger.admin_private_key = None;
    let result = SensorNode::with_components(config, Arc::new(NullTelemetryStore::new()), rpc);
    assert!(matches!(result, Err(NodeError::Config(_))));
}

#[tokio::test]
async fn start_twice_is_rejected() {
    let chain = Arc::new(NullChainNode::with_reward_flow());
    let (mut node, _store) = node_with(config(), &chain);
    node.start().await.unwrap();
    assert!(matches!(node.start().await, Err(NodeError::AlreadyStarted)));
    node.stop().await.unwrap();
}
