//! Tests for portbridge-adapters: storage, location watcher, socket channel, bridge

use portbridge_adapters::mock::{MockConnector, MockSensor};
use portbridge_adapters::native::{binary_frame, FixedSensor};
use portbridge_adapters::*;
use portbridge_core::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Let spawned adapters run until they are idle.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn position(lat: f64, lng: f64) -> Position {
    Position {
        coords: Coordinates::new(lat, lng, 5.0),
        timestamp: 1_700_000_000_000,
    }
}

// ===========================================================================
// Storage
// ===========================================================================

#[test]
fn token_absent_before_save_and_exact_after() {
    let adapter = StorageAdapter::new(Arc::new(MemoryStore::new()));
    assert_eq!(adapter.get_token().unwrap(), None);
    adapter.save_token("eyJhbGciOi.abc").unwrap();
    assert_eq!(adapter.get_token().unwrap().as_deref(), Some("eyJhbGciOi.abc"));
}

#[test]
fn memory_store_quota_counts_replaced_value_once() {
    // "user" (4) + 6 = 10 bytes
    let store = MemoryStore::with_quota(Some(10));
    store.set(TOKEN_KEY, "abcdef").unwrap();
    store.set(TOKEN_KEY, "ghijkl").unwrap();
    assert_eq!(store.used_bytes(), 10);

    let err = store.set(TOKEN_KEY, "too-long").unwrap_err();
    assert_eq!(
        err,
        StorageError::QuotaExceeded {
            key: "user".into(),
            needed: 12,
            quota: 10,
        }
    );
    assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("ghijkl"));
}

#[test]
fn failed_save_is_reported_not_dropped() {
    let (mut core, bridge) = PortSet::new();
    let adapter = StorageAdapter::new(Arc::new(MemoryStore::with_quota(Some(4))));
    adapter.handle_save("token", &bridge.storage.storage_failed);

    let failures = core.storage_failed.drain();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("quota exceeded"));
    assert_eq!(adapter.get_token().unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn save_token_intent_writes_store() {
    let (core, bridge) = PortSet::new();
    let adapter = StorageAdapter::new(Arc::new(MemoryStore::new()));
    let reader = adapter.clone();
    let cancel = CancellationToken::new();
    let task = adapter.bind(bridge.storage, cancel.clone()).unwrap();

    assert_eq!(reader.get_token().unwrap(), None);
    core.save_token.send("session-token".into()).unwrap();
    settle().await;
    assert_eq!(reader.get_token().unwrap().as_deref(), Some("session-token"));

    cancel.cancel();
    task.await.unwrap();
}

// ===========================================================================
// LocationWatcher
// ===========================================================================

fn watcher(max: usize) -> (LocationWatcher, MockSensor, CorePorts) {
    let (core, bridge) = PortSet::new();
    let sensor = MockSensor::new();
    let watcher = LocationWatcher::new(Arc::new(sensor.clone()), max, bridge.geolocation.update);
    (watcher, sensor, core)
}

#[test]
fn stop_when_idle_is_silent() {
    let (mut watcher, sensor, mut core) = watcher(1);
    assert!(watcher.is_idle());
    assert_eq!(watcher.stop(), 0);
    assert!(sensor.cleared().is_empty());
    assert!(core.geolocation_update.drain().is_empty());
}

#[test]
fn every_callback_becomes_one_message_in_order() {
    let (mut watcher, sensor, mut core) = watcher(1);
    let StartOutcome::Started(handle) = watcher.start() else {
        panic!("expected a subscription");
    };
    sensor.emit_position(handle, position(1.0, 2.0));
    sensor.emit_position(handle, position(1.0, 2.0));
    sensor.emit_error(handle, SensorErrorCode::PermissionDenied);
    assert_eq!(watcher.process_pending(), 3);

    let msgs = core.geolocation_update.drain();
    assert_eq!(msgs.len(), 3);
    assert_eq!(msgs[0].msg_type, MsgType::Update);
    assert_eq!(msgs[0].coords.as_ref().unwrap().longitude, 2.0);
    assert_eq!(msgs[0].timestamp, Some(1_700_000_000_000));
    assert_eq!(msgs[1], msgs[0]);
    assert_eq!(msgs[2].msg_type, MsgType::Error);
    assert_eq!(msgs[2].error_code, Some(1));
}

#[test]
fn start_is_capped_at_one_by_default() {
    let (mut watcher, sensor, _core) = watcher(1);
    assert!(matches!(watcher.start(), StartOutcome::Started(_)));
    assert_eq!(watcher.start(), StartOutcome::AtCapacity);
    assert_eq!(sensor.watch_calls(), 1);
    assert_eq!(watcher.active_count(), 1);
}

#[test]
fn raised_cap_allows_independent_subscriptions() {
    let (mut watcher, sensor, _core) = watcher(3);
    watcher.start();
    watcher.start();
    assert_eq!(sensor.active().len(), 2);
    assert_eq!(watcher.stop(), 2);
    assert!(sensor.active().is_empty());
    assert_eq!(sensor.cleared().len(), 2);
}

#[test]
fn callbacks_after_stop_are_ignored() {
    let (mut watcher, sensor, mut core) = watcher(1);
    let StartOutcome::Started(handle) = watcher.start() else {
        panic!("expected a subscription");
    };
    watcher.stop();
    sensor.emit_position(handle, position(3.0, 4.0));
    assert_eq!(watcher.process_pending(), 0);
    assert!(core.geolocation_update.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn watcher_follows_start_and_stop_intents() {
    let (mut core, bridge) = PortSet::new();
    let sensor = MockSensor::new();
    let watcher = LocationWatcher::new(Arc::new(sensor.clone()), 1, bridge.geolocation.update);
    let cancel = CancellationToken::new();
    let task = watcher
        .bind(bridge.geolocation.start, bridge.geolocation.stop, cancel.clone())
        .unwrap();

    core.geolocation_start.send(()).unwrap();
    settle().await;
    let active = sensor.active();
    assert_eq!(active.len(), 1);

    sensor.emit_error(active[0], SensorErrorCode::Timeout);
    settle().await;
    let msgs = core.geolocation_update.drain();
    assert_eq!(msgs, vec![LocationMessage::error(SensorErrorCode::Timeout)]);

    core.geolocation_stop.send(()).unwrap();
    settle().await;
    assert!(sensor.active().is_empty());

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn watcher_keeps_starting_after_stop_pipe_closes() {
    let (core, bridge) = PortSet::new();
    let sensor = MockSensor::new();
    let watcher = LocationWatcher::new(Arc::new(sensor.clone()), 1, bridge.geolocation.update);
    let cancel = CancellationToken::new();
    let task = watcher
        .bind(bridge.geolocation.start, bridge.geolocation.stop, cancel.clone())
        .unwrap();

    drop(core.geolocation_stop);
    settle().await;
    core.geolocation_start.send(()).unwrap();
    settle().await;
    assert_eq!(sensor.active().len(), 1);

    cancel.cancel();
    task.await.unwrap();
    assert!(sensor.active().is_empty());
}

#[tokio::test(start_paused = true)]
async fn fixed_sensor_reports_until_cleared() {
    let sensor = FixedSensor::new(Coordinates::new(52.5, 13.4, 20.0), Duration::from_millis(1000));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = sensor.watch(tx);
    tokio::time::sleep(Duration::from_millis(2500)).await;

    let mut seen = 0;
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.handle, handle);
        assert!(matches!(event.kind, SensorEventKind::Position(ref p) if p.coords.latitude == 52.5));
        seen += 1;
    }
    assert!(seen >= 2, "expected at least two fixes, got {}", seen);

    sensor.clear_watch(handle);
    assert_eq!(sensor.active_watches(), 0);
    tokio::time::sleep(Duration::from_millis(3000)).await;
    assert!(rx.try_recv().is_err());
}

// ===========================================================================
// SocketChannel: direct handlers
// ===========================================================================

struct SocketFixture {
    channel: SocketChannel,
    connector: MockConnector,
    network: NetworkFlag,
    core: CorePorts,
}

fn socket(online: bool) -> SocketFixture {
    let (core, bridge) = PortSet::new();
    let connector = MockConnector::new();
    let (network, _events) = NetworkFlag::new(online);
    let channel = SocketChannel::new(
        "ws://127.0.0.1:9/ws",
        Arc::new(connector.clone()),
        Arc::new(network.clone()),
        bridge.socket.events,
    );
    SocketFixture {
        channel,
        connector,
        network,
        core,
    }
}

fn open_connected(f: &mut SocketFixture) -> ConnectionId {
    let OpenOutcome::Started(id) = f.channel.open() else {
        panic!("expected a connection");
    };
    f.connector.accept_last();
    f.channel.process_pending();
    assert_eq!(f.channel.state(), ConnectionState::Open);
    id
}

#[test]
fn repeated_open_never_creates_second_connection() {
    let mut f = socket(true);
    assert!(matches!(f.channel.open(), OpenOutcome::Started(_)));
    assert_eq!(f.channel.state(), ConnectionState::Connecting);
    assert_eq!(
        f.channel.open(),
        OpenOutcome::Skipped(SkipReason::AlreadyConnecting)
    );

    f.connector.accept_last();
    f.channel.process_pending();
    assert_eq!(f.channel.state(), ConnectionState::Open);
    for _ in 0..5 {
        assert_eq!(f.channel.open(), OpenOutcome::Skipped(SkipReason::AlreadyOpen));
    }
    assert_eq!(f.connector.connect_count(), 1);
    assert_eq!(f.connector.live_count(), 1);
    assert_eq!(f.core.opened.drain().len(), 1);
}

#[test]
fn open_while_offline_is_skipped() {
    let mut f = socket(false);
    assert_eq!(f.channel.open(), OpenOutcome::Skipped(SkipReason::Offline));
    assert_eq!(f.connector.connect_count(), 0);
    assert_eq!(f.channel.state(), ConnectionState::Closed);
    assert!(f.core.closed.drain().is_empty());
}

#[test]
fn send_before_open_is_reported() {
    let mut f = socket(true);
    let msg = serde_json::json!({ "kind": "ping" });
    let err = f.channel.send_message(&msg).unwrap_err();
    assert!(matches!(err, Error::NotReady(_)));

    assert!(!f.channel.deliver(msg.clone()));
    assert_eq!(f.core.send_failed.drain(), vec![msg]);
}

#[test]
fn send_while_open_transmits_json() {
    let mut f = socket(true);
    let id = open_connected(&mut f);
    assert!(f.channel.deliver(serde_json::json!({ "kind": "ping", "n": 1 })));
    let sent = f.connector.sent(id);
    assert_eq!(sent.len(), 1);
    let back: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
    assert_eq!(back["kind"], "ping");
    assert!(f.core.send_failed.drain().is_empty());
}

#[test]
fn binary_frames_must_be_utf8() {
    assert_eq!(
        binary_frame(br#"{"kind":"hello"}"#.to_vec()),
        SocketEventKind::Frame(r#"{"kind":"hello"}"#.into())
    );

    let mut f = socket(true);
    let id = open_connected(&mut f);
    let kind = binary_frame(vec![b'"', 0xff, b'"']);
    assert!(matches!(kind, SocketEventKind::Undecodable(_)));

    f.connector.emit(id, kind);
    f.channel.process_pending();
    assert_eq!(f.core.receive_failed.drain().len(), 1);
    assert!(f.core.received_message.drain().is_empty());
    assert_eq!(f.channel.state(), ConnectionState::Open);
}

#[test]
fn malformed_frame_fails_receive_only() {
    let mut f = socket(true);
    let id = open_connected(&mut f);

    f.connector.emit(id, SocketEventKind::Frame("{not json".into()));
    f.channel.process_pending();
    assert_eq!(f.core.receive_failed.drain().len(), 1);
    assert_eq!(f.channel.state(), ConnectionState::Open);
    assert!(f.core.closed.drain().is_empty());

    f.connector.emit(id, SocketEventKind::Frame(r#"{"kind":"hello"}"#.into()));
    f.channel.process_pending();
    let received = f.core.received_message.drain();
    assert_eq!(received, vec![serde_json::json!({ "kind": "hello" })]);
}

#[test]
fn error_then_close_emits_single_closed() {
    let mut f = socket(true);
    let id = open_connected(&mut f);
    f.connector.emit(id, SocketEventKind::Error("reset by peer".into()));
    f.connector.emit(id, SocketEventKind::Closed);
    f.channel.process_pending();
    assert_eq!(f.channel.state(), ConnectionState::Closed);
    assert_eq!(f.core.closed.drain().len(), 1);
}

#[test]
fn handshake_failure_returns_to_closed() {
    let mut f = socket(true);
    let OpenOutcome::Started(id) = f.channel.open() else {
        panic!("expected a connection");
    };
    f.connector.emit(id, SocketEventKind::Error("refused".into()));
    f.channel.process_pending();
    assert_eq!(f.channel.state(), ConnectionState::Closed);
    assert_eq!(f.core.closed.drain().len(), 1);
    assert!(f.core.opened.drain().is_empty());
    assert!(matches!(f.channel.open(), OpenOutcome::Started(_)));
}

#[test]
fn offline_while_open_closes_once() {
    let mut f = socket(true);
    let id = open_connected(&mut f);

    f.network.set_online(false);
    f.channel.handle_network_event(NetworkEvent::Offline);
    assert_eq!(f.channel.state(), ConnectionState::Closed);
    assert!(f.connector.is_closed(id));
    assert_eq!(f.core.went_offline.drain().len(), 1);
    assert_eq!(f.core.closed.drain().len(), 1);

    // The host's own close notification for that socket arrives late.
    f.connector.emit(id, SocketEventKind::Closed);
    f.channel.process_pending();
    assert!(f.core.closed.drain().is_empty());
}

#[test]
fn offline_while_closed_only_signals() {
    let mut f = socket(true);
    f.channel.handle_network_event(NetworkEvent::Offline);
    assert_eq!(f.core.went_offline.drain().len(), 1);
    assert!(f.core.closed.drain().is_empty());
}

#[test]
fn online_does_not_reopen() {
    let mut f = socket(false);
    f.network.set_online(true);
    f.channel.handle_network_event(NetworkEvent::Online);
    assert_eq!(f.core.went_online.drain().len(), 1);
    assert_eq!(f.connector.connect_count(), 0);
    assert_eq!(f.channel.state(), ConnectionState::Closed);
}

#[test]
fn events_from_previous_connection_are_ignored() {
    let mut f = socket(true);
    let first = open_connected(&mut f);
    f.channel.force_close("test");
    f.core.closed.drain();

    let OpenOutcome::Started(second) = f.channel.open() else {
        panic!("expected a connection");
    };
    assert_ne!(first, second);

    f.connector.emit(first, SocketEventKind::Opened);
    f.connector.emit(first, SocketEventKind::Frame("{}".into()));
    f.channel.process_pending();
    assert_eq!(f.channel.state(), ConnectionState::Connecting);
    assert!(f.core.opened.drain().is_empty());
    assert!(f.core.received_message.drain().is_empty());
}

#[test]
fn refused_connect_reports_closed() {
    let mut f = socket(true);
    f.connector.refuse_connections(true);
    assert!(matches!(f.channel.open(), OpenOutcome::Failed(_)));
    assert_eq!(f.channel.state(), ConnectionState::Closed);
    assert_eq!(f.core.closed.drain().len(), 1);
}

// ===========================================================================
// SocketChannel: intent loop
// ===========================================================================

struct RunningSocket {
    connector: MockConnector,
    network: NetworkFlag,
    core: CorePorts,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

fn run_socket(online: bool) -> RunningSocket {
    let (core, bridge) = PortSet::new();
    let connector = MockConnector::new();
    let (network, network_events) = NetworkFlag::new(online);
    let channel = SocketChannel::new(
        "ws://127.0.0.1:9/ws",
        Arc::new(connector.clone()),
        Arc::new(network.clone()),
        bridge.socket.events,
    );
    let cancel = CancellationToken::new();
    let task = channel
        .bind(
            bridge.socket.open,
            bridge.socket.open_after_delay,
            bridge.socket.send_message,
            network_events,
            cancel.clone(),
        )
        .unwrap();
    RunningSocket {
        connector,
        network,
        core,
        cancel,
        task,
    }
}

#[tokio::test(start_paused = true)]
async fn bind_opens_once() {
    let mut s = run_socket(true);
    settle().await;
    assert_eq!(s.connector.connect_count(), 1);
    s.connector.accept_last();
    settle().await;
    assert_eq!(s.core.opened.drain().len(), 1);

    s.core.open.send(()).unwrap();
    s.core.open.send(()).unwrap();
    settle().await;
    assert_eq!(s.connector.connect_count(), 1);

    s.cancel.cancel();
    s.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn second_delayed_open_is_noop_after_first_succeeds() {
    let mut s = run_socket(false);
    settle().await;
    assert_eq!(s.connector.connect_count(), 0);

    s.network.set_online(true);
    s.core.open_after_delay.send(100).unwrap();
    s.core.open_after_delay.send(200).unwrap();
    settle().await;
    assert_eq!(s.core.went_online.drain().len(), 1);
    assert_eq!(s.connector.connect_count(), 0);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(s.connector.connect_count(), 1);
    s.connector.accept_last();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(s.connector.connect_count(), 1);
    assert_eq!(s.core.opened.drain().len(), 1);

    s.cancel.cancel();
    s.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn delayed_open_reconnects_after_close() {
    let mut s = run_socket(true);
    settle().await;
    let first = s.connector.accept_last().unwrap();
    settle().await;
    s.connector.emit(first, SocketEventKind::Closed);
    settle().await;
    assert_eq!(s.core.closed.drain().len(), 1);

    s.core.open_after_delay.send(500).unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(s.connector.connect_count(), 1);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(s.connector.connect_count(), 2);

    s.cancel.cancel();
    s.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn send_message_intent_reaches_socket() {
    let mut s = run_socket(true);
    settle().await;
    let id = s.connector.accept_last().unwrap();
    settle().await;

    s.core
        .send_message
        .send(serde_json::json!({ "kind": "chat", "text": "hi" }))
        .unwrap();
    settle().await;
    assert_eq!(s.connector.sent(id).len(), 1);
    assert!(s.core.send_failed.drain().is_empty());

    s.cancel.cancel();
    s.task.await.unwrap();
    assert!(s.connector.is_closed(id));
}

#[tokio::test(start_paused = true)]
async fn offline_notification_closes_running_socket() {
    let mut s = run_socket(true);
    settle().await;
    let id = s.connector.accept_last().unwrap();
    settle().await;

    s.network.set_online(false);
    settle().await;
    assert_eq!(s.core.went_offline.drain().len(), 1);
    assert_eq!(s.core.closed.drain().len(), 1);
    assert!(s.connector.is_closed(id));

    s.core.open.send(()).unwrap();
    settle().await;
    assert_eq!(s.connector.connect_count(), 1);

    s.cancel.cancel();
    s.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn socket_keeps_running_after_send_pipe_closes() {
    let mut s = run_socket(true);
    settle().await;
    let first = s.connector.accept_last().unwrap();
    settle().await;
    assert_eq!(s.core.opened.drain().len(), 1);

    drop(s.core.send_message);
    settle().await;
    assert!(!s.task.is_finished());

    s.connector.emit(first, SocketEventKind::Closed);
    settle().await;
    assert_eq!(s.core.closed.drain().len(), 1);

    s.core.open_after_delay.send(100).unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(s.connector.connect_count(), 2);

    s.cancel.cancel();
    s.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn socket_stops_once_every_intent_pipe_closes() {
    let s = run_socket(true);
    settle().await;
    let id = s.connector.accept_last().unwrap();
    settle().await;

    drop(s.core.open);
    drop(s.core.send_message);
    settle().await;
    assert!(!s.task.is_finished());

    drop(s.core.open_after_delay);
    s.task.await.unwrap();
    assert!(s.connector.is_closed(id));
}

// ===========================================================================
// Bridge
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn bridge_binds_every_adapter() {
    let (mut core, bridge) = PortSet::new();
    let connector = MockConnector::new();
    let sensor = MockSensor::new();
    let store = Arc::new(MemoryStore::new());
    let (network, network_events) = NetworkFlag::new(true);
    let hosts = Hosts {
        connector: Arc::new(connector.clone()),
        sensor: Arc::new(sensor.clone()),
        store: store.clone(),
        network: Arc::new(network),
        network_events,
    };
    let running = Bridge::bind(&BridgeConfig::default(), bridge, hosts).unwrap();
    settle().await;

    assert_eq!(connector.connect_count(), 1);
    assert_eq!(
        connector.url(connector.last_id().unwrap()).as_deref(),
        Some("ws://127.0.0.1:8080/ws")
    );

    core.save_token.send("tok".into()).unwrap();
    core.geolocation_start.send(()).unwrap();
    settle().await;
    assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("tok"));
    assert_eq!(sensor.active().len(), 1);

    running.shutdown().await;
    assert!(sensor.active().is_empty());
    assert_eq!(connector.live_count(), 0);
    assert!(core.closed.drain().is_empty());
}
