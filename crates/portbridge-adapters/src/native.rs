//! Native host implementations: a tokio-tungstenite socket and a fixed-position sensor

use crate::geolocation::{LocationSensor, SensorEvent, SensorEventKind};
use crate::socket::{ConnectionId, SocketConnector, SocketError, SocketEvent, SocketEventKind, SocketHandle};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use portbridge_core::{Coordinates, Position, WatchHandle};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMsg};
use tokio_util::sync::CancellationToken;
use tracing::debug;

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

/// Opens real WebSocket connections, one driver task per connection.
pub struct TungsteniteConnector {
    connect_timeout: Duration,
}

impl TungsteniteConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

struct TungsteniteHandle {
    outgoing: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl SocketHandle for TungsteniteHandle {
    fn send_text(&mut self, text: String) -> Result<(), SocketError> {
        self.outgoing
            .send(text)
            .map_err(|_| SocketError::Disconnected)
    }

    fn close(&mut self) {
        self.cancel.cancel();
    }
}

impl SocketConnector for TungsteniteConnector {
    fn connect(
        &self,
        url: &str,
        conn: ConnectionId,
        events: mpsc::UnboundedSender<SocketEvent>,
    ) -> Result<Box<dyn SocketHandle>, SocketError> {
        if url.trim().is_empty() {
            return Err(SocketError::ConnectFailed("empty url".into()));
        }
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        tokio::spawn(drive_connection(
            url.to_string(),
            conn,
            events,
            outgoing_rx,
            cancel.clone(),
            self.connect_timeout,
        ));
        Ok(Box::new(TungsteniteHandle { outgoing, cancel }))
    }
}

async fn drive_connection(
    url: String,
    conn: ConnectionId,
    events: mpsc::UnboundedSender<SocketEvent>,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
    connect_timeout: Duration,
) {
    let emit = |kind: SocketEventKind| {
        // The channel may already be gone; nothing left to tell.
        let _ = events.send(SocketEvent { conn, kind });
    };

    let handshake = tokio::time::timeout(connect_timeout, connect_async(&url));
    let stream = tokio::select! {
        _ = cancel.cancelled() => {
            emit(SocketEventKind::Closed);
            return;
        }
        result = handshake => match result {
            Ok(Ok((stream, _))) => stream,
            Ok(Err(e)) => {
                emit(SocketEventKind::Error(e.to_string()));
                return;
            }
            Err(_) => {
                emit(SocketEventKind::Error(format!(
                    "handshake timed out after {} ms",
                    connect_timeout.as_millis()
                )));
                return;
            }
        },
    };

    emit(SocketEventKind::Opened);
    let (mut ws_tx, mut ws_rx) = stream.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = ws_tx.send(WsMsg::Close(None)).await;
                emit(SocketEventKind::Closed);
                return;
            }
            Some(text) = outgoing.recv() => {
                if let Err(e) = ws_tx.send(WsMsg::Text(text)).await {
                    emit(SocketEventKind::Error(e.to_string()));
                    return;
                }
            }
            msg = ws_rx.next() => match msg {
                Some(Ok(WsMsg::Text(text))) => emit(SocketEventKind::Frame(text)),
                Some(Ok(WsMsg::Binary(bytes))) => emit(binary_frame(bytes)),
                Some(Ok(WsMsg::Close(_))) | None => {
                    emit(SocketEventKind::Closed);
                    return;
                }
                Some(Err(e)) => {
                    emit(SocketEventKind::Error(e.to_string()));
                    return;
                }
                _ => {} // ping/pong answered by tungstenite
            },
        }
    }
}

/// Binary frames must be UTF-8; anything else is reported, never repaired.
pub fn binary_frame(bytes: Vec<u8>) -> SocketEventKind {
    match String::from_utf8(bytes) {
        Ok(text) => SocketEventKind::Frame(text),
        Err(e) => SocketEventKind::Undecodable(format!("binary frame is not UTF-8: {}", e)),
    }
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// Reports the same configured fix on a fixed interval, per subscription.
pub struct FixedSensor {
    coords: Coordinates,
    interval: Duration,
    watches: DashMap<WatchHandle, CancellationToken>,
}

impl FixedSensor {
    pub fn new(coords: Coordinates, interval: Duration) -> Self {
        Self {
            coords,
            interval,
            watches: DashMap::new(),
        }
    }

    pub fn active_watches(&self) -> usize {
        self.watches.len()
    }
}

impl LocationSensor for FixedSensor {
    fn watch(&self, events: mpsc::UnboundedSender<SensorEvent>) -> WatchHandle {
        let handle = WatchHandle::new();
        let token = CancellationToken::new();
        self.watches.insert(handle, token.clone());

        let coords = self.coords.clone();
        let interval = self.interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let position = Position {
                            coords: coords.clone(),
                            timestamp: chrono::Utc::now().timestamp_millis(),
                        };
                        let event = SensorEvent {
                            handle,
                            kind: SensorEventKind::Position(position),
                        };
                        if events.send(event).is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("Fixed sensor watch {} ended", handle);
        });
        handle
    }

    fn clear_watch(&self, handle: WatchHandle) {
        if let Some((_, token)) = self.watches.remove(&handle) {
            token.cancel();
        }
    }
}
