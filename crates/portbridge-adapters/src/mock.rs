//! Scriptable host doubles for the socket and the location sensor.
//!
//! Both record what the adapters asked of them and let a test raise host
//! callbacks by hand.

use crate::geolocation::{LocationSensor, SensorEvent, SensorEventKind};
use crate::socket::{ConnectionId, SocketConnector, SocketError, SocketEvent, SocketEventKind, SocketHandle};
use portbridge_core::{Position, SensorErrorCode, WatchHandle};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Socket
// ---------------------------------------------------------------------------

struct MockConnection {
    id: ConnectionId,
    url: String,
    sent: Vec<String>,
    closed: bool,
    events: mpsc::UnboundedSender<SocketEvent>,
}

#[derive(Default)]
struct MockSocketState {
    connections: Vec<MockConnection>,
    refuse: bool,
}

#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<MockSocketState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockSocketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `connect` calls fail synchronously.
    pub fn refuse_connections(&self, refuse: bool) {
        self.lock().refuse = refuse;
    }

    pub fn connect_count(&self) -> usize {
        self.lock().connections.len()
    }

    /// Connections neither closed by the adapter nor by the host.
    pub fn live_count(&self) -> usize {
        self.lock().connections.iter().filter(|c| !c.closed).count()
    }

    pub fn last_id(&self) -> Option<ConnectionId> {
        self.lock().connections.last().map(|c| c.id)
    }

    pub fn url(&self, id: ConnectionId) -> Option<String> {
        self.lock()
            .connections
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.url.clone())
    }

    pub fn sent(&self, id: ConnectionId) -> Vec<String> {
        self.lock()
            .connections
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.sent.clone())
            .unwrap_or_default()
    }

    pub fn is_closed(&self, id: ConnectionId) -> bool {
        self.lock()
            .connections
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.closed)
            .unwrap_or(true)
    }

    /// Raise a host callback on connection `id`.
    pub fn emit(&self, id: ConnectionId, kind: SocketEventKind) {
        let mut state = self.lock();
        let Some(conn) = state.connections.iter_mut().find(|c| c.id == id) else {
            return;
        };
        if matches!(kind, SocketEventKind::Error(_) | SocketEventKind::Closed) {
            conn.closed = true;
        }
        let _ = conn.events.send(SocketEvent { conn: id, kind });
    }

    /// Complete the handshake of the most recent connection.
    pub fn accept_last(&self) -> Option<ConnectionId> {
        let id = self.last_id()?;
        self.emit(id, SocketEventKind::Opened);
        Some(id)
    }
}

struct MockHandle {
    id: ConnectionId,
    state: Arc<Mutex<MockSocketState>>,
}

impl SocketHandle for MockHandle {
    fn send_text(&mut self, text: String) -> Result<(), SocketError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.connections.iter_mut().find(|c| c.id == self.id) {
            Some(conn) if !conn.closed => {
                conn.sent.push(text);
                Ok(())
            }
            _ => Err(SocketError::Disconnected),
        }
    }

    fn close(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(conn) = state.connections.iter_mut().find(|c| c.id == self.id) {
            conn.closed = true;
        }
    }
}

impl SocketConnector for MockConnector {
    fn connect(
        &self,
        url: &str,
        conn: ConnectionId,
        events: mpsc::UnboundedSender<SocketEvent>,
    ) -> Result<Box<dyn SocketHandle>, SocketError> {
        let mut state = self.lock();
        if state.refuse {
            return Err(SocketError::ConnectFailed(format!("refused: {}", url)));
        }
        state.connections.push(MockConnection {
            id: conn,
            url: url.to_string(),
            sent: Vec::new(),
            closed: false,
            events,
        });
        Ok(Box::new(MockHandle {
            id: conn,
            state: self.state.clone(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Location sensor
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MockSensorState {
    senders: HashMap<WatchHandle, mpsc::UnboundedSender<SensorEvent>>,
    active: HashSet<WatchHandle>,
    cleared: Vec<WatchHandle>,
    watch_calls: usize,
}

#[derive(Clone, Default)]
pub struct MockSensor {
    state: Arc<Mutex<MockSensorState>>,
}

impl MockSensor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockSensorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn watch_calls(&self) -> usize {
        self.lock().watch_calls
    }

    pub fn active(&self) -> Vec<WatchHandle> {
        self.lock().active.iter().copied().collect()
    }

    pub fn cleared(&self) -> Vec<WatchHandle> {
        self.lock().cleared.clone()
    }

    /// Raise a position callback, even for a handle that was cleared.
    pub fn emit_position(&self, handle: WatchHandle, position: Position) {
        self.emit(handle, SensorEventKind::Position(position));
    }

    pub fn emit_error(&self, handle: WatchHandle, code: SensorErrorCode) {
        self.emit(handle, SensorEventKind::Error(code));
    }

    fn emit(&self, handle: WatchHandle, kind: SensorEventKind) {
        if let Some(tx) = self.lock().senders.get(&handle) {
            let _ = tx.send(SensorEvent { handle, kind });
        }
    }
}

impl LocationSensor for MockSensor {
    fn watch(&self, events: mpsc::UnboundedSender<SensorEvent>) -> WatchHandle {
        let handle = WatchHandle::new();
        let mut state = self.lock();
        state.watch_calls += 1;
        state.senders.insert(handle, events);
        state.active.insert(handle);
        handle
    }

    fn clear_watch(&self, handle: WatchHandle) {
        let mut state = self.lock();
        if state.active.remove(&handle) {
            state.cleared.push(handle);
        }
    }
}
