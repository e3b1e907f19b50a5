//! Socket channel: one logical connection and its lifecycle
//!
//! State machine:
//!
//!   Closed ──open()──▶ Connecting ──host open──▶ Open
//!     ▲                    │                        │
//!     │◀── host error/close┘                        │ offline / host error / host close
//!     └───────────────── Closing ◀──────────────────┘
//!
//! `open()` only starts a connection from `Closed` while the host is online;
//! anything else is a skip, never an error. Every connection carries a
//! generation id and host events for an older generation are ignored, so a
//! connection produces at most one `closed` event.

use crate::network::{NetworkEvent, NetworkStatus};
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use portbridge_core::{ConnectionState, Error, Outbound, Result, SocketEvents, Subscription};
use serde_json::Value;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SocketError {
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("connection is gone")]
    Disconnected,
}

/// Generation id of one underlying connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Callback raised by the host socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketEvent {
    pub conn: ConnectionId,
    pub kind: SocketEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEventKind {
    Opened,
    Frame(String),
    /// A frame arrived that could not be decoded as text.
    Undecodable(String),
    Error(String),
    Closed,
}

/// A live host socket.
pub trait SocketHandle: Send {
    fn send_text(&mut self, text: String) -> std::result::Result<(), SocketError>;
    fn close(&mut self);
}

/// Creates host sockets. Lifecycle callbacks go to `events`, tagged with `conn`.
pub trait SocketConnector: Send + Sync {
    fn connect(
        &self,
        url: &str,
        conn: ConnectionId,
        events: mpsc::UnboundedSender<SocketEvent>,
    ) -> std::result::Result<Box<dyn SocketHandle>, SocketError>;
}

/// Why `open()` did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyConnecting,
    AlreadyOpen,
    Closing,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    Started(ConnectionId),
    Skipped(SkipReason),
    /// The host refused to create a socket. A `closed` event was sent.
    Failed(String),
}

struct ActiveConnection {
    id: ConnectionId,
    handle: Box<dyn SocketHandle>,
}

pub struct SocketChannel {
    url: String,
    connector: Arc<dyn SocketConnector>,
    network: Arc<dyn NetworkStatus>,
    state: ConnectionState,
    active: Option<ActiveConnection>,
    next_id: u64,
    events_tx: mpsc::UnboundedSender<SocketEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<SocketEvent>>,
    out: SocketEvents,
}

impl SocketChannel {
    pub fn new(
        url: impl Into<String>,
        connector: Arc<dyn SocketConnector>,
        network: Arc<dyn NetworkStatus>,
        out: SocketEvents,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            url: url.into(),
            connector,
            network,
            state: ConnectionState::Closed,
            active: None,
            next_id: 0,
            events_tx,
            events_rx: Some(events_rx),
            out,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.active.as_ref().map(|a| a.id)
    }

    pub fn open(&mut self) -> OpenOutcome {
        let skip = match self.state {
            ConnectionState::Open => Some(SkipReason::AlreadyOpen),
            ConnectionState::Connecting => Some(SkipReason::AlreadyConnecting),
            ConnectionState::Closing => Some(SkipReason::Closing),
            ConnectionState::Closed if !self.network.is_online() => Some(SkipReason::Offline),
            ConnectionState::Closed => None,
        };
        if let Some(reason) = skip {
            debug!("Can't open socket: {:?} (state {})", reason, self.state);
            return OpenOutcome::Skipped(reason);
        }

        self.next_id += 1;
        let id = ConnectionId(self.next_id);
        info!("Opening socket to {} ({})", self.url, id);
        match self.connector.connect(&self.url, id, self.events_tx.clone()) {
            Ok(handle) => {
                self.active = Some(ActiveConnection { id, handle });
                self.state = ConnectionState::Connecting;
                OpenOutcome::Started(id)
            }
            Err(e) => {
                warn!("Socket connect to {} failed: {}", self.url, e);
                self.state = ConnectionState::Closed;
                self.out.closed.emit(());
                OpenOutcome::Failed(e.to_string())
            }
        }
    }

    /// Serialize and transmit. Only succeeds while `Open`.
    pub fn send_message(&mut self, msg: &Value) -> Result<()> {
        match (self.state, self.active.as_mut()) {
            (ConnectionState::Open, Some(active)) => {
                let text = serde_json::to_string(msg)?;
                active
                    .handle
                    .send_text(text)
                    .map_err(|e| Error::not_ready(e.to_string()))
            }
            (state, _) => Err(Error::not_ready(format!("socket is {}", state))),
        }
    }

    /// `sendMessage` intent: transmit, or hand the message back as `sendFailed`.
    pub fn deliver(&mut self, msg: Value) -> bool {
        match self.send_message(&msg) {
            Ok(()) => true,
            Err(e) => {
                warn!("Can't send message: {}", e);
                self.out.send_failed.emit(msg);
                false
            }
        }
    }

    pub fn handle_socket_event(&mut self, event: SocketEvent) {
        if self.connection_id() != Some(event.conn) {
            debug!("Ignoring {:?} from stale {}", event.kind, event.conn);
            return;
        }
        match event.kind {
            SocketEventKind::Opened => {
                if self.state == ConnectionState::Connecting {
                    self.state = ConnectionState::Open;
                    info!("Socket open ({})", event.conn);
                    self.out.opened.emit(());
                }
            }
            SocketEventKind::Frame(text) => self.receive(&text),
            SocketEventKind::Undecodable(reason) => {
                warn!("Undecodable frame: {}", reason);
                self.out.receive_failed.emit(reason);
            }
            SocketEventKind::Error(reason) => {
                warn!("Socket closed because of error: {}", reason);
                self.finish_close();
            }
            SocketEventKind::Closed => {
                info!("Socket closed ({})", event.conn);
                self.finish_close();
            }
        }
    }

    pub fn handle_network_event(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::Offline => {
                info!("Network went offline");
                self.out.went_offline.emit(());
                self.force_close("network offline");
            }
            NetworkEvent::Online => {
                info!("Network back online");
                self.out.went_online.emit(());
            }
        }
    }

    /// Close the current connection now. Returns false when there is none.
    pub fn force_close(&mut self, reason: &str) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        self.state = ConnectionState::Closing;
        info!("Closing socket {}: {}", active.id, reason);
        active.handle.close();
        self.finish_close();
        true
    }

    /// Handle every host callback already queued.
    pub fn process_pending(&mut self) -> usize {
        let mut queued = Vec::new();
        if let Some(rx) = self.events_rx.as_mut() {
            while let Ok(event) = rx.try_recv() {
                queued.push(event);
            }
        }
        let count = queued.len();
        for event in queued {
            self.handle_socket_event(event);
        }
        count
    }

    fn receive(&mut self, text: &str) {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => {
                debug!("Received message ({} bytes)", text.len());
                self.out.received_message.emit(value);
            }
            Err(e) => {
                warn!("Malformed frame: {}", e);
                self.out.receive_failed.emit(e.to_string());
            }
        }
    }

    fn finish_close(&mut self) {
        self.active = None;
        self.state = ConnectionState::Closed;
        self.out.closed.emit(());
    }

    /// Drop the connection without telling the core (bridge teardown).
    fn shutdown(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.handle.close();
        }
        self.state = ConnectionState::Closed;
    }

    /// Subscribe to the socket intents, open once, and run the channel.
    pub fn bind(
        self,
        mut open: Outbound<()>,
        mut open_after_delay: Outbound<u64>,
        mut send_message: Outbound<Value>,
        network_events: mpsc::UnboundedReceiver<NetworkEvent>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<()>> {
        let open = open.subscribe()?;
        let open_after_delay = open_after_delay.subscribe()?;
        let send_message = send_message.subscribe()?;
        Ok(tokio::spawn(self.run(
            open,
            open_after_delay,
            send_message,
            network_events,
            cancel,
        )))
    }

    async fn run(
        mut self,
        mut open: Subscription<()>,
        mut open_after_delay: Subscription<u64>,
        mut send_message: Subscription<Value>,
        mut network_events: mpsc::UnboundedReceiver<NetworkEvent>,
        cancel: CancellationToken,
    ) {
        let Some(mut socket_events) = self.events_rx.take() else {
            warn!("Socket channel already running");
            return;
        };
        // Delayed opens are independent and not cancellable once scheduled.
        let mut timers: FuturesUnordered<Pin<Box<Sleep>>> = FuturesUnordered::new();

        // A closed intent pipe only disables its own branch.
        let mut open_live = true;
        let mut delay_live = true;
        let mut send_live = true;

        info!("Socket port bound to {}", self.url);
        self.open();

        while open_live || delay_live || send_live {
            tokio::select! {
                _ = cancel.cancelled() => break,
                intent = open.recv(), if open_live => match intent {
                    Some(()) => {
                        self.open();
                    }
                    None => {
                        debug!("{} closed", open.name());
                        open_live = false;
                    }
                },
                delay = open_after_delay.recv(), if delay_live => match delay {
                    Some(ms) => {
                        info!("Opening socket after {} ms", ms);
                        timers.push(Box::pin(tokio::time::sleep(Duration::from_millis(ms))));
                    }
                    None => {
                        debug!("{} closed", open_after_delay.name());
                        delay_live = false;
                    }
                },
                msg = send_message.recv(), if send_live => match msg {
                    Some(msg) => {
                        self.deliver(msg);
                    }
                    None => {
                        debug!("{} closed", send_message.name());
                        send_live = false;
                    }
                },
                Some(()) = timers.next(), if !timers.is_empty() => {
                    self.open();
                }
                Some(event) = socket_events.recv() => self.handle_socket_event(event),
                Some(event) = network_events.recv() => self.handle_network_event(event),
            }
        }

        self.shutdown();
        debug!("Socket port stopped");
    }
}
