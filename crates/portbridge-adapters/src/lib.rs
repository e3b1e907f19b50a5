//! Portbridge Adapters - host-facing ports bound to the core's channel

pub mod bridge;
pub mod geolocation;
pub mod mock;
pub mod native;
pub mod network;
pub mod socket;
pub mod storage;

pub use bridge::{Bridge, Hosts};
pub use geolocation::{LocationSensor, LocationWatcher, SensorEvent, SensorEventKind, StartOutcome};
pub use network::{NetworkEvent, NetworkFlag, NetworkStatus};
pub use socket::{
    ConnectionId, OpenOutcome, SkipReason, SocketChannel, SocketConnector, SocketError,
    SocketEvent, SocketEventKind, SocketHandle,
};
pub use storage::{MemoryStore, SessionStore, StorageAdapter, TOKEN_KEY};
