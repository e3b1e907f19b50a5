//! Portbridge Core - channel, wire types, configuration, and error handling

pub mod channel;
pub mod config;
pub mod error;
pub mod flags;
pub mod ports;
pub mod protocol;
pub mod types;

pub use channel::{inbound, outbound, EventReceiver, Inbound, IntentSender, Outbound, Subscription};
pub use config::BridgeConfig;
pub use error::{ChannelError, Error, ErrorKind, Result, StorageError};
pub use flags::{Features, StartupFlags};
pub use ports::*;
pub use protocol::*;
pub use types::*;
