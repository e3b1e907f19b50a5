//! Error types for Portbridge

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("socket not ready: {0}")]
    NotReady(String),

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// How a failure is treated at the bridge boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fatal at startup: missing or invalid endpoint, bad config.
    Configuration,
    /// Reported to the core as an event; the adapter keeps running.
    TransientIo,
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn not_ready(message: impl Into<String>) -> Self {
        Self::NotReady(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::Channel(ChannelError::AlreadySubscribed(_)) => ErrorKind::Configuration,
            _ => ErrorKind::TransientIo,
        }
    }
}

/// Failures of a named pipe.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("port {0} already has a subscriber")]
    AlreadySubscribed(&'static str),

    #[error("port {0} is disconnected")]
    Disconnected(&'static str),
}

/// Failures of the session store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("quota exceeded writing {key}: {needed} bytes exceeds quota of {quota}")]
    QuotaExceeded {
        key: String,
        needed: usize,
        quota: usize,
    },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
