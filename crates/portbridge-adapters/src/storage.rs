//! Session-scoped token storage
//!
//! One opaque token under a fixed key. Reads are synchronous and happen
//! before the core starts (startup flags); writes come in via `saveToken`.

use dashmap::DashMap;
use portbridge_core::{Inbound, Result, StorageError, StoragePorts, Subscription};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Key the credential token is stored under.
pub const TOKEN_KEY: &str = "user";

/// Host key/value store scoped to one session.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> std::result::Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> std::result::Result<(), StorageError>;
}

/// In-process session store with an optional byte quota over keys and values.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: Option<usize>) -> Self {
        Self {
            entries: DashMap::new(),
            quota,
        }
    }

    pub fn used_bytes(&self) -> usize {
        self.entries
            .iter()
            .map(|e| e.key().len() + e.value().len())
            .sum()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> std::result::Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> std::result::Result<(), StorageError> {
        if let Some(quota) = self.quota {
            let others: usize = self
                .entries
                .iter()
                .filter(|e| e.key() != key)
                .map(|e| e.key().len() + e.value().len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    quota,
                });
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Reads and writes the session token.
#[derive(Clone)]
pub struct StorageAdapter {
    store: Arc<dyn SessionStore>,
}

impl StorageAdapter {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn get_token(&self) -> std::result::Result<Option<String>, StorageError> {
        self.store.get(TOKEN_KEY)
    }

    pub fn save_token(&self, token: &str) -> std::result::Result<(), StorageError> {
        self.store.set(TOKEN_KEY, token)
    }

    /// Subscribe to `saveToken` and start the write loop.
    pub fn bind(self, mut ports: StoragePorts, cancel: CancellationToken) -> Result<JoinHandle<()>> {
        let save = ports.save_token.subscribe()?;
        Ok(tokio::spawn(self.run(save, ports.storage_failed, cancel)))
    }

    async fn run(
        self,
        mut save: Subscription<String>,
        failed: Inbound<String>,
        cancel: CancellationToken,
    ) {
        info!("Storage port bound");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                token = save.recv() => match token {
                    Some(token) => self.handle_save(&token, &failed),
                    None => {
                        debug!("saveToken closed, storage port stopping");
                        break;
                    }
                },
            }
        }
    }

    /// Write one token, reporting a failure to the core.
    pub fn handle_save(&self, token: &str, failed: &Inbound<String>) {
        match self.save_token(token) {
            Ok(()) => debug!("Token saved ({} bytes)", token.len()),
            Err(e) => {
                warn!("Failed to save token: {}", e);
                failed.emit(e.to_string());
            }
        }
    }
}
