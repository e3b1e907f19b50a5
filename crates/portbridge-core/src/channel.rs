//! Named, typed, one-directional pipes between the core and the adapters
//!
//! `outbound` pipes carry intents core → adapter and accept exactly one
//! subscriber. `inbound` pipes carry events adapter → core. Both preserve
//! send order and never drop a message without telling the sender.

use crate::error::ChannelError;
use tokio::sync::mpsc;

/// Create an outbound (core → adapter) pipe.
pub fn outbound<T>(name: &'static str) -> (IntentSender<T>, Outbound<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        IntentSender { name, tx },
        Outbound {
            name,
            rx: Some(rx),
        },
    )
}

/// Create an inbound (adapter → core) pipe.
pub fn inbound<T>(name: &'static str) -> (Inbound<T>, EventReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Inbound { name, tx }, EventReceiver { name, rx })
}

// ---------------------------------------------------------------------------
// Core → adapter
// ---------------------------------------------------------------------------

/// Core-side handle used to issue intents.
pub struct IntentSender<T> {
    name: &'static str,
    tx: mpsc::UnboundedSender<T>,
}

impl<T> Clone for IntentSender<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
        }
    }
}

impl<T> IntentSender<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn send(&self, value: T) -> Result<(), ChannelError> {
        self.tx
            .send(value)
            .map_err(|_| ChannelError::Disconnected(self.name))
    }
}

/// Adapter-side end of an intent pipe.
pub struct Outbound<T> {
    name: &'static str,
    rx: Option<mpsc::UnboundedReceiver<T>>,
}

impl<T> Outbound<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register the single handler for this pipe. A second call fails.
    pub fn subscribe(&mut self) -> Result<Subscription<T>, ChannelError> {
        match self.rx.take() {
            Some(rx) => Ok(Subscription {
                name: self.name,
                rx,
            }),
            None => Err(ChannelError::AlreadySubscribed(self.name)),
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.rx.is_none()
    }
}

/// The registered handler seat of an outbound pipe.
pub struct Subscription<T> {
    name: &'static str,
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Next intent, in send order. `None` once the core has gone away.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

// ---------------------------------------------------------------------------
// Adapter → core
// ---------------------------------------------------------------------------

/// Adapter-side handle used to push events to the core.
pub struct Inbound<T> {
    name: &'static str,
    tx: mpsc::UnboundedSender<T>,
}

impl<T> Clone for Inbound<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
        }
    }
}

impl<T> Inbound<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Enqueue for immediate delivery. Fails if the core side is gone.
    pub fn send(&self, value: T) -> Result<(), ChannelError> {
        self.tx
            .send(value)
            .map_err(|_| ChannelError::Disconnected(self.name))
    }

    /// Send, logging a delivery failure instead of returning it.
    pub fn emit(&self, value: T) -> bool {
        match self.send(value) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Dropped event: {}", e);
                false
            }
        }
    }
}

/// Core-side end of an event pipe.
pub struct EventReceiver<T> {
    name: &'static str,
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> EventReceiver<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Everything queued right now, in send order.
    pub fn drain(&mut self) -> Vec<T> {
        let mut out = Vec::new();
        while let Ok(v) = self.rx.try_recv() {
            out.push(v);
        }
        out
    }
}
