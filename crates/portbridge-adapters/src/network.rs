//! Host network availability

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Online/offline notification raised by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    Online,
    Offline,
}

pub trait NetworkStatus: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Shared online flag. Flipping it raises one notification per transition.
#[derive(Clone)]
pub struct NetworkFlag {
    online: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<NetworkEvent>,
}

impl NetworkFlag {
    pub fn new(online: bool) -> (Self, mpsc::UnboundedReceiver<NetworkEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                online: Arc::new(AtomicBool::new(online)),
                events,
            },
            rx,
        )
    }

    pub fn set_online(&self, online: bool) {
        let was = self.online.swap(online, Ordering::SeqCst);
        if was == online {
            return;
        }
        let event = if online {
            NetworkEvent::Online
        } else {
            NetworkEvent::Offline
        };
        if self.events.send(event).is_err() {
            tracing::debug!("No listener for network event {:?}", event);
        }
    }
}

impl NetworkStatus for NetworkFlag {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
