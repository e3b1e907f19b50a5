//! Binds every adapter to the port set, once per session

use crate::geolocation::{LocationSensor, LocationWatcher};
use crate::network::{NetworkEvent, NetworkStatus};
use crate::socket::{SocketChannel, SocketConnector};
use crate::storage::{SessionStore, StorageAdapter};
use portbridge_core::{BridgeConfig, BridgePorts, Result, SocketPorts};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Host implementations the adapters run against.
pub struct Hosts {
    pub connector: Arc<dyn SocketConnector>,
    pub sensor: Arc<dyn LocationSensor>,
    pub store: Arc<dyn SessionStore>,
    pub network: Arc<dyn NetworkStatus>,
    pub network_events: mpsc::UnboundedReceiver<NetworkEvent>,
}

/// Running adapters. Dropping it leaves them running; call `shutdown`.
pub struct Bridge {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Bridge {
    /// Subscribe every adapter to its intents and start them.
    ///
    /// Fails if any intent pipe already has a subscriber.
    pub fn bind(config: &BridgeConfig, ports: BridgePorts, hosts: Hosts) -> Result<Self> {
        let cancel = CancellationToken::new();
        // Cancels adapters already spawned if a later bind fails.
        let guard = cancel.clone().drop_guard();
        let mut tasks = Vec::with_capacity(3);

        let storage = StorageAdapter::new(hosts.store);
        tasks.push(storage.bind(ports.storage, cancel.child_token())?);

        let SocketPorts {
            open,
            open_after_delay,
            send_message,
            events,
        } = ports.socket;
        let socket = SocketChannel::new(
            config.endpoints.socket_url.clone(),
            hosts.connector,
            hosts.network,
            events,
        );
        tasks.push(socket.bind(
            open,
            open_after_delay,
            send_message,
            hosts.network_events,
            cancel.child_token(),
        )?);

        let watcher = LocationWatcher::new(
            hosts.sensor,
            config.geolocation.max_subscriptions,
            ports.geolocation.update,
        );
        tasks.push(watcher.bind(
            ports.geolocation.start,
            ports.geolocation.stop,
            cancel.child_token(),
        )?);

        guard.disarm();
        info!("Bridge bound ({} adapters)", tasks.len());
        Ok(Self { cancel, tasks })
    }

    /// Stop every adapter and wait for them to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Adapter task failed: {}", e);
            }
        }
        info!("Bridge shut down");
    }
}
