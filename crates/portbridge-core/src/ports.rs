//! The full set of named pipes for one session
//!
//! `PortSet::new()` creates every pipe at once and splits them into the
//! core's view (`CorePorts`) and the bridge's view (`BridgePorts`), which is
//! further grouped per adapter so each adapter can take ownership of its own.

use crate::channel::{inbound, outbound, EventReceiver, Inbound, IntentSender, Outbound};
use crate::protocol::*;
use serde_json::Value;

/// Pipes owned by the location watcher.
pub struct GeolocationPorts {
    pub start: Outbound<()>,
    pub stop: Outbound<()>,
    pub update: Inbound<LocationMessage>,
}

/// Pipes owned by the socket channel.
pub struct SocketPorts {
    pub open: Outbound<()>,
    pub open_after_delay: Outbound<u64>,
    pub send_message: Outbound<Value>,
    pub events: SocketEvents,
}

/// Events the socket channel pushes to the core.
#[derive(Clone)]
pub struct SocketEvents {
    pub opened: Inbound<()>,
    pub closed: Inbound<()>,
    pub went_offline: Inbound<()>,
    pub went_online: Inbound<()>,
    pub received_message: Inbound<Value>,
    pub receive_failed: Inbound<String>,
    pub send_failed: Inbound<Value>,
}

/// Pipes owned by the storage adapter.
pub struct StoragePorts {
    pub save_token: Outbound<String>,
    pub storage_failed: Inbound<String>,
}

/// Bridge side of every pipe.
pub struct BridgePorts {
    pub geolocation: GeolocationPorts,
    pub socket: SocketPorts,
    pub storage: StoragePorts,
}

/// Core side of every pipe.
pub struct CorePorts {
    pub geolocation_start: IntentSender<()>,
    pub geolocation_stop: IntentSender<()>,
    pub save_token: IntentSender<String>,
    pub open: IntentSender<()>,
    pub open_after_delay: IntentSender<u64>,
    pub send_message: IntentSender<Value>,

    pub geolocation_update: EventReceiver<LocationMessage>,
    pub opened: EventReceiver<()>,
    pub closed: EventReceiver<()>,
    pub went_offline: EventReceiver<()>,
    pub went_online: EventReceiver<()>,
    pub received_message: EventReceiver<Value>,
    pub receive_failed: EventReceiver<String>,
    pub send_failed: EventReceiver<Value>,
    pub storage_failed: EventReceiver<String>,
}

pub struct PortSet;

impl PortSet {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (CorePorts, BridgePorts) {
        let (geolocation_start, start) = outbound(GEOLOCATION_START);
        let (geolocation_stop, stop) = outbound(GEOLOCATION_STOP);
        let (save_token, save_token_rx) = outbound(SAVE_TOKEN);
        let (open, open_rx) = outbound(OPEN);
        let (open_after_delay, open_after_delay_rx) = outbound(OPEN_AFTER_DELAY);
        let (send_message, send_message_rx) = outbound(SEND_MESSAGE);

        let (update, geolocation_update) = inbound(GEOLOCATION_UPDATE);
        let (opened_tx, opened) = inbound(OPENED);
        let (closed_tx, closed) = inbound(CLOSED);
        let (went_offline_tx, went_offline) = inbound(WENT_OFFLINE);
        let (went_online_tx, went_online) = inbound(WENT_ONLINE);
        let (received_tx, received_message) = inbound(RECEIVED_MESSAGE);
        let (receive_failed_tx, receive_failed) = inbound(RECEIVE_FAILED);
        let (send_failed_tx, send_failed) = inbound(SEND_FAILED);
        let (storage_failed_tx, storage_failed) = inbound(STORAGE_FAILED);

        let core = CorePorts {
            geolocation_start,
            geolocation_stop,
            save_token,
            open,
            open_after_delay,
            send_message,
            geolocation_update,
            opened,
            closed,
            went_offline,
            went_online,
            received_message,
            receive_failed,
            send_failed,
            storage_failed,
        };

        let bridge = BridgePorts {
            geolocation: GeolocationPorts {
                start,
                stop,
                update,
            },
            socket: SocketPorts {
                open: open_rx,
                open_after_delay: open_after_delay_rx,
                send_message: send_message_rx,
                events: SocketEvents {
                    opened: opened_tx,
                    closed: closed_tx,
                    went_offline: went_offline_tx,
                    went_online: went_online_tx,
                    received_message: received_tx,
                    receive_failed: receive_failed_tx,
                    send_failed: send_failed_tx,
                },
            },
            storage: StoragePorts {
                save_token: save_token_rx,
                storage_failed: storage_failed_tx,
            },
        };

        (core, bridge)
    }
}
