//! Wire types exchanged with the application core
//!
//! Location updates (adapter → core):
//!   { "msgType": "Update", "coords": { "latitude": 1.0, ... }, "timestamp": 1700000000000, "errorCode": null }
//!   { "msgType": "Error", "coords": null, "timestamp": null, "errorCode": 1 }
//!
//! Console frames (both directions, one JSON object per line):
//!   { "port": "openAfterDelay", "value": 500 }
//!   { "port": "receivedMessage", "value": { "kind": "hello" } }

use crate::types::{Coordinates, Position, SensorErrorCode};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Port names
// ---------------------------------------------------------------------------

pub const GEOLOCATION_START: &str = "geolocationStart";
pub const GEOLOCATION_STOP: &str = "geolocationStop";
pub const SAVE_TOKEN: &str = "saveToken";
pub const OPEN: &str = "open";
pub const OPEN_AFTER_DELAY: &str = "openAfterDelay";
pub const SEND_MESSAGE: &str = "sendMessage";

pub const GEOLOCATION_UPDATE: &str = "geolocationUpdate";
pub const OPENED: &str = "opened";
pub const CLOSED: &str = "closed";
pub const WENT_OFFLINE: &str = "wentOffline";
pub const WENT_ONLINE: &str = "wentOnline";
pub const RECEIVED_MESSAGE: &str = "receivedMessage";
pub const RECEIVE_FAILED: &str = "receiveFailed";
pub const SEND_FAILED: &str = "sendFailed";
pub const STORAGE_FAILED: &str = "storageFailed";

/// Name of the widget event carrying the camera.
pub const MAP_POSITION_CHANGE: &str = "map-position-change";

// ---------------------------------------------------------------------------
// Location messages
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MsgType {
    Update,
    Error,
}

/// Payload of `geolocationUpdate`. Absent fields are serialized as `null`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationMessage {
    pub msg_type: MsgType,
    pub coords: Option<Coordinates>,
    pub timestamp: Option<i64>,
    pub error_code: Option<u16>,
}

impl LocationMessage {
    pub fn update(position: Position) -> Self {
        Self {
            msg_type: MsgType::Update,
            coords: Some(position.coords),
            timestamp: Some(position.timestamp),
            error_code: None,
        }
    }

    pub fn error(code: SensorErrorCode) -> Self {
        Self {
            msg_type: MsgType::Error,
            coords: None,
            timestamp: None,
            error_code: Some(code.code()),
        }
    }
}

// ---------------------------------------------------------------------------
// Console frames
// ---------------------------------------------------------------------------

/// One line of the console core protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsoleFrame {
    pub port: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl ConsoleFrame {
    pub fn new(port: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            port: port.into(),
            value,
        }
    }
}
