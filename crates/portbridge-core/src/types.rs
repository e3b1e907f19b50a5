//! Core types for Portbridge

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Zoom used when the host element declares none.
pub const DEFAULT_ZOOM: f64 = 3.0;

/// Camera of the map widget.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapViewState {
    pub longitude: f64,
    pub latitude: f64,
    pub zoom: f64,
    pub rotation: f64,
    pub pitch: f64,
}

impl Default for MapViewState {
    fn default() -> Self {
        Self {
            longitude: 0.0,
            latitude: 0.0,
            zoom: DEFAULT_ZOOM,
            rotation: 0.0,
            pitch: 0.0,
        }
    }
}

impl MapViewState {
    /// Field-by-field comparison. An `epsilon` of zero means exact equality.
    pub fn matches(&self, other: &MapViewState, epsilon: f64) -> bool {
        let eq = |a: f64, b: f64| {
            if epsilon > 0.0 {
                (a - b).abs() <= epsilon
            } else {
                a == b
            }
        };
        eq(self.longitude, other.longitude)
            && eq(self.latitude, other.latitude)
            && eq(self.zoom, other.zoom)
            && eq(self.rotation, other.rotation)
            && eq(self.pitch, other.pitch)
    }
}

/// A longitude/latitude pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub longitude: f64,
    pub latitude: f64,
}

impl LngLat {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }
}

/// Socket lifecycle. `Connecting` and `Closing` are transient.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Closed,
    Connecting,
    Open,
    Closing,
}

impl ConnectionState {
    /// Whether a fresh connection may be started from this state.
    pub fn can_open(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Closed => "closed",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
        };
        f.write_str(s)
    }
}

/// Opaque identifier of one active location subscription.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct WatchHandle(Uuid);

impl WatchHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WatchHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Location fix as reported by the host sensor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    pub altitude: Option<f64>,
    pub altitude_accuracy: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64, accuracy: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            altitude: None,
            altitude_accuracy: None,
            heading: None,
            speed: None,
        }
    }
}

/// A fix plus its millisecond epoch timestamp.
#[derive(Clone, Debug, PartialEq)]
pub struct Position {
    pub coords: Coordinates,
    pub timestamp: i64,
}

/// Host geolocation error codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum SensorErrorCode {
    PermissionDenied = 1,
    PositionUnavailable = 2,
    Timeout = 3,
}

impl SensorErrorCode {
    pub fn code(self) -> u16 {
        self as u16
    }
}
