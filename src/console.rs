//! Console core: drives the ports from stdin and prints every event to stdout
//!
//! Each input line is one `{"port": ..., "value": ...}` frame. Besides the
//! intent ports it understands three host controls:
//!   { "port": "network", "value": false }
//!   { "port": "mapAttribute", "value": { "name": "zoom", "value": "5" } }
//!   { "port": "mapGesture", "value": { "longitude": 2.3, "latitude": 48.8, ... } }

use anyhow::{bail, Context, Result};
use portbridge_adapters::NetworkFlag;
use portbridge_core::*;
use portbridge_map::{DomEvent, MockSurface};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const NETWORK: &str = "network";
pub const MAP_ATTRIBUTE: &str = "mapAttribute";
pub const MAP_GESTURE: &str = "mapGesture";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    GeolocationStart,
    GeolocationStop,
    SaveToken(String),
    Open,
    OpenAfterDelay(u64),
    SendMessage(Value),
    Network(bool),
    MapAttribute { name: String, value: Option<String> },
    MapGesture(MapViewState),
}

#[derive(Deserialize)]
struct AttributeChange {
    name: String,
    #[serde(default)]
    value: Option<String>,
}

pub fn parse_line(line: &str) -> Result<ConsoleInput> {
    let frame: ConsoleFrame = serde_json::from_str(line).context("not a console frame")?;
    let value = frame.value;
    let input = match frame.port.as_str() {
        GEOLOCATION_START => ConsoleInput::GeolocationStart,
        GEOLOCATION_STOP => ConsoleInput::GeolocationStop,
        SAVE_TOKEN => ConsoleInput::SaveToken(
            serde_json::from_value(value).context("saveToken takes a string")?,
        ),
        OPEN => ConsoleInput::Open,
        OPEN_AFTER_DELAY => ConsoleInput::OpenAfterDelay(
            serde_json::from_value(value).context("openAfterDelay takes milliseconds")?,
        ),
        SEND_MESSAGE => ConsoleInput::SendMessage(value),
        NETWORK => ConsoleInput::Network(
            serde_json::from_value(value).context("network takes a boolean")?,
        ),
        MAP_ATTRIBUTE => {
            let change: AttributeChange =
                serde_json::from_value(value).context("mapAttribute takes {name, value}")?;
            ConsoleInput::MapAttribute {
                name: change.name,
                value: change.value,
            }
        }
        MAP_GESTURE => ConsoleInput::MapGesture(
            serde_json::from_value(value).context("mapGesture takes a camera")?,
        ),
        other => bail!("unknown port: {}", other),
    };
    Ok(input)
}

/// Serialize one outgoing frame.
pub fn render<T: Serialize>(port: &str, value: &T) -> Result<String> {
    let frame = ConsoleFrame::new(port, serde_json::to_value(value)?);
    Ok(serde_json::to_string(&frame)?)
}

fn print<T: Serialize>(port: &str, value: &T) {
    match render(port, value) {
        Ok(line) => println!("{}", line),
        Err(e) => warn!("Failed to render {} event: {}", port, e),
    }
}

/// Everything the console pushes into.
struct Controls {
    geolocation_start: IntentSender<()>,
    geolocation_stop: IntentSender<()>,
    save_token: IntentSender<String>,
    open: IntentSender<()>,
    open_after_delay: IntentSender<u64>,
    send_message: IntentSender<Value>,
    network: NetworkFlag,
    dom: mpsc::UnboundedSender<DomEvent>,
    surface: MockSurface,
}

impl Controls {
    fn dispatch(&self, input: ConsoleInput) -> Result<()> {
        debug!("Console input: {:?}", input);
        match input {
            ConsoleInput::GeolocationStart => self.geolocation_start.send(())?,
            ConsoleInput::GeolocationStop => self.geolocation_stop.send(())?,
            ConsoleInput::SaveToken(token) => self.save_token.send(token)?,
            ConsoleInput::Open => self.open.send(())?,
            ConsoleInput::OpenAfterDelay(ms) => self.open_after_delay.send(ms)?,
            ConsoleInput::SendMessage(value) => self.send_message.send(value)?,
            ConsoleInput::Network(online) => self.network.set_online(online),
            ConsoleInput::MapAttribute { name, value } => {
                self.dom.send(DomEvent::AttributeChanged { name, value })?
            }
            ConsoleInput::MapGesture(view) => {
                self.surface.set_camera(view);
                self.dom.send(DomEvent::CameraChanged)?;
            }
        }
        Ok(())
    }
}

pub struct Console {
    core: CorePorts,
    network: NetworkFlag,
    dom: mpsc::UnboundedSender<DomEvent>,
    surface: MockSurface,
    map_position: EventReceiver<MapViewState>,
}

impl Console {
    pub fn new(
        core: CorePorts,
        network: NetworkFlag,
        dom: mpsc::UnboundedSender<DomEvent>,
        surface: MockSurface,
        map_position: EventReceiver<MapViewState>,
    ) -> Self {
        Self {
            core,
            network,
            dom,
            surface,
            map_position,
        }
    }

    /// Pump stdin and the event pipes until stdin closes or `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let CorePorts {
            geolocation_start,
            geolocation_stop,
            save_token,
            open,
            open_after_delay,
            send_message,
            mut geolocation_update,
            mut opened,
            mut closed,
            mut went_offline,
            mut went_online,
            mut received_message,
            mut receive_failed,
            mut send_failed,
            mut storage_failed,
        } = self.core;
        let controls = Controls {
            geolocation_start,
            geolocation_stop,
            save_token,
            open,
            open_after_delay,
            send_message,
            network: self.network,
            dom: self.dom,
            surface: self.surface,
        };
        let mut map_position = self.map_position;
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        info!("Console ready, reading frames from stdin");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                line = lines.next_line() => {
                    let Some(line) = line.context("reading stdin")? else {
                        info!("stdin closed");
                        break;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    if let Err(e) = parse_line(&line).and_then(|input| controls.dispatch(input)) {
                        warn!("Rejected console frame: {:#}", e);
                    }
                }
                Some(msg) = geolocation_update.recv() => print(GEOLOCATION_UPDATE, &msg),
                Some(()) = opened.recv() => print(OPENED, &()),
                Some(()) = closed.recv() => print(CLOSED, &()),
                Some(()) = went_offline.recv() => print(WENT_OFFLINE, &()),
                Some(()) = went_online.recv() => print(WENT_ONLINE, &()),
                Some(value) = received_message.recv() => print(RECEIVED_MESSAGE, &value),
                Some(reason) = receive_failed.recv() => print(RECEIVE_FAILED, &reason),
                Some(value) = send_failed.recv() => print(SEND_FAILED, &value),
                Some(reason) = storage_failed.recv() => print(STORAGE_FAILED, &reason),
                Some(view) = map_position.recv() => print(MAP_POSITION_CHANGE, &view),
            }
        }
        Ok(())
    }
}
