//! Continuous location watching
//!
//! Tracks the set of active sensor subscriptions. Every position or error
//! callback on a tracked handle becomes exactly one `geolocationUpdate`
//! message, sent immediately. Callbacks for handles that were cleared are
//! dropped.

use portbridge_core::{
    Inbound, LocationMessage, Outbound, Position, Result, SensorErrorCode, Subscription,
    WatchHandle,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Callback raised by the host sensor for one subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorEvent {
    pub handle: WatchHandle,
    pub kind: SensorEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SensorEventKind {
    Position(Position),
    Error(SensorErrorCode),
}

/// Host location sensor.
pub trait LocationSensor: Send + Sync {
    /// Begin a continuous subscription delivering callbacks to `events`.
    fn watch(&self, events: mpsc::UnboundedSender<SensorEvent>) -> WatchHandle;
    fn clear_watch(&self, handle: WatchHandle);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started(WatchHandle),
    /// The subscription cap is reached; nothing was requested.
    AtCapacity,
}

pub struct LocationWatcher {
    sensor: Arc<dyn LocationSensor>,
    handles: HashSet<WatchHandle>,
    max_subscriptions: usize,
    events_tx: mpsc::UnboundedSender<SensorEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<SensorEvent>>,
    update: Inbound<LocationMessage>,
}

impl LocationWatcher {
    pub fn new(
        sensor: Arc<dyn LocationSensor>,
        max_subscriptions: usize,
        update: Inbound<LocationMessage>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            sensor,
            handles: HashSet::new(),
            max_subscriptions: max_subscriptions.max(1),
            events_tx,
            events_rx: Some(events_rx),
            update,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.handles.len()
    }

    pub fn start(&mut self) -> StartOutcome {
        if self.handles.len() >= self.max_subscriptions {
            info!(
                "Location watch not started: {} of {} subscriptions active",
                self.handles.len(),
                self.max_subscriptions
            );
            return StartOutcome::AtCapacity;
        }
        let handle = self.sensor.watch(self.events_tx.clone());
        self.handles.insert(handle);
        info!("Location watching started ({})", handle);
        StartOutcome::Started(handle)
    }

    /// Clear every tracked subscription. Returns how many were cleared.
    pub fn stop(&mut self) -> usize {
        if self.handles.is_empty() {
            return 0;
        }
        info!("Stopping location watching ({} active)", self.handles.len());
        let count = self.handles.len();
        for handle in self.handles.drain() {
            self.sensor.clear_watch(handle);
        }
        count
    }

    /// Translate one sensor callback. Returns whether a message was sent.
    pub fn handle_sensor_event(&mut self, event: SensorEvent) -> bool {
        if !self.handles.contains(&event.handle) {
            debug!("Ignoring callback for cleared watch {}", event.handle);
            return false;
        }
        let msg = match event.kind {
            SensorEventKind::Position(position) => {
                debug!(
                    "Position update {:.5},{:.5}",
                    position.coords.latitude, position.coords.longitude
                );
                LocationMessage::update(position)
            }
            SensorEventKind::Error(code) => {
                warn!("Position error {:?}", code);
                LocationMessage::error(code)
            }
        };
        self.update.emit(msg)
    }

    /// Handle every callback already queued by the sensor.
    pub fn process_pending(&mut self) -> usize {
        let mut queued = Vec::new();
        if let Some(rx) = self.events_rx.as_mut() {
            while let Ok(event) = rx.try_recv() {
                queued.push(event);
            }
        }
        let mut sent = 0;
        for event in queued {
            if self.handle_sensor_event(event) {
                sent += 1;
            }
        }
        sent
    }

    /// Subscribe to the start/stop intents and run the watcher.
    pub fn bind(
        self,
        mut start: Outbound<()>,
        mut stop: Outbound<()>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<()>> {
        let start = start.subscribe()?;
        let stop = stop.subscribe()?;
        Ok(tokio::spawn(self.run(start, stop, cancel)))
    }

    async fn run(
        mut self,
        mut start: Subscription<()>,
        mut stop: Subscription<()>,
        cancel: CancellationToken,
    ) {
        let Some(mut events) = self.events_rx.take() else {
            warn!("Location watcher already running");
            return;
        };
        // A closed intent pipe only disables its own branch.
        let mut start_live = true;
        let mut stop_live = true;

        info!("Geolocation port bound");
        while start_live || stop_live {
            tokio::select! {
                _ = cancel.cancelled() => break,
                intent = start.recv(), if start_live => match intent {
                    Some(()) => {
                        self.start();
                    }
                    None => {
                        debug!("{} closed", start.name());
                        start_live = false;
                    }
                },
                intent = stop.recv(), if stop_live => match intent {
                    Some(()) => {
                        self.stop();
                    }
                    None => {
                        debug!("{} closed", stop.name());
                        stop_live = false;
                    }
                },
                Some(event) = events.recv() => {
                    self.handle_sensor_event(event);
                }
            }
        }
        self.stop();
        debug!("Geolocation port stopped");
    }
}
