//! Async host loop for one map widget
//!
//! Host notifications arrive on a channel and are applied in order. The
//! reconciliation tick runs on a fixed interval alongside them. A driver may
//! start before the element is connected: notifications are stored until
//! `Connected` creates the surface, and the loop ends once a connected
//! widget is disconnected.

use crate::marker::{ElementId, MarkerElement};
use crate::surface::RenderingSurface;
use crate::widget::{GeoMap, TickOutcome};
use portbridge_core::MapViewState;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle and attribute notifications from the host document.
#[derive(Debug, Clone, PartialEq)]
pub enum DomEvent {
    /// The element entered the document; the surface is created now.
    Connected,
    AttributeChanged { name: String, value: Option<String> },
    ChildAttached(MarkerElement),
    ChildDetached(ElementId),
    MarkerAttributeChanged {
        id: ElementId,
        name: String,
        value: Option<String>,
    },
    /// The surface reported a camera change from a user gesture.
    CameraChanged,
    Disconnected,
}

/// Builds the rendering surface from the initial camera.
pub type SurfaceFactory<S> = Box<dyn FnOnce(MapViewState) -> S + Send>;

pub struct MapDriver<S> {
    widget: GeoMap<S>,
    tick_interval: Duration,
    factory: Option<SurfaceFactory<S>>,
}

impl<S: RenderingSurface> MapDriver<S> {
    pub fn new(widget: GeoMap<S>, tick_interval: Duration) -> Self {
        Self {
            widget,
            tick_interval: tick_interval.max(Duration::from_millis(1)),
            factory: None,
        }
    }

    /// Surface to create on `Connected`.
    pub fn with_surface(
        mut self,
        create: impl FnOnce(MapViewState) -> S + Send + 'static,
    ) -> Self {
        self.factory = Some(Box::new(create));
        self
    }

    fn connect(&mut self) {
        match self.factory.take() {
            Some(create) => {
                self.widget.connect(create);
            }
            None => warn!("Map connected without a surface to create"),
        }
    }

    /// Run until a connected element disconnects, the host hangs up, or
    /// `cancel` fires. The widget is always disconnected on return.
    pub async fn run(
        mut self,
        mut dom: mpsc::UnboundedReceiver<DomEvent>,
        cancel: CancellationToken,
    ) -> GeoMap<S> {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Map driver started, ticking every {:?}", self.tick_interval);
        let mut attached = self.widget.is_connected();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Map driver cancelled");
                    break;
                }
                event = dom.recv() => {
                    let Some(event) = event else {
                        debug!("Host closed the event channel");
                        break;
                    };
                    match event {
                        DomEvent::Connected => {
                            self.connect();
                            attached |= self.widget.is_connected();
                        }
                        DomEvent::Disconnected if attached => {
                            self.widget.disconnect();
                            break;
                        }
                        event => self.widget.handle_dom_event(event),
                    }
                }
                _ = ticker.tick() => {
                    if self.widget.tick() == TickOutcome::Detached && attached {
                        break;
                    }
                }
            }
        }

        self.widget.disconnect();
        info!("Map driver stopped");
        self.widget
    }
}
