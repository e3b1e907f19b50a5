//! The geo-map widget and its view-state reconciliation
//!
//! Two writers feed the intended camera: attribute changes on the element
//! and user gestures on the surface. Gestures are read back through
//! `on_camera_changed`; attribute changes only touch the intended state and
//! reach the surface on the next `tick`. The tick is the only path that
//! forces the surface, and it always yields while the surface is moving.

use crate::attributes::{view_from_attributes, Attributes, MarkerAttribute, ViewAttribute};
use crate::driver::DomEvent;
use crate::marker::{ElementId, MarkerElement, MarkerRecord};
use crate::surface::RenderingSurface;
use portbridge_core::{Inbound, MapViewState};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Result of one reconciliation tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Not connected to a surface.
    Detached,
    /// A gesture is in progress; nothing compared.
    Moving,
    InSync,
    /// The surface drifted and was jumped back to this state.
    Corrected(MapViewState),
}

pub struct GeoMap<S> {
    attributes: Attributes,
    view: Option<MapViewState>,
    surface: Option<S>,
    /// Marker children in attach order of their ids.
    children: BTreeMap<ElementId, MarkerElement>,
    markers: HashMap<ElementId, MarkerRecord>,
    position_change: Inbound<MapViewState>,
    drift_epsilon: f64,
}

impl<S: RenderingSurface> GeoMap<S> {
    pub fn new(position_change: Inbound<MapViewState>, drift_epsilon: f64) -> Self {
        Self {
            attributes: Attributes::new(),
            view: None,
            surface: None,
            children: BTreeMap::new(),
            markers: HashMap::new(),
            position_change,
            drift_epsilon,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.surface.is_some()
    }

    /// The intended camera. `None` until connected.
    pub fn view_state(&self) -> Option<MapViewState> {
        self.view
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Set or remove an element attribute.
    pub fn set_attribute(&mut self, name: &str, value: Option<&str>) {
        self.attributes.set(name, value);
        let (Some(view), Some(attr)) = (self.view.as_mut(), ViewAttribute::parse(name)) else {
            return;
        };
        attr.apply(view, &self.attributes);
        debug!("Attribute {} changed, intended view now {:?}", name, view);
    }

    /// Create the surface from the declared view and place every known marker.
    pub fn connect(&mut self, create: impl FnOnce(MapViewState) -> S) -> bool {
        if self.surface.is_some() {
            debug!("Map already connected");
            return false;
        }
        let view = view_from_attributes(&self.attributes);
        let mut surface = create(view);
        for (id, element) in &self.children {
            self.markers.insert(*id, place_marker(&mut surface, element));
        }
        info!(
            "Map connected at {:.5},{:.5} zoom {} ({} markers)",
            view.longitude,
            view.latitude,
            view.zoom,
            self.markers.len()
        );
        self.view = Some(view);
        self.surface = Some(surface);
        true
    }

    /// Remove every marker and the surface. Later events are ignored.
    pub fn disconnect(&mut self) {
        let Some(mut surface) = self.surface.take() else {
            return;
        };
        for (_, record) in self.markers.drain() {
            surface.remove_marker(record.marker);
        }
        surface.remove();
        self.view = None;
        info!("Map disconnected");
    }

    /// The surface moved under user control: adopt its camera and announce it.
    pub fn on_camera_changed(&mut self) {
        let Some(surface) = self.surface.as_ref() else {
            debug!("Camera change after disconnect ignored");
            return;
        };
        let camera = surface.camera();
        self.view = Some(camera);
        self.position_change.emit(camera);
    }

    /// Force the surface back to the intended view if it drifted.
    pub fn tick(&mut self) -> TickOutcome {
        let (Some(surface), Some(view)) = (self.surface.as_mut(), self.view) else {
            return TickOutcome::Detached;
        };
        if surface.is_moving() {
            return TickOutcome::Moving;
        }
        let camera = surface.camera();
        if view.matches(&camera, self.drift_epsilon) {
            return TickOutcome::InSync;
        }
        debug!("Camera drifted to {:?}, jumping to {:?}", camera, view);
        surface.jump_to(view);
        TickOutcome::Corrected(view)
    }

    // -----------------------------------------------------------------------
    // Markers
    // -----------------------------------------------------------------------

    pub fn marker(&self, id: ElementId) -> Option<&MarkerRecord> {
        self.markers.get(&id)
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    /// A marker child was attached. Re-attaching a known child does nothing.
    pub fn attach_marker(&mut self, element: MarkerElement) -> bool {
        if self.children.contains_key(&element.id) {
            debug!("Marker {:?} already attached", element.id);
            return false;
        }
        if let Some(surface) = self.surface.as_mut() {
            self.markers
                .insert(element.id, place_marker(surface, &element));
        }
        self.children.insert(element.id, element);
        true
    }

    /// A marker child was detached; its surface marker goes with it.
    pub fn detach_marker(&mut self, id: ElementId) -> bool {
        if self.children.remove(&id).is_none() {
            return false;
        }
        if let (Some(record), Some(surface)) = (self.markers.remove(&id), self.surface.as_mut()) {
            surface.remove_marker(record.marker);
        }
        true
    }

    /// An attribute of a marker child changed. Moves the marker at most once.
    pub fn set_marker_attribute(&mut self, id: ElementId, name: &str, value: Option<&str>) -> bool {
        let Some(element) = self.children.get_mut(&id) else {
            return false;
        };
        element.attributes.set(name, value);
        let Some(attr) = MarkerAttribute::parse(name) else {
            return false;
        };
        let coordinate = element.coordinate(attr);

        let (Some(record), Some(surface)) = (self.markers.get_mut(&id), self.surface.as_mut()) else {
            return true;
        };
        match attr {
            MarkerAttribute::Lng => record.position.longitude = coordinate,
            MarkerAttribute::Lat => record.position.latitude = coordinate,
        }
        surface.set_marker_position(record.marker, record.position);
        true
    }

    /// Apply one host notification.
    pub fn handle_dom_event(&mut self, event: DomEvent) {
        match event {
            DomEvent::AttributeChanged { name, value } => {
                self.set_attribute(&name, value.as_deref());
            }
            DomEvent::ChildAttached(element) => {
                self.attach_marker(element);
            }
            DomEvent::ChildDetached(id) => {
                self.detach_marker(id);
            }
            DomEvent::MarkerAttributeChanged { id, name, value } => {
                self.set_marker_attribute(id, &name, value.as_deref());
            }
            DomEvent::CameraChanged => self.on_camera_changed(),
            DomEvent::Connected => debug!("Connect needs a surface; ignored"),
            DomEvent::Disconnected => self.disconnect(),
        }
    }
}

fn place_marker<S: RenderingSurface>(surface: &mut S, element: &MarkerElement) -> MarkerRecord {
    let position = element.position();
    MarkerRecord {
        position,
        marker: surface.add_marker(position),
    }
}
