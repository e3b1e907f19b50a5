//! Marker children of the map element

use crate::attributes::{Attributes, MarkerAttribute};
use crate::surface::MarkerId;
use portbridge_core::LngLat;

/// Identity of a child element, stable across attribute changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

/// A marker-declaring child element.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerElement {
    pub id: ElementId,
    pub attributes: Attributes,
}

impl MarkerElement {
    pub fn new(id: ElementId, attributes: Attributes) -> Self {
        Self { id, attributes }
    }

    pub fn coordinate(&self, attr: MarkerAttribute) -> f64 {
        self.attributes.numeric(attr.name(), 0.0)
    }

    pub fn position(&self) -> LngLat {
        LngLat::new(
            self.coordinate(MarkerAttribute::Lng),
            self.coordinate(MarkerAttribute::Lat),
        )
    }
}

/// A placed marker: declared position plus the surface marker it owns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerRecord {
    pub position: LngLat,
    pub marker: MarkerId,
}
