//! Portbridge Map - geo-map widget state and view reconciliation

pub mod attributes;
pub mod driver;
pub mod marker;
pub mod mock;
pub mod surface;
pub mod widget;

pub use attributes::{numeric_attribute, view_from_attributes, Attributes, MarkerAttribute, ViewAttribute};
pub use driver::{DomEvent, MapDriver, SurfaceFactory};
pub use marker::{ElementId, MarkerElement, MarkerRecord};
pub use mock::MockSurface;
pub use surface::{MarkerId, RenderingSurface};
pub use widget::{GeoMap, TickOutcome};
