//! Rendering surface seam

use portbridge_core::{LngLat, MapViewState};

/// Handle of a marker drawn on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerId(pub u64);

/// Imperative map renderer owned by exactly one widget.
pub trait RenderingSurface {
    /// Current camera.
    fn camera(&self) -> MapViewState;
    /// Whether a user gesture or animation is in progress.
    fn is_moving(&self) -> bool;
    /// Set all five camera fields at once, without animation.
    fn jump_to(&mut self, view: MapViewState);

    fn add_marker(&mut self, at: LngLat) -> MarkerId;
    fn set_marker_position(&mut self, marker: MarkerId, at: LngLat);
    fn remove_marker(&mut self, marker: MarkerId);

    /// Tear the surface down. No call follows.
    fn remove(&mut self);
}
