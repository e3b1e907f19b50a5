//! In-memory rendering surface for tests and the console host
//!
//! Clones share state, so a test can keep one handle while the widget owns
//! the other.

use crate::surface::{MarkerId, RenderingSurface};
use portbridge_core::{LngLat, MapViewState};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct SurfaceState {
    camera: MapViewState,
    moving: bool,
    markers: BTreeMap<MarkerId, LngLat>,
    next_marker: u64,
    jumps: Vec<MapViewState>,
    marker_moves: usize,
    removed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MockSurface {
    state: Arc<Mutex<SurfaceState>>,
}

impl MockSurface {
    /// A surface whose camera starts at `initial`.
    pub fn new(initial: MapViewState) -> Self {
        let surface = Self::default();
        surface.lock().camera = initial;
        surface
    }

    fn lock(&self) -> MutexGuard<'_, SurfaceState> {
        // A poisoned lock only means a test panicked mid-call; keep the state.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Simulate a gesture landing the camera somewhere.
    pub fn set_camera(&self, view: MapViewState) {
        self.lock().camera = view;
    }

    pub fn set_moving(&self, moving: bool) {
        self.lock().moving = moving;
    }

    /// Every `jump_to` target, in order.
    pub fn jumps(&self) -> Vec<MapViewState> {
        self.lock().jumps.clone()
    }

    pub fn markers(&self) -> Vec<LngLat> {
        self.lock().markers.values().copied().collect()
    }

    pub fn marker_position(&self, marker: MarkerId) -> Option<LngLat> {
        self.lock().markers.get(&marker).copied()
    }

    pub fn marker_moves(&self) -> usize {
        self.lock().marker_moves
    }

    pub fn is_removed(&self) -> bool {
        self.lock().removed
    }
}

impl RenderingSurface for MockSurface {
    fn camera(&self) -> MapViewState {
        self.lock().camera
    }

    fn is_moving(&self) -> bool {
        self.lock().moving
    }

    fn jump_to(&mut self, view: MapViewState) {
        let mut state = self.lock();
        state.camera = view;
        state.jumps.push(view);
    }

    fn add_marker(&mut self, at: LngLat) -> MarkerId {
        let mut state = self.lock();
        state.next_marker += 1;
        let id = MarkerId(state.next_marker);
        state.markers.insert(id, at);
        id
    }

    fn set_marker_position(&mut self, marker: MarkerId, at: LngLat) {
        let mut state = self.lock();
        if let Some(position) = state.markers.get_mut(&marker) {
            *position = at;
            state.marker_moves += 1;
        }
    }

    fn remove_marker(&mut self, marker: MarkerId) {
        self.lock().markers.remove(&marker);
    }

    fn remove(&mut self) {
        self.lock().removed = true;
    }
}
