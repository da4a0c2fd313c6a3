use std::collections::{BTreeMap, BTreeSet};

use blast_proto::{ExplosionResult, MapId, SpaceTransform, TileCoord};

/// Renderer-side registration for the preview overlay.
pub trait OverlayHost {
    fn add_overlay(&mut self);
    fn remove_overlay(&mut self);
    fn has_overlay(&self) -> bool;
}

/// Everything the renderer needs to draw the latest preview.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayState {
    pub map: MapId,
    pub tiles: BTreeMap<TileCoord, f32>,
    pub space_tiles: BTreeSet<TileCoord>,
    pub space_transform: SpaceTransform,
    pub iteration_intensity: Vec<f32>,
    pub slope: f32,
    pub total_intensity: f32,
}

impl OverlayState {
    pub fn from_result(result: ExplosionResult, slope: f32, total_intensity: f32) -> Self {
        Self {
            map: result.epicenter.map,
            tiles: result.tiles,
            space_tiles: result.space_tiles,
            space_transform: result.space_transform,
            iteration_intensity: result.iteration_intensity,
            slope,
            total_intensity,
        }
    }

    /// Highest intensity on screen, used to scale the color ramp.
    pub fn peak_intensity(&self) -> f32 {
        self.iteration_intensity.first().copied().unwrap_or(0.0)
    }

    /// Space tiles in map coordinates (tile centers).
    pub fn space_tile_positions(&self) -> impl Iterator<Item = [f32; 2]> + '_ {
        self.space_tiles
            .iter()
            .map(|coord| self.space_transform.transform_point(coord.center()))
    }
}

/// Read-only projection of server previews onto a renderer host.
#[derive(Debug)]
pub struct PreviewOverlay<H: OverlayHost> {
    host: H,
    state: Option<OverlayState>,
}

impl<H: OverlayHost> PreviewOverlay<H> {
    pub fn new(host: H) -> Self {
        Self { host, state: None }
    }

    /// Replace the drawn preview wholesale.
    pub fn on_preview_data(&mut self, result: ExplosionResult, slope: f32, total_intensity: f32) {
        if !self.host.has_overlay() {
            self.host.add_overlay();
        }
        self.state = Some(OverlayState::from_result(result, slope, total_intensity));
    }

    /// Unregister and drop state. No-op when nothing is shown.
    pub fn clear(&mut self) {
        if self.host.has_overlay() {
            self.host.remove_overlay();
        }
        self.state = None;
    }

    pub fn state(&self) -> Option<&OverlayState> {
        self.state.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeadlessHost;
    use blast_proto::{GridId, MapCoordinates};

    fn result(intensity: f32) -> ExplosionResult {
        let mut result =
            ExplosionResult::empty(MapCoordinates::new(MapId(4), 1.0, 1.0), "Default");
        result.tiles.insert(TileCoord::new(GridId(1), 1, 1), intensity);
        result.space_tiles.insert(TileCoord::new(GridId(1), 2, 1));
        result.space_transform = SpaceTransform::new(0.0, [10.0, 0.0]);
        result.iteration_intensity = vec![intensity];
        result
    }

    #[test]
    fn first_data_registers_once() {
        let mut overlay = PreviewOverlay::new(HeadlessHost::default());
        overlay.on_preview_data(result(10.0), 5.0, 50.0);
        overlay.on_preview_data(result(20.0), 5.0, 80.0);
        assert_eq!(overlay.host().added, 1);

        let state = overlay.state().unwrap();
        assert_eq!(state.map, MapId(4));
        assert_eq!(state.total_intensity, 80.0);
        assert_eq!(state.peak_intensity(), 20.0);
        assert_eq!(
            state.space_tile_positions().collect::<Vec<_>>(),
            vec![[12.5, 1.5]]
        );
    }

    #[test]
    fn new_data_replaces_instead_of_merging() {
        let mut overlay = PreviewOverlay::new(HeadlessHost::default());
        overlay.on_preview_data(result(10.0), 5.0, 50.0);
        let mut other = ExplosionResult::empty(MapCoordinates::new(MapId(4), 0.0, 0.0), "Cryo");
        other.tiles.insert(TileCoord::new(GridId(1), 5, 5), 3.0);
        overlay.on_preview_data(other, 1.0, 3.0);

        let state = overlay.state().unwrap();
        assert_eq!(state.tiles.len(), 1);
        assert!(state.tiles.contains_key(&TileCoord::new(GridId(1), 5, 5)));
        assert!(state.space_tiles.is_empty());
    }

    #[test]
    fn clear_is_safe_when_idle() {
        let mut overlay = PreviewOverlay::new(HeadlessHost::default());
        overlay.clear();
        assert_eq!(overlay.host().removed, 0);

        overlay.on_preview_data(result(10.0), 5.0, 50.0);
        overlay.clear();
        overlay.clear();
        assert!(!overlay.is_active());
        assert_eq!(overlay.host().removed, 1);
        assert!(!overlay.host().has_overlay());
    }
}
