//! Callbacks into the editor that embeds the sculptor.
//!
//! Undo recording, collision toggling and physics raycasts belong to the
//! host. Every method has a no-op default so hosts implement only what they
//! support.

use crate::terrain_grid::{TerrainGrid, TileCoord};

pub trait SculptHost {
    /// Called before the first mutation of `tiles` in a stroke, with the
    /// grid still holding their pre-stroke data.
    fn record_undo(&mut self, _tiles: &[TileCoord], _grid: &TerrainGrid) {}

    /// Enable or disable the terrain's own collision. Shrink-wrap disables it
    /// for the duration of a stroke so rays pass through to other geometry.
    fn set_terrain_collision(&mut self, _enabled: bool) {}

    /// World Y of the first surface hit by a ray cast straight down at world
    /// XZ `(x, z)`.
    fn raycast_down(&mut self, _x: f32, _z: f32) -> Option<f32> {
        None
    }

    /// Called once when a stroke ends normally, with the normalised height
    /// under the last applied cursor position.
    fn stroke_finished(&mut self, _last_height: Option<f32>) {}
}

/// Host that ignores every callback.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullHost;

impl SculptHost for NullHost {}
