//! Stitched multi-tile height and weight storage.
//!
//! Tiles are laid out on a `tiles_x x tiles_y` grid. Neighbouring height tiles
//! share their border row/column, so the stitched height grid is
//! `tiles * R - (tiles - 1)` samples wide. Weight tiles do not share borders
//! and stitch to `tiles * A`.
//!
//! The stitched arrays are authoritative; per-tile views are extracted on
//! demand as [`TilePatch`]es.

use serde::{Deserialize, Serialize};

use crate::command_area::{CommandArea, FrameAreas, SampleSpace};
use crate::error::{Result, SculptError};

/// Integer position of a tile in the grid.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Which stitched array a computation targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleLayer {
    Height,
    Weight,
}

/// Geometry of a terrain grid. Every tile shares the same resolutions and
/// world size.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridLayout {
    pub tiles_x: u32,
    pub tiles_y: u32,
    /// Height samples per tile side (R)
    pub height_resolution: usize,
    /// Weight samples per tile side (A)
    pub weight_resolution: usize,
    /// Texture channels per weight sample
    pub channels: usize,
    /// World extent of one tile along X and Z
    pub tile_world_size: f32,
    /// World XZ of the grid's (0, 0) corner
    pub origin: [f32; 2],
    /// World Y of normalised height 0
    pub base_height: f32,
    /// World units spanned by normalised heights 0..1
    pub height_scale: f32,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            tiles_x: 1,
            tiles_y: 1,
            height_resolution: 513,
            weight_resolution: 512,
            channels: 4,
            tile_world_size: 500.0,
            origin: [0.0, 0.0],
            base_height: 0.0,
            height_scale: 600.0,
        }
    }
}

impl GridLayout {
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(SculptError::InvalidLayout(msg.to_string()));
        if self.tiles_x == 0 || self.tiles_y == 0 {
            return fail("grid needs at least one tile");
        }
        if self.height_resolution < 2 || self.weight_resolution < 2 {
            return fail("tile resolutions must be at least 2");
        }
        if self.channels == 0 {
            return fail("weight layer needs at least one channel");
        }
        let positive = |v: f32| v.is_finite() && v > 0.0;
        if !positive(self.tile_world_size) || !positive(self.height_scale) {
            return fail("tile size and height scale must be positive");
        }
        Ok(())
    }

    /// Stitched height grid size, accounting for shared borders.
    pub fn stitched_height_size(&self) -> [usize; 2] {
        let r = self.height_resolution;
        [
            self.tiles_x as usize * r - (self.tiles_x as usize - 1),
            self.tiles_y as usize * r - (self.tiles_y as usize - 1),
        ]
    }

    /// Stitched weight grid size. Weight tiles do not share borders.
    pub fn stitched_weight_size(&self) -> [usize; 2] {
        let a = self.weight_resolution;
        [self.tiles_x as usize * a, self.tiles_y as usize * a]
    }

    pub fn world_size(&self) -> [f32; 2] {
        [
            self.tiles_x as f32 * self.tile_world_size,
            self.tiles_y as f32 * self.tile_world_size,
        ]
    }

    pub fn tile_resolution(&self, layer: SampleLayer) -> usize {
        match layer {
            SampleLayer::Height => self.height_resolution,
            SampleLayer::Weight => self.weight_resolution,
        }
    }
}

/// Per-tile placement in world and in the stitched arrays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tile {
    pub coord: TileCoord,
    pub world_origin: [f32; 2],
    /// `(gx * (R - 1), gy * (R - 1))`
    pub height_offset: [usize; 2],
    /// `(gx * A, gy * A)`
    pub weight_offset: [usize; 2],
}

impl Tile {
    pub fn offset(&self, layer: SampleLayer) -> [usize; 2] {
        match layer {
            SampleLayer::Height => self.height_offset,
            SampleLayer::Weight => self.weight_offset,
        }
    }
}

/// A rectangle of new values for one tile, in tile-local sample space.
///
/// Weight patches hold `channels` values per sample.
#[derive(Clone, Debug, PartialEq)]
pub struct TilePatch {
    pub tile: TileCoord,
    pub layer: SampleLayer,
    pub area: CommandArea,
    pub values: Vec<f32>,
}

#[derive(Clone, Debug)]
pub struct TerrainGrid {
    layout: GridLayout,
    tiles: Vec<Tile>,
    height_size: [usize; 2],
    weight_size: [usize; 2],
    /// Normalised heights, row-major (row = Z)
    heights: Vec<f32>,
    /// Channel weights, sample-major
    weights: Vec<f32>,
}

impl TerrainGrid {
    /// Flat grid with every weight sample on channel 0.
    pub fn new(layout: GridLayout) -> Result<Self> {
        layout.validate()?;

        let r = layout.height_resolution;
        let a = layout.weight_resolution;
        let mut tiles = Vec::with_capacity((layout.tiles_x * layout.tiles_y) as usize);
        for gy in 0..layout.tiles_y {
            for gx in 0..layout.tiles_x {
                tiles.push(Tile {
                    coord: TileCoord::new(gx, gy),
                    world_origin: [
                        layout.origin[0] + gx as f32 * layout.tile_world_size,
                        layout.origin[1] + gy as f32 * layout.tile_world_size,
                    ],
                    height_offset: [gx as usize * (r - 1), gy as usize * (r - 1)],
                    weight_offset: [gx as usize * a, gy as usize * a],
                });
            }
        }

        let height_size = layout.stitched_height_size();
        let weight_size = layout.stitched_weight_size();
        let mut weights = vec![0.0; weight_size[0] * weight_size[1] * layout.channels];
        for sample in weights.chunks_mut(layout.channels) {
            sample[0] = 1.0;
        }

        Ok(Self {
            heights: vec![0.0; height_size[0] * height_size[1]],
            weights,
            layout,
            tiles,
            height_size,
            weight_size,
        })
    }

    /// Stitch per-tile height arrays (`R x R` each) into a grid. Shared
    /// borders take the value of the tile written last.
    pub fn from_tile_heights(layout: GridLayout, tiles: &[(TileCoord, Vec<f32>)]) -> Result<Self> {
        let mut grid = Self::new(layout)?;
        for (coord, heights) in tiles {
            grid.set_tile_heights(*coord, heights)?;
        }
        Ok(grid)
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn tile(&self, coord: TileCoord) -> Result<&Tile> {
        if coord.x >= self.layout.tiles_x || coord.y >= self.layout.tiles_y {
            return Err(SculptError::TileOutOfRange {
                x: coord.x,
                y: coord.y,
            });
        }
        Ok(&self.tiles[(coord.y * self.layout.tiles_x + coord.x) as usize])
    }

    pub fn channels(&self) -> usize {
        self.layout.channels
    }

    pub fn size(&self, layer: SampleLayer) -> [usize; 2] {
        match layer {
            SampleLayer::Height => self.height_size,
            SampleLayer::Weight => self.weight_size,
        }
    }

    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Replace the whole stitched height array. Length must match.
    pub(crate) fn replace_heights(&mut self, heights: Vec<f32>) {
        debug_assert_eq!(heights.len(), self.heights.len());
        self.heights = heights;
    }

    #[inline]
    pub fn height(&self, x: usize, y: usize) -> f32 {
        self.heights[y * self.height_size[0] + x]
    }

    /// Store a normalised height, clamped to `[0, 1]`.
    #[inline]
    pub fn set_height(&mut self, x: usize, y: usize, value: f32) {
        let width = self.height_size[0];
        self.heights[y * width + x] = value.clamp(0.0, 1.0);
    }

    pub fn sample_weights(&self, x: usize, y: usize) -> &[f32] {
        let c = self.layout.channels;
        let start = (y * self.weight_size[0] + x) * c;
        &self.weights[start..start + c]
    }

    pub fn sample_weights_mut(&mut self, x: usize, y: usize) -> &mut [f32] {
        let c = self.layout.channels;
        let start = (y * self.weight_size[0] + x) * c;
        &mut self.weights[start..start + c]
    }

    /// Copy one tile's `R x R` heights out of the stitched array.
    pub fn tile_heights(&self, coord: TileCoord) -> Result<Vec<f32>> {
        let tile = *self.tile(coord)?;
        let r = self.layout.height_resolution;
        let full = CommandArea {
            width: r,
            height: r,
            ..CommandArea::default()
        };
        Ok(self.extract(SampleLayer::Height, &tile, &full))
    }

    pub fn set_tile_heights(&mut self, coord: TileCoord, heights: &[f32]) -> Result<()> {
        let tile = *self.tile(coord)?;
        let r = self.layout.height_resolution;
        check_len(r * r, heights.len())?;
        let width = self.height_size[0];
        for (y, row) in heights.chunks(r).enumerate() {
            let start = (tile.height_offset[1] + y) * width + tile.height_offset[0];
            for (dst, src) in self.heights[start..start + r].iter_mut().zip(row) {
                *dst = src.clamp(0.0, 1.0);
            }
        }
        Ok(())
    }

    /// Copy one tile's `A x A x channels` weights out of the stitched array.
    pub fn tile_weights(&self, coord: TileCoord) -> Result<Vec<f32>> {
        let tile = *self.tile(coord)?;
        let a = self.layout.weight_resolution;
        let full = CommandArea {
            width: a,
            height: a,
            ..CommandArea::default()
        };
        Ok(self.extract(SampleLayer::Weight, &tile, &full))
    }

    pub fn set_tile_weights(&mut self, coord: TileCoord, weights: &[f32]) -> Result<()> {
        let tile = *self.tile(coord)?;
        let a = self.layout.weight_resolution;
        let c = self.layout.channels;
        check_len(a * a * c, weights.len())?;
        let width = self.weight_size[0];
        for (y, row) in weights.chunks(a * c).enumerate() {
            let start = ((tile.weight_offset[1] + y) * width + tile.weight_offset[0]) * c;
            self.weights[start..start + a * c].copy_from_slice(row);
        }
        Ok(())
    }

    /// Sample space of the whole stitched grid.
    pub fn grid_space(&self, layer: SampleLayer) -> SampleSpace {
        SampleSpace {
            origin: self.layout.origin,
            world_size: self.layout.world_size(),
            resolution: self.size(layer),
        }
    }

    /// Brush diameter in samples for a brush of `world_size` units. Never
    /// wider than the stitched grid, since anything beyond it is clipped.
    pub fn brush_size_in_samples(&self, layer: SampleLayer, world_size: f32) -> usize {
        let res = self.layout.tile_resolution(layer);
        let samples = (world_size / self.layout.tile_world_size * (res - 1) as f32).round();
        if !samples.is_finite() || samples <= 0.0 {
            return 0;
        }
        let [w, h] = self.size(layer);
        (samples as usize).min(w.max(h))
    }

    /// Grid-wide and per-tile areas for one application. `None` when the
    /// brush misses the grid entirely.
    ///
    /// Tile areas are cut from the grid-wide area, so together they cover
    /// exactly the samples a command mutates. Shared height borders appear in
    /// both neighbouring tiles.
    pub fn command_areas(
        &self,
        layer: SampleLayer,
        cursor: [f32; 2],
        brush_samples: usize,
    ) -> Option<FrameAreas> {
        let grid = CommandArea::compute(cursor, brush_samples, &self.grid_space(layer))?;
        let res = self.layout.tile_resolution(layer);
        let tiles = self
            .tiles
            .iter()
            .filter_map(|tile| {
                grid.restrict_to(tile.offset(layer), res)
                    .map(|area| (tile.coord, area))
            })
            .collect();
        Some(FrameAreas { grid, tiles })
    }

    /// Read back a tile-local rectangle from the stitched arrays.
    pub fn tile_patch(
        &self,
        layer: SampleLayer,
        coord: TileCoord,
        area: &CommandArea,
    ) -> Result<TilePatch> {
        let tile = *self.tile(coord)?;
        Ok(TilePatch {
            tile: coord,
            layer,
            area: *area,
            values: self.extract(layer, &tile, area),
        })
    }

    fn extract(&self, layer: SampleLayer, tile: &Tile, area: &CommandArea) -> Vec<f32> {
        let [ox, oy] = tile.offset(layer);
        let x0 = ox + area.left_offset;
        let y0 = oy + area.bottom_offset;
        match layer {
            SampleLayer::Height => {
                let width = self.height_size[0];
                let mut values = Vec::with_capacity(area.sample_count());
                for y in y0..y0 + area.height {
                    let start = y * width + x0;
                    values.extend_from_slice(&self.heights[start..start + area.width]);
                }
                values
            }
            SampleLayer::Weight => {
                let width = self.weight_size[0];
                let c = self.layout.channels;
                let mut values = Vec::with_capacity(area.sample_count() * c);
                for y in y0..y0 + area.height {
                    let start = (y * width + x0) * c;
                    values.extend_from_slice(&self.weights[start..start + area.width * c]);
                }
                values
            }
        }
    }

    /// Nearest stitched sample under a world XZ position.
    pub fn sample_at_world(&self, layer: SampleLayer, world: [f32; 2]) -> Option<[usize; 2]> {
        let space = self.grid_space(layer);
        let mut index = [0usize; 2];
        for axis in 0..2 {
            let res = space.resolution[axis];
            let s = ((world[axis] - space.origin[axis]) / space.world_size[axis]
                * (res - 1) as f32)
                .round();
            if !s.is_finite() || s < 0.0 || s >= res as f32 {
                return None;
            }
            index[axis] = s as usize;
        }
        Some(index)
    }

    /// Normalised height of the nearest sample under a world XZ position.
    pub fn height_at_world(&self, world: [f32; 2]) -> Option<f32> {
        self.sample_at_world(SampleLayer::Height, world)
            .map(|[x, y]| self.height(x, y))
    }

    /// World position of a stitched height sample.
    pub fn world_position(&self, x: usize, y: usize) -> [f32; 3] {
        let [w, h] = self.height_size;
        let [ww, wh] = self.layout.world_size();
        [
            self.layout.origin[0] + x as f32 / (w - 1) as f32 * ww,
            self.to_world_height(self.height(x, y)),
            self.layout.origin[1] + y as f32 / (h - 1) as f32 * wh,
        ]
    }

    pub fn to_world_height(&self, normalized: f32) -> f32 {
        self.layout.base_height + normalized * self.layout.height_scale
    }

    pub fn to_normalized_height(&self, world_y: f32) -> f32 {
        (world_y - self.layout.base_height) / self.layout.height_scale
    }
}

fn check_len(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(SculptError::TileDataMismatch { expected, actual });
    }
    Ok(())
}

/// Mean of the `(2 * radius + 1)^2` box around `(x, y)` in a row-major
/// height array of `size`, clipped at the array edges.
pub(crate) fn box_average(heights: &[f32], size: [usize; 2], x: usize, y: usize, radius: usize) -> f32 {
    let [w, h] = size;
    let x0 = x.saturating_sub(radius);
    let x1 = (x + radius).min(w - 1);
    let y0 = y.saturating_sub(radius);
    let y1 = (y + radius).min(h - 1);

    let mut sum = 0.0;
    for row in y0..=y1 {
        sum += heights[row * w + x0..=row * w + x1].iter().sum::<f32>();
    }
    sum / ((x1 - x0 + 1) * (y1 - y0 + 1)) as f32
}
