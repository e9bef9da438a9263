//! Mapping a world-space cursor to a clipped rectangle of samples.
//!
//! The brush is clipped once against the stitched grid (the arrays the
//! commands mutate), then that area is cut into tile-local pieces so every
//! mutated sample is written back to the tile that owns it. Clipping uses
//! sample-based indexing: a space with `r` samples across `w` world units has
//! a sample every `w / (r - 1)` units.

use serde::{Deserialize, Serialize};

use crate::terrain_grid::TileCoord;

/// A rectangular sample space placed in the world (one tile or the whole grid).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleSpace {
    /// World XZ of sample (0, 0)
    pub origin: [f32; 2],
    /// World extent along X and Z
    pub world_size: [f32; 2],
    /// Sample count along X and Z
    pub resolution: [usize; 2],
}

/// The clipped region one brush application covers in a sample space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandArea {
    pub left_offset: usize,
    pub bottom_offset: usize,
    /// Brush columns cut off on the left
    pub clipped_left: usize,
    /// Brush rows cut off at the bottom
    pub clipped_bottom: usize,
    pub width: usize,
    pub height: usize,
}

/// One axis of a clipped range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct AxisRange {
    offset: usize,
    clipped: usize,
    length: usize,
}

fn clip_axis(
    world: f32,
    origin: f32,
    world_size: f32,
    resolution: usize,
    brush_samples: usize,
) -> Option<AxisRange> {
    if resolution == 0 || brush_samples == 0 || world_size <= 0.0 {
        return None;
    }

    let cursor = ((world - origin) / world_size * (resolution - 1) as f32).round() as i64;
    let half = brush_samples as f32 * 0.5;
    let start = cursor - half.round() as i64;
    let brush = brush_samples as i64;
    let res = resolution as i64;

    // Far edge entirely before the space, or start past its end.
    if start + brush <= 0 || start >= res {
        return None;
    }

    let offset = start.max(0);
    let unclipped_start = cursor as f32 - half;
    let clipped = if unclipped_start < 0.0 {
        unclipped_start.abs().ceil() as i64
    } else {
        0
    };

    let mut length = brush - clipped;
    if offset + length > res {
        length = res - offset;
    }
    if length <= 0 {
        return None;
    }

    Some(AxisRange {
        offset: offset as usize,
        clipped: clipped as usize,
        length: length as usize,
    })
}

/// Intersect `[start, start + length)` with `[sub_start, sub_start + sub_len)`
/// and re-express it relative to `sub_start`.
fn restrict_axis(
    start: usize,
    clipped: usize,
    length: usize,
    sub_start: usize,
    sub_len: usize,
) -> Option<AxisRange> {
    let lo = start.max(sub_start);
    let hi = (start + length).min(sub_start + sub_len);
    if lo >= hi {
        return None;
    }
    Some(AxisRange {
        offset: lo - sub_start,
        clipped: clipped + (lo - start),
        length: hi - lo,
    })
}

impl CommandArea {
    /// Clip a brush of `brush_samples` samples centred on `cursor` (world XZ)
    /// against `space`. `None` means there is nothing to apply in this space.
    pub fn compute(cursor: [f32; 2], brush_samples: usize, space: &SampleSpace) -> Option<Self> {
        let x = clip_axis(
            cursor[0],
            space.origin[0],
            space.world_size[0],
            space.resolution[0],
            brush_samples,
        )?;
        let y = clip_axis(
            cursor[1],
            space.origin[1],
            space.world_size[1],
            space.resolution[1],
            brush_samples,
        )?;

        Some(Self {
            left_offset: x.offset,
            bottom_offset: y.offset,
            clipped_left: x.clipped,
            clipped_bottom: y.clipped,
            width: x.length,
            height: y.length,
        })
    }

    /// The part of this area inside the `resolution x resolution` block
    /// starting at `offset`, in that block's local indices. Brush indices stay
    /// aligned with this area.
    pub fn restrict_to(&self, offset: [usize; 2], resolution: usize) -> Option<Self> {
        let x = restrict_axis(
            self.left_offset,
            self.clipped_left,
            self.width,
            offset[0],
            resolution,
        )?;
        let y = restrict_axis(
            self.bottom_offset,
            self.clipped_bottom,
            self.height,
            offset[1],
            resolution,
        )?;

        Some(Self {
            left_offset: x.offset,
            bottom_offset: y.offset,
            clipped_left: x.clipped,
            clipped_bottom: y.clipped,
            width: x.length,
            height: y.length,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn sample_count(&self) -> usize {
        self.width * self.height
    }

    /// Iterate `(brush_x, brush_y, space_x, space_y)` for every covered sample,
    /// row by row.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, usize, usize)> + '_ {
        (0..self.height).flat_map(move |y| {
            (0..self.width).map(move |x| {
                (
                    x + self.clipped_left,
                    y + self.clipped_bottom,
                    x + self.left_offset,
                    y + self.bottom_offset,
                )
            })
        })
    }
}

/// Areas for one frame: the grid-wide area plus every tile that is touched.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameAreas {
    pub grid: CommandArea,
    pub tiles: Vec<(TileCoord, CommandArea)>,
}

impl FrameAreas {
    pub fn touched_tiles(&self) -> impl Iterator<Item = TileCoord> + '_ {
        self.tiles.iter().map(|(coord, _)| *coord)
    }
}
