//! State carried across the frames of one stroke.

use std::collections::BTreeSet;
use std::f32::consts::TAU;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::command::Command;
use crate::command_area::FrameAreas;
use crate::settings::{StrokeSettings, ToolKind};
use crate::terrain_grid::TileCoord;

/// Accumulated-distance gate for brush spacing.
#[derive(Clone, Debug)]
struct Spacing {
    /// World distance since the last accepted point
    accumulated: f32,
    /// Distance needed for the next acceptance
    threshold: f32,
    last_point: Option<[f32; 2]>,
}

impl Default for Spacing {
    fn default() -> Self {
        // Infinite so the first point is always accepted
        Self {
            accumulated: f32::INFINITY,
            threshold: 0.0,
            last_point: None,
        }
    }
}

#[derive(Debug)]
pub struct StrokeSession {
    command: Command,
    /// Stitched heights before the stroke (or the last refresh)
    snapshot: Vec<f32>,
    spacing: Spacing,
    rotation_offset: f32,
    position_offset: [f32; 2],
    rng: StdRng,
    touched_tiles: BTreeSet<TileCoord>,
    shift_held: bool,
    last_height: Option<f32>,
    collision_disabled: bool,
    applications: usize,
}

impl StrokeSession {
    pub fn new(command: Command, snapshot: Vec<f32>, seed: u64) -> Self {
        Self {
            command,
            snapshot,
            spacing: Spacing::default(),
            rotation_offset: 0.0,
            position_offset: [0.0, 0.0],
            rng: StdRng::seed_from_u64(seed),
            touched_tiles: BTreeSet::new(),
            shift_held: false,
            last_height: None,
            collision_disabled: false,
            applications: 0,
        }
    }

    pub fn tool(&self) -> ToolKind {
        self.command.kind()
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn command_mut(&mut self) -> &mut Command {
        &mut self.command
    }

    pub fn snapshot(&self) -> &[f32] {
        &self.snapshot
    }

    /// Split borrow so the command can read the snapshot while mutating
    /// itself.
    pub(crate) fn command_and_snapshot(&mut self) -> (&mut Command, &[f32]) {
        (&mut self.command, &self.snapshot)
    }

    pub fn refresh_snapshot(&mut self, heights: &[f32]) {
        self.snapshot.clear();
        self.snapshot.extend_from_slice(heights);
    }

    /// Feed a raw cursor position. Returns `true` if the brush should be
    /// applied this frame; on acceptance the random rotation and offset are
    /// redrawn.
    pub fn accept(&mut self, cursor: [f32; 2], brush_size: f32, settings: &StrokeSettings) -> bool {
        if let Some([lx, lz]) = self.spacing.last_point {
            let (dx, dz) = (cursor[0] - lx, cursor[1] - lz);
            self.spacing.accumulated += (dx * dx + dz * dz).sqrt();
        }
        self.spacing.last_point = Some(cursor);

        if settings.random_spacing {
            if self.spacing.accumulated < self.spacing.threshold {
                log::trace!(
                    "spacing rejected point ({:.2} < {:.2})",
                    self.spacing.accumulated,
                    self.spacing.threshold
                );
                return false;
            }
            self.spacing.accumulated = 0.0;
            self.spacing.threshold =
                draw(&mut self.rng, settings.spacing_min, settings.spacing_max)
                    .map_or(0.0, |factor| factor * brush_size);
        }

        self.redraw(brush_size, settings);
        true
    }

    fn redraw(&mut self, brush_size: f32, settings: &StrokeSettings) {
        self.rotation_offset = if settings.random_rotation {
            let max = settings.max_rotation_degrees.abs();
            draw(&mut self.rng, -max, max).unwrap_or(0.0)
        } else {
            0.0
        };

        let max_offset = settings.max_offset.abs() * brush_size;
        self.position_offset = if settings.random_offset && max_offset.is_finite() {
            // sqrt keeps the distribution uniform over the disk
            let radius = max_offset * self.rng.random::<f32>().sqrt();
            let angle = self.rng.random::<f32>() * TAU;
            [radius * angle.cos(), radius * angle.sin()]
        } else {
            [0.0, 0.0]
        };
    }

    /// Cursor after the current random offset.
    pub fn effective_cursor(&self, cursor: [f32; 2]) -> [f32; 2] {
        [
            cursor[0] + self.position_offset[0],
            cursor[1] + self.position_offset[1],
        ]
    }

    /// Current random rotation in degrees.
    pub fn rotation_offset(&self) -> f32 {
        self.rotation_offset
    }

    /// Add the frame's tiles to the touched set and return the ones that were
    /// not touched before.
    pub fn register_tiles(&mut self, areas: &FrameAreas) -> Vec<TileCoord> {
        areas
            .touched_tiles()
            .filter(|coord| self.touched_tiles.insert(*coord))
            .collect()
    }

    pub fn touched_tiles(&self) -> impl Iterator<Item = TileCoord> + '_ {
        self.touched_tiles.iter().copied()
    }

    /// Track shift; `true` on the frame it goes down.
    pub fn shift_pressed(&mut self, shift: bool) -> bool {
        let edge = shift && !self.shift_held;
        self.shift_held = shift;
        edge
    }

    pub fn last_height(&self) -> Option<f32> {
        self.last_height
    }

    pub fn set_last_height(&mut self, height: Option<f32>) {
        if height.is_some() {
            self.last_height = height;
        }
    }

    pub fn collision_disabled(&self) -> bool {
        self.collision_disabled
    }

    pub fn set_collision_disabled(&mut self, disabled: bool) {
        self.collision_disabled = disabled;
    }

    /// Number of frames the brush was applied.
    pub fn applications(&self) -> usize {
        self.applications
    }

    pub(crate) fn count_application(&mut self) {
        self.applications += 1;
    }
}

fn ordered(a: f32, b: f32) -> (f32, f32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Uniform draw between two bounds in either order. `None` when the range is
/// not finite.
fn draw(rng: &mut StdRng, a: f32, b: f32) -> Option<f32> {
    let (lo, hi) = ordered(a, b);
    if lo.is_finite() && hi.is_finite() && (hi - lo).is_finite() {
        Some(rng.random_range(lo..=hi))
    } else {
        log::warn!("ignoring non-finite stroke randomisation range [{a}, {b}]");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_area::CommandArea;

    fn session() -> StrokeSession {
        StrokeSession::new(Command::Smooth { radius: 1 }, vec![0.0; 4], 7)
    }

    fn spaced(min: f32, max: f32) -> StrokeSettings {
        StrokeSettings {
            random_spacing: true,
            spacing_min: min,
            spacing_max: max,
            ..StrokeSettings::default()
        }
    }

    #[test]
    fn test_every_frame_accepted_without_spacing() {
        let mut s = session();
        let settings = StrokeSettings::default();
        for i in 0..5 {
            assert!(s.accept([i as f32 * 0.01, 0.0], 10.0, &settings));
        }
    }

    #[test]
    fn test_first_point_always_accepted() {
        let mut s = session();
        assert!(s.accept([3.0, 4.0], 10.0, &spaced(0.5, 0.5)));
    }

    #[test]
    fn test_spacing_threshold() {
        let mut s = session();
        let settings = spaced(0.5, 0.5);
        assert!(s.accept([0.0, 0.0], 10.0, &settings));
        // Threshold is 5 world units
        assert!(!s.accept([2.0, 0.0], 10.0, &settings));
        assert!(!s.accept([4.0, 0.0], 10.0, &settings));
        assert!(s.accept([5.0, 0.0], 10.0, &settings));
        assert!(!s.accept([5.0, 3.0], 10.0, &settings));
        assert!(s.accept([5.0, 6.0], 10.0, &settings));
    }

    #[test]
    fn test_spacing_bounds_may_be_swapped() {
        let mut s = session();
        let settings = spaced(0.4, 0.2);
        assert!(s.accept([0.0, 0.0], 10.0, &settings));
        assert!(!s.accept([1.9, 0.0], 10.0, &settings));
        assert!(s.accept([6.0, 0.0], 10.0, &settings));
    }

    #[test]
    fn test_random_rotation_and_offset_stay_in_range() {
        let mut s = session();
        let settings = StrokeSettings {
            random_rotation: true,
            max_rotation_degrees: 30.0,
            random_offset: true,
            max_offset: 0.5,
            ..StrokeSettings::default()
        };
        let mut rotations = Vec::new();
        for _ in 0..50 {
            assert!(s.accept([0.0, 0.0], 10.0, &settings));
            assert!(s.rotation_offset().abs() <= 30.0);
            let [x, z] = s.effective_cursor([0.0, 0.0]);
            assert!((x * x + z * z).sqrt() <= 5.0 + 1e-4);
            rotations.push(s.rotation_offset());
        }
        // Redrawn on every accepted tick
        assert!(rotations.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn test_non_finite_bounds_skip_the_draw() {
        let mut s = session();
        let settings = StrokeSettings {
            random_spacing: true,
            spacing_min: f32::NAN,
            spacing_max: f32::INFINITY,
            random_rotation: true,
            max_rotation_degrees: f32::INFINITY,
            random_offset: true,
            max_offset: f32::INFINITY,
            ..StrokeSettings::default()
        };
        for i in 0..4 {
            // Threshold falls back to 0, so every point is accepted
            assert!(s.accept([i as f32, 0.0], 10.0, &settings));
            assert_eq!(s.rotation_offset(), 0.0);
            assert_eq!(s.effective_cursor([1.0, 2.0]), [1.0, 2.0]);
        }

        let huge = StrokeSettings {
            random_rotation: true,
            max_rotation_degrees: f32::MAX,
            ..StrokeSettings::default()
        };
        assert!(s.accept([0.0, 0.0], 10.0, &huge));
        assert_eq!(s.rotation_offset(), 0.0);
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let settings = StrokeSettings {
            random_rotation: true,
            ..StrokeSettings::default()
        };
        let mut a = session();
        let mut b = session();
        for _ in 0..10 {
            a.accept([0.0, 0.0], 10.0, &settings);
            b.accept([0.0, 0.0], 10.0, &settings);
            assert_eq!(a.rotation_offset(), b.rotation_offset());
        }
    }

    #[test]
    fn test_register_tiles_reports_new_ones_once() {
        let mut s = session();
        let frame = |coords: &[(u32, u32)]| FrameAreas {
            grid: CommandArea::default(),
            tiles: coords
                .iter()
                .map(|&(x, y)| (TileCoord::new(x, y), CommandArea::default()))
                .collect(),
        };
        assert_eq!(s.register_tiles(&frame(&[(0, 0)])), vec![TileCoord::new(0, 0)]);
        assert_eq!(
            s.register_tiles(&frame(&[(0, 0), (1, 0)])),
            vec![TileCoord::new(1, 0)]
        );
        assert!(s.register_tiles(&frame(&[(1, 0)])).is_empty());
        assert_eq!(s.touched_tiles().count(), 2);
    }

    #[test]
    fn test_shift_edge_detection() {
        let mut s = session();
        assert!(!s.shift_pressed(false));
        assert!(s.shift_pressed(true));
        assert!(!s.shift_pressed(true));
        assert!(!s.shift_pressed(false));
        assert!(s.shift_pressed(true));
    }
}
