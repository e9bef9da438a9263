//! The sculpting commands.
//!
//! A [`Command`] is built once per stroke and applied once per accepted frame
//! over the grid-wide [`CommandArea`]. Samples whose brush weight is zero are
//! skipped. Heights are clamped to `[0, 1]` after every write.
//!
//! Commands that read neighbouring heights (smoothing) read them from the
//! stroke snapshot, never from the array being written, so the result does not
//! depend on the order samples are visited in.

use serde::{Deserialize, Serialize};

use crate::brush::BrushSamples;
use crate::command_area::CommandArea;
use crate::host::SculptHost;
use crate::settings::{SculptSettings, ToolKind};
use crate::terrain_grid::{box_average, SampleLayer, TerrainGrid};
use crate::weight_layer;

/// Raw modifier keys as reported by the host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
    };
    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ctrl: false,
    };
    pub const CTRL: Modifiers = Modifiers {
        shift: false,
        ctrl: true,
    };

    /// Ctrl wins when both keys are held.
    pub fn state(self) -> ModifierState {
        if self.ctrl {
            ModifierState::Ctrl
        } else if self.shift {
            ModifierState::Shift
        } else {
            ModifierState::Plain
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModifierState {
    Plain,
    Ctrl,
    Shift,
}

/// Direction constraint of the flatten tool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlattenMode {
    /// Move toward the plane from both sides
    #[default]
    Flatten,
    /// Only raise samples below the plane
    Bridge,
    /// Only lower samples above the plane
    Extend,
}

impl FlattenMode {
    /// Mode applied while shift is held.
    pub fn opposite(self) -> Self {
        match self {
            FlattenMode::Flatten => FlattenMode::Flatten,
            FlattenMode::Bridge => FlattenMode::Extend,
            FlattenMode::Extend => FlattenMode::Bridge,
        }
    }

    fn allows(self, current: f32, target: f32) -> bool {
        match self {
            FlattenMode::Flatten => true,
            FlattenMode::Bridge => current < target,
            FlattenMode::Extend => current > target,
        }
    }
}

/// Visit order over a command area. Only tests use column order, to check
/// that results are order independent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SampleOrder {
    RowMajor,
    #[allow(dead_code)]
    ColumnMajor,
}

/// Everything one application needs besides the command itself.
pub struct ExecuteContext<'a> {
    pub grid: &'a mut TerrainGrid,
    /// Stitched heights as they were when the snapshot was taken
    pub snapshot: &'a [f32],
    pub brush: &'a BrushSamples,
    /// Grid-wide area in the command's layer
    pub area: &'a CommandArea,
    pub speed: f32,
    /// Effective cursor (after random offset), world XZ
    pub cursor: [f32; 2],
    pub host: &'a mut dyn SculptHost,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    RaiseLower {
        /// Height under the cursor at stroke start
        anchor: f32,
    },
    Smooth {
        radius: usize,
    },
    SetHeight {
        target: f32,
    },
    Flatten {
        target: f32,
        mode: FlattenMode,
    },
    ShrinkWrap {
        /// World-unit offset added to every hit
        offset: f32,
    },
    PaintWeight {
        channel: usize,
        epsilon: f32,
    },
}

impl Command {
    /// Build the command for `kind`. `cursor_height` is the normalised height
    /// under the cursor when the stroke starts.
    pub fn new(kind: ToolKind, settings: &SculptSettings, cursor_height: Option<f32>) -> Self {
        match kind {
            ToolKind::RaiseLower => Command::RaiseLower {
                anchor: cursor_height.unwrap_or(0.0),
            },
            ToolKind::Smooth => Command::Smooth {
                radius: settings.smooth_radius,
            },
            ToolKind::SetHeight => Command::SetHeight {
                target: settings.set_height.clamp(0.0, 1.0),
            },
            ToolKind::Flatten => Command::Flatten {
                target: cursor_height.unwrap_or(settings.set_height),
                mode: settings.flatten_mode,
            },
            ToolKind::ShrinkWrap => Command::ShrinkWrap {
                offset: settings.shrink_wrap_offset,
            },
            ToolKind::PaintWeight => Command::PaintWeight {
                channel: settings.paint_channel,
                epsilon: settings.weight_epsilon,
            },
        }
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            Command::RaiseLower { .. } => ToolKind::RaiseLower,
            Command::Smooth { .. } => ToolKind::Smooth,
            Command::SetHeight { .. } => ToolKind::SetHeight,
            Command::Flatten { .. } => ToolKind::Flatten,
            Command::ShrinkWrap { .. } => ToolKind::ShrinkWrap,
            Command::PaintWeight { .. } => ToolKind::PaintWeight,
        }
    }

    pub fn layer(&self) -> SampleLayer {
        self.kind().layer()
    }

    /// Hook run on the frame shift goes down. Flatten re-captures its plane
    /// under the cursor.
    pub fn on_shift_begin(&mut self, cursor_height: Option<f32>) {
        if let (Command::Flatten { target, .. }, Some(height)) = (self, cursor_height) {
            *target = height;
        }
    }

    pub fn execute(&mut self, modifiers: ModifierState, ctx: ExecuteContext<'_>) {
        self.execute_ordered(modifiers, ctx, SampleOrder::RowMajor);
    }

    pub(crate) fn execute_ordered(
        &mut self,
        modifiers: ModifierState,
        ctx: ExecuteContext<'_>,
        order: SampleOrder,
    ) {
        let ExecuteContext {
            grid,
            snapshot,
            brush,
            area,
            speed,
            cursor,
            host,
        } = ctx;

        match self {
            Command::RaiseLower { anchor } => {
                let anchor = *anchor;
                for_each_weighted(area, brush, order, |w, x, y| {
                    let h = grid.height(x, y);
                    let next = match modifiers {
                        ModifierState::Plain => h + w * speed,
                        ModifierState::Shift => h - w * speed,
                        ModifierState::Ctrl => lerp(h, anchor, w * speed),
                    };
                    grid.set_height(x, y, next);
                });
            }
            Command::Smooth { radius } => {
                let radius = *radius;
                let size = grid.size(SampleLayer::Height);
                for_each_weighted(area, brush, order, |w, x, y| {
                    let h = grid.height(x, y);
                    let average = box_average(snapshot, size, x, y, radius);
                    let next = match modifiers {
                        ModifierState::Shift => {
                            let original = snapshot[y * size[0] + x];
                            h + (original - average) * (w * speed).clamp(0.0, 1.0)
                        }
                        _ => lerp(h, average, w * speed),
                    };
                    grid.set_height(x, y, next);
                });
            }
            Command::SetHeight { target } => {
                if modifiers == ModifierState::Ctrl {
                    if let Some(height) = grid.height_at_world(cursor) {
                        *target = height;
                    }
                    return;
                }
                let goal = match modifiers {
                    ModifierState::Shift => 0.0,
                    _ => *target,
                };
                for_each_weighted(area, brush, order, |w, x, y| {
                    let h = grid.height(x, y);
                    grid.set_height(x, y, lerp(h, goal, w * speed));
                });
            }
            Command::Flatten { target, mode } => {
                if modifiers == ModifierState::Ctrl {
                    if let Some(height) = grid.height_at_world(cursor) {
                        *target = height;
                    }
                }
                let goal = *target;
                let mode = match modifiers {
                    ModifierState::Shift => mode.opposite(),
                    _ => *mode,
                };
                for_each_weighted(area, brush, order, |w, x, y| {
                    let h = grid.height(x, y);
                    if mode.allows(h, goal) {
                        grid.set_height(x, y, lerp(h, goal, w * speed));
                    }
                });
            }
            Command::ShrinkWrap { offset } => {
                let offset = *offset;
                for_each_weighted(area, brush, order, |w, x, y| {
                    let [wx, _, wz] = grid.world_position(x, y);
                    let Some(hit) = host.raycast_down(wx, wz) else {
                        return;
                    };
                    let goal = grid.to_normalized_height(hit + offset);
                    let h = grid.height(x, y);
                    let allowed = match modifiers {
                        ModifierState::Plain => true,
                        ModifierState::Shift => goal > h,
                        ModifierState::Ctrl => goal < h,
                    };
                    if allowed {
                        grid.set_height(x, y, lerp(h, goal, w * speed));
                    }
                });
            }
            Command::PaintWeight { channel, epsilon } => {
                if modifiers == ModifierState::Ctrl {
                    if let Some([x, y]) = grid.sample_at_world(SampleLayer::Weight, cursor) {
                        *channel = weight_layer::dominant_channel(grid.sample_weights(x, y));
                    }
                    return;
                }
                let (channel, epsilon) = (*channel, *epsilon);
                if channel >= grid.channels() {
                    log::warn!(
                        "paint channel {channel} out of range ({} channels)",
                        grid.channels()
                    );
                    return;
                }
                let mut fallbacks = 0usize;
                for_each_weighted(area, brush, order, |w, x, y| {
                    let weights = grid.sample_weights_mut(x, y);
                    let amount = w * speed;
                    let fell_back = match modifiers {
                        ModifierState::Shift => {
                            weight_layer::erase_toward(weights, channel, amount, epsilon)
                        }
                        _ => weight_layer::paint_toward(weights, channel, amount, epsilon),
                    };
                    if fell_back {
                        fallbacks += 1;
                    }
                });
                if fallbacks > 0 {
                    log::warn!(
                        "{fallbacks} weight samples had a zero sum and were reset to channel 0"
                    );
                }
            }
        }
    }
}

/// Linear blend with the factor clamped to `[0, 1]`.
fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t.clamp(0.0, 1.0)
}

/// Call `f(weight, x, y)` for every sample of `area` whose brush weight is
/// non-zero. `x, y` index the stitched grid.
fn for_each_weighted(
    area: &CommandArea,
    brush: &BrushSamples,
    order: SampleOrder,
    mut f: impl FnMut(f32, usize, usize),
) {
    let mut visit = |x: usize, y: usize| {
        let w = brush.get(x + area.clipped_left, y + area.clipped_bottom);
        if w != 0.0 {
            f(w, x + area.left_offset, y + area.bottom_offset);
        }
    };
    match order {
        SampleOrder::RowMajor => {
            for y in 0..area.height {
                for x in 0..area.width {
                    visit(x, y);
                }
            }
        }
        SampleOrder::ColumnMajor => {
            for x in 0..area.width {
                for y in 0..area.height {
                    visit(x, y);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullHost;
    use crate::terrain_grid::GridLayout;

    fn small_grid() -> TerrainGrid {
        TerrainGrid::new(GridLayout {
            height_resolution: 17,
            weight_resolution: 16,
            channels: 3,
            tile_world_size: 16.0,
            height_scale: 10.0,
            ..GridLayout::default()
        })
        .expect("grid")
    }

    fn bumpy_grid() -> TerrainGrid {
        let mut grid = small_grid();
        for y in 0..17 {
            for x in 0..17 {
                let h = ((x * 7 + y * 13) % 11) as f32 / 10.0;
                grid.set_height(x, y, h);
            }
        }
        grid
    }

    fn full_area(size: usize) -> CommandArea {
        CommandArea {
            left_offset: 4,
            bottom_offset: 4,
            width: size,
            height: size,
            ..CommandArea::default()
        }
    }

    fn apply(
        command: &mut Command,
        grid: &mut TerrainGrid,
        snapshot: &[f32],
        modifiers: ModifierState,
        host: &mut dyn SculptHost,
    ) {
        let brush = BrushSamples::filled(8, 1.0);
        let area = full_area(8);
        command.execute(
            modifiers,
            ExecuteContext {
                grid,
                snapshot,
                brush: &brush,
                area: &area,
                speed: 0.5,
                cursor: [8.0, 8.0],
                host,
            },
        );
    }

    #[test]
    fn test_modifier_state_ctrl_wins() {
        let both = Modifiers {
            shift: true,
            ctrl: true,
        };
        assert_eq!(both.state(), ModifierState::Ctrl);
        assert_eq!(Modifiers::SHIFT.state(), ModifierState::Shift);
        assert_eq!(Modifiers::NONE.state(), ModifierState::Plain);
    }

    #[test]
    fn test_raise_and_lower() {
        let mut grid = small_grid();
        let snapshot = grid.heights().to_vec();
        let mut command = Command::RaiseLower { anchor: 0.0 };
        apply(&mut command, &mut grid, &snapshot, ModifierState::Plain, &mut NullHost);
        assert!((grid.height(5, 5) - 0.5).abs() < 1e-6);
        // Outside the area is untouched
        assert_eq!(grid.height(0, 0), 0.0);

        apply(&mut command, &mut grid, &snapshot, ModifierState::Shift, &mut NullHost);
        apply(&mut command, &mut grid, &snapshot, ModifierState::Shift, &mut NullHost);
        assert_eq!(grid.height(5, 5), 0.0);
    }

    #[test]
    fn test_raise_clamps_to_unit_range() {
        let mut grid = small_grid();
        let snapshot = grid.heights().to_vec();
        let mut command = Command::RaiseLower { anchor: 0.0 };
        for _ in 0..5 {
            apply(&mut command, &mut grid, &snapshot, ModifierState::Plain, &mut NullHost);
        }
        assert_eq!(grid.height(6, 6), 1.0);
    }

    #[test]
    fn test_zero_brush_weights_are_skipped() {
        let mut grid = small_grid();
        let snapshot = grid.heights().to_vec();
        let mut brush = vec![1.0; 4];
        brush[0] = 0.0;
        let brush = BrushSamples::from_vec(2, brush).expect("brush");
        let area = full_area(2);
        Command::SetHeight { target: 1.0 }.execute(
            ModifierState::Plain,
            ExecuteContext {
                grid: &mut grid,
                snapshot: &snapshot,
                brush: &brush,
                area: &area,
                speed: 1.0,
                cursor: [0.0, 0.0],
                host: &mut NullHost,
            },
        );
        assert_eq!(grid.height(4, 4), 0.0);
        assert_eq!(grid.height(5, 4), 1.0);
        assert_eq!(grid.height(5, 5), 1.0);
    }

    #[test]
    fn test_smooth_is_order_independent() {
        let base = bumpy_grid();
        let snapshot = base.heights().to_vec();
        let brush = BrushSamples::filled(8, 0.8);
        let area = full_area(8);

        let run = |order: SampleOrder| {
            let mut grid = base.clone();
            Command::Smooth { radius: 2 }.execute_ordered(
                ModifierState::Plain,
                ExecuteContext {
                    grid: &mut grid,
                    snapshot: &snapshot,
                    brush: &brush,
                    area: &area,
                    speed: 1.0,
                    cursor: [8.0, 8.0],
                    host: &mut NullHost,
                },
                order,
            );
            grid.heights().to_vec()
        };

        let rows = run(SampleOrder::RowMajor);
        let columns = run(SampleOrder::ColumnMajor);
        assert_eq!(rows, columns);
        assert_ne!(rows, snapshot);
    }

    #[test]
    fn test_smooth_reduces_variation() {
        let mut grid = bumpy_grid();
        let snapshot = grid.heights().to_vec();
        let spread = |g: &TerrainGrid| {
            let mut lo = f32::MAX;
            let mut hi = f32::MIN;
            for y in 6..10 {
                for x in 6..10 {
                    lo = lo.min(g.height(x, y));
                    hi = hi.max(g.height(x, y));
                }
            }
            hi - lo
        };
        let before = spread(&grid);
        let mut command = Command::Smooth { radius: 2 };
        apply(&mut command, &mut grid, &snapshot, ModifierState::Plain, &mut NullHost);
        assert!(spread(&grid) < before);
    }

    #[test]
    fn test_set_height_ctrl_samples_without_mutating() {
        let mut grid = small_grid();
        grid.set_height(8, 8, 0.75);
        let snapshot = grid.heights().to_vec();
        let mut command = Command::SetHeight { target: 0.2 };
        apply(&mut command, &mut grid, &snapshot, ModifierState::Ctrl, &mut NullHost);
        assert_eq!(command, Command::SetHeight { target: 0.75 });
        assert_eq!(grid.heights(), snapshot.as_slice());

        apply(&mut command, &mut grid, &snapshot, ModifierState::Plain, &mut NullHost);
        assert!((grid.height(5, 5) - 0.375).abs() < 1e-6);
    }

    #[test]
    fn test_set_height_shift_lowers_toward_zero() {
        let mut grid = small_grid();
        grid.set_height(5, 5, 0.8);
        let snapshot = grid.heights().to_vec();
        let mut command = Command::SetHeight { target: 1.0 };
        apply(&mut command, &mut grid, &snapshot, ModifierState::Shift, &mut NullHost);
        assert!((grid.height(5, 5) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_flatten_modes() {
        let mut grid = small_grid();
        grid.set_height(5, 5, 0.2);
        grid.set_height(6, 6, 0.8);
        let snapshot = grid.heights().to_vec();

        let mut bridge = Command::Flatten {
            target: 0.5,
            mode: FlattenMode::Bridge,
        };
        let mut raised = grid.clone();
        apply(&mut bridge, &mut raised, &snapshot, ModifierState::Plain, &mut NullHost);
        assert!((raised.height(5, 5) - 0.35).abs() < 1e-6);
        assert_eq!(raised.height(6, 6), 0.8);

        // Shift flips bridge to extend
        let mut lowered = grid.clone();
        apply(&mut bridge, &mut lowered, &snapshot, ModifierState::Shift, &mut NullHost);
        assert_eq!(lowered.height(5, 5), 0.2);
        assert!((lowered.height(6, 6) - 0.65).abs() < 1e-6);
    }

    #[test]
    fn test_flatten_shift_begin_recaptures_target() {
        let mut command = Command::Flatten {
            target: 0.1,
            mode: FlattenMode::Flatten,
        };
        command.on_shift_begin(Some(0.6));
        assert_eq!(
            command,
            Command::Flatten {
                target: 0.6,
                mode: FlattenMode::Flatten
            }
        );
        command.on_shift_begin(None);
        let mut smooth = Command::Smooth { radius: 1 };
        smooth.on_shift_begin(Some(0.6));
        assert_eq!(smooth, Command::Smooth { radius: 1 });
    }

    struct Floor(f32);

    impl SculptHost for Floor {
        fn raycast_down(&mut self, _x: f32, _z: f32) -> Option<f32> {
            Some(self.0)
        }
    }

    #[test]
    fn test_shrink_wrap_directional_modes() {
        let mut grid = small_grid();
        grid.set_height(5, 5, 0.9);
        let snapshot = grid.heights().to_vec();
        // Hit at 4 plus offset 1 is normalised 0.5 on a height scale of 10
        let mut floor = Floor(4.0);
        let mut command = Command::ShrinkWrap { offset: 1.0 };

        let mut up_only = grid.clone();
        apply(&mut command, &mut up_only, &snapshot, ModifierState::Shift, &mut floor);
        assert_eq!(up_only.height(5, 5), 0.9);
        assert!((up_only.height(6, 6) - 0.25).abs() < 1e-5);

        let mut down_only = grid.clone();
        apply(&mut command, &mut down_only, &snapshot, ModifierState::Ctrl, &mut floor);
        assert!((down_only.height(5, 5) - 0.7).abs() < 1e-5);
        assert_eq!(down_only.height(6, 6), 0.0);
    }

    #[test]
    fn test_shrink_wrap_without_hits_is_noop() {
        let mut grid = small_grid();
        let snapshot = grid.heights().to_vec();
        let mut command = Command::ShrinkWrap { offset: 0.0 };
        apply(&mut command, &mut grid, &snapshot, ModifierState::Plain, &mut NullHost);
        assert_eq!(grid.heights(), snapshot.as_slice());
    }

    #[test]
    fn test_paint_weight_keeps_unit_sums() {
        let mut grid = small_grid();
        let snapshot = grid.heights().to_vec();
        let mut command = Command::PaintWeight {
            channel: 2,
            epsilon: weight_layer::DEFAULT_WEIGHT_EPSILON,
        };
        apply(&mut command, &mut grid, &snapshot, ModifierState::Plain, &mut NullHost);
        apply(&mut command, &mut grid, &snapshot, ModifierState::Shift, &mut NullHost);
        for sample in grid.weights().chunks(3) {
            let sum: f32 = sample.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
        }
        let painted = grid.sample_weights(6, 6);
        assert!((painted[2] - 0.25).abs() < 1e-5);
        assert!((painted[0] - 0.75).abs() < 1e-5);
    }

    #[test]
    fn test_paint_weight_ctrl_picks_dominant_channel() {
        let mut grid = small_grid();
        let [x, y] = grid
            .sample_at_world(SampleLayer::Weight, [8.0, 8.0])
            .expect("sample");
        grid.sample_weights_mut(x, y).copy_from_slice(&[0.1, 0.7, 0.2]);
        let snapshot = grid.heights().to_vec();
        let mut command = Command::PaintWeight {
            channel: 0,
            epsilon: weight_layer::DEFAULT_WEIGHT_EPSILON,
        };
        apply(&mut command, &mut grid, &snapshot, ModifierState::Ctrl, &mut NullHost);
        assert!(matches!(command, Command::PaintWeight { channel: 1, .. }));
    }

    #[test]
    fn test_new_uses_settings_and_cursor_height() {
        let settings = SculptSettings {
            smooth_radius: 3,
            flatten_mode: FlattenMode::Extend,
            ..SculptSettings::default()
        };
        assert_eq!(
            Command::new(ToolKind::Smooth, &settings, None),
            Command::Smooth { radius: 3 }
        );
        assert_eq!(
            Command::new(ToolKind::Flatten, &settings, Some(0.4)),
            Command::Flatten {
                target: 0.4,
                mode: FlattenMode::Extend
            }
        );
        let paint = Command::new(ToolKind::PaintWeight, &settings, None);
        assert_eq!(paint.layer(), SampleLayer::Weight);
    }
}
