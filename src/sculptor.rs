//! Stroke state machine.
//!
//! A [`TerrainSculptor`] is idle or holds exactly one [`StrokeSession`]. The
//! host calls it once per frame, either through the explicit
//! `begin`/`continue`/`end` calls or through [`TerrainSculptor::update`], and
//! receives the changed tile rectangles back.

use crate::brush_catalog::BrushCatalog;
use crate::command::{Command, ExecuteContext, ModifierState, Modifiers};
use crate::error::{Result, SculptError};
use crate::host::SculptHost;
use crate::settings::{SculptSettings, ToolKind};
use crate::stroke::StrokeSession;
use crate::terrain_grid::{TerrainGrid, TilePatch};

/// Input for one frame of [`TerrainSculptor::update`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameInput {
    pub tool: ToolKind,
    /// World XZ under the pointer, `None` when the pointer misses the terrain
    pub cursor: Option<[f32; 2]>,
    /// Primary button held
    pub pressed: bool,
    pub modifiers: Modifiers,
}

pub struct TerrainSculptor {
    grid: TerrainGrid,
    catalog: BrushCatalog,
    settings: SculptSettings,
    session: Option<StrokeSession>,
}

impl TerrainSculptor {
    pub fn new(grid: TerrainGrid, catalog: BrushCatalog, settings: SculptSettings) -> Self {
        Self {
            grid,
            catalog,
            settings,
            session: None,
        }
    }

    pub fn grid(&self) -> &TerrainGrid {
        &self.grid
    }

    /// Mutable grid access for undo, batch operations and tile reloads.
    pub fn grid_mut(&mut self) -> &mut TerrainGrid {
        &mut self.grid
    }

    pub fn catalog(&self) -> &BrushCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut BrushCatalog {
        &mut self.catalog
    }

    pub fn settings(&self) -> &SculptSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SculptSettings {
        &mut self.settings
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&StrokeSession> {
        self.session.as_ref()
    }

    pub fn into_grid(self) -> TerrainGrid {
        self.grid
    }

    /// Start a stroke and apply the first frame.
    pub fn begin_stroke(
        &mut self,
        tool: ToolKind,
        cursor: [f32; 2],
        modifiers: Modifiers,
        host: &mut dyn SculptHost,
    ) -> Result<Vec<TilePatch>> {
        if self.session.is_some() {
            return Err(SculptError::StrokeInProgress);
        }

        if tool == ToolKind::PaintWeight && self.settings.paint_channel >= self.grid.channels() {
            return Err(SculptError::ChannelOutOfRange {
                channel: self.settings.paint_channel,
                channels: self.grid.channels(),
            });
        }

        let cursor_height = self.grid.height_at_world(cursor);
        let command = Command::new(tool, &self.settings, cursor_height);
        let seed = self.settings.stroke.seed.unwrap_or_else(rand::random);
        let mut session = StrokeSession::new(command, self.grid.heights().to_vec(), seed);
        session.set_last_height(cursor_height);

        if tool == ToolKind::ShrinkWrap {
            host.set_terrain_collision(false);
            session.set_collision_disabled(true);
        }

        log::debug!("stroke begin: {tool:?} at ({:.2}, {:.2})", cursor[0], cursor[1]);
        self.session = Some(session);
        self.apply(cursor, modifiers, host)
    }

    /// Apply one more frame. A `None` cursor skips the frame.
    pub fn continue_stroke(
        &mut self,
        cursor: Option<[f32; 2]>,
        modifiers: Modifiers,
        host: &mut dyn SculptHost,
    ) -> Result<Vec<TilePatch>> {
        if self.session.is_none() {
            return Err(SculptError::NoActiveStroke);
        }
        match cursor {
            Some(cursor) => self.apply(cursor, modifiers, host),
            None => {
                log::trace!("pointer off terrain, frame skipped");
                Ok(Vec::new())
            }
        }
    }

    /// Finish the stroke normally.
    pub fn end_stroke(&mut self, host: &mut dyn SculptHost) -> Result<()> {
        if self.session.is_none() {
            return Err(SculptError::NoActiveStroke);
        }
        self.finish(host);
        Ok(())
    }

    /// Finish the stroke because input was lost. Runs the same cleanup as
    /// [`end_stroke`](Self::end_stroke); does nothing when idle.
    pub fn abort_stroke(&mut self, host: &mut dyn SculptHost) {
        if self.session.is_some() {
            log::debug!("stroke aborted");
            self.finish(host);
        }
    }

    /// Drive the state machine from one frame of input.
    pub fn update(&mut self, input: &FrameInput, host: &mut dyn SculptHost) -> Result<Vec<TilePatch>> {
        match (self.session.is_some(), input.pressed) {
            (false, true) => match input.cursor {
                Some(cursor) => self.begin_stroke(input.tool, cursor, input.modifiers, host),
                None => Ok(Vec::new()),
            },
            (true, true) => self.continue_stroke(input.cursor, input.modifiers, host),
            (true, false) => {
                self.end_stroke(host)?;
                Ok(Vec::new())
            }
            (false, false) => Ok(Vec::new()),
        }
    }

    fn finish(&mut self, host: &mut dyn SculptHost) {
        let Some(session) = self.session.take() else {
            return;
        };
        if session.collision_disabled() {
            host.set_terrain_collision(true);
        }
        log::debug!(
            "stroke end: {:?}, {} applications over {} tiles",
            session.tool(),
            session.applications(),
            session.touched_tiles().count()
        );
        host.stroke_finished(session.last_height());
    }

    fn apply(
        &mut self,
        cursor: [f32; 2],
        modifiers: Modifiers,
        host: &mut dyn SculptHost,
    ) -> Result<Vec<TilePatch>> {
        let Some(session) = self.session.as_mut() else {
            return Err(SculptError::NoActiveStroke);
        };

        let tool = self.settings.tool(session.tool());
        let layer = session.command().layer();

        if !session.accept(cursor, tool.shape.size, &self.settings.stroke) {
            return Ok(Vec::new());
        }
        let cursor = session.effective_cursor(cursor);

        let brush_samples = self.grid.brush_size_in_samples(layer, tool.shape.size);
        let Some(areas) = self.grid.command_areas(layer, cursor, brush_samples) else {
            log::trace!("brush misses the grid at ({:.2}, {:.2})", cursor[0], cursor[1]);
            return Ok(Vec::new());
        };

        let brush = self.catalog.resolve_mut(&tool.brush_id)?;
        brush.set_shape(&tool.shape);
        let samples = brush.update(brush_samples, self.settings.invert_globally);
        let rotated;
        let samples = if session.rotation_offset() != 0.0 {
            rotated = samples.rotated(session.rotation_offset());
            &rotated
        } else {
            samples
        };

        let new_tiles = session.register_tiles(&areas);
        if !new_tiles.is_empty() {
            log::debug!("registering {} tiles for undo", new_tiles.len());
            host.record_undo(&new_tiles, &self.grid);
        }

        let state = modifiers.state();
        if state == ModifierState::Ctrl {
            session.refresh_snapshot(self.grid.heights());
        }
        if session.shift_pressed(modifiers.shift) {
            let height = self.grid.height_at_world(cursor);
            session.command_mut().on_shift_begin(height);
        }

        let (command, snapshot) = session.command_and_snapshot();
        command.execute(
            state,
            ExecuteContext {
                grid: &mut self.grid,
                snapshot,
                brush: samples,
                area: &areas.grid,
                speed: tool.speed,
                cursor,
                host,
            },
        );

        session.set_last_height(self.grid.height_at_world(cursor));
        session.count_application();

        areas
            .tiles
            .iter()
            .map(|(coord, area)| self.grid.tile_patch(layer, *coord, area))
            .collect()
    }
}
