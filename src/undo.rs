//! Undo/redo history for sculpt strokes.
//!
//! Each stroke becomes one [`StrokeRecord`]: copies of every tile the stroke
//! touched, taken before the tile's first mutation. Undoing swaps the record
//! with the tiles' current data, so the same record type serves redo.
//!
//! [`UndoHistory`] is itself a [`SculptHost`]: hand it to the sculptor (or
//! forward to it from a host) and strokes are recorded automatically.

use crate::error::Result;
use crate::host::SculptHost;
use crate::terrain_grid::{TerrainGrid, TileCoord};

/// Saved contents of one tile.
#[derive(Clone, Debug, PartialEq)]
pub struct TileState {
    pub coord: TileCoord,
    heights: Vec<f32>,
    weights: Vec<f32>,
}

/// All tiles touched by one stroke.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StrokeRecord {
    tiles: Vec<TileState>,
}

impl StrokeRecord {
    /// Copy the current data of any tile in `coords` not yet recorded.
    pub fn capture(&mut self, coords: &[TileCoord], grid: &TerrainGrid) -> Result<()> {
        for &coord in coords {
            if self.tiles.iter().any(|t| t.coord == coord) {
                continue;
            }
            self.tiles.push(TileState {
                coord,
                heights: grid.tile_heights(coord)?,
                weights: grid.tile_weights(coord)?,
            });
        }
        Ok(())
    }

    pub fn tiles(&self) -> impl Iterator<Item = TileCoord> + '_ {
        self.tiles.iter().map(|t| t.coord)
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Write the saved data back and return what it replaced.
    fn swap_into(&self, grid: &mut TerrainGrid) -> Result<StrokeRecord> {
        let coords: Vec<TileCoord> = self.tiles().collect();
        let mut replaced = StrokeRecord::default();
        replaced.capture(&coords, grid)?;
        for tile in &self.tiles {
            grid.set_tile_heights(tile.coord, &tile.heights)?;
            grid.set_tile_weights(tile.coord, &tile.weights)?;
        }
        Ok(replaced)
    }
}

/// Bounded stroke-level undo/redo history.
#[derive(Debug)]
pub struct UndoHistory {
    /// Stack of previous states (most recent at the end)
    past: Vec<StrokeRecord>,
    /// Stack of undone states available for redo (most recent at the end)
    future: Vec<StrokeRecord>,
    /// Maximum number of undo entries to keep
    max_entries: usize,
    /// Record of the stroke in progress
    pending: Option<StrokeRecord>,
}

impl UndoHistory {
    pub fn new(max_entries: usize) -> Self {
        Self {
            past: Vec::new(),
            future: Vec::new(),
            max_entries: max_entries.max(1),
            pending: None,
        }
    }

    /// Push a finished record. Clears the redo stack.
    pub fn push(&mut self, record: StrokeRecord) {
        if record.is_empty() {
            return;
        }
        self.future.clear();
        self.past.push(record);
        // Trim oldest entries if over capacity
        while self.past.len() > self.max_entries {
            self.past.remove(0);
        }
    }

    /// Restore the most recent stroke. Returns the restored tiles, or `None`
    /// if there is nothing to undo.
    pub fn undo(&mut self, grid: &mut TerrainGrid) -> Result<Option<Vec<TileCoord>>> {
        let Some(record) = self.past.pop() else {
            return Ok(None);
        };
        let current = record.swap_into(grid)?;
        let tiles = record.tiles().collect();
        self.future.push(current);
        log::debug!("undo restored {} tiles", record.tiles.len());
        Ok(Some(tiles))
    }

    pub fn redo(&mut self, grid: &mut TerrainGrid) -> Result<Option<Vec<TileCoord>>> {
        let Some(record) = self.future.pop() else {
            return Ok(None);
        };
        let current = record.swap_into(grid)?;
        let tiles = record.tiles().collect();
        self.past.push(current);
        log::debug!("redo restored {} tiles", record.tiles.len());
        Ok(Some(tiles))
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
        self.pending = None;
    }

    pub fn undo_count(&self) -> usize {
        self.past.len()
    }

    pub fn redo_count(&self) -> usize {
        self.future.len()
    }

    /// Whether a stroke has registered tiles that are not committed yet.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl SculptHost for UndoHistory {
    fn record_undo(&mut self, tiles: &[TileCoord], grid: &TerrainGrid) {
        let pending = self.pending.get_or_insert_with(StrokeRecord::default);
        if let Err(err) = pending.capture(tiles, grid) {
            log::warn!("failed to record undo state: {err}");
        }
    }

    fn stroke_finished(&mut self, _last_height: Option<f32>) {
        if let Some(record) = self.pending.take() {
            self.push(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain_grid::GridLayout;

    fn make_grid() -> TerrainGrid {
        TerrainGrid::new(GridLayout {
            tiles_x: 2,
            tiles_y: 1,
            height_resolution: 5,
            weight_resolution: 4,
            channels: 2,
            tile_world_size: 10.0,
            ..GridLayout::default()
        })
        .expect("grid")
    }

    fn left() -> TileCoord {
        TileCoord::new(0, 0)
    }

    /// Record `tiles`, run `edit`, then finish the stroke.
    fn stroke(
        history: &mut UndoHistory,
        grid: &mut TerrainGrid,
        tiles: &[TileCoord],
        edit: impl FnOnce(&mut TerrainGrid),
    ) {
        history.record_undo(tiles, grid);
        edit(grid);
        history.stroke_finished(None);
    }

    #[test]
    fn test_new_history_empty() {
        let history = UndoHistory::new(10);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.undo_count(), 0);
        assert_eq!(history.redo_count(), 0);
    }

    #[test]
    fn test_push_and_undo() {
        let mut history = UndoHistory::new(10);
        let mut grid = make_grid();
        stroke(&mut history, &mut grid, &[left()], |g| g.set_height(1, 1, 0.5));
        assert!(history.can_undo());
        assert!(!history.can_redo());

        let restored = history.undo(&mut grid).expect("undo");
        assert_eq!(restored, Some(vec![left()]));
        assert_eq!(grid.height(1, 1), 0.0);
        assert!(!history.can_undo());
        assert!(history.can_redo());
    }

    #[test]
    fn test_undo_redo_cycle() {
        let mut history = UndoHistory::new(10);
        let mut grid = make_grid();
        stroke(&mut history, &mut grid, &[left()], |g| g.set_height(1, 1, 0.3));
        stroke(&mut history, &mut grid, &[left()], |g| g.set_height(1, 1, 0.6));

        history.undo(&mut grid).expect("undo");
        assert!((grid.height(1, 1) - 0.3).abs() < 1e-6);
        assert!(history.can_undo());
        assert!(history.can_redo());

        history.redo(&mut grid).expect("redo");
        assert!((grid.height(1, 1) - 0.6).abs() < 1e-6);
        assert_eq!(history.undo_count(), 2);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_new_action_clears_redo() {
        let mut history = UndoHistory::new(10);
        let mut grid = make_grid();
        stroke(&mut history, &mut grid, &[left()], |g| g.set_height(1, 1, 0.3));
        stroke(&mut history, &mut grid, &[left()], |g| g.set_height(1, 1, 0.6));

        history.undo(&mut grid).expect("undo");
        assert!(history.can_redo());

        stroke(&mut history, &mut grid, &[left()], |g| g.set_height(2, 2, 0.9));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_max_entries_trim() {
        let mut history = UndoHistory::new(3);
        let mut grid = make_grid();
        for i in 0..5 {
            stroke(&mut history, &mut grid, &[left()], |g| {
                g.set_height(1, 1, i as f32 * 0.1)
            });
        }
        assert_eq!(history.undo_count(), 3);
    }

    #[test]
    fn test_clear() {
        let mut history = UndoHistory::new(10);
        let mut grid = make_grid();
        stroke(&mut history, &mut grid, &[left()], |g| g.set_height(1, 1, 0.3));
        history.record_undo(&[left()], &grid);
        assert!(history.has_pending());

        history.clear();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(!history.has_pending());
    }

    #[test]
    fn test_undo_empty_returns_none() {
        let mut history = UndoHistory::new(10);
        let mut grid = make_grid();
        assert_eq!(history.undo(&mut grid), Ok(None));
        assert_eq!(history.redo(&mut grid), Ok(None));
    }

    #[test]
    fn test_stroke_without_tiles_is_not_recorded() {
        let mut history = UndoHistory::new(10);
        history.stroke_finished(Some(0.5));
        assert!(!history.can_undo());
    }

    #[test]
    fn test_first_capture_wins_within_a_stroke() {
        let mut history = UndoHistory::new(10);
        let mut grid = make_grid();
        history.record_undo(&[left()], &grid);
        grid.set_height(1, 1, 0.4);
        // A later registration of the same tile must not overwrite the
        // pre-stroke copy.
        history.record_undo(&[left(), TileCoord::new(1, 0)], &grid);
        grid.set_height(6, 1, 0.8);
        history.stroke_finished(None);

        history.undo(&mut grid).expect("undo");
        assert_eq!(grid.height(1, 1), 0.0);
        assert!((grid.height(6, 1) - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_undo_restores_weights() {
        let mut history = UndoHistory::new(10);
        let mut grid = make_grid();
        stroke(&mut history, &mut grid, &[TileCoord::new(1, 0)], |g| {
            g.sample_weights_mut(5, 1).copy_from_slice(&[0.0, 1.0])
        });
        history.undo(&mut grid).expect("undo");
        assert_eq!(grid.sample_weights(5, 1), &[1.0, 0.0]);
    }
}
