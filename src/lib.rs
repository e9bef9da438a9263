//! Terrain sculpting core: brush fields, multi-tile height and weight grids,
//! and the stroke state machine that applies sculpt commands to them.
//!
//! The host drives a [`TerrainSculptor`] once per frame and writes the
//! returned [`TilePatch`]es back into its own tile storage.

pub mod batch;
pub mod brush;
pub mod brush_catalog;
pub mod command;
pub mod command_area;
pub mod error;
pub mod falloff;
pub mod host;
pub mod image_brush;
pub mod noise_field;
pub mod sculptor;
pub mod settings;
pub mod stroke;
pub mod terrain_grid;
pub mod undo;
pub mod weight_layer;

pub use brush::{Brush, BrushSamples, BrushShape, BrushSource};
pub use brush_catalog::BrushCatalog;
pub use command::{Command, FlattenMode, ModifierState, Modifiers};
pub use command_area::{CommandArea, FrameAreas, SampleSpace};
pub use error::{Result, SculptError};
pub use falloff::{CurveKey, FalloffCurve};
pub use host::{NullHost, SculptHost};
pub use sculptor::{FrameInput, TerrainSculptor};
pub use settings::{SculptSettings, StrokeSettings, ToolKind, ToolSettings};
pub use terrain_grid::{GridLayout, SampleLayer, TerrainGrid, TileCoord, TilePatch};
pub use undo::UndoHistory;
