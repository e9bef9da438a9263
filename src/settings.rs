//! Sculpting configuration.
//!
//! All tool parameters live in one explicit [`SculptSettings`] value owned by
//! the sculptor; nothing is read from global state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::brush::BrushShape;
use crate::brush_catalog::DEFAULT_BRUSH_ID;
use crate::command::FlattenMode;
use crate::terrain_grid::SampleLayer;
use crate::weight_layer::DEFAULT_WEIGHT_EPSILON;

/// Default per-application height change for raise/lower, in normalised units.
const DEFAULT_RAISE_SPEED: f32 = 0.01;
/// Default blend speed for every other tool.
const DEFAULT_BLEND_SPEED: f32 = 0.5;

/// The sculpting tools.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ToolKind {
    RaiseLower,
    Smooth,
    SetHeight,
    Flatten,
    ShrinkWrap,
    PaintWeight,
}

impl ToolKind {
    pub const ALL: [ToolKind; 6] = [
        ToolKind::RaiseLower,
        ToolKind::Smooth,
        ToolKind::SetHeight,
        ToolKind::Flatten,
        ToolKind::ShrinkWrap,
        ToolKind::PaintWeight,
    ];

    /// Which stitched array the tool mutates.
    pub fn layer(self) -> SampleLayer {
        match self {
            ToolKind::PaintWeight => SampleLayer::Weight,
            _ => SampleLayer::Height,
        }
    }
}

/// Parameters of one tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    /// Strength multiplier applied to brush weights
    pub speed: f32,
    /// Catalog id of the brush to use
    pub brush_id: String,
    pub shape: BrushShape,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            speed: DEFAULT_BLEND_SPEED,
            brush_id: DEFAULT_BRUSH_ID.to_string(),
            shape: BrushShape::default(),
        }
    }
}

/// Spacing/rotation/offset randomisation applied to every tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrokeSettings {
    pub random_spacing: bool,
    /// Spacing bounds as a fraction of the brush size
    pub spacing_min: f32,
    pub spacing_max: f32,
    pub random_rotation: bool,
    /// Largest random rotation, either direction
    pub max_rotation_degrees: f32,
    pub random_offset: bool,
    /// Offset disk radius as a fraction of the brush size
    pub max_offset: f32,
    /// Fixed seed for reproducible strokes
    pub seed: Option<u64>,
}

impl Default for StrokeSettings {
    fn default() -> Self {
        Self {
            random_spacing: false,
            spacing_min: 0.1,
            spacing_max: 0.3,
            random_rotation: false,
            max_rotation_degrees: 180.0,
            random_offset: false,
            max_offset: 0.25,
            seed: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SculptSettings {
    pub tools: BTreeMap<ToolKind, ToolSettings>,
    pub stroke: StrokeSettings,
    /// Invert every brush regardless of its own flag
    pub invert_globally: bool,
    /// Normalised target height for the set-height tool
    pub set_height: f32,
    pub flatten_mode: FlattenMode,
    /// Half-width of the smoothing box, in samples
    pub smooth_radius: usize,
    /// Texture channel painted by the weight tool
    pub paint_channel: usize,
    /// World-unit offset added to shrink-wrap hits
    pub shrink_wrap_offset: f32,
    pub weight_epsilon: f32,
}

impl Default for SculptSettings {
    fn default() -> Self {
        let tools = ToolKind::ALL
            .iter()
            .map(|&kind| {
                let speed = match kind {
                    ToolKind::RaiseLower => DEFAULT_RAISE_SPEED,
                    _ => DEFAULT_BLEND_SPEED,
                };
                (
                    kind,
                    ToolSettings {
                        speed,
                        ..ToolSettings::default()
                    },
                )
            })
            .collect();

        Self {
            tools,
            stroke: StrokeSettings::default(),
            invert_globally: false,
            set_height: 0.0,
            flatten_mode: FlattenMode::Flatten,
            smooth_radius: 1,
            paint_channel: 0,
            shrink_wrap_offset: 0.0,
            weight_epsilon: DEFAULT_WEIGHT_EPSILON,
        }
    }
}

impl SculptSettings {
    /// Settings of `kind`, or the defaults if the map has no entry.
    pub fn tool(&self, kind: ToolKind) -> ToolSettings {
        self.tools.get(&kind).cloned().unwrap_or_default()
    }

    pub fn tool_mut(&mut self, kind: ToolKind) -> &mut ToolSettings {
        self.tools.entry(kind).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_every_tool() {
        let settings = SculptSettings::default();
        for kind in ToolKind::ALL {
            assert!(settings.tools.contains_key(&kind));
        }
        assert_eq!(settings.tool(ToolKind::RaiseLower).speed, DEFAULT_RAISE_SPEED);
        assert_eq!(settings.tool(ToolKind::Smooth).speed, DEFAULT_BLEND_SPEED);
    }

    #[test]
    fn test_missing_tool_uses_default() {
        let mut settings = SculptSettings::default();
        settings.tools.clear();
        assert_eq!(settings.tool(ToolKind::Flatten), ToolSettings::default());
        settings.tool_mut(ToolKind::Flatten).speed = 0.9;
        assert_eq!(settings.tool(ToolKind::Flatten).speed, 0.9);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{
            "invert_globally": true,
            "stroke": { "random_spacing": true, "seed": 42 },
            "tools": { "Smooth": { "speed": 0.25 } }
        }"#;
        let settings: SculptSettings = serde_json::from_str(json).expect("valid settings");
        assert!(settings.invert_globally);
        assert!(settings.stroke.random_spacing);
        assert_eq!(settings.stroke.seed, Some(42));
        assert_eq!(settings.stroke.spacing_max, 0.3);
        let smooth = settings.tool(ToolKind::Smooth);
        assert_eq!(smooth.speed, 0.25);
        assert_eq!(smooth.brush_id, DEFAULT_BRUSH_ID);
        assert_eq!(settings.smooth_radius, 1);
    }

    #[test]
    fn test_tool_layers() {
        assert_eq!(ToolKind::PaintWeight.layer(), SampleLayer::Weight);
        assert_eq!(ToolKind::Smooth.layer(), SampleLayer::Height);
    }
}
