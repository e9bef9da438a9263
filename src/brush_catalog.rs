//! Keyed collection of brushes.

use crate::brush::Brush;
use crate::error::{Result, SculptError};

/// Id of the procedural brush created by [`BrushCatalog::with_defaults`].
pub const DEFAULT_BRUSH_ID: &str = "default";

/// Ordered set of brushes with unique string ids.
///
/// Order matters: an unknown id resolves to the first brush.
#[derive(Clone, Debug, Default)]
pub struct BrushCatalog {
    brushes: Vec<Brush>,
}

impl BrushCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding one procedural brush.
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        catalog.insert(Brush::procedural(DEFAULT_BRUSH_ID));
        catalog
    }

    /// Add a brush, replacing (in place) any brush with the same id.
    pub fn insert(&mut self, brush: Brush) {
        match self.brushes.iter_mut().find(|b| b.id() == brush.id()) {
            Some(existing) => *existing = brush,
            None => self.brushes.push(brush),
        }
    }

    pub fn remove(&mut self, id: &str) -> Result<Brush> {
        let index = self
            .brushes
            .iter()
            .position(|b| b.id() == id)
            .ok_or_else(|| SculptError::UnknownBrush(id.to_string()))?;
        Ok(self.brushes.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&Brush> {
        self.brushes.iter().find(|b| b.id() == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.brushes.iter().map(Brush::id)
    }

    pub fn len(&self) -> usize {
        self.brushes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brushes.is_empty()
    }

    /// Resolve the current brush. A missing id falls back to the first brush.
    pub fn resolve_mut(&mut self, id: &str) -> Result<&mut Brush> {
        let index = match self.brushes.iter().position(|b| b.id() == id) {
            Some(index) => index,
            None if self.brushes.is_empty() => return Err(SculptError::EmptyCatalog),
            None => {
                log::warn!(
                    "brush `{id}` not found, falling back to `{}`",
                    self.brushes[0].id()
                );
                0
            }
        };
        Ok(&mut self.brushes[index])
    }
}
