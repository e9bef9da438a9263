//! Error type shared by the sculpting core.
//!
//! Clipped-to-nothing regions are not errors; they surface as `None` from
//! area computation and are skipped silently.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SculptError {
    #[error("a stroke is already in progress")]
    StrokeInProgress,

    #[error("no stroke in progress")]
    NoActiveStroke,

    #[error("brush catalog is empty")]
    EmptyCatalog,

    #[error("no brush with id `{0}`")]
    UnknownBrush(String),

    #[error("batch operation cancelled")]
    Cancelled,

    #[error("invalid grid layout: {0}")]
    InvalidLayout(String),

    #[error("tile data has {actual} values, expected {expected}")]
    TileDataMismatch { expected: usize, actual: usize },

    #[error("tile ({x}, {y}) is outside the grid")]
    TileOutOfRange { x: u32, y: u32 },

    #[error("weight channel {channel} out of range ({channels} channels)")]
    ChannelOutOfRange { channel: usize, channels: usize },
}

pub type Result<T> = std::result::Result<T, SculptError>;
