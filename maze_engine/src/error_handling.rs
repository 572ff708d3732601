// error_handling.rs - Error types shared by generation, registration and visibility

use thiserror::Error;

use crate::types::{Coord, Direction};

#[derive(Error, Debug)]
pub enum MazeError {
    #[error("Invalid maze configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Invalid state: {reason}")]
    InvalidState { reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Visibility task failed: {0}")]
    TaskFailed(String),
}

impl MazeError {
    pub fn config(reason: impl Into<String>) -> Self {
        MazeError::InvalidConfig { reason: reason.into() }
    }

    pub fn state(reason: impl Into<String>) -> Self {
        MazeError::InvalidState { reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, MazeError>;

/// Why a bundle could not be carved. Never fatal: the caller skips the instance.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlacementError {
    #[error("Bundle cell {0} is outside the grid")]
    OutOfRange(Coord),

    #[error("Bundle cell {0} is already occupied")]
    Collision(Coord),

    #[error("Bundle end beyond {at} heading {direction:?} is blocked")]
    BlockedEnd { at: Coord, direction: Direction },

    #[error("Invalid bundle shape: {reason}")]
    InvalidShape { reason: String },
}
