// lib.rs - Library exports for maze-engine
// Multi-level maze generation and per-cell visibility precomputation

pub mod error_handling;
pub mod types;
pub mod geometry;
pub mod config;
pub mod grid;
pub mod bundle;
pub mod maze;
pub mod generator;
pub mod registry;
pub mod visibility;
pub mod walker;
pub mod report;

// Re-export commonly used types
pub use config::{BundleSpec, MazeConfig, VisibilitySettings, VoidSpec};
pub use error_handling::{MazeError, PlacementError, Result};
pub use generator::MazeGenerator;
pub use grid::{Cell, Grid};
pub use maze::Maze;
pub use registry::{Boundary, ElementKind, ObjectHandle, Registry};
pub use types::{Connection, Coord, Direction, Situation, Visibility};
pub use visibility::{compute_visibility, spawn_visibility, PendingVisibility, VisibilityReport};
pub use walker::{can_move, TransparencyMode, VisibilityPresenter};
