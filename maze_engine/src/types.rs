// types.rs - Shared type definitions for maze topology and visibility state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Grid position. `z` is the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coord {
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The coordinate one step away in `direction` on the same level.
    #[inline]
    pub fn step(self, direction: Direction) -> Coord {
        let (dx, dy) = direction.offset();
        Coord::new(self.x + dx, self.y + dy, self.z)
    }

    #[inline]
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Coord {
        Coord::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

impl From<[i32; 3]> for Coord {
    fn from(arr: [i32; 3]) -> Self {
        Coord::new(arr[0], arr[1], arr[2])
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// The four horizontal sides of a cell, in slot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    PlusX = 0,
    PlusY = 1,
    MinusX = 2,
    MinusY = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::PlusX,
        Direction::PlusY,
        Direction::MinusX,
        Direction::MinusY,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn from_index(index: usize) -> Direction {
        Direction::ALL[index % 4]
    }

    #[inline]
    pub const fn opposite(self) -> Direction {
        Direction::from_index(self as usize + 2)
    }

    /// Quarter turn counter-clockwise (+X -> +Y).
    #[inline]
    pub const fn turn_left(self) -> Direction {
        Direction::from_index(self as usize + 1)
    }

    #[inline]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Direction::PlusX => (1, 0),
            Direction::PlusY => (0, 1),
            Direction::MinusX => (-1, 0),
            Direction::MinusY => (0, -1),
        }
    }

    #[inline]
    pub const fn is_x_axis(self) -> bool {
        matches!(self, Direction::PlusX | Direction::MinusX)
    }
}

/// Passability of one cell side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Connection {
    Open,
    Closed,
    /// Undecided; only seen during generation.
    #[default]
    Pending,
    /// Structural boundary, never reconsidered.
    Unpassable,
    /// No relation across this side (void or bundle interior).
    Absent,
}

impl Connection {
    /// Sides the braid pass may still turn into a passage.
    #[inline]
    pub const fn is_connectable(self) -> bool {
        matches!(self, Connection::Open | Connection::Pending)
    }

    /// Sides that must never receive a wall from the braid pass.
    #[inline]
    pub const fn is_no_wall_marker(self) -> bool {
        matches!(self, Connection::Unpassable | Connection::Absent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Situation {
    #[default]
    Normal,
    Void,
    /// First path cell of a bundle.
    Handle,
    /// Path cell of a bundle after the handle.
    Entrance,
    /// Bundle filler, sealed on every side.
    Hanging,
    /// Ramp shadow cell with no content.
    Undefined,
    /// Ramp shadow cell at a path end, linked to the path cell in its column.
    Pair,
}

impl Situation {
    /// Cells a viewer can stand in.
    #[inline]
    pub const fn is_walkable(self) -> bool {
        matches!(self, Situation::Normal | Situation::Handle | Situation::Entrance)
    }

    #[inline]
    pub const fn is_bundle_path(self) -> bool {
        matches!(self, Situation::Handle | Situation::Entrance)
    }

    #[inline]
    pub const fn is_shadow(self) -> bool {
        matches!(self, Situation::Undefined | Situation::Pair)
    }
}

/// Per (cell, element) visibility verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Visibility {
    #[default]
    Invisible,
    Visible,
    /// Shown only in opaque mode.
    Opaque,
    /// Shown only in see-through mode.
    Transparent,
}

impl Visibility {
    #[inline]
    pub const fn is_invisible(self) -> bool {
        matches!(self, Visibility::Invisible)
    }
}

// One byte per (cell, element) pair keeps the tables small.
static_assertions::assert_eq_size!(Visibility, u8);
