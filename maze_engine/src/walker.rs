// walker.rs - Runtime queries for a viewer moving through a finished maze
//
// Movement tests and element activation. Nothing here mutates the maze; the
// presenter only keeps its own record of what is currently switched on.

use crate::error_handling::{MazeError, Result};
use crate::geometry::Vec3;
use crate::maze::Maze;
use crate::registry::{ObjectHandle, Registry};
use crate::types::{Coord, Direction, Visibility};

/// Whether a viewer in cell `from` may move to world point `target`.
///
/// Points inside the cell are always reachable. Points in an adjacent cell
/// are reachable through an open side when the crossing falls inside the
/// centred opening. Diagonal moves through a corner are refused.
pub fn can_move(maze: &Maze, from: Coord, target: Vec3) -> bool {
    let Some(cell) = maze.grid.cell(from) else {
        return false;
    };
    let (u, v) = maze.geometry.local_position(from, target);
    let inside = |t: f32| (0.0..=1.0).contains(&t);

    let side = match (inside(u), inside(v)) {
        (true, true) => return true,
        (false, true) if u > 1.0 && u < 2.0 => Direction::PlusX,
        (false, true) if u < 0.0 && u > -1.0 => Direction::MinusX,
        (true, false) if v > 1.0 && v < 2.0 => Direction::PlusY,
        (true, false) if v < 0.0 && v > -1.0 => Direction::MinusY,
        _ => return false,
    };
    if !cell.is_open(side) {
        return false;
    }

    // Where the straight line from the cell centre meets the side.
    let (cu, cv) = (0.5, 0.5);
    let along = if side.is_x_axis() {
        let edge = if side == Direction::PlusX { 1.0 } else { 0.0 };
        let t = (edge - cu) / (u - cu);
        cv + (v - cv) * t
    } else {
        let edge = if side == Direction::PlusY { 1.0 } else { 0.0 };
        let t = (edge - cv) / (v - cv);
        cu + (u - cu) * t
    };
    let half = maze.geometry.opening_width * 0.5;
    (0.5 - half..=0.5 + half).contains(&along)
}

/// Which visibility values count as "on".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransparencyMode {
    #[default]
    Opaque,
    SeeThrough,
}

impl TransparencyMode {
    #[inline]
    pub fn is_active(self, value: Visibility) -> bool {
        match value {
            Visibility::Invisible => false,
            Visibility::Visible => true,
            Visibility::Opaque => self == TransparencyMode::Opaque,
            Visibility::Transparent => self == TransparencyMode::SeeThrough,
        }
    }
}

/// Switches registered elements on and off as the viewer changes cells,
/// reporting only the elements whose state changes.
#[derive(Debug, Clone)]
pub struct VisibilityPresenter {
    mode: TransparencyMode,
    /// Last applied state, per level and element.
    shown: Vec<Vec<bool>>,
    current: Option<Coord>,
}

impl VisibilityPresenter {
    /// Everything starts switched off.
    pub fn new(registries: &[Registry], mode: TransparencyMode) -> Self {
        Self {
            mode,
            shown: registries.iter().map(|r| vec![false; r.len()]).collect(),
            current: None,
        }
    }

    pub fn mode(&self) -> TransparencyMode {
        self.mode
    }

    /// Takes effect on the next [`show_cell`](Self::show_cell).
    pub fn set_mode(&mut self, mode: TransparencyMode) {
        self.mode = mode;
    }

    pub fn current(&self) -> Option<Coord> {
        self.current
    }

    pub fn is_shown(&self, level: i32, element: usize) -> bool {
        usize::try_from(level)
            .ok()
            .and_then(|z| self.shown.get(z))
            .and_then(|level| level.get(element))
            .copied()
            .unwrap_or(false)
    }

    /// Apply the table of `coord` and of its paired cells, calling
    /// `activate(handle, on)` for each element whose state changes.
    /// Returns the number of changes.
    pub fn show_cell<F>(
        &mut self,
        maze: &Maze,
        registries: &[Registry],
        coord: Coord,
        mut activate: F,
    ) -> Result<usize>
    where
        F: FnMut(ObjectHandle, bool),
    {
        if registries.len() != self.shown.len() {
            return Err(MazeError::state("presenter built for a different registry set"));
        }
        let cell = maze
            .grid
            .cell(coord)
            .ok_or_else(|| MazeError::state(format!("no cell at {coord}")))?;
        if cell.visibility.is_empty() {
            return Err(MazeError::state(format!("cell {coord} has no visibility table")));
        }

        let mut wanted: Vec<Vec<bool>> = registries.iter().map(|r| vec![false; r.len()]).collect();
        let mut apply = |at: Coord, table: &[Visibility]| {
            if let Some(level) = usize::try_from(at.z).ok().and_then(|z| wanted.get_mut(z)) {
                for (slot, &value) in level.iter_mut().zip(table) {
                    *slot |= self.mode.is_active(value);
                }
            }
        };
        apply(coord, &cell.visibility);
        for &pair in &cell.visible_pairs {
            if let Some(other) = maze.grid.cell(pair) {
                apply(pair, &other.visibility);
            }
        }

        let mut changes = 0;
        for (z, (shown, wanted)) in self.shown.iter_mut().zip(wanted).enumerate() {
            for (id, (was, now)) in shown.iter_mut().zip(wanted).enumerate() {
                if *was == now {
                    continue;
                }
                *was = now;
                changes += 1;
                if let Some(element) = registries[z].element(id) {
                    activate(element.handle, now);
                }
            }
        }

        log::trace!("Showing cell {}: {} changes", coord, changes);
        self.current = Some(coord);
        Ok(changes)
    }
}
