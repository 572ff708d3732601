// grid.rs - Fixed-size 3D cell container and the per-cell topology record

use std::collections::HashSet;

use crate::error_handling::{MazeError, Result};
use crate::types::{Connection, Coord, Direction, Situation, Visibility};

/// Ramp bookkeeping carried by every cell a climbing or flat bundle owns.
#[derive(Debug, Clone, PartialEq)]
pub struct PairLink {
    /// Index of the owning bundle.
    pub pair_index: usize,
    /// Position along the bundle path (generation order).
    pub pair_start: usize,
    /// Path length of the owning bundle.
    pub pair_count: usize,
    /// Cell at the opposite end of a ramp, usually on another level.
    pub other_side: Option<Coord>,
    pub paired_on_x: bool,
    pub pair_direction: Direction,
}

#[derive(Debug, Clone)]
pub struct Cell {
    pub coord: Coord,
    /// Row-major index within the level: `y * columns + x`.
    pub index: usize,
    pub connections: [Connection; 4],
    /// Adjacent cell per side, set only where a real adjacency exists.
    pub neighbors: [Option<Coord>; 4],
    pub situation: Situation,
    pub pair: Option<PairLink>,
    /// Sides lying on the outer edge of the grid.
    pub boundary: [bool; 4],
    /// One entry per registered element of this cell's level; empty until the
    /// visibility pass runs.
    pub visibility: Vec<Visibility>,
    /// Cells on other levels that become relevant when this cell is shown.
    pub visible_pairs: Vec<Coord>,
}

impl Cell {
    fn new(coord: Coord, index: usize, situation: Situation, fill: Connection) -> Self {
        Self {
            coord,
            index,
            connections: [fill; 4],
            neighbors: [None; 4],
            situation,
            pair: None,
            boundary: [false; 4],
            visibility: Vec::new(),
            visible_pairs: Vec::new(),
        }
    }

    #[inline]
    pub fn connection(&self, direction: Direction) -> Connection {
        self.connections[direction.index()]
    }

    #[inline]
    pub fn neighbor(&self, direction: Direction) -> Option<Coord> {
        self.neighbors[direction.index()]
    }

    #[inline]
    pub fn is_open(&self, direction: Direction) -> bool {
        self.connection(direction) == Connection::Open
    }

    /// Ramp partner on another level, if any.
    pub fn other_side(&self) -> Option<Coord> {
        self.pair
            .as_ref()
            .and_then(|p| p.other_side)
            .filter(|other| other.z != self.coord.z)
    }

    pub fn is_edge(&self) -> bool {
        self.boundary.iter().any(|&b| b)
    }

    pub fn visibility_of(&self, element: usize) -> Visibility {
        self.visibility.get(element).copied().unwrap_or_default()
    }
}

/// Sole owner of every cell of a maze.
#[derive(Debug, Clone)]
pub struct Grid {
    columns: i32,
    rows: i32,
    levels: i32,
    cells: Vec<Option<Cell>>,
    /// Empty slots held back from bundle placement (bundle end approaches).
    reserved: HashSet<Coord>,
    finalized: bool,
}

impl Grid {
    pub fn new(columns: i32, rows: i32, levels: i32) -> Result<Self> {
        if columns <= 0 || rows <= 0 || levels <= 0 {
            return Err(MazeError::config(format!(
                "grid dimensions must be positive, got {columns}x{rows}x{levels}"
            )));
        }
        let len = columns as usize * rows as usize * levels as usize;
        Ok(Self {
            columns,
            rows,
            levels,
            cells: vec![None; len],
            reserved: HashSet::new(),
            finalized: false,
        })
    }

    #[inline]
    pub fn columns(&self) -> i32 {
        self.columns
    }

    #[inline]
    pub fn rows(&self) -> i32 {
        self.rows
    }

    #[inline]
    pub fn levels(&self) -> i32 {
        self.levels
    }

    /// Cells per level.
    #[inline]
    pub fn area(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    #[inline]
    pub fn in_range(&self, coord: Coord) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && coord.z >= 0
            && coord.x < self.columns
            && coord.y < self.rows
            && coord.z < self.levels
    }

    /// Flat storage slot for an in-range coordinate.
    pub fn slot(&self, coord: Coord) -> Option<usize> {
        if !self.in_range(coord) {
            return None;
        }
        Some(coord.z as usize * self.area() + self.level_index(coord))
    }

    /// `y * columns + x`, the per-level index stored in each cell.
    #[inline]
    pub fn level_index(&self, coord: Coord) -> usize {
        coord.y as usize * self.columns as usize + coord.x as usize
    }

    pub fn coord_of(&self, slot: usize) -> Option<Coord> {
        if slot >= self.cells.len() {
            return None;
        }
        let area = self.area();
        let z = slot / area;
        let rem = slot % area;
        Some(Coord::new(
            (rem % self.columns as usize) as i32,
            (rem / self.columns as usize) as i32,
            z as i32,
        ))
    }

    pub fn cell(&self, coord: Coord) -> Option<&Cell> {
        self.slot(coord).and_then(|slot| self.cells[slot].as_ref())
    }

    pub fn cell_mut(&mut self, coord: Coord) -> Option<&mut Cell> {
        self.slot(coord).and_then(move |slot| self.cells[slot].as_mut())
    }

    /// In range and not yet filled.
    pub fn is_empty(&self, coord: Coord) -> bool {
        self.slot(coord).map_or(false, |slot| self.cells[slot].is_none())
    }

    /// Keep an empty slot free for the walk. Returns false if it is out of
    /// range or already filled.
    pub fn reserve(&mut self, coord: Coord) -> bool {
        if !self.is_empty(coord) {
            return false;
        }
        self.reserved.insert(coord);
        true
    }

    #[inline]
    pub fn is_reserved(&self, coord: Coord) -> bool {
        self.reserved.contains(&coord)
    }

    /// Fill an empty slot. Returns `None` if the slot is out of range or taken.
    pub fn insert(
        &mut self,
        coord: Coord,
        situation: Situation,
        fill: Connection,
    ) -> Option<&mut Cell> {
        let slot = self.slot(coord)?;
        if self.cells[slot].is_some() {
            return None;
        }
        let mut cell = Cell::new(coord, self.level_index(coord), situation, fill);
        for direction in Direction::ALL {
            cell.boundary[direction.index()] = !self.in_range(coord.step(direction));
        }
        self.cells[slot] = Some(cell);
        self.cells[slot].as_mut()
    }

    /// Where a side leads: the explicit neighbor link if set, otherwise the
    /// same-level cell next to it.
    pub fn adjacent(&self, coord: Coord, direction: Direction) -> Option<Coord> {
        let linked = self.cell(coord).and_then(|c| c.neighbor(direction));
        linked.or_else(|| {
            let next = coord.step(direction);
            self.in_range(next).then_some(next)
        })
    }

    pub fn set_connection(&mut self, coord: Coord, direction: Direction, state: Connection) {
        if let Some(cell) = self.cell_mut(coord) {
            cell.connections[direction.index()] = state;
        }
    }

    /// Open a passage between `a` and `b` in both directions and link them.
    pub fn connect(&mut self, a: Coord, direction: Direction, b: Coord) {
        if let Some(cell) = self.cell_mut(a) {
            cell.connections[direction.index()] = Connection::Open;
            cell.neighbors[direction.index()] = Some(b);
        }
        let back = direction.opposite();
        if let Some(cell) = self.cell_mut(b) {
            cell.connections[back.index()] = Connection::Open;
            cell.neighbors[back.index()] = Some(a);
        }
    }

    /// Seal both sides of an adjacency with the same state.
    pub fn seal(&mut self, a: Coord, direction: Direction, b: Coord, state: Connection) {
        self.set_connection(a, direction, state);
        self.set_connection(b, direction.opposite(), state);
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().flatten()
    }

    pub fn cells_mut(&mut self) -> impl Iterator<Item = &mut Cell> {
        self.cells.iter_mut().flatten()
    }

    /// Filled cells of one level; empty for a level outside the grid.
    pub fn level_cells(&self, z: i32) -> impl Iterator<Item = &Cell> {
        let area = self.area();
        let range = if (0..self.levels).contains(&z) {
            z as usize * area..(z as usize + 1) * area
        } else {
            0..0
        };
        self.cells[range].iter().flatten()
    }

    /// First unfilled slot on a level in row-major order.
    pub fn first_empty(&self, z: i32) -> Option<Coord> {
        (0..self.rows)
            .flat_map(|y| (0..self.columns).map(move |x| Coord::new(x, y, z)))
            .find(|&coord| self.is_empty(coord))
    }

    pub fn empty_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_none()).count()
    }

    #[inline]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub(crate) fn mark_finalized(&mut self) {
        self.finalized = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_dimensions() {
        assert!(matches!(Grid::new(0, 5, 1), Err(MazeError::InvalidConfig { .. })));
        assert!(matches!(Grid::new(5, 5, 0), Err(MazeError::InvalidConfig { .. })));
        assert!(Grid::new(1, 1, 1).is_ok());
    }

    #[test]
    fn test_slot_round_trip() {
        let grid = Grid::new(4, 3, 2).unwrap();
        for z in 0..2 {
            for y in 0..3 {
                for x in 0..4 {
                    let coord = Coord::new(x, y, z);
                    let slot = grid.slot(coord).unwrap();
                    assert_eq!(grid.coord_of(slot), Some(coord));
                }
            }
        }
        assert_eq!(grid.level_index(Coord::new(2, 1, 1)), 6);
    }

    #[test]
    fn test_out_of_range_queries_are_none() {
        let grid = Grid::new(3, 3, 1).unwrap();
        assert!(!grid.in_range(Coord::new(-1, 0, 0)));
        assert!(!grid.in_range(Coord::new(0, 3, 0)));
        assert!(!grid.in_range(Coord::new(0, 0, 1)));
        assert!(grid.cell(Coord::new(5, 5, 5)).is_none());
        assert!(grid.slot(Coord::new(0, -1, 0)).is_none());
        assert!(!grid.is_empty(Coord::new(9, 0, 0)));
        assert!(grid.coord_of(9).is_none());
    }

    #[test]
    fn test_insert_tags_boundary() {
        let mut grid = Grid::new(3, 3, 1).unwrap();
        let corner = grid
            .insert(Coord::new(0, 0, 0), Situation::Normal, Connection::Pending)
            .unwrap();
        assert!(corner.boundary[Direction::MinusX.index()]);
        assert!(corner.boundary[Direction::MinusY.index()]);
        assert!(!corner.boundary[Direction::PlusX.index()]);
        assert!(corner.is_edge());

        let center = grid
            .insert(Coord::new(1, 1, 0), Situation::Normal, Connection::Pending)
            .unwrap();
        assert!(!center.is_edge());
        assert!(grid
            .insert(Coord::new(1, 1, 0), Situation::Normal, Connection::Pending)
            .is_none());
    }

    #[test]
    fn test_connect_is_symmetric() {
        let mut grid = Grid::new(2, 1, 1).unwrap();
        let a = Coord::new(0, 0, 0);
        let b = Coord::new(1, 0, 0);
        grid.insert(a, Situation::Normal, Connection::Pending);
        grid.insert(b, Situation::Normal, Connection::Pending);
        grid.connect(a, Direction::PlusX, b);

        assert!(grid.cell(a).unwrap().is_open(Direction::PlusX));
        assert!(grid.cell(b).unwrap().is_open(Direction::MinusX));
        assert_eq!(grid.cell(b).unwrap().neighbor(Direction::MinusX), Some(a));
        assert_eq!(grid.adjacent(a, Direction::PlusX), Some(b));
        assert_eq!(grid.adjacent(a, Direction::MinusX), None);
    }

    #[test]
    fn test_first_empty_scans_row_major() {
        let mut grid = Grid::new(2, 2, 1).unwrap();
        grid.insert(Coord::new(0, 0, 0), Situation::Void, Connection::Absent);
        assert_eq!(grid.first_empty(0), Some(Coord::new(1, 0, 0)));
        grid.insert(Coord::new(1, 0, 0), Situation::Normal, Connection::Pending);
        assert_eq!(grid.first_empty(0), Some(Coord::new(0, 1, 0)));
        assert_eq!(grid.empty_count(), 2);
    }

    #[test]
    fn test_level_cells_outside_levels_is_empty() {
        let mut grid = Grid::new(2, 2, 2).unwrap();
        for z in 0..2 {
            grid.insert(Coord::new(0, 0, z), Situation::Normal, Connection::Pending);
            grid.insert(Coord::new(1, 1, z), Situation::Normal, Connection::Pending);
        }
        assert_eq!(grid.level_cells(0).count(), 2);
        assert!(grid.level_cells(1).all(|c| c.coord.z == 1));
        assert_eq!(grid.level_cells(-1).count(), 0);
        assert_eq!(grid.level_cells(2).count(), 0);
        assert_eq!(grid.level_cells(i32::MIN).count(), 0);
    }

    #[test]
    fn test_reserve_only_empty_slots() {
        let mut grid = Grid::new(3, 1, 1).unwrap();
        grid.insert(Coord::new(0, 0, 0), Situation::Normal, Connection::Pending);
        assert!(!grid.reserve(Coord::new(0, 0, 0)));
        assert!(!grid.reserve(Coord::new(3, 0, 0)));
        assert!(grid.reserve(Coord::new(1, 0, 0)));
        assert!(grid.is_reserved(Coord::new(1, 0, 0)));
        assert!(!grid.is_reserved(Coord::new(2, 0, 0)));
        // Reserved slots are still empty and can be filled by the walk.
        assert!(grid.is_empty(Coord::new(1, 0, 0)));
        assert!(grid
            .insert(Coord::new(1, 0, 0), Situation::Normal, Connection::Pending)
            .is_some());
    }
}
