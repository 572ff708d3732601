// maze.rs - Generated maze: grid, bundles and topology diagnostics

use std::collections::{HashSet, VecDeque};

use crate::bundle::Bundle;
use crate::geometry::CellGeometry;
use crate::grid::Grid;
use crate::types::{Connection, Coord, Direction};

/// Output of generation. Owns every cell; cross-references are coordinates.
#[derive(Debug, Clone)]
pub struct Maze {
    pub grid: Grid,
    pub bundles: Vec<Bundle>,
    pub geometry: CellGeometry,
    /// Seed the generator ran with.
    pub seed: u64,
}

impl Maze {
    /// Unordered open adjacencies.
    pub fn open_edges(&self) -> usize {
        let mut edges = HashSet::new();
        for cell in self.grid.cells() {
            for direction in Direction::ALL {
                if let (true, Some(other)) = (cell.is_open(direction), cell.neighbor(direction)) {
                    let key = if cell.coord <= other {
                        (cell.coord, other)
                    } else {
                        (other, cell.coord)
                    };
                    edges.insert(key);
                }
            }
        }
        edges.len()
    }

    /// First side where `Open` is not mirrored by the adjacent cell.
    pub fn asymmetric_side(&self) -> Option<(Coord, Direction)> {
        for cell in self.grid.cells() {
            for direction in Direction::ALL {
                let here_open = cell.is_open(direction);
                let there_open = self
                    .grid
                    .adjacent(cell.coord, direction)
                    .and_then(|other| self.grid.cell(other))
                    .map_or(false, |other| {
                        let back = direction.opposite();
                        other.connection(back) == Connection::Open
                            && other.neighbor(back).map_or(true, |n| n == cell.coord)
                    });
                if here_open != there_open {
                    return Some((cell.coord, direction));
                }
            }
        }
        None
    }

    /// Connected components of walkable cells over open passages.
    ///
    /// With `level: Some(z)` only that level's cells and same-level passages count.
    pub fn connected_components(&self, level: Option<i32>) -> usize {
        let walkable: Vec<Coord> = self
            .grid
            .cells()
            .filter(|c| c.situation.is_walkable() && level.map_or(true, |z| c.coord.z == z))
            .map(|c| c.coord)
            .collect();

        let mut seen = HashSet::with_capacity(walkable.len());
        let mut components = 0;
        let mut queue = VecDeque::new();
        for &start in &walkable {
            if !seen.insert(start) {
                continue;
            }
            components += 1;
            queue.push_back(start);
            while let Some(coord) = queue.pop_front() {
                let Some(cell) = self.grid.cell(coord) else { continue };
                for direction in Direction::ALL {
                    let Some(next) = cell.neighbor(direction) else { continue };
                    if !cell.is_open(direction) || level.map_or(false, |z| next.z != z) {
                        continue;
                    }
                    if seen.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }
        components
    }

    pub fn is_level_connected(&self, z: i32) -> bool {
        self.connected_components(Some(z)) <= 1
    }

    pub fn is_connected(&self) -> bool {
        self.connected_components(None) <= 1
    }
}
