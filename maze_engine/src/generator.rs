// generator.rs - Randomized spanning-tree carving per level plus the braid pass

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::bundle::place_bundles;
use crate::config::{chance, MazeConfig, VoidSpec};
use crate::error_handling::Result;
use crate::grid::{Cell, Grid};
use crate::maze::Maze;
use crate::types::{Connection, Coord, Direction, Situation};

/// Counts reported by the braid pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BraidStats {
    pub opened: usize,
    pub closed: usize,
    pub sealed_edges: usize,
}

/// Builds a [`Maze`] from a configuration with an injectable random source.
pub struct MazeGenerator<R: Rng> {
    config: MazeConfig,
    rng: R,
    seed: u64,
}

impl MazeGenerator<StdRng> {
    /// Seeded from `config.seed`, or from wall-clock time when unset.
    pub fn from_config(config: MazeConfig) -> Result<Self> {
        let seed = config.seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_nanos() as u64)
        });
        Self::with_rng(config, StdRng::seed_from_u64(seed), seed)
    }
}

impl<R: Rng> MazeGenerator<R> {
    /// `seed` is recorded on the maze for reporting only.
    pub fn with_rng(config: MazeConfig, rng: R, seed: u64) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, rng, seed })
    }

    /// Voids, then bundles, then one or more walks per level, then braiding.
    pub fn generate(mut self) -> Result<Maze> {
        let start = Instant::now();
        let geometry = self.config.geometry();
        let mut grid = Grid::new(self.config.columns, self.config.rows, self.config.levels)?;

        let voids = place_voids(&mut grid, &self.config.voids, &mut self.rng);
        let bundles = place_bundles(&mut grid, &self.config.bundles, &geometry, &mut self.rng);

        let mut walks = 0;
        for z in 0..grid.levels() {
            walks += carve_level(&mut grid, z, &mut self.rng);
        }

        let stats = braid(&mut grid, self.config.braid_probability, &mut self.rng);
        grid.mark_finalized();

        log::info!(
            "Generated {}x{}x{} maze (seed {}) in {:?}: {} void cells, {} bundles, {} walks, \
             braid opened {} / closed {}",
            grid.columns(),
            grid.rows(),
            grid.levels(),
            self.seed,
            start.elapsed(),
            voids,
            bundles.len(),
            walks,
            stats.opened,
            stats.closed
        );

        Ok(Maze {
            grid,
            bundles,
            geometry,
            seed: self.seed,
        })
    }
}

/// Mark void boxes. Returns the number of void cells created.
///
/// Fixed boxes are clipped to the grid; random boxes must fit entirely. A box
/// overlapping an already-filled cell is skipped.
pub fn place_voids<R: Rng + ?Sized>(grid: &mut Grid, specs: &[VoidSpec], rng: &mut R) -> usize {
    let mut created = 0;
    for spec in specs {
        let [sx, sy, sz] = spec.size;
        let origin = match spec.position {
            Some(position) => Coord::from(position),
            None => {
                if sx > grid.columns() || sy > grid.rows() || sz > grid.levels() {
                    log::warn!("Void of size {:?} does not fit the grid, skipped", spec.size);
                    continue;
                }
                Coord::new(
                    rng.gen_range(0..=grid.columns() - sx),
                    rng.gen_range(0..=grid.rows() - sy),
                    rng.gen_range(0..=grid.levels() - sz),
                )
            }
        };

        let cells: Vec<Coord> = (0..sz)
            .flat_map(|dz| {
                (0..sy).flat_map(move |dy| (0..sx).map(move |dx| origin.offset(dx, dy, dz)))
            })
            .filter(|&c| grid.in_range(c))
            .collect();
        if let Some(taken) = cells.iter().find(|&&c| !grid.is_empty(c)) {
            log::warn!("Void at {} overlaps filled cell {}, skipped", origin, taken);
            continue;
        }
        for coord in cells {
            if grid.insert(coord, Situation::Void, Connection::Absent).is_some() {
                created += 1;
            }
        }
    }
    created
}

struct Frame {
    coord: Coord,
    untried: Vec<Direction>,
}

impl Frame {
    fn new<R: Rng + ?Sized>(coord: Coord, rng: &mut R) -> Self {
        let mut untried = Direction::ALL.to_vec();
        untried.shuffle(rng);
        Self { coord, untried }
    }
}

/// Fill every empty slot of a level, restarting from the first unfilled slot
/// in row-major order until none remain. Returns the number of walks.
pub fn carve_level<R: Rng + ?Sized>(grid: &mut Grid, z: i32, rng: &mut R) -> usize {
    let mut walks = 0;
    while let Some(root) = grid.first_empty(z) {
        let created = walk_from(grid, root, rng);
        log::debug!("Level {z}: walk {walks} from {root} filled {created} cells");
        walks += 1;
    }
    walks
}

/// Randomized depth-first walk from an empty root. Returns cells created.
pub fn walk_from<R: Rng + ?Sized>(grid: &mut Grid, root: Coord, rng: &mut R) -> usize {
    if grid.insert(root, Situation::Normal, Connection::Pending).is_none() {
        return 0;
    }
    let mut created = 1;
    let mut stack = vec![Frame::new(root, rng)];

    loop {
        let (current, direction) = match stack.last_mut() {
            None => break,
            Some(frame) => match frame.untried.pop() {
                Some(direction) => (frame.coord, direction),
                None => {
                    stack.pop();
                    continue;
                }
            },
        };

        let target = current.step(direction);
        if grid.is_empty(target) {
            grid.insert(target, Situation::Normal, Connection::Pending);
            grid.connect(current, direction, target);
            stack.push(Frame::new(target, rng));
            created += 1;
        } else if accepts_attachment(grid, target, direction.opposite()) {
            grid.connect(current, direction, target);
        }
    }
    created
}

/// A filled cell whose side faces back with an unattached opening.
fn accepts_attachment(grid: &Grid, target: Coord, back: Direction) -> bool {
    grid.cell(target).map_or(false, |cell| {
        cell.connection(back) == Connection::Open && cell.neighbor(back).is_none()
    })
}

/// A side that asks to be opened: an unattached `Open`, or a pending bundle end.
fn signals_intent(cell: &Cell, direction: Direction) -> bool {
    match cell.connection(direction) {
        Connection::Open => cell.neighbor(direction).is_none(),
        Connection::Pending => cell.situation.is_bundle_path(),
        _ => false,
    }
}

/// Resolve every undecided side of walkable cells: open some extra passages
/// (forming cycles), wall the rest, seal the grid edge.
pub fn braid<R: Rng + ?Sized>(grid: &mut Grid, probability: f64, rng: &mut R) -> BraidStats {
    let probability = chance(probability);
    let mut stats = BraidStats::default();
    let coords: Vec<Coord> = grid
        .cells()
        .filter(|c| c.situation.is_walkable())
        .map(|c| c.coord)
        .collect();

    for coord in coords {
        for direction in Direction::ALL {
            let Some(cell) = grid.cell(coord) else { continue };
            let here = cell.connection(direction);
            let here_intent = signals_intent(cell, direction);
            let here_linked = cell.neighbor(direction).is_some();
            let back = direction.opposite();

            let other = grid.adjacent(coord, direction);
            let Some((other, there_cell)) = other.and_then(|o| grid.cell(o).map(|c| (o, c))) else {
                grid.set_connection(coord, direction, Connection::Unpassable);
                stats.sealed_edges += 1;
                continue;
            };
            let there = there_cell.connection(back);

            if there_cell.situation == Situation::Void {
                if !here.is_no_wall_marker() {
                    grid.set_connection(coord, direction, Connection::Unpassable);
                    stats.sealed_edges += 1;
                }
                continue;
            }
            if here == Connection::Open && there == Connection::Open {
                // Two facing bundle ends: record the link.
                if !here_linked {
                    grid.connect(coord, direction, other);
                }
                continue;
            }

            if here.is_connectable() && there.is_connectable() {
                let intent = here_intent || signals_intent(there_cell, back);
                if intent || rng.gen_bool(probability) {
                    grid.connect(coord, direction, other);
                    stats.opened += 1;
                } else {
                    grid.seal(coord, direction, other, Connection::Closed);
                    stats.closed += 1;
                }
            } else if !here.is_no_wall_marker() && !there.is_no_wall_marker() {
                grid.seal(coord, direction, other, Connection::Closed);
            } else if here.is_connectable() {
                // An unattached opening against a sealed neighbor becomes a wall.
                grid.set_connection(coord, direction, Connection::Closed);
            }
        }
    }
    stats
}
