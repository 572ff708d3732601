// visibility/mod.rs - Per-cell visibility precomputation over registered elements
//
// The pass runs once per maze, after generation and registration. Every cell's
// table is computed from shared read-only state, so cells are processed in
// parallel and written back afterwards.

pub mod raycast;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use tokio::sync::oneshot;

use crate::config::VisibilitySettings;
use crate::error_handling::{MazeError, Result};
use crate::grid::Grid;
use crate::maze::Maze;
use crate::registry::{Boundary, BoundaryKind, ElementId, ElementKind, Registry};
use crate::types::{Coord, Direction, Situation, Visibility};

use raycast::{cast_ray, fan_directions, sample_point, RayStop};

/// Summary of one visibility pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VisibilityReport {
    pub cells: usize,
    pub skipped: usize,
    pub rays: usize,
    /// Largest step count of any ray.
    pub max_steps: usize,
    /// Rays cut by the step bound. Always zero on a consistent registry.
    pub truncated: usize,
    /// Non-invisible (cell, element) entries.
    pub shown_entries: usize,
    pub paired_cells: usize,
    pub elapsed_ms: u64,
}

/// Result for one cell, before write-back.
#[derive(Debug, Clone)]
pub struct CellVisibility {
    pub coord: Coord,
    pub table: Vec<Visibility>,
    pub visible_pairs: Vec<Coord>,
    rays: usize,
    max_steps: usize,
    truncated: usize,
}

struct Marker<'a> {
    registry: &'a Registry,
    table: Vec<Visibility>,
}

impl<'a> Marker<'a> {
    fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            table: vec![Visibility::Invisible; registry.len()],
        }
    }

    #[inline]
    fn set(&mut self, id: Option<ElementId>, value: Visibility) {
        if let Some(slot) = id.and_then(|id| self.table.get_mut(id)) {
            *slot = value;
        }
    }

    #[inline]
    fn is_shown(&self, id: Option<ElementId>) -> bool {
        id.and_then(|id| self.table.get(id))
            .map_or(false, |v| !v.is_invisible())
    }

    /// Mark a boundary the way a ray crossing it sees it.
    fn mark_boundary(&mut self, boundary: Boundary, kind: BoundaryKind) {
        match kind {
            BoundaryKind::Open => self.set(self.registry.open_at(boundary), Visibility::Visible),
            BoundaryKind::SeeThrough => {
                self.set(self.registry.see_through_at(boundary), Visibility::Transparent);
                self.set(self.registry.wall_at(boundary), Visibility::Opaque);
            }
            BoundaryKind::Wall => self.set(self.registry.wall_at(boundary), Visibility::Visible),
            BoundaryKind::Empty => {}
        }
    }

    fn mark_columns(&mut self, boundary: Boundary) {
        for (x, y) in boundary.endpoints() {
            self.set(self.registry.column_at(x, y), Visibility::Visible);
        }
    }
}

fn check_preconditions(
    grid: &Grid,
    registries: &[Registry],
    settings: &VisibilitySettings,
) -> Result<()> {
    if !grid.is_finalized() {
        return Err(MazeError::state("visibility requested before generation finished"));
    }
    if registries.len() != grid.levels() as usize {
        return Err(MazeError::state(format!(
            "expected {} level registries, got {}",
            grid.levels(),
            registries.len()
        )));
    }
    for (z, registry) in registries.iter().enumerate() {
        if !registry.is_sealed() {
            return Err(MazeError::state(format!("registry for level {z} is not sealed")));
        }
        if registry.level() != z as i32
            || registry.columns() != grid.columns()
            || registry.rows() != grid.rows()
        {
            return Err(MazeError::state(format!(
                "registry {z} does not match the grid (level {}, {}x{})",
                registry.level(),
                registry.columns(),
                registry.rows()
            )));
        }
    }
    settings.validate()
}

/// Visibility table of one cell against its level's registry.
pub fn compute_cell(
    grid: &Grid,
    registry: &Registry,
    coord: Coord,
    settings: &VisibilitySettings,
) -> CellVisibility {
    let mut marker = Marker::new(registry);
    let mut result = CellVisibility {
        coord,
        table: Vec::new(),
        visible_pairs: Vec::new(),
        rays: 0,
        max_steps: 0,
        truncated: 0,
    };
    let (x, y) = (coord.x, coord.y);

    marker.set(registry.floor_at(x, y), Visibility::Visible);

    for side in Direction::ALL {
        let boundary = Boundary::of_cell(x, y, side);
        let kind = registry.boundary_kind(boundary);
        if !kind.transmits_sight() {
            continue;
        }
        marker.mark_boundary(boundary, kind);
        marker.mark_columns(boundary);

        let (dx, dy) = side.offset();
        let start = (x + dx, y + dy);
        let fan = fan_directions(side, settings.ray_count, settings.fan_degrees);
        for i in 0..settings.sample_points {
            let origin = sample_point(x, y, side, i, settings.sample_points);
            for &direction in &fan {
                let trace = cast_ray(registry, start, origin, direction, |b, k| {
                    marker.mark_boundary(b, k)
                });
                result.rays += 1;
                result.max_steps = result.max_steps.max(trace.steps);
                if trace.stop == RayStop::StepLimit {
                    result.truncated += 1;
                }
            }
        }
    }

    // Floors and columns inherit from the boundaries around them.
    let mut floors = Vec::new();
    for fy in 0..registry.rows() {
        for fx in 0..registry.columns() {
            if (fx, fy) == (x, y) {
                continue;
            }
            let seen = Direction::ALL.iter().any(|&side| {
                registry
                    .boundary_elements(Boundary::of_cell(fx, fy, side))
                    .any(|id| marker.is_shown(Some(id)))
            });
            if seen {
                floors.push((fx, fy));
            }
        }
    }
    let mut columns = Vec::new();
    for gy in 0..=registry.rows() {
        for gx in 0..=registry.columns() {
            let touching = [
                Boundary::Vertical { x: gx, y: gy - 1 },
                Boundary::Vertical { x: gx, y: gy },
                Boundary::Horizontal { x: gx - 1, y: gy },
                Boundary::Horizontal { x: gx, y: gy },
            ];
            let seen = touching.iter().any(|&b| {
                marker.is_shown(registry.wall_at(b)) || marker.is_shown(registry.open_at(b))
            });
            if seen {
                columns.push((gx, gy));
            }
        }
    }
    for &(fx, fy) in &floors {
        marker.set(registry.floor_at(fx, fy), Visibility::Visible);
        let pair = grid
            .cell(Coord::new(fx, fy, coord.z))
            .and_then(|c| c.other_side());
        if let Some(pair) = pair {
            push_unique(&mut result.visible_pairs, pair);
        }
    }
    for (gx, gy) in columns {
        marker.set(registry.column_at(gx, gy), Visibility::Visible);
    }

    for id in registry.always_visible() {
        marker.set(Some(id), Visibility::Visible);
    }

    if let Some(pair) = grid.cell(coord).and_then(|c| c.other_side()) {
        push_unique(&mut result.visible_pairs, pair);
    }

    result.table = marker.table;
    result
}

fn push_unique(list: &mut Vec<Coord>, coord: Coord) {
    if !list.contains(&coord) {
        list.push(coord);
    }
}

/// Run the full pass and store each cell's table and paired cells.
///
/// Fails with [`MazeError::InvalidState`] before generation or registration
/// has finished.
pub fn compute_visibility(
    maze: &mut Maze,
    registries: &[Registry],
    settings: &VisibilitySettings,
) -> Result<VisibilityReport> {
    check_preconditions(&maze.grid, registries, settings)?;
    let started = Instant::now();

    let targets: Vec<Coord> = maze
        .grid
        .cells()
        .filter(|c| c.situation != Situation::Void && !c.situation.is_shadow())
        .map(|c| c.coord)
        .collect();
    let skipped = maze.grid.cells().count() - targets.len();

    let grid = &maze.grid;
    let results: Vec<CellVisibility> = targets
        .par_iter()
        .map(|&coord| compute_cell(grid, &registries[coord.z as usize], coord, settings))
        .collect();

    let mut report = VisibilityReport {
        cells: results.len(),
        skipped,
        ..VisibilityReport::default()
    };
    for result in results {
        report.rays += result.rays;
        report.max_steps = report.max_steps.max(result.max_steps);
        report.truncated += result.truncated;
        report.shown_entries += result.table.iter().filter(|v| !v.is_invisible()).count();
        if !result.visible_pairs.is_empty() {
            report.paired_cells += 1;
        }
        if let Some(cell) = maze.grid.cell_mut(result.coord) {
            cell.visibility = result.table;
            cell.visible_pairs = result.visible_pairs;
        }
    }
    report.elapsed_ms = started.elapsed().as_millis() as u64;

    if report.truncated > 0 {
        log::warn!("{} rays hit the step bound", report.truncated);
    }
    log::info!(
        "Visibility computed for {} cells ({} rays, {} skipped) in {}ms",
        report.cells,
        report.rays,
        report.skipped,
        report.elapsed_ms
    );
    Ok(report)
}

/// Everything a background pass hands back.
#[derive(Debug)]
pub struct VisibilityOutcome {
    pub maze: Maze,
    pub registries: Vec<Registry>,
    pub report: VisibilityReport,
}

/// Handle to a visibility pass running on the blocking pool.
///
/// The maze and registries move into the task for its duration, which is the
/// exclusive-access window; they come back through [`PendingVisibility::wait`].
#[derive(Debug)]
pub struct PendingVisibility {
    done: Arc<AtomicBool>,
    receiver: oneshot::Receiver<Result<VisibilityOutcome>>,
}

impl PendingVisibility {
    /// Cheap completion flag for callers that poll from a frame loop.
    pub fn is_complete(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub async fn wait(self) -> Result<VisibilityOutcome> {
        self.receiver
            .await
            .map_err(|_| MazeError::TaskFailed("visibility task dropped its result".into()))?
    }
}

/// Start the pass on tokio's blocking pool. Must be called inside a runtime.
pub fn spawn_visibility(
    mut maze: Maze,
    registries: Vec<Registry>,
    settings: VisibilitySettings,
) -> PendingVisibility {
    let done = Arc::new(AtomicBool::new(false));
    let (sender, receiver) = oneshot::channel();
    let flag = Arc::clone(&done);

    tokio::task::spawn_blocking(move || {
        let outcome = compute_visibility(&mut maze, &registries, &settings).map(|report| {
            VisibilityOutcome {
                maze,
                registries,
                report,
            }
        });
        flag.store(true, Ordering::Release);
        if sender.send(outcome).is_err() {
            log::debug!("Visibility result dropped; receiver went away");
        }
    });

    PendingVisibility { done, receiver }
}

/// Kinds and values of the shown entries of a visibility table.
pub fn shown_kinds(registry: &Registry, table: &[Visibility]) -> Vec<(ElementKind, Visibility)> {
    table
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_invisible())
        .filter_map(|(id, &v)| registry.element(id).map(|e| (e.kind, v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MazeConfig;
    use crate::generator::MazeGenerator;
    use crate::geometry::CellGeometry;
    use crate::registry::{ElementPlace, ObjectHandle};
    use crate::types::Connection;

    /// A finalized single-level maze with every cell present and sealed.
    fn sealed_maze(columns: i32, rows: i32) -> Maze {
        let mut grid = Grid::new(columns, rows, 1).unwrap();
        for y in 0..rows {
            for x in 0..columns {
                grid.insert(Coord::new(x, y, 0), Situation::Normal, Connection::Closed);
            }
        }
        grid.mark_finalized();
        Maze {
            grid,
            bundles: Vec::new(),
            geometry: CellGeometry::default(),
            seed: 0,
        }
    }

    fn settings() -> VisibilitySettings {
        VisibilitySettings {
            ray_count: 9,
            sample_points: 4,
            fan_degrees: 120.0,
        }
    }

    #[test]
    fn test_rejects_unfinished_state() {
        let mut maze = sealed_maze(3, 3);
        let unsealed = Registry::new(0, 3, 3).unwrap();
        assert!(matches!(
            compute_visibility(&mut maze, &[unsealed], &settings()),
            Err(MazeError::InvalidState { .. })
        ));
        assert!(matches!(
            compute_visibility(&mut maze, &[], &settings()),
            Err(MazeError::InvalidState { .. })
        ));

        let mut fresh = sealed_maze(3, 3);
        fresh.grid = Grid::new(3, 3, 1).unwrap();
        let mut registry = Registry::new(0, 3, 3).unwrap();
        registry.seal();
        assert!(matches!(
            compute_visibility(&mut fresh, &[registry], &settings()),
            Err(MazeError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_always_visible_behind_wall() {
        // Row of five cells; the origin (0, 0) is open only toward +X.
        let mut maze = sealed_maze(5, 1);
        maze.grid
            .connect(Coord::new(0, 0, 0), Direction::PlusX, Coord::new(1, 0, 0));
        let mut registry = Registry::new(0, 5, 1).unwrap();
        registry.register_open(0, 0, Direction::PlusX, ObjectHandle(0), false).unwrap();
        let near_wall = registry
            .register_wall(1, 0, Direction::PlusX, ObjectHandle(1), false)
            .unwrap();
        let far_floor = registry.register_floor(3, 0, ObjectHandle(2), true).unwrap();
        let hidden_floor = registry.register_floor(4, 0, ObjectHandle(3), false).unwrap();
        let own_floor = registry.register_floor(0, 0, ObjectHandle(4), false).unwrap();
        registry.seal();

        compute_visibility(&mut maze, &[registry], &settings()).unwrap();
        let origin = maze.grid.cell(Coord::new(0, 0, 0)).unwrap();
        assert_eq!(origin.visibility_of(own_floor), Visibility::Visible);
        assert_eq!(origin.visibility_of(near_wall), Visibility::Visible);
        assert_eq!(origin.visibility_of(far_floor), Visibility::Visible);
        assert_eq!(origin.visibility_of(hidden_floor), Visibility::Invisible);

        // Every other cell sees the always-visible floor too.
        for cell in maze.grid.cells() {
            assert_eq!(cell.visibility_of(far_floor), Visibility::Visible);
        }
    }

    #[test]
    fn test_see_through_pairs_with_opaque_twin() {
        let mut maze = sealed_maze(4, 1);
        maze.grid
            .connect(Coord::new(0, 0, 0), Direction::PlusX, Coord::new(1, 0, 0));
        let mut registry = Registry::new(0, 4, 1).unwrap();
        registry.register_open(0, 0, Direction::PlusX, ObjectHandle(0), false).unwrap();
        let twin = registry.register_wall(1, 0, Direction::PlusX, ObjectHandle(1), false).unwrap();
        let glass = registry
            .register_see_through(1, 0, Direction::PlusX, ObjectHandle(2), false)
            .unwrap();
        let far = registry.register_wall(2, 0, Direction::PlusX, ObjectHandle(3), false).unwrap();
        registry.seal();

        compute_visibility(&mut maze, &[registry.clone()], &settings()).unwrap();
        let origin = maze.grid.cell(Coord::new(0, 0, 0)).unwrap();
        assert_eq!(origin.visibility_of(glass), Visibility::Transparent);
        assert_eq!(origin.visibility_of(twin), Visibility::Opaque);
        // Sight continues past the glass to the next wall.
        assert_eq!(origin.visibility_of(far), Visibility::Visible);

        for cell in maze.grid.cells() {
            for (id, element) in registry.elements().iter().enumerate() {
                if cell.visibility_of(id) != Visibility::Transparent {
                    continue;
                }
                if let ElementPlace::Boundary(b) = element.place {
                    let twin = registry.wall_at(b).unwrap();
                    assert_eq!(cell.visibility_of(twin), Visibility::Opaque);
                }
            }
        }
    }

    #[test]
    fn test_corridor_sees_to_the_end() {
        let mut maze = sealed_maze(6, 1);
        for x in 0..5 {
            maze.grid
                .connect(Coord::new(x, 0, 0), Direction::PlusX, Coord::new(x + 1, 0, 0));
        }
        for cell in maze.grid.cells_mut() {
            for d in Direction::ALL {
                if cell.boundary[d.index()] {
                    cell.connections[d.index()] = Connection::Unpassable;
                }
            }
        }
        let registries = Registry::populate_all(&maze, |_, _| false).unwrap();
        let report = compute_visibility(&mut maze, &registries, &settings()).unwrap();
        assert_eq!(report.cells, 6);
        assert_eq!(report.truncated, 0);
        assert!(report.max_steps <= raycast::step_bound(6, 1));

        let registry = &registries[0];
        let origin = maze.grid.cell(Coord::new(0, 0, 0)).unwrap();
        let end_wall = registry.wall_at(Boundary::Vertical { x: 6, y: 0 }).unwrap();
        assert_eq!(origin.visibility_of(end_wall), Visibility::Visible);
        for x in 0..6 {
            let floor = registry.floor_at(x, 0).unwrap();
            assert_eq!(origin.visibility_of(floor), Visibility::Visible);
        }
        let corner = registry.column_at(6, 1).unwrap();
        assert_eq!(origin.visibility_of(corner), Visibility::Visible);
        assert!(!shown_kinds(registry, &origin.visibility).is_empty());
    }

    #[test]
    fn test_closed_cell_sees_only_its_floor() {
        let mut maze = sealed_maze(3, 3);
        let registries = Registry::populate_all(&maze, |_, _| false).unwrap();
        compute_visibility(&mut maze, &registries, &settings()).unwrap();
        let registry = &registries[0];
        let centre = maze.grid.cell(Coord::new(1, 1, 0)).unwrap();
        assert_eq!(centre.visibility_of(registry.floor_at(1, 1).unwrap()), Visibility::Visible);
        // No side transmits sight, so no neighbor floor is reached.
        assert_eq!(centre.visibility_of(registry.floor_at(0, 1).unwrap()), Visibility::Invisible);
    }

    #[test]
    fn test_ramp_cells_record_pairs() {
        let json = r#"{
            "columns": 6, "rows": 4, "levels": 2, "seed": 11,
            "bundles": [ { "position": [1, 1, 0], "direction": "plus_x", "length": 4, "height": 1 } ]
        }"#;
        let config = MazeConfig::from_json_str(json).unwrap();
        let mut maze = MazeGenerator::from_config(config).unwrap().generate().unwrap();
        assert_eq!(maze.bundles.len(), 1);
        let registries = Registry::populate_all(&maze, |_, _| false).unwrap();
        let report = compute_visibility(&mut maze, &registries, &settings()).unwrap();
        assert!(report.paired_cells > 0);
        assert!(report.skipped > 0);

        let bundle = &maze.bundles[0];
        let handle = maze.grid.cell(bundle.handle()).unwrap();
        let partner = handle.other_side().unwrap();
        assert_ne!(partner.z, handle.coord.z);
        assert!(handle.visible_pairs.contains(&partner));
        for cell in maze.grid.cells() {
            for pair in &cell.visible_pairs {
                assert_ne!(pair.z, cell.coord.z);
            }
            if cell.situation.is_shadow() {
                assert!(cell.visibility.is_empty());
            }
        }
    }

    #[tokio::test]
    async fn test_background_pass_completes() {
        let config = MazeConfig {
            columns: 6,
            rows: 6,
            seed: Some(5),
            ..MazeConfig::default()
        };
        let maze = MazeGenerator::from_config(config).unwrap().generate().unwrap();
        let registries = Registry::populate_all(&maze, |_, _| false).unwrap();
        let pending = spawn_visibility(maze, registries, settings());
        let outcome = pending.wait().await.unwrap();
        assert_eq!(outcome.report.cells, 36);
        assert!(outcome
            .maze
            .grid
            .cells()
            .all(|c| c.visibility.len() == outcome.registries[0].len()));
    }
}
