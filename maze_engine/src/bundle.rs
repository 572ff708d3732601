// bundle.rs - Multi-cell embedded structures (ramps, wide floors) carved into the grid

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

use crate::config::{chance, BundleSpec};
use crate::error_handling::PlacementError;
use crate::geometry::{CellGeometry, Vec3};
use crate::grid::{Grid, PairLink};
use crate::types::{Connection, Coord, Direction, Situation};

/// Random placements get this many tries before the instance is dropped.
const MAX_PLACEMENT_ATTEMPTS: usize = 8;

/// One bundle to carve, fully resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleRequest {
    pub anchor: Coord,
    pub direction: Direction,
    pub length: i32,
    pub width: i32,
    /// Levels climbed from the anchor; 0 for a flat bundle.
    pub height: i32,
}

/// Reference line of a ramp. The walker interpolates elevation along it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampGuide {
    /// World position of the ramp foot, on the outer edge of the handle cell.
    pub origin: Vec3,
    /// From `origin` to the far edge of the last path cell.
    pub direction: Vec3,
}

impl RampGuide {
    /// Elevation of the ramp surface under a world point (clamped to the ramp ends).
    pub fn elevation_at(&self, point: Vec3) -> f32 {
        let flat = Vec3::new(self.direction.x, 0.0, self.direction.z);
        let len_sq = flat.length_squared();
        if len_sq <= f32::EPSILON {
            return self.origin.y;
        }
        let rel = point - self.origin;
        let t = (Vec3::new(rel.x, 0.0, rel.z).dot(flat) / len_sq).clamp(0.0, 1.0);
        self.origin.y + self.direction.y * t
    }
}

#[derive(Debug, Clone)]
pub struct Bundle {
    pub index: usize,
    pub request: BundleRequest,
    /// Traversable route, handle first.
    pub path: Vec<Coord>,
    /// `Hanging` filler cells.
    pub fillers: Vec<Coord>,
    /// `Pair` / `Undefined` cells in the path columns on other levels.
    pub shadows: Vec<Coord>,
    pub guide: Option<RampGuide>,
}

impl Bundle {
    #[inline]
    pub fn handle(&self) -> Coord {
        self.path[0]
    }

    #[inline]
    pub fn is_climbing(&self) -> bool {
        self.request.height != 0
    }

    /// Every cell the bundle occupies.
    pub fn cells(&self) -> impl Iterator<Item = Coord> + '_ {
        self.path
            .iter()
            .chain(self.fillers.iter())
            .chain(self.shadows.iter())
            .copied()
    }
}

/// Level of path cell `i`: climbs evenly from the anchor level to `anchor + height`.
fn path_level(request: &BundleRequest, i: i32) -> i32 {
    if request.height == 0 || request.length <= 1 {
        return request.anchor.z;
    }
    request.anchor.z + request.height * i / (request.length - 1)
}

fn column_origin(request: &BundleRequest, i: i32, w: i32) -> Coord {
    let (dx, dy) = request.direction.offset();
    let (lx, ly) = request.direction.turn_left().offset();
    Coord::new(
        request.anchor.x + dx * i + lx * w,
        request.anchor.y + dy * i + ly * w,
        request.anchor.z,
    )
}

/// Carve a bundle into empty grid space.
///
/// Validates the whole `length × width × (|height| + 1)` box plus the two cells
/// beyond the path ends before touching the grid; on error nothing is written.
/// The box may not cover a cell reserved as another bundle's approach, and on
/// success this bundle's own approaches are reserved.
pub fn build_bundle(
    grid: &mut Grid,
    index: usize,
    request: &BundleRequest,
    geometry: &CellGeometry,
) -> Result<Bundle, PlacementError> {
    if request.length < 1 || request.width < 1 {
        return Err(PlacementError::InvalidShape {
            reason: format!("length {} and width {} must be >= 1", request.length, request.width),
        });
    }
    if request.height != 0 && request.length - 1 < request.height.abs() {
        return Err(PlacementError::InvalidShape {
            reason: format!(
                "climbing {} levels needs a path of at least {} cells, got {}",
                request.height,
                request.height.abs() + 1,
                request.length
            ),
        });
    }

    let low = request.anchor.z.min(request.anchor.z + request.height);
    let high = request.anchor.z.max(request.anchor.z + request.height);

    let mut occupied = HashSet::new();
    for i in 0..request.length {
        for w in 0..request.width {
            let base = column_origin(request, i, w);
            for z in low..=high {
                let coord = Coord::new(base.x, base.y, z);
                if !grid.in_range(coord) {
                    return Err(PlacementError::OutOfRange(coord));
                }
                if !grid.is_empty(coord) || grid.is_reserved(coord) {
                    return Err(PlacementError::Collision(coord));
                }
                occupied.insert(coord);
            }
        }
    }

    let path: Vec<Coord> = (0..request.length)
        .map(|i| {
            let base = column_origin(request, i, 0);
            Coord::new(base.x, base.y, path_level(request, i))
        })
        .collect();
    let first = path[0];
    let last = path[path.len() - 1];
    let before = first.step(request.direction.opposite());
    let after = last.step(request.direction);
    if !grid.is_empty(before) {
        return Err(PlacementError::BlockedEnd {
            at: first,
            direction: request.direction.opposite(),
        });
    }
    if !grid.is_empty(after) {
        return Err(PlacementError::BlockedEnd {
            at: last,
            direction: request.direction,
        });
    }

    let climbing = request.height != 0;
    let link = |pair_start: usize, other_side: Option<Coord>| PairLink {
        pair_index: index,
        pair_start,
        pair_count: request.length as usize,
        other_side,
        paired_on_x: request.direction.is_x_axis(),
        pair_direction: request.direction,
    };

    // Path cells start sealed; passages are opened explicitly below.
    for (i, &coord) in path.iter().enumerate() {
        let situation = if i == 0 { Situation::Handle } else { Situation::Entrance };
        let other_side = match (climbing, i) {
            (true, 0) => Some(last),
            (true, n) if n == path.len() - 1 => Some(first),
            _ => None,
        };
        if let Some(cell) = grid.insert(coord, situation, Connection::Unpassable) {
            cell.pair = Some(link(i, other_side));
        }
    }

    let mut fillers = Vec::new();
    let mut shadows = Vec::new();
    for i in 0..request.length {
        for w in 0..request.width {
            let base = column_origin(request, i, w);
            for z in low..=high {
                let coord = Coord::new(base.x, base.y, z);
                let path_cell = path[i as usize];
                if coord == path_cell {
                    continue;
                }
                let (situation, other_side) = if w > 0 {
                    (Situation::Hanging, None)
                } else if i == 0 || i == request.length - 1 {
                    (Situation::Pair, Some(path_cell))
                } else {
                    (Situation::Undefined, None)
                };
                if let Some(cell) = grid.insert(coord, situation, Connection::Unpassable) {
                    cell.pair = Some(link(i as usize, other_side));
                    // Interior faces carry no relation; exterior faces stay sealed.
                    for direction in Direction::ALL {
                        if occupied.contains(&coord.step(direction)) {
                            cell.connections[direction.index()] = Connection::Absent;
                        }
                    }
                }
                if situation == Situation::Hanging {
                    fillers.push(coord);
                } else {
                    shadows.push(coord);
                }
            }
        }
    }

    for pair in path.windows(2) {
        grid.connect(pair[0], request.direction, pair[1]);
    }

    let attach = if climbing { Connection::Open } else { Connection::Pending };
    grid.set_connection(first, request.direction.opposite(), attach);
    grid.set_connection(last, request.direction, attach);
    // Later bundles must leave both approaches for the walk.
    grid.reserve(before);
    grid.reserve(after);

    let guide = climbing.then(|| {
        let (dx, dy) = request.direction.offset();
        let half = Vec3::new(dx as f32, 0.0, dy as f32) * (geometry.cell_size * 0.5);
        let origin = geometry.cell_center(first) - half;
        let end = geometry.cell_center(last) + half;
        RampGuide {
            origin,
            direction: end - origin,
        }
    });

    log::debug!(
        "Bundle {} built at {} heading {:?}: {} path, {} filler, {} shadow cells",
        index,
        first,
        request.direction,
        path.len(),
        fillers.len(),
        shadows.len()
    );

    Ok(Bundle {
        index,
        request: *request,
        path,
        fillers,
        shadows,
        guide,
    })
}

/// Resolve every bundle pool in `specs` against the grid.
///
/// Failed instances are logged and skipped; the returned bundles are indexed
/// in placement order.
pub fn place_bundles<R: Rng + ?Sized>(
    grid: &mut Grid,
    specs: &[BundleSpec],
    geometry: &CellGeometry,
    rng: &mut R,
) -> Vec<Bundle> {
    let mut bundles = Vec::new();
    for (spec_idx, spec) in specs.iter().enumerate() {
        for instance in 0..spec.count {
            if !rng.gen_bool(chance(spec.probability)) {
                continue;
            }
            let attempts = if spec.position.is_some() { 1 } else { MAX_PLACEMENT_ATTEMPTS };
            let mut last_error = None;
            for _ in 0..attempts {
                let request = resolve_request(grid, spec, rng);
                match build_bundle(grid, bundles.len(), &request, geometry) {
                    Ok(bundle) => {
                        bundles.push(bundle);
                        last_error = None;
                        break;
                    }
                    Err(e) => last_error = Some(e),
                }
            }
            if let Some(e) = last_error {
                log::warn!("Bundle spec {spec_idx} instance {instance} not placed: {e}");
            }
        }
    }
    log::info!("Placed {} bundles from {} specs", bundles.len(), specs.len());
    bundles
}

fn resolve_request<R: Rng + ?Sized>(grid: &Grid, spec: &BundleSpec, rng: &mut R) -> BundleRequest {
    let direction = spec
        .direction
        .unwrap_or_else(|| *Direction::ALL.choose(rng).unwrap_or(&Direction::PlusX));
    let anchor = match spec.position {
        Some(position) => Coord::from(position),
        None => {
            // Keep the climb inside the level range.
            let z_low = (-spec.height).max(0);
            let z_high = (grid.levels() - spec.height).min(grid.levels());
            let z = if z_high > z_low { rng.gen_range(z_low..z_high) } else { 0 };
            Coord::new(
                rng.gen_range(0..grid.columns()),
                rng.gen_range(0..grid.rows()),
                z,
            )
        }
    };
    BundleRequest {
        anchor,
        direction,
        length: spec.length,
        width: spec.width,
        height: spec.height,
    }
}
