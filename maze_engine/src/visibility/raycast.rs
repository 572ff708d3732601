// raycast.rs - Discretized line-of-sight traversal over one level's boundaries
//
// Coordinates are in cell units on the level plane: x in [0, columns],
// y in [0, rows]. A ray advances one major-axis grid line per step and
// handles at most one minor-axis crossing in between, so the step count is
// bounded by the level's larger dimension.

use crate::registry::{Boundary, BoundaryKind, Registry};
use crate::types::Direction;

/// Why a ray stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RayStop {
    Wall,
    LeftGrid,
    StepLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RayTrace {
    /// Major-axis grid lines crossed.
    pub steps: usize,
    /// Boundaries visited, including the stopping one.
    pub crossings: usize,
    pub stop: RayStop,
}

/// Upper bound on steps for a level.
#[inline]
pub fn step_bound(columns: i32, rows: i32) -> usize {
    columns.max(rows).max(0) as usize + 2
}

/// Sample point `i` of `count` spread along `side` of cell `(x, y)`.
pub fn sample_point(x: i32, y: i32, side: Direction, i: usize, count: usize) -> (f32, f32) {
    let along = (i as f32 + 0.5) / count.max(1) as f32;
    let (x, y) = (x as f32, y as f32);
    match side {
        Direction::PlusX => (x + 1.0, y + along),
        Direction::MinusX => (x, y + along),
        Direction::PlusY => (x + along, y + 1.0),
        Direction::MinusY => (x + along, y),
    }
}

/// Unit directions of a fan of `count` rays, `fan_degrees` wide, centred on
/// the outward normal of `side`.
pub fn fan_directions(side: Direction, count: usize, fan_degrees: f32) -> Vec<(f32, f32)> {
    let (nx, ny) = side.offset();
    let base = (ny as f32).atan2(nx as f32);
    let half = fan_degrees.to_radians() * 0.5;
    (0..count)
        .map(|i| {
            let offset = if count > 1 {
                -half + 2.0 * half * i as f32 / (count - 1) as f32
            } else {
                0.0
            };
            let angle = base + offset;
            (angle.cos(), angle.sin())
        })
        .collect()
}

/// Walk a ray that starts on a boundary of the cell `start` and enters it.
///
/// `visit` sees every boundary crossed after the start, with its kind. The ray
/// stops on a wall, when it would leave the level, or at the step bound.
pub fn cast_ray<F>(
    registry: &Registry,
    start: (i32, i32),
    origin: (f32, f32),
    direction: (f32, f32),
    mut visit: F,
) -> RayTrace
where
    F: FnMut(Boundary, BoundaryKind),
{
    let (columns, rows) = (registry.columns(), registry.rows());
    let bound = step_bound(columns, rows);
    let in_level = |x: i32, y: i32| x >= 0 && y >= 0 && x < columns && y < rows;

    let (mut cx, mut cy) = start;
    let (px, py) = origin;
    let (dx, dy) = direction;
    let x_major = dx.abs() >= dy.abs();
    let step_x = if dx > 0.0 { 1 } else { -1 };
    let step_y = if dy > 0.0 { 1 } else { -1 };

    let next_line = |c: i32, step: i32| if step > 0 { c + 1 } else { c };
    let mut t_max_x = if dx != 0.0 {
        (next_line(cx, step_x) as f32 - px) / dx
    } else {
        f32::INFINITY
    };
    let mut t_max_y = if dy != 0.0 {
        (next_line(cy, step_y) as f32 - py) / dy
    } else {
        f32::INFINITY
    };
    let t_delta_x = if dx != 0.0 { 1.0 / dx.abs() } else { f32::INFINITY };
    let t_delta_y = if dy != 0.0 { 1.0 / dy.abs() } else { f32::INFINITY };

    let mut trace = RayTrace {
        steps: 0,
        crossings: 0,
        stop: RayStop::LeftGrid,
    };
    if !in_level(cx, cy) {
        return trace;
    }

    // Each iteration crosses one line; at most two lines per major step.
    for _ in 0..bound * 2 {
        let cross_x = t_max_x <= t_max_y;
        let boundary = if cross_x {
            let b = Boundary::Vertical {
                x: next_line(cx, step_x),
                y: cy,
            };
            cx += step_x;
            t_max_x += t_delta_x;
            b
        } else {
            let b = Boundary::Horizontal {
                x: cx,
                y: next_line(cy, step_y),
            };
            cy += step_y;
            t_max_y += t_delta_y;
            b
        };
        if cross_x == x_major {
            trace.steps += 1;
        }
        trace.crossings += 1;

        let kind = registry.boundary_kind(boundary);
        visit(boundary, kind);
        if kind == BoundaryKind::Wall {
            trace.stop = RayStop::Wall;
            return trace;
        }
        if !in_level(cx, cy) {
            trace.stop = RayStop::LeftGrid;
            return trace;
        }
        if trace.steps >= bound {
            break;
        }
    }

    trace.stop = RayStop::StepLimit;
    trace
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ObjectHandle;
    use proptest::prelude::*;

    fn open_level(columns: i32, rows: i32) -> Registry {
        let mut registry = Registry::new(0, columns, rows).unwrap();
        registry.seal();
        registry
    }

    #[test]
    fn test_fan_is_centred_on_normal() {
        let fan = fan_directions(Direction::PlusY, 3, 90.0);
        assert_eq!(fan.len(), 3);
        let (mx, my) = fan[1];
        assert!(mx.abs() < 1e-6 && (my - 1.0).abs() < 1e-6);
        for (x, y) in fan {
            assert!(y > 0.0);
            assert!(((x * x + y * y) - 1.0).abs() < 1e-5);
        }
        let single = fan_directions(Direction::MinusX, 1, 170.0);
        assert_eq!(single.len(), 1);
        assert!((single[0].0 + 1.0).abs() < 1e-6 && single[0].1.abs() < 1e-6);
    }

    #[test]
    fn test_sample_points_lie_on_side() {
        for i in 0..4 {
            let (x, y) = sample_point(2, 5, Direction::PlusX, i, 4);
            assert_eq!(x, 3.0);
            assert!(y > 5.0 && y < 6.0);
            let (x, y) = sample_point(2, 5, Direction::MinusY, i, 4);
            assert_eq!(y, 5.0);
            assert!(x > 2.0 && x < 3.0);
        }
    }

    #[test]
    fn test_straight_ray_crosses_every_line() {
        let registry = open_level(5, 1);
        let mut seen = Vec::new();
        let trace = cast_ray(&registry, (1, 0), (1.0, 0.5), (1.0, 0.0), |b, _| seen.push(b));
        assert_eq!(trace.stop, RayStop::LeftGrid);
        assert_eq!(
            seen,
            vec![
                Boundary::Vertical { x: 2, y: 0 },
                Boundary::Vertical { x: 3, y: 0 },
                Boundary::Vertical { x: 4, y: 0 },
                Boundary::Vertical { x: 5, y: 0 },
            ]
        );
        assert_eq!(trace.steps, 4);
    }

    #[test]
    fn test_wall_stops_ray() {
        let mut registry = Registry::new(0, 5, 1).unwrap();
        registry.register_wall(2, 0, Direction::PlusX, ObjectHandle(0), false).unwrap();
        registry.seal();
        let mut seen = Vec::new();
        let trace = cast_ray(&registry, (1, 0), (1.0, 0.5), (1.0, 0.0), |b, k| seen.push((b, k)));
        assert_eq!(trace.stop, RayStop::Wall);
        assert_eq!(
            seen.last(),
            Some(&(Boundary::Vertical { x: 3, y: 0 }, BoundaryKind::Wall))
        );
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_diagonal_ray_alternates_axes() {
        let registry = open_level(4, 4);
        let mut seen = Vec::new();
        let dir = (0.8f32, 0.6f32);
        cast_ray(&registry, (1, 0), (1.0, 0.5), dir, |b, _| seen.push(b));
        assert!(seen.iter().any(|b| matches!(b, Boundary::Horizontal { .. })));
        assert!(seen.iter().any(|b| matches!(b, Boundary::Vertical { .. })));
    }

    proptest! {
        #[test]
        fn prop_rays_terminate_within_bound(
            columns in 1i32..24,
            rows in 1i32..24,
            sx in 0i32..24,
            sy in 0i32..24,
            side_index in 0usize..4,
            sample in 0usize..10,
            angle in -89.0f32..89.0,
        ) {
            let registry = open_level(columns, rows);
            let (x, y) = (sx % columns, sy % rows);
            let side = Direction::from_index(side_index);
            let origin = sample_point(x, y, side, sample, 10);
            let (nx, ny) = side.offset();
            let base = (ny as f32).atan2(nx as f32) + angle.to_radians();
            let start = (x + nx, y + ny);
            let trace = cast_ray(&registry, start, origin, (base.cos(), base.sin()), |_, _| {});
            prop_assert!(trace.steps <= step_bound(columns, rows));
            prop_assert_ne!(trace.stop, RayStop::StepLimit);
        }
    }
}
