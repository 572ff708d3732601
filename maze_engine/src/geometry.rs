// geometry.rs - World-space helpers: vectors and grid <-> world conversion

use serde::{Deserialize, Serialize};

use crate::types::Coord;

// ============================================================================
// VECTOR TYPE
// ============================================================================

/// World-space vector. `y` is up; grid rows run along `z`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    #[inline]
    pub fn lerp(self, other: Vec3, t: f32) -> Vec3 {
        let t = t.clamp(0.0, 1.0);
        Vec3::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
            self.z + (other.z - self.z) * t,
        )
    }

    #[inline]
    pub fn dot(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    #[inline]
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    #[inline]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }
}

impl std::ops::Add for Vec3 {
    type Output = Vec3;
    #[inline]
    fn add(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Vec3;
    #[inline]
    fn sub(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Vec3;
    #[inline]
    fn mul(self, scalar: f32) -> Vec3 {
        Vec3::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl From<[f32; 3]> for Vec3 {
    #[inline]
    fn from(arr: [f32; 3]) -> Self {
        Vec3::new(arr[0], arr[1], arr[2])
    }
}

impl From<Vec3> for [f32; 3] {
    #[inline]
    fn from(v: Vec3) -> [f32; 3] {
        [v.x, v.y, v.z]
    }
}

// ============================================================================
// CELL GEOMETRY
// ============================================================================

/// Physical cell dimensions. Only bundles' ramp guides and the walker use these;
/// topology decisions never do.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellGeometry {
    pub cell_size: f32,
    pub cell_height: f32,
    /// Passable fraction of a side, centred on the side.
    pub opening_width: f32,
}

impl Default for CellGeometry {
    fn default() -> Self {
        Self {
            cell_size: 4.0,
            cell_height: 3.0,
            opening_width: 0.5,
        }
    }
}

impl CellGeometry {
    /// Floor-level centre of a cell.
    pub fn cell_center(&self, coord: Coord) -> Vec3 {
        Vec3::new(
            (coord.x as f32 + 0.5) * self.cell_size,
            coord.z as f32 * self.cell_height,
            (coord.y as f32 + 0.5) * self.cell_size,
        )
    }

    /// Position of a world point relative to the cell's minimum corner, in cell units.
    pub fn local_position(&self, coord: Coord, point: Vec3) -> (f32, f32) {
        (
            point.x / self.cell_size - coord.x as f32,
            point.z / self.cell_size - coord.y as f32,
        )
    }

    /// Grid cell containing a world point on the given level.
    pub fn coord_at(&self, point: Vec3, level: i32) -> Coord {
        Coord::new(
            (point.x / self.cell_size).floor() as i32,
            (point.z / self.cell_size).floor() as i32,
            level,
        )
    }
}
