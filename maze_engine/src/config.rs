// config.rs - Maze generation and visibility settings (JSON-backed)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error_handling::{MazeError, Result};
use crate::geometry::CellGeometry;
use crate::types::Direction;

/// Default chance the braid pass opens an undecided wall.
pub const DEFAULT_BRAID_PROBABILITY: f64 = 0.1;

/// Complete input for one maze.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MazeConfig {
    pub columns: i32,
    pub rows: i32,
    pub levels: i32,
    pub cell_size: f32,
    pub cell_height: f32,
    /// Passable fraction of each side (0..=1).
    pub opening_width: f32,
    pub braid_probability: f64,
    /// Fixed seed; wall-clock time when absent.
    pub seed: Option<u64>,
    pub voids: Vec<VoidSpec>,
    pub bundles: Vec<BundleSpec>,
    pub visibility: VisibilitySettings,
}

impl Default for MazeConfig {
    fn default() -> Self {
        let geometry = CellGeometry::default();
        Self {
            columns: 10,
            rows: 10,
            levels: 1,
            cell_size: geometry.cell_size,
            cell_height: geometry.cell_height,
            opening_width: geometry.opening_width,
            braid_probability: DEFAULT_BRAID_PROBABILITY,
            seed: None,
            voids: Vec::new(),
            bundles: Vec::new(),
            visibility: VisibilitySettings::default(),
        }
    }
}

/// Excluded box. `position: None` places it randomly inside the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoidSpec {
    #[serde(default)]
    pub position: Option<[i32; 3]>,
    pub size: [i32; 3],
}

/// A pool of bundle instances to attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleSpec {
    #[serde(default)]
    pub position: Option<[i32; 3]>,
    #[serde(default)]
    pub direction: Option<Direction>,
    pub length: i32,
    #[serde(default = "default_width")]
    pub width: i32,
    /// Levels climbed; negative descends, 0 is a flat multi-cell floor.
    #[serde(default)]
    pub height: i32,
    #[serde(default = "default_count")]
    pub count: u32,
    /// Chance each instance in the pool is attempted.
    #[serde(default = "default_probability")]
    pub probability: f64,
}

fn default_width() -> i32 {
    1
}

fn default_count() -> u32 {
    1
}

fn default_probability() -> f64 {
    1.0
}

/// Probability usable by `Rng::gen_bool`: clamped to [0, 1], non-finite is 0.
pub(crate) fn chance(probability: f64) -> f64 {
    if probability.is_finite() {
        probability.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Ray fan used by the visibility pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilitySettings {
    pub ray_count: usize,
    pub sample_points: usize,
    /// Total opening angle of the fan, centred on the side's outward normal.
    pub fan_degrees: f32,
}

impl Default for VisibilitySettings {
    fn default() -> Self {
        Self {
            ray_count: 21,
            sample_points: 10,
            fan_degrees: 170.0,
        }
    }
}

impl VisibilitySettings {
    pub fn validate(&self) -> Result<()> {
        if self.ray_count == 0 || self.sample_points == 0 {
            return Err(MazeError::config("ray_count and sample_points must be > 0"));
        }
        // A 180° fan would include rays running along the side itself.
        if !(self.fan_degrees >= 0.0 && self.fan_degrees < 180.0) {
            return Err(MazeError::config(format!(
                "fan_degrees must be in [0, 180), got {}",
                self.fan_degrees
            )));
        }
        Ok(())
    }
}

impl MazeConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: MazeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading maze configuration from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn geometry(&self) -> CellGeometry {
        CellGeometry {
            cell_size: self.cell_size,
            cell_height: self.cell_height,
            opening_width: self.opening_width,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.columns <= 0 || self.rows <= 0 || self.levels <= 0 {
            return Err(MazeError::config(format!(
                "grid dimensions must be positive, got {}x{}x{}",
                self.columns, self.rows, self.levels
            )));
        }
        if !(self.cell_size > 0.0 && self.cell_height > 0.0) {
            return Err(MazeError::config("cell_size and cell_height must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.opening_width) {
            return Err(MazeError::config("opening_width must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.braid_probability) {
            return Err(MazeError::config("braid_probability must be within [0, 1]"));
        }
        for void in &self.voids {
            if void.size.iter().any(|&s| s <= 0) {
                return Err(MazeError::config(format!(
                    "void size must be positive, got {:?}",
                    void.size
                )));
            }
        }
        for bundle in &self.bundles {
            if bundle.length <= 0 || bundle.width <= 0 {
                return Err(MazeError::config(format!(
                    "bundle length and width must be positive, got {}x{}",
                    bundle.length, bundle.width
                )));
            }
            if !(0.0..=1.0).contains(&bundle.probability) {
                return Err(MazeError::config("bundle probability must be within [0, 1]"));
            }
        }
        self.visibility.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = MazeConfig::from_json_str(r#"{ "columns": 6, "rows": 4 }"#).unwrap();
        assert_eq!(config.columns, 6);
        assert_eq!(config.rows, 4);
        assert_eq!(config.levels, 1);
        assert_eq!(config.visibility.ray_count, 21);
        assert_eq!(config.braid_probability, DEFAULT_BRAID_PROBABILITY);
    }

    #[test]
    fn test_bundle_spec_defaults() {
        let config = MazeConfig::from_json_str(
            r#"{ "levels": 2, "bundles": [ { "length": 3, "height": 1, "direction": "plus_x" } ] }"#,
        )
        .unwrap();
        let bundle = &config.bundles[0];
        assert_eq!(bundle.width, 1);
        assert_eq!(bundle.count, 1);
        assert_eq!(bundle.probability, 1.0);
        assert_eq!(bundle.direction, Some(Direction::PlusX));
        assert!(bundle.position.is_none());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(matches!(
            MazeConfig::from_json_str(r#"{ "columns": 0 }"#),
            Err(MazeError::InvalidConfig { .. })
        ));
        assert!(matches!(
            MazeConfig::from_json_str(r#"{ "braid_probability": 1.5 }"#),
            Err(MazeError::InvalidConfig { .. })
        ));
        assert!(matches!(
            MazeConfig::from_json_str(r#"{ "visibility": { "fan_degrees": 180.0 } }"#),
            Err(MazeError::InvalidConfig { .. })
        ));
        assert!(matches!(
            MazeConfig::from_json_str("not json"),
            Err(MazeError::Serialization(_))
        ));
    }

    #[test]
    fn test_chance_is_always_a_valid_probability() {
        assert_eq!(chance(0.25), 0.25);
        assert_eq!(chance(-3.0), 0.0);
        assert_eq!(chance(7.0), 1.0);
        assert_eq!(chance(f64::NAN), 0.0);
        assert_eq!(chance(f64::INFINITY), 0.0);
        assert_eq!(chance(f64::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_json_round_trip_keeps_voids() {
        let mut config = MazeConfig::default();
        config.voids.push(VoidSpec {
            position: Some([1, 1, 0]),
            size: [2, 2, 1],
        });
        let back = MazeConfig::from_json_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }
}
