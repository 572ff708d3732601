// report.rs - Serializable summary of a generated maze and its visibility pass

use std::collections::BTreeMap;

use serde::Serialize;

use crate::bundle::Bundle;
use crate::maze::Maze;
use crate::registry::Registry;
use crate::types::{Coord, Direction, Visibility};
use crate::visibility::VisibilityReport;

#[derive(Debug, Clone, Serialize)]
pub struct MazeReport {
    pub columns: i32,
    pub rows: i32,
    pub levels: i32,
    pub seed: u64,
    pub open_edges: usize,
    pub components: usize,
    pub levels_summary: Vec<LevelSummary>,
    pub bundles: Vec<BundleSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<VisibilitySummary>,
    pub generation_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LevelSummary {
    pub level: i32,
    /// Cell count per situation, keyed by its debug name.
    pub situations: BTreeMap<String, usize>,
    pub components: usize,
    pub elements: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BundleSummary {
    pub index: usize,
    pub handle: Coord,
    pub direction: Direction,
    pub length: i32,
    pub width: i32,
    pub height: i32,
    pub climbing: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VisibilitySummary {
    #[serde(flatten)]
    pub pass: VisibilityReport,
    /// Table entries per visibility value.
    pub states: BTreeMap<String, usize>,
}

impl BundleSummary {
    fn from_bundle(bundle: &Bundle) -> Self {
        Self {
            index: bundle.index,
            handle: bundle.handle(),
            direction: bundle.request.direction,
            length: bundle.request.length,
            width: bundle.request.width,
            height: bundle.request.height,
            climbing: bundle.is_climbing(),
        }
    }
}

impl MazeReport {
    pub fn build(
        maze: &Maze,
        registries: &[Registry],
        pass: Option<VisibilityReport>,
        generation_ms: u64,
    ) -> Self {
        let grid = &maze.grid;
        let levels_summary = (0..grid.levels())
            .map(|z| {
                let mut situations = BTreeMap::new();
                for cell in grid.level_cells(z) {
                    *situations.entry(format!("{:?}", cell.situation)).or_insert(0) += 1;
                }
                LevelSummary {
                    level: z,
                    situations,
                    components: maze.connected_components(Some(z)),
                    elements: registries.get(z as usize).map_or(0, Registry::len),
                }
            })
            .collect();

        let mut report = Self {
            columns: grid.columns(),
            rows: grid.rows(),
            levels: grid.levels(),
            seed: maze.seed,
            open_edges: maze.open_edges(),
            components: maze.connected_components(None),
            levels_summary,
            bundles: maze.bundles.iter().map(BundleSummary::from_bundle).collect(),
            visibility: None,
            generation_ms,
        };
        if let Some(pass) = pass {
            report.attach_visibility(maze, pass);
        }
        report
    }

    /// Add a finished visibility pass; state counts are read from `maze`.
    pub fn attach_visibility(&mut self, maze: &Maze, pass: VisibilityReport) {
        let mut states = BTreeMap::new();
        for cell in maze.grid.cells() {
            for value in &cell.visibility {
                if *value != Visibility::Invisible {
                    *states.entry(format!("{value:?}")).or_insert(0) += 1;
                }
            }
        }
        self.visibility = Some(VisibilitySummary { pass, states });
    }
}
