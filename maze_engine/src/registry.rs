// registry.rs - Per-level lookup of structural elements (walls, openings, floors, columns)
//
// Boundaries are addressed on the grid lines of a level: a vertical boundary
// `(x, y)` is the line x = const between cells `(x - 1, y)` and `(x, y)`; a
// horizontal boundary `(x, y)` lies between cells `(x, y - 1)` and `(x, y)`.
// Columns sit on grid points `(0..=columns, 0..=rows)`.

use serde::{Deserialize, Serialize};

use crate::error_handling::{MazeError, Result};
use crate::maze::Maze;
use crate::types::{Connection, Coord, Direction};

/// Slot in the registry's element list and in every cell's visibility table.
pub type ElementId = usize;

/// Opaque handle of the scene object an element stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    VerticalWall,
    HorizontalWall,
    VerticalOpen,
    HorizontalOpen,
    VerticalSeeThrough,
    HorizontalSeeThrough,
    Floor,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Boundary {
    Vertical { x: i32, y: i32 },
    Horizontal { x: i32, y: i32 },
}

impl Boundary {
    /// Boundary on `side` of cell `(x, y)`.
    pub fn of_cell(x: i32, y: i32, side: Direction) -> Boundary {
        match side {
            Direction::PlusX => Boundary::Vertical { x: x + 1, y },
            Direction::MinusX => Boundary::Vertical { x, y },
            Direction::PlusY => Boundary::Horizontal { x, y: y + 1 },
            Direction::MinusY => Boundary::Horizontal { x, y },
        }
    }

    /// The two grid points at the ends of the boundary segment.
    pub fn endpoints(self) -> [(i32, i32); 2] {
        match self {
            Boundary::Vertical { x, y } => [(x, y), (x, y + 1)],
            Boundary::Horizontal { x, y } => [(x, y), (x + 1, y)],
        }
    }
}

/// What a boundary does to a line of sight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    Empty,
    Wall,
    Open,
    SeeThrough,
}

impl BoundaryKind {
    #[inline]
    pub fn transmits_sight(self) -> bool {
        !matches!(self, BoundaryKind::Wall)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementPlace {
    Boundary(Boundary),
    Floor { x: i32, y: i32 },
    Column { x: i32, y: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element {
    pub kind: ElementKind,
    pub handle: ObjectHandle,
    /// Shown from every cell regardless of line of sight.
    pub always_visible: bool,
    pub place: ElementPlace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layer {
    Wall,
    Open,
    SeeThrough,
}

/// Element lookup tables for one level.
#[derive(Debug, Clone)]
pub struct Registry {
    level: i32,
    columns: i32,
    rows: i32,
    elements: Vec<Element>,
    vertical_walls: Vec<Option<ElementId>>,
    horizontal_walls: Vec<Option<ElementId>>,
    vertical_open: Vec<Option<ElementId>>,
    horizontal_open: Vec<Option<ElementId>>,
    vertical_see_through: Vec<Option<ElementId>>,
    horizontal_see_through: Vec<Option<ElementId>>,
    floors: Vec<Option<ElementId>>,
    grid_points: Vec<Option<ElementId>>,
    sealed: bool,
}

impl Registry {
    pub fn new(level: i32, columns: i32, rows: i32) -> Result<Self> {
        if columns <= 0 || rows <= 0 {
            return Err(MazeError::config(format!(
                "registry dimensions must be positive, got {columns}x{rows}"
            )));
        }
        let (c, r) = (columns as usize, rows as usize);
        let vertical = (c + 1) * r;
        let horizontal = c * (r + 1);
        Ok(Self {
            level,
            columns,
            rows,
            elements: Vec::new(),
            vertical_walls: vec![None; vertical],
            horizontal_walls: vec![None; horizontal],
            vertical_open: vec![None; vertical],
            horizontal_open: vec![None; horizontal],
            vertical_see_through: vec![None; vertical],
            horizontal_see_through: vec![None; horizontal],
            floors: vec![None; c * r],
            grid_points: vec![None; (c + 1) * (r + 1)],
            sealed: false,
        })
    }

    #[inline]
    pub fn level(&self) -> i32 {
        self.level
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
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id)
    }

    /// Ends registration. Visibility refuses unsealed registries.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    #[inline]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn always_visible(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.always_visible)
            .map(|(id, _)| id)
    }

    // ------------------------------------------------------------------
    // Index helpers
    // ------------------------------------------------------------------

    fn boundary_index(&self, boundary: Boundary) -> Option<usize> {
        match boundary {
            Boundary::Vertical { x, y } => {
                (x >= 0 && x <= self.columns && y >= 0 && y < self.rows)
                    .then(|| y as usize * (self.columns as usize + 1) + x as usize)
            }
            Boundary::Horizontal { x, y } => {
                (x >= 0 && x < self.columns && y >= 0 && y <= self.rows)
                    .then(|| y as usize * self.columns as usize + x as usize)
            }
        }
    }

    fn floor_index(&self, x: i32, y: i32) -> Option<usize> {
        (x >= 0 && x < self.columns && y >= 0 && y < self.rows)
            .then(|| y as usize * self.columns as usize + x as usize)
    }

    fn point_index(&self, x: i32, y: i32) -> Option<usize> {
        (x >= 0 && x <= self.columns && y >= 0 && y <= self.rows)
            .then(|| y as usize * (self.columns as usize + 1) + x as usize)
    }

    fn table(&self, boundary: Boundary, layer: Layer) -> &Vec<Option<ElementId>> {
        match (boundary, layer) {
            (Boundary::Vertical { .. }, Layer::Wall) => &self.vertical_walls,
            (Boundary::Vertical { .. }, Layer::Open) => &self.vertical_open,
            (Boundary::Vertical { .. }, Layer::SeeThrough) => &self.vertical_see_through,
            (Boundary::Horizontal { .. }, Layer::Wall) => &self.horizontal_walls,
            (Boundary::Horizontal { .. }, Layer::Open) => &self.horizontal_open,
            (Boundary::Horizontal { .. }, Layer::SeeThrough) => &self.horizontal_see_through,
        }
    }

    fn table_mut(&mut self, boundary: Boundary, layer: Layer) -> &mut Vec<Option<ElementId>> {
        match (boundary, layer) {
            (Boundary::Vertical { .. }, Layer::Wall) => &mut self.vertical_walls,
            (Boundary::Vertical { .. }, Layer::Open) => &mut self.vertical_open,
            (Boundary::Vertical { .. }, Layer::SeeThrough) => &mut self.vertical_see_through,
            (Boundary::Horizontal { .. }, Layer::Wall) => &mut self.horizontal_walls,
            (Boundary::Horizontal { .. }, Layer::Open) => &mut self.horizontal_open,
            (Boundary::Horizontal { .. }, Layer::SeeThrough) => &mut self.horizontal_see_through,
        }
    }

    fn lookup(&self, boundary: Boundary, layer: Layer) -> Option<ElementId> {
        let index = self.boundary_index(boundary)?;
        self.table(boundary, layer)[index]
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    fn push(
        &mut self,
        kind: ElementKind,
        handle: ObjectHandle,
        always_visible: bool,
        place: ElementPlace,
    ) -> Result<ElementId> {
        if self.sealed {
            return Err(MazeError::state(format!(
                "registry for level {} is sealed",
                self.level
            )));
        }
        let id = self.elements.len();
        self.elements.push(Element {
            kind,
            handle,
            always_visible,
            place,
        });
        Ok(id)
    }

    fn register_boundary(
        &mut self,
        boundary: Boundary,
        layer: Layer,
        handle: ObjectHandle,
        always_visible: bool,
    ) -> Result<ElementId> {
        let index = self
            .boundary_index(boundary)
            .ok_or_else(|| MazeError::config(format!("boundary {boundary:?} outside level")))?;
        if self.table(boundary, layer)[index].is_some() {
            return Err(MazeError::state(format!(
                "{layer:?} element already registered at {boundary:?}"
            )));
        }
        let vertical = matches!(boundary, Boundary::Vertical { .. });
        let kind = match (layer, vertical) {
            (Layer::Wall, true) => ElementKind::VerticalWall,
            (Layer::Wall, false) => ElementKind::HorizontalWall,
            (Layer::Open, true) => ElementKind::VerticalOpen,
            (Layer::Open, false) => ElementKind::HorizontalOpen,
            (Layer::SeeThrough, true) => ElementKind::VerticalSeeThrough,
            (Layer::SeeThrough, false) => ElementKind::HorizontalSeeThrough,
        };
        let id = self.push(kind, handle, always_visible, ElementPlace::Boundary(boundary))?;
        self.table_mut(boundary, layer)[index] = Some(id);
        Ok(id)
    }

    /// Opaque wall on `side` of cell `(x, y)`. Also the opaque twin of a
    /// see-through variant on the same boundary.
    pub fn register_wall(
        &mut self,
        x: i32,
        y: i32,
        side: Direction,
        handle: ObjectHandle,
        always_visible: bool,
    ) -> Result<ElementId> {
        self.register_boundary(Boundary::of_cell(x, y, side), Layer::Wall, handle, always_visible)
    }

    /// Open-passage marker on `side` of cell `(x, y)`.
    pub fn register_open(
        &mut self,
        x: i32,
        y: i32,
        side: Direction,
        handle: ObjectHandle,
        always_visible: bool,
    ) -> Result<ElementId> {
        self.register_boundary(Boundary::of_cell(x, y, side), Layer::Open, handle, always_visible)
    }

    /// See-through wall variant on `side` of cell `(x, y)`.
    pub fn register_see_through(
        &mut self,
        x: i32,
        y: i32,
        side: Direction,
        handle: ObjectHandle,
        always_visible: bool,
    ) -> Result<ElementId> {
        self.register_boundary(
            Boundary::of_cell(x, y, side),
            Layer::SeeThrough,
            handle,
            always_visible,
        )
    }

    pub fn register_floor(
        &mut self,
        x: i32,
        y: i32,
        handle: ObjectHandle,
        always_visible: bool,
    ) -> Result<ElementId> {
        let index = self
            .floor_index(x, y)
            .ok_or_else(|| MazeError::config(format!("floor ({x}, {y}) outside level")))?;
        if self.floors[index].is_some() {
            return Err(MazeError::state(format!("floor already registered at ({x}, {y})")));
        }
        let place = ElementPlace::Floor { x, y };
        let id = self.push(ElementKind::Floor, handle, always_visible, place)?;
        self.floors[index] = Some(id);
        Ok(id)
    }

    /// Column on grid point `(x, y)`, `0..=columns` × `0..=rows`.
    pub fn register_column(
        &mut self,
        x: i32,
        y: i32,
        handle: ObjectHandle,
        always_visible: bool,
    ) -> Result<ElementId> {
        let index = self
            .point_index(x, y)
            .ok_or_else(|| MazeError::config(format!("column ({x}, {y}) outside level")))?;
        if self.grid_points[index].is_some() {
            return Err(MazeError::state(format!("column already registered at ({x}, {y})")));
        }
        let place = ElementPlace::Column { x, y };
        let id = self.push(ElementKind::Column, handle, always_visible, place)?;
        self.grid_points[index] = Some(id);
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn wall_at(&self, boundary: Boundary) -> Option<ElementId> {
        self.lookup(boundary, Layer::Wall)
    }

    pub fn open_at(&self, boundary: Boundary) -> Option<ElementId> {
        self.lookup(boundary, Layer::Open)
    }

    pub fn see_through_at(&self, boundary: Boundary) -> Option<ElementId> {
        self.lookup(boundary, Layer::SeeThrough)
    }

    pub fn floor_at(&self, x: i32, y: i32) -> Option<ElementId> {
        self.floor_index(x, y).and_then(|i| self.floors[i])
    }

    pub fn column_at(&self, x: i32, y: i32) -> Option<ElementId> {
        self.point_index(x, y).and_then(|i| self.grid_points[i])
    }

    /// See-through wins over an open marker, which wins over a wall.
    pub fn boundary_kind(&self, boundary: Boundary) -> BoundaryKind {
        if self.see_through_at(boundary).is_some() {
            BoundaryKind::SeeThrough
        } else if self.open_at(boundary).is_some() {
            BoundaryKind::Open
        } else if self.wall_at(boundary).is_some() {
            BoundaryKind::Wall
        } else {
            BoundaryKind::Empty
        }
    }

    /// Wall, open and see-through elements registered on a boundary.
    pub fn boundary_elements(&self, boundary: Boundary) -> impl Iterator<Item = ElementId> {
        [
            self.wall_at(boundary),
            self.open_at(boundary),
            self.see_through_at(boundary),
        ]
        .into_iter()
        .flatten()
    }

    // ------------------------------------------------------------------
    // Default placement
    // ------------------------------------------------------------------

    /// Register the elements a model-placement step would put on level `z`:
    /// a floor per walkable cell, an open marker on open sides, a wall on
    /// sealed sides (plus a see-through twin where `see_through` says so), and
    /// a column on every grid point touching a wall. Handles count up from
    /// `first_handle`. The returned registry is sealed.
    pub fn populate_from_maze<F>(
        maze: &Maze,
        z: i32,
        first_handle: u32,
        see_through: F,
    ) -> Result<Registry>
    where
        F: Fn(Coord, Direction) -> bool,
    {
        let grid = &maze.grid;
        let mut registry = Registry::new(z, grid.columns(), grid.rows())?;
        let mut next = first_handle;
        let mut handle = || {
            let h = ObjectHandle(next);
            next += 1;
            h
        };

        for y in 0..grid.rows() {
            for x in 0..grid.columns() {
                let coord = Coord::new(x, y, z);
                if grid.cell(coord).map_or(false, |c| c.situation.is_walkable()) {
                    registry.register_floor(x, y, handle(), false)?;
                }
            }
        }

        // Each boundary is owned by the cell on its MinusX / MinusY side, plus
        // the outer PlusX / PlusY edges.
        for y in 0..=grid.rows() {
            for x in 0..=grid.columns() {
                for side in [Direction::MinusX, Direction::MinusY] {
                    let inside = Coord::new(x, y, z);
                    let outside = inside.step(side);
                    let here = grid.cell(inside).map(|c| c.connection(side));
                    let there = grid.cell(outside).map(|c| c.connection(side.opposite()));
                    let boundary = Boundary::of_cell(x, y, side);
                    if registry.boundary_index(boundary).is_none() {
                        continue;
                    }

                    let open = here == Some(Connection::Open) || there == Some(Connection::Open);
                    let sealed = |c: Option<Connection>| {
                        matches!(
                            c,
                            Some(Connection::Closed | Connection::Unpassable | Connection::Pending)
                        )
                    };
                    if open {
                        registry.register_boundary(boundary, Layer::Open, handle(), false)?;
                    } else if sealed(here) || sealed(there) {
                        registry.register_boundary(boundary, Layer::Wall, handle(), false)?;
                        let owner = if here.is_some() { inside } else { outside };
                        let owner_side = if here.is_some() { side } else { side.opposite() };
                        if see_through(owner, owner_side) {
                            let glass = handle();
                            registry.register_boundary(boundary, Layer::SeeThrough, glass, false)?;
                        }
                    }
                }
            }
        }

        for y in 0..=grid.rows() {
            for x in 0..=grid.columns() {
                let touching = [
                    Boundary::Vertical { x, y: y - 1 },
                    Boundary::Vertical { x, y },
                    Boundary::Horizontal { x: x - 1, y },
                    Boundary::Horizontal { x, y },
                ];
                if touching.iter().any(|&b| registry.wall_at(b).is_some()) {
                    registry.register_column(x, y, handle(), false)?;
                }
            }
        }

        registry.seal();
        log::debug!("Level {} registry: {} elements", z, registry.len());
        Ok(registry)
    }

    /// Populate and seal one registry per level, with globally unique handles.
    pub fn populate_all<F>(maze: &Maze, see_through: F) -> Result<Vec<Registry>>
    where
        F: Fn(Coord, Direction) -> bool,
    {
        let mut registries = Vec::with_capacity(maze.grid.levels() as usize);
        let mut first_handle = 0u32;
        for z in 0..maze.grid.levels() {
            let registry = Registry::populate_from_maze(maze, z, first_handle, &see_through)?;
            first_handle += registry.len() as u32;
            registries.push(registry);
        }
        Ok(registries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MazeConfig;
    use crate::generator::MazeGenerator;

    #[test]
    fn test_boundary_of_cell() {
        assert_eq!(Boundary::of_cell(2, 3, Direction::PlusX), Boundary::Vertical { x: 3, y: 3 });
        assert_eq!(Boundary::of_cell(2, 3, Direction::MinusX), Boundary::Vertical { x: 2, y: 3 });
        assert_eq!(Boundary::of_cell(2, 3, Direction::PlusY), Boundary::Horizontal { x: 2, y: 4 });
        assert_eq!(Boundary::of_cell(2, 3, Direction::MinusY), Boundary::Horizontal { x: 2, y: 3 });
        // Neighbors share a boundary.
        assert_eq!(
            Boundary::of_cell(1, 0, Direction::PlusX),
            Boundary::of_cell(2, 0, Direction::MinusX)
        );
    }

    #[test]
    fn test_registration_and_lookup() {
        let mut registry = Registry::new(0, 3, 2).unwrap();
        let wall = registry.register_wall(0, 0, Direction::PlusX, ObjectHandle(10), false).unwrap();
        let glass = registry
            .register_see_through(1, 0, Direction::MinusX, ObjectHandle(11), false)
            .unwrap();
        let floor = registry.register_floor(2, 1, ObjectHandle(12), true).unwrap();
        let column = registry.register_column(3, 2, ObjectHandle(13), false).unwrap();

        let b = Boundary::Vertical { x: 1, y: 0 };
        assert_eq!(registry.wall_at(b), Some(wall));
        assert_eq!(registry.see_through_at(b), Some(glass));
        assert_eq!(registry.boundary_kind(b), BoundaryKind::SeeThrough);
        assert_eq!(registry.boundary_elements(b).collect::<Vec<_>>(), vec![wall, glass]);
        assert_eq!(registry.floor_at(2, 1), Some(floor));
        assert_eq!(registry.column_at(3, 2), Some(column));
        assert_eq!(registry.always_visible().collect::<Vec<_>>(), vec![floor]);
        assert_eq!(registry.element(glass).unwrap().kind, ElementKind::VerticalSeeThrough);
        assert_eq!(
            registry.boundary_kind(Boundary::Horizontal { x: 0, y: 0 }),
            BoundaryKind::Empty
        );
    }

    #[test]
    fn test_registration_errors() {
        let mut registry = Registry::new(0, 2, 2).unwrap();
        assert!(registry.register_floor(2, 0, ObjectHandle(0), false).is_err());
        assert!(registry.register_column(3, 0, ObjectHandle(0), false).is_err());
        registry.register_wall(0, 0, Direction::MinusX, ObjectHandle(1), false).unwrap();
        assert!(matches!(
            registry.register_wall(0, 0, Direction::MinusX, ObjectHandle(2), false),
            Err(MazeError::InvalidState { .. })
        ));

        registry.seal();
        assert!(matches!(
            registry.register_floor(0, 0, ObjectHandle(3), false),
            Err(MazeError::InvalidState { .. })
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_populate_matches_connections() {
        let config = MazeConfig {
            columns: 5,
            rows: 4,
            seed: Some(3),
            ..MazeConfig::default()
        };
        let maze = MazeGenerator::from_config(config).unwrap().generate().unwrap();
        let registries = Registry::populate_all(&maze, |_, _| false).unwrap();
        assert_eq!(registries.len(), 1);
        let registry = &registries[0];
        assert!(registry.is_sealed());

        for cell in maze.grid.cells() {
            let (x, y) = (cell.coord.x, cell.coord.y);
            assert!(registry.floor_at(x, y).is_some());
            for side in Direction::ALL {
                let boundary = Boundary::of_cell(x, y, side);
                let expected = if cell.is_open(side) {
                    BoundaryKind::Open
                } else {
                    BoundaryKind::Wall
                };
                assert_eq!(registry.boundary_kind(boundary), expected, "{} {:?}", cell.coord, side);
            }
        }
        // The outer corners always touch walls.
        assert!(registry.column_at(0, 0).is_some());
        assert!(registry.column_at(5, 4).is_some());

        let handles: std::collections::HashSet<_> =
            registry.elements().iter().map(|e| e.handle).collect();
        assert_eq!(handles.len(), registry.len());
    }

    #[test]
    fn test_populate_see_through_twins() {
        let config = MazeConfig {
            columns: 4,
            rows: 4,
            seed: Some(9),
            ..MazeConfig::default()
        };
        let maze = MazeGenerator::from_config(config).unwrap().generate().unwrap();
        let registry =
            Registry::populate_from_maze(&maze, 0, 100, |coord, _| coord.x == 1).unwrap();

        let mut twins = 0;
        for element in registry.elements() {
            let see_through = matches!(
                element.kind,
                ElementKind::VerticalSeeThrough | ElementKind::HorizontalSeeThrough
            );
            if let (true, ElementPlace::Boundary(b)) = (see_through, element.place) {
                assert!(registry.wall_at(b).is_some());
                twins += 1;
            }
        }
        assert!(twins > 0);
        assert!(registry.elements().iter().all(|e| e.handle.0 >= 100));
    }
}
