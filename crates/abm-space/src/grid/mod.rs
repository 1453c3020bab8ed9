//! Discretisation of a [`Space`] into cells.
//!
//! [`Grid`] is a tagged variant over three lattices sharing one contract:
//!
//! | Structure    | Dimensions | Neighborhood modes                     |
//! |--------------|------------|----------------------------------------|
//! | `square`     | 1, 2, 3    | `empty`, `vonNeumann(d)`, `Moore(d)`   |
//! | `hexagonal`  | 2          | `empty`, `hexagonal`                   |
//! | `triangular` | 2          | `empty`, `vonNeumann`, `Moore`         |
//!
//! Cell ids enumerate the multi-index column-major (first component varies
//! fastest).  The active neighborhood is resolved once, in
//! [`Grid::set_neighborhood`], to a plain function pointer; every later
//! [`Grid::neighbors_of`] call is a direct call through it.

mod hexagonal;
mod square;
mod triangular;

use std::fmt;

use serde::Deserialize;

use abm_core::log::CORE;
use abm_core::{CellId, Config};

use crate::{BoundarySelect, Neighborhood, NeighborhoodMode, Position, Space, SpaceError, SpaceResult};

pub use hexagonal::{HexLattice, IDEAL_ASPECT_RATIO};
pub use square::SquareLattice;
pub use triangular::TriLattice;

/// Default relative tolerance on the hexagonal cell aspect ratio.
pub const DEFAULT_ASPECT_RATIO_TOLERANCE: f64 = 0.05;

/// Signature of a resolved neighborhood lookup.
pub type NeighborFn<const DIM: usize> = fn(&Grid<DIM>, CellId) -> Vec<CellId>;

// ── GridStructure ─────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridStructure {
    Square,
    Hexagonal,
    Triangular,
}

impl fmt::Display for GridStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GridStructure::Square => "square",
            GridStructure::Hexagonal => "hexagonal",
            GridStructure::Triangular => "triangular",
        })
    }
}

// ── GridConfig ────────────────────────────────────────────────────────────────

/// Parameters of a grid, read from the `grid` configuration node.
#[derive(Clone, Debug, PartialEq)]
pub struct GridConfig {
    pub structure:              GridStructure,
    /// Cells per unit length, `>= 1`.
    pub resolution:             u32,
    /// Hexagonal only: allowed relative deviation from the regular aspect
    /// ratio.
    pub aspect_ratio_tolerance: f64,
}

impl GridConfig {
    pub fn new(structure: GridStructure, resolution: u32) -> Self {
        Self {
            structure,
            resolution,
            aspect_ratio_tolerance: DEFAULT_ASPECT_RATIO_TOLERANCE,
        }
    }

    pub fn with_aspect_ratio_tolerance(mut self, tol: f64) -> Self {
        self.aspect_ratio_tolerance = tol;
        self
    }

    /// Reads `structure`, `resolution` and the optional
    /// `aspect_ratio_tolerance`.
    pub fn from_config(cfg: &Config) -> SpaceResult<Self> {
        let structure: GridStructure = cfg.get_as("structure")?;
        let resolution: i64 = cfg.get_as("resolution")?;
        if resolution < 1 || resolution > u32::MAX as i64 {
            return Err(SpaceError::InvalidConfig(format!(
                "grid resolution must be a positive integer, got {resolution}"
            )));
        }
        let tol = cfg.get_as_or("aspect_ratio_tolerance", DEFAULT_ASPECT_RATIO_TOLERANCE)?;
        if !(tol >= 0.0) {
            return Err(SpaceError::InvalidConfig(format!(
                "aspect_ratio_tolerance must be non-negative, got {tol}"
            )));
        }
        Ok(Self::new(structure, resolution as u32).with_aspect_ratio_tolerance(tol))
    }
}

// ── Grid ──────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
enum Lattice<const DIM: usize> {
    Square(SquareLattice<DIM>),
    Hexagonal(HexLattice),
    Triangular(TriLattice),
}

/// A space discretised into `num_cells()` cells plus the active
/// neighborhood.
#[derive(Clone, Debug)]
pub struct Grid<const DIM: usize> {
    space:        Space<DIM>,
    resolution:   u32,
    lattice:      Lattice<DIM>,
    neighborhood: Neighborhood,
    neighbors_fn: NeighborFn<DIM>,
}

impl<const DIM: usize> Grid<DIM> {
    /// Build the lattice for `space`.  The neighborhood starts out `empty`.
    pub fn new(space: Space<DIM>, cfg: &GridConfig) -> SpaceResult<Self> {
        if cfg.resolution == 0 {
            return Err(SpaceError::InvalidConfig("grid resolution must be at least 1".into()));
        }
        let lattice = match cfg.structure {
            GridStructure::Square => Lattice::Square(SquareLattice::new(&space, cfg.resolution)?),
            GridStructure::Hexagonal => {
                let extent = planar_extent(&space, cfg.structure)?;
                Lattice::Hexagonal(HexLattice::new(
                    extent,
                    space.is_periodic(),
                    cfg.resolution,
                    cfg.aspect_ratio_tolerance,
                )?)
            }
            GridStructure::Triangular => {
                let extent = planar_extent(&space, cfg.structure)?;
                Lattice::Triangular(TriLattice::new(extent, space.is_periodic(), cfg.resolution)?)
            }
        };
        let grid = Self {
            space,
            resolution: cfg.resolution,
            lattice,
            neighborhood: Neighborhood::empty(),
            neighbors_fn: nb_empty::<DIM>,
        };
        tracing::info!(
            target: CORE,
            structure = %cfg.structure,
            shape = ?grid.shape(),
            num_cells = grid.num_cells(),
            periodic = grid.is_periodic(),
            "grid set up"
        );
        Ok(grid)
    }

    /// Build from a `grid` configuration node.
    pub fn from_config(space: Space<DIM>, cfg: &Config) -> SpaceResult<Self> {
        Self::new(space, &GridConfig::from_config(cfg)?)
    }

    // ── Properties ────────────────────────────────────────────────────────────

    pub fn structure(&self) -> GridStructure {
        match self.lattice {
            Lattice::Square(_) => GridStructure::Square,
            Lattice::Hexagonal(_) => GridStructure::Hexagonal,
            Lattice::Triangular(_) => GridStructure::Triangular,
        }
    }

    #[inline]
    pub fn space(&self) -> &Space<DIM> {
        &self.space
    }

    #[inline]
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    #[inline]
    pub fn is_periodic(&self) -> bool {
        self.space.is_periodic()
    }

    /// `true` for lattices whose cells are axis-aligned boxes.
    #[inline]
    pub fn is_structured(&self) -> bool {
        matches!(self.lattice, Lattice::Square(_))
    }

    pub fn shape(&self) -> [u32; DIM] {
        match &self.lattice {
            Lattice::Square(sq) => sq.shape(),
            Lattice::Hexagonal(hex) => from2(hex.shape(), 0),
            Lattice::Triangular(tri) => from2(tri.shape(), 0),
        }
    }

    pub fn num_cells(&self) -> usize {
        match &self.lattice {
            Lattice::Square(sq) => sq.num_cells(),
            Lattice::Hexagonal(hex) => hex.num_cells(),
            Lattice::Triangular(tri) => tri.num_cells(),
        }
    }

    /// Bounding-box extent of every cell (all cells of a grid are congruent).
    pub fn cell_extent(&self) -> [f64; DIM] {
        match &self.lattice {
            Lattice::Square(sq) => sq.cell_extent(),
            Lattice::Hexagonal(hex) => from2(hex.cell_extent(), 0.0),
            Lattice::Triangular(tri) => from2(tri.cell_extent(), 0.0),
        }
    }

    /// Cells per unit length after fitting the lattice to the space.
    ///
    /// Per axis for square grids; for the other structures the square root
    /// of the cell density, repeated on both axes.
    pub fn effective_resolution(&self) -> [f64; DIM] {
        match &self.lattice {
            Lattice::Square(sq) => {
                let mut res = [0.0; DIM];
                for (i, r) in res.iter_mut().enumerate() {
                    *r = sq.shape()[i] as f64 / self.space.extent()[i];
                }
                res
            }
            _ => {
                let density = (self.num_cells() as f64 / self.space.volume()).sqrt();
                [density; DIM]
            }
        }
    }

    #[inline]
    pub fn neighborhood(&self) -> Neighborhood {
        self.neighborhood
    }

    /// `Err(InvalidCell)` unless `id` is a cell of this grid.
    pub fn validate(&self, id: CellId) -> SpaceResult<CellId> {
        if id.index() < self.num_cells() {
            Ok(id)
        } else {
            Err(SpaceError::InvalidCell(id))
        }
    }

    // ── Geometry ──────────────────────────────────────────────────────────────

    /// Cell containing `p`.
    ///
    /// Periodic grids wrap `p` into the space first.  Non-periodic grids
    /// fail with `OutOfSpace` for points outside the space and clamp points
    /// on the high-value boundary into the last cell.
    pub fn cell_at(&self, p: &Position<DIM>) -> SpaceResult<CellId> {
        let p = self.space.map_into(p)?;
        let raw = match &self.lattice {
            Lattice::Square(sq) => sq.cell_at(&p),
            Lattice::Hexagonal(hex) => hex.cell_at(to2(&p)),
            Lattice::Triangular(tri) => tri.cell_at(to2(&p)),
        };
        Ok(CellId(raw))
    }

    /// `true` if `p` lies in cell `id`.  Square cells use an axis-wise
    /// interval test; the other structures compare against [`cell_at`].
    ///
    /// [`cell_at`]: Self::cell_at
    pub fn cell_contains(&self, id: CellId, p: &Position<DIM>) -> bool {
        let Ok(mapped) = self.space.map_into(p) else {
            return false;
        };
        match &self.lattice {
            Lattice::Square(sq) => sq.box_contains(id.0, &mapped),
            _ => self.cell_at(&mapped).is_ok_and(|c| c == id),
        }
    }

    /// Multi-index of `id`.  Hexagonal and triangular grids use
    /// `(column, row)`.
    pub fn midx_of(&self, id: CellId) -> [u32; DIM] {
        debug_assert!(id.index() < self.num_cells(), "{id} out of range");
        match &self.lattice {
            Lattice::Square(sq) => sq.midx_of(id.0),
            Lattice::Hexagonal(hex) => from2(hex.midx_of(id.0), 0),
            Lattice::Triangular(tri) => from2(tri.midx_of(id.0), 0),
        }
    }

    pub fn barycenter_of(&self, id: CellId) -> Position<DIM> {
        debug_assert!(id.index() < self.num_cells(), "{id} out of range");
        match &self.lattice {
            Lattice::Square(sq) => sq.barycenter_of(id.0),
            Lattice::Hexagonal(hex) => from2(hex.barycenter_of(id.0), 0.0),
            Lattice::Triangular(tri) => from2(tri.barycenter_of(id.0), 0.0),
        }
    }

    /// Bounding-box extent of `id`.
    pub fn extent_of(&self, id: CellId) -> [f64; DIM] {
        debug_assert!(id.index() < self.num_cells(), "{id} out of range");
        self.cell_extent()
    }

    /// Corner points of `id`, counter-clockwise for 2D cells.
    pub fn vertices_of(&self, id: CellId) -> Vec<Position<DIM>> {
        debug_assert!(id.index() < self.num_cells(), "{id} out of range");
        match &self.lattice {
            Lattice::Square(sq) => sq.vertices_of(id.0),
            Lattice::Hexagonal(hex) => hex.vertices_of(id.0).into_iter().map(|v| from2(v, 0.0)).collect(),
            Lattice::Triangular(tri) => tri.vertices_of(id.0).into_iter().map(|v| from2(v, 0.0)).collect(),
        }
    }

    /// Cells on the selected boundary, sorted by id.  Empty for periodic
    /// grids.
    pub fn boundary_cells(&self, which: BoundarySelect) -> SpaceResult<Vec<CellId>> {
        let raw = match &self.lattice {
            Lattice::Square(sq) => sq.boundary_cells(which)?,
            Lattice::Hexagonal(hex) => hex.boundary_cells(which)?,
            Lattice::Triangular(tri) => tri.boundary_cells(which)?,
        };
        Ok(raw.into_iter().map(CellId).collect())
    }

    // ── Neighborhood ──────────────────────────────────────────────────────────

    /// Neighbours of `id` under the active neighborhood, sorted by id.
    /// Empty for an id outside the grid.
    #[inline]
    pub fn neighbors_of(&self, id: CellId) -> Vec<CellId> {
        if id.index() >= self.num_cells() {
            return Vec::new();
        }
        (self.neighbors_fn)(self, id)
    }

    /// Validate `nb` against this grid and make it the active neighborhood.
    ///
    /// On error the previous neighborhood stays active.
    pub fn set_neighborhood(&mut self, nb: Neighborhood) -> SpaceResult<()> {
        use NeighborhoodMode as M;

        if nb.mode != M::Empty && nb.distance == 0 {
            return Err(SpaceError::InvalidNeighborhood(format!(
                "neighborhood distance must be at least 1 for mode {}",
                nb.mode
            )));
        }

        let f: NeighborFn<DIM> = match (&self.lattice, nb.mode) {
            (_, M::Empty) => nb_empty::<DIM>,
            (Lattice::Square(sq), M::VonNeumann) => {
                sq.check_distance(nb.distance)?;
                nb_square_von_neumann::<DIM>
            }
            (Lattice::Square(sq), M::Moore) => {
                sq.check_distance(nb.distance)?;
                nb_square_moore::<DIM>
            }
            (Lattice::Hexagonal(_), M::Hexagonal) => {
                require_unit_distance(nb, GridStructure::Hexagonal)?;
                nb_hexagonal::<DIM>
            }
            (Lattice::Triangular(_), M::VonNeumann) => {
                require_unit_distance(nb, GridStructure::Triangular)?;
                nb_triangular_von_neumann::<DIM>
            }
            (Lattice::Triangular(_), M::Moore) => {
                require_unit_distance(nb, GridStructure::Triangular)?;
                nb_triangular_moore::<DIM>
            }
            (_, mode) => {
                return Err(SpaceError::InvalidNeighborhood(format!(
                    "neighborhood mode `{mode}` is not available on {} grids",
                    self.structure()
                )));
            }
        };

        self.neighborhood = nb;
        self.neighbors_fn = f;
        tracing::debug!(target: CORE, neighborhood = %nb, "neighborhood selected");
        Ok(())
    }

    /// Read a `neighborhood` configuration node and apply it.
    pub fn set_neighborhood_from_config(&mut self, cfg: &Config) -> SpaceResult<()> {
        self.set_neighborhood(Neighborhood::from_config(cfg)?)
    }
}

// ── Neighborhood functions ────────────────────────────────────────────────────

fn require_unit_distance(nb: Neighborhood, structure: GridStructure) -> SpaceResult<()> {
    if nb.distance != 1 {
        return Err(SpaceError::Unimplemented(format!(
            "{} neighborhood with distance {} on {structure} grids",
            nb.mode, nb.distance
        )));
    }
    Ok(())
}

fn to_ids(raw: Vec<u32>) -> Vec<CellId> {
    raw.into_iter().map(CellId).collect()
}

fn nb_empty<const DIM: usize>(_: &Grid<DIM>, _: CellId) -> Vec<CellId> {
    Vec::new()
}

fn nb_square_von_neumann<const DIM: usize>(g: &Grid<DIM>, id: CellId) -> Vec<CellId> {
    match &g.lattice {
        Lattice::Square(sq) => to_ids(sq.neighbors_von_neumann(id.0, g.neighborhood.distance)),
        _ => Vec::new(),
    }
}

fn nb_square_moore<const DIM: usize>(g: &Grid<DIM>, id: CellId) -> Vec<CellId> {
    match &g.lattice {
        Lattice::Square(sq) => to_ids(sq.neighbors_moore(id.0, g.neighborhood.distance)),
        _ => Vec::new(),
    }
}

fn nb_hexagonal<const DIM: usize>(g: &Grid<DIM>, id: CellId) -> Vec<CellId> {
    match &g.lattice {
        Lattice::Hexagonal(hex) => to_ids(hex.neighbors(id.0)),
        _ => Vec::new(),
    }
}

fn nb_triangular_von_neumann<const DIM: usize>(g: &Grid<DIM>, id: CellId) -> Vec<CellId> {
    match &g.lattice {
        Lattice::Triangular(tri) => to_ids(tri.neighbors_von_neumann(id.0)),
        _ => Vec::new(),
    }
}

fn nb_triangular_moore<const DIM: usize>(g: &Grid<DIM>, id: CellId) -> Vec<CellId> {
    match &g.lattice {
        Lattice::Triangular(tri) => to_ids(tri.neighbors_moore(id.0)),
        _ => Vec::new(),
    }
}

// ── 2D helpers ────────────────────────────────────────────────────────────────

fn planar_extent<const DIM: usize>(space: &Space<DIM>, structure: GridStructure) -> SpaceResult<[f64; 2]> {
    if DIM != 2 {
        return Err(SpaceError::InvalidConfig(format!(
            "{structure} grids are only available in 2D, not in {DIM}D"
        )));
    }
    Ok(to2(space.extent()))
}

/// Only called on 2D grids (checked at construction).
#[inline]
fn to2<const DIM: usize>(p: &[f64; DIM]) -> [f64; 2] {
    [p[0], p[1]]
}

#[inline]
fn from2<T: Copy, const DIM: usize>(v: [T; 2], fill: T) -> [T; DIM] {
    let mut out = [fill; DIM];
    for (o, x) in out.iter_mut().zip(v) {
        *o = x;
    }
    out
}
