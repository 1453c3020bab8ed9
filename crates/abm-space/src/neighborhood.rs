//! Neighborhood modes and their configuration.
//!
//! A [`Neighborhood`] is only a description; the grid resolves it to the
//! structure-specific lookup function in [`Grid::set_neighborhood`], which is
//! also where unsupported `(mode, structure)` pairs are rejected.
//!
//! [`Grid::set_neighborhood`]: crate::Grid::set_neighborhood

use std::fmt;

use serde::Deserialize;

use abm_core::Config;

use crate::SpaceResult;

/// Which cells count as neighbours.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, Default)]
pub enum NeighborhoodMode {
    /// No neighbours at all.
    #[default]
    #[serde(rename = "empty")]
    Empty,
    /// Square: cells within Manhattan distance `d`.  Triangular: the three
    /// edge-sharing cells.
    #[serde(rename = "vonNeumann")]
    VonNeumann,
    /// Square: cells within Chebyshev distance `d`.  Triangular: the twelve
    /// vertex-sharing cells.
    #[serde(rename = "Moore")]
    Moore,
    /// Hexagonal: the six edge-sharing cells.
    #[serde(rename = "hexagonal")]
    Hexagonal,
}

impl fmt::Display for NeighborhoodMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NeighborhoodMode::Empty => "empty",
            NeighborhoodMode::VonNeumann => "vonNeumann",
            NeighborhoodMode::Moore => "Moore",
            NeighborhoodMode::Hexagonal => "hexagonal",
        };
        f.write_str(name)
    }
}

/// A neighborhood mode plus its distance parameter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Neighborhood {
    pub mode:     NeighborhoodMode,
    /// Lattice distance, `>= 1`.  Ignored by `empty`.
    pub distance: u32,
}

impl Default for Neighborhood {
    fn default() -> Self {
        Self::empty()
    }
}

impl Neighborhood {
    pub const fn new(mode: NeighborhoodMode, distance: u32) -> Self {
        Self { mode, distance }
    }

    pub const fn empty() -> Self {
        Self::new(NeighborhoodMode::Empty, 1)
    }

    pub const fn von_neumann(distance: u32) -> Self {
        Self::new(NeighborhoodMode::VonNeumann, distance)
    }

    pub const fn moore(distance: u32) -> Self {
        Self::new(NeighborhoodMode::Moore, distance)
    }

    pub const fn hexagonal() -> Self {
        Self::new(NeighborhoodMode::Hexagonal, 1)
    }

    /// Read `mode` (default `empty`) and `distance` (default 1).
    pub fn from_config(cfg: &Config) -> SpaceResult<Self> {
        let mode = cfg.get_as_or("mode", NeighborhoodMode::Empty)?;
        let distance = cfg.get_as_or("distance", 1u32)?;
        Ok(Self { mode, distance })
    }
}

impl fmt::Display for Neighborhood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (distance {})", self.mode, self.distance)
    }
}
