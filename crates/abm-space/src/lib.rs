//! `abm-space` — the continuous simulation domain and its discretisations.
//!
//! # Crate layout
//!
//! | Module           | Contents                                                  |
//! |------------------|-----------------------------------------------------------|
//! | [`space`]        | `Space<DIM>`, `Position<DIM>`, `Norm`                     |
//! | [`grid`]         | `Grid<DIM>` over square, hexagonal, triangular lattices   |
//! | [`neighborhood`] | `Neighborhood`, `NeighborhoodMode`                        |
//! | [`boundary`]     | `BoundarySelect`                                          |
//! | [`error`]        | `SpaceError`, `SpaceResult<T>`                            |
//!
//! Grids know nothing about cell or agent state; they map positions to ids
//! and ids to geometry.  Entity storage lives in `abm-entity`.

pub mod boundary;
pub mod error;
pub mod grid;
pub mod neighborhood;
pub mod space;

#[cfg(test)]
mod tests;

pub use boundary::BoundarySelect;
pub use error::{SpaceError, SpaceResult};
pub use grid::{Grid, GridConfig, GridStructure, HexLattice, NeighborFn, TriLattice};
pub use neighborhood::{Neighborhood, NeighborhoodMode};
pub use space::{Norm, Position, Space};
