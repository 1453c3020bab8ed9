//! predator_prey — a cellular predator-prey model on the rust_abm framework.
//!
//! Every cell hosts at most one predator and one prey, each carrying a
//! resource budget.  Per step:
//!
//! 1. every creature pays its `cost_of_living` and dies at zero resources
//! 2. predators without prey move towards neighbouring prey, else to a
//!    random neighbour free of predators; prey sharing a cell with a
//!    predator flee to a neighbour that is empty
//! 3. predators eat the prey on their cell, lone prey graze
//! 4. creatures with enough resources reproduce onto a free neighbour
//!
//! The model writes four cell-bound datasets per write step: `predator`,
//! `prey`, `resource_predator`, and `resource_prey`.  See
//! `predator_prey.yml` for a complete configuration.

pub mod model;
pub mod params;
pub mod state;


pub use model::PredatorPrey;
pub use params::{InitialResources, InitialState, Params, SpeciesParams};
pub use state::{CellState, Creature, PpCell, Species};
