//! `abm-entity` — cells, agents, and the managers that own them.
//!
//! # Crate layout
//!
//! | Module     | Contents                                                       |
//! |------------|----------------------------------------------------------------|
//! | [`traits`] | `EntityTraits`, `UpdateMode`, `Entity`, `StateInit`            |
//! | [`cell`]   | `Cell`, `CellManager` (grid + dense cell arena)                |
//! | [`agent`]  | `Agent`, `AgentArena` (id-stable), `AgentManager`              |
//! | [`select`] | sample / probability / boundary / lanes / clustered selection  |
//! | [`error`]  | `EntityError`, `EntityResult<T>`                               |
//!
//! Entities are never referenced by pointer: a `CellId` is the index into
//! its manager's arena, an `AgentId` is resolved through the arena's lookup
//! table.  Neighbor relations are id lists, so periodic neighborhoods form
//! no ownership cycles.

pub mod agent;
pub mod cell;
pub mod error;
pub mod select;
pub mod traits;


pub use agent::{Agent, AgentArena, AgentManager, InitialPosition, MovePolicy};
pub use cell::{Cell, CellManager};
pub use error::{EntityError, EntityResult};
pub use select::{SelectMode, select_agents, select_cells};
pub use traits::{Entity, EntityTraits, StateInit, UpdateMode};
