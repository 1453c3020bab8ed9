//! `abm-core` — foundational types for the `rust_abm` simulation framework.
//!
//! This crate is a dependency of every other `abm-*` crate.  It has no
//! `abm-*` dependencies.
//!
//! # What lives here
//!
//! | Module          | Contents                                              |
//! |-----------------|-------------------------------------------------------|
//! | [`ids`]         | `CellId`, `AgentId`                                   |
//! | [`time`]        | `Tick`                                                |
//! | [`rng`]         | `SimRng` (shared model RNG), `EntityRng` (per-entity) |
//! | [`config`]      | `Config` facade over the YAML configuration tree      |
//! | [`log`]         | tracing channels and subscriber setup                 |
//! | [`error`]       | `CoreError`, `CoreResult`                             |

pub mod config;
pub mod error;
pub mod ids;
pub mod log;
pub mod rng;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::{Config, get_as, get_as_or};
pub use error::{CoreError, CoreResult};
pub use ids::{AgentId, CellId};
pub use log::{LogLevel, LogLevels, LogPattern, LogSettings, init_logging};
pub use rng::{EntityRng, SharedRng, SimRng};
pub use time::Tick;
