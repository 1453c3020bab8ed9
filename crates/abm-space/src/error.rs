//! Spatial-subsystem error type.

use thiserror::Error;

use abm_core::{CellId, CoreError};

/// Errors produced by `abm-space`.
#[derive(Debug, Error)]
pub enum SpaceError {
    #[error("invalid space or grid configuration: {0}")]
    InvalidConfig(String),

    #[error("position {position:?} lies outside the non-periodic space")]
    OutOfSpace { position: Vec<f64> },

    #[error("invalid neighborhood: {0}")]
    InvalidNeighborhood(String),

    #[error("not implemented: {0}")]
    Unimplemented(String),

    #[error("{0} is not a cell of this grid")]
    InvalidCell(CellId),

    #[error(transparent)]
    Config(#[from] CoreError),
}

pub type SpaceResult<T> = Result<T, SpaceError>;
