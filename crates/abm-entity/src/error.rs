//! Entity-layer error type.

use thiserror::Error;

use abm_core::{AgentId, CellId, CoreError};
use abm_space::SpaceError;

/// Errors produced by cell and agent managers and by selection.
#[derive(Debug, Error)]
pub enum EntityError {
    /// A cell id outside the manager, or a loaded value outside the state
    /// domain.
    #[error("invalid state for {cell}: {reason}")]
    InvalidCellState { cell: CellId, reason: String },

    /// The agent is not (or no longer) managed by this manager.
    #[error("{0} is not managed by this agent manager")]
    InvalidAgent(AgentId),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid entity configuration: {0}")]
    InvalidConfig(String),

    /// Geometry failures: `OutOfSpace`, `InvalidNeighborhood`, ...
    #[error(transparent)]
    Space(#[from] SpaceError),

    #[error(transparent)]
    Config(#[from] CoreError),
}

impl EntityError {
    /// `true` for positions outside a non-periodic space.
    pub fn is_out_of_space(&self) -> bool {
        matches!(self, EntityError::Space(SpaceError::OutOfSpace { .. }))
    }
}

pub type EntityResult<T> = Result<T, EntityError>;
