use thiserror::Error;

use abm_core::CoreError;
use abm_entity::EntityError;
use abm_output::OutputError;
use abm_space::SpaceError;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("simulation configuration error: {0}")]
    Config(String),

    /// A stop signal was observed between steps; `epilog` has run.
    #[error("stop requested by signal {0}")]
    StopRequested(i32),

    #[error("could not install signal handlers: {0}")]
    Signal(std::io::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Space(#[from] SpaceError),

    #[error(transparent)]
    Entity(#[from] EntityError),

    /// Storage and data-manager failures are fatal to the run.
    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SimError {
    /// Process exit status for this error: `128 + |signum|` after a stop
    /// signal, `1` otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            SimError::StopRequested(sig) => 128 + sig.abs(),
            _ => 1,
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;
