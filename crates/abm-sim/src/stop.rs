//! Process-wide stop flag set by SIGINT, SIGTERM, and SIGUSR1.
//!
//! The handlers only store the signal number into an atomic; the model loop
//! polls it between steps and never interrupts a step.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use abm_core::log::MODEL;

use crate::SimResult;

/// Shared stop flag.  Cloning shares the underlying atomics.
#[derive(Clone, Debug, Default)]
pub struct StopFlag {
    /// Signal number of the first stop request, `0` if none.
    signum:   Arc<AtomicUsize>,
    attached: Arc<AtomicBool>,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the signal handlers.  Later calls are no-ops.
    pub fn attach(&self) -> SimResult<()> {
        if self.attached.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        #[cfg(unix)]
        {
            use signal_hook::consts::{SIGINT, SIGTERM, SIGUSR1};
            for sig in [SIGINT, SIGTERM, SIGUSR1] {
                signal_hook::flag::register_usize(sig, Arc::clone(&self.signum), sig as usize)
                    .map_err(crate::SimError::Signal)?;
            }
            tracing::debug!(target: MODEL, "stop signal handlers attached");
        }
        Ok(())
    }

    /// Request a stop as if `signum` had been delivered.
    pub fn request(&self, signum: i32) {
        let _ = self.signum.compare_exchange(0, signum.unsigned_abs() as usize, Ordering::AcqRel, Ordering::Acquire);
    }

    /// The signal that requested the stop, if any.
    pub fn requested(&self) -> Option<i32> {
        match self.signum.load(Ordering::Acquire) {
            0 => None,
            sig => Some(sig as i32),
        }
    }

    pub fn clear(&self) {
        self.signum.store(0, Ordering::Release);
    }
}
