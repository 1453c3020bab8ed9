//! Dispatch policies: update mode, shuffling, and the execution policy.

use serde::Deserialize;

use abm_core::log::CORE;
use abm_core::{Config, CoreResult};
use abm_entity::{EntityTraits, UpdateMode};

/// How new states are written back.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Update {
    /// Evaluate every entity against the pre-dispatch snapshot, then commit.
    Sync,
    /// Write each new state immediately; later entities see it.
    Async,
}

impl Update {
    /// The update mode an entity type declares.
    pub fn of<T: EntityTraits>() -> Self {
        T::MODE.into()
    }
}

impl From<UpdateMode> for Update {
    fn from(mode: UpdateMode) -> Self {
        match mode {
            UpdateMode::Sync => Update::Sync,
            UpdateMode::Async => Update::Async,
        }
    }
}

/// Whether entities are visited in a random permutation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Shuffle {
    #[default]
    Off,
    On,
}

// ── Execution policy ──────────────────────────────────────────────────────────

/// Sequential or data-parallel rule evaluation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum ExecPolicy {
    #[default]
    Sequential,
    Parallel,
}

impl ExecPolicy {
    /// `true` if dispatches under this policy actually run on the Rayon pool.
    #[inline]
    pub fn runs_parallel(self) -> bool {
        cfg!(feature = "parallel") && self == ExecPolicy::Parallel
    }
}

/// The `parallel_execution` configuration node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ParallelSettings {
    #[serde(default)]
    pub enabled:     bool,
    /// Size of the global pool; Rayon's default (one per core) if absent.
    #[serde(default)]
    pub num_threads: Option<usize>,
}

impl ParallelSettings {
    /// Read `parallel_execution` from a root configuration node.  Absent
    /// means disabled.
    pub fn from_config(root: &Config) -> CoreResult<Self> {
        root.get_as_or("parallel_execution", ParallelSettings::default())
    }

    /// Resolve to an execution policy, installing the global Rayon pool the
    /// first time parallel execution is enabled.
    pub fn install(&self) -> ExecPolicy {
        if !self.enabled {
            return ExecPolicy::Sequential;
        }
        #[cfg(feature = "parallel")]
        {
            let mut builder = rayon::ThreadPoolBuilder::new();
            if let Some(n) = self.num_threads {
                builder = builder.num_threads(n);
            }
            match builder.build_global() {
                Ok(()) => tracing::info!(
                    target: CORE,
                    threads = rayon::current_num_threads(),
                    "parallel execution enabled"
                ),
                Err(e) => tracing::debug!(target: CORE, "global thread pool already set up: {e}"),
            }
            ExecPolicy::Parallel
        }
        #[cfg(not(feature = "parallel"))]
        {
            tracing::warn!(
                target: CORE,
                "parallel_execution.enabled is set but abm-rule was built without \
                 the `parallel` feature; running sequentially"
            );
            ExecPolicy::Sequential
        }
    }
}
