//! Entity traits, the common entity interface, and state-init policies.
//!
//! An entity type is described by one [`EntityTraits`] implementation:
//!
//! ```
//! use abm_entity::{EntityTraits, UpdateMode};
//!
//! struct Forest;
//! impl EntityTraits for Forest {
//!     type State = u8;
//!     type Tags  = ();
//!     const MODE: UpdateMode = UpdateMode::Sync;
//! }
//! ```
//!
//! `Sync` entities carry a shadow buffer (`state_next`) that rule dispatch
//! writes into and a separate commit pass copies over; `Async` entities are
//! updated in place.

use abm_core::{Config, CoreResult, SimRng};

use crate::{EntityError, EntityResult};

// ── UpdateMode ────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UpdateMode {
    /// Every rule in a dispatch sees the pre-dispatch snapshot.
    Sync,
    /// Each entity sees whatever was already written before it.
    Async,
}

// ── EntityTraits ──────────────────────────────────────────────────────────────

/// Type-level description of a cell or agent kind.
pub trait EntityTraits: 'static {
    type State: Clone;
    /// Free-form per-entity data not touched by rule dispatch.
    type Tags: Default + Clone;
    const MODE: UpdateMode;
}

// ── Entity ────────────────────────────────────────────────────────────────────

/// What rule dispatch needs from a stored cell or agent.
pub trait Entity {
    type Traits: EntityTraits;
    type Id: Copy + Eq + std::fmt::Debug;

    fn id(&self) -> Self::Id;
    fn state(&self) -> &<Self::Traits as EntityTraits>::State;
    fn set_state(&mut self, state: <Self::Traits as EntityTraits>::State);
    fn set_state_next(&mut self, state: <Self::Traits as EntityTraits>::State);
    /// Move the shadow buffer into place.  No-op if nothing is pending.
    fn commit(&mut self);
}

// ── StateInit ─────────────────────────────────────────────────────────────────

/// Constructor reading a parameter node and drawing from the model RNG.
pub type ConfigRngCtor<S> = Box<dyn Fn(&Config, &mut SimRng) -> EntityResult<S>>;
/// Constructor reading a parameter node only.
pub type ConfigCtor<S> = Box<dyn Fn(&Config) -> EntityResult<S>>;

/// How a manager produces the initial state of its entities.
///
/// Exactly one policy is chosen per manager.  The config-based policies
/// require the parameter node (`cell_params` / `agent_params`) and fail at
/// setup if it is missing.
pub enum StateInit<S> {
    /// Cloned into every slot.
    Explicit(S),
    /// Called once per entity, so states can differ.
    ConfigWithRng(ConfigRngCtor<S>),
    /// Called once; the result is cloned into every slot.
    ConfigOnly(ConfigCtor<S>),
    /// The state type's default constructor.
    Default(fn() -> S),
}

impl<S: Clone> StateInit<S> {
    pub fn explicit(state: S) -> Self {
        StateInit::Explicit(state)
    }

    pub fn config_with_rng(f: impl Fn(&Config, &mut SimRng) -> EntityResult<S> + 'static) -> Self {
        StateInit::ConfigWithRng(Box::new(f))
    }

    pub fn config_only(f: impl Fn(&Config) -> EntityResult<S> + 'static) -> Self {
        StateInit::ConfigOnly(Box::new(f))
    }

    pub fn default_state() -> Self
    where
        S: Default,
    {
        StateInit::Default(S::default)
    }

    pub fn policy_name(&self) -> &'static str {
        match self {
            StateInit::Explicit(_) => "explicit",
            StateInit::ConfigWithRng(_) => "config_with_rng",
            StateInit::ConfigOnly(_) => "config_only",
            StateInit::Default(_) => "default",
        }
    }

    /// Produce `n` states.  `params` is only consulted by the config
    /// policies.
    pub fn build(
        &self,
        n: usize,
        params: impl FnOnce() -> CoreResult<Config>,
        rng: &mut SimRng,
    ) -> EntityResult<Vec<S>> {
        Ok(match self {
            StateInit::Explicit(s) => vec![s.clone(); n],
            StateInit::Default(f) => vec![f(); n],
            StateInit::ConfigOnly(f) => {
                let params = params()?;
                vec![f(&params)?; n]
            }
            StateInit::ConfigWithRng(f) => {
                let params = params()?;
                (0..n).map(|_| f(&params, rng)).collect::<EntityResult<Vec<S>>>()?
            }
        })
    }

    /// Produce a single state.
    pub fn build_one(&self, params: impl FnOnce() -> CoreResult<Config>, rng: &mut SimRng) -> EntityResult<S> {
        self.build(1, params, rng)?
            .pop()
            .ok_or_else(|| EntityError::InvalidArgument("state constructor produced no state".into()))
    }
}
