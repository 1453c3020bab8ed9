//! Deterministic model-level and per-entity RNG wrappers.
//!
//! # Determinism strategy
//!
//! A model hierarchy shares exactly one [`SimRng`], seeded from the `seed`
//! configuration key and handed down to sub-models as a [`SharedRng`].  The
//! model loop is serial, so the shared RNG is only ever borrowed by one
//! caller at a time.
//!
//! Rules that need randomness while running on Rayon's pool cannot borrow
//! the shared RNG.  Instead the dispatcher draws one `u64` step seed from it
//! and gives each entity its own [`EntityRng`] seeded by:
//!
//!   seed = step_seed XOR (entity_id * MIXING_CONSTANT)
//!
//! The mixing constant is the 64-bit fractional part of the golden ratio,
//! which spreads consecutive ids uniformly across the seed space.  Results
//! are therefore independent of thread scheduling.

use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// 64-bit fractional golden-ratio constant for seed mixing.
const MIXING_CONSTANT: u64 = 0x9e37_79b9_7f4a_7c15;

/// The model RNG shared by every component of one model hierarchy.
pub type SharedRng = Rc<RefCell<SimRng>>;

// ── SimRng ────────────────────────────────────────────────────────────────────

/// Model-level RNG: space initialisation, shuffles, selections, random
/// agent placement.
///
/// Used only in single-threaded contexts.  If you need parallel randomness,
/// draw a step seed with [`SimRng::next_seed`] and derive [`EntityRng`]s.
pub struct SimRng(SmallRng);

impl SimRng {
    pub fn new(seed: u64) -> Self {
        SimRng(SmallRng::seed_from_u64(seed))
    }

    /// Construct and wrap for sharing across a model hierarchy.
    pub fn shared(seed: u64) -> SharedRng {
        Rc::new(RefCell::new(SimRng::new(seed)))
    }

    /// Draw a fresh seed for one parallel dispatch.
    #[inline]
    pub fn next_seed(&mut self) -> u64 {
        self.0.r#gen()
    }

    #[inline]
    pub fn inner(&mut self) -> &mut SmallRng {
        &mut self.0
    }

    #[inline]
    pub fn random<T>(&mut self) -> T
    where
        rand::distributions::Standard: rand::distributions::Distribution<T>,
    {
        self.0.r#gen()
    }

    #[inline]
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.0.gen_range(range)
    }

    /// `true` with probability `p` (clamped to [0, 1]).
    #[inline]
    pub fn gen_bool(&mut self, p: f64) -> bool {
        self.0.gen_bool(p.clamp(0.0, 1.0))
    }

    /// Shuffle a mutable slice in-place (Fisher-Yates).
    #[inline]
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        use rand::seq::SliceRandom;
        slice.shuffle(&mut self.0);
    }

    /// Choose a random element from a slice; `None` if it is empty.
    #[inline]
    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        use rand::seq::SliceRandom;
        slice.choose(&mut self.0)
    }
}

// ── EntityRng ─────────────────────────────────────────────────────────────────

/// Per-entity deterministic RNG for one dispatch.
///
/// Created on the worker thread that evaluates the entity's rule, so it is
/// never shared.  Two dispatches with the same step seed give every entity
/// the same stream.
pub struct EntityRng(SmallRng);

impl EntityRng {
    /// Seed deterministically from a dispatch's step seed and an entity id.
    pub fn for_entity(step_seed: u64, entity: u64) -> Self {
        let seed = step_seed ^ entity.wrapping_mul(MIXING_CONSTANT);
        EntityRng(SmallRng::seed_from_u64(seed))
    }

    #[inline]
    pub fn inner(&mut self) -> &mut SmallRng {
        &mut self.0
    }

    #[inline]
    pub fn random<T>(&mut self) -> T
    where
        rand::distributions::Standard: rand::distributions::Distribution<T>,
    {
        self.0.r#gen()
    }

    #[inline]
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.0.gen_range(range)
    }

    #[inline]
    pub fn gen_bool(&mut self, p: f64) -> bool {
        self.0.gen_bool(p.clamp(0.0, 1.0))
    }

    #[inline]
    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        use rand::seq::SliceRandom;
        slice.choose(&mut self.0)
    }
}
