//! Rule dispatch.
//!
//! A rule maps an entity (plus a shared view of its manager) to the entity's
//! new state; it never mutates anything itself.  Every entry point here is
//! one independent dispatch:
//!
//! | Update | Evaluation                          | Write-back                      |
//! |--------|-------------------------------------|---------------------------------|
//! | Sync   | all entities, against the snapshot  | `state_next`, then one commit   |
//! | Async  | one entity at a time                | `state` immediately             |
//!
//! Shuffling permutes the evaluation order only.  Under `Sync` it cannot
//! change the result; it still consumes the RNG so that streams do not
//! depend on the update mode.
//!
//! # Parallel dispatch
//!
//! [`apply_rule_par`] and [`apply_rule_with_rng`] evaluate on the Rayon pool
//! when the policy [`runs_parallel`](ExecPolicy::runs_parallel).  Parallel
//! evaluation always reads the pre-dispatch snapshot, so an async parallel
//! dispatch equals a sync one; it is only equivalent to the sequential
//! async path for rules that do not look at other entities' states.
//! Rules that need randomness on the pool use [`apply_rule_with_rng`],
//! which hands every entity its own [`EntityRng`].

use abm_core::log::CORE;
use abm_core::{EntityRng, SimRng};
use abm_entity::{Entity, EntityResult};

use crate::policy::{ExecPolicy, Shuffle, Update};
use crate::target::{IdOf, RuleTarget, StateOf};

// ── Sequential ────────────────────────────────────────────────────────────────

/// Apply `rule` to the entities `ids` of `target`.
///
/// Fails before touching any state if an id is not managed by `target`.
/// An id listed more than once is visited once, at its first position.
pub fn apply_rule<R, F>(
    update: Update,
    shuffle: Shuffle,
    rule: F,
    ids: &[IdOf<R>],
    target: &mut R,
    rng: &mut SimRng,
) -> EntityResult<()>
where
    R: RuleTarget,
    F: Fn(&R::Entity, &R) -> StateOf<R>,
{
    let mut order = slots(target, ids)?;
    if shuffle == Shuffle::On {
        rng.shuffle(&mut order);
    }
    run_sequential(update, &rule, &order, target);
    tracing::trace!(target: CORE, entities = order.len(), ?update, ?shuffle, "rule applied");
    Ok(())
}

/// Apply `rule` to every entity of `target`.
pub fn apply_rule_on_all<R, F>(update: Update, shuffle: Shuffle, rule: F, target: &mut R, rng: &mut SimRng)
where
    R: RuleTarget,
    F: Fn(&R::Entity, &R) -> StateOf<R>,
{
    let mut order: Vec<usize> = (0..target.entities().len()).collect();
    if shuffle == Shuffle::On {
        rng.shuffle(&mut order);
    }
    run_sequential(update, &rule, &order, target);
    tracing::trace!(target: CORE, entities = order.len(), ?update, ?shuffle, "rule applied to all");
}

fn run_sequential<R, F>(update: Update, rule: &F, order: &[usize], target: &mut R)
where
    R: RuleTarget,
    F: Fn(&R::Entity, &R) -> StateOf<R>,
{
    match update {
        Update::Sync => {
            let states: Vec<StateOf<R>> = {
                let view: &R = target;
                order.iter().map(|&s| rule(&view.entities()[s], view)).collect()
            };
            write_back(Update::Sync, order, states, target);
        }
        Update::Async => {
            for &s in order {
                let state = rule(&target.entities()[s], target);
                target.entities_mut()[s].set_state(state);
            }
        }
    }
}

// ── Parallel ──────────────────────────────────────────────────────────────────

/// Like [`apply_rule`] without shuffling, evaluated under `policy`.
///
/// A sequential policy takes exactly the [`apply_rule`] path.
pub fn apply_rule_par<R, F>(
    policy: ExecPolicy,
    update: Update,
    rule: F,
    ids: &[IdOf<R>],
    target: &mut R,
) -> EntityResult<()>
where
    R: RuleTarget + Sync,
    R::Entity: Sync,
    StateOf<R>: Send,
    F: Fn(&R::Entity, &R) -> StateOf<R> + Sync,
{
    let order = slots(target, ids)?;
    if !policy.runs_parallel() {
        run_sequential(update, &rule, &order, target);
        return Ok(());
    }
    let states = {
        let view: &R = target;
        evaluate(policy, &order, |s| rule(&view.entities()[s], view))
    };
    write_back(update, &order, states, target);
    tracing::trace!(target: CORE, entities = order.len(), ?update, "rule applied in parallel");
    Ok(())
}

/// Apply a rule that draws random numbers.
///
/// One step seed is drawn from `rng`; entity `e` gets
/// `EntityRng::for_entity(step_seed, key(e))`, so the outcome does not
/// depend on thread scheduling.  Sequential async dispatch writes in place;
/// every other combination evaluates against the snapshot.
pub fn apply_rule_with_rng<R, F>(
    policy: ExecPolicy,
    update: Update,
    rule: F,
    ids: &[IdOf<R>],
    target: &mut R,
    rng: &mut SimRng,
) -> EntityResult<()>
where
    R: RuleTarget + Sync,
    R::Entity: Sync,
    StateOf<R>: Send,
    F: Fn(&R::Entity, &R, &mut EntityRng) -> StateOf<R> + Sync,
{
    let order = slots(target, ids)?;
    let step_seed = rng.next_seed();

    if update == Update::Async && !policy.runs_parallel() {
        for &s in &order {
            let entity = &target.entities()[s];
            let mut erng = EntityRng::for_entity(step_seed, R::rng_key(entity));
            let state = rule(entity, target, &mut erng);
            target.entities_mut()[s].set_state(state);
        }
    } else {
        let states = {
            let view: &R = target;
            evaluate(policy, &order, |s| {
                let entity = &view.entities()[s];
                let mut erng = EntityRng::for_entity(step_seed, R::rng_key(entity));
                rule(entity, view, &mut erng)
            })
        };
        write_back(update, &order, states, target);
    }
    tracing::trace!(target: CORE, entities = order.len(), ?update, ?policy, "random rule applied");
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Slots of `ids`, first occurrence only, so a repeated id is visited once.
fn slots<R: RuleTarget>(target: &R, ids: &[IdOf<R>]) -> EntityResult<Vec<usize>> {
    let mut seen = vec![false; target.entities().len()];
    let mut order = Vec::with_capacity(ids.len());
    for &id in ids {
        let slot = target.slot_of(id)?;
        if !std::mem::replace(&mut seen[slot], true) {
            order.push(slot);
        }
    }
    Ok(order)
}

/// Evaluate `f` for every slot, in order, on the pool if allowed.
fn evaluate<S, F>(policy: ExecPolicy, order: &[usize], f: F) -> Vec<S>
where
    S: Send,
    F: Fn(usize) -> S + Sync,
{
    #[cfg(feature = "parallel")]
    {
        if policy.runs_parallel() {
            use rayon::prelude::*;
            return order.par_iter().map(|&s| f(s)).collect();
        }
    }
    #[cfg(not(feature = "parallel"))]
    let _ = policy;
    order.iter().map(|&s| f(s)).collect()
}

fn write_back<R: RuleTarget>(update: Update, order: &[usize], states: Vec<StateOf<R>>, target: &mut R) {
    let entities = target.entities_mut();
    match update {
        Update::Sync => {
            for (&s, state) in order.iter().zip(states) {
                entities[s].set_state_next(state);
            }
            for &s in order {
                entities[s].commit();
            }
        }
        Update::Async => {
            for (&s, state) in order.iter().zip(states) {
                entities[s].set_state(state);
            }
        }
    }
}
