//! `abm-rule` — applying rules to cells and agents.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                          |
//! |--------------|-------------------------------------------------------------------|
//! | [`target`]   | `RuleTarget` trait, implemented for `CellManager`, `AgentManager` |
//! | [`policy`]   | `Update`, `Shuffle`, `ExecPolicy`, `ParallelSettings`             |
//! | [`dispatch`] | `apply_rule`, `apply_rule_on_all`, `apply_rule_par`, `apply_rule_with_rng` |
//!
//! # Feature flags
//!
//! | Flag       | Effect                                                    |
//! |------------|-----------------------------------------------------------|
//! | `parallel` | Evaluate rules on the Rayon pool under `ExecPolicy::Parallel`. |
//!
//! Rules must not add or remove entities.  Adding and removing is a separate
//! phase between dispatches.

pub mod dispatch;
pub mod policy;
pub mod target;

#[cfg(test)]
mod tests;

pub use dispatch::{apply_rule, apply_rule_on_all, apply_rule_par, apply_rule_with_rng};
pub use policy::{ExecPolicy, ParallelSettings, Shuffle, Update};
pub use target::{IdOf, RuleTarget, StateOf};
