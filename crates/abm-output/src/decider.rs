//! Deciders and triggers.
//!
//! Both are per-step predicates over the model: a decider says whether a
//! task writes data this step, a trigger whether it opens a new dataset.
//! They share one contract, `FnMut(&M) -> bool`, and the same set of
//! built-in types:
//!
//! | `type`     | `args`                                       | True at time `t` when           |
//! |------------|----------------------------------------------|---------------------------------|
//! | `always`   |                                              | always                          |
//! | `never`    |                                              | never                           |
//! | `once`     | `time`                                       | `t == time`                     |
//! | `interval` | `intervals: [[start, stop, step?], ...]`     | in any `[start, stop)` on step  |
//! | `every`    | `every`, `start?` (0), `stop?` (unbounded)   | `t ≥ start`, `t < stop`, on step |
//!
//! Further types can be registered in a [`ConditionTable`].

use std::collections::BTreeMap;

use serde::Deserialize;

use abm_core::{Config, Tick};

use crate::{OutputError, OutputResult};

/// Access to the model time for the built-in conditions.
pub trait Clock {
    fn time(&self) -> Tick;
}

/// Whether a task writes this step.
pub type Decider<M> = Box<dyn FnMut(&M) -> bool>;

/// Whether a task builds a new active dataset this step.
pub type Trigger<M> = Box<dyn FnMut(&M) -> bool>;

// ── Built-in conditions ───────────────────────────────────────────────────────

/// A time-based condition as configured by one of the built-in types.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Always,
    Never,
    Once(Tick),
    /// `(start, stop, step)`, stop exclusive.
    Intervals(Vec<(u64, u64, u64)>),
    Every { every: u64, start: u64, stop: Option<u64> },
}

#[derive(Deserialize)]
struct EveryArgs {
    every: u64,
    #[serde(default)]
    start: u64,
    #[serde(default)]
    stop:  Option<u64>,
}

impl Condition {
    /// `true` if the condition holds at `t`.
    pub fn holds(&self, t: Tick) -> bool {
        let t = t.0;
        match self {
            Condition::Always => true,
            Condition::Never => false,
            Condition::Once(at) => t == at.0,
            Condition::Intervals(ranges) => ranges
                .iter()
                .any(|&(start, stop, step)| t >= start && t < stop && (t - start) % step == 0),
            Condition::Every { every, start, stop } => {
                t >= *start && stop.map_or(true, |s| t < s) && (t - start) % every == 0
            }
        }
    }

    /// Build one of the built-in types from its `args` node.
    pub fn from_args(type_name: &str, args: &Config) -> OutputResult<Self> {
        match type_name {
            "always" => Ok(Condition::Always),
            "never" => Ok(Condition::Never),
            "once" => Ok(Condition::Once(Tick(args.get_as("time")?))),
            "interval" => {
                let raw: Vec<Vec<u64>> = args.get_as("intervals")?;
                let ranges = raw
                    .into_iter()
                    .map(|r| match r.as_slice() {
                        &[start, stop] => Ok((start, stop, 1)),
                        &[start, stop, step] if step > 0 => Ok((start, stop, step)),
                        _ => Err(OutputError::InvalidConfig(format!(
                            "interval {r:?} must be [start, stop] or [start, stop, step > 0]"
                        ))),
                    })
                    .collect::<OutputResult<Vec<_>>>()?;
                Ok(Condition::Intervals(ranges))
            }
            "every" => {
                let a: EveryArgs = args.deserialize()?;
                if a.every == 0 {
                    return Err(OutputError::InvalidConfig("`every` must be positive".into()));
                }
                Ok(Condition::Every { every: a.every, start: a.start, stop: a.stop })
            }
            other => Err(OutputError::InvalidConfig(format!("unknown condition type `{other}`"))),
        }
    }

    /// As a boxed decider or trigger.
    pub fn into_fn<M: Clock>(self) -> Box<dyn FnMut(&M) -> bool> {
        Box::new(move |m: &M| self.holds(m.time()))
    }
}

// ── Factory table ─────────────────────────────────────────────────────────────

/// Constructs a decider or trigger from its `args` node.
pub type ConditionFactory<M> = Box<dyn Fn(&Config) -> OutputResult<Box<dyn FnMut(&M) -> bool>>>;

/// Known decider/trigger types, looked up by the `type` key of a
/// configuration entry (or by the entry's name if `type` is absent).
pub struct ConditionTable<M> {
    factories: BTreeMap<String, ConditionFactory<M>>,
}

impl<M: Clock + 'static> Default for ConditionTable<M> {
    fn default() -> Self {
        let mut table = Self { factories: BTreeMap::new() };
        for name in ["always", "never", "once", "interval", "every"] {
            table.register(name, move |args| Ok(Condition::from_args(name, args)?.into_fn()));
        }
        table
    }
}

impl<M: 'static> ConditionTable<M> {
    /// A table without any types.
    pub fn empty() -> Self {
        Self { factories: BTreeMap::new() }
    }

    /// Add or replace the type `name`.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&Config) -> OutputResult<Box<dyn FnMut(&M) -> bool>> + 'static,
    {
        self.factories.insert(name.to_owned(), Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Build the entry `name: {type?, args?}`.
    pub fn build(&self, name: &str, entry: &Config) -> OutputResult<Box<dyn FnMut(&M) -> bool>> {
        let type_name: String = entry.get_as_or("type", name.to_owned())?;
        let factory = self.factories.get(&type_name).ok_or_else(|| {
            OutputError::InvalidConfig(format!("`{name}` has unknown type `{type_name}`"))
        })?;
        factory(&entry.get_sub_or_empty("args"))
    }
}
