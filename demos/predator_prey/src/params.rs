//! Model parameters and initial-state policies.

use std::path::PathBuf;

use serde::Deserialize;

use abm_core::{Config, SimRng};
use abm_entity::CellManager;
use abm_entity::select::sample;
use abm_sim::{SimError, SimResult};

use crate::state::{Creature, PpCell};

// ── Species ───────────────────────────────────────────────────────────────────

/// The `predator` / `prey` parameter nodes.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
pub struct SpeciesParams {
    pub cost_of_living:      f64,
    pub resource_intake:     f64,
    pub resource_max:        f64,
    pub repro_resource_requ: f64,
    pub repro_prob:          f64,
    pub repro_cost:          f64,
}

impl SpeciesParams {
    fn validate(&self, species: &str) -> SimResult<()> {
        let bad = |msg: String| Err(SimError::Config(format!("{species}: {msg}")));
        if !(0.0..=1.0).contains(&self.repro_prob) {
            return bad(format!("repro_prob must be in [0, 1], got {}", self.repro_prob));
        }
        if self.repro_cost > self.repro_resource_requ {
            return bad(format!(
                "repro_cost ({}) exceeds repro_resource_requ ({})",
                self.repro_cost, self.repro_resource_requ
            ));
        }
        if self.resource_max <= 0.0 {
            return bad(format!("resource_max must be positive, got {}", self.resource_max));
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Params {
    pub predator: SpeciesParams,
    pub prey:     SpeciesParams,
}

impl Params {
    pub fn from_config(cfg: &Config) -> SimResult<Self> {
        let predator: SpeciesParams = cfg.get_as("predator")?;
        let prey: SpeciesParams = cfg.get_as("prey")?;
        predator.validate("predator")?;
        prey.validate("prey")?;
        Ok(Self { predator, prey })
    }
}

// ── Initial state ─────────────────────────────────────────────────────────────

/// `initial_resources` inside `cell_params`.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
pub struct InitialResources {
    pub predator: f64,
    pub prey:     f64,
}

impl Default for InitialResources {
    fn default() -> Self {
        Self { predator: 2.0, prey: 2.0 }
    }
}

/// How cells are populated, selected by `cell_params.initial_state`.
#[derive(Clone, Debug, PartialEq)]
pub enum InitialState {
    /// Per cell: prey only, predator only, both, or empty, with the given
    /// probabilities.
    Random { prey_prob: f64, predator_prob: f64, predator_prey_prob: f64 },
    /// Exact shares of cells, sampled independently per species.
    Fraction { prey: f64, predator: f64 },
    /// Presence and resources from the last (or `row`-th) slice of a
    /// previous run's datasets.
    Load { path: PathBuf, row: Option<usize> },
}

impl InitialState {
    pub fn from_config(params: &Config) -> SimResult<Self> {
        let mode: String = params.get_as("initial_state")?;
        let init = match mode.as_str() {
            "random" => {
                let prey_prob: f64 = params.get_as("prey_prob")?;
                let predator_prob: f64 = params.get_as("predator_prob")?;
                let predator_prey_prob: f64 = params.get_as_or("predator_prey_prob", 0.0)?;
                let probs = [prey_prob, predator_prob, predator_prey_prob];
                if probs.iter().any(|p| !(0.0..=1.0).contains(p)) || probs.iter().sum::<f64>() > 1.0 {
                    return Err(SimError::Config(format!(
                        "initial probabilities must lie in [0, 1] and sum to at most 1, got {probs:?}"
                    )));
                }
                InitialState::Random { prey_prob, predator_prob, predator_prey_prob }
            }
            "fraction" => {
                let prey: f64 = params.get_as("prey_fraction")?;
                let predator: f64 = params.get_as("predator_fraction")?;
                if ![prey, predator].iter().all(|f| (0.0..=1.0).contains(f)) {
                    return Err(SimError::Config(format!(
                        "fractions must lie in [0, 1], got prey {prey}, predator {predator}"
                    )));
                }
                InitialState::Fraction { prey, predator }
            }
            "load" => {
                let node = params.get_sub("load_from")?;
                InitialState::Load { path: node.get_as("path")?, row: node.get_opt("row")? }
            }
            other => {
                return Err(SimError::Config(format!(
                    "unknown initial_state `{other}`; expected random, fraction or load"
                )));
            }
        };
        Ok(init)
    }

    /// Populate `cm` for the `random` and `fraction` policies.  `load` is
    /// handled by the model, which owns the storage access.
    pub fn populate(
        &self,
        cm: &mut CellManager<PpCell, 2>,
        res: InitialResources,
        rng: &mut SimRng,
    ) -> SimResult<()> {
        match *self {
            InitialState::Random { prey_prob, predator_prob, predator_prey_prob } => {
                for cell in cm.cells_mut() {
                    let u: f64 = rng.random();
                    let s = cell.state_mut();
                    if u < prey_prob {
                        s.prey = Creature::new(res.prey);
                    } else if u < prey_prob + predator_prob {
                        s.predator = Creature::new(res.predator);
                    } else if u < prey_prob + predator_prob + predator_prey_prob {
                        s.prey = Creature::new(res.prey);
                        s.predator = Creature::new(res.predator);
                    }
                }
            }
            InitialState::Fraction { prey, predator } => {
                let ids: Vec<_> = cm.ids().collect();
                let n = ids.len() as f64;
                for id in sample(&ids, (prey * n).round() as usize, rng)? {
                    cm.cell_mut(id)?.state_mut().prey = Creature::new(res.prey);
                }
                for id in sample(&ids, (predator * n).round() as usize, rng)? {
                    cm.cell_mut(id)?.state_mut().predator = Creature::new(res.predator);
                }
            }
            InitialState::Load { .. } => {}
        }
        Ok(())
    }
}
