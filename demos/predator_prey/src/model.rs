//! The `PredatorPrey` model.

use std::rc::Rc;

use abm_core::log::MODEL;
use abm_core::{CellId, SimRng};
use abm_entity::{CellManager, StateInit};
use abm_output::{Dataset, StorageFile};
use abm_rule::{Update, apply_rule_par};
use abm_sim::{Model, ModelBase, SimError, SimResult};

use crate::params::{InitialResources, InitialState, Params};
use crate::state::{CellState, Creature, PpCell, Species};

type Cm = CellManager<PpCell, 2>;

/// The four cell-bound output datasets.
struct Datasets {
    predator:          Dataset,
    prey:              Dataset,
    resource_predator: Dataset,
    resource_prey:     Dataset,
}

impl Datasets {
    fn create(base: &ModelBase, cm: &Cm) -> SimResult<Self> {
        Ok(Self {
            predator:          base.create_cm_dset("predator", cm)?,
            prey:              base.create_cm_dset("prey", cm)?,
            resource_predator: base.create_cm_dset("resource_predator", cm)?,
            resource_prey:     base.create_cm_dset("resource_prey", cm)?,
        })
    }
}

/// Predators and prey on a grid, at most one of each per cell.
///
/// One step runs cost of living, movement, eating, and reproduction, in
/// that order.  Cost of living and eating only look at the cell itself and
/// go through the rule dispatcher; movement and reproduction change two
/// cells at once and run as shuffled passes over all cells.
pub struct PredatorPrey {
    base:     ModelBase,
    cm:       Cm,
    params:   Params,
    all_ids:  Vec<CellId>,
    datasets: Datasets,
}

impl PredatorPrey {
    pub const NAME: &'static str = "PredatorPrey";

    /// Build from the model's configuration node: `predator`, `prey`, and
    /// `cell_manager` with `grid`, `neighborhood`, and `cell_params`.
    pub fn new(base: ModelBase) -> SimResult<Self> {
        let params = Params::from_config(base.cfg())?;
        let cm_cfg = base.cfg().get_sub("cell_manager")?;
        let cell_params = cm_cfg.get_sub("cell_params")?;
        let init = InitialState::from_config(&cell_params)?;
        let resources = cell_params.get_as_or("initial_resources", InitialResources::default())?;

        let mut cm = {
            let mut rng = base.rng().borrow_mut();
            let mut cm = Cm::from_config(base.space()?, &cm_cfg, &StateInit::default_state(), &mut rng)?;
            init.populate(&mut cm, resources, &mut rng)?;
            cm
        };
        if let InitialState::Load { path, row } = &init {
            load_state(&base, &mut cm, path, *row)?;
        }

        let all_ids = cm.ids().collect();
        let datasets = Datasets::create(&base, &cm)?;
        let model = Self { base, cm, params, all_ids, datasets };
        tracing::info!(
            target: MODEL,
            cells = model.cm.len(),
            predators = model.count(Species::Predator),
            prey = model.count(Species::Prey),
            "predator-prey model set up"
        );
        Ok(model)
    }

    pub fn cell_manager(&self) -> &Cm {
        &self.cm
    }

    pub fn cell_manager_mut(&mut self) -> &mut Cm {
        &mut self.cm
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Number of cells hosting `species`.
    pub fn count(&self, species: Species) -> usize {
        self.cm.cells().iter().filter(|c| species.of(c.state()).on_cell).count()
    }

    pub fn density(&self, species: Species) -> f64 {
        if self.cm.is_empty() {
            return 0.0;
        }
        self.count(species) as f64 / self.cm.len() as f64
    }

    // ── Step phases ───────────────────────────────────────────────────────────

    fn cost_of_living(&mut self) -> SimResult<()> {
        let (pred, prey) = (self.params.predator.cost_of_living, self.params.prey.cost_of_living);
        apply_rule_par(
            self.base.exec_policy(),
            Update::Async,
            |cell, _| {
                let mut s = *cell.state();
                s.predator.pay(pred);
                s.prey.pay(prey);
                s
            },
            &self.all_ids,
            &mut self.cm,
        )?;
        Ok(())
    }

    fn move_predators(&mut self, rng: &mut SimRng) -> SimResult<()> {
        let mut order = self.all_ids.clone();
        rng.shuffle(&mut order);
        let mut moved = vec![false; self.cm.len()];

        for id in order {
            let here = *self.cm.cell_unchecked(id).state();
            if moved[id.index()] || !here.predator.on_cell || here.prey.on_cell {
                continue;
            }
            let nbs = self.cm.neighbors_of(id).into_owned();
            let hunting = self.free_neighbors(&nbs, |s| s.prey.on_cell && !s.predator.on_cell);
            let to = match rng.choose(&hunting) {
                Some(&to) => Some(to),
                None => rng.choose(&self.free_neighbors(&nbs, |s| !s.predator.on_cell)).copied(),
            };
            if let Some(to) = to {
                relocate(&mut self.cm, Species::Predator, id, to)?;
                moved[to.index()] = true;
            }
        }
        Ok(())
    }

    fn flee(&mut self, rng: &mut SimRng) -> SimResult<()> {
        let mut order = self.all_ids.clone();
        rng.shuffle(&mut order);
        let mut moved = vec![false; self.cm.len()];

        for id in order {
            let here = *self.cm.cell_unchecked(id).state();
            if moved[id.index()] || !(here.prey.on_cell && here.predator.on_cell) {
                continue;
            }
            let nbs = self.cm.neighbors_of(id).into_owned();
            let safe = self.free_neighbors(&nbs, |s| !s.prey.on_cell && !s.predator.on_cell);
            if let Some(&to) = rng.choose(&safe) {
                relocate(&mut self.cm, Species::Prey, id, to)?;
                moved[to.index()] = true;
            }
        }
        Ok(())
    }

    fn eat(&mut self) -> SimResult<()> {
        let Params { predator, prey } = self.params;
        apply_rule_par(
            self.base.exec_policy(),
            Update::Async,
            |cell, _| {
                let mut s = *cell.state();
                if s.predator.on_cell && s.prey.on_cell {
                    s.prey = Creature::default();
                    s.predator.feed(predator.resource_intake, predator.resource_max);
                } else if s.prey.on_cell {
                    s.prey.feed(prey.resource_intake, prey.resource_max);
                }
                s
            },
            &self.all_ids,
            &mut self.cm,
        )?;
        Ok(())
    }

    fn reproduce(&mut self, rng: &mut SimRng) -> SimResult<()> {
        let mut order = self.all_ids.clone();
        rng.shuffle(&mut order);
        // Offspring do not reproduce in the step they are born.
        let mut born = vec![[false; 2]; self.cm.len()];

        for id in order {
            for (k, species) in Species::ALL.into_iter().enumerate() {
                let p = match species {
                    Species::Predator => self.params.predator,
                    Species::Prey => self.params.prey,
                };
                let parent = *species.of(self.cm.cell_unchecked(id).state());
                if born[id.index()][k] || !parent.on_cell || parent.resources < p.repro_resource_requ {
                    continue;
                }
                if !rng.gen_bool(p.repro_prob) {
                    continue;
                }
                let nbs = self.cm.neighbors_of(id).into_owned();
                let free = self.free_neighbors(&nbs, |s| !species.of(s).on_cell);
                let Some(&to) = rng.choose(&free) else { continue };

                *species.of_mut(self.cm.cell_mut(to)?.state_mut()) = Creature::new(p.repro_cost);
                species.of_mut(self.cm.cell_mut(id)?.state_mut()).pay(p.repro_cost);
                born[to.index()][k] = true;
            }
        }
        Ok(())
    }

    fn free_neighbors(&self, nbs: &[CellId], pred: impl Fn(&CellState) -> bool) -> Vec<CellId> {
        nbs.iter().copied().filter(|&n| pred(self.cm.cell_unchecked(n).state())).collect()
    }
}

/// Move the `species` creature from `from` to `to`, overwriting `to`.
fn relocate(cm: &mut Cm, species: Species, from: CellId, to: CellId) -> SimResult<()> {
    let creature = std::mem::take(species.of_mut(cm.cell_mut(from)?.state_mut()));
    *species.of_mut(cm.cell_mut(to)?.state_mut()) = creature;
    Ok(())
}

/// Presence and resources from a previous run's storage tree.  The datasets
/// are looked up in the group named after the model; `row` defaults to the
/// last written slice.
fn load_state(base: &ModelBase, cm: &mut Cm, path: &std::path::Path, row: Option<usize>) -> SimResult<()> {
    let file = StorageFile::open_read(path)?;
    let group = file.root().group(base.name()).ok_or_else(|| {
        SimError::Config(format!("no group `{}` in {}", base.name(), path.display()))
    })?;
    let dataset = |name: &str| {
        group
            .dataset(name)
            .ok_or_else(|| SimError::Config(format!("no dataset `{name}` in group `{}`", base.name())))
    };
    let predator = dataset("predator")?;
    let row = match row {
        Some(r) => r,
        None => predator
            .len()
            .checked_sub(1)
            .ok_or_else(|| SimError::Config("dataset `predator` is empty".into()))?,
    };

    base.load_cell_states(&predator, row, cm, |c, v| {
        c.state_mut().predator.on_cell = v != 0.0;
        v == 0.0 || v == 1.0
    })?;
    base.load_cell_states(&dataset("prey")?, row, cm, |c, v| {
        c.state_mut().prey.on_cell = v != 0.0;
        v == 0.0 || v == 1.0
    })?;
    base.load_cell_states(&dataset("resource_predator")?, row, cm, |c, v| {
        c.state_mut().predator.resources = v;
        v >= 0.0
    })?;
    base.load_cell_states(&dataset("resource_prey")?, row, cm, |c, v| {
        c.state_mut().prey.resources = v;
        v >= 0.0
    })?;
    Ok(())
}

fn presence(c: &Creature) -> f64 {
    if c.on_cell { 1.0 } else { 0.0 }
}

impl Model for PredatorPrey {
    fn base(&self) -> &ModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModelBase {
        &mut self.base
    }

    fn perform_step(&mut self) -> SimResult<()> {
        self.cost_of_living()?;

        let shared = Rc::clone(self.base.rng());
        let mut rng = shared.borrow_mut();
        self.move_predators(&mut rng)?;
        self.flee(&mut rng)?;
        drop(rng);

        self.eat()?;

        let mut rng = shared.borrow_mut();
        self.reproduce(&mut rng)
    }

    fn monitor(&mut self) {
        let monitor = self.base.monitor();
        monitor.set_by_func("predator_density", || self.density(Species::Predator));
        monitor.set_by_func("prey_density", || self.density(Species::Prey));
    }

    fn write_data(&mut self) -> SimResult<()> {
        let cells = self.cm.cells();
        let d = &self.datasets;
        d.predator.write_with(cells, |c| presence(&c.state().predator))?;
        d.prey.write_with(cells, |c| presence(&c.state().prey))?;
        d.resource_predator.write_with(cells, |c| c.state().predator.resources)?;
        d.resource_prey.write_with(cells, |c| c.state().prey.resources)?;
        Ok(())
    }
}
