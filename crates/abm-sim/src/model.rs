//! `ModelBase`, the `Model` trait, and write modes.

use serde::Deserialize;

use abm_core::log::MODEL;
use abm_core::{Config, SharedRng, Tick};
use abm_entity::{Cell, CellManager, EntityTraits};
use abm_output::{Dataset, Group};
use abm_rule::ExecPolicy;
use abm_space::Space;

use crate::monitor::Monitor;
use crate::parent::PseudoParent;
use crate::{SimError, SimResult};

// ── WriteMode ─────────────────────────────────────────────────────────────────

/// How the loop drives a model's output.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// `write_data` at `write_start + k * write_every`, initial state
    /// included iff `write_start` is the construction time.
    #[default]
    Basic,
    /// `write_data` every step and for the initial state.
    Manual,
    /// The data manager every step and for the initial state.
    Managed,
    Off,
}

// ── ModelBase ─────────────────────────────────────────────────────────────────

/// State every model carries: identity, time, write schedule, and the
/// resources shared along its hierarchy.
pub struct ModelBase {
    name:        String,
    full_name:   String,
    level:       u32,
    cfg:         Config,
    root_space:  Option<Config>,
    time:        Tick,
    start_time:  Tick,
    num_steps:   u64,
    write_mode:  WriteMode,
    write_start: u64,
    write_every: u64,
    rng:         SharedRng,
    monitor:     Monitor,
    group:       Group,
    exec:        ExecPolicy,
    span:        tracing::Span,
}

struct Inherited {
    num_steps:   u64,
    write_start: u64,
    write_every: u64,
}

impl ModelBase {
    /// A top-level (level 1) model reading the `<name>` node of the root
    /// configuration.
    pub fn new(name: &str, parent: &PseudoParent) -> SimResult<Self> {
        let cfg = parent.config().get_sub(name)?;
        let root_space = parent.config().contains("space").then(|| parent.config().get_sub("space")).transpose()?;
        Self::build(
            name,
            name.to_owned(),
            1,
            cfg,
            root_space,
            Inherited {
                num_steps:   parent.num_steps(),
                write_start: parent.write_start(),
                write_every: parent.write_every(),
            },
            parent.rng().clone(),
            Monitor::new(name, parent.monitor_manager().clone()),
            parent.root_group().open_group(name)?,
            parent.exec_policy(),
        )
    }

    /// A sub-model reading the `<name>` node of `parent`'s configuration.
    /// It shares the parent's RNG and monitor manager and writes below the
    /// parent's group.
    pub fn sub(name: &str, parent: &ModelBase) -> SimResult<Self> {
        Self::build(
            name,
            format!("{}.{name}", parent.full_name),
            parent.level + 1,
            parent.cfg.get_sub(name)?,
            parent.root_space.clone(),
            Inherited {
                num_steps:   parent.num_steps,
                write_start: parent.write_start,
                write_every: parent.write_every,
            },
            parent.rng.clone(),
            parent.monitor.sub(name),
            parent.group.open_group(name)?,
            parent.exec,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        name: &str,
        full_name: String,
        level: u32,
        cfg: Config,
        root_space: Option<Config>,
        inherited: Inherited,
        rng: SharedRng,
        monitor: Monitor,
        group: Group,
        exec: ExecPolicy,
    ) -> SimResult<Self> {
        let num_steps = cfg.get_as_or("num_steps", inherited.num_steps)?;
        let write_start = cfg.get_as_or("write_start", inherited.write_start)?;
        let write_every = cfg.get_as_or("write_every", inherited.write_every)?;
        if write_every == 0 {
            return Err(SimError::Config(format!("{full_name}: write_every must be positive")));
        }
        let write_mode = cfg.get_as_or("write_mode", WriteMode::Basic)?;
        let span = tracing::info_span!(target: MODEL, "model", name = %full_name);
        tracing::info!(
            target: MODEL,
            model = %full_name,
            level,
            num_steps,
            ?write_mode,
            write_start,
            write_every,
            "model set up"
        );
        Ok(Self {
            name: name.to_owned(),
            full_name,
            level,
            cfg,
            root_space,
            time: Tick::ZERO,
            start_time: Tick::ZERO,
            num_steps,
            write_mode,
            write_start,
            write_every,
            rng,
            monitor,
            group,
            exec,
            span,
        })
    }

    // ── Access ────────────────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dotted path from the top-level model, e.g. `"root.sub"`.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// This model's configuration node.
    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    #[inline]
    pub fn time(&self) -> Tick {
        self.time
    }

    pub fn num_steps(&self) -> u64 {
        self.num_steps
    }

    pub fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    pub fn write_start(&self) -> u64 {
        self.write_start
    }

    pub fn write_every(&self) -> u64 {
        self.write_every
    }

    pub fn rng(&self) -> &SharedRng {
        &self.rng
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// The group all of this model's datasets live in.
    pub fn group(&self) -> &Group {
        &self.group
    }

    pub fn exec_policy(&self) -> ExecPolicy {
        self.exec
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// The model's `space` node, falling back to the root `space` node.
    pub fn space<const DIM: usize>(&self) -> SimResult<Space<DIM>> {
        let node = if self.cfg.contains("space") {
            self.cfg.get_sub("space")?
        } else {
            self.root_space
                .clone()
                .ok_or_else(|| SimError::Config(format!("{}: no `space` node", self.full_name)))?
        };
        Ok(Space::from_config(&node)?)
    }

    // ── Write schedule ────────────────────────────────────────────────────────

    /// Whether basic mode writes at `t`.
    pub fn should_write(&self, t: Tick) -> bool {
        t.on_interval(Tick(self.write_start), self.write_every)
    }

    /// Whether basic mode writes the initial state.
    pub fn writes_initial_state(&self) -> bool {
        self.write_start == self.start_time.0
    }

    /// Number of time slices the write mode produces over the whole run.
    pub fn num_writes(&self) -> usize {
        let n = match self.write_mode {
            WriteMode::Basic if self.num_steps >= self.write_start => {
                (self.num_steps - self.write_start) / self.write_every + 1
            }
            WriteMode::Basic | WriteMode::Off => 0,
            WriteMode::Manual | WriteMode::Managed => self.num_steps + 1,
        };
        n as usize
    }

    pub(crate) fn advance_time(&mut self) {
        self.time += 1;
    }

    // ── Datasets ──────────────────────────────────────────────────────────────

    /// A dataset in this model's group with room for every write of the
    /// run, annotated with its time coordinates.
    pub fn create_dset(&self, name: &str, shape: &[usize]) -> SimResult<Dataset> {
        let mut capacity = Vec::with_capacity(shape.len() + 1);
        capacity.push(self.num_writes().max(1));
        capacity.extend_from_slice(shape);
        let dset = self.group.open_dataset(name, &capacity)?;
        dset.add_attribute("dim_name__0", "time");
        dset.add_attribute("coords_mode__time", "start_and_step");
        dset.add_attribute("coords__time", vec![self.write_start as i64, self.write_every as i64]);
        tracing::debug!(target: MODEL, model = %self.full_name, dataset = name, ?capacity, "dataset created");
        Ok(dset)
    }

    /// A dataset holding one value per cell of `cm` per write.
    pub fn create_cm_dset<T: EntityTraits, const DIM: usize>(
        &self,
        name: &str,
        cm: &CellManager<T, DIM>,
    ) -> SimResult<Dataset> {
        let dset = self.create_dset(name, &[cm.len()])?;
        dset.add_attribute("content", "grid");
        dset.add_attribute("grid_shape", cm.grid().shape().to_vec());
        dset.add_attribute("space_extent", cm.space().extent().to_vec());
        dset.add_attribute("index_order", "F");
        dset.add_attribute("dim_name__1", "ids");
        dset.add_attribute("coords_mode__ids", "range");
        dset.add_attribute("coords__ids", vec![cm.len()]);
        Ok(dset)
    }

    /// Set cell states from slice `row` of a cell-bound dataset.
    pub fn load_cell_states<T, const DIM: usize, F>(
        &self,
        dset: &Dataset,
        row: usize,
        cm: &mut CellManager<T, DIM>,
        setter: F,
    ) -> SimResult<()>
    where
        T: EntityTraits,
        F: FnMut(&mut Cell<T>, f64) -> bool,
    {
        let values = dset
            .row(row)
            .ok_or_else(|| SimError::Config(format!("dataset `{}` has no row {row}", dset.name())))?;
        cm.set_states_from_values(&values, setter)?;
        tracing::info!(target: MODEL, model = %self.full_name, dataset = %dset.name(), row, "cell states loaded");
        Ok(())
    }
}

// ── Model ─────────────────────────────────────────────────────────────────────

/// A concrete model.  Only `perform_step` is required.
pub trait Model: 'static {
    fn base(&self) -> &ModelBase;
    fn base_mut(&mut self) -> &mut ModelBase;

    /// Advance the model state by one step.  Time is advanced by the loop.
    fn perform_step(&mut self) -> SimResult<()>;

    /// Set monitor entries.  Called every step after time advanced.
    fn monitor(&mut self) {}

    /// Write the current state.  Used by the basic and manual write modes.
    fn write_data(&mut self) -> SimResult<()> {
        Ok(())
    }

    /// Runs before the initial-state write.
    fn prolog(&mut self) -> SimResult<()> {
        Ok(())
    }

    /// Runs after the last step, also when stopped by a signal.
    fn epilog(&mut self) -> SimResult<()> {
        Ok(())
    }
}
