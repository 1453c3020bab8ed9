//! The `Sim` runner and its step loop.

use abm_core::Tick;
use abm_core::log::MODEL;
use abm_output::{ConditionTable, DataManager, WriteTask};

use crate::model::{Model, WriteMode};
use crate::stop::StopFlag;
use crate::{SimError, SimResult};

// ── Sim ───────────────────────────────────────────────────────────────────────

/// Drives one model through its steps.
///
/// One iteration runs, in order:
///
/// 1. `perform_step`
/// 2. advance time by one tick
/// 3. top-level models only: check the monitor timer
/// 4. collect monitor entries; top-level models emit if due
/// 5. write data according to the write mode
///
/// [`run`](Sim::run) wraps iterations between `prolog` (which also writes
/// the initial state) and `epilog`, and polls the stop flag between steps.
pub struct Sim<M: Model> {
    model:        M,
    data_manager: Option<DataManager<M>>,
    stop:         StopFlag,
}

impl<M: Model> Sim<M> {
    pub fn new(model: M, stop: StopFlag) -> Self {
        Self { model, data_manager: None, stop }
    }

    /// Use `dm` for the managed write mode.
    pub fn with_data_manager(mut self, dm: DataManager<M>) -> Self {
        self.data_manager = Some(dm);
        self
    }

    /// Build the data manager from the model's `data_manager` node.
    pub fn with_tasks(
        self,
        tasks: impl IntoIterator<Item = (String, WriteTask<M>)>,
        decider_types: &ConditionTable<M>,
        trigger_types: &ConditionTable<M>,
    ) -> SimResult<Self> {
        let base = self.model.base();
        let dm = DataManager::from_config(
            &base.cfg().get_sub("data_manager")?,
            base.group().clone(),
            tasks,
            decider_types,
            trigger_types,
        )?;
        Ok(self.with_data_manager(dm))
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    pub fn data_manager(&self) -> Option<&DataManager<M>> {
        self.data_manager.as_ref()
    }

    pub fn time(&self) -> Tick {
        self.model.base().time()
    }

    // ── Run ───────────────────────────────────────────────────────────────────

    /// Run until `num_steps`.
    pub fn run(&mut self) -> SimResult<()> {
        let until = Tick(self.model.base().num_steps());
        self.run_until(until)
    }

    /// Run from the current time until `until`.
    ///
    /// A stop signal observed between steps ends the loop, runs `epilog`,
    /// and returns [`SimError::StopRequested`].
    pub fn run_until(&mut self, until: Tick) -> SimResult<()> {
        self.stop.attach()?;
        let span = self.model.base().span().clone();
        let _entered = span.enter();

        tracing::info!(target: MODEL, from = %self.time(), %until, "run started");
        self.prolog()?;

        let mut stopped = None;
        while self.time() < until {
            if let Some(sig) = self.stop.requested() {
                stopped = Some(sig);
                break;
            }
            self.iterate()?;
        }

        self.epilog()?;
        if let Some(sig) = stopped {
            tracing::warn!(target: MODEL, signal = sig, time = %self.time(), "stopped by signal");
            return Err(SimError::StopRequested(sig));
        }
        tracing::info!(target: MODEL, time = %self.time(), "run finished");
        Ok(())
    }

    /// Run the model prolog, then write the initial state.
    pub fn prolog(&mut self) -> SimResult<()> {
        self.model.prolog()?;
        match self.model.base().write_mode() {
            WriteMode::Basic => {
                if self.model.base().writes_initial_state() {
                    self.model.write_data()?;
                }
            }
            WriteMode::Manual => self.model.write_data()?,
            WriteMode::Managed => {
                let Self { model, data_manager, .. } = self;
                data_manager.as_mut().ok_or_else(no_data_manager)?.invoke_initial(model)?;
            }
            WriteMode::Off => {}
        }
        tracing::debug!(target: MODEL, "prolog done");
        Ok(())
    }

    pub fn epilog(&mut self) -> SimResult<()> {
        self.model.epilog()?;
        tracing::debug!(target: MODEL, "epilog done");
        Ok(())
    }

    /// Exactly one step.  Sub-models are driven by calling this from the
    /// parent's `perform_step`.
    pub fn iterate(&mut self) -> SimResult<()> {
        self.model.perform_step()?;
        self.model.base_mut().advance_time();

        let base = self.model.base();
        let top_level = base.level() == 1;
        if top_level {
            let monitor = base.monitor();
            monitor.manager().check_timer();
            monitor.set_entry("time", base.time().0);
            if base.num_steps() > 0 {
                monitor.set_entry("progress", base.time().0 as f64 / base.num_steps() as f64);
            }
        }
        self.model.monitor();
        if top_level {
            self.model.base().monitor().manager().emit_if_enabled();
        }

        self.write_step()?;
        tracing::trace!(target: MODEL, time = %self.time(), "step done");
        Ok(())
    }

    fn write_step(&mut self) -> SimResult<()> {
        match self.model.base().write_mode() {
            WriteMode::Basic => {
                let base = self.model.base();
                if base.should_write(base.time()) {
                    self.model.write_data()?;
                }
            }
            WriteMode::Manual => self.model.write_data()?,
            WriteMode::Managed => {
                let Self { model, data_manager, .. } = self;
                data_manager.as_mut().ok_or_else(no_data_manager)?.invoke(model)?;
            }
            WriteMode::Off => {}
        }
        Ok(())
    }
}

fn no_data_manager() -> SimError {
    SimError::Config("write mode `managed` requires a data manager".into())
}
