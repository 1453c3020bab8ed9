//! `DataManager` — schedules write tasks through deciders and triggers.
//!
//! Every decider and trigger is linked to an ordered list of tasks.  Per
//! invocation, triggers run first (in registration order) and give their
//! tasks a fresh active dataset; then deciders run and let their tasks
//! write.  A task linked to a decider that fires but whose trigger never
//! fired simply writes nothing.
//!
//! # Configuration
//!
//! ```yaml
//! data_manager:
//!   tasks:
//!     states:   { decider: every_10, trigger: at_start }
//!     debug:    { decider: always, trigger: at_start, active: false }
//!   deciders:
//!     always:   {}
//!     every_10: { type: every, args: { every: 10 } }
//!   triggers:
//!     at_start: { type: once, args: { time: 0 } }
//! ```
//!
//! All three sub-nodes are required, even if empty.

use std::collections::BTreeMap;

use abm_core::log::DATA_MNGR;
use abm_core::Config;

use crate::decider::{ConditionTable, Decider, Trigger};
use crate::storage::Group;
use crate::task::WriteTask;
use crate::{OutputError, OutputResult};

pub struct DataManager<M> {
    parent:        Group,
    tasks:         Vec<(String, WriteTask<M>)>,
    deciders:      Vec<(String, Decider<M>)>,
    triggers:      Vec<(String, Trigger<M>)>,
    /// Parallel to `deciders`: indices into `tasks`.
    decider_tasks: Vec<Vec<usize>>,
    /// Parallel to `triggers`: indices into `tasks`.
    trigger_tasks: Vec<Vec<usize>>,
}

impl<M: 'static> DataManager<M> {
    /// An empty manager whose tasks create their groups below `parent`.
    pub fn new(parent: Group) -> Self {
        Self {
            parent,
            tasks: Vec::new(),
            deciders: Vec::new(),
            triggers: Vec::new(),
            decider_tasks: Vec::new(),
            trigger_tasks: Vec::new(),
        }
    }

    /// Build from a `data_manager` node.
    ///
    /// `tasks` supplies the implementation of every task named in the
    /// configuration; deciders and triggers are built from the tables.
    /// Tasks marked `active: false` are dropped, as are implementations
    /// without a configuration entry.
    pub fn from_config(
        cfg: &Config,
        parent: Group,
        tasks: impl IntoIterator<Item = (String, WriteTask<M>)>,
        decider_types: &ConditionTable<M>,
        trigger_types: &ConditionTable<M>,
    ) -> OutputResult<Self> {
        let sub = |key: &str| -> OutputResult<Config> {
            if cfg.contains(key) {
                Ok(cfg.get_sub(key)?)
            } else {
                Err(OutputError::MissingConfig(key.to_owned()))
            }
        };
        let tasks_cfg = sub("tasks")?;
        let deciders_cfg = sub("deciders")?;
        let triggers_cfg = sub("triggers")?;

        let mut dm = Self::new(parent);
        for (name, entry) in deciders_cfg.entries() {
            let d = decider_types.build(&name, &entry)?;
            dm.add_decider(&name, d);
        }
        for (name, entry) in triggers_cfg.entries() {
            let t = trigger_types.build(&name, &entry)?;
            dm.add_trigger(&name, t);
        }

        let mut impls: BTreeMap<String, WriteTask<M>> = tasks.into_iter().collect();
        for (name, entry) in tasks_cfg.entries() {
            let task = impls.remove(&name);
            if !entry.get_as_or("active", true)? {
                tracing::debug!(target: DATA_MNGR, task = %name, "task inactive, skipped");
                continue;
            }
            let task = task.ok_or_else(|| {
                OutputError::InvalidConfig(format!("task `{name}` is configured but has no implementation"))
            })?;
            let decider: String = entry.get_as("decider")?;
            let trigger: String = entry.get_as("trigger")?;
            dm.add_task(&name, task, &decider, &trigger)?;
        }
        for name in impls.keys() {
            tracing::warn!(target: DATA_MNGR, task = %name, "task has no configuration entry, skipped");
        }

        tracing::info!(
            target: DATA_MNGR,
            tasks = dm.tasks.len(),
            deciders = dm.deciders.len(),
            triggers = dm.triggers.len(),
            "data manager set up"
        );
        Ok(dm)
    }

    // ── Registration ──────────────────────────────────────────────────────────

    /// Register a decider, replacing (and unlinking) one of the same name.
    pub fn add_decider(&mut self, name: &str, decider: Decider<M>) {
        match self.deciders.iter().position(|(n, _)| n == name) {
            Some(i) => {
                self.deciders[i].1 = decider;
                self.decider_tasks[i].clear();
            }
            None => {
                self.deciders.push((name.to_owned(), decider));
                self.decider_tasks.push(Vec::new());
            }
        }
    }

    /// Register a trigger, replacing (and unlinking) one of the same name.
    pub fn add_trigger(&mut self, name: &str, trigger: Trigger<M>) {
        match self.triggers.iter().position(|(n, _)| n == name) {
            Some(i) => {
                self.triggers[i].1 = trigger;
                self.trigger_tasks[i].clear();
            }
            None => {
                self.triggers.push((name.to_owned(), trigger));
                self.trigger_tasks.push(Vec::new());
            }
        }
    }

    /// Register a task and link it to an existing decider and trigger.
    pub fn add_task(&mut self, name: &str, task: WriteTask<M>, decider: &str, trigger: &str) -> OutputResult<()> {
        let unknown = |kind, other: &str| OutputError::UnknownAssociation {
            task: name.to_owned(),
            kind,
            name: other.to_owned(),
        };
        let d = self.deciders.iter().position(|(n, _)| n == decider).ok_or_else(|| unknown("decider", decider))?;
        let t = self.triggers.iter().position(|(n, _)| n == trigger).ok_or_else(|| unknown("trigger", trigger))?;
        if self.tasks.iter().any(|(n, _)| n == name) {
            return Err(OutputError::InvalidConfig(format!("task `{name}` registered twice")));
        }
        let idx = self.tasks.len();
        self.tasks.push((name.to_owned(), task));
        self.decider_tasks[d].push(idx);
        self.trigger_tasks[t].push(idx);
        tracing::debug!(target: DATA_MNGR, task = name, decider, trigger, "task registered");
        Ok(())
    }

    // ── Access ────────────────────────────────────────────────────────────────

    pub fn task(&self, name: &str) -> Option<&WriteTask<M>> {
        self.tasks.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Decider name to the names of its tasks, in registration order.
    pub fn decider_to_tasks(&self) -> BTreeMap<String, Vec<String>> {
        self.links(&self.deciders, &self.decider_tasks)
    }

    /// Trigger name to the names of its tasks, in registration order.
    pub fn trigger_to_tasks(&self) -> BTreeMap<String, Vec<String>> {
        self.links(&self.triggers, &self.trigger_tasks)
    }

    fn links<X>(&self, named: &[(String, X)], links: &[Vec<usize>]) -> BTreeMap<String, Vec<String>> {
        named
            .iter()
            .zip(links)
            .map(|((n, _), idx)| (n.clone(), idx.iter().map(|&i| self.tasks[i].0.clone()).collect()))
            .collect()
    }

    // ── Invocation ────────────────────────────────────────────────────────────

    /// Run all triggers, then all deciders, for the current model state.
    pub fn invoke(&mut self, model: &M) -> OutputResult<()> {
        for (i, (name, trigger)) in self.triggers.iter_mut().enumerate() {
            if !trigger(model) {
                continue;
            }
            for &k in &self.trigger_tasks[i] {
                let (task_name, task) = &mut self.tasks[k];
                task.build_dataset(&self.parent, model)?;
                tracing::debug!(target: DATA_MNGR, trigger = %name, task = %task_name, "new active dataset");
            }
        }
        for (i, (name, decider)) in self.deciders.iter_mut().enumerate() {
            if !decider(model) {
                continue;
            }
            for &k in &self.decider_tasks[i] {
                let (task_name, task) = &self.tasks[k];
                if task.write(model)? {
                    tracing::trace!(target: DATA_MNGR, decider = %name, task = %task_name, "data written");
                }
            }
        }
        Ok(())
    }

    /// Write the initial state, before time first advances.
    pub fn invoke_initial(&mut self, model: &M) -> OutputResult<()> {
        tracing::debug!(target: DATA_MNGR, "writing initial state");
        self.invoke(model)
    }
}
