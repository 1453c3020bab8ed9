//! `WriteTask` — one stream of output, from group creation to data writes.

use crate::storage::{Dataset, Group};
use crate::OutputResult;

/// Creates the task's base group below the model's group.
pub type GroupBuilder = Box<dyn Fn(&Group) -> OutputResult<Group>>;
/// Creates a new active dataset inside the base group.
pub type DatasetBuilder<M> = Box<dyn Fn(&Group, &M) -> OutputResult<Dataset>>;
/// Appends the current model data to the active dataset.
pub type DataWriter<M> = Box<dyn Fn(&Dataset, &M) -> OutputResult<()>>;
/// Annotates the base group once it exists.
pub type GroupAttrWriter<M> = Box<dyn Fn(&Group, &M) -> OutputResult<()>>;
/// Annotates every newly built dataset.
pub type DatasetAttrWriter<M> = Box<dyn Fn(&Dataset, &M) -> OutputResult<()>>;

/// A write task bundles five callbacks with the handles they produce.
///
/// The base group is built lazily, together with its attributes, the first
/// time the task needs it.  Each trigger firing replaces the active
/// dataset; data is only written while one exists.
pub struct WriteTask<M> {
    base_group_builder:  GroupBuilder,
    dataset_builder:     DatasetBuilder<M>,
    data_writer:         DataWriter<M>,
    group_attr_writer:   GroupAttrWriter<M>,
    dataset_attr_writer: DatasetAttrWriter<M>,
    base_group:          Option<Group>,
    active_dataset:      Option<Dataset>,
}

impl<M: 'static> WriteTask<M> {
    /// A task without attribute writers.
    pub fn new(
        base_group_builder: impl Fn(&Group) -> OutputResult<Group> + 'static,
        dataset_builder: impl Fn(&Group, &M) -> OutputResult<Dataset> + 'static,
        data_writer: impl Fn(&Dataset, &M) -> OutputResult<()> + 'static,
    ) -> Self {
        Self {
            base_group_builder:  Box::new(base_group_builder),
            dataset_builder:     Box::new(dataset_builder),
            data_writer:         Box::new(data_writer),
            group_attr_writer:   Box::new(|_: &Group, _: &M| Ok(())),
            dataset_attr_writer: Box::new(|_: &Dataset, _: &M| Ok(())),
            base_group:          None,
            active_dataset:      None,
        }
    }

    pub fn with_group_attrs(mut self, f: impl Fn(&Group, &M) -> OutputResult<()> + 'static) -> Self {
        self.group_attr_writer = Box::new(f);
        self
    }

    pub fn with_dataset_attrs(mut self, f: impl Fn(&Dataset, &M) -> OutputResult<()> + 'static) -> Self {
        self.dataset_attr_writer = Box::new(f);
        self
    }

    pub fn base_group(&self) -> Option<&Group> {
        self.base_group.as_ref()
    }

    pub fn active_dataset(&self) -> Option<&Dataset> {
        self.active_dataset.as_ref()
    }

    /// Build the base group (and write its attributes) if not done yet.
    pub fn ensure_base_group(&mut self, parent: &Group, model: &M) -> OutputResult<Group> {
        if let Some(g) = &self.base_group {
            return Ok(g.clone());
        }
        let group = (self.base_group_builder)(parent)?;
        (self.group_attr_writer)(&group, model)?;
        self.base_group = Some(group.clone());
        Ok(group)
    }

    /// Build a new active dataset, replacing the previous one.
    pub fn build_dataset(&mut self, parent: &Group, model: &M) -> OutputResult<()> {
        let base = self.ensure_base_group(parent, model)?;
        let dset = (self.dataset_builder)(&base, model)?;
        (self.dataset_attr_writer)(&dset, model)?;
        self.active_dataset = Some(dset);
        Ok(())
    }

    /// Write into the active dataset.  Returns `false` if there is none.
    pub fn write(&self, model: &M) -> OutputResult<bool> {
        match &self.active_dataset {
            Some(dset) => {
                (self.data_writer)(dset, model)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
