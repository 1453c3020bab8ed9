//! `abm-output` — model output for the rust_abm framework.
//!
//! | Module      | Contents                                                         |
//! |-------------|------------------------------------------------------------------|
//! | [`storage`] | `StorageFile`, `Group`, `Dataset`, `AttrValue` (CSV + YAML on disk) |
//! | [`task`]    | `WriteTask` and its five callbacks                               |
//! | [`decider`] | `Decider`, `Trigger`, built-in `Condition`s, `ConditionTable`    |
//! | [`manager`] | `DataManager`                                                    |
//! | [`error`]   | `OutputError`, `OutputResult<T>`                                 |
//!
//! # Usage
//!
//! ```rust,ignore
//! use abm_output::{StorageFile, WriteTask};
//!
//! let mut file = StorageFile::create("./out/run")?;
//! let task = WriteTask::new(
//!     |parent| parent.open_group("states"),
//!     |group, model: &MyModel| group.open_dataset("cells", &[11, model.num_cells()]),
//!     |dset, model: &MyModel| dset.write(model.states()),
//! );
//! ```

pub mod decider;
pub mod error;
pub mod manager;
pub mod storage;
pub mod task;

#[cfg(test)]
mod tests;

pub use decider::{Clock, Condition, ConditionFactory, ConditionTable, Decider, Trigger};
pub use error::{OutputError, OutputResult};
pub use manager::DataManager;
pub use storage::{AttrValue, Dataset, Group, StorageFile};
pub use task::WriteTask;
