//! `abm-sim` — the model loop of the rust_abm framework.
//!
//! # Step loop
//!
//! ```text
//! attach stop-signal handlers
//! prolog                       model hook, then initial-state write
//! while time < until:
//!   stop requested?            → break
//!   perform_step               the concrete model
//!   time += 1
//!   monitor                    timer check (top level), entries, emission
//!   write data                 basic | manual | managed | off
//! epilog
//! stopped?                     → Err(StopRequested(signum))
//! ```
//!
//! # Crate layout
//!
//! | Module      | Contents                                              |
//! |-------------|-------------------------------------------------------|
//! | [`parent`]  | `PseudoParent`: root config, logging, storage, RNG     |
//! | [`model`]   | `ModelBase`, `Model` trait, `WriteMode`                |
//! | [`sim`]     | `Sim` runner                                           |
//! | [`monitor`] | `Monitor`, `MonitorManager`, `MonitorValue`            |
//! | [`stop`]    | `StopFlag` (SIGINT / SIGTERM / SIGUSR1)                |
//!
//! # Cargo features
//!
//! | Feature    | Effect                                                 |
//! |------------|--------------------------------------------------------|
//! | `parallel` | Enables `abm-rule/parallel` (Rayon rule evaluation).   |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! let parent = PseudoParent::from_path("model.yml")?;
//! let model = MyModel::new(ModelBase::new("MyModel", &parent)?)?;
//! let mut sim = Sim::new(model, parent.stop_flag().clone());
//! sim.run()?;
//! ```

pub mod error;
pub mod model;
pub mod monitor;
pub mod parent;
pub mod sim;
pub mod stop;


pub use error::{SimError, SimResult};
pub use model::{Model, ModelBase, WriteMode};
pub use monitor::{Monitor, MonitorManager, MonitorValue};
pub use parent::PseudoParent;
pub use sim::Sim;
pub use stop::StopFlag;
