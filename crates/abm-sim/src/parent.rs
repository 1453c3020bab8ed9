//! `PseudoParent` — the root of a model hierarchy.
//!
//! Reads the top-level configuration keys, sets up logging and the thread
//! pool, creates the output directory, and owns the resources every model
//! of the hierarchy shares: the storage file, the RNG, the monitor manager,
//! and the stop flag.
//!
//! Output layout:
//!
//! ```text
//! <output_path>/
//!   config.yml     copy of the configuration the run used
//!   data/          storage root; one group per top-level model
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use abm_core::log::{CORE, MODEL};
use abm_core::{Config, LogSettings, SharedRng, SimRng, init_logging};
use abm_output::{Group, StorageFile};
use abm_rule::{ExecPolicy, ParallelSettings};

use crate::monitor::MonitorManager;
use crate::stop::StopFlag;
use crate::{SimError, SimResult};

const DEFAULT_SEED: u64 = 42;
const DEFAULT_EMIT_INTERVAL: f64 = 5.0;

pub struct PseudoParent {
    cfg:         Config,
    output_path: PathBuf,
    file:        StorageFile,
    rng:         SharedRng,
    monitor:     MonitorManager,
    log:         LogSettings,
    seed:        u64,
    num_steps:   u64,
    write_start: u64,
    write_every: u64,
    exec:        ExecPolicy,
    stop:        StopFlag,
}

impl PseudoParent {
    /// Set up from a configuration file.  `output_path` defaults to a
    /// directory below the system temp dir.
    pub fn from_path(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let cfg = Config::from_yaml_str(&raw)?;
        let output_path = match cfg.get_opt::<PathBuf>("output_path")? {
            Some(p) => p,
            None => std::env::temp_dir().join("abm_output"),
        };
        Self::setup(cfg, output_path, &raw)
    }

    /// Set up from YAML text, writing below `output_dir` regardless of any
    /// `output_path` key.
    pub fn from_yaml_str(yaml: &str, output_dir: impl Into<PathBuf>) -> SimResult<Self> {
        let cfg = Config::from_yaml_str(yaml)?;
        Self::setup(cfg, output_dir.into(), yaml)
    }

    fn setup(cfg: Config, output_path: PathBuf, raw: &str) -> SimResult<Self> {
        let log = LogSettings::from_config(&cfg)?;
        init_logging(&log)?;

        let seed = match cfg.get_opt::<u64>("seed")? {
            Some(seed) => seed,
            None => {
                tracing::debug!(target: CORE, seed = DEFAULT_SEED, "no seed configured, using the default");
                DEFAULT_SEED
            }
        };
        let num_steps: u64 = cfg.get_as("num_steps")?;
        let write_start = cfg.get_as_or("write_start", 0u64)?;
        let write_every = cfg.get_as_or("write_every", 1u64)?;
        if write_every == 0 {
            return Err(SimError::Config("write_every must be positive".into()));
        }
        let emit_interval: f64 = cfg.get_as_or("monitor_emit_interval", DEFAULT_EMIT_INTERVAL)?;
        if !emit_interval.is_finite() || emit_interval < 0.0 {
            return Err(SimError::Config(format!(
                "monitor_emit_interval must be a non-negative number of seconds, got {emit_interval}"
            )));
        }
        let exec = ParallelSettings::from_config(&cfg)?.install();

        fs::create_dir_all(&output_path)?;
        let mut copy = fs::File::create(output_path.join("config.yml"))?;
        copy.write_all(raw.as_bytes())?;
        let file = StorageFile::create(output_path.join("data"))?;

        tracing::info!(
            target: MODEL,
            output = %output_path.display(),
            seed,
            num_steps,
            ?exec,
            "pseudo parent set up"
        );
        Ok(Self {
            cfg,
            output_path,
            file,
            rng: SimRng::shared(seed),
            monitor: MonitorManager::new(Duration::from_secs_f64(emit_interval)),
            log,
            seed,
            num_steps,
            write_start,
            write_every,
            exec,
            stop: StopFlag::new(),
        })
    }

    /// Route monitor lines to `sink` instead of standard output.
    pub fn set_monitor_sink(&mut self, sink: impl Write + 'static) {
        self.monitor = MonitorManager::with_sink(self.monitor.emit_interval(), sink);
    }

    // ── Access ────────────────────────────────────────────────────────────────

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn root_group(&self) -> Group {
        self.file.root()
    }

    pub fn rng(&self) -> &SharedRng {
        &self.rng
    }

    pub fn monitor_manager(&self) -> &MonitorManager {
        &self.monitor
    }

    pub fn log_settings(&self) -> &LogSettings {
        &self.log
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn num_steps(&self) -> u64 {
        self.num_steps
    }

    pub fn write_start(&self) -> u64 {
        self.write_start
    }

    pub fn write_every(&self) -> u64 {
        self.write_every
    }

    pub fn exec_policy(&self) -> ExecPolicy {
        self.exec
    }

    pub fn stop_flag(&self) -> &StopFlag {
        &self.stop
    }

    /// Persist the storage file.  Also happens on drop.
    pub fn close(&mut self) -> SimResult<()> {
        self.file.close()?;
        Ok(())
    }
}
