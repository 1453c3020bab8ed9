//! Logging setup on top of `tracing` + `tracing-subscriber`.
//!
//! The framework logs on four channels, each a `tracing` target:
//!
//! | Channel     | Target            | Emitted by                                  |
//! |-------------|-------------------|---------------------------------------------|
//! | `core`      | `abm::core`       | space, grids, managers, rule dispatch       |
//! | `data_io`   | `abm::data_io`    | storage facade                              |
//! | `data_mngr` | `abm::data_mngr`  | data manager, deciders, triggers            |
//! | `model`     | `abm::model`      | model loop and concrete models              |
//!
//! Levels come from the `log_levels` configuration node; `RUST_LOG`, if set,
//! is appended to the generated filter and therefore wins on conflicts.
//! Output goes to stderr so that monitor lines on stdout stay parseable.

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::{Config, CoreError, CoreResult};

pub const CORE:      &str = "abm::core";
pub const DATA_IO:   &str = "abm::data_io";
pub const DATA_MNGR: &str = "abm::data_mngr";
pub const MODEL:     &str = "abm::model";

// ── Levels ────────────────────────────────────────────────────────────────────

/// Verbosity of one channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    /// No separate level in `tracing`; treated as `error`.
    Critical,
    Off,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
            LogLevel::Off => "off",
        }
    }
}

fn info() -> LogLevel {
    LogLevel::Info
}

fn warn() -> LogLevel {
    LogLevel::Warn
}

/// Per-channel levels as read from `log_levels`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct LogLevels {
    #[serde(default = "warn")]
    pub core:      LogLevel,
    #[serde(default = "warn")]
    pub data_io:   LogLevel,
    #[serde(default = "info")]
    pub data_mngr: LogLevel,
    #[serde(default = "info")]
    pub model:     LogLevel,
}

impl Default for LogLevels {
    fn default() -> Self {
        Self {
            core:      LogLevel::Warn,
            data_io:   LogLevel::Warn,
            data_mngr: LogLevel::Info,
            model:     LogLevel::Info,
        }
    }
}

/// Formatter flavour selected by `log_pattern`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum LogPattern {
    #[default]
    Full,
    Compact,
    Pretty,
}

// ── Settings ──────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogSettings {
    pub levels:  LogLevels,
    pub pattern: LogPattern,
}

impl LogSettings {
    /// Read `log_levels` and `log_pattern` from a root configuration node.
    /// Both are optional.
    pub fn from_config(cfg: &Config) -> CoreResult<Self> {
        let levels = cfg.get_as_or("log_levels", LogLevels::default())?;
        let pattern = match cfg.get_opt::<String>("log_pattern")?.as_deref() {
            None | Some("full") => LogPattern::Full,
            Some("compact") => LogPattern::Compact,
            Some("pretty") => LogPattern::Pretty,
            Some(other) => {
                tracing::warn!(target: CORE, "unknown log_pattern {other:?}, using `full`");
                LogPattern::Full
            }
        };
        Ok(Self { levels, pattern })
    }

    /// The `EnvFilter` directive string for these settings.
    ///
    /// Everything outside the four framework channels logs at `warn`.
    pub fn filter_directives(&self) -> String {
        let l = &self.levels;
        format!(
            "warn,{CORE}={},{DATA_IO}={},{DATA_MNGR}={},{MODEL}={}",
            l.core.directive(),
            l.data_io.directive(),
            l.data_mngr.directive(),
            l.model.directive(),
        )
    }

    fn env_filter(&self) -> CoreResult<EnvFilter> {
        let mut directives = self.filter_directives();
        if let Ok(extra) = std::env::var("RUST_LOG") {
            if !extra.trim().is_empty() {
                directives.push(',');
                directives.push_str(&extra);
            }
        }
        EnvFilter::try_new(&directives)
            .map_err(|e| CoreError::InvalidConfig(format!("log filter {directives:?}: {e}")))
    }
}

/// Install the global subscriber.
///
/// Returns `Ok(false)` if a subscriber was already installed (e.g. by an
/// earlier model in the same process or by a test harness); that is not an
/// error.
pub fn init_logging(settings: &LogSettings) -> CoreResult<bool> {
    let filter = settings.env_filter()?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = match settings.pattern {
        LogPattern::Full => builder.try_init().is_ok(),
        LogPattern::Compact => builder.compact().try_init().is_ok(),
        LogPattern::Pretty => builder.pretty().try_init().is_ok(),
    };
    Ok(installed)
}
