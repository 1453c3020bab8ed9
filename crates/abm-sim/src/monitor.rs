//! Rate-limited progress reporting.
//!
//! A [`MonitorManager`] owns the emission timer and the collected entries of
//! a whole model hierarchy.  Each model holds a [`Monitor`] naming its
//! namespace (`"root"`, `"root.sub"`, ...).  When an emission is due the
//! manager prints one line to its sink:
//!
//! ```text
//! !!map {root: {progress: 0.5, time: 50}, root.sub: {density: 0.25}}
//! ```
//!
//! The first check after construction is always due.  Write failures are
//! logged and otherwise ignored.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::rc::Rc;
use std::time::{Duration, Instant};

use abm_core::log::MODEL;

// ── MonitorValue ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum MonitorValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    FloatVec(Vec<f64>),
}

impl fmt::Display for MonitorValue {
    /// YAML flow notation.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorValue::Int(v) => write!(f, "{v}"),
            MonitorValue::Float(v) => write!(f, "{v:?}"),
            MonitorValue::Bool(v) => write!(f, "{v}"),
            MonitorValue::Str(v) => write!(f, "{v:?}"),
            MonitorValue::FloatVec(v) => {
                f.write_str("[")?;
                for (i, x) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{x:?}")?;
                }
                f.write_str("]")
            }
        }
    }
}

macro_rules! monitor_from {
    ($($t:ty => $variant:ident $(as $cast:ty)?),* $(,)?) => {
        $(impl From<$t> for MonitorValue {
            fn from(v: $t) -> Self {
                MonitorValue::$variant(v $(as $cast)?)
            }
        })*
    };
}

monitor_from! {
    i64 => Int,
    i32 => Int as i64,
    u32 => Int as i64,
    u64 => Int as i64,
    usize => Int as i64,
    f64 => Float,
    f32 => Float as f64,
    bool => Bool,
    String => Str,
    Vec<f64> => FloatVec,
}

impl From<&str> for MonitorValue {
    fn from(v: &str) -> Self {
        MonitorValue::Str(v.to_owned())
    }
}

// ── MonitorManager ────────────────────────────────────────────────────────────

struct ManagerState {
    emit_interval: Duration,
    last_emit:     Option<Instant>,
    emit_enabled:  bool,
    emit_count:    u64,
    entries:       BTreeMap<String, BTreeMap<String, MonitorValue>>,
    sink:          Box<dyn Write>,
}

/// Shared handle; clones refer to the same manager.
#[derive(Clone)]
pub struct MonitorManager(Rc<RefCell<ManagerState>>);

impl MonitorManager {
    /// A manager printing to standard output.
    pub fn new(emit_interval: Duration) -> Self {
        Self::with_sink(emit_interval, std::io::stdout())
    }

    pub fn with_sink(emit_interval: Duration, sink: impl Write + 'static) -> Self {
        Self(Rc::new(RefCell::new(ManagerState {
            emit_interval,
            last_emit: None,
            emit_enabled: false,
            emit_count: 0,
            entries: BTreeMap::new(),
            sink: Box::new(sink),
        })))
    }

    pub fn emit_interval(&self) -> Duration {
        self.0.borrow().emit_interval
    }

    pub fn emit_enabled(&self) -> bool {
        self.0.borrow().emit_enabled
    }

    pub fn emit_count(&self) -> u64 {
        self.0.borrow().emit_count
    }

    /// Enable emission for this step if the interval has elapsed since the
    /// last one (or nothing was emitted yet).
    pub fn check_timer(&self) {
        let mut s = self.0.borrow_mut();
        let due = s.last_emit.is_none_or(|t| t.elapsed() >= s.emit_interval);
        if due {
            s.emit_enabled = true;
        }
    }

    /// Print the collected entries if emission is enabled, then reset the
    /// timer.  Returns whether a line was emitted.
    pub fn emit_if_enabled(&self) -> bool {
        let mut s = self.0.borrow_mut();
        if !s.emit_enabled {
            return false;
        }
        let line = format!("!!map {}", render(&s.entries));
        if let Err(e) = writeln!(s.sink, "{line}").and_then(|()| s.sink.flush()) {
            tracing::warn!(target: MODEL, "monitor emission failed: {e}");
        }
        s.emit_count += 1;
        s.emit_enabled = false;
        s.last_emit = Some(Instant::now());
        true
    }

    /// Entry `key` of namespace `name`, if set.
    pub fn entry(&self, name: &str, key: &str) -> Option<MonitorValue> {
        self.0.borrow().entries.get(name)?.get(key).cloned()
    }

    fn set(&self, name: &str, key: &str, value: MonitorValue) {
        self.0.borrow_mut().entries.entry(name.to_owned()).or_default().insert(key.to_owned(), value);
    }
}

fn render(entries: &BTreeMap<String, BTreeMap<String, MonitorValue>>) -> String {
    let body: Vec<String> = entries
        .iter()
        .map(|(name, kv)| {
            let inner: Vec<String> = kv.iter().map(|(k, v)| format!("{k}: {v}")).collect();
            format!("{name}: {{{}}}", inner.join(", "))
        })
        .collect();
    format!("{{{}}}", body.join(", "))
}

// ── Monitor ───────────────────────────────────────────────────────────────────

/// One namespace of a [`MonitorManager`].
#[derive(Clone)]
pub struct Monitor {
    name:    String,
    manager: MonitorManager,
}

impl Monitor {
    pub fn new(name: impl Into<String>, manager: MonitorManager) -> Self {
        Self { name: name.into(), manager }
    }

    /// Namespace `<self>.<name>` on the same manager.
    pub fn sub(&self, name: &str) -> Self {
        Self::new(format!("{}.{name}", self.name), self.manager.clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn manager(&self) -> &MonitorManager {
        &self.manager
    }

    pub fn set_entry(&self, key: &str, value: impl Into<MonitorValue>) {
        self.manager.set(&self.name, key, value.into());
    }

    /// Like [`set_entry`](Self::set_entry), but `f` only runs when this
    /// step emits.
    pub fn set_by_func<V: Into<MonitorValue>>(&self, key: &str, f: impl FnOnce() -> V) {
        if self.manager.emit_enabled() {
            self.set_entry(key, f());
        }
    }
}
