//! Typed read access to a hierarchical YAML configuration tree.
//!
//! A [`Config`] is one node of the tree plus the dotted path leading to it.
//! Every accessor goes through `serde`, so any `DeserializeOwned` type can be
//! read directly:
//!
//! ```rust
//! use abm_core::Config;
//!
//! let cfg = Config::from_yaml_str("space: {extent: [10.0, 5.0], periodic: true}").unwrap();
//! let space = cfg.get_sub("space").unwrap();
//! let extent: [f64; 2] = space.get_as_array("extent").unwrap();
//! assert_eq!(extent, [10.0, 5.0]);
//! assert!(space.get_as::<bool>("periodic").unwrap());
//! assert_eq!(space.get_as_or("resolution", 4u32).unwrap(), 4);
//! ```
//!
//! Missing keys fail with [`CoreError::Key`], type mismatches with
//! [`CoreError::Conversion`]; both carry a YAML dump of the searched node.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};

use crate::{CoreError, CoreResult};

/// One node of a configuration tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Dotted path from the root; empty for the root itself.
    path: String,
    node: Value,
}

impl Default for Config {
    fn default() -> Self {
        Self::empty()
    }
}

impl Config {
    /// Wrap a YAML value as a root node.
    pub fn new(node: Value) -> Self {
        Self { path: String::new(), node }
    }

    /// An empty mapping.
    pub fn empty() -> Self {
        Self::new(Value::Mapping(Mapping::new()))
    }

    pub fn from_yaml_str(s: &str) -> CoreResult<Self> {
        Ok(Self::new(serde_yaml::from_str(s)?))
    }

    pub fn from_path(path: &Path) -> CoreResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Serialise any `Serialize` value into a configuration node.
    pub fn from_serializable<T: serde::Serialize>(value: &T) -> CoreResult<Self> {
        Ok(Self::new(serde_yaml::to_value(value)?))
    }

    /// The raw YAML value.
    pub fn node(&self) -> &Value {
        &self.node
    }

    /// Dotted path of this node, e.g. `"PredatorPrey.cell_manager"`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_mapping(&self) -> bool {
        self.node.is_mapping()
    }

    pub fn is_null(&self) -> bool {
        self.node.is_null()
    }

    /// `true` if `key` is present (even with a null value).
    pub fn contains(&self, key: &str) -> bool {
        self.node.get(key).is_some()
    }

    /// Human-readable dump used in error messages.
    pub fn dump(&self) -> String {
        serde_yaml::to_string(&self.node).unwrap_or_else(|_| format!("{:?}", self.node))
    }

    // ── Typed reads ───────────────────────────────────────────────────────

    /// Read `key` as `T`.  Fails with `Key` if missing, `Conversion` if the
    /// value does not deserialize into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> CoreResult<T> {
        match self.node.get(key) {
            None => Err(self.key_error(key)),
            Some(value) => self.convert(key, value),
        }
    }

    /// Read `key` as `T`, returning `fallback` if the key is missing or null.
    /// A present value of the wrong type is still an error.
    pub fn get_as_or<T: DeserializeOwned>(&self, key: &str, fallback: T) -> CoreResult<T> {
        Ok(self.get_opt(key)?.unwrap_or(fallback))
    }

    /// Read `key` as `T` if present and non-null.
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> CoreResult<Option<T>> {
        match self.node.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => self.convert(key, value).map(Some),
        }
    }

    /// Read a fixed-length float vector.
    pub fn get_as_array<const N: usize>(&self, key: &str) -> CoreResult<[f64; N]> {
        let values: Vec<f64> = self.get_as(key)?;
        let got = values.len();
        values.try_into().map_err(|_| CoreError::Conversion {
            key:       self.qualified(key),
            type_name: std::any::type_name::<[f64; N]>(),
            reason:    format!("expected {N} elements, got {got}"),
            node:      self.dump(),
        })
    }

    /// Descend into the sub-node at `key`.
    pub fn get_sub(&self, key: &str) -> CoreResult<Config> {
        match self.node.get(key) {
            None => Err(self.key_error(key)),
            Some(value) => Ok(Config {
                path: self.qualified(key),
                node: value.clone(),
            }),
        }
    }

    /// Descend into `key`, or an empty mapping if it is missing.
    pub fn get_sub_or_empty(&self, key: &str) -> Config {
        self.get_sub(key).unwrap_or_else(|_| Config {
            path: self.qualified(key),
            node: Value::Mapping(Mapping::new()),
        })
    }

    /// Mapping entries in document order.  Non-string keys are skipped;
    /// a non-mapping node yields nothing.
    pub fn entries(&self) -> Vec<(String, Config)> {
        let Some(map) = self.node.as_mapping() else {
            return vec![];
        };
        map.iter()
            .filter_map(|(k, v)| {
                let key = k.as_str()?;
                Some((
                    key.to_owned(),
                    Config { path: self.qualified(key), node: v.clone() },
                ))
            })
            .collect()
    }

    /// Mapping keys in document order.
    pub fn keys(&self) -> Vec<String> {
        self.entries().into_iter().map(|(k, _)| k).collect()
    }

    /// Deserialize this whole node as `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> CoreResult<T> {
        serde_yaml::from_value(self.node.clone()).map_err(|e| CoreError::Conversion {
            key:       self.path.clone(),
            type_name: std::any::type_name::<T>(),
            reason:    e.to_string(),
            node:      self.dump(),
        })
    }

    /// Insert or replace `key` (mapping nodes only).  Used when a parent
    /// injects derived values into a child's configuration.
    pub fn set<T: serde::Serialize>(&mut self, key: &str, value: &T) -> CoreResult<()> {
        let value = serde_yaml::to_value(value)?;
        match self.node.as_mapping_mut() {
            Some(map) => {
                map.insert(Value::String(key.to_owned()), value);
                Ok(())
            }
            None => Err(CoreError::InvalidConfig(format!(
                "cannot set `{key}` on non-mapping node `{}`",
                self.path
            ))),
        }
    }

    // ── Helpers ───────────────────────────────────────────────────────────

    fn qualified(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_owned()
        } else {
            format!("{}.{key}", self.path)
        }
    }

    fn key_error(&self, key: &str) -> CoreError {
        CoreError::Key {
            key:  self.qualified(key),
            node: self.dump(),
        }
    }

    fn convert<T: DeserializeOwned>(&self, key: &str, value: &Value) -> CoreResult<T> {
        serde_yaml::from_value(value.clone()).map_err(|e| CoreError::Conversion {
            key:       self.qualified(key),
            type_name: std::any::type_name::<T>(),
            reason:    e.to_string(),
            node:      self.dump(),
        })
    }
}

// ── Free-function forms ───────────────────────────────────────────────────────

/// Read `key` from `node` as `T`.  Same as [`Config::get_as`].
pub fn get_as<T: DeserializeOwned>(key: &str, node: &Config) -> CoreResult<T> {
    node.get_as(key)
}

/// Read `key` from `node` as `T`, or `fallback`.  Same as [`Config::get_as_or`].
pub fn get_as_or<T: DeserializeOwned>(key: &str, node: &Config, fallback: T) -> CoreResult<T> {
    node.get_as_or(key, fallback)
}
