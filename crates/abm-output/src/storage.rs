//! Hierarchical storage facade.
//!
//! A [`StorageFile`] holds a tree of [`Group`]s, each containing child groups
//! and [`Dataset`]s; every node carries attributes.  Handles are cheap
//! clones of a shared node, so a write task can keep its base group and its
//! active dataset while the model owns the file.  A file belongs to exactly
//! one model hierarchy and is never shared across threads.
//!
//! # On-disk layout
//!
//! Everything stays in memory until [`StorageFile::close`] (or drop):
//!
//! ```text
//! <path>/                      root group
//!   .attrs.yml                 group attributes (if any)
//!   <group>/                   child group, same layout
//!   <dataset>.csv              one row per time slice, no header
//!   <dataset>.attrs.yml        capacity + dataset attributes
//! ```
//!
//! [`StorageFile::open_read`] loads such a tree back.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use abm_core::log::DATA_IO;

use crate::{OutputError, OutputResult};

const ATTRS_FILE: &str = ".attrs.yml";
const ATTRS_SUFFIX: &str = ".attrs.yml";

// ── AttrValue ─────────────────────────────────────────────────────────────────

/// Value of a group or dataset attribute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    IntVec(Vec<i64>),
    FloatVec(Vec<f64>),
    StrVec(Vec<String>),
}

macro_rules! attr_from {
    ($($t:ty => $variant:ident $(as $cast:ty)?),* $(,)?) => {
        $(impl From<$t> for AttrValue {
            fn from(v: $t) -> Self {
                AttrValue::$variant(v $(as $cast)?)
            }
        })*
    };
}

attr_from! {
    bool => Bool,
    i64 => Int,
    i32 => Int as i64,
    u32 => Int as i64,
    u64 => Int as i64,
    usize => Int as i64,
    f64 => Float,
    String => Str,
    Vec<i64> => IntVec,
    Vec<f64> => FloatVec,
    Vec<String> => StrVec,
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_owned())
    }
}

impl From<Vec<usize>> for AttrValue {
    fn from(v: Vec<usize>) -> Self {
        AttrValue::IntVec(v.into_iter().map(|x| x as i64).collect())
    }
}

impl From<Vec<u32>> for AttrValue {
    fn from(v: Vec<u32>) -> Self {
        AttrValue::IntVec(v.into_iter().map(i64::from).collect())
    }
}

impl<const N: usize> From<[f64; N]> for AttrValue {
    fn from(v: [f64; N]) -> Self {
        AttrValue::FloatVec(v.to_vec())
    }
}

impl<const N: usize> From<[&str; N]> for AttrValue {
    fn from(v: [&str; N]) -> Self {
        AttrValue::StrVec(v.iter().map(|s| (*s).to_owned()).collect())
    }
}

type Attrs = BTreeMap<String, AttrValue>;

fn check_name(kind: &str, name: &str) -> OutputResult<()> {
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) || name.ends_with(ATTRS_SUFFIX) {
        return Err(OutputError::Storage(format!("invalid {kind} name {name:?}")));
    }
    Ok(())
}

// ── Dataset ───────────────────────────────────────────────────────────────────

struct DatasetNode {
    name:     String,
    /// Reserved size per dimension; dimension 0 is time.
    capacity: Vec<usize>,
    rows:     Vec<Vec<f64>>,
    attrs:    Attrs,
}

/// Handle to a time-major dataset of `f64` values.
///
/// Each write appends one time slice whose length is the product of the
/// non-time capacity dimensions.
#[derive(Clone)]
pub struct Dataset(Rc<RefCell<DatasetNode>>);

impl Dataset {
    fn new(name: &str, capacity: Vec<usize>) -> Self {
        Dataset(Rc::new(RefCell::new(DatasetNode {
            name: name.to_owned(),
            capacity,
            rows: Vec::new(),
            attrs: Attrs::new(),
        })))
    }

    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    pub fn capacity(&self) -> Vec<usize> {
        self.0.borrow().capacity.clone()
    }

    /// Current size per dimension: written slices, then the slice shape.
    pub fn extent(&self) -> Vec<usize> {
        let node = self.0.borrow();
        let mut extent = node.capacity.clone();
        if let Some(t) = extent.first_mut() {
            *t = node.rows.len();
        }
        extent
    }

    /// Values per time slice.
    pub fn slice_len(&self) -> usize {
        self.0.borrow().capacity.iter().skip(1).product()
    }

    /// Number of slices written so far.
    pub fn len(&self) -> usize {
        self.0.borrow().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append one time slice.
    pub fn write<I: IntoIterator<Item = f64>>(&self, values: I) -> OutputResult<()> {
        let row: Vec<f64> = values.into_iter().collect();
        let expected = self.slice_len();
        let mut node = self.0.borrow_mut();
        if row.len() != expected {
            return Err(OutputError::Storage(format!(
                "dataset `{}` expects {expected} values per slice, got {}",
                node.name,
                row.len()
            )));
        }
        let cap = node.capacity.first().copied().unwrap_or(0);
        if node.rows.len() >= cap {
            return Err(OutputError::Storage(format!(
                "dataset `{}` is full ({cap} slices reserved)",
                node.name
            )));
        }
        node.rows.push(row);
        Ok(())
    }

    /// Append one slice extracted from `items`.
    pub fn write_with<T>(&self, items: &[T], extract: impl Fn(&T) -> f64) -> OutputResult<()> {
        self.write(items.iter().map(extract))
    }

    /// Append one slice extracted from `items[begin..end]`.
    pub fn write_range<T>(
        &self,
        items: &[T],
        begin: usize,
        end: usize,
        extract: impl Fn(&T) -> f64,
    ) -> OutputResult<()> {
        let slice = items.get(begin..end).ok_or_else(|| {
            OutputError::Storage(format!("range {begin}..{end} out of bounds for {} items", items.len()))
        })?;
        self.write_with(slice, extract)
    }

    pub fn row(&self, t: usize) -> Option<Vec<f64>> {
        self.0.borrow().rows.get(t).cloned()
    }

    pub fn last_row(&self) -> Option<Vec<f64>> {
        self.0.borrow().rows.last().cloned()
    }

    pub fn rows(&self) -> Vec<Vec<f64>> {
        self.0.borrow().rows.clone()
    }

    /// Set an attribute; writing the same key again replaces the value.
    pub fn add_attribute(&self, key: &str, value: impl Into<AttrValue>) {
        self.0.borrow_mut().attrs.insert(key.to_owned(), value.into());
    }

    pub fn attribute(&self, key: &str) -> Option<AttrValue> {
        self.0.borrow().attrs.get(key).cloned()
    }

    pub fn attributes(&self) -> BTreeMap<String, AttrValue> {
        self.0.borrow().attrs.clone()
    }
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.0.borrow();
        f.debug_struct("Dataset")
            .field("name", &node.name)
            .field("capacity", &node.capacity)
            .field("len", &node.rows.len())
            .finish()
    }
}

/// Sidecar contents of a dataset.
#[derive(Serialize, Deserialize)]
struct DatasetMeta {
    capacity: Vec<usize>,
    #[serde(default)]
    attrs:    Attrs,
}

// ── Group ─────────────────────────────────────────────────────────────────────

struct GroupNode {
    name:     String,
    groups:   BTreeMap<String, Group>,
    datasets: BTreeMap<String, Dataset>,
    attrs:    Attrs,
}

/// Handle to a group of the storage tree.
#[derive(Clone)]
pub struct Group(Rc<RefCell<GroupNode>>);

impl Group {
    fn new(name: &str) -> Self {
        Group(Rc::new(RefCell::new(GroupNode {
            name:     name.to_owned(),
            groups:   BTreeMap::new(),
            datasets: BTreeMap::new(),
            attrs:    Attrs::new(),
        })))
    }

    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    /// Open the child group `name`, creating it if absent.
    pub fn open_group(&self, name: &str) -> OutputResult<Group> {
        check_name("group", name)?;
        let mut node = self.0.borrow_mut();
        let group = node.groups.entry(name.to_owned()).or_insert_with(|| {
            tracing::debug!(target: DATA_IO, group = name, "group created");
            Group::new(name)
        });
        Ok(group.clone())
    }

    /// Open the dataset `name`, creating it with `capacity` if absent.
    ///
    /// `capacity[0]` is the number of time slices reserved; the remaining
    /// entries give the shape of one slice.  Opening an existing dataset
    /// with a different capacity fails.
    pub fn open_dataset(&self, name: &str, capacity: &[usize]) -> OutputResult<Dataset> {
        check_name("dataset", name)?;
        if capacity.is_empty() {
            return Err(OutputError::Storage(format!("dataset `{name}` needs at least a time dimension")));
        }
        let mut node = self.0.borrow_mut();
        if let Some(existing) = node.datasets.get(name) {
            if existing.capacity() != capacity {
                return Err(OutputError::Storage(format!(
                    "dataset `{name}` exists with capacity {:?}, requested {capacity:?}",
                    existing.capacity()
                )));
            }
            return Ok(existing.clone());
        }
        let dset = Dataset::new(name, capacity.to_vec());
        node.datasets.insert(name.to_owned(), dset.clone());
        tracing::debug!(target: DATA_IO, dataset = name, ?capacity, "dataset created");
        Ok(dset)
    }

    pub fn group(&self, name: &str) -> Option<Group> {
        self.0.borrow().groups.get(name).cloned()
    }

    pub fn dataset(&self, name: &str) -> Option<Dataset> {
        self.0.borrow().datasets.get(name).cloned()
    }

    pub fn group_names(&self) -> Vec<String> {
        self.0.borrow().groups.keys().cloned().collect()
    }

    pub fn dataset_names(&self) -> Vec<String> {
        self.0.borrow().datasets.keys().cloned().collect()
    }

    /// Set an attribute; writing the same key again replaces the value.
    pub fn add_attribute(&self, key: &str, value: impl Into<AttrValue>) {
        self.0.borrow_mut().attrs.insert(key.to_owned(), value.into());
    }

    pub fn attribute(&self, key: &str) -> Option<AttrValue> {
        self.0.borrow().attrs.get(key).cloned()
    }

    fn persist(&self, dir: &Path) -> OutputResult<()> {
        fs::create_dir_all(dir)?;
        let node = self.0.borrow();
        if !node.attrs.is_empty() {
            fs::write(dir.join(ATTRS_FILE), serde_yaml::to_string(&node.attrs)?)?;
        }
        for (name, dset) in &node.datasets {
            let d = dset.0.borrow();
            let mut w = csv::WriterBuilder::new()
                .has_headers(false)
                .from_path(dir.join(format!("{name}.csv")))?;
            for row in &d.rows {
                w.write_record(row.iter().map(|v| v.to_string()))?;
            }
            w.flush()?;
            let meta = DatasetMeta { capacity: d.capacity.clone(), attrs: d.attrs.clone() };
            fs::write(dir.join(format!("{name}{ATTRS_SUFFIX}")), serde_yaml::to_string(&meta)?)?;
        }
        for (name, group) in &node.groups {
            group.persist(&dir.join(name))?;
        }
        Ok(())
    }

    fn load(name: &str, dir: &Path) -> OutputResult<Group> {
        let group = Group::new(name);
        let attrs_path = dir.join(ATTRS_FILE);
        if attrs_path.exists() {
            group.0.borrow_mut().attrs = serde_yaml::from_str(&fs::read_to_string(attrs_path)?)?;
        }
        let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<Result<_, _>>()?;
        entries.sort_by_key(|e| e.file_name());
        for entry in entries {
            let path = entry.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()).map(str::to_owned) else {
                continue;
            };
            if path.is_dir() {
                let child = Group::load(&file_name, &path)?;
                group.0.borrow_mut().groups.insert(file_name, child);
            } else if let Some(stem) = file_name.strip_suffix(".csv") {
                let dset = load_dataset(stem, dir)?;
                group.0.borrow_mut().datasets.insert(stem.to_owned(), dset);
            }
        }
        Ok(group)
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.0.borrow();
        f.debug_struct("Group")
            .field("name", &node.name)
            .field("groups", &node.groups.keys().collect::<Vec<_>>())
            .field("datasets", &node.datasets.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn load_dataset(name: &str, dir: &Path) -> OutputResult<Dataset> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(dir.join(format!("{name}.csv")))?;
    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let row = record
            .iter()
            .map(|s| {
                s.parse::<f64>().map_err(|e| {
                    OutputError::Storage(format!("dataset `{name}`: cannot parse {s:?} as a number: {e}"))
                })
            })
            .collect::<OutputResult<Vec<f64>>>()?;
        rows.push(row);
    }
    let meta_path = dir.join(format!("{name}{ATTRS_SUFFIX}"));
    let meta = if meta_path.exists() {
        serde_yaml::from_str::<DatasetMeta>(&fs::read_to_string(meta_path)?)?
    } else {
        let slice = rows.first().map_or(0, Vec::len);
        DatasetMeta { capacity: vec![rows.len(), slice], attrs: Attrs::new() }
    };
    let dset = Dataset::new(name, meta.capacity);
    {
        let mut node = dset.0.borrow_mut();
        node.rows = rows;
        node.attrs = meta.attrs;
    }
    Ok(dset)
}

// ── StorageFile ───────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FileMode {
    Write,
    Read,
}

/// The storage tree of one model hierarchy.
pub struct StorageFile {
    path:   PathBuf,
    root:   Group,
    mode:   FileMode,
    closed: bool,
}

impl StorageFile {
    /// Start a new, empty file at `path` (a directory).  Existing content
    /// below `path` is overwritten on close.
    pub fn create(path: impl Into<PathBuf>) -> OutputResult<Self> {
        let path = path.into();
        fs::create_dir_all(&path).map_err(|e| {
            OutputError::Storage(format!("cannot create storage file at {}: {e}", path.display()))
        })?;
        tracing::info!(target: DATA_IO, path = %path.display(), "storage file created");
        Ok(Self { path, root: Group::new(""), mode: FileMode::Write, closed: false })
    }

    /// Load a previously closed file.  The result is read-only: closing it
    /// writes nothing.
    pub fn open_read(path: impl Into<PathBuf>) -> OutputResult<Self> {
        let path = path.into();
        if !path.is_dir() {
            return Err(OutputError::Storage(format!("no storage file at {}", path.display())));
        }
        let root = Group::load("", &path)?;
        tracing::debug!(target: DATA_IO, path = %path.display(), "storage file opened for reading");
        Ok(Self { path, root, mode: FileMode::Read, closed: false })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> Group {
        self.root.clone()
    }

    /// Write the tree to disk.  Idempotent.
    pub fn close(&mut self) -> OutputResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.mode == FileMode::Write {
            self.root.persist(&self.path)?;
            tracing::info!(target: DATA_IO, path = %self.path.display(), "storage file closed");
        }
        Ok(())
    }
}

impl Drop for StorageFile {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!(target: DATA_IO, path = %self.path.display(), "failed to write storage file: {e}");
        }
    }
}
