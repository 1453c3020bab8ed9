//! Unit tests for abm-output.

// ── Helpers ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod helpers {
    use abm_core::Tick;
    use tempfile::TempDir;

    use crate::Clock;

    pub fn tmp() -> TempDir {
        tempfile::tempdir().expect("create temp dir")
    }

    /// Minimal model: a clock and one value.
    pub struct Fake {
        pub t:     Tick,
        pub value: f64,
    }

    impl Clock for Fake {
        fn time(&self) -> Tick {
            self.t
        }
    }
}

// ── Storage ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod storage {
    use super::helpers::tmp;
    use crate::{AttrValue, OutputError, StorageFile};

    #[test]
    fn open_is_open_or_create() {
        let dir = tmp();
        let file = StorageFile::create(dir.path().join("run")).unwrap();
        let root = file.root();
        let a = root.open_group("model").unwrap();
        let b = root.open_group("model").unwrap();
        a.add_attribute("k", 1i64);
        assert_eq!(b.attribute("k"), Some(AttrValue::Int(1)));
        assert_eq!(root.group_names(), vec!["model".to_owned()]);

        let d1 = a.open_dataset("x", &[4, 2]).unwrap();
        d1.write([1.0, 2.0]).unwrap();
        let d2 = a.open_dataset("x", &[4, 2]).unwrap();
        assert_eq!(d2.len(), 1);
        assert!(matches!(a.open_dataset("x", &[5, 2]), Err(OutputError::Storage(_))));
    }

    #[test]
    fn extent_and_capacity() {
        let dir = tmp();
        let file = StorageFile::create(dir.path()).unwrap();
        let d = file.root().open_dataset("grid", &[3, 2, 2]).unwrap();
        assert_eq!(d.slice_len(), 4);
        assert_eq!(d.extent(), vec![0, 2, 2]);
        d.write([0.0, 1.0, 2.0, 3.0]).unwrap();
        assert_eq!(d.extent(), vec![1, 2, 2]);
        assert_eq!(d.capacity(), vec![3, 2, 2]);
    }

    #[test]
    fn full_dataset_and_wrong_slice_rejected() {
        let dir = tmp();
        let file = StorageFile::create(dir.path()).unwrap();
        let d = file.root().open_dataset("d", &[1, 3]).unwrap();
        assert!(matches!(d.write([1.0, 2.0]), Err(OutputError::Storage(_))));
        d.write([1.0, 2.0, 3.0]).unwrap();
        assert!(matches!(d.write([1.0, 2.0, 3.0]), Err(OutputError::Storage(_))));
    }

    #[test]
    fn write_with_and_range() {
        let dir = tmp();
        let file = StorageFile::create(dir.path()).unwrap();
        let items = [(1, 'a'), (2, 'b'), (3, 'c'), (4, 'd')];
        let d = file.root().open_dataset("d", &[3, 2]).unwrap();
        d.write_range(&items, 1, 3, |(n, _)| *n as f64).unwrap();
        assert_eq!(d.last_row(), Some(vec![2.0, 3.0]));
        assert!(d.write_range(&items, 3, 6, |(n, _)| *n as f64).is_err());
        let all = file.root().open_dataset("all", &[1, 4]).unwrap();
        all.write_with(&items, |(n, _)| f64::from(*n)).unwrap();
        assert_eq!(all.row(0), Some(vec![1.0, 2.0, 3.0, 4.0]));
    }

    #[test]
    fn attributes_are_idempotent_per_key() {
        let dir = tmp();
        let file = StorageFile::create(dir.path()).unwrap();
        let d = file.root().open_dataset("d", &[1]).unwrap();
        d.add_attribute("content", "grid");
        d.add_attribute("content", "grid");
        d.add_attribute("shape", vec![4usize, 4]);
        assert_eq!(d.attributes().len(), 2);
        d.add_attribute("content", "agents");
        assert_eq!(d.attribute("content"), Some(AttrValue::Str("agents".into())));
    }

    #[test]
    fn invalid_names() {
        let dir = tmp();
        let file = StorageFile::create(dir.path()).unwrap();
        let root = file.root();
        for bad in ["", ".hidden", "a/b", "x.attrs.yml"] {
            assert!(root.open_group(bad).is_err(), "group {bad:?}");
            assert!(root.open_dataset(bad, &[1]).is_err(), "dataset {bad:?}");
        }
        assert!(root.open_dataset("nodims", &[]).is_err());
    }

    #[test]
    fn close_then_open_read() {
        let dir = tmp();
        let path = dir.path().join("run");
        {
            let mut file = StorageFile::create(&path).unwrap();
            let model = file.root().open_group("model").unwrap();
            model.add_attribute("seed", 42i64);
            let states = model.open_group("states").unwrap().open_dataset("cells", &[5, 3]).unwrap();
            states.add_attribute("coords__time", vec![0i64, 2]);
            states.add_attribute("space_extent", [1.5, 2.0]);
            states.write([0.0, 1.0, 2.0]).unwrap();
            states.write([0.25, -1.0, 1e-3]).unwrap();
            file.close().unwrap();
            file.close().unwrap();
        }
        assert!(path.join("model").join(".attrs.yml").exists());
        assert!(path.join("model").join("states").join("cells.csv").exists());

        let file = StorageFile::open_read(&path).unwrap();
        let model = file.root().group("model").unwrap();
        assert_eq!(model.attribute("seed"), Some(AttrValue::Int(42)));
        let cells = model.group("states").unwrap().dataset("cells").unwrap();
        assert_eq!(cells.rows(), vec![vec![0.0, 1.0, 2.0], vec![0.25, -1.0, 1e-3]]);
        assert_eq!(cells.capacity(), vec![5, 3]);
        assert_eq!(cells.attribute("coords__time"), Some(AttrValue::IntVec(vec![0, 2])));
        assert_eq!(cells.attribute("space_extent"), Some(AttrValue::FloatVec(vec![1.5, 2.0])));
    }

    #[test]
    fn drop_persists() {
        let dir = tmp();
        {
            let file = StorageFile::create(dir.path()).unwrap();
            file.root().open_dataset("d", &[1, 1]).unwrap().write([7.0]).unwrap();
        }
        let file = StorageFile::open_read(dir.path()).unwrap();
        assert_eq!(file.root().dataset("d").unwrap().rows(), vec![vec![7.0]]);
    }

    #[test]
    fn open_read_missing_path() {
        let dir = tmp();
        assert!(matches!(
            StorageFile::open_read(dir.path().join("nope")),
            Err(OutputError::Storage(_))
        ));
    }
}

// ── Deciders and triggers ─────────────────────────────────────────────────────

#[cfg(test)]
mod conditions {
    use abm_core::{Config, Tick};

    use super::helpers::Fake;
    use crate::{Condition, ConditionTable, OutputError};

    fn times(c: &Condition, n: u64) -> Vec<u64> {
        (0..n).filter(|&t| c.holds(Tick(t))).collect()
    }

    fn args(yaml: &str) -> Config {
        Config::from_yaml_str(yaml).unwrap()
    }

    #[test]
    fn built_in_types() {
        let empty = Config::empty();
        assert_eq!(times(&Condition::from_args("always", &empty).unwrap(), 3), vec![0, 1, 2]);
        assert!(times(&Condition::from_args("never", &empty).unwrap(), 3).is_empty());
        assert_eq!(times(&Condition::from_args("once", &args("time: 4")).unwrap(), 10), vec![4]);
        let every = Condition::from_args("every", &args("every: 3\nstart: 2\nstop: 12")).unwrap();
        assert_eq!(times(&every, 20), vec![2, 5, 8, 11]);
        let iv = Condition::from_args("interval", &args("intervals: [[0, 3], [10, 20, 5]]")).unwrap();
        assert_eq!(times(&iv, 30), vec![0, 1, 2, 10, 15]);
    }

    #[test]
    fn bad_arguments() {
        assert!(matches!(
            Condition::from_args("every", &args("every: 0")),
            Err(OutputError::InvalidConfig(_))
        ));
        assert!(matches!(
            Condition::from_args("interval", &args("intervals: [[1, 2, 0]]")),
            Err(OutputError::InvalidConfig(_))
        ));
        assert!(matches!(Condition::from_args("once", &Config::empty()), Err(OutputError::Config(_))));
        assert!(Condition::from_args("sometimes", &Config::empty()).is_err());
    }

    #[test]
    fn table_resolves_by_type_or_name() {
        let table: ConditionTable<Fake> = ConditionTable::default();
        let model = Fake { t: Tick(6), value: 0.0 };

        let mut by_name = table.build("always", &Config::empty()).unwrap();
        assert!(by_name(&model));

        let entry = args("type: every\nargs: {every: 4}");
        let mut by_type = table.build("every_four", &entry).unwrap();
        assert!(!by_type(&model));

        assert!(table.build("mystery", &Config::empty()).is_err());
    }

    #[test]
    fn custom_type() {
        let mut table: ConditionTable<Fake> = ConditionTable::empty();
        table.register("positive", |_: &Config| {
            let f: Box<dyn FnMut(&Fake) -> bool> = Box::new(|m: &Fake| m.value > 0.0);
            Ok(f)
        });
        let mut d = table.build("positive", &Config::empty()).unwrap();
        assert!(d(&Fake { t: Tick(0), value: 1.0 }));
        assert!(!d(&Fake { t: Tick(0), value: -1.0 }));
        assert!(!table.contains("always"));
    }
}

// ── Data manager ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod manager {
    use abm_core::{Config, Tick};

    use super::helpers::{Fake, tmp};
    use crate::{ConditionTable, DataManager, OutputError, StorageFile, WriteTask};

    /// Writes the model time into `<task>/data_<t0>`.
    fn time_task(name: &'static str) -> WriteTask<Fake> {
        WriteTask::new(
            move |parent| parent.open_group(name),
            |group, m: &Fake| group.open_dataset(&format!("data_{}", m.t.0), &[100, 1]),
            |dset, m: &Fake| dset.write([m.t.0 as f64]),
        )
    }

    fn build(yaml: &str, file: &StorageFile, tasks: Vec<&'static str>) -> Result<DataManager<Fake>, OutputError> {
        let cfg = Config::from_yaml_str(yaml).unwrap();
        let table = ConditionTable::default();
        DataManager::from_config(
            &cfg,
            file.root(),
            tasks.into_iter().map(|n| (n.to_owned(), time_task(n))),
            &table,
            &table,
        )
    }

    fn run(dm: &mut DataManager<Fake>, steps: u64) {
        let mut m = Fake { t: Tick(0), value: 0.0 };
        dm.invoke_initial(&m).unwrap();
        for _ in 0..steps {
            m.t += 1;
            dm.invoke(&m).unwrap();
        }
    }

    const BASIC: &str = "
tasks:
  t: {decider: every_3, trigger: start}
deciders:
  every_3: {type: every, args: {every: 3}}
triggers:
  start: {type: once, args: {time: 0}}
";

    #[test]
    fn writes_on_decider_steps() {
        let dir = tmp();
        let file = StorageFile::create(dir.path()).unwrap();
        let mut dm = build(BASIC, &file, vec!["t"]).unwrap();
        run(&mut dm, 9);
        let rows = dm.task("t").unwrap().active_dataset().unwrap().rows();
        assert_eq!(rows, vec![vec![0.0], vec![3.0], vec![6.0], vec![9.0]]);
    }

    #[test]
    fn trigger_replaces_active_dataset() {
        let dir = tmp();
        let file = StorageFile::create(dir.path()).unwrap();
        let yaml = "
tasks:
  t: {decider: always, trigger: every_5}
deciders:
  always: {}
triggers:
  every_5: {type: every, args: {every: 5}}
";
        let mut dm = build(yaml, &file, vec!["t"]).unwrap();
        run(&mut dm, 7);
        let group = file.root().group("t").unwrap();
        assert_eq!(group.dataset_names(), vec!["data_0".to_owned(), "data_5".to_owned()]);
        assert_eq!(group.dataset("data_0").unwrap().len(), 5);
        assert_eq!(group.dataset("data_5").unwrap().len(), 3);
    }

    #[test]
    fn no_trigger_no_write() {
        let dir = tmp();
        let file = StorageFile::create(dir.path()).unwrap();
        let yaml = "
tasks:
  t: {decider: always, trigger: late}
deciders:
  always: {}
triggers:
  late: {type: once, args: {time: 100}}
";
        let mut dm = build(yaml, &file, vec!["t"]).unwrap();
        run(&mut dm, 5);
        assert!(dm.task("t").unwrap().active_dataset().is_none());
        assert!(file.root().group_names().is_empty());
    }

    #[test]
    fn missing_sub_nodes() {
        let dir = tmp();
        let file = StorageFile::create(dir.path()).unwrap();
        for (yaml, missing) in [
            ("deciders: {}\ntriggers: {}", "tasks"),
            ("tasks: {}\ntriggers: {}", "deciders"),
            ("tasks: {}\ndeciders: {}", "triggers"),
        ] {
            match build(yaml, &file, vec![]) {
                Err(OutputError::MissingConfig(key)) => assert_eq!(key, missing),
                other => panic!("expected MissingConfig, got {:?}", other.err()),
            }
        }
    }

    #[test]
    fn unknown_association() {
        let dir = tmp();
        let file = StorageFile::create(dir.path()).unwrap();
        let yaml = "
tasks:
  t: {decider: nope, trigger: start}
deciders:
  always: {}
triggers:
  start: {type: once, args: {time: 0}}
";
        match build(yaml, &file, vec!["t"]) {
            Err(OutputError::UnknownAssociation { task, kind, name }) => {
                assert_eq!((task.as_str(), kind, name.as_str()), ("t", "decider", "nope"));
            }
            other => panic!("expected UnknownAssociation, got {:?}", other.err()),
        }
    }

    #[test]
    fn inactive_tasks_skipped() {
        let dir = tmp();
        let file = StorageFile::create(dir.path()).unwrap();
        let yaml = "
tasks:
  a: {decider: always, trigger: start}
  b: {decider: always, trigger: start, active: false}
deciders:
  always: {}
triggers:
  start: {type: once, args: {time: 0}}
";
        let dm = build(yaml, &file, vec!["a", "b"]).unwrap();
        assert_eq!(dm.task_names(), vec!["a"]);
        assert_eq!(dm.decider_to_tasks()["always"], vec!["a".to_owned()]);
        assert_eq!(dm.trigger_to_tasks()["start"], vec!["a".to_owned()]);
    }

    #[test]
    fn configured_task_without_implementation() {
        let dir = tmp();
        let file = StorageFile::create(dir.path()).unwrap();
        assert!(matches!(build(BASIC, &file, vec![]), Err(OutputError::InvalidConfig(_))));
    }

    #[test]
    fn attribute_writers_run_once() {
        let dir = tmp();
        let file = StorageFile::create(dir.path()).unwrap();
        let mut dm: DataManager<Fake> = DataManager::new(file.root());
        dm.add_decider("always", Box::new(|_: &Fake| true));
        dm.add_trigger("always", Box::new(|_: &Fake| true));
        let task = time_task("t")
            .with_group_attrs(|g, m: &Fake| {
                g.add_attribute("created_at", m.t.0);
                Ok(())
            })
            .with_dataset_attrs(|d, m: &Fake| {
                d.add_attribute("t0", m.t.0);
                Ok(())
            });
        dm.add_task("t", task, "always", "always").unwrap();
        run(&mut dm, 2);
        let group = file.root().group("t").unwrap();
        assert_eq!(group.attribute("created_at"), Some(crate::AttrValue::Int(0)));
        assert_eq!(group.dataset("data_2").unwrap().attribute("t0"), Some(crate::AttrValue::Int(2)));
        assert!(dm.add_task("t", time_task("t"), "always", "always").is_err());
    }
}
