//! Unit tests for abm-rule.

// ── Helpers ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod helpers {
    use abm_core::SimRng;
    use abm_entity::{CellManager, EntityTraits, StateInit, UpdateMode};
    use abm_space::{Grid, GridConfig, GridStructure, Neighborhood, Space};

    pub struct SyncCount;
    impl EntityTraits for SyncCount {
        type State = i64;
        type Tags = ();
        const MODE: UpdateMode = UpdateMode::Sync;
    }

    pub struct AsyncCount;
    impl EntityTraits for AsyncCount {
        type State = i64;
        type Tags = ();
        const MODE: UpdateMode = UpdateMode::Async;
    }

    /// A line of `states.len()` cells with von Neumann neighbours.
    pub fn line<T: EntityTraits<State = i64>>(states: &[i64], periodic: bool) -> CellManager<T, 1> {
        let space = Space::new([states.len() as f64], periodic).unwrap();
        let grid = Grid::new(space, &GridConfig::new(GridStructure::Square, 1)).unwrap();
        let mut cm = CellManager::new(grid, &StateInit::explicit(0), None, &mut SimRng::new(0)).unwrap();
        cm.set_neighborhood(Neighborhood::von_neumann(1), true).unwrap();
        for (c, &s) in cm.cells_mut().iter_mut().zip(states) {
            *c.state_mut() = s;
        }
        cm
    }
}

// ── Sequential dispatch ───────────────────────────────────────────────────────

#[cfg(test)]
mod sequential {
    use std::cell::RefCell;

    use abm_core::{CellId, SimRng};
    use abm_entity::{Cell, CellManager, EntityError};

    use super::helpers::{AsyncCount, SyncCount, line};
    use crate::{ExecPolicy, Shuffle, Update, apply_rule, apply_rule_on_all, apply_rule_par};

    fn neighbor_sum<T: abm_entity::EntityTraits<State = i64>>(c: &Cell<T>, cm: &CellManager<T, 1>) -> i64 {
        cm.neighbor_states(c.id()).sum()
    }

    #[test]
    fn sync_sees_snapshot() {
        let mut rng = SimRng::new(0);
        let mut cm = line::<SyncCount>(&[0, 1, 0], false);
        apply_rule_on_all(Update::Sync, Shuffle::Off, neighbor_sum::<SyncCount>, &mut cm, &mut rng);
        assert_eq!(cm.states(), vec![1, 0, 1]);
        apply_rule_on_all(Update::Sync, Shuffle::Off, neighbor_sum::<SyncCount>, &mut cm, &mut rng);
        assert_eq!(cm.states(), vec![0, 2, 0]);
        assert!(cm.cells().iter().all(|c| c.state_next().is_none()));
    }

    #[test]
    fn sync_shuffle_does_not_change_result() {
        let mut rng = SimRng::new(4);
        let mut plain = line::<SyncCount>(&[3, 1, 4, 1, 5, 9, 2, 6], true);
        let mut shuffled = line::<SyncCount>(&[3, 1, 4, 1, 5, 9, 2, 6], true);
        apply_rule_on_all(Update::Sync, Shuffle::Off, neighbor_sum::<SyncCount>, &mut plain, &mut rng);
        apply_rule_on_all(Update::Sync, Shuffle::On, neighbor_sum::<SyncCount>, &mut shuffled, &mut rng);
        assert_eq!(plain.states(), shuffled.states());
    }

    #[test]
    fn async_sees_earlier_writes() {
        let mut rng = SimRng::new(0);
        let mut cm = line::<AsyncCount>(&[0, 1, 0], false);
        apply_rule_on_all(Update::Async, Shuffle::Off, neighbor_sum::<AsyncCount>, &mut cm, &mut rng);
        // cell 0 -> 1, cell 1 -> 1 + 0, cell 2 -> 1
        assert_eq!(cm.states(), vec![1, 1, 1]);
    }

    #[test]
    fn async_shuffle_visits_each_once_in_random_order() {
        let mut rng = SimRng::new(21);
        let mut cm = line::<AsyncCount>(&[0; 20], false);
        let visited = RefCell::new(Vec::new());
        apply_rule_on_all(
            Update::Async,
            Shuffle::On,
            |c: &Cell<AsyncCount>, _: &CellManager<AsyncCount, 1>| {
                visited.borrow_mut().push(c.id());
                c.state() + 1
            },
            &mut cm,
            &mut rng,
        );
        assert_eq!(cm.states(), vec![1; 20]);
        let mut order = visited.into_inner();
        let in_order: Vec<CellId> = (0..20).map(CellId).collect();
        assert_ne!(order, in_order);
        order.sort();
        assert_eq!(order, in_order);
    }

    #[test]
    fn subset_only() {
        let mut rng = SimRng::new(0);
        let mut cm = line::<SyncCount>(&[5, 5, 5, 5], false);
        apply_rule(
            Update::Sync,
            Shuffle::Off,
            |c: &Cell<SyncCount>, _: &CellManager<SyncCount, 1>| c.state() * 2,
            &[CellId(1), CellId(3)],
            &mut cm,
            &mut rng,
        )
        .unwrap();
        assert_eq!(cm.states(), vec![5, 10, 5, 10]);
    }

    #[test]
    fn repeated_id_is_visited_once() {
        let mut rng = SimRng::new(0);
        let mut cm = line::<AsyncCount>(&[0, 0, 0], false);
        let increment = |c: &Cell<AsyncCount>, _: &CellManager<AsyncCount, 1>| c.state() + 1;
        apply_rule(Update::Async, Shuffle::On, increment, &[CellId(1), CellId(2), CellId(1)], &mut cm, &mut rng)
            .unwrap();
        assert_eq!(cm.states(), vec![0, 1, 1]);

        apply_rule_par(ExecPolicy::Parallel, Update::Async, increment, &[CellId(0), CellId(0)], &mut cm).unwrap();
        assert_eq!(cm.states(), vec![1, 1, 1]);
    }

    #[test]
    fn foreign_id_fails_before_any_write() {
        let mut rng = SimRng::new(0);
        let mut cm = line::<AsyncCount>(&[1, 1, 1], false);
        let err = apply_rule(
            Update::Async,
            Shuffle::Off,
            |_: &Cell<AsyncCount>, _: &CellManager<AsyncCount, 1>| 0,
            &[CellId(0), CellId(7)],
            &mut cm,
            &mut rng,
        )
        .unwrap_err();
        assert!(matches!(err, EntityError::InvalidCellState { cell: CellId(7), .. }));
        assert_eq!(cm.states(), vec![1, 1, 1]);
    }

    #[test]
    fn rules_in_sequence_are_independent_dispatches() {
        let mut rng = SimRng::new(0);
        let mut cm = line::<SyncCount>(&[1, 2, 3], false);
        let add_one = |c: &Cell<SyncCount>, _: &CellManager<SyncCount, 1>| c.state() + 1;
        let double = |c: &Cell<SyncCount>, _: &CellManager<SyncCount, 1>| c.state() * 2;
        apply_rule_on_all(Update::Sync, Shuffle::Off, add_one, &mut cm, &mut rng);
        apply_rule_on_all(Update::Sync, Shuffle::Off, double, &mut cm, &mut rng);
        assert_eq!(cm.states(), vec![4, 6, 8]);
    }
}

// ── Agents ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod agents {
    use abm_core::{AgentId, SimRng};
    use abm_entity::{Agent, AgentManager, EntityError};
    use abm_space::Space;

    use super::helpers::SyncCount;
    use crate::{Shuffle, Update, apply_rule, apply_rule_on_all};

    #[test]
    fn sync_dispatch_commits_staged_moves() {
        let mut rng = SimRng::new(0);
        let mut am: AgentManager<SyncCount, 2> = AgentManager::new(Space::new([4.0, 4.0], false).unwrap());
        let a = am.add_agent(1, [1.0, 1.0]).unwrap();
        am.move_to(a, [2.0, 2.0]).unwrap();
        apply_rule_on_all(
            Update::Sync,
            Shuffle::Off,
            |ag: &Agent<SyncCount, 2>, _: &AgentManager<SyncCount, 2>| ag.state() + 1,
            &mut am,
            &mut rng,
        );
        let agent = am.agent(a).unwrap();
        assert_eq!(*agent.state(), 2);
        assert_eq!(agent.position(), &[2.0, 2.0]);
    }

    #[test]
    fn removed_agent_is_invalid() {
        let mut rng = SimRng::new(0);
        let mut am: AgentManager<SyncCount, 2> = AgentManager::new(Space::new([4.0, 4.0], false).unwrap());
        let a = am.add_agent(1, [1.0, 1.0]).unwrap();
        am.remove_agent(a).unwrap();
        let err = apply_rule(
            Update::Sync,
            Shuffle::Off,
            |ag: &Agent<SyncCount, 2>, _: &AgentManager<SyncCount, 2>| *ag.state(),
            &[a],
            &mut am,
            &mut rng,
        )
        .unwrap_err();
        assert!(matches!(err, EntityError::InvalidAgent(AgentId(0))));
    }

    #[test]
    fn agents_read_each_other() {
        let mut rng = SimRng::new(0);
        let mut am: AgentManager<SyncCount, 2> = AgentManager::new(Space::new([4.0, 4.0], false).unwrap());
        for s in [1, 2, 3] {
            am.add_agent(s, [0.0, 0.0]).unwrap();
        }
        apply_rule_on_all(
            Update::Sync,
            Shuffle::On,
            |ag: &Agent<SyncCount, 2>, am: &AgentManager<SyncCount, 2>| {
                am.agents().iter().map(|o| o.state()).sum::<i64>() - ag.state()
            },
            &mut am,
            &mut rng,
        );
        let states: Vec<i64> = am.agents().iter().map(|a| *a.state()).collect();
        assert_eq!(states, vec![5, 4, 3]);
    }
}

// ── Parallel and random dispatch ──────────────────────────────────────────────

#[cfg(test)]
mod parallel {
    use abm_core::{CellId, Config, EntityRng, SimRng};
    use abm_entity::{Cell, CellManager};

    use super::helpers::{AsyncCount, SyncCount, line};
    use crate::{
        ExecPolicy, ParallelSettings, Shuffle, Update, apply_rule_on_all, apply_rule_par, apply_rule_with_rng,
    };

    fn ids(n: u32) -> Vec<CellId> {
        (0..n).map(CellId).collect()
    }

    fn sum(c: &Cell<SyncCount>, cm: &CellManager<SyncCount, 1>) -> i64 {
        cm.neighbor_states(c.id()).sum()
    }

    #[test]
    fn par_matches_sequential_sync() {
        let init: Vec<i64> = (0..64).map(|i| (i * 7) % 11).collect();
        let mut seq = line::<SyncCount>(&init, true);
        let mut par = line::<SyncCount>(&init, true);
        apply_rule_on_all(Update::Sync, Shuffle::Off, sum, &mut seq, &mut SimRng::new(0));
        apply_rule_par(ExecPolicy::Parallel, Update::Sync, sum, &ids(64), &mut par).unwrap();
        assert_eq!(seq.states(), par.states());
    }

    #[test]
    fn sequential_policy_keeps_async_semantics() {
        let mut cm = line::<AsyncCount>(&[0, 1, 0], false);
        apply_rule_par(
            ExecPolicy::Sequential,
            Update::Async,
            |c: &Cell<AsyncCount>, cm: &CellManager<AsyncCount, 1>| cm.neighbor_states(c.id()).sum(),
            &ids(3),
            &mut cm,
        )
        .unwrap();
        assert_eq!(cm.states(), vec![1, 1, 1]);
    }

    fn noisy(c: &Cell<SyncCount>, _: &CellManager<SyncCount, 1>, rng: &mut EntityRng) -> i64 {
        *c.state() + rng.gen_range(0..1000i64)
    }

    #[test]
    fn random_rule_is_reproducible_across_policies() {
        let mut a = line::<SyncCount>(&[0; 32], false);
        let mut b = line::<SyncCount>(&[0; 32], false);
        apply_rule_with_rng(ExecPolicy::Sequential, Update::Sync, noisy, &ids(32), &mut a, &mut SimRng::new(8))
            .unwrap();
        apply_rule_with_rng(ExecPolicy::Parallel, Update::Sync, noisy, &ids(32), &mut b, &mut SimRng::new(8))
            .unwrap();
        assert_eq!(a.states(), b.states());
        let mut distinct = a.states();
        distinct.sort_unstable();
        distinct.dedup();
        assert!(distinct.len() > 1);
    }

    #[test]
    fn random_rule_depends_on_model_rng() {
        let mut a = line::<SyncCount>(&[0; 16], false);
        let mut b = line::<SyncCount>(&[0; 16], false);
        apply_rule_with_rng(ExecPolicy::Sequential, Update::Sync, noisy, &ids(16), &mut a, &mut SimRng::new(1))
            .unwrap();
        apply_rule_with_rng(ExecPolicy::Sequential, Update::Sync, noisy, &ids(16), &mut b, &mut SimRng::new(2))
            .unwrap();
        assert_ne!(a.states(), b.states());
    }

    #[test]
    fn settings_from_config() {
        let absent = ParallelSettings::from_config(&Config::empty()).unwrap();
        assert!(!absent.enabled);
        assert_eq!(absent.install(), ExecPolicy::Sequential);

        let cfg = Config::from_yaml_str("parallel_execution: {enabled: true, num_threads: 2}").unwrap();
        let on = ParallelSettings::from_config(&cfg).unwrap();
        assert_eq!(on, ParallelSettings { enabled: true, num_threads: Some(2) });
        let policy = on.install();
        assert_eq!(policy.runs_parallel(), cfg!(feature = "parallel"));
    }
}

// ── Properties ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod properties {
    use proptest::prelude::*;

    use abm_core::SimRng;
    use abm_entity::{Cell, CellManager};

    use super::helpers::{SyncCount, line};
    use crate::{Shuffle, Update, apply_rule_on_all};

    proptest! {
        /// A sync step on a ring equals the rule evaluated on the old states.
        #[test]
        fn sync_step_reads_only_old_states(
            init in proptest::collection::vec(-100i64..100, 3..40),
            seed in any::<u64>(),
        ) {
            let n = init.len();
            let mut cm = line::<SyncCount>(&init, true);
            apply_rule_on_all(
                Update::Sync,
                Shuffle::On,
                |c: &Cell<SyncCount>, cm: &CellManager<SyncCount, 1>| {
                    cm.neighbor_states(c.id()).sum::<i64>() - c.state()
                },
                &mut cm,
                &mut SimRng::new(seed),
            );
            let expected: Vec<i64> = (0..n)
                .map(|i| init[(i + n - 1) % n] + init[(i + 1) % n] - init[i])
                .collect();
            prop_assert_eq!(cm.states(), expected);
        }
    }
}
