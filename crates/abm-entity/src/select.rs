//! Entity selection.
//!
//! Every selector returns ids in arena order, independent of how the subset
//! was drawn.
//!
//! | Mode               | Cells | Agents | Parameters                              |
//! |--------------------|:-----:|:------:|-----------------------------------------|
//! | `sample`           |   ✓   |   ✓    | `num_cells` / `num_agents`              |
//! | `probability`      |   ✓   |   ✓    | `probability`                           |
//! | `position`         |   ✓   |        | `positions: [[x, y], ...]`              |
//! | `boundary`         |   ✓   |        | `boundary: all\|left\|right\|...`       |
//! | `lanes`            |   ✓   |        | `num_vertical`, `num_horizontal`        |
//! | `clustered_simple` |   ✓   |        | `p_seed`, `p_attach`, `num_passes`      |
//!
//! Predicate selection (`CellManager::select_if` and [`condition`]) is only
//! available from code.

use serde::Deserialize;

use abm_core::{AgentId, CellId, Config, SimRng};
use abm_space::{BoundarySelect, GridStructure, Position};

use crate::agent::AgentManager;
use crate::cell::CellManager;
use crate::traits::EntityTraits;
use crate::{EntityError, EntityResult};

/// Selection modes available from configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectMode {
    Sample,
    Probability,
    Position,
    Boundary,
    Lanes,
    ClusteredSimple,
}

// ── Generic selectors ─────────────────────────────────────────────────────────

/// Ids whose entity satisfies `pred`, in source order.
pub fn condition<E, I>(entities: &[E], mut id_of: impl FnMut(&E) -> I, mut pred: impl FnMut(&E) -> bool) -> Vec<I> {
    entities.iter().filter(|e| pred(e)).map(|e| id_of(e)).collect()
}

/// `n` distinct ids drawn uniformly, returned in source order.
pub fn sample<I: Copy>(ids: &[I], n: usize, rng: &mut SimRng) -> EntityResult<Vec<I>> {
    if n > ids.len() {
        return Err(EntityError::InvalidArgument(format!(
            "cannot sample {n} entities from a population of {}",
            ids.len()
        )));
    }
    let mut picked = rand::seq::index::sample(rng.inner(), ids.len(), n).into_vec();
    picked.sort_unstable();
    Ok(picked.into_iter().map(|i| ids[i]).collect())
}

/// Each id independently with probability `p`.
pub fn probability<I: Copy>(ids: &[I], p: f64, rng: &mut SimRng) -> EntityResult<Vec<I>> {
    check_probability("probability", p)?;
    if p == 0.0 {
        return Ok(vec![]);
    }
    if p == 1.0 {
        return Ok(ids.to_vec());
    }
    Ok(ids.iter().copied().filter(|_| rng.gen_bool(p)).collect())
}

fn check_probability(name: &str, p: f64) -> EntityResult<()> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(EntityError::InvalidArgument(format!("{name} must be in [0, 1], got {p}")))
    }
}

// ── Cell-only selectors ───────────────────────────────────────────────────────

/// Grow clusters: seed cells with probability `p_seed`, then `passes` times
/// attach every neighbour of a selected cell with probability `p_attach`.
pub fn clustered_simple<T: EntityTraits, const DIM: usize>(
    cm: &CellManager<T, DIM>,
    p_seed: f64,
    p_attach: f64,
    passes: u32,
    rng: &mut SimRng,
) -> EntityResult<Vec<CellId>> {
    check_probability("p_seed", p_seed)?;
    check_probability("p_attach", p_attach)?;

    let all: Vec<CellId> = cm.ids().collect();
    let mut selected = vec![false; cm.len()];
    for id in probability(&all, p_seed, rng)? {
        selected[id.index()] = true;
    }

    for _ in 0..passes {
        let current: Vec<CellId> = all.iter().copied().filter(|c| selected[c.index()]).collect();
        for c in current {
            for &nb in cm.neighbors_of(c).iter() {
                if rng.gen_bool(p_attach) {
                    selected[nb.index()] = true;
                }
            }
        }
    }

    Ok(all.into_iter().filter(|c| selected[c.index()]).collect())
}

/// Cells containing the given positions, sorted and deduplicated.
pub fn at_positions<T: EntityTraits, const DIM: usize>(
    cm: &CellManager<T, DIM>,
    positions: &[Position<DIM>],
) -> EntityResult<Vec<CellId>> {
    let mut ids = cm.cells_at_positions(positions)?;
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

/// Evenly spaced, one-cell-wide lines across a 2D square grid.
///
/// Periodic grids place the first lane on the low boundary (`i / n` of the
/// extent); non-periodic grids keep lanes off the boundary (`(i + 1) / (n + 1)`).
pub fn lanes<T: EntityTraits, const DIM: usize>(
    cm: &CellManager<T, DIM>,
    num_vertical: u32,
    num_horizontal: u32,
) -> EntityResult<Vec<CellId>> {
    let grid = cm.grid();
    if DIM != 2 || grid.structure() != GridStructure::Square {
        return Err(EntityError::InvalidArgument(
            "lane selection needs a two-dimensional square grid".into(),
        ));
    }
    let shape = grid.shape();
    let periodic = grid.is_periodic();
    let lane_indices = |n: u32, len: u32| -> Vec<u32> {
        (0..n)
            .map(|i| {
                let frac = if periodic {
                    i as f64 / n as f64
                } else {
                    (i + 1) as f64 / (n + 1) as f64
                };
                ((frac * len as f64).floor() as u32).min(len - 1)
            })
            .collect()
    };
    let columns = lane_indices(num_vertical, shape[0]);
    let rows = lane_indices(num_horizontal, shape[1]);

    Ok(cm
        .ids()
        .filter(|&id| {
            let midx = grid.midx_of(id);
            columns.contains(&midx[0]) || rows.contains(&midx[1])
        })
        .collect())
}

// ── Config-driven selection ───────────────────────────────────────────────────

/// Select cells according to a selection node with a `mode` key.
pub fn select_cells<T: EntityTraits, const DIM: usize>(
    cm: &CellManager<T, DIM>,
    cfg: &Config,
    rng: &mut SimRng,
) -> EntityResult<Vec<CellId>> {
    let mode: SelectMode = cfg.get_as("mode")?;
    let all: Vec<CellId> = cm.ids().collect();
    match mode {
        SelectMode::Sample => {
            let n = read_count(cfg, "num_cells")?;
            sample(&all, n, rng)
        }
        SelectMode::Probability => probability(&all, cfg.get_as("probability")?, rng),
        SelectMode::Position => {
            let raw: Vec<Vec<f64>> = cfg.get_as("positions")?;
            let positions = raw
                .into_iter()
                .map(|v| {
                    <[f64; DIM]>::try_from(v.as_slice()).map_err(|_| {
                        EntityError::InvalidConfig(format!(
                            "selection position {v:?} does not have {DIM} components"
                        ))
                    })
                })
                .collect::<EntityResult<Vec<_>>>()?;
            at_positions(cm, &positions)
        }
        SelectMode::Boundary => {
            let which: String = cfg.get_as("boundary")?;
            Ok(cm.boundary_cells(which.parse::<BoundarySelect>()?)?)
        }
        SelectMode::Lanes => lanes(
            cm,
            cfg.get_as_or("num_vertical", 0u32)?,
            cfg.get_as_or("num_horizontal", 0u32)?,
        ),
        SelectMode::ClusteredSimple => {
            let passes: i64 = cfg.get_as("num_passes")?;
            let passes = u32::try_from(passes).map_err(|_| {
                EntityError::InvalidArgument(format!(
                    "num_passes must be in 0..={}, got {passes}",
                    u32::MAX
                ))
            })?;
            clustered_simple(cm, cfg.get_as("p_seed")?, cfg.get_as("p_attach")?, passes, rng)
        }
    }
}

/// Select agents according to a selection node with a `mode` key.
pub fn select_agents<T: EntityTraits, const DIM: usize>(
    am: &AgentManager<T, DIM>,
    cfg: &Config,
    rng: &mut SimRng,
) -> EntityResult<Vec<AgentId>> {
    let mode: SelectMode = cfg.get_as("mode")?;
    let all = am.ids();
    match mode {
        SelectMode::Sample => {
            let n = read_count(cfg, "num_agents")?;
            sample(&all, n, rng)
        }
        SelectMode::Probability => probability(&all, cfg.get_as("probability")?, rng),
        other => Err(EntityError::InvalidArgument(format!(
            "selection mode {other:?} is not available for agents"
        ))),
    }
}

fn read_count(cfg: &Config, key: &str) -> EntityResult<usize> {
    let n: i64 = cfg.get_as(key)?;
    usize::try_from(n)
        .map_err(|_| EntityError::InvalidArgument(format!("{key} must be non-negative, got {n}")))
}
