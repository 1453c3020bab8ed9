//! Cells and the `CellManager`.
//!
//! A `CellManager` owns the [`Grid`] and one [`Cell`] per grid cell, stored
//! densely so that `CellId(i)` is the index into the arena.  Cells are never
//! added or removed after construction; only their state and tags change.
//!
//! Neighbor lookups go through the grid.  After
//! [`CellManager::compute_and_store_neighbors`] they are served from a
//! per-cell cache instead, which is rebuilt whenever the neighborhood is
//! reconfigured.

use std::borrow::Cow;
use std::fmt;

use abm_core::log::CORE;
use abm_core::{CellId, Config, CoreError, SimRng};
use abm_space::{BoundarySelect, Grid, Neighborhood, Position, Space};

use crate::traits::{Entity, EntityTraits, StateInit};
use crate::{EntityError, EntityResult};

// ── Cell ──────────────────────────────────────────────────────────────────────

pub struct Cell<T: EntityTraits> {
    id:         CellId,
    state:      T::State,
    state_next: Option<T::State>,
    pub tags:   T::Tags,
}

impl<T: EntityTraits> Cell<T> {
    pub fn new(id: CellId, state: T::State) -> Self {
        Self { id, state, state_next: None, tags: T::Tags::default() }
    }

    #[inline]
    pub fn id(&self) -> CellId {
        self.id
    }

    #[inline]
    pub fn state(&self) -> &T::State {
        &self.state
    }

    #[inline]
    pub fn state_mut(&mut self) -> &mut T::State {
        &mut self.state
    }

    /// The pending sync update, if any.
    pub fn state_next(&self) -> Option<&T::State> {
        self.state_next.as_ref()
    }
}

impl<T: EntityTraits> Entity for Cell<T> {
    type Traits = T;
    type Id = CellId;

    #[inline]
    fn id(&self) -> CellId {
        self.id
    }

    #[inline]
    fn state(&self) -> &T::State {
        &self.state
    }

    #[inline]
    fn set_state(&mut self, state: T::State) {
        self.state = state;
    }

    #[inline]
    fn set_state_next(&mut self, state: T::State) {
        self.state_next = Some(state);
    }

    #[inline]
    fn commit(&mut self) {
        if let Some(next) = self.state_next.take() {
            self.state = next;
        }
    }
}

impl<T: EntityTraits> Clone for Cell<T> {
    fn clone(&self) -> Self {
        Self {
            id:         self.id,
            state:      self.state.clone(),
            state_next: self.state_next.clone(),
            tags:       self.tags.clone(),
        }
    }
}

impl<T: EntityTraits> fmt::Debug for Cell<T>
where
    T::State: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell").field("id", &self.id).field("state", &self.state).finish()
    }
}

// ── CellManager ───────────────────────────────────────────────────────────────

pub struct CellManager<T: EntityTraits, const DIM: usize> {
    grid:           Grid<DIM>,
    cells:          Vec<Cell<T>>,
    neighbor_cache: Option<Vec<Vec<CellId>>>,
}

impl<T: EntityTraits, const DIM: usize> CellManager<T, DIM> {
    /// One cell per grid cell, states produced by `init`.
    ///
    /// `params` is the `cell_params` node; it is only read by the
    /// config-based policies.
    pub fn new(
        grid: Grid<DIM>,
        init: &StateInit<T::State>,
        params: Option<&Config>,
        rng: &mut SimRng,
    ) -> EntityResult<Self> {
        let n = grid.num_cells();
        let states = init.build(
            n,
            || {
                params.cloned().ok_or_else(|| CoreError::Key {
                    key:  "cell_params".into(),
                    node: "{}".into(),
                })
            },
            rng,
        )?;
        let cells = states
            .into_iter()
            .enumerate()
            .map(|(i, s)| Cell::new(CellId(i as u32), s))
            .collect();
        tracing::info!(
            target: CORE,
            num_cells = n,
            policy = init.policy_name(),
            "cell manager set up"
        );
        Ok(Self { grid, cells, neighbor_cache: None })
    }

    /// Build from a `cell_manager` node: `grid`, optional `neighborhood`
    /// (with `compute_and_store`), and `cell_params`.
    pub fn from_config(
        space: Space<DIM>,
        cfg: &Config,
        init: &StateInit<T::State>,
        rng: &mut SimRng,
    ) -> EntityResult<Self> {
        let grid = Grid::from_config(space, &cfg.get_sub("grid")?)?;
        let mut cm = match init {
            StateInit::ConfigOnly(_) | StateInit::ConfigWithRng(_) => {
                let params = cfg.get_sub("cell_params")?;
                Self::new(grid, init, Some(&params), rng)?
            }
            _ => Self::new(grid, init, None, rng)?,
        };
        if cfg.contains("neighborhood") {
            let nb_cfg = cfg.get_sub("neighborhood")?;
            let nb = Neighborhood::from_config(&nb_cfg)?;
            let store = nb_cfg.get_as_or("compute_and_store", false)?;
            cm.set_neighborhood(nb, store)?;
        }
        Ok(cm)
    }

    // ── Access ────────────────────────────────────────────────────────────────

    #[inline]
    pub fn grid(&self) -> &Grid<DIM> {
        &self.grid
    }

    #[inline]
    pub fn space(&self) -> &Space<DIM> {
        self.grid.space()
    }

    #[inline]
    pub fn cells(&self) -> &[Cell<T>] {
        &self.cells
    }

    #[inline]
    pub fn cells_mut(&mut self) -> &mut [Cell<T>] {
        &mut self.cells
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = CellId> + '_ {
        self.cells.iter().map(|c| c.id)
    }

    pub fn cell(&self, id: CellId) -> EntityResult<&Cell<T>> {
        self.cells.get(id.index()).ok_or_else(|| invalid_cell(id))
    }

    pub fn cell_mut(&mut self, id: CellId) -> EntityResult<&mut Cell<T>> {
        self.cells.get_mut(id.index()).ok_or_else(|| invalid_cell(id))
    }

    /// Indexing without the bounds error; panics on a foreign id.
    #[inline]
    pub fn cell_unchecked(&self, id: CellId) -> &Cell<T> {
        &self.cells[id.index()]
    }

    /// Clone of every cell state in id order.
    pub fn states(&self) -> Vec<T::State> {
        self.cells.iter().map(|c| c.state.clone()).collect()
    }

    // ── Neighborhood ──────────────────────────────────────────────────────────

    pub fn neighborhood(&self) -> Neighborhood {
        self.grid.neighborhood()
    }

    /// Select a neighborhood; with `compute_and_store` every neighbor list
    /// is materialised now and served from the cache afterwards.
    pub fn set_neighborhood(&mut self, nb: Neighborhood, compute_and_store: bool) -> EntityResult<()> {
        self.grid.set_neighborhood(nb)?;
        self.neighbor_cache = None;
        if compute_and_store {
            self.compute_and_store_neighbors();
        }
        Ok(())
    }

    /// Materialise the neighbor lists of all cells.
    pub fn compute_and_store_neighbors(&mut self) {
        let cache: Vec<Vec<CellId>> =
            (0..self.cells.len()).map(|i| self.grid.neighbors_of(CellId(i as u32))).collect();
        tracing::debug!(
            target: CORE,
            neighborhood = %self.grid.neighborhood(),
            entries = cache.iter().map(Vec::len).sum::<usize>(),
            "neighbor lists computed and stored"
        );
        self.neighbor_cache = Some(cache);
    }

    #[inline]
    pub fn neighbors_are_stored(&self) -> bool {
        self.neighbor_cache.is_some()
    }

    /// Neighbor ids of `id`, sorted.  Empty for an id outside this manager.
    pub fn neighbors_of(&self, id: CellId) -> Cow<'_, [CellId]> {
        match &self.neighbor_cache {
            Some(cache) => Cow::Borrowed(cache.get(id.index()).map_or(&[][..], Vec::as_slice)),
            None => Cow::Owned(self.grid.neighbors_of(id)),
        }
    }

    pub fn neighbor_cells(&self, id: CellId) -> impl Iterator<Item = &Cell<T>> + '_ {
        let ids = self.neighbors_of(id);
        (0..ids.len()).map(move |i| &self.cells[ids[i].index()])
    }

    pub fn neighbor_states(&self, id: CellId) -> impl Iterator<Item = &T::State> + '_ {
        self.neighbor_cells(id).map(|c| &c.state)
    }

    // ── Geometry ──────────────────────────────────────────────────────────────

    pub fn cell_at(&self, p: &Position<DIM>) -> EntityResult<CellId> {
        Ok(self.grid.cell_at(p)?)
    }

    pub fn cells_at_positions(&self, positions: &[Position<DIM>]) -> EntityResult<Vec<CellId>> {
        positions.iter().map(|p| self.cell_at(p)).collect()
    }

    pub fn barycenter_of(&self, id: CellId) -> EntityResult<Position<DIM>> {
        self.cell(id)?;
        Ok(self.grid.barycenter_of(id))
    }

    pub fn boundary_cells(&self, which: BoundarySelect) -> EntityResult<Vec<CellId>> {
        Ok(self.grid.boundary_cells(which)?)
    }

    // ── Bulk state loading ────────────────────────────────────────────────────

    /// Apply one scalar per cell, in id order.  `setter` returns `false` for
    /// a value outside the state domain, which fails with
    /// `InvalidCellState` naming the first offending cell.
    ///
    /// The setter runs on a staged copy; on error no cell is changed.
    pub fn set_states_from_values<F>(&mut self, values: &[f64], mut setter: F) -> EntityResult<()>
    where
        F: FnMut(&mut Cell<T>, f64) -> bool,
    {
        if values.len() != self.cells.len() {
            return Err(EntityError::InvalidArgument(format!(
                "expected {} values (one per cell), got {}",
                self.cells.len(),
                values.len()
            )));
        }
        let mut staged = self.cells.clone();
        for (cell, &value) in staged.iter_mut().zip(values) {
            if !setter(cell, value) {
                return Err(EntityError::InvalidCellState {
                    cell:   cell.id,
                    reason: format!("value {value} is outside the allowed domain"),
                });
            }
        }
        self.cells = staged;
        Ok(())
    }

    /// Cells for which `pred` holds, in id order.
    pub fn select_if(&self, mut pred: impl FnMut(&Cell<T>) -> bool) -> Vec<CellId> {
        self.cells.iter().filter(|c| pred(c)).map(|c| c.id).collect()
    }
}

fn invalid_cell(id: CellId) -> EntityError {
    EntityError::InvalidCellState { cell: id, reason: "no such cell in this manager".into() }
}
