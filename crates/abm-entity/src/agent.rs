//! Agents, the id-stable `AgentArena`, and the `AgentManager`.
//!
//! Agents live in a dense `Vec` for iteration speed.  Removal compacts the
//! vector, so an agent's slot can change; its [`AgentId`] never does.  Ids
//! are handed out from a monotonically increasing counter and never reused,
//! and an `FxHashMap` resolves id to slot.
//!
//! # Move policy
//!
//! Chosen once from the space's periodicity:
//!
//! | Space        | Incoming position                                  |
//! |--------------|----------------------------------------------------|
//! | periodic     | wrapped into `[0, extent)` with `Space::map_into`  |
//! | non-periodic | rejected with `OutOfSpace` if outside the space    |
//!
//! A rejected move leaves the agent untouched.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::Deserialize;

use abm_core::log::CORE;
use abm_core::{AgentId, CellId, Config, CoreError, SimRng};
use abm_space::{Position, Space, SpaceError, SpaceResult};

use crate::cell::CellManager;
use crate::traits::{Entity, EntityTraits, StateInit, UpdateMode};
use crate::{EntityError, EntityResult};

// ── Agent ─────────────────────────────────────────────────────────────────────

pub struct Agent<T: EntityTraits, const DIM: usize> {
    id:            AgentId,
    state:         T::State,
    state_next:    Option<T::State>,
    position:      Position<DIM>,
    position_next: Option<Position<DIM>>,
    pub tags:      T::Tags,
}

impl<T: EntityTraits, const DIM: usize> Agent<T, DIM> {
    fn new(id: AgentId, state: T::State, position: Position<DIM>) -> Self {
        Self {
            id,
            state,
            state_next: None,
            position,
            position_next: None,
            tags: T::Tags::default(),
        }
    }

    #[inline]
    pub fn id(&self) -> AgentId {
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

    #[inline]
    pub fn position(&self) -> &Position<DIM> {
        &self.position
    }

    /// The pending sync move, if any.
    pub fn position_next(&self) -> Option<&Position<DIM>> {
        self.position_next.as_ref()
    }

    /// Sync agents stage the move; async agents move immediately.
    fn place(&mut self, p: Position<DIM>) {
        match T::MODE {
            UpdateMode::Sync => self.position_next = Some(p),
            UpdateMode::Async => self.position = p,
        }
    }

    /// The position a move is relative to: the staged one, if any.
    fn latest_position(&self) -> &Position<DIM> {
        self.position_next.as_ref().unwrap_or(&self.position)
    }
}

impl<T: EntityTraits, const DIM: usize> Entity for Agent<T, DIM> {
    type Traits = T;
    type Id = AgentId;

    #[inline]
    fn id(&self) -> AgentId {
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

    /// Moves both staged state and staged position into place.
    fn commit(&mut self) {
        if let Some(next) = self.state_next.take() {
            self.state = next;
        }
        if let Some(next) = self.position_next.take() {
            self.position = next;
        }
    }
}

impl<T: EntityTraits, const DIM: usize> fmt::Debug for Agent<T, DIM>
where
    T::State: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("position", &self.position)
            .finish()
    }
}

// ── AgentArena ────────────────────────────────────────────────────────────────

/// Dense agent storage with stable ids.
pub struct AgentArena<T: EntityTraits, const DIM: usize> {
    agents:  Vec<Agent<T, DIM>>,
    slot_of: FxHashMap<AgentId, usize>,
    next_id: u64,
}

impl<T: EntityTraits, const DIM: usize> Default for AgentArena<T, DIM> {
    fn default() -> Self {
        Self { agents: Vec::new(), slot_of: FxHashMap::default(), next_id: 0 }
    }
}

impl<T: EntityTraits, const DIM: usize> AgentArena<T, DIM> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an agent and return its freshly assigned id.
    pub fn push(&mut self, state: T::State, position: Position<DIM>) -> AgentId {
        let id = AgentId(self.next_id);
        self.next_id += 1;
        self.slot_of.insert(id, self.agents.len());
        self.agents.push(Agent::new(id, state, position));
        id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// The id the next `push` will assign.
    #[inline]
    pub fn next_id(&self) -> AgentId {
        AgentId(self.next_id)
    }

    #[inline]
    pub fn contains(&self, id: AgentId) -> bool {
        self.slot_of.contains_key(&id)
    }

    #[inline]
    pub fn slot_of(&self, id: AgentId) -> Option<usize> {
        self.slot_of.get(&id).copied()
    }

    pub fn get(&self, id: AgentId) -> Option<&Agent<T, DIM>> {
        self.slot_of(id).map(|i| &self.agents[i])
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent<T, DIM>> {
        self.slot_of(id).map(move |i| &mut self.agents[i])
    }

    #[inline]
    pub fn as_slice(&self) -> &[Agent<T, DIM>] {
        &self.agents
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [Agent<T, DIM>] {
        &mut self.agents
    }

    /// Remove one agent, keeping the order of the others.
    pub fn remove(&mut self, id: AgentId) -> Option<Agent<T, DIM>> {
        let slot = self.slot_of.remove(&id)?;
        let agent = self.agents.remove(slot);
        for (i, a) in self.agents.iter().enumerate().skip(slot) {
            self.slot_of.insert(a.id, i);
        }
        Some(agent)
    }

    /// Remove every agent matching `pred` in one pass.  Returns the number
    /// removed.
    pub fn retain(&mut self, mut keep: impl FnMut(&Agent<T, DIM>) -> bool) -> usize {
        let before = self.agents.len();
        self.agents.retain(|a| keep(a));
        if self.agents.len() != before {
            self.slot_of.clear();
            for (i, a) in self.agents.iter().enumerate() {
                self.slot_of.insert(a.id, i);
            }
        }
        before - self.agents.len()
    }
}

// ── AgentManager ──────────────────────────────────────────────────────────────

/// A resolved move policy.
pub type MovePolicy<const DIM: usize> = fn(&Space<DIM>, &Position<DIM>) -> SpaceResult<Position<DIM>>;

fn move_periodic<const DIM: usize>(space: &Space<DIM>, p: &Position<DIM>) -> SpaceResult<Position<DIM>> {
    space.map_into(p)
}

fn move_bounded<const DIM: usize>(space: &Space<DIM>, p: &Position<DIM>) -> SpaceResult<Position<DIM>> {
    if space.contains(p) {
        Ok(*p)
    } else {
        Err(SpaceError::OutOfSpace { position: p.to_vec() })
    }
}

/// Where new agents are placed.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitialPosition {
    /// Uniformly distributed over the space extent.
    Random,
}

pub struct AgentManager<T: EntityTraits, const DIM: usize> {
    space:       Space<DIM>,
    arena:       AgentArena<T, DIM>,
    move_policy: MovePolicy<DIM>,
}

impl<T: EntityTraits, const DIM: usize> AgentManager<T, DIM> {
    /// An empty manager on `space`.
    pub fn new(space: Space<DIM>) -> Self {
        let move_policy: MovePolicy<DIM> =
            if space.is_periodic() { move_periodic::<DIM> } else { move_bounded::<DIM> };
        Self { space, arena: AgentArena::new(), move_policy }
    }

    /// Build from an `agent_manager` node and populate it with
    /// `initial_num_agents` agents (see [`add_agents_from_config`]).
    ///
    /// [`add_agents_from_config`]: Self::add_agents_from_config
    pub fn from_config(
        space: Space<DIM>,
        cfg: &Config,
        init: &StateInit<T::State>,
        rng: &mut SimRng,
    ) -> EntityResult<Self> {
        let mut am = Self::new(space);
        am.add_agents_from_config(cfg, init, rng)?;
        tracing::info!(
            target: CORE,
            num_agents = am.len(),
            policy = init.policy_name(),
            periodic = am.space.is_periodic(),
            "agent manager set up"
        );
        Ok(am)
    }

    // ── Access ────────────────────────────────────────────────────────────────

    #[inline]
    pub fn space(&self) -> &Space<DIM> {
        &self.space
    }

    #[inline]
    pub fn arena(&self) -> &AgentArena<T, DIM> {
        &self.arena
    }

    #[inline]
    pub fn arena_mut(&mut self) -> &mut AgentArena<T, DIM> {
        &mut self.arena
    }

    #[inline]
    pub fn agents(&self) -> &[Agent<T, DIM>] {
        self.arena.as_slice()
    }

    #[inline]
    pub fn agents_mut(&mut self) -> &mut [Agent<T, DIM>] {
        self.arena.as_mut_slice()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Ids in arena order.
    pub fn ids(&self) -> Vec<AgentId> {
        self.arena.as_slice().iter().map(|a| a.id).collect()
    }

    pub fn agent(&self, id: AgentId) -> EntityResult<&Agent<T, DIM>> {
        self.arena.get(id).ok_or(EntityError::InvalidAgent(id))
    }

    pub fn agent_mut(&mut self, id: AgentId) -> EntityResult<&mut Agent<T, DIM>> {
        self.arena.get_mut(id).ok_or(EntityError::InvalidAgent(id))
    }

    pub fn positions(&self) -> Vec<Position<DIM>> {
        self.arena.as_slice().iter().map(|a| a.position).collect()
    }

    // ── Adding and removing ───────────────────────────────────────────────────

    /// Add one agent.  The position goes through the move policy.
    pub fn add_agent(&mut self, state: T::State, position: Position<DIM>) -> EntityResult<AgentId> {
        let position = (self.move_policy)(&self.space, &position)?;
        Ok(self.arena.push(state, position))
    }

    /// A uniformly random position inside the space.
    pub fn random_position(&self, rng: &mut SimRng) -> Position<DIM> {
        let mut p = [0.0; DIM];
        for (x, e) in p.iter_mut().zip(self.space.extent()) {
            *x = rng.gen_range(0.0..*e);
        }
        p
    }

    /// Add `n` agents with states from `init` and positions from `at`.
    ///
    /// `params` is the `agent_params` node, read only by the config-based
    /// policies.
    pub fn add_agents(
        &mut self,
        n: usize,
        init: &StateInit<T::State>,
        params: Option<&Config>,
        at: InitialPosition,
        rng: &mut SimRng,
    ) -> EntityResult<Vec<AgentId>> {
        let states = init.build(
            n,
            || {
                params.cloned().ok_or_else(|| CoreError::Key {
                    key:  "agent_params".into(),
                    node: "{}".into(),
                })
            },
            rng,
        )?;
        let mut ids = Vec::with_capacity(n);
        for state in states {
            let p = match at {
                InitialPosition::Random => self.random_position(rng),
            };
            ids.push(self.add_agent(state, p)?);
        }
        Ok(ids)
    }

    /// Read `initial_num_agents` (default 0), `initial_position` (default
    /// `random`) and `agent_params`, then add the agents.
    pub fn add_agents_from_config(
        &mut self,
        cfg: &Config,
        init: &StateInit<T::State>,
        rng: &mut SimRng,
    ) -> EntityResult<Vec<AgentId>> {
        let n: i64 = cfg.get_as_or("initial_num_agents", 0)?;
        if n < 0 {
            return Err(EntityError::InvalidConfig(format!(
                "initial_num_agents must be non-negative, got {n}"
            )));
        }
        let at: InitialPosition = cfg.get_as_or("initial_position", InitialPosition::Random)?;
        match init {
            StateInit::ConfigOnly(_) | StateInit::ConfigWithRng(_) => {
                let params = cfg.get_sub("agent_params")?;
                self.add_agents(n as usize, init, Some(&params), at, rng)
            }
            _ => self.add_agents(n as usize, init, None, at, rng),
        }
    }

    /// `InvalidAgent` if `id` is not managed here.
    pub fn remove_agent(&mut self, id: AgentId) -> EntityResult<Agent<T, DIM>> {
        self.arena.remove(id).ok_or(EntityError::InvalidAgent(id))
    }

    /// Remove all agents matching `pred` in O(n).  Returns how many went.
    pub fn erase_agents_if(&mut self, mut pred: impl FnMut(&Agent<T, DIM>) -> bool) -> usize {
        self.arena.retain(|a| !pred(a))
    }

    // ── Movement ──────────────────────────────────────────────────────────────

    /// Move `id` to `p`.  Sync agents stage the move in `position_next`.
    pub fn move_to(&mut self, id: AgentId, p: Position<DIM>) -> EntityResult<()> {
        let p = (self.move_policy)(&self.space, &p)?;
        self.agent_mut(id)?.place(p);
        Ok(())
    }

    /// Move `id` by `dv` relative to its latest position.
    pub fn move_by(&mut self, id: AgentId, dv: Position<DIM>) -> EntityResult<()> {
        let mut p = *self.agent(id)?.latest_position();
        for (x, d) in p.iter_mut().zip(dv) {
            *x += d;
        }
        self.move_to(id, p)
    }

    /// Commit staged state and position of every agent.  Only legal for
    /// sync agents.
    pub fn update_agents(&mut self) -> EntityResult<()> {
        if T::MODE != UpdateMode::Sync {
            return Err(EntityError::InvalidArgument(
                "update_agents is only available for sync agents".into(),
            ));
        }
        for a in self.arena.as_mut_slice() {
            a.commit();
        }
        Ok(())
    }

    // ── Cell lookup ───────────────────────────────────────────────────────────

    /// The cell of `cm` containing agent `id`.
    pub fn find_cell<C: EntityTraits>(&self, id: AgentId, cm: &CellManager<C, DIM>) -> EntityResult<CellId> {
        let agent = self.agent(id)?;
        cm.cell_at(&agent.position)
    }

    /// Agents located on `cell`, in arena order.
    ///
    /// Square grids use an axis-wise interval test; the other structures
    /// compare the point-location result of each agent's position.
    pub fn find_agents_on_cell<C: EntityTraits>(
        &self,
        cell: CellId,
        cm: &CellManager<C, DIM>,
    ) -> EntityResult<Vec<AgentId>> {
        cm.cell(cell)?;
        let grid = cm.grid();
        Ok(self
            .agents()
            .iter()
            .filter(|a| grid.cell_contains(cell, &a.position))
            .map(|a| a.id)
            .collect())
    }
}
