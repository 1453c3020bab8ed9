//! The `RuleTarget` trait — what a rule can be dispatched over.

use abm_entity::{Agent, AgentManager, Cell, CellManager, Entity, EntityError, EntityResult, EntityTraits};

/// Entity id type of a target.
pub type IdOf<R> = <<R as RuleTarget>::Entity as Entity>::Id;

/// Entity state type of a target.
pub type StateOf<R> = <<<R as RuleTarget>::Entity as Entity>::Traits as EntityTraits>::State;

/// A manager owning a dense slice of entities.
///
/// Rules receive the entity and a shared borrow of the whole target, so a
/// cell rule can read its neighbours and an agent rule can read the other
/// agents.  The dispatcher is the only writer while a dispatch runs.
pub trait RuleTarget {
    type Entity: Entity;

    fn entities(&self) -> &[Self::Entity];

    fn entities_mut(&mut self) -> &mut [Self::Entity];

    /// Slot of `id` in [`entities`](Self::entities), or the manager's
    /// "not managed here" error.
    fn slot_of(&self, id: IdOf<Self>) -> EntityResult<usize>;

    /// Stable key used to seed the entity's `EntityRng`.
    fn rng_key(entity: &Self::Entity) -> u64;
}

impl<T: EntityTraits, const DIM: usize> RuleTarget for CellManager<T, DIM> {
    type Entity = Cell<T>;

    #[inline]
    fn entities(&self) -> &[Cell<T>] {
        self.cells()
    }

    #[inline]
    fn entities_mut(&mut self) -> &mut [Cell<T>] {
        self.cells_mut()
    }

    fn slot_of(&self, id: abm_core::CellId) -> EntityResult<usize> {
        self.cell(id)?;
        Ok(id.index())
    }

    #[inline]
    fn rng_key(cell: &Cell<T>) -> u64 {
        u64::from(cell.id().0)
    }
}

impl<T: EntityTraits, const DIM: usize> RuleTarget for AgentManager<T, DIM> {
    type Entity = Agent<T, DIM>;

    #[inline]
    fn entities(&self) -> &[Agent<T, DIM>] {
        self.agents()
    }

    #[inline]
    fn entities_mut(&mut self) -> &mut [Agent<T, DIM>] {
        self.agents_mut()
    }

    fn slot_of(&self, id: abm_core::AgentId) -> EntityResult<usize> {
        self.arena().slot_of(id).ok_or(EntityError::InvalidAgent(id))
    }

    #[inline]
    fn rng_key(agent: &Agent<T, DIM>) -> u64 {
        agent.id().0
    }
}
