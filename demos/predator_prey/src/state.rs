//! Cell state: at most one predator and one prey per cell.

use abm_entity::{EntityTraits, UpdateMode};

/// One animal, or its absence.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Creature {
    pub on_cell:   bool,
    pub resources: f64,
}

impl Creature {
    pub fn new(resources: f64) -> Self {
        Self { on_cell: true, resources }
    }

    /// Pay `cost`; dies when nothing is left.
    pub fn pay(&mut self, cost: f64) {
        if !self.on_cell {
            return;
        }
        self.resources -= cost;
        if self.resources <= 0.0 {
            *self = Creature::default();
        }
    }

    /// Gain `intake`, capped to `[0, max]`.
    pub fn feed(&mut self, intake: f64, max: f64) {
        self.resources = (self.resources + intake).clamp(0.0, max);
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct CellState {
    pub predator: Creature,
    pub prey:     Creature,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Species {
    Predator,
    Prey,
}

impl Species {
    pub const ALL: [Species; 2] = [Species::Predator, Species::Prey];

    pub fn of(self, s: &CellState) -> &Creature {
        match self {
            Species::Predator => &s.predator,
            Species::Prey => &s.prey,
        }
    }

    pub fn of_mut(self, s: &mut CellState) -> &mut Creature {
        match self {
            Species::Predator => &mut s.predator,
            Species::Prey => &mut s.prey,
        }
    }
}

/// Cells are updated in place; movement reads earlier moves of the same
/// step.
pub struct PpCell;

impl EntityTraits for PpCell {
    type State = CellState;
    type Tags = ();
    const MODE: UpdateMode = UpdateMode::Async;
}
