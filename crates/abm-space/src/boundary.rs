//! Named boundary selections.

use std::fmt;
use std::str::FromStr;

use crate::SpaceError;

/// A face (or all faces) of a non-periodic grid.
///
/// `left`/`right` are the low/high ends of the first axis, `bottom`/`top`
/// of the second, `front`/`back` of the third.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BoundarySelect {
    All,
    Left,
    Right,
    Bottom,
    Top,
    Front,
    Back,
}

impl BoundarySelect {
    /// `(axis, high_end)` for a single face; `None` for `All`.
    pub fn face(self) -> Option<(usize, bool)> {
        match self {
            BoundarySelect::All => None,
            BoundarySelect::Left => Some((0, false)),
            BoundarySelect::Right => Some((0, true)),
            BoundarySelect::Bottom => Some((1, false)),
            BoundarySelect::Top => Some((1, true)),
            BoundarySelect::Front => Some((2, false)),
            BoundarySelect::Back => Some((2, true)),
        }
    }
}

impl FromStr for BoundarySelect {
    type Err = SpaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(BoundarySelect::All),
            "left" => Ok(BoundarySelect::Left),
            "right" => Ok(BoundarySelect::Right),
            "bottom" => Ok(BoundarySelect::Bottom),
            "top" => Ok(BoundarySelect::Top),
            "front" => Ok(BoundarySelect::Front),
            "back" => Ok(BoundarySelect::Back),
            other => Err(SpaceError::InvalidConfig(format!(
                "unknown boundary selection {other:?}; expected one of \
                 all, left, right, bottom, top, front, back"
            ))),
        }
    }
}

impl fmt::Display for BoundarySelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BoundarySelect::All => "all",
            BoundarySelect::Left => "left",
            BoundarySelect::Right => "right",
            BoundarySelect::Bottom => "bottom",
            BoundarySelect::Top => "top",
            BoundarySelect::Front => "front",
            BoundarySelect::Back => "back",
        };
        f.write_str(name)
    }
}
