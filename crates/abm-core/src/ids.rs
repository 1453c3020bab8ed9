//! Typed entity ids.
//!
//! A `CellId` equals the cell's index in its arena.  An `AgentId` is a
//! manager-local counter value and is *not* an index, because agent arenas
//! compact on removal.

use std::fmt;

macro_rules! typed_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident($inner:ty);) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[derive(serde::Serialize, serde::Deserialize)]
        $vis struct $name(pub $inner);

        impl $name {
            #[inline(always)]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

typed_id! {
    /// Index of a cell in its `CellManager`, in the grid's column-major
    /// enumeration.
    pub struct CellId(u32);
}

typed_id! {
    /// Identity of an agent within one `AgentManager`.  Assigned monotonically
    /// and never reused, even after removal.
    pub struct AgentId(u64);
}
