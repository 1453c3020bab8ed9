//! Model time.
//!
//! Time is a `Tick` counter advanced by one per iteration, so the write
//! schedule arithmetic stays exact.

use std::fmt;

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    /// `true` if `self` lies on the write grid `start, start + every, ...`.
    ///
    /// `every == 0` matches `start` only.
    #[inline]
    pub fn on_interval(self, start: Tick, every: u64) -> bool {
        if self < start {
            return false;
        }
        if every == 0 {
            return self == start;
        }
        (self.0 - start.0) % every == 0
    }
}

impl std::ops::AddAssign<u64> for Tick {
    #[inline]
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}
