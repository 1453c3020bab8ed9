//! The continuous, rectangular simulation domain.
//!
//! A `Space<DIM>` spans `[0, extent[i]]` on each axis.  With `periodic` set
//! the domain is a torus: every point has a canonical representative in
//! `[0, extent)` and displacements take the shortest image.

use abm_core::Config;

use crate::{SpaceError, SpaceResult};

/// A point in `DIM`-dimensional continuous space.
pub type Position<const DIM: usize> = [f64; DIM];

/// Vector norm used by [`Space::distance`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Norm {
    /// Manhattan.
    L1,
    /// Euclidean.
    L2,
    /// Chebyshev.
    LInf,
    /// General Lp, `p >= 1`.
    Lp(f64),
}

/// Continuous `DIM`-dimensional rectangular region.  Immutable after
/// construction.
#[derive(Clone, Debug, PartialEq)]
pub struct Space<const DIM: usize> {
    extent:   [f64; DIM],
    periodic: bool,
}

impl<const DIM: usize> Space<DIM> {
    /// Create a space.  Every extent component must be finite and `> 0`;
    /// `DIM` must be 1, 2, or 3.
    pub fn new(extent: [f64; DIM], periodic: bool) -> SpaceResult<Self> {
        if !(1..=3).contains(&DIM) {
            return Err(SpaceError::InvalidConfig(format!(
                "space dimension must be 1, 2, or 3, got {DIM}"
            )));
        }
        if let Some(bad) = extent.iter().find(|e| !e.is_finite() || **e <= 0.0) {
            return Err(SpaceError::InvalidConfig(format!(
                "space extent components must be positive and finite, got {bad} in {extent:?}"
            )));
        }
        Ok(Self { extent, periodic })
    }

    /// Read `extent` (default: unit extent) and `periodic` (default `false`).
    pub fn from_config(cfg: &Config) -> SpaceResult<Self> {
        let extent = if cfg.contains("extent") {
            cfg.get_as_array::<DIM>("extent")?
        } else {
            [1.0; DIM]
        };
        let periodic = cfg.get_as_or("periodic", false)?;
        Self::new(extent, periodic)
    }

    #[inline]
    pub fn dim(&self) -> usize {
        DIM
    }

    #[inline]
    pub fn extent(&self) -> &[f64; DIM] {
        &self.extent
    }

    #[inline]
    pub fn is_periodic(&self) -> bool {
        self.periodic
    }

    /// Product of the extent components.
    pub fn volume(&self) -> f64 {
        self.extent.iter().product()
    }

    /// `true` if `0 <= p[i] <= extent[i]` on every axis.
    ///
    /// The high-value boundary is included; grids clamp such points into
    /// the last cell.
    pub fn contains(&self, p: &Position<DIM>) -> bool {
        p.iter()
            .zip(&self.extent)
            .all(|(x, e)| x.is_finite() && *x >= 0.0 && *x <= *e)
    }

    /// Canonical representative of `p`.
    ///
    /// Periodic: `p - floor(p / extent) * extent` per axis, always in
    /// `[0, extent)`.  Non-periodic: `p` itself, or `OutOfSpace`.
    pub fn map_into(&self, p: &Position<DIM>) -> SpaceResult<Position<DIM>> {
        if !self.periodic {
            return if self.contains(p) {
                Ok(*p)
            } else {
                Err(SpaceError::OutOfSpace { position: p.to_vec() })
            };
        }
        if p.iter().any(|x| !x.is_finite()) {
            return Err(SpaceError::OutOfSpace { position: p.to_vec() });
        }
        let mut out = *p;
        for (x, e) in out.iter_mut().zip(&self.extent) {
            let mut m = *x - (*x / e).floor() * e;
            // Rounding can land exactly on the excluded high boundary.
            if m >= *e || m < 0.0 {
                m = 0.0;
            }
            *x = m;
        }
        Ok(out)
    }

    /// Shortest vector from `a` to `b` under the space topology.
    pub fn displacement(&self, a: &Position<DIM>, b: &Position<DIM>) -> Position<DIM> {
        let mut d = [0.0; DIM];
        for i in 0..DIM {
            let mut di = b[i] - a[i];
            if self.periodic {
                di -= (di / self.extent[i]).round() * self.extent[i];
            }
            d[i] = di;
        }
        d
    }

    /// Norm of [`displacement`](Self::displacement).
    pub fn distance(&self, a: &Position<DIM>, b: &Position<DIM>, norm: Norm) -> f64 {
        let d = self.displacement(a, b);
        match norm {
            Norm::L1 => d.iter().map(|x| x.abs()).sum(),
            Norm::L2 => d.iter().map(|x| x * x).sum::<f64>().sqrt(),
            Norm::LInf => d.iter().fold(0.0, |m, x| m.max(x.abs())),
            Norm::Lp(p) => d.iter().map(|x| x.abs().powf(p)).sum::<f64>().powf(1.0 / p),
        }
    }

    /// The point at the centre of the space.
    pub fn center(&self) -> Position<DIM> {
        let mut c = [0.0; DIM];
        for (ci, e) in c.iter_mut().zip(&self.extent) {
            *ci = e / 2.0;
        }
        c
    }
}
