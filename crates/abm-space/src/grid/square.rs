//! Rectilinear lattice in 1, 2, or 3 dimensions.
//!
//! Cells are enumerated column-major: the first multi-index component varies
//! fastest, so in 2D `id = x + y * shape[0]`.

use abm_core::log::CORE;

use crate::{BoundarySelect, Position, Space, SpaceError, SpaceResult};

/// Tolerance when checking that `extent * resolution` is integral.
const INTEGRAL_EPS: f64 = 1e-8;

#[derive(Clone, Debug)]
pub struct SquareLattice<const DIM: usize> {
    shape:       [u32; DIM],
    cell_extent: [f64; DIM],
    periodic:    bool,
}

impl<const DIM: usize> SquareLattice<DIM> {
    /// `shape[i] = round(extent[i] * resolution)`, at least 1.
    pub(crate) fn new(space: &Space<DIM>, resolution: u32) -> SpaceResult<Self> {
        let mut shape = [0u32; DIM];
        let mut cell_extent = [0.0; DIM];
        for (i, &ext) in space.extent().iter().enumerate() {
            let exact = ext * resolution as f64;
            let n = exact.round();
            if n < 1.0 {
                return Err(SpaceError::InvalidConfig(format!(
                    "resolution {resolution} yields no cells along axis {i} (extent {ext})"
                )));
            }
            if n > u32::MAX as f64 {
                return Err(SpaceError::InvalidConfig(format!(
                    "resolution {resolution} yields too many cells along axis {i}"
                )));
            }
            if (exact - n).abs() > INTEGRAL_EPS {
                tracing::warn!(
                    target: CORE,
                    "extent {ext} * resolution {resolution} is not integral along axis {i}; \
                     cells will not be exactly square"
                );
            }
            shape[i] = n as u32;
            cell_extent[i] = ext / n;
        }
        Ok(Self { shape, cell_extent, periodic: space.is_periodic() })
    }

    #[inline]
    pub fn shape(&self) -> [u32; DIM] {
        self.shape
    }

    pub fn num_cells(&self) -> usize {
        self.shape.iter().map(|&n| n as usize).product()
    }

    #[inline]
    pub fn cell_extent(&self) -> [f64; DIM] {
        self.cell_extent
    }

    /// Column-major multi-index of `id`.
    pub fn midx_of(&self, id: u32) -> [u32; DIM] {
        let mut rest = id;
        let mut midx = [0u32; DIM];
        for (m, &n) in midx.iter_mut().zip(&self.shape) {
            *m = rest % n;
            rest /= n;
        }
        midx
    }

    /// Id of a signed multi-index.  Periodic lattices wrap; non-periodic ones
    /// return `None` outside the shape.
    pub fn id_of(&self, midx: &[i64; DIM]) -> Option<u32> {
        let mut id: u64 = 0;
        let mut stride: u64 = 1;
        for (&m, &n) in midx.iter().zip(&self.shape) {
            let n = n as i64;
            let m = if self.periodic {
                m.rem_euclid(n)
            } else if (0..n).contains(&m) {
                m
            } else {
                return None;
            };
            id += m as u64 * stride;
            stride *= n as u64;
        }
        Some(id as u32)
    }

    /// Cell containing `p`.  `p` must already be inside the space (mapped
    /// for periodic spaces); high-boundary points land in the last cell.
    pub fn cell_at(&self, p: &Position<DIM>) -> u32 {
        let mut midx = [0i64; DIM];
        for i in 0..DIM {
            let raw = (p[i] / self.cell_extent[i]).floor() as i64;
            midx[i] = raw.clamp(0, self.shape[i] as i64 - 1);
        }
        self.id_of(&midx).unwrap_or(0)
    }

    pub fn barycenter_of(&self, id: u32) -> Position<DIM> {
        let midx = self.midx_of(id);
        let mut p = [0.0; DIM];
        for i in 0..DIM {
            p[i] = (midx[i] as f64 + 0.5) * self.cell_extent[i];
        }
        p
    }

    /// Corner points.  In 2D they are listed counter-clockwise starting at
    /// the low corner; otherwise in binary order of the high/low choice.
    pub fn vertices_of(&self, id: u32) -> Vec<Position<DIM>> {
        let midx = self.midx_of(id);
        let corner = |bits: u32| {
            let mut p = [0.0; DIM];
            for i in 0..DIM {
                let hi = (bits >> i) & 1;
                p[i] = (midx[i] + hi) as f64 * self.cell_extent[i];
            }
            p
        };
        if DIM == 2 {
            [0b00, 0b01, 0b11, 0b10].into_iter().map(corner).collect()
        } else {
            (0..(1u32 << DIM)).map(corner).collect()
        }
    }

    /// `true` if `p` lies in the half-open box of `id` (closed at the high
    /// boundary of the space for non-periodic lattices).
    pub fn box_contains(&self, id: u32, p: &Position<DIM>) -> bool {
        let midx = self.midx_of(id);
        (0..DIM).all(|i| {
            let lo = midx[i] as f64 * self.cell_extent[i];
            let hi = lo + self.cell_extent[i];
            let last = midx[i] + 1 == self.shape[i];
            p[i] >= lo && (p[i] < hi || (last && !self.periodic && p[i] <= hi))
        })
    }

    pub fn boundary_cells(&self, which: BoundarySelect) -> SpaceResult<Vec<u32>> {
        if self.periodic {
            return Ok(vec![]);
        }
        let faces: Vec<(usize, bool)> = match which.face() {
            Some((axis, high)) => {
                if axis >= DIM {
                    return Err(SpaceError::InvalidConfig(format!(
                        "boundary `{which}` does not exist in {DIM}D"
                    )));
                }
                vec![(axis, high)]
            }
            None => (0..DIM).flat_map(|a| [(a, false), (a, true)]).collect(),
        };
        Ok((0..self.num_cells() as u32)
            .filter(|&id| {
                let midx = self.midx_of(id);
                faces.iter().any(|&(axis, high)| {
                    if high {
                        midx[axis] + 1 == self.shape[axis]
                    } else {
                        midx[axis] == 0
                    }
                })
            })
            .collect())
    }

    /// Neighbours whose offset satisfies `keep(offset)`, sorted by id.
    fn neighbors_by_offset(&self, id: u32, distance: u32, keep: impl Fn(&[i64; DIM]) -> bool) -> Vec<u32> {
        let center = self.midx_of(id);
        let d = distance as i64;
        let side = (2 * d + 1) as usize;
        let total = side.pow(DIM as u32);

        let mut out = Vec::with_capacity(total.saturating_sub(1));
        for k in 0..total {
            let mut offset = [0i64; DIM];
            let mut rest = k;
            for o in offset.iter_mut() {
                *o = (rest % side) as i64 - d;
                rest /= side;
            }
            if !keep(&offset) {
                continue;
            }
            let mut target = [0i64; DIM];
            for i in 0..DIM {
                target[i] = center[i] as i64 + offset[i];
            }
            if let Some(nb) = self.id_of(&target) {
                if nb != id {
                    out.push(nb);
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Cells within Manhattan distance `distance`.
    pub fn neighbors_von_neumann(&self, id: u32, distance: u32) -> Vec<u32> {
        self.neighbors_by_offset(id, distance, |o| {
            let l1: i64 = o.iter().map(|x| x.abs()).sum();
            l1 >= 1 && l1 <= distance as i64
        })
    }

    /// Cells within Chebyshev distance `distance`.
    pub fn neighbors_moore(&self, id: u32, distance: u32) -> Vec<u32> {
        self.neighbors_by_offset(id, distance, |o| o.iter().any(|&x| x != 0))
    }

    /// Periodic lattices need `2 * distance + 1 <= min(shape)` so no cell
    /// reaches itself or a neighbour twice through the wrap.
    pub(crate) fn check_distance(&self, distance: u32) -> SpaceResult<()> {
        if !self.periodic {
            return Ok(());
        }
        let min_shape = self.shape.iter().copied().min().unwrap_or(0) as u64;
        if 2 * distance as u64 + 1 > min_shape {
            return Err(SpaceError::InvalidNeighborhood(format!(
                "neighborhood distance {distance} is too large for periodic grid of shape {:?}; \
                 2 * distance + 1 must not exceed {min_shape}",
                self.shape
            )));
        }
        Ok(())
    }
}
