//! Triangular lattice of alternating up- and down-pointing cells.
//!
//! Cell `(col, row)` points up iff `col + row` is even.  Neighbouring cells
//! in a row overlap by half a base, so the horizontal pitch is half the
//! triangle base.

use crate::{BoundarySelect, SpaceError, SpaceResult};

const SQRT3: f64 = 1.732_050_807_568_877_2;

#[derive(Clone, Debug)]
pub struct TriLattice {
    shape:    [u32; 2],
    /// Half the triangle base.
    pitch:    f64,
    /// Row height.
    height:   f64,
    periodic: bool,
}

impl TriLattice {
    /// `[base, height]` of an equilateral triangle with area `1 / resolution²`.
    pub fn ideal_cell_extent(resolution: u32) -> [f64; 2] {
        let base = (4.0 / SQRT3).sqrt() / resolution as f64;
        [base, base * SQRT3 / 2.0]
    }

    pub(crate) fn new(extent: [f64; 2], periodic: bool, resolution: u32) -> SpaceResult<Self> {
        let [base, height] = Self::ideal_cell_extent(resolution);
        let nx = (extent[0] / (base / 2.0)).round();
        let ny = (extent[1] / height).round();
        if nx < 1.0 || ny < 1.0 {
            return Err(SpaceError::InvalidConfig(format!(
                "resolution {resolution} is too low for a triangular grid on extent {extent:?}"
            )));
        }
        let (nx, ny) = (nx as u32, ny as u32);
        if periodic && (nx % 2 != 0 || ny % 2 != 0) {
            return Err(SpaceError::InvalidConfig(format!(
                "periodic triangular grids need an even shape, got [{nx}, {ny}] \
                 for extent {extent:?} at resolution {resolution}"
            )));
        }
        Ok(Self {
            shape: [nx, ny],
            pitch: extent[0] / nx as f64,
            height: extent[1] / ny as f64,
            periodic,
        })
    }

    #[inline]
    pub fn shape(&self) -> [u32; 2] {
        self.shape
    }

    pub fn num_cells(&self) -> usize {
        self.shape[0] as usize * self.shape[1] as usize
    }

    /// `[base, height]` of one cell.
    pub fn cell_extent(&self) -> [f64; 2] {
        [2.0 * self.pitch, self.height]
    }

    #[inline]
    pub fn midx_of(&self, id: u32) -> [u32; 2] {
        [id % self.shape[0], id / self.shape[0]]
    }

    #[inline]
    fn points_up(col: i64, row: i64) -> bool {
        (col + row).rem_euclid(2) == 0
    }

    pub fn id_of(&self, col: i64, row: i64) -> Option<u32> {
        let (nx, ny) = (self.shape[0] as i64, self.shape[1] as i64);
        let (col, row) = if self.periodic {
            (col.rem_euclid(nx), row.rem_euclid(ny))
        } else if (0..nx).contains(&col) && (0..ny).contains(&row) {
            (col, row)
        } else {
            return None;
        };
        Some((col + row * nx) as u32)
    }

    /// Cell containing `p`.  `p` must lie inside the space.
    ///
    /// The strip `[k, k+1) * pitch` is split by one diagonal between cell
    /// `k` (its left half) and cell `k - 1` (its right half).
    pub fn cell_at(&self, p: [f64; 2]) -> u32 {
        let (nx, ny) = (self.shape[0] as i64, self.shape[1] as i64);
        let q = p[0] / self.pitch;
        let k = (q.floor() as i64).clamp(0, nx);
        let fx = q - k as f64;
        let rv = p[1] / self.height;
        let row = (rv.floor() as i64).clamp(0, ny - 1);
        let fy = rv - row as f64;

        let in_k = if Self::points_up(k, row) { fy <= fx } else { fy >= 1.0 - fx };
        let col = if in_k { k } else { k - 1 };
        let col = if self.periodic { col } else { col.clamp(0, nx - 1) };
        self.id_of(col, row).unwrap_or(0)
    }

    pub fn barycenter_of(&self, id: u32) -> [f64; 2] {
        let [c, r] = self.midx_of(id);
        let third = if Self::points_up(c as i64, r as i64) { 1.0 / 3.0 } else { 2.0 / 3.0 };
        [(c as f64 + 1.0) * self.pitch, (r as f64 + third) * self.height]
    }

    /// The three corners, counter-clockwise.
    pub fn vertices_of(&self, id: u32) -> Vec<[f64; 2]> {
        let [c, r] = self.midx_of(id);
        let x0 = c as f64 * self.pitch;
        let (y0, y1) = (r as f64 * self.height, (r as f64 + 1.0) * self.height);
        if Self::points_up(c as i64, r as i64) {
            vec![[x0, y0], [x0 + 2.0 * self.pitch, y0], [x0 + self.pitch, y1]]
        } else {
            vec![[x0 + self.pitch, y0], [x0 + 2.0 * self.pitch, y1], [x0, y1]]
        }
    }

    pub fn boundary_cells(&self, which: BoundarySelect) -> SpaceResult<Vec<u32>> {
        if self.periodic {
            return Ok(vec![]);
        }
        if matches!(which, BoundarySelect::Front | BoundarySelect::Back) {
            return Err(SpaceError::InvalidConfig(format!(
                "boundary `{which}` does not exist on a 2D triangular grid"
            )));
        }
        let [nx, ny] = self.shape;
        Ok((0..self.num_cells() as u32)
            .filter(|&id| {
                let [c, r] = self.midx_of(id);
                match which {
                    BoundarySelect::Left => c == 0,
                    BoundarySelect::Right => c + 1 == nx,
                    BoundarySelect::Bottom => r == 0,
                    BoundarySelect::Top => r + 1 == ny,
                    _ => c == 0 || c + 1 == nx || r == 0 || r + 1 == ny,
                }
            })
            .collect())
    }

    fn collect_sorted(&self, id: u32, cells: impl Iterator<Item = (i64, i64)>) -> Vec<u32> {
        let mut out: Vec<u32> = cells
            .filter_map(|(c, r)| self.id_of(c, r))
            .filter(|&nb| nb != id)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// The three edge-sharing cells.
    pub fn neighbors_von_neumann(&self, id: u32) -> Vec<u32> {
        let [c, r] = self.midx_of(id);
        let (c, r) = (c as i64, r as i64);
        let across = if Self::points_up(c, r) { r - 1 } else { r + 1 };
        self.collect_sorted(id, [(c - 1, r), (c + 1, r), (c, across)].into_iter())
    }

    /// The twelve cells sharing at least one corner.
    pub fn neighbors_moore(&self, id: u32) -> Vec<u32> {
        let [c, r] = self.midx_of(id);
        let (c, r) = (c as i64, r as i64);
        let (base_row, apex_row) = if Self::points_up(c, r) { (r - 1, r + 1) } else { (r + 1, r - 1) };
        let same = (c - 2..=c + 2).map(move |cc| (cc, r));
        let base = (c - 2..=c + 2).map(move |cc| (cc, base_row));
        let apex = (c - 1..=c + 1).map(move |cc| (cc, apex_row));
        self.collect_sorted(id, same.chain(base).chain(apex))
    }
}
