//! Pointy-top hexagonal lattice in "odd-r" offset layout.
//!
//! Rows run along the first axis; every odd row is shifted right by half a
//! cell width.  Row spacing is three quarters of the cell height, so for a
//! regular hexagon of width `w` the rows are `√3/2 · w` apart and each cell
//! covers an area of `1 / resolution²`.
//!
//! ```text
//!    row 1:    / \ / \ / \
//!             | 3 | 4 | 5 |
//!    row 0:  / \ / \ / \ /
//!           | 0 | 1 | 2 |
//!            \ / \ / \ /
//! ```

use crate::{BoundarySelect, SpaceError, SpaceResult};

const SQRT3: f64 = 1.732_050_807_568_877_2;

/// Width-to-height ratio of a regular pointy-top hexagon.
pub const IDEAL_ASPECT_RATIO: f64 = SQRT3 / 2.0;

#[derive(Clone, Debug)]
pub struct HexLattice {
    shape:       [u32; 2],
    /// Cell width (flat side to flat side).
    width:       f64,
    /// Distance between two row centre lines.
    row_spacing: f64,
    periodic:    bool,
}

impl HexLattice {
    /// `[width, height]` of a regular hexagon with area `1 / resolution²`.
    pub fn ideal_cell_extent(resolution: u32) -> [f64; 2] {
        let width = (2.0 / SQRT3).sqrt() / resolution as f64;
        [width, width / IDEAL_ASPECT_RATIO]
    }

    pub(crate) fn new(
        extent: [f64; 2],
        periodic: bool,
        resolution: u32,
        aspect_tolerance: f64,
    ) -> SpaceResult<Self> {
        let [w, h] = Self::ideal_cell_extent(resolution);
        let s = 0.75 * h;
        let nx = (extent[0] / w).round();
        let ny = (extent[1] / s).round();
        if nx < 1.0 || ny < 1.0 {
            return Err(SpaceError::InvalidConfig(format!(
                "resolution {resolution} is too low for a hexagonal grid on extent {extent:?}"
            )));
        }
        let (nx, ny) = (nx as u32, ny as u32);

        if periodic && ny % 2 != 0 {
            return Err(SpaceError::InvalidConfig(format!(
                "periodic hexagonal grids need an even number of rows, but extent {} \
                 at resolution {resolution} yields {ny} rows",
                extent[1]
            )));
        }

        let width = extent[0] / nx as f64;
        let row_spacing = extent[1] / ny as f64;
        let height = row_spacing / 0.75;
        let deviation = (width / height) / IDEAL_ASPECT_RATIO - 1.0;
        if deviation.abs() > aspect_tolerance {
            return Err(SpaceError::InvalidConfig(format!(
                "hexagonal cells on extent {extent:?} at resolution {resolution} would be \
                 distorted by {:.1}% (tolerance {:.1}%); adjust extent or resolution",
                100.0 * deviation.abs(),
                100.0 * aspect_tolerance
            )));
        }

        Ok(Self { shape: [nx, ny], width, row_spacing, periodic })
    }

    #[inline]
    pub fn shape(&self) -> [u32; 2] {
        self.shape
    }

    pub fn num_cells(&self) -> usize {
        self.shape[0] as usize * self.shape[1] as usize
    }

    /// `[width, height]` of one cell after fitting the lattice to the space.
    pub fn cell_extent(&self) -> [f64; 2] {
        [self.width, self.row_spacing / 0.75]
    }

    #[inline]
    pub fn midx_of(&self, id: u32) -> [u32; 2] {
        [id % self.shape[0], id / self.shape[0]]
    }

    /// Id of `(col, row)`, wrapping on periodic lattices, `None` outside
    /// non-periodic ones.
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

    /// Centre of `(col, row)` in lattice units (`u = x / width`,
    /// `v = y / row_spacing`).
    fn center_uv(col: i64, row: i64) -> (f64, f64) {
        let shift = if row.rem_euclid(2) == 1 { 0.5 } else { 0.0 };
        (col as f64 + 0.5 + shift, row as f64 + 0.5)
    }

    /// Cell whose centre is nearest to `p`.  `p` must lie inside the space.
    ///
    /// Only the two rows bracketing `p` can hold the nearest centre.  On
    /// non-periodic lattices rows and columns are clamped, which also maps
    /// the uncovered slivers along the boundary onto the nearest cell.
    pub fn cell_at(&self, p: [f64; 2]) -> u32 {
        let (nx, ny) = (self.shape[0] as i64, self.shape[1] as i64);
        let u = p[0] / self.width;
        let v = p[1] / self.row_spacing;
        let first_row = (v - 0.5).floor() as i64;

        let mut best = (f64::INFINITY, 0i64, 0i64);
        for row in [first_row, first_row + 1] {
            let row = if self.periodic { row } else { row.clamp(0, ny - 1) };
            let shift = if row.rem_euclid(2) == 1 { 0.5 } else { 0.0 };
            let mut col = (u - 0.5 - shift).round() as i64;
            if !self.periodic {
                col = col.clamp(0, nx - 1);
            }
            let (cu, cv) = Self::center_uv(col, row);
            // Row spacing is √3/2 of the width in an undistorted lattice.
            let dx = u - cu;
            let dy = (v - cv) * IDEAL_ASPECT_RATIO;
            let d2 = dx * dx + dy * dy;
            if d2 < best.0 {
                best = (d2, col, row);
            }
        }
        self.id_of(best.1, best.2).unwrap_or(0)
    }

    pub fn barycenter_of(&self, id: u32) -> [f64; 2] {
        let [c, r] = self.midx_of(id);
        let (cu, cv) = Self::center_uv(c as i64, r as i64);
        [cu * self.width, cv * self.row_spacing]
    }

    /// The six corners, counter-clockwise starting at the bottom tip.
    pub fn vertices_of(&self, id: u32) -> Vec<[f64; 2]> {
        let [cx, cy] = self.barycenter_of(id);
        let [w, h] = self.cell_extent();
        let (a, b) = (w / 2.0, h / 2.0);
        vec![
            [cx, cy - b],
            [cx + a, cy - b / 2.0],
            [cx + a, cy + b / 2.0],
            [cx, cy + b],
            [cx - a, cy + b / 2.0],
            [cx - a, cy - b / 2.0],
        ]
    }

    pub fn boundary_cells(&self, which: BoundarySelect) -> SpaceResult<Vec<u32>> {
        if self.periodic {
            return Ok(vec![]);
        }
        if matches!(which, BoundarySelect::Front | BoundarySelect::Back) {
            return Err(SpaceError::InvalidConfig(format!(
                "boundary `{which}` does not exist on a 2D hexagonal grid"
            )));
        }
        let [nx, ny] = self.shape;
        let on_face = |c: u32, r: u32| match which {
            BoundarySelect::Left => c == 0,
            BoundarySelect::Right => c + 1 == nx,
            BoundarySelect::Bottom => r == 0,
            BoundarySelect::Top => r + 1 == ny,
            _ => c == 0 || c + 1 == nx || r == 0 || r + 1 == ny,
        };
        Ok((0..self.num_cells() as u32)
            .filter(|&id| {
                let [c, r] = self.midx_of(id);
                on_face(c, r)
            })
            .collect())
    }

    /// The six edge-sharing cells, sorted by id.
    pub fn neighbors(&self, id: u32) -> Vec<u32> {
        let [c, r] = self.midx_of(id);
        let (c, r) = (c as i64, r as i64);
        let offsets: [(i64, i64); 6] = if r % 2 == 0 {
            [(-1, -1), (0, -1), (-1, 0), (1, 0), (-1, 1), (0, 1)]
        } else {
            [(0, -1), (1, -1), (-1, 0), (1, 0), (0, 1), (1, 1)]
        };
        let mut out: Vec<u32> = offsets
            .iter()
            .filter_map(|&(dc, dr)| self.id_of(c + dc, r + dr))
            .filter(|&nb| nb != id)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}
