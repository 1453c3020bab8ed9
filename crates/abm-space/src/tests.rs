//! Unit tests for abm-space.

#[cfg(test)]
mod helpers {
    use abm_core::CellId;

    use crate::{Grid, GridConfig, GridStructure, HexLattice, Neighborhood, Space, TriLattice};

    pub fn ids(raw: &[u32]) -> Vec<CellId> {
        raw.iter().copied().map(CellId).collect()
    }

    /// Square grid on `[w, h]` at resolution 1, so the shape equals the extent.
    pub fn square(w: f64, h: f64, periodic: bool, nb: Neighborhood) -> Grid<2> {
        let space = Space::new([w, h], periodic).unwrap();
        let mut grid = Grid::new(space, &GridConfig::new(GridStructure::Square, 1)).unwrap();
        grid.set_neighborhood(nb).unwrap();
        grid
    }

    /// Hexagonal grid with exactly `nx * ny` undistorted cells.
    pub fn hex(nx: u32, ny: u32, periodic: bool) -> Grid<2> {
        let [w, h] = HexLattice::ideal_cell_extent(4);
        let extent = [nx as f64 * w, ny as f64 * 0.75 * h];
        let space = Space::new(extent, periodic).unwrap();
        Grid::new(space, &GridConfig::new(GridStructure::Hexagonal, 4)).unwrap()
    }

    /// Triangular grid with exactly `nx * ny` cells.
    pub fn tri(nx: u32, ny: u32, periodic: bool) -> Grid<2> {
        let [b, t] = TriLattice::ideal_cell_extent(2);
        let extent = [nx as f64 * b / 2.0, ny as f64 * t];
        let space = Space::new(extent, periodic).unwrap();
        Grid::new(space, &GridConfig::new(GridStructure::Triangular, 2)).unwrap()
    }
}

// ── Space ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod space {
    use abm_core::Config;

    use crate::{Norm, Space, SpaceError};

    #[test]
    fn periodic_map_into_wraps() {
        let s = Space::new([10.0, 10.0], true).unwrap();
        assert_eq!(s.map_into(&[12.5, -1.0]).unwrap(), [2.5, 9.0]);
        assert_eq!(s.map_into(&[10.0, 0.0]).unwrap(), [0.0, 0.0]);
    }

    #[test]
    fn periodic_displacement_takes_shortest_image() {
        let s = Space::new([10.0, 10.0], true).unwrap();
        assert_eq!(s.displacement(&[1.0, 1.0], &[9.0, 9.0]), [-2.0, -2.0]);
    }

    #[test]
    fn non_periodic_displacement_is_plain_difference() {
        let s = Space::new([10.0, 10.0], false).unwrap();
        assert_eq!(s.displacement(&[1.0, 1.0], &[9.0, 9.0]), [8.0, 8.0]);
    }

    #[test]
    fn non_periodic_map_into_rejects_outside_points() {
        let s = Space::new([10.0, 10.0], false).unwrap();
        assert_eq!(s.map_into(&[10.0, 3.0]).unwrap(), [10.0, 3.0]);
        assert!(matches!(s.map_into(&[10.5, 3.0]), Err(SpaceError::OutOfSpace { .. })));
        assert!(matches!(s.map_into(&[f64::NAN, 3.0]), Err(SpaceError::OutOfSpace { .. })));
    }

    #[test]
    fn distance_norms() {
        let s = Space::new([10.0, 10.0], false).unwrap();
        let (a, b) = ([0.0, 0.0], [3.0, 4.0]);
        assert_eq!(s.distance(&a, &b, Norm::L1), 7.0);
        assert_eq!(s.distance(&a, &b, Norm::L2), 5.0);
        assert_eq!(s.distance(&a, &b, Norm::LInf), 4.0);
        assert!((s.distance(&a, &b, Norm::Lp(2.0)) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn invalid_extent_rejected() {
        assert!(matches!(Space::new([0.0, 1.0], false), Err(SpaceError::InvalidConfig(_))));
        assert!(matches!(Space::new([-1.0], false), Err(SpaceError::InvalidConfig(_))));
        assert!(matches!(Space::new([f64::INFINITY, 1.0], true), Err(SpaceError::InvalidConfig(_))));
        assert!(Space::<4>::new([1.0; 4], false).is_err());
    }

    #[test]
    fn from_config_defaults_and_values() {
        let cfg = Config::from_yaml_str("extent: [4, 2]\nperiodic: true").unwrap();
        let s = Space::<2>::from_config(&cfg).unwrap();
        assert_eq!(s.extent(), &[4.0, 2.0]);
        assert!(s.is_periodic());
        assert_eq!(s.volume(), 8.0);
        assert_eq!(s.center(), [2.0, 1.0]);

        let s = Space::<3>::from_config(&Config::empty()).unwrap();
        assert_eq!(s.extent(), &[1.0, 1.0, 1.0]);
        assert!(!s.is_periodic());
    }

    #[test]
    fn from_config_wrong_dimension_fails() {
        let cfg = Config::from_yaml_str("extent: [4, 2, 1]").unwrap();
        assert!(matches!(Space::<2>::from_config(&cfg), Err(SpaceError::Config(_))));
    }
}

// ── Square grid ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod square {
    use abm_core::{CellId, Config};

    use super::helpers::{ids, square};
    use crate::{BoundarySelect, Grid, GridConfig, GridStructure, Neighborhood, Space, SpaceError};

    #[test]
    fn shape_and_column_major_ids() {
        let g = square(4.0, 3.0, false, Neighborhood::empty());
        assert_eq!(g.shape(), [4, 3]);
        assert_eq!(g.num_cells(), 12);
        assert!(g.is_structured());
        assert_eq!(g.midx_of(CellId(0)), [0, 0]);
        assert_eq!(g.midx_of(CellId(5)), [1, 1]);
        assert_eq!(g.midx_of(CellId(11)), [3, 2]);
        assert_eq!(g.cell_at(&[1.5, 1.5]).unwrap(), CellId(5));
    }

    #[test]
    fn resolution_scales_shape() {
        let space = Space::new([2.0, 1.0], false).unwrap();
        let g = Grid::new(space, &GridConfig::new(GridStructure::Square, 8)).unwrap();
        assert_eq!(g.shape(), [16, 8]);
        assert_eq!(g.cell_extent(), [0.125, 0.125]);
        assert_eq!(g.effective_resolution(), [8.0, 8.0]);
    }

    #[test]
    fn high_boundary_clamps_into_last_cell() {
        let g = square(4.0, 4.0, false, Neighborhood::empty());
        assert_eq!(g.cell_at(&[4.0, 4.0]).unwrap(), CellId(15));
        assert_eq!(g.cell_at(&[4.0, 0.0]).unwrap(), CellId(3));
        assert!(matches!(g.cell_at(&[4.1, 0.0]), Err(SpaceError::OutOfSpace { .. })));
    }

    #[test]
    fn periodic_cell_at_wraps() {
        let g = square(4.0, 4.0, true, Neighborhood::empty());
        assert_eq!(g.cell_at(&[-0.5, 4.5]).unwrap(), CellId(3));
    }

    #[test]
    fn von_neumann_non_periodic() {
        let g = square(4.0, 4.0, false, Neighborhood::von_neumann(1));
        assert_eq!(g.neighbors_of(CellId(0)), ids(&[1, 4]));
        assert_eq!(g.neighbors_of(CellId(15)), ids(&[11, 14]));
        assert_eq!(g.neighbors_of(CellId(5)), ids(&[1, 4, 6, 9]));
    }

    #[test]
    fn von_neumann_periodic() {
        let g = square(4.0, 4.0, true, Neighborhood::von_neumann(1));
        assert_eq!(g.neighbors_of(CellId(0)), ids(&[1, 3, 4, 12]));
    }

    #[test]
    fn moore_counts() {
        let g = square(5.0, 5.0, false, Neighborhood::moore(1));
        assert_eq!(g.neighbors_of(CellId(0)).len(), 3);
        assert_eq!(g.neighbors_of(CellId(12)).len(), 8);

        let g = square(5.0, 5.0, true, Neighborhood::moore(2));
        assert_eq!(g.neighbors_of(CellId(0)).len(), 24);

        let g = square(5.0, 5.0, true, Neighborhood::von_neumann(2));
        assert_eq!(g.neighbors_of(CellId(0)).len(), 12);
    }

    #[test]
    fn periodic_distance_too_large() {
        let mut g = square(4.0, 4.0, true, Neighborhood::empty());
        let err = g.set_neighborhood(Neighborhood::von_neumann(2)).unwrap_err();
        assert!(matches!(err, SpaceError::InvalidNeighborhood(_)));
        // The previous neighborhood stays active.
        assert_eq!(g.neighborhood(), Neighborhood::empty());
        assert!(g.neighbors_of(CellId(0)).is_empty());
    }

    #[test]
    fn zero_distance_rejected() {
        let mut g = square(4.0, 4.0, false, Neighborhood::empty());
        assert!(matches!(
            g.set_neighborhood(Neighborhood::moore(0)),
            Err(SpaceError::InvalidNeighborhood(_))
        ));
    }

    #[test]
    fn hexagonal_mode_not_available() {
        let mut g = square(4.0, 4.0, false, Neighborhood::empty());
        assert!(matches!(
            g.set_neighborhood(Neighborhood::hexagonal()),
            Err(SpaceError::InvalidNeighborhood(_))
        ));
    }

    #[test]
    fn one_dimensional_line() {
        let space = Space::new([3.0], false).unwrap();
        let mut g = Grid::new(space, &GridConfig::new(GridStructure::Square, 1)).unwrap();
        g.set_neighborhood(Neighborhood::von_neumann(1)).unwrap();
        assert_eq!(g.neighbors_of(CellId(0)), ids(&[1]));
        assert_eq!(g.neighbors_of(CellId(1)), ids(&[0, 2]));
        assert_eq!(g.vertices_of(CellId(1)), vec![[1.0], [2.0]]);
    }

    #[test]
    fn three_dimensional_faces() {
        let space = Space::new([2.0, 2.0, 2.0], false).unwrap();
        let mut g = Grid::new(space, &GridConfig::new(GridStructure::Square, 1)).unwrap();
        assert_eq!(g.boundary_cells(BoundarySelect::Front).unwrap(), ids(&[0, 1, 2, 3]));
        assert_eq!(g.boundary_cells(BoundarySelect::Back).unwrap(), ids(&[4, 5, 6, 7]));
        g.set_neighborhood(Neighborhood::von_neumann(1)).unwrap();
        assert_eq!(g.neighbors_of(CellId(0)), ids(&[1, 2, 4]));
    }

    #[test]
    fn boundary_cells_2d() {
        let g = square(4.0, 4.0, false, Neighborhood::empty());
        assert_eq!(g.boundary_cells(BoundarySelect::Left).unwrap(), ids(&[0, 4, 8, 12]));
        assert_eq!(g.boundary_cells(BoundarySelect::Right).unwrap(), ids(&[3, 7, 11, 15]));
        assert_eq!(g.boundary_cells(BoundarySelect::Bottom).unwrap(), ids(&[0, 1, 2, 3]));
        assert_eq!(g.boundary_cells(BoundarySelect::Top).unwrap(), ids(&[12, 13, 14, 15]));
        assert_eq!(g.boundary_cells(BoundarySelect::All).unwrap().len(), 12);
        assert!(matches!(
            g.boundary_cells(BoundarySelect::Front),
            Err(SpaceError::InvalidConfig(_))
        ));
    }

    #[test]
    fn periodic_boundary_is_empty() {
        let g = square(4.0, 4.0, true, Neighborhood::empty());
        assert!(g.boundary_cells(BoundarySelect::All).unwrap().is_empty());
    }

    #[test]
    fn geometry_of_a_cell() {
        let g = square(4.0, 4.0, false, Neighborhood::empty());
        assert_eq!(g.barycenter_of(CellId(5)), [1.5, 1.5]);
        assert_eq!(g.extent_of(CellId(5)), [1.0, 1.0]);
        assert_eq!(
            g.vertices_of(CellId(5)),
            vec![[1.0, 1.0], [2.0, 1.0], [2.0, 2.0], [1.0, 2.0]]
        );
        assert!(g.cell_contains(CellId(5), &[1.0, 1.99]));
        assert!(!g.cell_contains(CellId(5), &[2.0, 1.5]));
        assert!(g.cell_contains(CellId(15), &[4.0, 4.0]));
    }

    #[test]
    fn validate_rejects_foreign_ids() {
        let g = square(2.0, 2.0, false, Neighborhood::empty());
        assert!(g.validate(CellId(3)).is_ok());
        assert!(matches!(g.validate(CellId(4)), Err(SpaceError::InvalidCell(_))));
    }

    #[test]
    fn from_config_reads_structure_and_resolution() {
        let space = Space::new([2.0, 2.0], false).unwrap();
        let cfg = Config::from_yaml_str("structure: square\nresolution: 3").unwrap();
        let g = Grid::from_config(space.clone(), &cfg).unwrap();
        assert_eq!(g.structure(), GridStructure::Square);
        assert_eq!(g.resolution(), 3);
        assert_eq!(g.shape(), [6, 6]);

        let cfg = Config::from_yaml_str("structure: square\nresolution: -2").unwrap();
        assert!(matches!(Grid::from_config(space.clone(), &cfg), Err(SpaceError::InvalidConfig(_))));

        let cfg = Config::from_yaml_str("resolution: 2").unwrap();
        assert!(matches!(Grid::from_config(space.clone(), &cfg), Err(SpaceError::Config(_))));

        let cfg = Config::from_yaml_str("structure: octagonal\nresolution: 2").unwrap();
        assert!(matches!(Grid::from_config(space, &cfg), Err(SpaceError::Config(_))));
    }

    #[test]
    fn neighborhood_from_config() {
        let mut g = square(4.0, 4.0, false, Neighborhood::empty());
        let cfg = Config::from_yaml_str("mode: Moore\ndistance: 1").unwrap();
        g.set_neighborhood_from_config(&cfg).unwrap();
        assert_eq!(g.neighborhood(), Neighborhood::moore(1));
        assert_eq!(g.neighbors_of(CellId(0)), ids(&[1, 4, 5]));
    }
}

// ── Hexagonal grid ────────────────────────────────────────────────────────────

#[cfg(test)]
mod hexagonal {
    use abm_core::CellId;

    use super::helpers::{hex, ids};
    use crate::{
        BoundarySelect, Grid, GridConfig, GridStructure, HexLattice, Neighborhood, Space, SpaceError,
    };

    #[test]
    fn periodic_odd_rows_rejected() {
        let [w, h] = HexLattice::ideal_cell_extent(4);
        let space = Space::new([6.0 * w, 5.0 * 0.75 * h], true).unwrap();
        let err = Grid::new(space, &GridConfig::new(GridStructure::Hexagonal, 4)).unwrap_err();
        assert!(matches!(err, SpaceError::InvalidConfig(_)));
    }

    #[test]
    fn non_periodic_odd_rows_allowed() {
        let g = hex(6, 5, false);
        assert_eq!(g.shape(), [6, 5]);
        assert!(!g.is_structured());
    }

    #[test]
    fn distorted_cells_rejected_unless_tolerated() {
        let [w, h] = HexLattice::ideal_cell_extent(4);
        let space = Space::new([6.4 * w, 4.0 * 0.75 * h], false).unwrap();
        let cfg = GridConfig::new(GridStructure::Hexagonal, 4);
        assert!(matches!(Grid::new(space.clone(), &cfg), Err(SpaceError::InvalidConfig(_))));
        let cfg = cfg.with_aspect_ratio_tolerance(0.1);
        assert!(Grid::new(space, &cfg).is_ok());
    }

    #[test]
    fn three_dimensional_space_rejected() {
        let space = Space::new([1.0, 1.0, 1.0], false).unwrap();
        let err = Grid::new(space, &GridConfig::new(GridStructure::Hexagonal, 4)).unwrap_err();
        assert!(matches!(err, SpaceError::InvalidConfig(_)));
    }

    #[test]
    fn neighbors_even_and_odd_rows() {
        let mut g = hex(5, 4, false);
        g.set_neighborhood(Neighborhood::hexagonal()).unwrap();
        // (2, 1): odd row, neighbours shifted right.
        assert_eq!(g.neighbors_of(CellId(7)), ids(&[2, 3, 6, 8, 12, 13]));
        // (2, 2): even row.
        assert_eq!(g.neighbors_of(CellId(12)), ids(&[6, 7, 11, 13, 16, 17]));
        // Corner (0, 0).
        assert_eq!(g.neighbors_of(CellId(0)), ids(&[1, 5]));
    }

    #[test]
    fn periodic_interior_and_corner_have_six() {
        let mut g = hex(6, 4, true);
        g.set_neighborhood(Neighborhood::hexagonal()).unwrap();
        for id in 0..g.num_cells() as u32 {
            assert_eq!(g.neighbors_of(CellId(id)).len(), 6, "cell {id}");
        }
    }

    #[test]
    fn larger_distance_unimplemented() {
        let mut g = hex(6, 4, false);
        let err = g.set_neighborhood(Neighborhood::new(crate::NeighborhoodMode::Hexagonal, 2)).unwrap_err();
        assert!(matches!(err, SpaceError::Unimplemented(_)));
        let err = g.set_neighborhood(Neighborhood::von_neumann(1)).unwrap_err();
        assert!(matches!(err, SpaceError::InvalidNeighborhood(_)));
    }

    #[test]
    fn barycenters_round_trip() {
        for g in [hex(6, 4, false), hex(6, 4, true), hex(5, 3, false)] {
            for id in 0..g.num_cells() as u32 {
                let c = g.barycenter_of(CellId(id));
                assert_eq!(g.cell_at(&c).unwrap(), CellId(id));
            }
        }
    }

    #[test]
    fn boundary_slivers_map_to_nearest_cell() {
        let g = hex(4, 4, false);
        let ext = *g.space().extent();
        assert_eq!(g.cell_at(&[0.0, 0.0]).unwrap(), CellId(0));
        assert_eq!(g.cell_at(&ext).unwrap(), CellId(15));
        // Left sliver of the first odd row.
        let y = g.barycenter_of(CellId(4))[1];
        let w = g.cell_extent()[0];
        assert_eq!(g.cell_at(&[0.1 * w, y]).unwrap(), CellId(4));
    }

    #[test]
    fn vertices_surround_center() {
        let g = hex(4, 4, false);
        let c = g.barycenter_of(CellId(5));
        let v = g.vertices_of(CellId(5));
        assert_eq!(v.len(), 6);
        let [w, h] = g.cell_extent();
        assert!((v[0][1] - (c[1] - h / 2.0)).abs() < 1e-12);
        assert!((v[1][0] - (c[0] + w / 2.0)).abs() < 1e-12);
    }

    #[test]
    fn boundary_rows_and_columns() {
        let g = hex(4, 3, false);
        assert_eq!(g.boundary_cells(BoundarySelect::Bottom).unwrap(), ids(&[0, 1, 2, 3]));
        assert_eq!(g.boundary_cells(BoundarySelect::Left).unwrap(), ids(&[0, 4, 8]));
        assert_eq!(g.boundary_cells(BoundarySelect::All).unwrap().len(), 10);
        assert!(g.boundary_cells(BoundarySelect::Back).is_err());
    }
}

// ── Triangular grid ───────────────────────────────────────────────────────────

#[cfg(test)]
mod triangular {
    use abm_core::CellId;

    use super::helpers::{ids, tri};
    use crate::{Grid, GridConfig, GridStructure, Neighborhood, Space, SpaceError, TriLattice};

    #[test]
    fn periodic_needs_even_shape() {
        let [b, t] = TriLattice::ideal_cell_extent(2);
        let space = Space::new([5.0 * b / 2.0, 4.0 * t], true).unwrap();
        let err = Grid::new(space, &GridConfig::new(GridStructure::Triangular, 2)).unwrap_err();
        assert!(matches!(err, SpaceError::InvalidConfig(_)));
    }

    #[test]
    fn von_neumann_three_edges() {
        let mut g = tri(6, 4, false);
        g.set_neighborhood(Neighborhood::von_neumann(1)).unwrap();
        // (2, 1) points down: third neighbour above.
        assert_eq!(g.neighbors_of(CellId(8)), ids(&[7, 9, 14]));
        // (2, 2) points up: third neighbour below.
        assert_eq!(g.neighbors_of(CellId(14)), ids(&[8, 13, 15]));
    }

    #[test]
    fn moore_twelve_vertices() {
        let mut g = tri(8, 6, true);
        g.set_neighborhood(Neighborhood::moore(1)).unwrap();
        for id in 0..g.num_cells() as u32 {
            assert_eq!(g.neighbors_of(CellId(id)).len(), 12, "cell {id}");
        }
    }

    #[test]
    fn hexagonal_mode_not_available() {
        let mut g = tri(4, 4, false);
        assert!(matches!(
            g.set_neighborhood(Neighborhood::hexagonal()),
            Err(SpaceError::InvalidNeighborhood(_))
        ));
        assert!(matches!(
            g.set_neighborhood(Neighborhood::moore(2)),
            Err(SpaceError::Unimplemented(_))
        ));
    }

    #[test]
    fn barycenters_round_trip() {
        for g in [tri(6, 4, false), tri(6, 4, true), tri(5, 3, false)] {
            for id in 0..g.num_cells() as u32 {
                let c = g.barycenter_of(CellId(id));
                assert_eq!(g.cell_at(&c).unwrap(), CellId(id), "cell {id}");
            }
        }
    }

    #[test]
    fn vertices_form_the_cell() {
        let g = tri(4, 2, false);
        let [base, height] = g.cell_extent();
        // (0, 0) points up.
        let v = g.vertices_of(CellId(0));
        assert_eq!(v.len(), 3);
        assert!((v[1][0] - base).abs() < 1e-12);
        assert!((v[2][1] - height).abs() < 1e-12);
    }
}

// ── Properties ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod properties {
    use abm_core::CellId;
    use proptest::prelude::*;

    use super::helpers::{hex, square, tri};
    use crate::{Grid, Neighborhood, Space};

    fn assert_symmetric(g: &Grid<2>) -> Result<(), TestCaseError> {
        for a in 0..g.num_cells() as u32 {
            for b in g.neighbors_of(CellId(a)) {
                prop_assert!(g.neighbors_of(b).contains(&CellId(a)), "{a} -> {b} not mirrored");
            }
        }
        Ok(())
    }

    proptest! {
        #[test]
        fn map_into_is_idempotent(x in -1e3f64..1e3, y in -1e3f64..1e3) {
            let s = Space::new([7.0, 3.5], true).unwrap();
            let once = s.map_into(&[x, y]).unwrap();
            prop_assert!(s.contains(&once));
            prop_assert_eq!(s.map_into(&once).unwrap(), once);
        }

        #[test]
        fn square_barycenter_round_trip(w in 1u32..9, h in 1u32..9, periodic: bool) {
            let g = square(w as f64, h as f64, periodic, Neighborhood::empty());
            for id in 0..g.num_cells() as u32 {
                prop_assert_eq!(g.cell_at(&g.barycenter_of(CellId(id))).unwrap(), CellId(id));
            }
        }

        #[test]
        fn square_neighbors_symmetric(w in 3u32..8, h in 3u32..8, periodic: bool, moore: bool) {
            let nb = if moore { Neighborhood::moore(1) } else { Neighborhood::von_neumann(1) };
            assert_symmetric(&square(w as f64, h as f64, periodic, nb))?;
        }

        #[test]
        fn hex_neighbors_symmetric(nx in 3u32..8, half_ny in 2u32..4, periodic: bool) {
            let mut g = hex(nx, 2 * half_ny, periodic);
            g.set_neighborhood(Neighborhood::hexagonal()).unwrap();
            assert_symmetric(&g)?;
        }

        #[test]
        fn tri_neighbors_symmetric(half_nx in 2u32..5, half_ny in 2u32..4, periodic: bool, moore: bool) {
            let mut g = tri(2 * half_nx, 2 * half_ny, periodic);
            let nb = if moore { Neighborhood::moore(1) } else { Neighborhood::von_neumann(1) };
            g.set_neighborhood(nb).unwrap();
            assert_symmetric(&g)?;
        }

        #[test]
        fn cell_at_always_valid(fx in 0.0f64..=1.0, fy in 0.0f64..=1.0) {
            for g in [hex(5, 3, false), tri(5, 3, false), square(5.0, 3.0, false, Neighborhood::empty())] {
                let ext = *g.space().extent();
                let id = g.cell_at(&[fx * ext[0], fy * ext[1]]).unwrap();
                prop_assert!(id.index() < g.num_cells());
            }
        }
    }
}
