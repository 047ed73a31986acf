use std::collections::HashSet;

use crate::geom::{
    BBox, BooleanError, BooleanOptions, HalfSpacePolicy, HalfSpaceSolid, Mesh, Plane,
    ToolRelation, Transform, Vec3, build_half_space_solids, subtract,
};

fn unit_cube() -> Mesh {
    Mesh::cuboid(Vec3::new(1.0, 1.0, 1.0))
}

fn solids_for(mesh: &Mesh, plane: Plane) -> (HalfSpaceSolid, HalfSpaceSolid) {
    let bounds = mesh.bbox().expect("bbox");
    build_half_space_solids(plane, bounds, HalfSpacePolicy::default()).expect("solids")
}

fn plane(normal: [f64; 3], constant: f64) -> Plane {
    Plane::new(Vec3::from(normal), constant).expect("plane")
}

fn on_plane_bits(mesh: &Mesh, plane: Plane) -> HashSet<[u64; 3]> {
    mesh.points()
        .into_iter()
        .filter(|p| plane.signed_distance(*p).abs() < 1e-9)
        .map(|p| [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()])
        .collect()
}

#[test]
fn subtract_half_space_halves_the_cube() {
    let cube = unit_cube();
    let cut = plane([0.0, 1.0, 0.0], 0.0);
    let (below, above) = solids_for(&cube, cut);
    let options = BooleanOptions::default();

    let top = subtract(&cube, &below, options).expect("top");
    let bottom = subtract(&cube, &above, options).expect("bottom");

    for (result, sign) in [(&top, 1.0), (&bottom, -1.0)] {
        assert_eq!(result.diagnostics.relation, ToolRelation::Crossing);
        assert!(result.mesh_diagnostics.is_valid_solid(), "{}", result.mesh_diagnostics);
        result.mesh.validate().expect("valid mesh");
        assert!((result.mesh.volume() - 4.0).abs() < 1e-9);
        assert_eq!(result.diagnostics.cap_loop_count, 1);
        assert_eq!(result.diagnostics.cap_hole_count, 0);
        assert!(result.diagnostics.cap_triangle_count >= 2);

        let bbox = result.mesh.bbox().expect("bbox");
        for p in result.mesh.points() {
            assert!(sign * p.y >= -1e-12);
        }
        assert!((bbox.size().x - 2.0).abs() < 1e-12);
        assert!((bbox.size().y - 1.0).abs() < 1e-12);
    }
}

#[test]
fn complementary_cuts_share_split_vertices_bit_for_bit() {
    let cube = unit_cube();
    let cut = plane([1.0, 1.0, 1.0], 0.1);
    let (below, above) = solids_for(&cube, cut);

    let top = subtract(&cube, &below, BooleanOptions::default()).expect("top");
    let bottom = subtract(&cube, &above, BooleanOptions::default()).expect("bottom");

    let top_seam = on_plane_bits(&top.mesh, cut);
    let bottom_seam = on_plane_bits(&bottom.mesh, cut);
    assert!(top_seam.len() >= 6);
    assert_eq!(top_seam, bottom_seam);

    let total = top.mesh.volume() + bottom.mesh.volume();
    assert!((total - cube.volume()).abs() < 1e-9);
    assert!(top.mesh.volume() < bottom.mesh.volume());
}

#[test]
fn tool_beyond_the_target_leaves_it_unchanged() {
    let cube = unit_cube();
    let cut = plane([0.0, 1.0, 0.0], 5.0);
    let (below, above) = solids_for(&cube, cut);

    let kept = subtract(&cube, &above, BooleanOptions::default()).expect("disjoint");
    assert_eq!(kept.diagnostics.relation, ToolRelation::Disjoint);
    assert_eq!(kept.mesh, cube);

    let gone = subtract(&cube, &below, BooleanOptions::default()).expect("contains");
    assert_eq!(gone.diagnostics.relation, ToolRelation::Contains);
    assert!(gone.is_empty());
}

#[test]
fn plane_through_a_face_keeps_the_whole_target_on_one_side() {
    let cube = unit_cube();
    let cut = plane([0.0, 1.0, 0.0], 1.0);
    let (below, above) = solids_for(&cube, cut);

    let top = subtract(&cube, &below, BooleanOptions::default()).expect("top");
    let bottom = subtract(&cube, &above, BooleanOptions::default()).expect("bottom");
    assert!(top.is_empty());
    assert_eq!(bottom.mesh, cube);
}

#[test]
fn sphere_cut_through_equator_ring() {
    let sphere = Mesh::uv_sphere(1.0, 24, 12);
    let cut = plane([0.0, -1.0, 0.0], 0.0);
    let (below, above) = solids_for(&sphere, cut);

    let top = subtract(&sphere, &below, BooleanOptions::default()).expect("top");
    let bottom = subtract(&sphere, &above, BooleanOptions::default()).expect("bottom");

    // Equator vertices lie on the plane, so no edge needs splitting.
    assert_eq!(top.diagnostics.split_edge_count, 0);
    assert!(top.diagnostics.on_plane_vertex_count >= 24);
    for result in [&top, &bottom] {
        assert!(result.mesh_diagnostics.is_valid_solid());
        assert!((result.mesh.volume() - 0.5 * sphere.volume()).abs() < 1e-9);
    }

    let union = top
        .mesh
        .bbox()
        .expect("bbox")
        .union(bottom.mesh.bbox().expect("bbox"));
    let original = sphere.bbox().expect("bbox");
    assert!((union.min - original.min).length() < 1e-12);
    assert!((union.max - original.max).length() < 1e-12);
}

#[test]
fn torus_cut_produces_annular_cap() {
    let torus = Mesh::torus(2.0, 0.5, 16, 32);
    let cut = plane([0.0, 1.0, 0.0], 0.1);
    let (below, above) = solids_for(&torus, cut);

    let top = subtract(&torus, &below, BooleanOptions::default()).expect("top");
    let bottom = subtract(&torus, &above, BooleanOptions::default()).expect("bottom");

    for result in [&top, &bottom] {
        assert!(result.mesh_diagnostics.is_valid_solid(), "{}", result.mesh_diagnostics);
        assert_eq!(result.diagnostics.cap_loop_count, 2);
        assert_eq!(result.diagnostics.cap_hole_count, 1);
        assert!(result.mesh.volume() > 0.0);
    }

    let total = top.mesh.volume() + bottom.mesh.volume();
    assert!((total - torus.volume()).abs() < 1e-9 * torus.volume());
}

#[test]
fn torus_cut_across_the_hole_gives_two_caps() {
    let torus = Mesh::torus(2.0, 0.5, 16, 32);
    let cut = plane([1.0, 0.0, 0.0], 0.05);
    let (below, _) = solids_for(&torus, cut);

    let right = subtract(&torus, &below, BooleanOptions::default()).expect("right");
    assert!(right.mesh_diagnostics.is_valid_solid());
    assert_eq!(right.diagnostics.cap_loop_count, 2);
    assert_eq!(right.diagnostics.cap_hole_count, 0);
}

#[test]
fn undersized_tool_is_rejected() {
    let cube = unit_cube();
    let cut = plane([0.0, 1.0, 0.0], 0.0);
    let bounds = cube.bbox().expect("bbox");
    let policy = HalfSpacePolicy {
        extent_factor: 0.1,
        min_half_extent: 0.0,
    };
    let (below, _) = build_half_space_solids(cut, bounds, policy).expect("solids");

    let err = subtract(&cube, &below, BooleanOptions::default()).unwrap_err();
    assert!(matches!(err, BooleanError::ToolTooSmall { crossing_faces } if crossing_faces > 1));
}

#[test]
fn open_or_broken_targets_are_rejected() {
    let cube = unit_cube();
    let (below, _) = solids_for(&cube, plane([0.0, 1.0, 0.0], 0.0));
    let options = BooleanOptions::default();

    let mut open = cube.clone();
    open.indices.truncate(open.indices.len() - 3);
    assert!(matches!(
        subtract(&open, &below, options),
        Err(BooleanError::NotClosed { open_edges: 3, .. })
    ));

    assert_eq!(subtract(&Mesh::default(), &below, options), Err(BooleanError::EmptyMesh));

    let mut bad_index = cube.clone();
    bad_index.indices[0] = 99;
    assert_eq!(subtract(&bad_index, &below, options), Err(BooleanError::InvalidIndices));

    let mut nan = cube;
    nan.positions[0][1] = f64::NAN;
    assert_eq!(subtract(&nan, &below, options), Err(BooleanError::InvalidGeometry));
}

#[test]
fn duplicated_vertices_are_welded_before_cutting() {
    // Cube with every triangle carrying its own corners.
    let cube = unit_cube();
    let mut positions = Vec::new();
    let mut indices = Vec::new();
    for &idx in &cube.indices {
        indices.push(positions.len() as u32);
        positions.push(cube.positions[idx as usize]);
    }
    let soup = Mesh::new(positions, indices);
    let (below, _) = solids_for(&soup, plane([0.0, 0.0, 1.0], 0.25));

    let result = subtract(&soup, &below, BooleanOptions::default()).expect("cut");
    assert!(result.diagnostics.welded_vertex_count > 0);
    assert!(result.mesh_diagnostics.is_valid_solid());
    assert!((result.mesh.volume() - 4.0 * 0.75).abs() < 1e-9);
}

#[test]
fn cap_normals_face_into_the_removed_side() {
    let cube = unit_cube();
    let cut = plane([0.0, 0.0, 1.0], 0.0);
    let (below, _) = solids_for(&cube, cut);
    let top = subtract(&cube, &below, BooleanOptions::default()).expect("top");

    let mut cap_area = Vec3::ZERO;
    for t in 0..top.mesh.triangle_count() {
        let tri = top.mesh.triangle(t).expect("triangle");
        let on_plane = [tri.a, tri.b, tri.c]
            .iter()
            .all(|p| cut.signed_distance(*p).abs() < 1e-12);
        if on_plane {
            cap_area = cap_area + tri.area_normal();
        }
    }
    // Twice the 2x2 square, pointing down.
    assert!((cap_area - Vec3::new(0.0, 0.0, -8.0)).length() < 1e-9);
}

#[test]
fn result_lies_within_original_bounds() {
    let sphere = Mesh::uv_sphere(1.5, 20, 10)
        .transformed(Transform::translate(Vec3::new(0.3, -0.2, 0.1)));
    let cut = plane([0.2, 0.9, -0.4], 0.05);
    let (below, above) = solids_for(&sphere, cut);
    let original = sphere.bbox().expect("bbox").expand_by(1e-9);

    for tool in [below, above] {
        let result = subtract(&sphere, &tool, BooleanOptions::default()).expect("cut");
        assert!(result.mesh_diagnostics.is_valid_solid());
        let bbox: BBox = result.mesh.bbox().expect("bbox");
        assert!(original.contains_point(bbox.min));
        assert!(original.contains_point(bbox.max));
        assert!(result.mesh.volume() < sphere.volume());
    }
}

#[test]
fn small_spheres_split_into_closed_halves() {
    for radius in [1e-4, 1e-8] {
        let sphere = Mesh::uv_sphere(radius, 32, 16);
        let cut = plane([0.3, 1.0, 0.1], 0.1 * radius);
        let (below, above) = solids_for(&sphere, cut);
        let options = BooleanOptions::default();

        let top = subtract(&sphere, &below, options).unwrap_or_else(|e| panic!("r={radius}: {e}"));
        let bottom = subtract(&sphere, &above, options).unwrap_or_else(|e| panic!("r={radius}: {e}"));

        let volume = sphere.volume();
        for result in [&top, &bottom] {
            assert_eq!(result.diagnostics.relation, ToolRelation::Crossing);
            assert!(!result.diagnostics.tolerance_relaxed, "r={radius}");
            assert!(result.diagnostics.tolerance_used < radius * 1e-3);
            assert!(result.mesh_diagnostics.is_valid_solid(), "r={radius}: {}", result.mesh_diagnostics);
            assert!(result.mesh.volume() > 0.0);
        }
        let total = top.mesh.volume() + bottom.mesh.volume();
        assert!((total - volume).abs() < 1e-9 * volume, "r={radius}: {total} != {volume}");
    }
}
