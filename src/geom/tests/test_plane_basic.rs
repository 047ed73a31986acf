use crate::geom::{
    BBox, HalfSpacePolicy, Plane, PlaneError, Point3, Tolerance, Vec3, build_cut_plane,
    build_half_space_solids,
};

#[test]
fn cut_plane_contains_drag_points_and_eye() {
    let a = Point3::new(-1.0, 0.2, 0.9);
    let b = Point3::new(1.0, -0.3, 0.8);
    let eye = Point3::new(0.0, 0.0, 5.0);
    let plane = build_cut_plane(a, b, eye, Tolerance::DEFAULT).expect("plane");

    assert!((plane.normal.length() - 1.0).abs() < 1e-12);
    for p in [a, b, eye] {
        assert!(plane.signed_distance(p).abs() < 1e-12);
    }
}

#[test]
fn horizontal_drag_in_front_of_camera_gives_xz_plane() {
    let plane = build_cut_plane(
        Point3::new(-1.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 0.0, 5.0),
        Tolerance::DEFAULT,
    )
    .expect("plane");

    assert_eq!(plane.normal, Vec3::new(0.0, -1.0, 0.0));
    assert_eq!(plane.constant, 0.0);
}

#[test]
fn cut_plane_rejects_degenerate_input() {
    let tol = Tolerance::DEFAULT;
    let eye = Point3::new(0.0, 0.0, 5.0);
    let a = Point3::new(0.0, 0.0, 1.0);

    let same = build_cut_plane(a, a, eye, tol);
    assert!(matches!(same, Err(PlaneError::Degenerate(_))));

    // Drag pointing straight at the eye.
    let toward_eye = build_cut_plane(a, Point3::new(0.0, 0.0, 2.0), eye, tol);
    assert!(matches!(toward_eye, Err(PlaneError::Degenerate(_))));

    let at_eye = build_cut_plane(eye, Point3::new(1.0, 0.0, 5.0), eye, tol);
    assert!(matches!(at_eye, Err(PlaneError::Degenerate(_))));

    let nan = build_cut_plane(Point3::new(f64::NAN, 0.0, 0.0), a, eye, tol);
    assert!(matches!(nan, Err(PlaneError::Degenerate(_))));
}

#[test]
fn flipped_plane_negates_distances_exactly() {
    let plane = Plane::new(Vec3::new(0.3, -0.7, 0.2), 0.37).expect("plane");
    let flipped = plane.flipped();
    for p in [
        Point3::new(0.1, 0.2, 0.3),
        Point3::new(-4.5, 1.0e-3, 7.25),
        Point3::new(1.0 / 3.0, 2.0 / 7.0, -5.0 / 11.0),
    ] {
        assert_eq!(flipped.signed_distance(p), -plane.signed_distance(p));
    }
    assert_eq!(flipped.flipped(), plane);
}

#[test]
fn plane_new_rejects_zero_normal() {
    assert!(Plane::new(Vec3::ZERO, 0.0).is_none());
    assert!(Plane::new(Vec3::Y, f64::INFINITY).is_none());
}

#[test]
fn half_space_solids_share_the_cut_face_and_cover_the_target() {
    let plane = Plane::new(Vec3::new(1.0, 1.0, 0.0), 0.25).expect("plane");
    let bounds = BBox::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
    let (below, above) =
        build_half_space_solids(plane, bounds, HalfSpacePolicy::default()).expect("solids");

    assert_eq!(below.face, plane);
    assert_eq!(above.face, plane.flipped());
    assert_eq!(below.faces()[0], plane);
    assert!(below.half_extent >= 100.0);

    for corner in bounds.corners() {
        let d = plane.signed_distance(corner);
        if d < 0.0 {
            assert!(below.contains_point(corner));
            assert!(!above.contains_point(corner));
        } else if d > 0.0 {
            assert!(above.contains_point(corner));
            assert!(!below.contains_point(corner));
        }
    }

    // Every face but the cut face stays far from the target.
    for solid in [below, above] {
        for face in &solid.faces()[1..] {
            for corner in bounds.corners() {
                assert!(face.signed_distance(corner) < -10.0);
            }
        }
    }
}

#[test]
fn half_space_solid_meshes_are_closed_boxes() {
    let plane = Plane::new(Vec3::new(0.0, 0.0, 1.0), 0.0).expect("plane");
    let bounds = BBox::new(Point3::new(-0.5, -0.5, -0.5), Point3::new(0.5, 0.5, 0.5));
    let policy = HalfSpacePolicy {
        extent_factor: 2.0,
        min_half_extent: 0.0,
    };
    let (below, above) = build_half_space_solids(plane, bounds, policy).expect("solids");

    for solid in [below, above] {
        let mesh = solid.mesh();
        let diag = mesh.diagnostics();
        assert!(diag.is_valid_solid());
        let h = solid.half_extent;
        let expected = 8.0 * h * h * h;
        assert!((mesh.volume() - expected).abs() < 1e-9 * expected);
        assert!(solid.bbox().contains_point(solid.center));
    }

    // The box sits on its side of the plane with one face on it.
    let below_box = below.mesh().bbox().expect("bbox");
    let above_box = above.mesh().bbox().expect("bbox");
    assert!(below_box.max.z.abs() < 1e-12);
    assert!(above_box.min.z.abs() < 1e-12);
}

#[test]
fn half_space_extent_respects_minimum() {
    let plane = Plane::new(Vec3::X, 0.0).expect("plane");
    let tiny = BBox::new(Point3::new(-1e-4, -1e-4, -1e-4), Point3::new(1e-4, 1e-4, 1e-4));
    let (below, _) = build_half_space_solids(plane, tiny, HalfSpacePolicy::default()).expect("solids");
    assert_eq!(below.half_extent, 1.0);
}
