use std::f64::consts::PI;

use crate::geom::mesh::{cull_collapsed_triangles, weld_mesh_vertices};
use crate::geom::{Mesh, Point3, Tolerance, Transform, Vec3};

fn assert_closed_solid(mesh: &Mesh) {
    mesh.validate().expect("mesh validate");
    let diag = mesh.diagnostics();
    assert!(diag.is_valid_solid(), "{diag}");
    assert_eq!(diag.vertex_count, mesh.positions.len());
    assert_eq!(diag.triangle_count, mesh.indices.len() / 3);
    assert!(mesh.volume() > 0.0);

    let normals = mesh.normals.as_ref().expect("normals");
    assert_eq!(normals.len(), mesh.positions.len());
    for n in normals {
        assert!(n.iter().all(|c| c.is_finite()));
    }
}

#[test]
fn primitives_are_closed_and_outward() {
    let sphere = Mesh::uv_sphere(1.0, 32, 16);
    assert_closed_solid(&sphere);
    assert_eq!(sphere.positions.len(), 2 + 15 * 32);
    let exact = 4.0 / 3.0 * PI;
    assert!(sphere.volume() < exact);
    assert!(sphere.volume() > 0.95 * exact);

    let cube = Mesh::cuboid(Vec3::new(1.0, 2.0, 3.0));
    assert_closed_solid(&cube);
    assert!((cube.volume() - 48.0).abs() < 1e-12);
    assert!((cube.surface_area() - 88.0).abs() < 1e-12);

    let torus = Mesh::torus(2.0, 0.5, 12, 24);
    assert_closed_solid(&torus);
    let exact = 2.0 * PI * PI * 2.0 * 0.25;
    assert!(torus.volume() < exact);
    assert!(torus.volume() > 0.9 * exact);
}

#[test]
fn sphere_normals_point_away_from_center() {
    let sphere = Mesh::uv_sphere(2.0, 16, 8);
    let normals = sphere.normals.as_ref().expect("normals");
    for (p, n) in sphere.positions.iter().zip(normals) {
        let dot = p[0] * n[0] + p[1] * n[1] + p[2] * n[2];
        assert!(dot > 0.0);
    }
}

#[test]
fn transformed_mesh_keeps_volume_under_rigid_motion() {
    let cube = Mesh::cuboid(Vec3::new(0.5, 0.5, 0.5));
    let rotate = Transform::rotate_axis(Vec3::new(1.0, 2.0, 3.0), 0.7).expect("rotation");
    let moved = cube.transformed(Transform::translate(Vec3::new(4.0, -1.0, 2.0)) * rotate);

    assert!((moved.volume() - 1.0).abs() < 1e-12);
    let center = moved.bbox().expect("bbox").center();
    assert!(Tolerance::LOOSE.approx_eq_point3(center, Point3::new(4.0, -1.0, 2.0)));
}

#[test]
fn flat_views_match_buffers() {
    let mesh = Mesh::uv_sphere(1.0, 8, 4);
    assert_eq!(mesh.positions_flat().len(), mesh.positions.len() * 3);
    assert_eq!(mesh.normals_flat().expect("normals").len(), mesh.positions.len() * 3);
    assert_eq!(mesh.positions_flat()[3..6], mesh.positions[1]);
}

#[test]
fn weld_merges_coincident_vertices() {
    let points = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(1.0 + 1e-12, 0.0, 0.0),
        Point3::new(0.0, 1.0, 1e-12),
        Point3::new(1.0, 1.0, 0.0),
    ];
    let indices = vec![0, 1, 2, 3, 5, 4];
    let (welded, indices, count) = weld_mesh_vertices(points, indices, Tolerance::DEFAULT);

    assert_eq!(count, 2);
    assert_eq!(welded.len(), 4);
    assert_eq!(indices, vec![0, 1, 2, 1, 3, 2]);
}

#[test]
fn collapsed_triangles_are_dropped() {
    let (kept, removed) = cull_collapsed_triangles(&[0, 1, 2, 3, 3, 4, 5, 6, 5]);
    assert_eq!(kept, vec![0, 1, 2]);
    assert_eq!(removed, 2);
}

#[test]
fn mesh_validate_rejects_bad_buffers() {
    let mesh = Mesh::new(vec![[0.0, 0.0, 0.0]], vec![0]);
    assert!(mesh.validate().is_err());

    let mesh = Mesh::new(vec![[0.0, 0.0, 0.0]], vec![0, 1, 0]);
    assert!(mesh.validate().is_err());

    let mesh = Mesh::new(vec![[f64::NAN, 0.0, 0.0]; 3], vec![0, 1, 2]);
    assert!(mesh.validate().is_err());
}

#[test]
fn open_surface_reports_open_edges() {
    let mut cube = Mesh::cuboid(Vec3::new(1.0, 1.0, 1.0));
    cube.indices.truncate(cube.indices.len() - 6);
    let diag = cube.diagnostics();
    assert_eq!(diag.open_edge_count, 4);
    assert!(!diag.is_watertight());
    assert!(!diag.warnings.is_empty());
}
