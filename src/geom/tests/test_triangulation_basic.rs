use std::collections::HashMap;

use crate::geom::{Tolerance, TriangulationError, UvPoint, loop_area, point_in_loop, triangulate_loops};

fn uv(points: &[(f64, f64)]) -> Vec<UvPoint> {
    points.iter().map(|&(u, v)| UvPoint::new(u, v)).collect()
}

fn triangle_area(points: &[UvPoint], tri: [u32; 3]) -> f64 {
    let [a, b, c] = tri.map(|i| points[i as usize]);
    0.5 * ((b.u - a.u) * (c.v - a.v) - (c.u - a.u) * (b.v - a.v))
}

fn undirected_edge_counts(triangles: &[[u32; 3]]) -> HashMap<(u32, u32), usize> {
    let mut counts = HashMap::new();
    for t in triangles {
        for (a, b) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
            *counts.entry((a.min(b), a.max(b))).or_insert(0) += 1;
        }
    }
    counts
}

#[test]
fn square_splits_into_two_ccw_triangles() {
    let square = uv(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
    let tris = triangulate_loops(&square, &[], Tolerance::DEFAULT).expect("triangulate");

    assert_eq!(tris.len(), 2);
    let total: f64 = tris.iter().map(|&t| triangle_area(&square, t)).sum();
    assert!((total - 1.0).abs() < 1e-12);
    for &t in &tris {
        assert!(triangle_area(&square, t) > 0.0);
    }
}

#[test]
fn clockwise_outer_still_yields_ccw_triangles() {
    let square = uv(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)]);
    assert!(loop_area(&square) < 0.0);
    let tris = triangulate_loops(&square, &[], Tolerance::DEFAULT).expect("triangulate");
    for &t in &tris {
        assert!(triangle_area(&square, t) > 0.0);
    }
}

#[test]
fn square_with_hole() {
    let outer = uv(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)]);
    let hole = uv(&[(1.0, 1.0), (3.0, 1.0), (3.0, 3.0), (1.0, 3.0)]);
    let tris = triangulate_loops(&outer, &[hole.clone()], Tolerance::DEFAULT).expect("triangulate");

    let mut all = outer.clone();
    all.extend_from_slice(&hole);
    assert_eq!(tris.len(), 8);
    let total: f64 = tris.iter().map(|&t| triangle_area(&all, t)).sum();
    assert!((total - 12.0).abs() < 1e-12);

    // Every loop edge is used by exactly one triangle.
    let counts = undirected_edge_counts(&tris);
    for ring in [[0u32, 1, 2, 3], [4, 5, 6, 7]] {
        for i in 0..4 {
            let (a, b) = (ring[i], ring[(i + 1) % 4]);
            assert_eq!(counts.get(&(a.min(b), a.max(b))), Some(&1));
        }
    }
}

#[test]
fn collinear_boundary_points_are_kept() {
    // Midpoints on every side: dropping them would leave T-junctions against
    // the neighbouring surface.
    let outer = uv(&[
        (0.0, 0.0),
        (1.0, 0.0),
        (2.0, 0.0),
        (2.0, 1.0),
        (2.0, 2.0),
        (1.0, 2.0),
        (0.0, 2.0),
        (0.0, 1.0),
    ]);
    let tris = triangulate_loops(&outer, &[], Tolerance::DEFAULT).expect("triangulate");

    assert_eq!(tris.len(), 6);
    let total: f64 = tris.iter().map(|&t| triangle_area(&outer, t)).sum();
    assert!((total - 4.0).abs() < 1e-12);

    let counts = undirected_edge_counts(&tris);
    for i in 0..outer.len() as u32 {
        let j = (i + 1) % outer.len() as u32;
        assert_eq!(counts.get(&(i.min(j), i.max(j))), Some(&1));
    }
    for (edge, count) in counts {
        assert!(count <= 2, "edge {edge:?} used {count} times");
    }
}

#[test]
fn concave_polygon_stays_inside() {
    let outer = uv(&[(0.0, 0.0), (3.0, 0.0), (3.0, 3.0), (2.0, 3.0), (2.0, 1.0), (1.0, 1.0), (1.0, 3.0), (0.0, 3.0)]);
    let tris = triangulate_loops(&outer, &[], Tolerance::DEFAULT).expect("triangulate");

    assert_eq!(tris.len(), outer.len() - 2);
    let total: f64 = tris.iter().map(|&t| triangle_area(&outer, t)).sum();
    assert!((total - loop_area(&outer)).abs() < 1e-12);
    for &t in &tris {
        let [a, b, c] = t.map(|i| outer[i as usize]);
        let centroid = UvPoint::new((a.u + b.u + c.u) / 3.0, (a.v + b.v + c.v) / 3.0);
        assert!(point_in_loop(centroid, &outer));
    }
}

#[test]
fn rejects_bad_input() {
    let two = uv(&[(0.0, 0.0), (1.0, 0.0)]);
    assert_eq!(
        triangulate_loops(&two, &[], Tolerance::DEFAULT),
        Err(TriangulationError::TooFewPoints)
    );

    let nan = uv(&[(0.0, 0.0), (f64::NAN, 0.0), (1.0, 1.0)]);
    assert_eq!(
        triangulate_loops(&nan, &[], Tolerance::DEFAULT),
        Err(TriangulationError::NonFinite)
    );
}

#[test]
fn point_in_loop_basic() {
    let square = uv(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
    assert!(point_in_loop(UvPoint::new(0.5, 0.5), &square));
    assert!(!point_in_loop(UvPoint::new(1.5, 0.5), &square));
    assert!((loop_area(&square) - 1.0).abs() < 1e-12);
}

#[test]
fn fine_ring_at_small_scale() {
    // A 64-gon of radius 1e-4: edges are ~1e-5 long, so every cross product
    // is far below the linear epsilon.
    let n: u32 = 64;
    let ring: Vec<UvPoint> = (0..n)
        .map(|i| {
            let a = std::f64::consts::TAU * f64::from(i) / f64::from(n);
            UvPoint::new(1e-4 * a.cos(), 1e-4 * a.sin())
        })
        .collect();
    let tris = triangulate_loops(&ring, &[], Tolerance::DEFAULT).expect("triangulate");

    assert_eq!(tris.len(), ring.len() - 2);
    let total: f64 = tris.iter().map(|&t| triangle_area(&ring, t)).sum();
    assert!((total - loop_area(&ring)).abs() < 1e-12 * loop_area(&ring));
    for &t in &tris {
        assert!(triangle_area(&ring, t) > 0.0);
    }
}

#[test]
fn small_square_with_hole() {
    let s = 1e-5;
    let outer = uv(&[(0.0, 0.0), (4.0 * s, 0.0), (4.0 * s, 4.0 * s), (0.0, 4.0 * s)]);
    let hole = uv(&[(s, s), (3.0 * s, s), (3.0 * s, 3.0 * s), (s, 3.0 * s)]);
    let tris = triangulate_loops(&outer, &[hole.clone()], Tolerance::DEFAULT).expect("triangulate");

    let mut all = outer.clone();
    all.extend_from_slice(&hole);
    assert_eq!(tris.len(), 8);
    let total: f64 = tris.iter().map(|&t| triangle_area(&all, t)).sum();
    assert!((total - 12.0 * s * s).abs() < 1e-9 * s * s);
    for &t in &tris {
        assert!(triangle_area(&all, t) > 0.0);
    }
}
