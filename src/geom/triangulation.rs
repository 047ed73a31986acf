//! Ear clipping for planar cap regions (one outer loop, any number of holes).
//!
//! Every input vertex is kept. Cap vertices are shared with the side walls
//! of the fragment, so removing a collinear vertex here would leave a
//! T-junction in the finished mesh.

use super::Tolerance;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvPoint {
    pub u: f64,
    pub v: f64,
}

impl UvPoint {
    #[must_use]
    pub const fn new(u: f64, v: f64) -> Self {
        Self { u, v }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TriangulationError {
    #[error("loop has fewer than 3 points")]
    TooFewPoints,
    #[error("loop has non-finite coordinates")]
    NonFinite,
    #[error("no bridge from hole to outer loop")]
    NoBridge,
    #[error("ear clipping stalled with {remaining} vertices left")]
    NoEars { remaining: usize },
}

#[derive(Debug, Clone, Copy)]
struct Node {
    idx: u32,
    point: UvPoint,
    prev: usize,
    next: usize,
}

/// Signed area, positive for counter-clockwise loops.
#[must_use]
pub fn loop_area(points: &[UvPoint]) -> f64 {
    let n = points.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            a.u * b.v - b.u * a.v
        })
        .sum();
    0.5 * twice
}

/// Even-odd containment test against a closed loop.
#[must_use]
pub fn point_in_loop(p: UvPoint, points: &[UvPoint]) -> bool {
    let n = points.len();
    let mut inside = false;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        if (a.v > p.v) != (b.v > p.v) {
            let x = a.u + (p.v - a.v) / (b.v - a.v) * (b.u - a.u);
            if p.u < x {
                inside = !inside;
            }
        }
    }
    inside
}

/// Triangulates `outer` with `holes` cut out of it.
///
/// Indices refer to the concatenation `outer ++ holes[0] ++ holes[1] ...`.
/// Triangles come out counter-clockwise in `(u, v)`; holes are re-oriented
/// against the outer loop as needed.
pub fn triangulate_loops(
    outer: &[UvPoint],
    holes: &[Vec<UvPoint>],
    tol: Tolerance,
) -> Result<Vec<[u32; 3]>, TriangulationError> {
    if outer.len() < 3 || holes.iter().any(|h| h.len() < 3) {
        return Err(TriangulationError::TooFewPoints);
    }

    let mut vertices: Vec<UvPoint> = outer.to_vec();
    for hole in holes {
        vertices.extend_from_slice(hole);
    }
    if vertices.iter().any(|p| !p.u.is_finite() || !p.v.is_finite()) {
        return Err(TriangulationError::NonFinite);
    }

    let outer_ccw = loop_area(outer) > 0.0;
    let mut nodes: Vec<Node> = Vec::with_capacity(vertices.len() + 2 * holes.len());
    let outer_start = build_ring_nodes(&mut nodes, 0, outer.len(), &vertices, false);

    let mut hole_lefts = Vec::with_capacity(holes.len());
    let mut cursor = outer.len();
    for hole in holes {
        let reverse = (loop_area(hole) > 0.0) == outer_ccw;
        let start = build_ring_nodes(&mut nodes, cursor, hole.len(), &vertices, reverse);
        hole_lefts.push(leftmost_node(start, &nodes));
        cursor += hole.len();
    }
    hole_lefts.sort_by(|&a, &b| {
        let pa = nodes[a].point;
        let pb = nodes[b].point;
        pa.u.total_cmp(&pb.u).then_with(|| pa.v.total_cmp(&pb.v))
    });

    for hole_left in hole_lefts {
        let bridge = find_hole_bridge(hole_left, outer_start, &nodes, tol)
            .ok_or(TriangulationError::NoBridge)?;
        split_polygon(bridge, hole_left, &mut nodes);
    }

    earclip_ring(outer_start, &mut nodes, tol)
}

fn build_ring_nodes(
    nodes: &mut Vec<Node>,
    first: usize,
    len: usize,
    vertices: &[UvPoint],
    reverse: bool,
) -> usize {
    let start_idx = nodes.len();
    for i in 0..len {
        let idx = if reverse { first + len - 1 - i } else { first + i };
        nodes.push(Node {
            idx: idx as u32,
            point: vertices[idx],
            prev: start_idx + (i + len - 1) % len,
            next: start_idx + (i + 1) % len,
        });
    }
    start_idx
}

fn ring_len(start: usize, nodes: &[Node]) -> usize {
    let mut count = 0usize;
    let mut cur = start;
    loop {
        count += 1;
        cur = nodes[cur].next;
        if cur == start || count > nodes.len() {
            break;
        }
    }
    count
}

fn leftmost_node(start: usize, nodes: &[Node]) -> usize {
    let mut left = start;
    let mut cur = nodes[start].next;
    while cur != start {
        let a = nodes[cur].point;
        let b = nodes[left].point;
        if a.u < b.u || (a.u == b.u && a.v < b.v) {
            left = cur;
        }
        cur = nodes[cur].next;
    }
    left
}

/// Outer-ring vertex that the leftmost hole vertex can see, found by casting
/// a ray towards `-u`.
fn find_hole_bridge(hole: usize, outer_start: usize, nodes: &[Node], tol: Tolerance) -> Option<usize> {
    let hole_p = nodes[hole].point;
    let mut best_x = f64::NEG_INFINITY;
    let mut best_edge = None;

    let mut p = outer_start;
    loop {
        let q = nodes[p].next;
        let a = nodes[p].point;
        let b = nodes[q].point;

        if (a.v > hole_p.v) != (b.v > hole_p.v) {
            let t = (hole_p.v - a.v) / (b.v - a.v);
            let x = a.u + t * (b.u - a.u);
            if x <= hole_p.u + tol.eps && x > best_x {
                best_x = x;
                best_edge = Some((p, q));
            }
        }

        p = q;
        if p == outer_start {
            break;
        }
    }

    if let Some((e0, e1)) = best_edge {
        let candidates = if nodes[e0].point.u < nodes[e1].point.u {
            [e0, e1]
        } else {
            [e1, e0]
        };
        for cand in candidates {
            if is_visible(hole_p, nodes[cand].point, cand, outer_start, nodes, tol) {
                return Some(cand);
            }
        }
    }

    // Fall back to the nearest visible vertex on the left.
    let mut best = None;
    let mut best_dist2 = f64::INFINITY;
    let mut v = outer_start;
    loop {
        let p = nodes[v].point;
        if p.u <= hole_p.u + tol.eps && is_visible(hole_p, p, v, outer_start, nodes, tol) {
            let d2 = (p.u - hole_p.u).powi(2) + (p.v - hole_p.v).powi(2);
            if d2 < best_dist2 {
                best_dist2 = d2;
                best = Some(v);
            }
        }
        v = nodes[v].next;
        if v == outer_start {
            break;
        }
    }
    best
}

/// Links `a` (outer) to `b` (hole) with a zero-width channel, duplicating
/// both endpoints.
fn split_polygon(a: usize, b: usize, nodes: &mut Vec<Node>) {
    let a_next = nodes[a].next;
    let b_prev = nodes[b].prev;

    let a2 = nodes.len();
    nodes.push(Node { prev: 0, next: 0, ..nodes[a] });
    let b2 = nodes.len();
    nodes.push(Node { prev: 0, next: 0, ..nodes[b] });

    nodes[a].next = b;
    nodes[b].prev = a;

    nodes[b_prev].next = b2;
    nodes[b2].prev = b_prev;

    nodes[b2].next = a2;
    nodes[a2].prev = b2;

    nodes[a2].next = a_next;
    nodes[a_next].prev = a2;
}

fn earclip_ring(start: usize, nodes: &mut [Node], tol: Tolerance) -> Result<Vec<[u32; 3]>, TriangulationError> {
    let is_ccw = signed_area_ring(start, nodes) > 0.0;
    let mut remaining = ring_len(start, nodes);
    if remaining < 3 {
        return Err(TriangulationError::TooFewPoints);
    }

    let mut triangles = Vec::with_capacity(remaining - 2);
    let mut ear = start;
    let mut stop = start;
    // After a full lap without an ear, degenerate (collinear) ears are
    // accepted so runs of collinear boundary points can still be consumed.
    let mut relaxed = false;

    while remaining > 3 {
        let prev = nodes[ear].prev;
        let next = nodes[ear].next;
        if is_ear(prev, ear, next, nodes, is_ccw, relaxed, tol) {
            triangles.push(ccw_triangle(nodes, prev, ear, next, is_ccw));
            remove_node(ear, nodes);
            remaining -= 1;
            ear = next;
            stop = next;
            relaxed = false;
            continue;
        }

        ear = next;
        if ear == stop {
            if relaxed {
                return Err(TriangulationError::NoEars { remaining });
            }
            relaxed = true;
        }
    }

    let prev = nodes[ear].prev;
    let next = nodes[ear].next;
    triangles.push(ccw_triangle(nodes, prev, ear, next, is_ccw));
    Ok(triangles)
}

fn ccw_triangle(nodes: &[Node], prev: usize, ear: usize, next: usize, is_ccw: bool) -> [u32; 3] {
    if is_ccw {
        [nodes[prev].idx, nodes[ear].idx, nodes[next].idx]
    } else {
        [nodes[prev].idx, nodes[next].idx, nodes[ear].idx]
    }
}

fn is_ear(
    prev: usize,
    ear: usize,
    next: usize,
    nodes: &[Node],
    is_ccw: bool,
    relaxed: bool,
    tol: Tolerance,
) -> bool {
    let a = nodes[prev].point;
    let b = nodes[ear].point;
    let c = nodes[next].point;

    let cross = orient2d(a, b, c);
    let convexity = if is_ccw { cross } else { -cross };

    let degenerate = distance_point_to_line_2d(a, b, c) <= tol.eps;
    if relaxed {
        if convexity < -area_eps(a, c, tol) {
            return false;
        }
        if degenerate {
            return true;
        }
    } else if convexity <= 0.0 || degenerate {
        return false;
    }

    let corners = [nodes[prev].idx, nodes[ear].idx, nodes[next].idx];
    let mut p = nodes[next].next;
    let mut guard = 0usize;
    while p != prev {
        guard += 1;
        if guard > nodes.len() {
            break;
        }
        // Bridge duplicates share an index with a triangle corner.
        if !corners.contains(&nodes[p].idx) {
            let pt = nodes[p].point;
            if point_in_triangle(a, b, c, pt, is_ccw, tol) {
                let before = nodes[nodes[p].prev].point;
                let after = nodes[nodes[p].next].point;
                let cross_p = orient2d(before, pt, after);
                let e = tol.eps * distance(before, pt).max(distance(pt, after));
                let is_reflex = if is_ccw { cross_p <= e } else { cross_p >= -e };
                if is_reflex {
                    return false;
                }
            }
        }
        p = nodes[p].next;
    }

    true
}

fn signed_area_ring(start: usize, nodes: &[Node]) -> f64 {
    let mut area = 0.0;
    let mut p = start;
    loop {
        let q = nodes[p].next;
        let a = nodes[p].point;
        let b = nodes[q].point;
        area += a.u * b.v - b.u * a.v;
        p = q;
        if p == start {
            break;
        }
    }
    0.5 * area
}

fn remove_node(node: usize, nodes: &mut [Node]) {
    let prev = nodes[node].prev;
    let next = nodes[node].next;
    nodes[prev].next = next;
    nodes[next].prev = prev;
}

fn orient2d(a: UvPoint, b: UvPoint, c: UvPoint) -> f64 {
    (b.u - a.u) * (c.v - a.v) - (b.v - a.v) * (c.u - a.u)
}

fn distance(a: UvPoint, b: UvPoint) -> f64 {
    ((a.u - b.u).powi(2) + (a.v - b.v).powi(2)).sqrt()
}

fn point_in_triangle(a: UvPoint, b: UvPoint, c: UvPoint, p: UvPoint, is_ccw: bool, tol: Tolerance) -> bool {
    // Each edge test is a signed distance of `p` scaled by that edge's length.
    let ab = orient2d(a, b, p);
    let bc = orient2d(b, c, p);
    let ca = orient2d(c, a, p);
    let (e_ab, e_bc, e_ca) = (area_eps(a, b, tol), area_eps(b, c, tol), area_eps(c, a, tol));

    if is_ccw {
        ab >= -e_ab && bc >= -e_bc && ca >= -e_ca
    } else {
        ab <= e_ab && bc <= e_bc && ca <= e_ca
    }
}

fn is_visible(a: UvPoint, b: UvPoint, b_node: usize, ring_start: usize, nodes: &[Node], tol: Tolerance) -> bool {
    let mut e = ring_start;
    loop {
        let n = nodes[e].next;
        if e != b_node && n != b_node && segments_intersect(a, b, nodes[e].point, nodes[n].point, tol) {
            return false;
        }
        e = n;
        if e == ring_start {
            break;
        }
    }
    true
}

fn segments_intersect(a: UvPoint, b: UvPoint, c: UvPoint, d: UvPoint, tol: Tolerance) -> bool {
    let o1 = orient2d(a, b, c);
    let o2 = orient2d(a, b, d);
    let o3 = orient2d(c, d, a);
    let o4 = orient2d(c, d, b);
    let e_ab = area_eps(a, b, tol);
    let e_cd = area_eps(c, d, tol);

    if (o1.abs() <= e_ab && on_segment(a, c, b, tol))
        || (o2.abs() <= e_ab && on_segment(a, d, b, tol))
        || (o3.abs() <= e_cd && on_segment(c, a, d, tol))
        || (o4.abs() <= e_cd && on_segment(c, b, d, tol))
    {
        return true;
    }

    let ab = (o1 > e_ab && o2 < -e_ab) || (o1 < -e_ab && o2 > e_ab);
    let cd = (o3 > e_cd && o4 < -e_cd) || (o3 < -e_cd && o4 > e_cd);
    ab && cd
}

/// Threshold for `orient2d` against the edge `a`-`b`: a distance of `eps` from
/// that edge's line, expressed in the cross product's area units.
fn area_eps(a: UvPoint, b: UvPoint, tol: Tolerance) -> f64 {
    tol.eps * distance(a, b)
}

fn on_segment(a: UvPoint, p: UvPoint, b: UvPoint, tol: Tolerance) -> bool {
    p.u >= a.u.min(b.u) - tol.eps
        && p.u <= a.u.max(b.u) + tol.eps
        && p.v >= a.v.min(b.v) - tol.eps
        && p.v <= a.v.max(b.v) + tol.eps
}

fn distance_point_to_line_2d(a: UvPoint, p: UvPoint, b: UvPoint) -> f64 {
    let denom = distance(a, b);
    if !denom.is_finite() || denom <= 0.0 {
        return distance(a, p);
    }
    orient2d(a, b, p).abs() / denom
}
