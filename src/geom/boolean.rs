//! Boolean subtraction of a half-space box from a closed triangle mesh.
//!
//! The tool is always a [`HalfSpaceSolid`]: a box whose faces other than the
//! cut face lie far outside the target. That reduces the general CSG problem
//! to clipping the target against a single plane and closing the opening
//! with a planar cap.
//!
//! Two calls with complementary tools (same plane, opposite orientation)
//! produce fragments that share their split vertices bit for bit: every
//! split point is computed once per undirected edge, from the lower vertex
//! index, and signed distances negate exactly under [`Plane::flipped`].

use std::collections::HashMap;

use super::bvh::Bvh;
use super::diagnostics::MeshDiagnostics;
use super::mesh::{
    Mesh, Triangle3, count_edge_topology, cull_collapsed_triangles, finalize_mesh,
    weld_mesh_vertices,
};
use super::plane::{HalfSpaceSolid, Plane};
use super::triangulation::{UvPoint, loop_area, point_in_loop, triangulate_loops};
use super::{BBox, Point3, Tolerance};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BooleanOptions {
    /// Capped at a millionth of the target's bounding diagonal.
    pub tolerance: Tolerance,
    /// Retry with a 10x and then 100x looser epsilon when the result is not a
    /// valid solid.
    pub relax_on_failure: bool,
}

impl Default for BooleanOptions {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::DEFAULT,
            relax_on_failure: true,
        }
    }
}

/// How the target sits relative to the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolRelation {
    /// No target vertex is strictly inside the tool; the target is returned
    /// unchanged.
    #[default]
    Disjoint,
    /// No target vertex is strictly outside; the result is empty.
    Contains,
    /// The cut face crosses the target.
    Crossing,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BooleanDiagnostics {
    pub relation: ToolRelation,
    pub input_vertex_count: usize,
    pub input_triangle_count: usize,
    pub welded_vertex_count: usize,
    pub collapsed_triangle_count: usize,
    pub on_plane_vertex_count: usize,
    pub split_edge_count: usize,
    pub split_triangle_count: usize,
    pub coplanar_triangle_count: usize,
    pub kept_triangle_count: usize,
    pub cap_loop_count: usize,
    pub cap_hole_count: usize,
    pub cap_triangle_count: usize,
    pub tolerance_used: f64,
    pub tolerance_relaxed: bool,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BooleanResult {
    pub mesh: Mesh,
    pub mesh_diagnostics: MeshDiagnostics,
    pub diagnostics: BooleanDiagnostics,
}

impl BooleanResult {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mesh.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BooleanError {
    #[error("mesh is empty")]
    EmptyMesh,
    #[error("mesh contains invalid (non-finite) geometry")]
    InvalidGeometry,
    #[error("mesh contains invalid indices")]
    InvalidIndices,
    #[error("target mesh is not closed ({open_edges} open, {non_manifold_edges} non-manifold edges)")]
    NotClosed {
        open_edges: usize,
        non_manifold_edges: usize,
    },
    #[error("half-space tool is too small: {crossing_faces} of its faces cross the target")]
    ToolTooSmall { crossing_faces: usize },
    #[error("cut produced a non-manifold result ({open_edges} open, {non_manifold_edges} non-manifold edges)")]
    NonManifoldResult {
        open_edges: usize,
        non_manifold_edges: usize,
    },
    #[error("cut classification is indeterminate: {0}")]
    Indeterminate(String),
}

impl BooleanError {
    /// Failures a looser epsilon can plausibly fix.
    fn is_retryable(&self) -> bool {
        matches!(self, Self::NonManifoldResult { .. } | Self::Indeterminate(_))
    }
}

/// `target − tool`.
///
/// The result is either the target unchanged, an empty mesh, or a closed
/// manifold fragment made of the clipped target surface plus a planar cap on
/// the tool's cut face.
pub fn subtract(
    target: &Mesh,
    tool: &HalfSpaceSolid,
    options: BooleanOptions,
) -> Result<BooleanResult, BooleanError> {
    let relax_factors: &[f64] = if options.relax_on_failure {
        &[1.0, 10.0, 100.0]
    } else {
        &[1.0]
    };

    let base = fit_tolerance(target, options.tolerance);
    let mut last_err = None;
    for (attempt, &factor) in relax_factors.iter().enumerate() {
        let tol = base.scaled(factor);
        match subtract_no_fallback(target, tool, tol) {
            Ok(mut result) => {
                if attempt > 0 {
                    let warning = format!("cut used tolerance relaxation fallback (eps={:.3e})", tol.eps);
                    log::warn!("{warning}");
                    result.diagnostics.tolerance_relaxed = true;
                    result.diagnostics.warnings.push(warning.clone());
                    result.mesh_diagnostics.tolerance_relaxed = true;
                    result.mesh_diagnostics.add_warning(warning);
                }
                return Ok(result);
            }
            Err(err) if err.is_retryable() => {
                log::debug!("subtract attempt {attempt} (eps={:.3e}) failed: {err}", tol.eps);
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_err.unwrap_or(BooleanError::EmptyMesh))
}

/// Largest epsilon allowed, as a fraction of the target's bounding diagonal.
const MAX_RELATIVE_EPS: f64 = 1e-6;

/// Caps `tol` so that welding and plane classification stay well below the
/// feature size of very small targets.
fn fit_tolerance(target: &Mesh, tol: Tolerance) -> Tolerance {
    let Some(bbox) = target.bbox() else {
        return tol;
    };
    let limit = bbox.diagonal() * MAX_RELATIVE_EPS;
    if limit.is_finite() && limit > 0.0 && limit < tol.eps {
        Tolerance::new(limit)
    } else {
        tol
    }
}

fn subtract_no_fallback(
    target: &Mesh,
    tool: &HalfSpaceSolid,
    tol: Tolerance,
) -> Result<BooleanResult, BooleanError> {
    let prepared = prepare_mesh(target, tol)?;
    let mut diagnostics = BooleanDiagnostics {
        input_vertex_count: target.vertex_count(),
        input_triangle_count: target.triangle_count(),
        welded_vertex_count: prepared.welded_vertex_count,
        collapsed_triangle_count: prepared.collapsed_triangle_count,
        tolerance_used: tol.eps,
        ..BooleanDiagnostics::default()
    };

    let face = match classify_against_tool(&prepared.points, tool, tol)? {
        Relation::Disjoint => {
            diagnostics.relation = ToolRelation::Disjoint;
            let mut mesh_diagnostics = target.diagnostics();
            mesh_diagnostics.welded_vertex_count = prepared.welded_vertex_count;
            return Ok(BooleanResult {
                mesh: target.clone(),
                mesh_diagnostics,
                diagnostics,
            });
        }
        Relation::Contains => {
            diagnostics.relation = ToolRelation::Contains;
            return Ok(BooleanResult {
                mesh: Mesh::default(),
                mesh_diagnostics: MeshDiagnostics::default(),
                diagnostics,
            });
        }
        Relation::Crossing(face) => face,
    };
    diagnostics.relation = ToolRelation::Crossing;

    let clipped = clip_against_face(&prepared, face, tol, &mut diagnostics)?;
    let cap = build_cap(&clipped, face, prepared.bbox, tol, &mut diagnostics)?;

    let mut indices = clipped.indices;
    indices.extend_from_slice(&cap);
    let (mesh, mut mesh_diagnostics) = finalize_mesh(&clipped.points, indices);
    mesh_diagnostics.welded_vertex_count = prepared.welded_vertex_count;
    mesh_diagnostics.degenerate_triangle_count = prepared.collapsed_triangle_count;

    if !mesh_diagnostics.is_valid_solid() {
        return Err(BooleanError::NonManifoldResult {
            open_edges: mesh_diagnostics.open_edge_count,
            non_manifold_edges: mesh_diagnostics.non_manifold_edge_count,
        });
    }

    log::debug!(
        "subtract: split {} triangles, {} cap loops, result {}",
        diagnostics.split_triangle_count,
        diagnostics.cap_loop_count,
        mesh_diagnostics.summary()
    );

    Ok(BooleanResult {
        mesh,
        mesh_diagnostics,
        diagnostics,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Preparation
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct PreparedMesh {
    points: Vec<Point3>,
    triangles: Vec<[u32; 3]>,
    bvh: Bvh,
    bbox: BBox,
    welded_vertex_count: usize,
    collapsed_triangle_count: usize,
}

fn prepare_mesh(mesh: &Mesh, tol: Tolerance) -> Result<PreparedMesh, BooleanError> {
    if mesh.positions.is_empty() || mesh.indices.is_empty() {
        return Err(BooleanError::EmptyMesh);
    }
    if mesh.indices.len() % 3 != 0 || !mesh.has_valid_indices() {
        return Err(BooleanError::InvalidIndices);
    }
    if mesh.has_invalid_vertices() {
        return Err(BooleanError::InvalidGeometry);
    }

    let (points, indices, welded_vertex_count) =
        weld_mesh_vertices(mesh.points(), mesh.indices.clone(), tol);
    let (indices, collapsed_triangle_count) = cull_collapsed_triangles(&indices);
    if indices.is_empty() {
        return Err(BooleanError::EmptyMesh);
    }

    let (open_edges, non_manifold_edges) = count_edge_topology(&indices);
    if open_edges > 0 || non_manifold_edges > 0 {
        return Err(BooleanError::NotClosed {
            open_edges,
            non_manifold_edges,
        });
    }

    let triangles: Vec<[u32; 3]> = indices
        .chunks_exact(3)
        .map(|t| [t[0], t[1], t[2]])
        .collect();
    let tri_bboxes: Vec<BBox> = triangles
        .iter()
        .map(|t| {
            Triangle3::new(
                points[t[0] as usize],
                points[t[1] as usize],
                points[t[2] as usize],
            )
            .bbox()
        })
        .collect();
    let bvh = Bvh::build(&tri_bboxes).ok_or(BooleanError::InvalidGeometry)?;
    let bbox = BBox::from_points(&points).ok_or(BooleanError::InvalidGeometry)?;

    Ok(PreparedMesh {
        points,
        triangles,
        bvh,
        bbox,
        welded_vertex_count,
        collapsed_triangle_count,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Broad phase
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlaneSide {
    /// Outside the tool: kept.
    Outside,
    Inside,
    OnPlane,
}

fn side_of(distance: f64, tol: Tolerance) -> PlaneSide {
    if distance > tol.eps {
        PlaneSide::Outside
    } else if distance < -tol.eps {
        PlaneSide::Inside
    } else {
        PlaneSide::OnPlane
    }
}

#[cfg(feature = "parallel")]
fn signed_distances(points: &[Point3], face: Plane) -> Vec<f64> {
    use rayon::prelude::*;
    points.par_iter().map(|&p| face.signed_distance(p)).collect()
}

#[cfg(not(feature = "parallel"))]
fn signed_distances(points: &[Point3], face: Plane) -> Vec<f64> {
    points.iter().map(|&p| face.signed_distance(p)).collect()
}

enum Relation {
    Disjoint,
    Contains,
    Crossing(Plane),
}

fn classify_against_tool(
    points: &[Point3],
    tool: &HalfSpaceSolid,
    tol: Tolerance,
) -> Result<Relation, BooleanError> {
    let mut crossing = Vec::new();
    for face in tool.faces() {
        let mut outside = 0usize;
        let mut inside = 0usize;
        for d in signed_distances(points, face) {
            if !d.is_finite() {
                return Err(BooleanError::Indeterminate(
                    "non-finite signed distance".to_string(),
                ));
            }
            match side_of(d, tol) {
                PlaneSide::Outside => outside += 1,
                PlaneSide::Inside => inside += 1,
                PlaneSide::OnPlane => {}
            }
        }

        if inside == 0 {
            return Ok(Relation::Disjoint);
        }
        if outside > 0 {
            crossing.push(face);
        }
    }

    match crossing.as_slice() {
        [] => Ok(Relation::Contains),
        [face] => Ok(Relation::Crossing(*face)),
        faces => Err(BooleanError::ToolTooSmall {
            crossing_faces: faces.len(),
        }),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Narrow phase
// ─────────────────────────────────────────────────────────────────────────────

struct ClippedSurface {
    points: Vec<Point3>,
    indices: Vec<u32>,
}

/// Split points keyed by undirected edge so both triangles sharing an edge
/// reuse the same vertex.
struct EdgeSplitter<'a> {
    points: Vec<Point3>,
    distances: &'a [f64],
    cache: HashMap<(u32, u32), u32>,
}

impl EdgeSplitter<'_> {
    fn split(&mut self, a: u32, b: u32) -> u32 {
        let key = (a.min(b), a.max(b));
        if let Some(&idx) = self.cache.get(&key) {
            return idx;
        }
        let (lo, hi) = (key.0 as usize, key.1 as usize);
        let d_lo = self.distances[lo];
        let t = d_lo / (d_lo - self.distances[hi]);
        let p = self.points[lo].lerp(self.points[hi], t);

        let idx = self.points.len() as u32;
        self.points.push(p);
        self.cache.insert(key, idx);
        idx
    }
}

fn clip_against_face(
    prepared: &PreparedMesh,
    face: Plane,
    tol: Tolerance,
    diagnostics: &mut BooleanDiagnostics,
) -> Result<ClippedSurface, BooleanError> {
    let distances = signed_distances(&prepared.points, face);
    let sides: Vec<PlaneSide> = distances.iter().map(|&d| side_of(d, tol)).collect();
    diagnostics.on_plane_vertex_count = sides.iter().filter(|&&s| s == PlaneSide::OnPlane).count();

    let mut near_plane = vec![false; prepared.triangles.len()];
    prepared.bvh.query_plane(face, tol.eps, |t| {
        near_plane[t] = true;
        true
    });

    let mut splitter = EdgeSplitter {
        points: prepared.points.clone(),
        distances: &distances,
        cache: HashMap::new(),
    };
    let mut indices = Vec::with_capacity(prepared.triangles.len() * 3);

    for (t, tri) in prepared.triangles.iter().enumerate() {
        let s = tri.map(|i| sides[i as usize]);
        if !near_plane[t] {
            // Boxes beyond the band normally have agreeing corners; a rounding
            // mismatch with `side_of` drops through to the full classification.
            if s == [PlaneSide::Outside; 3] {
                indices.extend_from_slice(tri);
                continue;
            }
            if s == [PlaneSide::Inside; 3] {
                continue;
            }
        }

        let has_out = s.contains(&PlaneSide::Outside);
        let has_in = s.contains(&PlaneSide::Inside);
        match (has_out, has_in) {
            (true, false) => indices.extend_from_slice(tri),
            (false, true) => {}
            (false, false) => {
                diagnostics.coplanar_triangle_count += 1;
                let normal = Triangle3::new(
                    prepared.points[tri[0] as usize],
                    prepared.points[tri[1] as usize],
                    prepared.points[tri[2] as usize],
                )
                .area_normal();
                // Keep faces whose outside looks into the tool: the material
                // behind them survives the cut.
                if normal.dot(face.normal) < 0.0 {
                    indices.extend_from_slice(tri);
                }
            }
            (true, true) => {
                diagnostics.split_triangle_count += 1;
                split_triangle(*tri, s, &mut splitter, &mut indices);
            }
        }
    }

    diagnostics.split_edge_count = splitter.cache.len();
    diagnostics.kept_triangle_count = indices.len() / 3;
    Ok(ClippedSurface {
        points: splitter.points,
        indices,
    })
}

/// Emits the part of a straddling triangle on the outside of the plane,
/// preserving its winding.
fn split_triangle(tri: [u32; 3], sides: [PlaneSide; 3], splitter: &mut EdgeSplitter<'_>, out: &mut Vec<u32>) {
    if let Some(k) = sides.iter().position(|&s| s == PlaneSide::OnPlane) {
        let (o, p, q) = (tri[k], tri[(k + 1) % 3], tri[(k + 2) % 3]);
        let x = splitter.split(p, q);
        if sides[(k + 1) % 3] == PlaneSide::Outside {
            out.extend_from_slice(&[o, p, x]);
        } else {
            out.extend_from_slice(&[o, x, q]);
        }
        return;
    }

    let k = (0..3)
        .find(|&k| sides[k] != sides[(k + 1) % 3] && sides[k] != sides[(k + 2) % 3])
        .unwrap_or(0);
    let (l, p, q) = (tri[k], tri[(k + 1) % 3], tri[(k + 2) % 3]);
    let xp = splitter.split(l, p);
    let xq = splitter.split(l, q);
    if sides[k] == PlaneSide::Outside {
        out.extend_from_slice(&[l, xp, xq]);
    } else {
        out.extend_from_slice(&[xp, p, q, xp, q, xq]);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cap
// ─────────────────────────────────────────────────────────────────────────────

/// Chains the open boundary of the clipped surface into loops and fills them
/// on the cut face. Returned triangles face into the tool.
fn build_cap(
    surface: &ClippedSurface,
    face: Plane,
    bbox: BBox,
    tol: Tolerance,
    diagnostics: &mut BooleanDiagnostics,
) -> Result<Vec<u32>, BooleanError> {
    let loops = boundary_loops(&surface.indices)?;
    if loops.is_empty() {
        return Ok(Vec::new());
    }
    diagnostics.cap_loop_count = loops.len();

    let band = 2.0 * tol.eps.max(1e-12 * bbox.diagonal());
    for ring in &loops {
        if ring
            .iter()
            .any(|&v| face.signed_distance(surface.points[v as usize]).abs() > band)
        {
            return Err(BooleanError::Indeterminate(
                "open boundary leaves the cut plane".to_string(),
            ));
        }
    }

    // Cap normal is -face.normal, so loops are projected into a frame with
    // u × v = -face.normal and reversed; outer loops then come out positive.
    let (u, v) = (-face.normal)
        .orthonormal_basis()
        .ok_or_else(|| BooleanError::Indeterminate("cut face has no frame".to_string()))?;
    let origin = bbox.center();
    let project = |idx: u32| {
        let d = surface.points[idx as usize] - origin;
        UvPoint::new(d.dot(u), d.dot(v))
    };

    let rings: Vec<Vec<u32>> = loops
        .into_iter()
        .map(|mut ring| {
            ring.reverse();
            ring
        })
        .collect();
    let projected: Vec<Vec<UvPoint>> = rings
        .iter()
        .map(|ring| ring.iter().map(|&i| project(i)).collect())
        .collect();
    let areas: Vec<f64> = projected.iter().map(|p| loop_area(p)).collect();

    let outers: Vec<usize> = (0..rings.len()).filter(|&i| areas[i] >= 0.0).collect();
    let mut holes_of: Vec<Vec<usize>> = vec![Vec::new(); rings.len()];
    for hole in (0..rings.len()).filter(|&i| areas[i] < 0.0) {
        let parent = outers
            .iter()
            .copied()
            .filter(|&o| {
                projected[hole]
                    .iter()
                    .any(|&p| point_in_loop(p, &projected[o]))
            })
            .min_by(|&a, &b| areas[a].total_cmp(&areas[b]))
            .ok_or_else(|| BooleanError::Indeterminate("cap hole has no enclosing loop".to_string()))?;
        holes_of[parent].push(hole);
        diagnostics.cap_hole_count += 1;
    }

    let mut cap = Vec::new();
    for outer in outers {
        let mut ids: Vec<u32> = rings[outer].clone();
        let hole_points: Vec<Vec<UvPoint>> = holes_of[outer]
            .iter()
            .map(|&h| {
                ids.extend_from_slice(&rings[h]);
                projected[h].clone()
            })
            .collect();

        let triangles = triangulate_loops(&projected[outer], &hole_points, tol)
            .map_err(|err| BooleanError::Indeterminate(format!("cap triangulation failed: {err}")))?;
        for tri in triangles {
            cap.extend(tri.iter().map(|&local| ids[local as usize]));
        }
    }

    diagnostics.cap_triangle_count = cap.len() / 3;
    Ok(cap)
}

/// Directed edges without a reverse twin, chained head to tail.
fn boundary_loops(indices: &[u32]) -> Result<Vec<Vec<u32>>, BooleanError> {
    let mut directed: HashMap<(u32, u32), u32> = HashMap::new();
    for tri in indices.chunks_exact(3) {
        for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
            *directed.entry((a, b)).or_insert(0) += 1;
        }
    }

    let mut successors: HashMap<u32, Vec<u32>> = HashMap::new();
    let mut open_edges = 0usize;
    for (&(a, b), &count) in &directed {
        if count > 1 {
            return Err(BooleanError::NonManifoldResult {
                open_edges: 0,
                non_manifold_edges: 1,
            });
        }
        if !directed.contains_key(&(b, a)) {
            successors.entry(a).or_default().push(b);
            open_edges += 1;
        }
    }

    let mut starts: Vec<u32> = successors.keys().copied().collect();
    starts.sort_unstable();
    for list in successors.values_mut() {
        list.sort_unstable_by(|a, b| b.cmp(a));
    }

    let mut take = |v: u32| successors.get_mut(&v).and_then(Vec::pop);
    let mut loops = Vec::new();
    for start in starts {
        while let Some(mut cur) = take(start) {
            let mut ring = vec![start];
            while cur != start {
                if ring.len() > open_edges {
                    return Err(BooleanError::Indeterminate("boundary walk did not close".to_string()));
                }
                ring.push(cur);
                cur = take(cur).ok_or(BooleanError::NonManifoldResult {
                    open_edges,
                    non_manifold_edges: 0,
                })?;
            }
            loops.push(ring);
        }
    }
    Ok(loops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Vec3;

    #[test]
    fn far_box_with_an_on_plane_corner_is_classified_per_vertex() {
        // The lone triangle touches the plane at vertex 0, but its BVH box is
        // placed far away so the broad phase reports it beyond the band.
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 1.0),
        ];
        let far = BBox::new(Point3::new(10.0, 10.0, 10.0), Point3::new(11.0, 11.0, 11.0));
        let prepared = PreparedMesh {
            bbox: BBox::from_points(&points).expect("bbox"),
            points,
            triangles: vec![[0, 1, 2]],
            bvh: Bvh::build(&[far]).expect("bvh"),
            welded_vertex_count: 0,
            collapsed_triangle_count: 0,
        };
        let face = Plane::new(Vec3::Y, 0.0).expect("plane");
        let mut diagnostics = BooleanDiagnostics::default();

        let clipped = clip_against_face(&prepared, face, Tolerance::DEFAULT, &mut diagnostics).expect("clip");

        assert_eq!(clipped.indices, vec![0, 1, 2]);
        assert_eq!(diagnostics.on_plane_vertex_count, 1);

        let below = Plane::new(-Vec3::Y, 0.0).expect("plane");
        let mut diagnostics = BooleanDiagnostics::default();
        let clipped = clip_against_face(&prepared, below, Tolerance::DEFAULT, &mut diagnostics).expect("clip");
        assert!(clipped.indices.is_empty());
    }

    #[test]
    fn tiny_targets_get_a_tolerance_below_their_size() {
        let sphere = Mesh::uv_sphere(1e-8, 32, 16);
        let fitted = fit_tolerance(&sphere, Tolerance::DEFAULT);
        assert!(fitted.eps < 1e-13, "{}", fitted.eps);

        let unit = Mesh::cuboid(Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(fit_tolerance(&unit, Tolerance::DEFAULT), Tolerance::DEFAULT);
    }
}
