use std::collections::HashMap;
use std::f64::consts::{PI, TAU};

use super::diagnostics::MeshDiagnostics;
use super::{BBox, Point3, Tolerance, Transform, Vec3};

/// Indexed triangle mesh in object space.
///
/// Triangles are counter-clockwise when seen from outside, so a closed mesh
/// has positive signed volume.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    pub positions: Vec<[f64; 3]>,
    pub indices: Vec<u32>,
    pub normals: Option<Vec<[f64; 3]>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle3 {
    pub a: Point3,
    pub b: Point3,
    pub c: Point3,
}

impl Triangle3 {
    #[must_use]
    pub const fn new(a: Point3, b: Point3, c: Point3) -> Self {
        Self { a, b, c }
    }

    /// Area-weighted normal (`(b - a) × (c - a)`), not normalized.
    #[must_use]
    pub fn area_normal(self) -> Vec3 {
        self.b.sub_point(self.a).cross(self.c.sub_point(self.a))
    }

    #[must_use]
    pub fn bbox(self) -> BBox {
        BBox::new(self.a, self.a).expand_point(self.b).expand_point(self.c)
    }
}

impl Mesh {
    #[must_use]
    pub fn new(positions: Vec<[f64; 3]>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            indices,
            normals: None,
        }
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// A mesh without triangles. Cut fragments that lie entirely inside the
    /// discarded half-space come back empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    #[must_use]
    pub fn has_invalid_vertices(&self) -> bool {
        self.positions
            .iter()
            .any(|p| !p[0].is_finite() || !p[1].is_finite() || !p[2].is_finite())
    }

    #[must_use]
    pub fn has_valid_indices(&self) -> bool {
        let n = self.positions.len() as u32;
        self.indices.iter().all(|&i| i < n)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.indices.len() % 3 != 0 {
            return Err("mesh indices are not a triangle list (len % 3 != 0)".to_string());
        }
        if self.has_invalid_vertices() {
            return Err("mesh has invalid vertex coordinates (NaN/Inf)".to_string());
        }
        if !self.has_valid_indices() {
            return Err("mesh has out-of-bounds vertex indices".to_string());
        }
        if self
            .normals
            .as_ref()
            .is_some_and(|normals| normals.len() != self.positions.len())
        {
            return Err("mesh normal buffer does not match vertex count".to_string());
        }
        Ok(())
    }

    #[must_use]
    pub fn points(&self) -> Vec<Point3> {
        self.positions.iter().copied().map(Point3::from_array).collect()
    }

    #[must_use]
    pub fn triangle(&self, index: usize) -> Option<Triangle3> {
        let tri = self.indices.get(index * 3..index * 3 + 3)?;
        let a = self.positions.get(tri[0] as usize)?;
        let b = self.positions.get(tri[1] as usize)?;
        let c = self.positions.get(tri[2] as usize)?;
        Some(Triangle3::new(
            Point3::from_array(*a),
            Point3::from_array(*b),
            Point3::from_array(*c),
        ))
    }

    #[must_use]
    pub fn bbox(&self) -> Option<BBox> {
        BBox::from_points(&self.points())
    }

    /// Signed enclosed volume. Only meaningful for closed meshes.
    #[must_use]
    pub fn volume(&self) -> f64 {
        signed_volume(&self.points(), &self.indices)
    }

    #[must_use]
    pub fn surface_area(&self) -> f64 {
        (0..self.triangle_count())
            .filter_map(|t| self.triangle(t))
            .map(|tri| tri.area_normal().length() * 0.5)
            .sum()
    }

    #[must_use]
    pub fn diagnostics(&self) -> MeshDiagnostics {
        let (open_edge_count, non_manifold_edge_count) = count_edge_topology(&self.indices);
        let mut diagnostics = MeshDiagnostics {
            vertex_count: self.vertex_count(),
            triangle_count: self.triangle_count(),
            open_edge_count,
            non_manifold_edge_count,
            ..MeshDiagnostics::default()
        };
        if open_edge_count > 0 {
            diagnostics.add_warning("mesh has open edges");
        }
        if non_manifold_edge_count > 0 {
            diagnostics.add_warning("mesh has non-manifold edges");
        }
        diagnostics
    }

    #[must_use]
    pub fn with_smooth_normals(mut self) -> Self {
        self.normals = Some(compute_smooth_normals(&self.points(), &self.indices));
        self
    }

    /// Positions mapped through `transform`; normals are recomputed.
    #[must_use]
    pub fn transformed(&self, transform: Transform) -> Self {
        let positions = self
            .positions
            .iter()
            .map(|&p| transform.apply_point(Point3::from_array(p)).to_array())
            .collect();
        Self::new(positions, self.indices.clone()).with_smooth_normals()
    }

    /// Flat `[x0, y0, z0, x1, ...]` view for typed-array export.
    #[must_use]
    pub fn positions_flat(&self) -> &[f64] {
        self.positions.as_flattened()
    }

    #[must_use]
    pub fn normals_flat(&self) -> Option<&[f64]> {
        self.normals.as_deref().map(<[[f64; 3]]>::as_flattened)
    }

    fn oriented_outward(mut self) -> Self {
        if self.volume() < 0.0 {
            flip_all_triangles(&mut self.indices);
        }
        self
    }

    // ─────────────────────────────────────────────────────────────────────
    // Primitives
    // ─────────────────────────────────────────────────────────────────────

    /// Latitude/longitude sphere centered at the origin with poles on Y.
    ///
    /// Unlike a renderer's sphere there is no seam column and each pole is a
    /// single vertex, so the result is closed and manifold as generated.
    #[must_use]
    pub fn uv_sphere(radius: f64, width_segments: usize, height_segments: usize) -> Self {
        let w = width_segments.max(3);
        let h = height_segments.max(2);

        let mut positions = Vec::with_capacity(2 + (h - 1) * w);
        positions.push([0.0, radius, 0.0]);
        for ring in 1..h {
            let (sin_phi, cos_phi) = (PI * ring as f64 / h as f64).sin_cos();
            for seg in 0..w {
                let (sin_t, cos_t) = (TAU * seg as f64 / w as f64).sin_cos();
                positions.push([
                    radius * sin_phi * cos_t,
                    radius * cos_phi,
                    radius * sin_phi * sin_t,
                ]);
            }
        }
        positions.push([0.0, -radius, 0.0]);
        let south = (positions.len() - 1) as u32;

        let at = |ring: usize, seg: usize| (1 + (ring - 1) * w + seg % w) as u32;
        let mut indices = Vec::with_capacity(6 * w * (h - 1));
        for seg in 0..w {
            indices.extend_from_slice(&[0, at(1, seg + 1), at(1, seg)]);
        }
        for ring in 1..h - 1 {
            for seg in 0..w {
                let (u0, u1) = (at(ring, seg), at(ring, seg + 1));
                let (l0, l1) = (at(ring + 1, seg), at(ring + 1, seg + 1));
                indices.extend_from_slice(&[u0, l1, l0, u0, u1, l1]);
            }
        }
        for seg in 0..w {
            indices.extend_from_slice(&[south, at(h - 1, seg), at(h - 1, seg + 1)]);
        }

        Self::new(positions, indices)
            .oriented_outward()
            .with_smooth_normals()
    }

    /// Axis-aligned box centered at the origin.
    #[must_use]
    pub fn cuboid(half_extents: Vec3) -> Self {
        box_mesh(Point3::ORIGIN, [Vec3::X, Vec3::Y, Vec3::Z], half_extents)
    }

    /// Ring torus around the Y axis.
    #[must_use]
    pub fn torus(
        major_radius: f64,
        minor_radius: f64,
        radial_segments: usize,
        tubular_segments: usize,
    ) -> Self {
        let radial = radial_segments.max(3);
        let tubular = tubular_segments.max(3);

        let mut positions = Vec::with_capacity(radial * tubular);
        for i in 0..radial {
            let (sin_v, cos_v) = (TAU * i as f64 / radial as f64).sin_cos();
            for j in 0..tubular {
                let (sin_u, cos_u) = (TAU * j as f64 / tubular as f64).sin_cos();
                let ring = major_radius + minor_radius * cos_v;
                positions.push([ring * cos_u, minor_radius * sin_v, ring * sin_u]);
            }
        }

        let at = |i: usize, j: usize| ((i % radial) * tubular + j % tubular) as u32;
        let mut indices = Vec::with_capacity(6 * radial * tubular);
        for i in 0..radial {
            for j in 0..tubular {
                let (a, b) = (at(i, j), at(i, j + 1));
                let (c, d) = (at(i + 1, j + 1), at(i + 1, j));
                indices.extend_from_slice(&[a, b, c, a, c, d]);
            }
        }

        Self::new(positions, indices)
            .oriented_outward()
            .with_smooth_normals()
    }
}

/// Oriented box: `axes` must be a right-handed orthonormal frame.
pub(crate) fn box_mesh(center: Point3, axes: [Vec3; 3], half_extents: Vec3) -> Mesh {
    let mut positions = Vec::with_capacity(8);
    for corner in 0..8u32 {
        let sx = if corner & 1 == 0 { -1.0 } else { 1.0 };
        let sy = if corner & 2 == 0 { -1.0 } else { 1.0 };
        let sz = if corner & 4 == 0 { -1.0 } else { 1.0 };
        let p = center
            + axes[0] * (sx * half_extents.x)
            + axes[1] * (sy * half_extents.y)
            + axes[2] * (sz * half_extents.z);
        positions.push(p.to_array());
    }

    const FACES: [[u32; 4]; 6] = [
        [0, 4, 6, 2],
        [1, 3, 7, 5],
        [0, 1, 5, 4],
        [2, 6, 7, 3],
        [0, 2, 3, 1],
        [4, 5, 7, 6],
    ];
    let mut indices = Vec::with_capacity(36);
    for [a, b, c, d] in FACES {
        indices.extend_from_slice(&[a, b, c, a, c, d]);
    }

    Mesh::new(positions, indices).with_smooth_normals()
}

/// Compacts unused vertices, recomputes normals and reports topology.
///
/// Triangles are taken as-is: no welding or winding repair happens here, the
/// caller is responsible for building a consistent surface.
pub(crate) fn finalize_mesh(points: &[Point3], indices: Vec<u32>) -> (Mesh, MeshDiagnostics) {
    let mut remap = vec![u32::MAX; points.len()];
    let mut compact = Vec::with_capacity(points.len());
    let mut out_indices = Vec::with_capacity(indices.len());
    for idx in indices {
        let slot = &mut remap[idx as usize];
        if *slot == u32::MAX {
            *slot = compact.len() as u32;
            compact.push(points[idx as usize]);
        }
        out_indices.push(*slot);
    }

    let normals = compute_smooth_normals(&compact, &out_indices);
    let mesh = Mesh {
        positions: compact.into_iter().map(Point3::to_array).collect(),
        indices: out_indices,
        normals: Some(normals),
    };
    let diagnostics = mesh.diagnostics();
    (mesh, diagnostics)
}

/// Merges vertices closer than `tol` using a hashed grid; returns the merged
/// points, remapped indices and how many vertices were merged away.
pub(crate) fn weld_mesh_vertices(
    points: Vec<Point3>,
    indices: Vec<u32>,
    tol: Tolerance,
) -> (Vec<Point3>, Vec<u32>, usize) {
    if !tol.eps.is_finite() || tol.eps <= 0.0 {
        return (points, indices, 0);
    }

    let inv = 1.0 / tol.eps;
    let quantize = |value: f64| -> Option<i64> {
        value
            .is_finite()
            .then(|| (value * inv).floor().clamp(i64::MIN as f64, i64::MAX as f64) as i64)
    };

    let mut buckets: HashMap<(i64, i64, i64), Vec<u32>> = HashMap::new();
    let mut remap: Vec<u32> = Vec::with_capacity(points.len());
    let mut out_points: Vec<Point3> = Vec::with_capacity(points.len());

    for p in points.iter().copied() {
        let key = match (quantize(p.x), quantize(p.y), quantize(p.z)) {
            (Some(kx), Some(ky), Some(kz)) => Some((kx, ky, kz)),
            _ => None,
        };

        let found = key.and_then(|(kx, ky, kz)| {
            (-1i64..=1)
                .flat_map(|dx| (-1i64..=1).flat_map(move |dy| (-1i64..=1).map(move |dz| (dx, dy, dz))))
                .filter_map(|(dx, dy, dz)| buckets.get(&(kx + dx, ky + dy, kz + dz)))
                .flatten()
                .copied()
                .find(|&cand| tol.approx_eq_point3(out_points[cand as usize], p))
        });

        let out_idx = found.unwrap_or_else(|| {
            let new_idx = out_points.len() as u32;
            out_points.push(p);
            if let Some(key) = key {
                buckets.entry(key).or_default().push(new_idx);
            }
            new_idx
        });
        remap.push(out_idx);
    }

    let out_indices = indices
        .into_iter()
        .map(|idx| remap.get(idx as usize).copied().unwrap_or(idx))
        .collect();

    let welded = points.len().saturating_sub(out_points.len());
    (out_points, out_indices, welded)
}

/// Drops triangles that reference the same vertex twice. Their edges cancel,
/// so removing them never opens the surface.
pub(crate) fn cull_collapsed_triangles(indices: &[u32]) -> (Vec<u32>, usize) {
    let mut out = Vec::with_capacity(indices.len());
    let mut removed = 0usize;
    for tri in indices.chunks_exact(3) {
        if tri[0] == tri[1] || tri[1] == tri[2] || tri[0] == tri[2] {
            removed += 1;
            continue;
        }
        out.extend_from_slice(tri);
    }
    (out, removed)
}

/// `(open, non_manifold)` undirected edge counts.
pub(crate) fn count_edge_topology(indices: &[u32]) -> (usize, usize) {
    let mut edge_counts: HashMap<(u32, u32), u32> = HashMap::new();

    for tri in indices.chunks_exact(3) {
        let (i0, i1, i2) = (tri[0], tri[1], tri[2]);
        if i0 == i1 || i1 == i2 || i0 == i2 {
            continue;
        }
        for (ea, eb) in [(i0, i1), (i1, i2), (i2, i0)] {
            *edge_counts.entry((ea.min(eb), ea.max(eb))).or_insert(0) += 1;
        }
    }

    edge_counts
        .values()
        .fold((0, 0), |(open, non_manifold), &count| match count {
            1 => (open + 1, non_manifold),
            2 => (open, non_manifold),
            _ => (open, non_manifold + 1),
        })
}

fn flip_all_triangles(indices: &mut [u32]) {
    for tri in indices.chunks_exact_mut(3) {
        tri.swap(1, 2);
    }
}

pub(crate) fn signed_volume(points: &[Point3], indices: &[u32]) -> f64 {
    let mut volume = 0.0;
    for tri in indices.chunks_exact(3) {
        let (Some(a), Some(b), Some(c)) = (
            points.get(tri[0] as usize),
            points.get(tri[1] as usize),
            points.get(tri[2] as usize),
        ) else {
            continue;
        };
        volume += a.to_vec3().dot(b.to_vec3().cross(c.to_vec3()));
    }
    volume / 6.0
}

/// Area-weighted vertex normals. Isolated vertices get `+Z`.
pub(crate) fn compute_smooth_normals(points: &[Point3], indices: &[u32]) -> Vec<[f64; 3]> {
    let mut sums = vec![Vec3::ZERO; points.len()];

    for tri in indices.chunks_exact(3) {
        let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        let (Some(&a), Some(&b), Some(&c)) = (points.get(i0), points.get(i1), points.get(i2)) else {
            continue;
        };
        let n = Triangle3::new(a, b, c).area_normal();
        sums[i0] = sums[i0] + n;
        sums[i1] = sums[i1] + n;
        sums[i2] = sums[i2] + n;
    }

    sums.into_iter()
        .map(|n| n.normalized().unwrap_or(Vec3::Z).to_array())
        .collect()
}
