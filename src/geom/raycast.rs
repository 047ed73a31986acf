use super::bvh::Bvh;
use super::mesh::{Mesh, Triangle3};
use super::{Point3, Tolerance, Transform, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3,
    pub direction: Vec3,
}

impl Ray {
    /// Ray with a unit direction; `None` if the direction does not normalize.
    #[must_use]
    pub fn new(origin: Point3, direction: Vec3) -> Option<Self> {
        let direction = direction.normalized()?;
        origin.is_finite().then_some(Self { origin, direction })
    }

    #[must_use]
    pub fn at(self, t: f64) -> Point3 {
        self.origin + self.direction * t
    }

    /// The ray expressed through `transform`. The direction is not
    /// renormalized, so a hit parameter means the same point in both frames.
    #[must_use]
    pub fn transformed(self, transform: Transform) -> Self {
        Self {
            origin: transform.apply_point(self.origin),
            direction: transform.apply_vec(self.direction),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Ray parameter of the hit.
    pub t: f64,
    pub point: Point3,
    pub triangle: usize,
}

/// Nearest front- or back-facing hit of `ray` on `mesh`, in mesh space.
#[must_use]
pub fn cast_ray(mesh: &Mesh, ray: Ray, tol: Tolerance) -> Option<RayHit> {
    let triangles: Vec<Triangle3> = (0..mesh.triangle_count())
        .filter_map(|t| mesh.triangle(t))
        .collect();
    let bboxes: Vec<_> = triangles.iter().map(|t| t.bbox()).collect();
    let bvh = Bvh::build(&bboxes)?;

    let mut best: Option<RayHit> = None;
    bvh.query_ray(ray.origin, ray.direction, f64::INFINITY, |idx| {
        let Some(t) = ray_triangle_intersection(ray.origin, ray.direction, triangles[idx], tol) else {
            return true;
        };
        if best.is_none_or(|b| t < b.t) {
            best = Some(RayHit {
                t,
                point: ray.at(t),
                triangle: idx,
            });
        }
        true
    });
    best
}

/// Casts a world-space ray against a mesh placed by `transform`; the hit
/// point is returned in world space.
#[must_use]
pub fn cast_ray_world(mesh: &Mesh, transform: Transform, ray: Ray, tol: Tolerance) -> Option<RayHit> {
    let inverse = transform.inverse()?;
    let local = cast_ray(mesh, ray.transformed(inverse), tol)?;
    Some(RayHit {
        point: ray.at(local.t),
        ..local
    })
}

/// Möller–Trumbore, two-sided. Returns the ray parameter.
fn ray_triangle_intersection(origin: Point3, dir: Vec3, tri: Triangle3, tol: Tolerance) -> Option<f64> {
    let edge1 = tri.b - tri.a;
    let edge2 = tri.c - tri.a;
    let h = dir.cross(edge2);
    let det = edge1.dot(h);
    let det_eps = tol.eps * edge1.length() * h.length();
    if !det.is_finite() || det.abs() <= det_eps {
        return None;
    }

    let inv_det = 1.0 / det;
    let s = origin - tri.a;
    let u = inv_det * s.dot(h);
    if u < -tol.eps || u > 1.0 + tol.eps {
        return None;
    }

    let q = s.cross(edge1);
    let v = inv_det * dir.dot(q);
    if v < -tol.eps || u + v > 1.0 + tol.eps {
        return None;
    }

    let t = inv_det * edge2.dot(q);
    (t.is_finite() && t >= 0.0).then_some(t)
}
