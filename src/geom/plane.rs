//! Cut planes and the half-space boxes used to evaluate them.
//!
//! A drag on screen becomes a plane through the two surface hits and the
//! camera eye. Each side of that plane is then stood in for by a box far
//! larger than the target, with one face lying exactly on the plane.

use super::mesh::{Mesh, box_mesh};
use super::{BBox, Point3, Tolerance, Vec3};

/// Oriented plane `normal · p = constant` with a unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub constant: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlaneError {
    #[error("cut plane is degenerate: {0}")]
    Degenerate(&'static str),
    #[error("object transform is not invertible")]
    SingularTransform,
}

impl Plane {
    /// Returns `None` unless `normal` normalizes and `constant` is finite.
    #[must_use]
    pub fn new(normal: Vec3, constant: f64) -> Option<Self> {
        let normal = normal.normalized()?;
        constant.is_finite().then_some(Self { normal, constant })
    }

    /// Positive on the side the normal points to.
    #[must_use]
    pub fn signed_distance(self, p: Point3) -> f64 {
        self.normal.dot(p.to_vec3()) - self.constant
    }

    /// Same plane, opposite orientation. Exact: every signed distance is
    /// negated bit for bit.
    #[must_use]
    pub fn flipped(self) -> Self {
        Self {
            normal: -self.normal,
            constant: -self.constant,
        }
    }

    #[must_use]
    pub fn project_point(self, p: Point3) -> Point3 {
        p - self.normal * self.signed_distance(p)
    }
}

/// Builds the plane through the drag endpoints `a`, `b` and the eye.
///
/// The normal is `normalize((b - a) × (eye - a))`, so the plane contains the
/// viewing direction of both endpoints and shows up as the drag line on
/// screen.
pub fn build_cut_plane(
    a: Point3,
    b: Point3,
    eye: Point3,
    tol: Tolerance,
) -> Result<Plane, PlaneError> {
    if !(a.is_finite() && b.is_finite() && eye.is_finite()) {
        return Err(PlaneError::Degenerate("non-finite input point"));
    }

    let along = b - a;
    let to_eye = eye - a;
    let drag_len = along.length();
    if drag_len <= tol.eps {
        return Err(PlaneError::Degenerate("drag endpoints coincide"));
    }
    let eye_len = to_eye.length();
    if eye_len <= tol.eps {
        return Err(PlaneError::Degenerate("eye lies on the drag start"));
    }

    let cross = along.cross(to_eye);
    // Sine of the angle between the drag and the eye direction.
    if cross.length() <= tol.eps * drag_len * eye_len {
        return Err(PlaneError::Degenerate("drag is collinear with the eye"));
    }

    let normal = cross
        .normalized()
        .ok_or(PlaneError::Degenerate("normal does not normalize"))?;
    Ok(Plane {
        normal,
        constant: normal.dot(a.to_vec3()),
    })
}

/// Sizing rule for the half-space boxes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalfSpacePolicy {
    /// Box half-extent as a multiple of the target's radius around the plane.
    pub extent_factor: f64,
    pub min_half_extent: f64,
}

impl Default for HalfSpacePolicy {
    fn default() -> Self {
        Self {
            extent_factor: 100.0,
            min_half_extent: 1.0,
        }
    }
}

/// A cube standing in for one side of a plane.
///
/// `axes` is a right-handed frame and the `+axes[2]` face is the cut face,
/// stored separately in `face` so that it keeps the exact plane the caller
/// passed in rather than one rebuilt from `center`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalfSpaceSolid {
    /// Cut face, normal pointing out of the solid.
    pub face: Plane,
    pub center: Point3,
    pub axes: [Vec3; 3],
    pub half_extent: f64,
}

impl HalfSpaceSolid {
    /// The six bounding planes with outward normals; index 0 is the cut face.
    #[must_use]
    pub fn faces(&self) -> [Plane; 6] {
        let c = self.center.to_vec3();
        let h = self.half_extent;
        let side = |normal: Vec3| Plane {
            normal,
            constant: normal.dot(c) + h,
        };
        let [u, v, n] = self.axes;
        [self.face, side(-n), side(u), side(-u), side(v), side(-v)]
    }

    #[must_use]
    pub fn contains_point(&self, p: Point3) -> bool {
        self.faces().iter().all(|f| f.signed_distance(p) <= 0.0)
    }

    #[must_use]
    pub fn bbox(&self) -> BBox {
        let [u, v, n] = self.axes;
        let h = self.half_extent;
        let reach = |axis: fn(Vec3) -> f64| h * (axis(u).abs() + axis(v).abs() + axis(n).abs());
        let r = Vec3::new(reach(|w| w.x), reach(|w| w.y), reach(|w| w.z));
        BBox::new(self.center - r, self.center + r)
    }

    /// Closed triangle mesh of the box, outward facing.
    #[must_use]
    pub fn mesh(&self) -> Mesh {
        let h = self.half_extent;
        box_mesh(self.center, self.axes, Vec3::new(h, h, h))
    }
}

/// Builds `(below, above)`: `below` fills the side opposite the normal and
/// `above` fills the side the normal points to.
///
/// Both boxes are centered on the projection of the target's box center onto
/// the plane, offset by the half-extent along the normal, so their cut faces
/// coincide with the plane and every other face is far outside the target.
pub fn build_half_space_solids(
    plane: Plane,
    target_bounds: BBox,
    policy: HalfSpacePolicy,
) -> Result<(HalfSpaceSolid, HalfSpaceSolid), PlaneError> {
    let foot = plane.project_point(target_bounds.center());
    let radius = target_bounds.radius_from(foot);
    let half_extent = (policy.extent_factor * radius).max(policy.min_half_extent);
    if !foot.is_finite() || !half_extent.is_finite() || half_extent <= 0.0 {
        return Err(PlaneError::Degenerate("half-space extent is not finite"));
    }

    let n = plane.normal;
    let (u, v) = n
        .orthonormal_basis()
        .ok_or(PlaneError::Degenerate("plane normal has no basis"))?;

    let below = HalfSpaceSolid {
        face: plane,
        center: foot - n * half_extent,
        axes: [u, v, n],
        half_extent,
    };
    let above = HalfSpaceSolid {
        face: plane.flipped(),
        center: foot + n * half_extent,
        axes: [v, u, -n],
        half_extent,
    };
    Ok((below, above))
}
