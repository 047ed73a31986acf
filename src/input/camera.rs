//! Perspective camera and viewport mapping from client pixels to world rays.

use serde::{Deserialize, Serialize};

use crate::geom::{Point3, Ray, Vec3};

/// Pointer position in client (CSS pixel) coordinates, `y` growing down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance_to(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Rectangle of the canvas inside the client area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    #[must_use]
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Viewport anchored at the client origin.
    #[must_use]
    pub const fn sized(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        !(self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0)
    }

    #[must_use]
    pub fn contains(self, client: ScreenPoint) -> bool {
        client.x >= self.left
            && client.x <= self.left + self.width
            && client.y >= self.top
            && client.y <= self.top + self.height
    }

    /// Normalized device coordinates in `[-1, 1]²`, `+y` up. `None` outside
    /// the viewport or for an empty viewport.
    #[must_use]
    pub fn to_ndc(self, client: ScreenPoint) -> Option<[f64; 2]> {
        if self.is_empty() || !client.x.is_finite() || !client.y.is_finite() || !self.contains(client) {
            return None;
        }
        let x = (client.x - self.left) / self.width * 2.0 - 1.0;
        let y = 1.0 - (client.y - self.top) / self.height * 2.0;
        Some([x, y])
    }

    #[must_use]
    pub fn from_ndc(self, ndc: [f64; 2]) -> ScreenPoint {
        ScreenPoint::new(
            self.left + (ndc[0] + 1.0) * 0.5 * self.width,
            self.top + (1.0 - ndc[1]) * 0.5 * self.height,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub position: Point3,
    pub target: Point3,
    pub up: Vec3,
    pub fov_y_degrees: f64,
    pub near: f64,
    pub far: f64,
    pub viewport: Viewport,
}

impl CameraState {
    pub const DEFAULT_FOV_Y_DEGREES: f64 = 45.0;
    pub const DEFAULT_NEAR: f64 = 0.1;
    pub const DEFAULT_FAR: f64 = 1000.0;

    #[must_use]
    pub fn perspective(position: Point3, target: Point3, fov_y_degrees: f64, viewport: Viewport) -> Self {
        Self {
            position,
            target,
            up: Vec3::Y,
            fov_y_degrees,
            near: Self::DEFAULT_NEAR,
            far: Self::DEFAULT_FAR,
            viewport,
        }
    }

    #[must_use]
    pub fn world_position(&self) -> Point3 {
        self.position
    }

    #[must_use]
    pub fn aspect(&self) -> f64 {
        if self.viewport.is_empty() {
            1.0
        } else {
            self.viewport.width / self.viewport.height
        }
    }

    /// `(right, up, forward)`; `None` when the view direction is undefined or
    /// parallel to `up`.
    fn basis(&self) -> Option<(Vec3, Vec3, Vec3)> {
        let forward = (self.target - self.position).normalized()?;
        let right = forward.cross(self.up).normalized()?;
        let up = right.cross(forward);
        Some((right, up, forward))
    }

    fn tan_half_fov(&self) -> Option<f64> {
        let half = (self.fov_y_degrees * 0.5).to_radians();
        let tan = half.tan();
        (tan.is_finite() && tan > 0.0).then_some(tan)
    }

    /// Ray from the eye through the given normalized device coordinates.
    #[must_use]
    pub fn ndc_to_ray(&self, ndc: [f64; 2]) -> Option<Ray> {
        let (right, up, forward) = self.basis()?;
        let tan = self.tan_half_fov()?;
        let dir = forward + right * (ndc[0] * tan * self.aspect()) + up * (ndc[1] * tan);
        Ray::new(self.position, dir)
    }

    /// Ray from the eye through a client pixel; `None` outside the viewport.
    #[must_use]
    pub fn screen_to_ray(&self, client: ScreenPoint) -> Option<Ray> {
        self.ndc_to_ray(self.viewport.to_ndc(client)?)
    }

    /// Client pixel of a world point, `None` when it is outside the depth
    /// range.
    #[must_use]
    pub fn world_to_screen(&self, p: Point3) -> Option<ScreenPoint> {
        let (right, up, forward) = self.basis()?;
        let tan = self.tan_half_fov()?;
        let rel = p - self.position;
        let depth = rel.dot(forward);
        if !(depth >= self.near && depth <= self.far) {
            return None;
        }
        let x = rel.dot(right) / (depth * tan * self.aspect());
        let y = rel.dot(up) / (depth * tan);
        Some(self.viewport.from_ndc([x, y]))
    }
}
