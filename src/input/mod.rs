//! Pointer input: viewport/camera projection and the drag gesture.

mod camera;
mod gesture;

pub use camera::{CameraState, ScreenPoint, Viewport};
pub use gesture::{DragSegment, GestureEvent, GesturePhase, GestureTracker};

use crate::geom::{Point3, Tolerance, cast_ray_world};
use crate::scene::{MeshId, Scene};

/// World-space point where the pixel's ray first meets `target`.
///
/// Every failure (pixel outside the viewport, degenerate camera, missing
/// target, singular transform, plain miss) is reported as `None`.
#[must_use]
pub fn pick_point(
    camera: &CameraState,
    scene: &Scene,
    target: MeshId,
    client: ScreenPoint,
    tol: Tolerance,
) -> Option<Point3> {
    let ray = camera.screen_to_ray(client)?;
    let entity = scene.entity(target)?;
    cast_ray_world(&entity.mesh, entity.transform, ray, tol).map(|hit| hit.point)
}
