//! Press/drag/release tracking for a single cut gesture.
//!
//! The tracker only remembers the phase and the two surface points; each
//! pointer event resolves a fresh ray cast through [`pick_point`], so it
//! needs no long-lived references into the scene.

use crate::geom::{Point3, Tolerance};
use crate::scene::{MeshId, Scene};

use super::camera::{CameraState, ScreenPoint};
use super::pick_point;

/// A completed drag across the target surface, in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSegment {
    pub start: Point3,
    pub end: Point3,
}

impl DragSegment {
    #[must_use]
    pub fn length(&self) -> f64 {
        self.start.distance_to(self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum GesturePhase {
    #[default]
    Idle,
    Dragging { start: Point3, end: Point3 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    /// Press did not hit the target; nothing started.
    Missed,
    Started(Point3),
    /// Drag end moved to a new surface point.
    Moved(Point3),
    /// Pointer left the target mid-drag; the last end point is kept.
    Held(Point3),
    /// Event does not apply in the current phase.
    Ignored,
    Released(DragSegment),
    /// Release of a drag too short to cut.
    Discarded,
    /// A cut is still in flight; new gestures are refused.
    Locked,
}

#[derive(Debug, Clone)]
pub struct GestureTracker {
    phase: GesturePhase,
    locked: bool,
    min_drag_length: f64,
    tolerance: Tolerance,
}

impl Default for GestureTracker {
    fn default() -> Self {
        Self::new(1e-6, Tolerance::DEFAULT)
    }
}

impl GestureTracker {
    #[must_use]
    pub fn new(min_drag_length: f64, tolerance: Tolerance) -> Self {
        Self {
            phase: GesturePhase::Idle,
            locked: false,
            min_drag_length,
            tolerance,
        }
    }

    #[must_use]
    pub fn phase(&self) -> GesturePhase {
        self.phase
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        matches!(self.phase, GesturePhase::Dragging { .. })
    }

    pub fn set_min_drag_length(&mut self, min_drag_length: f64) {
        self.min_drag_length = min_drag_length;
    }

    pub fn set_tolerance(&mut self, tolerance: Tolerance) {
        self.tolerance = tolerance;
    }

    /// While locked, presses are answered with [`GestureEvent::Locked`].
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    pub fn press(
        &mut self,
        client: ScreenPoint,
        camera: &CameraState,
        scene: &Scene,
        target: MeshId,
    ) -> GestureEvent {
        if self.locked {
            return GestureEvent::Locked;
        }
        match pick_point(camera, scene, target, client, self.tolerance) {
            Some(hit) => {
                self.phase = GesturePhase::Dragging { start: hit, end: hit };
                GestureEvent::Started(hit)
            }
            None => {
                self.phase = GesturePhase::Idle;
                GestureEvent::Missed
            }
        }
    }

    pub fn drag(
        &mut self,
        client: ScreenPoint,
        camera: &CameraState,
        scene: &Scene,
        target: MeshId,
    ) -> GestureEvent {
        let GesturePhase::Dragging { start, end } = self.phase else {
            return GestureEvent::Ignored;
        };
        match pick_point(camera, scene, target, client, self.tolerance) {
            Some(hit) => {
                self.phase = GesturePhase::Dragging { start, end: hit };
                GestureEvent::Moved(hit)
            }
            None => GestureEvent::Held(end),
        }
    }

    /// Ends the gesture. The tracker is `Idle` afterwards whatever the
    /// outcome.
    pub fn release(
        &mut self,
        client: ScreenPoint,
        camera: &CameraState,
        scene: &Scene,
        target: MeshId,
    ) -> GestureEvent {
        let GesturePhase::Dragging { start, end } = std::mem::take(&mut self.phase) else {
            return GestureEvent::Ignored;
        };
        let end = pick_point(camera, scene, target, client, self.tolerance).unwrap_or(end);
        let segment = DragSegment { start, end };
        if segment.length() > self.min_drag_length {
            GestureEvent::Released(segment)
        } else {
            log::debug!("gesture: drag of {:.3e} discarded", segment.length());
            GestureEvent::Discarded
        }
    }

    pub fn cancel(&mut self) {
        self.phase = GesturePhase::Idle;
    }
}
