//! Pointer-driven cutting against one target in a scene.

use crate::input::{CameraState, GestureEvent, GesturePhase, GestureTracker, ScreenPoint};
use crate::scene::{MeshId, Scene};

use super::{CutConfig, CutError, CutResult, Cutter};

/// Owns everything a cut gesture touches and feeds pointer events through
/// the tracker into the cutter.
///
/// Errors never escape: a failed cut is logged, remembered in
/// [`CutSession::last_error`] and leaves the scene as it was.
#[derive(Debug)]
pub struct CutSession {
    scene: Scene,
    camera: CameraState,
    tracker: GestureTracker,
    cutter: Cutter,
    target: Option<MeshId>,
    last_error: Option<CutError>,
}

impl CutSession {
    #[must_use]
    pub fn new(scene: Scene, camera: CameraState, config: CutConfig) -> Self {
        let tracker = GestureTracker::new(config.min_drag_length, config.tolerance());
        Self {
            scene,
            camera,
            tracker,
            cutter: Cutter::new(config),
            target: None,
            last_error: None,
        }
    }

    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    #[must_use]
    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    /// Replaces the camera; an in-progress drag is dropped because its
    /// points were picked through the old view.
    pub fn set_camera(&mut self, camera: CameraState) {
        self.camera = camera;
        self.tracker.cancel();
    }

    #[must_use]
    pub fn config(&self) -> &CutConfig {
        self.cutter.config()
    }

    pub fn set_config(&mut self, config: CutConfig) {
        self.tracker.set_min_drag_length(config.min_drag_length);
        self.tracker.set_tolerance(config.tolerance());
        self.cutter.set_config(config);
    }

    #[must_use]
    pub fn target(&self) -> Option<MeshId> {
        self.target
    }

    pub fn set_target(&mut self, target: Option<MeshId>) {
        self.target = target;
        self.tracker.cancel();
    }

    #[must_use]
    pub fn phase(&self) -> GesturePhase {
        self.tracker.phase()
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&CutError> {
        self.last_error.as_ref()
    }

    pub fn pointer_down(&mut self, client: ScreenPoint) -> GestureEvent {
        let Some(target) = self.live_target() else {
            return GestureEvent::Missed;
        };
        self.tracker.set_locked(self.cutter.is_busy());
        self.tracker.press(client, &self.camera, &self.scene, target)
    }

    pub fn pointer_move(&mut self, client: ScreenPoint) -> GestureEvent {
        let Some(target) = self.live_target() else {
            self.tracker.cancel();
            return GestureEvent::Ignored;
        };
        self.tracker.drag(client, &self.camera, &self.scene, target)
    }

    /// Finishes the gesture and runs the cut. On success the session
    /// retargets to the top fragment (or the bottom one when the top side is
    /// empty).
    pub fn pointer_up(&mut self, client: ScreenPoint) -> Option<CutResult> {
        let Some(target) = self.live_target() else {
            self.tracker.cancel();
            return None;
        };
        let GestureEvent::Released(segment) = self.tracker.release(client, &self.camera, &self.scene, target) else {
            return None;
        };

        match self
            .cutter
            .cut_between(segment.start, segment.end, &self.camera, &mut self.scene, target)
        {
            Ok(result) => {
                self.last_error = None;
                self.target = result.top.or(result.bottom);
                Some(result)
            }
            Err(err) => {
                log::warn!("cut failed, scene unchanged: {err}");
                self.last_error = Some(err);
                None
            }
        }
    }

    /// Pulls body poses from the physics hook, if any.
    pub fn sync_physics(&mut self) -> usize {
        self.scene.sync_from_physics()
    }

    fn live_target(&self) -> Option<MeshId> {
        self.target.filter(|&id| self.scene.contains(id))
    }
}
