//! Cut orchestration: from a drag across a scene mesh to the two fragments
//! that replace it.
//!
//! ```text
//! drag (screen) ── pick_point ──▶ start, end (world)
//!               ── inverse transform ──▶ local frame
//!               ── build_cut_plane ──▶ Plane
//!               ── build_half_space_solids ──▶ (below, above)
//!               ── subtract ×2 ──▶ Fragments { top, bottom }
//!               ── Scene::replace ──▶ CutResult
//! ```
//!
//! Every failure returns before the scene is touched, so a cut either swaps
//! the target for its fragments or leaves it exactly as it was.

mod session;
#[cfg(not(target_arch = "wasm32"))]
mod worker;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::geom::{
    BooleanError, BooleanOptions, HalfSpacePolicy, HalfSpaceSolid, Mesh, Plane, PlaneError,
    Point3, Tolerance, build_cut_plane, build_half_space_solids, subtract,
};
use crate::input::{CameraState, ScreenPoint, pick_point};
use crate::scene::{MeshId, Scene};

pub use session::CutSession;

/// Which fragments a cut produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutMode {
    /// Both sides of the plane become scene meshes.
    #[default]
    TwoFragment,
    /// Only the `+normal` side is kept; the other side is discarded without
    /// being evaluated.
    SinglePlane,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutConfig {
    pub mode: CutMode,
    /// Distance under which a vertex counts as lying on the cut plane.
    pub tolerance: f64,
    /// Shortest world-space drag that still cuts.
    pub min_drag_length: f64,
    pub extent_factor: f64,
    pub min_half_extent: f64,
    /// Run the evaluator on a worker thread and give up after this long.
    /// Ignored on wasm, where cuts are always synchronous.
    pub timeout_ms: Option<u64>,
}

impl Default for CutConfig {
    fn default() -> Self {
        let policy = HalfSpacePolicy::default();
        Self {
            mode: CutMode::TwoFragment,
            tolerance: Tolerance::DEFAULT.eps,
            min_drag_length: 1e-6,
            extent_factor: policy.extent_factor,
            min_half_extent: policy.min_half_extent,
            timeout_ms: None,
        }
    }
}

impl CutConfig {
    #[must_use]
    pub fn tolerance(&self) -> Tolerance {
        Tolerance::new(self.tolerance)
    }

    #[must_use]
    pub fn half_space_policy(&self) -> HalfSpacePolicy {
        HalfSpacePolicy {
            extent_factor: self.extent_factor,
            min_half_extent: self.min_half_extent,
        }
    }

    #[must_use]
    pub fn boolean_options(&self) -> BooleanOptions {
        BooleanOptions {
            tolerance: self.tolerance(),
            ..BooleanOptions::default()
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Geometric outcome of one cut; either side may be empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fragments {
    /// The side the plane normal points to.
    pub top: Mesh,
    pub bottom: Mesh,
}

/// Scene outcome of one cut.
///
/// `None` marks an empty side. When one side is empty the other reports the
/// original target id and the scene is unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutResult {
    /// Cut plane in the target's local frame.
    pub plane: Plane,
    pub top: Option<MeshId>,
    pub bottom: Option<MeshId>,
}

impl CutResult {
    #[must_use]
    pub fn fragment_ids(&self) -> Vec<MeshId> {
        self.top.into_iter().chain(self.bottom).collect()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CutError {
    #[error("drag did not hit the target")]
    NoIntersection,
    #[error(transparent)]
    DegeneratePlane(#[from] PlaneError),
    #[error("boolean evaluation failed: {0}")]
    Csg(#[from] BooleanError),
    #[error("boolean evaluation timed out after {0:?}")]
    Timeout(Duration),
    #[error("target mesh is not in the scene")]
    MissingTarget,
    #[error("a cut is already in progress")]
    Busy,
    #[error("cut worker could not run")]
    WorkerUnavailable,
}

#[derive(Debug, Default)]
pub struct Cutter {
    config: CutConfig,
    #[cfg(not(target_arch = "wasm32"))]
    worker: worker::CutWorker,
}

impl Cutter {
    #[must_use]
    pub fn new(config: CutConfig) -> Self {
        Self {
            config,
            #[cfg(not(target_arch = "wasm32"))]
            worker: worker::CutWorker::default(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &CutConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: CutConfig) {
        self.config = config;
    }

    /// `true` while a timed-out evaluation is still running in the
    /// background.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        #[cfg(not(target_arch = "wasm32"))]
        {
            self.worker.is_busy()
        }
        #[cfg(target_arch = "wasm32")]
        {
            false
        }
    }

    /// Splits `target` along `plane` without touching any scene.
    ///
    /// `top = target − below` keeps the `+normal` side and
    /// `bottom = target − above` the other one.
    pub fn split(&self, target: &Mesh, plane: Plane) -> Result<Fragments, CutError> {
        let bounds = target.bbox().ok_or(BooleanError::EmptyMesh)?;
        let (below, above) = build_half_space_solids(plane, bounds, self.config.half_space_policy())?;
        self.evaluate(target, below, above)
    }

    /// Ray casts both pixels against `target` and cuts between the hits.
    pub fn perform_cut(
        &self,
        drag_start: ScreenPoint,
        drag_end: ScreenPoint,
        camera: &CameraState,
        scene: &mut Scene,
        target: MeshId,
    ) -> Result<CutResult, CutError> {
        if !scene.contains(target) {
            return Err(CutError::MissingTarget);
        }
        let tol = self.config.tolerance();
        let start = pick_point(camera, scene, target, drag_start, tol).ok_or(CutError::NoIntersection)?;
        let end = pick_point(camera, scene, target, drag_end, tol).ok_or(CutError::NoIntersection)?;
        self.cut_between(start, end, camera, scene, target)
    }

    /// Cuts `target` with the plane through two world-space surface points
    /// and the camera eye, then swaps the target for its fragments.
    pub fn cut_between(
        &self,
        start: Point3,
        end: Point3,
        camera: &CameraState,
        scene: &mut Scene,
        target: MeshId,
    ) -> Result<CutResult, CutError> {
        if self.is_busy() {
            return Err(CutError::Busy);
        }
        let entity = scene.entity(target).ok_or(CutError::MissingTarget)?;

        let drag = start.distance_to(end);
        if !(drag > self.config.min_drag_length) {
            return Err(PlaneError::Degenerate("drag is shorter than the minimum length").into());
        }

        let to_local = entity
            .transform
            .inverse()
            .ok_or(PlaneError::SingularTransform)?;
        let plane = build_cut_plane(
            to_local.apply_point(start),
            to_local.apply_point(end),
            to_local.apply_point(camera.world_position()),
            self.config.tolerance(),
        )?;

        let fragments = self.split(&entity.mesh, plane)?;
        let identity = if fragments.top == entity.mesh {
            Some(CutResult {
                plane,
                top: Some(target),
                bottom: None,
            })
        } else if fragments.bottom == entity.mesh {
            Some(CutResult {
                plane,
                top: None,
                bottom: Some(target),
            })
        } else {
            None
        };
        if let Some(result) = identity {
            log::debug!("cut: plane misses {target:?}, scene unchanged");
            return Ok(result);
        }

        self.commit(scene, target, plane, fragments)
    }

    fn commit(
        &self,
        scene: &mut Scene,
        target: MeshId,
        plane: Plane,
        fragments: Fragments,
    ) -> Result<CutResult, CutError> {
        let Fragments { top, bottom } = fragments;
        let keep_top = !top.is_empty();
        let keep_bottom = !bottom.is_empty();
        if !keep_top && !keep_bottom && self.config.mode == CutMode::TwoFragment {
            return Err(BooleanError::Indeterminate("both fragments are empty".to_string()).into());
        }

        let mut kept = Vec::with_capacity(2);
        if keep_top {
            kept.push(top);
        }
        if keep_bottom {
            kept.push(bottom);
        }
        let mut ids = scene
            .replace(target, kept)
            .ok_or(CutError::MissingTarget)?
            .into_iter();

        let result = CutResult {
            plane,
            top: if keep_top { ids.next() } else { None },
            bottom: if keep_bottom { ids.next() } else { None },
        };
        log::debug!(
            "cut: {target:?} -> top {:?}, bottom {:?}",
            result.top,
            result.bottom
        );
        Ok(result)
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn evaluate(
        &self,
        target: &Mesh,
        below: HalfSpaceSolid,
        above: HalfSpaceSolid,
    ) -> Result<Fragments, CutError> {
        let mode = self.config.mode;
        let options = self.config.boolean_options();
        match self.config.timeout() {
            Some(timeout) => {
                let target = target.clone();
                self.worker
                    .run(timeout, move || evaluate_fragments(&target, &below, &above, mode, options))?
            }
            None => evaluate_fragments(target, &below, &above, mode, options),
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn evaluate(
        &self,
        target: &Mesh,
        below: HalfSpaceSolid,
        above: HalfSpaceSolid,
    ) -> Result<Fragments, CutError> {
        let options = self.config.boolean_options();
        evaluate_fragments(target, &below, &above, self.config.mode, options)
    }
}

fn evaluate_fragments(
    target: &Mesh,
    below: &HalfSpaceSolid,
    above: &HalfSpaceSolid,
    mode: CutMode,
    options: BooleanOptions,
) -> Result<Fragments, CutError> {
    let top = subtract(target, below, options)?;
    let bottom = match mode {
        CutMode::TwoFragment => subtract(target, above, options)?.mesh,
        CutMode::SinglePlane => Mesh::default(),
    };
    Ok(Fragments { top: top.mesh, bottom })
}
