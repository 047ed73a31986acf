#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cut;
pub mod geom;
pub mod input;
pub mod scene;

use std::fmt;

use cut::{CutConfig, CutSession};
use geom::{Mesh, Point3, Transform, Vec3};
use input::{CameraState, GestureEvent, ScreenPoint, Viewport};
use scene::{MeshId, Scene};
use serde::Serialize;
use wasm_bindgen::prelude::*;

cfg_if::cfg_if! {
    if #[cfg(all(feature = "console_error_panic_hook", target_arch = "wasm32"))] {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            console_error_panic_hook::set_once();
            init_logger();
        }
    } else {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            init_logger();
        }
    }
}

#[cfg(feature = "debug_logs")]
fn init_logger() {
    use log::LevelFilter;
    use wasm_bindgen_console_logger::DEFAULT_LOGGER;
    if log::set_logger(&DEFAULT_LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
}

#[cfg(not(feature = "debug_logs"))]
fn init_logger() {}

#[cfg(all(feature = "parallel", target_arch = "wasm32"))]
#[wasm_bindgen]
pub async fn initialize_parallel(worker_count: Option<u32>) -> Result<(), wasm_bindgen::JsError> {
    let threads = worker_count
        .map(|count| count.max(1) as usize)
        .or_else(|| {
            std::thread::available_parallelism()
                .map(|value| value.get())
                .ok()
        })
        .unwrap_or(1);

    wasm_bindgen_rayon::init_thread_pool(threads)
        .await
        .map_err(|err| wasm_bindgen::JsError::new(&format!("could not start the rayon thread pool: {err}")))
}

#[macro_export]
macro_rules! debug_log {
    ($($t:tt)*) => {{
        #[cfg(feature = "debug_logs")]
        {
            #[cfg(target_arch = "wasm32")]
            {
                ::web_sys::console::log_1(&::wasm_bindgen::JsValue::from_str(&format!($($t)*)));
            }
            #[cfg(not(target_arch = "wasm32"))]
            {
                println!("{}", format!($($t)*));
            }
        }
    }};
}

/// One scene mesh as handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshExport {
    pub id: u64,
    pub is_target: bool,
    pub positions: Vec<f64>,
    pub indices: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normals: Option<Vec<f64>>,
    /// Column-major object-to-world matrix.
    pub transform: [f64; 16],
}

#[derive(Debug, Serialize)]
struct CutSummary {
    plane_normal: [f64; 3],
    plane_constant: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    top: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bottom: Option<u64>,
}

/// Public entry point for the browser: one scene, one camera, one cut
/// session driven by pointer events.
#[wasm_bindgen]
pub struct CutEngine {
    session: CutSession,
    last_cut: Option<CutSummary>,
}

#[wasm_bindgen]
impl CutEngine {
    #[wasm_bindgen(constructor)]
    #[must_use]
    pub fn new(width: f64, height: f64) -> CutEngine {
        let camera = CameraState::perspective(
            Point3::new(0.0, 0.0, 5.0),
            Point3::ORIGIN,
            CameraState::DEFAULT_FOV_Y_DEGREES,
            Viewport::sized(width, height),
        );
        CutEngine {
            session: CutSession::new(Scene::new(), camera, CutConfig::default()),
            last_cut: None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_camera(
        &mut self,
        px: f64,
        py: f64,
        pz: f64,
        tx: f64,
        ty: f64,
        tz: f64,
        fov_y_degrees: f64,
    ) {
        let mut camera = *self.session.camera();
        camera.position = Point3::new(px, py, pz);
        camera.target = Point3::new(tx, ty, tz);
        camera.fov_y_degrees = fov_y_degrees;
        self.session.set_camera(camera);
    }

    pub fn set_viewport(&mut self, left: f64, top: f64, width: f64, height: f64) {
        let mut camera = *self.session.camera();
        camera.viewport = Viewport::new(left, top, width, height);
        self.session.set_camera(camera);
    }

    /// Applies a partial `CutConfig` object; missing fields take defaults.
    pub fn set_config(&mut self, config: JsValue) -> Result<(), JsValue> {
        let config: CutConfig = serde_wasm_bindgen::from_value(config).map_err(to_js_error)?;
        self.session.set_config(config);
        Ok(())
    }

    /// Replaces the scene with a single sphere and makes it the target.
    pub fn load_sphere(&mut self, radius: f64, segments: u32) -> Result<(), JsValue> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(js_error("sphere radius must be a positive finite number"));
        }
        let segments = segments.max(3) as usize;
        self.load(Mesh::uv_sphere(radius, segments, segments.div_ceil(2)));
        Ok(())
    }

    pub fn load_box(&mut self, hx: f64, hy: f64, hz: f64) -> Result<(), JsValue> {
        let half = Vec3::new(hx, hy, hz);
        if !(half.is_finite() && hx > 0.0 && hy > 0.0 && hz > 0.0) {
            return Err(js_error("box half extents must be positive finite numbers"));
        }
        self.load(Mesh::cuboid(half));
        Ok(())
    }

    /// Loads an arbitrary closed triangle mesh from flat buffers.
    pub fn load_mesh(&mut self, positions: Vec<f64>, indices: Vec<u32>) -> Result<(), JsValue> {
        let mesh = mesh_from_flat(&positions, indices).map_err(|msg| js_error(&msg))?;
        self.load(mesh);
        Ok(())
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) -> bool {
        matches!(
            self.session.pointer_down(ScreenPoint::new(x, y)),
            GestureEvent::Started(_)
        )
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) -> bool {
        matches!(
            self.session.pointer_move(ScreenPoint::new(x, y)),
            GestureEvent::Moved(_)
        )
    }

    /// Returns `true` when the release produced a cut.
    pub fn pointer_up(&mut self, x: f64, y: f64) -> bool {
        let Some(result) = self.session.pointer_up(ScreenPoint::new(x, y)) else {
            return false;
        };
        self.last_cut = Some(CutSummary {
            plane_normal: result.plane.normal.into(),
            plane_constant: result.plane.constant,
            top: result.top.map(MeshId::to_bits),
            bottom: result.bottom.map(MeshId::to_bits),
        });
        true
    }

    pub fn get_meshes(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.mesh_exports()).map_err(to_js_error)
    }

    pub fn get_last_cut(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.last_cut).map_err(to_js_error)
    }

    /// Message of the most recent failed cut, if the last release failed.
    pub fn last_error(&self) -> Option<String> {
        self.session.last_error().map(ToString::to_string)
    }

    pub fn mesh_count(&self) -> usize {
        self.session.scene().len()
    }
}

impl CutEngine {
    fn load(&mut self, mesh: Mesh) {
        let scene = self.session.scene_mut();
        scene.clear();
        let id = scene.add_mesh(mesh, Transform::identity());
        self.session.set_target(Some(id));
        self.last_cut = None;
        debug_log!("engine: loaded target {id:?}");
    }

    /// Renderer view of every scene mesh.
    #[must_use]
    pub fn mesh_exports(&self) -> Vec<MeshExport> {
        let target = self.session.target();
        self.session
            .scene()
            .iter()
            .map(|(id, entity)| MeshExport {
                id: id.to_bits(),
                is_target: Some(id) == target,
                positions: entity.mesh.positions_flat().to_vec(),
                indices: entity.mesh.indices.clone(),
                normals: entity.mesh.normals_flat().map(<[f64]>::to_vec),
                transform: entity.transform.to_cols_array(),
            })
            .collect()
    }

    #[must_use]
    pub fn session(&self) -> &CutSession {
        &self.session
    }
}

fn mesh_from_flat(positions: &[f64], indices: Vec<u32>) -> Result<Mesh, String> {
    if positions.len() % 3 != 0 {
        return Err("position buffer length is not a multiple of 3".to_string());
    }
    let positions = positions
        .chunks_exact(3)
        .map(|p| [p[0], p[1], p[2]])
        .collect();
    let mesh = Mesh::new(positions, indices);
    mesh.validate()?;
    Ok(mesh.with_smooth_normals())
}

fn to_js_error<E: fmt::Display>(error: E) -> JsValue {
    js_error(&error.to_string())
}

fn js_error(message: &str) -> JsValue {
    #[cfg(target_arch = "wasm32")]
    {
        wasm_bindgen::JsError::new(message).into()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = message;
        JsValue::NULL
    }
}
