#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    if let Err(err) = native::run() {
        eprintln!("cut_cli error: {err}");
        std::process::exit(1);
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use knife_engine::cut::{CutConfig, CutMode, CutResult, Cutter};
    use knife_engine::geom::{Mesh, Point3, Transform, Vec3};
    use knife_engine::input::{CameraState, ScreenPoint, Viewport};
    use knife_engine::scene::{MeshId, Scene};
    use std::fs::{self, File};
    use std::io::{BufWriter, Write};
    use std::path::{Path, PathBuf};

    const USAGE: &str = r#"cut_cli (knife-engine)

USAGE:
  cut_cli list
  cut_cli run <scenario|all> [options]

SCENARIOS:
  sphere_horizontal
  sphere_oblique
  cube_diagonal
  torus_flat
  torus_across_hole

OPTIONS (run):
  --out-dir <dir>     Write <scenario>.obj to this dir (required for `all`)
  --obj <path>        Write OBJ (single scenario only)
  --single-plane      Keep only the top fragment
  --timeout-ms <ms>   Evaluate on a worker thread with this timeout
  --overwrite         Overwrite existing output files
  -h, --help          Show this help
"#;

    pub fn run() -> Result<(), String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut args = Args::new(args);

        let Some(command) = args.next() else {
            print_usage();
            return Ok(());
        };

        match command.as_str() {
            "list" => {
                for scenario in Scenario::ALL {
                    println!("{}", scenario.name());
                }
                Ok(())
            }
            "run" => cmd_run(&mut args),
            "-h" | "--help" | "help" => {
                print_usage();
                Ok(())
            }
            other => Err(format!("unknown command `{other}`\n\n{USAGE}")),
        }
    }

    fn print_usage() {
        println!("{USAGE}");
    }

    fn cmd_run(args: &mut Args) -> Result<(), String> {
        let scenario_name = args.next().ok_or("missing scenario name")?;

        let mut out_dir: Option<PathBuf> = None;
        let mut obj_path: Option<PathBuf> = None;
        let mut overwrite = false;
        let mut config = CutConfig::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--out-dir" => out_dir = Some(PathBuf::from(args.value("--out-dir")?)),
                "--obj" => obj_path = Some(PathBuf::from(args.value("--obj")?)),
                "--single-plane" => config.mode = CutMode::SinglePlane,
                "--timeout-ms" => {
                    let raw = args.value("--timeout-ms")?;
                    let ms = raw
                        .parse::<u64>()
                        .map_err(|e| format!("invalid --timeout-ms `{raw}`: {e}"))?;
                    config.timeout_ms = Some(ms);
                }
                "--overwrite" => overwrite = true,
                "-h" | "--help" => {
                    print_usage();
                    return Ok(());
                }
                other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
            }
        }

        let cutter = Cutter::new(config);

        if let Some(dir) = out_dir.as_ref() {
            if obj_path.is_some() {
                return Err("use either --out-dir or --obj (not both)".to_string());
            }
            fs::create_dir_all(dir).map_err(|e| format!("create out dir: {e}"))?;

            let scenarios: Vec<Scenario> = if scenario_name == "all" {
                Scenario::ALL.to_vec()
            } else {
                vec![Scenario::from_str(&scenario_name).ok_or_else(|| unknown_scenario(&scenario_name))?]
            };
            for scenario in scenarios {
                let output = run_scenario(scenario, &cutter)?;
                let path = dir.join(format!("{}.obj", output.name));
                write_obj_file(&path, &output, overwrite)?;
                eprintln!("wrote {}", path.display());
                print_summary(&output);
            }
            return Ok(());
        }

        if scenario_name == "all" {
            return Err("`run all` requires --out-dir".to_string());
        }

        let scenario =
            Scenario::from_str(&scenario_name).ok_or_else(|| unknown_scenario(&scenario_name))?;
        let output = run_scenario(scenario, &cutter)?;
        if let Some(path) = obj_path.as_deref() {
            write_obj_file(path, &output, overwrite)?;
            eprintln!("wrote {}", path.display());
        }
        print_summary(&output);
        Ok(())
    }

    fn print_summary(output: &ScenarioOutput) {
        let n = output.result.plane.normal;
        println!(
            "{}: plane n=({:.6}, {:.6}, {:.6}) d={:.6}",
            output.name, n.x, n.y, n.z, output.result.plane.constant
        );
        for (label, _, mesh, _) in &output.parts {
            println!(
                "  {label}: vertices={} triangles={} volume={:.6} | {}",
                mesh.vertex_count(),
                mesh.triangle_count(),
                mesh.volume(),
                mesh.diagnostics().summary()
            );
        }
    }

    fn unknown_scenario(name: &str) -> String {
        let mut msg = format!("unknown scenario `{name}`\n\navailable scenarios:\n");
        for scenario in Scenario::ALL {
            msg.push_str("  ");
            msg.push_str(scenario.name());
            msg.push('\n');
        }
        msg
    }

    fn write_obj_file(path: &Path, output: &ScenarioOutput, overwrite: bool) -> Result<(), String> {
        if path.exists() && !overwrite {
            return Err(format!(
                "refusing to overwrite existing file {} (use --overwrite)",
                path.display()
            ));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("create dir {}: {e}", parent.display()))?;
        }

        let file = File::create(path).map_err(|e| format!("create {}: {e}", path.display()))?;
        let mut w = BufWriter::new(file);
        let io = |e: std::io::Error| format!("write obj: {e}");

        writeln!(w, "# knife-engine cut_cli").map_err(io)?;
        let mut base = 1u32;
        for (label, _, mesh, transform) in &output.parts {
            mesh.validate().map_err(|e| format!("{label}: mesh validation failed: {e}"))?;
            let world = mesh.transformed(*transform);
            writeln!(w, "o {}_{label}", output.name).map_err(io)?;
            for p in &world.positions {
                writeln!(w, "v {} {} {}", p[0], p[1], p[2]).map_err(io)?;
            }
            for n in world.normals.iter().flatten() {
                writeln!(w, "vn {} {} {}", n[0], n[1], n[2]).map_err(io)?;
            }
            let has_normals = world.normals.is_some();
            for tri in world.indices.chunks_exact(3) {
                let [a, b, c] = [tri[0] + base, tri[1] + base, tri[2] + base];
                if has_normals {
                    writeln!(w, "f {a}//{a} {b}//{b} {c}//{c}").map_err(io)?;
                } else {
                    writeln!(w, "f {a} {b} {c}").map_err(io)?;
                }
            }
            base += u32::try_from(world.positions.len()).map_err(|e| format!("write obj: {e}"))?;
        }

        w.flush().map_err(|e| format!("flush {}: {e}", path.display()))
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Scenario {
        SphereHorizontal,
        SphereOblique,
        CubeDiagonal,
        TorusFlat,
        TorusAcrossHole,
    }

    impl Scenario {
        const ALL: &'static [Scenario] = &[
            Scenario::SphereHorizontal,
            Scenario::SphereOblique,
            Scenario::CubeDiagonal,
            Scenario::TorusFlat,
            Scenario::TorusAcrossHole,
        ];

        fn name(self) -> &'static str {
            match self {
                Scenario::SphereHorizontal => "sphere_horizontal",
                Scenario::SphereOblique => "sphere_oblique",
                Scenario::CubeDiagonal => "cube_diagonal",
                Scenario::TorusFlat => "torus_flat",
                Scenario::TorusAcrossHole => "torus_across_hole",
            }
        }

        fn from_str(name: &str) -> Option<Self> {
            Self::ALL.iter().copied().find(|s| s.name() == name)
        }
    }

    struct ScenarioOutput {
        name: &'static str,
        result: CutResult,
        /// `(label, id, mesh, world transform)` per surviving fragment.
        parts: Vec<(&'static str, MeshId, Mesh, Transform)>,
    }

    fn camera() -> CameraState {
        CameraState::perspective(
            Point3::new(0.0, 0.0, 5.0),
            Point3::ORIGIN,
            30.0,
            Viewport::sized(400.0, 400.0),
        )
    }

    fn run_scenario(scenario: Scenario, cutter: &Cutter) -> Result<ScenarioOutput, String> {
        let (mesh, transform, from, to) = match scenario {
            Scenario::SphereHorizontal => (
                Mesh::uv_sphere(1.0, 48, 24),
                Transform::identity(),
                ScreenPoint::new(100.0, 200.0),
                ScreenPoint::new(300.0, 200.0),
            ),
            Scenario::SphereOblique => (
                Mesh::uv_sphere(1.0, 48, 24),
                Transform::identity(),
                ScreenPoint::new(130.0, 140.0),
                ScreenPoint::new(270.0, 250.0),
            ),
            Scenario::CubeDiagonal => (
                Mesh::cuboid(Vec3::new(0.6, 0.6, 0.6)),
                Transform::rotate_axis(Vec3::new(1.0, 1.0, 0.0), 0.4).ok_or("invalid rotation")?,
                ScreenPoint::new(140.0, 140.0),
                ScreenPoint::new(260.0, 260.0),
            ),
            Scenario::TorusFlat => (
                Mesh::torus(0.8, 0.3, 24, 48),
                Transform::rotate_axis(Vec3::X, std::f64::consts::FRAC_PI_2).ok_or("invalid rotation")?,
                ScreenPoint::new(90.0, 210.0),
                ScreenPoint::new(310.0, 210.0),
            ),
            Scenario::TorusAcrossHole => (
                Mesh::torus(0.8, 0.3, 24, 48),
                Transform::rotate_axis(Vec3::X, std::f64::consts::FRAC_PI_2).ok_or("invalid rotation")?,
                ScreenPoint::new(205.0, 110.0),
                ScreenPoint::new(205.0, 290.0),
            ),
        };

        let mut scene = Scene::new();
        let target = scene.add_mesh(mesh, transform);
        let result = cutter
            .perform_cut(from, to, &camera(), &mut scene, target)
            .map_err(|e| format!("{}: {e}", scenario.name()))?;

        let mut parts = Vec::new();
        for (label, id) in [("top", result.top), ("bottom", result.bottom)] {
            let Some(id) = id else { continue };
            let entity = scene
                .entity(id)
                .ok_or_else(|| format!("{}: fragment {label} missing from scene", scenario.name()))?;
            parts.push((label, id, entity.mesh.clone(), entity.transform));
        }

        Ok(ScenarioOutput {
            name: scenario.name(),
            result,
            parts,
        })
    }

    struct Args {
        args: Vec<String>,
        pos: usize,
    }

    impl Args {
        fn new(args: Vec<String>) -> Self {
            Self { args, pos: 0 }
        }

        fn next(&mut self) -> Option<String> {
            let arg = self.args.get(self.pos)?.clone();
            self.pos += 1;
            Some(arg)
        }

        fn value(&mut self, flag: &str) -> Result<String, String> {
            self.next().ok_or_else(|| format!("missing value for {flag}"))
        }
    }
}
