mod boolean;
mod bvh;
mod core;
mod diagnostics;
mod mesh;
mod plane;
mod raycast;
mod triangulation;

pub use boolean::{
    BooleanDiagnostics, BooleanError, BooleanOptions, BooleanResult, ToolRelation, subtract,
};
pub use core::{BBox, Point3, Tolerance, Transform, Vec3};
pub use diagnostics::MeshDiagnostics;
pub use mesh::{Mesh, Triangle3};
pub use plane::{
    HalfSpacePolicy, HalfSpaceSolid, Plane, PlaneError, build_cut_plane, build_half_space_solids,
};
pub use raycast::{Ray, RayHit, cast_ray, cast_ray_world};
pub use triangulation::{TriangulationError, UvPoint, loop_area, point_in_loop, triangulate_loops};

#[cfg(test)]
mod tests;
