mod test_boolean_basic;
mod test_mesh_sanity;
mod test_plane_basic;
mod test_triangulation_basic;
