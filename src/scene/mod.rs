//! Scene registry: the meshes the user can cut and where they sit in the
//! world.
//!
//! A cut swaps one entity for its fragments in a single call, so the
//! registry never holds a half-applied cut. An optional [`PhysicsWorld`] is
//! kept in step: bodies are added and removed with their entities and body
//! poses can be pulled back into the scene.

use std::fmt;

use slotmap::{Key, SlotMap};

use crate::geom::{Mesh, Transform};

slotmap::new_key_type! {
    /// Stable handle to a mesh in a [`Scene`]. Never reused after removal.
    pub struct MeshId;
}

impl MeshId {
    /// Integer form for export across the wasm boundary.
    #[must_use]
    pub fn to_bits(self) -> u64 {
        self.data().as_ffi()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneEntity {
    pub mesh: Mesh,
    /// Object-to-world transform.
    pub transform: Transform,
}

/// Rigid-body simulation hook.
///
/// The scene only needs bodies to appear and disappear with their meshes and
/// to read poses back; integration lives entirely on the implementor's side.
pub trait PhysicsWorld {
    fn add_body(&mut self, id: MeshId, mesh: &Mesh, transform: Transform);
    fn remove_body(&mut self, id: MeshId);
    fn body_transform(&self, id: MeshId) -> Option<Transform>;
}

#[derive(Default)]
pub struct Scene {
    entities: SlotMap<MeshId, SceneEntity>,
    physics: Option<Box<dyn PhysicsWorld>>,
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("entities", &self.entities.len())
            .field("physics", &self.physics.is_some())
            .finish()
    }
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_physics(physics: Box<dyn PhysicsWorld>) -> Self {
        Self {
            entities: SlotMap::with_key(),
            physics: Some(physics),
        }
    }

    pub fn add_mesh(&mut self, mesh: Mesh, transform: Transform) -> MeshId {
        let id = self.entities.insert(SceneEntity { mesh, transform });
        if let Some(physics) = self.physics.as_mut() {
            physics.add_body(id, &self.entities[id].mesh, transform);
        }
        log::debug!("scene: added {id:?}");
        id
    }

    pub fn remove_mesh(&mut self, id: MeshId) -> Option<SceneEntity> {
        let entity = self.entities.remove(id)?;
        if let Some(physics) = self.physics.as_mut() {
            physics.remove_body(id);
        }
        log::debug!("scene: removed {id:?}");
        Some(entity)
    }

    /// Replaces `target` with `fragments`, all placed at the target's
    /// transform. Returns the new ids in input order, or `None` (and leaves
    /// the scene untouched) if `target` is not present.
    pub fn replace(&mut self, target: MeshId, fragments: Vec<Mesh>) -> Option<Vec<MeshId>> {
        let transform = self.remove_mesh(target)?.transform;
        Some(
            fragments
                .into_iter()
                .map(|mesh| self.add_mesh(mesh, transform))
                .collect(),
        )
    }

    #[must_use]
    pub fn entity(&self, id: MeshId) -> Option<&SceneEntity> {
        self.entities.get(id)
    }

    #[must_use]
    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.entities.get(id).map(|e| &e.mesh)
    }

    #[must_use]
    pub fn world_transform(&self, id: MeshId) -> Option<Transform> {
        self.entities.get(id).map(|e| e.transform)
    }

    pub fn set_transform(&mut self, id: MeshId, transform: Transform) -> bool {
        match self.entities.get_mut(id) {
            Some(entity) => {
                entity.transform = transform;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn contains(&self, id: MeshId) -> bool {
        self.entities.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = MeshId> + '_ {
        self.entities.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MeshId, &SceneEntity)> {
        self.entities.iter()
    }

    /// Removes every entity (and body).
    pub fn clear(&mut self) {
        let ids: Vec<MeshId> = self.entities.keys().collect();
        for id in ids {
            self.remove_mesh(id);
        }
    }

    /// Copies simulated body poses into entity transforms. Returns how many
    /// entities moved.
    pub fn sync_from_physics(&mut self) -> usize {
        let Some(physics) = self.physics.as_ref() else {
            return 0;
        };
        let mut moved = 0;
        for (id, entity) in &mut self.entities {
            if let Some(pose) = physics.body_transform(id) {
                if pose != entity.transform {
                    entity.transform = pose;
                    moved += 1;
                }
            }
        }
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Vec3;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    #[derive(Default)]
    struct RecordingPhysics {
        bodies: Rc<RefCell<HashMap<MeshId, Transform>>>,
    }

    impl PhysicsWorld for RecordingPhysics {
        fn add_body(&mut self, id: MeshId, _mesh: &Mesh, transform: Transform) {
            self.bodies.borrow_mut().insert(id, transform);
        }

        fn remove_body(&mut self, id: MeshId) {
            self.bodies.borrow_mut().remove(&id);
        }

        fn body_transform(&self, id: MeshId) -> Option<Transform> {
            self.bodies.borrow().get(&id).copied()
        }
    }

    fn unit_cube() -> Mesh {
        Mesh::cuboid(Vec3::new(0.5, 0.5, 0.5))
    }

    #[test]
    fn replace_swaps_entity_for_fragments() {
        let mut scene = Scene::new();
        let offset = Transform::translate(Vec3::new(1.0, 2.0, 3.0));
        let target = scene.add_mesh(unit_cube(), offset);
        let other = scene.add_mesh(unit_cube(), Transform::identity());

        let ids = scene.replace(target, vec![unit_cube(), unit_cube()]).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(!scene.contains(target));
        assert!(scene.contains(other));
        assert_eq!(scene.len(), 3);
        for id in ids {
            assert_eq!(scene.world_transform(id), Some(offset));
        }
    }

    #[test]
    fn replace_missing_target_is_noop() {
        let mut scene = Scene::new();
        let id = scene.add_mesh(unit_cube(), Transform::identity());
        scene.remove_mesh(id);
        assert!(scene.replace(id, vec![unit_cube()]).is_none());
        assert!(scene.is_empty());
    }

    #[test]
    fn physics_bodies_follow_entities() {
        let bodies = Rc::new(RefCell::new(HashMap::new()));
        let physics = RecordingPhysics {
            bodies: Rc::clone(&bodies),
        };
        let mut scene = Scene::with_physics(Box::new(physics));

        let id = scene.add_mesh(unit_cube(), Transform::identity());
        assert!(bodies.borrow().contains_key(&id));

        let fragments = scene.replace(id, vec![unit_cube(), unit_cube()]).unwrap();
        assert!(!bodies.borrow().contains_key(&id));
        assert_eq!(bodies.borrow().len(), 2);

        let dropped = Transform::translate(Vec3::new(0.0, -1.0, 0.0));
        bodies.borrow_mut().insert(fragments[0], dropped);
        assert_eq!(scene.sync_from_physics(), 1);
        assert_eq!(scene.world_transform(fragments[0]), Some(dropped));
        assert_eq!(scene.world_transform(fragments[1]), Some(Transform::identity()));
    }
}
