use crate::camera::Camera;
use lumen_assets::{Material, MaterialId, MaterialStore};
use lumen_common::{GeometryHandle, Transform};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of a drawable. Allocated sequentially, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DrawableId(pub u32);

/// One renderable object: geometry, placement and an optional material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drawable {
    pub geometry: GeometryHandle,
    pub transform: Transform,
    pub material: Option<MaterialId>,
}

impl Drawable {
    pub fn new(geometry: GeometryHandle, material: Option<MaterialId>) -> Self {
        Self {
            geometry,
            transform: Transform::default(),
            material,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }
}

/// A drawable as enumerated for rendering, with its material resolved.
#[derive(Debug, Clone, Copy)]
pub struct DrawItem<'a> {
    pub id: DrawableId,
    pub drawable: &'a Drawable,
    /// `None` when the drawable has no material or its material was released.
    pub material: Option<&'a Material>,
}

/// The scene the geometry pass reads.
///
/// Drawables are stored in a BTreeMap keyed by sequential ids, so
/// enumeration order is insertion order. Rendering never mutates the world.
#[derive(Debug, Clone, Default)]
pub struct World {
    drawables: BTreeMap<DrawableId, Drawable>,
    next_id: u32,
    materials: MaterialStore,
    camera: Camera,
}

impl World {
    /// Create an empty world with the default camera.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    pub fn materials(&self) -> &MaterialStore {
        &self.materials
    }

    pub fn materials_mut(&mut self) -> &mut MaterialStore {
        &mut self.materials
    }

    /// Convenience for `materials_mut().insert(..)`.
    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.insert(material)
    }

    /// Number of drawables in the world.
    pub fn drawable_count(&self) -> usize {
        self.drawables.len()
    }

    /// Add a drawable. Returns its id.
    pub fn spawn(&mut self, drawable: Drawable) -> DrawableId {
        let id = DrawableId(self.next_id);
        self.next_id += 1;
        self.drawables.insert(id, drawable);
        tracing::trace!(?id, "spawned drawable");
        id
    }

    /// Remove a drawable. Returns it if it existed.
    pub fn despawn(&mut self, id: DrawableId) -> Option<Drawable> {
        self.drawables.remove(&id)
    }

    pub fn get(&self, id: DrawableId) -> Option<&Drawable> {
        self.drawables.get(&id)
    }

    pub fn get_mut(&mut self, id: DrawableId) -> Option<&mut Drawable> {
        self.drawables.get_mut(&id)
    }

    /// Update a drawable's transform. Returns false if it does not exist.
    pub fn set_transform(&mut self, id: DrawableId, transform: Transform) -> bool {
        match self.drawables.get_mut(&id) {
            Some(d) => {
                d.transform = transform;
                true
            }
            None => false,
        }
    }

    /// Drawables in enumeration order with their materials resolved.
    pub fn drawables(&self) -> impl Iterator<Item = DrawItem<'_>> {
        self.drawables.iter().map(|(id, drawable)| DrawItem {
            id: *id,
            drawable,
            material: drawable.material.and_then(|m| self.materials.get(m)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_starts_empty() {
        let w = World::new();
        assert_eq!(w.drawable_count(), 0);
        assert_eq!(w.drawables().count(), 0);
    }

    #[test]
    fn spawn_and_despawn() {
        let mut w = World::new();
        let id = w.spawn(Drawable::new(GeometryHandle::new(0), None));
        assert_eq!(w.drawable_count(), 1);
        assert!(w.get(id).is_some());
        assert!(w.despawn(id).is_some());
        assert_eq!(w.drawable_count(), 0);
    }

    #[test]
    fn enumeration_follows_insertion_order() {
        let mut w = World::new();
        let ids: Vec<DrawableId> = (0..10)
            .map(|i| w.spawn(Drawable::new(GeometryHandle::new(i), None)))
            .collect();
        let seen: Vec<DrawableId> = w.drawables().map(|item| item.id).collect();
        assert_eq!(seen, ids);
    }

    #[test]
    fn ids_are_not_reused() {
        let mut w = World::new();
        let a = w.spawn(Drawable::new(GeometryHandle::new(0), None));
        w.despawn(a);
        let b = w.spawn(Drawable::new(GeometryHandle::new(0), None));
        assert_ne!(a, b);
    }

    #[test]
    fn materials_resolve_through_the_arena() {
        let mut w = World::new();
        let mat = w.add_material(Material::new("stone"));
        w.spawn(Drawable::new(GeometryHandle::new(0), Some(mat)));
        w.spawn(Drawable::new(GeometryHandle::new(1), None));

        let resolved: Vec<Option<&str>> = w
            .drawables()
            .map(|item| item.material.map(|m| m.name.as_str()))
            .collect();
        assert_eq!(resolved, vec![Some("stone"), None]);
    }

    #[test]
    fn released_material_resolves_to_none() {
        let mut w = World::new();
        let mat = w.add_material(Material::new("temp"));
        w.spawn(Drawable::new(GeometryHandle::new(0), Some(mat)));
        w.materials_mut().remove(mat);
        assert!(w.drawables().next().unwrap().material.is_none());
    }

    #[test]
    fn set_transform_updates_existing_only() {
        let mut w = World::new();
        let id = w.spawn(Drawable::new(GeometryHandle::new(0), None));
        let moved = Transform::from_position(glam::Vec3::new(1.0, 2.0, 3.0));
        assert!(w.set_transform(id, moved));
        assert_eq!(w.get(id).unwrap().transform, moved);
        assert!(!w.set_transform(DrawableId(99), moved));
    }
}
