use bitflags::bitflags;
use glam::{Vec3, Vec4};
use lumen_common::{MaterialFlags, TextureHandle};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

/// The five texture slots a material may fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureRole {
    BaseColor,
    MetallicRoughness,
    Normal,
    Occlusion,
    Emissive,
}

impl TextureRole {
    /// Roles in sampler-stage order.
    pub const ALL: [TextureRole; 5] = [
        TextureRole::BaseColor,
        TextureRole::MetallicRoughness,
        TextureRole::Normal,
        TextureRole::Occlusion,
        TextureRole::Emissive,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn bit(self) -> TextureRoles {
        TextureRoles::from_bits_truncate(1 << self.index())
    }

    /// Color data (as opposed to vectors or masks) and therefore sRGB-encoded.
    pub fn is_color(self) -> bool {
        matches!(self, TextureRole::BaseColor | TextureRole::Emissive)
    }
}

bitflags! {
    /// Which texture roles are bound to a real texture rather than the default.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct TextureRoles: u32 {
        const BASE_COLOR         = 1 << 0;
        const METALLIC_ROUGHNESS = 1 << 1;
        const NORMAL             = 1 << 2;
        const OCCLUSION          = 1 << 3;
        const EMISSIVE           = 1 << 4;
    }
}

/// Scalar and vector material factors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialFactors {
    pub base_color: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub normal_scale: f32,
    pub occlusion_strength: f32,
    pub emissive: Vec3,
}

impl Default for MaterialFactors {
    fn default() -> Self {
        Self {
            base_color: Vec4::ONE,
            metallic: 1.0,
            roughness: 1.0,
            normal_scale: 1.0,
            occlusion_strength: 1.0,
            emissive: Vec3::ZERO,
        }
    }
}

/// A resolved material: factors plus GPU texture handles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Material {
    pub name: String,
    pub factors: MaterialFactors,
    pub flags: MaterialFlags,
    textures: [Option<TextureHandle>; 5],
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_factors(mut self, factors: MaterialFactors) -> Self {
        self.factors = factors;
        self
    }

    pub fn with_flags(mut self, flags: MaterialFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_texture(mut self, role: TextureRole, texture: TextureHandle) -> Self {
        self.set_texture(role, Some(texture));
        self
    }

    pub fn set_texture(&mut self, role: TextureRole, texture: Option<TextureHandle>) {
        self.textures[role.index()] = texture;
    }

    /// The texture referenced for `role`, if any. The handle may be invalid
    /// when the referenced file failed to load.
    pub fn texture(&self, role: TextureRole) -> Option<TextureHandle> {
        self.textures[role.index()]
    }

    pub fn factors(&self) -> &MaterialFactors {
        &self.factors
    }

    pub fn is_double_sided(&self) -> bool {
        self.flags.contains(MaterialFlags::DOUBLE_SIDED)
    }
}

slotmap::new_key_type! {
    /// Stable key of a material in a [`MaterialStore`].
    pub struct MaterialId;
}

/// Arena of materials shared by index among drawables.
///
/// Keys stay valid until the slot is removed; a removed key resolves to
/// `None` and never aliases a newer material.
#[derive(Debug, Clone, Default)]
pub struct MaterialStore {
    materials: SlotMap<MaterialId, Material>,
}

impl MaterialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, material: Material) -> MaterialId {
        self.materials.insert(material)
    }

    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id)
    }

    pub fn get_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id)
    }

    pub fn remove(&mut self, id: MaterialId) -> Option<Material> {
        self.materials.remove(id)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MaterialId, &Material)> {
        self.materials.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_bits_match_stage_order() {
        let bits: Vec<u32> = TextureRole::ALL.iter().map(|r| r.bit().bits()).collect();
        assert_eq!(bits, vec![1, 2, 4, 8, 16]);
        assert_eq!(TextureRoles::all().bits(), 0b1_1111);
    }

    #[test]
    fn texture_slots_start_empty() {
        let material = Material::new("plain");
        for role in TextureRole::ALL {
            assert_eq!(material.texture(role), None);
        }
    }

    #[test]
    fn set_and_clear_texture() {
        let mut material =
            Material::new("brick").with_texture(TextureRole::Normal, TextureHandle::new(7));
        assert_eq!(
            material.texture(TextureRole::Normal),
            Some(TextureHandle::new(7))
        );
        material.set_texture(TextureRole::Normal, None);
        assert_eq!(material.texture(TextureRole::Normal), None);
    }

    #[test]
    fn removed_key_does_not_alias() {
        let mut store = MaterialStore::new();
        let a = store.insert(Material::new("a"));
        store.remove(a);
        let b = store.insert(Material::new("b"));
        assert!(store.get(a).is_none());
        assert_eq!(store.get(b).unwrap().name, "b");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn double_sided_flag() {
        let material = Material::new("leaf").with_flags(MaterialFlags::DOUBLE_SIDED);
        assert!(material.is_double_sided());
        assert!(!Material::new("wall").is_double_sided());
    }
}
