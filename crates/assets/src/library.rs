use crate::error::AssetError;
use crate::material::{MaterialFactors, TextureRole};
use lumen_common::MaterialFlags;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// On-disk description of a material: factors plus texture file paths.
///
/// Paths are handed to the texture cache verbatim at load time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialDesc {
    pub name: String,
    #[serde(default)]
    pub factors: MaterialFactors,
    #[serde(default)]
    pub flags: MaterialFlags,
    #[serde(default)]
    pub textures: BTreeMap<TextureRole, String>,
}

impl MaterialDesc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_texture(mut self, role: TextureRole, path: impl Into<String>) -> Self {
        self.textures.insert(role, path.into());
        self
    }
}

/// A list of material descriptions persisted as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialLibrary {
    pub materials: Vec<MaterialDesc>,
}

impl MaterialLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, desc: MaterialDesc) {
        self.materials.push(desc);
    }

    pub fn find(&self, name: &str) -> Option<&MaterialDesc> {
        self.materials.iter().find(|m| m.name == name)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Save the library to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AssetError> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Load a library from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let file = std::fs::File::open(path)?;
        let library: Self = serde_json::from_reader(file)?;
        Ok(library)
    }
}
