use crate::error::RenderError;
use crate::gbuffer::GBufferConfig;
use lumen_common::{TextureFlags, ViewId};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Renderer settings, loadable from JSON. Missing fields take defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub width: u32,
    pub height: u32,
    /// View the G-buffer pass renders into.
    pub view: ViewId,
    pub gbuffer: GBufferConfig,
    /// Creation flags for material textures. Color roles add `SRGB`.
    pub texture_flags: TextureFlags,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            view: ViewId(0),
            gbuffer: GBufferConfig::default(),
            texture_flags: TextureFlags::empty(),
        }
    }
}

impl RendererConfig {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), RenderError> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}
