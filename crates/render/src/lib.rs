//! Renderer-agnostic core of lumen.
//!
//! - [`backend`]: the [`GpuBackend`] trait and the descriptors passed through it.
//! - [`texture_cache`]: path-keyed [`TextureCache`] with single-flight loading.
//! - [`gbuffer`]: the [`GBufferPass`] and its attachment layout.
//! - [`packing`]: CPU reference of the G-buffer encoding.
//! - [`headless`]: [`HeadlessBackend`], a recording backend without a device.
//! - [`renderer`]: [`Renderer`], which owns all of the above.
//!
//! # Invariants
//! - Each distinct texture path is decoded and created at most once per cache.
//! - A failed path keeps resolving to the invalid handle until invalidated.
//! - The G-buffer pass never mutates the world and never fails per object.

pub mod backend;
pub mod config;
pub mod error;
pub mod gbuffer;
pub mod headless;
pub mod packing;
pub mod renderer;
pub mod texture_cache;
pub mod vertex;

pub use backend::{
    CullMode, DrawState, GpuBackend, GpuMemory, ProgramDesc, TextureCreateInfo, TextureShape,
    UniformKind, UniformValue, ViewClear,
};
pub use config::RendererConfig;
pub use error::{LoadFailure, RenderError};
pub use gbuffer::{GBufferAttachment, GBufferAttachments, GBufferConfig, GBufferPass, GBufferStats};
pub use headless::HeadlessBackend;
pub use renderer::{FrameSummary, Renderer};
pub use texture_cache::{CacheStats, LoadedTexture, TextureCache, TextureInfo, creation_info};
pub use vertex::{Attrib, MeshVertex, VertexLayout, VertexPos, cube_mesh};

pub fn crate_info() -> &'static str {
    "lumen-render v0.1.0"
}
