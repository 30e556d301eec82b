//! The GPU backend interface every renderer implementation provides.
//!
//! The backend is an external collaborator: handles are opaque, and per-draw
//! state (transform, uniforms, texture bindings, render state) accumulates
//! until [`GpuBackend::submit`], which consumes it.

use crate::error::RenderError;
use crate::vertex::VertexLayout;
use glam::{Mat3, Mat4, Vec4};
use lumen_common::{
    FrameBufferHandle, GeometryHandle, PixelFormat, ProgramHandle, TextureFlags, TextureHandle,
    UniformHandle, ViewId,
};

type ReleaseFn = Box<dyn FnOnce(Vec<u8>) + Send>;

/// Pixel payload handed to the backend.
///
/// Ownership moves to the backend on creation. The optional release callback
/// runs exactly once, when the backend drops the memory after it no longer
/// needs it.
pub struct GpuMemory {
    data: Vec<u8>,
    release: Option<ReleaseFn>,
}

impl GpuMemory {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            release: None,
        }
    }

    pub fn copy(data: &[u8]) -> Self {
        Self::new(data.to_vec())
    }

    /// Wrap `data` and invoke `release` with it once the backend is done.
    pub fn with_release(data: Vec<u8>, release: impl FnOnce(Vec<u8>) + Send + 'static) -> Self {
        Self {
            data,
            release: Some(Box::new(release)),
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Drop for GpuMemory {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(std::mem::take(&mut self.data));
        }
    }
}

impl std::fmt::Debug for GpuMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuMemory")
            .field("len", &self.data.len())
            .field("release", &self.release.is_some())
            .finish()
    }
}

/// Dimensionality of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureShape {
    D2 {
        width: u32,
        height: u32,
        num_layers: u32,
    },
    D3 {
        width: u32,
        height: u32,
        depth: u32,
    },
    Cube {
        size: u32,
        num_layers: u32,
    },
}

impl TextureShape {
    pub fn width(&self) -> u32 {
        match *self {
            Self::D2 { width, .. } | Self::D3 { width, .. } => width,
            Self::Cube { size, .. } => size,
        }
    }

    pub fn height(&self) -> u32 {
        match *self {
            Self::D2 { height, .. } | Self::D3 { height, .. } => height,
            Self::Cube { size, .. } => size,
        }
    }

    pub fn depth(&self) -> u32 {
        match *self {
            Self::D3 { depth, .. } => depth,
            _ => 1,
        }
    }

    pub fn num_layers(&self) -> u32 {
        match *self {
            Self::D2 { num_layers, .. } | Self::Cube { num_layers, .. } => num_layers.max(1),
            Self::D3 { .. } => 1,
        }
    }

    pub fn is_cube(&self) -> bool {
        matches!(self, Self::Cube { .. })
    }
}

/// Everything the backend needs to create a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureCreateInfo {
    pub shape: TextureShape,
    /// Mip levels present in the payload. 1 means no mip chain.
    pub num_mips: u32,
    pub format: PixelFormat,
    pub flags: TextureFlags,
}

impl TextureCreateInfo {
    pub fn new_2d(width: u32, height: u32, format: PixelFormat, flags: TextureFlags) -> Self {
        Self {
            shape: TextureShape::D2 {
                width,
                height,
                num_layers: 1,
            },
            num_mips: 1,
            format,
            flags,
        }
    }

    pub fn has_mips(&self) -> bool {
        self.num_mips > 1
    }

    /// Payload size in bytes: every mip of every layer (and face, for cubes).
    pub fn storage_size(&self) -> u64 {
        let s = &self.shape;
        let per_layer =
            self.format
                .mip_chain_size(s.width(), s.height(), s.depth(), self.num_mips);
        let faces = if s.is_cube() { 6 } else { 1 };
        per_layer * s.num_layers() as u64 * faces
    }
}

/// Type of a shader uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Sampler,
    Vec4,
    Mat3,
    Mat4,
}

/// Value assigned to a non-sampler uniform for the next draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            Self::Vec4(_) => UniformKind::Vec4,
            Self::Mat3(_) => UniformKind::Mat3,
            Self::Mat4(_) => UniformKind::Mat4,
        }
    }

    pub fn as_vec4(&self) -> Option<Vec4> {
        match *self {
            Self::Vec4(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_mat3(&self) -> Option<Mat3> {
        match *self {
            Self::Mat3(m) => Some(m),
            _ => None,
        }
    }
}

/// A shader program: named shader pair plus its declared interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramDesc {
    pub shader: String,
    pub layout: VertexLayout,
    /// Non-sampler uniforms, in declaration order.
    pub uniforms: Vec<UniformHandle>,
    /// Samplers, in stage order.
    pub samplers: Vec<UniformHandle>,
    /// Color target formats the program writes, in attachment order.
    pub targets: Vec<PixelFormat>,
    pub depth: Option<PixelFormat>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    #[default]
    Back,
}

/// Fixed-function state of the next draw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DrawState {
    pub cull: CullMode,
}

/// Clear values applied when a view's frame buffer is first touched in a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewClear {
    pub color: [f32; 4],
    pub depth: f32,
}

impl Default for ViewClear {
    fn default() -> Self {
        Self {
            color: [0.0; 4],
            depth: 1.0,
        }
    }
}

/// Longest prefix of `name` that fits in `max` bytes without splitting a
/// character.
pub fn truncate_name(name: &str, max: Option<usize>) -> &str {
    let Some(max) = max else { return name };
    if name.len() <= max {
        return name;
    }
    let mut end = max;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// Renderer-agnostic GPU interface.
///
/// Implementations must be safe to call from any thread. Creation calls
/// return opaque handles; an error means nothing was created and any
/// [`GpuMemory`] passed in has been released.
pub trait GpuBackend: Send + Sync {
    fn create_texture(
        &self,
        info: &TextureCreateInfo,
        mem: Option<GpuMemory>,
    ) -> Result<TextureHandle, RenderError>;

    /// Whether a texture with this description could be created.
    fn is_texture_supported(&self, info: &TextureCreateInfo) -> bool;

    fn set_texture_name(&self, texture: TextureHandle, name: &str);

    /// Longest debug name the backend accepts, in bytes. `None` means unbounded.
    fn max_name_len(&self) -> Option<usize> {
        None
    }

    fn destroy_texture(&self, texture: TextureHandle);

    /// Create a frame buffer from render-target textures. The last attachment
    /// is treated as depth when its format is a depth format.
    fn create_frame_buffer(
        &self,
        attachments: &[TextureHandle],
    ) -> Result<FrameBufferHandle, RenderError>;

    fn destroy_frame_buffer(&self, frame_buffer: FrameBufferHandle);

    fn create_uniform(&self, name: &str, kind: UniformKind) -> Result<UniformHandle, RenderError>;

    fn destroy_uniform(&self, uniform: UniformHandle);

    fn create_program(&self, desc: &ProgramDesc) -> Result<ProgramHandle, RenderError>;

    fn destroy_program(&self, program: ProgramHandle);

    fn create_geometry(
        &self,
        layout: &VertexLayout,
        vertices: &[u8],
        indices: &[u32],
    ) -> Result<GeometryHandle, RenderError>;

    fn destroy_geometry(&self, geometry: GeometryHandle);

    fn set_view_frame_buffer(&self, view: ViewId, frame_buffer: FrameBufferHandle);

    fn set_view_rect(&self, view: ViewId, width: u32, height: u32);

    fn set_view_clear(&self, view: ViewId, clear: ViewClear);

    fn set_view_transform(&self, view: ViewId, view_matrix: Mat4, projection: Mat4);

    /// Model matrix of the next draw.
    fn set_transform(&self, model: Mat4);

    fn set_uniform(&self, uniform: UniformHandle, value: UniformValue);

    fn set_texture(&self, stage: u8, sampler: UniformHandle, texture: TextureHandle);

    fn set_state(&self, state: DrawState);

    /// Record a draw of `geometry` with `program` into `view` and reset the
    /// per-draw state.
    fn submit(&self, view: ViewId, program: ProgramHandle, geometry: GeometryHandle);

    /// Execute all submitted draws. Returns the number of the finished frame.
    fn frame(&self) -> Result<u64, RenderError>;
}
