//! A GPU backend that creates nothing on a device and records every call.
//!
//! Used by the CLI when no adapter is requested and by tests to observe what
//! the cache and the G-buffer pass hand to the GPU.

use crate::backend::{
    DrawState, GpuBackend, GpuMemory, ProgramDesc, TextureCreateInfo, UniformKind, UniformValue,
    ViewClear, truncate_name,
};
use crate::error::RenderError;
use crate::vertex::VertexLayout;
use glam::Mat4;
use lumen_common::{
    FrameBufferHandle, GeometryHandle, PixelFormat, ProgramHandle, TextureFlags, TextureHandle,
    UniformHandle, ViewId,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};

/// A texture as the headless backend stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureRecord {
    pub info: TextureCreateInfo,
    pub name: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformRecord {
    pub name: String,
    pub kind: UniformKind,
}

/// View configuration as last set.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewRecord {
    pub frame_buffer: FrameBufferHandle,
    pub width: u32,
    pub height: u32,
    pub clear: Option<ViewClear>,
    pub view_matrix: Mat4,
    pub projection: Mat4,
}

/// Snapshot of the per-draw state at the time of a submit.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub view: ViewId,
    pub program: ProgramHandle,
    pub geometry: GeometryHandle,
    pub transform: Mat4,
    pub state: DrawState,
    pub uniforms: HashMap<UniformHandle, UniformValue>,
    /// Bound textures by stage: (sampler, texture).
    pub textures: BTreeMap<u8, (UniformHandle, TextureHandle)>,
}

impl Submission {
    pub fn uniform(&self, uniform: UniformHandle) -> Option<UniformValue> {
        self.uniforms.get(&uniform).copied()
    }

    pub fn texture_at(&self, stage: u8) -> Option<TextureHandle> {
        self.textures.get(&stage).map(|(_, t)| *t)
    }
}

#[derive(Debug, Default)]
struct PendingDraw {
    transform: Option<Mat4>,
    state: DrawState,
    uniforms: HashMap<UniformHandle, UniformValue>,
    textures: BTreeMap<u8, (UniformHandle, TextureHandle)>,
}

#[derive(Debug, Default)]
struct State {
    next_texture: u32,
    next_frame_buffer: u32,
    next_uniform: u32,
    next_program: u32,
    next_geometry: u32,
    textures: HashMap<TextureHandle, TextureRecord>,
    textures_created: usize,
    frame_buffers: HashMap<FrameBufferHandle, Vec<TextureHandle>>,
    uniforms: HashMap<UniformHandle, UniformRecord>,
    programs: HashMap<ProgramHandle, ProgramDesc>,
    geometries: HashMap<GeometryHandle, (u32, usize)>,
    views: BTreeMap<ViewId, ViewRecord>,
    pending: PendingDraw,
    submissions: Vec<Submission>,
    frame: u64,
}

/// Recording, device-free [`GpuBackend`].
///
/// Every format is supported unless listed with
/// [`with_unsupported`](Self::with_unsupported); compressed render targets
/// and layer counts above the limit are always rejected.
#[derive(Debug)]
pub struct HeadlessBackend {
    state: Mutex<State>,
    unsupported: HashSet<PixelFormat>,
    max_layers: u32,
    max_name_len: Option<usize>,
    max_uniforms: Option<usize>,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            unsupported: HashSet::new(),
            max_layers: 256,
            max_name_len: None,
            max_uniforms: None,
        }
    }

    /// Report the given formats as unsupported for 2D sampling.
    pub fn with_unsupported(mut self, formats: &[PixelFormat]) -> Self {
        self.unsupported.extend(formats.iter().copied());
        self
    }

    pub fn with_max_layers(mut self, max_layers: u32) -> Self {
        self.max_layers = max_layers;
        self
    }

    pub fn with_max_name_len(mut self, len: usize) -> Self {
        self.max_name_len = Some(len);
        self
    }

    /// Fail `create_uniform` once this many uniforms are alive.
    pub fn with_max_uniforms(mut self, max: usize) -> Self {
        self.max_uniforms = Some(max);
        self
    }

    pub fn texture(&self, texture: TextureHandle) -> Option<TextureRecord> {
        self.state.lock().textures.get(&texture).cloned()
    }

    /// Textures currently alive.
    pub fn live_textures(&self) -> usize {
        self.state.lock().textures.len()
    }

    /// Textures ever created, including destroyed ones.
    pub fn textures_created(&self) -> usize {
        self.state.lock().textures_created
    }

    pub fn frame_buffer(&self, frame_buffer: FrameBufferHandle) -> Option<Vec<TextureHandle>> {
        self.state.lock().frame_buffers.get(&frame_buffer).cloned()
    }

    pub fn live_frame_buffers(&self) -> usize {
        self.state.lock().frame_buffers.len()
    }

    pub fn uniform_by_name(&self, name: &str) -> Option<UniformHandle> {
        self.state
            .lock()
            .uniforms
            .iter()
            .find(|(_, u)| u.name == name)
            .map(|(h, _)| *h)
    }

    pub fn program(&self, program: ProgramHandle) -> Option<ProgramDesc> {
        self.state.lock().programs.get(&program).cloned()
    }

    pub fn live_programs(&self) -> usize {
        self.state.lock().programs.len()
    }

    pub fn live_uniforms(&self) -> usize {
        self.state.lock().uniforms.len()
    }

    pub fn view(&self, view: ViewId) -> Option<ViewRecord> {
        self.state.lock().views.get(&view).copied()
    }

    /// Draws submitted since the last [`frame`](GpuBackend::frame).
    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().submissions.clone()
    }

    pub fn frame_count(&self) -> u64 {
        self.state.lock().frame
    }
}

fn allocate(counter: &mut u32) -> u32 {
    let id = *counter;
    *counter += 1;
    id
}

impl GpuBackend for HeadlessBackend {
    fn create_texture(
        &self,
        info: &TextureCreateInfo,
        mem: Option<GpuMemory>,
    ) -> Result<TextureHandle, RenderError> {
        if info.shape.width() == 0 || info.shape.height() == 0 {
            return Err(RenderError::UnsupportedTexture {
                format: info.format,
                reason: "zero-sized texture",
            });
        }
        if info.shape.num_layers() > self.max_layers {
            return Err(RenderError::UnsupportedTexture {
                format: info.format,
                reason: "too many layers",
            });
        }
        let data = match mem {
            Some(mem) => {
                let expected = info.storage_size();
                if mem.len() as u64 != expected {
                    return Err(RenderError::SizeMismatch {
                        expected,
                        actual: mem.len() as u64,
                    });
                }
                mem.as_slice().to_vec()
            }
            None => Vec::new(),
        };

        let mut state = self.state.lock();
        let handle = TextureHandle::new(allocate(&mut state.next_texture));
        state.textures.insert(
            handle,
            TextureRecord {
                info: *info,
                name: None,
                data,
            },
        );
        state.textures_created += 1;
        Ok(handle)
    }

    fn is_texture_supported(&self, info: &TextureCreateInfo) -> bool {
        if self.unsupported.contains(&info.format) {
            return false;
        }
        if info.flags.contains(TextureFlags::RENDER_TARGET) && info.format.is_compressed() {
            return false;
        }
        info.shape.num_layers() <= self.max_layers
    }

    fn set_texture_name(&self, texture: TextureHandle, name: &str) {
        if let Some(record) = self.state.lock().textures.get_mut(&texture) {
            record.name = Some(truncate_name(name, self.max_name_len).to_owned());
        }
    }

    fn max_name_len(&self) -> Option<usize> {
        self.max_name_len
    }

    fn destroy_texture(&self, texture: TextureHandle) {
        self.state.lock().textures.remove(&texture);
    }

    fn create_frame_buffer(
        &self,
        attachments: &[TextureHandle],
    ) -> Result<FrameBufferHandle, RenderError> {
        if attachments.is_empty() {
            return Err(RenderError::EmptyFrameBuffer);
        }
        let mut state = self.state.lock();
        if attachments.iter().any(|t| !state.textures.contains_key(t)) {
            return Err(RenderError::InvalidHandle { kind: "texture" });
        }
        let handle = FrameBufferHandle::new(allocate(&mut state.next_frame_buffer));
        state.frame_buffers.insert(handle, attachments.to_vec());
        Ok(handle)
    }

    fn destroy_frame_buffer(&self, frame_buffer: FrameBufferHandle) {
        self.state.lock().frame_buffers.remove(&frame_buffer);
    }

    fn create_uniform(&self, name: &str, kind: UniformKind) -> Result<UniformHandle, RenderError> {
        let mut state = self.state.lock();
        if self.max_uniforms.is_some_and(|max| state.uniforms.len() >= max) {
            return Err(RenderError::Device(format!("uniform limit reached creating {name}")));
        }
        let handle = UniformHandle::new(allocate(&mut state.next_uniform));
        state.uniforms.insert(
            handle,
            UniformRecord {
                name: name.to_owned(),
                kind,
            },
        );
        Ok(handle)
    }

    fn destroy_uniform(&self, uniform: UniformHandle) {
        self.state.lock().uniforms.remove(&uniform);
    }

    fn create_program(&self, desc: &ProgramDesc) -> Result<ProgramHandle, RenderError> {
        let mut state = self.state.lock();
        let mut declared = desc.uniforms.iter().chain(&desc.samplers);
        if declared.any(|u| !state.uniforms.contains_key(u)) {
            return Err(RenderError::InvalidHandle { kind: "uniform" });
        }
        let handle = ProgramHandle::new(allocate(&mut state.next_program));
        state.programs.insert(handle, desc.clone());
        Ok(handle)
    }

    fn destroy_program(&self, program: ProgramHandle) {
        self.state.lock().programs.remove(&program);
    }

    fn create_geometry(
        &self,
        layout: &VertexLayout,
        vertices: &[u8],
        indices: &[u32],
    ) -> Result<GeometryHandle, RenderError> {
        let stride = layout.stride() as usize;
        if stride == 0 || vertices.len() % stride != 0 {
            return Err(RenderError::SizeMismatch {
                expected: stride as u64,
                actual: vertices.len() as u64,
            });
        }
        let mut state = self.state.lock();
        let handle = GeometryHandle::new(allocate(&mut state.next_geometry));
        state
            .geometries
            .insert(handle, ((vertices.len() / stride) as u32, indices.len()));
        Ok(handle)
    }

    fn destroy_geometry(&self, geometry: GeometryHandle) {
        self.state.lock().geometries.remove(&geometry);
    }

    fn set_view_frame_buffer(&self, view: ViewId, frame_buffer: FrameBufferHandle) {
        self.state.lock().views.entry(view).or_default().frame_buffer = frame_buffer;
    }

    fn set_view_rect(&self, view: ViewId, width: u32, height: u32) {
        let mut state = self.state.lock();
        let record = state.views.entry(view).or_default();
        record.width = width;
        record.height = height;
    }

    fn set_view_clear(&self, view: ViewId, clear: ViewClear) {
        self.state.lock().views.entry(view).or_default().clear = Some(clear);
    }

    fn set_view_transform(&self, view: ViewId, view_matrix: Mat4, projection: Mat4) {
        let mut state = self.state.lock();
        let record = state.views.entry(view).or_default();
        record.view_matrix = view_matrix;
        record.projection = projection;
    }

    fn set_transform(&self, model: Mat4) {
        self.state.lock().pending.transform = Some(model);
    }

    fn set_uniform(&self, uniform: UniformHandle, value: UniformValue) {
        self.state.lock().pending.uniforms.insert(uniform, value);
    }

    fn set_texture(&self, stage: u8, sampler: UniformHandle, texture: TextureHandle) {
        self.state
            .lock()
            .pending
            .textures
            .insert(stage, (sampler, texture));
    }

    fn set_state(&self, state: DrawState) {
        self.state.lock().pending.state = state;
    }

    fn submit(&self, view: ViewId, program: ProgramHandle, geometry: GeometryHandle) {
        let mut state = self.state.lock();
        let pending = std::mem::take(&mut state.pending);
        state.submissions.push(Submission {
            view,
            program,
            geometry,
            transform: pending.transform.unwrap_or(Mat4::IDENTITY),
            state: pending.state,
            uniforms: pending.uniforms,
            textures: pending.textures,
        });
    }

    fn frame(&self) -> Result<u64, RenderError> {
        let mut state = self.state.lock();
        let submitted = state.submissions.len();
        state.submissions.clear();
        state.frame += 1;
        tracing::trace!(frame = state.frame, submitted, "headless frame");
        Ok(state.frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn rgba_1x1() -> TextureCreateInfo {
        TextureCreateInfo::new_2d(1, 1, PixelFormat::Rgba8, TextureFlags::empty())
    }

    #[test]
    fn create_and_destroy_texture() {
        let backend = HeadlessBackend::new();
        let t = backend
            .create_texture(&rgba_1x1(), Some(GpuMemory::copy(&[255; 4])))
            .unwrap();
        assert!(t.is_valid());
        assert_eq!(backend.texture(t).unwrap().data, vec![255; 4]);
        backend.destroy_texture(t);
        assert_eq!(backend.live_textures(), 0);
        assert_eq!(backend.textures_created(), 1);
    }

    #[test]
    fn wrong_payload_size_is_rejected() {
        let backend = HeadlessBackend::new();
        let err = backend
            .create_texture(&rgba_1x1(), Some(GpuMemory::copy(&[0; 3])))
            .unwrap_err();
        assert!(matches!(err, RenderError::SizeMismatch { expected: 4, actual: 3 }));
        assert_eq!(backend.live_textures(), 0);
    }

    #[test]
    fn names_are_truncated_to_limit() {
        let backend = HeadlessBackend::new().with_max_name_len(4);
        let t = backend.create_texture(&rgba_1x1(), None).unwrap();
        backend.set_texture_name(t, "abcdefgh");
        assert_eq!(backend.texture(t).unwrap().name.as_deref(), Some("abcd"));
    }

    #[test]
    fn unsupported_formats_are_reported() {
        let backend = HeadlessBackend::new().with_unsupported(&[PixelFormat::Bc7]);
        let mut info = rgba_1x1();
        assert!(backend.is_texture_supported(&info));
        info.format = PixelFormat::Bc7;
        assert!(!backend.is_texture_supported(&info));
    }

    #[test]
    fn submit_snapshots_and_resets_draw_state() {
        let backend = HeadlessBackend::new();
        let u = backend.create_uniform("u_color", UniformKind::Vec4).unwrap();
        backend.set_uniform(u, UniformValue::Vec4(Vec4::ONE));
        backend.set_texture(0, u, TextureHandle::new(3));
        backend.submit(ViewId(0), ProgramHandle::new(0), GeometryHandle::new(0));
        backend.submit(ViewId(0), ProgramHandle::new(0), GeometryHandle::new(1));

        let subs = backend.submissions();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].uniform(u), Some(UniformValue::Vec4(Vec4::ONE)));
        assert_eq!(subs[0].texture_at(0), Some(TextureHandle::new(3)));
        assert!(subs[1].uniforms.is_empty());
        assert!(subs[1].textures.is_empty());

        assert_eq!(backend.frame().unwrap(), 1);
        assert!(backend.submissions().is_empty());
    }

    #[test]
    fn frame_buffer_requires_live_attachments() {
        let backend = HeadlessBackend::new();
        assert!(matches!(
            backend.create_frame_buffer(&[]),
            Err(RenderError::EmptyFrameBuffer)
        ));
        assert!(backend.create_frame_buffer(&[TextureHandle::new(9)]).is_err());
        let t = backend.create_texture(&rgba_1x1(), None).unwrap();
        let fb = backend.create_frame_buffer(&[t]).unwrap();
        assert_eq!(backend.frame_buffer(fb), Some(vec![t]));
    }
}
