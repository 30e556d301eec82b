use crate::format::{sampler_descriptor, texture_extent, texture_format, texture_usages, vertex_format};
use crate::shaders;
use glam::Mat4;
use lumen_common::{
    FrameBufferHandle, GeometryHandle, ProgramHandle, TextureFlags, TextureHandle, UniformHandle,
    ViewId,
};
use lumen_render::{
    CullMode, DrawState, GpuBackend, GpuMemory, ProgramDesc, RenderError, TextureCreateInfo,
    UniformKind, UniformValue, VertexLayout, ViewClear,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU64;
use wgpu::util::DeviceExt;

/// Bytes the backend prepends to every draw block: model and view-projection.
pub const DRAW_BLOCK_PREFIX: u64 = 128;

/// std140 size of a uniform in the draw block.
pub fn uniform_size(kind: UniformKind) -> u64 {
    match kind {
        UniformKind::Sampler => 0,
        UniformKind::Vec4 => 16,
        UniformKind::Mat3 => 48,
        UniformKind::Mat4 => 64,
    }
}

/// Offsets of declared uniforms in the draw block, and the block size.
pub fn block_layout(kinds: &[UniformKind]) -> (Vec<u64>, u64) {
    let mut offset = DRAW_BLOCK_PREFIX;
    let offsets = kinds
        .iter()
        .map(|kind| {
            let at = offset;
            offset += uniform_size(*kind);
            at
        })
        .collect();
    (offsets, offset)
}

/// Write `value` at `offset`. A mat3 is stored as three vec4 columns.
pub fn write_uniform(block: &mut [u8], offset: usize, value: &UniformValue) {
    match value {
        UniformValue::Vec4(v) => {
            block[offset..offset + 16].copy_from_slice(bytemuck::bytes_of(&v.to_array()));
        }
        UniformValue::Mat3(m) => {
            for (i, column) in [m.x_axis, m.y_axis, m.z_axis].into_iter().enumerate() {
                let at = offset + i * 16;
                let padded = column.extend(0.0).to_array();
                block[at..at + 16].copy_from_slice(bytemuck::bytes_of(&padded));
            }
        }
        UniformValue::Mat4(m) => {
            block[offset..offset + 64].copy_from_slice(bytemuck::bytes_of(&m.to_cols_array()));
        }
    }
}

pub fn align_to(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment.max(1)) * alignment.max(1)
}

struct TextureEntry {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    info: TextureCreateInfo,
    format: wgpu::TextureFormat,
    view_dimension: wgpu::TextureViewDimension,
    name: Option<String>,
}

struct FrameBufferEntry {
    color: Vec<TextureHandle>,
    depth: Option<TextureHandle>,
}

struct ProgramEntry {
    desc: ProgramDesc,
    module: wgpu::ShaderModule,
    draw_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    offsets: HashMap<UniformHandle, (u64, UniformKind)>,
    block_size: u64,
}

struct GeometryEntry {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct ViewState {
    frame_buffer: FrameBufferHandle,
    width: u32,
    height: u32,
    clear: Option<ViewClear>,
    view_proj: Mat4,
}

#[derive(Default)]
struct PendingDraw {
    transform: Mat4,
    state: DrawState,
    uniforms: HashMap<UniformHandle, UniformValue>,
    textures: BTreeMap<u8, TextureHandle>,
}

struct RecordedDraw {
    view: ViewId,
    program: ProgramHandle,
    geometry: GeometryHandle,
    draw: PendingDraw,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramHandle,
    color: Vec<wgpu::TextureFormat>,
    depth: Option<wgpu::TextureFormat>,
    cull: CullMode,
}

struct PreparedDraw {
    key: PipelineKey,
    geometry: GeometryHandle,
    offset: u32,
    textures: wgpu::BindGroup,
}

#[derive(Default)]
struct State {
    next_id: u32,
    textures: HashMap<TextureHandle, TextureEntry>,
    frame_buffers: HashMap<FrameBufferHandle, FrameBufferEntry>,
    uniforms: HashMap<UniformHandle, (String, UniformKind)>,
    programs: HashMap<ProgramHandle, ProgramEntry>,
    geometries: HashMap<GeometryHandle, GeometryEntry>,
    views: BTreeMap<ViewId, ViewState>,
    pending: PendingDraw,
    draws: Vec<RecordedDraw>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    frame: u64,
}

impl State {
    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// [`GpuBackend`] on a wgpu device.
///
/// Draws are recorded at `submit` and encoded at `frame`: one render pass per
/// view, pipelines cached per program, target formats and cull mode, and all
/// draw blocks of a view packed into one uniform buffer addressed with
/// dynamic offsets.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter: wgpu::AdapterInfo,
    state: Mutex<State>,
    /// Error scopes are a device-wide stack. Every push/pop pair runs under
    /// this lock so concurrent callers never read each other's errors.
    scope: Mutex<()>,
    fallback: FallbackTexture,
}

/// 1x1 opaque white texture bound to sampler stages whose texture cannot be
/// sampled.
struct FallbackTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

impl FallbackTexture {
    fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("lumen_fallback_texture"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &[255; 4],
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&sampler_descriptor(TextureFlags::empty()));
        Self {
            _texture: texture,
            view,
            sampler,
        }
    }
}

/// Why a bound texture cannot fill a filterable 2D sampler stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleRejection {
    /// The handle is invalid or was destroyed.
    Missing,
    /// Cube, array or volume view.
    NotPlain2d,
    /// Integer, depth or unfilterable float format.
    NotFilterable,
}

/// Check a bound texture, given as its view dimension and sample type,
/// against a filterable 2D sampler stage. `None` means it can be bound.
pub fn sample_rejection(
    bound: Option<(wgpu::TextureViewDimension, Option<wgpu::TextureSampleType>)>,
) -> Option<SampleRejection> {
    match bound {
        None => Some(SampleRejection::Missing),
        Some((dimension, _)) if dimension != wgpu::TextureViewDimension::D2 => {
            Some(SampleRejection::NotPlain2d)
        }
        Some((_, Some(wgpu::TextureSampleType::Float { filterable: true }))) => None,
        Some(_) => Some(SampleRejection::NotFilterable),
    }
}

impl WgpuBackend {
    /// Open the best available adapter without a surface.
    pub fn new_headless() -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| RenderError::Device("no suitable GPU adapter".into()))?;

        let optional = wgpu::Features::TEXTURE_COMPRESSION_BC
            | wgpu::Features::TEXTURE_FORMAT_16BIT_NORM
            | wgpu::Features::FLOAT32_FILTERABLE;
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("lumen_device"),
                required_features: adapter.features() & optional,
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .map_err(|e| RenderError::Device(e.to_string()))?;

        Ok(Self::from_device(device, queue, adapter.get_info()))
    }

    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue, adapter: wgpu::AdapterInfo) -> Self {
        tracing::info!(adapter = %adapter.name, backend = ?adapter.backend, "wgpu backend ready");
        let fallback = FallbackTexture::new(&device, &queue);
        Self {
            device,
            queue,
            adapter,
            state: Mutex::new(State::default()),
            scope: Mutex::new(()),
            fallback,
        }
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Debug name recorded for a texture. wgpu labels are fixed at creation,
    /// so names are kept here.
    pub fn texture_name(&self, texture: TextureHandle) -> Option<String> {
        self.state
            .lock()
            .textures
            .get(&texture)
            .and_then(|t| t.name.clone())
    }

    /// Run `f` inside a validation error scope and turn a captured error
    /// into [`RenderError::Device`].
    fn validated<T>(&self, f: impl FnOnce() -> T) -> Result<T, RenderError> {
        let _scope = self.scope.lock();
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f();
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(RenderError::Device(err.to_string())),
            None => Ok(value),
        }
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    program: &ProgramEntry,
    key: &PipelineKey,
) -> wgpu::RenderPipeline {
    let layout = &program.desc.layout;
    let attributes: Vec<wgpu::VertexAttribute> = layout
        .attributes()
        .iter()
        .enumerate()
        .map(|(location, a)| wgpu::VertexAttribute {
            format: vertex_format(a.components),
            offset: a.offset as u64,
            shader_location: location as u32,
        })
        .collect();
    let targets: Vec<Option<wgpu::ColorTargetState>> = key
        .color
        .iter()
        .map(|format| {
            Some(wgpu::ColorTargetState {
                format: *format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })
        })
        .collect();

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(program.desc.shader.as_str()),
        layout: Some(&program.pipeline_layout),
        vertex: wgpu::VertexState {
            module: &program.module,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: layout.stride() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &attributes,
            }],
        },
        fragment: Some(wgpu::FragmentState {
            module: &program.module,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &targets,
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: match key.cull {
                CullMode::None => None,
                CullMode::Back => Some(wgpu::Face::Back),
            },
            ..Default::default()
        },
        depth_stencil: key.depth.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: Default::default(),
        multiview: None,
        cache: None,
    })
}

/// One texture/sampler pair per declared sampler. A stage whose texture
/// cannot be sampled gets the fallback texture instead.
fn texture_bind_group(
    device: &wgpu::Device,
    fallback: &FallbackTexture,
    program: &ProgramEntry,
    textures: &HashMap<TextureHandle, TextureEntry>,
    bound: &BTreeMap<u8, TextureHandle>,
) -> wgpu::BindGroup {
    let features = device.features();
    let mut entries = Vec::with_capacity(program.desc.samplers.len() * 2);
    for stage in 0..program.desc.samplers.len() {
        let handle = bound
            .get(&(stage as u8))
            .copied()
            .unwrap_or(TextureHandle::INVALID);
        let texture = textures.get(&handle);
        let rejection = sample_rejection(
            texture.map(|t| (t.view_dimension, t.format.sample_type(None, Some(features)))),
        );
        let (view, sampler) = match (texture, rejection) {
            (Some(t), None) => (&t.view, &t.sampler),
            (_, reason) => {
                tracing::warn!(stage, ?handle, ?reason, "binding fallback texture");
                (&fallback.view, &fallback.sampler)
            }
        };
        let binding = stage as u32 * 2;
        entries.push(wgpu::BindGroupEntry {
            binding,
            resource: wgpu::BindingResource::TextureView(view),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: binding + 1,
            resource: wgpu::BindingResource::Sampler(sampler),
        });
    }
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("draw_textures"),
        layout: &program.texture_layout,
        entries: &entries,
    })
}

fn draw_block(program: &ProgramEntry, view_proj: Mat4, draw: &PendingDraw) -> Vec<u8> {
    let mut block = vec![0u8; program.block_size as usize];
    write_uniform(&mut block, 0, &UniformValue::Mat4(draw.transform));
    write_uniform(&mut block, 64, &UniformValue::Mat4(view_proj));
    for (handle, value) in &draw.uniforms {
        match program.offsets.get(handle) {
            Some(&(offset, kind)) if kind == value.kind() => {
                write_uniform(&mut block, offset as usize, value)
            }
            Some(_) => tracing::warn!(?handle, "uniform value does not match its declared type"),
            None => {}
        }
    }
    block
}

fn load_ops(clear: Option<ViewClear>) -> (wgpu::LoadOp<wgpu::Color>, wgpu::LoadOp<f32>) {
    match clear {
        Some(c) => (
            wgpu::LoadOp::Clear(wgpu::Color {
                r: c.color[0] as f64,
                g: c.color[1] as f64,
                b: c.color[2] as f64,
                a: c.color[3] as f64,
            }),
            wgpu::LoadOp::Clear(c.depth),
        ),
        None => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
    }
}

impl GpuBackend for WgpuBackend {
    fn create_texture(
        &self,
        info: &TextureCreateInfo,
        mem: Option<GpuMemory>,
    ) -> Result<TextureHandle, RenderError> {
        if !self.is_texture_supported(info) {
            return Err(RenderError::UnsupportedTexture {
                format: info.format,
                reason: "not supported by the device",
            });
        }
        if let Some(mem) = &mem {
            let expected = info.storage_size();
            if mem.len() as u64 != expected {
                return Err(RenderError::SizeMismatch {
                    expected,
                    actual: mem.len() as u64,
                });
            }
        }

        let format = texture_format(info.format, info.flags);
        let (size, dimension, view_dimension) = texture_extent(&info.shape);
        let desc = wgpu::TextureDescriptor {
            label: None,
            size,
            mip_level_count: info.num_mips.max(1),
            sample_count: 1,
            dimension,
            format,
            usage: texture_usages(info.flags, format),
            view_formats: &[],
        };
        let (texture, view, sampler) = self.validated(|| {
            let texture = match mem {
                Some(mem) => self.device.create_texture_with_data(
                    &self.queue,
                    &desc,
                    wgpu::util::TextureDataOrder::LayerMajor,
                    mem.as_slice(),
                ),
                None => self.device.create_texture(&desc),
            };
            let view = texture.create_view(&wgpu::TextureViewDescriptor {
                dimension: Some(view_dimension),
                ..Default::default()
            });
            let sampler = self.device.create_sampler(&sampler_descriptor(info.flags));
            (texture, view, sampler)
        })?;

        let mut state = self.state.lock();
        let handle = TextureHandle::new(state.allocate());
        state.textures.insert(
            handle,
            TextureEntry {
                texture,
                view,
                sampler,
                info: *info,
                format,
                view_dimension,
                name: None,
            },
        );
        Ok(handle)
    }

    fn is_texture_supported(&self, info: &TextureCreateInfo) -> bool {
        let format = texture_format(info.format, info.flags);
        if !self.device.features().contains(format.required_features()) {
            return false;
        }
        if info.flags.contains(TextureFlags::RENDER_TARGET) && format.is_compressed() {
            return false;
        }
        let limits = self.device.limits();
        let (size, dimension, _) = texture_extent(&info.shape);
        match dimension {
            wgpu::TextureDimension::D3 => {
                size.width.max(size.height).max(size.depth_or_array_layers)
                    <= limits.max_texture_dimension_3d
            }
            _ => {
                size.width.max(size.height) <= limits.max_texture_dimension_2d
                    && size.depth_or_array_layers <= limits.max_texture_array_layers
            }
        }
    }

    fn set_texture_name(&self, texture: TextureHandle, name: &str) {
        if let Some(entry) = self.state.lock().textures.get_mut(&texture) {
            entry.name = Some(name.to_owned());
        }
    }

    fn destroy_texture(&self, texture: TextureHandle) {
        if let Some(entry) = self.state.lock().textures.remove(&texture) {
            entry.texture.destroy();
        }
    }

    fn create_frame_buffer(
        &self,
        attachments: &[TextureHandle],
    ) -> Result<FrameBufferHandle, RenderError> {
        if attachments.is_empty() {
            return Err(RenderError::EmptyFrameBuffer);
        }
        let mut state = self.state.lock();
        let mut color = Vec::with_capacity(attachments.len());
        let mut depth = None;
        for (i, handle) in attachments.iter().enumerate() {
            let entry = state
                .textures
                .get(handle)
                .ok_or(RenderError::InvalidHandle { kind: "texture" })?;
            if !entry
                .texture
                .usage()
                .contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
            {
                return Err(RenderError::UnsupportedTexture {
                    format: entry.info.format,
                    reason: "not created as a render target",
                });
            }
            if entry.format.is_depth_stencil_format() {
                if i + 1 != attachments.len() {
                    return Err(RenderError::UnsupportedTexture {
                        format: entry.info.format,
                        reason: "depth attachment must come last",
                    });
                }
                depth = Some(*handle);
            } else {
                color.push(*handle);
            }
        }
        let handle = FrameBufferHandle::new(state.allocate());
        state
            .frame_buffers
            .insert(handle, FrameBufferEntry { color, depth });
        Ok(handle)
    }

    fn destroy_frame_buffer(&self, frame_buffer: FrameBufferHandle) {
        self.state.lock().frame_buffers.remove(&frame_buffer);
    }

    fn create_uniform(&self, name: &str, kind: UniformKind) -> Result<UniformHandle, RenderError> {
        let mut state = self.state.lock();
        let handle = UniformHandle::new(state.allocate());
        state.uniforms.insert(handle, (name.to_owned(), kind));
        Ok(handle)
    }

    fn destroy_uniform(&self, uniform: UniformHandle) {
        self.state.lock().uniforms.remove(&uniform);
    }

    fn create_program(&self, desc: &ProgramDesc) -> Result<ProgramHandle, RenderError> {
        let source = shaders::source(&desc.shader)
            .ok_or_else(|| RenderError::UnknownProgram(desc.shader.clone()))?;

        let mut state = self.state.lock();
        let mut kinds = Vec::with_capacity(desc.uniforms.len());
        for uniform in &desc.uniforms {
            let (_, kind) = state
                .uniforms
                .get(uniform)
                .ok_or(RenderError::InvalidHandle { kind: "uniform" })?;
            kinds.push(*kind);
        }
        if desc.samplers.iter().any(|s| !state.uniforms.contains_key(s)) {
            return Err(RenderError::InvalidHandle { kind: "sampler" });
        }
        let (offsets, block_size) = block_layout(&kinds);

        let device = &self.device;
        let (module, draw_layout, texture_layout, pipeline_layout) = self.validated(|| {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(desc.shader.as_str()),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
            let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("draw_block_layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: NonZeroU64::new(block_size),
                    },
                    count: None,
                }],
            });
            let texture_entries: Vec<wgpu::BindGroupLayoutEntry> = (0..desc.samplers.len() as u32)
                .flat_map(|stage| {
                    [
                        wgpu::BindGroupLayoutEntry {
                            binding: stage * 2,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Texture {
                                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                                view_dimension: wgpu::TextureViewDimension::D2,
                                multisampled: false,
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: stage * 2 + 1,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                            count: None,
                        },
                    ]
                })
                .collect();
            let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("draw_texture_layout"),
                entries: &texture_entries,
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(desc.shader.as_str()),
                bind_group_layouts: &[&draw_layout, &texture_layout],
                push_constant_ranges: &[],
            });
            (module, draw_layout, texture_layout, pipeline_layout)
        })?;

        let offsets = desc
            .uniforms
            .iter()
            .zip(offsets)
            .zip(kinds)
            .map(|((handle, offset), kind)| (*handle, (offset, kind)))
            .collect();
        let handle = ProgramHandle::new(state.allocate());
        state.programs.insert(
            handle,
            ProgramEntry {
                desc: desc.clone(),
                module,
                draw_layout,
                texture_layout,
                pipeline_layout,
                offsets,
                block_size,
            },
        );
        tracing::debug!(shader = %desc.shader, block_size, "program created");
        Ok(handle)
    }

    fn destroy_program(&self, program: ProgramHandle) {
        let mut state = self.state.lock();
        state.programs.remove(&program);
        state.pipelines.retain(|key, _| key.program != program);
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
        let (vertex_buffer, index_buffer) = self.validated(|| {
            let vertices = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("vertices"),
                    contents: vertices,
                    usage: wgpu::BufferUsages::VERTEX,
                });
            let indices = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("indices"),
                    contents: bytemuck::cast_slice(indices),
                    usage: wgpu::BufferUsages::INDEX,
                });
            (vertices, indices)
        })?;
        let mut state = self.state.lock();
        let handle = GeometryHandle::new(state.allocate());
        state.geometries.insert(
            handle,
            GeometryEntry {
                vertices: vertex_buffer,
                indices: index_buffer,
                index_count: indices.len() as u32,
            },
        );
        Ok(handle)
    }

    fn destroy_geometry(&self, geometry: GeometryHandle) {
        if let Some(entry) = self.state.lock().geometries.remove(&geometry) {
            entry.vertices.destroy();
            entry.indices.destroy();
        }
    }

    fn set_view_frame_buffer(&self, view: ViewId, frame_buffer: FrameBufferHandle) {
        self.state.lock().views.entry(view).or_default().frame_buffer = frame_buffer;
    }

    fn set_view_rect(&self, view: ViewId, width: u32, height: u32) {
        let mut state = self.state.lock();
        let entry = state.views.entry(view).or_default();
        entry.width = width;
        entry.height = height;
    }

    fn set_view_clear(&self, view: ViewId, clear: ViewClear) {
        self.state.lock().views.entry(view).or_default().clear = Some(clear);
    }

    fn set_view_transform(&self, view: ViewId, view_matrix: Mat4, projection: Mat4) {
        self.state.lock().views.entry(view).or_default().view_proj = projection * view_matrix;
    }

    fn set_transform(&self, model: Mat4) {
        self.state.lock().pending.transform = model;
    }

    fn set_uniform(&self, uniform: UniformHandle, value: UniformValue) {
        self.state.lock().pending.uniforms.insert(uniform, value);
    }

    fn set_texture(&self, stage: u8, _sampler: UniformHandle, texture: TextureHandle) {
        self.state.lock().pending.textures.insert(stage, texture);
    }

    fn set_state(&self, state: DrawState) {
        self.state.lock().pending.state = state;
    }

    fn submit(&self, view: ViewId, program: ProgramHandle, geometry: GeometryHandle) {
        let mut state = self.state.lock();
        let draw = std::mem::take(&mut state.pending);
        state.draws.push(RecordedDraw {
            view,
            program,
            geometry,
            draw,
        });
    }

    fn frame(&self) -> Result<u64, RenderError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let draws = std::mem::take(&mut state.draws);
        let views: Vec<(ViewId, ViewState)> = state.views.iter().map(|(k, v)| (*k, *v)).collect();
        let alignment = self.device.limits().min_uniform_buffer_offset_alignment as u64;
        let mut drawn = 0usize;

        let _scope = self.scope.lock();
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lumen_frame"),
            });

        for (view_id, view) in views {
            let mut view_draws = draws.iter().filter(|d| d.view == view_id).peekable();
            if view_draws.peek().is_none() && view.clear.is_none() {
                continue;
            }
            let Some(fb) = state.frame_buffers.get(&view.frame_buffer) else {
                tracing::warn!(view = view_id.0, "view has no frame buffer, draws dropped");
                continue;
            };
            let color_formats: Vec<wgpu::TextureFormat> = fb
                .color
                .iter()
                .filter_map(|h| state.textures.get(h).map(|t| t.format))
                .collect();
            let depth_format = fb
                .depth
                .and_then(|h| state.textures.get(&h))
                .map(|t| t.format);

            let mut blocks: Vec<u8> = Vec::new();
            let mut prepared = Vec::new();
            for recorded in view_draws {
                let Some(program) = state.programs.get(&recorded.program) else {
                    tracing::warn!(program = ?recorded.program, "unknown program, draw skipped");
                    continue;
                };
                if !state.geometries.contains_key(&recorded.geometry) {
                    tracing::warn!(geometry = ?recorded.geometry, "unknown geometry, draw skipped");
                    continue;
                }
                let textures = texture_bind_group(
                    &self.device,
                    &self.fallback,
                    program,
                    &state.textures,
                    &recorded.draw.textures,
                );
                let key = PipelineKey {
                    program: recorded.program,
                    color: color_formats.clone(),
                    depth: depth_format,
                    cull: recorded.draw.state.cull,
                };
                if !state.pipelines.contains_key(&key) {
                    let pipeline = create_pipeline(&self.device, program, &key);
                    state.pipelines.insert(key.clone(), pipeline);
                }
                let offset = align_to(blocks.len() as u64, alignment);
                blocks.resize(offset as usize, 0);
                blocks.extend(draw_block(program, view.view_proj, &recorded.draw));
                prepared.push(PreparedDraw {
                    key,
                    geometry: recorded.geometry,
                    offset: offset as u32,
                    textures,
                });
            }

            let mut draw_groups: HashMap<ProgramHandle, wgpu::BindGroup> = HashMap::new();
            if !prepared.is_empty() {
                let buffer = self
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("draw_blocks"),
                        contents: &blocks,
                        usage: wgpu::BufferUsages::UNIFORM,
                    });
                for p in &prepared {
                    let Some(program) = state.programs.get(&p.key.program) else {
                        continue;
                    };
                    draw_groups.entry(p.key.program).or_insert_with(|| {
                        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                            label: Some("draw_block"),
                            layout: &program.draw_layout,
                            entries: &[wgpu::BindGroupEntry {
                                binding: 0,
                                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                                    buffer: &buffer,
                                    offset: 0,
                                    size: NonZeroU64::new(program.block_size),
                                }),
                            }],
                        })
                    });
                }
            }

            let (color_load, depth_load) = load_ops(view.clear);
            let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = fb
                .color
                .iter()
                .filter_map(|h| state.textures.get(h))
                .map(|t| {
                    Some(wgpu::RenderPassColorAttachment {
                        view: &t.view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: color_load,
                            store: wgpu::StoreOp::Store,
                        },
                    })
                })
                .collect();
            let depth_attachment = fb.depth.and_then(|h| state.textures.get(&h)).map(|t| {
                wgpu::RenderPassDepthStencilAttachment {
                    view: &t.view,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }
            });
            let target_size = fb
                .color
                .first()
                .and_then(|h| state.textures.get(h))
                .map(|t| (t.info.shape.width(), t.info.shape.height()))
                .unwrap_or((view.width, view.height));

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lumen_view"),
                color_attachments: &color_attachments,
                depth_stencil_attachment: depth_attachment,
                ..Default::default()
            });
            let width = view.width.clamp(1, target_size.0.max(1));
            let height = view.height.clamp(1, target_size.1.max(1));
            pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);

            for p in &prepared {
                let (Some(pipeline), Some(geometry), Some(group)) = (
                    state.pipelines.get(&p.key),
                    state.geometries.get(&p.geometry),
                    draw_groups.get(&p.key.program),
                ) else {
                    continue;
                };
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, group, &[p.offset]);
                pass.set_bind_group(1, &p.textures, &[]);
                pass.set_vertex_buffer(0, geometry.vertices.slice(..));
                pass.set_index_buffer(geometry.indices.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..geometry.index_count, 0, 0..1);
                drawn += 1;
            }
        }

        self.queue.submit(Some(encoder.finish()));
        let _ = self.device.poll(wgpu::Maintain::Wait);
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RenderError::Device(err.to_string()));
        }

        state.frame += 1;
        tracing::trace!(frame = state.frame, drawn, "wgpu frame");
        Ok(state.frame)
    }
}
