//! The deferred geometry pass.
//!
//! Draws every drawable of a [`World`] into five render targets holding the
//! packed surface description that lighting reads back. The packing is
//! defined by [`crate::packing`] and the `gbuffer` shader.

use crate::backend::{
    CullMode, DrawState, GpuBackend, GpuMemory, ProgramDesc, TextureCreateInfo, UniformKind,
    UniformValue, ViewClear,
};
use crate::error::RenderError;
use crate::packing::MaterialUniforms;
use crate::vertex::MeshVertex;
use lumen_assets::{Material, TextureRole, TextureRoles};
use lumen_common::{
    FrameBufferHandle, PixelFormat, ProgramHandle, TextureFlags, TextureHandle, Transform,
    UniformHandle, ViewId,
};
use lumen_scene::World;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Name of the shader program the pass draws with.
pub const GBUFFER_SHADER: &str = "gbuffer";

pub const U_NORMAL_MATRIX: &str = "u_normal_matrix";
pub const U_BASE_COLOR_FACTOR: &str = "u_base_color_factor";
pub const U_MET_ROUGH_NOR_OCC_FACTOR: &str = "u_met_rough_nor_occ_factor";
pub const U_EMISSIVE_FACTOR: &str = "u_emissive_factor";
pub const U_HAS_TEXTURES: &str = "u_has_textures";
pub const U_MULTIPLE_SCATTERING: &str = "u_multiple_scattering";

/// Sampler names in stage order, matching [`TextureRole::ALL`].
pub const SAMPLER_NAMES: [&str; 5] = [
    "s_base_color",
    "s_metallic_roughness",
    "s_normal",
    "s_occlusion",
    "s_emissive",
];

/// Format of the depth-test attachment, which is not sampled by lighting.
pub const DEPTH_FORMAT: PixelFormat = PixelFormat::D32F;

/// The five color attachments, in frame-buffer order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GBufferAttachment {
    /// rgb = diffuse color, a = roughness squared.
    DiffuseRoughness,
    /// rg = octahedral world-space normal.
    Normal,
    /// rgb = F0, a = metallic.
    F0Metallic,
    /// rgb = emissive radiance, a = occlusion.
    EmissiveOcclusion,
    /// r = window-space depth.
    Depth,
}

impl GBufferAttachment {
    pub const COUNT: usize = 5;

    pub const ALL: [GBufferAttachment; Self::COUNT] = [
        GBufferAttachment::DiffuseRoughness,
        GBufferAttachment::Normal,
        GBufferAttachment::F0Metallic,
        GBufferAttachment::EmissiveOcclusion,
        GBufferAttachment::Depth,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn format(self) -> PixelFormat {
        match self {
            Self::DiffuseRoughness | Self::F0Metallic => PixelFormat::Rgba8,
            Self::Normal => PixelFormat::Rg16F,
            Self::EmissiveOcclusion => PixelFormat::Rgba16F,
            Self::Depth => PixelFormat::R32F,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::DiffuseRoughness => "gbuffer.diffuse_roughness",
            Self::Normal => "gbuffer.normal",
            Self::F0Metallic => "gbuffer.f0_metallic",
            Self::EmissiveOcclusion => "gbuffer.emissive_occlusion",
            Self::Depth => "gbuffer.depth",
        }
    }
}

/// Toggles applied to every object of a render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GBufferConfig {
    pub multiple_scattering: bool,
    /// Replace every base color with white, for energy-conservation checks.
    pub white_furnace: bool,
}

impl Default for GBufferConfig {
    fn default() -> Self {
        Self {
            multiple_scattering: true,
            white_furnace: false,
        }
    }
}

/// Read-only view of the pass's render targets for the passes that consume
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GBufferAttachments {
    pub frame_buffer: FrameBufferHandle,
    pub color: [TextureHandle; GBufferAttachment::COUNT],
    pub depth_stencil: TextureHandle,
    pub width: u32,
    pub height: u32,
}

impl GBufferAttachments {
    pub fn get(&self, attachment: GBufferAttachment) -> TextureHandle {
        self.color[attachment.index()]
    }
}

/// Outcome of one [`GBufferPass::render`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GBufferStats {
    pub submitted: usize,
    /// Drawables skipped because their material was missing.
    pub skipped: usize,
    /// Sampler bindings that fell back to the default texture.
    pub default_bindings: usize,
}

#[derive(Debug, Clone, Copy)]
struct Uniforms {
    normal_matrix: UniformHandle,
    base_color_factor: UniformHandle,
    met_rough_nor_occ_factor: UniformHandle,
    emissive_factor: UniformHandle,
    has_textures: UniformHandle,
    multiple_scattering: UniformHandle,
    samplers: [UniformHandle; 5],
}

impl Uniforms {
    /// Create every uniform, or none: a failure destroys the ones already made.
    fn create(backend: &dyn GpuBackend) -> Result<Self, RenderError> {
        let mut created = Vec::with_capacity(6 + SAMPLER_NAMES.len());
        let declared = [
            (U_NORMAL_MATRIX, UniformKind::Mat3),
            (U_BASE_COLOR_FACTOR, UniformKind::Vec4),
            (U_MET_ROUGH_NOR_OCC_FACTOR, UniformKind::Vec4),
            (U_EMISSIVE_FACTOR, UniformKind::Vec4),
            (U_HAS_TEXTURES, UniformKind::Vec4),
            (U_MULTIPLE_SCATTERING, UniformKind::Vec4),
        ]
        .into_iter()
        .chain(SAMPLER_NAMES.iter().map(|name| (*name, UniformKind::Sampler)));

        for (name, kind) in declared {
            match backend.create_uniform(name, kind) {
                Ok(uniform) => created.push(uniform),
                Err(err) => {
                    created.iter().for_each(|u| backend.destroy_uniform(*u));
                    return Err(err);
                }
            }
        }

        let mut samplers = [UniformHandle::INVALID; 5];
        samplers.copy_from_slice(&created[6..]);
        Ok(Self {
            normal_matrix: created[0],
            base_color_factor: created[1],
            met_rough_nor_occ_factor: created[2],
            emissive_factor: created[3],
            has_textures: created[4],
            multiple_scattering: created[5],
            samplers,
        })
    }

    fn values(&self) -> Vec<UniformHandle> {
        vec![
            self.normal_matrix,
            self.base_color_factor,
            self.met_rough_nor_occ_factor,
            self.emissive_factor,
            self.has_textures,
            self.multiple_scattering,
        ]
    }

    fn destroy(&self, backend: &dyn GpuBackend) {
        for uniform in self.values().into_iter().chain(self.samplers) {
            backend.destroy_uniform(uniform);
        }
    }
}

fn target_flags() -> TextureFlags {
    TextureFlags::RENDER_TARGET | TextureFlags::UVW_CLAMP | TextureFlags::POINT
}

fn create_targets(
    backend: &dyn GpuBackend,
    width: u32,
    height: u32,
) -> Result<GBufferAttachments, RenderError> {
    let mut created = Vec::with_capacity(GBufferAttachment::COUNT + 1);
    let formats = GBufferAttachment::ALL
        .iter()
        .map(|a| (a.format(), a.label()))
        .chain(std::iter::once((DEPTH_FORMAT, "gbuffer.depth_stencil")));

    for (format, label) in formats {
        let info = TextureCreateInfo::new_2d(width, height, format, target_flags());
        match backend.create_texture(&info, None) {
            Ok(texture) => {
                backend.set_texture_name(texture, label);
                created.push(texture);
            }
            Err(err) => {
                created.iter().for_each(|t| backend.destroy_texture(*t));
                return Err(err);
            }
        }
    }

    let frame_buffer = match backend.create_frame_buffer(&created) {
        Ok(fb) => fb,
        Err(err) => {
            created.iter().for_each(|t| backend.destroy_texture(*t));
            return Err(err);
        }
    };

    let mut color = [TextureHandle::INVALID; GBufferAttachment::COUNT];
    color.copy_from_slice(&created[..GBufferAttachment::COUNT]);
    Ok(GBufferAttachments {
        frame_buffer,
        color,
        depth_stencil: created[GBufferAttachment::COUNT],
        width,
        height,
    })
}

fn destroy_targets(backend: &dyn GpuBackend, targets: &GBufferAttachments) {
    backend.destroy_frame_buffer(targets.frame_buffer);
    for texture in targets.color.iter().chain([&targets.depth_stencil]) {
        backend.destroy_texture(*texture);
    }
}

/// The G-buffer geometry pass.
///
/// Owns its render targets, program, uniforms and a 1x1 white default
/// texture. All of them are released when the pass is dropped.
pub struct GBufferPass {
    backend: Arc<dyn GpuBackend>,
    view: ViewId,
    config: GBufferConfig,
    targets: GBufferAttachments,
    uniforms: Uniforms,
    program: ProgramHandle,
    default_texture: TextureHandle,
}

impl GBufferPass {
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        view: ViewId,
        width: u32,
        height: u32,
        config: GBufferConfig,
    ) -> Result<Self, RenderError> {
        let (width, height) = (width.max(1), height.max(1));
        let uniforms = Uniforms::create(backend.as_ref())?;

        let desc = ProgramDesc {
            shader: GBUFFER_SHADER.to_owned(),
            layout: MeshVertex::layout(),
            uniforms: uniforms.values(),
            samplers: uniforms.samplers.to_vec(),
            targets: GBufferAttachment::ALL.iter().map(|a| a.format()).collect(),
            depth: Some(DEPTH_FORMAT),
        };
        let program = match backend.create_program(&desc) {
            Ok(program) => program,
            Err(err) => {
                uniforms.destroy(backend.as_ref());
                return Err(err);
            }
        };

        let white = TextureCreateInfo::new_2d(1, 1, PixelFormat::Rgba8, TextureFlags::empty());
        let default_texture = match backend.create_texture(&white, Some(GpuMemory::copy(&[255; 4])))
        {
            Ok(texture) => texture,
            Err(err) => {
                backend.destroy_program(program);
                uniforms.destroy(backend.as_ref());
                return Err(err);
            }
        };
        backend.set_texture_name(default_texture, "gbuffer.default_white");

        let targets = match create_targets(backend.as_ref(), width, height) {
            Ok(targets) => targets,
            Err(err) => {
                backend.destroy_texture(default_texture);
                backend.destroy_program(program);
                uniforms.destroy(backend.as_ref());
                return Err(err);
            }
        };

        tracing::debug!(width, height, view = view.0, "gbuffer pass created");
        Ok(Self {
            backend,
            view,
            config,
            targets,
            uniforms,
            program,
            default_texture,
        })
    }

    /// Recreate the render targets at a new output size. Same size is a no-op.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == (self.targets.width, self.targets.height) {
            return Ok(());
        }
        let targets = create_targets(self.backend.as_ref(), width, height)?;
        destroy_targets(self.backend.as_ref(), &self.targets);
        self.targets = targets;
        tracing::debug!(width, height, "gbuffer targets resized");
        Ok(())
    }

    pub fn attachments(&self) -> &GBufferAttachments {
        &self.targets
    }

    pub fn config(&self) -> GBufferConfig {
        self.config
    }

    /// Takes effect from the next [`render`](Self::render).
    pub fn set_config(&mut self, config: GBufferConfig) {
        self.config = config;
    }

    pub fn view(&self) -> ViewId {
        self.view
    }

    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    pub fn default_texture(&self) -> TextureHandle {
        self.default_texture
    }

    /// Submit one draw per drawable that has a material.
    ///
    /// Missing materials and unusable textures never fail the call: the
    /// drawable is skipped or the default texture is bound instead.
    pub fn render(&mut self, world: &World) -> GBufferStats {
        let _span = tracing::info_span!("gbuffer_render", view = self.view.0).entered();
        let backend = self.backend.as_ref();
        let targets = &self.targets;

        let camera = world.camera();
        let aspect = targets.width as f32 / targets.height as f32;
        backend.set_view_frame_buffer(self.view, targets.frame_buffer);
        backend.set_view_rect(self.view, targets.width, targets.height);
        backend.set_view_clear(self.view, ViewClear::default());
        backend.set_view_transform(
            self.view,
            camera.view_matrix(),
            camera.projection_matrix(aspect),
        );

        let mut stats = GBufferStats::default();
        for item in world.drawables() {
            let Some(material) = item.material else {
                tracing::warn!(drawable = item.id.0, "drawable has no material, skipped");
                stats.skipped += 1;
                continue;
            };

            let bound = self.bind_textures(material, &mut stats);
            self.upload_uniforms(material, &item.drawable.transform, bound);

            backend.set_transform(item.drawable.transform.matrix());
            backend.set_state(DrawState {
                cull: if material.is_double_sided() {
                    CullMode::None
                } else {
                    CullMode::Back
                },
            });
            backend.submit(self.view, self.program, item.drawable.geometry);
            stats.submitted += 1;
        }

        tracing::trace!(?stats, "gbuffer pass submitted");
        stats
    }

    /// Bind all five samplers and report which roles got a real texture.
    fn bind_textures(&self, material: &Material, stats: &mut GBufferStats) -> TextureRoles {
        let mut bound = TextureRoles::empty();
        for (stage, role) in TextureRole::ALL.into_iter().enumerate() {
            let texture = match material.texture(role) {
                Some(texture) if texture.is_valid() => {
                    bound |= role.bit();
                    texture
                }
                Some(_) => {
                    tracing::warn!(
                        material = %material.name,
                        ?role,
                        "invalid texture reference, default bound"
                    );
                    stats.default_bindings += 1;
                    self.default_texture
                }
                None => {
                    stats.default_bindings += 1;
                    self.default_texture
                }
            };
            self.backend
                .set_texture(stage as u8, self.uniforms.samplers[stage], texture);
        }
        bound
    }

    fn upload_uniforms(&self, material: &Material, transform: &Transform, bound: TextureRoles) {
        let u = &self.uniforms;
        let values = MaterialUniforms::new(
            material.factors(),
            bound,
            self.config.multiple_scattering,
            self.config.white_furnace,
        );
        let backend = self.backend.as_ref();
        backend.set_uniform(u.normal_matrix, UniformValue::Mat3(transform.normal_matrix()));
        backend.set_uniform(u.base_color_factor, UniformValue::Vec4(values.base_color_factor));
        backend.set_uniform(
            u.met_rough_nor_occ_factor,
            UniformValue::Vec4(values.met_rough_nor_occ_factor),
        );
        backend.set_uniform(u.emissive_factor, UniformValue::Vec4(values.emissive_factor));
        backend.set_uniform(u.has_textures, UniformValue::Vec4(values.has_textures));
        backend.set_uniform(
            u.multiple_scattering,
            UniformValue::Vec4(values.multiple_scattering),
        );
    }
}

impl Drop for GBufferPass {
    fn drop(&mut self) {
        let backend = self.backend.as_ref();
        destroy_targets(backend, &self.targets);
        backend.destroy_texture(self.default_texture);
        backend.destroy_program(self.program);
        self.uniforms.destroy(backend);
        tracing::debug!("gbuffer pass released");
    }
}

impl std::fmt::Debug for GBufferPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GBufferPass")
            .field("view", &self.view)
            .field("config", &self.config)
            .field("targets", &self.targets)
            .field("program", &self.program)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessBackend, Submission};
    use crate::packing::{self, TextureSamples};
    use glam::{Mat3, Vec3, Vec4};
    use lumen_assets::MaterialFactors;
    use lumen_common::{GeometryHandle, MaterialFlags};
    use lumen_scene::Drawable;

    fn pass(backend: &Arc<HeadlessBackend>, config: GBufferConfig) -> GBufferPass {
        GBufferPass::new(backend.clone(), ViewId(0), 64, 32, config).unwrap()
    }

    fn vec4(backend: &HeadlessBackend, sub: &Submission, name: &str) -> Vec4 {
        let handle = backend.uniform_by_name(name).unwrap();
        sub.uniform(handle).and_then(|v| v.as_vec4()).unwrap()
    }

    #[test]
    fn attachments_use_the_packing_formats() {
        let backend = Arc::new(HeadlessBackend::new());
        let pass = pass(&backend, GBufferConfig::default());
        let targets = pass.attachments();
        assert_eq!((targets.width, targets.height), (64, 32));

        for attachment in GBufferAttachment::ALL {
            let record = backend.texture(targets.get(attachment)).unwrap();
            assert_eq!(record.info.format, attachment.format());
            assert!(record.info.flags.contains(TextureFlags::RENDER_TARGET));
        }
        let depth = backend.texture(targets.depth_stencil).unwrap();
        assert_eq!(depth.info.format, PixelFormat::D32F);

        let fb = backend.frame_buffer(targets.frame_buffer).unwrap();
        assert_eq!(fb.len(), 6);
        assert_eq!(&fb[..5], &targets.color);
    }

    #[test]
    fn material_without_textures_binds_default_everywhere() {
        let backend = Arc::new(HeadlessBackend::new());
        let mut pass = pass(&backend, GBufferConfig::default());
        let mut world = World::new();
        let mat = world.add_material(Material::new("plain"));
        world.spawn(Drawable::new(GeometryHandle::new(0), Some(mat)));

        let stats = pass.render(&world);
        assert_eq!(stats.submitted, 1);
        assert_eq!(stats.default_bindings, 5);

        let sub = &backend.submissions()[0];
        for stage in 0..5u8 {
            assert_eq!(sub.texture_at(stage), Some(pass.default_texture()));
        }
        assert_eq!(vec4(&backend, sub, U_HAS_TEXTURES).x, 0.0);
        let white = backend.texture(pass.default_texture()).unwrap();
        assert_eq!(white.data, vec![255; 4]);
    }

    #[test]
    fn valid_textures_are_bound_and_flagged() {
        let backend = Arc::new(HeadlessBackend::new());
        let mut pass = pass(&backend, GBufferConfig::default());
        let albedo = TextureHandle::new(100);
        let mut world = World::new();
        let mat = world.add_material(
            Material::new("mixed")
                .with_texture(TextureRole::BaseColor, albedo)
                .with_texture(TextureRole::Normal, TextureHandle::INVALID),
        );
        world.spawn(Drawable::new(GeometryHandle::new(0), Some(mat)));

        let stats = pass.render(&world);
        assert_eq!(stats.default_bindings, 4);
        let sub = &backend.submissions()[0];
        assert_eq!(sub.texture_at(0), Some(albedo));
        assert_eq!(sub.texture_at(2), Some(pass.default_texture()));
        assert_eq!(
            vec4(&backend, sub, U_HAS_TEXTURES).x,
            TextureRoles::BASE_COLOR.bits() as f32
        );
    }

    #[test]
    fn drawable_without_material_is_skipped() {
        let backend = Arc::new(HeadlessBackend::new());
        let mut pass = pass(&backend, GBufferConfig::default());
        let mut world = World::new();
        let mat = world.add_material(Material::new("ok"));
        world.spawn(Drawable::new(GeometryHandle::new(0), None));
        world.spawn(Drawable::new(GeometryHandle::new(1), Some(mat)));

        let stats = pass.render(&world);
        assert_eq!((stats.submitted, stats.skipped), (1, 1));
        let subs = backend.submissions();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].geometry, GeometryHandle::new(1));
        assert_eq!(subs[0].program, pass.program());
        assert_eq!(subs[0].view, ViewId(0));
    }

    #[test]
    fn submissions_follow_world_order() {
        let backend = Arc::new(HeadlessBackend::new());
        let mut pass = pass(&backend, GBufferConfig::default());
        let mut world = World::new();
        let mat = world.add_material(Material::new("m"));
        for i in [3, 1, 2] {
            world.spawn(Drawable::new(GeometryHandle::new(i), Some(mat)));
        }
        pass.render(&world);
        let order: Vec<u32> = backend
            .submissions()
            .iter()
            .map(|s| s.geometry.index())
            .collect();
        assert_eq!(order, vec![3, 1, 2]);
    }

    #[test]
    fn double_sided_disables_culling() {
        let backend = Arc::new(HeadlessBackend::new());
        let mut pass = pass(&backend, GBufferConfig::default());
        let mut world = World::new();
        let leaf = world.add_material(Material::new("leaf").with_flags(MaterialFlags::DOUBLE_SIDED));
        let wall = world.add_material(Material::new("wall"));
        world.spawn(Drawable::new(GeometryHandle::new(0), Some(leaf)));
        world.spawn(Drawable::new(GeometryHandle::new(1), Some(wall)));
        pass.render(&world);
        let subs = backend.submissions();
        assert_eq!(subs[0].state.cull, CullMode::None);
        assert_eq!(subs[1].state.cull, CullMode::Back);
    }

    #[test]
    fn toggles_apply_to_every_draw() {
        let backend = Arc::new(HeadlessBackend::new());
        let config = GBufferConfig {
            multiple_scattering: false,
            white_furnace: true,
        };
        let mut pass = pass(&backend, config);
        let mut world = World::new();
        let mat = world.add_material(Material::new("m"));
        world.spawn(Drawable::new(GeometryHandle::new(0), Some(mat)));
        world.spawn(Drawable::new(GeometryHandle::new(1), Some(mat)));
        pass.render(&world);
        for sub in backend.submissions() {
            assert_eq!(
                vec4(&backend, &sub, U_MULTIPLE_SCATTERING),
                Vec4::new(0.0, 1.0, 0.0, 0.0)
            );
        }
    }

    #[test]
    fn known_material_round_trips_through_the_attachments() {
        let backend = Arc::new(HeadlessBackend::new());
        let mut pass = pass(&backend, GBufferConfig::default());
        let factors = MaterialFactors {
            base_color: Vec4::new(0.7, 0.4, 0.2, 1.0),
            metallic: 0.3,
            roughness: 0.55,
            normal_scale: 1.0,
            occlusion_strength: 1.0,
            emissive: Vec3::new(0.0, 1.5, 0.25),
        };
        let mut world = World::new();
        let mat = world.add_material(Material::new("known").with_factors(factors));
        let transform = Transform {
            scale: Vec3::new(2.0, 1.0, 1.0),
            ..Transform::default()
        };
        world.spawn(Drawable::new(GeometryHandle::new(0), Some(mat)).with_transform(transform));
        pass.render(&world);

        let sub = &backend.submissions()[0];
        let uniforms = packing::MaterialUniforms {
            base_color_factor: vec4(&backend, sub, U_BASE_COLOR_FACTOR),
            met_rough_nor_occ_factor: vec4(&backend, sub, U_MET_ROUGH_NOR_OCC_FACTOR),
            emissive_factor: vec4(&backend, sub, U_EMISSIVE_FACTOR),
            has_textures: vec4(&backend, sub, U_HAS_TEXTURES),
            multiple_scattering: vec4(&backend, sub, U_MULTIPLE_SCATTERING),
        };
        let normal_matrix: Mat3 = sub
            .uniform(backend.uniform_by_name(U_NORMAL_MATRIX).unwrap())
            .and_then(|v| v.as_mat3())
            .unwrap();
        let normal = (normal_matrix * Vec3::new(1.0, 1.0, 0.0)).normalize();

        let surface = uniforms.surface(&TextureSamples::default(), normal, 0.42);
        let texel = packing::decode(&packing::encode(&surface));

        let eps = 1.0 / 255.0;
        assert!(texel.diffuse.abs_diff_eq(Vec3::new(0.7, 0.4, 0.2) * 0.7, eps));
        assert!((texel.metallic - 0.3).abs() < eps);
        assert!((texel.roughness - 0.55).abs() < 1e-2);
        assert!(texel.emissive.abs_diff_eq(factors.emissive, 1e-3));
        assert!((texel.occlusion - 1.0).abs() < 1e-3);
        // non-uniform scale bends the normal away from the diagonal
        let expected = Vec3::new(0.5, 1.0, 0.0).normalize();
        assert!(texel.normal.abs_diff_eq(expected, 3e-3));
        assert_eq!(texel.depth, 0.42);
    }

    #[test]
    fn resize_recreates_targets_only_on_change() {
        let backend = Arc::new(HeadlessBackend::new());
        let mut pass = pass(&backend, GBufferConfig::default());
        let before = *pass.attachments();
        pass.resize(64, 32).unwrap();
        assert_eq!(*pass.attachments(), before);

        pass.resize(128, 128).unwrap();
        let after = *pass.attachments();
        assert_ne!(after.frame_buffer, before.frame_buffer);
        assert!(backend.texture(before.get(GBufferAttachment::Normal)).is_none());
        assert_eq!(backend.live_frame_buffers(), 1);
        // five color targets, depth, default texture
        assert_eq!(backend.live_textures(), 7);
    }

    #[test]
    fn drop_releases_everything() {
        let backend = Arc::new(HeadlessBackend::new());
        let pass = pass(&backend, GBufferConfig::default());
        assert!(backend.live_programs() == 1 && backend.live_uniforms() == 11);
        drop(pass);
        assert_eq!(backend.live_textures(), 0);
        assert_eq!(backend.live_frame_buffers(), 0);
        assert_eq!(backend.live_programs(), 0);
        assert_eq!(backend.live_uniforms(), 0);
    }

    #[test]
    fn failed_uniform_creation_leaks_nothing() {
        let backend = Arc::new(HeadlessBackend::new().with_max_uniforms(7));
        let result = GBufferPass::new(backend.clone(), ViewId(0), 64, 32, GBufferConfig::default());
        assert!(matches!(result, Err(RenderError::Device(_))));
        assert_eq!(backend.live_uniforms(), 0);
        assert_eq!(backend.live_programs(), 0);
        assert_eq!(backend.live_textures(), 0);
    }

    #[test]
    fn view_gets_camera_and_targets() {
        let backend = Arc::new(HeadlessBackend::new());
        let mut pass = pass(&backend, GBufferConfig::default());
        let world = World::new();
        pass.render(&world);
        let view = backend.view(ViewId(0)).unwrap();
        assert_eq!(view.frame_buffer, pass.attachments().frame_buffer);
        assert_eq!((view.width, view.height), (64, 32));
        assert_eq!(view.view_matrix, world.camera().view_matrix());
        assert_eq!(view.projection, world.camera().projection_matrix(2.0));
    }
}
