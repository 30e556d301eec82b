use crate::backend::GpuBackend;
use crate::config::RendererConfig;
use crate::error::RenderError;
use crate::gbuffer::{GBufferPass, GBufferStats};
use crate::texture_cache::TextureCache;
use lumen_assets::{
    FileSystem, ImageDecoder, Material, MaterialDesc, MaterialId, StandardDecoder, StdFileSystem,
};
use lumen_common::{TextureFlags, TextureHandle};
use lumen_scene::World;
use std::sync::Arc;

/// Outcome of one [`Renderer::render`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSummary {
    pub frame: u64,
    pub gbuffer: GBufferStats,
}

/// The renderer: a backend, the texture cache and the G-buffer pass.
///
/// Construction initializes everything; dropping shuts down in order, pass
/// resources first, then every cached texture.
pub struct Renderer {
    // Field order is drop order.
    gbuffer: GBufferPass,
    textures: TextureCache,
    backend: Arc<dyn GpuBackend>,
    config: RendererConfig,
}

impl Renderer {
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        fs: Arc<dyn FileSystem>,
        decoder: Arc<dyn ImageDecoder>,
        mut config: RendererConfig,
    ) -> Result<Self, RenderError> {
        let gbuffer = GBufferPass::new(
            Arc::clone(&backend),
            config.view,
            config.width,
            config.height,
            config.gbuffer,
        )?;
        let textures = TextureCache::new(Arc::clone(&backend), fs, decoder);
        config.width = gbuffer.attachments().width;
        config.height = gbuffer.attachments().height;
        tracing::info!(
            width = config.width,
            height = config.height,
            "renderer initialized"
        );
        Ok(Self {
            gbuffer,
            textures,
            backend,
            config,
        })
    }

    /// Renderer reading files from the host file system and decoding with
    /// [`StandardDecoder`].
    pub fn with_std_io(
        backend: Arc<dyn GpuBackend>,
        config: RendererConfig,
    ) -> Result<Self, RenderError> {
        Self::new(
            backend,
            Arc::new(StdFileSystem::new()),
            Arc::new(StandardDecoder),
            config,
        )
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    pub fn gbuffer(&self) -> &GBufferPass {
        &self.gbuffer
    }

    pub fn gbuffer_mut(&mut self) -> &mut GBufferPass {
        &mut self.gbuffer
    }

    /// Acquire a texture through the cache with the configured flags.
    pub fn load_texture(&self, path: &str, srgb: bool) -> TextureHandle {
        let mut flags = self.config.texture_flags;
        if srgb {
            flags |= TextureFlags::SRGB;
        }
        self.textures.acquire(path, flags)
    }

    /// Resolve a material description: every referenced path is acquired
    /// through the cache. A path that fails still occupies its slot with the
    /// invalid handle, so the pass falls back to the default texture.
    pub fn load_material(&self, desc: &MaterialDesc) -> Material {
        let mut material = Material::new(desc.name.clone())
            .with_factors(desc.factors)
            .with_flags(desc.flags);
        for (role, path) in &desc.textures {
            let texture = self.load_texture(path, role.is_color());
            material.set_texture(*role, Some(texture));
        }
        tracing::debug!(material = %desc.name, textures = desc.textures.len(), "material loaded");
        material
    }

    /// [`load_material`](Self::load_material) and insert into the world's arena.
    pub fn add_material(&self, world: &mut World, desc: &MaterialDesc) -> MaterialId {
        let material = self.load_material(desc);
        world.add_material(material)
    }

    /// Resize the G-buffer targets. The config records the size the pass
    /// actually uses, so a zero extent reads back as 1.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.gbuffer.resize(width, height)?;
        let targets = self.gbuffer.attachments();
        self.config.width = targets.width;
        self.config.height = targets.height;
        Ok(())
    }

    /// Run the G-buffer pass over `world` and finish the frame.
    pub fn render(&mut self, world: &World) -> Result<FrameSummary, RenderError> {
        let gbuffer = self.gbuffer.render(world);
        let frame = self.backend.frame()?;
        Ok(FrameSummary { frame, gbuffer })
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("config", &self.config)
            .field("gbuffer", &self.gbuffer)
            .field("textures", &self.textures)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessBackend;
    use lumen_assets::TextureRole;
    use lumen_common::GeometryHandle;
    use lumen_scene::Drawable;

    fn write_png(dir: &std::path::Path, name: &str) {
        image::RgbaImage::from_pixel(2, 2, image::Rgba([200, 100, 50, 255]))
            .save(dir.join(name))
            .unwrap();
    }

    fn renderer(backend: &Arc<HeadlessBackend>, root: &std::path::Path) -> Renderer {
        Renderer::new(
            backend.clone(),
            Arc::new(StdFileSystem::with_root(root)),
            Arc::new(StandardDecoder),
            RendererConfig {
                width: 16,
                height: 16,
                ..RendererConfig::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn material_textures_come_from_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "albedo.png");
        write_png(dir.path(), "mr.png");
        let backend = Arc::new(HeadlessBackend::new());
        let renderer = renderer(&backend, dir.path());

        let desc = MaterialDesc::new("brick")
            .with_texture(TextureRole::BaseColor, "albedo.png")
            .with_texture(TextureRole::MetallicRoughness, "mr.png")
            .with_texture(TextureRole::Emissive, "albedo.png");
        let material = renderer.load_material(&desc);

        let albedo = material.texture(TextureRole::BaseColor).unwrap();
        assert!(albedo.is_valid());
        assert_eq!(material.texture(TextureRole::Emissive), Some(albedo));
        let record = backend.texture(albedo).unwrap();
        assert!(record.info.flags.contains(TextureFlags::SRGB));
        let mr = backend
            .texture(material.texture(TextureRole::MetallicRoughness).unwrap())
            .unwrap();
        assert!(!mr.info.flags.contains(TextureFlags::SRGB));
        assert_eq!(renderer.textures().stats().hits, 1);
    }

    #[test]
    fn missing_texture_renders_with_default() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(HeadlessBackend::new());
        let mut renderer = renderer(&backend, dir.path());
        let mut world = World::new();
        let desc = MaterialDesc::new("ghost").with_texture(TextureRole::Normal, "nope.png");
        let mat = renderer.add_material(&mut world, &desc);
        world.spawn(Drawable::new(GeometryHandle::new(0), Some(mat)));

        let before = backend.submissions();
        assert!(before.is_empty());
        let summary = renderer.render(&world).unwrap();
        assert_eq!(summary.frame, 1);
        assert_eq!(summary.gbuffer.submitted, 1);
        assert_eq!(summary.gbuffer.default_bindings, 5);
    }

    #[test]
    fn drop_releases_pass_and_cached_textures() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png");
        let backend = Arc::new(HeadlessBackend::new());
        let renderer = renderer(&backend, dir.path());
        assert!(renderer.load_texture("a.png", false).is_valid());
        assert_eq!(backend.live_textures(), 8);
        drop(renderer);
        assert_eq!(backend.live_textures(), 0);
        assert_eq!(backend.live_programs(), 0);
    }

    #[test]
    fn resize_updates_config_and_targets() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(HeadlessBackend::new());
        let mut renderer = renderer(&backend, dir.path());
        renderer.resize(32, 8).unwrap();
        assert_eq!((renderer.config().width, renderer.config().height), (32, 8));
        let targets = renderer.gbuffer().attachments();
        assert_eq!((targets.width, targets.height), (32, 8));
    }

    #[test]
    fn zero_extent_is_recorded_as_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(HeadlessBackend::new());
        let mut renderer = renderer(&backend, dir.path());
        renderer.resize(0, 16).unwrap();
        assert_eq!((renderer.config().width, renderer.config().height), (1, 16));
        let targets = renderer.gbuffer().attachments();
        assert_eq!((targets.width, targets.height), (1, 16));
    }
}
