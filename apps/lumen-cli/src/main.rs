use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use glam::{Quat, Vec3, Vec4};
use lumen_assets::{
    ImageDecoder, MaterialDesc, MaterialFactors, MaterialLibrary, StandardDecoder, StdFileSystem,
    load_bytes,
};
use lumen_common::{HeadlessWindow, MaterialFlags, TextureFlags, Transform, WindowDesc};
use lumen_render::{
    GpuBackend, HeadlessBackend, MeshVertex, Renderer, RendererConfig, TextureInfo, creation_info,
    cube_mesh,
};
use lumen_render_wgpu::WgpuBackend;
use lumen_scene::{Camera, Drawable, World};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lumen-cli", about = "Texture loading and G-buffer tooling for lumen")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions and the default configuration
    Info,
    /// Decode an image and show how it would be created on the GPU
    Inspect {
        file: PathBuf,
        /// Texture flag names, e.g. SRGB or U_CLAMP
        #[arg(long = "flag")]
        flags: Vec<String>,
    },
    /// Acquire files through the texture cache of a headless renderer
    Load {
        #[arg(required = true)]
        files: Vec<String>,
        /// Texture flag names, e.g. SRGB or U_CLAMP
        #[arg(long = "flag")]
        flags: Vec<String>,
    },
    /// Build a demo world and run one G-buffer frame
    Render(RenderArgs),
}

#[derive(Args)]
struct RenderArgs {
    /// Renderer configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Material library file (JSON); replaces the demo materials
    #[arg(short, long)]
    materials: Option<PathBuf>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    #[arg(long)]
    white_furnace: bool,
    #[arg(long)]
    no_multiple_scattering: bool,
    /// Render on a wgpu device instead of the recording backend
    #[arg(long)]
    wgpu: bool,
}

fn parse_flags(names: &[String]) -> anyhow::Result<TextureFlags> {
    names.iter().try_fold(TextureFlags::empty(), |flags, name| {
        TextureFlags::from_name(&name.to_uppercase())
            .map(|flag| flags | flag)
            .with_context(|| format!("unknown texture flag `{name}`"))
    })
}

fn info() {
    println!("lumen-cli v{}", env!("CARGO_PKG_VERSION"));
    println!("assets: {}", lumen_assets::crate_info());
    println!("scene: {}", lumen_scene::crate_info());
    println!("render: {}", lumen_render::crate_info());
    println!("render-wgpu: {}", lumen_render_wgpu::crate_info());
    let config = RendererConfig::default();
    println!(
        "default config: {}x{}, multiple_scattering={}, white_furnace={}",
        config.width,
        config.height,
        config.gbuffer.multiple_scattering,
        config.gbuffer.white_furnace
    );
}

fn inspect(file: &Path, flags: TextureFlags) -> anyhow::Result<()> {
    let fs = StdFileSystem::new();
    let path = file.to_string_lossy().into_owned();
    let bytes = load_bytes(&fs, &path).with_context(|| format!("reading {path}"))?;
    let image = StandardDecoder
        .decode(&bytes)
        .with_context(|| format!("decoding {path}"))?;
    let create = creation_info(&image, flags);
    let info = TextureInfo::from_creation(&create);

    println!("{path}");
    println!("  shape: {:?}", create.shape);
    println!(
        "  mips: {}  format: {:?}  flags: {:?}",
        create.num_mips, create.format, create.flags
    );
    println!("  orientation: {:?}", image.orientation());
    println!(
        "  storage: {} bytes, {} bpp, cube={}",
        info.storage_size, info.bits_per_pixel, info.cube_map
    );
    Ok(())
}

fn load(files: &[String], flags: TextureFlags) -> anyhow::Result<()> {
    let backend = Arc::new(HeadlessBackend::new());
    let config = RendererConfig {
        texture_flags: flags,
        ..RendererConfig::default()
    };
    let renderer = Renderer::with_std_io(backend.clone(), config)?;

    for file in files {
        let loaded = renderer.textures().acquire_with_info(file, flags);
        match (loaded.info, renderer.textures().failure(file)) {
            (Some(info), _) => println!(
                "{file}: {:?} {}x{}x{} {:?}",
                loaded.handle, info.width, info.height, info.depth, info.format
            ),
            (None, failure) => {
                let reason = failure.map_or_else(|| "no info".to_owned(), |f| f.to_string());
                println!("{file}: {:?} ({reason})", loaded.handle);
            }
        }
    }

    let stats = renderer.textures().stats();
    println!(
        "cache: {} entries, hits={} misses={} failures={} uploaded={}B released={}B",
        renderer.textures().len(),
        stats.hits,
        stats.misses,
        stats.failures,
        stats.bytes_uploaded,
        stats.bytes_released
    );
    println!("live textures: {}", backend.live_textures());
    Ok(())
}

fn demo_materials() -> MaterialLibrary {
    let mut library = MaterialLibrary::new();
    library.push(MaterialDesc {
        factors: MaterialFactors {
            base_color: Vec4::new(0.6, 0.6, 0.6, 1.0),
            metallic: 0.0,
            roughness: 0.8,
            ..MaterialFactors::default()
        },
        ..MaterialDesc::new("stone")
    });
    library.push(MaterialDesc {
        factors: MaterialFactors {
            base_color: Vec4::new(1.0, 0.78, 0.34, 1.0),
            roughness: 0.3,
            ..MaterialFactors::default()
        },
        ..MaterialDesc::new("gold")
    });
    library.push(MaterialDesc {
        factors: MaterialFactors {
            base_color: Vec4::new(0.2, 0.5, 0.1, 1.0),
            metallic: 0.0,
            roughness: 0.6,
            emissive: Vec3::new(0.0, 0.05, 0.0),
            ..MaterialFactors::default()
        },
        flags: MaterialFlags::DOUBLE_SIDED,
        ..MaterialDesc::new("leaf")
    });
    library
}

fn build_world(renderer: &Renderer, library: &MaterialLibrary) -> anyhow::Result<World> {
    let (vertices, indices) = cube_mesh();
    let cube = renderer.backend().create_geometry(
        &MeshVertex::layout(),
        bytemuck::cast_slice(&vertices),
        &indices,
    )?;

    let mut world = World::new();
    world.set_camera(Camera {
        eye: Vec3::new(0.0, 4.0, 8.0),
        ..Camera::default()
    });
    let materials: Vec<_> = library
        .materials
        .iter()
        .map(|desc| renderer.add_material(&mut world, desc))
        .collect();

    for (i, material) in materials.iter().enumerate() {
        let transform = Transform {
            position: Vec3::new(i as f32 * 2.5 - 2.5, 0.0, 0.0),
            rotation: Quat::from_rotation_y(0.4 * i as f32),
            scale: Vec3::ONE,
        };
        world.spawn(Drawable::new(cube, Some(*material)).with_transform(transform));
    }
    // No material: skipped by the pass.
    world.spawn(Drawable::new(cube, None));
    Ok(world)
}

fn render(args: RenderArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => RendererConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RendererConfig::default(),
    };
    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }
    config.gbuffer.white_furnace |= args.white_furnace;
    if args.no_multiple_scattering {
        config.gbuffer.multiple_scattering = false;
    }

    let mut window = HeadlessWindow::new();
    let desc = WindowDesc {
        width: config.width,
        height: config.height,
        ..WindowDesc::default()
    };
    if !window.create(desc) {
        tracing::info!(width = config.width, height = config.height, "no window, rendering offscreen");
    }

    let backend: Arc<dyn GpuBackend> = if args.wgpu {
        let backend = WgpuBackend::new_headless()?;
        println!("adapter: {} ({:?})", backend.adapter_info().name, backend.adapter_info().backend);
        Arc::new(backend)
    } else {
        Arc::new(HeadlessBackend::new())
    };

    let library = match &args.materials {
        Some(path) => MaterialLibrary::load(path)
            .with_context(|| format!("loading materials {}", path.display()))?,
        None => demo_materials(),
    };

    let mut renderer = Renderer::with_std_io(backend, config)?;
    let world = build_world(&renderer, &library)?;
    let summary = renderer.render(&world)?;

    println!(
        "frame {}: {}x{} submitted={} skipped={} default_bindings={}",
        summary.frame,
        renderer.config().width,
        renderer.config().height,
        summary.gbuffer.submitted,
        summary.gbuffer.skipped,
        summary.gbuffer.default_bindings
    );
    let attachments = renderer.gbuffer().attachments();
    println!("g-buffer: {:?}", attachments.frame_buffer);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => info(),
        Commands::Inspect { file, flags } => inspect(&file, parse_flags(&flags)?)?,
        Commands::Load { files, flags } => load(&files, parse_flags(&flags)?)?,
        Commands::Render(args) => render(args)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_names_parse_case_insensitively() {
        let flags = parse_flags(&["srgb".into(), "U_CLAMP".into()]).unwrap();
        assert_eq!(flags, TextureFlags::SRGB | TextureFlags::U_CLAMP);
        assert!(parse_flags(&["sparkly".into()]).is_err());
    }

    #[test]
    fn demo_world_renders_headless() {
        let backend = Arc::new(HeadlessBackend::new());
        let mut renderer = Renderer::with_std_io(backend, RendererConfig::default()).unwrap();
        let world = build_world(&renderer, &demo_materials()).unwrap();
        let summary = renderer.render(&world).unwrap();
        assert_eq!(summary.gbuffer.submitted, 3);
        assert_eq!(summary.gbuffer.skipped, 1);
    }
}
