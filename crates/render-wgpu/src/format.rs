//! Translation of lumen descriptors into wgpu types.

use lumen_common::{PixelFormat, TextureFlags};
use lumen_render::TextureShape;

/// wgpu format for a pixel format. `SRGB` selects the sRGB variant where one
/// exists.
pub fn texture_format(format: PixelFormat, flags: TextureFlags) -> wgpu::TextureFormat {
    use wgpu::TextureFormat as F;
    let srgb = flags.contains(TextureFlags::SRGB);
    let pick = |linear, gamma| if srgb { gamma } else { linear };
    match format {
        PixelFormat::Bc1 => pick(F::Bc1RgbaUnorm, F::Bc1RgbaUnormSrgb),
        PixelFormat::Bc2 => pick(F::Bc2RgbaUnorm, F::Bc2RgbaUnormSrgb),
        PixelFormat::Bc3 => pick(F::Bc3RgbaUnorm, F::Bc3RgbaUnormSrgb),
        PixelFormat::Bc4 => F::Bc4RUnorm,
        PixelFormat::Bc5 => F::Bc5RgUnorm,
        PixelFormat::Bc6h => F::Bc6hRgbUfloat,
        PixelFormat::Bc7 => pick(F::Bc7RgbaUnorm, F::Bc7RgbaUnormSrgb),
        PixelFormat::Etc2 => pick(F::Etc2Rgb8Unorm, F::Etc2Rgb8UnormSrgb),
        PixelFormat::Astc4x4 => F::Astc {
            block: wgpu::AstcBlock::B4x4,
            channel: if srgb {
                wgpu::AstcChannel::UnormSrgb
            } else {
                wgpu::AstcChannel::Unorm
            },
        },
        PixelFormat::R8 => F::R8Unorm,
        PixelFormat::Rg8 => F::Rg8Unorm,
        PixelFormat::Rgba8 => pick(F::Rgba8Unorm, F::Rgba8UnormSrgb),
        PixelFormat::Bgra8 => pick(F::Bgra8Unorm, F::Bgra8UnormSrgb),
        PixelFormat::R16F => F::R16Float,
        PixelFormat::Rg16F => F::Rg16Float,
        PixelFormat::Rgba16 => F::Rgba16Unorm,
        PixelFormat::Rgba16F => F::Rgba16Float,
        PixelFormat::R32F => F::R32Float,
        PixelFormat::Rg32F => F::Rg32Float,
        PixelFormat::Rgba32F => F::Rgba32Float,
        PixelFormat::D24S8 => F::Depth24PlusStencil8,
        PixelFormat::D32F => F::Depth32Float,
    }
}

/// Usages implied by creation flags. Depth formats cannot be upload targets.
pub fn texture_usages(flags: TextureFlags, format: wgpu::TextureFormat) -> wgpu::TextureUsages {
    let mut usage = wgpu::TextureUsages::TEXTURE_BINDING;
    if !format.is_depth_stencil_format() {
        usage |= wgpu::TextureUsages::COPY_DST;
    }
    if flags.contains(TextureFlags::RENDER_TARGET) {
        usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
    }
    if flags.contains(TextureFlags::READ_BACK) {
        usage |= wgpu::TextureUsages::COPY_SRC;
    }
    if flags.contains(TextureFlags::COMPUTE_WRITE) {
        usage |= wgpu::TextureUsages::STORAGE_BINDING;
    }
    usage
}

/// Size, dimension and default view dimension of a texture shape.
pub fn texture_extent(
    shape: &TextureShape,
) -> (wgpu::Extent3d, wgpu::TextureDimension, wgpu::TextureViewDimension) {
    match *shape {
        TextureShape::D2 {
            width,
            height,
            num_layers,
        } => (
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: num_layers.max(1),
            },
            wgpu::TextureDimension::D2,
            if num_layers > 1 {
                wgpu::TextureViewDimension::D2Array
            } else {
                wgpu::TextureViewDimension::D2
            },
        ),
        TextureShape::D3 {
            width,
            height,
            depth,
        } => (
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: depth,
            },
            wgpu::TextureDimension::D3,
            wgpu::TextureViewDimension::D3,
        ),
        TextureShape::Cube { size, num_layers } => (
            wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 6 * num_layers.max(1),
            },
            wgpu::TextureDimension::D2,
            if num_layers > 1 {
                wgpu::TextureViewDimension::CubeArray
            } else {
                wgpu::TextureViewDimension::Cube
            },
        ),
    }
}

fn address_mode(clamp: bool, mirror: bool) -> wgpu::AddressMode {
    if clamp {
        wgpu::AddressMode::ClampToEdge
    } else if mirror {
        wgpu::AddressMode::MirrorRepeat
    } else {
        wgpu::AddressMode::Repeat
    }
}

fn filter(point: bool) -> wgpu::FilterMode {
    if point {
        wgpu::FilterMode::Nearest
    } else {
        wgpu::FilterMode::Linear
    }
}

pub fn sampler_descriptor(flags: TextureFlags) -> wgpu::SamplerDescriptor<'static> {
    wgpu::SamplerDescriptor {
        label: None,
        address_mode_u: address_mode(
            flags.contains(TextureFlags::U_CLAMP),
            flags.contains(TextureFlags::U_MIRROR),
        ),
        address_mode_v: address_mode(
            flags.contains(TextureFlags::V_CLAMP),
            flags.contains(TextureFlags::V_MIRROR),
        ),
        address_mode_w: address_mode(
            flags.contains(TextureFlags::W_CLAMP),
            flags.contains(TextureFlags::W_MIRROR),
        ),
        mag_filter: filter(flags.contains(TextureFlags::MAG_POINT)),
        min_filter: filter(flags.contains(TextureFlags::MIN_POINT)),
        mipmap_filter: filter(flags.contains(TextureFlags::MIP_POINT)),
        ..Default::default()
    }
}

pub fn vertex_format(components: u8) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgb_flag_selects_srgb_variant() {
        assert_eq!(
            texture_format(PixelFormat::Rgba8, TextureFlags::SRGB),
            wgpu::TextureFormat::Rgba8UnormSrgb
        );
        assert_eq!(
            texture_format(PixelFormat::Rgba8, TextureFlags::empty()),
            wgpu::TextureFormat::Rgba8Unorm
        );
        // no sRGB variant exists for float formats
        assert_eq!(
            texture_format(PixelFormat::Rgba16F, TextureFlags::SRGB),
            wgpu::TextureFormat::Rgba16Float
        );
    }

    #[test]
    fn block_sizes_agree_with_wgpu() {
        for format in [
            PixelFormat::Bc1,
            PixelFormat::Bc7,
            PixelFormat::Rgba8,
            PixelFormat::Rg16F,
            PixelFormat::Rgba32F,
        ] {
            let wgpu_format = texture_format(format, TextureFlags::empty());
            let (bw, bh) = wgpu_format.block_dimensions();
            let block = format.block_info();
            assert_eq!((bw, bh), (block.width, block.height), "{format:?}");
            assert_eq!(wgpu_format.block_copy_size(None), Some(block.bytes), "{format:?}");
        }
    }

    #[test]
    fn cube_extent_has_six_faces_per_layer() {
        let (extent, dim, view) = texture_extent(&TextureShape::Cube {
            size: 8,
            num_layers: 2,
        });
        assert_eq!(extent.depth_or_array_layers, 12);
        assert_eq!(dim, wgpu::TextureDimension::D2);
        assert_eq!(view, wgpu::TextureViewDimension::CubeArray);
    }

    #[test]
    fn render_target_usage() {
        let rgba = wgpu::TextureFormat::Rgba8Unorm;
        let usage = texture_usages(TextureFlags::RENDER_TARGET, rgba);
        assert!(usage.contains(wgpu::TextureUsages::RENDER_ATTACHMENT));
        assert!(!texture_usages(TextureFlags::empty(), rgba)
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT));
        let depth = texture_usages(TextureFlags::RENDER_TARGET, wgpu::TextureFormat::Depth32Float);
        assert!(!depth.contains(wgpu::TextureUsages::COPY_DST));
    }

    #[test]
    fn clamp_wins_over_mirror() {
        let desc = sampler_descriptor(TextureFlags::U_CLAMP | TextureFlags::U_MIRROR | TextureFlags::POINT);
        assert_eq!(desc.address_mode_u, wgpu::AddressMode::ClampToEdge);
        assert_eq!(desc.address_mode_v, wgpu::AddressMode::Repeat);
        assert_eq!(desc.min_filter, wgpu::FilterMode::Nearest);
    }
}
