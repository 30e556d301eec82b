//! CPU reference of the G-buffer attachment encoding.
//!
//! Mirrors the fragment stage of the G-buffer shader: the material math that
//! turns uniforms and texture samples into a surface, and the packing of that
//! surface into the five attachments. Lighting code decodes with
//! [`decode`]; the shader and this module must change together.

use glam::{Vec2, Vec3, Vec4};
use half::f16;
use lumen_assets::{MaterialFactors, TextureRoles};

/// Reflectance at normal incidence of dielectrics.
pub const DIELECTRIC_F0: f32 = 0.04;

/// Per-draw material uniforms, exactly as uploaded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialUniforms {
    pub base_color_factor: Vec4,
    /// x = metallic, y = roughness, z = normal scale, w = occlusion strength.
    pub met_rough_nor_occ_factor: Vec4,
    /// rgb = emissive factor.
    pub emissive_factor: Vec4,
    /// x = bitmask of bound texture roles.
    pub has_textures: Vec4,
    /// x = multiple scattering enabled, y = white furnace enabled.
    pub multiple_scattering: Vec4,
}

impl MaterialUniforms {
    pub fn new(
        factors: &MaterialFactors,
        bound: TextureRoles,
        multiple_scattering: bool,
        white_furnace: bool,
    ) -> Self {
        Self {
            base_color_factor: factors.base_color,
            met_rough_nor_occ_factor: Vec4::new(
                factors.metallic,
                factors.roughness,
                factors.normal_scale,
                factors.occlusion_strength,
            ),
            emissive_factor: factors.emissive.extend(0.0),
            has_textures: Vec4::new(bound.bits() as f32, 0.0, 0.0, 0.0),
            multiple_scattering: Vec4::new(
                f32::from(u8::from(multiple_scattering)),
                f32::from(u8::from(white_furnace)),
                0.0,
                0.0,
            ),
        }
    }

    pub fn bound_textures(&self) -> TextureRoles {
        TextureRoles::from_bits_truncate(self.has_textures.x as u32)
    }

    pub fn white_furnace(&self) -> bool {
        self.multiple_scattering.y > 0.5
    }

    /// Material math of the fragment stage. `normal` is the world-space
    /// normal after normal mapping.
    pub fn surface(&self, samples: &TextureSamples, normal: Vec3, depth: f32) -> Surface {
        let bound = self.bound_textures();
        let pick = |role: TextureRoles, sample: Vec4| {
            if bound.contains(role) { sample } else { Vec4::ONE }
        };

        let base = self.base_color_factor * pick(TextureRoles::BASE_COLOR, samples.base_color);
        let mr = pick(TextureRoles::METALLIC_ROUGHNESS, samples.metallic_roughness);
        // glTF channel layout: roughness in green, metallic in blue
        let metallic = (self.met_rough_nor_occ_factor.x * mr.z).clamp(0.0, 1.0);
        let roughness = (self.met_rough_nor_occ_factor.y * mr.y).clamp(0.0, 1.0);
        let ao = pick(TextureRoles::OCCLUSION, Vec4::splat(samples.occlusion)).x;
        let occlusion = 1.0 + self.met_rough_nor_occ_factor.w * (ao - 1.0);
        let emissive = self.emissive_factor.truncate()
            * pick(TextureRoles::EMISSIVE, samples.emissive.extend(1.0)).truncate();

        let base_color = if self.white_furnace() {
            Vec3::ONE
        } else {
            base.truncate()
        };

        Surface {
            base_color,
            metallic,
            roughness,
            normal: normal.try_normalize().unwrap_or(Vec3::Z),
            emissive,
            occlusion,
            depth,
        }
    }
}

/// Texture samples at one fragment. Unbound roles read as white.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureSamples {
    pub base_color: Vec4,
    pub metallic_roughness: Vec4,
    pub occlusion: f32,
    pub emissive: Vec3,
}

impl Default for TextureSamples {
    fn default() -> Self {
        Self {
            base_color: Vec4::ONE,
            metallic_roughness: Vec4::ONE,
            occlusion: 1.0,
            emissive: Vec3::ONE,
        }
    }
}

/// Shaded surface properties before packing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surface {
    pub base_color: Vec3,
    pub metallic: f32,
    /// Perceptual roughness in [0, 1].
    pub roughness: f32,
    /// Unit world-space normal.
    pub normal: Vec3,
    pub emissive: Vec3,
    pub occlusion: f32,
    /// Window-space depth in [0, 1].
    pub depth: f32,
}

/// One texel of every attachment, at the attachment's storage precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GBufferTexel {
    /// Rgba8Unorm: diffuse color, remapped roughness.
    pub diffuse_roughness: [u8; 4],
    /// Rg16Float: octahedral normal.
    pub normal: [f16; 2],
    /// Rgba8Unorm: F0, metallic.
    pub f0_metallic: [u8; 4],
    /// Rgba16Float: emissive, occlusion.
    pub emissive_occlusion: [f16; 4],
    /// R32Float.
    pub depth: f32,
}

/// What lighting reads back out of a [`GBufferTexel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedTexel {
    pub diffuse: Vec3,
    /// Perceptual roughness, recovered from its squared encoding.
    pub roughness: f32,
    pub normal: Vec3,
    pub f0: Vec3,
    pub metallic: f32,
    pub emissive: Vec3,
    pub occlusion: f32,
    pub depth: f32,
}

fn unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn from_unorm8(v: u8) -> f32 {
    f32::from(v) / 255.0
}

/// Octahedral projection of a unit vector onto [-1, 1]^2.
pub fn octahedral_encode(n: Vec3) -> Vec2 {
    let n = n / (n.x.abs() + n.y.abs() + n.z.abs());
    let xy = n.truncate();
    if n.z >= 0.0 {
        xy
    } else {
        let sign = Vec2::new(
            if xy.x >= 0.0 { 1.0 } else { -1.0 },
            if xy.y >= 0.0 { 1.0 } else { -1.0 },
        );
        (Vec2::ONE - Vec2::new(xy.y, xy.x).abs()) * sign
    }
}

pub fn octahedral_decode(e: Vec2) -> Vec3 {
    let mut n = Vec3::new(e.x, e.y, 1.0 - e.x.abs() - e.y.abs());
    let t = (-n.z).max(0.0);
    n.x += if n.x >= 0.0 { -t } else { t };
    n.y += if n.y >= 0.0 { -t } else { t };
    n.normalize()
}

pub fn encode(surface: &Surface) -> GBufferTexel {
    let m = surface.metallic.clamp(0.0, 1.0);
    let diffuse = surface.base_color * (1.0 - m);
    let f0 = Vec3::splat(DIELECTRIC_F0).lerp(surface.base_color, m);
    let alpha = surface.roughness * surface.roughness;
    let oct = octahedral_encode(surface.normal);

    GBufferTexel {
        diffuse_roughness: [unorm8(diffuse.x), unorm8(diffuse.y), unorm8(diffuse.z), unorm8(alpha)],
        normal: [f16::from_f32(oct.x), f16::from_f32(oct.y)],
        f0_metallic: [unorm8(f0.x), unorm8(f0.y), unorm8(f0.z), unorm8(m)],
        emissive_occlusion: [
            f16::from_f32(surface.emissive.x),
            f16::from_f32(surface.emissive.y),
            f16::from_f32(surface.emissive.z),
            f16::from_f32(surface.occlusion),
        ],
        depth: surface.depth,
    }
}

pub fn decode(texel: &GBufferTexel) -> DecodedTexel {
    let [r, g, b, a] = texel.diffuse_roughness.map(from_unorm8);
    let [fr, fg, fb, m] = texel.f0_metallic.map(from_unorm8);
    let [er, eg, eb, ao] = texel.emissive_occlusion.map(f16::to_f32);
    DecodedTexel {
        diffuse: Vec3::new(r, g, b),
        roughness: a.sqrt(),
        normal: octahedral_decode(Vec2::new(texel.normal[0].to_f32(), texel.normal[1].to_f32())),
        f0: Vec3::new(fr, fg, fb),
        metallic: m,
        emissive: Vec3::new(er, eg, eb),
        occlusion: ao,
        depth: texel.depth,
    }
}
