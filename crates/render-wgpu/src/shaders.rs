/// WGSL source of the G-buffer program.
///
/// Group 0 is the per-draw uniform block: the model and view-projection
/// matrices the backend prepends, then the program's declared uniforms in
/// order. Group 1 holds one texture/sampler pair per declared sampler.
/// Outputs follow the five-attachment packing mirrored by
/// `lumen_render::packing`.
pub const GBUFFER_SHADER: &str = r#"
struct Draw {
    model: mat4x4<f32>,
    view_proj: mat4x4<f32>,
    normal_matrix: mat3x3<f32>,
    base_color_factor: vec4<f32>,
    met_rough_nor_occ_factor: vec4<f32>,
    emissive_factor: vec4<f32>,
    has_textures: vec4<f32>,
    multiple_scattering: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> draw: Draw;

@group(1) @binding(0) var t_base_color: texture_2d<f32>;
@group(1) @binding(1) var s_base_color: sampler;
@group(1) @binding(2) var t_metallic_roughness: texture_2d<f32>;
@group(1) @binding(3) var s_metallic_roughness: sampler;
@group(1) @binding(4) var t_normal: texture_2d<f32>;
@group(1) @binding(5) var s_normal: sampler;
@group(1) @binding(6) var t_occlusion: texture_2d<f32>;
@group(1) @binding(7) var s_occlusion: sampler;
@group(1) @binding(8) var t_emissive: texture_2d<f32>;
@group(1) @binding(9) var s_emissive: sampler;

const BASE_COLOR: u32 = 1u;
const METALLIC_ROUGHNESS: u32 = 2u;
const NORMAL: u32 = 4u;
const OCCLUSION: u32 = 8u;
const EMISSIVE: u32 = 16u;
const DIELECTRIC_F0: f32 = 0.04;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) tangent: vec4<f32>,
    @location(3) uv: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) normal: vec3<f32>,
    @location(1) tangent: vec4<f32>,
    @location(2) uv: vec2<f32>,
};

struct GBufferOutput {
    @location(0) diffuse_roughness: vec4<f32>,
    @location(1) normal: vec2<f32>,
    @location(2) f0_metallic: vec4<f32>,
    @location(3) emissive_occlusion: vec4<f32>,
    @location(4) depth: f32,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = draw.view_proj * draw.model * vec4<f32>(in.position, 1.0);
    out.normal = draw.normal_matrix * in.normal;
    out.tangent = vec4<f32>((draw.model * vec4<f32>(in.tangent.xyz, 0.0)).xyz, in.tangent.w);
    out.uv = in.uv;
    return out;
}

fn has(bound: u32, role: u32) -> bool {
    return (bound & role) != 0u;
}

fn octahedral_encode(n_in: vec3<f32>) -> vec2<f32> {
    let n = n_in / (abs(n_in.x) + abs(n_in.y) + abs(n_in.z));
    if n.z >= 0.0 {
        return n.xy;
    }
    let signs = select(vec2<f32>(-1.0), vec2<f32>(1.0), n.xy >= vec2<f32>(0.0));
    return (vec2<f32>(1.0) - abs(n.yx)) * signs;
}

@fragment
fn fs_main(in: VertexOutput) -> GBufferOutput {
    let bound = u32(draw.has_textures.x);
    let white = vec4<f32>(1.0);

    let base_sample = textureSample(t_base_color, s_base_color, in.uv);
    let mr_sample = textureSample(t_metallic_roughness, s_metallic_roughness, in.uv);
    let normal_sample = textureSample(t_normal, s_normal, in.uv);
    let ao_sample = textureSample(t_occlusion, s_occlusion, in.uv);
    let emissive_sample = textureSample(t_emissive, s_emissive, in.uv);

    var base = draw.base_color_factor * select(white, base_sample, has(bound, BASE_COLOR));
    let mr = select(white, mr_sample, has(bound, METALLIC_ROUGHNESS));
    let metallic = clamp(draw.met_rough_nor_occ_factor.x * mr.b, 0.0, 1.0);
    let roughness = clamp(draw.met_rough_nor_occ_factor.y * mr.g, 0.0, 1.0);
    let ao = select(1.0, ao_sample.r, has(bound, OCCLUSION));
    let occlusion = 1.0 + draw.met_rough_nor_occ_factor.w * (ao - 1.0);
    let emissive = draw.emissive_factor.rgb
        * select(vec3<f32>(1.0), emissive_sample.rgb, has(bound, EMISSIVE));

    if draw.multiple_scattering.y > 0.5 {
        base = vec4<f32>(1.0, 1.0, 1.0, base.a);
    }

    var n = normalize(in.normal);
    if has(bound, NORMAL) {
        let t = normalize(in.tangent.xyz - n * dot(n, in.tangent.xyz));
        let b = cross(n, t) * in.tangent.w;
        var ts = normal_sample.xyz * 2.0 - 1.0;
        ts = vec3<f32>(ts.xy * draw.met_rough_nor_occ_factor.z, ts.z);
        n = normalize(mat3x3<f32>(t, b, n) * ts);
    }

    let diffuse = base.rgb * (1.0 - metallic);
    let f0 = mix(vec3<f32>(DIELECTRIC_F0), base.rgb, metallic);

    var out: GBufferOutput;
    out.diffuse_roughness = vec4<f32>(diffuse, roughness * roughness);
    out.normal = octahedral_encode(n);
    out.f0_metallic = vec4<f32>(f0, metallic);
    out.emissive_occlusion = vec4<f32>(emissive, occlusion);
    out.depth = in.clip_position.z;
    return out;
}
"#;

/// Shader source for a program's shader name.
pub fn source(shader: &str) -> Option<&'static str> {
    match shader {
        lumen_render::gbuffer::GBUFFER_SHADER => Some(GBUFFER_SHADER),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_render::gbuffer::{SAMPLER_NAMES, U_MULTIPLE_SCATTERING};

    #[test]
    fn gbuffer_shader_is_registered() {
        assert!(source("gbuffer").is_some());
        assert!(source("tonemap").is_none());
    }

    #[test]
    fn shader_declares_every_sampler() {
        for name in SAMPLER_NAMES {
            assert!(GBUFFER_SHADER.contains(&format!("var {name}: sampler")), "{name}");
        }
        let field = U_MULTIPLE_SCATTERING.trim_start_matches("u_");
        assert!(GBUFFER_SHADER.contains(field));
    }
}
