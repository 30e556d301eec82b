//! wgpu implementation of the lumen GPU backend.
//!
//! - [`format`]: pixel formats, flags and shapes mapped onto wgpu types.
//! - [`shaders`]: WGSL sources looked up by program shader name.
//! - [`WgpuBackend`]: the [`lumen_render::GpuBackend`] on a wgpu device.
//!
//! # Invariants
//! - Draws are recorded at submit and only reach the device at `frame`.
//! - A draw with an unusable geometry or program handle is skipped, never fatal.
//! - A sampler stage with an unusable texture binds a 1x1 white fallback.

pub mod format;
mod gpu;
pub mod shaders;

pub use gpu::{
    SampleRejection, WgpuBackend, align_to, block_layout, sample_rejection, uniform_size,
    write_uniform,
};

pub fn crate_info() -> &'static str {
    "lumen-render-wgpu v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("wgpu"));
    }
}
