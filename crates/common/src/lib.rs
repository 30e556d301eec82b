//! Shared vocabulary for the lumen renderer: GPU handles, pixel formats,
//! bit-flag constants, transforms and the headless window stub.

pub mod flags;
pub mod format;
pub mod handles;
pub mod types;
pub mod window;

pub use flags::{MaterialFlags, TextureFlags, WindowFlags};
pub use format::{BlockInfo, PixelFormat, max_mip_count};
pub use handles::{
    FrameBufferHandle, GeometryHandle, ProgramHandle, TextureHandle, UniformHandle, ViewId,
};
pub use types::Transform;
pub use window::{HeadlessWindow, WindowDesc};
