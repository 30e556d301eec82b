//! Opaque GPU object handles.
//!
//! Every handle is a plain index with a reserved invalid sentinel. An invalid
//! handle is a normal, checkable value: the texture cache hands one out for a
//! path that failed to load, and consumers test it with `is_valid()`.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! gpu_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// The sentinel returned when creation failed or nothing exists.
            pub const INVALID: Self = Self(u32::MAX);

            pub const fn new(index: u32) -> Self {
                Self(index)
            }

            pub const fn index(self) -> u32 {
                self.0
            }

            pub const fn is_valid(self) -> bool {
                self.0 != u32::MAX
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, "{}({})", stringify!($name), self.0)
                } else {
                    write!(f, "{}(INVALID)", stringify!($name))
                }
            }
        }
    };
}

gpu_handle!(
    /// A GPU-resident 2D, 3D or cube texture.
    TextureHandle
);
gpu_handle!(
    /// A set of render-target attachments drawn into together.
    FrameBufferHandle
);
gpu_handle!(
    /// A linked shader program.
    ProgramHandle
);
gpu_handle!(
    /// A named shader uniform or sampler slot.
    UniformHandle
);
gpu_handle!(
    /// Vertex and index buffers for one drawable mesh.
    GeometryHandle
);

/// Identifies a render view (one render target plus its per-frame state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ViewId(pub u16);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_handle_is_invalid() {
        assert!(!TextureHandle::default().is_valid());
        assert_eq!(TextureHandle::default(), TextureHandle::INVALID);
    }

    #[test]
    fn indexed_handle_is_valid() {
        let h = ProgramHandle::new(3);
        assert!(h.is_valid());
        assert_eq!(h.index(), 3);
        assert_eq!(format!("{h:?}"), "ProgramHandle(3)");
        assert_eq!(format!("{:?}", GeometryHandle::INVALID), "GeometryHandle(INVALID)");
    }
}
