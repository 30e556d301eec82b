//! Bit-flag configuration constants.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Window creation states.
    ///
    /// The values are shared with existing window configuration files and
    /// overlap on purpose; `DEFAULT` enables every state.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct WindowFlags: u32 {
        const CENTERED       = 0x0001_0000;
        const RESIZABLE      = 0x0002_0000;
        const MOVABLE        = 0x0003_0000;
        const CLOSABLE       = 0x0004_0000;
        const MINIMIZABLE    = 0x0005_0000;
        const MAXIMIZABLE    = 0x0006_0000;
        const CAN_FULLSCREEN = 0x0007_0000;
        const DEFAULT = Self::CENTERED.bits()
            | Self::RESIZABLE.bits()
            | Self::MOVABLE.bits()
            | Self::CLOSABLE.bits()
            | Self::MINIMIZABLE.bits()
            | Self::MAXIMIZABLE.bits()
            | Self::CAN_FULLSCREEN.bits();
    }
}

bitflags! {
    /// Material render states.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MaterialFlags: u32 {
        const BLEND        = 0x0001_0000;
        const DOUBLE_SIDED = 0x0002_0000;
    }
}

bitflags! {
    /// Texture creation and sampling flags, passed through opaquely to the
    /// GPU backend.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct TextureFlags: u64 {
        const U_CLAMP       = 1 << 0;
        const V_CLAMP       = 1 << 1;
        const W_CLAMP       = 1 << 2;
        const U_MIRROR      = 1 << 3;
        const V_MIRROR      = 1 << 4;
        const W_MIRROR      = 1 << 5;
        const MIN_POINT     = 1 << 6;
        const MAG_POINT     = 1 << 7;
        const MIP_POINT     = 1 << 8;
        const SRGB          = 1 << 9;
        const RENDER_TARGET = 1 << 10;
        const READ_BACK     = 1 << 11;
        const COMPUTE_WRITE = 1 << 12;
        const UVW_CLAMP = Self::U_CLAMP.bits() | Self::V_CLAMP.bits() | Self::W_CLAMP.bits();
        const POINT = Self::MIN_POINT.bits() | Self::MAG_POINT.bits() | Self::MIP_POINT.bits();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_default_covers_every_state() {
        assert_eq!(WindowFlags::DEFAULT.bits(), 0x0007_0000);
        assert!(WindowFlags::DEFAULT.contains(WindowFlags::RESIZABLE));
    }

    #[test]
    fn material_flags_roundtrip_json() {
        let flags = MaterialFlags::DOUBLE_SIDED;
        let json = serde_json::to_string(&flags).unwrap();
        let back: MaterialFlags = serde_json::from_str(&json).unwrap();
        assert_eq!(back, flags);
    }
}
