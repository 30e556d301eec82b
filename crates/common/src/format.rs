//! GPU-compatible pixel formats and storage-size arithmetic.

use serde::{Deserialize, Serialize};

/// Pixel formats a decoded image or render target may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    Bc1,
    Bc2,
    Bc3,
    Bc4,
    Bc5,
    Bc6h,
    Bc7,
    Etc2,
    Astc4x4,
    R8,
    Rg8,
    Rgba8,
    Bgra8,
    R16F,
    Rg16F,
    Rgba16,
    Rgba16F,
    R32F,
    Rg32F,
    Rgba32F,
    D24S8,
    D32F,
}

/// Compression block footprint of a format. Uncompressed formats use 1x1 blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub width: u32,
    pub height: u32,
    pub bytes: u32,
}

impl PixelFormat {
    pub fn block_info(self) -> BlockInfo {
        let (width, height, bytes) = match self {
            Self::Bc1 | Self::Bc4 => (4, 4, 8),
            Self::Bc2 | Self::Bc3 | Self::Bc5 | Self::Bc6h | Self::Bc7 => (4, 4, 16),
            Self::Etc2 => (4, 4, 8),
            Self::Astc4x4 => (4, 4, 16),
            Self::R8 => (1, 1, 1),
            Self::Rg8 | Self::R16F => (1, 1, 2),
            Self::Rgba8 | Self::Bgra8 | Self::Rg16F | Self::R32F | Self::D24S8 | Self::D32F => {
                (1, 1, 4)
            }
            Self::Rgba16 | Self::Rgba16F | Self::Rg32F => (1, 1, 8),
            Self::Rgba32F => (1, 1, 16),
        };
        BlockInfo {
            width,
            height,
            bytes,
        }
    }

    pub fn is_compressed(self) -> bool {
        self.block_info().width > 1
    }

    pub fn is_depth(self) -> bool {
        matches!(self, Self::D24S8 | Self::D32F)
    }

    /// Average storage cost per pixel in bits.
    pub fn bits_per_pixel(self) -> u32 {
        let b = self.block_info();
        b.bytes * 8 / (b.width * b.height)
    }

    /// Bytes occupied by a single mip of the given size (one layer/face).
    pub fn mip_size(self, width: u32, height: u32, depth: u32) -> u64 {
        let b = self.block_info();
        let bw = width.max(1).div_ceil(b.width) as u64;
        let bh = height.max(1).div_ceil(b.height) as u64;
        bw * bh * depth.max(1) as u64 * b.bytes as u64
    }

    /// Bytes occupied by `mips` levels starting at the given base size (one layer/face).
    /// Levels past the 1x1x1 tail each count as a single texel.
    pub fn mip_chain_size(self, width: u32, height: u32, depth: u32, mips: u32) -> u64 {
        let shrink = |extent: u32, level: u32| extent.checked_shr(level).unwrap_or(0).max(1);
        (0..mips.max(1))
            .map(|level| {
                self.mip_size(
                    shrink(width, level),
                    shrink(height, level),
                    shrink(depth, level),
                )
            })
            .sum()
    }
}

/// Length of a full mip chain for the given base size, down to 1x1x1.
pub fn max_mip_count(width: u32, height: u32, depth: u32) -> u32 {
    let largest = width.max(height).max(depth).max(1);
    32 - largest.leading_zeros()
}
