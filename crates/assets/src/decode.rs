//! Image decoding collaborator.
//!
//! A decoder turns raw file bytes into a [`DecodedImage`]: a container
//! description (format, extent, mips, layers, cubemap flag, orientation) plus
//! the owned pixel payload. Decoding never touches GPU state.

use crate::error::DecodeError;
use lumen_common::PixelFormat;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// How the stored pixels must be rotated/flipped to appear upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    R0,
    R90,
    R180,
    R270,
    HFlip,
    HFlipR90,
    HFlipR270,
    VFlip,
}

/// Immutable result of parsing an image container.
///
/// Payload layout: for each layer (and each of the six faces for cubemaps),
/// the full mip chain from largest to smallest.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    format: PixelFormat,
    width: u32,
    height: u32,
    depth: u32,
    num_mips: u32,
    num_layers: u32,
    cube_map: bool,
    orientation: Orientation,
    data: Vec<u8>,
}

impl DecodedImage {
    /// A single-layer, single-mip 2D image.
    pub fn new(format: PixelFormat, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            format,
            width,
            height,
            depth: 1,
            num_mips: 1,
            num_layers: 1,
            cube_map: false,
            orientation: Orientation::R0,
            data,
        }
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth.max(1);
        self
    }

    pub fn with_mips(mut self, num_mips: u32) -> Self {
        self.num_mips = num_mips.max(1);
        self
    }

    pub fn with_layers(mut self, num_layers: u32) -> Self {
        self.num_layers = num_layers.max(1);
        self
    }

    pub fn with_cube_map(mut self, cube_map: bool) -> Self {
        self.cube_map = cube_map;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn num_mips(&self) -> u32 {
        self.num_mips
    }

    pub fn has_mips(&self) -> bool {
        self.num_mips > 1
    }

    pub fn num_layers(&self) -> u32 {
        self.num_layers
    }

    pub fn is_cube_map(&self) -> bool {
        self.cube_map
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Storage size implied by the container description. A cube map's
    /// depth is ignored: its payload is six faces per layer.
    pub fn expected_size(&self) -> u64 {
        let (faces, depth) = if self.cube_map { (6, 1) } else { (1, self.depth) };
        self.format
            .mip_chain_size(self.width, self.height, depth, self.num_mips)
            * u64::from(self.num_layers)
            * faces
    }

    /// Give up the description and keep the payload.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// Parses raw bytes into a [`DecodedImage`].
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, DecodeError>;
}

/// Decoder for the common 2D interchange formats handled by the `image`
/// crate (PNG, JPEG, Radiance HDR).
///
/// 8-bit sources decode to `Rgba8` (single-channel to `R8`), 16-bit sources
/// to `Rgba16`, floating-point sources to `Rgba32F`. Results are always
/// single-mip, single-layer and non-cube.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDecoder;

impl ImageDecoder for StandardDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
        use image::ImageDecoder as _;

        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(image::ImageError::IoError)?;
        if reader.format().is_none() {
            return Err(DecodeError::UnknownContainer);
        }
        let mut decoder = reader.into_decoder()?;
        let orientation = decoder
            .orientation()
            .map(from_exif_orientation)
            .unwrap_or_default();
        let image = image::DynamicImage::from_decoder(decoder)?;
        let (width, height) = (image.width(), image.height());

        let (format, data) = match image.color() {
            image::ColorType::L8 => (PixelFormat::R8, image.into_luma8().into_raw()),
            image::ColorType::Rgb32F | image::ColorType::Rgba32F => {
                let pixels = image.into_rgba32f().into_raw();
                (PixelFormat::Rgba32F, bytemuck::cast_slice::<_, u8>(&pixels).to_vec())
            }
            image::ColorType::L16
            | image::ColorType::La16
            | image::ColorType::Rgb16
            | image::ColorType::Rgba16 => {
                let pixels = image.into_rgba16().into_raw();
                (PixelFormat::Rgba16, bytemuck::cast_slice::<_, u8>(&pixels).to_vec())
            }
            _ => (PixelFormat::Rgba8, image.into_rgba8().into_raw()),
        };

        tracing::trace!(width, height, ?format, "decoded image");
        Ok(DecodedImage::new(format, width, height, data).with_orientation(orientation))
    }
}

fn from_exif_orientation(orientation: image::metadata::Orientation) -> Orientation {
    use image::metadata::Orientation as Exif;
    match orientation {
        Exif::NoTransforms => Orientation::R0,
        Exif::Rotate90 => Orientation::R90,
        Exif::Rotate180 => Orientation::R180,
        Exif::Rotate270 => Orientation::R270,
        Exif::FlipHorizontal => Orientation::HFlip,
        Exif::FlipVertical => Orientation::VFlip,
        Exif::Rotate90FlipH => Orientation::HFlipR90,
        Exif::Rotate270FlipH => Orientation::HFlipR270,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn decodes_png_as_rgba8() {
        let image = StandardDecoder.decode(&png_bytes(4, 2)).unwrap();
        assert_eq!(image.format(), PixelFormat::Rgba8);
        assert_eq!((image.width(), image.height(), image.depth()), (4, 2, 1));
        assert_eq!(image.num_mips(), 1);
        assert!(!image.is_cube_map());
        assert_eq!(image.data().len() as u64, image.expected_size());
        assert_eq!(&image.data()[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn garbage_is_rejected() {
        let err = StandardDecoder.decode(b"not an image at all").unwrap_err();
        assert!(matches!(err, DecodeError::UnknownContainer));
    }

    #[test]
    fn truncated_png_fails() {
        let bytes = png_bytes(8, 8);
        assert!(StandardDecoder.decode(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn cube_expected_size_counts_faces_and_mips() {
        let image = DecodedImage::new(PixelFormat::Rgba8, 4, 4, Vec::new())
            .with_cube_map(true)
            .with_mips(3);
        assert_eq!(image.expected_size(), (16 + 4 + 1) * 4 * 6);
        assert!(image.has_mips());
    }

    #[test]
    fn cube_expected_size_ignores_depth() {
        let image = DecodedImage::new(PixelFormat::Rgba8, 4, 4, Vec::new())
            .with_cube_map(true)
            .with_depth(4);
        assert_eq!(image.expected_size(), 4 * 4 * 4 * 6);
    }
}
