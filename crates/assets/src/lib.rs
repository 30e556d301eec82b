//! Asset-side collaborators of the renderer.
//!
//! - [`io`]: file access behind the [`FileSystem`] trait.
//! - [`decode`]: container decoding into [`DecodedImage`].
//! - [`material`]: resolved materials and the [`MaterialStore`] arena.
//! - [`library`]: JSON material descriptions referencing texture paths.
//!
//! # Invariants
//! - Decoding is a pure function of the input bytes.
//! - Material keys never alias: a removed slot resolves to nothing.

pub mod error;
pub mod decode;
pub mod io;
pub mod library;
pub mod material;

pub use error::{AssetError, DecodeError};
pub use decode::{DecodedImage, ImageDecoder, Orientation, StandardDecoder};
pub use io::{FileReader, FileSystem, StdFileSystem, load_bytes};
pub use library::{MaterialDesc, MaterialLibrary};
pub use material::{Material, MaterialFactors, MaterialId, MaterialStore, TextureRole, TextureRoles};

pub fn crate_info() -> &'static str {
    "lumen-assets v0.1.0"
}
