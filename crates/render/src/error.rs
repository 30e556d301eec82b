use lumen_common::PixelFormat;
use serde::{Deserialize, Serialize};

/// Errors raised by a GPU backend or while building render resources.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("unsupported texture: {format:?} ({reason})")]
    UnsupportedTexture {
        format: PixelFormat,
        reason: &'static str,
    },
    #[error("payload size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("invalid {kind} handle")]
    InvalidHandle { kind: &'static str },
    #[error("unknown shader program: {0}")]
    UnknownProgram(String),
    #[error("frame buffer needs at least one attachment")]
    EmptyFrameBuffer,
    #[error("gpu device error: {0}")]
    Device(String),
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Why a texture path resolved to the invalid handle.
///
/// Failures never propagate as errors out of the cache; they are recorded
/// next to the cached entry and reported through the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadFailure {
    /// The file could not be opened or read.
    ResourceNotFound,
    /// The bytes were not a recognized or well-formed image container.
    DecodeFailure,
    /// The backend cannot create the decoded shape/format/flag combination.
    UnsupportedFormat,
}

impl std::fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ResourceNotFound => "resource not found",
            Self::DecodeFailure => "decode failure",
            Self::UnsupportedFormat => "unsupported format",
        };
        f.write_str(s)
    }
}
