use std::io;

/// Errors from the image decoder collaborator.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unrecognized image container")]
    UnknownContainer,
    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),
    #[error("malformed image: {0}")]
    Malformed(String),
}

/// Errors from asset operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("cannot open {path}: {source}")]
    NotFound {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
