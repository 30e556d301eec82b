//! File-access collaborator.
//!
//! The texture cache never touches `std::fs` directly; it goes through
//! [`FileSystem`] so tests can count opens and inject failures.

use crate::error::AssetError;
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;

/// Opens files by path. Implementations must be shareable across loader threads.
pub trait FileSystem: Send + Sync {
    fn open(&self, path: &str) -> io::Result<Box<dyn FileReader>>;
}

/// An open, readable file.
pub trait FileReader: Send {
    /// Total payload size in bytes.
    fn size(&self) -> io::Result<u64>;

    /// Fill `buf` completely or fail.
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()>;

    /// Release the underlying stream.
    fn close(self: Box<Self>) {}
}

/// Reads the entire payload of `path`: open, size, read, close.
pub fn load_bytes(fs: &dyn FileSystem, path: &str) -> Result<Vec<u8>, AssetError> {
    let mut reader = fs.open(path).map_err(|source| AssetError::NotFound {
        path: path.to_string(),
        source,
    })?;
    let size = usize::try_from(reader.size()?)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "file too large"))?;
    let mut data = vec![0u8; size];
    reader.read_exact(&mut data)?;
    reader.close();
    Ok(data)
}

/// [`FileSystem`] backed by the host file system.
///
/// Relative paths resolve against `root` when one is set. The path string
/// itself is passed through untouched; no canonicalization happens here.
#[derive(Debug, Clone, Default)]
pub struct StdFileSystem {
    root: Option<PathBuf>,
}

impl StdFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(path),
            None => PathBuf::from(path),
        }
    }
}

impl FileSystem for StdFileSystem {
    fn open(&self, path: &str) -> io::Result<Box<dyn FileReader>> {
        let file = File::open(self.resolve(path))?;
        Ok(Box::new(StdFileReader { file }))
    }
}

struct StdFileReader {
    file: File,
}

impl FileReader for StdFileReader {
    fn size(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.file.read_exact(buf)
    }
}
