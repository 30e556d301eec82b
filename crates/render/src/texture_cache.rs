//! Path-keyed texture cache: decode once, upload once, remember failures.

use crate::backend::{GpuBackend, GpuMemory, TextureCreateInfo, TextureShape, truncate_name};
use crate::error::LoadFailure;
use lumen_assets::{DecodedImage, FileSystem, ImageDecoder, Orientation, load_bytes};
use lumen_common::{PixelFormat, TextureFlags, TextureHandle, max_mip_count};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Storage facts about a decoded texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextureInfo {
    pub format: PixelFormat,
    /// Bytes of the whole payload: every mip of every layer and face.
    pub storage_size: u64,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub num_layers: u32,
    pub num_mips: u32,
    pub bits_per_pixel: u32,
    pub cube_map: bool,
}

impl TextureInfo {
    /// Describe the texture a creation request produces. Sizes follow the
    /// chosen creation path, so a cube map never reports a depth.
    pub fn from_creation(info: &TextureCreateInfo) -> Self {
        let shape = &info.shape;
        Self {
            format: info.format,
            storage_size: info.storage_size(),
            width: shape.width(),
            height: shape.height(),
            depth: shape.depth(),
            num_layers: shape.num_layers(),
            num_mips: info.num_mips,
            bits_per_pixel: info.format.bits_per_pixel(),
            cube_map: shape.is_cube(),
        }
    }
}

/// Result of an acquire: the handle plus what was learned while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedTexture {
    pub handle: TextureHandle,
    /// `None` when the file could not be decoded.
    pub info: Option<TextureInfo>,
    pub orientation: Orientation,
}

impl LoadedTexture {
    fn invalid() -> Self {
        Self {
            handle: TextureHandle::INVALID,
            info: None,
            orientation: Orientation::default(),
        }
    }
}

/// Which creation path a decoded image takes.
///
/// Cube maps win over volume textures; only plain 2D textures are checked
/// against the backend's support query before creation.
pub fn creation_info(image: &DecodedImage, flags: TextureFlags) -> TextureCreateInfo {
    let shape = if image.is_cube_map() {
        TextureShape::Cube {
            size: image.width(),
            num_layers: image.num_layers(),
        }
    } else if image.depth() > 1 {
        TextureShape::D3 {
            width: image.width(),
            height: image.height(),
            depth: image.depth(),
        }
    } else {
        TextureShape::D2 {
            width: image.width(),
            height: image.height(),
            num_layers: image.num_layers(),
        }
    };
    TextureCreateInfo {
        shape,
        num_mips: image.num_mips().max(1),
        format: image.format(),
        flags,
    }
}

/// Counters since the cache was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub failures: u64,
    pub bytes_uploaded: u64,
    pub bytes_released: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    failures: AtomicU64,
    bytes_uploaded: AtomicU64,
    bytes_released: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    loaded: LoadedTexture,
    failure: Option<LoadFailure>,
}

/// A load in progress. Waiters block on `done` until `result` is filled.
#[derive(Debug, Default)]
struct Flight {
    result: Mutex<Option<LoadedTexture>>,
    done: Condvar,
}

impl Flight {
    fn complete(&self, loaded: LoadedTexture) {
        *self.result.lock() = Some(loaded);
        self.done.notify_all();
    }

    fn wait(&self) -> LoadedTexture {
        let mut result = self.result.lock();
        loop {
            if let Some(loaded) = *result {
                return loaded;
            }
            self.done.wait(&mut result);
        }
    }
}

#[derive(Debug)]
enum Slot {
    Loading(Arc<Flight>),
    Ready(Entry),
}

/// Unblocks waiters if the loading thread unwinds before publishing.
struct FlightGuard<'a> {
    cache: &'a TextureCache,
    path: &'a str,
    flight: Arc<Flight>,
    published: bool,
}

impl FlightGuard<'_> {
    fn publish(mut self, entry: Entry) -> LoadedTexture {
        self.cache
            .slots
            .lock()
            .insert(self.path.to_owned(), Slot::Ready(entry));
        self.flight.complete(entry.loaded);
        self.published = true;
        entry.loaded
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !self.published {
            self.cache.slots.lock().remove(self.path);
            self.flight.complete(LoadedTexture::invalid());
        }
    }
}

/// Maps file paths to GPU textures.
///
/// Each distinct path is read, decoded and uploaded at most once for the
/// lifetime of the cache. Failures are cached too: a path that failed keeps
/// returning [`TextureHandle::INVALID`] without touching the file system
/// again until [`invalidate`](Self::invalidate) is called.
///
/// Concurrent `acquire` calls are safe. The map lock is only held to look up
/// or publish an entry; a second caller for a path already loading waits for
/// that load instead of starting its own.
///
/// Dropping the cache destroys every texture it created.
pub struct TextureCache {
    backend: Arc<dyn GpuBackend>,
    fs: Arc<dyn FileSystem>,
    decoder: Arc<dyn ImageDecoder>,
    slots: Mutex<HashMap<String, Slot>>,
    counters: Arc<Counters>,
}

enum Role {
    Leader(Arc<Flight>),
    Waiter(Arc<Flight>),
}

impl TextureCache {
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        fs: Arc<dyn FileSystem>,
        decoder: Arc<dyn ImageDecoder>,
    ) -> Self {
        Self {
            backend,
            fs,
            decoder,
            slots: Mutex::new(HashMap::new()),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Texture for `path`, loading it on first request. Returns the invalid
    /// handle if the file cannot be read, decoded or created.
    pub fn acquire(&self, path: &str, flags: TextureFlags) -> TextureHandle {
        self.acquire_with_info(path, flags).handle
    }

    /// Like [`acquire`](Self::acquire), also returning storage info and
    /// orientation. Flags only matter on the first request for a path.
    pub fn acquire_with_info(&self, path: &str, flags: TextureFlags) -> LoadedTexture {
        let role = {
            let mut slots = self.slots.lock();
            match slots.get(path) {
                Some(Slot::Ready(entry)) => {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(path, handle = ?entry.loaded.handle, "texture cache hit");
                    return entry.loaded;
                }
                Some(Slot::Loading(flight)) => Role::Waiter(Arc::clone(flight)),
                None => {
                    let flight = Arc::new(Flight::default());
                    slots.insert(path.to_owned(), Slot::Loading(Arc::clone(&flight)));
                    Role::Leader(flight)
                }
            }
        };

        match role {
            Role::Waiter(flight) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(path, "waiting for in-flight texture load");
                flight.wait()
            }
            Role::Leader(flight) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                let guard = FlightGuard {
                    cache: self,
                    path,
                    flight,
                    published: false,
                };
                let entry = self.load(path, flags);
                if entry.failure.is_some() {
                    self.counters.failures.fetch_add(1, Ordering::Relaxed);
                }
                guard.publish(entry)
            }
        }
    }

    fn load(&self, path: &str, flags: TextureFlags) -> Entry {
        let _span = tracing::info_span!("texture_load", path).entered();
        let fail = |failure, loaded| Entry {
            loaded,
            failure: Some(failure),
        };

        let bytes = match load_bytes(self.fs.as_ref(), path) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!("failed to open texture {path}: {err}");
                return fail(LoadFailure::ResourceNotFound, LoadedTexture::invalid());
            }
        };
        let image = match self.decoder.decode(&bytes) {
            Ok(image) => image,
            Err(err) => {
                tracing::warn!("failed to decode texture {path}: {err}");
                return fail(LoadFailure::DecodeFailure, LoadedTexture::invalid());
            }
        };
        drop(bytes);

        let max_mips = max_mip_count(image.width(), image.height(), image.depth());
        if image.num_mips() > max_mips {
            tracing::warn!(
                "texture {path} declares {} mips, a {}x{}x{} chain has at most {max_mips}",
                image.num_mips(),
                image.width(),
                image.height(),
                image.depth()
            );
            return fail(LoadFailure::DecodeFailure, LoadedTexture::invalid());
        }

        let info = creation_info(&image, flags);
        let loaded = LoadedTexture {
            handle: TextureHandle::INVALID,
            info: Some(TextureInfo::from_creation(&info)),
            orientation: image.orientation(),
        };

        if matches!(info.shape, TextureShape::D2 { .. }) && !self.backend.is_texture_supported(&info)
        {
            tracing::warn!(
                "texture {path} uses {:?} with {:?}, not supported for 2D sampling",
                info.format,
                info.flags
            );
            return fail(LoadFailure::UnsupportedFormat, loaded);
        }

        let mem = self.wrap_payload(image.into_data());
        let size = mem.len() as u64;
        match self.backend.create_texture(&info, Some(mem)) {
            Ok(handle) => {
                self.counters
                    .bytes_uploaded
                    .fetch_add(size, Ordering::Relaxed);
                self.backend
                    .set_texture_name(handle, truncate_name(path, self.backend.max_name_len()));
                tracing::debug!(path, ?handle, shape = ?info.shape, "texture created");
                Entry {
                    loaded: LoadedTexture { handle, ..loaded },
                    failure: None,
                }
            }
            Err(err) => {
                tracing::warn!("failed to create texture {path}: {err}");
                fail(LoadFailure::UnsupportedFormat, loaded)
            }
        }
    }

    fn wrap_payload(&self, data: Vec<u8>) -> GpuMemory {
        let counters = Arc::clone(&self.counters);
        GpuMemory::with_release(data, move |data| {
            counters
                .bytes_released
                .fetch_add(data.len() as u64, Ordering::Relaxed);
        })
    }

    /// Forget a completed entry and destroy its texture, so the next acquire
    /// reloads from disk. Returns false if the path is unknown or still loading.
    pub fn invalidate(&self, path: &str) -> bool {
        let entry = {
            let mut slots = self.slots.lock();
            match slots.get(path) {
                Some(Slot::Ready(entry)) => {
                    let entry = *entry;
                    slots.remove(path);
                    entry
                }
                _ => return false,
            }
        };
        if entry.loaded.handle.is_valid() {
            self.backend.destroy_texture(entry.loaded.handle);
        }
        tracing::debug!(path, "texture invalidated");
        true
    }

    /// Why `path` resolved to the invalid handle, if it did.
    pub fn failure(&self, path: &str) -> Option<LoadFailure> {
        match self.slots.lock().get(path) {
            Some(Slot::Ready(entry)) => entry.failure,
            _ => None,
        }
    }

    /// Whether `path` has a completed entry (successful or failed).
    pub fn contains(&self, path: &str) -> bool {
        matches!(self.slots.lock().get(path), Some(Slot::Ready(_)))
    }

    /// Number of paths with an entry, including failures and loads in flight.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.counters;
        CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
            bytes_uploaded: c.bytes_uploaded.load(Ordering::Relaxed),
            bytes_released: c.bytes_released.load(Ordering::Relaxed),
        }
    }
}

impl Drop for TextureCache {
    fn drop(&mut self) {
        let mut destroyed = 0usize;
        for (_, slot) in self.slots.get_mut().drain() {
            if let Slot::Ready(entry) = slot {
                if entry.loaded.handle.is_valid() {
                    self.backend.destroy_texture(entry.loaded.handle);
                    destroyed += 1;
                }
            }
        }
        tracing::debug!(destroyed, "texture cache shut down");
    }
}

impl std::fmt::Debug for TextureCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureCache")
            .field("entries", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessBackend;
    use lumen_assets::{DecodeError, FileReader, StandardDecoder, StdFileSystem};
    use std::collections::HashMap;
    use std::io;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// In-memory file system counting `open` calls per path.
    #[derive(Default)]
    struct MemFs {
        files: HashMap<String, Vec<u8>>,
        opens: Mutex<HashMap<String, usize>>,
    }

    impl MemFs {
        /// One single-byte file per path; the byte scripts the decoder.
        fn with(files: &[(&str, u8)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(p, b)| (p.to_string(), vec![*b]))
                    .collect(),
                opens: Mutex::default(),
            }
        }

        fn opens(&self, path: &str) -> usize {
            self.opens.lock().get(path).copied().unwrap_or(0)
        }
    }

    struct MemReader(io::Cursor<Vec<u8>>);

    impl FileReader for MemReader {
        fn size(&self) -> io::Result<u64> {
            Ok(self.0.get_ref().len() as u64)
        }

        fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
            io::Read::read_exact(&mut self.0, buf)
        }
    }

    impl FileSystem for MemFs {
        fn open(&self, path: &str) -> io::Result<Box<dyn FileReader>> {
            *self.opens.lock().entry(path.to_owned()).or_default() += 1;
            self.files
                .get(path)
                .map(|b| Box::new(MemReader(io::Cursor::new(b.clone()))) as Box<dyn FileReader>)
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_owned()))
        }
    }

    /// Decoder driven by the first byte of the file, counting calls.
    /// 0 = 2D RGBA8, 1 = cube (also claiming depth 4), 2 = volume (depth 4),
    /// 3 = BC7 2D, 4 = 4x4 claiming 40 mips, anything else fails.
    #[derive(Default)]
    struct ScriptedDecoder {
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl ScriptedDecoder {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn flat_image(format: PixelFormat, w: u32, h: u32) -> DecodedImage {
        let size = format.mip_size(w, h, 1) as usize;
        DecodedImage::new(format, w, h, vec![0; size])
    }

    impl ImageDecoder for ScriptedDecoder {
        fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            let decoded = match bytes.first() {
                Some(0) => flat_image(PixelFormat::Rgba8, 4, 2).with_orientation(Orientation::R90),
                Some(1) => {
                    let data = vec![0; 4 * 4 * 4 * 6];
                    DecodedImage::new(PixelFormat::Rgba8, 4, 4, data)
                        .with_cube_map(true)
                        .with_depth(4)
                }
                Some(2) => {
                    let data = vec![0; 4 * 4 * 4 * 4];
                    DecodedImage::new(PixelFormat::Rgba8, 4, 4, data).with_depth(4)
                }
                Some(3) => flat_image(PixelFormat::Bc7, 8, 8),
                Some(4) => flat_image(PixelFormat::Rgba8, 4, 4).with_mips(40),
                _ => return Err(DecodeError::UnknownContainer),
            };
            Ok(decoded)
        }
    }

    struct Fixture {
        backend: Arc<HeadlessBackend>,
        fs: Arc<MemFs>,
        decoder: Arc<ScriptedDecoder>,
        cache: TextureCache,
    }

    fn fixture_with(backend: HeadlessBackend, decoder: ScriptedDecoder) -> Fixture {
        let backend = Arc::new(backend);
        let fs = Arc::new(MemFs::with(&[
            ("flat.png", 0),
            ("sky.dds", 1),
            ("fog.ktx", 2),
            ("bc7.dds", 3),
            ("mips.dds", 4),
            ("junk.bin", 9),
        ]));
        let decoder = Arc::new(decoder);
        let cache = TextureCache::new(backend.clone(), fs.clone(), decoder.clone());
        Fixture {
            backend,
            fs,
            decoder,
            cache,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(HeadlessBackend::new(), ScriptedDecoder::default())
    }

    #[test]
    fn second_acquire_is_a_hit_without_io() {
        let f = fixture();
        let a = f.cache.acquire("flat.png", TextureFlags::empty());
        let b = f.cache.acquire("flat.png", TextureFlags::empty());
        assert!(a.is_valid());
        assert_eq!(a, b);
        assert_eq!(f.fs.opens("flat.png"), 1);
        assert_eq!(f.decoder.calls(), 1);
        assert_eq!(f.backend.textures_created(), 1);
        let stats = f.cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[test]
    fn path_keys_are_verbatim() {
        let f = fixture();
        let a = f.cache.acquire("flat.png", TextureFlags::empty());
        let b = f.cache.acquire("./flat.png", TextureFlags::empty());
        assert!(a.is_valid());
        assert!(!b.is_valid());
        assert_eq!(f.cache.len(), 2);
    }

    #[test]
    fn missing_file_fails_once_and_stays_failed() {
        let f = fixture();
        for _ in 0..3 {
            assert_eq!(
                f.cache.acquire("/missing/file", TextureFlags::empty()),
                TextureHandle::INVALID
            );
        }
        assert_eq!(f.fs.opens("/missing/file"), 1);
        assert_eq!(
            f.cache.failure("/missing/file"),
            Some(LoadFailure::ResourceNotFound)
        );
        assert_eq!(f.cache.stats().failures, 1);
        assert_eq!(f.decoder.calls(), 0);
    }

    #[test]
    fn decode_failure_is_cached() {
        let f = fixture();
        assert!(!f.cache.acquire("junk.bin", TextureFlags::empty()).is_valid());
        assert!(!f.cache.acquire("junk.bin", TextureFlags::empty()).is_valid());
        assert_eq!(f.decoder.calls(), 1);
        assert_eq!(f.cache.failure("junk.bin"), Some(LoadFailure::DecodeFailure));
        assert_eq!(f.backend.textures_created(), 0);
    }

    #[test]
    fn cube_map_wins_over_depth() {
        let f = fixture();
        let t = f.cache.acquire("sky.dds", TextureFlags::empty());
        let record = f.backend.texture(t).unwrap();
        assert_eq!(
            record.info.shape,
            TextureShape::Cube {
                size: 4,
                num_layers: 1
            }
        );
    }

    #[test]
    fn cube_info_matches_the_upload() {
        let f = fixture();
        let loaded = f.cache.acquire_with_info("sky.dds", TextureFlags::empty());
        let info = loaded.info.unwrap();
        assert!(info.cube_map);
        assert_eq!(info.depth, 1);
        assert_eq!(info.storage_size, 4 * 4 * 4 * 6);
        assert_eq!(info.storage_size, f.cache.stats().bytes_uploaded);
    }

    #[test]
    fn impossible_mip_count_is_a_cached_decode_failure() {
        let f = fixture();
        for _ in 0..2 {
            let loaded = f.cache.acquire_with_info("mips.dds", TextureFlags::empty());
            assert_eq!(loaded.handle, TextureHandle::INVALID);
            assert!(loaded.info.is_none());
        }
        assert_eq!(f.cache.failure("mips.dds"), Some(LoadFailure::DecodeFailure));
        assert_eq!(f.decoder.calls(), 1);
        assert_eq!(f.backend.textures_created(), 0);
    }

    #[test]
    fn depth_above_one_creates_volume() {
        let f = fixture();
        let t = f.cache.acquire("fog.ktx", TextureFlags::empty());
        let record = f.backend.texture(t).unwrap();
        assert!(matches!(record.info.shape, TextureShape::D3 { depth: 4, .. }));
    }

    #[test]
    fn unsupported_2d_is_invalid_without_creation() {
        let f = fixture_with(
            HeadlessBackend::new().with_unsupported(&[PixelFormat::Bc7]),
            ScriptedDecoder::default(),
        );
        let loaded = f.cache.acquire_with_info("bc7.dds", TextureFlags::empty());
        assert!(!loaded.handle.is_valid());
        assert_eq!(loaded.info.map(|i| i.format), Some(PixelFormat::Bc7));
        assert_eq!(f.backend.textures_created(), 0);
        assert_eq!(f.cache.failure("bc7.dds"), Some(LoadFailure::UnsupportedFormat));
        assert_eq!(f.cache.stats().bytes_uploaded, 0);
    }

    #[test]
    fn flags_and_name_reach_the_backend() {
        let f = fixture_with(
            HeadlessBackend::new().with_max_name_len(4),
            ScriptedDecoder::default(),
        );
        let t = f.cache.acquire("flat.png", TextureFlags::SRGB | TextureFlags::UVW_CLAMP);
        let record = f.backend.texture(t).unwrap();
        assert_eq!(record.info.flags, TextureFlags::SRGB | TextureFlags::UVW_CLAMP);
        assert_eq!(record.name.as_deref(), Some("flat"));
    }

    #[test]
    fn info_and_orientation_survive_cache_hits() {
        let f = fixture();
        let first = f.cache.acquire_with_info("flat.png", TextureFlags::empty());
        let second = f.cache.acquire_with_info("flat.png", TextureFlags::empty());
        assert_eq!(first, second);
        let info = first.info.unwrap();
        assert_eq!((info.width, info.height, info.depth), (4, 2, 1));
        assert_eq!(info.storage_size, 32);
        assert_eq!(info.bits_per_pixel, 32);
        assert_eq!(first.orientation, Orientation::R90);
    }

    #[test]
    fn payload_is_released_after_upload() {
        let f = fixture();
        f.cache.acquire("flat.png", TextureFlags::empty());
        let stats = f.cache.stats();
        assert_eq!(stats.bytes_uploaded, 32);
        assert_eq!(stats.bytes_released, 32);
    }

    #[test]
    fn invalidate_reloads_and_destroys() {
        let f = fixture();
        let first = f.cache.acquire("flat.png", TextureFlags::empty());
        assert!(f.cache.invalidate("flat.png"));
        assert!(f.backend.texture(first).is_none());
        assert!(!f.cache.invalidate("flat.png"));

        let second = f.cache.acquire("flat.png", TextureFlags::empty());
        assert!(second.is_valid());
        assert_ne!(first, second);
        assert_eq!(f.fs.opens("flat.png"), 2);
    }

    #[test]
    fn dropping_the_cache_destroys_textures() {
        let f = fixture();
        f.cache.acquire("flat.png", TextureFlags::empty());
        f.cache.acquire("sky.dds", TextureFlags::empty());
        f.cache.acquire("/missing", TextureFlags::empty());
        assert_eq!(f.backend.live_textures(), 2);
        let backend = f.backend.clone();
        drop(f);
        assert_eq!(backend.live_textures(), 0);
    }

    #[test]
    fn concurrent_acquires_load_once() {
        let f = fixture_with(
            HeadlessBackend::new(),
            ScriptedDecoder {
                delay: Some(Duration::from_millis(20)),
                ..ScriptedDecoder::default()
            },
        );
        let handles: Vec<TextureHandle> = std::thread::scope(|s| {
            let workers: Vec<_> = (0..8)
                .map(|_| s.spawn(|| f.cache.acquire("flat.png", TextureFlags::empty())))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });
        assert!(handles[0].is_valid());
        assert!(handles.iter().all(|h| *h == handles[0]));
        assert_eq!(f.fs.opens("flat.png"), 1);
        assert_eq!(f.decoder.calls(), 1);
        assert_eq!(f.backend.textures_created(), 1);
        let stats = f.cache.stats();
        assert_eq!(stats.hits + stats.misses, 8);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn loads_real_png_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let img = image::RgbaImage::from_pixel(3, 5, image::Rgba([10, 20, 30, 255]));
        img.save(dir.path().join("albedo.png")).unwrap();

        let backend = Arc::new(HeadlessBackend::new());
        let cache = TextureCache::new(
            backend.clone(),
            Arc::new(StdFileSystem::with_root(dir.path())),
            Arc::new(StandardDecoder),
        );
        let loaded = cache.acquire_with_info("albedo.png", TextureFlags::SRGB);
        let info = loaded.info.unwrap();
        assert_eq!((info.width, info.height), (3, 5));
        assert_eq!(info.format, PixelFormat::Rgba8);
        let record = backend.texture(loaded.handle).unwrap();
        assert_eq!(&record.data[..4], &[10, 20, 30, 255]);
    }
}
