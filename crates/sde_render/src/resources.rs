//! Sprite resource pool.
//!
//! Resources are appended on load and live for the rest of the process; there
//! is no unload. Handles are 1-based positions in the pool, so a handle is
//! valid iff `1 <= handle <= len()` and never changes meaning once issued.
//! The capacity is a policy limit, checked before any work is done.

use std::num::NonZeroU32;
use std::path::Path;

use thiserror::Error;

use crate::device::TileDevice;
use crate::image_loader::ImageLoader;
use crate::pixel_format::{convert_image, TextureFormat};
use crate::primitive::{Filter, TextureBinding, TextureId};

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("sprite limit reached ({capacity})")]
    PoolExhausted { capacity: usize },
    #[error("image decode failed for {path}: {reason}")]
    DecodeError { path: String, reason: String },
    #[error("texture upload failed for {path}: {reason}")]
    UploadError { path: String, reason: String },
}

impl ResourceError {
    fn upload(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::UploadError {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}

/// Stable 1-based sprite handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(NonZeroU32);

impl Handle {
    /// Interpret a script-supplied integer. Does not check the pool.
    pub fn from_raw(raw: i64) -> Option<Self> {
        u32::try_from(raw).ok().and_then(NonZeroU32::new).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    fn index(self) -> usize {
        self.0.get() as usize - 1
    }
}

#[derive(Debug)]
pub struct SpriteResource {
    pub width: u32,
    pub height: u32,
    pub byte_count: usize,
    pub format: TextureFormat,
    /// Pixels in `format`, as uploaded.
    pub pixel_data: Vec<u8>,
    pub texture: TextureId,
}

impl SpriteResource {
    pub fn binding(&self) -> TextureBinding {
        TextureBinding {
            id: self.texture,
            width: self.width,
            height: self.height,
            format: self.format,
            filter: Filter::Nearest,
        }
    }
}

pub struct ResourceManager {
    sprites: Vec<SpriteResource>,
    capacity: usize,
    loader: Box<dyn ImageLoader>,
}

impl ResourceManager {
    pub fn new(capacity: usize, loader: Box<dyn ImageLoader>) -> Self {
        Self {
            sprites: Vec::with_capacity(capacity),
            capacity,
            loader,
        }
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Decode `path`, upload it to `device` and append it to the pool.
    pub fn load(
        &mut self,
        device: &mut dyn TileDevice,
        path: &Path,
    ) -> Result<Handle, ResourceError> {
        let exhausted = ResourceError::PoolExhausted {
            capacity: self.capacity,
        };
        if self.sprites.len() >= self.capacity {
            return Err(exhausted);
        }
        let handle = u32::try_from(self.sprites.len() + 1)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Handle)
            .ok_or(exhausted)?;

        let decoded = self
            .loader
            .decode(path)
            .map_err(|reason| ResourceError::DecodeError {
                path: path.display().to_string(),
                reason,
            })?;
        if decoded.width == 0 || decoded.height == 0 || decoded.rgba.is_empty() {
            return Err(ResourceError::DecodeError {
                path: path.display().to_string(),
                reason: "image has no pixel data".to_string(),
            });
        }

        let format = device.native_format();
        let byte_count = format.byte_count(decoded.width, decoded.height);
        let texture = device
            .alloc_texture(byte_count)
            .map_err(|err| ResourceError::upload(path, err))?;

        let gpu_image = match convert_image(&decoded, format) {
            Ok(image) => image,
            Err(reason) => {
                device.release_texture(texture);
                return Err(ResourceError::upload(path, reason));
            }
        };
        if let Err(err) = device.upload_texture(texture, &gpu_image) {
            device.release_texture(texture);
            return Err(ResourceError::upload(path, err));
        }

        self.sprites.push(SpriteResource {
            width: gpu_image.width,
            height: gpu_image.height,
            byte_count,
            format,
            pixel_data: gpu_image.bytes,
            texture,
        });
        log::info!(
            "Loaded sprite {} from '{}' ({}x{}, {} bytes)",
            handle.get(),
            path.display(),
            decoded.width,
            decoded.height,
            byte_count
        );
        Ok(handle)
    }

    /// Checked lookup of a script-controlled handle value.
    pub fn get(&self, raw: i64) -> Option<&SpriteResource> {
        Handle::from_raw(raw).and_then(|handle| self.resolve(handle))
    }

    pub fn resolve(&self, handle: Handle) -> Option<&SpriteResource> {
        self.sprites.get(handle.index())
    }

    /// Total bytes reserved on the device by loaded sprites.
    pub fn texture_bytes(&self) -> usize {
        self.sprites.iter().map(|s| s.byte_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_loader::DecodedImage;
    use crate::recording::RecordingDevice;

    /// Loader that serves solid 8x8 images, failing for paths containing "bad".
    struct FakeLoader;

    impl ImageLoader for FakeLoader {
        fn decode(&self, path: &Path) -> Result<DecodedImage, String> {
            let name = path.to_string_lossy();
            if name.contains("bad") {
                return Err("corrupt".to_string());
            }
            if name.contains("empty") {
                return Ok(DecodedImage {
                    width: 0,
                    height: 0,
                    rgba: Vec::new(),
                });
            }
            if name.contains("odd") {
                return Ok(DecodedImage {
                    width: 3,
                    height: 3,
                    rgba: vec![255; 36],
                });
            }
            Ok(DecodedImage {
                width: 8,
                height: 8,
                rgba: vec![255; 256],
            })
        }
    }

    fn manager(capacity: usize) -> ResourceManager {
        ResourceManager::new(capacity, Box::new(FakeLoader))
    }

    #[test]
    fn handles_are_one_based_and_sequential() {
        let mut device = RecordingDevice::new();
        let mut pool = manager(4);
        let a = pool.load(&mut device, Path::new("a.png")).expect("load a");
        let b = pool.load(&mut device, Path::new("b.png")).expect("load b");
        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 2);
        assert_eq!(pool.len(), 2);
        let sprite = pool.get(1).expect("handle 1");
        assert_eq!((sprite.width, sprite.height), (8, 8));
        assert_eq!(sprite.byte_count, 128);
        assert_eq!(sprite.pixel_data.len(), 128);
    }

    #[test]
    fn invalid_handles_resolve_to_none() {
        let mut device = RecordingDevice::new();
        let mut pool = manager(4);
        pool.load(&mut device, Path::new("a.png")).expect("load");
        for raw in [i64::MIN, -1, 0, 2, 3, i64::from(u32::MAX) + 1, i64::MAX] {
            assert!(pool.get(raw).is_none(), "handle {raw} should be invalid");
        }
        assert!(pool.get(1).is_some());
    }

    #[test]
    fn capacity_is_enforced() {
        let mut device = RecordingDevice::new();
        let mut pool = manager(2);
        pool.load(&mut device, Path::new("a.png")).expect("first");
        pool.load(&mut device, Path::new("b.png")).expect("second");
        for _ in 0..3 {
            let err = pool
                .load(&mut device, Path::new("c.png"))
                .expect_err("pool is full");
            assert!(matches!(err, ResourceError::PoolExhausted { capacity: 2 }));
            assert_eq!(err.to_string(), "sprite limit reached (2)");
            assert_eq!(pool.len(), 2);
        }
    }

    #[test]
    fn decode_failures_do_not_grow_pool() {
        let mut device = RecordingDevice::new();
        let mut pool = manager(4);
        let err = pool
            .load(&mut device, Path::new("bad.png"))
            .expect_err("decode fails");
        assert!(matches!(err, ResourceError::DecodeError { .. }));
        let err = pool
            .load(&mut device, Path::new("empty.png"))
            .expect_err("empty image");
        assert!(matches!(err, ResourceError::DecodeError { .. }));
        assert!(pool.is_empty());
    }

    #[test]
    fn texture_memory_exhaustion_is_an_upload_error() {
        let mut device = RecordingDevice::with_texture_memory(200);
        let mut pool = manager(4);
        pool.load(&mut device, Path::new("a.png")).expect("128 bytes fit");
        let err = pool
            .load(&mut device, Path::new("b.png"))
            .expect_err("second does not fit");
        assert!(matches!(err, ResourceError::UploadError { .. }));
        assert_eq!(pool.len(), 1);
        assert_eq!(device.texture_bytes_in_use(), 128);
    }

    #[test]
    fn rejected_conversion_releases_reservation() {
        let mut device = RecordingDevice::new();
        let mut pool = manager(4);
        let err = pool
            .load(&mut device, Path::new("odd.png"))
            .expect_err("3x3 cannot be twiddled");
        assert!(matches!(err, ResourceError::UploadError { .. }));
        assert_eq!(device.texture_bytes_in_use(), 0);
        assert!(pool.is_empty());
    }

    #[test]
    fn handle_from_raw_rejects_out_of_range() {
        assert!(Handle::from_raw(0).is_none());
        assert!(Handle::from_raw(-5).is_none());
        assert!(Handle::from_raw(i64::from(u32::MAX) + 1).is_none());
        assert_eq!(Handle::from_raw(7).map(Handle::get), Some(7));
    }
}
