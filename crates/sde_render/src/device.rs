use thiserror::Error;

use crate::pixel_format::{GpuImage, TextureFormat};
use crate::primitive::{ListKind, Primitive, TextureId};

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("texture memory exhausted: requested {requested} bytes, {available} available")]
    OutOfTextureMemory { requested: usize, available: usize },
    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureId),
    #[error("texture {id:?} reserved {reserved} bytes but upload is {actual} bytes")]
    SizeMismatch {
        id: TextureId,
        reserved: usize,
        actual: usize,
    },
    #[error("unsupported texture: {0}")]
    Unsupported(String),
    #[error("GPU setup failed: {0}")]
    Setup(String),
}

/// A tile-based deferred rendering device.
///
/// Frame protocol, per display refresh:
///
/// ```text
/// wait_ready -> begin_frame
///     begin_list(Opaque)      submit* end_list
///     begin_list(Translucent) submit* end_list
/// end_frame -> wait_vblank
/// ```
///
/// `submit` outside an open list is a caller contract violation; devices drop
/// the primitive. Texture memory is reserved by byte count before the pixels
/// are known, then filled by `upload_texture`.
pub trait TileDevice {
    /// Pixel layout textures must be converted to before upload.
    fn native_format(&self) -> TextureFormat;

    fn alloc_texture(&mut self, byte_count: usize) -> Result<TextureId, DeviceError>;

    fn upload_texture(&mut self, id: TextureId, image: &GpuImage) -> Result<(), DeviceError>;

    /// Return a reservation that never received pixels.
    fn release_texture(&mut self, id: TextureId);

    /// Block until the device can accept a new frame.
    fn wait_ready(&mut self);

    fn begin_frame(&mut self);

    fn begin_list(&mut self, list: ListKind);

    fn submit(&mut self, primitive: Primitive);

    fn end_list(&mut self);

    /// Close the frame; the device resolves all lists.
    fn end_frame(&mut self);

    /// Block until the next vertical blank.
    fn wait_vblank(&mut self);
}
