pub mod camera;
pub mod device;
pub mod gpu_context;
pub mod image_loader;
pub mod pixel_format;
pub mod primitive;
pub mod recording;
pub mod renderer;
pub mod resources;
pub mod sprite_pipeline;
pub mod texture;
pub mod vertex;
pub mod wgpu_device;

pub use camera::{CameraUniform, ScreenCamera};
pub use device::{DeviceError, TileDevice};
pub use gpu_context::GpuContext;
pub use image_loader::{DecodedImage, ImageLoader, PngLoader};
pub use pixel_format::{GpuImage, TextureFormat};
pub use primitive::{argb, Blend, Filter, ListKind, PolyHeader, Primitive, TextureId, Vertex};
pub use recording::{RecordedFrame, RecordingDevice};
pub use renderer::{draw_rect, draw_textured_quad};
pub use resources::{Handle, ResourceError, ResourceManager, SpriteResource};
pub use sprite_pipeline::SpritePipeline;
pub use texture::Texture;
pub use vertex::SpriteVertex;
pub use wgpu_device::WgpuDevice;
