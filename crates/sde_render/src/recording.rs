//! Headless `TileDevice` that records what a frame submitted.
//!
//! Emulates the console target: RGB565 twiddled textures and a fixed texture
//! memory budget. Only the most recently completed frame is retained, so a
//! long headless run stays bounded in memory.

use std::collections::HashMap;
use std::time::Duration;

use crate::device::{DeviceError, TileDevice};
use crate::pixel_format::{GpuImage, TextureFormat};
use crate::primitive::{ListKind, Primitive, TextureId};

pub const DEFAULT_TEXTURE_MEMORY: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedList {
    pub kind: ListKind,
    pub primitives: Vec<Primitive>,
}

impl RecordedList {
    pub fn vertex_count(&self) -> usize {
        self.primitives
            .iter()
            .filter(|p| matches!(p, Primitive::Vertex(_)))
            .count()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedFrame {
    pub lists: Vec<RecordedList>,
}

impl RecordedFrame {
    pub fn list(&self, kind: ListKind) -> Option<&RecordedList> {
        self.lists.iter().find(|l| l.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(|l| l.primitives.is_empty())
    }
}

#[derive(Debug)]
struct Reservation {
    bytes: usize,
    uploaded: bool,
}

pub struct RecordingDevice {
    format: TextureFormat,
    texture_memory: usize,
    texture_bytes_in_use: usize,
    textures: HashMap<TextureId, Reservation>,
    next_texture: u32,
    frame: Option<RecordedFrame>,
    open_list: Option<RecordedList>,
    last_frame: Option<RecordedFrame>,
    frames_completed: u64,
    vblanks: u64,
    dropped_primitives: u64,
    vblank_interval: Option<Duration>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::with_texture_memory(DEFAULT_TEXTURE_MEMORY)
    }

    pub fn with_texture_memory(bytes: usize) -> Self {
        Self {
            format: TextureFormat::Rgb565Twiddled,
            texture_memory: bytes,
            texture_bytes_in_use: 0,
            textures: HashMap::new(),
            next_texture: 1,
            frame: None,
            open_list: None,
            last_frame: None,
            frames_completed: 0,
            vblanks: 0,
            dropped_primitives: 0,
            vblank_interval: None,
        }
    }

    pub fn with_format(mut self, format: TextureFormat) -> Self {
        self.format = format;
        self
    }

    /// Sleep this long in `wait_vblank`, to pace a headless run like a display.
    pub fn with_vblank_interval(mut self, interval: Duration) -> Self {
        self.vblank_interval = Some(interval);
        self
    }

    pub fn last_frame(&self) -> Option<&RecordedFrame> {
        self.last_frame.as_ref()
    }

    pub fn frames_completed(&self) -> u64 {
        self.frames_completed
    }

    pub fn vblanks(&self) -> u64 {
        self.vblanks
    }

    pub fn dropped_primitives(&self) -> u64 {
        self.dropped_primitives
    }

    pub fn texture_bytes_in_use(&self) -> usize {
        self.texture_bytes_in_use
    }

    pub fn is_uploaded(&self, id: TextureId) -> bool {
        self.textures.get(&id).is_some_and(|r| r.uploaded)
    }
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl TileDevice for RecordingDevice {
    fn native_format(&self) -> TextureFormat {
        self.format
    }

    fn alloc_texture(&mut self, byte_count: usize) -> Result<TextureId, DeviceError> {
        let available = self.texture_memory - self.texture_bytes_in_use;
        if byte_count > available {
            return Err(DeviceError::OutOfTextureMemory {
                requested: byte_count,
                available,
            });
        }
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        self.texture_bytes_in_use += byte_count;
        self.textures.insert(
            id,
            Reservation {
                bytes: byte_count,
                uploaded: false,
            },
        );
        Ok(id)
    }

    fn upload_texture(&mut self, id: TextureId, image: &GpuImage) -> Result<(), DeviceError> {
        let reservation = self
            .textures
            .get_mut(&id)
            .ok_or(DeviceError::UnknownTexture(id))?;
        if image.format != self.format {
            return Err(DeviceError::Unsupported(format!(
                "expected {:?} pixels, got {:?}",
                self.format, image.format
            )));
        }
        if image.byte_count() != reservation.bytes {
            return Err(DeviceError::SizeMismatch {
                id,
                reserved: reservation.bytes,
                actual: image.byte_count(),
            });
        }
        reservation.uploaded = true;
        Ok(())
    }

    fn release_texture(&mut self, id: TextureId) {
        if let Some(reservation) = self.textures.remove(&id) {
            self.texture_bytes_in_use -= reservation.bytes;
        }
    }

    fn wait_ready(&mut self) {}

    fn begin_frame(&mut self) {
        if self.frame.is_some() {
            log::warn!("begin_frame called twice without end_frame");
        }
        self.frame = Some(RecordedFrame::default());
    }

    fn begin_list(&mut self, list: ListKind) {
        if self.open_list.is_some() {
            log::warn!("begin_list({list:?}) while another list is open");
            self.end_list();
        }
        self.open_list = Some(RecordedList {
            kind: list,
            primitives: Vec::new(),
        });
    }

    fn submit(&mut self, primitive: Primitive) {
        match self.open_list.as_mut() {
            Some(list) => list.primitives.push(primitive),
            None => {
                self.dropped_primitives += 1;
                log::warn!("primitive submitted outside a draw list; dropped");
            }
        }
    }

    fn end_list(&mut self) {
        let Some(list) = self.open_list.take() else {
            return;
        };
        match self.frame.as_mut() {
            Some(frame) => frame.lists.push(list),
            None => log::warn!("end_list({:?}) outside a frame", list.kind),
        }
    }

    fn end_frame(&mut self) {
        if self.open_list.is_some() {
            self.end_list();
        }
        if let Some(frame) = self.frame.take() {
            self.last_frame = Some(frame);
            self.frames_completed += 1;
        }
    }

    fn wait_vblank(&mut self) {
        if let Some(interval) = self.vblank_interval {
            std::thread::sleep(interval);
        }
        self.vblanks += 1;
    }
}
