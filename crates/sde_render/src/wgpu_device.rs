//! Desktop `TileDevice` on wgpu.
//!
//! Primitives are batched per list while the frame is open: each vertex strip
//! is expanded to a triangle list and consecutive strips with the same render
//! state merge into one indexed draw. `end_frame` renders the opaque list then
//! the translucent list into the swapchain image; `wait_vblank` presents it.

use std::collections::HashMap;
use std::sync::Arc;

use winit::window::Window;

use crate::camera::ScreenCamera;
use crate::device::{DeviceError, TileDevice};
use crate::gpu_context::GpuContext;
use crate::pixel_format::{GpuImage, TextureFormat};
use crate::primitive::{Blend, Filter, ListKind, PolyHeader, Primitive, TextureId, VertexFlags};
use crate::sprite_pipeline::SpritePipeline;
use crate::texture::{create_sampler, Texture};
use crate::vertex::SpriteVertex;

const INITIAL_VERTEX_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub texture: Option<TextureId>,
    pub filter: Filter,
    pub blend: Blend,
    pub index_start: u32,
    pub index_count: u32,
}

/// CPU-side geometry for one frame, shared by both lists.
#[derive(Debug, Default)]
pub struct FrameBatch {
    pub vertices: Vec<SpriteVertex>,
    pub indices: Vec<u32>,
    opaque: Vec<DrawCall>,
    translucent: Vec<DrawCall>,
}

impl FrameBatch {
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.opaque.clear();
        self.translucent.clear();
    }

    pub fn draw_calls(&self, kind: ListKind) -> &[DrawCall] {
        match kind {
            ListKind::Opaque => &self.opaque,
            ListKind::Translucent => &self.translucent,
        }
    }

    /// Append a triangle strip drawn with `header`'s state.
    pub fn push_strip(&mut self, kind: ListKind, header: &PolyHeader, strip: &[SpriteVertex]) {
        if strip.len() < 3 {
            return;
        }
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(strip);

        let index_start = self.indices.len() as u32;
        for i in 0..strip.len() as u32 - 2 {
            // Alternate winding so every triangle faces the same way.
            if i % 2 == 0 {
                self.indices
                    .extend_from_slice(&[base + i, base + i + 1, base + i + 2]);
            } else {
                self.indices
                    .extend_from_slice(&[base + i + 1, base + i, base + i + 2]);
            }
        }
        let index_count = self.indices.len() as u32 - index_start;

        let call = DrawCall {
            texture: header.texture.map(|t| t.id),
            filter: header.texture.map(|t| t.filter).unwrap_or_default(),
            blend: header.blend,
            index_start,
            index_count,
        };
        let calls = match kind {
            ListKind::Opaque => &mut self.opaque,
            ListKind::Translucent => &mut self.translucent,
        };
        push_draw_call(calls, call);
    }
}

/// Append a draw call, merging with the previous one when the render state
/// matches and indices are contiguous.
fn push_draw_call(draw_calls: &mut Vec<DrawCall>, call: DrawCall) {
    if let Some(last) = draw_calls.last_mut() {
        let contiguous = last.index_start + last.index_count == call.index_start;
        let same_state =
            last.texture == call.texture && last.filter == call.filter && last.blend == call.blend;
        if same_state && contiguous {
            last.index_count += call.index_count;
            return;
        }
    }
    draw_calls.push(call);
}

struct GpuTexture {
    _texture: Texture,
    nearest: wgpu::BindGroup,
    bilinear: wgpu::BindGroup,
}

impl GpuTexture {
    fn bind_group(&self, filter: Filter) -> &wgpu::BindGroup {
        match filter {
            Filter::Nearest => &self.nearest,
            Filter::Bilinear => &self.bilinear,
        }
    }
}

struct TextureSlot {
    bytes: usize,
    gpu: Option<GpuTexture>,
}

pub struct WgpuDevice {
    gpu: GpuContext,
    pipeline: SpritePipeline,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    nearest_sampler: wgpu::Sampler,
    bilinear_sampler: wgpu::Sampler,
    white: GpuTexture,
    textures: HashMap<TextureId, TextureSlot>,
    next_texture: u32,
    texture_memory: usize,
    texture_bytes_in_use: usize,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    vertex_capacity: usize,
    index_capacity: usize,
    batch: FrameBatch,
    open_list: Option<ListKind>,
    header: Option<PolyHeader>,
    strip: Vec<SpriteVertex>,
    in_frame: bool,
    pending: Option<wgpu::SurfaceTexture>,
}

impl WgpuDevice {
    /// `screen` is the logical resolution primitives are specified in; it is
    /// stretched to the window.
    pub fn new(
        window: Arc<Window>,
        screen: (u32, u32),
        texture_memory: usize,
    ) -> Result<Self, DeviceError> {
        use wgpu::util::DeviceExt;

        let gpu = GpuContext::new(window)?;
        let pipeline = SpritePipeline::new(&gpu.device, gpu.surface_format);

        let camera = ScreenCamera::new(screen.0, screen.1);
        let camera_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Camera Uniform Buffer"),
                contents: bytemuck::cast_slice(&[camera.build_uniform()]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let camera_bind_group = pipeline.create_camera_bind_group(&gpu.device, &camera_buffer);

        let nearest_sampler = create_sampler(&gpu.device, Filter::Nearest);
        let bilinear_sampler = create_sampler(&gpu.device, Filter::Bilinear);
        let white = Texture::white(&gpu.device, &gpu.queue);
        let white = GpuTexture {
            nearest: pipeline.create_texture_bind_group(&gpu.device, &white, &nearest_sampler),
            bilinear: pipeline.create_texture_bind_group(&gpu.device, &white, &bilinear_sampler),
            _texture: white,
        };

        let vertex_buffer = create_vertex_buffer(&gpu.device, INITIAL_VERTEX_CAPACITY);
        let index_buffer = create_index_buffer(&gpu.device, INITIAL_VERTEX_CAPACITY * 3);

        log::info!(
            "wgpu device ready: {}x{} logical, {} bytes texture memory",
            screen.0,
            screen.1,
            texture_memory
        );

        Ok(Self {
            gpu,
            pipeline,
            camera_buffer,
            camera_bind_group,
            nearest_sampler,
            bilinear_sampler,
            white,
            textures: HashMap::new(),
            next_texture: 1,
            texture_memory,
            texture_bytes_in_use: 0,
            vertex_buffer,
            index_buffer,
            vertex_capacity: INITIAL_VERTEX_CAPACITY,
            index_capacity: INITIAL_VERTEX_CAPACITY * 3,
            batch: FrameBatch::default(),
            open_list: None,
            header: None,
            strip: Vec::new(),
            in_frame: false,
            pending: None,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
    }

    fn ensure_buffer_capacity(&mut self) {
        let vertices = self.batch.vertices.len();
        if vertices > self.vertex_capacity {
            self.vertex_capacity = vertices.next_power_of_two();
            self.vertex_buffer = create_vertex_buffer(&self.gpu.device, self.vertex_capacity);
        }
        let indices = self.batch.indices.len();
        if indices > self.index_capacity {
            self.index_capacity = indices.next_power_of_two();
            self.index_buffer = create_index_buffer(&self.gpu.device, self.index_capacity);
        }
    }

    fn flush_strip(&mut self) {
        let Some(kind) = self.open_list else {
            self.strip.clear();
            return;
        };
        match self.header {
            Some(header) => self.batch.push_strip(kind, &header, &self.strip),
            None => log::warn!("vertex strip without a polygon header; dropped"),
        }
        self.strip.clear();
    }

    fn render(&mut self, view: &wgpu::TextureView, with_geometry: bool) {
        if with_geometry {
            self.ensure_buffer_capacity();
            self.gpu.queue.write_buffer(
                &self.vertex_buffer,
                0,
                bytemuck::cast_slice(&self.batch.vertices),
            );
            self.gpu.queue.write_buffer(
                &self.index_buffer,
                0,
                bytemuck::cast_slice(&self.batch.indices),
            );
        }

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Frame Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                ..Default::default()
            });

            if with_geometry && !self.batch.indices.is_empty() {
                render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
                render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
                render_pass
                    .set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);

                let mut last_blend = None;
                for kind in [ListKind::Opaque, ListKind::Translucent] {
                    for draw in self.batch.draw_calls(kind) {
                        let bind_group = match draw.texture {
                            None => self.white.bind_group(draw.filter),
                            Some(id) => match self.textures.get(&id).and_then(|s| s.gpu.as_ref())
                            {
                                Some(texture) => texture.bind_group(draw.filter),
                                None => continue,
                            },
                        };
                        if last_blend != Some(draw.blend) {
                            render_pass.set_pipeline(self.pipeline.pipeline(draw.blend));
                            last_blend = Some(draw.blend);
                        }
                        render_pass.set_bind_group(1, bind_group, &[]);
                        render_pass.draw_indexed(
                            draw.index_start..(draw.index_start + draw.index_count),
                            0,
                            0..1,
                        );
                    }
                }
            }
        }
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
    }
}

impl TileDevice for WgpuDevice {
    fn native_format(&self) -> TextureFormat {
        TextureFormat::Rgba8
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
            TextureSlot {
                bytes: byte_count,
                gpu: None,
            },
        );
        Ok(id)
    }

    fn upload_texture(&mut self, id: TextureId, image: &GpuImage) -> Result<(), DeviceError> {
        let slot = self
            .textures
            .get_mut(&id)
            .ok_or(DeviceError::UnknownTexture(id))?;
        if image.format != TextureFormat::Rgba8 {
            return Err(DeviceError::Unsupported(format!(
                "expected Rgba8 pixels, got {:?}",
                image.format
            )));
        }
        if image.byte_count() != slot.bytes {
            return Err(DeviceError::SizeMismatch {
                id,
                reserved: slot.bytes,
                actual: image.byte_count(),
            });
        }

        let label = format!("sprite_texture_{}", id.0);
        let texture = Texture::from_rgba8(
            &self.gpu.device,
            &self.gpu.queue,
            &image.bytes,
            image.width,
            image.height,
            &label,
        );
        let nearest =
            self.pipeline
                .create_texture_bind_group(&self.gpu.device, &texture, &self.nearest_sampler);
        let bilinear =
            self.pipeline
                .create_texture_bind_group(&self.gpu.device, &texture, &self.bilinear_sampler);
        slot.gpu = Some(GpuTexture {
            _texture: texture,
            nearest,
            bilinear,
        });
        Ok(())
    }

    fn release_texture(&mut self, id: TextureId) {
        if let Some(slot) = self.textures.remove(&id) {
            self.texture_bytes_in_use -= slot.bytes;
        }
    }

    fn wait_ready(&mut self) {
        let _ = self.gpu.device.poll(wgpu::Maintain::Poll);
    }

    fn begin_frame(&mut self) {
        if self.in_frame {
            log::warn!("begin_frame called twice without end_frame");
        }
        self.batch.clear();
        self.header = None;
        self.strip.clear();
        self.in_frame = true;
    }

    fn begin_list(&mut self, list: ListKind) {
        if self.open_list.is_some() {
            log::warn!("begin_list({list:?}) while another list is open");
            self.end_list();
        }
        self.open_list = Some(list);
        self.header = None;
    }

    fn submit(&mut self, primitive: Primitive) {
        if self.open_list.is_none() {
            log::warn!("primitive submitted outside a draw list; dropped");
            return;
        }
        match primitive {
            Primitive::Header(header) => {
                if !self.strip.is_empty() {
                    self.flush_strip();
                }
                self.header = Some(header);
            }
            Primitive::Vertex(vertex) => {
                self.strip.push(SpriteVertex::from(&vertex));
                if vertex.flags == VertexFlags::EndOfStrip {
                    self.flush_strip();
                }
            }
        }
    }

    fn end_list(&mut self) {
        if !self.strip.is_empty() {
            self.flush_strip();
        }
        self.open_list = None;
        self.header = None;
    }

    fn end_frame(&mut self) {
        if self.open_list.is_some() {
            self.end_list();
        }
        if !self.in_frame {
            return;
        }
        self.in_frame = false;

        let Some((output, view)) = self.gpu.acquire() else {
            return;
        };
        self.render(&view, true);
        self.pending = Some(output);
    }

    fn wait_vblank(&mut self) {
        if self.pending.is_none() {
            // Nothing rendered this refresh; present a cleared image so the
            // loop stays paced by the display.
            if let Some((output, view)) = self.gpu.acquire() {
                self.render(&view, false);
                self.pending = Some(output);
            }
        }
        if let Some(output) = self.pending.take() {
            output.present();
        }
    }
}

fn create_vertex_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Vertex Buffer"),
        size: (capacity * std::mem::size_of::<SpriteVertex>()) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_index_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Index Buffer"),
        size: (capacity * std::mem::size_of::<u32>()) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}
