use crate::primitive::{argb, Vertex};

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SpriteVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub color: [f32; 4],
}

impl SpriteVertex {
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SpriteVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // position
                wgpu::VertexAttribute {
                    offset: std::mem::offset_of!(SpriteVertex, position) as wgpu::BufferAddress,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // tex_coords
                wgpu::VertexAttribute {
                    offset: std::mem::offset_of!(SpriteVertex, tex_coords) as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                // color
                wgpu::VertexAttribute {
                    offset: std::mem::offset_of!(SpriteVertex, color) as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

impl From<&Vertex> for SpriteVertex {
    fn from(v: &Vertex) -> Self {
        Self {
            position: [v.x, v.y, v.z],
            tex_coords: [v.u, v.v],
            color: argb::to_rgba_f32(v.argb),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::VertexFlags;

    #[test]
    fn converts_device_vertex() {
        let v = Vertex {
            flags: VertexFlags::EndOfStrip,
            x: 1.0,
            y: 2.0,
            z: 0.5,
            u: 1.0,
            v: 0.0,
            argb: argb::GREEN,
        };
        let sv = SpriteVertex::from(&v);
        assert_eq!(sv.position, [1.0, 2.0, 0.5]);
        assert_eq!(sv.tex_coords, [1.0, 0.0]);
        assert_eq!(sv.color, [0.0, 1.0, 0.0, 1.0]);
    }
}
