use glam::Mat4;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
}

/// Maps screen pixels (origin top-left, y down) to clip space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenCamera {
    pub width: u32,
    pub height: u32,
}

impl ScreenCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::orthographic_rh(
            0.0,
            self.width.max(1) as f32,
            self.height.max(1) as f32,
            0.0,
            -1.0,
            1.0,
        )
    }

    pub fn build_uniform(&self) -> CameraUniform {
        CameraUniform {
            view_proj: self.projection().to_cols_array_2d(),
        }
    }
}
