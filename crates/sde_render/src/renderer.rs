//! The two shapes the runtime can draw: a rotated textured quad and an
//! axis-aligned flat rectangle. Both submit into whichever list is open on the
//! device; calling them outside a `begin_list`/`end_list` bracket is a caller
//! error (the device drops the primitives).

use glam::Vec2;

use crate::device::TileDevice;
use crate::primitive::{argb, Blend, PolyHeader, Primitive, Vertex, VertexFlags};
use crate::resources::SpriteResource;

/// Depth hint for sprites.
pub const SPRITE_Z: f32 = 1.0;
/// Depth hint for overlay rectangles.
pub const OVERLAY_Z: f32 = 0.1;

const QUAD_UVS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];

/// Corners of a `width` x `height` rectangle centered on `(cx, cy)` and
/// rotated by `angle` radians, in strip order: top-left, top-right,
/// bottom-left, bottom-right (before rotation).
pub fn quad_corners(cx: f32, cy: f32, width: f32, height: f32, angle: f32) -> [Vec2; 4] {
    let hw = width * 0.5;
    let hh = height * 0.5;
    let local = [
        Vec2::new(-hw, -hh),
        Vec2::new(hw, -hh),
        Vec2::new(-hw, hh),
        Vec2::new(hw, hh),
    ];
    let rotation = Vec2::from_angle(angle);
    let center = Vec2::new(cx, cy);
    local.map(|corner| center + rotation.rotate(corner))
}

/// Submit a textured quad for `resource`. A missing resource draws nothing.
pub fn draw_textured_quad(
    device: &mut dyn TileDevice,
    resource: Option<&SpriteResource>,
    cx: f32,
    cy: f32,
    width: f32,
    height: f32,
    angle: f32,
) {
    let Some(resource) = resource else {
        return;
    };

    device.submit(Primitive::Header(PolyHeader {
        texture: Some(resource.binding()),
        blend: Blend::Opaque,
    }));
    let corners = quad_corners(cx, cy, width, height, angle);
    submit_strip(device, &corners, SPRITE_Z, argb::WHITE);
}

/// Submit an untextured, alpha-blended rectangle with its top-left at `(x, y)`.
pub fn draw_rect(device: &mut dyn TileDevice, x: f32, y: f32, w: f32, h: f32, color: u32) {
    device.submit(Primitive::Header(PolyHeader {
        texture: None,
        blend: Blend::Translucent,
    }));
    let corners = [
        Vec2::new(x, y),
        Vec2::new(x + w, y),
        Vec2::new(x, y + h),
        Vec2::new(x + w, y + h),
    ];
    submit_strip(device, &corners, OVERLAY_Z, color);
}

fn submit_strip(device: &mut dyn TileDevice, corners: &[Vec2; 4], z: f32, color: u32) {
    for (i, (corner, uv)) in corners.iter().zip(QUAD_UVS).enumerate() {
        let flags = if i == corners.len() - 1 {
            VertexFlags::EndOfStrip
        } else {
            VertexFlags::Vertex
        };
        device.submit(Primitive::Vertex(Vertex {
            flags,
            x: corner.x,
            y: corner.y,
            z,
            u: uv[0],
            v: uv[1],
            argb: color,
        }));
    }
}
