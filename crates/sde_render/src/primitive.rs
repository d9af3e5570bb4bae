//! Primitive stream consumed by a tile-based deferred device.
//!
//! A draw list is a sequence of `Primitive`s: a `PolyHeader` fixes the render
//! state (texture, blending) for the vertices after it, and each strip of
//! vertices ends with one flagged `VertexFlags::EndOfStrip`.

use crate::pixel_format::TextureFormat;

/// The two passes of a frame, composited opaque first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    Opaque,
    Translucent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blend {
    Opaque,
    Translucent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    #[default]
    Nearest,
    Bilinear,
}

/// Device-side texture allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBinding {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub filter: Filter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolyHeader {
    pub texture: Option<TextureBinding>,
    pub blend: Blend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFlags {
    Vertex,
    EndOfStrip,
}

/// Screen-space vertex. `z` is a depth hint: larger is nearer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub flags: VertexFlags,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub u: f32,
    pub v: f32,
    pub argb: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    Header(PolyHeader),
    Vertex(Vertex),
}

/// Packed `0xAARRGGBB` colors.
pub mod argb {
    pub const WHITE: u32 = 0xFFFF_FFFF;
    pub const GREEN: u32 = 0xFF00_FF00;
    pub const RED: u32 = 0xFFFF_0000;
    pub const DARK_GRAY: u32 = 0xFF20_2020;

    /// Unpack into normalized `[r, g, b, a]`.
    pub fn to_rgba_f32(color: u32) -> [f32; 4] {
        let channel = |shift: u32| ((color >> shift) & 0xFF) as f32 / 255.0;
        [channel(16), channel(8), channel(0), channel(24)]
    }
}
