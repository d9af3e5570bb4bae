//! Conversion from decoded RGBA8 images to a device's native texture layout.
//!
//! The tile GPU samples 16-bit RGB565 texels stored in twiddled (Morton)
//! order, which requires power-of-two sides. Rectangular textures are stored
//! as consecutive square blocks of `min(width, height)` texels, each block
//! twiddled on its own.

use crate::image_loader::DecodedImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    /// 32-bit RGBA, row-major.
    Rgba8,
    /// 16-bit little-endian RGB565, twiddled.
    Rgb565Twiddled,
}

impl TextureFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 => 4,
            Self::Rgb565Twiddled => 2,
        }
    }

    pub fn byte_count(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel()
    }
}

/// Pixels ready for upload in a specific device format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuImage {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub bytes: Vec<u8>,
}

impl GpuImage {
    pub fn byte_count(&self) -> usize {
        self.bytes.len()
    }
}

pub fn convert_image(image: &DecodedImage, format: TextureFormat) -> Result<GpuImage, String> {
    let expected = image.width as usize * image.height as usize * 4;
    if image.rgba.len() != expected {
        return Err(format!(
            "pixel buffer is {} bytes, expected {} for {}x{}",
            image.rgba.len(),
            expected,
            image.width,
            image.height
        ));
    }
    let bytes = match format {
        TextureFormat::Rgba8 => image.rgba.clone(),
        TextureFormat::Rgb565Twiddled => to_rgb565_twiddled(image)?,
    };
    Ok(GpuImage {
        width: image.width,
        height: image.height,
        format,
        bytes,
    })
}

pub fn pack_rgb565(r: u8, g: u8, b: u8) -> u16 {
    (u16::from(r >> 3) << 11) | (u16::from(g >> 2) << 5) | u16::from(b >> 3)
}

/// Index of texel `(x, y)` in a twiddled texture of the given size.
pub fn twiddled_index(x: u32, y: u32, width: u32, height: u32) -> usize {
    let side = width.min(height);
    let block = (x / side) + (y / side);
    let in_block = spread_bits(y % side) | (spread_bits(x % side) << 1);
    block as usize * (side as usize * side as usize) + in_block as usize
}

fn to_rgb565_twiddled(image: &DecodedImage) -> Result<Vec<u8>, String> {
    let (width, height) = (image.width, image.height);
    if !width.is_power_of_two() || !height.is_power_of_two() {
        return Err(format!(
            "twiddled textures need power-of-two sides, got {width}x{height}"
        ));
    }
    let mut out = vec![0u8; TextureFormat::Rgb565Twiddled.byte_count(width, height)];
    for y in 0..height {
        for x in 0..width {
            let src = (y as usize * width as usize + x as usize) * 4;
            let texel = pack_rgb565(image.rgba[src], image.rgba[src + 1], image.rgba[src + 2]);
            let dst = twiddled_index(x, y, width, height) * 2;
            out[dst..dst + 2].copy_from_slice(&texel.to_le_bytes());
        }
    }
    Ok(out)
}

/// Insert a zero bit above every bit of the low 16 bits.
fn spread_bits(value: u32) -> u32 {
    let mut v = value & 0x0000_FFFF;
    v = (v | (v << 8)) & 0x00FF_00FF;
    v = (v | (v << 4)) & 0x0F0F_0F0F;
    v = (v | (v << 2)) & 0x3333_3333;
    v = (v | (v << 1)) & 0x5555_5555;
    v
}
