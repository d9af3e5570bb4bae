use std::path::Path;

/// Decoded image in row-major RGBA8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Turns an asset path into pixels. Errors are human-readable reasons.
pub trait ImageLoader {
    fn decode(&self, path: &Path) -> Result<DecodedImage, String>;
}

/// PNG decoding through the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct PngLoader;

impl PngLoader {
    pub fn decode_bytes(bytes: &[u8]) -> Result<DecodedImage, String> {
        let img = image::load_from_memory(bytes).map_err(|e| e.to_string())?;
        Ok(into_decoded(img))
    }
}

impl ImageLoader for PngLoader {
    fn decode(&self, path: &Path) -> Result<DecodedImage, String> {
        let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
        Self::decode_bytes(&bytes)
    }
}

fn into_decoded(img: image::DynamicImage) -> DecodedImage {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    DecodedImage {
        width,
        height,
        rgba: rgba.into_raw(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    #[test]
    fn decodes_png_bytes() {
        let decoded = PngLoader::decode_bytes(&encode_png(4, 2)).expect("decode");
        assert_eq!((decoded.width, decoded.height), (4, 2));
        assert_eq!(decoded.rgba.len(), 32);
        assert_eq!(&decoded.rgba[0..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn garbage_bytes_fail() {
        assert!(PngLoader::decode_bytes(b"not a png").is_err());
    }

    #[test]
    fn missing_file_fails() {
        let err = PngLoader
            .decode(Path::new("__nonexistent_texture_for_test__.png"))
            .expect_err("missing file");
        assert!(!err.is_empty());
    }
}
