//! Image encoding: `DynamicImage` → PNG bytes → base64 for request bodies.
//!
//! PNG is lossless; JPEG artefacts on rendered glyphs hurt model reading far
//! more than the extra bytes cost.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Encoded {}x{} page → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

pub fn png_base64(png: &[u8]) -> String {
    STANDARD.encode(png)
}

/// Wrap PNG bytes for an `edgequake_llm` chat message.
///
/// `detail: "high"` keeps fine print and small tables legible on
/// tile-based vision models.
pub fn png_image_data(png: &[u8]) -> ImageData {
    ImageData::new(png_base64(png), "image/png").with_detail("high")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let png = encode_png(&img).expect("encode should succeed");
        assert_eq!(&png[1..4], b"PNG");

        let data = png_image_data(&png);
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(decoded, png);
    }
}
