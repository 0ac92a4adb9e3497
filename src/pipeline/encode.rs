//! Image encoding: payloads and rendered pages → base64 `ImageData`.
//!
//! Vision APIs take images as base64 strings embedded in the JSON request
//! body. Admitted image payloads are already JPEG (or whatever intake left
//! them as) and are sent with their own media type. Rendered PDF pages are
//! encoded as PNG, which keeps rendered text crisp.

use crate::file::RawFile;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as a base64 PNG.
///
/// `detail: "high"` asks GPT-4-class models to tile the image instead of
/// reading a single low-resolution overview; fine print is lost otherwise.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Wrap an image payload as-is, keeping its declared media type.
pub fn encode_payload(file: &RawFile) -> ImageData {
    let b64 = STANDARD.encode(file.bytes());
    debug!("Encoded '{}' ({}) → {} bytes base64", file.name(), file.media_type(), b64.len());
    ImageData::new(b64, file.media_type()).with_detail("high")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let data = encode_page(&img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(&decoded[..4], b"\x89PNG");
    }

    #[test]
    fn payload_keeps_its_media_type() {
        let file = RawFile::new("photo.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0]);
        let data = encode_payload(&file);
        assert_eq!(data.mime_type, "image/jpeg");
        assert_eq!(STANDARD.decode(&data.data).unwrap(), vec![0xFF, 0xD8, 0xFF, 0xE0]);
    }
}
