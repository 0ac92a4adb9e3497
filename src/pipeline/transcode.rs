//! Image transcoding: downscale and recompress an image before upload.
//!
//! Phone photos routinely exceed the upload limit while carrying far more
//! pixels than a vision model uses. Capping the longest edge at 1200 px and
//! re-encoding as JPEG at quality 80 shrinks most of them by an order of
//! magnitude, so the size check in intake only rejects images that are
//! genuinely too large.
//!
//! Transcoding is best effort. If the payload cannot be decoded or encoded,
//! the original file is returned untouched.

use crate::config::SessionConfig;
use crate::file::RawFile;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::{debug, warn};

/// Media type of every successfully transcoded image.
pub const OUTPUT_MEDIA_TYPE: &str = "image/jpeg";

/// Resizes and recompresses image payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageTranscoder {
    max_dimension: u32,
    quality: u8,
}

impl Default for ImageTranscoder {
    fn default() -> Self {
        Self::new(1200, 80)
    }
}

impl ImageTranscoder {
    pub fn new(max_dimension: u32, quality: u8) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
            quality: quality.clamp(1, 100),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.max_dimension, config.jpeg_quality)
    }

    /// Transcode `file` if it is an image; return anything else unchanged.
    ///
    /// Decoding and encoding are CPU-bound and run on the blocking pool. Any
    /// failure falls back to the original file.
    pub async fn transcode(&self, file: RawFile) -> RawFile {
        if !file.is_image() {
            return file;
        }

        let this = *self;
        let input = file.clone();
        match tokio::task::spawn_blocking(move || this.transcode_blocking(&input)).await {
            Ok(Ok(out)) => out,
            Ok(Err(e)) => {
                debug!("Transcode fallback for '{}': {}", file.name(), e);
                file
            }
            Err(e) => {
                warn!("Transcode task for '{}' panicked: {}", file.name(), e);
                file
            }
        }
    }

    /// Blocking implementation of [`ImageTranscoder::transcode`]. Returns the
    /// error instead of falling back.
    pub fn transcode_blocking(&self, file: &RawFile) -> Result<RawFile, image::ImageError> {
        let img = image::load_from_memory(file.bytes())?;
        let (w, h) = (img.width(), img.height());
        let (tw, th) = scaled_dimensions(w, h, self.max_dimension);

        let img = if (tw, th) == (w, h) {
            img
        } else {
            img.resize_exact(tw, th, FilterType::Triangle)
        };

        let bytes = encode_jpeg(&img, self.quality)?;
        debug!(
            "Transcoded '{}': {}x{} → {}x{}, {} → {} bytes",
            file.name(),
            w,
            h,
            tw,
            th,
            file.size(),
            bytes.len()
        );
        Ok(file.with_content(OUTPUT_MEDIA_TYPE, bytes))
    }
}

/// Target dimensions for an image of `width × height` whose longest edge must
/// not exceed `max`. The longer edge becomes `max`; the shorter one is scaled
/// with integer truncation and never drops below 1.
pub fn scaled_dimensions(width: u32, height: u32, max: u32) -> (u32, u32) {
    let scale = |edge: u32, long: u32| -> u32 {
        ((edge as u64 * max as u64) / long as u64).max(1) as u32
    };
    if width > height && width > max {
        (max, scale(height, width))
    } else if height > max {
        (scale(width, height), max)
    } else {
        (width, height)
    }
}

/// JPEG has no alpha channel; transparent pixels are flattened by dropping it.
fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        }));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("encode png");
        buf
    }

    #[test]
    fn scaled_dimensions_cases() {
        assert_eq!(scaled_dimensions(800, 600, 1200), (800, 600));
        assert_eq!(scaled_dimensions(1200, 1200, 1200), (1200, 1200));
        assert_eq!(scaled_dimensions(2400, 1200, 1200), (1200, 600));
        assert_eq!(scaled_dimensions(1000, 3000, 1200), (400, 1200));
        assert_eq!(scaled_dimensions(1500, 1500, 1200), (1200, 1200));
        // Truncation, not rounding.
        assert_eq!(scaled_dimensions(4000, 2999, 1200), (1200, 899));
        // Extreme panoramas keep at least one pixel.
        assert_eq!(scaled_dimensions(100_000, 10, 1200), (1200, 1));
    }

    #[tokio::test]
    async fn large_image_is_downscaled_to_jpeg() {
        let file = RawFile::new("wide.png", "image/png", png(2400, 900));
        let out = ImageTranscoder::default().transcode(file).await;

        assert_eq!(out.name(), "wide.png");
        assert_eq!(out.media_type(), OUTPUT_MEDIA_TYPE);
        let decoded = image::load_from_memory(out.bytes()).expect("valid jpeg");
        assert_eq!(decoded.width(), 1200);
        assert_eq!(decoded.height(), 450);
    }

    #[tokio::test]
    async fn small_image_keeps_dimensions_but_is_reencoded() {
        let file = RawFile::new("icon.png", "image/png", png(64, 32));
        let out = ImageTranscoder::default().transcode(file).await;
        assert_eq!(out.media_type(), OUTPUT_MEDIA_TYPE);
        let decoded = image::load_from_memory(out.bytes()).expect("valid jpeg");
        assert_eq!((decoded.width(), decoded.height()), (64, 32));
    }

    #[tokio::test]
    async fn undecodable_image_falls_back_to_original() {
        let file = RawFile::new("broken.jpg", "image/jpeg", vec![0xFFu8, 0xD8, 0x00, 0x01]);
        let out = ImageTranscoder::default().transcode(file.clone()).await;
        assert_eq!(out.media_type(), "image/jpeg");
        assert_eq!(out.bytes(), file.bytes());
    }

    #[tokio::test]
    async fn non_image_passes_through() {
        let file = RawFile::new("doc.pdf", "application/pdf", b"%PDF-1.4 data".to_vec());
        let out = ImageTranscoder::default().transcode(file.clone()).await;
        assert_eq!(out.media_type(), "application/pdf");
        assert_eq!(out.bytes(), file.bytes());
        assert_eq!(out.last_modified(), file.last_modified());
    }

    #[test]
    fn quality_is_clamped() {
        let t = ImageTranscoder::new(0, 0);
        assert_eq!(t, ImageTranscoder::new(1, 1));
    }
}
