//! File intake: turn a batch of candidate files into admitted payloads.
//!
//! Candidates are consumed in windows as large as the remaining capacity.
//! Within a window every candidate is transcoded and previewed concurrently
//! (bounded by `intake_concurrency`), and the results come back in input
//! order. A rejected candidate leaves its slot free for the next window, so
//! the batch stops exactly when the working set would be full.
//!
//! Media-type filtering happens before this stage, in [`crate::Session::admit`].

use crate::config::SessionConfig;
use crate::error::IntakeError;
use crate::file::RawFile;
use crate::pipeline::preview::{self, Preview};
use crate::pipeline::transcode::ImageTranscoder;
use futures::stream::{self, StreamExt};
use tracing::{debug, info};

/// A candidate that passed intake.
#[derive(Debug, Clone)]
pub struct Admission {
    /// Name the user dropped, before transcoding.
    pub original_name: String,
    /// The payload to store: transcoded for images, untouched otherwise.
    pub file: RawFile,
    pub preview: Option<Preview>,
}

/// A candidate turned away, with the reason.
#[derive(Debug, Clone)]
pub struct Rejection {
    pub file: RawFile,
    pub error: IntakeError,
}

/// Result of one [`FileIntake::admit`] call. Both lists keep input order.
#[derive(Debug, Default)]
pub struct IntakeOutcome {
    pub admitted: Vec<Admission>,
    pub rejections: Vec<Rejection>,
}

/// Size-checks, transcodes and previews candidate files.
#[derive(Debug, Clone)]
pub struct FileIntake {
    transcoder: ImageTranscoder,
    max_files: usize,
    max_size_bytes: u64,
    max_size_mb: u64,
    concurrency: usize,
}

impl FileIntake {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            transcoder: ImageTranscoder::from_config(config),
            max_files: config.max_files,
            max_size_bytes: config.max_size_bytes(),
            max_size_mb: config.max_size_mb,
            concurrency: config.intake_concurrency.max(1),
        }
    }

    /// Process `candidates` given that `current_len` files are already held.
    ///
    /// Candidates beyond the capacity are dropped without a rejection.
    pub async fn admit(&self, candidates: Vec<RawFile>, current_len: usize) -> IntakeOutcome {
        let mut outcome = IntakeOutcome::default();
        let mut remaining = self.max_files.saturating_sub(current_len);
        let mut pending = candidates.into_iter().peekable();

        while remaining > 0 && pending.peek().is_some() {
            let window: Vec<RawFile> = pending.by_ref().take(remaining).collect();
            let results: Vec<Result<Admission, Rejection>> = stream::iter(window)
                .map(|file| self.process(file))
                .buffered(self.concurrency)
                .collect()
                .await;

            for result in results {
                match result {
                    Ok(admission) => {
                        remaining -= 1;
                        outcome.admitted.push(admission);
                    }
                    Err(rejection) => outcome.rejections.push(rejection),
                }
            }
        }

        let dropped = pending.count();
        if dropped > 0 {
            debug!("Capacity reached: {} candidate(s) dropped", dropped);
        }
        info!(
            "Intake: {} admitted, {} rejected",
            outcome.admitted.len(),
            outcome.rejections.len()
        );
        outcome
    }

    async fn process(&self, file: RawFile) -> Result<Admission, Rejection> {
        let original_name = file.name().to_string();
        let payload = self.transcoder.transcode(file.clone()).await;

        if payload.size() > self.max_size_bytes {
            debug!(
                "'{}' rejected: {} bytes > {} bytes",
                original_name,
                payload.size(),
                self.max_size_bytes
            );
            return Err(Rejection {
                file,
                error: IntakeError::FileTooLarge {
                    name: original_name,
                    limit_mb: self.max_size_mb,
                },
            });
        }

        let preview = preview::generate(&payload).await;
        Ok(Admission {
            original_name,
            file: payload,
            preview,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn intake(max_files: usize, max_size_mb: u64) -> FileIntake {
        let config = SessionConfig::builder()
            .max_files(max_files)
            .max_size_mb(max_size_mb)
            .build()
            .unwrap();
        FileIntake::new(&config)
    }

    fn pdf(name: &str, len: usize) -> RawFile {
        RawFile::new(name, "application/pdf", vec![b'x'; len])
    }

    fn png(name: &str, w: u32, h: u32) -> RawFile {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([200, 30, 30])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        RawFile::new(name, "image/png", buf)
    }

    #[tokio::test]
    async fn non_image_is_admitted_without_preview() {
        let out = intake(1, 20).admit(vec![pdf("doc.pdf", 2048)], 0).await;
        assert_eq!(out.admitted.len(), 1);
        assert!(out.rejections.is_empty());
        let a = &out.admitted[0];
        assert_eq!(a.original_name, "doc.pdf");
        assert!(a.preview.is_none());
        assert_eq!(a.file.size(), 2048);
    }

    #[tokio::test]
    async fn image_is_transcoded_and_previewed() {
        let out = intake(1, 20).admit(vec![png("photo.png", 2400, 1600)], 0).await;
        let a = &out.admitted[0];
        assert_eq!(a.original_name, "photo.png");
        assert_eq!(a.file.media_type(), "image/jpeg");
        let decoded = image::load_from_memory(a.file.bytes()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1200, 800));
        let preview = a.preview.as_ref().expect("image preview");
        assert_eq!(preview.media_type(), "image/jpeg");
    }

    #[tokio::test]
    async fn batch_is_truncated_to_capacity_in_order() {
        let batch = (0..5).map(|i| pdf(&format!("{i}.pdf"), 10)).collect();
        let out = intake(3, 20).admit(batch, 1).await;
        let names: Vec<_> = out.admitted.iter().map(|a| a.original_name.as_str()).collect();
        assert_eq!(names, vec!["0.pdf", "1.pdf"]);
        assert!(out.rejections.is_empty());
    }

    #[tokio::test]
    async fn full_set_admits_nothing() {
        let out = intake(1, 20).admit(vec![pdf("a.pdf", 10)], 1).await;
        assert!(out.admitted.is_empty());
        assert!(out.rejections.is_empty());
    }

    #[tokio::test]
    async fn too_large_is_rejected_and_frees_its_slot() {
        let big = pdf("big.pdf", 2 * 1024 * 1024 + 1);
        let small = pdf("small.pdf", 100);
        let out = intake(1, 2).admit(vec![big, small], 0).await;

        assert_eq!(out.rejections.len(), 1);
        assert_eq!(
            out.rejections[0].error,
            IntakeError::FileTooLarge {
                name: "big.pdf".into(),
                limit_mb: 2
            }
        );
        assert_eq!(out.admitted.len(), 1);
        assert_eq!(out.admitted[0].original_name, "small.pdf");
    }

    #[tokio::test]
    async fn concurrent_processing_preserves_input_order() {
        let batch = vec![
            png("a.png", 1800, 900),
            pdf("b.pdf", 10),
            png("c.png", 40, 40),
            pdf("d.pdf", 10),
        ];
        let out = intake(4, 20).admit(batch, 0).await;
        let names: Vec<_> = out.admitted.iter().map(|a| a.original_name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.pdf", "c.png", "d.pdf"]);
    }
}
