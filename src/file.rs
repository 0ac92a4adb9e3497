//! File payloads and admitted working-set items.
//!
//! [`RawFile`] is what a user hands in: a name, a declared media type and the
//! bytes. The content sits behind an `Arc` so that the transcoder, the preview
//! encoder and the analyzer can all hold the same payload without copying a
//! 20 MB buffer at every stage.
//!
//! [`FileItem`] is a `RawFile` after admission. Its fields are private: the
//! preview is fixed at admission time, and only the session moves `progress`
//! forward.

use crate::pipeline::preview::Preview;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// Media type used when nothing better is known.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// A file as selected or dropped by the user.
#[derive(Clone)]
pub struct RawFile {
    name: String,
    media_type: String,
    bytes: Arc<[u8]>,
    last_modified: SystemTime,
}

impl RawFile {
    /// Build a file with an explicit media type.
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
            last_modified: SystemTime::now(),
        }
    }

    /// Build a file whose media type is guessed from the name's extension.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let name = name.into();
        let media_type = guess_media_type(&name);
        Self::new(name, media_type, bytes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the content, for moving into blocking tasks.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    /// Payload size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn last_modified(&self) -> SystemTime {
        self.last_modified
    }

    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }

    pub fn is_pdf(&self) -> bool {
        self.media_type == "application/pdf"
    }

    /// Replace the content and media type, keeping the name. The
    /// modification time is refreshed.
    pub(crate) fn with_content(&self, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: self.name.clone(),
            media_type: media_type.into(),
            bytes: bytes.into(),
            last_modified: SystemTime::now(),
        }
    }
}

impl fmt::Debug for RawFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawFile")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Guess a media type from a file name's extension.
pub fn guess_media_type(name: &str) -> String {
    let ext = match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => return OCTET_STREAM.to_string(),
    };
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "svg" => "image/svg+xml",
        "txt" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => OCTET_STREAM,
    }
    .to_string()
}

/// Identity of an admitted file: its ingestion sequence number within the
/// session. Two files with the same name dropped one after the other get
/// distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub(crate) u64);

impl FileId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A file in the working set.
#[derive(Debug, Clone)]
pub struct FileItem {
    id: FileId,
    original_name: String,
    payload: RawFile,
    preview: Option<Preview>,
    pub(crate) progress: u8,
    pub(crate) completed: bool,
    pub(crate) error: Option<String>,
}

impl FileItem {
    pub(crate) fn new(id: FileId, original_name: String, payload: RawFile, preview: Option<Preview>) -> Self {
        Self {
            id,
            original_name,
            payload,
            preview,
            progress: 0,
            completed: false,
            error: None,
        }
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    /// Name of the file as it was dropped, before transcoding.
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// The (possibly transcoded) payload that will be analysed.
    pub fn payload(&self) -> &RawFile {
        &self.payload
    }

    /// Present for image payloads only.
    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Display key combining name and ingestion order.
    pub fn key(&self) -> String {
        format!("{}-{}", self.original_name, self.id.0)
    }

    /// Move progress forward. Values below the current one are ignored.
    pub(crate) fn advance(&mut self, value: u8) {
        self.progress = self.progress.max(value.min(100));
        if self.progress >= 100 {
            self.completed = true;
        }
    }

    pub fn summary(&self) -> FileSummary {
        FileSummary {
            id: self.id,
            name: self.original_name.clone(),
            media_type: self.payload.media_type().to_string(),
            size: self.payload.size(),
            has_preview: self.preview.is_some(),
            progress: self.progress,
            completed: self.completed,
            error: self.error.clone(),
        }
    }
}

/// Serialisable view of a [`FileItem`], without the payload bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub id: FileId,
    pub name: String,
    pub media_type: String,
    pub size: u64,
    pub has_preview: bool,
    pub progress: u8,
    pub completed: bool,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guesses_media_types() {
        assert_eq!(guess_media_type("scan.PDF"), "application/pdf");
        assert_eq!(guess_media_type("photo.jpg"), "image/jpeg");
        assert_eq!(guess_media_type("photo.JPEG"), "image/jpeg");
        assert_eq!(guess_media_type("shot.webp"), "image/webp");
        assert_eq!(guess_media_type("archive.tar.gz"), OCTET_STREAM);
        assert_eq!(guess_media_type("README"), OCTET_STREAM);
    }

    #[test]
    fn raw_file_flags() {
        let img = RawFile::from_bytes("a.png", vec![0u8; 4]);
        assert!(img.is_image());
        assert!(!img.is_pdf());
        assert_eq!(img.size(), 4);

        let pdf = RawFile::from_bytes("a.pdf", b"%PDF-1.7".to_vec());
        assert!(pdf.is_pdf());
        assert!(!pdf.is_image());
    }

    #[test]
    fn with_content_keeps_name() {
        let original = RawFile::new("photo.png", "image/png", vec![1u8, 2, 3]);
        let replaced = original.with_content("image/jpeg", vec![9u8]);
        assert_eq!(replaced.name(), "photo.png");
        assert_eq!(replaced.media_type(), "image/jpeg");
        assert_eq!(replaced.bytes(), &[9u8]);
        assert!(replaced.last_modified() >= original.last_modified());
    }

    #[test]
    fn progress_is_monotonic_and_completes() {
        let file = RawFile::from_bytes("doc.pdf", vec![0u8; 8]);
        let mut item = FileItem::new(FileId(1), "doc.pdf".into(), file, None);
        item.advance(10);
        item.advance(5);
        assert_eq!(item.progress(), 10);
        assert!(!item.completed());
        item.advance(100);
        assert_eq!(item.progress(), 100);
        assert!(item.completed());
        assert_eq!(item.key(), "doc.pdf-1");
    }
}
