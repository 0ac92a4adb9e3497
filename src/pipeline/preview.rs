//! Preview generation: image payload → `data:` URI.
//!
//! A data URI can be dropped straight into an `<img src>` or any renderer that
//! understands them, with no temporary file to clean up. Non-image payloads
//! get no preview; callers show a generic file glyph instead.

use crate::file::RawFile;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A renderable preview of an image payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview(String);

impl Preview {
    /// The full `data:<media-type>;base64,<payload>` string.
    pub fn data_uri(&self) -> &str {
        &self.0
    }

    /// The media type embedded in the URI.
    pub fn media_type(&self) -> &str {
        self.0
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(';'))
            .map(|(mt, _)| mt)
            .unwrap_or_default()
    }

    /// Decode the embedded payload again.
    pub fn decode(&self) -> Option<Vec<u8>> {
        let (_, b64) = self.0.split_once(";base64,")?;
        STANDARD.decode(b64).ok()
    }
}

/// Build the preview of `file`, or `None` when it is not an image.
///
/// Encoding a 20 MB payload as base64 takes long enough to stall other tasks,
/// so it runs on the blocking pool. This never fails: a failed task simply
/// yields no preview.
pub async fn generate(file: &RawFile) -> Option<Preview> {
    if !file.is_image() {
        return None;
    }

    let bytes = file.shared_bytes();
    let media_type = file.media_type().to_string();
    match tokio::task::spawn_blocking(move || encode_data_uri(&media_type, &bytes)).await {
        Ok(uri) => {
            debug!("Preview for '{}': {} bytes", file.name(), uri.len());
            Some(Preview(uri))
        }
        Err(e) => {
            warn!("Preview task for '{}' failed: {}", file.name(), e);
            None
        }
    }
}

fn encode_data_uri(media_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", media_type, STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn image_gets_data_uri() {
        let file = RawFile::new("dot.jpg", "image/jpeg", vec![1u8, 2, 3, 4]);
        let preview = generate(&file).await.expect("image has a preview");
        assert!(preview.data_uri().starts_with("data:image/jpeg;base64,"));
        assert_eq!(preview.media_type(), "image/jpeg");
        assert_eq!(preview.decode().as_deref(), Some(&[1u8, 2, 3, 4][..]));
    }

    #[tokio::test]
    async fn non_image_has_no_preview() {
        let file = RawFile::new("doc.pdf", "application/pdf", b"%PDF-1.7".to_vec());
        assert!(generate(&file).await.is_none());
    }

    #[tokio::test]
    async fn empty_image_still_gets_a_preview() {
        let file = RawFile::new("empty.png", "image/png", Vec::new());
        let preview = generate(&file).await.expect("preview");
        assert_eq!(preview.data_uri(), "data:image/png;base64,");
    }
}
