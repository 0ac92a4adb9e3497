//! Input resolution: turn a user-supplied path or URL into a [`RawFile`].
//!
//! The CLI (and any other shell without a native file picker) hands us
//! strings. Local paths are read asynchronously; `http://` and `https://`
//! inputs are downloaded in memory with a timeout. The media type comes from
//! the server's `Content-Type` when it says something useful, otherwise from
//! the file extension.

use crate::error::ScanError;
use crate::file::{guess_media_type, RawFile, OCTET_STREAM};
use std::path::PathBuf;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to an in-memory file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<RawFile, ScanError> {
    if input.trim().is_empty() {
        return Err(ScanError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

/// Read a local file, mapping the common failures to typed errors.
async fn read_local(path_str: &str) -> Result<RawFile, ScanError> {
    let path = PathBuf::from(path_str);

    if path.is_dir() {
        return Err(ScanError::InvalidInput {
            input: path_str.to_string(),
        });
    }

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => ScanError::PermissionDenied { path: path.clone() },
        _ => ScanError::FileNotFound { path: path.clone() },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path_str.to_string());

    debug!("Read local file: {} ({} bytes)", path.display(), bytes.len());
    Ok(RawFile::from_bytes(name, bytes))
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<RawFile, ScanError> {
    info!("Downloading file from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ScanError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ScanError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ScanError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ScanError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let name = filename_from_url(url);
    let header_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            ScanError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ScanError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    let media_type = pick_media_type(header_type.as_deref(), &name);
    info!("Downloaded '{}' ({}, {} bytes)", name, media_type, bytes.len());

    Ok(RawFile::new(name, media_type, bytes.to_vec()))
}

/// Prefer the server's content type unless it is missing or generic.
fn pick_media_type(header: Option<&str>, name: &str) -> String {
    let declared = header
        .and_then(|h| h.split(';').next())
        .map(|h| h.trim().to_ascii_lowercase())
        .filter(|h| !h.is_empty() && h != OCTET_STREAM);
    declared.unwrap_or_else(|| guess_media_type(name))
}

/// Last path segment of the URL, or a fallback name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "download".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_from_url_uses_last_segment() {
        assert_eq!(filename_from_url("https://example.com/a/b/scan.pdf"), "scan.pdf");
        assert_eq!(filename_from_url("https://example.com/a/b/"), "download");
        assert_eq!(filename_from_url("https://example.com/report"), "download");
    }

    #[test]
    fn media_type_prefers_meaningful_header() {
        assert_eq!(pick_media_type(Some("image/png"), "x.pdf"), "image/png");
        assert_eq!(
            pick_media_type(Some("application/pdf; charset=binary"), "x"),
            "application/pdf"
        );
        assert_eq!(
            pick_media_type(Some("application/octet-stream"), "photo.jpg"),
            "image/jpeg"
        );
        assert_eq!(pick_media_type(None, "photo.webp"), "image/webp");
    }

    #[tokio::test]
    async fn reads_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"%PDF-1.7 body").unwrap();

        let file = resolve_input(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(file.name(), "notes.pdf");
        assert_eq!(file.media_type(), "application/pdf");
        assert_eq!(file.size(), 13);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = resolve_input("/definitely/not/a/real/file.pdf", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn directory_and_empty_input_are_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_input(dir.path().to_str().unwrap(), 5).await.unwrap_err();
        assert!(matches!(err, ScanError::InvalidInput { .. }));

        let err = resolve_input("  ", 5).await.unwrap_err();
        assert!(matches!(err, ScanError::InvalidInput { .. }));
    }
}
