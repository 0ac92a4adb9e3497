//! Error types for the scanalyze library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`ScanError`]: **Fatal** for the operation that returned it: an input
//!   could not be loaded, a submission was refused, an export could not be
//!   written. Returned as `Err(ScanError)` from the public entry points.
//!
//! * [`IntakeError`]: **Non-fatal**, scoped to one candidate file in an
//!   admission batch (wrong type, too large). Siblings in the same batch are
//!   still admitted, so these are reported next to the admitted files rather
//!   than propagated.
//!
//! * [`AnalysisError`]: returned by an [`crate::analyze::Analyzer`]. The
//!   session turns it into a terminal `failed` request; the working set is
//!   left intact so the user can retry.

use std::path::PathBuf;
use thiserror::Error;

/// Message shown to the user whenever an analysis call fails, whatever the
/// underlying cause. The detailed cause is logged and attached to the target
/// file instead.
pub const ANALYSIS_FAILED_MESSAGE: &str =
    "Failed to analyze the document. Please retry with a smaller file or a different format.";

/// All fatal errors returned by the scanalyze library.
#[derive(Debug, Error)]
pub enum ScanError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Session errors ────────────────────────────────────────────────────
    /// `submit` was called while submission is disabled.
    #[error("Analysis cannot be submitted: {0}")]
    SubmitDisabled(SubmitBlock),

    /// Export or copy was requested but there is no successful result.
    #[error("No analysis result is available")]
    NoResult,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the exported result file.
    #[error("Failed to write result file '{path}': {source}")]
    ExportFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Why a submission is currently disabled.
///
/// A UI shell greys out its submit control while [`crate::Session::can_submit`]
/// returns one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SubmitBlock {
    /// The prompt is empty or whitespace only.
    EmptyPrompt,
    /// The working set holds no file to analyse.
    NoFile,
    /// A request is already running.
    AlreadyRunning,
}

impl std::fmt::Display for SubmitBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitBlock::EmptyPrompt => f.write_str("the prompt is empty"),
            SubmitBlock::NoFile => f.write_str("no file has been admitted"),
            SubmitBlock::AlreadyRunning => f.write_str("an analysis is already running"),
        }
    }
}

/// A non-fatal error for a single candidate file.
///
/// The rest of the batch continues; the session keeps the most recent one as
/// its user-visible error message.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum IntakeError {
    /// The declared media type matches no pattern of the accept set.
    #[error("File {name} has unsupported type '{media_type}'")]
    UnsupportedType { name: String, media_type: String },

    /// The payload is still larger than the limit after transcoding.
    #[error("File {name} is too large. Maximum file size is {limit_mb}MB")]
    FileTooLarge { name: String, limit_mb: u64 },
}

/// Errors returned by an analyzer.
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The provider failed after every retry.
    #[error("LLM API error after {retries} retries: {message}")]
    Api { retries: u32, message: String },

    /// A single attempt exceeded the analyzer's own timeout.
    #[error("LLM call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// A PDF payload could not be rasterised.
    #[error("Could not render '{name}': {detail}")]
    Render { name: String, detail: String },

    /// The payload type cannot be sent to the analyzer.
    #[error("Media type '{media_type}' cannot be analysed")]
    UnsupportedMedia { media_type: String },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_too_large_names_file_and_limit() {
        let e = IntakeError::FileTooLarge {
            name: "scan.pdf".into(),
            limit_mb: 20,
        };
        let msg = e.to_string();
        assert!(msg.contains("scan.pdf"), "got: {msg}");
        assert!(msg.contains("20MB"), "got: {msg}");
    }

    #[test]
    fn unsupported_type_display() {
        let e = IntakeError::UnsupportedType {
            name: "notes.docx".into(),
            media_type: "application/msword".into(),
        };
        assert!(e.to_string().contains("application/msword"));
    }

    #[test]
    fn submit_disabled_display() {
        let e = ScanError::SubmitDisabled(SubmitBlock::AlreadyRunning);
        assert!(e.to_string().contains("already running"));
    }

    #[test]
    fn failure_message_names_the_remedy() {
        assert!(ANALYSIS_FAILED_MESSAGE.contains("smaller file"));
        assert!(ANALYSIS_FAILED_MESSAGE.contains("different format"));
    }

    #[test]
    fn api_error_display() {
        let e = AnalysisError::Api {
            retries: 3,
            message: "503 overloaded".into(),
        };
        assert!(e.to_string().contains("3 retries"));
        assert!(e.to_string().contains("503 overloaded"));
    }
}
