//! Result export.

use crate::error::ScanError;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of an exported result.
pub const RESULT_FILE_NAME: &str = "analysis-result.txt";

/// Write `text` to `dir/analysis-result.txt`, byte for byte.
///
/// Uses atomic write (temp file + rename) so a reader never sees a partial
/// file. `dir` is created if missing.
pub async fn write_result(dir: &Path, text: &str) -> Result<PathBuf, ScanError> {
    let path = dir.join(RESULT_FILE_NAME);
    let fail = |source: std::io::Error| ScanError::ExportFailed {
        path: path.clone(),
        source,
    };

    tokio::fs::create_dir_all(dir).await.map_err(fail)?;

    let tmp_path = path.with_extension("txt.tmp");
    tokio::fs::write(&tmp_path, text.as_bytes()).await.map_err(fail)?;
    tokio::fs::rename(&tmp_path, &path).await.map_err(fail)?;

    info!("Result written to {} ({} bytes)", path.display(), text.len());
    Ok(path)
}
