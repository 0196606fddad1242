//! Page post-processing and document output.

/// Final document assembly and file output.
pub mod assemble;
/// Best-effort external recompression of finished pages.
pub mod compress;

use std::path::PathBuf;

/// Removes the file it holds when dropped.
pub(crate) struct TempFileGuard(pub(crate) Option<PathBuf>);

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Unique scratch path under the system temp dir.
pub(crate) fn scratch_path(stem: &str, ext: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "cardsheet_{stem}_{}_{}.{ext}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0)
    ))
}
