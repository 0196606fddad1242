use std::process::{Command, Stdio};
use std::sync::OnceLock;

use crate::compose::merge::SheetPage;
use crate::encode::{TempFileGuard, scratch_path};

/// Why a page could not be recompressed. Never fatal: callers keep the original bytes.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CompressError {
    #[error("recompression tool '{0}' is not available")]
    Unavailable(String),

    #[error("recompression failed: {0}")]
    Failed(String),
}

/// An external step that rewrites a finished page into a smaller one.
pub trait Recompressor: Send + Sync {
    /// Return the recompressed page bytes.
    fn try_compress(&self, page: &SheetPage) -> Result<Vec<u8>, CompressError>;
}

/// Ghostscript `pdfwrite` settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GhostscriptOpts {
    /// Executable name or path.
    pub program: String,
    /// Target resolution for color, gray and mono images.
    pub resolution_dpi: u32,
    /// Value passed as `-dPDFSETTINGS`.
    pub pdf_settings: String,
}

impl Default for GhostscriptOpts {
    fn default() -> Self {
        Self {
            program: "gs".to_string(),
            resolution_dpi: 1200,
            pdf_settings: "/prepress".to_string(),
        }
    }
}

/// Recompression through the system Ghostscript binary.
#[derive(Debug)]
pub struct Ghostscript {
    opts: GhostscriptOpts,
    available: OnceLock<bool>,
}

impl Ghostscript {
    pub fn new(opts: GhostscriptOpts) -> Self {
        Self {
            opts,
            available: OnceLock::new(),
        }
    }

    pub fn opts(&self) -> &GhostscriptOpts {
        &self.opts
    }

    /// Probe `<program> --version` once; later calls reuse the answer.
    pub fn is_available(&self) -> bool {
        *self.available.get_or_init(|| {
            let ok = Command::new(&self.opts.program)
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false);
            if !ok {
                tracing::warn!(
                    program = %self.opts.program,
                    "ghostscript not found; pages will be written uncompressed"
                );
            }
            ok
        })
    }

    fn args(&self, input: &std::path::Path, output: &std::path::Path) -> Vec<String> {
        let dpi = self.opts.resolution_dpi;
        vec![
            "-sDEVICE=pdfwrite".to_string(),
            "-dCompatibilityLevel=1.4".to_string(),
            format!("-dPDFSETTINGS={}", self.opts.pdf_settings),
            "-dNOPAUSE".to_string(),
            "-dQUIET".to_string(),
            "-dBATCH".to_string(),
            format!("-dColorImageResolution={dpi}"),
            format!("-dGrayImageResolution={dpi}"),
            format!("-dMonoImageResolution={dpi}"),
            format!("-sOutputFile={}", output.display()),
            input.display().to_string(),
        ]
    }
}

impl Default for Ghostscript {
    fn default() -> Self {
        Self::new(GhostscriptOpts::default())
    }
}

impl Recompressor for Ghostscript {
    fn try_compress(&self, page: &SheetPage) -> Result<Vec<u8>, CompressError> {
        if !self.is_available() {
            return Err(CompressError::Unavailable(self.opts.program.clone()));
        }

        let stem = format!("page_{:03}", page.index + 1);
        let input = TempFileGuard(Some(scratch_path(&format!("{stem}_in"), "pdf")));
        let output = TempFileGuard(Some(scratch_path(&format!("{stem}_out"), "pdf")));
        let (Some(in_path), Some(out_path)) = (input.0.as_deref(), output.0.as_deref()) else {
            return Err(CompressError::Failed("scratch paths missing".to_string()));
        };

        std::fs::write(in_path, &page.bytes)
            .map_err(|e| CompressError::Failed(format!("write '{}': {e}", in_path.display())))?;

        let out = Command::new(&self.opts.program)
            .args(self.args(in_path, out_path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| CompressError::Failed(format!("spawn '{}': {e}", self.opts.program)))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(CompressError::Failed(format!(
                "{} exited with status {}: {}",
                self.opts.program,
                out.status,
                stderr.trim()
            )));
        }

        let bytes = std::fs::read(out_path)
            .map_err(|e| CompressError::Failed(format!("read '{}': {e}", out_path.display())))?;
        if bytes.is_empty() {
            return Err(CompressError::Failed("empty output".to_string()));
        }
        Ok(bytes)
    }
}

/// A finished page together with its recompressed form, if any.
#[derive(Clone, Debug)]
pub struct PageOutput {
    /// 0-based page index.
    pub index: usize,
    /// Bytes as rendered.
    pub original: Vec<u8>,
    /// Bytes after recompression; `None` when the step was skipped or failed.
    pub compressed: Option<Vec<u8>>,
}

impl PageOutput {
    /// Bytes that go into the final document.
    pub fn final_bytes(&self) -> &[u8] {
        self.compressed.as_deref().unwrap_or(&self.original)
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed.is_some()
    }
}

/// Run `page` through `tool`, keeping the original bytes on any failure.
pub fn compress_page(page: SheetPage, tool: Option<&dyn Recompressor>) -> PageOutput {
    let compressed = match tool.map(|t| t.try_compress(&page)) {
        None => None,
        Some(Ok(bytes)) => {
            tracing::debug!(
                page = page.index + 1,
                before = page.bytes.len(),
                after = bytes.len(),
                "page recompressed"
            );
            Some(bytes)
        }
        Some(Err(CompressError::Unavailable(_))) => None,
        Some(Err(e)) => {
            tracing::warn!(page = page.index + 1, error = %e, "using uncompressed page");
            None
        }
    };
    PageOutput {
        index: page.index,
        original: page.bytes,
        compressed,
    }
}
