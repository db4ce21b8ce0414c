//! Per-run scratch directory mounted into every container.
//!
//! A [`WorkDir`] is created fresh for each build and passed explicitly to
//! every stage. It wraps a [`TempDir`], so the directory disappears when the
//! value is dropped on any error path, or when [`WorkDir::close`] is called on
//! the happy path.

use crate::error::Md2PdfError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Combined Markdown document.
pub const INPUT_MD: &str = "input.md";
/// pandoc output.
pub const OUT_TEX: &str = "out.tex";
/// biber output.
pub const OUT_BBL: &str = "out.bbl";
/// xelatex output.
pub const OUT_PDF: &str = "out.pdf";
/// qpdf output.
pub const PROTECTED_PDF: &str = "protected.pdf";
/// Logo copied from the first matching candidate.
pub const LOGO_FILE: &str = "logo.jpg";

/// The working directory of one build.
#[derive(Debug)]
pub struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    /// Create a new, empty working directory under `root` (or the system
    /// temp directory).
    pub fn create(root: Option<&Path>) -> Result<Self, Md2PdfError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("md2pdf-");
        let dir = match root {
            Some(r) => builder.tempdir_in(r).map_err(|e| Md2PdfError::WorkDir {
                path: r.to_path_buf(),
                source: e,
            })?,
            None => builder.tempdir().map_err(|e| Md2PdfError::WorkDir {
                path: std::env::temp_dir(),
                source: e,
            })?,
        };
        debug!("Working directory: {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.join(name).is_file()
    }

    /// Remove the directory now. Failures are logged, never returned: cleanup
    /// must not mask the outcome of the build.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!("Removed working directory {}", path.display()),
            Err(e) => warn!(
                "Failed to remove working directory {}: {}",
                path.display(),
                e
            ),
        }
    }
}
