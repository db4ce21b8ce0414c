//! Error types for the edgequake-md2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Md2PdfError`] - **Fatal**: the build cannot proceed at all (container
//!   runtime missing, source directory absent, a pipeline stage failed).
//!   Returned as `Err(Md2PdfError)` from the top-level `convert*` functions.
//!
//! * [`FetchError`] - **Non-fatal**: the reference-manager export could not
//!   be fetched. Stored inside
//!   [`crate::pipeline::bibliography::Resolution`] and downgraded to a
//!   warning; the build continues with the local bibliography (or none).

use crate::pipeline::typeset::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-md2pdf library.
#[derive(Debug, Error)]
pub enum Md2PdfError {
    // ── Environment errors ────────────────────────────────────────────────
    /// The container runtime binary could not be spawned.
    #[error("Container runtime '{runtime}' is not installed or not on PATH\nInstall it, or point --runtime at the right binary.")]
    RuntimeNotInstalled { runtime: String },

    /// The runtime binary exists but its daemon is unreachable.
    #[error("Container runtime '{runtime}' is not running or not accessible: {detail}\nStart the daemon and check your permissions.")]
    RuntimeNotRunning { runtime: String, detail: String },

    // ── Build errors ──────────────────────────────────────────────────────
    /// The build image was missing and could not be built.
    #[error("Failed to build image '{image}' from '{context}': {detail}")]
    ImageBuildFailed {
        image: String,
        context: PathBuf,
        detail: String,
    },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Source directory does not exist or is not a directory.
    #[error("Source directory not found: '{path}'\nCheck the path exists and is a directory.")]
    SourceDirNotFound { path: PathBuf },

    /// A Markdown file is not valid UTF-8.
    #[error("File is not valid UTF-8: '{path}'\nRe-save it with UTF-8 encoding.")]
    InvalidUtf8 { path: PathBuf },

    /// An input file exists but could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required support file is missing from the tool root.
    #[error("Required support file not found: '{path}'\nSet --tool-root (or MD2PDF_HOME) to the directory containing lib/.")]
    SupportFileMissing { path: PathBuf },

    // ── Stage errors ──────────────────────────────────────────────────────
    /// An external tool exited unsuccessfully.
    #[error("Stage '{stage}' failed ({status})\n{detail}")]
    StageFailed {
        stage: Stage,
        status: String,
        detail: String,
    },

    /// An external tool exited cleanly but left no expected output file.
    #[error("Stage '{stage}' did not produce '{artifact}'")]
    ArtifactMissing { stage: Stage, artifact: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or populate the working directory.
    #[error("Working directory error at '{path}': {source}")]
    WorkDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write the final PDF.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Md2PdfError {
    /// The pipeline stage this error belongs to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Md2PdfError::StageFailed { stage, .. } | Md2PdfError::ArtifactMissing { stage, .. } => {
                Some(*stage)
            }
            _ => None,
        }
    }
}

/// A non-fatal error fetching bibliography entries from the reference manager.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum FetchError {
    /// The request never got a response (connection refused, DNS, timeout).
    #[error("Bibliography fetch from '{url}' failed: {detail}\nIs Zotero running with Better BibTeX installed?")]
    Request { url: String, detail: String },

    /// The endpoint answered with a non-success status.
    #[error("Bibliography fetch from '{url}' returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The response body could not be read.
    #[error("Bibliography fetch from '{url}' returned an unreadable body: {detail}")]
    Body { url: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_failed_display() {
        let e = Md2PdfError::StageFailed {
            stage: Stage::Bibliography,
            status: "exit code 2".into(),
            detail: "ERROR - Cannot find 'out.bcf'!".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("biber"), "got: {msg}");
        assert!(msg.contains("exit code 2"), "got: {msg}");
        assert_eq!(e.stage(), Some(Stage::Bibliography));
    }

    #[test]
    fn artifact_missing_display() {
        let e = Md2PdfError::ArtifactMissing {
            stage: Stage::Typeset { pass: 3 },
            artifact: "out.pdf".into(),
        };
        assert!(e.to_string().contains("out.pdf"));
        assert!(e.to_string().contains("pass 3"));
    }

    #[test]
    fn support_file_missing_names_file() {
        let e = Md2PdfError::SupportFileMissing {
            path: PathBuf::from("lib/template.tex"),
        };
        assert!(e.to_string().contains("lib/template.tex"));
        assert_eq!(e.stage(), None);
    }

    #[test]
    fn fetch_status_display() {
        let e = FetchError::Status {
            url: "http://127.0.0.1:23119/x".into(),
            status: 404,
        };
        assert!(e.to_string().contains("HTTP 404"));
    }

    #[test]
    fn fetch_request_display_has_hint() {
        let e = FetchError::Request {
            url: "http://127.0.0.1:23119/x".into(),
            detail: "connection refused".into(),
        };
        assert!(e.to_string().contains("Zotero"));
    }
}
