//! Result types returned by the build entry points.

use crate::pipeline::bibliography::BibliographySource;
use crate::pipeline::typeset::StageReport;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A finished build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildOutput {
    /// Where the final PDF was written.
    pub output_path: PathBuf,
    /// Generated user password, present in read-only mode only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub stats: BuildStats,
}

/// Facts about a build, for summaries and `--json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildStats {
    /// Markdown files concatenated.
    pub markdown_files: usize,
    /// Bytes in the combined document.
    pub combined_bytes: usize,
    /// Collection identifier in effect, if any.
    pub collection_id: Option<String>,
    pub bibliography: BibliographySource,
    /// Set when the bibliography fetch failed and the build degraded.
    pub fetch_warning: Option<String>,
    /// Logo file that was used.
    pub logo: Option<PathBuf>,
    /// Whether the build image had to be built first.
    pub image_built: bool,
    /// Whether the output is encrypted.
    pub encrypted: bool,
    /// Completed stages in order.
    pub stages: Vec<StageReport>,
    pub total_duration_ms: u64,
}

/// What a source directory would produce, without running any container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSummary {
    pub source_dir: PathBuf,
    /// Markdown files in concatenation order.
    pub files: Vec<PathBuf>,
    pub combined_bytes: usize,
    /// Identifier declared in front matter (last one wins).
    pub collection_id: Option<String>,
    /// Whether `bibliography.bib` exists at the source root.
    pub local_bibliography: bool,
}
