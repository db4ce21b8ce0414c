//! # edgequake-md2pdf
//!
//! Build a typeset, bibliography-aware PDF from a directory of Markdown files.
//!
//! ## Why this crate?
//!
//! pandoc + xelatex + biber produce beautiful documents, but wiring them
//! together by hand is fiddly: the TeX toolchain is huge, xelatex needs
//! several passes, biber has to run between them, and a Zotero collection
//! has to be exported first. This crate runs every tool inside a container
//! image so the only host dependency is a container runtime, and drives the
//! passes in the right order.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Markdown directory
//!  │
//!  ├─ 1. Probe       docker reachable, image present (built on first use)
//!  ├─ 2. Aggregate   concatenate .md files, read front-matter collection id
//!  ├─ 3. Bibliography local bibliography.bib + optional Zotero export
//!  ├─ 4. Materialize input.md, bibliography.bib, logo.jpg → working dir
//!  ├─ 5. Typeset     pandoc → xelatex ×2 → biber → xelatex ×2
//!  └─ 6. Finalize    optional qpdf encryption, copy out.pdf, remove working dir
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_md2pdf::{convert, BuildConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BuildConfig::builder()
//!         .tool_root("/opt/md2pdf")
//!         .collection("ABCD1234")
//!         .build()?;
//!     let output = convert("chapters/", &config).await?;
//!     eprintln!("wrote {} in {}ms",
//!         output.output_path.display(),
//!         output.stats.total_duration_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-md2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{BuildConfig, BuildConfigBuilder};
pub use convert::{convert, convert_sync, inspect};
pub use error::{FetchError, Md2PdfError};
pub use output::{BuildOutput, BuildStats, SourceSummary};
pub use pipeline::bibliography::BibliographySource;
pub use pipeline::finalize::Protection;
pub use pipeline::runtime::{ContainerRuntime, DockerRuntime, Mount, ToolExit, ToolRun};
pub use pipeline::typeset::{Stage, StageReport};
pub use progress::{BuildProgressCallback, NoopProgressCallback, ProgressCallback};
