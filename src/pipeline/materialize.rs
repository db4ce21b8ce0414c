//! Asset materialisation: put everything the container needs into the
//! working directory.
//!
//! The support files (lua filter, LaTeX template, optional CSL style) are not
//! copied; they are mounted read-only from `<tool_root>/lib`. They are still
//! validated here so a broken installation fails before any container starts.

use crate::error::Md2PdfError;
use crate::pipeline::bibliography::{Bibliography, BIBLIOGRAPHY_FILE};
use crate::pipeline::workdir::{WorkDir, INPUT_MD, LOGO_FILE};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Support directory under the tool root.
pub const SUPPORT_DIR: &str = "lib";
/// pandoc lua filter counting words.
pub const WORDCOUNT_FILTER: &str = "wordcount.lua";
/// pandoc LaTeX template.
pub const TEMPLATE: &str = "template.tex";
/// Optional citation style.
pub const CITATION_STYLE: &str = "chicago.csl";
/// Folder searched for the logo next to each base directory.
pub const ASSETS_DIR: &str = "assets";

/// Validated support files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportFiles {
    /// `<tool_root>/lib`, mounted read-only.
    pub dir: PathBuf,
    /// Whether `chicago.csl` is available.
    pub has_citation_style: bool,
}

/// What ended up in the working directory.
#[derive(Debug, Clone)]
pub struct MaterializedAssets {
    pub support: SupportFiles,
    pub has_bibliography: bool,
    /// Logo source that was copied, if any.
    pub logo: Option<PathBuf>,
}

/// Check the required support files exist under `tool_root`.
pub fn locate_support_files(tool_root: &Path) -> Result<SupportFiles, Md2PdfError> {
    let dir = tool_root.join(SUPPORT_DIR);
    if !dir.is_dir() {
        return Err(Md2PdfError::SupportFileMissing { path: dir });
    }
    for name in [WORDCOUNT_FILTER, TEMPLATE] {
        let path = dir.join(name);
        if !path.is_file() {
            return Err(Md2PdfError::SupportFileMissing { path });
        }
    }
    let has_citation_style = dir.join(CITATION_STYLE).is_file();
    Ok(SupportFiles {
        dir,
        has_citation_style,
    })
}

/// Logo locations in search order.
pub fn logo_candidates(cwd: &Path, source_dir: &Path, tool_root: &Path) -> Vec<PathBuf> {
    [cwd, source_dir, tool_root]
        .iter()
        .flat_map(|base| [base.join(ASSETS_DIR).join(LOGO_FILE), base.join(LOGO_FILE)])
        .collect()
}

/// First existing logo candidate.
pub fn find_logo(cwd: &Path, source_dir: &Path, tool_root: &Path) -> Option<PathBuf> {
    logo_candidates(cwd, source_dir, tool_root)
        .into_iter()
        .find(|p| p.is_file())
}

/// Populate `work` with the combined document, bibliography and logo.
pub async fn materialize(
    work: &WorkDir,
    combined: &str,
    bibliography: Option<&Bibliography>,
    source_dir: &Path,
    tool_root: &Path,
    cwd: &Path,
) -> Result<MaterializedAssets, Md2PdfError> {
    let support = locate_support_files(tool_root)?;

    write_file(work, INPUT_MD, combined.as_bytes()).await?;

    if let Some(bib) = bibliography {
        write_file(work, BIBLIOGRAPHY_FILE, &bib.bytes).await?;
        debug!("Wrote {:?} bibliography", bib.source);
    }

    let logo = find_logo(cwd, source_dir, tool_root);
    match logo {
        Some(ref src) => {
            let dest = work.join(LOGO_FILE);
            tokio::fs::copy(src, &dest)
                .await
                .map_err(|e| Md2PdfError::WorkDir {
                    path: dest,
                    source: e,
                })?;
            debug!("Using logo {}", src.display());
        }
        None => warn!(
            "No {} found (looked in {}/, {}/ and {}/)",
            LOGO_FILE,
            cwd.display(),
            source_dir.display(),
            tool_root.display()
        ),
    }

    Ok(MaterializedAssets {
        support,
        has_bibliography: bibliography.is_some(),
        logo,
    })
}

async fn write_file(work: &WorkDir, name: &str, bytes: &[u8]) -> Result<(), Md2PdfError> {
    let path = work.join(name);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| Md2PdfError::WorkDir { path, source: e })
}
