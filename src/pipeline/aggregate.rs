//! Source aggregation: flatten a Markdown tree into one document.
//!
//! ## Ordering
//!
//! Within a directory, files come first in ascending name order, then each
//! subdirectory is visited depth-first, also in ascending name order. The
//! result never depends on the order the OS hands back directory entries, so
//! the same tree always produces the same book.

use crate::error::Md2PdfError;
use crate::pipeline::metadata;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// File-name suffixes treated as Markdown.
pub const MARKDOWN_SUFFIXES: &[&str] = &[".md", ".markdown"];

/// Separator placed in front of every file's content.
pub const FILE_SEPARATOR: &str = "\n\n";

/// The combined document plus what was learned while building it.
#[derive(Debug, Clone, Default)]
pub struct Aggregate {
    /// Concatenated Markdown fed to the converter.
    pub combined: String,
    /// Collection identifier from the last file that declared one.
    pub collection_id: Option<String>,
    /// Files included, in concatenation order.
    pub files: Vec<PathBuf>,
}

/// Whether `name` carries a Markdown suffix.
pub fn is_markdown(name: &str) -> bool {
    MARKDOWN_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Files before directories, then byte-wise by name.
fn walk_order(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}

/// List Markdown files under `source_dir` in concatenation order.
pub fn markdown_files(source_dir: &Path) -> Result<Vec<PathBuf>, Md2PdfError> {
    if !source_dir.is_dir() {
        return Err(Md2PdfError::SourceDirNotFound {
            path: source_dir.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(source_dir).sort_by(walk_order) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy();
        // `Path::is_file` follows symlinks, matching what a reader would open.
        if is_markdown(&name) && entry.path().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Concatenate every Markdown file under `source_dir`.
///
/// A tree with no Markdown files yields an empty document; that is not an
/// error here and surfaces later when the converter has nothing to convert.
pub fn aggregate(source_dir: &Path) -> Result<Aggregate, Md2PdfError> {
    let files = markdown_files(source_dir)?;
    let mut combined = String::new();
    let mut collection_id = None;

    for path in &files {
        let bytes = std::fs::read(path).map_err(|e| Md2PdfError::ReadFailed {
            path: path.clone(),
            source: e,
        })?;
        let text = String::from_utf8(bytes)
            .map_err(|_| Md2PdfError::InvalidUtf8 { path: path.clone() })?;

        if let Some(id) = metadata::collection_id(&text) {
            debug!("{} declares collection '{}'", path.display(), id);
            collection_id = Some(id);
        }

        combined.push_str(FILE_SEPARATOR);
        combined.push_str(&text);
    }

    debug!(
        "Aggregated {} Markdown files ({} bytes)",
        files.len(),
        combined.len()
    );

    Ok(Aggregate {
        combined,
        collection_id,
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, content).unwrap();
    }

    #[test]
    fn suffixes() {
        assert!(is_markdown("a.md"));
        assert!(is_markdown("notes.markdown"));
        assert!(!is_markdown("a.MD"));
        assert!(!is_markdown("a.md.bak"));
        assert!(!is_markdown("bibliography.bib"));
    }

    #[test]
    fn files_before_subdirectories_sorted() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "c.md", "C");
        write(root, "b/x.md", "BX");
        write(root, "a.md", "A");
        write(root, "a/z.md", "AZ");
        write(root, "a/deeper/y.md", "ADY");
        write(root, "a/m.markdown", "AM");
        write(root, "ignored.txt", "nope");

        let agg = aggregate(root).unwrap();
        assert_eq!(agg.combined, "\n\nA\n\nC\n\nAM\n\nAZ\n\nADY\n\nBX");

        let rel: Vec<_> = agg
            .files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            rel,
            vec![
                PathBuf::from("a.md"),
                PathBuf::from("c.md"),
                PathBuf::from("a/m.markdown"),
                PathBuf::from("a/z.md"),
                PathBuf::from("a/deeper/y.md"),
                PathBuf::from("b/x.md"),
            ]
        );
    }

    #[test]
    fn empty_tree_is_empty_document() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "readme.txt", "not markdown");
        let agg = aggregate(tmp.path()).unwrap();
        assert!(agg.combined.is_empty());
        assert!(agg.files.is_empty());
        assert_eq!(agg.collection_id, None);
    }

    #[test]
    fn last_declared_collection_wins() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "01.md", "---\nzotero: FIRST\n---\none");
        write(tmp.path(), "02.md", "two");
        write(tmp.path(), "sub/03.md", "---\nzotero: LAST\n---\nthree");
        let agg = aggregate(tmp.path()).unwrap();
        assert_eq!(agg.collection_id.as_deref(), Some("LAST"));
    }

    #[test]
    fn invalid_utf8_is_fatal() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("bad.md"), [0xff, 0xfe, 0x00, 0x41]).unwrap();
        match aggregate(tmp.path()) {
            Err(Md2PdfError::InvalidUtf8 { path }) => assert!(path.ends_with("bad.md")),
            other => panic!("expected InvalidUtf8, got {other:?}"),
        }
    }

    #[test]
    fn missing_directory() {
        let tmp = TempDir::new().unwrap();
        let gone = tmp.path().join("nope");
        assert!(matches!(
            aggregate(&gone),
            Err(Md2PdfError::SourceDirNotFound { .. })
        ));
    }

    #[test]
    fn file_instead_of_directory() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.md", "A");
        assert!(matches!(
            aggregate(&tmp.path().join("a.md")),
            Err(Md2PdfError::SourceDirNotFound { .. })
        ));
    }
}
