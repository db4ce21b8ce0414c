//! Bibliography resolution: local `bibliography.bib`, a Zotero export, or both.
//!
//! ## Precedence
//!
//! An explicitly supplied collection beats one discovered in front matter,
//! which beats no fetch at all. A failed fetch never aborts the build: it is
//! reported as a [`FetchError`] and the local file (if any) is used alone.
//!
//! ## Merging
//!
//! When both sources exist the texts are concatenated, local first, with one
//! blank line in between. Entries are not deduplicated; a key present in both
//! is left for biber to warn about.
//!
//! Bibliographies are handled as bytes. biber accepts `.bib` files in legacy
//! encodings, so the local file is passed through without decoding.

use crate::error::{FetchError, Md2PdfError};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Name of the bibliography file in the source directory and working directory.
pub const BIBLIOGRAPHY_FILE: &str = "bibliography.bib";

/// Placeholder substituted with the collection identifier in the URL template.
pub const COLLECTION_PLACEHOLDER: &str = "{collection}";

/// Everything but RFC 3986 unreserved characters gets escaped in identifiers.
const IDENTIFIER_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Better BibTeX's collection export on Zotero's local connector port.
pub const DEFAULT_ZOTERO_URL: &str =
    "http://127.0.0.1:23119/better-bibtex/export/collection?/1/{collection}.biblatex";

/// Where the bibliography in effect came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BibliographySource {
    /// No bibliography; the converter gets no `--bibliography` flag.
    #[default]
    None,
    /// Only the source directory's `bibliography.bib`.
    Local,
    /// Only the reference-manager export.
    Remote,
    /// Local file followed by the export.
    Merged,
}

/// Bibliography contents ready to be written into the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bibliography {
    /// Raw `.bib` bytes, in whatever encoding the sources used.
    pub bytes: Vec<u8>,
    pub source: BibliographySource,
}

/// Outcome of [`resolve`].
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub bibliography: Option<Bibliography>,
    /// Collection identifier that was in effect, if any.
    pub collection_id: Option<String>,
    /// Set when a fetch was attempted and failed.
    pub fetch_error: Option<FetchError>,
}

impl Resolution {
    pub fn source(&self) -> BibliographySource {
        self.bibliography
            .as_ref()
            .map(|b| b.source)
            .unwrap_or_default()
    }
}

/// Pick the collection identifier in effect.
pub fn effective_collection<'a>(
    explicit: Option<&'a str>,
    discovered: Option<&'a str>,
) -> Option<&'a str> {
    explicit
        .filter(|s| !s.is_empty())
        .or(discovered.filter(|s| !s.is_empty()))
}

/// Expand the URL template for `collection`, percent-encoding the identifier
/// so it always stays inside its own segment.
pub fn collection_url(template: &str, collection: &str) -> String {
    let encoded = utf8_percent_encode(collection, IDENTIFIER_ESCAPES).to_string();
    template.replace(COLLECTION_PLACEHOLDER, &encoded)
}

/// Concatenate local and remote bibliographies with exactly one blank line.
pub fn merge(local: &[u8], remote: &[u8]) -> Vec<u8> {
    let local = local.trim_ascii_end();
    let remote = remote.trim_ascii_start();
    let mut out = Vec::with_capacity(local.len() + remote.len() + 2);
    out.extend_from_slice(local);
    out.extend_from_slice(b"\n\n");
    out.extend_from_slice(remote);
    out
}

/// GET the export for `collection`.
pub async fn fetch_collection(
    client: &reqwest::Client,
    url_template: &str,
    collection: &str,
) -> Result<Vec<u8>, FetchError> {
    let url = collection_url(url_template, collection);
    info!("Fetching bibliography for collection '{}'", collection);
    debug!("GET {}", url);

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| FetchError::Request {
            url: url.clone(),
            detail: e.to_string(),
        })?;

    if !response.status().is_success() {
        return Err(FetchError::Status {
            url,
            status: response.status().as_u16(),
        });
    }

    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| FetchError::Body {
            url,
            detail: e.to_string(),
        })
}

/// Read `bibliography.bib` from the source directory, if present.
pub async fn read_local(source_dir: &Path) -> Result<Option<Vec<u8>>, Md2PdfError> {
    let path = source_dir.join(BIBLIOGRAPHY_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    tokio::fs::read(&path)
        .await
        .map(Some)
        .map_err(|e| Md2PdfError::ReadFailed { path, source: e })
}

/// Decide which bibliography the build uses.
///
/// Only a failure to read an existing local file is fatal; fetch failures end
/// up in [`Resolution::fetch_error`].
pub async fn resolve(
    source_dir: &Path,
    explicit: Option<&str>,
    discovered: Option<&str>,
    client: &reqwest::Client,
    url_template: &str,
) -> Result<Resolution, Md2PdfError> {
    let local = read_local(source_dir).await?;
    let collection = effective_collection(explicit, discovered).map(str::to_string);

    let mut fetch_error = None;
    let remote = match collection.as_deref() {
        Some(id) => match fetch_collection(client, url_template, id).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("{}", e);
                if local.is_some() {
                    warn!("Continuing with local {} only", BIBLIOGRAPHY_FILE);
                } else {
                    warn!("Continuing without a bibliography");
                }
                fetch_error = Some(e);
                None
            }
        },
        None => None,
    };

    let bibliography = match (local, remote) {
        (Some(l), Some(r)) => Some(Bibliography {
            bytes: merge(&l, &r),
            source: BibliographySource::Merged,
        }),
        (Some(l), None) => Some(Bibliography {
            bytes: l,
            source: BibliographySource::Local,
        }),
        (None, Some(r)) => Some(Bibliography {
            bytes: r,
            source: BibliographySource::Remote,
        }),
        (None, None) => None,
    };

    Ok(Resolution {
        bibliography,
        collection_id: collection,
        fetch_error,
    })
}
