//! Leading metadata ("front matter") parsing.
//!
//! Only the block shape and top-level `key: value` pairs are understood;
//! nested YAML is ignored. The one key the pipeline cares about is the
//! reference-manager collection, spelled `collection-id`, `collection_id`,
//! `zotero`, `zotero-collection` or `zotero_collection`.

use once_cell::sync::Lazy;
use regex::Regex;

/// Keys naming a Zotero collection.
pub const COLLECTION_KEYS: &[&str] = &[
    "collection-id",
    "collection_id",
    "zotero",
    "zotero-collection",
    "zotero_collection",
];

/// `key: value` at column zero.
static KEY_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z0-9_-]+)[ \t]*:[ \t]*(.*?)[ \t]*$").unwrap());

/// A parsed metadata block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    /// Top-level entries in document order; duplicates are kept.
    pub entries: Vec<(String, String)>,
}

impl FrontMatter {
    /// Parse the metadata block at the very top of `text`.
    ///
    /// Returns `None` when the text does not open with a `---` line or the
    /// block is never closed by `---` or `...`.
    pub fn parse(text: &str) -> Option<FrontMatter> {
        let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
        let mut lines = text.lines();

        if lines.next()?.trim_end() != "---" {
            return None;
        }

        let mut entries = Vec::new();
        for line in lines {
            let line = line.trim_end();
            if line == "---" || line == "..." {
                return Some(FrontMatter { entries });
            }
            if let Some(caps) = KEY_VALUE.captures(line) {
                entries.push((caps[1].to_string(), unquote(&caps[2]).to_string()));
            }
        }

        None
    }

    /// Value of the last entry named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The collection identifier, if declared with a non-empty value.
    ///
    /// When several collection keys appear, the last one wins.
    pub fn collection_id(&self) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, v)| COLLECTION_KEYS.contains(&k.as_str()) && !v.is_empty())
            .map(|(_, v)| v.as_str())
    }
}

/// Collection identifier declared in the front matter of `text`, if any.
pub fn collection_id(text: &str) -> Option<String> {
    FrontMatter::parse(text).and_then(|fm| fm.collection_id().map(str::to_string))
}

fn unquote(value: &str) -> &str {
    for q in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
