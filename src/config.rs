//! Configuration types for Markdown-to-PDF builds.
//!
//! All build behaviour is controlled through [`BuildConfig`], built via its
//! [`BuildConfigBuilder`]. Defaults reproduce the classic setup: `docker`,
//! an image called `pandoc_pdf_local` built from the tool root, `out.pdf` in
//! the current directory.

use crate::error::Md2PdfError;
use crate::pipeline::bibliography::{COLLECTION_PLACEHOLDER, DEFAULT_ZOTERO_URL};
use crate::pipeline::finalize::Protection;
use crate::pipeline::runtime::{ContainerRuntime, DockerRuntime};
use crate::pipeline::typeset::MIN_TYPESET_PASSES;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default container image name.
pub const DEFAULT_IMAGE: &str = "pandoc_pdf_local";
/// Default container runtime binary.
pub const DEFAULT_RUNTIME: &str = "docker";
/// Default output file, relative to the current directory.
pub const DEFAULT_OUTPUT: &str = "out.pdf";

/// Configuration for one build.
///
/// # Example
/// ```rust
/// use edgequake_md2pdf::BuildConfig;
///
/// let config = BuildConfig::builder()
///     .read_only("owner-secret")
///     .collection("ABCD1234")
///     .output_path("thesis.pdf")
///     .build()
///     .unwrap();
/// assert!(config.protection.is_some());
/// ```
#[derive(Clone)]
pub struct BuildConfig {
    /// Container runtime binary. Default: `docker`.
    pub runtime_binary: String,

    /// Pre-constructed runtime. Takes precedence over `runtime_binary`.
    pub runtime: Option<Arc<dyn ContainerRuntime>>,

    /// Build image name. Default: `pandoc_pdf_local`.
    pub image: String,

    /// Directory holding the `Dockerfile`, `lib/` and optional logo.
    /// Default: current directory.
    pub tool_root: PathBuf,

    /// Where the final PDF is written. Default: `out.pdf`.
    pub output_path: PathBuf,

    /// Read-only mode. Default: off.
    pub protection: Option<Protection>,

    /// Collection identifier supplied by the caller; beats front matter.
    pub collection: Option<String>,

    /// Export URL with a `{collection}` placeholder.
    /// Default: Better BibTeX on `127.0.0.1:23119`.
    pub zotero_url: String,

    /// xelatex passes on each side of biber. Default and minimum: 2.
    pub typeset_passes: u32,

    /// Parent for the working directory. Default: system temp directory.
    ///
    /// Docker Desktop only shares some host paths with its VM; point this at
    /// a shared location if the default is not.
    pub work_root: Option<PathBuf>,

    /// Receives per-stage events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            runtime_binary: DEFAULT_RUNTIME.to_string(),
            runtime: None,
            image: DEFAULT_IMAGE.to_string(),
            tool_root: PathBuf::from("."),
            output_path: PathBuf::from(DEFAULT_OUTPUT),
            protection: None,
            collection: None,
            zotero_url: DEFAULT_ZOTERO_URL.to_string(),
            typeset_passes: MIN_TYPESET_PASSES,
            work_root: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BuildConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildConfig")
            .field("runtime_binary", &self.runtime_binary)
            .field("runtime", &self.runtime.as_ref().map(|_| "<dyn ContainerRuntime>"))
            .field("image", &self.image)
            .field("tool_root", &self.tool_root)
            .field("output_path", &self.output_path)
            .field("protection", &self.protection)
            .field("collection", &self.collection)
            .field("zotero_url", &self.zotero_url)
            .field("typeset_passes", &self.typeset_passes)
            .field("work_root", &self.work_root)
            .finish()
    }
}

impl BuildConfig {
    /// Create a new builder for `BuildConfig`.
    pub fn builder() -> BuildConfigBuilder {
        BuildConfigBuilder {
            config: Self::default(),
        }
    }

    /// The runtime to use: the injected one, else a [`DockerRuntime`].
    pub fn resolve_runtime(&self) -> Arc<dyn ContainerRuntime> {
        match self.runtime {
            Some(ref rt) => Arc::clone(rt),
            None => Arc::new(DockerRuntime::new(self.runtime_binary.clone())),
        }
    }
}

/// Builder for [`BuildConfig`].
#[derive(Debug)]
pub struct BuildConfigBuilder {
    config: BuildConfig,
}

impl BuildConfigBuilder {
    pub fn runtime_binary(mut self, binary: impl Into<String>) -> Self {
        self.config.runtime_binary = binary.into();
        self
    }

    pub fn runtime(mut self, runtime: Arc<dyn ContainerRuntime>) -> Self {
        self.config.runtime = Some(runtime);
        self
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.config.image = image.into();
        self
    }

    pub fn tool_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.tool_root = dir.into();
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_path = path.into();
        self
    }

    /// Encrypt the output with `owner_password` and a generated user password.
    pub fn read_only(mut self, owner_password: impl Into<String>) -> Self {
        self.config.protection = Some(Protection {
            owner_password: owner_password.into(),
        });
        self
    }

    pub fn protection(mut self, protection: Option<Protection>) -> Self {
        self.config.protection = protection;
        self
    }

    pub fn collection(mut self, id: impl Into<String>) -> Self {
        self.config.collection = Some(id.into());
        self
    }

    pub fn zotero_url(mut self, template: impl Into<String>) -> Self {
        self.config.zotero_url = template.into();
        self
    }

    pub fn typeset_passes(mut self, n: u32) -> Self {
        self.config.typeset_passes = n.max(MIN_TYPESET_PASSES);
        self
    }

    pub fn work_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_root = Some(dir.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BuildConfig, Md2PdfError> {
        let c = &self.config;
        if c.image.trim().is_empty() {
            return Err(Md2PdfError::InvalidConfig("Image name must not be empty".into()));
        }
        if c.runtime.is_none() && c.runtime_binary.trim().is_empty() {
            return Err(Md2PdfError::InvalidConfig(
                "Container runtime binary must not be empty".into(),
            ));
        }
        if !c.zotero_url.contains(COLLECTION_PLACEHOLDER) {
            return Err(Md2PdfError::InvalidConfig(format!(
                "Zotero URL must contain {COLLECTION_PLACEHOLDER}, got '{}'",
                c.zotero_url
            )));
        }
        if c.output_path.as_os_str().is_empty() {
            return Err(Md2PdfError::InvalidConfig("Output path must not be empty".into()));
        }
        if let Some(ref id) = c.collection {
            if id.trim().is_empty() {
                return Err(Md2PdfError::InvalidConfig(
                    "Collection identifier must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}
