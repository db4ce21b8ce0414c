//! Container runtime abstraction: how external tools get executed.
//!
//! Every tool (pandoc, xelatex, biber, qpdf) runs as a one-shot container
//! with the working directory bind-mounted. [`ContainerRuntime`] is the seam
//! between the pipeline and the outside world: [`DockerRuntime`] shells out
//! to the `docker` CLI, while tests inject a scripted runtime that fakes the
//! tools by writing their output files directly.

use crate::error::Md2PdfError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// A host directory bind-mounted into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub host: PathBuf,
    pub container: String,
    pub read_only: bool,
}

impl Mount {
    pub fn read_write(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            read_only: false,
        }
    }

    pub fn read_only(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            read_only: true,
        }
    }

    /// Render as a `-v` volume spec.
    pub fn volume_spec(&self) -> String {
        let mut spec = format!("{}:{}", self.host.display(), self.container);
        if self.read_only {
            spec.push_str(":ro");
        }
        spec
    }
}

/// One invocation of a tool inside the build image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRun {
    pub image: String,
    pub entrypoint: String,
    pub mounts: Vec<Mount>,
    /// Working directory inside the container.
    pub workdir: Option<String>,
    pub args: Vec<String>,
}

impl ToolRun {
    pub fn new(image: impl Into<String>, entrypoint: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            entrypoint: entrypoint.into(),
            mounts: Vec::new(),
            workdir: None,
            args: Vec::new(),
        }
    }

    pub fn mount(mut self, mount: Mount) -> Self {
        self.mounts.push(mount);
        self
    }

    pub fn workdir(mut self, dir: impl Into<String>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Host path mounted at `container_path`, if any.
    pub fn host_path_for(&self, container_path: &str) -> Option<&Path> {
        self.mounts
            .iter()
            .find(|m| m.container == container_path)
            .map(|m| m.host.as_path())
    }

    /// Full argument vector for `docker run`.
    pub fn to_run_args(&self) -> Vec<String> {
        let mut out = vec!["run".to_string(), "--rm".to_string()];
        for m in &self.mounts {
            out.push("-v".to_string());
            out.push(m.volume_spec());
        }
        if let Some(ref dir) = self.workdir {
            out.push("-w".to_string());
            out.push(dir.clone());
        }
        out.push("--entrypoint".to_string());
        out.push(self.entrypoint.clone());
        out.push(self.image.clone());
        out.extend(self.args.iter().cloned());
        out
    }
}

/// How a tool run ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolExit {
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolExit {
    pub fn ok() -> Self {
        Self {
            code: Some(0),
            ..Default::default()
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Human-readable status, e.g. `exit code 1`.
    pub fn status_text(&self) -> String {
        match self.code {
            Some(c) => format!("exit code {c}"),
            None => "terminated by signal".to_string(),
        }
    }

    /// Last few lines of diagnostic output, for error messages.
    pub fn tail(&self, lines: usize) -> String {
        let source = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        let all: Vec<&str> = source.lines().collect();
        let start = all.len().saturating_sub(lines);
        all[start..].join("\n")
    }
}

/// Executes container operations on behalf of the pipeline.
///
/// Every call blocks (awaits) until the underlying process exits; there is
/// no timeout.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Name used in error messages (e.g. `docker`).
    fn name(&self) -> &str;

    /// Check the runtime is installed and its daemon answers.
    async fn probe(&self) -> Result<(), Md2PdfError>;

    /// Whether `image` exists locally.
    async fn image_exists(&self, image: &str) -> Result<bool, Md2PdfError>;

    /// Build `image` from the build definition in `context`.
    async fn build_image(&self, image: &str, context: &Path) -> Result<(), Md2PdfError>;

    /// Run one tool to completion.
    async fn run_tool(&self, run: &ToolRun) -> Result<ToolExit, Md2PdfError>;
}

/// [`ContainerRuntime`] backed by the `docker` CLI (or a compatible binary
/// such as `podman`).
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    binary: String,
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerRuntime {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn spawn_error(&self, e: std::io::Error) -> Md2PdfError {
        if e.kind() == std::io::ErrorKind::NotFound {
            Md2PdfError::RuntimeNotInstalled {
                runtime: self.binary.clone(),
            }
        } else {
            Md2PdfError::RuntimeNotRunning {
                runtime: self.binary.clone(),
                detail: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    fn name(&self) -> &str {
        &self.binary
    }

    async fn probe(&self) -> Result<(), Md2PdfError> {
        let output = Command::new(&self.binary)
            .arg("info")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(Md2PdfError::RuntimeNotRunning {
                runtime: self.binary.clone(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    async fn image_exists(&self, image: &str) -> Result<bool, Md2PdfError> {
        let output = Command::new(&self.binary)
            .args(["images", "-q", image])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(Md2PdfError::RuntimeNotRunning {
                runtime: self.binary.clone(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(!String::from_utf8_lossy(&output.stdout).trim().is_empty())
    }

    async fn build_image(&self, image: &str, context: &Path) -> Result<(), Md2PdfError> {
        info!("Building image '{}' from {}", image, context.display());
        // Inherit stdio: first builds take minutes and the user wants to see them.
        let status = Command::new(&self.binary)
            .arg("build")
            .arg("-t")
            .arg(image)
            .arg(context)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !status.success() {
            return Err(Md2PdfError::ImageBuildFailed {
                image: image.to_string(),
                context: context.to_path_buf(),
                detail: format!("{} build exited with {}", self.binary, status),
            });
        }
        Ok(())
    }

    async fn run_tool(&self, run: &ToolRun) -> Result<ToolExit, Md2PdfError> {
        let args = run.to_run_args();
        debug!("{} {}", self.binary, args.join(" "));

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        let exit = ToolExit {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if !exit.stdout.is_empty() {
            debug!("[{}] {}", run.entrypoint, exit.stdout.trim_end());
        }
        Ok(exit)
    }
}
