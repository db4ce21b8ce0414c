//! Shared fixtures for the pipeline integration tests.
//!
//! [`ScriptedRuntime`] stands in for docker: instead of starting containers
//! it plays each tool by writing the file that tool would have produced into
//! the mounted working directory.

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_md2pdf::{ContainerRuntime, Md2PdfError, ToolExit, ToolRun};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

/// How a scripted tool misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Exit with status 1.
    ExitFailure,
    /// Exit 0 without writing the output file.
    NoArtifact,
}

/// What the runtime saw during one build.
#[derive(Debug, Default)]
struct Log {
    runs: Vec<ToolRun>,
    builds: Vec<(String, PathBuf)>,
    /// Entries of the working directory at each invocation.
    snapshots: Vec<Vec<String>>,
    /// `bibliography.bib` as pandoc found it.
    bibliography: Option<Vec<u8>>,
}

/// A [`ContainerRuntime`] that fakes pandoc, xelatex, biber and qpdf.
pub struct ScriptedRuntime {
    daemon_down: bool,
    image_present: Mutex<bool>,
    /// `(entrypoint, nth call of that entrypoint starting at 1, fault)`.
    faults: Vec<(String, usize, Fault)>,
    log: Mutex<Log>,
}

impl Default for ScriptedRuntime {
    fn default() -> Self {
        Self {
            daemon_down: false,
            image_present: Mutex::new(true),
            faults: Vec::new(),
            log: Mutex::new(Log::default()),
        }
    }
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn daemon_down(mut self) -> Self {
        self.daemon_down = true;
        self
    }

    pub fn without_image(self) -> Self {
        *self.image_present.lock().unwrap() = false;
        self
    }

    /// Make the `nth` call of `tool` misbehave.
    pub fn fail(mut self, tool: &str, nth: usize, fault: Fault) -> Self {
        self.faults.push((tool.to_string(), nth, fault));
        self
    }

    pub fn runs(&self) -> Vec<ToolRun> {
        self.log.lock().unwrap().runs.clone()
    }

    pub fn entrypoints(&self) -> Vec<String> {
        self.runs().into_iter().map(|r| r.entrypoint).collect()
    }

    pub fn run_of(&self, tool: &str) -> Option<ToolRun> {
        self.runs().into_iter().find(|r| r.entrypoint == tool)
    }

    pub fn bibliography_seen(&self) -> Option<Vec<u8>> {
        self.log.lock().unwrap().bibliography.clone()
    }

    pub fn builds(&self) -> Vec<(String, PathBuf)> {
        self.log.lock().unwrap().builds.clone()
    }

    /// Working-directory listing when the first `tool` call started.
    pub fn snapshot_at(&self, tool: &str) -> Vec<String> {
        let log = self.log.lock().unwrap();
        log.runs
            .iter()
            .position(|r| r.entrypoint == tool)
            .map(|i| log.snapshots[i].clone())
            .unwrap_or_default()
    }

    fn fault_for(&self, tool: &str, nth: usize) -> Option<Fault> {
        self.faults
            .iter()
            .find(|(t, n, _)| t == tool && *n == nth)
            .map(|(_, _, f)| *f)
    }
}

fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

/// Map `/workdir/<name>` in an argument to the host working directory.
fn host_file(work: &Path, container_path: &str) -> PathBuf {
    work.join(container_path.trim_start_matches("/workdir/"))
}

#[async_trait]
impl ContainerRuntime for ScriptedRuntime {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn probe(&self) -> Result<(), Md2PdfError> {
        if self.daemon_down {
            return Err(Md2PdfError::RuntimeNotRunning {
                runtime: "scripted".into(),
                detail: "Cannot connect to the daemon".into(),
            });
        }
        Ok(())
    }

    async fn image_exists(&self, _image: &str) -> Result<bool, Md2PdfError> {
        Ok(*self.image_present.lock().unwrap())
    }

    async fn build_image(&self, image: &str, context: &Path) -> Result<(), Md2PdfError> {
        self.log
            .lock()
            .unwrap()
            .builds
            .push((image.to_string(), context.to_path_buf()));
        *self.image_present.lock().unwrap() = true;
        Ok(())
    }

    async fn run_tool(&self, run: &ToolRun) -> Result<ToolExit, Md2PdfError> {
        let work = run
            .host_path_for("/workdir")
            .expect("every tool mounts the working directory")
            .to_path_buf();

        let nth = {
            let mut log = self.log.lock().unwrap();
            log.snapshots.push(list_dir(&work));
            if run.entrypoint == "pandoc" {
                log.bibliography = fs::read(work.join("bibliography.bib")).ok();
            }
            log.runs.push(run.clone());
            log.runs
                .iter()
                .filter(|r| r.entrypoint == run.entrypoint)
                .count()
        };

        match self.fault_for(&run.entrypoint, nth) {
            Some(Fault::ExitFailure) => {
                return Ok(ToolExit::failed(1, format!("{} exploded\n! Fatal error", run.entrypoint)))
            }
            Some(Fault::NoArtifact) => return Ok(ToolExit::ok()),
            None => {}
        }

        match run.entrypoint.as_str() {
            "pandoc" => {
                let out = run
                    .args
                    .iter()
                    .position(|a| a == "--output")
                    .and_then(|i| run.args.get(i + 1))
                    .expect("pandoc gets --output");
                let input = run.args.last().expect("pandoc gets an input file");
                let md = fs::read_to_string(host_file(&work, input)).unwrap();
                fs::write(host_file(&work, out), format!("% tex\n{md}")).unwrap();
            }
            "xelatex" => {
                fs::write(work.join("out.bcf"), "<bcf/>").unwrap();
                fs::write(work.join("out.pdf"), format!("%PDF-1.7 pass {nth}")).unwrap();
            }
            "biber" => {
                fs::write(work.join("out.bbl"), "% bbl").unwrap();
            }
            "qpdf" => {
                let paths: Vec<&String> = run
                    .args
                    .iter()
                    .skip_while(|a| a.as_str() != "--")
                    .skip(1)
                    .collect();
                let src = fs::read_to_string(host_file(&work, paths[0])).unwrap();
                fs::write(host_file(&work, paths[1]), format!("ENCRYPTED:{src}")).unwrap();
            }
            other => panic!("unexpected tool {other}"),
        }
        Ok(ToolExit::ok())
    }
}

/// Route library logs through the test harness (`--nocapture` shows them).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("edgequake_md2pdf=debug"))
        .with_test_writer()
        .try_init();
}

/// A tool root with the required support files (and optionally a CSL style).
pub fn tool_root(with_csl: bool) -> TempDir {
    let tmp = TempDir::new().unwrap();
    let lib = tmp.path().join("lib");
    fs::create_dir(&lib).unwrap();
    fs::write(lib.join("wordcount.lua"), "-- wordcount").unwrap();
    fs::write(lib.join("template.tex"), "$body$").unwrap();
    if with_csl {
        fs::write(lib.join("chicago.csl"), "<style/>").unwrap();
    }
    fs::write(tmp.path().join("Dockerfile"), "FROM scratch\n").unwrap();
    tmp
}

/// Write `files` (relative path, content) under a fresh source directory.
pub fn source_dir(files: &[(&str, &str)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for (rel, content) in files {
        let path = tmp.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
    tmp
}

/// Entries left under a work root after a build.
pub fn leftovers(root: &Path) -> Vec<String> {
    list_dir(root)
}
