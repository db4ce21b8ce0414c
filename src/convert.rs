//! Build entry points: from a Markdown directory to a finished PDF.
//!
//! [`convert`] drives the whole flow. Everything after bibliography
//! resolution happens inside a fresh [`WorkDir`], which is removed whether
//! the build succeeds or fails.

use crate::config::BuildConfig;
use crate::error::Md2PdfError;
use crate::output::{BuildOutput, BuildStats, SourceSummary};
use crate::pipeline::aggregate::{self, Aggregate};
use crate::pipeline::bibliography::{self, Resolution, BIBLIOGRAPHY_FILE};
use crate::pipeline::finalize::finalize;
use crate::pipeline::materialize::materialize;
use crate::pipeline::probe::{ensure_ready, ImageStatus};
use crate::pipeline::runtime::ContainerRuntime;
use crate::pipeline::typeset::{run_pipeline, stage_plan, StageContext};
use crate::pipeline::workdir::{WorkDir, LOGO_FILE};
use crate::progress::{BuildProgressCallback, NoopProgressCallback};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

static NOOP_PROGRESS: NoopProgressCallback = NoopProgressCallback;

/// Build a PDF from every Markdown file under `source_dir`.
///
/// # Arguments
/// * `source_dir`: directory tree of `.md` / `.markdown` files, optionally
///   with a `bibliography.bib` at its root
/// * `config`: build configuration
///
/// # Returns
/// `Ok(BuildOutput)` once the PDF is at `config.output_path`. A failed
/// bibliography fetch is not an error; see `output.stats.fetch_warning`.
///
/// # Errors
/// Any environment, input or stage failure. The working directory is gone by
/// the time this returns either way.
pub async fn convert(
    source_dir: impl AsRef<Path>,
    config: &BuildConfig,
) -> Result<BuildOutput, Md2PdfError> {
    let source_dir = source_dir.as_ref();
    info!("Starting build: {}", source_dir.display());

    let progress: &dyn BuildProgressCallback = match config.progress_callback {
        Some(ref cb) => cb.as_ref(),
        None => &NOOP_PROGRESS,
    };

    let result = run_build(source_dir, config, progress).await;
    progress.on_build_complete(result.is_ok());
    result
}

async fn run_build(
    source_dir: &Path,
    config: &BuildConfig,
    progress: &dyn BuildProgressCallback,
) -> Result<BuildOutput, Md2PdfError> {
    let total_start = Instant::now();

    if !source_dir.is_dir() {
        return Err(Md2PdfError::SourceDirNotFound {
            path: source_dir.to_path_buf(),
        });
    }

    let cwd = current_dir()?;
    let tool_root = absolutize(&cwd, &config.tool_root);
    let source_dir = absolutize(&cwd, source_dir);

    // ── Step 1: Environment ──────────────────────────────────────────────
    let runtime = config.resolve_runtime();
    let image_status = ensure_ready(runtime.as_ref(), &config.image, &tool_root).await?;

    // ── Step 2: Aggregate sources ────────────────────────────────────────
    let agg = aggregate_blocking(&source_dir).await?;
    info!("Combined {} Markdown files", agg.files.len());

    // ── Step 3: Bibliography ─────────────────────────────────────────────
    let client = reqwest::Client::new();
    let resolution = bibliography::resolve(
        &source_dir,
        config.collection.as_deref(),
        agg.collection_id.as_deref(),
        &client,
        &config.zotero_url,
    )
    .await?;
    if let Some(ref e) = resolution.fetch_error {
        progress.on_warning(&e.to_string());
    }

    // ── Step 4: Working directory ────────────────────────────────────────
    let work_root = config.work_root.as_ref().map(|r| absolutize(&cwd, r));
    let work = WorkDir::create(work_root.as_deref())?;

    let result = build_in(
        &work,
        config,
        runtime.as_ref(),
        progress,
        &agg,
        &resolution,
        &source_dir,
        &tool_root,
        &cwd,
    )
    .await;

    // ── Step 9: Cleanup, always ──────────────────────────────────────────
    work.close();

    let (mut stats, password) = result?;
    stats.image_built = image_status == ImageStatus::Built;
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Build complete: {} stages, {}ms total",
        stats.stages.len(),
        stats.total_duration_ms
    );

    Ok(BuildOutput {
        output_path: config.output_path.clone(),
        password,
        stats,
    })
}

/// Steps 5–8, run inside the working directory.
#[allow(clippy::too_many_arguments)]
async fn build_in(
    work: &WorkDir,
    config: &BuildConfig,
    runtime: &dyn ContainerRuntime,
    progress: &dyn BuildProgressCallback,
    agg: &Aggregate,
    resolution: &Resolution,
    source_dir: &Path,
    tool_root: &Path,
    cwd: &Path,
) -> Result<(BuildStats, Option<String>), Md2PdfError> {
    // ── Step 5: Materialise assets ───────────────────────────────────────
    let assets = materialize(
        work,
        &agg.combined,
        resolution.bibliography.as_ref(),
        source_dir,
        tool_root,
        cwd,
    )
    .await?;
    if assets.logo.is_none() {
        progress.on_warning(&format!("{LOGO_FILE} not found, building without a logo"));
    }
    if assets.has_bibliography {
        debug!("Using {} ({:?})", BIBLIOGRAPHY_FILE, resolution.source());
    }

    // ── Step 6: Plan ─────────────────────────────────────────────────────
    let plan_len = stage_plan(config.typeset_passes).len();
    let total_stages = plan_len + usize::from(config.protection.is_some());
    progress.on_build_start(total_stages);

    let ctx = StageContext {
        runtime,
        work,
        image: &config.image,
        progress,
        total_stages,
    };

    // ── Step 7: Typeset ──────────────────────────────────────────────────
    let mut stages = run_pipeline(&ctx, &assets, config.typeset_passes).await?;

    // ── Step 8: Finalise ─────────────────────────────────────────────────
    let finalized = finalize(
        &ctx,
        config.protection.as_ref(),
        &config.output_path,
        plan_len + 1,
    )
    .await?;
    stages.extend(finalized.report);

    let stats = BuildStats {
        markdown_files: agg.files.len(),
        combined_bytes: agg.combined.len(),
        collection_id: resolution.collection_id.clone(),
        bibliography: resolution.source(),
        fetch_warning: resolution.fetch_error.as_ref().map(|e| e.to_string()),
        logo: assets.logo,
        image_built: false,
        encrypted: finalized.password.is_some(),
        stages,
        total_duration_ms: 0,
    };
    Ok((stats, finalized.password))
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    source_dir: impl AsRef<Path>,
    config: &BuildConfig,
) -> Result<BuildOutput, Md2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Md2PdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(source_dir, config))
}

/// Summarise a source directory without touching the container runtime.
pub async fn inspect(source_dir: impl AsRef<Path>) -> Result<SourceSummary, Md2PdfError> {
    let source_dir = source_dir.as_ref().to_path_buf();
    let agg = aggregate_blocking(&source_dir).await?;
    Ok(SourceSummary {
        local_bibliography: source_dir.join(BIBLIOGRAPHY_FILE).is_file(),
        source_dir,
        combined_bytes: agg.combined.len(),
        collection_id: agg.collection_id,
        files: agg.files,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Directory walking and file reads are blocking; keep them off the
/// async worker threads.
async fn aggregate_blocking(source_dir: &Path) -> Result<Aggregate, Md2PdfError> {
    let dir = source_dir.to_path_buf();
    tokio::task::spawn_blocking(move || aggregate::aggregate(&dir))
        .await
        .map_err(|e| Md2PdfError::Internal(format!("Aggregate task panicked: {}", e)))?
}

fn current_dir() -> Result<PathBuf, Md2PdfError> {
    std::env::current_dir()
        .map_err(|e| Md2PdfError::Internal(format!("Cannot read current directory: {}", e)))
}

/// Bind mounts need absolute host paths.
fn absolutize(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}
