//! CLI binary for edgequake-md2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `BuildConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_md2pdf::pipeline::bibliography::DEFAULT_ZOTERO_URL;
use edgequake_md2pdf::{
    convert, inspect, BuildConfig, BuildOutput, BuildProgressCallback, ProgressCallback, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner naming the running tool, plus one
/// log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
    warnings: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold} {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("md2pdf");
        bar.set_message("preparing…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            warnings: AtomicUsize::new(0),
        })
    }
}

impl BuildProgressCallback for CliProgressCallback {
    fn on_build_start(&self, total_stages: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Running {total_stages} stages…"))
        ));
    }

    fn on_stage_start(&self, stage: Stage, index: usize, total: usize) {
        self.bar.set_message(format!("[{index}/{total}] {stage}"));
    }

    fn on_stage_complete(&self, stage: Stage, index: usize, total: usize, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} [{:>2}/{:<2}] {:<16} {}",
            green("✓"),
            index,
            total,
            stage.to_string(),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        // First line only; the full message comes with the final error report.
        let first = error.lines().next().unwrap_or(error);
        self.bar
            .println(format!("  {} {:<16} {}", red("✗"), stage.to_string(), red(first)));
    }

    fn on_warning(&self, message: &str) {
        self.warnings.fetch_add(1, Ordering::SeqCst);
        let first = message.lines().next().unwrap_or(message);
        self.bar.println(format!("  {} {}", yellow("⚠"), first));
    }

    fn on_build_complete(&self, success: bool) {
        self.bar.finish_and_clear();
        let warnings = self.warnings.load(Ordering::SeqCst);
        if success && warnings == 0 {
            eprintln!("{} PDF built", green("✔"));
        } else if success {
            eprintln!("{} PDF built with {} warning(s)", cyan("⚠"), warnings);
        } else {
            eprintln!("{} Build failed", red("✘"));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Build out.pdf from every Markdown file under chapters/
  md2pdf chapters/

  # Pull citations from a Zotero collection (Better BibTeX must be running)
  md2pdf chapters/ --zotero ABCD1234

  # Read-only PDF: random user password printed once, owner password given
  md2pdf chapters/ --ro my-owner-secret

  # Check what would be built, without docker
  md2pdf --inspect-only chapters/

SOURCE LAYOUT:
  chapters/
    bibliography.bib      optional, merged with the Zotero export
    01-intro.md           files are concatenated in name order,
    02-method/            a directory's files before its subdirectories
      01-setup.md

  A file may declare its collection in front matter:
    ---
    zotero: ABCD1234
    ---
  (collection-id, collection_id, zotero-collection and zotero_collection
  are accepted too.)

TOOL ROOT (--tool-root / MD2PDF_HOME):
  Dockerfile              used to build the image on first run
  lib/wordcount.lua       required
  lib/template.tex        required
  lib/chicago.csl         optional
  assets/logo.jpg         optional (also looked up in . and the source dir)

NOTE:
  --ro takes an optional value, so put the source directory first:
  `md2pdf chapters/ --ro`, not `md2pdf --ro chapters/`.
"#;

/// Build a typeset PDF from a directory of Markdown files.
#[derive(Parser, Debug)]
#[command(
    name = "md2pdf",
    version,
    about = "Build a typeset, bibliography-aware PDF from a directory of Markdown files",
    long_about = "Concatenates every Markdown file under SOURCE_DIR and typesets it with pandoc, \
xelatex and biber inside a container image. Citations can come from a local bibliography.bib, \
a Zotero collection, or both.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory containing the Markdown sources.
    source_dir: PathBuf,

    /// Encrypt the PDF read-only; optional value is the owner password.
    #[arg(long = "ro", value_name = "OWNER_PASSWORD", num_args = 0..=1, default_missing_value = "")]
    read_only: Option<String>,

    /// Zotero collection to fetch citations from (overrides front matter).
    #[arg(long, value_name = "COLLECTION_ID", env = "MD2PDF_ZOTERO")]
    zotero: Option<String>,

    /// Write the PDF here.
    #[arg(short, long, env = "MD2PDF_OUTPUT", default_value = "out.pdf")]
    output: PathBuf,

    /// Directory with the Dockerfile, lib/ support files and optional logo.
    #[arg(long, env = "MD2PDF_HOME", default_value = ".")]
    tool_root: PathBuf,

    /// Container image to run the tools in.
    #[arg(long, env = "MD2PDF_IMAGE", default_value = "pandoc_pdf_local")]
    image: String,

    /// Container runtime binary (docker, podman, …).
    #[arg(long, env = "MD2PDF_RUNTIME", default_value = "docker")]
    runtime: String,

    /// Export URL template; `{collection}` is replaced by the collection id.
    #[arg(long, env = "MD2PDF_ZOTERO_URL", default_value = DEFAULT_ZOTERO_URL)]
    zotero_url: String,

    /// xelatex passes before and after biber (minimum 2).
    #[arg(long, env = "MD2PDF_PASSES", default_value_t = 2,
          value_parser = clap::value_parser!(u32).range(2..=10))]
    passes: u32,

    /// Create the working directory under this path instead of the system temp dir.
    #[arg(long, env = "MD2PDF_WORK_ROOT")]
    work_root: Option<PathBuf>,

    /// Print the source summary only; no container is started.
    #[arg(long)]
    inspect_only: bool,

    /// Output structured JSON instead of text.
    #[arg(long, env = "MD2PDF_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "MD2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs (includes tool output).
    #[arg(short, long, env = "MD2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the generated password.
    #[arg(short, long, env = "MD2PDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner carries the per-stage feedback; INFO logs would only
    // fight with it for the terminal.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let summary = inspect(&cli.source_dir)
            .await
            .context("Failed to inspect source directory")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
            );
        } else {
            println!("Source:        {}", summary.source_dir.display());
            println!("Files:         {}", summary.files.len());
            for f in &summary.files {
                let rel = f.strip_prefix(&summary.source_dir).unwrap_or(f);
                println!("  {}", rel.display());
            }
            println!("Bytes:         {}", summary.combined_bytes);
            println!(
                "Collection:    {}",
                summary.collection_id.as_deref().unwrap_or("-")
            );
            println!("Bibliography:  {}", summary.local_bibliography);
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BuildProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run build ────────────────────────────────────────────────────────
    let output = convert(&cli.source_dir, &config)
        .await
        .context("Build failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        );
        return Ok(());
    }

    print_summary(&cli, &output);
    Ok(())
}

/// Map CLI args to `BuildConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<BuildConfig> {
    let mut builder = BuildConfig::builder()
        .runtime_binary(cli.runtime.clone())
        .image(cli.image.clone())
        .tool_root(cli.tool_root.clone())
        .output_path(cli.output.clone())
        .zotero_url(cli.zotero_url.clone())
        .typeset_passes(cli.passes);

    if let Some(ref owner) = cli.read_only {
        builder = builder.read_only(owner.clone());
    }
    if let Some(ref id) = cli.zotero {
        builder = builder.collection(id.clone());
    }
    if let Some(ref root) = cli.work_root {
        builder = builder.work_root(root.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Human summary on stderr; the password goes to stdout, once.
fn print_summary(cli: &Cli, output: &BuildOutput) {
    if let Some(ref password) = output.password {
        println!("\nPDF password: {password}");
    }
    if cli.quiet {
        return;
    }

    let stats = &output.stats;
    eprintln!(
        "{}  {} files  {}  {}ms  →  {}",
        green("✔"),
        stats.markdown_files,
        dim(&format!("bibliography: {:?}", stats.bibliography).to_lowercase()),
        stats.total_duration_ms,
        bold(&output.output_path.display().to_string()),
    );
    if let Some(ref w) = stats.fetch_warning {
        // With the spinner on, this was already shown as it happened.
        if cli.no_progress {
            eprintln!("   {} {}", yellow("⚠"), w.lines().next().unwrap_or(w));
        }
    }
}
