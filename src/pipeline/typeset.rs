//! The typesetting pipeline: pandoc → xelatex ×N → biber → xelatex ×N.
//!
//! ## Why typeset twice, twice?
//!
//! xelatex resolves forward references (table of contents, `\ref`, page
//! numbers) from the `.aux` file written by the *previous* run, so a single
//! pass leaves them as `??`. The first pair of passes settles the layout and
//! writes the citation control file for biber; the second pair pulls in the
//! `.bbl` produced by biber and re-resolves references that moved as a
//! result. The count is fixed, not a convergence check, and never below two.
//!
//! Every stage talks to the next through files in the working directory, so
//! a failed run leaves the intermediate artifacts in place until cleanup.

use crate::error::Md2PdfError;
use crate::pipeline::bibliography::BIBLIOGRAPHY_FILE;
use crate::pipeline::materialize::{
    MaterializedAssets, CITATION_STYLE, TEMPLATE, WORDCOUNT_FILTER,
};
use crate::pipeline::runtime::{ContainerRuntime, Mount, ToolRun};
use crate::pipeline::workdir::{WorkDir, INPUT_MD, OUT_BBL, OUT_PDF, OUT_TEX};
use crate::progress::BuildProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info};

/// Mount point of the working directory inside the container.
pub const CONTAINER_WORKDIR: &str = "/workdir";
/// Mount point of the support files inside the container.
pub const CONTAINER_SUPPORT: &str = "/pandoc_files";
/// Base name shared by every LaTeX artifact.
pub const JOB_NAME: &str = "out";
/// Minimum (and default) xelatex passes on each side of biber.
pub const MIN_TYPESET_PASSES: u32 = 2;

/// Lines of tool output quoted in stage errors.
const ERROR_TAIL_LINES: usize = 15;

/// One external-tool invocation in the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    /// Markdown → LaTeX via pandoc.
    Convert,
    /// xelatex run; `pass` counts from 1 across both phases.
    Typeset { pass: u32 },
    /// Citation processing via biber.
    Bibliography,
    /// PDF encryption via qpdf.
    Protect,
}

impl Stage {
    /// Tool executed for this stage.
    pub fn tool(&self) -> &'static str {
        match self {
            Stage::Convert => "pandoc",
            Stage::Typeset { .. } => "xelatex",
            Stage::Bibliography => "biber",
            Stage::Protect => "qpdf",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Typeset { pass } => write!(f, "xelatex pass {pass}"),
            other => f.write_str(other.tool()),
        }
    }
}

/// Timing of a completed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    #[serde(flatten)]
    pub stage: Stage,
    pub duration_ms: u64,
}

/// Stages in execution order for `passes` xelatex runs per phase.
pub fn stage_plan(passes: u32) -> Vec<Stage> {
    let passes = passes.max(MIN_TYPESET_PASSES);
    let mut plan = vec![Stage::Convert];
    plan.extend((1..=passes).map(|pass| Stage::Typeset { pass }));
    plan.push(Stage::Bibliography);
    plan.extend((passes + 1..=2 * passes).map(|pass| Stage::Typeset { pass }));
    plan
}

/// Everything a stage needs to build its container invocation.
pub struct StageContext<'a> {
    pub runtime: &'a dyn ContainerRuntime,
    pub work: &'a WorkDir,
    pub image: &'a str,
    pub progress: &'a dyn BuildProgressCallback,
    /// Total stages in this build, for progress reporting.
    pub total_stages: usize,
}

impl StageContext<'_> {
    fn workdir_mount(&self) -> Mount {
        Mount::read_write(self.work.path(), CONTAINER_WORKDIR)
    }

    /// Run `invocation`, turning a non-zero exit into [`Md2PdfError::StageFailed`]
    /// and a missing `expect`ed artifact into [`Md2PdfError::ArtifactMissing`].
    pub async fn run_stage(
        &self,
        index: usize,
        stage: Stage,
        invocation: ToolRun,
        expect: Option<&str>,
    ) -> Result<StageReport, Md2PdfError> {
        self.progress.on_stage_start(stage, index, self.total_stages);
        info!("[{}/{}] {}", index, self.total_stages, stage);
        let start = Instant::now();

        let result = self.execute(stage, &invocation, expect).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                debug!("{} finished in {}ms", stage, duration_ms);
                self.progress
                    .on_stage_complete(stage, index, self.total_stages, duration_ms);
                Ok(StageReport { stage, duration_ms })
            }
            Err(e) => {
                self.progress.on_stage_error(stage, &e.to_string());
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        stage: Stage,
        invocation: &ToolRun,
        expect: Option<&str>,
    ) -> Result<(), Md2PdfError> {
        let exit = self.runtime.run_tool(invocation).await?;
        if !exit.success() {
            return Err(Md2PdfError::StageFailed {
                stage,
                status: exit.status_text(),
                detail: exit.tail(ERROR_TAIL_LINES),
            });
        }
        if let Some(artifact) = expect {
            if !self.work.contains(artifact) {
                return Err(Md2PdfError::ArtifactMissing {
                    stage,
                    artifact: artifact.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// pandoc invocation turning `input.md` into `out.tex`.
pub fn convert_invocation(ctx: &StageContext<'_>, assets: &MaterializedAssets) -> ToolRun {
    let support = |name: &str| format!("{CONTAINER_SUPPORT}/{name}");
    let mut run = ToolRun::new(ctx.image, Stage::Convert.tool())
        .mount(ctx.workdir_mount())
        .mount(Mount::read_only(&assets.support.dir, CONTAINER_SUPPORT))
        .workdir(CONTAINER_WORKDIR)
        .args([
            "--output".to_string(),
            format!("{CONTAINER_WORKDIR}/{OUT_TEX}"),
            format!("--lua-filter={}", support(WORDCOUNT_FILTER)),
            "-f".to_string(),
            "markdown".to_string(),
        ]);

    if assets.support.has_citation_style {
        run = run.arg(format!("--csl={}", support(CITATION_STYLE)));
    }

    run = run.args([
        format!("--template={}", support(TEMPLATE)),
        "--standalone".to_string(),
        "--biblatex".to_string(),
    ]);

    if assets.has_bibliography {
        run = run.arg(format!("--bibliography={CONTAINER_WORKDIR}/{BIBLIOGRAPHY_FILE}"));
    }

    run.arg(format!("{CONTAINER_WORKDIR}/{INPUT_MD}"))
}

/// xelatex invocation on `out.tex`.
pub fn typeset_invocation(ctx: &StageContext<'_>) -> ToolRun {
    ToolRun::new(ctx.image, "xelatex")
        .mount(ctx.workdir_mount())
        .workdir(CONTAINER_WORKDIR)
        .args(["-interaction=nonstopmode", JOB_NAME])
}

/// biber invocation on `out.bcf`.
pub fn bibliography_invocation(ctx: &StageContext<'_>) -> ToolRun {
    ToolRun::new(ctx.image, Stage::Bibliography.tool())
        .mount(ctx.workdir_mount())
        .workdir(CONTAINER_WORKDIR)
        .arg(JOB_NAME)
}

/// Run every typesetting stage in order, stopping at the first failure.
///
/// On success `out.pdf` exists in the working directory.
pub async fn run_pipeline(
    ctx: &StageContext<'_>,
    assets: &MaterializedAssets,
    passes: u32,
) -> Result<Vec<StageReport>, Md2PdfError> {
    let plan = stage_plan(passes);
    let mut reports = Vec::with_capacity(plan.len());
    let mut biber_done = false;

    for (i, stage) in plan.into_iter().enumerate() {
        let index = i + 1;
        let (invocation, expect) = match stage {
            Stage::Convert => (convert_invocation(ctx, assets), Some(OUT_TEX)),
            Stage::Typeset { .. } if biber_done => (typeset_invocation(ctx), Some(OUT_PDF)),
            Stage::Typeset { .. } => (typeset_invocation(ctx), None),
            Stage::Bibliography => {
                biber_done = true;
                (bibliography_invocation(ctx), Some(OUT_BBL))
            }
            Stage::Protect => {
                return Err(Md2PdfError::Internal(
                    "protect is not a typesetting stage".into(),
                ))
            }
        };
        reports.push(ctx.run_stage(index, stage, invocation, expect).await?);
    }

    Ok(reports)
}
