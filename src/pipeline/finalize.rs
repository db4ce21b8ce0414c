//! Output finalisation: optional encryption, then promotion of the PDF.
//!
//! Read-only mode encrypts with AES-256 via qpdf and disables printing,
//! modification, extraction and annotation. The user password is generated
//! here and handed back to the caller; the owner password comes from the
//! caller and may be empty.

use crate::error::Md2PdfError;
use crate::pipeline::runtime::{Mount, ToolRun};
use crate::pipeline::typeset::{Stage, StageContext, StageReport, CONTAINER_WORKDIR};
use crate::pipeline::workdir::{OUT_PDF, PROTECTED_PDF};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::path::Path;
use tracing::info;

/// Length of generated passwords.
pub const PASSWORD_LENGTH: usize = 20;

/// Read-only (encrypted) output settings.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Protection {
    /// qpdf owner password; empty is allowed.
    pub owner_password: String,
}

impl std::fmt::Debug for Protection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Protection")
            .field("owner_password", &"<redacted>")
            .finish()
    }
}

/// Random password of [`PASSWORD_LENGTH`] ASCII letters and digits.
pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

/// qpdf invocation encrypting `out.pdf` into `protected.pdf`.
pub fn protect_invocation(ctx: &StageContext<'_>, owner: &str, user: &str) -> ToolRun {
    let mut run = ToolRun::new(ctx.image, Stage::Protect.tool())
        .mount(Mount::read_write(ctx.work.path(), CONTAINER_WORKDIR))
        .workdir(CONTAINER_WORKDIR)
        .args(["--encrypt", owner, user, "256"])
        .args([
            "--print=none",
            "--modify=none",
            "--extract=n",
            "--annotate=n",
        ]);
    // qpdf refuses an empty owner password with AES-256 unless told otherwise.
    if owner.is_empty() {
        run = run.arg("--allow-insecure");
    }
    run.arg("--")
        .arg(format!("{CONTAINER_WORKDIR}/{OUT_PDF}"))
        .arg(format!("{CONTAINER_WORKDIR}/{PROTECTED_PDF}"))
}

/// Result of [`finalize`].
#[derive(Debug, Clone)]
pub struct Finalized {
    /// Generated user password in read-only mode.
    pub password: Option<String>,
    /// Report for the protect stage, when it ran.
    pub report: Option<StageReport>,
}

/// Encrypt if requested, then copy the final PDF to `output_path`.
///
/// `index` is the stage number the protect stage reports under.
pub async fn finalize(
    ctx: &StageContext<'_>,
    protection: Option<&Protection>,
    output_path: &Path,
    index: usize,
) -> Result<Finalized, Md2PdfError> {
    let (artifact, password, report) = match protection {
        Some(p) => {
            let password = generate_password();
            let run = protect_invocation(ctx, &p.owner_password, &password);
            let report = ctx
                .run_stage(index, Stage::Protect, run, Some(PROTECTED_PDF))
                .await?;
            (PROTECTED_PDF, Some(password), Some(report))
        }
        None => (OUT_PDF, None, None),
    };

    promote(&ctx.work.join(artifact), output_path).await?;
    info!("Wrote {}", output_path.display());

    Ok(Finalized { password, report })
}

/// Copy `artifact` to `output_path`, creating parent directories.
async fn promote(artifact: &Path, output_path: &Path) -> Result<(), Md2PdfError> {
    let write_err = |e| Md2PdfError::OutputWriteFailed {
        path: output_path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    tokio::fs::copy(artifact, output_path)
        .await
        .map_err(write_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_policy() {
        for _ in 0..50 {
            let p = generate_password();
            assert_eq!(p.len(), PASSWORD_LENGTH);
            assert!(p.chars().all(|c| c.is_ascii_alphanumeric()), "got {p}");
        }
    }

    #[test]
    fn passwords_differ() {
        assert_ne!(generate_password(), generate_password());
    }

    #[test]
    fn protection_debug_redacts() {
        let p = Protection {
            owner_password: "s3cret".into(),
        };
        assert!(!format!("{p:?}").contains("s3cret"));
    }

    #[tokio::test]
    async fn promote_creates_parent() {
        let tmp = tempfile::TempDir::new().unwrap();
        let src = tmp.path().join("a.pdf");
        std::fs::write(&src, b"%PDF-1.7").unwrap();
        let dest = tmp.path().join("nested/dir/out.pdf");
        promote(&src, &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-1.7");
    }

    #[tokio::test]
    async fn promote_missing_artifact_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = promote(&tmp.path().join("missing.pdf"), &tmp.path().join("out.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, Md2PdfError::OutputWriteFailed { .. }));
    }
}
