//! Environment probing: make sure the runtime answers and the image exists.
//!
//! The image is built at most once per run and never rebuilt when present;
//! delete it manually (`docker rmi pandoc_pdf_local`) after editing the
//! Dockerfile.

use crate::error::Md2PdfError;
use crate::pipeline::runtime::ContainerRuntime;
use std::path::Path;
use tracing::{debug, info};

/// What [`ensure_ready`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    /// The image was already present.
    Present,
    /// The image was missing and has just been built.
    Built,
}

/// Verify the container runtime and ensure `image` exists, building it from
/// `build_context` when it does not.
pub async fn ensure_ready(
    runtime: &dyn ContainerRuntime,
    image: &str,
    build_context: &Path,
) -> Result<ImageStatus, Md2PdfError> {
    runtime.probe().await?;
    debug!("Container runtime '{}' is available", runtime.name());

    if runtime.image_exists(image).await? {
        debug!("Image '{}' present", image);
        return Ok(ImageStatus::Present);
    }

    info!("Image '{}' not found, building (this can take a while)", image);
    runtime.build_image(image, build_context).await?;
    info!("Image '{}' built successfully", image);
    Ok(ImageStatus::Built)
}
