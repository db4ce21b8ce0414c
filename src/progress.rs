//! Progress-callback trait for per-stage build events.
//!
//! Inject an [`Arc<dyn BuildProgressCallback>`] via
//! [`crate::config::BuildConfigBuilder::progress_callback`] to receive events
//! as the pipeline runs each external tool.
//!
//! # Example
//!
//! ```rust
//! use edgequake_md2pdf::{BuildConfig, BuildProgressCallback, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl BuildProgressCallback for CountingCallback {
//!     fn on_stage_complete(&self, stage: Stage, index: usize, total: usize, elapsed_ms: u64) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("[{index}/{total}] {stage} done in {elapsed_ms}ms");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = BuildConfig::builder()
//!     .progress_callback(counter as Arc<dyn BuildProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::typeset::Stage;
use std::sync::Arc;

/// Called by the build as it moves through its stages.
///
/// Stages run strictly one after another, so calls never overlap; the
/// `Send + Sync` bound only lets the callback live inside a shared config.
/// All methods default to no-ops.
pub trait BuildProgressCallback: Send + Sync {
    /// Called once, after the environment is ready and before the first stage.
    ///
    /// # Arguments
    /// * `total_stages`: number of external-tool stages that will run
    fn on_build_start(&self, total_stages: usize) {
        let _ = total_stages;
    }

    /// Called just before a stage's container starts.
    ///
    /// # Arguments
    /// * `stage`: the stage about to run
    /// * `index`: 1-based position in the build
    /// * `total`: total stages
    fn on_stage_start(&self, stage: Stage, index: usize, total: usize) {
        let _ = (stage, index, total);
    }

    /// Called when a stage exits successfully with its expected output.
    fn on_stage_complete(&self, stage: Stage, index: usize, total: usize, elapsed_ms: u64) {
        let _ = (stage, index, total, elapsed_ms);
    }

    /// Called when a stage fails; the build stops right after.
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }

    /// Called for recoverable problems (bibliography fetch failed, no logo).
    fn on_warning(&self, message: &str) {
        let _ = message;
    }

    /// Called once when the build ends, successfully or not.
    fn on_build_complete(&self, success: bool) {
        let _ = success;
    }
}

/// A no-op implementation, the default when no callback is configured.
pub struct NoopProgressCallback;

impl BuildProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BuildConfig`].
pub type ProgressCallback = Arc<dyn BuildProgressCallback>;
