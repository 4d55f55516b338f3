//! Progress-callback trait for build stage events.
//!
//! Inject an [`Arc<dyn BuildProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline converts files and moves through the two-pass
//! stages.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a channel, a log, or a terminal progress bar without the
//! library knowing anything about how the host application communicates.
//!
//! # Example
//!
//! ```rust
//! use edgequake_md2pdf::{BuildProgressCallback, BuildStage, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct StageCounter {
//!     done: AtomicUsize,
//! }
//!
//! impl BuildProgressCallback for StageCounter {
//!     fn on_stage_complete(&self, stage: BuildStage, elapsed_ms: u64) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{stage} finished in {elapsed_ms}ms");
//!     }
//! }
//!
//! let counter = Arc::new(StageCounter { done: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn BuildProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::BuildWarning;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// One step of the build. HTML-only builds run [`BuildStage::Convert`] only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildStage {
    /// Single conversion pass of an HTML-only build.
    Convert,
    /// Pass 1: Markdown → HTML without page numbers, writing the manifest.
    Pass1Convert,
    /// Pass 1: draft PDF render.
    Pass1Render,
    /// Locate section titles in the draft PDF.
    Analyze,
    /// Pass 2: Markdown → HTML with page numbers applied.
    Pass2Convert,
    /// Pass 2: final PDF render.
    Pass2Render,
}

impl BuildStage {
    /// The stages of a PDF build, in execution order.
    pub const TWO_PASS: [BuildStage; 5] = [
        BuildStage::Pass1Convert,
        BuildStage::Pass1Render,
        BuildStage::Analyze,
        BuildStage::Pass2Convert,
        BuildStage::Pass2Render,
    ];
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BuildStage::Convert => "convert",
            BuildStage::Pass1Convert => "pass 1 convert",
            BuildStage::Pass1Render => "pass 1 render",
            BuildStage::Analyze => "analyze",
            BuildStage::Pass2Convert => "pass 2 convert",
            BuildStage::Pass2Render => "pass 2 render",
        };
        f.write_str(label)
    }
}

/// Called by the pipeline as it moves through the build.
///
/// Implementations must be `Send + Sync` because the renderer drives the
/// browser from a Tokio task. All methods have default no-op implementations
/// so callers only override what they care about.
pub trait BuildProgressCallback: Send + Sync {
    /// Called once before the first stage.
    ///
    /// # Arguments
    /// * `total_stages`: 1 for HTML-only builds, 5 for PDF builds
    fn on_build_start(&self, total_stages: usize) {
        let _ = total_stages;
    }

    /// Called when a stage begins.
    fn on_stage_start(&self, stage: BuildStage) {
        let _ = stage;
    }

    /// Called after each Markdown file has been converted (or skipped).
    ///
    /// # Arguments
    /// * `file`:  the source file
    /// * `index`: 1-indexed position in discovery order
    /// * `total`: number of discovered files
    fn on_file_converted(&self, file: &Path, index: usize, total: usize) {
        let _ = (file, index, total);
    }

    /// Called when a stage finishes successfully.
    fn on_stage_complete(&self, stage: BuildStage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// Called for every degraded-but-recoverable problem.
    fn on_warning(&self, warning: &BuildWarning) {
        let _ = warning;
    }

    /// Called once after the final artefact has been written.
    fn on_build_complete(&self, output: &Path) {
        let _ = output;
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl BuildProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn BuildProgressCallback>;
