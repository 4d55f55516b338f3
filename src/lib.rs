//! # edgequake-md2pdf
//!
//! Convert a directory of Markdown into one styled HTML document and a
//! paginated PDF whose table of contents carries real page numbers.
//!
//! ## Why this crate?
//!
//! Single-pass HTML→PDF tools cannot print correct TOC page numbers: page
//! breaks only exist once the browser has laid the document out. This crate
//! renders the document once, reads the draft PDF back to find the page each
//! section landed on, and renders again with those numbers filled in.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Markdown directory
//!  │
//!  ├─ 1. Assemble  discover files, normalise, convert, merge into sections
//!  ├─ 2. Template  sections + metadata → HTML (TOC without page numbers)
//!  ├─ 3. Render    headless Chromium print-to-PDF (draft)
//!  ├─ 4. Analyze   pdfium text extraction → id → page map
//!  ├─ 5. Assemble  again, with the page map applied
//!  └─ 6. Render    final PDF
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_md2pdf::{build_pdf, AnalyzerConfig, ConversionConfig, RenderOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .title("Operations Manual")
//!         .config_file("docs/AUTHORS.yml")
//!         .build()?;
//!     let out = build_pdf(
//!         "docs",
//!         "manual.pdf",
//!         &config,
//!         &RenderOptions::default(),
//!         &AnalyzerConfig::default(),
//!         false,
//!     )
//!     .await?;
//!     eprintln!(
//!         "{} sections, {} of {} TOC entries located",
//!         out.stats.sections,
//!         out.stats.located,
//!         out.stats.located + out.stats.unlocated
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-md2pdf = { version = "0.1", default-features = false }
//! ```
//!
//! ## Runtime requirements
//!
//! PDF builds need a Chromium/Chrome binary (found on `PATH` or given via
//! [`RenderOptions::chrome_executable`]) and a pdfium shared library
//! (`PDFIUM_LIB_PATH`, the working directory, or the system library path).
//! HTML-only builds need neither.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod project;
pub mod two_pass;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{AnalyzerConfig, ConversionConfig, ConversionConfigBuilder, RenderOptions, TocHeuristics};
pub use convert::{convert, convert_sync, convert_to_html};
pub use error::{BuildWarning, Md2PdfError};
pub use output::{
    AnalysisResult, BuildOutput, BuildStats, ConversionOutput, PageMap, Section, SectionInput, SectionPage, SubHeading,
};
pub use pipeline::analyze::analyze_pdf;
pub use pipeline::render::render_to_pdf;
pub use pipeline::template::list_templates;
pub use progress::{BuildProgressCallback, BuildStage, NoopProgressCallback, ProgressCallback};
pub use project::{DocumentMeta, ProjectConfig};
pub use two_pass::{build_html, build_pdf};
