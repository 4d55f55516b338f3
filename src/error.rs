//! Error types for the edgequake-md2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Md2PdfError`] is **fatal**: the build cannot proceed at all (input
//!   directory missing, template not found, browser failed to launch, PDF
//!   could not be opened). Returned as `Err(Md2PdfError)` from the top-level
//!   `convert_to_html` / `build_*` functions and aborts every later stage.
//!
//! * [`BuildWarning`] is **degraded**: one optional input was unusable (an
//!   unreadable Markdown file, a missing image or stylesheet, an unknown UI
//!   component) but the document can still be produced. Warnings are logged
//!   where they happen and collected into [`crate::output::BuildOutput`] so
//!   callers can inspect partial success after the run.
//!
//! Unknown emoji shortcodes and unknown admonition keywords are neither:
//! they pass through as literal text.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-md2pdf library.
///
/// Degraded-but-recoverable conditions use [`BuildWarning`] instead.
#[derive(Debug, Error)]
pub enum Md2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input directory or file was not found at the given path.
    #[error("Input path not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// The input exists but could not be listed or read.
    #[error("Failed to read input '{path}': {source}")]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Template errors ───────────────────────────────────────────────────
    /// No built-in template or template file matches the requested name.
    #[error("Template '{name}' not found.\nRun `md2pdf --list-templates` to see the built-in layouts.")]
    TemplateNotFound { name: String },

    /// The template was found but failed to compile or render.
    #[error("Template '{name}' failed: {detail}")]
    TemplateFailed { name: String, detail: String },

    // ── Manifest errors ───────────────────────────────────────────────────
    /// The sections manifest handed to the analyzer is missing or malformed.
    #[error("Sections manifest '{path}' is invalid: {detail}")]
    ManifestInvalid { path: PathBuf, detail: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// pdfium could not open the rendered PDF.
    #[error("Failed to open PDF '{path}': {detail}")]
    PdfOpenFailed { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Page analysis needs a pdfium shared library. You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Place libpdfium next to the md2pdf binary or in the working directory.\n\
  • Install pdfium system-wide so the dynamic loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Renderer errors ───────────────────────────────────────────────────
    /// The headless browser process could not be started.
    #[error(
        "Failed to launch headless Chromium: {0}\n\
Install Chrome/Chromium or point CHROME=/path/to/chrome at an existing binary."
    )]
    BrowserLaunchFailed(String),

    /// The browser started but loading or printing the page failed.
    #[error("Failed to render '{path}' to PDF: {detail}")]
    RenderFailed { path: PathBuf, detail: String },

    /// Rendering did not complete within the configured deadline.
    #[error("Rendering timed out after {secs}s\nIncrease --timeout for very large documents.")]
    RenderTimeout { secs: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output or intermediate file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal problem encountered while building the document.
///
/// The build continues; the affected input is skipped or left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum BuildWarning {
    /// A Markdown file could not be read and was skipped.
    #[error("Skipped unreadable Markdown file '{path}': {detail}")]
    MarkdownUnreadable { path: PathBuf, detail: String },

    /// The sidebar manifest exists but could not be read; the directory was scanned instead.
    #[error("Could not read sidebar '{path}', scanning directory instead: {detail}")]
    SidebarUnreadable { path: PathBuf, detail: String },

    /// A local image could not be inlined; the original reference was kept.
    #[error("Image not embedded: '{path}': {detail}")]
    ImageNotEmbedded { path: PathBuf, detail: String },

    /// A local stylesheet could not be inlined; the original link was kept.
    #[error("Stylesheet not embedded: '{path}': {detail}")]
    StylesheetNotEmbedded { path: PathBuf, detail: String },

    /// No snippet file was found for an `@ui:` marker.
    #[error("UI component not found: '{name}' (referenced from '{source_file}')")]
    UiComponentNotFound { name: String, source_file: PathBuf },

    /// The metadata config file could not be read; defaults were used.
    #[error("Config file '{path}' could not be read: {detail}")]
    ConfigUnreadable { path: PathBuf, detail: String },

    /// The metadata config file is not valid YAML; defaults were used.
    #[error("Config file '{path}' could not be parsed: {detail}")]
    ConfigInvalid { path: PathBuf, detail: String },

    /// The page map for pass 2 could not be loaded; no page numbers were applied.
    #[error("Page map '{path}' could not be loaded: {detail}")]
    PageMapUnreadable { path: PathBuf, detail: String },

    /// Two input files produced the same section id; the later one was renamed.
    #[error("Duplicate section id '{id}' from '{path}', renamed to '{renamed}'")]
    DuplicateSectionId {
        id: String,
        renamed: String,
        path: PathBuf,
    },
}
