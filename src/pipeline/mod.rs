//! Pipeline stages for Markdown-to-PDF conversion.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and keeps the
//! two external engines (Chromium for layout, pdfium for text extraction)
//! behind one module each.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ preprocess ──▶ markdown ──▶ postprocess ──▶ outline ──▶ template
//! (files)    (md rules)    (cmark)      (html rules)    (sections)   (hbs)
//!                                                                      │
//!            analyze ◀──────────────── render ◀──────────────────────┘
//!            (pdfium)                 (chromium)
//! ```
//!
//! 1. [`input`]       resolve the input path and order the Markdown files
//! 2. [`preprocess`]  admonitions, highlights and emoji → canonical Markdown
//! 3. [`markdown`]    CommonMark → HTML with automatic heading ids
//! 4. [`postprocess`] diagrams, alert boxes, asset embedding, link rewriting
//! 5. [`outline`]     titles, section ids, sub-headings and the merge rule
//! 6. [`template`]    sections + metadata → complete HTML document
//! 7. [`render`]      HTML → PDF through headless Chromium
//! 8. [`analyze`]     find each title's page in the rendered PDF; runs in
//!    `spawn_blocking` because pdfium is not async-safe

pub mod analyze;
pub mod input;
pub mod markdown;
pub mod outline;
pub mod postprocess;
pub mod preprocess;
pub mod render;
pub mod template;
