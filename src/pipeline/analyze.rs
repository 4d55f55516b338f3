//! PDF page location: find the physical page each section title landed on.
//!
//! Chromium does not report where an element ended up after pagination, so
//! the only evidence available is the text of the finished PDF. This module
//! extracts the plain text of every page with pdfium and searches it for the
//! section and sub-heading titles of the sections manifest.
//!
//! ## Why skip pages?
//!
//! Every title also appears on the cover or in the table of contents, and
//! usually before the page the section really starts on. Searching begins
//! after the front matter, and found pages are numbered relative to the
//! first body page (which becomes page 1), matching the page counter the
//! templates reset at the start of `<main>`.
//!
//! ## TOC detection
//!
//! With `skip_pages = 0` the front matter is measured: the first page from
//! page 2 onward that mentions the first title *and* reads like body text
//! (see [`is_body_page`]) marks the end of the TOC. A TOC line carries the
//! title too, so the decision rests on density, not on absence. The
//! thresholds live in [`TocHeuristics`].
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a synchronous C++ library with thread-local state; extraction
//! runs on the blocking pool so it never stalls the Tokio workers.

use crate::config::{AnalyzerConfig, TocHeuristics};
use crate::error::Md2PdfError;
use crate::output::{flatten_sections, AnalysisResult, SectionInput, SectionPage};
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// ── pdfium ───────────────────────────────────────────────────────────────

/// Bind to pdfium: `PDFIUM_LIB_PATH` (file or directory), then the working
/// directory, then the system library.
pub fn bind_pdfium() -> Result<Pdfium, Md2PdfError> {
    if let Ok(p) = std::env::var("PDFIUM_LIB_PATH") {
        let path = PathBuf::from(p);
        let lib = if path.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&path)
        } else {
            path
        };
        return Pdfium::bind_to_library(&lib)
            .map(Pdfium::new)
            .map_err(|e| Md2PdfError::PdfiumBindingFailed(format!("{}: {e:?}", lib.display())));
    }

    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|e| Md2PdfError::PdfiumBindingFailed(format!("{e:?}")))
}

/// Plain text of every page; `None` for a page whose text layer failed.
pub async fn extract_page_texts(pdf_path: &Path) -> Result<Vec<Option<String>>, Md2PdfError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || extract_page_texts_blocking(&path))
        .await
        .map_err(|e| Md2PdfError::Internal(format!("Text extraction task panicked: {}", e)))?
}

fn extract_page_texts_blocking(pdf_path: &Path) -> Result<Vec<Option<String>>, Md2PdfError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| Md2PdfError::PdfOpenFailed {
            path: pdf_path.to_path_buf(),
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    let total = pages.len();
    info!("PDF has {} pages", total);

    let mut texts = Vec::with_capacity(total as usize);
    for index in 0..total {
        let text = pages.get(index).and_then(|page| {
            let all = page.text()?.all();
            Ok(all)
        });
        match text {
            Ok(t) => texts.push(Some(t)),
            Err(e) => {
                warn!("No text layer on page {}: {:?}", index + 1, e);
                texts.push(None);
            }
        }
    }
    Ok(texts)
}

// ── Manifest ─────────────────────────────────────────────────────────────

/// Read a sections manifest written by the assembler.
pub fn load_manifest(path: &Path) -> Result<Vec<SectionInput>, Md2PdfError> {
    let invalid = |detail: String| Md2PdfError::ManifestInvalid {
        path: path.to_path_buf(),
        detail,
    };
    let raw = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    serde_json::from_str(&raw).map_err(|e| invalid(e.to_string()))
}

/// Write an analysis result as pretty-printed JSON.
pub fn save_result(result: &AnalysisResult, path: &Path) -> Result<(), Md2PdfError> {
    let json = serde_json::to_string_pretty(result)
        .map_err(|e| Md2PdfError::Internal(format!("Serialising analysis result: {e}")))?;
    std::fs::write(path, json).map_err(|source| Md2PdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Analysis saved to {}", path.display());
    Ok(())
}

// ── Text heuristics ──────────────────────────────────────────────────────

static RE_DOT_LEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{2,}|·{2,}|…+").unwrap());
static RE_TITLE_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\s\[\]()\-_]").unwrap());
static RE_NUMBER_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\s*").unwrap());

/// Runs of `..`, `··` or `…` on a page.
pub fn count_dot_leaders(text: &str) -> usize {
    RE_DOT_LEADER.find_iter(text).count()
}

/// Byte length of the text with all Unicode whitespace removed.
pub fn stripped_len(text: &str) -> usize {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .map(char::len_utf8)
        .sum()
}

/// Does `text` mention `title`, ignoring emoji and punctuation?
///
/// Both sides keep only letters, digits, whitespace, brackets, parentheses,
/// `-` and `_`. A title with a leading ordinal (`2. Getting Started`) also
/// matches its unnumbered form. A title with nothing left after cleaning
/// never matches.
pub fn contains_title(text: &str, title: &str) -> bool {
    let clean_text = clean(text);
    let clean_title = clean(title);
    if clean_title.trim().is_empty() {
        return false;
    }
    if clean_text.contains(&clean_title) {
        return true;
    }

    // The ordinal is stripped before cleaning, which would drop its `.`.
    let title = title.trim();
    let unnumbered = RE_NUMBER_PREFIX.replace(title, "");
    if unnumbered == title {
        return false;
    }
    let clean_unnumbered = clean(&unnumbered);
    !clean_unnumbered.trim().is_empty() && clean_text.contains(&clean_unnumbered)
}

fn clean(s: &str) -> String {
    RE_TITLE_NOISE.replace_all(s.trim(), "").into_owned()
}

/// Classify a page as body text (`true`) or table of contents (`false`).
pub fn is_body_page(text: &str, entries: &[SectionPage], h: &TocHeuristics) -> bool {
    let dots = count_dot_leaders(text);
    let titles = entries
        .iter()
        .filter(|e| contains_title(text, &e.title))
        .count();
    let len = stripped_len(text);

    if titles > h.max_titles_per_body_page || len < h.min_body_chars {
        return false;
    }
    if titles > 0 {
        return len / titles >= h.min_chars_per_title && dots <= h.max_dot_leaders;
    }
    // Untitled pages: long leader-free prose is narrative body text, and
    // anything else that passed the length gate is given the benefit of the doubt.
    if len > h.narrative_page_chars && dots == 0 {
        debug!("Narrative page ({} chars, no titles)", len);
    }
    true
}

/// Last front-matter page (cover + TOC), or `None` if no body page was found.
///
/// Scans from physical page 2 for pages containing the first entry's title
/// and returns the page before the first one that classifies as body.
pub fn detect_toc_end_page(
    pages: &[Option<String>],
    entries: &[SectionPage],
    h: &TocHeuristics,
) -> Option<usize> {
    let first = entries.first()?;

    for (index, text) in pages.iter().enumerate().skip(1) {
        let Some(text) = text else { continue };
        let page_num = index + 1;
        if !contains_title(text, &first.title) {
            continue;
        }
        if is_body_page(text, entries, h) {
            info!(
                "Content starts at page {} (first section: '{}'), skipping {} pages",
                page_num,
                first.title,
                page_num - 1
            );
            return Some(page_num - 1);
        }
        debug!("Page {} mentions '{}' but reads like a TOC", page_num, first.title);
    }

    warn!("Could not detect the end of the table of contents");
    None
}

/// Assign logical page numbers to `entries` from per-page text.
///
/// Each title is matched at most once: the first page it appears on after
/// the skipped front matter wins.
pub fn locate_sections(
    pages: &[Option<String>],
    mut entries: Vec<SectionPage>,
    config: &AnalyzerConfig,
) -> AnalysisResult {
    let skip = if config.skip_pages > 0 {
        info!("Using manual skip pages: {}", config.skip_pages);
        config.skip_pages
    } else {
        detect_toc_end_page(pages, &entries, &config.heuristics).unwrap_or_else(|| {
            info!(
                "Using default skip pages: {}",
                config.heuristics.fallback_skip_pages
            );
            config.heuristics.fallback_skip_pages
        })
    };
    let offset = config.page_offset.unwrap_or(skip);
    debug!("Searching from page {} (offset {})", skip + 1, offset);

    for (index, text) in pages.iter().enumerate().skip(skip) {
        let Some(text) = text else { continue };
        let physical = index + 1;
        for entry in entries.iter_mut().filter(|e| !e.is_located()) {
            if contains_title(text, &entry.title) {
                // A physical page at or before the offset has no logical number.
                entry.page = physical.saturating_sub(offset);
                if entry.is_located() {
                    debug!(
                        "Found '{}' on page {} (physical {})",
                        entry.title, entry.page, physical
                    );
                }
            }
        }
    }

    let result = AnalysisResult {
        total_pages: pages.len(),
        sections: entries,
    };
    info!(
        "Located {}/{} entries",
        result.located_count(),
        result.sections.len()
    );
    for missing in result.unlocated() {
        debug!("Not located: '{}' ({})", missing.title, missing.id);
    }
    result
}

/// Analyze a rendered PDF against a sections manifest.
pub async fn analyze_pdf(
    pdf_path: &Path,
    sections_json: &Path,
    config: &AnalyzerConfig,
) -> Result<AnalysisResult, Md2PdfError> {
    if !pdf_path.exists() {
        return Err(Md2PdfError::InputNotFound {
            path: pdf_path.to_path_buf(),
        });
    }
    let manifest = load_manifest(sections_json)?;
    let entries = flatten_sections(&manifest);
    info!("Loaded {} entries (including sub-headings)", entries.len());

    let pages = extract_page_texts(pdf_path).await?;
    Ok(locate_sections(&pages, entries, config))
}
