//! Input resolution: turn the user-supplied path into an ordered file list.
//!
//! ## Document order
//!
//! Order matters twice: it is the reading order of the final document, and
//! it drives the merge rule (a level-2 led file folds into the section
//! before it). A `_sidebar.md` manifest in the input directory is therefore
//! authoritative when present. Without one the directory is scanned
//! recursively and sorted by file name, so numeric prefixes such as
//! `01_intro.md`, `02_setup.md` give a deterministic order.
//!
//! Files starting with `_` are infrastructure (sidebar, navbar, cover
//! fragments) and never become content. A `README.md` is the web landing
//! page and is dropped whenever there is anything else to publish.

use crate::error::{BuildWarning, Md2PdfError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Name of the ordered manifest looked up in the input directory.
pub const SIDEBAR_FILE: &str = "_sidebar.md";

static RE_SIDEBAR_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\((/?)([^)]+\.md)\)").unwrap());

/// Resolve `input` (a directory or a single Markdown file) to the files to convert.
///
/// # Errors
/// - [`Md2PdfError::InputNotFound`] when the path does not exist
/// - [`Md2PdfError::InputUnreadable`] when the directory cannot be listed
pub fn discover_files(
    input: &Path,
    warnings: &mut Vec<BuildWarning>,
) -> Result<Vec<PathBuf>, Md2PdfError> {
    let meta = match std::fs::metadata(input) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Md2PdfError::InputNotFound {
                path: input.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(Md2PdfError::InputUnreadable {
                path: input.to_path_buf(),
                source: e,
            });
        }
    };

    if !meta.is_dir() {
        debug!("Single-file input: {}", input.display());
        return Ok(vec![input.to_path_buf()]);
    }

    // Fail early on an unlistable directory rather than producing an empty document.
    std::fs::read_dir(input).map_err(|e| Md2PdfError::InputUnreadable {
        path: input.to_path_buf(),
        source: e,
    })?;

    let sidebar = input.join(SIDEBAR_FILE);
    let files = if sidebar.is_file() {
        match std::fs::read_to_string(&sidebar) {
            Ok(text) => {
                let files = parse_sidebar(&text, input);
                info!("Using {} ({} linked files)", SIDEBAR_FILE, files.len());
                files
            }
            Err(e) => {
                let w = BuildWarning::SidebarUnreadable {
                    path: sidebar.clone(),
                    detail: e.to_string(),
                };
                warn!("{w}");
                warnings.push(w);
                scan_markdown_files(input)?
            }
        }
    } else {
        scan_markdown_files(input)?
    };

    let files = skip_landing_page(files);
    info!("Found {} markdown files", files.len());
    Ok(files)
}

/// Extract linked Markdown files from a sidebar, in link order.
///
/// Links may be root-relative (`/guide/setup.md`); both forms resolve
/// against `base_dir`. Links to files that don't exist are dropped.
pub fn parse_sidebar(text: &str, base_dir: &Path) -> Vec<PathBuf> {
    RE_SIDEBAR_LINK
        .captures_iter(text)
        .filter_map(|caps| {
            let full = base_dir.join(&caps[3]);
            if full.is_file() {
                Some(full)
            } else {
                debug!("Sidebar link to missing file ignored: {}", full.display());
                None
            }
        })
        .collect()
}

/// Recursively collect `*.md` files, excluding names that start with `_`.
pub fn scan_markdown_files(dir: &Path) -> Result<Vec<PathBuf>, Md2PdfError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) if e.depth() == 0 => {
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
                return Err(Md2PdfError::InputUnreadable {
                    path: dir.to_path_buf(),
                    source,
                });
            }
            Err(e) => {
                warn!("Skipping unreadable directory entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.ends_with(".md") && !name.starts_with('_') {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Drop `README.md` (any case) when it is not the only file.
pub fn skip_landing_page(files: Vec<PathBuf>) -> Vec<PathBuf> {
    if files.len() <= 1 {
        return files;
    }
    files
        .into_iter()
        .filter(|f| {
            let is_readme = f
                .file_name()
                .is_some_and(|n| n.to_string_lossy().eq_ignore_ascii_case("readme.md"));
            if is_readme {
                info!("Skipping {} (web landing page)", f.display());
            }
            !is_readme
        })
        .collect()
}
