//! Post-conversion rewrites: deterministic fix-ups of the rendered HTML.
//!
//! ## Why regex over a DOM?
//!
//! The parser emits a small, predictable set of shapes (`<pre><code
//! class="language-…">`, `<blockquote>\n<p>…`, `<h2 id="…">`), and every rule
//! here targets exactly one of them. Rewriting the serialised string keeps
//! each rule a pure `&str → String` function that can be tested in
//! isolation, and leaves untouched markup byte-for-byte identical.
//!
//! ## Failure policy
//!
//! Rules that touch the filesystem (images, stylesheets, UI snippets) never
//! fail the build: an unreadable asset leaves the original reference in
//! place and records a [`BuildWarning`].
//!
//! ## Rule Order
//!
//! 1. Diagram fences → `<div class="mermaid">`
//! 2. `> [!TYPE]` blockquotes → styled alert boxes
//! 3. `<p><strong>Title</strong>: body</p>` → title/body pair
//! 4. Inline local images as data URIs (optional)
//! 5. Inline local stylesheets as `<style>` (optional)
//! 6. Expand `<!-- @ui:name -->` component markers
//! 7. Collapse `../../assets/` to `assets/`
//! 8. Rewrite links between Markdown files to in-document anchors (PDF mode)

use crate::error::BuildWarning;
use crate::pipeline::outline::generate_id;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Upward search depth for `assets/ui/{name}.html`, starting at the Markdown file's directory.
pub const UI_COMPONENT_SEARCH_DEPTH: usize = 5;

/// Switches for the optional rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostprocessOptions {
    /// Run rules 4 and 5.
    pub embed_assets: bool,
    /// Run rule 8.
    pub pdf_mode: bool,
}

/// Apply every post-conversion rule to one file's HTML.
///
/// `source` is the Markdown file the HTML came from; relative asset paths
/// resolve against its directory.
pub fn postprocess_html(
    html: &str,
    source: &Path,
    opts: PostprocessOptions,
    warnings: &mut Vec<BuildWarning>,
) -> String {
    let s = convert_diagram_blocks(html);
    let s = rewrite_alerts(&s);
    let s = split_title_body(&s);
    let s = if opts.embed_assets {
        let s = embed_images(&s, source, warnings);
        embed_stylesheets(&s, source, warnings)
    } else {
        s
    };
    let s = expand_ui_components(&s, source, warnings);
    let s = rewrite_asset_paths(&s);
    if opts.pdf_mode {
        rewrite_internal_links(&s)
    } else {
        s
    }
}

fn source_dir(source: &Path) -> &Path {
    source.parent().unwrap_or_else(|| Path::new("."))
}

// ── Rule 1: Diagram blocks ──────────────────────────────────────────────────

static RE_MERMAID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<pre><code class="language-mermaid">(.*?)</code></pre>"#).unwrap()
});

pub fn convert_diagram_blocks(html: &str) -> String {
    RE_MERMAID
        .replace_all(html, r#"<div class="mermaid">${1}</div>"#)
        .into_owned()
}

// ── Rule 2: Alert boxes ─────────────────────────────────────────────────────

/// `(tag, css class, Font Awesome icon)` for each alert type.
pub const ALERT_KINDS: [(&str, &str, &str); 5] = [
    ("NOTE", "alert-note", "fa-info-circle"),
    ("TIP", "alert-tip", "fa-lightbulb"),
    ("IMPORTANT", "alert-important", "fa-exclamation-circle"),
    ("WARNING", "alert-warning", "fa-triangle-exclamation"),
    ("CAUTION", "alert-caution", "fa-radiation"),
];

static RE_ALERTS: Lazy<Vec<(Regex, String)>> = Lazy::new(|| {
    ALERT_KINDS
        .iter()
        .map(|(tag, class, icon)| {
            let pattern =
                format!(r"(?s)<blockquote>\s*<p>\s*\[!{tag}\]\s*(.*?)</p>(\s*.*?)</blockquote>");
            let replacement = format!(
                r#"<div class="alert {class}"><div class="alert-icon"><i class="fas {icon}"></i></div><div class="alert-content"><p>${{1}}</p>${{2}}</div></div>"#
            );
            (Regex::new(&pattern).unwrap(), replacement)
        })
        .collect()
});

pub fn rewrite_alerts(html: &str) -> String {
    let mut s = html.to_string();
    for (re, replacement) in RE_ALERTS.iter() {
        s = re.replace_all(&s, replacement.as_str()).into_owned();
    }
    s
}

// ── Rule 3: Title/body split ────────────────────────────────────────────────

static RE_TITLE_BODY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<p><strong>([^<]+)</strong>\s*:\s*(.+?)</p>").unwrap());

pub fn split_title_body(html: &str) -> String {
    RE_TITLE_BODY
        .replace_all(
            html,
            r#"<div class="alert-title">${1}</div><p class="alert-body">${2}</p>"#,
        )
        .into_owned()
}

// ── Rule 4: Embed images ────────────────────────────────────────────────────

static RE_IMG: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<img[^>]+src="([^"]+)"[^>]*>"#).unwrap());

/// Guess a MIME type from the extension, falling back to magic bytes.
pub fn image_mime_type(path: &Path, data: &[u8]) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "ico" => "image/x-icon",
        "avif" => "image/avif",
        _ => sniff_mime_type(data),
    }
}

fn sniff_mime_type(data: &[u8]) -> &'static str {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        "image/png"
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        "image/gif"
    } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        "image/webp"
    } else if data.starts_with(b"<svg") || data.starts_with(b"<?xml") {
        "image/svg+xml"
    } else {
        "application/octet-stream"
    }
}

fn is_remote_or_inline(src: &str) -> bool {
    src.starts_with("http") || src.starts_with("data:")
}

pub fn embed_images(html: &str, source: &Path, warnings: &mut Vec<BuildWarning>) -> String {
    let dir = source_dir(source);
    RE_IMG
        .replace_all(html, |caps: &Captures| {
            let tag = &caps[0];
            let src = &caps[1];
            if is_remote_or_inline(src) {
                return tag.to_string();
            }
            let decoded = percent_decode_str(src).decode_utf8_lossy();
            let path = dir.join(decoded.as_ref());
            match std::fs::read(&path) {
                Ok(data) => {
                    let uri = format!(
                        "data:{};base64,{}",
                        image_mime_type(&path, &data),
                        BASE64.encode(&data)
                    );
                    debug!("Embedded image {} ({} bytes)", path.display(), data.len());
                    tag.replacen(&format!(r#"src="{src}""#), &format!(r#"src="{uri}""#), 1)
                }
                Err(e) => {
                    let w = BuildWarning::ImageNotEmbedded {
                        path,
                        detail: e.to_string(),
                    };
                    warn!("{w}");
                    warnings.push(w);
                    tag.to_string()
                }
            }
        })
        .into_owned()
}

// ── Rule 5: Embed stylesheets ───────────────────────────────────────────────

static RE_STYLESHEET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<link[^>]+rel="stylesheet"[^>]+href="([^"]+)"[^>]*>"#).unwrap()
});

pub fn embed_stylesheets(html: &str, source: &Path, warnings: &mut Vec<BuildWarning>) -> String {
    let dir = source_dir(source);
    RE_STYLESHEET
        .replace_all(html, |caps: &Captures| {
            let href = &caps[1];
            if href.starts_with("http") {
                return caps[0].to_string();
            }
            let path = dir.join(percent_decode_str(href).decode_utf8_lossy().as_ref());
            match std::fs::read_to_string(&path) {
                Ok(css) => format!("<style>\n{css}\n</style>"),
                Err(e) => {
                    let w = BuildWarning::StylesheetNotEmbedded {
                        path,
                        detail: e.to_string(),
                    };
                    warn!("{w}");
                    warnings.push(w);
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

// ── Rule 6: UI components ───────────────────────────────────────────────────

static RE_UI_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<!--\s*@ui:([a-zA-Z0-9_-]+)\s*-->").unwrap());

/// Find `assets/ui/{name}.html` in `start` or one of its first few ancestors.
pub fn find_ui_component(start: &Path, name: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .take(UI_COMPONENT_SEARCH_DEPTH)
        .map(|dir| dir.join("assets").join("ui").join(format!("{name}.html")))
        .find(|candidate| candidate.is_file())
}

pub fn expand_ui_components(
    html: &str,
    source: &Path,
    warnings: &mut Vec<BuildWarning>,
) -> String {
    let dir = source_dir(source);
    RE_UI_MARKER
        .replace_all(html, |caps: &Captures| {
            let name = &caps[1];
            let snippet = find_ui_component(dir, name).and_then(|p| std::fs::read_to_string(p).ok());
            match snippet {
                Some(body) => body,
                None => {
                    let w = BuildWarning::UiComponentNotFound {
                        name: name.to_string(),
                        source_file: source.to_path_buf(),
                    };
                    warn!("{w}");
                    warnings.push(w);
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

// ── Rule 7: Asset paths ─────────────────────────────────────────────────────

static RE_ASSET_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"src="(?:\.\./)+assets/"#).unwrap());

pub fn rewrite_asset_paths(html: &str) -> String {
    RE_ASSET_PATH
        .replace_all(html, r#"src="assets/"#)
        .into_owned()
}

// ── Rule 8: Internal links ──────────────────────────────────────────────────

static RE_MD_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"href="\.?/?([^"]*\.md)(#[^"]*)?""#).unwrap());

/// Rewrite `href="guide.md#Setup"` to `href="#setup"` and `href="guide.md"` to
/// the target file's section id. Absolute URLs are left alone.
pub fn rewrite_internal_links(html: &str) -> String {
    RE_MD_LINK
        .replace_all(html, |caps: &Captures| {
            let target = &caps[1];
            if target.contains("://") {
                return caps[0].to_string();
            }
            match caps.get(2) {
                Some(fragment) => format!(r#"href="{}""#, normalize_anchor(fragment.as_str())),
                None => {
                    let decoded = percent_decode_str(target).decode_utf8_lossy();
                    format!(r##"href="#{}""##, generate_id(Path::new(decoded.as_ref())))
                }
            }
        })
        .into_owned()
}

/// Normalise a link fragment to an ASCII anchor (letters, digits and `-`).
///
/// URL-decodes (`+` is a space), drops a leading `#`, keeps ASCII letters,
/// digits and `-`, folds spaces and `_` to `-` and lowercases. Non-ASCII
/// characters are dropped. The result always starts with `#`.
pub fn normalize_anchor(anchor: &str) -> String {
    let plus_decoded = anchor.replace('+', " ");
    let decoded = percent_decode_str(&plus_decoded)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| anchor.to_string());
    let body = decoded.strip_prefix('#').unwrap_or(&decoded);

    let mut out = String::with_capacity(body.len() + 1);
    out.push('#');
    for c in body.chars() {
        if c.is_ascii_alphanumeric() || c == '-' {
            out.push(c.to_ascii_lowercase());
        } else if c == ' ' || c == '_' {
            out.push('-');
        }
    }
    out
}
