//! Document templating: the assembled sections + metadata → one HTML file.
//!
//! The template owns the whole visual layout, including the cover, the
//! self-rendered table of contents and the running header/footer printed
//! through CSS `@page` margin boxes. Page numbers only become visible
//! through it: in pass 1 every TOC entry is blank, in pass 2 the located
//! numbers are filled in.
//!
//! ## Template lookup
//!
//! | Name | Source |
//! |------|--------|
//! | `default` | built-in `layout` |
//! | `report` (default) | built-in `layout_report` |
//! | `<name>` | built-in `layout_<name>` if present |
//! | anything else | read as a path to a `.hbs`/`.html` file |
//!
//! ## Template context
//!
//! `title`, `subtitle`, `version`, `date`, `author`, `header`, `footer`,
//! `copyright` and `sections[]`, where each section has `id`, `title`,
//! `level`, `content` (raw HTML, use `{{{content}}}`), optional `page` and
//! `subheadings[]` (`id`, `title`, `level`, optional `page`).
//!
//! Helpers: `inc` (`{{inc @index}}` → 1-based), `slice` (`{{slice title 0 1}}`,
//! character-based, tolerant of out-of-range bounds) and `css_str`
//! (quote a value for a CSS `content:` string).

use crate::error::Md2PdfError;
use crate::output::{Section, SubHeading};
use crate::project::DocumentMeta;
use handlebars::{Context, Handlebars, Helper, HelperResult, Output, RenderContext};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Built-in templates as `(registry name, source)`.
const BUILTIN_TEMPLATES: [(&str, &str); 2] = [
    ("layout", include_str!("../../templates/layout.hbs")),
    ("layout_report", include_str!("../../templates/layout_report.hbs")),
];

/// Names accepted by `--template` that resolve to built-in layouts.
pub fn list_templates() -> Vec<&'static str> {
    BUILTIN_TEMPLATES
        .iter()
        .map(|(key, _)| match *key {
            "layout" => "default",
            other => other.trim_start_matches("layout_"),
        })
        .collect()
}

fn builtin(key: &str) -> Option<&'static str> {
    BUILTIN_TEMPLATES
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, src)| *src)
}

/// Resolve a template name to its source text.
pub fn load_template(name: &str) -> Result<String, Md2PdfError> {
    let key = if name == "default" {
        "layout".to_string()
    } else {
        format!("layout_{name}")
    };
    if let Some(src) = builtin(&key) {
        debug!("Using built-in template '{}'", key);
        return Ok(src.to_string());
    }

    let path = Path::new(name);
    if path.is_file() {
        debug!("Using template file {}", path.display());
        return std::fs::read_to_string(path).map_err(|e| Md2PdfError::TemplateFailed {
            name: name.to_string(),
            detail: e.to_string(),
        });
    }

    Err(Md2PdfError::TemplateNotFound {
        name: name.to_string(),
    })
}

// ── Context ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct SubHeadingView<'a> {
    id: &'a str,
    title: &'a str,
    level: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<usize>,
}

#[derive(Serialize)]
struct SectionView<'a> {
    id: &'a str,
    title: &'a str,
    level: u8,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<usize>,
    subheadings: Vec<SubHeadingView<'a>>,
}

#[derive(Serialize)]
struct DocumentView<'a> {
    #[serde(flatten)]
    meta: &'a DocumentMeta,
    sections: Vec<SectionView<'a>>,
}

impl<'a> From<&'a SubHeading> for SubHeadingView<'a> {
    fn from(h: &'a SubHeading) -> Self {
        Self {
            id: &h.id,
            title: &h.title,
            level: h.level,
            page: h.page_number,
        }
    }
}

impl<'a> From<&'a Section> for SectionView<'a> {
    fn from(s: &'a Section) -> Self {
        Self {
            id: &s.id,
            title: &s.title,
            level: s.level,
            content: &s.content,
            page: s.page_number,
            subheadings: s.sub_headings.iter().map(SubHeadingView::from).collect(),
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn inc_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let n = h.param(0).and_then(|v| v.value().as_u64()).unwrap_or(0);
    out.write(&(n + 1).to_string())?;
    Ok(())
}

/// Character-based substring; bounds past the end are clamped.
pub fn slice_chars(s: &str, start: usize, end: usize) -> String {
    s.chars().skip(start).take(end.saturating_sub(start)).collect()
}

fn slice_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let s = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
    let start = h.param(1).and_then(|v| v.value().as_u64()).unwrap_or(0) as usize;
    let end = h
        .param(2)
        .and_then(|v| v.value().as_u64())
        .map(|e| e as usize)
        .unwrap_or(usize::MAX);
    out.write(&slice_chars(s, start, end))?;
    Ok(())
}

/// Quote a value as a CSS string literal.
pub fn css_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' | '\r' => out.push(' '),
            '<' => out.push_str("\\3c "),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn css_str_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let s = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
    out.write(&css_string(s))?;
    Ok(())
}

fn registry() -> Handlebars<'static> {
    let mut hb = Handlebars::new();
    hb.set_strict_mode(false);
    hb.register_helper("inc", Box::new(inc_helper));
    hb.register_helper("slice", Box::new(slice_helper));
    hb.register_helper("css_str", Box::new(css_str_helper));
    hb
}

// ── Rendering ────────────────────────────────────────────────────────────

/// Render the named template with the document metadata and sections.
pub fn render_document(
    template_name: &str,
    meta: &DocumentMeta,
    sections: &[Section],
) -> Result<String, Md2PdfError> {
    let source = load_template(template_name)?;
    render_template_source(template_name, &source, meta, sections)
}

/// Render a template given as source text.
pub fn render_template_source(
    template_name: &str,
    source: &str,
    meta: &DocumentMeta,
    sections: &[Section],
) -> Result<String, Md2PdfError> {
    let failed = |detail: String| Md2PdfError::TemplateFailed {
        name: template_name.to_string(),
        detail,
    };

    let mut hb = registry();
    hb.register_template_string("document", source)
        .map_err(|e| failed(e.to_string()))?;

    let view = DocumentView {
        meta,
        sections: sections.iter().map(SectionView::from).collect(),
    };
    hb.render("document", &view).map_err(|e| failed(e.to_string()))
}
