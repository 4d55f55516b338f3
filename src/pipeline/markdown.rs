//! Markdown → HTML conversion via pulldown-cmark.
//!
//! The parser itself is an external collaborator; this module only fixes the
//! dialect and adds automatic heading ids, which pulldown-cmark does not
//! generate on its own. Heading ids matter downstream: the outline extractor
//! only records `<h2>` elements that carry an `id`, and the page map joins on
//! those ids.
//!
//! GFM blockquote tags (`> [!NOTE]`) are deliberately *not* enabled: the
//! alert markers must survive as literal text so the HTML post-pass can turn
//! them into styled alert boxes.

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};
use std::collections::HashSet;

/// Parser options: tables, footnotes, strikethrough, task lists, definition
/// lists and `{#id}` heading attributes. Raw HTML is passed through.
pub fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_DEFINITION_LIST
        | Options::ENABLE_HEADING_ATTRIBUTES
}

/// Convert one Markdown document to an HTML fragment.
///
/// Every heading without an explicit `{#id}` receives a generated one; ids
/// are unique within the document.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut events: Vec<Event> = Parser::new_ext(markdown, markdown_options()).collect();
    assign_heading_ids(&mut events);

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());
    out
}

/// Fill in missing heading ids from the heading's plain text.
fn assign_heading_ids(events: &mut [Event]) {
    let mut seen = HashSet::new();

    // Explicit ids are claimed first so generated ones never collide with them.
    for event in events.iter() {
        if let Event::Start(Tag::Heading { id: Some(id), .. }) = event {
            seen.insert(id.to_string());
        }
    }

    for i in 0..events.len() {
        let needs_id = matches!(&events[i], Event::Start(Tag::Heading { id: None, .. }));
        if !needs_id {
            continue;
        }
        let text = heading_text(&events[i + 1..]);
        let slug = unique_slug(&slugify(&text), &mut seen);
        if let Event::Start(Tag::Heading { id, .. }) = &mut events[i] {
            *id = Some(CowStr::from(slug));
        }
    }
}

/// Concatenate the text of a heading's inline content.
fn heading_text(events: &[Event]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::End(TagEnd::Heading(_)) => break,
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            _ => {}
        }
    }
    text
}

/// Heading slug: letters and digits of any script lowercased; whitespace,
/// `-` and `_` become `-`; punctuation and symbols are dropped.
/// An empty result becomes `heading`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            slug.push('-');
        }
    }
    if slug.is_empty() {
        slug.push_str("heading");
    }
    slug
}

/// Return `base`, or `base-1`, `base-2`, … whichever is first unused.
fn unique_slug(base: &str, seen: &mut HashSet<String>) -> String {
    if seen.insert(base.to_string()) {
        return base.to_string();
    }
    let mut n = 1;
    loop {
        let candidate = format!("{base}-{n}");
        if seen.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Getting Started"), "getting-started");
        assert_eq!(slugify("  API v2.0 (beta) "), "api-v20-beta");
        assert_eq!(slugify("snake_case-name"), "snake-case-name");
        assert_eq!(slugify("설치 가이드"), "설치-가이드");
        assert_eq!(slugify("Über Straße"), "über-straße");
        assert_eq!(slugify("🚀"), "heading");
    }

    #[test]
    fn test_heading_ids_generated() {
        let html = markdown_to_html("# Intro\n\n## Getting Started\n\ntext\n");
        assert!(html.contains(r#"<h1 id="intro">Intro</h1>"#), "got: {html}");
        assert!(html.contains(r#"<h2 id="getting-started">Getting Started</h2>"#));
    }

    #[test]
    fn test_duplicate_heading_ids_suffixed() {
        let html = markdown_to_html("## Usage\n\n## Usage\n\n## Usage\n");
        assert!(html.contains(r#"id="usage""#));
        assert!(html.contains(r#"id="usage-1""#));
        assert!(html.contains(r#"id="usage-2""#));
    }

    #[test]
    fn test_explicit_id_kept() {
        let html = markdown_to_html("## Setup {#install}\n\n## Install\n");
        assert!(html.contains(r#"<h2 id="install">"#), "got: {html}");
        assert!(!html.contains("{#install}"));
        assert!(html.contains(r#"id="install-1""#));
    }

    #[test]
    fn test_code_in_heading_text() {
        let html = markdown_to_html("## The `run` command\n");
        assert!(html.contains(r#"id="the-run-command""#), "got: {html}");
    }

    #[test]
    fn test_alert_marker_stays_literal() {
        let html = markdown_to_html("> [!NOTE] Remember this\n");
        assert!(html.contains("<blockquote>"));
        assert!(html.contains("[!NOTE] Remember this"), "got: {html}");
    }

    #[test]
    fn test_tables_and_mermaid_fence() {
        let html = markdown_to_html("| a | b |\n|---|---|\n| 1 | 2 |\n\n```mermaid\ngraph TD\n```\n");
        assert!(html.contains("<table>"));
        assert!(html.contains(r#"<pre><code class="language-mermaid">"#));
    }

    #[test]
    fn test_raw_html_passthrough() {
        let html = markdown_to_html("<!-- @ui:banner -->\n\n<div class=\"x\">hi</div>\n");
        assert!(html.contains("<!-- @ui:banner -->"));
        assert!(html.contains(r#"<div class="x">hi</div>"#));
    }
}
