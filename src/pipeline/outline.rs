//! Section identity and the two-level outline.
//!
//! This is where a Markdown file becomes a [`Section`]: its title and level
//! come from the raw source, its id from the file name, and its sub-headings
//! from the rendered HTML. The [`SectionAssembler`] then applies the merge
//! rule that folds level-2 led files into the section before them.
//!
//! The section id is the only identifier that survives from Markdown through
//! HTML and the rendered PDF back into pass 2, so [`generate_id`] must be a
//! pure function of the file name.

use crate::error::BuildWarning;
use crate::output::{Section, SubHeading};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// Title used for files without any level-1 or level-2 heading.
pub const UNTITLED: &str = "Untitled";

// ── Title extraction ─────────────────────────────────────────────────────

/// Find the document title and its level in raw Markdown.
///
/// The first `# ` heading outside fenced code wins immediately (level 1).
/// Otherwise the first `## ` heading is used (level 2). Files with neither
/// yield `("Untitled", 0)`.
pub fn extract_title(markdown: &str) -> (String, u8) {
    let mut fallback: Option<&str> = None;
    let mut open_fence: Option<&str> = None;

    for line in markdown.lines() {
        let line = line.trim();

        let marker = if line.starts_with("```") {
            Some("```")
        } else if line.starts_with("~~~") {
            Some("~~~")
        } else {
            None
        };
        if let Some(marker) = marker {
            match open_fence {
                None => open_fence = Some(marker),
                Some(open) if open == marker => open_fence = None,
                Some(_) => {}
            }
            continue;
        }
        if open_fence.is_some() {
            continue;
        }

        if let Some(title) = line.strip_prefix("# ") {
            return (title.trim().to_string(), 1);
        }
        if fallback.is_none() {
            if let Some(title) = line.strip_prefix("## ") {
                fallback = Some(title.trim());
            }
        }
    }

    match fallback {
        Some(title) => (title.to_string(), 2),
        None => (UNTITLED.to_string(), 0),
    }
}

// ── Section id ───────────────────────────────────────────────────────────

/// Section id from a file path: base name without `.md`, spaces → `-`, lowercased.
///
/// Deterministic and idempotent: applying it to its own output (as a file
/// name) returns the same id.
pub fn generate_id(path: &Path) -> String {
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = base.strip_suffix(".md").unwrap_or(&base);
    base.replace(' ', "-").to_lowercase()
}

// ── Sub-headings ─────────────────────────────────────────────────────────

static RE_H2: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<h2\s+id="([^"]+)"[^>]*>(.*?)</h2>"#).unwrap());
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static RE_H2_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<h2(\s+)id="([^"]+)""#).unwrap());

/// FAQ entries ("Q. …", "Q …") are content, not navigation.
fn is_faq_title(title: &str) -> bool {
    title.starts_with("Q.") || title.starts_with("Q ")
}

/// Collect `<h2 id="…">` elements as level-2 outline entries.
///
/// Inner markup is stripped and entities decoded, so
/// `<h2 id="x">Tips &amp; <em>tricks</em></h2>` yields `Tips & tricks`.
pub fn extract_sub_headings(html: &str) -> Vec<SubHeading> {
    RE_H2
        .captures_iter(html)
        .filter_map(|caps| {
            let stripped = RE_TAG.replace_all(&caps[2], "");
            let title = html_escape::decode_html_entities(stripped.trim()).into_owned();
            if is_faq_title(&title) {
                return None;
            }
            Some(SubHeading {
                title,
                id: caps[1].to_string(),
                level: 2,
                page_number: None,
            })
        })
        .collect()
}

// ── Merge rule ───────────────────────────────────────────────────────────

/// Where a converted file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// The file started a new section.
    NewSection { id: String },
    /// The file was appended to an earlier section.
    Merged { id: String, into: String },
}

/// One converted file, ready to be placed.
#[derive(Debug, Clone)]
pub struct ConvertedFile<'a> {
    pub path: &'a Path,
    pub title: String,
    pub level: u8,
    pub html: String,
    pub sub_headings: Vec<SubHeading>,
}

/// Builds the section list in file order, applying the merge rule.
///
/// A file whose title is level 2 is appended to the previous section (behind
/// an anchor `<div id="…">` carrying its own id) instead of starting one, so
/// the section list can be shorter than the file list. Ids are kept unique:
/// a clash gets a `-2`, `-3`, … suffix and a [`BuildWarning`].
///
/// Sub-heading ids are only unique within their own file, so the assembler
/// also suffixes any that repeat an earlier section or sub-heading id
/// (`-1`, `-2`, …) and renames the matching `<h2>` anchor in the file's HTML.
#[derive(Debug, Default)]
pub struct SectionAssembler {
    sections: Vec<Section>,
    used_ids: HashSet<String>,
    heading_ids: HashSet<String>,
}

impl SectionAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    fn claim_id(&mut self, path: &Path, warnings: &mut Vec<BuildWarning>) -> String {
        let base = generate_id(path);
        if self.used_ids.insert(base.clone()) {
            return base;
        }
        let mut n = 2;
        let renamed = loop {
            let candidate = format!("{base}-{n}");
            if self.used_ids.insert(candidate.clone()) {
                break candidate;
            }
            n += 1;
        };
        let w = BuildWarning::DuplicateSectionId {
            id: base,
            renamed: renamed.clone(),
            path: path.to_path_buf(),
        };
        warn!("{w}");
        warnings.push(w);
        renamed
    }

    fn is_taken(&self, id: &str) -> bool {
        self.used_ids.contains(id) || self.heading_ids.contains(id)
    }

    /// Give every sub-heading a document-wide unique id and return `html`
    /// with the renamed `<h2>` anchors.
    fn claim_heading_ids(&mut self, sub_headings: &mut [SubHeading], html: String) -> String {
        let mut renamed: HashMap<String, String> = HashMap::new();
        for sub in sub_headings.iter_mut() {
            let mut id = sub.id.clone();
            let mut n = 1;
            while self.is_taken(&id) {
                id = format!("{}-{n}", sub.id);
                n += 1;
            }
            self.heading_ids.insert(id.clone());
            if id != sub.id {
                debug!("Sub-heading id '{}' renamed to '{}'", sub.id, id);
                renamed.insert(std::mem::replace(&mut sub.id, id.clone()), id);
            }
        }
        if renamed.is_empty() {
            return html;
        }
        // One pass, so a new id is never renamed a second time.
        RE_H2_ID
            .replace_all(&html, |caps: &regex::Captures| {
                let id = renamed.get(&caps[2]).map_or(&caps[2], String::as_str);
                format!("<h2{}id=\"{}\"", &caps[1], id)
            })
            .into_owned()
    }

    /// Place one file, either as a new section or merged into the last one.
    pub fn push(&mut self, mut file: ConvertedFile<'_>, warnings: &mut Vec<BuildWarning>) -> Placement {
        let id = self.claim_id(file.path, warnings);
        file.html = self.claim_heading_ids(&mut file.sub_headings, std::mem::take(&mut file.html));

        if file.level == 2 {
            if let Some(last) = self.sections.last_mut() {
                last.content.push_str(&format!("\n<div id=\"{id}\"></div>\n{}", file.html));
                last.sub_headings.extend(file.sub_headings);
                info!(
                    "Merged {} into previous section '{}'",
                    file.path.display(),
                    last.title
                );
                return Placement::Merged {
                    id,
                    into: last.id.clone(),
                };
            }
        }

        self.sections.push(Section {
            title: file.title,
            id: id.clone(),
            content: file.html,
            level: file.level,
            sub_headings: file.sub_headings,
            page_number: None,
        });
        Placement::NewSection { id }
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn finish(self) -> Vec<Section> {
        self.sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_level1_wins_regardless_of_order() {
        assert_eq!(
            extract_title("## Overview\n\ntext\n\n# Real Title\n"),
            ("Real Title".to_string(), 1)
        );
    }

    #[test]
    fn test_level2_fallback() {
        assert_eq!(
            extract_title("intro\n## Advanced Options\n## Later\n"),
            ("Advanced Options".to_string(), 2)
        );
    }

    #[test]
    fn test_heading_in_code_fence_ignored() {
        let md = "```bash\n# not a title\n```\n## Usage\n";
        assert_eq!(extract_title(md), ("Usage".to_string(), 2));

        let md = "~~~\n```\n# still code\n~~~\ntext\n";
        assert_eq!(extract_title(md), (UNTITLED.to_string(), 0));
    }

    #[test]
    fn test_untitled() {
        assert_eq!(extract_title("just text\n#hashtag\n"), (UNTITLED.to_string(), 0));
    }

    #[test]
    fn test_generate_id() {
        assert_eq!(generate_id(Path::new("docs/01_Intro.md")), "01_intro");
        assert_eq!(generate_id(Path::new("My Guide.md")), "my-guide");
        assert_eq!(generate_id(Path::new("notes.txt")), "notes.txt");
    }

    #[test]
    fn test_generate_id_idempotent() {
        for name in ["02 Setup Guide.md", "README.md", "a-b_c.md"] {
            let once = generate_id(Path::new(name));
            let twice = generate_id(Path::new(&format!("{once}.md")));
            assert_eq!(once, twice, "{name}");
        }
    }

    #[test]
    fn test_sub_headings() {
        let html = concat!(
            "<h1 id=\"top\">Top</h1>\n",
            "<h2 id=\"tips\">Tips &amp; <em>tricks</em></h2>\n",
            "<h2 id=\"q-why\">Q. Why?</h2>\n",
            "<h2 id=\"q-how\">Q How?</h2>\n",
            "<h2>No id</h2>\n",
            "<h2 id=\"quality\">Quality</h2>\n",
            "<h3 id=\"deep\">Deep</h3>\n"
        );
        let subs = extract_sub_headings(html);
        let titles: Vec<&str> = subs.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, ["Tips & tricks", "Quality"]);
        assert_eq!(subs[0].id, "tips");
        assert!(subs.iter().all(|s| s.level == 2));
    }

    fn file<'a>(path: &'a Path, title: &str, level: u8, subs: &[&str]) -> ConvertedFile<'a> {
        ConvertedFile {
            path,
            title: title.into(),
            level,
            html: format!("<p>{title}</p>"),
            sub_headings: subs
                .iter()
                .map(|t| SubHeading {
                    title: (*t).into(),
                    id: t.to_lowercase(),
                    level: 2,
                    page_number: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_merge_rule() {
        let (a, b, c) = (
            PathBuf::from("01_intro.md"),
            PathBuf::from("02_setup.md"),
            PathBuf::from("02a_setup_advanced.md"),
        );
        let mut asm = SectionAssembler::new();
        let mut w = Vec::new();
        asm.push(file(&a, "Introduction", 1, &[]), &mut w);
        asm.push(file(&b, "Setup", 1, &["Install"]), &mut w);
        let placed = asm.push(file(&c, "Advanced Options", 2, &["Advanced Options"]), &mut w);

        assert_eq!(
            placed,
            Placement::Merged {
                id: "02a_setup_advanced".into(),
                into: "02_setup".into()
            }
        );
        let sections = asm.finish();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].id, "02_setup");
        let subs: Vec<&str> = sections[1].sub_headings.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(subs, ["Install", "Advanced Options"]);
        assert!(sections[1]
            .content
            .contains("<div id=\"02a_setup_advanced\"></div>\n<p>Advanced Options</p>"));
        assert!(w.is_empty());
    }

    #[test]
    fn test_level2_first_file_starts_section() {
        let p = PathBuf::from("faq.md");
        let mut asm = SectionAssembler::new();
        let placed = asm.push(file(&p, "FAQ", 2, &[]), &mut Vec::new());
        assert_eq!(placed, Placement::NewSection { id: "faq".into() });
        assert_eq!(asm.finish()[0].level, 2);
    }

    #[test]
    fn test_duplicate_ids_renamed() {
        let (a, b) = (PathBuf::from("a/intro.md"), PathBuf::from("b/intro.md"));
        let mut asm = SectionAssembler::new();
        let mut w = Vec::new();
        asm.push(file(&a, "One", 1, &[]), &mut w);
        asm.push(file(&b, "Two", 1, &[]), &mut w);
        let sections = asm.finish();
        assert_eq!(sections[0].id, "intro");
        assert_eq!(sections[1].id, "intro-2");
        assert!(matches!(w[0], BuildWarning::DuplicateSectionId { .. }));
    }

    fn with_usage_headings<'a>(path: &'a Path, title: &str) -> ConvertedFile<'a> {
        let mut f = file(path, title, 1, &["Usage", "Usage-1"]);
        f.html = "<h2 id=\"usage\">Usage</h2>\n<h2 id=\"usage-1\">Usage</h2>".into();
        f
    }

    #[test]
    fn test_sub_heading_ids_unique_across_files() {
        let (a, b) = (PathBuf::from("01_a.md"), PathBuf::from("02_b.md"));
        let mut asm = SectionAssembler::new();
        let mut w = Vec::new();
        asm.push(with_usage_headings(&a, "One"), &mut w);
        asm.push(with_usage_headings(&b, "Two"), &mut w);
        let sections = asm.finish();

        let ids: Vec<&str> = sections
            .iter()
            .flat_map(|s| s.sub_headings.iter().map(|h| h.id.as_str()))
            .collect();
        assert_eq!(ids, ["usage", "usage-1", "usage-2", "usage-1-1"]);
        assert_eq!(
            sections[1].content,
            "<h2 id=\"usage-2\">Usage</h2>\n<h2 id=\"usage-1-1\">Usage</h2>"
        );
        assert!(w.is_empty());
    }
}
