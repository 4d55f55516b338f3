//! Data model shared by the assembler, the analyzer and the orchestrator.
//!
//! The section `id` is the join key across every representation: it is
//! derived from the source file name, written into the HTML as an anchor,
//! carried through the manifest JSON into the analyzer and comes back in the
//! page map that pass 2 applies. Titles are only used for matching text on
//! rendered pages.
//!
//! ## Wire formats
//!
//! Sections manifest (assembler → analyzer), body HTML excluded:
//!
//! ```json
//! [{ "id": "02_setup", "title": "Setup", "level": 1,
//!    "subheadings": [{ "id": "advanced-options", "title": "Advanced Options", "level": 2 }] }]
//! ```
//!
//! Page map (analyzer → assembler pass 2), `page = 0` means "not located":
//!
//! ```json
//! { "total_pages": 12, "sections": [{ "id": "02_setup", "title": "Setup", "page": 4 }] }
//! ```

use crate::error::BuildWarning;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// A second-level heading tracked for the two-level TOC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubHeading {
    pub title: String,
    /// The `id` attribute of the `<h2>` element.
    pub id: String,
    pub level: u8,
    /// Located page number; absent until pass 2.
    #[serde(rename = "page", default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<usize>,
}

/// One top-level section of the assembled document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    /// Slug of the source file name; unique across the section list.
    pub id: String,
    /// Processed HTML body. Never serialised into the manifest.
    #[serde(skip)]
    pub content: String,
    /// 1 for a top-level heading, 2 for a level-2 led file, 0 for untitled.
    pub level: u8,
    #[serde(rename = "subheadings", default)]
    pub sub_headings: Vec<SubHeading>,
    /// Located page number; absent until pass 2.
    #[serde(rename = "page", default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<usize>,
}

/// A manifest entry as read back by the analyzer.
///
/// Same shape as a serialised [`Section`]; every field is optional so that
/// hand-written manifests only need `id` and `title`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionInput {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub level: u8,
    #[serde(default)]
    pub subheadings: Vec<SubHeadingInput>,
}

/// A sub-heading entry of a [`SectionInput`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubHeadingInput {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub level: u8,
}

impl From<&Section> for SectionInput {
    fn from(s: &Section) -> Self {
        Self {
            id: s.id.clone(),
            title: s.title.clone(),
            level: s.level,
            subheadings: s
                .sub_headings
                .iter()
                .map(|h| SubHeadingInput {
                    id: h.id.clone(),
                    title: h.title.clone(),
                    level: h.level,
                })
                .collect(),
        }
    }
}

/// An `(id, title, page)` triple searched for on rendered pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionPage {
    pub id: String,
    pub title: String,
    /// Logical page number, or 0 while not located.
    pub page: usize,
}

impl SectionPage {
    pub fn is_located(&self) -> bool {
        self.page > 0
    }
}

/// Flatten sections and their sub-headings, in document order, into search entries.
pub fn flatten_sections(inputs: &[SectionInput]) -> Vec<SectionPage> {
    let mut out = Vec::new();
    for input in inputs {
        out.push(SectionPage {
            id: input.id.clone(),
            title: input.title.clone(),
            page: 0,
        });
        for sub in &input.subheadings {
            out.push(SectionPage {
                id: sub.id.clone(),
                title: sub.title.clone(),
                page: 0,
            });
        }
    }
    out
}

/// Output of the analyzer: page count plus every entry with its page (or 0).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub total_pages: usize,
    pub sections: Vec<SectionPage>,
}

impl AnalysisResult {
    pub fn located_count(&self) -> usize {
        self.sections.iter().filter(|s| s.is_located()).count()
    }

    pub fn unlocated(&self) -> impl Iterator<Item = &SectionPage> {
        self.sections.iter().filter(|s| !s.is_located())
    }
}

/// `id → page` lookup built from an [`AnalysisResult`].
///
/// Unlocated entries (`page = 0`) are dropped so they never overwrite a
/// located entry with the same id and never reach the template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMap {
    pages: HashMap<String, usize>,
}

impl PageMap {
    pub fn from_analysis(result: &AnalysisResult) -> Self {
        let pages = result
            .sections
            .iter()
            .filter(|s| s.is_located())
            .map(|s| (s.id.clone(), s.page))
            .collect();
        Self { pages }
    }

    pub fn get(&self, id: &str) -> Option<usize> {
        self.pages.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Set `page_number` on every section and sub-heading whose id is mapped.
    ///
    /// Returns how many entries received a page number.
    pub fn apply(&self, sections: &mut [Section]) -> usize {
        let mut applied = 0;
        for section in sections.iter_mut() {
            if let Some(page) = self.get(&section.id) {
                section.page_number = Some(page);
                applied += 1;
            }
            for sub in section.sub_headings.iter_mut() {
                if let Some(page) = self.get(&sub.id) {
                    sub.page_number = Some(page);
                    applied += 1;
                }
            }
        }
        applied
    }
}

/// Result of one assembler pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// The rendered HTML document.
    pub html: String,
    /// Sections in document order, with page numbers when a page map was applied.
    pub sections: Vec<Section>,
    /// Degraded inputs encountered during the pass.
    pub warnings: Vec<BuildWarning>,
    /// Markdown files discovered.
    pub files_found: usize,
    /// Markdown files converted (merged files included).
    pub files_converted: usize,
}

/// Statistics for a complete build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildStats {
    pub files_found: usize,
    pub files_converted: usize,
    pub sections: usize,
    pub sub_headings: usize,
    /// Pages in the draft PDF (PDF builds only).
    pub total_pages: Option<usize>,
    /// TOC entries that received a page number.
    pub located: usize,
    /// TOC entries that stayed at page 0.
    pub unlocated: usize,
    pub total_duration_ms: u64,
    /// Time spent in the browser across both renders.
    pub render_duration_ms: u64,
}

/// Result of a complete build (HTML-only or two-pass PDF).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildOutput {
    /// Final artefact path.
    pub output_path: PathBuf,
    pub sections: Vec<Section>,
    /// Analyzer result (PDF builds only).
    pub analysis: Option<AnalysisResult>,
    pub warnings: Vec<BuildWarning>,
    pub stats: BuildStats,
    /// Intermediate files directory when it was kept for debugging.
    pub kept_temp_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: &str, title: &str, subs: &[(&str, &str)]) -> Section {
        Section {
            title: title.into(),
            id: id.into(),
            content: "<p>body</p>".into(),
            level: 1,
            sub_headings: subs
                .iter()
                .map(|(id, t)| SubHeading {
                    title: (*t).into(),
                    id: (*id).into(),
                    level: 2,
                    page_number: None,
                })
                .collect(),
            page_number: None,
        }
    }

    #[test]
    fn manifest_excludes_content_and_missing_pages() {
        let s = section("02_setup", "Setup", &[("advanced-options", "Advanced Options")]);
        let json = serde_json::to_string(&s).unwrap();
        assert!(!json.contains("body"), "content leaked: {json}");
        assert!(!json.contains("\"page\""), "page leaked: {json}");
        assert!(json.contains("\"subheadings\""));
    }

    #[test]
    fn manifest_reads_back_as_section_input() {
        let sections = vec![section("a", "Alpha", &[("x", "Ex")]), section("b", "Beta", &[])];
        let json = serde_json::to_string_pretty(&sections).unwrap();
        let inputs: Vec<SectionInput> = serde_json::from_str(&json).unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].subheadings[0].title, "Ex");
        assert_eq!(inputs[0], SectionInput::from(&sections[0]));
    }

    #[test]
    fn flatten_keeps_document_order() {
        let inputs = vec![
            SectionInput::from(&section("a", "Alpha", &[("a1", "One"), ("a2", "Two")])),
            SectionInput::from(&section("b", "Beta", &[])),
        ];
        let flat = flatten_sections(&inputs);
        let ids: Vec<&str> = flat.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["a", "a1", "a2", "b"]);
        assert!(flat.iter().all(|s| s.page == 0));
    }

    #[test]
    fn page_map_skips_unlocated_entries() {
        let result = AnalysisResult {
            total_pages: 9,
            sections: vec![
                SectionPage { id: "a".into(), title: "Alpha".into(), page: 1 },
                SectionPage { id: "a1".into(), title: "One".into(), page: 0 },
                SectionPage { id: "b".into(), title: "Beta".into(), page: 4 },
            ],
        };
        let map = PageMap::from_analysis(&result);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a1"), None);

        let mut sections = vec![section("a", "Alpha", &[("a1", "One")]), section("b", "Beta", &[])];
        assert_eq!(map.apply(&mut sections), 2);
        assert_eq!(sections[0].page_number, Some(1));
        assert_eq!(sections[0].sub_headings[0].page_number, None);
        assert_eq!(sections[1].page_number, Some(4));
    }

    #[test]
    fn page_map_wire_format() {
        let json = r#"{"total_pages": 3, "sections": [{"id": "a", "title": "Alpha", "page": 2}]}"#;
        let result: AnalysisResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.total_pages, 3);
        assert_eq!(result.located_count(), 1);
        assert_eq!(result.unlocated().count(), 0);
    }
}
