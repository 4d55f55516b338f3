//! Document assembly: Markdown files → sections → one HTML document.
//!
//! This is one full assembler pass. The two-pass PDF build runs it twice:
//! once to produce the draft HTML and the sections manifest, and once more
//! with the analyzer's page map so the TOC shows real page numbers.
//!
//! ## Failure policy
//!
//! Only whole-pass problems are fatal: a missing or unlistable input, an
//! unknown template, a failed write. Anything that concerns one file or one
//! asset (an unreadable Markdown file, a missing image, a broken page map)
//! becomes a [`BuildWarning`], is logged, reported through the progress
//! callback and returned with the output.

use crate::config::ConversionConfig;
use crate::error::{BuildWarning, Md2PdfError};
use crate::output::{AnalysisResult, ConversionOutput, PageMap, SectionInput};
use crate::pipeline::outline::{self, ConvertedFile, Placement, SectionAssembler};
use crate::pipeline::postprocess::{self, PostprocessOptions};
use crate::pipeline::{input, markdown, preprocess, template};
use crate::project::{DocumentMeta, ProjectConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Convert a Markdown directory (or single file) into an HTML document.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Returns `Err(Md2PdfError)` only for fatal errors:
/// - Input not found / directory unreadable
/// - Template not found or failed to render
pub async fn convert(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2PdfError> {
    let input = input.as_ref().to_path_buf();
    let config = config.clone();
    tokio::task::spawn_blocking(move || assemble(&input, &config))
        .await
        .map_err(|e| Md2PdfError::Internal(format!("Conversion task panicked: {}", e)))?
}

/// Blocking variant of [`convert`]; needs no runtime.
pub fn convert_sync(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2PdfError> {
    assemble(input.as_ref(), config)
}

/// Convert and write the HTML document to `output_path`.
///
/// When `config.sections_json` is set the sections manifest (no body HTML)
/// is written there as well. Uses atomic write (temp file + rename) so a
/// failed build never leaves a truncated document behind.
pub async fn convert_to_html(
    input: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2PdfError> {
    let output = convert(input, config).await?;
    let path = output_path.as_ref();

    if let Some(ref manifest_path) = config.sections_json {
        write_manifest(manifest_path, &output).await?;
    }

    write_atomic(path, output.html.as_bytes()).await?;
    info!("HTML written: {}", path.display());
    Ok(output)
}

// ── Assembly ─────────────────────────────────────────────────────────────

fn assemble(input: &Path, config: &ConversionConfig) -> Result<ConversionOutput, Md2PdfError> {
    info!("Assembling document from {}", input.display());
    let mut warnings = Vec::new();

    let project = match config.config_file {
        Some(ref path) => ProjectConfig::load_or_default(path, &mut warnings),
        None => ProjectConfig::default(),
    };
    let meta = DocumentMeta::resolve(config, &project);

    let files = input::discover_files(input, &mut warnings)?;

    let opts = PostprocessOptions {
        embed_assets: config.embed_images,
        pdf_mode: config.pdf_mode,
    };

    let mut assembler = SectionAssembler::new();
    let mut files_converted = 0;
    for (index, path) in files.iter().enumerate() {
        match std::fs::read_to_string(path) {
            Ok(source) => {
                let file = convert_file(path, &source, opts, &mut warnings);
                match assembler.push(file, &mut warnings) {
                    Placement::NewSection { id } => debug!("{} → section '{}'", path.display(), id),
                    Placement::Merged { id, into } => {
                        debug!("{} → '{}' merged into '{}'", path.display(), id, into)
                    }
                }
                files_converted += 1;
            }
            Err(e) => {
                let w = BuildWarning::MarkdownUnreadable {
                    path: path.clone(),
                    detail: e.to_string(),
                };
                warn!("{w}");
                warnings.push(w);
            }
        }

        if let Some(ref cb) = config.progress_callback {
            cb.on_file_converted(path, index + 1, files.len());
        }
    }

    let mut sections = assembler.finish();
    info!(
        "Converted {}/{} files into {} sections",
        files_converted,
        files.len(),
        sections.len()
    );

    if let Some(ref pages_path) = config.pages_json {
        match load_page_map(pages_path) {
            Ok(map) => {
                let applied = map.apply(&mut sections);
                info!("Applied {} page numbers from {}", applied, pages_path.display());
            }
            Err(detail) => {
                let w = BuildWarning::PageMapUnreadable {
                    path: pages_path.clone(),
                    detail,
                };
                warn!("{w}");
                warnings.push(w);
            }
        }
    }

    let html = template::render_document(&config.template, &meta, &sections)?;

    if let Some(ref cb) = config.progress_callback {
        for w in &warnings {
            cb.on_warning(w);
        }
    }

    Ok(ConversionOutput {
        html,
        sections,
        warnings,
        files_found: files.len(),
        files_converted,
    })
}

/// Run one file through the pre-pass, Markdown and post-pass.
fn convert_file<'a>(
    path: &'a Path,
    source: &str,
    opts: PostprocessOptions,
    warnings: &mut Vec<BuildWarning>,
) -> ConvertedFile<'a> {
    let (title, level) = outline::extract_title(source);
    let prepared = preprocess::preprocess_markdown(source);
    let html = markdown::markdown_to_html(&prepared);
    let html = postprocess::postprocess_html(&html, path, opts, warnings);
    let sub_headings = outline::extract_sub_headings(&html);
    debug!(
        "{}: '{}' (level {}, {} sub-headings)",
        path.display(),
        title,
        level,
        sub_headings.len()
    );

    ConvertedFile {
        path,
        title,
        level,
        html,
        sub_headings,
    }
}

fn load_page_map(path: &Path) -> Result<PageMap, String> {
    let raw = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let result: AnalysisResult = serde_json::from_str(&raw).map_err(|e| e.to_string())?;
    Ok(PageMap::from_analysis(&result))
}

// ── Output ───────────────────────────────────────────────────────────────

async fn write_manifest(path: &Path, output: &ConversionOutput) -> Result<(), Md2PdfError> {
    let manifest: Vec<SectionInput> = output.sections.iter().map(SectionInput::from).collect();
    let json = serde_json::to_string_pretty(&manifest)
        .map_err(|e| Md2PdfError::Internal(format!("Serialising sections manifest: {e}")))?;
    write_atomic(path, json.as_bytes()).await?;
    debug!("Sections manifest written: {}", path.display());
    Ok(())
}

/// Write `bytes` to `path` via a sibling temp file and a rename.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Md2PdfError> {
    let write_err = |source| Md2PdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = tmp_sibling(path);
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::SectionPage;
    use crate::progress::BuildProgressCallback;
    use std::fs;
    use std::sync::{Arc, Mutex};

    fn write(dir: &Path, name: &str, body: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, body).unwrap();
    }

    fn config() -> ConversionConfig {
        ConversionConfig::builder()
            .title("Manual")
            .date("2025-01-31")
            .build()
            .unwrap()
    }

    #[test]
    fn test_sidebar_order_and_merge() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "01_intro.md", "# Introduction\n\nHello.\n");
        write(dir.path(), "02_setup.md", "# Setup\n\n## Install\n\nRun it.\n");
        write(dir.path(), "02a_setup_advanced.md", "## Advanced Options\n\nTune it.\n");
        write(
            dir.path(),
            "_sidebar.md",
            "- [Intro](01_intro.md)\n- [Setup](/02_setup.md)\n- [Advanced](02a_setup_advanced.md)\n",
        );

        let out = convert_sync(dir.path(), &config()).unwrap();
        assert_eq!(out.files_found, 3);
        assert_eq!(out.files_converted, 3);
        assert_eq!(out.sections.len(), 2);
        assert_eq!(out.sections[1].id, "02_setup");
        let subs: Vec<&str> = out.sections[1].sub_headings.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(subs, ["Install", "Advanced Options"]);
        assert!(out.html.contains("<div id=\"02a_setup_advanced\"></div>"));
        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
    }

    #[test]
    fn test_page_map_applied() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        write(&docs, "01_intro.md", "# Introduction\n\n## Scope\n\ntext\n");
        let pages = dir.path().join("pages.json");
        let result = AnalysisResult {
            total_pages: 3,
            sections: vec![
                SectionPage { id: "01_intro".into(), title: "Introduction".into(), page: 1 },
                SectionPage { id: "scope".into(), title: "Scope".into(), page: 0 },
            ],
        };
        fs::write(&pages, serde_json::to_string(&result).unwrap()).unwrap();

        let mut cfg = config();
        cfg.pages_json = Some(pages);
        let out = convert_sync(&docs, &cfg).unwrap();
        assert_eq!(out.sections[0].page_number, Some(1));
        assert_eq!(out.sections[0].sub_headings[0].page_number, None);
        assert!(out.html.contains("class=\"toc-page\">1<"));
    }

    #[test]
    fn test_hangul_sub_headings_keep_their_own_pages() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        write(&docs, "01_a.md", "# 설치\n\n## 준비\n\n## 개요\n");
        write(&docs, "02_b.md", "# 설정\n\n## 네트워크\n\n## 개요\n");

        let first = convert_sync(&docs, &config()).unwrap();
        let ids: Vec<&str> = first
            .sections
            .iter()
            .flat_map(|s| s.sub_headings.iter().map(|h| h.id.as_str()))
            .collect();
        assert_eq!(ids, ["준비", "개요", "네트워크", "개요-1"]);
        assert!(first.html.contains(r#"<h2 id="개요-1">개요</h2>"#));

        let pages = dir.path().join("pages.json");
        let page = |id: &str, title: &str, page| SectionPage {
            id: id.into(),
            title: title.into(),
            page,
        };
        let result = AnalysisResult {
            total_pages: 9,
            sections: vec![
                page("01_a", "설치", 1),
                page("준비", "준비", 2),
                page("개요", "개요", 3),
                page("02_b", "설정", 6),
                page("네트워크", "네트워크", 7),
                page("개요-1", "개요", 8),
            ],
        };
        fs::write(&pages, serde_json::to_string(&result).unwrap()).unwrap();

        let mut cfg = config();
        cfg.pages_json = Some(pages);
        let out = convert_sync(&docs, &cfg).unwrap();
        let sub_pages: Vec<Option<usize>> = out
            .sections
            .iter()
            .flat_map(|s| s.sub_headings.iter().map(|h| h.page_number))
            .collect();
        assert_eq!(sub_pages, [Some(2), Some(3), Some(7), Some(8)]);
    }

    #[test]
    fn test_broken_page_map_is_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        write(&docs, "a.md", "# A\n");
        let pages = dir.path().join("pages.json");
        fs::write(&pages, "{").unwrap();

        let mut cfg = config();
        cfg.pages_json = Some(pages);
        let out = convert_sync(&docs, &cfg).unwrap();
        assert!(matches!(out.warnings[0], BuildWarning::PageMapUnreadable { .. }));
        assert_eq!(out.sections[0].page_number, None);
    }

    #[test]
    fn test_missing_input_is_fatal() {
        let err = convert_sync("/no/such/docs", &config()).unwrap_err();
        assert!(matches!(err, Md2PdfError::InputNotFound { .. }));
    }

    #[test]
    fn test_unknown_template_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.md", "# A\n");
        let cfg = ConversionConfig::builder().template("nope").build().unwrap();
        let err = convert_sync(dir.path(), &cfg).unwrap_err();
        assert!(matches!(err, Md2PdfError::TemplateNotFound { .. }));
    }

    #[derive(Default)]
    struct Recorder {
        files: Mutex<Vec<(usize, usize)>>,
        warnings: Mutex<usize>,
    }

    impl BuildProgressCallback for Recorder {
        fn on_file_converted(&self, _file: &Path, index: usize, total: usize) {
            self.files.lock().unwrap().push((index, total));
        }
        fn on_warning(&self, _warning: &BuildWarning) {
            *self.warnings.lock().unwrap() += 1;
        }
    }

    #[test]
    fn test_progress_events() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.md", "# A\n\n![x](missing.png)\n");
        write(dir.path(), "b.md", "# B\n");
        let rec = Arc::new(Recorder::default());
        let cfg = ConversionConfig::builder()
            .progress_callback(rec.clone())
            .build()
            .unwrap();

        let out = convert_sync(dir.path(), &cfg).unwrap();
        assert_eq!(*rec.files.lock().unwrap(), [(1, 2), (2, 2)]);
        assert_eq!(*rec.warnings.lock().unwrap(), out.warnings.len());
        assert!(matches!(out.warnings[0], BuildWarning::ImageNotEmbedded { .. }));
    }

    #[tokio::test]
    async fn test_convert_to_html_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        write(&docs, "01_intro.md", "# Introduction\n\n## Scope\n");
        let html_path = dir.path().join("out/manual.html");
        let manifest = dir.path().join("out/sections.json");

        let mut cfg = config();
        cfg.sections_json = Some(manifest.clone());
        convert_to_html(&docs, &html_path, &cfg).await.unwrap();

        let html = fs::read_to_string(&html_path).unwrap();
        assert!(html.contains("<section class=\"chapter\" id=\"01_intro\">"));
        let raw = fs::read_to_string(&manifest).unwrap();
        let parsed: Vec<SectionInput> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed[0].subheadings[0].id, "scope");
        assert!(!raw.contains("content"));
        assert!(!tmp_sibling(&html_path).exists());
    }

    #[test]
    fn test_tmp_sibling() {
        assert_eq!(tmp_sibling(Path::new("out/a.html")), PathBuf::from("out/a.html.tmp"));
    }
}
