//! Two-pass PDF build: render, measure, re-render.
//!
//! ## Why two passes?
//!
//! Page breaks only exist after Chromium has laid the document out, and
//! Chromium does not say where each section landed. So the document is
//! built once without page numbers, rendered to a draft PDF, measured by the
//! analyzer, and then built and rendered again with the measured numbers in
//! the TOC.
//!
//! ```text
//! Pass1Convert ─▶ Pass1Render ─▶ Analyze ─▶ Pass2Convert ─▶ Pass2Render
//!  pass1.html      pass1.pdf     pages.json   pass2.html      <output>.pdf
//!  sections.json
//! ```
//!
//! Every stage is fatal on failure. Intermediates live in a private temp
//! directory that is removed on every exit path unless `keep_temp` is set.

use crate::config::{AnalyzerConfig, ConversionConfig, RenderOptions};
use crate::convert::convert_to_html;
use crate::error::Md2PdfError;
use crate::output::{AnalysisResult, BuildOutput, BuildStats, ConversionOutput};
use crate::pipeline::{analyze, render};
use crate::progress::{BuildStage, ProgressCallback};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Names of the intermediate files inside the working directory.
pub const PASS1_HTML: &str = "pass1.html";
pub const PASS1_PDF: &str = "pass1.pdf";
pub const SECTIONS_JSON: &str = "sections.json";
pub const PAGES_JSON: &str = "pages.json";
pub const PASS2_HTML: &str = "pass2.html";

/// `path` with `.pdf` appended unless it already ends in `.pdf` (any case).
pub fn pdf_output_path(path: &Path) -> PathBuf {
    let is_pdf = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        return path.to_path_buf();
    }
    let mut name = path.as_os_str().to_os_string();
    name.push(".pdf");
    PathBuf::from(name)
}

/// `path` with its extension replaced by `.html` unless it already is one.
pub fn html_output_path(path: &Path) -> PathBuf {
    let is_html = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html"));
    if is_html {
        path.to_path_buf()
    } else {
        path.with_extension("html")
    }
}

/// Build a PDF with accurate TOC page numbers.
///
/// `output` gets a `.pdf` suffix if it lacks one; the final path is
/// returned in [`BuildOutput::output_path`].
pub async fn build_pdf(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &ConversionConfig,
    render_opts: &RenderOptions,
    analyzer: &AnalyzerConfig,
    keep_temp: bool,
) -> Result<BuildOutput, Md2PdfError> {
    let total_start = Instant::now();
    let input = input.as_ref();
    let output_path = pdf_output_path(output.as_ref());
    info!(
        "Two-pass PDF build: {} → {}",
        input.display(),
        output_path.display()
    );

    let temp = tempfile::Builder::new()
        .prefix("md2pdf-")
        .tempdir()
        .map_err(|e| Md2PdfError::Internal(format!("Failed to create temp directory: {}", e)))?;
    // Dropping `_guard` removes the directory on every exit path.
    let (_guard, work_dir) = if keep_temp {
        let dir = temp.keep();
        info!("Keeping intermediate files in {}", dir.display());
        (None, dir)
    } else {
        let dir = temp.path().to_path_buf();
        (Some(temp), dir)
    };

    let pass1_html = work_dir.join(PASS1_HTML);
    let pass1_pdf = work_dir.join(PASS1_PDF);
    let sections_json = work_dir.join(SECTIONS_JSON);
    let pages_json = work_dir.join(PAGES_JSON);
    let pass2_html = work_dir.join(PASS2_HTML);

    let cb = config.progress_callback.clone();
    let mut stage = StageTimer::new(cb.clone());
    if let Some(ref cb) = cb {
        cb.on_build_start(BuildStage::TWO_PASS.len());
    }

    // ── Pass 1: convert ──────────────────────────────────────────────────
    stage.start(BuildStage::Pass1Convert);
    let mut pass1_config = config.clone();
    pass1_config.pdf_mode = true;
    pass1_config.sections_json = Some(sections_json.clone());
    pass1_config.pages_json = None;
    let pass1 = convert_to_html(input, &pass1_html, &pass1_config).await?;
    stage.complete(BuildStage::Pass1Convert);

    // ── Pass 1: render ───────────────────────────────────────────────────
    stage.start(BuildStage::Pass1Render);
    let render_start = Instant::now();
    render::render_to_pdf(&pass1_html, &pass1_pdf, render_opts).await?;
    let mut render_duration_ms = render_start.elapsed().as_millis() as u64;
    stage.complete(BuildStage::Pass1Render);

    // ── Analyze ──────────────────────────────────────────────────────────
    stage.start(BuildStage::Analyze);
    let analysis = analyze::analyze_pdf(&pass1_pdf, &sections_json, analyzer).await?;
    analyze::save_result(&analysis, &pages_json)?;
    stage.complete(BuildStage::Analyze);

    // ── Pass 2: convert ──────────────────────────────────────────────────
    // Pass 1 already reported per-file events and warnings.
    stage.start(BuildStage::Pass2Convert);
    let mut pass2_config = pass1_config;
    pass2_config.sections_json = None;
    pass2_config.pages_json = Some(pages_json.clone());
    pass2_config.progress_callback = None;
    let pass2 = convert_to_html(input, &pass2_html, &pass2_config).await?;
    stage.complete(BuildStage::Pass2Convert);

    // ── Pass 2: render ───────────────────────────────────────────────────
    stage.start(BuildStage::Pass2Render);
    let render_start = Instant::now();
    render::render_to_pdf(&pass2_html, &output_path, render_opts).await?;
    render_duration_ms += render_start.elapsed().as_millis() as u64;
    stage.complete(BuildStage::Pass2Render);

    if let Some(ref cb) = cb {
        cb.on_build_complete(&output_path);
    }

    let stats = build_stats(&pass1, &pass2, Some(&analysis), total_start, render_duration_ms);
    info!(
        "PDF build complete: {} sections, {}/{} entries located, {} pages, {}ms",
        stats.sections,
        stats.located,
        stats.located + stats.unlocated,
        analysis.total_pages,
        stats.total_duration_ms
    );

    Ok(BuildOutput {
        output_path,
        sections: pass2.sections,
        analysis: Some(analysis),
        warnings: pass2.warnings,
        stats,
        kept_temp_dir: keep_temp.then_some(work_dir),
    })
}

/// HTML-only build: one assembler pass with images embedded and internal
/// links left untouched.
///
/// `output` gets its extension replaced by `.html` if it isn't one already.
pub async fn build_html(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<BuildOutput, Md2PdfError> {
    let total_start = Instant::now();
    let output_path = html_output_path(output.as_ref());

    let mut html_config = config.clone();
    html_config.embed_images = true;
    html_config.pdf_mode = false;

    let cb = config.progress_callback.clone();
    let mut stage = StageTimer::new(cb.clone());
    if let Some(ref cb) = cb {
        cb.on_build_start(1);
    }

    stage.start(BuildStage::Convert);
    let out = convert_to_html(input, &output_path, &html_config).await?;
    stage.complete(BuildStage::Convert);

    if let Some(ref cb) = cb {
        cb.on_build_complete(&output_path);
    }

    let stats = build_stats(&out, &out, None, total_start, 0);
    info!(
        "HTML build complete: {} sections, {}ms",
        stats.sections, stats.total_duration_ms
    );

    Ok(BuildOutput {
        output_path,
        sections: out.sections,
        analysis: None,
        warnings: out.warnings,
        stats,
        kept_temp_dir: None,
    })
}

fn build_stats(
    first: &ConversionOutput,
    last: &ConversionOutput,
    analysis: Option<&AnalysisResult>,
    total_start: Instant,
    render_duration_ms: u64,
) -> BuildStats {
    let (located, unlocated) = analysis
        .map(|a| (a.located_count(), a.sections.len() - a.located_count()))
        .unwrap_or((0, 0));
    BuildStats {
        files_found: first.files_found,
        files_converted: first.files_converted,
        sections: last.sections.len(),
        sub_headings: last.sections.iter().map(|s| s.sub_headings.len()).sum(),
        total_pages: analysis.map(|a| a.total_pages),
        located,
        unlocated,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        render_duration_ms,
    }
}

/// Fires stage start/complete events with elapsed time.
struct StageTimer {
    cb: Option<ProgressCallback>,
    started: Instant,
}

impl StageTimer {
    fn new(cb: Option<ProgressCallback>) -> Self {
        Self {
            cb,
            started: Instant::now(),
        }
    }

    fn start(&mut self, stage: BuildStage) {
        info!("Stage: {}", stage);
        self.started = Instant::now();
        if let Some(ref cb) = self.cb {
            cb.on_stage_start(stage);
        }
    }

    fn complete(&self, stage: BuildStage) {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        if let Some(ref cb) = self.cb {
            cb.on_stage_complete(stage, elapsed_ms);
        }
    }
}
