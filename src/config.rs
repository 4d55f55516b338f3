//! Configuration types for Markdown-to-PDF builds.
//!
//! All build behaviour is controlled through [`ConversionConfig`], built via
//! its [`ConversionConfigBuilder`]. Renderer and analyzer knobs live in their
//! own structs ([`RenderOptions`], [`AnalyzerConfig`]) because the two-pass
//! orchestrator hands them to stages that know nothing about document
//! metadata.
//!
//! # Design choice: builder over constructor
//! A twenty-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::Md2PdfError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Name of the template used when none is given.
pub const DEFAULT_TEMPLATE: &str = "report";

/// Version string printed on the cover when none is given.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Configuration for one Markdown-to-HTML conversion (one Assembler pass).
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_md2pdf::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .title("Operations Manual")
///     .version("2.1.0")
///     .template("report")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Document title override. Falls back to the config file, then "Document".
    pub title: Option<String>,

    /// Subtitle override.
    pub subtitle: Option<String>,

    /// Version shown on the cover. Default: `1.0.0`.
    pub version: Option<String>,

    /// Author override. Falls back to the config file's author or organization.
    pub author: Option<String>,

    /// Running header text. Default: `"{title} - {subtitle}"` or the title.
    pub header: Option<String>,

    /// Running footer text. Default: the resolved author.
    pub footer: Option<String>,

    /// Date shown on the cover. Default: today, formatted `%Y-%m-%d`.
    pub date: Option<String>,

    /// Optional `AUTHORS.yml`-style metadata file.
    ///
    /// A missing or malformed file is a [`crate::error::BuildWarning`], never
    /// a fatal error: the build falls back to the built-in defaults.
    pub config_file: Option<PathBuf>,

    /// Template name (`default`, `report`, …) or path to a template file.
    /// Default: `report`.
    pub template: String,

    /// Inline local images and stylesheets into the HTML. Default: true.
    ///
    /// The renderer loads the HTML from a temporary directory, so relative
    /// asset references only survive when they are embedded.
    pub embed_images: bool,

    /// Rewrite links between Markdown files into in-document anchors. Default: false.
    ///
    /// Only meaningful when the HTML is going to be printed: in a PDF every
    /// section lives in one file, so `guide.md#setup` must become `#setup`.
    pub pdf_mode: bool,

    /// Where to write the sections manifest JSON (pass 1 only).
    pub sections_json: Option<PathBuf>,

    /// Page map JSON produced by the analyzer (pass 2 only).
    pub pages_json: Option<PathBuf>,

    /// Optional progress callback for stage events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            title: None,
            subtitle: None,
            version: None,
            author: None,
            header: None,
            footer: None,
            date: None,
            config_file: None,
            template: DEFAULT_TEMPLATE.to_string(),
            embed_images: true,
            pdf_mode: false,
            sections_json: None,
            pages_json: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("title", &self.title)
            .field("subtitle", &self.subtitle)
            .field("version", &self.version)
            .field("author", &self.author)
            .field("header", &self.header)
            .field("footer", &self.footer)
            .field("date", &self.date)
            .field("config_file", &self.config_file)
            .field("template", &self.template)
            .field("embed_images", &self.embed_images)
            .field("pdf_mode", &self.pdf_mode)
            .field("sections_json", &self.sections_json)
            .field("pages_json", &self.pages_json)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BuildProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.config.subtitle = Some(subtitle.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = Some(version.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.config.author = Some(author.into());
        self
    }

    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.config.header = Some(header.into());
        self
    }

    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.config.footer = Some(footer.into());
        self
    }

    pub fn date(mut self, date: impl Into<String>) -> Self {
        self.config.date = Some(date.into());
        self
    }

    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.config_file = Some(path.into());
        self
    }

    pub fn template(mut self, name: impl Into<String>) -> Self {
        self.config.template = name.into();
        self
    }

    pub fn embed_images(mut self, v: bool) -> Self {
        self.config.embed_images = v;
        self
    }

    pub fn pdf_mode(mut self, v: bool) -> Self {
        self.config.pdf_mode = v;
        self
    }

    pub fn sections_json(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.sections_json = Some(path.into());
        self
    }

    pub fn pages_json(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pages_json = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Md2PdfError> {
        let c = &self.config;
        if c.template.trim().is_empty() {
            return Err(Md2PdfError::InvalidConfig(
                "Template name must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Renderer options ─────────────────────────────────────────────────────

/// Options for the headless-browser print step.
///
/// The durations are fixed settle times, not readiness probes: the browser
/// only reports DOM-ready, so fonts, images and client-side diagrams get a
/// grace period before printing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Print in landscape orientation. Default: false.
    pub landscape: bool,

    /// Print scale factor. Range: 0.1–2.0. Default: 1.0.
    pub scale: f64,

    /// Deadline for the whole launch → load → print → shutdown sequence. Default: 300 s.
    pub timeout: Duration,

    /// Wait after DOM-ready for fonts and images. Default: 3 s.
    pub load_settle: Duration,

    /// Extra wait when the page contains `.mermaid` diagrams. Default: 5 s.
    pub diagram_settle: Duration,

    /// Explicit Chrome/Chromium binary. If None, chromiumoxide searches the usual locations.
    pub chrome_executable: Option<PathBuf>,

    /// Launch with `--no-sandbox` (needed in most containers). Default: true.
    pub no_sandbox: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            landscape: false,
            scale: 1.0,
            timeout: Duration::from_secs(300),
            load_settle: Duration::from_secs(3),
            diagram_settle: Duration::from_secs(5),
            chrome_executable: None,
            no_sandbox: true,
        }
    }
}

impl RenderOptions {
    /// Set the print scale, clamped to Chromium's accepted 0.1–2.0 range.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale.clamp(0.1, 2.0);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.max(Duration::from_secs(1));
        self
    }

    pub fn with_landscape(mut self, v: bool) -> Self {
        self.landscape = v;
        self
    }
}

// ── Analyzer options ─────────────────────────────────────────────────────

/// Tunable constants of the TOC-vs-body page classifier.
///
/// The defaults were tuned against real manuals with one cover page, a
/// dotted-leader TOC and prose-heavy body pages. Documents with very short
/// sections or a leader-free TOC layout may need different values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocHeuristics {
    /// More distinct titles than this on one page ⇒ TOC. Default: 5.
    pub max_titles_per_body_page: usize,

    /// Fewer non-whitespace characters than this ⇒ TOC. Default: 100.
    pub min_body_chars: usize,

    /// Average characters per matched title below this ⇒ TOC. Default: 80.
    pub min_chars_per_title: usize,

    /// A title-less page longer than this with no dot leaders ⇒ body. Default: 400.
    pub narrative_page_chars: usize,

    /// More dot leaders than this on a titled page ⇒ TOC. Default: 3.
    pub max_dot_leaders: usize,

    /// Skip count used when auto-detection finds no body page. Default: 3.
    pub fallback_skip_pages: usize,
}

impl Default for TocHeuristics {
    fn default() -> Self {
        Self {
            max_titles_per_body_page: 5,
            min_body_chars: 100,
            min_chars_per_title: 80,
            narrative_page_chars: 400,
            max_dot_leaders: 3,
            fallback_skip_pages: 3,
        }
    }
}

/// Options for locating section titles in a rendered PDF.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Leading pages (cover + TOC) to skip. `0` = auto-detect. Default: 0.
    pub skip_pages: usize,

    /// Value subtracted from the physical page number. Default: the effective skip count.
    ///
    /// Set this when the template's page counter does not start on the first
    /// body page (e.g. it counts the TOC but not the cover).
    pub page_offset: Option<usize>,

    /// Classifier constants for TOC auto-detection.
    pub heuristics: TocHeuristics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ConversionConfig::default();
        assert_eq!(c.template, "report");
        assert!(c.embed_images);
        assert!(!c.pdf_mode);
        assert!(c.sections_json.is_none());
    }

    #[test]
    fn builder_sets_overrides() {
        let c = ConversionConfig::builder()
            .title("Manual")
            .subtitle("Admin Guide")
            .pdf_mode(true)
            .embed_images(false)
            .build()
            .unwrap();
        assert_eq!(c.title.as_deref(), Some("Manual"));
        assert_eq!(c.subtitle.as_deref(), Some("Admin Guide"));
        assert!(c.pdf_mode);
        assert!(!c.embed_images);
    }

    #[test]
    fn builder_rejects_empty_template() {
        let err = ConversionConfig::builder().template("  ").build().unwrap_err();
        assert!(matches!(err, Md2PdfError::InvalidConfig(_)));
    }

    #[test]
    fn render_scale_is_clamped() {
        assert_eq!(RenderOptions::default().with_scale(5.0).scale, 2.0);
        assert_eq!(RenderOptions::default().with_scale(0.0).scale, 0.1);
        assert_eq!(RenderOptions::default().with_scale(0.8).scale, 0.8);
    }

    #[test]
    fn render_defaults() {
        let r = RenderOptions::default();
        assert_eq!(r.timeout, Duration::from_secs(300));
        assert_eq!(r.load_settle, Duration::from_secs(3));
        assert_eq!(r.diagram_settle, Duration::from_secs(5));
        assert!(!r.landscape);
    }

    #[test]
    fn heuristic_defaults() {
        let h = TocHeuristics::default();
        assert_eq!(h.max_titles_per_body_page, 5);
        assert_eq!(h.min_body_chars, 100);
        assert_eq!(h.min_chars_per_title, 80);
        assert_eq!(h.narrative_page_chars, 400);
        assert_eq!(h.max_dot_leaders, 3);
        assert_eq!(h.fallback_skip_pages, 3);
        assert_eq!(AnalyzerConfig::default().skip_pages, 0);
    }
}
