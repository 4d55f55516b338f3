//! CLI binary for edgequake-md2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` / `RenderOptions` / `AnalyzerConfig` and prints results.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use edgequake_md2pdf::pipeline::analyze::save_result;
use edgequake_md2pdf::{
    analyze_pdf, build_html, build_pdf, list_templates, AnalyzerConfig, BuildOutput,
    BuildProgressCallback, BuildStage, BuildWarning, ConversionConfig, ProgressCallback,
    RenderOptions,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the build stages, with a log
/// line per finished stage and per warning.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:30.green/238}] {pos}/{len} stages  {msg}  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl BuildProgressCallback for CliProgressCallback {
    fn on_build_start(&self, total_stages: usize) {
        self.bar.set_length(total_stages as u64);
        self.bar.reset_eta();
    }

    fn on_stage_start(&self, stage: BuildStage) {
        self.bar.set_prefix(stage.to_string());
        self.bar.set_message("");
    }

    fn on_file_converted(&self, file: &Path, index: usize, total: usize) {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.bar.set_message(format!("{}/{} {}", index, total, dim(&name)));
    }

    fn on_stage_complete(&self, stage: BuildStage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<16} {}",
            green("✓"),
            stage.to_string(),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_warning(&self, warning: &BuildWarning) {
        self.bar.println(format!("  {} {}", yellow("⚠"), warning));
    }

    fn on_build_complete(&self, _output: &Path) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Two-pass PDF with accurate TOC page numbers
  md2pdf docs/ -o manual.pdf

  # Metadata from AUTHORS.yml, overriding the title
  md2pdf docs/ -o manual.pdf -c docs/AUTHORS.yml --title "Operations Manual"

  # Self-contained HTML only (no browser needed)
  md2pdf docs/ -o manual.html --html-only

  # Manual front-matter skip when auto-detection guesses wrong
  md2pdf docs/ -o manual.pdf --skip 3

  # Keep pass1.html / pass1.pdf / sections.json / pages.json for debugging
  md2pdf docs/ -o manual.pdf --keep-temp -v

  # Analyze an existing PDF against a sections manifest
  md2pdf --analyze manual.pdf --sections sections.json -o pages.json

INPUT LAYOUT:
  docs/_sidebar.md       optional; [Title](file.md) links set the document order
  docs/*.md              scanned recursively when there is no sidebar
  docs/_*.md             never converted
  docs/README.md         skipped when more than one file is present

AUTHORS.yml:
  project_name: Acme Platform
  organization: Acme Corp
  copyright: © 2025 Acme Corp
  document:
    title: Operations Manual
    subtitle: Administrator Guide
    author: Platform Team
    header: Acme Operations Manual
    footer: Internal use only

ENVIRONMENT VARIABLES:
  CHROME                  Path to the Chrome/Chromium executable
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Overrides the log filter (e.g. edgequake_md2pdf=debug)

SETUP:
  PDF builds need Chrome/Chromium and a pdfium shared library. pdfium is
  looked up in PDFIUM_LIB_PATH, then the working directory, then the
  system library path. HTML-only builds need neither.
"#;

/// Convert a directory of Markdown into HTML and a PDF with accurate TOC page numbers.
#[derive(Parser, Debug)]
#[command(
    name = "md2pdf",
    version,
    about = "Convert Markdown directories to HTML and PDF with accurate TOC page numbers",
    long_about = "Convert a directory of Markdown files (or a single file) into one styled HTML \
document and a paginated PDF. The PDF is rendered twice: the first render is measured to find \
the page each section starts on, the second prints those page numbers in the table of contents.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown directory or single Markdown file.
    #[arg(required_unless_present_any = ["list_templates", "analyze"])]
    input: Option<PathBuf>,

    /// Output file (.pdf, or .html with --html-only; analysis JSON with --analyze).
    #[arg(short, long, env = "MD2PDF_OUTPUT",
          required_unless_present_any = ["list_templates", "analyze"])]
    output: Option<PathBuf>,

    /// Document title (overrides config).
    #[arg(long)]
    title: Option<String>,

    /// Document subtitle (overrides config).
    #[arg(long)]
    subtitle: Option<String>,

    /// Document version printed on the cover. Default: 1.0.0.
    #[arg(long = "doc-version", value_name = "VERSION")]
    doc_version: Option<String>,

    /// Author or company name (overrides config).
    #[arg(long)]
    author: Option<String>,

    /// Running header text (overrides config).
    #[arg(long)]
    header: Option<String>,

    /// Running footer text (overrides config).
    #[arg(long)]
    footer: Option<String>,

    /// Cover date. Default: today (YYYY-MM-DD).
    #[arg(long)]
    date: Option<String>,

    /// Metadata config file (AUTHORS.yml).
    #[arg(short, long, env = "MD2PDF_CONFIG")]
    config: Option<PathBuf>,

    /// Template: a built-in name (see --list-templates) or a .hbs/.html file.
    #[arg(long, env = "MD2PDF_TEMPLATE", default_value = "report")]
    template: String,

    /// List the built-in templates and exit.
    #[arg(long)]
    list_templates: bool,

    /// Generate HTML only (no browser, no PDF).
    #[arg(long)]
    html_only: bool,

    /// Keep images as file references instead of inlining them (PDF builds).
    #[arg(long)]
    no_embed: bool,

    /// Leading pages to skip when locating sections. 0 = auto-detect.
    #[arg(long, default_value_t = 0)]
    skip: usize,

    /// Subtracted from physical page numbers. Default: the skip count.
    #[arg(long)]
    offset: Option<usize>,

    /// Landscape orientation.
    #[arg(long)]
    landscape: bool,

    /// Print scale (0.1–2.0).
    #[arg(long, default_value_t = 1.0)]
    scale: f64,

    /// Render timeout per pass in seconds.
    #[arg(long, env = "MD2PDF_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Chrome/Chromium executable.
    #[arg(long, env = "CHROME")]
    chrome: Option<PathBuf>,

    /// Keep the two-pass working directory and print its path.
    #[arg(long)]
    keep_temp: bool,

    /// Analyze an existing PDF instead of building one.
    #[arg(long, value_name = "PDF", requires = "sections")]
    analyze: Option<PathBuf>,

    /// Sections manifest JSON for --analyze.
    #[arg(long, value_name = "JSON", requires = "analyze")]
    sections: Option<PathBuf>,

    /// Print the build result as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "MD2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MD2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MD2PDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Usage errors exit with 1 like every other failure; help and version exit 0.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && cli.analyze.is_none();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── List templates ───────────────────────────────────────────────────
    if cli.list_templates {
        for name in list_templates() {
            println!("{name}");
        }
        return Ok(());
    }

    let analyzer = AnalyzerConfig {
        skip_pages: cli.skip,
        page_offset: cli.offset,
        ..AnalyzerConfig::default()
    };

    // ── Analyze-only mode ────────────────────────────────────────────────
    if let Some(ref pdf) = cli.analyze {
        let sections = cli
            .sections
            .as_ref()
            .context("--analyze requires --sections <JSON>")?;
        let result = analyze_pdf(pdf, sections, &analyzer)
            .await
            .context("PDF analysis failed")?;

        match cli.output {
            Some(ref path) => {
                save_result(&result, path).context("Failed to save analysis result")?;
                if !cli.quiet {
                    eprintln!(
                        "{}  {}/{} entries located  {} pages  →  {}",
                        green("✔"),
                        result.located_count(),
                        result.sections.len(),
                        result.total_pages,
                        bold(&path.display().to_string()),
                    );
                }
            }
            None => println!(
                "{}",
                serde_json::to_string_pretty(&result).context("Failed to serialise result")?
            ),
        }
        return Ok(());
    }

    // Both are guaranteed by clap outside the two modes above.
    let input = cli.input.clone().context("missing input path")?;
    let output = cli.output.clone().context("missing output path")?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BuildProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run build ────────────────────────────────────────────────────────
    let out = if cli.html_only {
        build_html(&input, &output, &config)
            .await
            .context("HTML generation failed")?
    } else {
        let render = RenderOptions {
            chrome_executable: cli.chrome.clone(),
            ..RenderOptions::default()
        }
        .with_landscape(cli.landscape)
        .with_scale(cli.scale)
        .with_timeout(Duration::from_secs(cli.timeout));

        build_pdf(&input, &output, &config, &render, &analyzer, cli.keep_temp)
            .await
            .context("PDF generation failed")?
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&out).context("Failed to serialise output")?;
        println!("{json}");
    }
    if !cli.quiet {
        print_summary(&out, show_progress);
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .template(cli.template.clone())
        .embed_images(!cli.no_embed);

    if let Some(ref path) = cli.config {
        builder = builder.config_file(path);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    let mut config = builder.build().context("Invalid configuration")?;

    // Metadata overrides; unset values fall through to the config file.
    config.title = cli.title.clone();
    config.subtitle = cli.subtitle.clone();
    config.version = cli.doc_version.clone();
    config.author = cli.author.clone();
    config.header = cli.header.clone();
    config.footer = cli.footer.clone();
    config.date = cli.date.clone();

    Ok(config)
}

fn print_summary(out: &BuildOutput, warnings_shown: bool) {
    let stats = &out.stats;
    let mark = if out.warnings.is_empty() {
        green("✔")
    } else {
        cyan("⚠")
    };
    eprintln!(
        "{}  {} sections  {} files  {}ms  →  {}",
        mark,
        stats.sections,
        stats.files_converted,
        stats.total_duration_ms,
        bold(&out.output_path.display().to_string()),
    );

    if let Some(total) = stats.total_pages {
        let entries = stats.located + stats.unlocated;
        let located = format!("{}/{}", stats.located, entries);
        eprintln!(
            "   {} TOC entries located  /  {} draft pages  /  {}",
            if stats.unlocated == 0 { green(&located) } else { red(&located) },
            total,
            dim(&format!("{}ms rendering", stats.render_duration_ms)),
        );
    }
    if let Some(ref analysis) = out.analysis {
        for missing in analysis.unlocated() {
            eprintln!("   {} not located: {}", dim("·"), missing.title);
        }
    }

    if !warnings_shown {
        for w in &out.warnings {
            eprintln!("   {} {}", yellow("⚠"), w);
        }
    } else if !out.warnings.is_empty() {
        eprintln!("   {} warnings", out.warnings.len());
    }

    if let Some(ref dir) = out.kept_temp_dir {
        eprintln!("   intermediate files: {}", dim(&dir.display().to_string()));
    }
}
