//! Page rendering: one HTML file → one PDF via headless Chromium.
//!
//! ## Why a browser?
//!
//! The templates lay out the whole document in CSS: named pages, `@page`
//! margin boxes for the running header/footer, page counters and
//! client-side Mermaid diagrams. Only a real browser engine paginates that
//! faithfully, so the renderer drives Chromium over the DevTools protocol
//! (`chromiumoxide`) and uses its native print-to-PDF.
//!
//! ## Why fixed settle times?
//!
//! The engine reports when the DOM is ready, not when web fonts, images and
//! diagrams have finished painting. The renderer waits `load_settle` after
//! navigation and, if the page holds a `.mermaid` element, `diagram_settle`
//! on top. Both are configurable through [`RenderOptions`].
//!
//! Launch, load, print and shutdown all share one deadline of
//! `RenderOptions::timeout`. When it expires the Chromium process is killed
//! rather than closed over the protocol. The PDF is only written after
//! Chromium hands back the complete byte buffer, so a timeout never leaves a
//! partial file behind.

use crate::config::RenderOptions;
use crate::error::Md2PdfError;
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Characters escaped when turning a filesystem path into a `file://` URL.
const PATH_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Headroom for chromiumoxide's own launch timeout, so the shared deadline
/// always fires first.
const LAUNCH_SLACK: Duration = Duration::from_secs(5);

/// Isolation flags passed to every Chromium instance.
const CHROME_ARGS: &[&str] = &[
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-background-networking",
];

/// `file://` URL for an absolute path.
pub fn file_url(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let encoded = utf8_percent_encode(&raw, PATH_SET).to_string();
    if encoded.starts_with('/') {
        format!("file://{encoded}")
    } else {
        format!("file:///{encoded}")
    }
}

fn browser_config(opts: &RenderOptions) -> Result<BrowserConfig, Md2PdfError> {
    let mut builder = BrowserConfig::builder()
        .launch_timeout(opts.timeout + LAUNCH_SLACK)
        .request_timeout(opts.timeout);
    if opts.no_sandbox {
        builder = builder.no_sandbox();
    }
    for arg in CHROME_ARGS {
        builder = builder.arg(*arg);
    }
    if let Some(exe) = &opts.chrome_executable {
        builder = builder.chrome_executable(exe);
    }
    builder.build().map_err(Md2PdfError::BrowserLaunchFailed)
}

fn print_params(opts: &RenderOptions) -> PrintToPdfParams {
    PrintToPdfParams {
        landscape: Some(opts.landscape),
        print_background: Some(true),
        scale: Some(opts.scale),
        prefer_css_page_size: Some(true),
        margin_top: Some(0.0),
        margin_bottom: Some(0.0),
        margin_left: Some(0.0),
        margin_right: Some(0.0),
        ..Default::default()
    }
}

/// Render `html_path` to `pdf_path` and return the number of bytes written.
pub async fn render_to_pdf(
    html_path: &Path,
    pdf_path: &Path,
    opts: &RenderOptions,
) -> Result<u64, Md2PdfError> {
    let html_abs = std::fs::canonicalize(html_path).map_err(|_| Md2PdfError::InputNotFound {
        path: html_path.to_path_buf(),
    })?;
    let url = file_url(&html_abs);
    info!("Rendering {} → {}", html_path.display(), pdf_path.display());

    let deadline = Instant::now() + opts.timeout;
    let timed_out = || Md2PdfError::RenderTimeout {
        secs: opts.timeout.as_secs(),
    };

    let (mut browser, mut handler) =
        tokio::time::timeout_at(deadline, Browser::launch(browser_config(opts)?))
            .await
            .map_err(|_| timed_out())?
            .map_err(|e| Md2PdfError::BrowserLaunchFailed(e.to_string()))?;

    let handler_task = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    });

    let outcome = tokio::time::timeout_at(deadline, print_page(&browser, &url, opts)).await;

    // Shut the browser down on every path before looking at the outcome.
    if outcome.is_err() {
        kill_browser(&mut browser).await;
    } else {
        shut_down(&mut browser, deadline).await;
    }
    handler_task.abort();

    let bytes = match outcome {
        Err(_) => return Err(timed_out()),
        Ok(result) => result.map_err(|detail| Md2PdfError::RenderFailed {
            path: html_path.to_path_buf(),
            detail,
        })?,
    };

    write_pdf(pdf_path, &bytes)?;
    info!(
        "PDF written: {} ({:.2} MB)",
        pdf_path.display(),
        bytes.len() as f64 / (1024.0 * 1024.0)
    );
    Ok(bytes.len() as u64)
}

/// Close the browser over the protocol, killing it if it is still running at
/// `deadline`.
async fn shut_down(browser: &mut Browser, deadline: Instant) {
    let graceful = tokio::time::timeout_at(deadline, async {
        if let Err(e) = browser.close().await {
            debug!("Browser close failed: {}", e);
        }
        if let Err(e) = browser.wait().await {
            debug!("Browser wait failed: {}", e);
        }
    })
    .await;
    if graceful.is_err() {
        warn!("Browser still running at the render deadline, killing it");
        kill_browser(browser).await;
    }
}

async fn kill_browser(browser: &mut Browser) {
    if let Some(Err(e)) = browser.kill().await {
        debug!("Browser kill failed: {}", e);
    }
}

/// Navigate, wait for content to settle and print.
async fn print_page(browser: &Browser, url: &str, opts: &RenderOptions) -> Result<Vec<u8>, String> {
    let page: Page = browser.new_page(url).await.map_err(|e| e.to_string())?;
    page.wait_for_navigation().await.map_err(|e| e.to_string())?;
    page.find_element("body").await.map_err(|e| e.to_string())?;

    debug!("Page loaded, settling for {:?}", opts.load_settle);
    tokio::time::sleep(opts.load_settle).await;

    let has_diagrams = page
        .evaluate("document.querySelector('.mermaid') !== null")
        .await
        .map_err(|e| e.to_string())?
        .into_value::<bool>()
        .unwrap_or(false);
    if has_diagrams {
        debug!("Diagrams present, settling for {:?}", opts.diagram_settle);
        tokio::time::sleep(opts.diagram_settle).await;
    }

    page.pdf(print_params(opts)).await.map_err(|e| e.to_string())
}

fn write_pdf(path: &Path, bytes: &[u8]) -> Result<(), Md2PdfError> {
    let write_err = |source| Md2PdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(path, bytes).map_err(write_err)
}
