//! Invoice PDF generation.
//!
//! [`template::invoice_html`] is a pure transform from invoice + profile data
//! to an A4-printable HTML document; [`PdfRenderer`] drives a headless
//! Chromium print over it. Rendering spawns a browser subprocess per call,
//! so a semaphore bounds how many run at once.

pub mod template;

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::ApiError;

pub struct PdfRenderer {
    render_slots: Arc<Semaphore>,
}

impl PdfRenderer {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            render_slots: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Render an HTML document to PDF bytes on the blocking thread pool.
    pub async fn render(&self, html: String) -> Result<Vec<u8>, ApiError> {
        let _permit = self
            .render_slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ApiError::Internal(format!("render semaphore closed: {e}")))?;

        let bytes = tokio::task::spawn_blocking(move || render_blocking(&html))
            .await
            .map_err(|e| ApiError::Internal(format!("render task failed: {e}")))?
            .map_err(|e| ApiError::Internal(format!("PDF rendering failed: {e}")))?;

        debug!(size = bytes.len(), "Rendered PDF");
        Ok(bytes)
    }
}

fn render_blocking(html: &str) -> anyhow::Result<Vec<u8>> {
    let options = LaunchOptions::default_builder()
        .headless(true)
        .sandbox(false)
        .build()
        .map_err(|e| anyhow::anyhow!("browser launch options: {e}"))?;

    // Dropping `browser` kills the Chromium process on every exit path,
    // including the error returns below.
    let browser = Browser::new(options)?;
    let tab = browser.new_tab()?;

    let data_url = format!("data:text/html;base64,{}", BASE64.encode(html));
    tab.navigate_to(&data_url)?.wait_until_navigated()?;

    let pdf = tab.print_to_pdf(Some(a4_print_options()))?;
    Ok(pdf)
}

/// A4 portrait with printable backgrounds and fixed margins.
fn a4_print_options() -> PrintToPdfOptions {
    PrintToPdfOptions {
        print_background: Some(true),
        paper_width: Some(8.27),
        paper_height: Some(11.69),
        margin_top: Some(0.4),
        margin_bottom: Some(0.4),
        margin_left: Some(0.4),
        margin_right: Some(0.4),
        ..Default::default()
    }
}
