//! PDF rasterisation: render the leading pages of an in-memory PDF via pdfium.
//!
//! pdfium is a C++ library with thread-local state, so every call runs inside
//! `spawn_blocking` and binds its own `Pdfium` instance there.
//!
//! The longest edge of each page is capped by `max_rendered_pixels` rather
//! than by DPI: page sizes vary too much for a fixed DPI to bound memory.

use crate::config::AnalyzerConfig;
use crate::error::AnalysisError;
use crate::file::RawFile;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable naming the pdfium library, or the directory holding it.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Pages rendered from one document.
#[derive(Debug)]
pub struct RenderedPdf {
    /// One image per rendered page, in page order.
    pub pages: Vec<DynamicImage>,
    /// Total number of pages in the document.
    pub total_pages: usize,
}

/// Rasterise up to `config.pdf_max_pages` leading pages of `file`.
pub async fn render_pdf(file: &RawFile, config: &AnalyzerConfig) -> Result<RenderedPdf, AnalysisError> {
    let bytes = file.shared_bytes();
    let name = file.name().to_string();
    let max_pages = config.pdf_max_pages;
    let max_pixels = config.max_rendered_pixels;
    let password = config.pdf_password.clone();

    tokio::task::spawn_blocking(move || {
        render_blocking(&name, &bytes, max_pages, max_pixels, password.as_deref())
    })
    .await
    .map_err(|e| AnalysisError::Internal(format!("Render task panicked: {}", e)))?
}

fn bind_pdfium() -> Result<Pdfium, PdfiumError> {
    match std::env::var(PDFIUM_LIB_PATH_ENV) {
        Ok(value) if !value.is_empty() => {
            let path = Path::new(&value);
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(path)
            } else {
                path.to_path_buf()
            };
            Pdfium::bind_to_library(&lib)
                .or_else(|_| Pdfium::bind_to_system_library())
                .map(Pdfium::new)
        }
        _ => Pdfium::bind_to_system_library().map(Pdfium::new),
    }
}

fn render_blocking(
    name: &str,
    bytes: &[u8],
    max_pages: usize,
    max_pixels: u32,
    password: Option<&str>,
) -> Result<RenderedPdf, AnalysisError> {
    let render_err = |detail: String| AnalysisError::Render {
        name: name.to_string(),
        detail,
    };

    let pdfium = bind_pdfium().map_err(|e| render_err(format!("pdfium unavailable: {:?}", e)))?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| render_err(format!("{:?}", e)))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    let wanted = total_pages.min(max_pages.max(1));
    info!("PDF '{}' loaded: {} pages, rendering {}", name, total_pages, wanted);

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut rendered = Vec::with_capacity(wanted);
    for idx in 0..wanted {
        let page = pages
            .get(idx as u16)
            .map_err(|e| render_err(format!("page {}: {:?}", idx + 1, e)))?;

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| render_err(format!("page {}: {:?}", idx + 1, e)))?;

        let image = bitmap.as_image();
        debug!("Rendered page {} → {}x{} px", idx + 1, image.width(), image.height());
        rendered.push(image);
    }

    Ok(RenderedPdf {
        pages: rendered,
        total_pages,
    })
}
