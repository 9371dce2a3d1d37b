//! PDF rasterisation: render every page to a `DynamicImage` via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is CPU-bound. Rendering runs on tokio's blocking pool so the
//! runtime threads stay free for the inference round-trips.
//!
//! ## Why cap pixels, not DPI?
//!
//! Page sizes vary wildly; a poster-sized page at print DPI would produce an
//! enormous bitmap. `max_rendered_pixels` caps the longest edge regardless of
//! physical size, which keeps memory bounded and matches the image sizes
//! vision models handle well.

use crate::error::WorkerError;
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One rendered page, 0-based.
#[derive(Debug, Clone)]
pub struct Page {
    pub index: usize,
    pub image: DynamicImage,
}

/// Turns a PDF on disk into its ordered page images.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(&self, pdf_path: &Path) -> Result<Vec<Page>, WorkerError>;
}

/// pdfium-backed renderer.
#[derive(Debug, Clone)]
pub struct PdfiumRenderer {
    max_pixels: u32,
    library_dir: Option<PathBuf>,
}

impl PdfiumRenderer {
    /// `library_dir` is the directory holding `libpdfium`; `None` binds to the
    /// system library.
    pub fn new(max_pixels: u32, library_dir: Option<PathBuf>) -> Self {
        Self {
            max_pixels,
            library_dir,
        }
    }
}

#[async_trait]
impl DocumentRenderer for PdfiumRenderer {
    async fn render(&self, pdf_path: &Path) -> Result<Vec<Page>, WorkerError> {
        let path = pdf_path.to_path_buf();
        let max_pixels = self.max_pixels;
        let library_dir = self.library_dir.clone();

        tokio::task::spawn_blocking(move || {
            render_pages_blocking(&path, max_pixels, library_dir.as_deref())
        })
        .await
        .map_err(|e| WorkerError::Internal(format!("Render task panicked: {}", e)))?
    }
}

fn bind_pdfium(library_dir: Option<&Path>) -> Result<Pdfium, WorkerError> {
    let bindings = match library_dir {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| WorkerError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of page rendering.
fn render_pages_blocking(
    pdf_path: &Path,
    max_pixels: u32,
    library_dir: Option<&Path>,
) -> Result<Vec<Page>, WorkerError> {
    let pdfium = bind_pdfium(library_dir)?;

    let document =
        pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| WorkerError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: format!("{:?}", e),
            })?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(pages.len() as usize);

    for (index, page) in pages.iter().enumerate() {
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            WorkerError::RasterisationFailed {
                page: index,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            index,
            image.width(),
            image.height()
        );

        results.push(Page { index, image });
    }

    Ok(results)
}
