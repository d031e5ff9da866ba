//! Document backend: per-page text, embedded image count, geometry and a
//! PNG raster, read through pdfium.
//!
//! pdfium blocks on CPU-heavy work, so each open document gets one worker
//! inside `tokio::task::spawn_blocking` that binds `Pdfium`, parses the file
//! once and renders pages as they are requested over a channel. Pages are
//! loaded one at a time; a 300-page document never holds more than one
//! raster in memory.

use crate::config::ExtractionConfig;
use crate::error::TriageError;
use crate::pipeline::encode::encode_png;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// Everything the pipeline needs to know about one page.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// 1-indexed page number.
    pub number: usize,
    /// Plain text from the document's text layer.
    pub text: String,
    /// Embedded raster images on the page.
    pub image_count: usize,
    /// Page size in points.
    pub width_pt: f64,
    pub height_pt: f64,
    /// PNG raster of the page.
    pub png: Arc<[u8]>,
}

impl RenderedPage {
    /// Page area in square points.
    pub fn area(&self) -> f64 {
        self.width_pt * self.height_pt
    }
}

/// A paginated document that can hand out pages on demand.
#[async_trait]
pub trait PageSource: Send + Sync {
    fn page_count(&self) -> usize;

    /// Load page `number` (1-indexed).
    async fn load_page(&self, number: usize) -> Result<RenderedPage, TriageError>;
}

type PageReply = oneshot::Sender<Result<RenderedPage, TriageError>>;

/// Raster settings handed to the worker.
#[derive(Debug, Clone, Copy)]
struct RenderSettings {
    dpi: u32,
    max_pixels: u32,
}

/// A PDF on disk read through pdfium.
///
/// Opening the document starts one blocking worker that binds pdfium, parses
/// the file once and then renders pages on request. The worker stops when the
/// `PdfiumDocument` is dropped.
#[derive(Debug)]
pub struct PdfiumDocument {
    path: PathBuf,
    page_count: usize,
    requests: mpsc::Sender<(usize, PageReply)>,
}

impl PdfiumDocument {
    /// Open the PDF, checking it loads, and count its pages.
    pub async fn open(path: &Path, config: &ExtractionConfig) -> Result<Self, TriageError> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (requests, request_rx) = mpsc::channel(1);
        let owned = path.to_path_buf();
        let password = config.password.clone();
        let settings = RenderSettings {
            dpi: config.dpi,
            max_pixels: config.max_rendered_pixels,
        };

        tokio::task::spawn_blocking(move || {
            serve_pages(owned, password, settings, ready_tx, request_rx)
        });
        let page_count = ready_rx.await.map_err(|_| {
            TriageError::Internal("pdfium worker exited before opening the document".to_string())
        })??;

        info!("PDF loaded: {} ({} pages)", path.display(), page_count);
        Ok(Self {
            path: path.to_path_buf(),
            page_count,
            requests,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PageSource for PdfiumDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    async fn load_page(&self, number: usize) -> Result<RenderedPage, TriageError> {
        if number == 0 || number > self.page_count {
            return Err(TriageError::PageOutOfRange {
                page: number,
                total: self.page_count,
            });
        }
        let stopped = || TriageError::Internal("pdfium worker has stopped".to_string());
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests
            .send((number, reply_tx))
            .await
            .map_err(|_| stopped())?;
        reply_rx.await.map_err(|_| stopped())?
    }
}

/// Worker loop: open the document once, then render pages until every
/// request sender is gone.
fn serve_pages(
    path: PathBuf,
    password: Option<String>,
    settings: RenderSettings,
    ready: oneshot::Sender<Result<usize, TriageError>>,
    mut requests: mpsc::Receiver<(usize, PageReply)>,
) {
    let pdfium = match bind_pdfium() {
        Ok(p) => p,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let document = match load_document(&pdfium, &path, password.as_deref()) {
        Ok(d) => d,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    if ready.send(Ok(document.pages().len() as usize)).is_err() {
        return;
    }

    while let Some((number, reply)) = requests.blocking_recv() {
        let _ = reply.send(render_page(&document, number, settings));
    }
    debug!("pdfium worker for {} finished", path.display());
}

fn render_page(
    document: &PdfDocument<'_>,
    number: usize,
    settings: RenderSettings,
) -> Result<RenderedPage, TriageError> {
    let raster_err = |e: PdfiumError| TriageError::RasterisationFailed {
        page: number,
        detail: format!("{:?}", e),
    };

    let page = document
        .pages()
        .get((number - 1) as PdfPageIndex)
        .map_err(raster_err)?;

    let text = page.text().map_err(raster_err)?.all();
    let image_count = page
        .objects()
        .iter()
        .filter(|o| o.object_type() == PdfPageObjectType::Image)
        .count();
    let width_pt = page.width().value as f64;
    let height_pt = page.height().value as f64;

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(settings.dpi as f32 / 72.0)
        .set_maximum_width(settings.max_pixels as i32)
        .set_maximum_height(settings.max_pixels as i32);
    let bitmap = page.render_with_config(&render_config).map_err(raster_err)?;
    let image = bitmap.as_image();
    let png = encode_png(&image).map_err(|e| TriageError::RasterisationFailed {
        page: number,
        detail: format!("PNG encoding failed: {}", e),
    })?;

    debug!(
        "Page {}: {} chars, {} images, {:.0}x{:.0}pt → {}x{} px",
        number,
        text.chars().count(),
        image_count,
        width_pt,
        height_pt,
        image.width(),
        image.height()
    );

    Ok(RenderedPage {
        number,
        text,
        image_count,
        width_pt,
        height_pt,
        png: Arc::from(png),
    })
}

/// Bind pdfium from, in order: `PDFIUM_LIB_PATH` (a library file or the
/// directory holding it), the working directory, the system library.
fn bind_pdfium() -> Result<Pdfium, TriageError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(p) if !p.is_empty() => {
            let path = PathBuf::from(p);
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            Pdfium::bind_to_library(lib)
        }
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| TriageError::PdfiumBindingFailed(e.to_string()))?;
    Ok(Pdfium::new(bindings))
}

fn load_document<'a>(
    pdfium: &'a Pdfium,
    path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, TriageError> {
    pdfium.load_pdf_from_file(path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                TriageError::WrongPassword {
                    path: path.to_path_buf(),
                }
            } else {
                TriageError::PasswordRequired {
                    path: path.to_path_buf(),
                }
            }
        } else {
            TriageError::CorruptPdf {
                path: path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}
