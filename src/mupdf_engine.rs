//! MuPDF-backed document engine
//!
//! Implements the engine boundary over the `mupdf` crate. Rasterization is
//! synchronous inside the job: the cancellation token is checked before the
//! raster starts, and the finished surface is handed back on the first poll.

use mupdf::text_page::TextBlockType;
use mupdf::{Colorspace, Document, Matrix, Page, TextPageFlags};

use crate::engine::{
    Annotation, AnnotationTarget, CancelToken, DocumentEngine, DocumentHandle, DocumentSource,
    EngineError, JobProgress, PageHandle, RasterSurface, RenderFault, RenderJob, RenderTransform,
    TextFragment,
};
use crate::viewer::transform::{DocRect, PageSize, Rotation};

/// Document engine over MuPDF
#[derive(Clone, Copy, Debug, Default)]
pub struct MupdfEngine;

impl MupdfEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl DocumentEngine for MupdfEngine {
    fn open(&self, source: DocumentSource) -> Result<Box<dyn DocumentHandle>, EngineError> {
        let doc = match source {
            DocumentSource::Path(path) => Document::open(path.to_string_lossy().as_ref()),
            DocumentSource::Bytes(bytes) => Document::from_bytes(&bytes, "pdf"),
        }
        .map_err(|e| EngineError::malformed(e.to_string()))?;

        let page_count = doc
            .page_count()
            .map_err(|e| EngineError::malformed(e.to_string()))? as usize;

        Ok(Box::new(MupdfDocument { doc, page_count }))
    }
}

struct MupdfDocument {
    doc: Document,
    page_count: usize,
}

impl DocumentHandle for MupdfDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page(&self, index: usize) -> Result<Box<dyn PageHandle>, EngineError> {
        if index >= self.page_count {
            return Err(EngineError::PageOutOfRange { page: index });
        }
        let page = self
            .doc
            .load_page(index as i32)
            .map_err(|e| EngineError::backend(e.to_string()))?;
        let bounds = page
            .bounds()
            .map_err(|e| EngineError::backend(e.to_string()))?;

        Ok(Box::new(MupdfPage {
            page,
            index,
            size: PageSize::new(bounds.x1 - bounds.x0, bounds.y1 - bounds.y0),
        }))
    }
}

struct MupdfPage {
    page: Page,
    index: usize,
    size: PageSize,
}

impl PageHandle for MupdfPage {
    fn index(&self) -> usize {
        self.index
    }

    fn size(&self) -> PageSize {
        self.size
    }

    fn rotation(&self) -> Rotation {
        // MuPDF folds /Rotate into the page bounds already
        Rotation::R0
    }

    fn begin_render(&self, transform: RenderTransform, cancel: CancelToken) -> Box<dyn RenderJob> {
        let result = if cancel.is_cancelled() {
            Err(RenderFault::Cancelled)
        } else {
            rasterize(&self.page, self.size, transform).map_err(RenderFault::Engine)
        };
        Box::new(ImmediateJob {
            result: Some(result),
        })
    }

    fn text_fragments(&self) -> Result<Vec<TextFragment>, EngineError> {
        let text_page = self
            .page
            .to_text_page(TextPageFlags::empty())
            .map_err(|e| EngineError::backend(e.to_string()))?;

        let mut fragments = Vec::new();
        for block in text_page.blocks() {
            if block.r#type() != TextBlockType::Text {
                continue;
            }
            for line in block.lines() {
                let mut text = String::new();
                for ch in line.chars() {
                    if let Some(c) = ch.char() {
                        text.push(c);
                    }
                }
                if text.is_empty() {
                    continue;
                }
                let bbox = line.bounds();
                fragments.push(TextFragment {
                    text,
                    bounds: device_rect_to_doc(
                        bbox.x0,
                        bbox.y0,
                        bbox.x1,
                        bbox.y1,
                        self.size.height,
                    ),
                });
            }
        }
        Ok(fragments)
    }

    fn annotations(&self) -> Result<Vec<Annotation>, EngineError> {
        let Ok(links) = self.page.links() else {
            return Ok(Vec::new());
        };

        let annotations = links
            .filter_map(|link| {
                let target = if let Some(dest) = link.dest {
                    Some(AnnotationTarget::Page(dest.loc.page_number as usize))
                } else if !link.uri.is_empty() {
                    Some(AnnotationTarget::Uri(link.uri.clone()))
                } else {
                    None
                };

                let rect = link.bounds;
                if rect.is_empty() {
                    return None;
                }

                Some(Annotation {
                    bounds: device_rect_to_doc(
                        rect.x0,
                        rect.y0,
                        rect.x1,
                        rect.y1,
                        self.size.height,
                    ),
                    target,
                })
            })
            .collect();

        Ok(annotations)
    }
}

/// Job whose raster finished synchronously; resolves on the first poll
struct ImmediateJob {
    result: Option<Result<RasterSurface, RenderFault>>,
}

impl RenderJob for ImmediateJob {
    fn poll(&mut self) -> JobProgress {
        match self.result.take() {
            Some(Ok(surface)) => JobProgress::Finished(surface),
            Some(Err(fault)) => JobProgress::Failed(fault),
            None => JobProgress::Failed(RenderFault::Cancelled),
        }
    }
}

fn rasterize(
    page: &Page,
    size: PageSize,
    transform: RenderTransform,
) -> Result<RasterSurface, EngineError> {
    let matrix = matrix_for(size, transform);
    let rgb = Colorspace::device_rgb();
    let pixmap = page
        .to_pixmap(&matrix, &rgb, false, false)
        .map_err(|e| EngineError::backend(e.to_string()))?;

    surface_from_pixmap(&pixmap)
}

/// Scale plus quarter-turn rotation, translated back into positive device
/// coordinates
fn matrix_for(size: PageSize, transform: RenderTransform) -> Matrix {
    let s = transform.scale;
    let w = size.width;
    let h = size.height;
    match transform.rotation {
        Rotation::R0 => Matrix::new(s, 0.0, 0.0, s, 0.0, 0.0),
        Rotation::R90 => Matrix::new(0.0, s, -s, 0.0, h * s, 0.0),
        Rotation::R180 => Matrix::new(-s, 0.0, 0.0, -s, w * s, h * s),
        Rotation::R270 => Matrix::new(0.0, -s, s, 0.0, 0.0, w * s),
    }
}

/// MuPDF line/link rects are top-left origin with Y down; document space is
/// bottom-left origin with Y up
fn device_rect_to_doc(x0: f32, y0: f32, x1: f32, y1: f32, page_height: f32) -> DocRect {
    let left = x0.min(x1);
    let right = x0.max(x1);
    let top = y0.min(y1);
    let bottom = y0.max(y1);
    DocRect::new(left, page_height - bottom, right - left, bottom - top)
}

fn surface_from_pixmap(pixmap: &mupdf::Pixmap) -> Result<RasterSurface, EngineError> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(EngineError::backend(format!(
            "unsupported pixmap format: {n} channels"
        )));
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;
    if samples.len() < stride.saturating_mul(height) || row_bytes > stride {
        return Err(EngineError::backend("pixmap buffer size mismatch"));
    }

    let mut pixels = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        let row_start = y * stride;
        let row = &samples[row_start..row_start + row_bytes];
        for px in row.chunks_exact(n) {
            pixels.extend_from_slice(&px[..3]);
            pixels.push(0xFF);
        }
    }

    Ok(RasterSurface {
        width: pixmap.width(),
        height: pixmap.height(),
        pixels,
    })
}
