//! External document engine boundary
//!
//! The viewer core never decodes or rasterizes document content itself. It
//! drives an engine behind these traits: open a document, enumerate pages,
//! rasterize a page into a surface at a transform, and extract per-page text
//! and annotations. Rasterization is a cancellable job polled cooperatively
//! by the scheduler.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::viewer::transform::{DocRect, PageSize, Rotation};

/// Errors from the document engine
#[derive(Clone, Debug, thiserror::Error)]
pub enum EngineError {
    #[error("malformed document: {detail}")]
    Malformed { detail: String },

    #[error("page {page} out of range")]
    PageOutOfRange { page: usize },

    #[error("{detail}")]
    Backend { detail: String },
}

impl EngineError {
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::Malformed {
            detail: detail.into(),
        }
    }

    pub fn backend(detail: impl Into<String>) -> Self {
        Self::Backend {
            detail: detail.into(),
        }
    }
}

/// Why a render job did not produce a surface.
///
/// Cancellation is deliberately a variant here rather than an `EngineError`:
/// a cancelled job is routine and must never surface as a failure.
#[derive(Debug, thiserror::Error)]
pub enum RenderFault {
    #[error("render cancelled")]
    Cancelled,

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl RenderFault {
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Cooperative cancellation flag shared between the viewer and a render job.
///
/// The engine polls the token at safe points; setting it is a request, not a
/// kill signal.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// RGBA raster output of a page render
#[derive(Clone)]
pub struct RasterSurface {
    pub width: u32,
    pub height: u32,
    /// 4 bytes per pixel: R, G, B, A
    pub pixels: Vec<u8>,
}

impl RasterSurface {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }
}

impl std::fmt::Debug for RasterSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterSurface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixels_len", &self.pixels.len())
            .finish_non_exhaustive()
    }
}

/// One run of text with its bounds in document points
#[derive(Clone, Debug, PartialEq)]
pub struct TextFragment {
    pub text: String,
    pub bounds: DocRect,
}

impl TextFragment {
    #[must_use]
    pub fn new(text: impl Into<String>, bounds: DocRect) -> Self {
        Self {
            text: text.into(),
            bounds,
        }
    }
}

/// Navigation target of an annotation
#[derive(Clone, Debug, PartialEq)]
pub enum AnnotationTarget {
    /// Internal page (0-indexed)
    Page(usize),
    /// External URI
    Uri(String),
}

/// Per-page annotation, consumed by the host's annotation renderer
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub bounds: DocRect,
    pub target: Option<AnnotationTarget>,
}

/// Geometry a render job rasterizes at: uniform scale plus the page's
/// effective on-screen rotation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderTransform {
    pub scale: f32,
    pub rotation: Rotation,
}

/// State of an in-flight render job after a poll
#[derive(Debug)]
pub enum JobProgress {
    Pending,
    Finished(RasterSurface),
    Failed(RenderFault),
}

/// A cancellable rasterization job
pub trait RenderJob {
    /// Advance the job at a safe point. A job whose token was cancelled
    /// resolves to `Failed(RenderFault::Cancelled)`.
    fn poll(&mut self) -> JobProgress;
}

/// One page of an opened document
pub trait PageHandle {
    /// Page index within the document (0-indexed)
    fn index(&self) -> usize;

    /// Unscaled page size in document points
    fn size(&self) -> PageSize;

    /// Rotation the page itself is authored at
    fn rotation(&self) -> Rotation;

    /// Start rasterizing this page at `transform`
    fn begin_render(&self, transform: RenderTransform, cancel: CancelToken) -> Box<dyn RenderJob>;

    /// Ordered text runs of the page; order is stable across calls
    fn text_fragments(&self) -> Result<Vec<TextFragment>, EngineError>;

    fn annotations(&self) -> Result<Vec<Annotation>, EngineError>;
}

/// An opened document
pub trait DocumentHandle {
    fn page_count(&self) -> usize;

    fn page(&self, index: usize) -> Result<Box<dyn PageHandle>, EngineError>;
}

/// Byte source for a document, resolved by the host
#[derive(Clone)]
pub enum DocumentSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl std::fmt::Debug for DocumentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
        }
    }
}

/// The external document engine
pub trait DocumentEngine {
    fn open(&self, source: DocumentSource) -> Result<Box<dyn DocumentHandle>, EngineError>;
}
