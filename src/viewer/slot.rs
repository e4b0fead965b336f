//! Per-page slot: render lifecycle, owned layers, in-flight job

use std::sync::Arc;

use crate::engine::{
    Annotation, CancelToken, JobProgress, PageHandle, RasterSurface, RenderJob, RenderTransform,
    TextFragment,
};
use crate::viewer::cache::{RasterCache, RasterKey};
use crate::viewer::overlay::BoundingRegion;
use crate::viewer::transform::{PageGeometry, Viewport};

/// Render lifecycle of a page slot.
///
/// Transitions only advance `Initial -> Running -> Finished`; any
/// geometry-affecting change or cancellation resets back to `Initial`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderPhase {
    #[default]
    Initial,
    Running,
    Finished,
}

/// Highlight span within one text fragment (byte offsets into the fragment's
/// text)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HighlightSpan {
    pub fragment: usize,
    pub start: usize,
    pub end: usize,
    /// True for the currently selected match, false for other matches
    pub selected: bool,
}

/// Outcome of polling the slot's in-flight render job
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotPoll {
    /// No job in flight
    Idle,
    Pending,
    Finished,
    /// Job observed its cancellation token; the slot is back at `Initial`
    Cancelled,
    /// Job failed; the slot is back at `Initial` for a later retry
    Failed,
}

struct ActiveJob {
    job: Box<dyn RenderJob>,
    cancel: CancelToken,
    /// Transform the job was issued at, to detect results that finished
    /// after a viewport change already superseded them
    transform: RenderTransform,
}

/// Per-page state owned by the scheduler: raster surface, text-fragment
/// index, annotations, and overlay geometry.
pub struct PageSlot {
    index: usize,
    page: Box<dyn PageHandle>,
    geometry: PageGeometry,
    viewport: Viewport,
    phase: RenderPhase,
    raster: Option<Arc<RasterSurface>>,
    fragments: Vec<TextFragment>,
    annotations: Vec<Annotation>,
    /// Fragments and annotations are extracted once, on the first successful
    /// render, and kept stable for the life of the slot
    layers_ready: bool,
    regions: Vec<BoundingRegion>,
    highlights: Vec<HighlightSpan>,
    job: Option<ActiveJob>,
}

impl PageSlot {
    /// Bind a slot to a page from the document engine. Does not render.
    #[must_use]
    pub fn attach(index: usize, page: Box<dyn PageHandle>, viewport: Viewport) -> Self {
        let geometry = PageGeometry::new(page.size(), page.rotation());
        Self {
            index,
            page,
            geometry,
            viewport,
            phase: RenderPhase::Initial,
            raster: None,
            fragments: Vec::new(),
            annotations: Vec::new(),
            layers_ready: false,
            regions: Vec::new(),
            highlights: Vec::new(),
            job: None,
        }
    }

    /// Page index within the document (0-indexed)
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    #[must_use]
    pub fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    /// Transform this slot renders at under its current viewport
    #[must_use]
    pub fn transform(&self) -> RenderTransform {
        RenderTransform {
            scale: self.viewport.scale,
            rotation: self.geometry.display_rotation(&self.viewport),
        }
    }

    /// On-screen (width, height) in pixels
    #[must_use]
    pub fn display_size(&self) -> (f32, f32) {
        self.geometry.display_size(&self.viewport)
    }

    #[must_use]
    pub fn raster(&self) -> Option<&Arc<RasterSurface>> {
        self.raster.as_ref()
    }

    #[must_use]
    pub fn fragments(&self) -> &[TextFragment] {
        &self.fragments
    }

    #[must_use]
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    #[must_use]
    pub fn regions(&self) -> &[BoundingRegion] {
        &self.regions
    }

    #[must_use]
    pub fn highlights(&self) -> &[HighlightSpan] {
        &self.highlights
    }

    /// Start rendering. Fails fast (no-op) unless the slot is `Initial`.
    ///
    /// Returns `true` when a raster job is now in flight; `false` when the
    /// call was rejected or satisfied directly from the cache.
    pub fn render(&mut self, cache: &mut RasterCache) -> bool {
        if self.phase != RenderPhase::Initial {
            return false;
        }

        let transform = self.transform();
        if let Some(surface) = cache.get(&RasterKey::new(self.index, &transform)) {
            self.raster = Some(surface);
            self.populate_layers_once();
            self.phase = RenderPhase::Finished;
            return false;
        }

        let cancel = CancelToken::new();
        let job = self.page.begin_render(transform, cancel.clone());
        self.job = Some(ActiveJob {
            job,
            cancel,
            transform,
        });
        self.phase = RenderPhase::Running;
        true
    }

    /// Poll the in-flight raster job at a safe point
    pub fn poll(&mut self, cache: &mut RasterCache) -> SlotPoll {
        let Some(active) = self.job.as_mut() else {
            return SlotPoll::Idle;
        };

        match active.job.poll() {
            JobProgress::Pending => SlotPoll::Pending,
            JobProgress::Finished(surface) => {
                let issued_at = active.transform;
                self.job = None;
                if issued_at != self.transform() {
                    // finished after a viewport change superseded it
                    self.phase = RenderPhase::Initial;
                    return SlotPoll::Cancelled;
                }
                self.raster = Some(cache.insert(RasterKey::new(self.index, &issued_at), surface));
                self.populate_layers_once();
                self.phase = RenderPhase::Finished;
                SlotPoll::Finished
            }
            JobProgress::Failed(fault) if fault.is_cancelled() => {
                self.job = None;
                self.phase = RenderPhase::Initial;
                log::debug!("page {} render cancelled", self.index);
                SlotPoll::Cancelled
            }
            JobProgress::Failed(fault) => {
                self.job = None;
                self.phase = RenderPhase::Initial;
                log::warn!("page {} render failed: {fault}", self.index);
                SlotPoll::Failed
            }
        }
    }

    /// Apply the shared viewport after a zoom/rotation/resize.
    ///
    /// When the render transform actually changed, an in-flight job is told
    /// to cancel and a `Finished` slot drops back to `Initial` (keeping its
    /// raster, fragments and overlays) so the next visibility pass re-renders
    /// it.
    pub fn update_viewport(&mut self, viewport: Viewport) {
        let before = self.transform();
        self.viewport = viewport;
        if self.transform() == before {
            return;
        }

        match self.phase {
            RenderPhase::Running => {
                if let Some(active) = &self.job {
                    active.cancel.cancel();
                }
            }
            RenderPhase::Finished => {
                self.phase = RenderPhase::Initial;
            }
            RenderPhase::Initial => {}
        }
    }

    /// Replace the overlay geometry attached to this page
    pub fn set_regions(&mut self, regions: Vec<BoundingRegion>) {
        self.regions = regions;
    }

    /// Replace the search highlight spans for this page
    pub fn set_highlights(&mut self, highlights: Vec<HighlightSpan>) {
        self.highlights = highlights;
    }

    pub fn clear_highlights(&mut self) {
        self.highlights.clear();
    }

    /// Cancel any in-flight job and release the raster surface and layers
    pub fn destroy(&mut self) {
        if let Some(active) = self.job.take() {
            active.cancel.cancel();
        }
        self.raster = None;
        self.fragments.clear();
        self.annotations.clear();
        self.regions.clear();
        self.highlights.clear();
        self.layers_ready = false;
        self.phase = RenderPhase::Initial;
    }

    fn populate_layers_once(&mut self) {
        if self.layers_ready {
            return;
        }
        match self.page.text_fragments() {
            Ok(fragments) => self.fragments = fragments,
            Err(e) => log::warn!("page {}: text extraction failed: {e}", self.index),
        }
        match self.page.annotations() {
            Ok(annotations) => self.annotations = annotations,
            Err(e) => log::warn!("page {}: annotation extraction failed: {e}", self.index),
        }
        self.layers_ready = true;
    }
}

impl std::fmt::Debug for PageSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageSlot")
            .field("index", &self.index)
            .field("phase", &self.phase)
            .field("fragments", &self.fragments.len())
            .field("regions", &self.regions.len())
            .field("highlights", &self.highlights.len())
            .finish_non_exhaustive()
    }
}
