//! `DocumentView`: the host-facing surface of the viewer core
//!
//! Owns the engine, the opened document, and the collaborating subsystems
//! (scheduler, search, overlays, presentation), and exposes the operation
//! set a host toolbar drives. Host work is pumped: every call that scrolls
//! or renders reports back through a flat [`ViewerEvent`] stream.

use std::time::Instant;

use crate::config::ViewerOptions;
use crate::engine::{DocumentEngine, DocumentHandle, DocumentSource, EngineError};
use crate::viewer::overlay::{BoundingRegion, RegionDraw, RegionStyle};
use crate::viewer::presentation::PresentationSession;
use crate::viewer::scheduler::{SchedulerEvent, ViewportScheduler};
use crate::viewer::search::{MatchStatus, SearchEngine, SearchOptions};
use crate::viewer::slot::PageSlot;
use crate::viewer::transform::{self, ContainerSize, Rotation};

/// Host-visible notifications drained by [`DocumentView::pump`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewerEvent {
    /// First visible page changed (0-indexed)
    CurrentPage(usize),
    PageRendered(usize),
    PageRenderFailed(usize),
    SearchUpdated(MatchStatus),
}

/// The viewer core: a virtualized, searchable, annotatable document view
pub struct DocumentView<E: DocumentEngine> {
    engine: E,
    options: ViewerOptions,
    document: Option<Box<dyn DocumentHandle>>,
    load_error: Option<EngineError>,
    scheduler: ViewportScheduler,
    search: SearchEngine,
    draw: RegionDraw,
    regions: Vec<BoundingRegion>,
    presentation: PresentationSession,
    pending: Vec<ViewerEvent>,
}

impl<E: DocumentEngine> DocumentView<E> {
    #[must_use]
    pub fn new(engine: E, options: ViewerOptions) -> Self {
        let scheduler = ViewportScheduler::new(options.clone());
        Self {
            engine,
            options,
            document: None,
            load_error: None,
            scheduler,
            search: SearchEngine::new(),
            draw: RegionDraw::new(),
            regions: Vec::new(),
            presentation: PresentationSession::default(),
            pending: Vec::new(),
        }
    }

    /// Open a document, replacing any prior one. The old document and all
    /// of its page slots are torn down first. A failure leaves the viewer
    /// in a terminal error state until the next successful load.
    pub fn load(&mut self, source: DocumentSource) -> Result<(), EngineError> {
        self.teardown();

        let document = match self.engine.open(source) {
            Ok(document) => document,
            Err(e) => {
                log::warn!("document open failed: {e}");
                self.load_error = Some(e.clone());
                return Err(e);
            }
        };

        if let Err(e) = self.scheduler.rebuild(document.as_ref()) {
            log::warn!("document load failed: {e}");
            self.scheduler.clear();
            self.load_error = Some(e.clone());
            return Err(e);
        }

        self.presentation = PresentationSession::new(document.page_count());
        self.document = Some(document);
        self.apply_regions();
        Ok(())
    }

    fn teardown(&mut self) {
        self.scheduler.clear();
        self.search.clear_index();
        self.draw.cancel();
        self.document = None;
        self.load_error = None;
        self.pending.clear();
    }

    /// Terminal load failure, if any
    #[must_use]
    pub fn load_error(&self) -> Option<&EngineError> {
        self.load_error.as_ref()
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.scheduler.page_count()
    }

    /// First visible page (0-indexed)
    #[must_use]
    pub fn current_page(&self) -> usize {
        self.scheduler.current_page()
    }

    #[must_use]
    pub fn scale(&self) -> f32 {
        self.scheduler.scale()
    }

    #[must_use]
    pub fn rotation(&self) -> Rotation {
        self.scheduler.rotation()
    }

    /// Current scroll position in content pixels
    #[must_use]
    pub fn scroll_offset(&self) -> f32 {
        self.scheduler.scroll_offset()
    }

    #[must_use]
    pub fn slot(&self, index: usize) -> Option<&PageSlot> {
        self.scheduler.slot(index)
    }

    #[must_use]
    pub fn slots(&self) -> &[PageSlot] {
        self.scheduler.slots()
    }

    /// `None` until a non-empty query has run; `Some` with zero totals for
    /// a query that found nothing
    #[must_use]
    pub fn match_status(&self) -> Option<MatchStatus> {
        self.search.status()
    }

    #[must_use]
    pub fn search_in_progress(&self) -> bool {
        self.search.in_progress()
    }

    #[must_use]
    pub fn regions(&self) -> &[BoundingRegion] {
        &self.regions
    }

    #[must_use]
    pub fn presentation(&self) -> &PresentationSession {
        &self.presentation
    }

    #[must_use]
    pub fn presentation_mut(&mut self) -> &mut PresentationSession {
        &mut self.presentation
    }

    /// True when no render work is queued or in flight
    #[must_use]
    pub fn is_render_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    /// Drive pending work and drain accumulated events
    pub fn pump(&mut self, now: Instant) -> Vec<ViewerEvent> {
        let scheduled = self.scheduler.pump(now);
        self.absorb(scheduled);
        std::mem::take(&mut self.pending)
    }

    pub fn zoom_in(&mut self) {
        let events = self.scheduler.zoom_in();
        self.absorb(events);
    }

    pub fn zoom_out(&mut self) {
        let events = self.scheduler.zoom_out();
        self.absorb(events);
    }

    pub fn set_scale(&mut self, scale: f32) {
        let events = self.scheduler.set_scale(scale);
        self.absorb(events);
    }

    pub fn rotate_clockwise(&mut self) {
        let events = self.scheduler.rotate_clockwise();
        self.absorb(events);
    }

    pub fn rotate_counter_clockwise(&mut self) {
        let events = self.scheduler.rotate_counter_clockwise();
        self.absorb(events);
    }

    /// Jump to a page (0-indexed); out-of-range values are silently ignored
    pub fn go_to_page(&mut self, page: usize) {
        let events = self.scheduler.scroll_to_page(page);
        self.absorb(events);
    }

    /// Record a scroll position; the visibility pass is debounced
    pub fn handle_scroll(&mut self, offset: f32, now: Instant) {
        self.scheduler.handle_scroll(offset, now);
    }

    pub fn resize(&mut self, container: ContainerSize) {
        let events = self.scheduler.resize(container);
        self.absorb(events);
    }

    /// Scroll so the document point `(x, y)` on `page` is at the top of the
    /// viewport
    pub fn scroll_to_coordinates(&mut self, page: usize, x: f32, y: f32) {
        let events = self.scheduler.scroll_to_coordinates(page, x, y);
        self.absorb(events);
    }

    pub fn scroll_to_top(&mut self) {
        let events = self.scheduler.scroll_to_top();
        self.absorb(events);
    }

    pub fn scroll_to_bottom(&mut self) {
        let events = self.scheduler.scroll_to_bottom();
        self.absorb(events);
    }

    /// Run a query across the whole document. Extracts and caches page text
    /// on the first search after a load.
    pub fn search(&mut self, query: &str, options: SearchOptions) -> MatchStatus {
        let Some(document) = self.document.as_ref() else {
            return MatchStatus::default();
        };
        self.search.ensure_indexed(document.as_ref());

        let status = self.search.search(query, options);
        self.apply_highlights();
        self.scroll_current_match_into_view();
        self.pending.push(ViewerEvent::SearchUpdated(status));
        status
    }

    pub fn search_next(&mut self) -> MatchStatus {
        let status = self.search.next();
        self.apply_highlights();
        self.scroll_current_match_into_view();
        self.pending.push(ViewerEvent::SearchUpdated(status));
        status
    }

    pub fn search_previous(&mut self) -> MatchStatus {
        let status = self.search.previous();
        self.apply_highlights();
        self.scroll_current_match_into_view();
        self.pending.push(ViewerEvent::SearchUpdated(status));
        status
    }

    /// Forget the query and restore every touched fragment
    pub fn clear_search(&mut self) {
        self.search.clear();
        for index in 0..self.scheduler.page_count() {
            if let Some(slot) = self.scheduler.slot_mut(index) {
                slot.clear_highlights();
            }
        }
        self.pending
            .push(ViewerEvent::SearchUpdated(MatchStatus::default()));
    }

    /// Replace the overlay regions shown across the document
    pub fn update_bounding_boxes(&mut self, regions: Vec<BoundingRegion>) {
        self.regions = regions;
        self.apply_regions();
    }

    /// Enable or disable interactive region drawing
    pub fn set_draw_mode(&mut self, enabled: bool) {
        self.draw.set_enabled(enabled);
    }

    #[must_use]
    pub fn draw_mode(&self) -> bool {
        self.draw.is_enabled()
    }

    /// Start a region drag at a pixel position on `page`
    pub fn draw_begin(&mut self, page: usize, x: f32, y: f32) {
        if page < self.scheduler.page_count() {
            self.draw.begin(page, x, y);
        }
    }

    pub fn draw_update(&mut self, x: f32, y: f32) {
        self.draw.update(x, y);
    }

    /// Finish the drag, anchoring the drawn rectangle in document space.
    /// Returns the new region, which is also added to the overlay set.
    pub fn draw_finish(&mut self, style: RegionStyle) -> Option<BoundingRegion> {
        let (page, _) = self.draw.preview()?;
        let geometry = self.scheduler.slot(page)?.geometry();
        let viewport = *self.scheduler.viewport();
        let region = self.draw.finish(&geometry, &viewport, style)?;

        self.regions.push(region.clone());
        self.apply_regions();
        Some(region)
    }

    pub fn draw_cancel(&mut self) {
        self.draw.cancel();
    }

    fn absorb(&mut self, events: Vec<SchedulerEvent>) {
        for event in events {
            let lifted = match event {
                SchedulerEvent::CurrentPage(page) => ViewerEvent::CurrentPage(page),
                SchedulerEvent::PageRendered(page) => {
                    self.refresh_page_highlights(page);
                    ViewerEvent::PageRendered(page)
                }
                SchedulerEvent::PageRenderFailed(page) => ViewerEvent::PageRenderFailed(page),
            };
            self.pending.push(lifted);
        }
    }

    /// Push current highlight spans into a freshly rendered slot
    fn refresh_page_highlights(&mut self, page: usize) {
        let spans = self.search.highlights_for_page(page);
        if let Some(slot) = self.scheduler.slot_mut(page) {
            slot.set_highlights(spans);
        }
    }

    fn apply_highlights(&mut self) {
        for page in 0..self.scheduler.page_count() {
            self.refresh_page_highlights(page);
        }
    }

    fn apply_regions(&mut self) {
        for page in 0..self.scheduler.page_count() {
            let for_page: Vec<BoundingRegion> = self
                .regions
                .iter()
                .filter(|region| region.page == page)
                .cloned()
                .collect();
            if let Some(slot) = self.scheduler.slot_mut(page) {
                slot.set_regions(for_page);
            }
        }
    }

    fn scroll_current_match_into_view(&mut self) {
        let Some(record) = self.search.current_match() else {
            return;
        };
        let page = record.page;
        let Some(anchor) = self.search.match_anchor(record) else {
            let events = self.scheduler.scroll_to_page(page);
            self.absorb(events);
            return;
        };
        let Some(slot) = self.scheduler.slot(page) else {
            return;
        };
        let rect = transform::to_viewport(anchor, &slot.geometry(), self.scheduler.viewport());
        let events = self.scheduler.scroll_rect_into_view(page, rect);
        self.absorb(events);
    }
}

impl<E: DocumentEngine> std::fmt::Debug for DocumentView<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentView")
            .field("pages", &self.page_count())
            .field("current_page", &self.current_page())
            .field("scale", &self.scale())
            .field("rotation", &self.rotation())
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}
