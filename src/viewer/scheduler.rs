//! Viewport scheduler: visible-range computation and the serialized render
//! queue
//!
//! The scheduler owns the ordered page slots, decides which of them are near
//! the viewport, and drives their raster jobs one at a time. Scroll events
//! are debounced; scale and rotation changes broadcast to every slot before
//! the next visibility pass so no slot renders at a stale transform.

use std::collections::{HashSet, VecDeque};
use std::time::Instant;

use crate::config::ViewerOptions;
use crate::engine::{DocumentHandle, EngineError};
use crate::viewer::cache::RasterCache;
use crate::viewer::slot::{PageSlot, RenderPhase, SlotPoll};
use crate::viewer::transform::{self, ContainerSize, PixelRect, Rotation, Viewport};

/// Results of a scheduler pass, for host consumption
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// First visible page changed (0-indexed)
    CurrentPage(usize),
    PageRendered(usize),
    PageRenderFailed(usize),
}

/// Owns the page slots and schedules their rendering around the viewport
pub struct ViewportScheduler {
    options: ViewerOptions,
    viewport: Viewport,
    slots: Vec<PageSlot>,
    cache: RasterCache,
    scroll_offset: f32,
    pending_visibility: Option<Instant>,
    queue: VecDeque<usize>,
    queued: HashSet<usize>,
    /// Slot with a raster job in flight; at most one at any time
    active: Option<usize>,
    current_page: usize,
    /// Per-page start offsets in content pixels, rebuilt on layout changes
    layout: Vec<f32>,
    content_height: f32,
}

impl ViewportScheduler {
    #[must_use]
    pub fn new(options: ViewerOptions) -> Self {
        let cache = RasterCache::new(options.cache_pages);
        Self {
            options,
            viewport: Viewport::default(),
            slots: Vec::new(),
            cache,
            scroll_offset: 0.0,
            pending_visibility: None,
            queue: VecDeque::new(),
            queued: HashSet::new(),
            active: None,
            current_page: 0,
            layout: Vec::new(),
            content_height: 0.0,
        }
    }

    /// Tear down all slots and build one per page of `document`.
    ///
    /// Full rebuild is the only supported reaction to a document
    /// replacement; slots are never partially invalidated.
    pub fn rebuild(&mut self, document: &dyn DocumentHandle) -> Result<(), EngineError> {
        self.clear();

        let count = document.page_count();
        let mut slots = Vec::with_capacity(count);
        for index in 0..count {
            let page = document.page(index)?;
            slots.push(PageSlot::attach(index, page, self.viewport));
        }
        self.slots = slots;
        self.rebuild_layout();
        self.visibility_pass();
        Ok(())
    }

    /// Destroy every slot and drop all pending work
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.destroy();
        }
        self.slots.clear();
        self.queue.clear();
        self.queued.clear();
        self.active = None;
        self.cache.invalidate_all();
        self.scroll_offset = 0.0;
        self.pending_visibility = None;
        self.current_page = 0;
        self.layout.clear();
        self.content_height = 0.0;
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    #[must_use]
    pub fn scale(&self) -> f32 {
        self.viewport.scale
    }

    #[must_use]
    pub fn rotation(&self) -> Rotation {
        self.viewport.rotation
    }

    /// First visible page (0-indexed), recomputed on every visibility pass
    #[must_use]
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    #[must_use]
    pub fn scroll_offset(&self) -> f32 {
        self.scroll_offset
    }

    /// Total stacked content height in pixels at the current viewport
    #[must_use]
    pub fn content_height(&self) -> f32 {
        self.content_height
    }

    #[must_use]
    pub fn slot(&self, index: usize) -> Option<&PageSlot> {
        self.slots.get(index)
    }

    #[must_use]
    pub fn slot_mut(&mut self, index: usize) -> Option<&mut PageSlot> {
        self.slots.get_mut(index)
    }

    #[must_use]
    pub fn slots(&self) -> &[PageSlot] {
        &self.slots
    }

    /// True when no raster job is in flight and the queue is drained
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.active.is_none() && self.queue.is_empty()
    }

    /// Content offset at which `page` starts
    #[must_use]
    pub fn page_offset(&self, page: usize) -> Option<f32> {
        self.layout.get(page).copied()
    }

    /// Record a scroll position. The visibility recomputation is debounced
    /// against fast scroll bursts; call [`Self::pump`] to let it fire.
    pub fn handle_scroll(&mut self, offset: f32, now: Instant) {
        self.scroll_offset = offset.clamp(0.0, self.max_scroll());
        self.pending_visibility = Some(now + self.options.scroll_debounce());
    }

    /// Jump to a content offset immediately (no debounce)
    pub fn scroll_to(&mut self, offset: f32) -> Vec<SchedulerEvent> {
        self.scroll_offset = offset.clamp(0.0, self.max_scroll());
        self.pending_visibility = None;
        self.visibility_pass()
    }

    /// Scroll so `page` starts at the top of the viewport. Out-of-range
    /// pages are silently ignored.
    pub fn scroll_to_page(&mut self, page: usize) -> Vec<SchedulerEvent> {
        match self.page_offset(page) {
            Some(offset) => self.scroll_to(offset),
            None => Vec::new(),
        }
    }

    pub fn scroll_to_top(&mut self) -> Vec<SchedulerEvent> {
        self.scroll_to(0.0)
    }

    pub fn scroll_to_bottom(&mut self) -> Vec<SchedulerEvent> {
        self.scroll_to(self.max_scroll())
    }

    /// Scroll so the document point `(x, y)` on `page` sits at the top of
    /// the viewport. Out-of-range pages are silently ignored.
    pub fn scroll_to_coordinates(&mut self, page: usize, x: f32, y: f32) -> Vec<SchedulerEvent> {
        let (Some(start), Some(slot)) = (self.page_offset(page), self.slots.get(page)) else {
            return Vec::new();
        };
        let (_, py) = transform::doc_point_to_pixel(x, y, &slot.geometry(), &self.viewport);
        self.scroll_to(start + py)
    }

    /// Bring a pixel rectangle on `page` into view, scrolling only when it
    /// is not already fully visible.
    pub fn scroll_rect_into_view(&mut self, page: usize, rect: PixelRect) -> Vec<SchedulerEvent> {
        let Some(start) = self.page_offset(page) else {
            return Vec::new();
        };
        let top = start + rect.y;
        let bottom = top + rect.height;
        let view_top = self.scroll_offset;
        let view_bottom = view_top + self.viewport.container.height;
        if top >= view_top && bottom <= view_bottom {
            return Vec::new();
        }
        self.scroll_to(top - self.viewport.container.height / 3.0)
    }

    /// Apply a new scale factor, clamped to the configured range
    pub fn set_scale(&mut self, scale: f32) -> Vec<SchedulerEvent> {
        let clamped = self.options.clamp_scale(scale);
        if (clamped - self.viewport.scale).abs() <= f32::EPSILON {
            return Vec::new();
        }
        self.viewport.scale = clamped;
        self.apply_viewport()
    }

    pub fn zoom_in(&mut self) -> Vec<SchedulerEvent> {
        self.set_scale(self.viewport.scale * self.options.zoom_in_rate)
    }

    pub fn zoom_out(&mut self) -> Vec<SchedulerEvent> {
        self.set_scale(self.viewport.scale / self.options.zoom_out_rate)
    }

    pub fn rotate_clockwise(&mut self) -> Vec<SchedulerEvent> {
        self.viewport.rotation = self.viewport.rotation.clockwise();
        self.apply_viewport()
    }

    pub fn rotate_counter_clockwise(&mut self) -> Vec<SchedulerEvent> {
        self.viewport.rotation = self.viewport.rotation.counter_clockwise();
        self.apply_viewport()
    }

    /// Update the scrollable container size
    pub fn resize(&mut self, container: ContainerSize) -> Vec<SchedulerEvent> {
        if self.viewport.container == container {
            return Vec::new();
        }
        self.viewport.container = container;
        // container size never invalidates rendered surfaces, only coverage
        for slot in &mut self.slots {
            slot.update_viewport(self.viewport);
        }
        self.scroll_offset = self.scroll_offset.min(self.max_scroll());
        self.visibility_pass()
    }

    /// Drive pending work: apply a due debounced scroll, poll the active
    /// raster job, and start the next queued one. At most one raster job is
    /// ever in flight.
    pub fn pump(&mut self, now: Instant) -> Vec<SchedulerEvent> {
        let mut events = Vec::new();

        if let Some(due) = self.pending_visibility {
            if now >= due {
                self.pending_visibility = None;
                events.extend(self.visibility_pass());
            }
        }

        if let Some(index) = self.active {
            match self.slots[index].poll(&mut self.cache) {
                SlotPoll::Pending => return events,
                SlotPoll::Finished => {
                    self.active = None;
                    events.push(SchedulerEvent::PageRendered(index));
                }
                SlotPoll::Cancelled => {
                    // superseded by a viewport change; re-cover the range
                    self.active = None;
                    events.extend(self.visibility_pass());
                }
                SlotPoll::Failed => {
                    // slot stays Initial; the next visibility pass retries it
                    self.active = None;
                    events.push(SchedulerEvent::PageRenderFailed(index));
                }
                SlotPoll::Idle => {
                    self.active = None;
                }
            }
        }

        while self.active.is_none() {
            let Some(index) = self.queue.pop_front() else {
                break;
            };
            self.queued.remove(&index);
            if self.slots[index].phase() != RenderPhase::Initial {
                continue;
            }
            if self.slots[index].render(&mut self.cache) {
                self.active = Some(index);
            } else if self.slots[index].phase() == RenderPhase::Finished {
                // satisfied from the raster cache
                events.push(SchedulerEvent::PageRendered(index));
            }
        }

        events
    }

    /// Recompute the visible range, expand it by the prerender margin, and
    /// enqueue every unrendered slot in it
    fn visibility_pass(&mut self) -> Vec<SchedulerEvent> {
        let mut events = Vec::new();
        if self.slots.is_empty() {
            return events;
        }

        let first_visible = self.page_at_offset(self.scroll_offset.max(0.0));
        let last_visible =
            self.page_at_offset((self.scroll_offset + self.viewport.container.height).max(0.0));

        if first_visible != self.current_page {
            self.current_page = first_visible;
            events.push(SchedulerEvent::CurrentPage(first_visible));
        }

        let lo = first_visible.saturating_sub(self.options.prerender_margin);
        let hi = (last_visible + self.options.prerender_margin).min(self.slots.len() - 1);
        for index in lo..=hi {
            if self.slots[index].phase() == RenderPhase::Initial
                && !self.queued.contains(&index)
                && self.active != Some(index)
            {
                self.queue.push_back(index);
                self.queued.insert(index);
            }
        }

        events
    }

    /// Broadcast the viewport to every slot, then run one visibility pass
    fn apply_viewport(&mut self) -> Vec<SchedulerEvent> {
        for slot in &mut self.slots {
            slot.update_viewport(self.viewport);
        }
        self.rebuild_layout();
        self.scroll_offset = self.scroll_offset.min(self.max_scroll());
        self.visibility_pass()
    }

    fn rebuild_layout(&mut self) {
        self.layout.clear();
        let mut offset = 0.0;
        for slot in &self.slots {
            self.layout.push(offset);
            offset += slot.display_size().1 + self.options.page_spacing;
        }
        self.content_height = if self.slots.is_empty() {
            0.0
        } else {
            offset - self.options.page_spacing
        };
    }

    fn page_at_offset(&self, offset: f32) -> usize {
        if self.layout.is_empty() {
            return 0;
        }
        self.layout
            .partition_point(|&start| start <= offset)
            .saturating_sub(1)
    }

    fn max_scroll(&self) -> f32 {
        (self.content_height - self.viewport.container.height).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::engine::DocumentEngine;
    use crate::test_utils::{FakeEngine, FakePageSpec};

    fn scheduler_with_pages(count: usize) -> (ViewportScheduler, crate::test_utils::StatsHandle) {
        let engine = FakeEngine::uniform(count);
        let stats = engine.stats();
        let document = engine
            .open(crate::engine::DocumentSource::Bytes(Vec::new()))
            .expect("fake open");

        let mut scheduler = ViewportScheduler::new(ViewerOptions::default());
        scheduler.resize(ContainerSize::new(800.0, 1000.0));
        scheduler.rebuild(document.as_ref()).expect("rebuild");
        (scheduler, stats)
    }

    fn pump_until_idle(scheduler: &mut ViewportScheduler, now: Instant) -> Vec<SchedulerEvent> {
        let mut events = Vec::new();
        for _ in 0..10_000 {
            events.extend(scheduler.pump(now));
            if scheduler.is_idle() {
                break;
            }
        }
        events
    }

    #[test]
    fn slot_count_matches_page_count_across_viewport_changes() {
        let (mut scheduler, _) = scheduler_with_pages(7);
        assert_eq!(scheduler.page_count(), 7);

        scheduler.set_scale(2.5);
        scheduler.rotate_clockwise();
        scheduler.rotate_clockwise();
        scheduler.set_scale(0.5);
        scheduler.rotate_counter_clockwise();

        assert_eq!(scheduler.page_count(), 7);
    }

    #[test]
    fn initial_pass_renders_visible_range_plus_margin() {
        let (mut scheduler, stats) = scheduler_with_pages(20);
        let now = Instant::now();
        pump_until_idle(&mut scheduler, now);

        // viewport 1000px over 792pt pages: pages 0-1 visible, +2 margin
        let finished: Vec<usize> = (0..20)
            .filter(|&i| scheduler.slot(i).unwrap().phase() == RenderPhase::Finished)
            .collect();
        assert_eq!(finished, vec![0, 1, 2, 3]);
        assert_eq!(stats.started(), 4);
    }

    #[test]
    fn margin_clamps_at_document_edges() {
        let (mut scheduler, _) = scheduler_with_pages(3);
        let now = Instant::now();
        pump_until_idle(&mut scheduler, now);

        for index in 0..3 {
            assert_eq!(
                scheduler.slot(index).unwrap().phase(),
                RenderPhase::Finished
            );
        }
    }

    #[test]
    fn scroll_bursts_are_debounced_into_one_pass() {
        let (mut scheduler, stats) = scheduler_with_pages(40);
        let t0 = Instant::now();
        pump_until_idle(&mut scheduler, t0);
        let rendered_initially = stats.started();

        // 50 scroll events inside the debounce window
        for i in 0..50 {
            let offset = 800.0 + i as f32 * 200.0;
            scheduler.handle_scroll(offset, t0 + Duration::from_millis(i));
            scheduler.pump(t0 + Duration::from_millis(i));
        }
        assert_eq!(stats.started(), rendered_initially);

        // window elapses: exactly one pass runs, at the final offset
        pump_until_idle(&mut scheduler, t0 + Duration::from_millis(200));
        assert_eq!(stats.peak_active(), 1);
        assert_eq!(scheduler.current_page(), scheduler.page_at_offset(scheduler.scroll_offset()));
    }

    #[test]
    fn at_most_one_raster_job_in_flight() {
        let engine = FakeEngine::with_pages(
            (0..12)
                .map(|_| FakePageSpec::letter().with_delay(2))
                .collect(),
        );
        let stats = engine.stats();
        let document = engine
            .open(crate::engine::DocumentSource::Bytes(Vec::new()))
            .expect("fake open");

        let mut scheduler = ViewportScheduler::new(ViewerOptions::default());
        scheduler.resize(ContainerSize::new(800.0, 2000.0));
        scheduler.rebuild(document.as_ref()).expect("rebuild");

        pump_until_idle(&mut scheduler, Instant::now());
        assert!(stats.started() >= 5);
        assert_eq!(stats.peak_active(), 1);
    }

    #[test]
    fn current_page_follows_scroll() {
        let (mut scheduler, _) = scheduler_with_pages(10);
        assert_eq!(scheduler.current_page(), 0);

        let events = scheduler.scroll_to_page(4);
        assert!(events.contains(&SchedulerEvent::CurrentPage(4)));
        assert_eq!(scheduler.current_page(), 4);
    }

    #[test]
    fn out_of_range_page_jump_is_ignored() {
        let (mut scheduler, _) = scheduler_with_pages(3);
        scheduler.scroll_to_page(1);
        let before = scheduler.scroll_offset();

        assert!(scheduler.scroll_to_page(99).is_empty());
        assert_eq!(scheduler.scroll_offset(), before);
    }

    #[test]
    fn viewport_change_mid_flight_cancels_and_re_renders() {
        let engine = FakeEngine::with_pages(vec![FakePageSpec::letter().with_delay(4)]);
        let stats = engine.stats();
        let document = engine
            .open(crate::engine::DocumentSource::Bytes(Vec::new()))
            .expect("fake open");

        let mut scheduler = ViewportScheduler::new(ViewerOptions::default());
        scheduler.resize(ContainerSize::new(800.0, 1000.0));
        scheduler.rebuild(document.as_ref()).expect("rebuild");

        let now = Instant::now();
        scheduler.pump(now); // job for page 0 starts
        assert_eq!(stats.started(), 1);

        scheduler.set_scale(2.0);
        pump_until_idle(&mut scheduler, now);

        assert_eq!(stats.cancelled(), 1);
        assert_eq!(stats.finished(), 1);
        assert_eq!(stats.peak_active(), 1);
        assert_eq!(
            scheduler.slot(0).unwrap().phase(),
            RenderPhase::Finished
        );
        assert_eq!(scheduler.slot(0).unwrap().transform().scale, 2.0);
    }

    #[test]
    fn failed_render_retries_on_next_pass() {
        let engine = FakeEngine::with_pages(vec![FakePageSpec::letter().with_failures(1)]);
        let stats = engine.stats();
        let document = engine
            .open(crate::engine::DocumentSource::Bytes(Vec::new()))
            .expect("fake open");

        let mut scheduler = ViewportScheduler::new(ViewerOptions::default());
        scheduler.resize(ContainerSize::new(800.0, 1000.0));
        scheduler.rebuild(document.as_ref()).expect("rebuild");

        let now = Instant::now();
        let events = pump_until_idle(&mut scheduler, now);
        assert!(events.contains(&SchedulerEvent::PageRenderFailed(0)));
        assert_eq!(scheduler.slot(0).unwrap().phase(), RenderPhase::Initial);

        // next visibility pass (here: an explicit jump) retries and succeeds
        scheduler.scroll_to_top();
        let events = pump_until_idle(&mut scheduler, now);
        assert!(events.contains(&SchedulerEvent::PageRendered(0)));
        assert_eq!(stats.started(), 2);
    }

    #[test]
    fn rebuild_replaces_all_slots() {
        let (mut scheduler, _) = scheduler_with_pages(5);
        pump_until_idle(&mut scheduler, Instant::now());

        let engine = FakeEngine::uniform(2);
        let document = engine
            .open(crate::engine::DocumentSource::Bytes(Vec::new()))
            .expect("fake open");
        scheduler.rebuild(document.as_ref()).expect("rebuild");

        assert_eq!(scheduler.page_count(), 2);
        assert_eq!(scheduler.current_page(), 0);
        assert_eq!(scheduler.scroll_offset(), 0.0);
    }

    #[test]
    fn scroll_rect_into_view_skips_visible_rects() {
        let (mut scheduler, _) = scheduler_with_pages(10);
        scheduler.scroll_to_page(0);
        let before = scheduler.scroll_offset();

        // already on screen: no jitter
        let events = scheduler.scroll_rect_into_view(0, PixelRect::new(10.0, 10.0, 50.0, 20.0));
        assert!(events.is_empty());
        assert_eq!(scheduler.scroll_offset(), before);

        // off-screen: scrolls
        scheduler.scroll_rect_into_view(6, PixelRect::new(10.0, 10.0, 50.0, 20.0));
        assert_ne!(scheduler.scroll_offset(), before);
    }
}
