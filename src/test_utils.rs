//! Test doubles for driving the viewer without a real document engine
//!
//! `FakeEngine` scripts per-page sizes, rotations, text fragments, render
//! delays (polls spent pending) and failure injection, and counts render
//! activity so tests can assert scheduling invariants like
//! "at most one raster job in flight".

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use crate::engine::{
    Annotation, CancelToken, DocumentEngine, DocumentHandle, DocumentSource, EngineError,
    JobProgress, PageHandle, RasterSurface, RenderFault, RenderJob, RenderTransform, TextFragment,
};
use crate::viewer::transform::{DocRect, PageSize, Rotation};
use crate::viewer::{DocumentView, ViewerEvent};

/// Script for one fake page
#[derive(Clone, Debug)]
pub struct FakePageSpec {
    pub width: f32,
    pub height: f32,
    pub rotation: Rotation,
    pub fragments: Vec<TextFragment>,
    /// Polls a render job spends pending before resolving
    pub render_delay: usize,
    /// First N render jobs for this page fail
    pub fail_renders: usize,
}

impl FakePageSpec {
    /// US letter page, renders instantly, no text
    #[must_use]
    pub fn letter() -> Self {
        Self {
            width: 612.0,
            height: 792.0,
            rotation: Rotation::R0,
            fragments: Vec::new(),
            render_delay: 0,
            fail_renders: 0,
        }
    }

    /// Attach one text fragment per line, stacked down the page
    #[must_use]
    pub fn with_text(mut self, lines: &[&str]) -> Self {
        self.fragments = lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                TextFragment::new(
                    *line,
                    DocRect::new(72.0, 700.0 - 20.0 * i as f32, 400.0, 14.0),
                )
            })
            .collect();
        self
    }

    #[must_use]
    pub fn with_delay(mut self, polls: usize) -> Self {
        self.render_delay = polls;
        self
    }

    #[must_use]
    pub fn with_failures(mut self, count: usize) -> Self {
        self.fail_renders = count;
        self
    }

    #[must_use]
    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    #[must_use]
    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

#[derive(Debug, Default)]
struct RenderStats {
    started: AtomicUsize,
    finished: AtomicUsize,
    cancelled: AtomicUsize,
    failed: AtomicUsize,
    active: AtomicUsize,
    peak_active: AtomicUsize,
    text_extractions: AtomicUsize,
}

impl RenderStats {
    fn job_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
        let active = self.active.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_active.fetch_max(active, Ordering::Relaxed);
    }

    fn job_ended(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Shared view of the engine's render counters
#[derive(Clone, Debug)]
pub struct StatsHandle(Arc<RenderStats>);

impl StatsHandle {
    #[must_use]
    pub fn started(&self) -> usize {
        self.0.started.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn finished(&self) -> usize {
        self.0.finished.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn cancelled(&self) -> usize {
        self.0.cancelled.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.0.failed.load(Ordering::Relaxed)
    }

    /// Render jobs currently in flight
    #[must_use]
    pub fn active(&self) -> usize {
        self.0.active.load(Ordering::Relaxed)
    }

    /// Highest number of simultaneously in-flight render jobs observed
    #[must_use]
    pub fn peak_active(&self) -> usize {
        self.0.peak_active.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn text_extractions(&self) -> usize {
        self.0.text_extractions.load(Ordering::Relaxed)
    }
}

/// Scriptable in-memory document engine
pub struct FakeEngine {
    pages: Vec<FakePageSpec>,
    stats: Arc<RenderStats>,
    fail_open: Option<String>,
}

impl FakeEngine {
    #[must_use]
    pub fn with_pages(pages: Vec<FakePageSpec>) -> Self {
        Self {
            pages,
            stats: Arc::new(RenderStats::default()),
            fail_open: None,
        }
    }

    /// `count` identical letter pages
    #[must_use]
    pub fn uniform(count: usize) -> Self {
        Self::with_pages((0..count).map(|_| FakePageSpec::letter()).collect())
    }

    /// Engine whose `open` always fails with a malformed-document error
    #[must_use]
    pub fn failing_open(detail: &str) -> Self {
        Self {
            pages: Vec::new(),
            stats: Arc::new(RenderStats::default()),
            fail_open: Some(detail.to_string()),
        }
    }

    #[must_use]
    pub fn stats(&self) -> StatsHandle {
        StatsHandle(self.stats.clone())
    }
}

impl DocumentEngine for FakeEngine {
    fn open(&self, _source: DocumentSource) -> Result<Box<dyn DocumentHandle>, EngineError> {
        if let Some(detail) = &self.fail_open {
            return Err(EngineError::malformed(detail.clone()));
        }
        Ok(Box::new(FakeDocument {
            pages: Arc::new(self.pages.clone()),
            stats: self.stats.clone(),
            attempts: Arc::new((0..self.pages.len()).map(|_| AtomicUsize::new(0)).collect()),
        }))
    }
}

struct FakeDocument {
    pages: Arc<Vec<FakePageSpec>>,
    stats: Arc<RenderStats>,
    /// Render attempts per page, for failure injection
    attempts: Arc<Vec<AtomicUsize>>,
}

impl DocumentHandle for FakeDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page(&self, index: usize) -> Result<Box<dyn PageHandle>, EngineError> {
        let spec = self
            .pages
            .get(index)
            .cloned()
            .ok_or(EngineError::PageOutOfRange { page: index })?;
        Ok(Box::new(FakePage {
            index,
            spec,
            stats: self.stats.clone(),
            attempts: self.attempts.clone(),
        }))
    }
}

/// One scripted page. Can also be built standalone for slot-level tests.
pub struct FakePage {
    index: usize,
    spec: FakePageSpec,
    stats: Arc<RenderStats>,
    attempts: Arc<Vec<AtomicUsize>>,
}

impl FakePage {
    #[must_use]
    pub fn new(index: usize, spec: FakePageSpec) -> Self {
        Self {
            index,
            spec,
            stats: Arc::new(RenderStats::default()),
            attempts: Arc::new(vec![AtomicUsize::new(0)]),
        }
    }

    #[must_use]
    pub fn stats(&self) -> StatsHandle {
        StatsHandle(self.stats.clone())
    }

    fn attempt_counter(&self) -> &AtomicUsize {
        self.attempts.get(self.index).unwrap_or(&self.attempts[0])
    }
}

impl PageHandle for FakePage {
    fn index(&self) -> usize {
        self.index
    }

    fn size(&self) -> PageSize {
        PageSize::new(self.spec.width, self.spec.height)
    }

    fn rotation(&self) -> Rotation {
        self.spec.rotation
    }

    fn begin_render(&self, transform: RenderTransform, cancel: CancelToken) -> Box<dyn RenderJob> {
        self.stats.job_started();
        let attempt = self.attempt_counter().fetch_add(1, Ordering::Relaxed);

        let (width, height) = if transform.rotation.swaps_axes() {
            (
                self.spec.height * transform.scale,
                self.spec.width * transform.scale,
            )
        } else {
            (
                self.spec.width * transform.scale,
                self.spec.height * transform.scale,
            )
        };

        Box::new(FakeRenderJob {
            remaining: self.spec.render_delay,
            fail: attempt < self.spec.fail_renders,
            cancel,
            stats: self.stats.clone(),
            width: width.round().max(1.0) as u32,
            height: height.round().max(1.0) as u32,
            done: false,
        })
    }

    fn text_fragments(&self) -> Result<Vec<TextFragment>, EngineError> {
        self.stats.text_extractions.fetch_add(1, Ordering::Relaxed);
        Ok(self.spec.fragments.clone())
    }

    fn annotations(&self) -> Result<Vec<Annotation>, EngineError> {
        Ok(Vec::new())
    }
}

struct FakeRenderJob {
    remaining: usize,
    fail: bool,
    cancel: CancelToken,
    stats: Arc<RenderStats>,
    width: u32,
    height: u32,
    done: bool,
}

impl RenderJob for FakeRenderJob {
    fn poll(&mut self) -> JobProgress {
        if self.done {
            return JobProgress::Failed(RenderFault::Engine(EngineError::backend(
                "job polled after completion",
            )));
        }
        if self.cancel.is_cancelled() {
            self.done = true;
            self.stats.cancelled.fetch_add(1, Ordering::Relaxed);
            self.stats.job_ended();
            return JobProgress::Failed(RenderFault::Cancelled);
        }
        if self.remaining > 0 {
            self.remaining -= 1;
            return JobProgress::Pending;
        }

        self.done = true;
        self.stats.job_ended();
        if self.fail {
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
            JobProgress::Failed(RenderFault::Engine(EngineError::backend(
                "scripted render failure",
            )))
        } else {
            self.stats.finished.fetch_add(1, Ordering::Relaxed);
            JobProgress::Finished(RasterSurface::new(self.width, self.height))
        }
    }
}

impl Drop for FakeRenderJob {
    fn drop(&mut self) {
        // jobs abandoned without a final poll still release their slot
        if !self.done {
            if self.cancel.is_cancelled() {
                self.stats.cancelled.fetch_add(1, Ordering::Relaxed);
            }
            self.stats.job_ended();
        }
    }
}

/// Pump a view until its render queue drains, collecting events
pub fn pump_view_until_idle(view: &mut DocumentView<FakeEngine>, now: Instant) -> Vec<ViewerEvent> {
    let mut events = Vec::new();
    for _ in 0..10_000 {
        events.extend(view.pump(now));
        if view.is_render_idle() {
            break;
        }
    }
    events
}
