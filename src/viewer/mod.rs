//! Document viewer core: page slots, scheduling, search, overlays

mod cache;
mod overlay;
mod presentation;
mod scheduler;
mod search;
mod slot;
pub mod transform;
mod view;

pub use cache::{RasterCache, RasterKey};
pub use overlay::{BoundingRegion, RegionDraw, RegionStyle};
pub use presentation::{PresentationPhase, PresentationSession};
pub use scheduler::{SchedulerEvent, ViewportScheduler};
pub use search::{MatchRecord, MatchStatus, SearchEngine, SearchOptions, WordBoundary};
pub use slot::{HighlightSpan, PageSlot, RenderPhase, SlotPoll};
pub use transform::{
    ContainerSize, DocRect, PageGeometry, PageSize, PixelRect, Rotation, Viewport, to_document,
    to_viewport,
};
pub use view::{DocumentView, ViewerEvent};
