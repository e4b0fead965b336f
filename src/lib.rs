// Embeddable document viewer core: virtualized page rendering over an
// external document engine, full-text search, and geometric overlays.

pub mod config;
pub mod engine;
#[cfg(feature = "mupdf")]
pub mod mupdf_engine;
pub mod viewer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export the host-facing surface
pub use config::ViewerOptions;
pub use viewer::{DocumentView, MatchStatus, SearchOptions, ViewerEvent};
