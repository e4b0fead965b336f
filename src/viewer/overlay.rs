//! Bounding-region overlays and interactive region drawing

use serde::{Deserialize, Serialize};

use crate::viewer::transform::{self, DocRect, PageGeometry, PixelRect, Viewport};

/// Stroke styling for a bounding region. A plain value object: regions are
/// never subclassed, rendering variations ride on flags.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionStyle {
    /// Stroke color as 0xRRGGBB
    pub color: u32,
    pub opacity: f32,
    pub stroke_width: f32,
    /// Dash pattern as (on, off) lengths in pixels; solid when `None`
    pub dash: Option<(f32, f32)>,
}

impl Default for RegionStyle {
    fn default() -> Self {
        Self {
            color: 0x66_99_CC,
            opacity: 1.0,
            stroke_width: 1.0,
            dash: None,
        }
    }
}

/// A document-space rectangle rendered as an overlay on one page
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingRegion {
    /// Page the region belongs to (0-indexed)
    pub page: usize,
    /// Left edge in document points
    pub x: f32,
    /// Bottom edge in document points
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub style: RegionStyle,
    /// Whether the host renders a close affordance for this region
    #[serde(default)]
    pub closable: bool,
}

impl BoundingRegion {
    #[must_use]
    pub const fn bounds(&self) -> DocRect {
        DocRect::new(self.x, self.y, self.width, self.height)
    }

    /// Where the region sits on screen under the current viewport
    #[must_use]
    pub fn pixel_bounds(&self, page: &PageGeometry, viewport: &Viewport) -> PixelRect {
        transform::to_viewport(self.bounds(), page, viewport)
    }
}

#[derive(Clone, Copy, Debug)]
struct Gesture {
    page: usize,
    origin: (f32, f32),
    current: (f32, f32),
}

/// Interactive region drawing in viewport pixels.
///
/// The host feeds pointer positions in; on finish the dragged rectangle is
/// converted to document space so it stays anchored across zoom and rotation.
#[derive(Debug, Default)]
pub struct RegionDraw {
    enabled: bool,
    gesture: Option<Gesture>,
}

impl RegionDraw {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable draw mode; disabling cancels any drag in progress
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.gesture = None;
        }
    }

    /// Start a drag at a pixel position on `page`
    pub fn begin(&mut self, page: usize, x: f32, y: f32) {
        if !self.enabled {
            return;
        }
        self.gesture = Some(Gesture {
            page,
            origin: (x, y),
            current: (x, y),
        });
    }

    /// Update the drag's current pixel position
    pub fn update(&mut self, x: f32, y: f32) {
        if let Some(gesture) = self.gesture.as_mut() {
            gesture.current = (x, y);
        }
    }

    /// Pixel rectangle of the drag in progress, for live feedback
    #[must_use]
    pub fn preview(&self) -> Option<(usize, PixelRect)> {
        self.gesture.map(|g| (g.page, normalized(g)))
    }

    /// Convert the finished drag to a document-space region.
    ///
    /// Returns `None` when no drag is active or the dragged area is
    /// degenerate.
    pub fn finish(
        &mut self,
        page: &PageGeometry,
        viewport: &Viewport,
        style: RegionStyle,
    ) -> Option<BoundingRegion> {
        let gesture = self.gesture.take()?;
        let rect = normalized(gesture);
        if rect.width <= f32::EPSILON || rect.height <= f32::EPSILON {
            return None;
        }

        let bounds = transform::to_document(rect, page, viewport);
        Some(BoundingRegion {
            page: gesture.page,
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
            style,
            closable: false,
        })
    }

    /// Abandon the drag in progress
    pub fn cancel(&mut self) {
        self.gesture = None;
    }
}

fn normalized(gesture: Gesture) -> PixelRect {
    let (x0, y0) = gesture.origin;
    let (x1, y1) = gesture.current;
    PixelRect {
        x: x0.min(x1),
        y: y0.min(y1),
        width: (x1 - x0).abs(),
        height: (y1 - y0).abs(),
    }
}
