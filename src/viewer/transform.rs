//! Document-space to viewport-space geometry
//!
//! Document space has its origin at the page's bottom-left corner with Y
//! increasing upward, measured in document points. Pixel space has its origin
//! at the viewport's top-left corner with Y increasing downward. Pages may be
//! authored at an intrinsic rotation; the viewer's requested rotation composes
//! with it before any point is mapped.

/// Right-angle rotation, always normalized
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    /// Rotation in degrees
    #[must_use]
    pub const fn degrees(self) -> u16 {
        match self {
            Self::R0 => 0,
            Self::R90 => 90,
            Self::R180 => 180,
            Self::R270 => 270,
        }
    }

    /// Normalize an arbitrary degree value into the four right angles,
    /// snapping to the nearest one
    #[must_use]
    pub fn from_degrees(degrees: i32) -> Self {
        let normalized = degrees.rem_euclid(360);
        match ((normalized + 45) / 90) % 4 {
            0 => Self::R0,
            1 => Self::R90,
            2 => Self::R180,
            _ => Self::R270,
        }
    }

    /// One step clockwise
    #[must_use]
    pub const fn clockwise(self) -> Self {
        match self {
            Self::R0 => Self::R90,
            Self::R90 => Self::R180,
            Self::R180 => Self::R270,
            Self::R270 => Self::R0,
        }
    }

    /// One step counter-clockwise
    #[must_use]
    pub const fn counter_clockwise(self) -> Self {
        match self {
            Self::R0 => Self::R270,
            Self::R90 => Self::R0,
            Self::R180 => Self::R90,
            Self::R270 => Self::R180,
        }
    }

    /// Sum of two rotations, normalized
    #[must_use]
    pub const fn compose(self, other: Self) -> Self {
        let quarters = (self.quarter_turns() + other.quarter_turns()) % 4;
        match quarters {
            0 => Self::R0,
            1 => Self::R90,
            2 => Self::R180,
            _ => Self::R270,
        }
    }

    /// True for rotations that swap a page's width and height on screen
    #[must_use]
    pub const fn swaps_axes(self) -> bool {
        matches!(self, Self::R90 | Self::R270)
    }

    const fn quarter_turns(self) -> u16 {
        self.degrees() / 90
    }
}

/// Rectangle in document space (bottom-left origin, points)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DocRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl DocRect {
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Rectangle in viewport space (top-left origin, pixels)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PixelRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PixelRect {
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Unscaled page size in document points
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Scrollable container size in pixels
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ContainerSize {
    pub width: f32,
    pub height: f32,
}

impl ContainerSize {
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Shared viewport state driving every page's transform
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Uniform scale factor (1.0 = 72 dpi)
    pub scale: f32,
    /// Viewer-requested rotation
    pub rotation: Rotation,
    /// Scrollable container size
    pub container: ContainerSize,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            scale: 1.0,
            rotation: Rotation::R0,
            container: ContainerSize::default(),
        }
    }
}

/// A page's unscaled size plus its intrinsic (authored) rotation
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PageGeometry {
    pub size: PageSize,
    pub rotation: Rotation,
}

impl PageGeometry {
    #[must_use]
    pub const fn new(size: PageSize, rotation: Rotation) -> Self {
        Self { size, rotation }
    }

    /// Effective on-screen rotation: intrinsic composed with the viewer's
    #[must_use]
    pub fn display_rotation(&self, viewport: &Viewport) -> Rotation {
        self.rotation.compose(viewport.rotation)
    }

    /// On-screen page size in pixels at the current viewport
    #[must_use]
    pub fn display_size(&self, viewport: &Viewport) -> (f32, f32) {
        let scaled_width = self.size.width * viewport.scale;
        let scaled_height = self.size.height * viewport.scale;
        if self.display_rotation(viewport).swaps_axes() {
            (scaled_height, scaled_width)
        } else {
            (scaled_width, scaled_height)
        }
    }
}

/// Map a document-space rectangle into viewport pixels.
///
/// Both corners are mapped through the rotation's affine transform and the
/// result is re-normalized, so a zero-size input always yields a zero-size
/// output with non-negative extents.
#[must_use]
pub fn to_viewport(rect: DocRect, page: &PageGeometry, viewport: &Viewport) -> PixelRect {
    let (x0, y0) = doc_point_to_pixel(rect.x, rect.y, page, viewport);
    let (x1, y1) = doc_point_to_pixel(rect.x + rect.width, rect.y + rect.height, page, viewport);
    PixelRect {
        x: x0.min(x1),
        y: y0.min(y1),
        width: (x1 - x0).abs(),
        height: (y1 - y0).abs(),
    }
}

/// Inverse of [`to_viewport`]: map a viewport pixel rectangle back into
/// document space. Used when the user draws a region on screen.
#[must_use]
pub fn to_document(rect: PixelRect, page: &PageGeometry, viewport: &Viewport) -> DocRect {
    let (x0, y0) = pixel_point_to_doc(rect.x, rect.y, page, viewport);
    let (x1, y1) = pixel_point_to_doc(rect.x + rect.width, rect.y + rect.height, page, viewport);
    DocRect {
        x: x0.min(x1),
        y: y0.min(y1),
        width: (x1 - x0).abs(),
        height: (y1 - y0).abs(),
    }
}

/// Map a single document point to viewport pixels
#[must_use]
pub fn doc_point_to_pixel(x: f32, y: f32, page: &PageGeometry, viewport: &Viewport) -> (f32, f32) {
    let s = viewport.scale;
    let w = page.size.width;
    let h = page.size.height;
    match page.display_rotation(viewport) {
        Rotation::R0 => (s * x, s * (h - y)),
        Rotation::R90 => (s * y, s * x),
        Rotation::R180 => (s * (w - x), s * y),
        Rotation::R270 => (s * (h - y), s * (w - x)),
    }
}

/// Map a single viewport pixel to document space
#[must_use]
pub fn pixel_point_to_doc(px: f32, py: f32, page: &PageGeometry, viewport: &Viewport) -> (f32, f32) {
    let s = viewport.scale;
    let w = page.size.width;
    let h = page.size.height;
    match page.display_rotation(viewport) {
        Rotation::R0 => (px / s, h - py / s),
        Rotation::R90 => (py / s, px / s),
        Rotation::R180 => (w - px / s, py / s),
        Rotation::R270 => (w - py / s, h - px / s),
    }
}
