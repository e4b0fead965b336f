//! Viewer configuration

use std::time::Duration;

use serde::Deserialize;

/// Tunable viewer behavior. Every field has a default, so hosts can
/// deserialize a partial config or start from `ViewerOptions::default()`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewerOptions {
    /// Minimum allowed scale factor
    pub min_scale: f32,
    /// Maximum allowed scale factor
    pub max_scale: f32,
    /// Zoom-in multiplier per step
    pub zoom_in_rate: f32,
    /// Zoom-out divisor per step
    pub zoom_out_rate: f32,
    /// Page slots prerendered on each side of the visible range
    pub prerender_margin: usize,
    /// Delay before a scroll event triggers a visibility pass, in milliseconds
    pub scroll_debounce_ms: u64,
    /// Vertical gap between stacked pages, in pixels
    pub page_spacing: f32,
    /// Raster cache capacity, in surfaces
    pub cache_pages: usize,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            min_scale: 0.1,
            max_scale: 10.0,
            zoom_in_rate: 1.1,
            zoom_out_rate: 1.1,
            prerender_margin: 2,
            scroll_debounce_ms: 100,
            page_spacing: 16.0,
            cache_pages: 32,
        }
    }
}

impl ViewerOptions {
    /// Clamp a scale factor to the configured range, handling NaN/Inf
    #[must_use]
    pub fn clamp_scale(&self, factor: f32) -> f32 {
        if !factor.is_finite() {
            1.0
        } else {
            factor.clamp(self.min_scale, self.max_scale)
        }
    }

    #[must_use]
    pub fn scroll_debounce(&self) -> Duration {
        Duration::from_millis(self.scroll_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_scale_bounds_and_rejects_non_finite() {
        let options = ViewerOptions::default();

        assert_eq!(options.clamp_scale(0.01), 0.1);
        assert_eq!(options.clamp_scale(50.0), 10.0);
        assert_eq!(options.clamp_scale(2.0), 2.0);
        assert_eq!(options.clamp_scale(f32::NAN), 1.0);
        assert_eq!(options.clamp_scale(f32::INFINITY), 1.0);
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let options: ViewerOptions =
            serde_json::from_str(r#"{"max_scale": 4.0, "prerender_margin": 1}"#)
                .expect("valid config");

        assert_eq!(options.max_scale, 4.0);
        assert_eq!(options.prerender_margin, 1);
        assert_eq!(options.min_scale, 0.1);
        assert_eq!(options.scroll_debounce_ms, 100);
    }
}
