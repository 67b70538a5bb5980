//! Vertical windowing over packed placements.
//!
//! The window is the viewport extended by a buffer margin on both sides. Only
//! placements that touch it need to be rendered.

use crate::geometry::Placement;

/// The scrolled viewport of a feed container plus its buffer margin.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ViewportWindow {
    scroll_offset: f64,
    viewport_height: f64,
    buffer: f64,
}

impl ViewportWindow {
    /// Creates a window. Negative or non-finite offsets and sizes are treated
    /// as zero.
    pub fn new(scroll_offset: f64, viewport_height: f64, buffer: f64) -> Self {
        Self {
            scroll_offset: non_negative(scroll_offset),
            viewport_height: non_negative(viewport_height),
            buffer: non_negative(buffer),
        }
    }

    /// Container-relative scroll offset.
    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    /// Viewport height.
    pub fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    /// Buffer margin.
    pub fn buffer(&self) -> f64 {
        self.buffer
    }

    /// `(top, bottom)` of the buffered window.
    pub fn range(&self) -> (f64, f64) {
        (
            self.scroll_offset - self.buffer,
            self.scroll_offset + self.viewport_height + self.buffer,
        )
    }

    /// Returns true when `placement` touches the buffered window.
    pub fn contains(&self, placement: &Placement) -> bool {
        let (top, bottom) = self.range();
        placement.rect.intersects_vertical(top, bottom)
    }

    /// Iterates the placements that touch the buffered window, in input
    /// order.
    pub fn visible<'a>(
        &self,
        placements: &'a [Placement],
    ) -> impl Iterator<Item = &'a Placement> + 'a {
        let window = *self;
        placements
            .iter()
            .filter(move |placement| window.contains(placement))
    }
}

/// Collects the placements visible through `window`.
pub fn visible_window(placements: &[Placement], window: ViewportWindow) -> Vec<Placement> {
    window.visible(placements).copied().collect()
}

/// Scroll offset of a container scrolled with the page, given the top of its
/// bounding rectangle relative to the viewport.
pub fn scroll_offset_from_container_top(rect_top: f64) -> f64 {
    non_negative(-rect_top)
}

/// Scroll offset of a container placed `container_offset_top` pixels into a
/// page scrolled to `scroll_y`.
pub fn scroll_offset_from_page(scroll_y: f64, container_offset_top: f64) -> f64 {
    non_negative(scroll_y - container_offset_top)
}

/// Returns true when a one-pixel sentinel at the bottom of `total_height`
/// content is within `threshold` of the viewport.
///
/// # Examples
///
/// ```
/// use mosaic_layout::is_near_bottom;
///
/// assert!(is_near_bottom(3000.0, 1500.0, 800.0, 800.0));
/// assert!(!is_near_bottom(3000.0, 0.0, 800.0, 800.0));
/// ```
pub fn is_near_bottom(
    total_height: f64,
    scroll_offset: f64,
    viewport_height: f64,
    threshold: f64,
) -> bool {
    let sentinel_top = (total_height - 1.0).max(0.0);
    let sentinel_bottom = sentinel_top + 1.0;
    let threshold = non_negative(threshold);
    sentinel_top <= scroll_offset + viewport_height + threshold
        && sentinel_bottom >= scroll_offset - threshold
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}
