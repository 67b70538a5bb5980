//! Row-filling equal-height packing.
//!
//! ## Usage
//!
//! Use the equal-height packer for gallery feeds where every row spans the
//! full container width and all items in a row share one height.
//!
//! Rows are built greedily at a target height. A row is closed when the next
//! item no longer fits, unless taking it would need less rescaling than
//! leaving it out. The closed row is then scaled to the container width and
//! its height is clamped to the configured size range. The trailing row is
//! never stretched above the target height.

use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::trace;

use crate::{
    geometry::{ItemSize, LayoutResult, Placement, Rect, round_half_up},
    waterfall::sanitize_spacing,
};

/// Rows rarely hold more items than this, so row buffers stay on the stack.
const ROW_INLINE: usize = 8;

type RowBuffer = SmallVec<[f64; ROW_INLINE]>;

/// Floor for every item but the last in a closed row.
const MIN_ITEM_WIDTH: f64 = 1.0;

/// Configuration for equal-height feeds.
#[derive(Debug, Clone, PartialEq, Setters, Serialize, Deserialize)]
#[serde(default)]
pub struct EqualHeightConfig {
    /// Ideal row height used while filling rows.
    pub target_row_height: f64,
    /// `(min, max)` bounds for the final row height.
    pub size_range: (f64, f64),
    /// Cap on a single item's width.
    pub max_item_width: f64,
    /// Largest upscale a row may receive before its last item is pushed to the
    /// next row.
    pub max_stretch_ratio: f64,
    /// Spacing between items and between rows.
    pub gap: f64,
    /// Extra pixels above and below the viewport that stay rendered.
    pub buffer: f64,
    /// Margin around the viewport at which the bottom sentinel requests the
    /// next page.
    pub load_more_threshold: f64,
}

impl Default for EqualHeightConfig {
    fn default() -> Self {
        Self {
            target_row_height: 245.0,
            size_range: (230.0, 260.0),
            max_item_width: 975.0,
            max_stretch_ratio: 1.5,
            gap: 8.0,
            buffer: 1500.0,
            load_more_threshold: 500.0,
        }
    }
}

/// One packed row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowSpan {
    /// Index of the first item in the row.
    pub start: usize,
    /// Number of items in the row.
    pub len: usize,
    /// Top edge of the row.
    pub y: f64,
    /// Rounded height shared by every item of the row.
    pub height: f64,
    /// Target height the row was filled at. Lower than the configured target
    /// when the first two items overflow at the configured target.
    pub target_height: f64,
    /// True for the row that consumed the final input item. Its height clamp
    /// differs, so it is repacked when items are appended.
    pub is_last: bool,
}

impl RowSpan {
    /// Index one past the row's last item.
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Resumable equal-height packer.
///
/// Rows closed before the end of the input are final. Calling
/// [`pack`](Self::pack) again with a longer sequence repacks only the trailing
/// row and the appended items.
#[derive(Debug, Clone, PartialEq)]
pub struct EqualHeightPacker {
    container_width: f64,
    gap: f64,
    config: EqualHeightConfig,
    placements: Vec<Placement>,
    rows: Vec<RowSpan>,
    total_height: f64,
}

impl EqualHeightPacker {
    /// Creates a packer for `container_width`, or `None` when the container
    /// has no usable width.
    pub fn new(container_width: f64, config: &EqualHeightConfig) -> Option<Self> {
        if !container_width.is_finite() || container_width <= 0.0 {
            return None;
        }
        Some(Self {
            container_width,
            gap: sanitize_spacing(config.gap),
            config: config.clone(),
            placements: Vec::new(),
            rows: Vec::new(),
            total_height: 0.0,
        })
    }

    /// Placements in input order.
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Packed rows, top to bottom.
    pub fn rows(&self) -> &[RowSpan] {
        &self.rows
    }

    /// Largest `y + height` over all placements.
    pub fn total_height(&self) -> f64 {
        self.total_height
    }

    /// Number of items packed so far.
    pub fn packed(&self) -> usize {
        self.placements.len()
    }

    /// Packs `sizes`, which must extend the sequence packed so far.
    ///
    /// A shorter sequence starts over.
    pub fn pack(&mut self, sizes: &[ItemSize]) {
        if sizes.len() < self.placements.len() {
            self.clear();
        }
        self.reopen_last_row();

        let mut next = self.placements.len();
        let mut y = self
            .rows
            .last()
            .map(|row| row.y + row.height + self.gap)
            .unwrap_or(0.0);

        while next < sizes.len() {
            let row = self.pack_row(sizes, next, y);
            self.total_height = self.total_height.max(row.y + row.height);
            y = row.y + row.height + self.gap;
            next = row.end();
            self.rows.push(row);
        }
    }

    /// Consumes the packer into a [`LayoutResult`].
    pub fn into_result(self) -> LayoutResult {
        LayoutResult {
            placements: self.placements,
            total_height: self.total_height,
        }
    }

    fn clear(&mut self) {
        self.placements.clear();
        self.rows.clear();
        self.total_height = 0.0;
    }

    fn reopen_last_row(&mut self) {
        let Some(last) = self.rows.last().copied() else {
            return;
        };
        if !last.is_last {
            return;
        }
        self.rows.pop();
        self.placements.truncate(last.start);
        self.total_height = self
            .rows
            .last()
            .map(|row| row.y + row.height)
            .unwrap_or(0.0);
    }

    fn pack_row(&mut self, sizes: &[ItemSize], start: usize, y: f64) -> RowSpan {
        let container_width = self.container_width;
        let gap = self.gap;
        let target = self.config.target_row_height;
        let (min_height, max_height) = self.config.size_range;
        let max_stretch = self.config.max_stretch_ratio;

        let mut row = RowBuffer::new();
        row.push(sizes[start].width_ratio());
        let mut next = start + 1;

        let mut effective_target = target;
        if let Some(second) = sizes.get(next) {
            let pair_width = row[0] * target + second.width_ratio() * target + gap;
            if pair_width > container_width {
                effective_target =
                    ((container_width - gap) / (row[0] + second.width_ratio())).min(target);
            }
        }

        while let Some(size) = sizes.get(next) {
            let ratio = size.width_ratio();
            if row.len() == 1 {
                row.push(ratio);
                next += 1;
                continue;
            }

            let row_width = ideal_width(&row, effective_target);
            let with_new = row_width + ratio * effective_target;
            let required = with_new + row.len() as f64 * gap;
            if required <= container_width {
                row.push(ratio);
                next += 1;
                continue;
            }

            let scale_with_new = container_width / required;
            let scale_current = container_width / (row_width + gaps(row.len(), gap));
            if (scale_with_new - 1.0).abs() < (scale_current - 1.0).abs()
                && scale_with_new <= max_stretch
            {
                row.push(ratio);
                next += 1;
            }
            break;
        }

        let is_last = next >= sizes.len();
        let mut scale =
            (container_width - gaps(row.len(), gap)) / ideal_width(&row, effective_target);
        let mut adjusted = effective_target * scale;

        if is_last {
            adjusted = adjusted.max(min_height).min(target);
        } else {
            if scale > max_stretch && row.len() > 2 {
                row.pop();
                next -= 1;
                scale = (container_width - gaps(row.len(), gap))
                    / ideal_width(&row, effective_target);
                adjusted = effective_target * scale;
            }
            adjusted = adjusted.max(min_height).min(max_height);
        }

        let height = round_half_up(adjusted);
        let widths = if is_last {
            self.trailing_widths(&row, adjusted)
        } else {
            self.filled_widths(&row, adjusted)
        };

        let mut x = 0.0;
        for (offset, width) in widths.into_iter().enumerate() {
            self.placements.push(Placement {
                index: start + offset,
                rect: Rect::new(x, y, width, height),
            });
            x += width + gap;
        }

        RowSpan {
            start,
            len: row.len(),
            y,
            height,
            target_height: effective_target,
            is_last,
        }
    }

    /// Widths for a closed row: running-proportion rounding, the last item
    /// takes whatever width remains.
    fn filled_widths(&self, row: &[f64], row_height: f64) -> RowBuffer {
        let container_width = self.container_width;
        let ideal: RowBuffer = row.iter().map(|ratio| ratio * row_height).collect();
        let ideal_total: f64 = ideal.iter().sum();

        let mut widths = RowBuffer::with_capacity(ideal.len());
        let mut x = 0.0;
        let mut remaining = container_width;
        let mut accumulated = 0.0;
        for (index, ideal_width) in ideal.iter().enumerate() {
            let width = if index + 1 == ideal.len() {
                remaining
            } else {
                accumulated += ideal_width;
                let target_x =
                    accumulated / ideal_total * container_width - index as f64 * self.gap;
                round_half_up(target_x - x)
                    .min(self.config.max_item_width)
                    .max(MIN_ITEM_WIDTH)
            };
            widths.push(width);
            x += width + self.gap;
            remaining -= width + self.gap;
        }
        widths
    }

    /// Widths for the trailing row: natural widths unless they overflow the
    /// container, in which case they are scaled down to fit.
    fn trailing_widths(&self, row: &[f64], row_height: f64) -> RowBuffer {
        let ideal: RowBuffer = row.iter().map(|ratio| ratio * row_height).collect();
        let ideal_total: f64 = ideal.iter().sum();
        let gaps_width = gaps(ideal.len(), self.gap);
        let max_item_width = self.config.max_item_width;

        if ideal_total + gaps_width <= self.container_width {
            return ideal
                .iter()
                .map(|width| round_half_up(*width).min(max_item_width))
                .collect();
        }

        let scale = (self.container_width - gaps_width) / ideal_total;
        let mut remaining = self.container_width;
        let mut widths = RowBuffer::with_capacity(ideal.len());
        for (index, ideal_width) in ideal.iter().enumerate() {
            let width = if index + 1 == ideal.len() {
                remaining
            } else {
                round_half_up(ideal_width * scale).min(max_item_width)
            };
            widths.push(width);
            remaining -= width + self.gap;
        }
        widths
    }
}

fn ideal_width(row: &[f64], row_height: f64) -> f64 {
    row.iter().map(|ratio| ratio * row_height).sum()
}

fn gaps(len: usize, gap: f64) -> f64 {
    len.saturating_sub(1) as f64 * gap
}

/// Packs `sizes` into equal-height rows for `container_width`.
#[tracing::instrument(level = "trace", skip(sizes, config), fields(items = sizes.len()))]
pub fn pack_equal_height(
    sizes: &[ItemSize],
    container_width: f64,
    config: &EqualHeightConfig,
) -> LayoutResult {
    let Some(mut packer) = EqualHeightPacker::new(container_width, config) else {
        return LayoutResult::empty();
    };
    packer.pack(sizes);
    trace!(
        rows = packer.rows().len(),
        total_height = packer.total_height(),
        "equal-height packed"
    );
    packer.into_result()
}
