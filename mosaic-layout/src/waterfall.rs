//! Column-balanced waterfall packing.
//!
//! ## Usage
//!
//! Use the waterfall packer for Pinterest-style feeds where every item keeps
//! its aspect ratio at a shared column width.
//!
//! Each item goes to the column with the smallest running height (first such
//! column on ties). This is an online greedy balancer: O(n * columns), and
//! appending items never moves items that were already placed.

use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::geometry::{ItemSize, LayoutResult, Placement, Rect};

/// Upper bound for the column count when growing columns to respect
/// `max_column_width`.
pub const MAX_GROWN_COLUMNS: usize = 20;

const MIN_COLUMN_WIDTH_FLOOR: f64 = 1.0;

/// Configuration for waterfall feeds.
#[derive(Debug, Clone, PartialEq, Setters, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterfallConfig {
    /// Minimum column width used to derive the column count.
    pub min_column_width: f64,
    /// Optional cap on the column width. Extra columns are added (up to
    /// [`MAX_GROWN_COLUMNS`]) until columns fit below it.
    #[setters(strip_option)]
    pub max_column_width: Option<f64>,
    /// Horizontal and vertical spacing between items.
    pub gap: f64,
    /// Extra pixels above and below the viewport that stay rendered.
    pub buffer: f64,
    /// Margin around the viewport at which the bottom sentinel requests the
    /// next page.
    pub load_more_threshold: f64,
}

impl Default for WaterfallConfig {
    fn default() -> Self {
        Self {
            min_column_width: 200.0,
            max_column_width: None,
            gap: 16.0,
            buffer: 1500.0,
            load_more_threshold: 800.0,
        }
    }
}

impl WaterfallConfig {
    fn sanitized_min_column_width(&self) -> f64 {
        if self.min_column_width.is_finite() && self.min_column_width > MIN_COLUMN_WIDTH_FLOOR {
            self.min_column_width
        } else {
            MIN_COLUMN_WIDTH_FLOOR
        }
    }

    /// A non-positive or non-finite cap counts as unset.
    fn sanitized_max_column_width(&self) -> Option<f64> {
        self.max_column_width
            .filter(|width| width.is_finite() && *width > 0.0)
    }

    fn sanitized_gap(&self) -> f64 {
        sanitize_spacing(self.gap)
    }
}

/// Resolved column grid for one container width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnGrid {
    /// Number of columns.
    pub columns: usize,
    /// Width of every column.
    pub column_width: f64,
    /// Spacing between columns and between stacked items.
    pub gap: f64,
}

impl ColumnGrid {
    /// Resolves the column grid for `container_width`.
    ///
    /// Returns `None` when the container has no usable width.
    pub fn resolve(container_width: f64, config: &WaterfallConfig) -> Option<Self> {
        if !container_width.is_finite() || container_width <= 0.0 {
            return None;
        }
        let gap = config.sanitized_gap();
        let columns = column_count(container_width, config);
        let mut column_width = per_column_width(container_width, columns, gap);
        if let Some(max_width) = config.sanitized_max_column_width()
            && column_width > max_width
        {
            column_width = max_width;
        }
        Some(Self {
            columns,
            column_width,
            gap,
        })
    }

    /// Left edge of `column`.
    pub fn column_x(&self, column: usize) -> f64 {
        (self.column_width + self.gap) * column as f64
    }
}

/// Derives the column count for `container_width`.
///
/// `max(1, floor(width / min_column_width))`, then grown one column at a time
/// while the per-column width exceeds `max_column_width`, stopping at
/// [`MAX_GROWN_COLUMNS`].
pub fn column_count(container_width: f64, config: &WaterfallConfig) -> usize {
    let min_width = config.sanitized_min_column_width();
    let width = container_width.max(0.0);
    let mut columns = ((width / min_width).floor() as usize).max(1);

    if let Some(max_width) = config.sanitized_max_column_width() {
        let gap = config.sanitized_gap();
        while per_column_width(width, columns, gap) > max_width && columns < MAX_GROWN_COLUMNS {
            columns += 1;
        }
    }

    columns
}

fn per_column_width(container_width: f64, columns: usize, gap: f64) -> f64 {
    let columns = columns.max(1) as f64;
    (container_width - gap * (columns - 1.0)) / columns
}

/// Resumable waterfall packer.
///
/// Keeps per-column running heights so that appended items can be placed
/// without repacking the prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct WaterfallPacker {
    grid: ColumnGrid,
    column_heights: Vec<f64>,
    total_height: f64,
    placed: usize,
}

impl WaterfallPacker {
    /// Creates a packer for `container_width`, or `None` when the container
    /// has no usable width.
    pub fn new(container_width: f64, config: &WaterfallConfig) -> Option<Self> {
        let grid = ColumnGrid::resolve(container_width, config)?;
        Some(Self {
            grid,
            column_heights: vec![0.0; grid.columns],
            total_height: 0.0,
            placed: 0,
        })
    }

    /// The resolved column grid.
    pub fn grid(&self) -> ColumnGrid {
        self.grid
    }

    /// Running height of every column, including each column's trailing gap.
    pub fn column_heights(&self) -> &[f64] {
        &self.column_heights
    }

    /// Maximum running column height seen so far.
    pub fn total_height(&self) -> f64 {
        self.total_height
    }

    /// Number of items placed so far; also the index the next item receives.
    pub fn placed(&self) -> usize {
        self.placed
    }

    /// Places the next item and returns its placement.
    pub fn place(&mut self, size: ItemSize) -> Placement {
        let column = find_shortest_column(&self.column_heights);
        let y = self.column_heights[column];
        let height = self.grid.column_width * size.aspect_ratio();

        self.column_heights[column] = y + height + self.grid.gap;
        self.total_height = self.total_height.max(self.column_heights[column]);

        let placement = Placement {
            index: self.placed,
            rect: Rect::new(self.grid.column_x(column), y, self.grid.column_width, height),
        };
        self.placed += 1;
        placement
    }

    /// Places every item of `sizes` past the ones already placed and appends
    /// the placements to `out`.
    pub fn extend(&mut self, sizes: &[ItemSize], out: &mut Vec<Placement>) {
        let Some(pending) = sizes.get(self.placed..) else {
            return;
        };
        out.reserve(pending.len());
        for size in pending {
            out.push(self.place(*size));
        }
    }
}

/// Packs `sizes` into a waterfall for `container_width`.
///
/// # Examples
///
/// ```
/// use mosaic_layout::{ItemSize, WaterfallConfig, pack_waterfall};
///
/// let squares = vec![ItemSize::new(1.0, 1.0).unwrap(); 6];
/// let layout = pack_waterfall(&squares, 1000.0, &WaterfallConfig::default());
///
/// // 5 columns of 187.2px; the sixth square returns to column 0.
/// let sixth = layout.placements[5].rect;
/// assert_eq!(sixth.x, 0.0);
/// assert!((sixth.y - 203.2).abs() < 1e-9);
/// ```
#[tracing::instrument(level = "trace", skip(sizes, config), fields(items = sizes.len()))]
pub fn pack_waterfall(
    sizes: &[ItemSize],
    container_width: f64,
    config: &WaterfallConfig,
) -> LayoutResult {
    let Some(mut packer) = WaterfallPacker::new(container_width, config) else {
        return LayoutResult::empty();
    };
    let mut placements = Vec::new();
    packer.extend(sizes, &mut placements);
    trace!(
        columns = packer.grid().columns,
        total_height = packer.total_height(),
        "waterfall packed"
    );
    LayoutResult {
        placements,
        total_height: packer.total_height(),
    }
}

fn find_shortest_column(column_heights: &[f64]) -> usize {
    let mut index = 0;
    let mut best = column_heights.first().copied().unwrap_or(0.0);
    for (i, height) in column_heights.iter().enumerate().skip(1) {
        if *height < best {
            best = *height;
            index = i;
        }
    }
    index
}

pub(crate) fn sanitize_spacing(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const EPSILON: f64 = 1e-9;

    fn squares(count: usize) -> Vec<ItemSize> {
        vec![ItemSize::new(1.0, 1.0).unwrap(); count]
    }

    /// Deterministic pseudo-random sizes.
    fn mixed_sizes(count: usize, seed: u64) -> Vec<ItemSize> {
        let mut state = seed;
        (0..count)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                let width = 100.0 + ((state >> 33) % 900) as f64;
                let height = 100.0 + ((state >> 17) % 1400) as f64;
                ItemSize::new(width, height).unwrap()
            })
            .collect()
    }

    #[rstest]
    #[case(1000.0, None, 5)]
    #[case(199.0, None, 1)]
    #[case(0.5, None, 1)]
    #[case(5000.0, None, 25)]
    #[case(1000.0, Some(150.0), 7)]
    #[case(10000.0, Some(100.0), 50)]
    #[case(4000.0, Some(150.0), 20)]
    #[case(1000.0, Some(0.0), 5)]
    #[case(1000.0, Some(-40.0), 5)]
    #[case(1000.0, Some(f64::NAN), 5)]
    fn test_column_count(
        #[case] width: f64,
        #[case] max_column_width: Option<f64>,
        #[case] expected: usize,
    ) {
        let config = WaterfallConfig {
            max_column_width,
            ..WaterfallConfig::default()
        };
        assert_eq!(column_count(width, &config), expected);
    }

    #[test]
    fn test_column_width_clamped_when_growth_caps() {
        let config = WaterfallConfig::default().max_column_width(150.0);
        let grid = ColumnGrid::resolve(4000.0, &config).unwrap();
        assert_eq!(grid.columns, MAX_GROWN_COLUMNS);
        assert_eq!(grid.column_width, 150.0);
    }

    #[test]
    fn test_zero_column_cap_is_ignored() {
        let config = WaterfallConfig::default().max_column_width(0.0);
        let layout = pack_waterfall(&squares(6), 1000.0, &config);
        let reference = pack_waterfall(&squares(6), 1000.0, &WaterfallConfig::default());
        assert_eq!(layout, reference);
        assert!(layout.placements.iter().all(|p| p.rect.width > 0.0));
    }

    #[test]
    fn test_reference_scenario() {
        let layout = pack_waterfall(&squares(6), 1000.0, &WaterfallConfig::default());
        assert_eq!(layout.len(), 6);
        for (column, placement) in layout.placements.iter().take(5).enumerate() {
            assert_eq!(placement.rect.y, 0.0);
            assert!((placement.rect.width - 187.2).abs() < EPSILON);
            assert!((placement.rect.x - column as f64 * 203.2).abs() < EPSILON);
        }
        let sixth = layout.placements[5];
        assert_eq!(sixth.index, 5);
        assert_eq!(sixth.rect.x, 0.0);
        assert!((sixth.rect.y - 203.2).abs() < EPSILON);
        assert!((layout.total_height - (187.2 * 2.0 + 32.0)).abs() < EPSILON);
    }

    #[test]
    fn test_empty_inputs() {
        let config = WaterfallConfig::default();
        assert!(pack_waterfall(&squares(3), 0.0, &config).is_empty());
        assert!(pack_waterfall(&squares(3), f64::NAN, &config).is_empty());
        let layout = pack_waterfall(&[], 800.0, &config);
        assert!(layout.is_empty());
        assert_eq!(layout.total_height, 0.0);
    }

    #[test]
    fn test_item_y_matches_column_running_height() {
        let sizes = mixed_sizes(60, 7);
        let config = WaterfallConfig::default();
        let mut packer = WaterfallPacker::new(1234.0, &config).unwrap();
        for size in &sizes {
            let before = packer.column_heights().to_vec();
            let placement = packer.place(*size);
            let column = (placement.rect.x / (packer.grid().column_width + packer.grid().gap))
                .round() as usize;
            assert_eq!(placement.rect.y, before[column]);
            let min = before.iter().copied().fold(f64::INFINITY, f64::min);
            assert_eq!(before[column], min);
            assert!(placement.rect.height > 0.0);
        }
    }

    #[rstest]
    #[case(3)]
    #[case(11)]
    #[case(42)]
    fn test_column_balance(#[case] seed: u64) {
        let sizes = mixed_sizes(120, seed);
        let config = WaterfallConfig::default();
        let mut packer = WaterfallPacker::new(960.0, &config).unwrap();
        let mut out = Vec::new();
        packer.extend(&sizes, &mut out);

        let tallest_item = out.iter().map(|p| p.rect.height).fold(0.0, f64::max);
        let heights = packer.column_heights();
        let max = heights.iter().copied().fold(f64::MIN, f64::max);
        let min = heights.iter().copied().fold(f64::MAX, f64::min);
        assert!(max - min <= tallest_item + config.gap + EPSILON);
        assert!(packer.total_height() >= out.iter().map(|p| p.rect.bottom()).fold(0.0, f64::max));
    }

    #[test]
    fn test_append_stability() {
        let sizes = mixed_sizes(80, 99);
        let config = WaterfallConfig::default().gap(12.0);
        let prefix = pack_waterfall(&sizes[..50], 1100.0, &config);
        let full = pack_waterfall(&sizes, 1100.0, &config);
        assert_eq!(prefix.placements[..], full.placements[..50]);

        let mut packer = WaterfallPacker::new(1100.0, &config).unwrap();
        let mut incremental = Vec::new();
        packer.extend(&sizes[..50], &mut incremental);
        packer.extend(&sizes, &mut incremental);
        assert_eq!(incremental, full.placements);
        assert_eq!(packer.total_height(), full.total_height);
    }
}
