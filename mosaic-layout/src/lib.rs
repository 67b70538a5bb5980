//! Geometry for virtualized masonry feeds.
//!
//! This crate turns aspect-ratio-tagged items into absolute rectangles and
//! culls them down to what is near the viewport. Everything here is pure and
//! synchronous. Stateful pagination lives in `mosaic-feed`.
//!
//! # Packers
//!
//! - [`pack_waterfall`] / [`WaterfallPacker`]: column-balanced packing
//! - [`pack_equal_height`] / [`EqualHeightPacker`]: full-width equal-height
//!   rows
//!
//! Both packers are resumable, so appending a page does not repack the items
//! already laid out. [`LayoutCache`] picks the packer by [`LayoutMode`] and
//! decides between reuse, incremental append and full recomputation.
//!
//! # Windowing
//!
//! [`ViewportWindow`] filters placements by the buffered viewport range, and
//! [`FrameCoalescer`] collapses bursts of scroll offsets into one value per
//! frame.

pub mod cache;
pub mod equal_height;
pub mod frame;
pub mod geometry;
pub mod mode;
pub mod viewport;
pub mod waterfall;

pub use cache::{CacheOutcome, LayoutCache, LayoutInput};
pub use equal_height::{EqualHeightConfig, EqualHeightPacker, RowSpan, pack_equal_height};
pub use frame::FrameCoalescer;
pub use geometry::{GeometryError, ItemSize, LayoutResult, Placement, RawSize, Rect};
pub use mode::LayoutMode;
pub use viewport::{
    ViewportWindow, is_near_bottom, scroll_offset_from_container_top, scroll_offset_from_page,
    visible_window,
};
pub use waterfall::{
    ColumnGrid, MAX_GROWN_COLUMNS, WaterfallConfig, WaterfallPacker, column_count, pack_waterfall,
};
