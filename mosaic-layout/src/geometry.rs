//! Container-local geometry for packed items.
//!
//! This module provides the value types shared by both packers and the
//! viewport window.
//!
//! # Key Types
//!
//! - [`ItemSize`] - A validated intrinsic size with a derived width ratio
//! - [`Rect`] - An absolute rectangle in container-local pixels
//! - [`Placement`] - A rectangle tagged with the item's original index
//! - [`LayoutResult`] - The placements of one packing pass plus the content
//!   height
//!
//! # Coordinate System
//!
//! - Origin (0, 0) at the top-left corner of the container
//! - X-axis increases to the right
//! - Y-axis increases downward
//!
//! Coordinates are fractional. The waterfall packer produces fractional column
//! widths, the equal-height packer rounds to whole pixels.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons an item's intrinsic size cannot be packed.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeometryError {
    /// Neither a width nor a height could be extracted from the item.
    #[error("item has no extractable width/height")]
    MissingSize,
    /// Width or height is NaN or infinite.
    #[error("item size {width}x{height} is not finite")]
    NonFinite {
        /// Extracted width.
        width: f64,
        /// Extracted height.
        height: f64,
    },
    /// Width or height is zero or negative.
    #[error("item size {width}x{height} is not positive")]
    NonPositive {
        /// Extracted width.
        width: f64,
        /// Extracted height.
        height: f64,
    },
}

/// An unvalidated width/height pair as produced by a size mapper.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSize {
    /// Intrinsic width.
    pub width: f64,
    /// Intrinsic height.
    pub height: f64,
}

impl RawSize {
    /// Creates a new raw size.
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// A validated intrinsic item size.
///
/// Both dimensions are finite and strictly positive, so the derived
/// [`width_ratio`](ItemSize::width_ratio) is always finite and positive. The
/// packers only accept this type, which keeps NaN out of row scale
/// computations.
///
/// # Examples
///
/// ```
/// use mosaic_layout::ItemSize;
///
/// let size = ItemSize::new(300.0, 200.0).unwrap();
/// assert_eq!(size.width_ratio(), 1.5);
///
/// assert!(ItemSize::new(0.0, 200.0).is_err());
/// assert!(ItemSize::new(f64::NAN, 200.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ItemSize {
    width: f64,
    height: f64,
}

impl ItemSize {
    /// Validates and creates a new item size.
    pub fn new(width: f64, height: f64) -> Result<Self, GeometryError> {
        if !width.is_finite() || !height.is_finite() {
            return Err(GeometryError::NonFinite { width, height });
        }
        if width <= 0.0 || height <= 0.0 {
            return Err(GeometryError::NonPositive { width, height });
        }
        Ok(Self { width, height })
    }

    /// Creates a size from a width ratio and a unit height.
    pub fn from_ratio(width_ratio: f64) -> Result<Self, GeometryError> {
        Self::new(width_ratio, 1.0)
    }

    /// Intrinsic width.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Intrinsic height.
    pub fn height(&self) -> f64 {
        self.height
    }

    /// `width / height`.
    pub fn width_ratio(&self) -> f64 {
        self.width / self.height
    }

    /// `height / width`.
    pub fn aspect_ratio(&self) -> f64 {
        self.height / self.width
    }
}

impl TryFrom<RawSize> for ItemSize {
    type Error = GeometryError;

    fn try_from(raw: RawSize) -> Result<Self, Self::Error> {
        Self::new(raw.width, raw.height)
    }
}

/// An absolute rectangle in container-local pixels.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Rect {
    /// A rectangle at the origin with no extent.
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    };

    /// Creates a new rectangle.
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge.
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge.
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Returns true when the closed vertical span `[y, y + height]` touches the
    /// closed span `[top, bottom]`.
    pub fn intersects_vertical(&self, top: f64, bottom: f64) -> bool {
        self.bottom() >= top && self.y <= bottom
    }
}

/// A packed rectangle tagged with the index of the item it belongs to.
///
/// `index` is the item's position in the full input sequence. It stays stable
/// when the list is windowed, so renderers can key on it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Original index of the item in the packed sequence.
    pub index: usize,
    /// Absolute position and size.
    pub rect: Rect,
}

/// Output of one packing pass.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
    /// Placements in input order.
    pub placements: Vec<Placement>,
    /// Height of the packed content. Always at least the largest placement
    /// bottom.
    pub total_height: f64,
}

impl LayoutResult {
    /// An empty layout with zero height.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of placed items.
    pub fn len(&self) -> usize {
        self.placements.len()
    }

    /// Returns true when nothing was placed.
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Largest `y + height` over all placements, or zero when empty.
    pub fn max_bottom(&self) -> f64 {
        self.placements
            .iter()
            .map(|placement| placement.rect.bottom())
            .fold(0.0, f64::max)
    }
}

/// Rounds half-way cases towards positive infinity, like browser
/// `Math.round`.
pub(crate) fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}
