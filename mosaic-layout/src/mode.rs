//! Layout discipline selector.

use serde::{Deserialize, Serialize};

/// Which packer lays out the feed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    /// Column-balanced packing; items keep their aspect ratio at a shared
    /// column width.
    #[default]
    Waterfall,
    /// Row-filling packing; items in a row share one height and the row spans
    /// the container width.
    EqualHeight,
}

impl LayoutMode {
    /// Numeric view type used by feed backends: `1` is waterfall, `2` is
    /// equal-height.
    pub fn from_view_type(view_type: u8) -> Option<Self> {
        match view_type {
            1 => Some(Self::Waterfall),
            2 => Some(Self::EqualHeight),
            _ => None,
        }
    }

    /// Inverse of [`LayoutMode::from_view_type`].
    pub fn view_type(self) -> u8 {
        match self {
            Self::Waterfall => 1,
            Self::EqualHeight => 2,
        }
    }

    /// Maps the `isMasonry` flag carried by first-page responses.
    pub fn from_is_masonry(is_masonry: bool) -> Self {
        if is_masonry {
            Self::Waterfall
        } else {
            Self::EqualHeight
        }
    }

    /// Returns true for [`LayoutMode::Waterfall`].
    pub fn is_masonry(self) -> bool {
        matches!(self, Self::Waterfall)
    }
}
