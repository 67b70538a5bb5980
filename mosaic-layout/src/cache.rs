//! Memoized layout for an append-only item sequence.
//!
//! [`LayoutCache`] remembers the inputs of the last packing pass. Unchanged
//! inputs reuse the stored placements. A pure append resumes the packer.
//! Anything else repacks from scratch.
//!
//! Items are identified by position only. Callers that replace items rather
//! than append them must bump the generation.

use tracing::debug;

use crate::{
    equal_height::{EqualHeightConfig, EqualHeightPacker},
    geometry::{ItemSize, Placement},
    mode::LayoutMode,
    waterfall::{WaterfallConfig, WaterfallPacker},
};

/// Everything a packing pass depends on.
#[derive(Debug, Clone, Copy)]
pub struct LayoutInput<'a> {
    /// Active packer.
    pub mode: LayoutMode,
    /// Validated item sizes in feed order.
    pub sizes: &'a [ItemSize],
    /// Container width in pixels.
    pub container_width: f64,
    /// Mount generation of the item sequence.
    pub generation: u64,
    /// Waterfall settings, used in [`LayoutMode::Waterfall`].
    pub waterfall: &'a WaterfallConfig,
    /// Equal-height settings, used in [`LayoutMode::EqualHeight`].
    pub equal_height: &'a EqualHeightConfig,
}

/// How [`LayoutCache::update`] satisfied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// The stored layout was reused as is.
    Hit,
    /// Only appended items were packed.
    Appended {
        /// Number of newly packed items.
        added: usize,
    },
    /// The layout was packed from scratch.
    Recomputed,
}

/// Bit patterns of the config fields that move items. Viewport margins are
/// left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Geometry {
    Waterfall {
        min_column_width: u64,
        max_column_width: Option<u64>,
        gap: u64,
    },
    EqualHeight {
        target_row_height: u64,
        size_range: (u64, u64),
        max_item_width: u64,
        max_stretch_ratio: u64,
        gap: u64,
    },
}

impl Geometry {
    fn of(input: &LayoutInput<'_>) -> Self {
        match input.mode {
            LayoutMode::Waterfall => {
                let config = input.waterfall;
                Self::Waterfall {
                    min_column_width: config.min_column_width.to_bits(),
                    max_column_width: config.max_column_width.map(f64::to_bits),
                    gap: config.gap.to_bits(),
                }
            }
            LayoutMode::EqualHeight => {
                let config = input.equal_height;
                Self::EqualHeight {
                    target_row_height: config.target_row_height.to_bits(),
                    size_range: (config.size_range.0.to_bits(), config.size_range.1.to_bits()),
                    max_item_width: config.max_item_width.to_bits(),
                    max_stretch_ratio: config.max_stretch_ratio.to_bits(),
                    gap: config.gap.to_bits(),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LayoutKey {
    generation: u64,
    width_bits: u64,
    geometry: Geometry,
}

impl LayoutKey {
    fn of(input: &LayoutInput<'_>) -> Self {
        Self {
            generation: input.generation,
            width_bits: input.container_width.to_bits(),
            geometry: Geometry::of(input),
        }
    }
}

#[derive(Debug, Clone, Default)]
enum Packed {
    #[default]
    Empty,
    Waterfall {
        packer: WaterfallPacker,
        placements: Vec<Placement>,
    },
    EqualHeight(EqualHeightPacker),
}

impl Packed {
    fn build(input: &LayoutInput<'_>) -> Self {
        let mut packed = match input.mode {
            LayoutMode::Waterfall => WaterfallPacker::new(input.container_width, input.waterfall)
                .map(|packer| Self::Waterfall {
                    packer,
                    placements: Vec::new(),
                }),
            LayoutMode::EqualHeight => {
                EqualHeightPacker::new(input.container_width, input.equal_height)
                    .map(Self::EqualHeight)
            }
        }
        .unwrap_or_default();
        packed.extend(input.sizes);
        packed
    }

    fn extend(&mut self, sizes: &[ItemSize]) {
        match self {
            Self::Empty => {}
            Self::Waterfall { packer, placements } => packer.extend(sizes, placements),
            Self::EqualHeight(packer) => packer.pack(sizes),
        }
    }

    fn placements(&self) -> &[Placement] {
        match self {
            Self::Empty => &[],
            Self::Waterfall { placements, .. } => placements,
            Self::EqualHeight(packer) => packer.placements(),
        }
    }

    fn total_height(&self) -> f64 {
        match self {
            Self::Empty => 0.0,
            Self::Waterfall { packer, .. } => packer.total_height(),
            Self::EqualHeight(packer) => packer.total_height(),
        }
    }
}

/// Fingerprint-memoized layout of one feed.
#[derive(Debug, Clone, Default)]
pub struct LayoutCache {
    key: Option<LayoutKey>,
    item_count: usize,
    packed: Packed,
}

impl LayoutCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Brings the stored layout up to date with `input`.
    pub fn update(&mut self, input: &LayoutInput<'_>) -> CacheOutcome {
        let key = LayoutKey::of(input);
        let count = input.sizes.len();

        if self.key.as_ref() == Some(&key) {
            if count == self.item_count {
                return CacheOutcome::Hit;
            }
            if count > self.item_count {
                let added = count - self.item_count;
                self.packed.extend(input.sizes);
                self.item_count = count;
                debug!(
                    mode = ?input.mode,
                    added,
                    total = count,
                    "layout extended incrementally"
                );
                return CacheOutcome::Appended { added };
            }
        }

        self.packed = Packed::build(input);
        self.item_count = count;
        self.key = Some(key);
        debug!(
            mode = ?input.mode,
            items = count,
            container_width = input.container_width,
            generation = input.generation,
            "layout recomputed"
        );
        CacheOutcome::Recomputed
    }

    /// Placements of the last update.
    pub fn placements(&self) -> &[Placement] {
        self.packed.placements()
    }

    /// Content height of the last update.
    pub fn total_height(&self) -> f64 {
        self.packed.total_height()
    }

    /// Forgets the stored layout.
    pub fn invalidate(&mut self) {
        *self = Self::default();
    }
}
