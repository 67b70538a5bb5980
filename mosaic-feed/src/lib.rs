//! Paginated, virtualized masonry feed.
//!
//! `mosaic-feed` drives a [`PageLoader`] behind a single-flight pagination
//! loop, negotiates the layout mode from the first page when none is
//! configured, and lays out and windows the accumulated items with
//! `mosaic-layout`.
//!
//! # Key Types
//!
//! - [`MasonryFeed`] - the composed feed; start here
//! - [`PaginationController`] - page state machine and item store
//! - [`ModeNegotiator`] - one-shot layout-mode resolution per mount
//! - [`PageLoader`] / [`PageResponse`] - the loading contract
//! - [`MapSize`] / [`DefaultSizeMapper`] - size extraction from caller records

pub mod diagnostics;
pub mod error;
pub mod feed;
pub mod handler;
pub mod item;
pub mod loader;
pub mod negotiator;
pub mod pagination;

pub use diagnostics::init_tracing;
pub use error::LoadError;
pub use feed::{FeedConfig, FeedFrame, FeedView, LoadOutcome, MasonryFeed, PositionedItem};
pub use handler::Handler;
pub use item::{DefaultSizeMapper, FeedItem, MapSize, SIZE_FIELD_ALIASES, SizeSource};
pub use loader::{PageLoader, PageRequest, PageResponse};
pub use mosaic_layout::{LayoutMode, RawSize, Rect};
pub use negotiator::{
    InputChange, ModeNegotiator, ProbeSettlement, ProbeStep, ProbeTicket, Resolution,
};
pub use pagination::{
    DEFAULT_PAGE_SIZE, FetchTicket, LastOutcome, PaginationController, PaginationState,
    Settlement, SkipReason,
};
