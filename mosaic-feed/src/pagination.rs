//! Single-flight pagination.
//!
//! [`PaginationController`] owns the accumulated items and decides whether a
//! fetch may start. The coordinator performs the fetch itself and hands the
//! result back through [`settle`](PaginationController::settle), so the
//! controller never awaits and never holds a lock across I/O.
//!
//! ```text
//! Pending --request_more(force)--> Loading --settle--> Idle
//!                                     ^                 |
//!                                     +--request_more---+
//! ```

use mosaic_layout::ItemSize;
use tracing::{debug, error, warn};

use crate::{
    error::LoadError,
    item::{FeedItem, MapSize},
    loader::{PageRequest, PageResponse},
};

/// Items requested per page when nothing else is configured.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Mounted, nothing requested yet. Reads as loading.
    Pending,
    Idle,
    Loading { page: u32 },
}

/// Why a fetch was not started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A fetch is already in flight, or the initial fetch has not started.
    InFlight,
    /// The backend reported no further pages.
    Exhausted,
}

/// Permission to fetch one page, issued by
/// [`PaginationController::request_more`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    page: u32,
    page_size: u32,
    generation: u64,
}

impl FetchTicket {
    /// Page to fetch.
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Items per page.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Mount generation the ticket was issued in.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The loader request for this ticket.
    pub fn request(&self) -> PageRequest {
        PageRequest {
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// Result of settling a fetch.
#[derive(Debug)]
pub enum Settlement {
    /// The page was appended.
    Loaded {
        /// Items appended.
        added: usize,
        /// Items dropped for unusable geometry.
        skipped: usize,
        /// Next page to fetch.
        page: u32,
        /// Whether another page exists.
        has_more: bool,
    },
    /// The fetch failed. Nothing changed except the loading flag.
    Failed(LoadError),
    /// The ticket belongs to an earlier mount or was already settled.
    Stale,
}

/// Summary of the most recent settled fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LastOutcome {
    /// The page was appended.
    Loaded {
        /// Page number that was fetched.
        page: u32,
        /// Items appended.
        added: usize,
    },
    /// The fetch failed.
    Failed {
        /// Page number that was requested.
        page: u32,
        /// Error message.
        message: String,
    },
}

/// Read-only snapshot of pagination progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationState {
    /// Items accumulated so far.
    pub item_count: usize,
    /// Next page to fetch, starting at 1.
    pub page: u32,
    /// True while a fetch is in flight and before the first fetch starts.
    pub loading: bool,
    /// Whether the backend reported more pages.
    pub has_more: bool,
}

/// Page state machine of one mounted feed.
#[derive(Debug)]
pub struct PaginationController<R> {
    phase: Phase,
    page: u32,
    page_size: u32,
    has_more: bool,
    generation: u64,
    initial_requested: bool,
    items: Vec<FeedItem<R>>,
    sizes: Vec<ItemSize>,
    last_outcome: Option<LastOutcome>,
}

impl<R> PaginationController<R> {
    /// Creates a controller in the mounted placeholder state.
    pub fn new(page_size: u32) -> Self {
        Self {
            phase: Phase::Pending,
            page: 1,
            page_size: page_size.max(1),
            has_more: true,
            generation: 0,
            initial_requested: false,
            items: Vec::new(),
            sizes: Vec::new(),
            last_outcome: None,
        }
    }

    /// Snapshot of the current progress.
    pub fn state(&self) -> PaginationState {
        PaginationState {
            item_count: self.items.len(),
            page: self.page,
            loading: self.is_loading(),
            has_more: self.has_more,
        }
    }

    /// True while a fetch is in flight and before the first fetch starts.
    pub fn is_loading(&self) -> bool {
        !matches!(self.phase, Phase::Idle)
    }

    /// True only while a fetch is in flight.
    pub fn is_in_flight(&self) -> bool {
        matches!(self.phase, Phase::Loading { .. })
    }

    /// Whether the backend reported more pages.
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Items per page.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Changes the page size used by subsequent tickets.
    pub fn set_page_size(&mut self, page_size: u32) {
        self.page_size = page_size.max(1);
    }

    /// Current mount generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Accumulated items in feed order.
    pub fn items(&self) -> &[FeedItem<R>] {
        &self.items
    }

    /// Validated sizes of [`items`](Self::items), index for index.
    pub fn sizes(&self) -> &[ItemSize] {
        &self.sizes
    }

    /// Summary of the most recent settled fetch.
    pub fn last_outcome(&self) -> Option<&LastOutcome> {
        self.last_outcome.as_ref()
    }

    /// Asks to fetch the next page.
    ///
    /// An in-flight fetch always refuses. `force` only lifts the mounted
    /// placeholder state and the exhausted check.
    pub fn request_more(&mut self, force: bool) -> Result<FetchTicket, SkipReason> {
        match self.phase {
            Phase::Loading { .. } => return Err(SkipReason::InFlight),
            Phase::Pending if !force => return Err(SkipReason::InFlight),
            _ => {}
        }
        if !force && !self.has_more {
            return Err(SkipReason::Exhausted);
        }

        self.phase = Phase::Loading { page: self.page };
        debug!(
            page = self.page,
            page_size = self.page_size,
            generation = self.generation,
            "page fetch started"
        );
        Ok(FetchTicket {
            page: self.page,
            page_size: self.page_size,
            generation: self.generation,
        })
    }

    /// Starts the forced first fetch. Returns `None` once it was issued for
    /// this mount or when items are already present.
    pub fn request_initial(&mut self) -> Option<FetchTicket> {
        if self.initial_requested || !self.items.is_empty() {
            return None;
        }
        let ticket = self.request_more(true).ok()?;
        self.initial_requested = true;
        Some(ticket)
    }

    /// Applies the result of the fetch authorized by `ticket`.
    pub fn settle<M>(
        &mut self,
        ticket: FetchTicket,
        result: Result<PageResponse<R>, LoadError>,
        mapper: &M,
    ) -> Settlement
    where
        M: MapSize<R> + ?Sized,
    {
        let current = Phase::Loading { page: ticket.page };
        if ticket.generation != self.generation || self.phase != current {
            warn!(
                page = ticket.page,
                generation = ticket.generation,
                current_generation = self.generation,
                "dropping stale page settlement"
            );
            return Settlement::Stale;
        }

        self.phase = Phase::Idle;
        match result {
            Ok(response) => {
                let offset = self.items.len();
                let mut skipped = 0;
                self.items.reserve(response.items.len());
                for (position, raw) in response.items.into_iter().enumerate() {
                    match FeedItem::ingest(raw, mapper) {
                        Ok(item) => {
                            self.sizes.push(item.size());
                            self.items.push(item);
                        }
                        Err(err) => {
                            skipped += 1;
                            warn!(
                                page = ticket.page,
                                position,
                                error = %err,
                                "skipping item with unusable geometry"
                            );
                        }
                    }
                }

                let added = self.items.len() - offset;
                self.has_more = response.has_more;
                self.page += 1;
                self.last_outcome = Some(LastOutcome::Loaded {
                    page: ticket.page,
                    added,
                });
                debug!(
                    page = ticket.page,
                    added,
                    skipped,
                    has_more = self.has_more,
                    "page fetch settled"
                );
                Settlement::Loaded {
                    added,
                    skipped,
                    page: self.page,
                    has_more: self.has_more,
                }
            }
            Err(err) => {
                error!(page = ticket.page, error = %err, "page fetch failed");
                self.last_outcome = Some(LastOutcome::Failed {
                    page: ticket.page,
                    message: err.to_string(),
                });
                Settlement::Failed(err)
            }
        }
    }

    /// Starts a new mount generation with no items.
    pub fn reset(&mut self) {
        let generation = self.generation + 1;
        *self = Self::new(self.page_size);
        self.generation = generation;
        debug!(generation, "pagination reset");
    }
}

#[cfg(test)]
mod tests {
    use mosaic_layout::RawSize;
    use rstest::rstest;

    use super::*;
    use crate::item::DefaultSizeMapper;

    fn page(count: usize, has_more: bool) -> Result<PageResponse<RawSize>, LoadError> {
        Ok(PageResponse::new(
            vec![RawSize::new(300.0, 200.0); count],
            has_more,
        ))
    }

    fn loaded(controller: &mut PaginationController<RawSize>, count: usize, has_more: bool) {
        let ticket = controller.request_more(true).unwrap();
        controller.settle(ticket, page(count, has_more), &DefaultSizeMapper);
    }

    #[test]
    fn pending_reads_as_loading() {
        let mut controller = PaginationController::<RawSize>::new(20);
        assert_eq!(
            controller.state(),
            PaginationState {
                item_count: 0,
                page: 1,
                loading: true,
                has_more: true,
            }
        );
        assert_eq!(controller.request_more(false), Err(SkipReason::InFlight));
    }

    #[test]
    fn initial_request_fires_once() {
        let mut controller = PaginationController::<RawSize>::new(20);
        let ticket = controller.request_initial().unwrap();
        assert_eq!(ticket.request(), PageRequest { page: 1, page_size: 20 });
        assert!(controller.request_initial().is_none());

        controller.settle(ticket, page(20, true), &DefaultSizeMapper);
        assert!(controller.request_initial().is_none());
        assert_eq!(controller.state().page, 2);
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn in_flight_always_refuses(#[case] force: bool) {
        let mut controller = PaginationController::<RawSize>::new(10);
        controller.request_initial().unwrap();
        assert_eq!(controller.request_more(force), Err(SkipReason::InFlight));
        assert!(controller.state().loading);
    }

    #[test]
    fn success_appends_and_advances() {
        let mut controller = PaginationController::<RawSize>::new(10);
        loaded(&mut controller, 10, true);
        let ticket = controller.request_more(false).unwrap();
        assert_eq!(ticket.page(), 2);

        let settlement = controller.settle(ticket, page(4, false), &DefaultSizeMapper);
        assert!(matches!(
            settlement,
            Settlement::Loaded {
                added: 4,
                skipped: 0,
                page: 3,
                has_more: false,
            }
        ));
        assert_eq!(controller.items().len(), 14);
        assert_eq!(controller.sizes().len(), 14);
        assert_eq!(
            controller.last_outcome(),
            Some(&LastOutcome::Loaded { page: 2, added: 4 })
        );
        assert_eq!(controller.request_more(false), Err(SkipReason::Exhausted));
        assert!(controller.request_more(true).is_ok());
    }

    #[test]
    fn failure_keeps_page_and_has_more() {
        let mut controller = PaginationController::<RawSize>::new(10);
        loaded(&mut controller, 10, true);
        let ticket = controller.request_more(false).unwrap();
        let settlement = controller.settle(
            ticket,
            Err(LoadError::new("timeout")),
            &DefaultSizeMapper,
        );

        assert!(matches!(settlement, Settlement::Failed(ref err) if err.message() == "timeout"));
        let state = controller.state();
        assert_eq!((state.page, state.has_more, state.loading), (2, true, false));
        assert_eq!(
            controller.last_outcome(),
            Some(&LastOutcome::Failed {
                page: 2,
                message: "timeout".into(),
            })
        );
        assert_eq!(controller.request_more(false).map(|t| t.page()), Ok(2));
    }

    #[test]
    fn degenerate_items_are_skipped() {
        let mut controller = PaginationController::<RawSize>::new(10);
        let ticket = controller.request_initial().unwrap();
        let response = PageResponse::new(
            vec![
                RawSize::new(100.0, 100.0),
                RawSize::new(0.0, 100.0),
                RawSize::new(f64::NAN, 10.0),
                RawSize::new(50.0, 25.0),
            ],
            true,
        );
        let settlement = controller.settle(ticket, Ok(response), &DefaultSizeMapper);
        assert!(matches!(
            settlement,
            Settlement::Loaded {
                added: 2,
                skipped: 2,
                ..
            }
        ));
        assert_eq!(controller.items()[1].width_ratio(), 2.0);
    }

    #[test]
    fn stale_ticket_changes_nothing() {
        let mut controller = PaginationController::<RawSize>::new(10);
        let old = controller.request_initial().unwrap();
        controller.reset();
        assert_eq!(controller.generation(), 1);

        let fresh = controller.request_initial().unwrap();
        assert!(matches!(
            controller.settle(old, page(10, true), &DefaultSizeMapper),
            Settlement::Stale
        ));
        assert!(controller.items().is_empty());
        assert!(controller.is_in_flight());

        controller.settle(fresh, page(3, false), &DefaultSizeMapper);
        assert!(matches!(
            controller.settle(fresh, page(3, false), &DefaultSizeMapper),
            Settlement::Stale
        ));
        assert_eq!(controller.items().len(), 3);
    }
}
