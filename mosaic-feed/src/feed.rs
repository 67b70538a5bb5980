//! The composed masonry feed.
//!
//! [`MasonryFeed`] wires the pieces together: pagination feeds items into the
//! layout cache, the active packer positions them, the viewport window culls
//! them and the render callback turns the survivors into caller output. The
//! near-bottom probe closes the loop by requesting the next page.
//!
//! # Driving a feed
//!
//! ```
//! use mosaic_feed::{
//!     FeedConfig, FeedView, LoadError, MasonryFeed, PageRequest, PageResponse, RawSize,
//! };
//!
//! async fn fetch(request: PageRequest) -> Result<PageResponse<RawSize>, LoadError> {
//!     let items = vec![RawSize::new(400.0, 300.0); request.page_size as usize];
//!     Ok(PageResponse::new(items, request.page < 3).with_is_masonry(true))
//! }
//!
//! # async fn run() {
//! let feed = MasonryFeed::new(fetch, FeedConfig::default().page_size(20));
//! feed.mount().await;
//! feed.set_container_width(1000.0);
//! feed.set_viewport_height(800.0);
//!
//! if feed.set_scroll_offset(1200.0) {
//!     // schedule a frame callback, then:
//!     feed.on_frame();
//! }
//! feed.maybe_load_more().await;
//!
//! if let FeedView::Ready(frame) = feed.view(|item, index, _mode| (index, item.rect)) {
//!     assert!(!frame.items.is_empty());
//! }
//! # }
//! ```

use derive_setters::Setters;
use mosaic_layout::{
    EqualHeightConfig, FrameCoalescer, LayoutCache, LayoutInput, LayoutMode, Rect,
    ViewportWindow, WaterfallConfig, is_near_bottom,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::LoadError,
    handler::Handler,
    item::{DefaultSizeMapper, MapSize, SizeSource},
    loader::PageLoader,
    negotiator::{InputChange, ModeNegotiator, ProbeSettlement, ProbeStep, Resolution},
    pagination::{
        DEFAULT_PAGE_SIZE, FetchTicket, PaginationController, PaginationState, Settlement,
        SkipReason,
    },
};

/// Feed configuration.
#[derive(Debug, Clone, PartialEq, Setters, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Items requested per page.
    pub page_size: u32,
    /// Fixed layout mode. When unset the mode is negotiated from the first
    /// page.
    #[setters(strip_option)]
    pub layout_mode: Option<LayoutMode>,
    /// Mode used when negotiation yields no hint or fails.
    pub default_layout_mode: LayoutMode,
    /// Waterfall settings.
    pub waterfall: WaterfallConfig,
    /// Equal-height settings.
    pub equal_height: EqualHeightConfig,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            layout_mode: None,
            default_layout_mode: LayoutMode::default(),
            waterfall: WaterfallConfig::default(),
            equal_height: EqualHeightConfig::default(),
        }
    }
}

impl FeedConfig {
    fn buffer(&self, mode: LayoutMode) -> f64 {
        match mode {
            LayoutMode::Waterfall => self.waterfall.buffer,
            LayoutMode::EqualHeight => self.equal_height.buffer,
        }
    }

    fn load_more_threshold(&self, mode: LayoutMode) -> f64 {
        match mode {
            LayoutMode::Waterfall => self.waterfall.load_more_threshold,
            LayoutMode::EqualHeight => self.equal_height.load_more_threshold,
        }
    }
}

/// A visible item handed to the render callback.
#[derive(Debug, Clone, Copy)]
pub struct PositionedItem<'a, R> {
    /// The caller's record.
    pub item: &'a R,
    /// Absolute rectangle in container-local pixels.
    pub rect: Rect,
    /// Position of the item in the whole feed.
    pub original_index: usize,
}

/// Rendered output of a resolved feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedFrame<D> {
    /// Active layout mode.
    pub mode: LayoutMode,
    /// Minimum height of the container.
    pub total_height: f64,
    /// Render output of the visible items, in feed order.
    pub items: Vec<D>,
    /// True while a page is loading.
    pub loading: bool,
    /// Whether more pages exist.
    pub has_more: bool,
    /// Top of the one-pixel load-more sentinel.
    pub sentinel_y: f64,
}

/// What the host should display.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedView<D> {
    /// The layout mode is not known yet. `None` means an empty placeholder.
    Resolving {
        /// Caller-supplied placeholder.
        placeholder: Option<D>,
    },
    /// The feed is laid out.
    Ready(FeedFrame<D>),
}

/// Result of one load attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page was appended.
    Loaded {
        /// Items appended.
        added: usize,
        /// Next page to fetch.
        page: u32,
        /// Whether more pages exist.
        has_more: bool,
    },
    /// The loader failed. The error went to the error handler.
    Failed,
    /// No fetch was started.
    Skipped(SkipReason),
    /// The response arrived after a remount and was dropped.
    Stale,
    /// The layout mode is still being negotiated.
    Unresolved,
    /// The initial page of this mount was already requested.
    AlreadyMounted,
}

struct FeedState<R> {
    config: FeedConfig,
    negotiator: ModeNegotiator<R>,
    pagination: PaginationController<R>,
    cache: LayoutCache,
    container_width: f64,
    viewport_height: f64,
    scroll: FrameCoalescer<f64>,
}

impl<R> FeedState<R> {
    fn new(config: FeedConfig) -> Self {
        Self {
            negotiator: ModeNegotiator::new(
                config.layout_mode,
                config.default_layout_mode,
                config.page_size,
            ),
            pagination: PaginationController::new(config.page_size),
            cache: LayoutCache::new(),
            container_width: 0.0,
            viewport_height: 0.0,
            scroll: FrameCoalescer::new(0.0),
            config,
        }
    }

    /// Brings the layout cache up to date. `None` while the mode is unknown.
    fn layout(&mut self) -> Option<LayoutMode> {
        let mode = self.negotiator.mode()?;
        let input = LayoutInput {
            mode,
            sizes: self.pagination.sizes(),
            container_width: self.container_width,
            generation: self.pagination.generation(),
            waterfall: &self.config.waterfall,
            equal_height: &self.config.equal_height,
        };
        self.cache.update(&input);
        Some(mode)
    }

    fn window(&self, mode: LayoutMode) -> ViewportWindow {
        ViewportWindow::new(
            *self.scroll.committed(),
            self.viewport_height,
            self.config.buffer(mode),
        )
    }
}

/// A paginated, virtualized masonry feed.
///
/// All methods take `&self`; state lives behind a mutex that is never held
/// across a loader call.
pub struct MasonryFeed<L: PageLoader, M = DefaultSizeMapper> {
    loader: L,
    mapper: M,
    state: Mutex<FeedState<L::Item>>,
    on_error: Option<Handler<LoadError>>,
    on_mode_resolved: Option<Handler<LayoutMode>>,
}

impl<L> MasonryFeed<L, DefaultSizeMapper>
where
    L: PageLoader,
    L::Item: SizeSource,
{
    /// Creates a feed that reads item sizes with [`DefaultSizeMapper`].
    pub fn new(loader: L, config: FeedConfig) -> Self {
        Self::with_mapper(loader, DefaultSizeMapper, config)
    }
}

impl<L, M> MasonryFeed<L, M>
where
    L: PageLoader,
    M: MapSize<L::Item>,
{
    /// Creates a feed with a custom size mapper.
    pub fn with_mapper(loader: L, mapper: M, config: FeedConfig) -> Self {
        Self {
            loader,
            mapper,
            state: Mutex::new(FeedState::new(config)),
            on_error: None,
            on_mode_resolved: None,
        }
    }

    /// Sets the handler for load and probe failures.
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&LoadError) + Send + Sync + 'static,
    {
        self.on_error = Some(Handler::new(handler));
        self
    }

    /// Sets the handler called once per mount with the resolved mode.
    pub fn on_mode_resolved<F>(mut self, handler: F) -> Self
    where
        F: Fn(&LayoutMode) + Send + Sync + 'static,
    {
        self.on_mode_resolved = Some(Handler::new(handler));
        self
    }

    /// Resolves the layout mode and runs the forced first load.
    pub async fn mount(&self) -> LoadOutcome {
        if self.resolve_mode().await.is_none() {
            return LoadOutcome::Unresolved;
        }
        let ticket = self.state.lock().pagination.request_initial();
        match ticket {
            Some(ticket) => self.fetch(ticket).await,
            None => LoadOutcome::AlreadyMounted,
        }
    }

    /// Resolves the layout mode, probing page 1 when no mode is configured.
    ///
    /// Returns `None` while another caller holds the probe.
    pub async fn resolve_mode(&self) -> Option<LayoutMode> {
        let step = self.state.lock().negotiator.begin();
        let mode = match step {
            ProbeStep::Resolved(mode) => Some(mode),
            ProbeStep::Waiting => None,
            ProbeStep::Probe(ticket) => {
                let result = self.loader.load_page(ticket.request()).await;
                let settlement = self.state.lock().negotiator.finish(ticket, result);
                match settlement {
                    ProbeSettlement::Resolved(mode) => Some(mode),
                    ProbeSettlement::Fallback { mode, error } => {
                        self.report_error(&error);
                        Some(mode)
                    }
                    ProbeSettlement::Stale => None,
                }
            }
        };
        self.announce_mode();
        mode
    }

    /// Requests the next page, subject to the single-flight guard.
    pub async fn load_more(&self) -> LoadOutcome {
        let ticket = {
            let mut state = self.state.lock();
            if state.negotiator.mode().is_none() {
                return LoadOutcome::Unresolved;
            }
            state.pagination.request_more(false)
        };
        match ticket {
            Ok(ticket) => self.fetch(ticket).await,
            Err(reason) => LoadOutcome::Skipped(reason),
        }
    }

    /// Requests the next page only when the sentinel is near the viewport.
    pub async fn maybe_load_more(&self) -> Option<LoadOutcome> {
        if !self.near_bottom() {
            return None;
        }
        Some(self.load_more().await)
    }

    /// Drops all items, pagination progress and the resolved mode, then
    /// mounts again with `explicit_mode`.
    pub async fn remount(&self, explicit_mode: Option<LayoutMode>) -> LoadOutcome {
        {
            let mut state = self.state.lock();
            let page_size = state.config.page_size;
            state.config.layout_mode = explicit_mode;
            state.negotiator.reset(explicit_mode, page_size);
            state.pagination.set_page_size(page_size);
            state.pagination.reset();
            state.cache.invalidate();
            debug!(
                generation = state.pagination.generation(),
                ?explicit_mode,
                "feed remounted"
            );
        }
        self.mount().await
    }

    /// Records new mount inputs. A change only takes effect on the next
    /// [`remount`](Self::remount).
    pub fn update_inputs(&self, explicit_mode: Option<LayoutMode>, page_size: u32) -> InputChange {
        let mut state = self.state.lock();
        let change = state.negotiator.update_inputs(explicit_mode, page_size);
        if change == InputChange::RemountRequired {
            state.config.layout_mode = explicit_mode;
            state.config.page_size = page_size;
        }
        change
    }

    /// Changes the fallback mode for future negotiations.
    pub fn set_default_layout_mode(&self, mode: LayoutMode) {
        let mut state = self.state.lock();
        state.config.default_layout_mode = mode;
        state.negotiator.set_default_mode(mode);
    }

    /// Replaces the waterfall settings.
    pub fn set_waterfall_config(&self, config: WaterfallConfig) {
        self.state.lock().config.waterfall = config;
    }

    /// Replaces the equal-height settings.
    pub fn set_equal_height_config(&self, config: EqualHeightConfig) {
        self.state.lock().config.equal_height = config;
    }

    /// Current configuration.
    pub fn config(&self) -> FeedConfig {
        self.state.lock().config.clone()
    }

    /// Sets the container width.
    pub fn set_container_width(&self, width: f64) {
        self.state.lock().container_width = width;
    }

    /// Sets the viewport height.
    pub fn set_viewport_height(&self, height: f64) {
        self.state.lock().viewport_height = height;
    }

    /// Records a container-relative scroll offset. Returns true when the host
    /// must schedule a frame and then call [`on_frame`](Self::on_frame).
    pub fn set_scroll_offset(&self, offset: f64) -> bool {
        self.state.lock().scroll.push(offset.max(0.0))
    }

    /// Commits the latest scroll offset. Returns true when it changed.
    pub fn on_frame(&self) -> bool {
        let mut state = self.state.lock();
        let previous = *state.scroll.committed();
        state
            .scroll
            .on_frame()
            .is_some_and(|offset| offset != previous)
    }

    /// Committed scroll offset.
    pub fn scroll_offset(&self) -> f64 {
        *self.state.lock().scroll.committed()
    }

    /// Returns true when the feed should load the next page. Always false
    /// before the container has been measured.
    pub fn near_bottom(&self) -> bool {
        let mut state = self.state.lock();
        if state.container_width.is_nan() || state.container_width <= 0.0 {
            return false;
        }
        let Some(mode) = state.layout() else {
            return false;
        };
        if !state.pagination.has_more() || state.pagination.is_loading() {
            return false;
        }
        is_near_bottom(
            state.cache.total_height(),
            *state.scroll.committed(),
            state.viewport_height,
            state.config.load_more_threshold(mode),
        )
    }

    /// Current resolution of the layout mode.
    pub fn resolution(&self) -> Resolution {
        self.state.lock().negotiator.resolution()
    }

    /// Pagination snapshot.
    pub fn pagination(&self) -> PaginationState {
        self.state.lock().pagination.state()
    }

    /// Content height of the current layout.
    pub fn total_height(&self) -> f64 {
        let mut state = self.state.lock();
        match state.layout() {
            Some(_) => state.cache.total_height(),
            None => 0.0,
        }
    }

    /// Renders the visible items. Shows an empty placeholder while the mode
    /// is being resolved.
    ///
    /// `render_item` runs under the feed's lock and must not call back into
    /// the feed.
    pub fn view<D, F>(&self, render_item: F) -> FeedView<D>
    where
        F: FnMut(&PositionedItem<'_, L::Item>, usize, LayoutMode) -> D,
    {
        match self.frame(render_item) {
            Some(frame) => FeedView::Ready(frame),
            None => FeedView::Resolving { placeholder: None },
        }
    }

    /// Like [`view`](Self::view), with a custom placeholder.
    pub fn view_with_placeholder<D, F, P>(&self, render_item: F, placeholder: P) -> FeedView<D>
    where
        F: FnMut(&PositionedItem<'_, L::Item>, usize, LayoutMode) -> D,
        P: FnOnce() -> D,
    {
        match self.frame(render_item) {
            Some(frame) => FeedView::Ready(frame),
            None => FeedView::Resolving {
                placeholder: Some(placeholder()),
            },
        }
    }

    fn frame<D, F>(&self, mut render_item: F) -> Option<FeedFrame<D>>
    where
        F: FnMut(&PositionedItem<'_, L::Item>, usize, LayoutMode) -> D,
    {
        let mut state = self.state.lock();
        let mode = state.layout()?;
        let state = &*state;

        let records = state.pagination.items();
        let items = state
            .window(mode)
            .visible(state.cache.placements())
            .filter_map(|placement| {
                let record = records.get(placement.index)?;
                let positioned = PositionedItem {
                    item: record.raw(),
                    rect: placement.rect,
                    original_index: placement.index,
                };
                Some(render_item(&positioned, placement.index, mode))
            })
            .collect();

        let total_height = state.cache.total_height();
        let pagination = state.pagination.state();
        Some(FeedFrame {
            mode,
            total_height,
            items,
            loading: pagination.loading,
            has_more: pagination.has_more,
            sentinel_y: (total_height - 1.0).max(0.0),
        })
    }

    async fn fetch(&self, ticket: FetchTicket) -> LoadOutcome {
        let cached = {
            let mut state = self.state.lock();
            if ticket.page() == 1 && ticket.generation() == state.pagination.generation() {
                state.negotiator.take_cached_first_page()
            } else {
                None
            }
        };

        let result = match cached {
            Some(page) => {
                debug!(items = page.items.len(), "serving page 1 from layout probe");
                Ok(page)
            }
            None => self.loader.load_page(ticket.request()).await,
        };

        let settlement = self
            .state
            .lock()
            .pagination
            .settle(ticket, result, &self.mapper);
        match settlement {
            Settlement::Loaded {
                added,
                page,
                has_more,
                ..
            } => LoadOutcome::Loaded {
                added,
                page,
                has_more,
            },
            Settlement::Failed(error) => {
                self.report_error(&error);
                LoadOutcome::Failed
            }
            Settlement::Stale => LoadOutcome::Stale,
        }
    }

    fn announce_mode(&self) {
        let announcement = self.state.lock().negotiator.take_announcement();
        if let (Some(mode), Some(handler)) = (announcement, &self.on_mode_resolved) {
            handler.call(&mode);
        }
    }

    fn report_error(&self, error: &LoadError) {
        if let Some(handler) = &self.on_error {
            handler.call(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use mosaic_layout::RawSize;
    use rstest::rstest;

    use super::*;
    use crate::loader::{PageRequest, PageResponse};

    type Page = Result<PageResponse<RawSize>, LoadError>;

    fn squares(request: PageRequest) -> Vec<RawSize> {
        vec![RawSize::new(100.0, 100.0); request.page_size as usize]
    }

    #[tokio::test]
    async fn explicit_mode_mounts_without_probe() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let loader = move |request: PageRequest| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Page::Ok(PageResponse::new(squares(request), true).with_is_masonry(false)) }
        };
        let feed = MasonryFeed::new(
            loader,
            FeedConfig::default()
                .page_size(10)
                .layout_mode(LayoutMode::Waterfall),
        );

        assert_eq!(feed.resolution(), Resolution::Resolved(LayoutMode::Waterfall));
        let outcome = feed.mount().await;
        assert_eq!(
            outcome,
            LoadOutcome::Loaded {
                added: 10,
                page: 2,
                has_more: true,
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(feed.resolution(), Resolution::Resolved(LayoutMode::Waterfall));
        assert_eq!(feed.mount().await, LoadOutcome::AlreadyMounted);
    }

    #[tokio::test]
    async fn unresolved_feed_shows_placeholder() {
        let feed = MasonryFeed::new(
            |request: PageRequest| async move { Page::Ok(PageResponse::new(squares(request), false)) },
            FeedConfig::default(),
        );
        feed.set_container_width(800.0);

        assert_eq!(feed.load_more().await, LoadOutcome::Unresolved);
        assert!(!feed.near_bottom());
        assert_eq!(feed.total_height(), 0.0);
        assert_eq!(
            feed.view(|_, index, _| index),
            FeedView::Resolving { placeholder: None }
        );
        assert_eq!(
            feed.view_with_placeholder(|_, index, _| index, || usize::MAX),
            FeedView::Resolving {
                placeholder: Some(usize::MAX)
            }
        );
    }

    #[tokio::test]
    async fn frame_reports_visible_items_and_sentinel() {
        let feed = MasonryFeed::new(
            |request: PageRequest| async move { Page::Ok(PageResponse::new(squares(request), false)) },
            FeedConfig::default()
                .page_size(30)
                .layout_mode(LayoutMode::Waterfall)
                .waterfall(WaterfallConfig::default().buffer(0.0)),
        );
        feed.mount().await;
        feed.set_container_width(1000.0);
        feed.set_viewport_height(300.0);

        let FeedView::Ready(frame) = feed.view(|item, index, mode| {
            assert_eq!(item.original_index, index);
            assert_eq!(mode, LayoutMode::Waterfall);
            index
        }) else {
            panic!("feed should be resolved");
        };
        // 5 columns of 187.2px: rows 0 and 1 touch [0, 300].
        assert_eq!(frame.items, (0..10).collect::<Vec<_>>());
        assert!(!frame.loading);
        assert!(!frame.has_more);
        // 6 rows of 187.2 + 16.
        assert!((frame.total_height - 6.0 * 203.2).abs() < 1e-9);
        assert_eq!(frame.sentinel_y, frame.total_height - 1.0);
    }

    #[rstest]
    #[case(0.0, false)]
    #[case(1400.0, true)]
    #[tokio::test]
    async fn near_bottom_follows_committed_scroll(#[case] scroll: f64, #[case] expected: bool) {
        let feed = MasonryFeed::new(
            |request: PageRequest| async move { Page::Ok(PageResponse::new(squares(request), true)) },
            FeedConfig::default()
                .page_size(50)
                .layout_mode(LayoutMode::Waterfall)
                .waterfall(WaterfallConfig::default().load_more_threshold(100.0)),
        );
        feed.mount().await;
        feed.set_container_width(1000.0);
        feed.set_viewport_height(600.0);
        // 10 rows of 203.2px.
        assert!((feed.total_height() - 2032.0).abs() < 1e-9);

        assert!(feed.set_scroll_offset(scroll / 2.0));
        assert!(!feed.set_scroll_offset(scroll));
        assert_eq!(feed.on_frame(), scroll != 0.0);
        assert_eq!(feed.scroll_offset(), scroll);
        assert_eq!(feed.near_bottom(), expected);
    }

    #[tokio::test]
    async fn unmeasured_container_never_triggers_loading() {
        let feed = MasonryFeed::new(
            |request: PageRequest| async move { Page::Ok(PageResponse::new(squares(request), true)) },
            FeedConfig::default()
                .page_size(10)
                .layout_mode(LayoutMode::Waterfall),
        );
        feed.mount().await;
        feed.set_viewport_height(600.0);

        assert!(!feed.near_bottom());
        assert_eq!(feed.maybe_load_more().await, None);
        assert_eq!(feed.pagination().page, 2);

        feed.set_container_width(1000.0);
        assert!(feed.near_bottom());
    }

    #[tokio::test]
    async fn update_inputs_defers_to_remount() {
        let feed = MasonryFeed::new(
            |request: PageRequest| async move { Page::Ok(PageResponse::new(squares(request), true)) },
            FeedConfig::default().page_size(5),
        );
        assert_eq!(feed.update_inputs(None, 5), InputChange::Unchanged);
        assert_eq!(feed.update_inputs(None, 8), InputChange::RemountRequired);
        assert_eq!(feed.config().page_size, 8);

        feed.mount().await;
        assert_eq!(feed.pagination().item_count, 5);

        feed.remount(Some(LayoutMode::EqualHeight)).await;
        assert_eq!(feed.resolution(), Resolution::Resolved(LayoutMode::EqualHeight));
        assert_eq!(feed.pagination().item_count, 8);
        assert_eq!(feed.pagination().page, 2);
    }
}
