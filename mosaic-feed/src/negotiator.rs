//! Layout-mode negotiation.
//!
//! A feed either knows its layout up front or learns it from the first page:
//! backends may tag that page with `isMasonry`. The negotiator probes page 1
//! at most once per mount and keeps the response, so pagination can use it as
//! its own page 1 instead of fetching it twice.

use mosaic_layout::LayoutMode;
use tracing::{debug, error, warn};

use crate::{
    error::LoadError,
    loader::{PageRequest, PageResponse},
};

/// Resolution progress of a mounted feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// No probe issued yet.
    Undetermined,
    /// The probe for page 1 is in flight.
    Resolving,
    /// The mode is fixed for this mount.
    Resolved(LayoutMode),
}

/// Permission to issue the page-1 probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTicket {
    page_size: u32,
    generation: u64,
}

impl ProbeTicket {
    /// The loader request for the probe.
    pub fn request(&self) -> PageRequest {
        PageRequest {
            page: 1,
            page_size: self.page_size,
        }
    }

    /// Mount generation the probe was issued in.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// What [`ModeNegotiator::begin`] asks the caller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStep {
    /// Nothing to do, the mode is known.
    Resolved(LayoutMode),
    /// Fetch page 1 and pass the result to [`ModeNegotiator::finish`].
    Probe(ProbeTicket),
    /// Another caller holds the probe.
    Waiting,
}

/// Result of [`ModeNegotiator::finish`].
#[derive(Debug)]
pub enum ProbeSettlement {
    /// The mode was taken from the response, or from the default when the
    /// response carried no hint.
    Resolved(LayoutMode),
    /// The probe failed and the default mode was used.
    Fallback {
        /// The default mode.
        mode: LayoutMode,
        /// Probe failure.
        error: LoadError,
    },
    /// The probe belongs to an earlier mount.
    Stale,
}

/// Whether new inputs require a remount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputChange {
    /// Same explicit mode and page size.
    Unchanged,
    /// The explicit mode or page size differs from the mounted one.
    RemountRequired,
}

/// Resolves the layout mode of one mount.
#[derive(Debug)]
pub struct ModeNegotiator<R> {
    explicit: Option<LayoutMode>,
    default_mode: LayoutMode,
    page_size: u32,
    generation: u64,
    resolution: Resolution,
    cached_first_page: Option<PageResponse<R>>,
    announcement: Option<LayoutMode>,
}

impl<R> ModeNegotiator<R> {
    /// Creates a negotiator. An explicit mode resolves immediately.
    pub fn new(explicit: Option<LayoutMode>, default_mode: LayoutMode, page_size: u32) -> Self {
        let resolution = match explicit {
            Some(mode) => Resolution::Resolved(mode),
            None => Resolution::Undetermined,
        };
        Self {
            explicit,
            default_mode,
            page_size: page_size.max(1),
            generation: 0,
            resolution,
            cached_first_page: None,
            announcement: explicit,
        }
    }

    /// Current resolution.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// The resolved mode, if any.
    pub fn mode(&self) -> Option<LayoutMode> {
        match self.resolution {
            Resolution::Resolved(mode) => Some(mode),
            _ => None,
        }
    }

    /// Current mount generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Mode used when the probe carries no hint or fails. Changing it does not
    /// affect an already resolved mount.
    pub fn set_default_mode(&mut self, default_mode: LayoutMode) {
        self.default_mode = default_mode;
    }

    /// Advances resolution. Issues the probe ticket at most once per mount.
    pub fn begin(&mut self) -> ProbeStep {
        match self.resolution {
            Resolution::Resolved(mode) => ProbeStep::Resolved(mode),
            Resolution::Resolving => ProbeStep::Waiting,
            Resolution::Undetermined => {
                self.resolution = Resolution::Resolving;
                debug!(page_size = self.page_size, "probing first page for layout mode");
                ProbeStep::Probe(ProbeTicket {
                    page_size: self.page_size,
                    generation: self.generation,
                })
            }
        }
    }

    /// Resolves the mode from the probe result.
    pub fn finish(
        &mut self,
        ticket: ProbeTicket,
        result: Result<PageResponse<R>, LoadError>,
    ) -> ProbeSettlement {
        if ticket.generation != self.generation || self.resolution != Resolution::Resolving {
            warn!(
                generation = ticket.generation,
                current_generation = self.generation,
                "dropping stale layout probe"
            );
            return ProbeSettlement::Stale;
        }

        let (mode, settlement) = match result {
            Ok(page) => {
                let mode = page
                    .is_masonry
                    .map(LayoutMode::from_is_masonry)
                    .unwrap_or(self.default_mode);
                debug!(
                    ?mode,
                    hinted = page.is_masonry.is_some(),
                    items = page.items.len(),
                    "layout mode resolved"
                );
                self.cached_first_page = Some(page);
                (mode, ProbeSettlement::Resolved(mode))
            }
            Err(err) => {
                let mode = self.default_mode;
                error!(error = %err, ?mode, "layout probe failed, using default mode");
                (mode, ProbeSettlement::Fallback { mode, error: err })
            }
        };

        self.resolution = Resolution::Resolved(mode);
        self.announcement = Some(mode);
        settlement
    }

    /// Hands out the probed page once.
    pub fn take_cached_first_page(&mut self) -> Option<PageResponse<R>> {
        self.cached_first_page.take()
    }

    /// Yields the resolved mode once per mount.
    pub fn take_announcement(&mut self) -> Option<LayoutMode> {
        self.announcement.take()
    }

    /// Compares new inputs against the mounted ones. Never re-probes.
    pub fn update_inputs(&self, explicit: Option<LayoutMode>, page_size: u32) -> InputChange {
        if explicit == self.explicit && page_size.max(1) == self.page_size {
            InputChange::Unchanged
        } else {
            InputChange::RemountRequired
        }
    }

    /// Starts a new mount generation with the given inputs.
    pub fn reset(&mut self, explicit: Option<LayoutMode>, page_size: u32) {
        let generation = self.generation + 1;
        *self = Self::new(explicit, self.default_mode, page_size);
        self.generation = generation;
        debug!(generation, ?explicit, "layout negotiation reset");
    }
}
