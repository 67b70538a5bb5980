//! Per-frame coalescing of high-frequency inputs such as scroll offsets.

/// Collapses any number of updates between two frame ticks into the most
/// recent one.
///
/// The host pushes values as they arrive and schedules a frame callback when
/// [`push`](Self::push) asks for one. On the callback it calls
/// [`on_frame`](Self::on_frame) to commit the latest value.
///
/// # Examples
///
/// ```
/// use mosaic_layout::FrameCoalescer;
///
/// let mut scroll = FrameCoalescer::new(0.0);
/// assert!(scroll.push(10.0));
/// assert!(!scroll.push(20.0));
/// assert!(!scroll.push(30.0));
/// assert_eq!(scroll.on_frame(), Some(30.0));
/// assert_eq!(*scroll.committed(), 30.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FrameCoalescer<T> {
    committed: T,
    pending: Option<T>,
}

impl<T> FrameCoalescer<T> {
    /// Creates a coalescer whose committed value is `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            committed: initial,
            pending: None,
        }
    }

    /// Records `value` as pending. Returns true when a frame must be
    /// scheduled, i.e. nothing was pending before.
    pub fn push(&mut self, value: T) -> bool {
        self.pending.replace(value).is_none()
    }

    /// Commits the pending value, if any, and returns it.
    pub fn on_frame(&mut self) -> Option<T>
    where
        T: Clone,
    {
        let value = self.pending.take()?;
        self.committed = value.clone();
        Some(value)
    }

    /// Drops the pending value without committing it.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Returns true while a frame is scheduled.
    pub fn is_scheduled(&self) -> bool {
        self.pending.is_some()
    }

    /// The last committed value.
    pub fn committed(&self) -> &T {
        &self.committed
    }

    /// Replaces the committed value and drops anything pending.
    pub fn reset(&mut self, value: T) {
        self.committed = value;
        self.pending = None;
    }
}

impl<T: Default> Default for FrameCoalescer<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
