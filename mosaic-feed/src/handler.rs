//! Identity-compared event handlers.

use std::sync::Arc;

/// Shared handler for feed events such as load failures or mode resolution.
///
/// `Handler` compares by identity (`Arc::ptr_eq`), so configurations holding
/// handlers stay comparable without comparing closures.
pub struct Handler<T: ?Sized> {
    inner: Arc<dyn Fn(&T) + Send + Sync>,
}

impl<T: ?Sized> Handler<T> {
    /// Creates a handler from a closure.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(handler),
        }
    }

    /// Invokes the handler.
    pub fn call(&self, value: &T) {
        (self.inner)(value)
    }
}

impl<T: ?Sized> Clone for Handler<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: ?Sized> PartialEq for Handler<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: ?Sized> Eq for Handler<T> {}

impl<T: ?Sized> std::fmt::Debug for Handler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Handler")
    }
}

impl<T: ?Sized, F> From<F> for Handler<T>
where
    F: Fn(&T) + Send + Sync + 'static,
{
    fn from(handler: F) -> Self {
        Self::new(handler)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn compares_by_identity() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handler = Handler::<str>::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let same = handler.clone();
        let other = Handler::<str>::new(|_| {});

        assert_eq!(handler, same);
        assert_ne!(handler, other);

        same.call("x");
        handler.call("y");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
