//! Ordered candidate lists where the first success wins.
//!
//! The portal forces a lot of "try this, then that" logic: header aliases,
//! URL patterns, download links, UI selectors, filter widgets. All of them go
//! through [`CandidateList`] so the ordering rule lives in one place.

use std::fmt::Debug;
use std::future::Future;

use tracing::trace;

/// An ordered, borrowed list of candidates with a label for logging.
#[derive(Debug, Clone, Copy)]
pub struct CandidateList<'a, T> {
    label: &'a str,
    items: &'a [T],
}

impl<'a, T: Debug> CandidateList<'a, T> {
    pub fn new(label: &'a str, items: &'a [T]) -> Self {
        Self { label, items }
    }

    pub fn items(&self) -> &'a [T] {
        self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Return the first `Some` produced by `attempt`, in list order.
    pub fn first<R>(&self, mut attempt: impl FnMut(&'a T) -> Option<R>) -> Option<R> {
        for (position, item) in self.items.iter().enumerate() {
            if let Some(found) = attempt(item) {
                trace!("{}: candidate {} matched ({:?})", self.label, position, item);
                return Some(found);
            }
        }
        None
    }

    /// Async variant of [`first`](Self::first).
    pub async fn first_async<R, F, Fut>(&self, mut attempt: F) -> Option<R>
    where
        F: FnMut(&'a T) -> Fut,
        Fut: Future<Output = Option<R>>,
    {
        for (position, item) in self.items.iter().enumerate() {
            if let Some(found) = attempt(item).await {
                trace!("{}: candidate {} matched ({:?})", self.label, position, item);
                return Some(found);
            }
        }
        None
    }

    /// Return the first `Ok`, or every error in candidate order if none succeeded.
    pub async fn first_ok<R, E, F, Fut>(&self, mut attempt: F) -> Result<R, Vec<E>>
    where
        F: FnMut(&'a T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let mut errors = Vec::new();
        for (position, item) in self.items.iter().enumerate() {
            match attempt(item).await {
                Ok(found) => {
                    trace!("{}: candidate {} succeeded ({:?})", self.label, position, item);
                    return Ok(found);
                }
                Err(e) => errors.push(e),
            }
        }
        Err(errors)
    }
}
