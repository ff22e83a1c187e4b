//! This module provides the admission control used to throttle asset processing.

use std::num::NonZeroUsize;
use std::sync::Arc;

use futures::future::{self, Future};
use tokio::sync::Semaphore;

/// A reusable gate admitting at most `quota` concurrently running futures.
///
/// Futures are not spawned: they run wherever the returned handles are awaited, usually multiplexed within a single task with
/// [`join_all`](futures::future::join_all). Pending futures are admitted first-in-first-out (the underlying [`Semaphore`] is fair) as
/// running ones complete, whatever their outcome. Completion order is left untouched and nothing is retried, timed out or canceled.
///
/// Cloning a limiter shares its quota, so a single limiter can gate any number of independent fan-outs.
///
/// # Example
/// ```
/// # tokio_test::block_on(async {
/// # use std::num::NonZeroUsize;
/// # use importer::limit::Limiter;
/// let limiter = Limiter::new(NonZeroUsize::new(2).unwrap());
///
/// let squares = limiter.run_all((0..=5).map(|i| async move { i * i })).await;
///
/// assert_eq!(squares, [0, 1, 4, 9, 16, 25]);
/// # })
/// ```
#[derive(Debug, Clone)]
pub struct Limiter {
    semaphore: Arc<Semaphore>,
    quota: NonZeroUsize,
}

impl Limiter {
    /// Create a limiter admitting at most `quota` futures at once.
    pub fn new(quota: NonZeroUsize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(quota.get())),
            quota,
        }
    }

    #[inline]
    pub fn quota(&self) -> usize {
        self.quota.get()
    }

    /// Number of futures currently admitted.
    #[inline]
    pub fn running(&self) -> usize {
        self.quota.get() - self.semaphore.available_permits()
    }

    /// Submit a future and return its handle.
    ///
    /// The handle resolves exactly to the future output, once the future has been admitted and has completed.
    /// Submission order is the order in which handles are first polled:
    /// ```
    /// # tokio_test::block_on(async {
    /// # use importer::limit::Limiter;
    /// let limiter = Limiter::new(std::num::NonZeroUsize::MIN);
    ///
    /// let (a, b) = futures::join!(limiter.run(async { "a" }), limiter.run(async { Err::<(), _>("b") }));
    ///
    /// assert_eq!((a, b), ("a", Err("b")));
    /// # })
    /// ```
    pub async fn run<F: Future>(&self, future: F) -> F::Output {
        // the semaphore is never closed, the permit is held by the `Ok` variant until the future completes
        let _permit = self.semaphore.acquire().await;

        future.await
    }

    /// Submit all futures in order and wait for every one of them.
    ///
    /// Outputs are returned in submission order, whatever the completion order. An empty set resolves immediately.
    pub async fn run_all<I>(&self, futures: I) -> Vec<<I::Item as Future>::Output>
    where
        I: IntoIterator,
        I::Item: Future,
    {
        future::join_all(futures.into_iter().map(|future| self.run(future))).await
    }
}
