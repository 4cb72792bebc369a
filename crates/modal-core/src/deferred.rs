#![forbid(unsafe_code)]

//! Single-shot, externally resolvable completion signal.
//!
//! A [`Deferred`] is settled at most once, either by [`Deferred::resolve`] or
//! [`Deferred::reject`]. Any number of independent waiters can observe the
//! outcome through [`Deferred::wait`] or [`Deferred::then`].
//!
//! # Invariants
//!
//! 1. Only the first `resolve`/`reject` call has an effect; later calls
//!    return `false` and change nothing.
//! 2. Continuations never run inside the settling call. Settling only wakes
//!    the registered wakers (in attach order); each continuation runs the
//!    next time its executor polls it.
//! 3. Every waiter observes the same outcome, exactly once.
//!
//! # Failure Modes
//!
//! - A waiter dropped before settlement releases its waker slot, so
//!   repeatedly polling and abandoning waits does not grow the waiter set.
//! - A deferred that is never settled keeps its waiters pending forever.
//!   There is no cancellation.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

struct Shared<T, E> {
    outcome: Option<Result<T, E>>,
    /// Wakers keyed by attach order. Taken (and emptied) on settlement.
    waiters: BTreeMap<u64, Waker>,
    next_key: u64,
}

/// Externally resolvable single-shot signal.
///
/// Cloning a `Deferred` yields another handle to the same signal.
pub struct Deferred<T, E = Infallible> {
    shared: Rc<RefCell<Shared<T, E>>>,
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T, E> Default for Deferred<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.shared.borrow();
        f.debug_struct("Deferred")
            .field("settled", &shared.outcome.is_some())
            .field("waiters", &shared.waiters.len())
            .finish()
    }
}

impl<T, E> Deferred<T, E> {
    /// Create an unsettled signal.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Rc::new(RefCell::new(Shared {
                outcome: None,
                waiters: BTreeMap::new(),
                next_key: 0,
            })),
        }
    }

    /// Fulfil the signal. Returns `true` if this call settled it.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Reject the signal. Returns `true` if this call settled it.
    pub fn reject(&self, error: E) -> bool {
        self.settle(Err(error))
    }

    /// Whether the signal has been resolved or rejected.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.shared.borrow().outcome.is_some()
    }

    /// Number of wakers currently waiting for settlement.
    #[must_use]
    pub fn waiter_count(&self) -> usize {
        self.shared.borrow().waiters.len()
    }

    fn settle(&self, outcome: Result<T, E>) -> bool {
        let waiters = {
            let mut shared = self.shared.borrow_mut();
            if shared.outcome.is_some() {
                return false;
            }
            shared.outcome = Some(outcome);
            std::mem::take(&mut shared.waiters)
        };
        // Borrow released: a waker that polls inline cannot deadlock us.
        for waker in waiters.into_values() {
            waker.wake();
        }
        true
    }
}

impl<T: Clone, E: Clone> Deferred<T, E> {
    /// The settled outcome, if any.
    #[must_use]
    pub fn outcome(&self) -> Option<Result<T, E>> {
        self.shared.borrow().outcome.clone()
    }

    /// A future completing with the outcome once the signal settles.
    ///
    /// Each call returns an independent waiter.
    #[must_use]
    pub fn wait(&self) -> Wait<T, E> {
        Wait {
            shared: Rc::clone(&self.shared),
            key: None,
        }
    }

    /// Attach continuations for either outcome.
    ///
    /// The returned future must be driven by an executor; the chosen
    /// continuation runs when it is polled after settlement.
    pub fn then<U, F, R>(
        &self,
        on_fulfilled: F,
        on_rejected: R,
    ) -> impl Future<Output = U> + use<T, E, U, F, R>
    where
        F: FnOnce(T) -> U,
        R: FnOnce(E) -> U,
    {
        let wait = self.wait();
        async move {
            match wait.await {
                Ok(value) => on_fulfilled(value),
                Err(error) => on_rejected(error),
            }
        }
    }
}

/// Future returned by [`Deferred::wait`].
pub struct Wait<T, E> {
    shared: Rc<RefCell<Shared<T, E>>>,
    /// Key of this waiter's waker while the signal is pending.
    key: Option<u64>,
}

impl<T, E> fmt::Debug for Wait<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wait").field("key", &self.key).finish()
    }
}

impl<T: Clone, E: Clone> Future for Wait<T, E> {
    type Output = Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let mut shared = this.shared.borrow_mut();
        if let Some(outcome) = &shared.outcome {
            return Poll::Ready(outcome.clone());
        }
        match this.key.and_then(|key| shared.waiters.get_mut(&key)) {
            Some(waker) => {
                if !waker.will_wake(cx.waker()) {
                    *waker = cx.waker().clone();
                }
            }
            None => {
                let key = shared.next_key;
                shared.next_key += 1;
                shared.waiters.insert(key, cx.waker().clone());
                this.key = Some(key);
            }
        }
        Poll::Pending
    }
}

impl<T, E> Drop for Wait<T, E> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take()
            && let Ok(mut shared) = self.shared.try_borrow_mut()
        {
            shared.waiters.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::{LocalPool, block_on};
    use futures::task::LocalSpawnExt;
    use std::cell::Cell;

    #[test]
    fn first_resolve_wins() {
        let deferred: Deferred<u32> = Deferred::new();
        assert!(!deferred.is_settled());
        assert!(deferred.resolve(1));
        assert!(!deferred.resolve(2));
        assert_eq!(deferred.outcome(), Some(Ok(1)));
    }

    #[test]
    fn reject_after_resolve_is_ignored() {
        let deferred: Deferred<u32, &'static str> = Deferred::new();
        deferred.resolve(7);
        assert!(!deferred.reject("late"));
        assert_eq!(deferred.outcome(), Some(Ok(7)));
    }

    #[test]
    fn wait_after_settlement_is_ready() {
        let deferred: Deferred<&'static str> = Deferred::new();
        deferred.resolve("done");
        assert_eq!(block_on(deferred.wait()), Ok("done"));
        assert_eq!(block_on(deferred.wait()), Ok("done"));
    }

    #[test]
    fn continuations_do_not_run_inside_resolve() {
        let mut pool = LocalPool::new();
        let spawner = pool.spawner();
        let deferred: Deferred<()> = Deferred::new();
        let fired = Rc::new(Cell::new(0));

        let counter = Rc::clone(&fired);
        spawner
            .spawn_local(deferred.then(
                move |()| counter.set(counter.get() + 1),
                |never| match never {},
            ))
            .expect("spawn");
        pool.run_until_stalled();
        assert_eq!(deferred.waiter_count(), 1);

        deferred.resolve(());
        assert_eq!(fired.get(), 0, "resolve must not run continuations inline");

        pool.run_until_stalled();
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn continuations_fire_once_in_attach_order() {
        let mut pool = LocalPool::new();
        let spawner = pool.spawner();
        let deferred: Deferred<u8> = Deferred::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let log = Rc::clone(&log);
            spawner
                .spawn_local(deferred.then(
                    move |v| log.borrow_mut().push(format!("{tag}{v}")),
                    |never| match never {},
                ))
                .expect("spawn");
        }
        pool.run_until_stalled();

        deferred.resolve(1);
        deferred.resolve(2);
        pool.run_until_stalled();

        assert_eq!(*log.borrow(), vec!["a1", "b1", "c1"]);
    }

    #[test]
    fn rejection_routes_to_on_rejected() {
        let deferred: Deferred<u8, String> = Deferred::new();
        deferred.reject("boom".to_owned());
        let out = block_on(deferred.then(|_| "ok".to_owned(), |e| format!("err:{e}")));
        assert_eq!(out, "err:boom");
    }

    #[test]
    fn repeated_polls_reuse_waiter_slot() {
        let mut pool = LocalPool::new();
        let spawner = pool.spawner();
        let deferred: Deferred<()> = Deferred::new();

        spawner
            .spawn_local({
                let wait = deferred.wait();
                async move {
                    let _ = wait.await;
                }
            })
            .expect("spawn");
        pool.run_until_stalled();
        pool.run_until_stalled();
        assert_eq!(deferred.waiter_count(), 1);
    }

    #[test]
    fn dropped_waits_release_their_slot() {
        let deferred: Deferred<u8> = Deferred::new();
        let mut cx = Context::from_waker(Waker::noop());

        for _ in 0..10_000 {
            let mut wait = deferred.wait();
            assert!(Pin::new(&mut wait).poll(&mut cx).is_pending());
        }
        assert_eq!(deferred.waiter_count(), 0);

        let mut kept = deferred.wait();
        assert!(Pin::new(&mut kept).poll(&mut cx).is_pending());
        let mut abandoned = deferred.wait();
        assert!(Pin::new(&mut abandoned).poll(&mut cx).is_pending());
        drop(abandoned);
        assert_eq!(deferred.waiter_count(), 1);

        deferred.resolve(3);
        assert_eq!(Pin::new(&mut kept).poll(&mut cx), Poll::Ready(Ok(3)));
    }
}
