// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Single-assignment result cell for asynchronous calls.
//!
//! A [`Completer`] resolves the cell exactly once; any number of
//! [`PendingResult`] clones observe the outcome, by blocking
//! ([`PendingResult::wait`]), by polling ([`PendingResult::try_result`]),
//! through a subscription ([`PendingResult::on_complete`]) or by `.await`.
//!
//! The first completion wins. Later attempts are discarded and reported
//! to the caller as `false`. A completer dropped without completing
//! resolves the cell with the error produced by its `on_abandon` closure,
//! so a waiter is never left hanging.
//!
//! # Thread Safety
//!
//! The outcome is published under the cell's lock before waiters are
//! notified; every observer sees the fully written value.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

type Subscriber<T, E> = Box<dyn FnOnce(&Result<T, E>) + Send>;
type AbandonFn<E> = Box<dyn FnOnce() -> E + Send>;

struct State<T, E> {
    outcome: Option<Arc<Result<T, E>>>,
    wakers: Vec<Waker>,
    subscribers: Vec<Subscriber<T, E>>,
}

struct Shared<T, E> {
    state: Mutex<State<T, E>>,
    ready: Condvar,
}

/// Create an unresolved cell.
///
/// `on_abandon` produces the error stored if the completer is dropped
/// without completing.
pub fn channel<T, E>(
    on_abandon: impl FnOnce() -> E + Send + 'static,
) -> (Completer<T, E>, PendingResult<T, E>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            outcome: None,
            wakers: Vec::new(),
            subscribers: Vec::new(),
        }),
        ready: Condvar::new(),
    });
    let completer = Completer {
        shared: shared.clone(),
        on_abandon: Mutex::new(Some(Box::new(on_abandon))),
    };
    (completer, PendingResult { shared })
}

/// Write side of a pending result.
pub struct Completer<T, E> {
    shared: Arc<Shared<T, E>>,
    on_abandon: Mutex<Option<AbandonFn<E>>>,
}

impl<T, E> Completer<T, E> {
    /// Resolve the cell. Returns `false` if it was already resolved, in
    /// which case `outcome` is dropped.
    pub fn complete(&self, outcome: Result<T, E>) -> bool {
        let (outcome, wakers, subscribers) = {
            let mut state = self.shared.state.lock();
            if state.outcome.is_some() {
                log::warn!("pending result already resolved, discarding late completion");
                return false;
            }
            let outcome = Arc::new(outcome);
            state.outcome = Some(outcome.clone());
            (
                outcome,
                std::mem::take(&mut state.wakers),
                std::mem::take(&mut state.subscribers),
            )
        };
        self.shared.ready.notify_all();
        self.on_abandon.lock().take();

        for waker in wakers {
            waker.wake();
        }
        for subscriber in subscribers {
            subscriber(&outcome);
        }
        true
    }

    pub fn succeed(&self, value: T) -> bool {
        self.complete(Ok(value))
    }

    pub fn fail(&self, error: E) -> bool {
        self.complete(Err(error))
    }

    /// Whether the cell has been resolved, by this completer or otherwise.
    pub fn is_completed(&self) -> bool {
        self.shared.state.lock().outcome.is_some()
    }
}

impl<T, E> Drop for Completer<T, E> {
    fn drop(&mut self) {
        if let Some(on_abandon) = self.on_abandon.get_mut().take() {
            if !self.is_completed() {
                log::debug!("completer dropped before completion");
                self.complete(Err(on_abandon()));
            }
        }
    }
}

impl<T, E> fmt::Debug for Completer<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer")
            .field("completed", &self.is_completed())
            .finish()
    }
}

/// Read side of a single-assignment result. Cheap to clone; every clone
/// observes the same outcome.
pub struct PendingResult<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for PendingResult<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T, E> PendingResult<T, E> {
    /// Whether the outcome is available.
    pub fn is_ready(&self) -> bool {
        self.shared.state.lock().outcome.is_some()
    }

    /// Run `subscriber` once with the outcome.
    ///
    /// If the cell is already resolved the subscriber runs immediately on
    /// the calling thread, otherwise on the thread that resolves it.
    pub fn on_complete(&self, subscriber: impl FnOnce(&Result<T, E>) + Send + 'static) {
        let resolved = {
            let mut state = self.shared.state.lock();
            match &state.outcome {
                Some(outcome) => outcome.clone(),
                None => {
                    state.subscribers.push(Box::new(subscriber));
                    return;
                }
            }
        };
        subscriber(&resolved);
    }
}

impl<T: Clone, E: Clone> PendingResult<T, E> {
    /// Outcome if already resolved.
    pub fn try_result(&self) -> Option<Result<T, E>> {
        self.shared
            .state
            .lock()
            .outcome
            .as_deref()
            .cloned()
    }

    /// Block the calling thread until the outcome is available.
    pub fn wait(&self) -> Result<T, E> {
        let mut state = self.shared.state.lock();
        loop {
            if let Some(outcome) = &state.outcome {
                return (**outcome).clone();
            }
            self.shared.ready.wait(&mut state);
        }
    }

    /// Block for at most `timeout`. `None` means the call is still running;
    /// the call itself is not affected.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T, E>> {
        if let Some(outcome) = self.try_result() {
            return Some(outcome);
        }
        // A deadline past the end of `Instant` is no deadline at all.
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Some(self.wait());
        };
        let mut state = self.shared.state.lock();
        loop {
            if let Some(outcome) = &state.outcome {
                return Some((**outcome).clone());
            }
            if self
                .shared
                .ready
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return state.outcome.as_deref().cloned();
            }
        }
    }
}

impl<T: Clone, E: Clone> Future for PendingResult<T, E> {
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.state.lock();
        if let Some(outcome) = &state.outcome {
            return Poll::Ready((**outcome).clone());
        }
        if !state.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            state.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

impl<T, E> fmt::Debug for PendingResult<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingResult")
            .field("ready", &self.is_ready())
            .finish()
    }
}
