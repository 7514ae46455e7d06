// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Single-fulfillment promises
//!
//! A `Promise` is settled exactly once by its producer and observed by at
//! most one continuation. Further observers attach to the *successor*, a
//! lazily created promise that is settled with the same outcome right after
//! the continuation has run. Chaining off the successor (or off the promise
//! returned by a combinator) builds a forward-linked chain, and a single
//! `settle()` cascades through all of it synchronously.
//!
//! Timeouts are the one exception to "exactly once": a promise that was
//! settled by its armed timeout may still receive the real outcome later.
//! The stored outcome is replaced, but the continuation is not fired again.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{Error, Violation};
use crate::outcome::Outcome;
use crate::sync::Spinlock;

pub use self::wait::{waiting_on, FOREIGN_PARK_INTERVAL};

mod combinators;
mod timeout;
mod wait;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a `Promise`, used for diagnostics only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PromiseId(u64);

impl PromiseId {
    fn next() -> PromiseId {
        PromiseId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PromiseId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type Continuation<T, E> = Box<dyn FnOnce(Outcome<T, E>) + Send + 'static>;

struct State<T, E> {
    // Some(..) once settled
    outcome: Option<Outcome<T, E>>,
    continuation: Option<Continuation<T, E>>,
    registered: bool,
    fired: bool,
    // The fired continuation has returned
    delivered: bool,
    successor: Option<Promise<T, E>>,
    correlation_id: Option<String>,
}

struct Core<T, E> {
    id: PromiseId,
    // Mirrors `state.outcome.is_some()` so waiters can poll without locking
    settled: AtomicBool,
    state: Spinlock<State<T, E>>,
}

/// A single-fulfillment completion handle.
///
/// Cloning is cheap and every clone refers to the same settlement state.
pub struct Promise<T, E>(Arc<Core<T, E>>);

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Promise<T, E> {
        Promise(self.0.clone())
    }
}

#[cold]
#[inline(never)]
fn violated(id: PromiseId, violation: Violation) -> ! {
    error!("promise {}: {}", id, violation);
    panic!("{}", violation);
}

impl<T, E> Promise<T, E> {
    fn with_state(outcome: Option<Outcome<T, E>>) -> Promise<T, E> {
        let settled = outcome.is_some();
        Promise(Arc::new(Core {
            id: PromiseId::next(),
            settled: AtomicBool::new(settled),
            state: Spinlock::new(State {
                outcome,
                continuation: None,
                registered: false,
                fired: false,
                delivered: false,
                successor: None,
                correlation_id: None,
            }),
        }))
    }

    /// Create an unsettled promise
    pub fn new() -> Promise<T, E> {
        Promise::with_state(None)
    }

    /// Create a promise that is already settled with `outcome`
    pub fn with_outcome(outcome: Outcome<T, E>) -> Promise<T, E> {
        Promise::with_state(Some(outcome))
    }

    pub fn resolved(val: T) -> Promise<T, E> {
        Promise::with_outcome(Outcome::Success(val))
    }

    pub fn rejected(err: E) -> Promise<T, E> {
        Promise::with_outcome(Outcome::Failure(err))
    }

    pub fn timed_out() -> Promise<T, E> {
        Promise::with_outcome(Outcome::TimedOut)
    }

    #[inline]
    pub fn id(&self) -> PromiseId {
        self.0.id
    }

    #[inline]
    pub fn is_settled(&self) -> bool {
        self.0.settled.load(Ordering::Acquire)
    }

    /// Whether the registered continuation has been invoked
    pub fn has_fired(&self) -> bool {
        self.0.state.lock().fired
    }

    /// Attach an opaque token for a remoting layer. It is never interpreted here.
    pub fn with_correlation_id<S: Into<String>>(self, id: S) -> Promise<T, E> {
        self.set_correlation_id(id);
        self
    }

    pub fn set_correlation_id<S: Into<String>>(&self, id: S) {
        self.0.state.lock().correlation_id = Some(id.into());
    }

    pub fn correlation_id(&self) -> Option<String> {
        self.0.state.lock().correlation_id.clone()
    }

    /// Follow successor links to the last promise of the chain
    pub fn chain_last(&self) -> Promise<T, E> {
        let mut current = self.clone();
        loop {
            let next = current.0.state.lock().successor.clone();
            match next {
                Some(next) => current = next,
                None => return current,
            }
        }
    }
}

impl<T, E> Promise<T, E>
    where T: Clone + Send + 'static,
          E: Clone + Send + 'static
{
    /// Register the single continuation of this promise and return the
    /// successor, which settles with the same outcome once `sink` has run.
    ///
    /// If the promise is already settled, `sink` runs synchronously on the
    /// calling thread before this returns.
    ///
    /// # Panics
    ///
    /// Panics with `Violation::DoubleRegistration` if a continuation was
    /// registered before, regardless of whether it has fired.
    pub fn register<F>(&self, sink: F) -> Promise<T, E>
        where F: FnOnce(Outcome<T, E>) + Send + 'static
    {
        // The successor is linked in the same critical section that stores
        // the continuation, so a concurrent settle always propagates to it
        self.attach(Box::new(sink), |state| {
            state.successor.get_or_insert_with(Promise::new).clone()
        })
    }

    /// Same as `register`, but does not create a successor.
    pub fn finally_do<F>(&self, sink: F)
        where F: FnOnce(Outcome<T, E>) + Send + 'static
    {
        self.attach(Box::new(sink), |_| ())
    }

    // Store or fire `sink`; `link` runs under the lock once registration is accepted
    fn attach<R, L>(&self, sink: Continuation<T, E>, link: L) -> R
        where L: FnOnce(&mut State<T, E>) -> R
    {
        let mut guard = self.0.state.lock();
        let state = &mut *guard;

        if state.registered {
            drop(guard);
            violated(self.id(), Violation::DoubleRegistration);
        }
        state.registered = true;
        let linked = link(state);

        let outcome = match state.outcome {
            Some(ref outcome) => outcome.clone(),
            None => {
                trace!("promise {}: continuation registered", self.id());
                state.continuation = Some(sink);
                return linked;
            }
        };

        if state.fired {
            drop(guard);
            violated(self.id(), Violation::DoubleFire);
        }
        state.fired = true;
        drop(guard);

        trace!("promise {}: already settled, firing on registration", self.id());
        self.deliver(sink, outcome);
        linked
    }

    /// Settle the promise.
    ///
    /// The first call wins and fires the registered continuation, if any,
    /// followed by the successor. A real outcome arriving after a timeout
    /// replaces the stored outcome without firing again; a timeout arriving
    /// after a real outcome is ignored.
    ///
    /// # Panics
    ///
    /// Panics with `Violation::DoubleSettlement` if the promise was already
    /// settled with anything other than a timeout.
    pub fn settle(&self, outcome: Outcome<T, E>) {
        let mut guard = self.0.state.lock();
        let state = &mut *guard;

        match state.outcome.as_ref().map(Outcome::is_timeout) {
            None => {}
            Some(true) => {
                debug!("promise {}: outcome arrived after timeout", self.id());
                state.outcome = Some(outcome);
                return;
            }
            Some(false) if outcome.is_timeout() => {
                debug!("promise {}: late timeout ignored", self.id());
                return;
            }
            Some(false) => {
                drop(guard);
                violated(self.id(), Violation::DoubleSettlement);
            }
        }

        state.outcome = Some(outcome.clone());
        self.0.settled.store(true, Ordering::Release);

        let continuation = match state.continuation.take() {
            Some(continuation) => continuation,
            None => {
                trace!("promise {}: settled without continuation", self.id());
                return;
            }
        };

        if state.fired {
            drop(guard);
            violated(self.id(), Violation::DoubleFire);
        }
        state.fired = true;
        drop(guard);

        trace!("promise {}: settled, firing continuation", self.id());
        self.deliver(continuation, outcome);
    }

    #[inline]
    pub fn resolve(&self, val: T) {
        self.settle(Outcome::Success(val))
    }

    #[inline]
    pub fn reject(&self, err: E) {
        self.settle(Outcome::Failure(err))
    }

    // Runs outside of the lock, so the continuation may settle other promises.
    // The successor is read only after the continuation returned: one linked
    // while it ran is still pending and gets settled here.
    fn deliver(&self, continuation: Continuation<T, E>, outcome: Outcome<T, E>) {
        continuation(outcome.clone());

        let successor = {
            let mut state = self.0.state.lock();
            state.delivered = true;
            state.successor.clone()
        };

        if let Some(next) = successor {
            trace!("promise {}: propagating to successor {}", self.id(), next.id());
            next.settle(outcome);
        }
    }

    /// The immediate successor, created on demand.
    ///
    /// A successor created after the continuation has run is born settled
    /// with the stored outcome. One created earlier is pending and settles
    /// when the continuation returns; if no continuation is ever registered,
    /// it never settles.
    pub fn chain_tail(&self) -> Promise<T, E> {
        let mut guard = self.0.state.lock();
        let state = &mut *guard;

        if let Some(ref next) = state.successor {
            return next.clone();
        }

        let next = match state.outcome {
            Some(ref outcome) if state.delivered => Promise::with_outcome(outcome.clone()),
            _ => Promise::new(),
        };
        state.successor = Some(next.clone());
        next
    }

    /// A snapshot of the stored outcome
    pub fn outcome(&self) -> Option<Outcome<T, E>> {
        self.0.state.lock().outcome.clone()
    }

    /// The stored result, if settled successfully
    pub fn result(&self) -> Option<T> {
        self.outcome().and_then(Outcome::success)
    }

    /// The stored error, if settled with a failure or timed out
    pub fn error(&self) -> Option<Error<E>> {
        self.outcome().and_then(|outcome| outcome.into_result().err())
    }
}

impl<T, E> Default for Promise<T, E> {
    fn default() -> Promise<T, E> {
        Promise::new()
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0.state.try_lock() {
            Some(state) => {
                f.debug_struct("Promise")
                 .field("id", &self.0.id)
                 .field("outcome", &state.outcome)
                 .field("fired", &state.fired)
                 .finish()
            }
            None => write!(f, "Promise {{ id: {:?}, <locked> }}", self.0.id),
        }
    }
}
