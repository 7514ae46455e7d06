// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! What a `Promise` needs from the host runtime
//!
//! Waiting and timeouts only rely on the two small capabilities below.
//! `Processor` is a minimal single-threaded implementation of both.

use std::time::Duration;

pub use self::processor::Processor;
pub use self::timer::TimerService;

pub mod processor;
pub mod timer;

/// A deferred piece of work
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// The worker driving the current thread
pub trait SchedulerWorker {
    /// Service at most one unit of pending local work.
    ///
    /// Returns whether any work was found.
    fn poll_once(&self) -> bool;

    /// Hold back forward progress briefly. `idle_streak` counts consecutive
    /// calls to `poll_once` that found nothing and starts at 1.
    fn backoff_delay(&self, idle_streak: u32);
}

/// An execution context with its own task queue
pub trait ActorContext {
    /// Run `callback` on this context's queue once `delay` has passed
    fn delayed(&self, delay: Duration, callback: Callback);
}
