// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Blocking on a promise
//!
//! A thread driven by a `SchedulerWorker` keeps servicing its own queue while
//! it waits, so sibling tasks on the same worker still make progress. Any
//! other thread just polls the settled flag in short parks.

use std::cell::RefCell;
use std::thread;
use std::time::Duration;

use super::{Promise, PromiseId};
use crate::error::Error;
use crate::runtime::{Processor, SchedulerWorker};

/// How long a thread outside of any worker parks between two checks
pub const FOREIGN_PARK_INTERVAL: Duration = Duration::from_micros(500);

thread_local!(static WAIT_STACK: RefCell<Vec<PromiseId>> = const { RefCell::new(Vec::new()) });

/// Promises the current thread is blocked on while its worker backs off,
/// outermost first.
pub fn waiting_on() -> Vec<PromiseId> {
    WAIT_STACK.with(|stack| stack.borrow().clone())
}

struct WaitStackEntry;

impl WaitStackEntry {
    fn push(id: PromiseId) -> WaitStackEntry {
        WAIT_STACK.with(|stack| stack.borrow_mut().push(id));
        WaitStackEntry
    }
}

impl Drop for WaitStackEntry {
    fn drop(&mut self) {
        WAIT_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

impl<T, E> Promise<T, E>
    where T: Clone + Send + 'static,
          E: Clone + Send + 'static
{
    /// Block until settled and return the result.
    ///
    /// Inside a `Processor` the wait cooperates with it; see `wait_with`.
    pub fn wait(&self) -> Result<T, Error<E>> {
        self.wait_settled().settled_result()
    }

    /// Block until settled, servicing `worker` while waiting.
    ///
    /// With `Some(worker)` the loop polls the worker for pending work and
    /// only backs off, with a delay chosen by the worker, while it is idle.
    /// With `None` the calling thread parks for `FOREIGN_PARK_INTERVAL`
    /// between checks.
    pub fn wait_with(&self, worker: Option<&dyn SchedulerWorker>) -> Result<T, Error<E>> {
        match worker {
            Some(worker) => self.block_on_worker(worker),
            None => self.block_foreign(),
        }
        self.settled_result()
    }

    /// Block until settled and return the promise itself
    pub fn wait_settled(&self) -> &Promise<T, E> {
        match Processor::current() {
            Some(processor) => self.block_on_worker(&processor),
            None => self.block_foreign(),
        }
        self
    }

    fn block_on_worker(&self, worker: &dyn SchedulerWorker) {
        let mut idle_streak = 0u32;

        while !self.is_settled() {
            if worker.poll_once() {
                idle_streak = 0;
                continue;
            }

            idle_streak = idle_streak.saturating_add(1);
            let _entry = WaitStackEntry::push(self.id());
            worker.backoff_delay(idle_streak);
        }
    }

    fn block_foreign(&self) {
        while !self.is_settled() {
            thread::park_timeout(FOREIGN_PARK_INTERVAL);
        }
    }

    fn settled_result(&self) -> Result<T, Error<E>> {
        match self.outcome() {
            Some(outcome) => outcome.into_result(),
            None => unreachable!("promise {} read before settlement", self.id()),
        }
    }
}
