// The MIT License (MIT)

// Copyright (c) 2015 Y. T. Chung <zonyitoo@gmail.com>

// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:

// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Processing unit of a thread
//!
//! A `Processor` owns a FIFO queue of tasks and a heap of delayed tasks.
//! Tasks run to completion on whichever thread drives the processor; a task
//! that waits on a `Promise` keeps driving the queue from inside the wait,
//! so the remaining tasks are not starved.

use std::cell::RefCell;
use std::collections::{BinaryHeap, VecDeque};
use std::hint;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::timer::{pop_expired, Delayed, TimerService};
use super::{ActorContext, Callback, SchedulerWorker};
use crate::options::Options;
use crate::sync::Spinlock;

thread_local!(static PROCESSOR: RefCell<Option<Processor>> = const { RefCell::new(None) });

struct Inner {
    options: Options,
    queue: Spinlock<VecDeque<Callback>>,
    timers: Spinlock<BinaryHeap<Delayed>>,
    timer_seq: AtomicU64,
}

/// Processing unit of a thread
///
/// Handles are cheap to clone and may be sent to other threads to submit
/// work; the tasks themselves only run where the processor is driven.
#[derive(Clone)]
pub struct Processor {
    inner: Arc<Inner>,
}

/// Makes a processor the current one of this thread until dropped
struct EnterGuard {
    previous: Option<Processor>,
}

impl Drop for EnterGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        PROCESSOR.with(|current| *current.borrow_mut() = previous);
    }
}

impl Processor {
    pub fn new() -> Processor {
        Processor::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Processor {
        Processor {
            inner: Arc::new(Inner {
                options,
                queue: Spinlock::new(VecDeque::new()),
                timers: Spinlock::new(BinaryHeap::new()),
                timer_seq: AtomicU64::new(0),
            }),
        }
    }

    /// The processor driving the current thread, if any
    pub fn current() -> Option<Processor> {
        PROCESSOR.with(|current| current.borrow().clone())
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.options.name.as_deref()
    }

    /// Queue a task
    pub fn spawn<F>(&self, f: F)
        where F: FnOnce() + Send + 'static
    {
        self.inner.queue.lock().push_back(Box::new(f));
    }

    /// Number of queued tasks, delayed ones excluded
    pub fn pending(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Number of delayed tasks that have not been released to the queue yet
    pub fn pending_delayed(&self) -> usize {
        self.inner.timers.lock().len()
    }

    /// Drive this processor on the current thread: run `f`, then every task
    /// that is ready, until the queue is empty.
    ///
    /// Delayed tasks that are not due yet are handed to
    /// `TimerService::global()` with their deadlines and run on its thread,
    /// so a timeout armed inside `run` still fires after it returns. Use
    /// `run_until_idle` to keep them on this processor.
    pub fn run<F, T>(&self, f: F) -> T
        where F: FnOnce() -> T
    {
        let _guard = self.enter();
        let ret = f();
        while self.poll_once() {}
        self.hand_off_delayed(TimerService::global());
        ret
    }

    /// Drive this processor until nothing is queued and no delayed task is left.
    pub fn run_until_idle(&self) {
        let _guard = self.enter();
        let mut idle_streak = 0;

        loop {
            if self.poll_once() {
                idle_streak = 0;
                continue;
            }

            if self.pending_delayed() == 0 {
                break;
            }

            idle_streak += 1;
            self.backoff_delay(idle_streak);
        }
    }

    fn enter(&self) -> EnterGuard {
        let previous = PROCESSOR.with(|current| current.borrow_mut().replace(self.clone()));
        EnterGuard { previous }
    }

    // Move due delayed tasks to the back of the queue
    fn release_expired(&self) {
        let now = Instant::now();
        let mut due = Vec::new();
        {
            let mut timers = self.inner.timers.lock();
            while let Some(entry) = pop_expired(&mut timers, now) {
                due.push(entry.into_callback());
            }
        }

        if !due.is_empty() {
            trace!("processor {:?}: {} delayed tasks due", self.name(), due.len());
            self.inner.queue.lock().extend(due);
        }
    }

    // Nobody drives this processor any more, let `timer` run what is left
    fn hand_off_delayed(&self, timer: &TimerService) {
        let entries = mem::take(&mut *self.inner.timers.lock());
        if entries.is_empty() {
            return;
        }

        debug!("processor {:?}: handing {} delayed tasks to timer service {}",
               self.name(),
               entries.len(),
               timer.name());

        for entry in entries {
            let deadline = entry.deadline();
            if let Err(err) = timer.schedule_at(deadline, entry.into_callback()) {
                error!("processor {:?}: failed to hand off delayed task: {}", self.name(), err);
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.inner.timers.lock().peek().map(Delayed::deadline)
    }
}

impl Default for Processor {
    fn default() -> Processor {
        Processor::new()
    }
}

impl SchedulerWorker for Processor {
    fn poll_once(&self) -> bool {
        self.release_expired();

        // Never hold the queue lock while a task runs, it may spawn or wait
        let task = self.inner.queue.lock().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    fn backoff_delay(&self, idle_streak: u32) {
        let opts = &self.inner.options;

        if idle_streak <= opts.spin_rounds {
            for _ in 0..(1u32 << idle_streak.min(10)) {
                hint::spin_loop();
            }
            return;
        }

        if idle_streak <= opts.spin_rounds + opts.yield_rounds {
            thread::yield_now();
            return;
        }

        let steps = idle_streak - opts.spin_rounds - opts.yield_rounds;
        let mut nap = opts.park_step.saturating_mul(steps).min(opts.park_ceiling);
        if let Some(deadline) = self.next_deadline() {
            nap = nap.min(deadline.saturating_duration_since(Instant::now()));
        }

        if steps == 1 {
            debug!("processor {:?}: idle, backing off to sleep", self.name());
        }
        thread::sleep(nap);
    }
}

impl ActorContext for Processor {
    fn delayed(&self, delay: Duration, callback: Callback) {
        let seq = self.inner.timer_seq.fetch_add(1, Ordering::Relaxed);
        let entry = Delayed::new(Instant::now() + delay, seq, callback);
        self.inner.timers.lock().push(entry);
    }
}
