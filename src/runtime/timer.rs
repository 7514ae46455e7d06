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

//! Delayed callbacks
//!
//! `TimerService` runs callbacks on a dedicated thread. The thread is only
//! started by the first `schedule()` call and lives as long as its service;
//! the `global()` instance is never dropped.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{self, AtomicU64};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Mutex, OnceLock, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use super::Callback;

/// A callback waiting for its deadline.
///
/// Ordered so that `BinaryHeap` pops the earliest deadline first; entries
/// with the same deadline keep their scheduling order.
pub(crate) struct Delayed {
    deadline: Instant,
    seq: u64,
    callback: Callback,
}

impl Delayed {
    pub(crate) fn new(deadline: Instant, seq: u64, callback: Callback) -> Delayed {
        Delayed {
            deadline,
            seq,
            callback,
        }
    }

    #[inline]
    pub(crate) fn deadline(&self) -> Instant {
        self.deadline
    }

    #[inline]
    pub(crate) fn into_callback(self) -> Callback {
        self.callback
    }
}

impl PartialEq for Delayed {
    fn eq(&self, other: &Delayed) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for Delayed {}

impl PartialOrd for Delayed {
    fn partial_cmp(&self, other: &Delayed) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Delayed {
    fn cmp(&self, other: &Delayed) -> Ordering {
        other.deadline
             .cmp(&self.deadline)
             .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Pop the earliest entry if it is due at `now`
pub(crate) fn pop_expired(heap: &mut BinaryHeap<Delayed>, now: Instant) -> Option<Delayed> {
    if heap.peek()?.deadline <= now {
        heap.pop()
    } else {
        None
    }
}

/// Process-wide fallback for delayed callbacks when no actor context is
/// available.
///
/// Callbacks run on the service's own thread and must be cheap; a slow
/// callback delays every callback behind it.
pub struct TimerService {
    name: String,
    seq: AtomicU64,
    sender: Mutex<Option<Sender<Delayed>>>,
}

impl TimerService {
    pub fn new() -> TimerService {
        TimerService::with_name("coio-timer")
    }

    pub fn with_name<S: Into<String>>(name: S) -> TimerService {
        TimerService {
            name: name.into(),
            seq: AtomicU64::new(0),
            sender: Mutex::new(None),
        }
    }

    /// The process-wide instance
    pub fn global() -> &'static TimerService {
        static GLOBAL: OnceLock<TimerService> = OnceLock::new();
        GLOBAL.get_or_init(TimerService::new)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the service thread has been started
    pub fn is_started(&self) -> bool {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Run `f` on the service thread after `delay`
    pub fn schedule<F>(&self, delay: Duration, f: F) -> io::Result<()>
        where F: FnOnce() + Send + 'static
    {
        self.schedule_at(Instant::now() + delay, f)
    }

    /// Run `f` on the service thread once `deadline` has passed
    pub fn schedule_at<F>(&self, deadline: Instant, f: F) -> io::Result<()>
        where F: FnOnce() + Send + 'static
    {
        let seq = self.seq.fetch_add(1, atomic::Ordering::Relaxed);
        let entry = Delayed::new(deadline, seq, Box::new(f));

        self.sender()?
            .send(entry)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "timer thread has exited"))
    }

    fn sender(&self) -> io::Result<Sender<Delayed>> {
        let mut guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(ref tx) = *guard {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel();
        let name = self.name.clone();
        thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                debug!("timer service {} started", name);
                run_timer(rx);
                debug!("timer service {} exited", name);
            })?;

        *guard = Some(tx.clone());
        Ok(tx)
    }
}

impl Default for TimerService {
    fn default() -> TimerService {
        TimerService::new()
    }
}

fn fire(entry: Delayed) {
    if panic::catch_unwind(AssertUnwindSafe(entry.into_callback())).is_err() {
        error!("timer callback panicked");
    }
}

fn run_timer(rx: Receiver<Delayed>) {
    let mut heap = BinaryHeap::new();

    loop {
        while let Some(entry) = pop_expired(&mut heap, Instant::now()) {
            fire(entry);
        }

        let received = match heap.peek() {
            Some(next) => rx.recv_timeout(next.deadline.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(entry) => heap.push(entry),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    // The service is gone, still honour what was scheduled
    while let Some(entry) = heap.pop() {
        thread::sleep(entry.deadline.saturating_duration_since(Instant::now()));
        fire(entry);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::sync::{Arc, Mutex};

    #[test]
    fn test_delayed_order() {
        let now = Instant::now();
        let mut heap = BinaryHeap::new();
        heap.push(Delayed::new(now + Duration::from_millis(20), 0, Box::new(|| {})));
        heap.push(Delayed::new(now + Duration::from_millis(10), 1, Box::new(|| {})));
        heap.push(Delayed::new(now + Duration::from_millis(10), 2, Box::new(|| {})));

        assert!(pop_expired(&mut heap, now).is_none());

        let later = now + Duration::from_millis(15);
        let first = pop_expired(&mut heap, later).unwrap();
        let second = pop_expired(&mut heap, later).unwrap();
        assert_eq!((first.seq, second.seq), (1, 2));
        assert!(pop_expired(&mut heap, later).is_none());
    }

    #[test]
    fn test_lazily_started() {
        let timer = TimerService::with_name("test-timer");
        assert!(!timer.is_started());

        let (tx, rx) = mpsc::channel();
        timer.schedule(Duration::from_millis(5), move || tx.send(()).unwrap()).unwrap();
        assert!(timer.is_started());
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn test_fires_in_deadline_order() {
        let timer = TimerService::new();
        let fired = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel();

        for &(delay, tag) in &[(30u64, "c"), (10, "a"), (20, "b")] {
            let fired = fired.clone();
            let tx = tx.clone();
            timer.schedule(Duration::from_millis(delay), move || {
                fired.lock().unwrap().push(tag);
                tx.send(()).unwrap();
            }).unwrap();
        }

        for _ in 0..3 {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
        assert_eq!(*fired.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_survives_panicking_callback() {
        let timer = TimerService::new();
        let (tx, rx) = mpsc::channel();

        timer.schedule(Duration::from_millis(1), || panic!("callback failure")).unwrap();
        timer.schedule(Duration::from_millis(5), move || tx.send(7).unwrap()).unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
    }

    #[test]
    fn test_schedule_at_past_deadline_fires() {
        let timer = TimerService::new();
        let (tx, rx) = mpsc::channel();

        let deadline = Instant::now();
        thread::sleep(Duration::from_millis(2));
        timer.schedule_at(deadline, move || tx.send("due").unwrap()).unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "due");
    }

    #[test]
    fn test_global_is_shared() {
        assert!(std::ptr::eq(TimerService::global(), TimerService::global()));
    }
}
