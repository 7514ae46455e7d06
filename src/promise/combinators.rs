// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Continuation algebra
//!
//! Every combinator consumes the single continuation slot of `self`, so
//! combinators have to be chained off the promise returned by the previous
//! one. Fanning out from one promise panics with a double registration.

use super::Promise;
use crate::error::Error;
use crate::outcome::Outcome;

impl<T, E> Promise<T, E>
    where T: Clone + Send + 'static,
          E: Clone + Send + 'static
{
    /// Transform the successful result, forwarding errors untouched.
    pub fn map<U, F>(&self, f: F) -> Promise<U, E>
        where U: Clone + Send + 'static,
              F: FnOnce(T) -> U + Send + 'static
    {
        let next = Promise::new();
        let sink = next.clone();
        self.finally_do(move |outcome| sink.settle(outcome.map(f)));
        next
    }

    /// Continue with the promise returned by `f`.
    ///
    /// The returned promise settles only once the nested one has.
    pub fn flat_map<U, F>(&self, f: F) -> Promise<U, E>
        where U: Clone + Send + 'static,
              F: FnOnce(T) -> Promise<U, E> + Send + 'static
    {
        let next = Promise::new();
        let sink = next.clone();
        self.finally_do(move |outcome| {
            match outcome {
                Outcome::Success(val) => f(val).finally_do(move |nested| sink.settle(nested)),
                Outcome::Failure(err) => sink.settle(Outcome::Failure(err)),
                Outcome::TimedOut => sink.settle(Outcome::TimedOut),
            }
        });
        next
    }

    /// Run a side effect on success; the returned promise carries no payload.
    pub fn tap<F>(&self, f: F) -> Promise<(), E>
        where F: FnOnce(T) + Send + 'static
    {
        self.map(f)
    }

    /// Invoke `f` only on success. The returned successor carries the
    /// original outcome.
    pub fn on_result<F>(&self, f: F) -> Promise<T, E>
        where F: FnOnce(T) + Send + 'static
    {
        self.register(move |outcome| {
            if let Outcome::Success(val) = outcome {
                f(val);
            }
        })
    }

    /// Invoke `f` only on a domain error. Timeouts are not reported here.
    pub fn on_error<F>(&self, f: F) -> Promise<T, E>
        where F: FnOnce(E) + Send + 'static
    {
        self.register(move |outcome| {
            if let Outcome::Failure(err) = outcome {
                f(err);
            }
        })
    }

    /// Invoke `f` only if the promise timed out.
    pub fn on_timeout<F>(&self, f: F) -> Promise<T, E>
        where F: FnOnce() + Send + 'static
    {
        self.register(move |outcome| {
            if outcome.is_timeout() {
                f();
            }
        })
    }

    /// Recover from a domain error or a timeout with the promise returned by `f`.
    ///
    /// A successful outcome passes through unchanged.
    pub fn catch_error<F>(&self, f: F) -> Promise<T, E>
        where F: FnOnce(Error<E>) -> Promise<T, E> + Send + 'static
    {
        let next = Promise::new();
        let sink = next.clone();
        self.finally_do(move |outcome| {
            match outcome.into_result() {
                Ok(val) => sink.settle(Outcome::Success(val)),
                Err(err) => f(err).finally_do(move |nested| sink.settle(nested)),
            }
        });
        next
    }

    /// Run a side effect on a domain error or a timeout.
    ///
    /// The returned promise succeeds without payload either way.
    pub fn catch_error_tap<F>(&self, f: F) -> Promise<(), E>
        where F: FnOnce(Error<E>) + Send + 'static
    {
        let next = Promise::new();
        let sink = next.clone();
        self.finally_do(move |outcome| {
            if let Err(err) = outcome.into_result() {
                f(err);
            }
            sink.resolve(());
        });
        next
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use rand::Rng;

    type P<T> = Promise<T, String>;

    #[test]
    fn test_map() {
        let f = P::<u32>::new();
        let g = f.map(|v| v * 2);
        assert!(!g.is_settled());

        f.resolve(21);
        assert_eq!(g.outcome(), Some(Outcome::Success(42)));
    }

    #[test]
    fn test_map_skips_function_on_error() {
        let called = Arc::new(AtomicUsize::new(0));
        let f = P::<u32>::new();
        let g = {
            let called = called.clone();
            f.map(move |v| {
                called.fetch_add(1, Ordering::SeqCst);
                v
            })
        };

        f.reject("nope".to_owned());
        assert_eq!(g.error(), Some(Error::Failed("nope".to_owned())));
        assert_eq!(called.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_flat_map_waits_for_nested() {
        let f = P::<u32>::new();
        let nested = P::<String>::new();

        let g = {
            let nested = nested.clone();
            f.flat_map(move |v| {
                assert_eq!(v, 3);
                nested
            })
        };

        f.resolve(3);
        assert!(!g.is_settled());

        nested.resolve("three".to_owned());
        assert_eq!(g.result(), Some("three".to_owned()));
    }

    #[test]
    fn test_flat_map_forwards_timeout() {
        let f = P::<u32>::new();
        let g = f.flat_map(|_| -> P<u32> { panic!("must not run on timeout") });
        f.settle(Outcome::TimedOut);
        assert_eq!(g.error(), Some(Error::Timeout));
    }

    #[test]
    fn test_tap() {
        let seen = Arc::new(Mutex::new(None));
        let f = P::<u32>::resolved(8);
        let g = {
            let seen = seen.clone();
            f.tap(move |v| *seen.lock().unwrap() = Some(v))
        };

        assert_eq!(*seen.lock().unwrap(), Some(8));
        assert_eq!(g.outcome(), Some(Outcome::Success(())));
    }

    #[test]
    fn test_outcome_filters() {
        let hits = Arc::new(Mutex::new(Vec::new()));

        let record = |tag: &'static str| {
            let hits = hits.clone();
            move || hits.lock().unwrap().push(tag)
        };

        let ok = P::<u32>::new();
        let (r, e, t) = (record("result"), record("error"), record("timeout"));
        let tail = ok.on_result(move |_| r()).on_error(move |_| e()).on_timeout(t);
        ok.resolve(1);
        assert_eq!(*hits.lock().unwrap(), vec!["result"]);
        assert_eq!(tail.result(), Some(1));

        hits.lock().unwrap().clear();
        let failed = P::<u32>::new();
        let (r, e, t) = (record("result"), record("error"), record("timeout"));
        let tail = failed.on_result(move |_| r()).on_error(move |_| e()).on_timeout(t);
        failed.reject("x".to_owned());
        assert_eq!(*hits.lock().unwrap(), vec!["error"]);
        assert_eq!(tail.error(), Some(Error::Failed("x".to_owned())));

        hits.lock().unwrap().clear();
        let timed = P::<u32>::new();
        let (r, e, t) = (record("result"), record("error"), record("timeout"));
        let tail = timed.on_result(move |_| r()).on_error(move |_| e()).on_timeout(t);
        timed.settle(Outcome::TimedOut);
        assert_eq!(*hits.lock().unwrap(), vec!["timeout"]);
        assert_eq!(tail.error(), Some(Error::Timeout));
    }

    #[test]
    fn test_catch_error_recovers() {
        let f = P::<u32>::new();
        let g = f.map(|v| v + 1).catch_error(|err| {
            assert_eq!(err, Error::Failed("down".to_owned()));
            Promise::resolved(0)
        });

        f.reject("down".to_owned());
        assert_eq!(g.result(), Some(0));
    }

    #[test]
    fn test_catch_error_passes_success() {
        let f = P::<u32>::new();
        let g = f.catch_error(|_| -> P<u32> { panic!("no error to catch") });
        f.resolve(5);
        assert_eq!(g.result(), Some(5));
    }

    #[test]
    fn test_catch_error_sees_timeout() {
        let f = P::<u32>::new();
        let g = f.catch_error(|err| {
            assert!(err.is_timeout());
            Promise::rejected("gave up".to_owned())
        });
        f.settle(Outcome::TimedOut);
        assert_eq!(g.error(), Some(Error::Failed("gave up".to_owned())));
    }

    #[test]
    fn test_catch_error_tap() {
        let caught = Arc::new(AtomicUsize::new(0));

        let f = P::<u32>::new();
        let g = {
            let caught = caught.clone();
            f.catch_error_tap(move |_| {
                caught.fetch_add(1, Ordering::SeqCst);
            })
        };
        f.reject("x".to_owned());
        assert_eq!(g.outcome(), Some(Outcome::Success(())));

        let ok = P::<u32>::resolved(1);
        let h = {
            let caught = caught.clone();
            ok.catch_error_tap(move |_| {
                caught.fetch_add(1, Ordering::SeqCst);
            })
        };
        assert_eq!(h.outcome(), Some(Outcome::Success(())));
        assert_eq!(caught.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[should_panic(expected = "double registration")]
    fn test_no_fan_out() {
        let f = P::<u32>::new();
        let _ = f.map(|v| v);
        let _ = f.map(|v| v);
    }

    fn expected(source: &Outcome<u32, String>) -> Outcome<u32, String> {
        match *source {
            Outcome::Success(v) if v % 2 == 0 => Outcome::Success((v + 1) * 10),
            Outcome::Success(_) => Outcome::Failure("odd".to_owned()),
            Outcome::Failure(_) | Outcome::TimedOut => Outcome::Success(0),
        }
    }

    fn build(source: &P<u32>) -> P<u32> {
        source.map(|v| v + 1)
              .flat_map(|v| {
                  if v % 2 == 1 {
                      Promise::resolved(v)
                  } else {
                      Promise::rejected("odd".to_owned())
                  }
              })
              .map(|v| v * 10)
              .catch_error(|err| {
                  match err {
                      Error::Failed(ref msg) if msg == "odd" => Promise::rejected(msg.clone()),
                      _ => Promise::resolved(0),
                  }
              })
    }

    #[test]
    fn test_composition_independent_of_registration_order() {
        let mut rng = rand::thread_rng();

        for _ in 0..200 {
            let source_outcome = match rng.gen_range(0..3) {
                0 => Outcome::Success(rng.gen_range(0..100)),
                1 => Outcome::Failure("bad".to_owned()),
                _ => Outcome::TimedOut,
            };

            let source = P::<u32>::new();
            let tail = if rng.gen_bool(0.5) {
                let tail = build(&source);
                source.settle(source_outcome.clone());
                tail
            } else {
                source.settle(source_outcome.clone());
                build(&source)
            };

            assert_eq!(tail.outcome(), Some(expected(&source_outcome)));
        }
    }
}
