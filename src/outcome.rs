// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Settlement outcomes and their classification

use crate::error::Error;

/// The value a `Promise` is settled with.
///
/// `TimedOut` takes the place of a sentinel error value: it is produced by an
/// armed timeout and is deliberately kept apart from domain failures, so that
/// `on_error` handlers never see it and `on_timeout` handlers see nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Outcome<T, E> {
    Success(T),
    Failure(E),
    TimedOut,
}

impl<T, E> Outcome<T, E> {
    /// No error of any kind
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(*self, Outcome::Success(_))
    }

    /// Either a domain failure or a timeout
    #[inline]
    pub fn is_error(&self) -> bool {
        !self.is_success()
    }

    /// A domain failure, timeouts excluded
    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(*self, Outcome::Failure(_))
    }

    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(*self, Outcome::TimedOut)
    }

    /// Transform the successful payload, forwarding errors untouched.
    pub fn map<U, F>(self, f: F) -> Outcome<U, E>
        where F: FnOnce(T) -> U
    {
        match self {
            Outcome::Success(v) => Outcome::Success(f(v)),
            Outcome::Failure(e) => Outcome::Failure(e),
            Outcome::TimedOut => Outcome::TimedOut,
        }
    }

    /// Split into the successful payload or the error a waiter would observe.
    pub fn into_result(self) -> Result<T, Error<E>> {
        match self {
            Outcome::Success(v) => Ok(v),
            Outcome::Failure(e) => Err(Error::Failed(e)),
            Outcome::TimedOut => Err(Error::Timeout),
        }
    }

    pub fn success(self) -> Option<T> {
        match self {
            Outcome::Success(v) => Some(v),
            _ => None,
        }
    }
}
