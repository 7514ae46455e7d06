// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Error types

use thiserror::Error;

/// What a waiter observes when a `Promise` did not settle successfully
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error<E> {
    /// An armed timeout fired before a real outcome arrived
    #[error("promise timed out")]
    Timeout,
    /// The producer settled the promise with a domain error
    #[error("promise failed: {0:?}")]
    Failed(E),
}

impl<E> Error<E> {
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(*self, Error::Timeout)
    }
}

/// Broken usage invariants of a `Promise`.
///
/// These are never returned; the offending call panics with the
/// corresponding message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("double registration of promise continuation")]
    DoubleRegistration,
    #[error("double settlement of promise")]
    DoubleSettlement,
    #[error("double fire of promise continuation")]
    DoubleFire,
}
