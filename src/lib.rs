// The MIT License (MIT)

// Copyright (c) 2015 Y. T. Chung <zonyitoo@gmail.com>

//  Permission is hereby granted, free of charge, to any person obtaining a
//  copy of this software and associated documentation files (the "Software"),
//  to deal in the Software without restriction, including without limitation
//  the rights to use, copy, modify, merge, publish, distribute, sublicense,
//  and/or sell copies of the Software, and to permit persons to whom the
//  Software is furnished to do so, subject to the following conditions:
//
//  The above copyright notice and this permission notice shall be included in
//  all copies or substantial portions of the Software.
//
//  THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS
//  OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
//  FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
//  AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
//  LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
//  FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
//  DEALINGS IN THE SOFTWARE.

//! Single-fulfillment promises for actor-style runtimes
//!
//! ```
//! use coio_promise::{Outcome, Promise};
//!
//! let source = Promise::<u32, String>::new();
//! let doubled = source.map(|v| v * 2);
//!
//! source.settle(Outcome::Success(21));
//! assert_eq!(doubled.wait(), Ok(42));
//! ```

#[macro_use]
extern crate log;

pub use crate::error::{Error, Violation};
pub use crate::options::Options;
pub use crate::outcome::Outcome;
pub use crate::promise::{Promise, PromiseId};
pub use crate::runtime::{ActorContext, Processor, SchedulerWorker, TimerService};

pub mod error;
pub mod options;
pub mod outcome;
pub mod promise;
pub mod runtime;
pub mod sync;
