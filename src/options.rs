// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Processor options

use std::default::Default;
use std::time::Duration;

/// Processor options
///
/// An idle processor first spins for `spin_rounds` backoff rounds, then
/// yields its thread for `yield_rounds` more, and finally sleeps for
/// `park_step` per additional round, never longer than `park_ceiling`.
#[derive(Debug, Clone)]
pub struct Options {
    pub name: Option<String>,
    pub spin_rounds: u32,
    pub yield_rounds: u32,
    pub park_step: Duration,
    pub park_ceiling: Duration,
}

pub const DEFAULT_SPIN_ROUNDS: u32 = 8;
pub const DEFAULT_YIELD_ROUNDS: u32 = 16;
pub const DEFAULT_PARK_STEP: Duration = Duration::from_micros(50);
pub const DEFAULT_PARK_CEILING: Duration = Duration::from_millis(1);

impl Options {
    pub fn new() -> Options {
        Options {
            name: None,
            spin_rounds: DEFAULT_SPIN_ROUNDS,
            yield_rounds: DEFAULT_YIELD_ROUNDS,
            park_step: DEFAULT_PARK_STEP,
            park_ceiling: DEFAULT_PARK_CEILING,
        }
    }

    pub fn name(&mut self, name: String) -> &mut Options {
        self.name = Some(name);
        self
    }

    pub fn spin_rounds(&mut self, rounds: u32) -> &mut Options {
        self.spin_rounds = rounds;
        self
    }

    pub fn yield_rounds(&mut self, rounds: u32) -> &mut Options {
        self.yield_rounds = rounds;
        self
    }

    pub fn park_step(&mut self, step: Duration) -> &mut Options {
        self.park_step = step;
        self
    }

    pub fn park_ceiling(&mut self, ceiling: Duration) -> &mut Options {
        self.park_ceiling = ceiling;
        self
    }
}

impl Default for Options {
    fn default() -> Options {
        Options::new()
    }
}
