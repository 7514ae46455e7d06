// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Racing a promise against a timeout

use std::time::Duration;

use super::Promise;
use crate::outcome::Outcome;
use crate::runtime::{ActorContext, Processor, TimerService};

impl<T, E> Promise<T, E>
    where T: Clone + Send + 'static,
          E: Clone + Send + 'static
{
    /// Settle with `Outcome::TimedOut` unless already settled
    pub fn time_out(&self) {
        if !self.is_settled() {
            self.settle(Outcome::TimedOut);
        }
    }

    /// Arm a timeout that settles this promise with `Outcome::TimedOut`
    /// after `timeout`, unless it settles for real first.
    ///
    /// Inside a `Processor` the timeout is delivered through its own queue,
    /// otherwise through the process-wide `TimerService`. Arming an already
    /// settled promise does nothing.
    pub fn expire_after(&self, timeout: Duration) -> Promise<T, E> {
        match Processor::current() {
            Some(processor) => self.expire_after_in(timeout, &processor),
            None => self.expire_after_on(timeout, TimerService::global()),
        }
    }

    /// Arm a timeout on an explicit actor context
    pub fn expire_after_in(&self, timeout: Duration, context: &dyn ActorContext) -> Promise<T, E> {
        if !self.is_settled() {
            debug!("promise {}: timeout armed in {:?}", self.id(), timeout);
            let target = self.clone();
            context.delayed(timeout, Box::new(move || target.time_out()));
        }
        self.clone()
    }

    /// Arm a timeout on an explicit timer service
    pub fn expire_after_on(&self, timeout: Duration, timer: &TimerService) -> Promise<T, E> {
        if !self.is_settled() {
            let target = self.clone();
            match timer.schedule(timeout, move || target.time_out()) {
                Ok(()) => debug!("promise {}: timeout armed in {:?} on {}", self.id(), timeout, timer.name()),
                Err(err) => error!("promise {}: failed to arm timeout: {}", self.id(), err),
            }
        }
        self.clone()
    }
}
