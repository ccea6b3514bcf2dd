// III-IV
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Sources of the current time.

use time::OffsetDateTime;

/// Generic definition of a clock.
pub trait Clock {
    /// Returns the current UTC time.
    fn now_utc(&self) -> OffsetDateTime;
}

/// Clock implementation that uses the system clock.
#[derive(Clone, Default)]
pub struct SystemClock {}

impl Clock for SystemClock {
    fn now_utc(&self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();

        // Timestamps end up in JSON documents that are consumed by clients with millisecond
        // resolution, so never hand out anything finer than that.
        let millis = now.millisecond();
        now.replace_millisecond(millis).unwrap_or(now)
    }
}

/// Test utilities.
#[cfg(any(test, feature = "testutils"))]
pub mod testutils {
    use super::*;
    use std::sync::Mutex;

    /// A clock that always returns a preconfigured instant until told otherwise.
    pub struct FixedClock {
        /// The instant to return.
        now: Mutex<OffsetDateTime>,
    }

    impl FixedClock {
        /// Creates a new clock that returns `now` until reconfigured with `set`.
        pub fn new(now: OffsetDateTime) -> Self {
            Self { now: Mutex::new(now) }
        }

        /// Sets the new value of `now` that the clock returns.
        pub fn set(&self, now: OffsetDateTime) {
            *self.now.lock().unwrap() = now;
        }
    }

    impl Clock for FixedClock {
        fn now_utc(&self) -> OffsetDateTime {
            *self.now.lock().unwrap()
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_systemclock_trivial() {
        let clock = SystemClock::default();
        let now1 = clock.now_utc();
        assert!(now1.unix_timestamp_nanos() > 0);
        let now2 = clock.now_utc();
        assert!(now2 >= now1);
    }

    #[test]
    fn test_systemclock_millisecond_resolution() {
        let clock = SystemClock::default();
        let now = clock.now_utc();
        assert_eq!(0, now.nanosecond() % 1_000_000);
    }
}
