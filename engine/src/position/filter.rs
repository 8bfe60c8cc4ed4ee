//! Backpressure on the foreground watch.
//!
//! A fix is delivered only if the device moved at least `min_distance_m` *and* at least
//! `min_interval_ms` went by since the last delivered one.  The first fix always goes through.
//!

use chrono::Duration;
use tracing::trace;

use commute_common::haversine_m;

use crate::{PositionFix, WatchOptions};

#[derive(Clone, Debug, Default)]
pub struct FixFilter {
    options: WatchOptions,
    last: Option<PositionFix>,
}

impl FixFilter {
    pub fn new(options: WatchOptions) -> Self {
        FixFilter {
            options,
            last: None,
        }
    }

    /// Returns `true` if `fix` must be delivered, and remember it as the last one.
    ///
    pub fn accept(&mut self, fix: &PositionFix) -> bool {
        let pass = match &self.last {
            None => true,
            Some(last) => {
                let moved = haversine_m(&last.coordinate, &fix.coordinate);
                let waited = fix.timestamp - last.timestamp;

                moved >= self.options.min_distance_m
                    && waited >= Duration::milliseconds(self.options.min_interval_ms as i64)
            }
        };
        if pass {
            self.last = Some(*fix);
        } else {
            trace!("filtered out {}", fix.coordinate);
        }
        pass
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
