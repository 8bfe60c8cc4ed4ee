//! All about `Stats`.

use std::fmt::{Display, Formatter};

use serde::Serialize;

/// `Stats` tracks what happened during a trip, logged when the trip ends.
///
/// # Fields
///
/// - `fixes`: fixes received from the position source
/// - `accepted`: fixes taken into account
/// - `stale`: fixes not newer than the previous one
/// - `ignored`: fixes received while not navigating
/// - `fetched`: routes installed
/// - `failed`: route requests that failed
/// - `discarded`: routes that arrived for a trip no longer current
/// - `skipped`: route requests refused by the throttle
///
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Stats {
    pub fixes: u64,
    pub accepted: u64,
    pub stale: u64,
    pub ignored: u64,
    pub fetched: u64,
    pub failed: u64,
    pub discarded: u64,
    pub skipped: u64,
}

impl Display for Stats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "fixes={} accepted={} stale={} ignored={} routes={} failed={} discarded={} throttled={}",
            self.fixes,
            self.accepted,
            self.stale,
            self.ignored,
            self.fetched,
            self.failed,
            self.discarded,
            self.skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_display() {
        let s = Stats {
            fixes: 10,
            accepted: 8,
            stale: 1,
            ignored: 1,
            fetched: 2,
            ..Stats::default()
        };
        assert_eq!(
            "fixes=10 accepted=8 stale=1 ignored=1 routes=2 failed=0 discarded=0 throttled=0",
            s.to_string()
        );
    }
}
