//! Rate limiting of route recalculation.
//!
//! Fixes arrive every second or so; asking the directions provider that often would be both
//! expensive and useless.  `DirectionsThrottle` lets a call through only when `min_interval` has
//! passed since the last *attempted* call, successful or not, unless the caller forces it.
//!
//! The gate (`try_acquire`) is synchronous so it can be consulted from the fix path, the fetch
//! itself is async.
//!

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, trace};

use commute_common::Coordinate;
use commute_sources::{Route, RouteError, RouteProvider, TravelMode};

use crate::{lock, Clock};

/// Default and minimum interval between two calls.
pub const MIN_REFETCH_SECS: u64 = 5;

#[derive(Debug, Default)]
struct Gate {
    last_attempt: Option<DateTime<Utc>>,
    attempted: u64,
    skipped: u64,
}

#[derive(Debug)]
pub struct DirectionsThrottle {
    provider: Arc<dyn RouteProvider>,
    clock: Arc<dyn Clock>,
    mode: TravelMode,
    min_interval: Duration,
    gate: Mutex<Gate>,
}

impl DirectionsThrottle {
    pub fn new(
        provider: Arc<dyn RouteProvider>,
        clock: Arc<dyn Clock>,
        mode: TravelMode,
        interval_secs: u64,
    ) -> Self {
        let interval_secs = interval_secs.max(MIN_REFETCH_SECS);
        debug!("throttle on {} every {interval_secs}s", provider.name());

        DirectionsThrottle {
            provider,
            clock,
            mode,
            min_interval: i64::try_from(interval_secs)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX),
            gate: Mutex::new(Gate::default()),
        }
    }

    /// Decide whether a call may go now.  When it may, the attempt is recorded and the timer
    /// restarts; `force` always gets through.
    ///
    pub fn try_acquire(&self, force: bool) -> bool {
        let now = self.clock.now();
        let mut gate = lock(&self.gate);

        let open = force
            || match gate.last_attempt {
                None => true,
                Some(last) => now - last >= self.min_interval,
            };
        if open {
            gate.last_attempt = Some(now);
            gate.attempted += 1;
        } else {
            gate.skipped += 1;
            trace!("throttled");
        }
        open
    }

    /// Call the provider, unconditionally.  Use after `try_acquire()`.
    ///
    #[tracing::instrument(skip(self))]
    pub async fn fetch(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<Route, RouteError> {
        self.provider
            .fetch_route(origin, destination, self.mode)
            .await
    }

    /// Fetch a route if the gate is open, `Ok(None)` if throttled.
    ///
    pub async fn maybe_fetch(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        force: bool,
    ) -> Result<Option<Route>, RouteError> {
        if !self.try_acquire(force) {
            return Ok(None);
        }
        self.fetch(origin, destination).await.map(Some)
    }

    /// Calls let through so far
    ///
    pub fn attempted(&self) -> u64 {
        lock(&self.gate).attempted
    }

    /// Calls refused so far
    ///
    pub fn skipped(&self) -> u64 {
        lock(&self.gate).skipped
    }

    pub fn mode(&self) -> TravelMode {
        self.mode
    }

    pub fn provider_name(&self) -> String {
        self.provider.name()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rstest::rstest;

    use commute_sources::StraightLine;

    use crate::ManualClock;

    use super::*;

    /// Straight-line provider counting its calls, failing on demand.
    ///
    #[derive(Debug, Default)]
    pub(crate) struct Counting {
        pub calls: AtomicUsize,
        pub fail: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl RouteProvider for Counting {
        fn name(&self) -> String {
            "counting".to_string()
        }

        async fn fetch_route(
            &self,
            origin: Coordinate,
            destination: Coordinate,
            mode: TravelMode,
        ) -> Result<Route, RouteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(RouteError::Network("connection reset".to_string()));
            }
            StraightLine.fetch_route(origin, destination, mode).await
        }
    }

    fn a() -> Coordinate {
        Coordinate::new(10., 123.).unwrap()
    }

    fn b() -> Coordinate {
        Coordinate::new(10.01, 123.).unwrap()
    }

    fn setup(interval: u64) -> (Arc<Counting>, ManualClock, DirectionsThrottle) {
        let provider = Arc::new(Counting::default());
        let clock = ManualClock::default();
        let throttle = DirectionsThrottle::new(
            provider.clone(),
            Arc::new(clock.clone()),
            TravelMode::Driving,
            interval,
        );
        (provider, clock, throttle)
    }

    #[rstest]
    #[case(false, 1)]
    #[case(true, 2)]
    #[tokio::test]
    async fn test_two_calls_two_seconds_apart(#[case] force: bool, #[case] exp: usize) {
        let (provider, clock, throttle) = setup(5);

        let r = throttle.maybe_fetch(a(), b(), false).await.unwrap();
        assert!(r.is_some());

        clock.advance(Duration::seconds(2));
        let r = throttle.maybe_fetch(a(), b(), force).await.unwrap();
        assert_eq!(force, r.is_some());

        assert_eq!(exp, provider.calls.load(Ordering::SeqCst));
        assert_eq!(exp as u64, throttle.attempted());
        assert_eq!(2 - exp as u64, throttle.skipped());
    }

    #[tokio::test]
    async fn test_interval_elapsed() {
        let (provider, clock, throttle) = setup(5);

        assert!(throttle.try_acquire(false));
        clock.advance(Duration::seconds(4));
        assert!(!throttle.try_acquire(false));
        clock.advance(Duration::seconds(1));
        assert!(throttle.try_acquire(false));

        // nothing was actually fetched
        assert_eq!(0, provider.calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_forced_resets_timer() {
        let (_, clock, throttle) = setup(5);

        assert!(throttle.try_acquire(false));
        clock.advance(Duration::seconds(4));
        assert!(throttle.try_acquire(true));
        clock.advance(Duration::seconds(4));
        assert!(!throttle.try_acquire(false));
    }

    #[tokio::test]
    async fn test_failed_attempt_counts() {
        let (provider, clock, throttle) = setup(5);
        provider.fail.store(true, Ordering::SeqCst);

        let r = throttle.maybe_fetch(a(), b(), false).await;
        assert!(matches!(r, Err(RouteError::Network(_))));

        clock.advance(Duration::seconds(1));
        assert_eq!(Ok(None), throttle.maybe_fetch(a(), b(), false).await);
        assert_eq!(1, provider.calls.load(Ordering::SeqCst));
    }

    #[test]
    fn test_interval_floor() {
        let (_, clock, throttle) = setup(1);

        assert!(throttle.try_acquire(false));
        clock.advance(Duration::seconds(3));
        assert!(!throttle.try_acquire(false));
    }

    #[rstest]
    #[case(u64::MAX)]
    #[case(i64::MAX as u64)]
    #[case(i64::MAX as u64 + 1)]
    fn test_huge_interval(#[case] interval: u64) {
        let (_, clock, throttle) = setup(interval);

        assert!(throttle.try_acquire(false));
        clock.advance(Duration::days(3_650));
        assert!(!throttle.try_acquire(false));
        assert!(throttle.try_acquire(true));
    }
}
