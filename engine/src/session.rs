//! The trip state machine.
//!
//! ```text
//!         start             update_fix within threshold / arrive
//!  Idle ----------> Navigating ----------------------------------> Arrived
//!   ^                   |                                            |
//!   |                   | cancel                                     |
//!   |                   v                                            |
//!   +----- reset --- Cancelled                                       |
//!   |                                                                |
//!   +------------------------------ reset ---------------------------+
//! ```
//!
//! `start()` from any state other than `Idle` resets first.
//!
//! `TripSession` holds no clock and does no I/O: every operation gets `now` from its caller,
//! which makes it easy to drive from recorded data.  Every command checks the current state
//! first and reports whether it applied.
//!

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, info, trace};

use commute_common::{haversine_m, Coordinate, Place};
use commute_sources::{Route, RouteStep};

use crate::{PositionFix, TripSnapshot};

/// A step is considered done once we are this close to its end.
pub const STEP_REACHED_M: f64 = 25.;

/// Default distance to destination under which we have arrived.
pub const ARRIVAL_THRESHOLD_M: f64 = 50.;

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TripState {
    #[default]
    Idle,
    Navigating,
    Arrived,
    Cancelled,
}

/// What `update_fix()` did with a fix.
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FixOutcome {
    /// Not navigating, nothing done
    Ignored,
    /// Not newer than the last fix
    Stale,
    /// Taken into account
    Accepted { added_m: f64 },
    /// We just arrived, only ever returned once per trip
    Arrived,
}

#[derive(Clone, Debug)]
pub struct TripSession {
    state: TripState,
    /// Sequence number, incremented by every `start()`
    trip: u64,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    origin: Option<Place>,
    destination: Option<Place>,
    distance_m: f64,
    last_fix: Option<PositionFix>,
    route: Option<Route>,
    step: usize,
    speed_kmh: f64,
    arrival_threshold_m: f64,
}

impl TripSession {
    pub fn new(arrival_threshold_m: f64) -> Self {
        TripSession {
            state: TripState::Idle,
            trip: 0,
            started_at: None,
            ended_at: None,
            origin: None,
            destination: None,
            distance_m: 0.,
            last_fix: None,
            route: None,
            step: 0,
            speed_kmh: 0.,
            arrival_threshold_m,
        }
    }

    /// Begin a new trip, whatever we were doing before.  Returns the new trip number.
    ///
    #[tracing::instrument(skip(self))]
    pub fn start(&mut self, origin: Place, destination: Place, now: DateTime<Utc>) -> u64 {
        if self.state != TripState::Idle {
            debug!("restarting from {}", self.state);
            self.reset();
        }
        info!("trip from {origin} to {destination}");

        self.trip += 1;
        self.state = TripState::Navigating;
        self.started_at = Some(now);
        self.last_fix = Some(PositionFix::new(origin.coordinate, now));
        self.origin = Some(origin);
        self.destination = Some(destination);
        self.trip
    }

    /// Account for a new position.
    ///
    pub fn update_fix(&mut self, fix: PositionFix, now: DateTime<Utc>) -> FixOutcome {
        if self.state != TripState::Navigating {
            return FixOutcome::Ignored;
        }

        let mut added_m = 0.;
        if let Some(last) = &self.last_fix {
            if fix.timestamp <= last.timestamp {
                trace!("stale fix at {}", fix.timestamp);
                return FixOutcome::Stale;
            }
            added_m = haversine_m(&last.coordinate, &fix.coordinate);
            let dt = (fix.timestamp - last.timestamp)
                .num_microseconds()
                .map_or(f64::INFINITY, |us| us as f64 / 1_000_000.);
            self.speed_kmh = match fix.speed_mps {
                Some(mps) => mps * 3.6,
                None => {
                    // Keep the previous value when the fixes are too close in time
                    let kmh = added_m / dt * 3.6;
                    if dt > 0. && kmh.is_finite() {
                        kmh.max(0.)
                    } else {
                        self.speed_kmh
                    }
                }
            };
        } else if let Some(mps) = fix.speed_mps {
            self.speed_kmh = mps * 3.6;
        }
        self.distance_m += added_m;
        self.last_fix = Some(fix);

        self.advance_steps(&fix.coordinate);

        if let Some(dest) = &self.destination {
            let left = haversine_m(&fix.coordinate, &dest.coordinate);
            if left < self.arrival_threshold_m {
                info!("arrived at {dest}, {left:.0} m away");
                self.finish(TripState::Arrived, now);
                return FixOutcome::Arrived;
            }
        }
        FixOutcome::Accepted { added_m }
    }

    /// Move past every step whose end we reached.
    ///
    fn advance_steps(&mut self, pos: &Coordinate) {
        if let Some(route) = &self.route {
            while let Some(step) = route.steps.get(self.step) {
                if haversine_m(pos, &step.end_or_start()) >= STEP_REACHED_M {
                    break;
                }
                self.step += 1;
                debug!("now on step {}", self.step);
            }
        }
    }

    /// Install a new route.  Returns `false` if we are not navigating.
    ///
    #[tracing::instrument(skip(self, route))]
    pub fn route_recalculated(&mut self, route: Route) -> bool {
        if self.state != TripState::Navigating {
            return false;
        }

        let pos = self
            .last_fix
            .map(|f| f.coordinate)
            .or(self.origin.as_ref().map(|p| p.coordinate));

        let mut step = match pos {
            Some(pos) => {
                let nearest = route.nearest_step(&pos, 0).unwrap_or(0);
                match route.steps.get(nearest) {
                    Some(s) if haversine_m(&pos, &s.end_or_start()) < STEP_REACHED_M => {
                        nearest + 1
                    }
                    _ => nearest,
                }
            }
            None => 0,
        };
        if let Some(current) = &self.route {
            if current.same_path(&route) {
                step = step.max(self.step);
            }
        }
        debug!("{} steps, current {step}", route.steps.len());

        self.step = step;
        self.route = Some(route);
        true
    }

    /// Stop the trip without arriving.
    ///
    pub fn cancel(&mut self, now: DateTime<Utc>) -> bool {
        if self.state != TripState::Navigating {
            return false;
        }
        info!("trip cancelled");
        self.finish(TripState::Cancelled, now);
        true
    }

    /// Declare arrival, whatever the distance left.
    ///
    pub fn arrive(&mut self, now: DateTime<Utc>) -> bool {
        if self.state != TripState::Navigating {
            return false;
        }
        info!("trip ended");
        self.finish(TripState::Arrived, now);
        true
    }

    fn finish(&mut self, state: TripState, now: DateTime<Utc>) {
        self.state = state;
        self.ended_at = Some(now);
    }

    /// Back to `Idle`, keeping only the trip counter.  Returns `false` if already idle.
    ///
    pub fn reset(&mut self) -> bool {
        if self.state == TripState::Idle {
            return false;
        }
        *self = TripSession {
            trip: self.trip,
            ..TripSession::new(self.arrival_threshold_m)
        };
        true
    }

    /// Seconds since start, frozen once the trip is over.
    ///
    pub fn elapsed(&self, now: DateTime<Utc>) -> f64 {
        let Some(start) = self.started_at else {
            return 0.;
        };
        let end = self.ended_at.unwrap_or(now);
        ((end - start).num_milliseconds() as f64 / 1_000.).max(0.)
    }

    /// Average speed over the trip in km/h, 0 when no time has passed.
    ///
    pub fn average_speed_kmh(&self, now: DateTime<Utc>) -> f64 {
        let elapsed = self.elapsed(now);
        if elapsed <= 0. {
            return 0.;
        }
        (self.distance_m / 1_000.) / (elapsed / 3_600.)
    }

    /// Project the session into a snapshot.
    ///
    pub fn snapshot(&self, now: DateTime<Utc>) -> TripSnapshot {
        let position = self.last_fix.map(|f| f.coordinate);
        let remaining_m = match (&position, &self.destination) {
            (Some(pos), Some(dest)) => Some(haversine_m(pos, &dest.coordinate)),
            _ => None,
        };
        let (eta_text, eta_at) = match (&self.route, self.state) {
            (_, TripState::Arrived) => ("arrived".to_string(), self.ended_at),
            (Some(route), _) => (route.duration_text.clone(), route.eta()),
            (None, _) => ("--".to_string(), None),
        };

        TripSnapshot {
            state: self.state,
            trip: self.trip,
            elapsed_seconds: self.elapsed(now) as u64,
            distance_km: self.distance_m / 1_000.,
            average_speed_kmh: self.average_speed_kmh(now),
            current_speed_kmh: self.speed_kmh,
            eta_text,
            eta_at,
            next_step: self.next_step().cloned(),
            remaining_m,
            position,
            arrived: self.state == TripState::Arrived,
        }
    }

    #[inline]
    pub fn state(&self) -> TripState {
        self.state
    }

    #[inline]
    pub fn trip(&self) -> u64 {
        self.trip
    }

    pub fn origin(&self) -> Option<&Place> {
        self.origin.as_ref()
    }

    pub fn destination(&self) -> Option<&Place> {
        self.destination.as_ref()
    }

    pub fn last_fix(&self) -> Option<&PositionFix> {
        self.last_fix.as_ref()
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    #[inline]
    pub fn current_step(&self) -> usize {
        self.step
    }

    pub fn next_step(&self) -> Option<&RouteStep> {
        self.route.as_ref().and_then(|r| r.steps.get(self.step))
    }

    #[inline]
    pub fn distance_m(&self) -> f64 {
        self.distance_m
    }

    #[inline]
    pub fn current_speed_kmh(&self) -> f64 {
        self.speed_kmh
    }
}

impl Default for TripSession {
    fn default() -> Self {
        TripSession::new(ARRIVAL_THRESHOLD_M)
    }
}
