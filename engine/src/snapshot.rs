//! Read-only view of a trip, what a UI or a log line shows.
//!

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::Serialize;

use commute_common::{format_distance, format_duration, Coordinate};
use commute_sources::RouteStep;

use crate::TripState;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TripSnapshot {
    pub state: TripState,
    /// Sequence number of the trip, 0 before the first one
    pub trip: u64,
    pub elapsed_seconds: u64,
    pub distance_km: f64,
    pub average_speed_kmh: f64,
    pub current_speed_kmh: f64,
    /// Remaining travel time as given by the provider, "--" without a route
    pub eta_text: String,
    pub eta_at: Option<DateTime<Utc>>,
    pub next_step: Option<RouteStep>,
    /// Straight-line distance to destination
    pub remaining_m: Option<f64>,
    pub position: Option<Coordinate>,
    pub arrived: bool,
}

impl Display for TripSnapshot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} {:.2} km avg={:.1} km/h cur={:.1} km/h eta={}",
            self.state,
            format_duration(self.elapsed_seconds),
            self.distance_km,
            self.average_speed_kmh,
            self.current_speed_kmh,
            self.eta_text,
        )?;
        if let Some(rem) = self.remaining_m {
            write!(f, " left={}", format_distance(rem))?;
        }
        if let Some(step) = &self.next_step {
            write!(f, " next=\"{}\"", step.instruction)?;
        }
        Ok(())
    }
}
