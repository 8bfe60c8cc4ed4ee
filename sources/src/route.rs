//! Route model as returned by any directions provider.
//!
//! A `Route` is immutable once fetched: a recalculation produces a new one which replaces the
//! previous one wholesale.
//!

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use commute_common::{haversine_m, Coordinate};

/// What to do at the end of a step.
///
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, PartialEq, Serialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ManeuverKind {
    TurnLeft,
    TurnRight,
    Straight,
    Roundabout,
    Continue,
    #[default]
    Unknown,
}

impl ManeuverKind {
    /// Map the provider maneuver vocabulary onto our smaller set.
    ///
    pub fn from_provider(maneuver: &str) -> Self {
        match maneuver {
            "" | "merge" => ManeuverKind::Continue,
            "straight" => ManeuverKind::Straight,
            m if m.starts_with("roundabout") => ManeuverKind::Roundabout,
            "turn-left" | "turn-slight-left" | "turn-sharp-left" | "fork-left" | "ramp-left"
            | "keep-left" => ManeuverKind::TurnLeft,
            "turn-right" | "turn-slight-right" | "turn-sharp-right" | "fork-right"
            | "ramp-right" | "keep-right" => ManeuverKind::TurnRight,
            _ => ManeuverKind::Unknown,
        }
    }
}

/// One turn-by-turn instruction.
///
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct RouteStep {
    /// Where the step starts
    pub start: Coordinate,
    /// Where the step ends, if known
    pub end: Option<Coordinate>,
    /// Provider text like "0.3 km"
    pub distance_text: String,
    /// Plain text, HTML stripped
    pub instruction: String,
    pub maneuver: ManeuverKind,
    /// Road name, may be empty
    pub road_name: String,
}

impl RouteStep {
    /// End of the step, its start if the provider did not give one.
    ///
    #[inline]
    pub fn end_or_start(&self) -> Coordinate {
        self.end.unwrap_or(self.start)
    }
}

/// A complete route between two points.
///
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Route {
    /// Geometry, decoded
    pub polyline: Vec<Coordinate>,
    /// Ordered steps
    pub steps: Vec<RouteStep>,
    /// Travel time in seconds
    pub duration_seconds: u64,
    /// Provider text for the duration
    pub duration_text: String,
    /// Length in meters
    pub distance_meters: u64,
    /// Provider text for the length
    pub distance_text: String,
    /// When we got it
    pub fetched_at: DateTime<Utc>,
}

impl Route {
    /// Estimated arrival time, based on the provider duration from the moment the route was
    /// fetched.  `None` if the provider duration does not fit in a date.
    ///
    pub fn eta(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.duration_seconds).ok()?;
        self.fetched_at
            .checked_add_signed(Duration::try_seconds(secs)?)
    }

    /// Index of the step whose end is the closest to `pos`, starting at `from`.
    ///
    pub fn nearest_step(&self, pos: &Coordinate, from: usize) -> Option<usize> {
        self.steps
            .iter()
            .enumerate()
            .skip(from)
            .map(|(i, s)| (i, haversine_m(pos, &s.end_or_start())))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    /// Same geometry as `other`, meaning this is the same path with new timings.
    ///
    #[inline]
    pub fn same_path(&self, other: &Route) -> bool {
        self.polyline == other.polyline && self.steps.len() == other.steps.len()
    }
}
