//! Offline "provider": a straight line from origin to destination.
//!
//! Used when no network or no API key is available, the duration is estimated from a nominal
//! speed for each travel mode.
//!

use async_trait::async_trait;
use chrono::Utc;
use tracing::trace;

use commute_common::{format_distance, format_duration, haversine_m, Coordinate};

use crate::{ManeuverKind, Route, RouteError, RouteProvider, RouteStep, TravelMode};

#[derive(Clone, Debug, Default)]
pub struct StraightLine;

impl StraightLine {
    /// Nominal speed in m/s
    ///
    fn speed(mode: TravelMode) -> f64 {
        match mode {
            TravelMode::Driving => 40. / 3.6,
            TravelMode::Transit => 25. / 3.6,
            TravelMode::Bicycling => 15. / 3.6,
            TravelMode::Walking => 5. / 3.6,
        }
    }
}

#[async_trait]
impl RouteProvider for StraightLine {
    fn name(&self) -> String {
        "offline".to_string()
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TravelMode,
    ) -> Result<Route, RouteError> {
        trace!("straight line");

        let dist = haversine_m(&origin, &destination);
        let secs = (dist / Self::speed(mode)).round() as u64;
        let bearing = origin.bearing_to(&destination);

        let step = RouteStep {
            start: origin,
            end: Some(destination),
            distance_text: format_distance(dist),
            instruction: format!("Head {bearing:.0}° towards destination"),
            maneuver: ManeuverKind::Straight,
            road_name: String::new(),
        };
        Ok(Route {
            polyline: vec![origin, destination],
            steps: vec![step],
            duration_seconds: secs,
            duration_text: format_duration(secs),
            distance_meters: dist.round() as u64,
            distance_text: format_distance(dist),
            fetched_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_straight_line() {
        let a = Coordinate::new(10.0, 123.0).unwrap();
        let b = Coordinate::new(10.0009, 123.0).unwrap();

        let r = StraightLine
            .fetch_route(a, b, TravelMode::Walking)
            .await
            .unwrap();

        assert_eq!(vec![a, b], r.polyline);
        assert_eq!(1, r.steps.len());
        assert_eq!(100, r.distance_meters);
        // 100 m at 5 km/h
        assert_eq!(72, r.duration_seconds);
        assert_eq!("Head 0° towards destination", r.steps[0].instruction);
    }
}
