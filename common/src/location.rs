//! Location related module
//!
//! v1: basic `Coordinate` with lat/lon, haversine distance
//! v2: added initial bearing and `Place` (labelled coordinate)
//! v3: added text helpers for distances & durations
//!
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::GeoError;

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.;

/// A point on Earth, WGS84 degrees.
///
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Coordinate {
    /// Latitude
    pub latitude: f64,
    /// Longitude
    pub longitude: f64,
}

impl Coordinate {
    /// Create a checked coordinate, latitude must be within [-90, 90] and longitude
    /// within [-180, 180].
    ///
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        let c = Coordinate {
            latitude,
            longitude,
        };
        if c.is_valid() {
            Ok(c)
        } else {
            Err(GeoError::OutOfRange(latitude, longitude))
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        (-90. ..=90.).contains(&self.latitude) && (-180. ..=180.).contains(&self.longitude)
    }

    /// Initial bearing in degrees to `other`
    ///
    #[inline]
    pub fn bearing_to(&self, other: &Coordinate) -> f64 {
        bearing_deg(self, other)
    }
}

/// Used in URLs as well, so no space after the comma.
///
impl Display for Coordinate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// Parse `"lat,lon"`.
///
impl FromStr for Coordinate {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| GeoError::BadCoordinate(s.to_string()))?;
        let lat: f64 = lat
            .trim()
            .parse()
            .map_err(|_| GeoError::BadCoordinate(s.to_string()))?;
        let lon: f64 = lon
            .trim()
            .parse()
            .map_err(|_| GeoError::BadCoordinate(s.to_string()))?;
        Coordinate::new(lat, lon)
    }
}

/// A labelled location (origin or destination of a trip).
///
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Place {
    /// Human-readable name, may be empty
    pub label: String,
    /// Where it is
    pub coordinate: Coordinate,
}

impl Place {
    pub fn new(label: &str, coordinate: Coordinate) -> Self {
        Place {
            label: label.to_string(),
            coordinate,
        }
    }
}

impl From<Coordinate> for Place {
    fn from(coordinate: Coordinate) -> Self {
        Place {
            label: String::new(),
            coordinate,
        }
    }
}

impl Display for Place {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.label.is_empty() {
            write!(f, "({})", self.coordinate)
        } else {
            write!(f, "{} ({})", self.label, self.coordinate)
        }
    }
}

/// Great-circle distance in meters between two points.
///
pub fn haversine_m(a: &Coordinate, b: &Coordinate) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin() * (d_lat / 2.0).sin()
        + a.latitude.to_radians().cos()
            * b.latitude.to_radians().cos()
            * (d_lon / 2.0).sin()
            * (d_lon / 2.0).sin();

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Initial compass bearing from `a` to `b`, in [0, 360).
///
pub fn bearing_deg(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();

    // Negative results are brought back into [0, 360), this also folds -0.0 and tiny
    // negative values rounding up to 360.
    let bearing = (y.atan2(x).to_degrees() + 360.) % 360.;
    trace!("bearing={bearing}");
    bearing
}

/// Short text for a distance: "850 m", "1.2 km".
///
pub fn format_distance(meters: f64) -> String {
    if meters < 1_000. {
        format!("{:.0} m", meters.max(0.))
    } else {
        format!("{:.1} km", meters / 1_000.)
    }
}

/// Short text for a duration: "45 s", "12 min", "1 h 05 min".
///
pub fn format_duration(secs: u64) -> String {
    if secs < 60 {
        return format!("{secs} s");
    }
    // Round first so that 59:30 and up reads as one hour
    let mins = secs.saturating_add(30) / 60;
    match mins {
        0..=59 => format!("{mins} min"),
        _ => format!("{} h {:02} min", mins / 60, mins % 60),
    }
}
