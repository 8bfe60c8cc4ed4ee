use thiserror::Error;

/// Errors from the geodesy & polyline helpers.
///
#[derive(Clone, Debug, Error, PartialEq)]
pub enum GeoError {
    #[error("Coordinate out of range: lat={0} lon={1}")]
    OutOfRange(f64, f64),
    #[error("Malformed polyline at offset {offset}")]
    MalformedPolyline { offset: usize },
    #[error("Can not parse coordinate from '{0}'")]
    BadCoordinate(String),
}
