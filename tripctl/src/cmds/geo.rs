//! Small geodesy helpers, no network involved.
//!

use eyre::Result;
use tracing::trace;

use commute_common::{decode_polyline, encode_polyline, format_distance, haversine_m, Coordinate};

use crate::cli::{DecodeOpts, DistanceOpts, EncodeOpts};

/// One decoded point per line.
///
#[tracing::instrument]
pub fn decode(opts: &DecodeOpts) -> Result<String> {
    let points = decode_polyline(&opts.polyline)?;
    trace!("{} points", points.len());

    Ok(points
        .iter()
        .map(Coordinate::to_string)
        .collect::<Vec<_>>()
        .join("\n"))
}

#[tracing::instrument]
pub fn encode(opts: &EncodeOpts) -> Result<String> {
    trace!("{} points", opts.points.len());
    Ok(encode_polyline(&opts.points))
}

#[tracing::instrument]
pub fn distance(opts: &DistanceOpts) -> Result<String> {
    let d = haversine_m(&opts.from, &opts.to);
    let b = opts.from.bearing_to(&opts.to);

    Ok(format!(
        "{} -> {}: {} ({d:.1} m), bearing {b:.1}°",
        opts.from,
        opts.to,
        format_distance(d)
    ))
}
