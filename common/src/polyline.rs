//! Encoded polyline codec.
//!
//! This is the format used by directions providers to send route geometry: every coordinate is
//! scaled by 1e5, delta-encoded against the previous one, zig-zag encoded and split into 5-bit
//! chunks, each chunk being offset by 63 to land in printable ASCII.  Bit 0x20 of a chunk means
//! "more chunks follow".
//!
//! The format is a wire contract with the provider, the decoder must match the reference
//! algorithm bit for bit.
//!

use tracing::trace;

use crate::{Coordinate, GeoError};

/// Scale factor between degrees and the encoded integers
const PRECISION: f64 = 1e5;

/// Chunk payload mask
const CHUNK_MASK: i64 = 0x1f;
/// Continuation bit
const CONTINUATION: i64 = 0x20;
/// Offset added to every chunk
const OFFSET: u8 = 63;

/// 5-bit chunks beyond that would overflow any valid coordinate
const MAX_SHIFT: u32 = 35;

/// Read one signed varint starting at `*idx`, advancing `*idx` past it.
///
fn next_value(data: &[u8], idx: &mut usize) -> Result<i64, GeoError> {
    let mut result: i64 = 0;
    let mut shift: u32 = 0;

    loop {
        let Some(&byte) = data.get(*idx) else {
            return Err(GeoError::MalformedPolyline { offset: *idx });
        };
        if !(OFFSET..=OFFSET + 63).contains(&byte) || shift > MAX_SHIFT {
            return Err(GeoError::MalformedPolyline { offset: *idx });
        }
        let chunk = (byte - OFFSET) as i64;
        result |= (chunk & CHUNK_MASK) << shift;
        shift += 5;
        *idx += 1;
        if chunk < CONTINUATION {
            break;
        }
    }

    // zig-zag
    //
    let delta = if result & 1 != 0 {
        !(result >> 1)
    } else {
        result >> 1
    };
    Ok(delta)
}

/// Decode an encoded polyline into its list of coordinates.
///
/// Returns `GeoError::MalformedPolyline` with the byte offset where decoding failed instead of
/// panicking, so callers can fall back to something else (like a straight line).
///
#[tracing::instrument(skip(encoded))]
pub fn decode_polyline(encoded: &str) -> Result<Vec<Coordinate>, GeoError> {
    trace!("decode {} bytes", encoded.len());

    let data = encoded.as_bytes();
    let mut idx = 0;
    let mut lat: i64 = 0;
    let mut lon: i64 = 0;
    let mut points = Vec::with_capacity(data.len() / 4);

    while idx < data.len() {
        lat += next_value(data, &mut idx)?;

        // A latitude always comes with its longitude
        //
        if idx >= data.len() {
            return Err(GeoError::MalformedPolyline { offset: idx });
        }
        lon += next_value(data, &mut idx)?;

        let point = Coordinate {
            latitude: lat as f64 / PRECISION,
            longitude: lon as f64 / PRECISION,
        };
        if !point.is_valid() {
            return Err(GeoError::MalformedPolyline { offset: idx });
        }
        points.push(point);
    }
    Ok(points)
}

fn push_value(out: &mut String, value: i64) {
    let mut v = (value << 1) ^ (value >> 63);
    while v >= CONTINUATION {
        out.push(((CONTINUATION | (v & CHUNK_MASK)) as u8 + OFFSET) as char);
        v >>= 5;
    }
    out.push((v as u8 + OFFSET) as char);
}

/// Encode a list of coordinates, inverse of [`decode_polyline`].
///
pub fn encode_polyline(points: &[Coordinate]) -> String {
    let mut out = String::with_capacity(points.len() * 8);
    let (mut plat, mut plon) = (0i64, 0i64);

    for p in points {
        let lat = (p.latitude * PRECISION).round() as i64;
        let lon = (p.longitude * PRECISION).round() as i64;
        push_value(&mut out, lat - plat);
        push_value(&mut out, lon - plon);
        plat = lat;
        plon = lon;
    }
    out
}
