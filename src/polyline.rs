//! Encoded polyline codec
//!
//! Route shapes arrive as Google encoded polylines with six decimal digits of
//! precision (1e-6), the variant emitted by the route-computation service.

use crate::error::{Error, Result};
use crate::geometry::Point;

const PRECISION: f64 = 1e6;

/// Decode an encoded shape string into its ordered point sequence.
pub fn decode(encoded: &str) -> Result<Vec<Point>> {
    let bytes = encoded.as_bytes();
    let mut points = Vec::new();
    let mut idx = 0;
    let mut lat = 0i64;
    let mut lon = 0i64;

    while idx < bytes.len() {
        lat += next_delta(bytes, &mut idx)?;
        lon += next_delta(bytes, &mut idx)?;
        points.push(Point {
            lon: lon as f64 / PRECISION,
            lat: lat as f64 / PRECISION,
        });
    }
    Ok(points)
}

/// Read one zigzag-encoded delta from the byte stream.
fn next_delta(bytes: &[u8], idx: &mut usize) -> Result<i64> {
    let mut result = 0i64;
    let mut shift = 0u32;

    loop {
        let byte = *bytes
            .get(*idx)
            .ok_or_else(|| Error::MalformedRoute("truncated shape encoding".to_string()))?
            as i64
            - 63;
        *idx += 1;

        if !(0..=63).contains(&byte) || shift > 60 {
            return Err(Error::MalformedRoute(
                "invalid character in shape encoding".to_string(),
            ));
        }

        result |= (byte & 0x1f) << shift;
        shift += 5;

        if byte < 0x20 {
            break;
        }
    }

    Ok(if result & 1 != 0 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

/// Encode a point sequence as a shape string. Used when constructing route
/// descriptions by hand (fixtures, simulators).
pub fn encode(points: &[Point]) -> String {
    let mut out = String::new();
    let mut prev_lat = 0i64;
    let mut prev_lon = 0i64;

    for p in points {
        let lat = (p.lat * PRECISION).round() as i64;
        let lon = (p.lon * PRECISION).round() as i64;
        encode_delta(lat - prev_lat, &mut out);
        encode_delta(lon - prev_lon, &mut out);
        prev_lat = lat;
        prev_lon = lon;
    }
    out
}

fn encode_delta(value: i64, out: &mut String) {
    let mut v = if value < 0 { !(value << 1) } else { value << 1 };
    while v >= 0x20 {
        out.push(((0x20 | (v & 0x1f)) + 63) as u8 as char);
        v >>= 5;
    }
    out.push((v + 63) as u8 as char);
}
