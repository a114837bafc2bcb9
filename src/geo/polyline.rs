//! Encoded polyline format (precision 1e5) as returned by Google Directions.

use crate::models::location::GeoPoint;

const PRECISION: f64 = 1e5;

/// Decodes an encoded polyline. Returns `None` on a truncated or malformed string.
pub fn decode(encoded: &str) -> Option<Vec<GeoPoint>> {
    let bytes = encoded.as_bytes();
    let mut index = 0;
    let (mut lat, mut lng) = (0i64, 0i64);
    let mut points = Vec::new();

    while index < bytes.len() {
        lat += next_value(bytes, &mut index)?;
        lng += next_value(bytes, &mut index)?;
        points.push(GeoPoint::new(lat as f64 / PRECISION, lng as f64 / PRECISION));
    }
    Some(points)
}

fn next_value(bytes: &[u8], index: &mut usize) -> Option<i64> {
    let mut result = 0i64;
    let mut shift = 0;
    loop {
        let chunk = i64::from(*bytes.get(*index)?) - 63;
        if !(0..64).contains(&chunk) || shift > 60 {
            return None;
        }
        *index += 1;
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }
    Some(if result & 1 == 1 { !(result >> 1) } else { result >> 1 })
}

#[cfg(test)]
pub(crate) fn encode(points: &[GeoPoint]) -> String {
    fn push_value(out: &mut String, value: i64) {
        let mut v = if value < 0 { !(value << 1) } else { value << 1 };
        while v >= 0x20 {
            out.push((((v & 0x1f) | 0x20) + 63) as u8 as char);
            v >>= 5;
        }
        out.push((v + 63) as u8 as char);
    }

    let mut out = String::new();
    let (mut prev_lat, mut prev_lng) = (0i64, 0i64);
    for p in points {
        let lat = (p.lat * PRECISION).round() as i64;
        let lng = (p.lng * PRECISION).round() as i64;
        push_value(&mut out, lat - prev_lat);
        push_value(&mut out, lng - prev_lng);
        prev_lat = lat;
        prev_lng = lng;
    }
    out
}
