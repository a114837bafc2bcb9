pub mod polyline;

use crate::models::location::{BoundingBox, GeoPoint};

const EARTH_RADIUS_KM: f64 = 6_371.0;
pub const KM_PER_DEGREE_LAT: f64 = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Local planar (x, y) in km of `p` relative to `origin`. Accurate at city scale.
fn to_local_km(origin: &GeoPoint, p: &GeoPoint) -> (f64, f64) {
    let scale_lng = origin.lat.to_radians().cos() * KM_PER_DEGREE_LAT;
    (
        (p.lng - origin.lng) * scale_lng,
        (p.lat - origin.lat) * KM_PER_DEGREE_LAT,
    )
}

fn from_local_km(origin: &GeoPoint, x: f64, y: f64) -> GeoPoint {
    let scale_lng = origin.lat.to_radians().cos() * KM_PER_DEGREE_LAT;
    GeoPoint {
        lat: origin.lat + y / KM_PER_DEGREE_LAT,
        lng: origin.lng + x / scale_lng,
    }
}

/// Shortest distance in km from `p` to the segment `a`-`b`.
pub fn point_to_segment_km(p: &GeoPoint, a: &GeoPoint, b: &GeoPoint) -> f64 {
    let (bx, by) = to_local_km(a, b);
    let (px, py) = to_local_km(a, p);

    let len_sq = bx * bx + by * by;
    if len_sq <= f64::EPSILON {
        return haversine_km(p, a);
    }

    let t = ((px * bx + py * by) / len_sq).clamp(0.0, 1.0);
    let (dx, dy) = (px - t * bx, py - t * by);
    (dx * dx + dy * dy).sqrt()
}

/// Shortest distance in km from `p` to any segment of `path`.
pub fn distance_to_path_km(p: &GeoPoint, path: &[GeoPoint]) -> f64 {
    match path {
        [] => f64::INFINITY,
        [only] => haversine_km(p, only),
        _ => path
            .windows(2)
            .map(|w| point_to_segment_km(p, &w[0], &w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Geographic buffer of `buffer_km` around a polyline.
#[derive(Debug, Clone)]
pub struct Corridor {
    path: Vec<GeoPoint>,
    buffer_km: f64,
    bounds: BoundingBox,
}

impl Corridor {
    pub fn around_path(path: Vec<GeoPoint>, buffer_km: f64) -> Option<Self> {
        let buffer_km = buffer_km.max(0.0);
        let bounds = BoundingBox::from_points(&path)?.padded_km(buffer_km);
        Some(Self {
            path,
            buffer_km,
            bounds,
        })
    }

    /// Straight-line corridor between two trip endpoints.
    pub fn between(origin: GeoPoint, destination: GeoPoint, buffer_km: f64) -> Self {
        let path = vec![origin, destination];
        let bounds = BoundingBox {
            min_lat: origin.lat.min(destination.lat),
            min_lng: origin.lng.min(destination.lng),
            max_lat: origin.lat.max(destination.lat),
            max_lng: origin.lng.max(destination.lng),
        }
        .padded_km(buffer_km.max(0.0));
        Self {
            path,
            buffer_km: buffer_km.max(0.0),
            bounds,
        }
    }

    pub fn distance_km(&self, p: &GeoPoint) -> f64 {
        distance_to_path_km(p, &self.path)
    }

    pub fn contains(&self, p: &GeoPoint) -> bool {
        self.bounds.contains(p) && self.distance_km(p) <= self.buffer_km
    }

    /// True when every point of `other` lies inside this corridor.
    ///
    /// Checks each vertex of `other` with its buffer added. Exact when this
    /// corridor is a single segment (a convex capsule); multi-segment corridors
    /// are additionally sampled along each of `other`'s segments.
    pub fn covers(&self, other: &Corridor) -> bool {
        let fits = |p: &GeoPoint| self.distance_km(p) + other.buffer_km <= self.buffer_km;

        if !other.path.iter().all(fits) {
            return false;
        }
        if self.path.len() <= 2 {
            return true;
        }

        let step_km = other.buffer_km.max(0.05);
        other.path.windows(2).all(|w| {
            let steps = (haversine_km(&w[0], &w[1]) / step_km).ceil().max(1.0) as usize;
            (1..steps).all(|i| {
                let t = i as f64 / steps as f64;
                fits(&GeoPoint {
                    lat: w[0].lat + (w[1].lat - w[0].lat) * t,
                    lng: w[0].lng + (w[1].lng - w[0].lng) * t,
                })
            })
        })
    }
}

/// A via-point `offset_km` off the midpoint of `origin`-`destination`, on the
/// side of the trip line away from the centroid of `avoid`.
pub fn detour_waypoint(
    origin: &GeoPoint,
    destination: &GeoPoint,
    avoid: &[GeoPoint],
    offset_km: f64,
) -> Option<GeoPoint> {
    if avoid.is_empty() {
        return None;
    }

    let (dx, dy) = to_local_km(origin, destination);
    let len = (dx * dx + dy * dy).sqrt();
    if len <= f64::EPSILON {
        return None;
    }

    let n = avoid.len() as f64;
    let centroid = GeoPoint {
        lat: avoid.iter().map(|p| p.lat).sum::<f64>() / n,
        lng: avoid.iter().map(|p| p.lng).sum::<f64>() / n,
    };
    let (cx, cy) = to_local_km(origin, &centroid);

    // left-hand normal of the trip direction
    let (nx, ny) = (-dy / len, dx / len);
    let side = if cx * nx + cy * ny > 0.0 { -1.0 } else { 1.0 };

    let (mx, my) = (dx / 2.0, dy / 2.0);
    Some(from_local_km(
        origin,
        mx + side * nx * offset_km,
        my + side * ny * offset_km,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint {
            lat: 32.7157,
            lng: -117.1611,
        };
        let distance = haversine_km(&p, &p);
        assert!(distance < 1e-9);
    }

    #[test]
    fn london_to_paris_is_around_343_km() {
        let london = GeoPoint {
            lat: 51.5074,
            lng: -0.1278,
        };
        let paris = GeoPoint {
            lat: 48.8566,
            lng: 2.3522,
        };
        let distance = haversine_km(&london, &paris);
        assert!((distance - 343.0).abs() < 5.0);
    }

    #[test]
    fn point_on_segment_has_zero_distance() {
        let a = GeoPoint::new(32.96, -117.04);
        let b = GeoPoint::new(32.98, -117.00);
        let mid = GeoPoint::new(32.97, -117.02);
        assert!(point_to_segment_km(&mid, &a, &b) < 0.01);
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let a = GeoPoint::new(32.96, -117.04);
        let b = GeoPoint::new(32.98, -117.00);
        let beyond = GeoPoint::new(33.00, -116.96);
        let expected = haversine_km(&beyond, &b);
        assert!((point_to_segment_km(&beyond, &a, &b) - expected).abs() < 0.05);
    }

    #[test]
    fn corridor_contains_nearby_points_only() {
        let corridor = Corridor::between(
            GeoPoint::new(32.96, -117.04),
            GeoPoint::new(32.98, -117.00),
            0.5,
        );
        assert!(corridor.contains(&GeoPoint::new(32.97, -117.02)));
        assert!(!corridor.contains(&GeoPoint::new(33.10, -117.02)));
    }

    #[test]
    fn wide_corridor_covers_narrow_one_inside_it() {
        let trip = Corridor::between(
            GeoPoint::new(32.96, -117.04),
            GeoPoint::new(32.98, -117.00),
            2.0,
        );
        let inner = Corridor::around_path(
            vec![
                GeoPoint::new(32.96, -117.04),
                GeoPoint::new(32.975, -117.025),
                GeoPoint::new(32.98, -117.00),
            ],
            0.15,
        )
        .unwrap();
        let outer = Corridor::around_path(
            vec![GeoPoint::new(32.96, -117.04), GeoPoint::new(33.20, -117.00)],
            0.15,
        )
        .unwrap();

        assert!(trip.covers(&inner));
        assert!(!trip.covers(&outer));
    }

    #[test]
    fn detour_goes_to_the_side_away_from_hazard() {
        let origin = GeoPoint::new(32.96, -117.04);
        let destination = GeoPoint::new(32.98, -117.00);
        let hazard = GeoPoint::new(32.97, -117.02);
        let north_of_line = GeoPoint::new(32.975, -117.025);

        let via = detour_waypoint(&origin, &destination, &[north_of_line], 1.0).unwrap();
        let trip = [origin, destination];

        assert!((distance_to_path_km(&via, &trip) - 1.0).abs() < 0.05);
        assert!(haversine_km(&via, &hazard) > 0.9);
        // the via point lands on the opposite side of the line from the avoid point
        assert!(via.lat < 32.97);
    }

    #[test]
    fn detour_needs_avoid_points() {
        let origin = GeoPoint::new(32.96, -117.04);
        let destination = GeoPoint::new(32.98, -117.00);
        assert!(detour_waypoint(&origin, &destination, &[], 1.0).is_none());
    }
}
