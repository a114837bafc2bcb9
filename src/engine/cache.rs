use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use uuid::Uuid;

use crate::models::location::GeoPoint;
use crate::models::route::{RouteRequest, RouteResult, TravelMode};

/// Coordinates are bucketed to 1e-4 degrees (about 11 m).
const COORD_SCALE: f64 = 10_000.0;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteCacheKey {
    origin: (i64, i64),
    destination: (i64, i64),
    time_bucket: i64,
    mode: TravelMode,
    routine_id: Option<Uuid>,
}

fn quantize(p: &GeoPoint) -> (i64, i64) {
    (
        (p.lat * COORD_SCALE).round() as i64,
        (p.lng * COORD_SCALE).round() as i64,
    )
}

impl RouteCacheKey {
    pub fn for_request(request: &RouteRequest, bucket_secs: i64) -> Self {
        Self {
            origin: quantize(&request.origin),
            destination: quantize(&request.destination),
            time_bucket: request.departure_time.timestamp().div_euclid(bucket_secs.max(1)),
            mode: request.mode,
            routine_id: request.routine_id,
        }
    }
}

struct CachedRoute {
    result: RouteResult,
    stored_at: Instant,
}

/// Last-known-good routes, last writer wins.
#[derive(Default)]
pub struct RouteCache {
    entries: DashMap<RouteCacheKey, CachedRoute>,
}

impl RouteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: RouteCacheKey, result: RouteResult) {
        self.entries.insert(
            key,
            CachedRoute {
                result,
                stored_at: Instant::now(),
            },
        );
    }

    /// The cached route for `key` if it was stored within `ttl`.
    pub fn get_fresh(&self, key: &RouteCacheKey, ttl: Duration) -> Option<RouteResult> {
        self.entries
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() <= ttl)
            .map(|entry| entry.result.clone())
    }

    pub fn purge_expired(&self, ttl: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.stored_at.elapsed() <= ttl);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::models::route::{TrafficAnalysis, TravelMode};

    fn request(minute: u32) -> RouteRequest {
        RouteRequest {
            origin: GeoPoint::new(32.96, -117.04),
            destination: GeoPoint::new(32.98, -117.00),
            requester_id: "u1".to_string(),
            departure_time: Utc.with_ymd_and_hms(2026, 10, 19, 8, minute, 0).unwrap(),
            routine_id: None,
            mode: TravelMode::Driving,
        }
    }

    fn result() -> RouteResult {
        RouteResult {
            summary: "direct".to_string(),
            segments: vec![],
            distance_m: 4000,
            base_duration_s: 400,
            estimated_duration_s: 400,
            polyline: None,
            traffic: TrafficAnalysis::neutral(),
            hazard_annotations: vec![],
            hazard_warning: false,
            stale: false,
            alternates_requested: 0,
            routine_bias_applied: false,
            data_freshness: Utc::now(),
        }
    }

    #[test]
    fn departures_in_same_bucket_share_a_key() {
        assert_eq!(
            RouteCacheKey::for_request(&request(1), 900),
            RouteCacheKey::for_request(&request(14), 900)
        );
        assert_ne!(
            RouteCacheKey::for_request(&request(1), 900),
            RouteCacheKey::for_request(&request(16), 900)
        );
    }

    #[test]
    fn entries_past_ttl_are_not_returned() {
        let cache = RouteCache::new();
        let key = RouteCacheKey::for_request(&request(0), 900);
        cache.put(key.clone(), result());

        assert!(cache.get_fresh(&key, Duration::from_secs(60)).is_some());

        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get_fresh(&key, Duration::from_millis(1)).is_none());
        assert_eq!(cache.purge_expired(Duration::from_millis(1)), 1);
        assert!(cache.is_empty());
    }
}
