use async_trait::async_trait;
use chrono::Utc;

use crate::geo::{detour_waypoint, haversine_km};
use crate::models::location::GeoPoint;
use crate::models::route::{RouteCandidate, RouteSegment, TravelMode};
use crate::provider::{ProviderError, ProviderResult, RouteQuery, RoutingProvider};

/// Offline provider: great-circle legs at a fixed speed per travel mode.
///
/// Primary queries get the direct leg. Queries with avoid points get a
/// two-leg detour through a via-point pushed `detour_offset_km * attempt`
/// away from the trip line.
#[derive(Debug, Clone)]
pub struct StraightLineProvider {
    detour_offset_km: f64,
}

impl StraightLineProvider {
    pub fn new(detour_offset_km: f64) -> Self {
        Self { detour_offset_km }
    }
}

impl Default for StraightLineProvider {
    fn default() -> Self {
        Self::new(1.0)
    }
}

fn speed_kmh(mode: TravelMode) -> f64 {
    match mode {
        TravelMode::Driving => 40.0,
        TravelMode::Walking => 5.0,
        TravelMode::Bicycling => 15.0,
        TravelMode::Transit => 25.0,
    }
}

fn leg(instruction: String, start: GeoPoint, end: GeoPoint, mode: TravelMode) -> RouteSegment {
    let km = haversine_km(&start, &end);
    RouteSegment {
        instruction,
        start,
        end,
        distance_m: (km * 1000.0).round() as u32,
        duration_s: (km / speed_kmh(mode) * 3600.0).round() as u32,
    }
}

#[async_trait]
impl RoutingProvider for StraightLineProvider {
    async fn fetch_routes(&self, query: &RouteQuery) -> ProviderResult<Vec<RouteCandidate>> {
        if !query.origin.is_valid() || !query.destination.is_valid() {
            return Err(ProviderError::InvalidRequest(
                "origin and destination must be valid coordinates".to_string(),
            ));
        }

        let offset = self.detour_offset_km * f64::from(query.attempt.max(1));
        let (summary, segments) =
            match detour_waypoint(&query.origin, &query.destination, &query.avoid, offset) {
                Some(via) => (
                    format!("detour {}", query.attempt),
                    vec![
                        leg("Head toward via point".to_string(), query.origin, via, query.mode),
                        leg("Continue to destination".to_string(), via, query.destination, query.mode),
                    ],
                ),
                None => (
                    "direct".to_string(),
                    vec![leg(
                        "Head toward destination".to_string(),
                        query.origin,
                        query.destination,
                        query.mode,
                    )],
                ),
            };

        Ok(vec![RouteCandidate {
            summary,
            distance_m: segments.iter().map(|s| s.distance_m).sum(),
            duration_s: segments.iter().map(|s| s.duration_s).sum(),
            segments,
            traffic_duration_s: None,
            polyline: None,
            fetched_at: Utc::now(),
        }])
    }

    fn name(&self) -> &'static str {
        "straight_line"
    }
}
