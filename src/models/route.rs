use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::polyline;
use crate::models::hazard::Severity;
use crate::models::location::GeoPoint;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    #[default]
    Driving,
    Walking,
    Bicycling,
    Transit,
}

impl TravelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TravelMode::Driving => "driving",
            TravelMode::Walking => "walking",
            TravelMode::Bicycling => "bicycling",
            TravelMode::Transit => "transit",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRequest {
    pub origin: GeoPoint,
    pub destination: GeoPoint,
    pub requester_id: String,
    pub departure_time: DateTime<Utc>,
    #[serde(default)]
    pub routine_id: Option<Uuid>,
    #[serde(default)]
    pub mode: TravelMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteSegment {
    pub instruction: String,
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub distance_m: u32,
    pub duration_s: u32,
}

/// A route as reported by a routing provider, before hazard and routine scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteCandidate {
    pub summary: String,
    pub segments: Vec<RouteSegment>,
    pub distance_m: u32,
    pub duration_s: u32,
    /// Provider's own live-traffic estimate, when it supplies one.
    pub traffic_duration_s: Option<u32>,
    pub polyline: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl RouteCandidate {
    pub fn path(&self) -> Vec<GeoPoint> {
        route_path(&self.segments, self.polyline.as_deref())
    }
}

/// Geometry of a route: the decoded overview polyline when it carries at least
/// two points, otherwise each segment start plus the final end.
fn route_path(segments: &[RouteSegment], encoded: Option<&str>) -> Vec<GeoPoint> {
    if let Some(points) = encoded.and_then(polyline::decode) {
        if points.len() >= 2 {
            return points;
        }
    }
    let mut path: Vec<GeoPoint> = segments.iter().map(|s| s.start).collect();
    if let Some(last) = segments.last() {
        path.push(last.end);
    }
    path
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HazardAnnotation {
    pub hazard_id: Uuid,
    pub severity: Severity,
    pub location: GeoPoint,
    pub distance_m: u32,
    /// Severity above the avoidance threshold.
    pub disqualifying: bool,
    /// Present on a rejected candidate and absent from the returned path.
    pub avoided: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrafficAnalysis {
    pub multiplier: f64,
    pub confidence: Confidence,
    pub streets_matched: usize,
}

impl TrafficAnalysis {
    pub fn neutral() -> Self {
        Self {
            multiplier: 1.0,
            confidence: Confidence::Low,
            streets_matched: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteResult {
    pub summary: String,
    pub segments: Vec<RouteSegment>,
    pub distance_m: u32,
    pub base_duration_s: u32,
    pub estimated_duration_s: u32,
    pub polyline: Option<String>,
    pub traffic: TrafficAnalysis,
    pub hazard_annotations: Vec<HazardAnnotation>,
    /// No hazard-free route was found; this one crosses a disqualifying hazard.
    pub hazard_warning: bool,
    /// Served from the route cache because the provider was unavailable.
    pub stale: bool,
    pub alternates_requested: u32,
    pub routine_bias_applied: bool,
    pub data_freshness: DateTime<Utc>,
}

impl RouteResult {
    pub fn path(&self) -> Vec<GeoPoint> {
        route_path(&self.segments, self.polyline.as_deref())
    }
}
