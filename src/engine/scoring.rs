use chrono::{DateTime, Utc};

use crate::geo::{distance_to_path_km, Corridor};
use crate::models::hazard::{HazardReport, Severity};
use crate::models::location::GeoPoint;
use crate::models::route::{RouteCandidate, TrafficAnalysis};
use crate::models::routine::Routine;

#[derive(Debug, Clone)]
pub struct HazardHit {
    pub hazard: HazardReport,
    pub distance_km: f64,
    pub disqualifying: bool,
}

#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub candidate: RouteCandidate,
    pub path: Vec<GeoPoint>,
    pub estimated_duration_s: u32,
    pub traffic: TrafficAnalysis,
    pub hits: Vec<HazardHit>,
}

impl ScoredCandidate {
    pub fn is_disqualified(&self) -> bool {
        self.hits.iter().any(|hit| hit.disqualifying)
    }
}

pub fn is_disqualifying(hazard: &HazardReport, threshold: Severity, now: DateTime<Utc>) -> bool {
    hazard.is_active(now) && hazard.severity > threshold
}

/// Candidate duration after traffic: the provider's live estimate when it has
/// one, otherwise the base duration scaled by the street congestion multiplier.
pub fn estimated_duration_s(candidate: &RouteCandidate, traffic: &TrafficAnalysis) -> u32 {
    match candidate.traffic_duration_s {
        Some(live) => live,
        None => (f64::from(candidate.duration_s) * traffic.multiplier).round() as u32,
    }
}

/// Active hazards whose location falls within `corridor`, nearest first.
pub fn hazard_hits(
    corridor: &Corridor,
    hazards: &[HazardReport],
    threshold: Severity,
    now: DateTime<Utc>,
) -> Vec<HazardHit> {
    let mut hits: Vec<HazardHit> = hazards
        .iter()
        .filter(|hazard| hazard.is_active(now) && corridor.contains(&hazard.location))
        .map(|hazard| HazardHit {
            distance_km: corridor.distance_km(&hazard.location),
            disqualifying: is_disqualifying(hazard, threshold, now),
            hazard: hazard.clone(),
        })
        .collect();

    hits.sort_by(|a, b| {
        a.distance_km
            .total_cmp(&b.distance_km)
            .then(a.hazard.id.cmp(&b.hazard.id))
    });
    hits
}

/// Share of routine waypoints lying within `radius_km` of the path, in [0, 1].
pub fn routine_affinity(path: &[GeoPoint], routine: &Routine, radius_km: f64) -> f64 {
    if routine.waypoints.is_empty() {
        return 0.0;
    }
    let near = routine
        .waypoints
        .iter()
        .filter(|waypoint| distance_to_path_km(waypoint, path) <= radius_km)
        .count();
    near as f64 / routine.waypoints.len() as f64
}

/// Picks the route to return among hazard-free candidates.
///
/// Without a routine the fastest wins. With one, every candidate within
/// `tolerance` of the fastest is ranked by routine affinity first. Remaining
/// ties go to the faster, then the earlier candidate. The flag reports whether
/// the routine moved the pick away from the fastest route.
pub fn select_candidate(
    scored: &[ScoredCandidate],
    routine: Option<&Routine>,
    tolerance: f64,
    match_radius_km: f64,
) -> Option<(usize, bool)> {
    let clean: Vec<usize> = (0..scored.len())
        .filter(|&i| !scored[i].is_disqualified())
        .collect();

    let fastest = clean
        .iter()
        .copied()
        .min_by(|&a, &b| {
            scored[a]
                .estimated_duration_s
                .cmp(&scored[b].estimated_duration_s)
                .then(a.cmp(&b))
        })?;

    let Some(routine) = routine else {
        return Some((fastest, false));
    };

    let limit = f64::from(scored[fastest].estimated_duration_s) * (1.0 + tolerance.max(0.0));
    let comparable = clean
        .iter()
        .copied()
        .filter(|&i| f64::from(scored[i].estimated_duration_s) <= limit);

    let best = comparable
        .map(|i| (i, routine_affinity(&scored[i].path, routine, match_radius_km)))
        .min_by(|a, b| {
            // higher affinity first
            b.1.total_cmp(&a.1)
                .then(scored[a.0].estimated_duration_s.cmp(&scored[b.0].estimated_duration_s))
                .then(a.0.cmp(&b.0))
        })
        .map(|(i, _)| i)
        .unwrap_or(fastest);

    Some((best, best != fastest))
}
