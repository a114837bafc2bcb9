//! Route orchestration: merges provider candidates, active hazards and the
//! requester's routine into one `RouteResult`.
//!
//! A pass runs three independent reads concurrently (provider, hazard store,
//! routine store), scores every candidate against the hazards, asks the
//! provider for bounded alternates when all candidates are blocked, and falls
//! back to the route cache when the provider is unavailable.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::engine::cache::{RouteCache, RouteCacheKey};
use crate::engine::scoring::{
    estimated_duration_s, hazard_hits, select_candidate, HazardHit, ScoredCandidate,
};
use crate::error::AppError;
use crate::geo::{haversine_km, Corridor};
use crate::models::hazard::HazardReport;
use crate::models::location::GeoPoint;
use crate::models::route::{HazardAnnotation, RouteCandidate, RouteRequest, RouteResult};
use crate::models::routine::Routine;
use crate::observability::metrics::Metrics;
use crate::provider::{ProviderResult, RouteQuery, RoutingProvider};
use crate::store::{HazardStore, RoutineStore};
use crate::traffic::TrafficIndex;

/// Origin and destination closer than this are treated as the same place.
const MIN_TRIP_KM: f64 = 0.01;

#[derive(Clone)]
pub struct RouteOrchestrator {
    config: OrchestratorConfig,
    provider: Arc<dyn RoutingProvider>,
    hazards: Arc<dyn HazardStore>,
    routines: Arc<dyn RoutineStore>,
    traffic: Arc<TrafficIndex>,
    cache: Arc<RouteCache>,
    metrics: Metrics,
}

struct Selection {
    chosen: ScoredCandidate,
    rejected_hits: Vec<HazardHit>,
    hazard_warning: bool,
    alternates_requested: u32,
    routine_bias_applied: bool,
}

impl RouteOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        provider: Arc<dyn RoutingProvider>,
        hazards: Arc<dyn HazardStore>,
        routines: Arc<dyn RoutineStore>,
        traffic: Arc<TrafficIndex>,
        metrics: Metrics,
    ) -> Self {
        Self {
            config,
            provider,
            hazards,
            routines,
            traffic,
            cache: Arc::new(RouteCache::new()),
            metrics,
        }
    }

    /// Same collaborators, private empty cache and metrics. Used by the
    /// simulation runner so replays never touch live cache or counters.
    pub fn isolated(&self) -> Self {
        Self {
            cache: Arc::new(RouteCache::new()),
            metrics: Metrics::new(),
            ..self.clone()
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn cache(&self) -> &RouteCache {
        &self.cache
    }

    pub fn routines(&self) -> &Arc<dyn RoutineStore> {
        &self.routines
    }

    pub async fn compute_route(&self, request: &RouteRequest) -> Result<RouteResult, AppError> {
        self.compute_route_at(request, Utc::now()).await
    }

    /// Computes a route with hazard expiry evaluated at `now`.
    pub async fn compute_route_at(
        &self,
        request: &RouteRequest,
        now: DateTime<Utc>,
    ) -> Result<RouteResult, AppError> {
        let start = Instant::now();
        let result = self.orchestrate(request, now).await;

        let outcome = match &result {
            Ok(route) if route.stale => "stale",
            Ok(route) if route.hazard_warning => "hazard_warning",
            Ok(_) => "fresh",
            Err(err) => err.kind(),
        };
        self.metrics
            .route_requests_total
            .with_label_values(&[outcome])
            .inc();
        self.metrics
            .route_latency_seconds
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());

        result
    }

    fn validate(&self, request: &RouteRequest) -> Result<(), AppError> {
        if !request.origin.is_valid() || !request.destination.is_valid() {
            return Err(AppError::InvalidRequest(
                "origin and destination must be valid lat/lng".to_string(),
            ));
        }
        if haversine_km(&request.origin, &request.destination) < MIN_TRIP_KM {
            return Err(AppError::InvalidRequest(
                "origin and destination must be distinct".to_string(),
            ));
        }
        let bounds = &self.config.service_bounds;
        if !bounds.contains(&request.origin) || !bounds.contains(&request.destination) {
            return Err(AppError::InvalidRequest(
                "origin and destination must be inside the service area".to_string(),
            ));
        }
        if request.requester_id.trim().is_empty() {
            return Err(AppError::InvalidRequest(
                "requester_id cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    async fn orchestrate(
        &self,
        request: &RouteRequest,
        now: DateTime<Utc>,
    ) -> Result<RouteResult, AppError> {
        self.validate(request)?;

        let key = RouteCacheKey::for_request(request, self.config.cache_bucket_secs);
        let query = RouteQuery::primary(
            request.origin,
            request.destination,
            request.departure_time,
            request.mode,
        );
        let trip = Corridor::between(
            request.origin,
            request.destination,
            self.config.corridor_padding_km,
        );

        let (routes, trip_hazards, routine) = tokio::join!(
            self.fetch(&query),
            self.hazards.active_hazards_near(&trip, now),
            self.load_routine(request),
        );
        let trip_hazards = trip_hazards?;
        let routine = routine?;

        let candidates = match routes {
            Ok(candidates) => candidates,
            Err(err) => {
                return self
                    .serve_cached(request, &key, &trip, &trip_hazards, err.into(), now)
                    .await;
            }
        };

        // the routine only biases departures inside its recurring window
        let bias = routine
            .as_ref()
            .filter(|r| r.active && r.window.contains(request.departure_time));

        let selection = self
            .select(request, &query, &trip, &trip_hazards, bias, candidates, now)
            .await?;
        let result = self.build_result(selection);

        info!(
            requester_id = %request.requester_id,
            duration_s = result.estimated_duration_s,
            hazards = result.hazard_annotations.len(),
            hazard_warning = result.hazard_warning,
            alternates = result.alternates_requested,
            routine_bias = result.routine_bias_applied,
            "route computed"
        );

        self.cache.put(key, result.clone());
        self.metrics
            .route_cache_events_total
            .with_label_values(&["store"])
            .inc();
        Ok(result)
    }

    async fn fetch(&self, query: &RouteQuery) -> ProviderResult<Vec<RouteCandidate>> {
        let result = self.provider.fetch_routes(query).await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.label(),
        };
        self.metrics
            .provider_calls_total
            .with_label_values(&[outcome])
            .inc();
        result
    }

    async fn load_routine(&self, request: &RouteRequest) -> Result<Option<Routine>, AppError> {
        match request.routine_id {
            Some(id) => self
                .routines
                .get_routine(&request.requester_id, id)
                .await
                .map(Some),
            None => Ok(None),
        }
    }

    /// Serves the cached route for an unavailable provider, re-checked against
    /// the hazards active at `now`.
    async fn serve_cached(
        &self,
        request: &RouteRequest,
        key: &RouteCacheKey,
        trip: &Corridor,
        trip_hazards: &[HazardReport],
        err: AppError,
        now: DateTime<Utc>,
    ) -> Result<RouteResult, AppError> {
        if !matches!(err, AppError::UpstreamUnavailable(_)) {
            return Err(err);
        }

        let Some(mut cached) = self.cache.get_fresh(key, self.config.cache_ttl) else {
            self.metrics
                .route_cache_events_total
                .with_label_values(&["miss"])
                .inc();
            return Err(err);
        };
        self.metrics
            .route_cache_events_total
            .with_label_values(&["hit"])
            .inc();

        let path = route_path_or_straight(request, cached.path());
        let hits = self.path_hits(trip, trip_hazards, &path, now).await?;
        let blocked = hits.iter().any(|hit| hit.disqualifying);
        if blocked && self.config.strict_hazard_avoidance {
            warn!(error = %err, "provider unavailable and cached route crosses a hazard");
            return Err(AppError::NoSafeRoute);
        }

        let on_route: Vec<Uuid> = hits.iter().map(|hit| hit.hazard.id).collect();
        let mut annotations: Vec<HazardAnnotation> =
            hits.iter().map(|hit| annotation(hit, false)).collect();
        annotations.extend(
            cached
                .hazard_annotations
                .into_iter()
                .filter(|a| a.avoided && !on_route.contains(&a.hazard_id)),
        );

        warn!(
            error = %err,
            hazard_warning = blocked,
            "provider unavailable; serving cached route"
        );
        cached.hazard_annotations = annotations;
        cached.hazard_warning = blocked;
        cached.stale = true;
        Ok(cached)
    }

    /// Hazards near `path`. The hazards prefetched for the trip corridor
    /// suffice unless the path strays outside it.
    async fn path_hits(
        &self,
        trip: &Corridor,
        trip_hazards: &[HazardReport],
        path: &[GeoPoint],
        now: DateTime<Utc>,
    ) -> Result<Vec<HazardHit>, AppError> {
        let corridor = Corridor::around_path(path.to_vec(), self.config.hazard_radius_km)
            .ok_or_else(|| AppError::Internal("route has an empty path".to_string()))?;

        let threshold = self.config.avoidance_threshold;
        if trip.covers(&corridor) {
            return Ok(hazard_hits(&corridor, trip_hazards, threshold, now));
        }
        let nearby = self.hazards.active_hazards_near(&corridor, now).await?;
        Ok(hazard_hits(&corridor, &nearby, threshold, now))
    }

    async fn score(
        &self,
        request: &RouteRequest,
        trip: &Corridor,
        trip_hazards: &[HazardReport],
        candidate: RouteCandidate,
        now: DateTime<Utc>,
    ) -> Result<ScoredCandidate, AppError> {
        let path = route_path_or_straight(request, candidate.path());
        let hits = self.path_hits(trip, trip_hazards, &path, now).await?;

        let traffic = self.traffic.route_adjustment(&candidate.segments);
        Ok(ScoredCandidate {
            estimated_duration_s: estimated_duration_s(&candidate, &traffic),
            traffic,
            path,
            hits,
            candidate,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn select(
        &self,
        request: &RouteRequest,
        query: &RouteQuery,
        trip: &Corridor,
        trip_hazards: &[HazardReport],
        routine: Option<&Routine>,
        candidates: Vec<RouteCandidate>,
        now: DateTime<Utc>,
    ) -> Result<Selection, AppError> {
        let mut scored = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            scored.push(self.score(request, trip, trip_hazards, candidate, now).await?);
        }
        if scored.is_empty() {
            return Err(AppError::NotFound("provider returned no routes".to_string()));
        }
        let primary_count = scored.len();

        let tolerance = self.config.duration_tolerance;
        let radius = self.config.routine_match_radius_km;
        let mut alternates_requested = 0;
        let mut picked = select_candidate(&scored, routine, tolerance, radius);

        while picked.is_none() && alternates_requested < self.config.max_alternates {
            alternates_requested += 1;
            self.metrics.alternates_requested_total.inc();

            let avoid = blocking_locations(&scored);
            debug!(
                attempt = alternates_requested,
                avoid = avoid.len(),
                "requesting alternate route"
            );

            let alternates = match self
                .fetch(&query.alternate(avoid, alternates_requested))
                .await
            {
                Ok(routes) => routes,
                Err(err) => {
                    warn!(error = %err, attempt = alternates_requested, "alternate route request failed");
                    if err.is_retryable() {
                        break;
                    }
                    continue;
                }
            };

            let first_new = scored.len();
            for candidate in alternates {
                scored.push(self.score(request, trip, trip_hazards, candidate, now).await?);
            }
            picked = select_candidate(&scored[first_new..], routine, tolerance, radius)
                .map(|(i, biased)| (first_new + i, biased));
        }

        let (index, routine_bias_applied, hazard_warning) = match picked {
            Some((index, biased)) => (index, biased, false),
            None if self.config.strict_hazard_avoidance => return Err(AppError::NoSafeRoute),
            None => {
                let fastest = (0..primary_count)
                    .min_by(|&a, &b| {
                        scored[a]
                            .estimated_duration_s
                            .cmp(&scored[b].estimated_duration_s)
                            .then(a.cmp(&b))
                    })
                    .unwrap_or(0);
                warn!(
                    requester_id = %request.requester_id,
                    alternates = alternates_requested,
                    "no hazard-free route; returning fastest route with warning"
                );
                (fastest, false, true)
            }
        };

        let chosen = scored.swap_remove(index);
        let rejected_hits = scored.into_iter().flat_map(|s| s.hits).collect();

        Ok(Selection {
            chosen,
            rejected_hits,
            hazard_warning,
            alternates_requested,
            routine_bias_applied,
        })
    }

    fn build_result(&self, selection: Selection) -> RouteResult {
        let Selection {
            chosen,
            rejected_hits,
            hazard_warning,
            alternates_requested,
            routine_bias_applied,
        } = selection;

        let mut annotations: Vec<HazardAnnotation> = chosen
            .hits
            .iter()
            .map(|hit| annotation(hit, false))
            .collect();

        let on_route: Vec<Uuid> = chosen.hits.iter().map(|hit| hit.hazard.id).collect();
        let avoided: BTreeMap<Uuid, &HazardHit> = rejected_hits
            .iter()
            .filter(|hit| hit.disqualifying && !on_route.contains(&hit.hazard.id))
            .map(|hit| (hit.hazard.id, hit))
            .collect();
        annotations.extend(avoided.values().map(|hit| annotation(hit, true)));

        let candidate = chosen.candidate;
        RouteResult {
            summary: candidate.summary,
            segments: candidate.segments,
            distance_m: candidate.distance_m,
            base_duration_s: candidate.duration_s,
            estimated_duration_s: chosen.estimated_duration_s,
            polyline: candidate.polyline,
            traffic: chosen.traffic,
            hazard_annotations: annotations,
            hazard_warning,
            stale: false,
            alternates_requested,
            routine_bias_applied,
            data_freshness: candidate.fetched_at,
        }
    }
}

fn route_path_or_straight(request: &RouteRequest, path: Vec<GeoPoint>) -> Vec<GeoPoint> {
    if path.len() < 2 {
        return vec![request.origin, request.destination];
    }
    path
}

fn annotation(hit: &HazardHit, avoided: bool) -> HazardAnnotation {
    HazardAnnotation {
        hazard_id: hit.hazard.id,
        severity: hit.hazard.severity,
        location: hit.hazard.location,
        distance_m: (hit.distance_km * 1000.0).round() as u32,
        disqualifying: hit.disqualifying,
        avoided,
    }
}

/// Locations of every disqualifying hazard seen so far, by hazard id.
fn blocking_locations(scored: &[ScoredCandidate]) -> Vec<GeoPoint> {
    scored
        .iter()
        .flat_map(|s| s.hits.iter())
        .filter(|hit| hit.disqualifying)
        .map(|hit| (hit.hazard.id, hit.hazard.location))
        .collect::<BTreeMap<_, _>>()
        .into_values()
        .collect()
}
