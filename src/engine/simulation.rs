use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use futures::{stream, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::engine::orchestrator::RouteOrchestrator;
use crate::error::AppError;
use crate::geo::haversine_km;
use crate::models::location::{BoundingBox, GeoPoint};
use crate::models::route::{RouteRequest, RouteResult};
use crate::models::simulation::{AggregateStats, DurationStats, SimulationConfig};

const MAX_SIMULATED_TRIPS: usize = 10_000;
const MIN_SYNTHETIC_TRIP_KM: f64 = 0.5;
const MAX_ENDPOINT_DRAWS: usize = 32;
/// Synthetic departures spread over 06:00..20:00 of the simulated day.
const DAY_START_HOUR: u32 = 6;
const DAY_SPAN_SECS: i64 = 14 * 3600;

struct Trip {
    request: RouteRequest,
    from_routine: bool,
}

/// Replays stored routines plus a seeded synthetic fleet through an isolated
/// orchestrator and aggregates the outcomes.
///
/// The live cache and stores are never written. Identical stores, provider and
/// config yield identical stats.
pub async fn run_simulation(
    orchestrator: &RouteOrchestrator,
    config: &SimulationConfig,
) -> Result<AggregateStats, AppError> {
    let synthetic = config
        .fleet_size
        .checked_mul(config.trips_per_vehicle)
        .filter(|&n| n <= MAX_SIMULATED_TRIPS)
        .ok_or_else(|| {
            AppError::InvalidRequest(format!(
                "fleet_size * trips_per_vehicle must not exceed {MAX_SIMULATED_TRIPS}"
            ))
        })?;

    let bounds = config
        .bounds
        .unwrap_or(orchestrator.config().service_bounds);
    if !bounds.is_valid() {
        return Err(AppError::InvalidRequest(
            "simulation bounds are not a valid box".to_string(),
        ));
    }

    let now = config.now.unwrap_or_else(Utc::now);
    let date = config.date.unwrap_or_else(|| now.date_naive());

    let mut trips = Vec::new();
    if config.include_routines {
        for routine in orchestrator.routines().active_routines().await? {
            let (Some(first), Some(last)) = (routine.waypoints.first(), routine.waypoints.last())
            else {
                continue;
            };
            trips.push(Trip {
                request: RouteRequest {
                    origin: *first,
                    destination: *last,
                    requester_id: routine.user_id.clone(),
                    departure_time: date.and_time(routine.window.start).and_utc(),
                    routine_id: Some(routine.id),
                    mode: config.mode,
                },
                from_routine: true,
            });
        }
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    for vehicle in 0..config.fleet_size {
        for _ in 0..config.trips_per_vehicle {
            let (origin, destination) = draw_endpoints(&mut rng, &bounds);
            trips.push(Trip {
                request: RouteRequest {
                    origin,
                    destination,
                    requester_id: format!("sim-vehicle-{vehicle}"),
                    departure_time: synthetic_departure(&mut rng, date),
                    routine_id: None,
                    mode: config.mode,
                },
                from_routine: false,
            });
        }
    }

    let routine_requests = trips.len() - synthetic;
    info!(
        seed = config.seed,
        routine_requests,
        synthetic_requests = synthetic,
        "simulation started"
    );

    let replay = orchestrator.isolated();
    let outcomes: Vec<(bool, Result<RouteResult, AppError>)> = stream::iter(trips)
        .map(|trip| {
            let replay = &replay;
            async move {
                let result = replay.compute_route_at(&trip.request, now).await;
                (trip.from_routine, result)
            }
        })
        .buffered(config.concurrency.max(1))
        .collect()
        .await;

    let stats = aggregate(routine_requests, synthetic, &outcomes);
    info!(
        succeeded = stats.succeeded,
        failed = stats.failed,
        hazard_warnings = stats.hazard_warnings,
        "simulation finished"
    );
    Ok(stats)
}

fn draw_point(rng: &mut StdRng, bounds: &BoundingBox) -> GeoPoint {
    GeoPoint::new(
        rng.gen_range(bounds.min_lat..=bounds.max_lat),
        rng.gen_range(bounds.min_lng..=bounds.max_lng),
    )
}

fn draw_endpoints(rng: &mut StdRng, bounds: &BoundingBox) -> (GeoPoint, GeoPoint) {
    let origin = draw_point(rng, bounds);
    let mut destination = draw_point(rng, bounds);
    for _ in 0..MAX_ENDPOINT_DRAWS {
        if haversine_km(&origin, &destination) >= MIN_SYNTHETIC_TRIP_KM {
            break;
        }
        destination = draw_point(rng, bounds);
    }
    (origin, destination)
}

fn synthetic_departure(rng: &mut StdRng, date: NaiveDate) -> DateTime<Utc> {
    let start = NaiveTime::from_hms_opt(DAY_START_HOUR, 0, 0).unwrap_or(NaiveTime::MIN);
    date.and_time(start).and_utc() + Duration::seconds(rng.gen_range(0..DAY_SPAN_SECS))
}

/// Nearest-rank percentile of an ascending slice.
fn percentile(sorted: &[u32], p: f64) -> u32 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = (p * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

fn aggregate(
    routine_requests: usize,
    synthetic_requests: usize,
    outcomes: &[(bool, Result<RouteResult, AppError>)],
) -> AggregateStats {
    let mut stats = AggregateStats {
        requests: outcomes.len(),
        routine_requests,
        synthetic_requests,
        ..AggregateStats::default()
    };
    let mut durations = Vec::with_capacity(outcomes.len());

    for (from_routine, outcome) in outcomes {
        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                stats.failed += 1;
                *stats
                    .failures_by_kind
                    .entry(err.kind().to_string())
                    .or_default() += 1;
                continue;
            }
        };

        stats.succeeded += 1;
        durations.push(result.estimated_duration_s);
        stats.total_distance_m += u64::from(result.distance_m);
        stats.alternates_requested += u64::from(result.alternates_requested);
        stats.hazard_warnings += usize::from(result.hazard_warning);
        stats.stale_results += usize::from(result.stale);
        stats.routine_biased += usize::from(*from_routine && result.routine_bias_applied);

        for annotation in &result.hazard_annotations {
            if annotation.avoided {
                stats.hazards_avoided += 1;
            } else if annotation.disqualifying {
                stats.hazard_exposures += 1;
            }
        }
    }

    durations.sort_unstable();
    if let (Some(&min_s), Some(&max_s)) = (durations.first(), durations.last()) {
        let total: u64 = durations.iter().map(|&d| u64::from(d)).sum();
        stats.duration = DurationStats {
            mean_s: total as f64 / durations.len() as f64,
            min_s,
            max_s,
            p50_s: percentile(&durations, 0.50),
            p95_s: percentile(&durations, 0.95),
        };
    }

    stats
}
