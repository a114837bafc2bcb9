use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::location::BoundingBox;
use crate::models::route::TravelMode;

fn default_fleet_size() -> usize {
    10
}

fn default_trips_per_vehicle() -> usize {
    5
}

fn default_concurrency() -> usize {
    8
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub seed: u64,
    #[serde(default = "default_fleet_size")]
    pub fleet_size: usize,
    #[serde(default = "default_trips_per_vehicle")]
    pub trips_per_vehicle: usize,
    #[serde(default = "default_true")]
    pub include_routines: bool,
    /// Day the synthetic trips and routine replays depart on. Defaults to `now`'s date.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Clock used for hazard expiry. Defaults to the wall clock at start.
    #[serde(default)]
    pub now: Option<DateTime<Utc>>,
    /// Area synthetic endpoints are drawn from. Defaults to the service bounds.
    #[serde(default)]
    pub bounds: Option<BoundingBox>,
    #[serde(default)]
    pub mode: TravelMode,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            fleet_size: default_fleet_size(),
            trips_per_vehicle: default_trips_per_vehicle(),
            include_routines: true,
            date: None,
            now: None,
            bounds: None,
            mode: TravelMode::default(),
            concurrency: default_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DurationStats {
    pub mean_s: f64,
    pub min_s: u32,
    pub max_s: u32,
    pub p50_s: u32,
    pub p95_s: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AggregateStats {
    pub requests: usize,
    pub routine_requests: usize,
    pub synthetic_requests: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures_by_kind: BTreeMap<String, usize>,
    pub duration: DurationStats,
    pub total_distance_m: u64,
    pub hazard_warnings: usize,
    /// Disqualifying hazards on returned routes.
    pub hazard_exposures: usize,
    pub hazards_avoided: usize,
    pub alternates_requested: u64,
    pub routine_biased: usize,
    pub stale_results: usize,
}
