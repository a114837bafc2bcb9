use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::OrchestratorConfig;
use crate::engine::orchestrator::RouteOrchestrator;
use crate::models::hazard::HazardReport;
use crate::observability::metrics::Metrics;
use crate::provider::RoutingProvider;
use crate::store::memory::{MemoryHazardStore, MemoryRoutineStore};
use crate::store::{HazardStore, RoutineStore};
use crate::traffic::TrafficIndex;

pub struct AppState {
    pub hazards: Arc<dyn HazardStore>,
    pub routines: Arc<dyn RoutineStore>,
    pub traffic: Arc<TrafficIndex>,
    pub orchestrator: RouteOrchestrator,
    pub hazard_events_tx: broadcast::Sender<HazardReport>,
    pub metrics: Metrics,
    pub static_dir: String,
}

impl AppState {
    pub fn new(
        config: OrchestratorConfig,
        provider: Arc<dyn RoutingProvider>,
        traffic: TrafficIndex,
        event_buffer_size: usize,
    ) -> Self {
        let hazards: Arc<dyn HazardStore> = Arc::new(MemoryHazardStore::new());
        let routines: Arc<dyn RoutineStore> = Arc::new(MemoryRoutineStore::new());
        let traffic = Arc::new(traffic);
        let metrics = Metrics::new();
        let (hazard_events_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));

        let orchestrator = RouteOrchestrator::new(
            config,
            provider,
            hazards.clone(),
            routines.clone(),
            traffic.clone(),
            metrics.clone(),
        );

        Self {
            hazards,
            routines,
            traffic,
            orchestrator,
            hazard_events_tx,
            metrics,
            static_dir: "static".to_string(),
        }
    }

    pub fn with_static_dir(mut self, static_dir: impl Into<String>) -> Self {
        self.static_dir = static_dir.into();
        self
    }
}
