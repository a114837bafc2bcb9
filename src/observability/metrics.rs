use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub route_requests_total: IntCounterVec,
    pub route_latency_seconds: HistogramVec,
    pub route_cache_events_total: IntCounterVec,
    pub provider_calls_total: IntCounterVec,
    pub alternates_requested_total: IntCounter,
    pub hazard_reports_total: IntCounterVec,
    pub active_hazards: IntGauge,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let route_requests_total = IntCounterVec::new(
            Opts::new("route_requests_total", "Route computations by outcome"),
            &["outcome"],
        )
        .expect("valid route_requests_total metric");

        let route_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "route_latency_seconds",
                "Latency of route orchestration in seconds",
            ),
            &["outcome"],
        )
        .expect("valid route_latency_seconds metric");

        let route_cache_events_total = IntCounterVec::new(
            Opts::new("route_cache_events_total", "Route cache stores, hits and misses"),
            &["event"],
        )
        .expect("valid route_cache_events_total metric");

        let provider_calls_total = IntCounterVec::new(
            Opts::new("provider_calls_total", "Routing provider calls by outcome"),
            &["outcome"],
        )
        .expect("valid provider_calls_total metric");

        let alternates_requested_total = IntCounter::new(
            "alternates_requested_total",
            "Alternate routes requested to avoid hazards",
        )
        .expect("valid alternates_requested_total metric");

        let hazard_reports_total = IntCounterVec::new(
            Opts::new("hazard_reports_total", "Hazard reports by outcome"),
            &["outcome"],
        )
        .expect("valid hazard_reports_total metric");

        let active_hazards = IntGauge::new("active_hazards", "Hazards active at last listing")
            .expect("valid active_hazards metric");

        registry
            .register(Box::new(route_requests_total.clone()))
            .expect("register route_requests_total");
        registry
            .register(Box::new(route_latency_seconds.clone()))
            .expect("register route_latency_seconds");
        registry
            .register(Box::new(route_cache_events_total.clone()))
            .expect("register route_cache_events_total");
        registry
            .register(Box::new(provider_calls_total.clone()))
            .expect("register provider_calls_total");
        registry
            .register(Box::new(alternates_requested_total.clone()))
            .expect("register alternates_requested_total");
        registry
            .register(Box::new(hazard_reports_total.clone()))
            .expect("register hazard_reports_total");
        registry
            .register(Box::new(active_hazards.clone()))
            .expect("register active_hazards");

        Self {
            registry,
            route_requests_total,
            route_latency_seconds,
            route_cache_events_total,
            provider_calls_total,
            alternates_requested_total,
            hazard_reports_total,
            active_hazards,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
