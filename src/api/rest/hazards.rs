use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::Corridor;
use crate::models::hazard::{HazardReport, HazardSubmission};
use crate::models::location::GeoPoint;
use crate::state::AppState;

const MAX_NEAR_RADIUS_KM: f64 = 50.0;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/hazards", post(report_hazard).get(list_active))
        .route("/hazards/near", get(hazards_near))
        .route("/hazards/:id", get(get_hazard))
        .route("/hazards/:id/resolve", post(resolve_hazard))
}

fn default_radius_km() -> f64 {
    1.0
}

#[derive(Deserialize)]
pub struct NearQuery {
    pub lat: f64,
    pub lng: f64,
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,
}

async fn report_hazard(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<HazardSubmission>,
) -> Result<(StatusCode, Json<HazardReport>), AppError> {
    let report = match state.hazards.report_hazard(payload).await {
        Ok(report) => report,
        Err(err) => {
            state
                .metrics
                .hazard_reports_total
                .with_label_values(&["rejected"])
                .inc();
            return Err(err);
        }
    };

    state
        .metrics
        .hazard_reports_total
        .with_label_values(&["accepted"])
        .inc();
    if state.hazard_events_tx.send(report.clone()).is_err() {
        debug!(hazard_id = %report.id, "no websocket subscribers for hazard event");
    }

    Ok((StatusCode::CREATED, Json(report)))
}

async fn list_active(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<HazardReport>>, AppError> {
    let active = state.hazards.list_active(Utc::now()).await?;
    state.metrics.active_hazards.set(active.len() as i64);
    Ok(Json(active))
}

async fn hazards_near(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NearQuery>,
) -> Result<Json<Vec<HazardReport>>, AppError> {
    let center = GeoPoint::new(query.lat, query.lng);
    if !center.is_valid() {
        return Err(AppError::InvalidRequest(
            "lat/lng must be a valid coordinate".to_string(),
        ));
    }
    if !(query.radius_km > 0.0 && query.radius_km <= MAX_NEAR_RADIUS_KM) {
        return Err(AppError::InvalidRequest(format!(
            "radius_km must be in (0, {MAX_NEAR_RADIUS_KM}]"
        )));
    }

    let area = Corridor::around_path(vec![center], query.radius_km)
        .ok_or_else(|| AppError::Internal("failed to build search area".to_string()))?;
    let hazards = state.hazards.active_hazards_near(&area, Utc::now()).await?;
    Ok(Json(hazards))
}

async fn get_hazard(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<HazardReport>, AppError> {
    Ok(Json(state.hazards.get_hazard(id).await?))
}

async fn resolve_hazard(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<HazardReport>, AppError> {
    Ok(Json(state.hazards.resolve_hazard(id, Utc::now()).await?))
}
