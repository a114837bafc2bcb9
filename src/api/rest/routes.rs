use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;

use crate::error::AppError;
use crate::models::route::{RouteRequest, RouteResult};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/routes", post(compute_route))
}

async fn compute_route(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RouteRequest>,
) -> Result<Json<RouteResult>, AppError> {
    let result = state.orchestrator.compute_route(&request).await?;
    Ok(Json(result))
}
