use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;

use crate::engine::simulation::run_simulation;
use crate::error::AppError;
use crate::models::simulation::{AggregateStats, SimulationConfig};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/simulations", post(simulate))
}

async fn simulate(
    State(state): State<Arc<AppState>>,
    Json(config): Json<SimulationConfig>,
) -> Result<Json<AggregateStats>, AppError> {
    let stats = run_simulation(&state.orchestrator, &config).await?;
    Ok(Json(stats))
}
