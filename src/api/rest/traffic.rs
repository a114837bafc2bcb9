use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;
use crate::traffic::{StreetLevel, StreetMatch, TrafficStats};

const MAX_SEARCH_LIMIT: usize = 50;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/traffic/level", get(street_level))
        .route("/traffic/search", get(search_streets))
        .route("/traffic/stats", get(stats))
}

#[derive(Deserialize)]
pub struct LevelQuery {
    pub street: String,
}

fn default_limit() -> usize {
    10
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

async fn street_level(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LevelQuery>,
) -> Result<Json<StreetLevel>, AppError> {
    if query.street.trim().is_empty() {
        return Err(AppError::InvalidRequest("street cannot be empty".to_string()));
    }
    Ok(Json(state.traffic.street_level(&query.street)))
}

async fn search_streets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<StreetMatch>>, AppError> {
    if query.q.trim().len() < 2 {
        return Err(AppError::InvalidRequest(
            "q must be at least 2 characters".to_string(),
        ));
    }
    let limit = query.limit.clamp(1, MAX_SEARCH_LIMIT);
    Ok(Json(state.traffic.search(&query.q, limit)))
}

async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<TrafficStats>, AppError> {
    state
        .traffic
        .stats()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("no traffic data loaded".to_string()))
}
