use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::location::GeoPoint;
use crate::models::routine::{Routine, TimeWindow};
use crate::state::AppState;

pub const USER_HEADER: &str = "x-user-id";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/routines", get(list_routines).put(upsert_routine))
        .route("/routines/:id", get(get_routine).delete(delete_routine))
}

fn default_active() -> bool {
    true
}

#[derive(Deserialize)]
pub struct UpsertRoutineRequest {
    /// Omitted to create a new routine.
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    pub waypoints: Vec<GeoPoint>,
    pub window: TimeWindow,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn acting_user(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|user| !user.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::InvalidRequest(format!("missing {USER_HEADER} header")))
}

async fn list_routines(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Routine>>, AppError> {
    let user = acting_user(&headers)?;
    Ok(Json(state.routines.list_routines(&user).await?))
}

async fn upsert_routine(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<UpsertRoutineRequest>,
) -> Result<Json<Routine>, AppError> {
    let user = acting_user(&headers)?;

    let routine = Routine {
        id: payload.id.unwrap_or_else(Uuid::new_v4),
        user_id: user.clone(),
        name: payload.name,
        waypoints: payload.waypoints,
        window: payload.window,
        active: payload.active,
        updated_at: Utc::now(),
    };

    let id = state.routines.upsert_routine(&user, routine).await?;
    Ok(Json(state.routines.get_routine(&user, id).await?))
}

async fn get_routine(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Routine>, AppError> {
    let user = acting_user(&headers)?;
    Ok(Json(state.routines.get_routine(&user, id).await?))
}

async fn delete_routine(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let user = acting_user(&headers)?;
    state.routines.delete_routine(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
