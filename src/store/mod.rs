//! Persistence capabilities for hazard reports and user routines.
//!
//! The orchestrator only sees these traits; `memory` provides the in-process
//! `DashMap` backends the service runs with.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::Corridor;
use crate::models::hazard::{HazardReport, HazardSubmission, Severity};
use crate::models::routine::Routine;

pub type StoreResult<T> = Result<T, AppError>;

#[async_trait]
pub trait HazardStore: Send + Sync {
    /// Validates and stores a new report. Invalid severity, location or expiry
    /// is rejected with `AppError::InvalidHazard`.
    async fn report_hazard(&self, submission: HazardSubmission) -> StoreResult<HazardReport>;

    /// Unresolved reports inside `corridor` with `now < expires_at`, ordered by
    /// report time then id.
    async fn active_hazards_near(
        &self,
        corridor: &Corridor,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<HazardReport>>;

    async fn get_hazard(&self, id: Uuid) -> StoreResult<HazardReport>;

    /// Soft-deletes a report. Resolving twice keeps the first resolution time.
    async fn resolve_hazard(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<HazardReport>;

    async fn list_active(&self, now: DateTime<Utc>) -> StoreResult<Vec<HazardReport>>;

    /// Drops expired and resolved reports. Returns how many were removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize>;
}

#[async_trait]
pub trait RoutineStore: Send + Sync {
    /// Returns an owned snapshot. Another user's routine is reported as missing.
    async fn get_routine(&self, user_id: &str, id: Uuid) -> StoreResult<Routine>;

    /// Creates or replaces a routine on behalf of `actor`. Fails with
    /// `AppError::Permission` when `actor` does not own it.
    async fn upsert_routine(&self, actor: &str, routine: Routine) -> StoreResult<Uuid>;

    async fn list_routines(&self, user_id: &str) -> StoreResult<Vec<Routine>>;

    async fn delete_routine(&self, actor: &str, id: Uuid) -> StoreResult<()>;

    /// Every active routine across users, ordered by id.
    async fn active_routines(&self) -> StoreResult<Vec<Routine>>;
}

pub fn validate_submission(
    submission: HazardSubmission,
    now: DateTime<Utc>,
) -> Result<HazardReport, AppError> {
    let severity = Severity::from_level(submission.severity).ok_or_else(|| {
        AppError::InvalidHazard(format!(
            "severity {} outside scale {}..={}",
            submission.severity,
            Severity::Low.level(),
            Severity::MAX.level()
        ))
    })?;

    if !submission.location.is_valid() {
        return Err(AppError::InvalidHazard(
            "location must be a valid lat/lng".to_string(),
        ));
    }

    if submission.reporter_id.trim().is_empty() {
        return Err(AppError::InvalidHazard(
            "reporter_id cannot be empty".to_string(),
        ));
    }

    let reported_at = submission.reported_at.unwrap_or(now);
    if submission.expires_at <= reported_at {
        return Err(AppError::InvalidHazard(
            "expires_at must be after reported_at".to_string(),
        ));
    }

    Ok(HazardReport {
        id: Uuid::new_v4(),
        kind: submission.kind,
        location: submission.location,
        severity,
        description: submission.description,
        reporter_id: submission.reporter_id,
        reported_at,
        expires_at: submission.expires_at,
        resolved_at: None,
    })
}

pub fn validate_routine(routine: &Routine) -> Result<(), AppError> {
    if routine.name.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "routine name cannot be empty".to_string(),
        ));
    }
    if routine.waypoints.len() < 2 {
        return Err(AppError::InvalidRequest(
            "routine needs at least two waypoints".to_string(),
        ));
    }
    if !routine.waypoints.iter().all(|p| p.is_valid()) {
        return Err(AppError::InvalidRequest(
            "routine waypoints must be valid lat/lng".to_string(),
        ));
    }
    Ok(())
}
