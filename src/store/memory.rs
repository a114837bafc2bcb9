use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::Corridor;
use crate::models::hazard::{HazardReport, HazardSubmission};
use crate::models::routine::Routine;
use crate::store::{validate_routine, validate_submission, HazardStore, RoutineStore, StoreResult};

fn sort_hazards(hazards: &mut [HazardReport]) {
    hazards.sort_by(|a, b| a.reported_at.cmp(&b.reported_at).then(a.id.cmp(&b.id)));
}

#[derive(Debug, Default)]
pub struct MemoryHazardStore {
    hazards: DashMap<Uuid, HazardReport>,
}

impl MemoryHazardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.hazards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hazards.is_empty()
    }
}

#[async_trait]
impl HazardStore for MemoryHazardStore {
    async fn report_hazard(&self, submission: HazardSubmission) -> StoreResult<HazardReport> {
        let report = validate_submission(submission, Utc::now())?;
        self.hazards.insert(report.id, report.clone());

        info!(
            hazard_id = %report.id,
            severity = report.severity.level(),
            reporter_id = %report.reporter_id,
            lat = report.location.lat,
            lng = report.location.lng,
            "hazard reported"
        );
        Ok(report)
    }

    async fn active_hazards_near(
        &self,
        corridor: &Corridor,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<HazardReport>> {
        let mut hazards: Vec<HazardReport> = self
            .hazards
            .iter()
            .filter_map(|entry| {
                let hazard = entry.value();
                if hazard.is_active(now) && corridor.contains(&hazard.location) {
                    Some(hazard.clone())
                } else {
                    None
                }
            })
            .collect();

        sort_hazards(&mut hazards);
        Ok(hazards)
    }

    async fn get_hazard(&self, id: Uuid) -> StoreResult<HazardReport> {
        self.hazards
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("hazard {} not found", id)))
    }

    async fn resolve_hazard(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<HazardReport> {
        let mut hazard = self
            .hazards
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("hazard {} not found", id)))?;

        if hazard.resolved_at.is_none() {
            hazard.resolved_at = Some(now);
            info!(hazard_id = %id, "hazard resolved");
        }
        Ok(hazard.clone())
    }

    async fn list_active(&self, now: DateTime<Utc>) -> StoreResult<Vec<HazardReport>> {
        let mut hazards: Vec<HazardReport> = self
            .hazards
            .iter()
            .filter(|entry| entry.value().is_active(now))
            .map(|entry| entry.value().clone())
            .collect();

        sort_hazards(&mut hazards);
        Ok(hazards)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let before = self.hazards.len();
        self.hazards.retain(|_, hazard| hazard.is_active(now));
        let removed = before.saturating_sub(self.hazards.len());

        if removed > 0 {
            debug!(removed, "purged inactive hazards");
        }
        Ok(removed)
    }
}

#[derive(Debug, Default)]
pub struct MemoryRoutineStore {
    routines: DashMap<Uuid, Routine>,
}

impl MemoryRoutineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.routines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }
}

#[async_trait]
impl RoutineStore for MemoryRoutineStore {
    async fn get_routine(&self, user_id: &str, id: Uuid) -> StoreResult<Routine> {
        self.routines
            .get(&id)
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("routine {} not found", id)))
    }

    async fn upsert_routine(&self, actor: &str, mut routine: Routine) -> StoreResult<Uuid> {
        if routine.user_id != actor {
            return Err(AppError::Permission(format!(
                "user {actor} cannot write a routine owned by {}",
                routine.user_id
            )));
        }
        validate_routine(&routine)?;
        routine.updated_at = Utc::now();

        let id = routine.id;
        // the entry guard holds the shard lock, so writers to one id are serialized
        match self.routines.entry(id) {
            Entry::Occupied(mut existing) => {
                if existing.get().user_id != actor {
                    return Err(AppError::Permission(format!(
                        "routine {id} belongs to another user"
                    )));
                }
                existing.insert(routine);
            }
            Entry::Vacant(slot) => {
                slot.insert(routine);
            }
        }

        debug!(routine_id = %id, user_id = actor, "routine upserted");
        Ok(id)
    }

    async fn list_routines(&self, user_id: &str) -> StoreResult<Vec<Routine>> {
        let mut routines: Vec<Routine> = self
            .routines
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();

        routines.sort_by_key(|routine| routine.id);
        Ok(routines)
    }

    async fn delete_routine(&self, actor: &str, id: Uuid) -> StoreResult<()> {
        match self.routines.entry(id) {
            Entry::Occupied(existing) => {
                if existing.get().user_id != actor {
                    return Err(AppError::Permission(format!(
                        "routine {id} belongs to another user"
                    )));
                }
                existing.remove();
                Ok(())
            }
            Entry::Vacant(_) => Err(AppError::NotFound(format!("routine {} not found", id))),
        }
    }

    async fn active_routines(&self) -> StoreResult<Vec<Routine>> {
        let mut routines: Vec<Routine> = self
            .routines
            .iter()
            .filter(|entry| entry.value().active)
            .map(|entry| entry.value().clone())
            .collect();

        routines.sort_by_key(|routine| routine.id);
        Ok(routines)
    }
}
