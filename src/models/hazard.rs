use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::location::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Low = 1,
    Moderate = 2,
    High = 3,
    Critical = 4,
}

impl Severity {
    pub const MAX: Severity = Severity::Critical;

    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            1 => Some(Severity::Low),
            2 => Some(Severity::Moderate),
            3 => Some(Severity::High),
            4 => Some(Severity::Critical),
            _ => None,
        }
    }

    pub fn level(&self) -> u8 {
        *self as u8
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HazardKind {
    Accident,
    Construction,
    #[default]
    Hazard,
    Closure,
    Other,
}

/// Raw hazard report as submitted by a user; validated by the hazard store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HazardSubmission {
    #[serde(default)]
    pub kind: HazardKind,
    pub location: GeoPoint,
    /// Raw severity level, 1 (low) to 4 (critical).
    pub severity: i64,
    #[serde(default)]
    pub description: String,
    pub reporter_id: String,
    #[serde(default)]
    pub reported_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HazardReport {
    pub id: Uuid,
    pub kind: HazardKind,
    pub location: GeoPoint,
    pub severity: Severity,
    pub description: String,
    pub reporter_id: String,
    pub reported_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl HazardReport {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.resolved_at.is_none() && now < self.expires_at
    }
}
