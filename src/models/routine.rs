use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::location::GeoPoint;

/// Recurring daily window. `start > end` wraps past midnight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// Days the window recurs on. Empty means every day.
    #[serde(default)]
    pub days: Vec<Weekday>,
}

impl TimeWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let time = at.time();
        let in_time = if self.start <= self.end {
            time >= self.start && time <= self.end
        } else {
            time >= self.start || time <= self.end
        };
        if !in_time {
            return false;
        }
        if self.days.is_empty() {
            return true;
        }

        // an after-midnight hit on a wrapping window belongs to the previous day
        let day = if self.start > self.end && time <= self.end {
            at.weekday().pred()
        } else {
            at.weekday()
        };
        self.days.contains(&day)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Routine {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub waypoints: Vec<GeoPoint>,
    pub window: TimeWindow,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}
