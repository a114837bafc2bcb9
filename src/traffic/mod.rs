//! Historical street traffic counts and the congestion multipliers derived from them.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppError;
use crate::models::route::{Confidence, RouteSegment, TrafficAnalysis};

const STREET_SUFFIXES: [(&str, &str); 10] = [
    ("STREET", "ST"),
    ("AVENUE", "AV"),
    ("BOULEVARD", "BL"),
    ("DRIVE", "DR"),
    ("ROAD", "RD"),
    ("LANE", "LN"),
    ("COURT", "CT"),
    ("PLACE", "PL"),
    ("HIGHWAY", "HW"),
    ("FREEWAY", "FW"),
];

const LEAD_WORDS: [&str; 5] = ["ONTO", "ON", "TO", "VIA", "TAKE"];

/// Number of most recent counts averaged per street.
const RECENT_SAMPLES: usize = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrafficLevel {
    VeryLow,
    Low,
    Moderate,
    High,
    VeryHigh,
    Unknown,
}

impl TrafficLevel {
    /// Classifies a daily vehicle count.
    pub fn from_count(count: f64) -> Self {
        if count < 3_000.0 {
            TrafficLevel::VeryLow
        } else if count < 8_000.0 {
            TrafficLevel::Low
        } else if count < 15_000.0 {
            TrafficLevel::Moderate
        } else if count < 25_000.0 {
            TrafficLevel::High
        } else {
            TrafficLevel::VeryHigh
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            TrafficLevel::VeryLow => 0.90,
            TrafficLevel::Low => 0.95,
            TrafficLevel::Moderate | TrafficLevel::Unknown => 1.0,
            TrafficLevel::High => 1.15,
            TrafficLevel::VeryHigh => 1.30,
        }
    }
}

/// One row of the traffic count dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficRecord {
    pub street_name: String,
    pub total_count: f64,
    #[serde(default)]
    pub date_count: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StreetTraffic {
    pub avg_count: f64,
    pub max_count: f64,
    pub min_count: f64,
    pub sample_size: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StreetLevel {
    pub street: String,
    pub level: TrafficLevel,
    pub multiplier: f64,
    pub count: Option<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StreetMatch {
    pub street_name: String,
    pub avg_count: u64,
    pub traffic_level: TrafficLevel,
    pub sample_size: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrafficStats {
    pub total_records: usize,
    pub unique_streets: usize,
    pub avg_traffic_count: u64,
    pub max_traffic_count: u64,
    pub min_traffic_count: u64,
    pub earliest: Option<NaiveDate>,
    pub latest: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct TrafficIndex {
    streets: HashMap<String, StreetTraffic>,
    records: usize,
    count_sum: f64,
    count_max: f64,
    count_min: f64,
    earliest: Option<NaiveDate>,
    latest: Option<NaiveDate>,
}

/// Upper-cases, abbreviates street suffixes and collapses whitespace.
pub fn normalize_street_name(name: &str) -> String {
    name.to_uppercase()
        .split_whitespace()
        .map(|word| {
            STREET_SUFFIXES
                .iter()
                .find(|(full, _)| *full == word)
                .map(|(_, abbrev)| *abbrev)
                .unwrap_or(word)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_suffix(token: &str) -> bool {
    STREET_SUFFIXES.iter().any(|(_, abbrev)| *abbrev == token)
}

/// Street names mentioned in a turn instruction, e.g. "Turn left onto Poway Rd".
///
/// Yields both the word directly before a suffix ("POWAY RD") and the phrase
/// between a lead word and the suffix ("POWAY").
pub fn extract_streets(instruction: &str) -> Vec<String> {
    let normalized = normalize_street_name(
        &instruction
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect::<String>(),
    );
    let tokens: Vec<&str> = normalized.split_whitespace().collect();

    let mut streets = BTreeSet::new();
    for (i, token) in tokens.iter().enumerate() {
        if i == 0 || !is_suffix(token) {
            continue;
        }

        streets.insert(format!("{} {}", tokens[i - 1], token));

        if let Some(lead) = tokens[..i].iter().rposition(|t| LEAD_WORDS.contains(t)) {
            let phrase = tokens[lead + 1..i].join(" ");
            if !phrase.is_empty() {
                streets.insert(phrase);
            }
        }
    }

    streets.into_iter().filter(|s| s.len() > 2).collect()
}

impl TrafficIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            AppError::Internal(format!("failed to read traffic data {}: {err}", path.display()))
        })?;
        let records: Vec<TrafficRecord> = serde_json::from_str(&raw).map_err(|err| {
            AppError::Internal(format!("invalid traffic data {}: {err}", path.display()))
        })?;

        let index = Self::from_records(records);
        info!(
            records = index.records,
            streets = index.streets.len(),
            "traffic data loaded"
        );
        Ok(index)
    }

    pub fn from_records(records: Vec<TrafficRecord>) -> Self {
        let mut index = Self::empty();
        let mut by_street: HashMap<String, Vec<TrafficRecord>> = HashMap::new();

        for record in records {
            let count = if record.total_count.is_finite() {
                record.total_count.max(0.0)
            } else {
                0.0
            };
            index.count_sum += count;
            index.count_max = if index.records == 0 { count } else { index.count_max.max(count) };
            index.count_min = if index.records == 0 { count } else { index.count_min.min(count) };
            index.records += 1;

            if let Some(date) = record.date_count {
                index.earliest = Some(index.earliest.map_or(date, |d| d.min(date)));
                index.latest = Some(index.latest.map_or(date, |d| d.max(date)));
            }

            by_street
                .entry(normalize_street_name(&record.street_name))
                .or_default()
                .push(TrafficRecord {
                    total_count: count,
                    ..record
                });
        }

        for (street, mut rows) in by_street {
            let sample_size = rows.len();
            let max_count = rows.iter().map(|r| r.total_count).fold(f64::MIN, f64::max);
            let min_count = rows.iter().map(|r| r.total_count).fold(f64::MAX, f64::min);

            let dated = rows.iter().any(|r| r.date_count.is_some());
            let avg_count = if dated {
                // newest first; undated rows sort last
                rows.sort_by(|a, b| b.date_count.cmp(&a.date_count));
                let recent = &rows[..rows.len().min(RECENT_SAMPLES)];
                recent.iter().map(|r| r.total_count).sum::<f64>() / recent.len() as f64
            } else {
                rows.iter().map(|r| r.total_count).sum::<f64>() / sample_size as f64
            };

            index.streets.insert(
                street,
                StreetTraffic {
                    avg_count,
                    max_count,
                    min_count,
                    sample_size,
                },
            );
        }

        index
    }

    pub fn is_empty(&self) -> bool {
        self.streets.is_empty()
    }

    /// Average daily count for a street: exact match first, then the mean of
    /// every indexed street containing (or contained in) the name.
    pub fn traffic_count(&self, street: &str) -> Option<f64> {
        let normalized = normalize_street_name(street);
        if normalized.is_empty() {
            return None;
        }
        if let Some(hit) = self.streets.get(&normalized) {
            return Some(hit.avg_count);
        }

        let partial: Vec<f64> = self
            .streets
            .iter()
            .filter(|(name, _)| name.contains(&normalized) || normalized.contains(name.as_str()))
            .map(|(_, data)| data.avg_count)
            .collect();

        if partial.is_empty() {
            None
        } else {
            Some(partial.iter().sum::<f64>() / partial.len() as f64)
        }
    }

    pub fn street_level(&self, street: &str) -> StreetLevel {
        let count = self.traffic_count(street);
        let level = count.map_or(TrafficLevel::Unknown, TrafficLevel::from_count);
        StreetLevel {
            street: street.to_string(),
            level,
            multiplier: level.multiplier(),
            count,
        }
    }

    /// Per-street levels for every recognised street along the route.
    pub fn route_details(&self, segments: &[RouteSegment]) -> Vec<StreetLevel> {
        segments
            .iter()
            .flat_map(|segment| extract_streets(&segment.instruction))
            .map(|street| self.street_level(&street))
            .filter(|level| level.level != TrafficLevel::Unknown)
            .collect()
    }

    /// Mean congestion multiplier over the route's recognised streets.
    pub fn route_adjustment(&self, segments: &[RouteSegment]) -> TrafficAnalysis {
        let details = self.route_details(segments);
        if details.is_empty() {
            return TrafficAnalysis::neutral();
        }

        let mean = details.iter().map(|d| d.multiplier).sum::<f64>() / details.len() as f64;
        let confidence = match details.len() {
            n if n >= 5 => Confidence::High,
            n if n >= 2 => Confidence::Medium,
            _ => Confidence::Low,
        };

        TrafficAnalysis {
            multiplier: (mean * 1000.0).round() / 1000.0,
            confidence,
            streets_matched: details.len(),
        }
    }

    /// Streets containing `query`; prefix matches first, then by traffic count.
    pub fn search(&self, query: &str, limit: usize) -> Vec<StreetMatch> {
        let query = query.trim().to_uppercase();
        if query.is_empty() {
            return Vec::new();
        }

        let mut matches: Vec<StreetMatch> = self
            .streets
            .iter()
            .filter(|(name, _)| name.contains(&query))
            .map(|(name, data)| StreetMatch {
                street_name: name.clone(),
                avg_count: data.avg_count.round() as u64,
                traffic_level: TrafficLevel::from_count(data.avg_count),
                sample_size: data.sample_size,
            })
            .collect();

        matches.sort_by(|a, b| {
            (!a.street_name.starts_with(&query))
                .cmp(&!b.street_name.starts_with(&query))
                .then(b.avg_count.cmp(&a.avg_count))
                .then(a.street_name.cmp(&b.street_name))
        });
        matches.truncate(limit);
        matches
    }

    pub fn stats(&self) -> Option<TrafficStats> {
        if self.records == 0 {
            return None;
        }
        Some(TrafficStats {
            total_records: self.records,
            unique_streets: self.streets.len(),
            avg_traffic_count: (self.count_sum / self.records as f64).round() as u64,
            max_traffic_count: self.count_max.round() as u64,
            min_traffic_count: self.count_min.round() as u64,
            earliest: self.earliest,
            latest: self.latest,
        })
    }
}
