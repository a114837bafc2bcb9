//! Routing providers: where candidate routes come from.
//!
//! The orchestrator talks to a [`RoutingProvider`]. Concrete backends are the
//! Google Directions client and an offline straight-line estimator; either can
//! be wrapped in [`ResilientProvider`] for timeouts and retries.

pub mod google;
pub mod resilient;
pub mod straight_line;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::location::GeoPoint;
use crate::models::route::{RouteCandidate, TravelMode};

pub use google::GoogleDirectionsProvider;
pub use resilient::ResilientProvider;
pub use straight_line::StraightLineProvider;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    #[error("no route found: {0}")]
    NoRoute(String),

    #[error("provider rejected request: {0}")]
    InvalidRequest(String),

    #[error("provider rate limited: {0}")]
    RateLimited(String),

    #[error("provider denied access: {0}")]
    Denied(String),

    #[error("provider call timed out after {0} ms")]
    Timeout(u64),

    #[error("transient provider failure: {0}")]
    Transient(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited(_) | ProviderError::Timeout(_) | ProviderError::Transient(_)
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProviderError::NoRoute(_) => "no_route",
            ProviderError::InvalidRequest(_) => "invalid_request",
            ProviderError::RateLimited(_) => "rate_limited",
            ProviderError::Denied(_) => "denied",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::Transient(_) => "transient",
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Clone, PartialEq)]
pub struct RouteQuery {
    pub origin: GeoPoint,
    pub destination: GeoPoint,
    pub departure_time: DateTime<Utc>,
    pub mode: TravelMode,
    /// Locations the route should keep away from. Empty for the first request.
    pub avoid: Vec<GeoPoint>,
    /// 0 for the primary request; alternates count up from 1.
    pub attempt: u32,
}

impl RouteQuery {
    pub fn primary(
        origin: GeoPoint,
        destination: GeoPoint,
        departure_time: DateTime<Utc>,
        mode: TravelMode,
    ) -> Self {
        Self {
            origin,
            destination,
            departure_time,
            mode,
            avoid: Vec::new(),
            attempt: 0,
        }
    }

    pub fn alternate(&self, avoid: Vec<GeoPoint>, attempt: u32) -> Self {
        Self {
            avoid,
            attempt,
            ..self.clone()
        }
    }
}

#[async_trait]
pub trait RoutingProvider: Send + Sync {
    /// Candidate routes for `query`, best first. Never returns an empty list:
    /// no route is reported as `ProviderError::NoRoute`.
    async fn fetch_routes(&self, query: &RouteQuery) -> ProviderResult<Vec<RouteCandidate>>;

    fn name(&self) -> &'static str;
}
