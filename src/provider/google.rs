use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::error::AppError;
use crate::geo::detour_waypoint;
use crate::models::location::GeoPoint;
use crate::models::route::{RouteCandidate, RouteSegment};
use crate::provider::{ProviderError, ProviderResult, RouteQuery, RoutingProvider};

/// Google Directions API client.
pub struct GoogleDirectionsProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    detour_offset_km: f64,
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    routes: Vec<ApiRoute>,
}

#[derive(Debug, Deserialize)]
struct ApiRoute {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    overview_polyline: Option<ApiPolyline>,
    legs: Vec<ApiLeg>,
}

#[derive(Debug, Deserialize)]
struct ApiPolyline {
    points: String,
}

#[derive(Debug, Deserialize)]
struct ApiLeg {
    distance: ApiValue,
    duration: ApiValue,
    #[serde(default)]
    duration_in_traffic: Option<ApiValue>,
    steps: Vec<ApiStep>,
}

#[derive(Debug, Deserialize)]
struct ApiStep {
    #[serde(default)]
    html_instructions: String,
    distance: ApiValue,
    duration: ApiValue,
    start_location: ApiLatLng,
    end_location: ApiLatLng,
}

#[derive(Debug, Deserialize)]
struct ApiValue {
    value: u64,
}

#[derive(Debug, Deserialize)]
struct ApiLatLng {
    lat: f64,
    lng: f64,
}

impl From<ApiLatLng> for GeoPoint {
    fn from(p: ApiLatLng) -> Self {
        GeoPoint { lat: p.lat, lng: p.lng }
    }
}

fn clamp_u32(value: u64) -> u32 {
    value.min(u32::MAX as u64) as u32
}

/// Removes markup from Directions step instructions.
pub fn strip_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => {
                in_tag = true;
                // tags like <div> separate phrases
                if !out.ends_with(' ') && !out.is_empty() {
                    out.push(' ');
                }
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn format_point(p: &GeoPoint) -> String {
    format!("{:.6},{:.6}", p.lat, p.lng)
}

/// Maps a Directions `status` other than `OK` onto the provider error taxonomy.
fn status_error(status: &str, message: Option<String>) -> ProviderError {
    let detail = match message {
        Some(msg) => format!("{status}: {msg}"),
        None => status.to_string(),
    };
    match status {
        "ZERO_RESULTS" | "NOT_FOUND" => ProviderError::NoRoute(detail),
        "INVALID_REQUEST" | "MAX_WAYPOINTS_EXCEEDED" | "MAX_ROUTE_LENGTH_EXCEEDED" => {
            ProviderError::InvalidRequest(detail)
        }
        "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => ProviderError::RateLimited(detail),
        "REQUEST_DENIED" => ProviderError::Denied(detail),
        _ => ProviderError::Transient(detail),
    }
}

fn to_candidate(route: ApiRoute) -> RouteCandidate {
    let mut distance_m = 0u64;
    let mut duration_s = 0u64;
    let mut traffic_duration_s: Option<u64> = None;
    let mut segments = Vec::new();

    for leg in route.legs {
        distance_m += leg.distance.value;
        duration_s += leg.duration.value;
        if let Some(in_traffic) = leg.duration_in_traffic {
            *traffic_duration_s.get_or_insert(0) += in_traffic.value;
        }
        segments.extend(leg.steps.into_iter().map(|step| RouteSegment {
            instruction: strip_html(&step.html_instructions),
            start: step.start_location.into(),
            end: step.end_location.into(),
            distance_m: clamp_u32(step.distance.value),
            duration_s: clamp_u32(step.duration.value),
        }));
    }

    RouteCandidate {
        summary: route.summary,
        segments,
        distance_m: clamp_u32(distance_m),
        duration_s: clamp_u32(duration_s),
        traffic_duration_s: traffic_duration_s.map(clamp_u32),
        polyline: route.overview_polyline.map(|p| p.points),
        fetched_at: Utc::now(),
    }
}

impl GoogleDirectionsProvider {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        detour_offset_km: f64,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| AppError::Internal(format!("failed to build http client: {err}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            detour_offset_km,
        })
    }

    fn params(&self, query: &RouteQuery) -> Vec<(&'static str, String)> {
        let departure = if query.departure_time > Utc::now() {
            query.departure_time.timestamp().to_string()
        } else {
            "now".to_string()
        };

        let mut params = vec![
            ("origin", format_point(&query.origin)),
            ("destination", format_point(&query.destination)),
            ("mode", query.mode.as_str().to_string()),
            ("alternatives", "true".to_string()),
            ("departure_time", departure),
        ];

        let offset = self.detour_offset_km * f64::from(query.attempt.max(1));
        if let Some(via) = detour_waypoint(&query.origin, &query.destination, &query.avoid, offset) {
            params.push(("waypoints", format!("via:{}", format_point(&via))));
        }

        params.push(("key", self.api_key.clone()));
        params
    }
}

#[async_trait]
impl RoutingProvider for GoogleDirectionsProvider {
    async fn fetch_routes(&self, query: &RouteQuery) -> ProviderResult<Vec<RouteCandidate>> {
        let url = format!("{}/directions/json", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&self.params(query))
            .send()
            .await
            .map_err(|err| ProviderError::Transient(format!("request failed: {err}")))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited(format!("http {status}")));
        }
        if status.is_server_error() {
            return Err(ProviderError::Transient(format!("http {status}")));
        }
        if !status.is_success() {
            return Err(ProviderError::InvalidRequest(format!("http {status}")));
        }

        let body: DirectionsResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::Transient(format!("malformed directions body: {err}")))?;

        if body.status != "OK" {
            return Err(status_error(&body.status, body.error_message));
        }
        if body.routes.is_empty() {
            return Err(ProviderError::NoRoute("OK with no routes".to_string()));
        }

        debug!(
            routes = body.routes.len(),
            attempt = query.attempt,
            "directions fetched"
        );
        Ok(body.routes.into_iter().map(to_candidate).collect())
    }

    fn name(&self) -> &'static str {
        "google_directions"
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

    use super::*;
    use crate::geo::{polyline, Corridor};
    use crate::models::route::TravelMode;

    struct HasViaWaypoint;

    impl Match for HasViaWaypoint {
        fn matches(&self, request: &Request) -> bool {
            request
                .url
                .query_pairs()
                .any(|(key, value)| key == "waypoints" && value.starts_with("via:"))
        }
    }

    fn query() -> RouteQuery {
        RouteQuery::primary(
            GeoPoint::new(32.96, -117.04),
            GeoPoint::new(32.98, -117.00),
            Utc::now(),
            TravelMode::Driving,
        )
    }

    fn directions_body() -> serde_json::Value {
        json!({
            "status": "OK",
            "routes": [{
                "summary": "Poway Rd",
                "overview_polyline": { "points": "abc" },
                "legs": [{
                    "distance": { "value": 4200, "text": "4.2 km" },
                    "duration": { "value": 540, "text": "9 mins" },
                    "duration_in_traffic": { "value": 600, "text": "10 mins" },
                    "steps": [
                        {
                            "html_instructions": "Head <b>east</b> on <b>Poway Rd</b>",
                            "distance": { "value": 2000 },
                            "duration": { "value": 240 },
                            "start_location": { "lat": 32.96, "lng": -117.04 },
                            "end_location": { "lat": 32.97, "lng": -117.02 }
                        },
                        {
                            "html_instructions": "Turn left onto <b>Pomerado Rd</b><div style=\"font-size:0.9em\">Destination will be on the right</div>",
                            "distance": { "value": 2200 },
                            "duration": { "value": 300 },
                            "start_location": { "lat": 32.97, "lng": -117.02 },
                            "end_location": { "lat": 32.98, "lng": -117.00 }
                        }
                    ]
                }]
            }]
        })
    }

    #[test]
    fn strips_markup_from_instructions() {
        assert_eq!(
            strip_html("Turn <b>left</b> onto <b>Main St</b><div>Pass by the park</div>"),
            "Turn left onto Main St Pass by the park"
        );
    }

    #[test]
    fn maps_directions_statuses() {
        assert!(matches!(status_error("ZERO_RESULTS", None), ProviderError::NoRoute(_)));
        assert!(matches!(
            status_error("INVALID_REQUEST", None),
            ProviderError::InvalidRequest(_)
        ));
        assert!(status_error("OVER_QUERY_LIMIT", None).is_retryable());
        assert!(status_error("UNKNOWN_ERROR", None).is_retryable());
        assert!(!status_error("REQUEST_DENIED", None).is_retryable());
    }

    #[tokio::test]
    async fn parses_routes_into_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/directions/json"))
            .and(query_param("alternatives", "true"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(directions_body()))
            .mount(&server)
            .await;

        let provider = GoogleDirectionsProvider::new("test-key", server.uri(), 1.0).unwrap();
        let routes = provider.fetch_routes(&query()).await.unwrap();

        assert_eq!(routes.len(), 1);
        let route = &routes[0];
        assert_eq!(route.summary, "Poway Rd");
        assert_eq!(route.distance_m, 4200);
        assert_eq!(route.duration_s, 540);
        assert_eq!(route.traffic_duration_s, Some(600));
        assert_eq!(route.segments.len(), 2);
        assert_eq!(route.segments[0].instruction, "Head east on Poway Rd");
        assert_eq!(route.path().len(), 3);
    }

    #[tokio::test]
    async fn zero_results_is_no_route() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/directions/json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "status": "ZERO_RESULTS", "routes": [] })),
            )
            .mount(&server)
            .await;

        let provider = GoogleDirectionsProvider::new("test-key", server.uri(), 1.0).unwrap();
        let err = provider.fetch_routes(&query()).await.unwrap_err();
        assert!(matches!(err, ProviderError::NoRoute(_)));
    }

    #[tokio::test]
    async fn server_errors_are_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let provider = GoogleDirectionsProvider::new("test-key", server.uri(), 1.0).unwrap();
        let err = provider.fetch_routes(&query()).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn alternates_send_via_waypoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/directions/json"))
            .and(HasViaWaypoint)
            .respond_with(ResponseTemplate::new(200).set_body_json(directions_body()))
            .mount(&server)
            .await;

        let provider = GoogleDirectionsProvider::new("test-key", server.uri(), 1.0).unwrap();
        let alternate = query().alternate(vec![GeoPoint::new(32.97, -117.02)], 1);
        assert!(provider.fetch_routes(&alternate).await.is_ok());
    }

    #[tokio::test]
    async fn hazard_on_curved_overview_is_inside_route_corridor() {
        let origin = GeoPoint::new(32.96, -117.04);
        let destination = GeoPoint::new(32.98, -117.00);
        let overview = polyline::encode(&[origin, GeoPoint::new(32.99, -117.04), destination]);
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/directions/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "OK",
                "routes": [{
                    "summary": "Espola Rd",
                    "overview_polyline": { "points": overview },
                    "legs": [{
                        "distance": { "value": 6100 },
                        "duration": { "value": 660 },
                        "steps": [{
                            "html_instructions": "Follow <b>Espola Rd</b>",
                            "distance": { "value": 6100 },
                            "duration": { "value": 660 },
                            "start_location": { "lat": 32.96, "lng": -117.04 },
                            "end_location": { "lat": 32.98, "lng": -117.00 }
                        }]
                    }]
                }]
            })))
            .mount(&server)
            .await;

        let provider = GoogleDirectionsProvider::new("test-key", server.uri(), 1.0).unwrap();
        let routes = provider.fetch_routes(&query()).await.unwrap();
        let route = &routes[0];
        let hazard = GeoPoint::new(32.985, -117.04);

        assert_eq!(route.path().len(), 3);
        assert!(Corridor::around_path(route.path(), 0.15).unwrap().contains(&hazard));
        // the single step runs straight from origin to destination, well clear of it
        assert!(!Corridor::between(origin, destination, 1.0).contains(&hazard));
    }
}
