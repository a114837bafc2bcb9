use std::io;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use route_orchestrator::api::rest::router;
use route_orchestrator::config::OrchestratorConfig;
use route_orchestrator::provider::StraightLineProvider;
use route_orchestrator::state::AppState;
use route_orchestrator::traffic::{TrafficIndex, TrafficRecord};
use serde_json::{json, Value};
use tower::ServiceExt;

fn shared_state(traffic: TrafficIndex) -> Arc<AppState> {
    Arc::new(AppState::new(
        OrchestratorConfig::default(),
        Arc::new(StraightLineProvider::default()),
        traffic,
        1024,
    ))
}

fn setup() -> axum::Router {
    router(shared_state(TrafficIndex::empty()))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn user_request(method: &str, uri: &str, user: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-user-id", user)
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn hazard_body(lat: f64, lng: f64, severity: i64) -> Value {
    json!({
        "kind": "closure",
        "location": { "lat": lat, "lng": lng },
        "severity": severity,
        "description": "road closed",
        "reporter_id": "reporter-1",
        "expires_at": (Utc::now() + Duration::hours(1)).to_rfc3339()
    })
}

fn route_body() -> Value {
    json!({
        "origin": { "lat": 32.96, "lng": -117.04 },
        "destination": { "lat": 32.98, "lng": -117.00 },
        "requester_id": "u1",
        "departure_time": "2026-10-19T08:00:00Z"
    })
}

fn routine_body() -> Value {
    json!({
        "name": "commute",
        "waypoints": [
            { "lat": 32.96, "lng": -117.04 },
            { "lat": 32.98, "lng": -117.00 }
        ],
        "window": { "start": "07:00:00", "end": "09:00:00", "days": ["Mon", "Tue"] }
    })
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["active_hazards"], 0);
    assert_eq!(body["cached_routes"], 0);
    assert_eq!(body["traffic_streets_loaded"], false);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("alternates_requested_total"));
}

#[tokio::test]
async fn report_hazard_returns_201() {
    let app = setup();
    let response = app
        .oneshot(json_request("POST", "/hazards", hazard_body(32.97, -117.02, 4)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["severity"], "Critical");
    assert_eq!(body["kind"], "closure");
    assert!(body["resolved_at"].is_null());
    assert!(!body["id"].as_str().unwrap().is_empty());
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn accepted_hazard_is_logged_once() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let response = setup()
        .oneshot(json_request("POST", "/hazards", hazard_body(32.97, -117.02, 4)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert_eq!(output.matches("hazard reported").count(), 1);
}

#[tokio::test]
async fn report_hazard_out_of_scale_severity_returns_400() {
    let app = setup();
    let response = app
        .oneshot(json_request("POST", "/hazards", hazard_body(32.97, -117.02, 9)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("severity"));
}

#[tokio::test]
async fn hazard_lifecycle_near_and_resolve() {
    let app = setup();

    let res = app
        .clone()
        .oneshot(json_request("POST", "/hazards", hazard_body(32.97, -117.02, 3)))
        .await
        .unwrap();
    let hazard = body_json(res).await;
    let id = hazard["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(get_request("/hazards/near?lat=32.971&lng=-117.021&radius_km=1"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await.as_array().unwrap().len(), 1);

    let res = app
        .clone()
        .oneshot(get_request("/hazards/near?lat=32.70&lng=-117.16&radius_km=1"))
        .await
        .unwrap();
    assert_eq!(body_json(res).await.as_array().unwrap().len(), 0);

    let res = app
        .clone()
        .oneshot(json_request("POST", &format!("/hazards/{id}/resolve"), json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(!body_json(res).await["resolved_at"].is_null());

    let res = app.oneshot(get_request("/hazards")).await.unwrap();
    assert_eq!(body_json(res).await.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn get_nonexistent_hazard_returns_404() {
    let app = setup();
    let fake_id = "00000000-0000-0000-0000-000000000000";
    let response = app
        .oneshot(get_request(&format!("/hazards/{fake_id}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn routines_require_user_header() {
    let app = setup();
    let response = app
        .oneshot(json_request("PUT", "/routines", routine_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn routine_owned_by_another_user_cannot_be_replaced() {
    let app = setup();

    let res = app
        .clone()
        .oneshot(user_request("PUT", "/routines", "alice", routine_body()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let routine = body_json(res).await;
    assert_eq!(routine["user_id"], "alice");
    let id = routine["id"].as_str().unwrap().to_string();

    let mut hijack = routine_body();
    hijack["id"] = json!(id);
    hijack["name"] = json!("mine now");
    let res = app
        .clone()
        .oneshot(user_request("PUT", "/routines", "mallory", hijack))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app
        .clone()
        .oneshot(user_request("GET", &format!("/routines/{id}"), "alice", json!(null)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["name"], "commute");

    let res = app
        .oneshot(user_request("GET", &format!("/routines/{id}"), "mallory", json!(null)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn clear_route_returns_direct_candidate() {
    let app = setup();
    let response = app
        .oneshot(json_request("POST", "/routes", route_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["summary"], "direct");
    assert_eq!(body["hazard_warning"], false);
    assert_eq!(body["stale"], false);
    assert_eq!(body["alternates_requested"], 0);
    assert_eq!(body["hazard_annotations"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn route_detours_around_reported_hazard() {
    let app = setup();

    let res = app
        .clone()
        .oneshot(json_request("POST", "/hazards", hazard_body(32.97, -117.02, 4)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = app
        .clone()
        .oneshot(json_request("POST", "/routes", route_body()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = body_json(res).await;
    assert_eq!(body["hazard_warning"], false);
    assert_eq!(body["alternates_requested"], 1);
    let annotations = body["hazard_annotations"].as_array().unwrap();
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0]["avoided"], true);

    let res = app.oneshot(get_request("/metrics")).await.unwrap();
    let metrics = body_string(res).await;
    assert!(metrics.contains("alternates_requested_total 1"));
}

#[tokio::test]
async fn route_outside_service_area_returns_400() {
    let app = setup();
    let mut body = route_body();
    body["destination"] = json!({ "lat": 40.71, "lng": -74.0 });

    let response = app
        .oneshot(json_request("POST", "/routes", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn simulation_returns_aggregate_stats() {
    let app = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/simulations",
            json!({
                "seed": 11,
                "fleet_size": 2,
                "trips_per_vehicle": 2,
                "date": "2026-10-19"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["requests"], 4);
    assert_eq!(body["synthetic_requests"], 4);
    assert_eq!(body["succeeded"], 4);
    assert_eq!(body["failed"], 0);
}

#[tokio::test]
async fn traffic_endpoints_report_street_levels() {
    let traffic = TrafficIndex::from_records(vec![
        TrafficRecord {
            street_name: "Poway Road".to_string(),
            total_count: 28_000.0,
            date_count: None,
        },
        TrafficRecord {
            street_name: "Espola Road".to_string(),
            total_count: 6_000.0,
            date_count: None,
        },
    ]);
    let app = router(shared_state(traffic));

    let res = app
        .clone()
        .oneshot(get_request("/traffic/level?street=POWAY%20RD"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["level"], "very_high");
    assert_eq!(body["multiplier"], 1.3);

    let res = app
        .clone()
        .oneshot(get_request("/traffic/stats"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["unique_streets"], 2);

    let res = setup().oneshot(get_request("/traffic/stats")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
