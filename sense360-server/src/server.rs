//! Axum router setup.

use crate::config::ServerConfig;
use crate::handlers::{access_logs, devices};
use crate::state::AppState;
use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::Utc;
use sense360_core::api::HealthResponse;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let api = Router::new()
        .route("/api/devices", get(devices::list_devices))
        .route("/api/devices/register", post(devices::register_device))
        .route("/api/devices/identify", post(devices::identify_device))
        .route(
            "/api/devices/{device_id}",
            get(devices::get_device).delete(devices::deactivate_device),
        )
        .route("/api/devices/{device_id}/ping", patch(devices::ping_device))
        .route("/api/access-logs", get(access_logs::list_access_logs))
        .route("/api/health", get(health));

    Router::new()
        .merge(api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        // Enforced by the body extractors, so oversized payloads surface as
        // rejections the handlers report and log like any other bad body.
        .layer(DefaultBodyLimit::max(config.max_payload_size))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        devices: state.registry.len(),
        active_devices: state.registry.active_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use sense360_core::{AccessLog, AccessType, DeviceRegistry};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const MAC: &str = "AA:BB:CC:DD:EE:01";

    fn test_state() -> AppState {
        AppState::new(DeviceRegistry::new(), AccessLog::new(), 100)
    }

    fn app(state: &AppState) -> Router {
        build_router(state.clone(), &ServerConfig::default())
    }

    async fn call(state: &AppState, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = app(state)
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register(state: &AppState, body: Value) -> (StatusCode, Value) {
        call(state, Method::POST, "/api/devices/register", Some(body)).await
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let state = test_state();
        let (status, body) = call(&state, Method::GET, "/api/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["devices"], 0);
    }

    #[tokio::test]
    async fn test_register_then_reregister_keeps_device_id() {
        let state = test_state();

        let (status, first) = register(&state, json!({"macAddress": MAC, "chipType": "ESP32-S3"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["success"], true);
        assert_eq!(first["device"]["isActive"], true);
        assert_eq!(first["device"]["chipType"], "ESP32-S3");
        let device_id = first["device"]["deviceId"].as_str().unwrap().to_string();
        assert!(!device_id.is_empty());

        let (status, second) = register(
            &state,
            json!({"macAddress": MAC, "chipType": "ESP32-S3", "flashSize": "16MB"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["device"]["deviceId"], device_id.as_str());
        assert_eq!(second["device"]["flashSize"], "16MB");
    }

    #[tokio::test]
    async fn test_register_missing_chip_type_is_bad_request() {
        let state = test_state();
        let (status, body) = register(&state, json!({"macAddress": MAC})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Invalid device data");
        assert!(body["details"].as_str().unwrap().contains("chip_type"));
        assert!(state.registry.is_empty());
    }

    #[tokio::test]
    async fn test_register_malformed_json_is_bad_request() {
        let state = test_state();
        let response = app(&state)
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/devices/register")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let entries = state.access_log.entries(None);
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].success);
        assert_eq!(entries[0].identifier, "unregistered");
    }

    #[tokio::test]
    async fn test_get_device_never_exposes_mac() {
        let state = test_state();
        let (_, registered) = register(&state, json!({"macAddress": MAC, "chipType": "ESP32"})).await;
        let device_id = registered["device"]["deviceId"].as_str().unwrap();

        let (status, body) = call(&state, Method::GET, &format!("/api/devices/{}", device_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["device"]["deviceId"], device_id);
        assert!(body["device"].get("macAddress").is_none());
        assert!(!body.to_string().contains(MAC));
    }

    #[tokio::test]
    async fn test_get_unknown_device_is_not_found() {
        let state = test_state();
        let (status, body) = call(&state, Method::GET, "/api/devices/nope", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Device not found");
        assert!(state.registry.is_empty());
    }

    #[tokio::test]
    async fn test_get_device_refreshes_last_seen() {
        let state = test_state();
        let (_, registered) = register(&state, json!({"macAddress": MAC, "chipType": "ESP32"})).await;
        let device_id = registered["device"]["deviceId"].as_str().unwrap().to_string();
        let before = state.registry.get_device_by_mac(MAC).unwrap().last_seen();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        call(&state, Method::GET, &format!("/api/devices/{}", device_id), None).await;

        assert!(state.registry.get_device_by_mac(MAC).unwrap().last_seen() > before);
    }

    #[tokio::test]
    async fn test_list_excludes_deactivated_devices() {
        let state = test_state();
        let (_, a) = register(&state, json!({"macAddress": "00:00:00:00:00:01", "chipType": "ESP32"})).await;
        register(&state, json!({"macAddress": "00:00:00:00:00:02", "chipType": "ESP32-C3"})).await;
        let a_id = a["device"]["deviceId"].as_str().unwrap().to_string();

        let (status, _) = call(&state, Method::DELETE, &format!("/api/devices/{}", a_id), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&state, Method::GET, "/api/devices", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["devices"][0]["chipType"], "ESP32-C3");
        assert!(!body.to_string().contains("00:00:00:00:00:02"));

        // Re-registration brings it back with the same id.
        let (_, again) = register(&state, json!({"macAddress": "00:00:00:00:00:01", "chipType": "ESP32"})).await;
        assert_eq!(again["device"]["deviceId"], a_id.as_str());
        let (_, body) = call(&state, Method::GET, "/api/devices", None).await;
        assert_eq!(body["count"], 2);
    }

    #[tokio::test]
    async fn test_list_sorted_and_bad_sort() {
        let state = test_state();
        register(&state, json!({"macAddress": "00:00:00:00:00:01", "chipType": "ESP32-S3"})).await;
        register(&state, json!({"macAddress": "00:00:00:00:00:02", "chipType": "ESP32-C3"})).await;

        let (_, body) = call(&state, Method::GET, "/api/devices?sort=chip_type", None).await;
        assert_eq!(body["devices"][0]["chipType"], "ESP32-C3");

        let (status, _) = call(&state, Method::GET, "/api/devices?sort=bogus", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ping_and_deactivate_unknown_are_not_found() {
        let state = test_state();
        let (status, _) = call(&state, Method::PATCH, "/api/devices/unknown-id/ping", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(&state, Method::DELETE, "/api/devices/unknown-id", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert!(state.registry.is_empty());
    }

    #[tokio::test]
    async fn test_ping_known_device() {
        let state = test_state();
        let (_, registered) = register(&state, json!({"macAddress": MAC, "chipType": "ESP32"})).await;
        let device_id = registered["device"]["deviceId"].as_str().unwrap();

        let (status, body) = call(&state, Method::PATCH, &format!("/api/devices/{}/ping", device_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Device activity updated");
    }

    #[tokio::test]
    async fn test_deactivate_twice_succeeds() {
        let state = test_state();
        let (_, registered) = register(&state, json!({"macAddress": MAC, "chipType": "ESP32"})).await;
        let uri = format!("/api/devices/{}", registered["device"]["deviceId"].as_str().unwrap());

        let (first, _) = call(&state, Method::DELETE, &uri, None).await;
        let (second, _) = call(&state, Method::DELETE, &uri, None).await;
        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_identify_registered_and_unknown() {
        let state = test_state();
        register(&state, json!({"macAddress": MAC, "chipType": "ESP32-S3", "flashSize": "8MB"})).await;

        let (status, body) = call(&state, Method::POST, "/api/devices/identify", Some(json!({"macAddress": MAC}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["identification"]["isRegistered"], true);
        assert_eq!(body["identification"]["chipFamily"], "ESP32-S3");
        assert_eq!(body["identification"]["flashSize"], "8MB");

        let (status, body) = call(
            &state,
            Method::POST,
            "/api/devices/identify",
            Some(json!({"macAddress": "11:22:33:44:55:66"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["identification"]["isRegistered"], false);
        assert_eq!(state.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_access_logs_newest_first_without_macs() {
        let state = test_state();
        let (_, registered) = register(&state, json!({"macAddress": MAC, "chipType": "ESP32"})).await;
        let device_id = registered["device"]["deviceId"].as_str().unwrap().to_string();
        call(&state, Method::PATCH, &format!("/api/devices/{}/ping", device_id), None).await;
        call(&state, Method::POST, "/api/devices/identify", Some(json!({"macAddress": MAC}))).await;

        let (status, body) = call(&state, Method::GET, "/api/access-logs", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 3);
        assert_eq!(body["logs"][0]["accessType"], "identify");
        assert_eq!(body["logs"][2]["accessType"], "register");
        assert!(!body.to_string().contains(MAC));

        let (_, body) = call(
            &state,
            Method::GET,
            &format!("/api/access-logs?identifier={}&limit=1", device_id),
            None,
        )
        .await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["logs"][0]["identifier"], device_id.as_str());

        let pings: Vec<_> = state
            .access_log
            .entries(None)
            .into_iter()
            .filter(|e| e.access_type == AccessType::Ping)
            .collect();
        assert_eq!(pings.len(), 1);
    }

    fn oversized_request(uri: &str, body: &Value) -> Request<Body> {
        let body = body.to_string();
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .header("content-length", body.len())
            .body(Body::from(body))
            .unwrap()
    }

    async fn into_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_oversized_register_body_is_reported_and_logged() {
        let state = test_state();
        let config = ServerConfig {
            max_payload_size: 64,
            ..ServerConfig::default()
        };
        let big = json!({"macAddress": MAC, "chipType": "x".repeat(256)});

        let response = build_router(state.clone(), &config)
            .oneshot(oversized_request("/api/devices/register", &big))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = into_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Invalid device data");
        assert!(state.registry.is_empty());

        let entries = state.access_log.entries(None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].access_type, AccessType::Register);
        assert_eq!(entries[0].identifier, "unregistered");
        assert!(!entries[0].success);
    }

    #[tokio::test]
    async fn test_oversized_identify_body_uses_error_body() {
        let state = test_state();
        let config = ServerConfig {
            max_payload_size: 32,
            ..ServerConfig::default()
        };
        let big = json!({"macAddress": "A".repeat(128)});

        let response = build_router(state.clone(), &config)
            .oneshot(oversized_request("/api/devices/identify", &big))
            .await
            .unwrap();

        assert!(response.status().is_client_error());
        let body = into_json(response).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_body_within_limit_is_accepted() {
        let state = test_state();
        let body = json!({"macAddress": MAC, "chipType": "ESP32"});
        let config = ServerConfig {
            max_payload_size: body.to_string().len(),
            ..ServerConfig::default()
        };

        let response = build_router(state.clone(), &config)
            .oneshot(oversized_request("/api/devices/register", &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.registry.len(), 1);
    }
}
