//! Health check endpoints
//!
//! - /health, /healthz - liveness probe (is the service running?)
//! - /ready, /readyz - readiness probe (can the content store be reached?)
//! - /version - build information
//!
//! Liveness returns 200 whenever the service is running. Readiness probes
//! the content store health endpoint, since every unroll depends on it.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::server::AppState;

/// Health response body
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall health status (true if the service is running)
    pub healthy: bool,
    /// Service name
    pub service: &'static str,
    /// Service version
    pub version: &'static str,
    /// Current timestamp
    pub timestamp: String,
    /// Content store dependency status
    #[serde(rename = "contentStore")]
    pub content_store: ContentStoreHealth,
}

/// Content store dependency details
#[derive(Serialize)]
pub struct ContentStoreHealth {
    /// Configured application name of the content store
    pub name: String,
    /// Whether the store answered its health endpoint. Liveness responses
    /// do not probe and report `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthy: Option<bool>,
    /// Error message when the probe failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn build_health_response(state: &AppState, store_health: Option<Result<(), String>>) -> HealthResponse {
    let (healthy, error) = match store_health {
        None => (None, None),
        Some(Ok(())) => (Some(true), None),
        Some(Err(err)) => (Some(false), Some(err)),
    };

    HealthResponse {
        healthy: true,
        service: "content-unroller",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        content_store: ContentStoreHealth {
            name: state.args.content_store_app_name.clone(),
            healthy,
            error,
        },
    }
}

fn json_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Handle liveness probe (/health, /healthz)
///
/// Returns 200 OK whenever the service is running; the content store is
/// not probed here.
pub fn health_check(state: &Arc<AppState>) -> Response<Full<Bytes>> {
    let response = build_health_response(state, None);
    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"healthy":true,"error":"Serialization failed"}"#.to_string());
    json_response(StatusCode::OK, body)
}

/// Handle readiness probe (/ready, /readyz)
///
/// Returns 200 OK only when the content store answers its health endpoint,
/// 503 otherwise. Use this for load balancer checks.
pub async fn readiness_check(state: &Arc<AppState>) -> Response<Full<Bytes>> {
    let probe = state
        .reader
        .check_health()
        .await
        .map_err(|err| err.to_string());
    let is_ready = probe.is_ok();

    let response = build_health_response(state, Some(probe));
    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"healthy":false,"error":"Serialization failed"}"#.to_string());

    let status = if is_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    json_response(status, body)
}

/// Version information for deployment verification
#[derive(Serialize)]
pub struct VersionResponse {
    /// Cargo package version
    pub version: &'static str,
    /// Service name
    pub service: &'static str,
}

/// Handle version endpoint (/version)
pub fn version_info() -> Response<Full<Bytes>> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        service: "content-unroller",
    };

    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"version":"unknown"}"#.to_string());
    json_response(StatusCode::OK, body)
}
