//! # Status Routes
//!
//! Health check, node heartbeats, and the dashboard stats endpoint.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ApiError;
use super::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatParams {
    #[serde(default)]
    pub node_id: String,
}

#[derive(Debug, Serialize)]
pub struct HeartbeatResponse {
    pub ok: bool,
    pub node_id: String,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct DataParams {
    #[serde(default = "default_online_window")]
    pub minutes_online_window: i64,
}

fn default_online_window() -> i64 {
    2
}

#[derive(Debug, Serialize)]
pub struct DataResponse {
    pub uptime_seconds: i64,
    pub today_unique_uasids: i64,
    pub online_drones: i64,
    pub nodes_active: usize,
    pub nodes_total: u32,
    pub as_of: DateTime<Utc>,
}

/// Create the status routes
pub fn status_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/node_heartbeat", post(node_heartbeat_handler))
        .route("/data", get(data_handler))
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn node_heartbeat_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HeartbeatParams>,
) -> Result<Json<HeartbeatResponse>, ApiError> {
    let last_seen = state.liveness.heartbeat(&params.node_id)?;
    Ok(Json(HeartbeatResponse {
        ok: true,
        node_id: params.node_id,
        last_seen,
    }))
}

async fn data_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DataParams>,
) -> Result<Json<DataResponse>, ApiError> {
    let now = Utc::now();

    let today_unique_uasids = state.store.today_unique_uasids().await?;
    let online_drones = state.store.online_drones(params.minutes_online_window).await?;
    let nodes_active = state
        .liveness
        .active_count(state.config.node_online_window_sec, now);

    Ok(Json(DataResponse {
        uptime_seconds: state.liveness.uptime_seconds(now),
        today_unique_uasids,
        online_drones,
        nodes_active,
        nodes_total: state.config.nodes_total,
        as_of: now,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "ok".to_string(),
            version: "0.1.0".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
    }

    #[test]
    fn test_heartbeat_params_default_to_empty() {
        let params: HeartbeatParams = serde_json::from_str("{}").unwrap();
        assert!(params.node_id.is_empty());
    }

    #[test]
    fn test_data_params_default_window() {
        let params: DataParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.minutes_online_window, 2);
    }
}
