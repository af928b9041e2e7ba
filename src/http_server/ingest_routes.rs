//! # Ingestion Route
//!
//! The primary delivery path: validate, write the whole batch durably, then
//! broadcast a reduced projection of every accepted row to the realtime
//! subscribers. The write precedes any broadcast; a store failure aborts the
//! request with nothing delivered.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::errors::ApiError;
use super::server::AppState;
use crate::config::ServiceConfig;
use crate::signal::{BroadcastMessage, Signal};

/// Header carrying the pre-shared ingestion credential
pub const API_KEY_HEADER: &str = "x-api-key";

/// Ingest body: one signal object or an array of them
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IngestPayload {
    One(Box<Signal>),
    Many(Vec<Signal>),
}

impl IngestPayload {
    /// Normalize a single object into a one-element list
    pub fn into_rows(self) -> Vec<Signal> {
        match self {
            IngestPayload::One(signal) => vec![*signal],
            IngestPayload::Many(signals) => signals,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub inserted: usize,
}

/// Create the ingestion route
pub fn ingest_routes() -> Router<Arc<AppState>> {
    Router::new().route("/ingest", post(ingest_handler))
}

async fn ingest_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<IngestPayload>,
) -> Result<Json<IngestResponse>, ApiError> {
    require_api_key(&state.config, &headers)?;

    let rows = payload.into_rows();
    if rows.is_empty() {
        return Err(ApiError::Validation("Empty payload.".to_string()));
    }

    // Durable write first; broadcast only after the whole batch commits.
    state.store.insert_batch(&rows).await?;

    // Direct path: every row goes out, not just the batch tail the store's
    // notify channel carries.
    for row in &rows {
        let message = BroadcastMessage::from(row);
        if let Ok(json) = serde_json::to_string(&message) {
            state.registry.broadcast(&json).await;
        }
    }

    Ok(Json(IngestResponse {
        inserted: rows.len(),
    }))
}

/// Compare the presented credential against configuration.
///
/// An unset or empty configured key rejects every request.
pub(crate) fn require_api_key(config: &ServiceConfig, headers: &HeaderMap) -> Result<(), ApiError> {
    let presented = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    match config.api_key.as_deref() {
        Some(expected) if !expected.is_empty() && presented == expected => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}
