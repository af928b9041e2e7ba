//! # Historical / Spatial Query Routes
//!
//! Read-only projections over the signal store: latest position per sensor
//! (optionally bounded to a map viewport) and per-sensor tracks, either over
//! a trailing window or an explicit `[from, to]` interval for replay.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ApiError;
use super::server::AppState;
use crate::store::{LatestRow, TrackRow, ViewRect};

#[derive(Debug, Deserialize)]
pub struct LatestParams {
    #[serde(default = "default_latest_minutes")]
    pub minutes: i64,
}

#[derive(Debug, Deserialize)]
pub struct LatestInViewParams {
    #[serde(rename = "swLat")]
    pub sw_lat: f64,
    #[serde(rename = "swLng")]
    pub sw_lng: f64,
    #[serde(rename = "neLat")]
    pub ne_lat: f64,
    #[serde(rename = "neLng")]
    pub ne_lng: f64,
    #[serde(default = "default_latest_minutes")]
    pub minutes: i64,
}

#[derive(Debug, Deserialize)]
pub struct TracksParams {
    #[serde(default = "default_tracks_minutes")]
    pub minutes: i64,
    #[serde(default = "default_tracks_max_points")]
    pub max_points: i64,
}

#[derive(Debug, Deserialize)]
pub struct TracksWindowParams {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub sn: Option<String>,
    #[serde(default = "default_window_max_points")]
    pub max_points: i64,
}

fn default_latest_minutes() -> i64 {
    10
}

fn default_tracks_minutes() -> i64 {
    60
}

fn default_tracks_max_points() -> i64 {
    1000
}

fn default_window_max_points() -> i64 {
    20000
}

/// One position sample in a track response
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrackPoint {
    pub ts: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
}

/// All returned samples for one sensor, ascending in time
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Track {
    pub sn: String,
    pub points: Vec<TrackPoint>,
}

/// Create the query routes
pub fn query_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/latest", get(latest_handler))
        .route("/latest_in_view", get(latest_in_view_handler))
        .route("/tracks", get(tracks_handler))
        .route("/tracks_window", get(tracks_window_handler))
}

async fn latest_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LatestParams>,
) -> Result<Json<Vec<LatestRow>>, ApiError> {
    let rows = state.store.latest(params.minutes).await?;
    Ok(Json(rows))
}

async fn latest_in_view_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LatestInViewParams>,
) -> Result<Json<Vec<LatestRow>>, ApiError> {
    // Corner order is not trusted; normalize before querying.
    let rect = ViewRect::normalized(params.sw_lat, params.sw_lng, params.ne_lat, params.ne_lng);
    let rows = state.store.latest_in_view(rect, params.minutes).await?;
    Ok(Json(rows))
}

async fn tracks_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TracksParams>,
) -> Result<Json<Vec<Track>>, ApiError> {
    let rows = state.store.tracks(params.minutes, params.max_points).await?;
    Ok(Json(group_tracks(rows)))
}

async fn tracks_window_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TracksWindowParams>,
) -> Result<Json<Vec<Track>>, ApiError> {
    let from = parse_timestamp("from", &params.from)?;
    let to = parse_timestamp("to", &params.to)?;

    let rows = state
        .store
        .tracks_window(from, to, params.sn.as_deref(), params.max_points)
        .await?;
    Ok(Json(group_tracks(rows)))
}

fn parse_timestamp(name: &str, raw: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ApiError::Validation(format!("Invalid '{}' timestamp: {}", name, raw)))
}

/// Group rows (already ordered by `sn, ts`) into per-sensor tracks.
///
/// Rows for one sensor are contiguous, so a new track starts whenever the
/// serial changes.
fn group_tracks(rows: Vec<TrackRow>) -> Vec<Track> {
    let mut tracks: Vec<Track> = Vec::new();
    for row in rows {
        let point = TrackPoint {
            ts: row.ts,
            lat: row.lat,
            lon: row.lon,
        };
        match tracks.last_mut() {
            Some(track) if track.sn == row.sn => track.points.push(point),
            _ => tracks.push(Track {
                sn: row.sn,
                points: vec![point],
            }),
        }
    }
    tracks
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(sn: &str, secs: i64, lat: f64, lon: f64) -> TrackRow {
        TrackRow {
            sn: sn.to_string(),
            ts: Utc.timestamp_opt(secs, 0).unwrap(),
            lat,
            lon,
        }
    }

    #[test]
    fn test_group_tracks_splits_per_sensor() {
        let rows = vec![
            row("D1", 100, 51.0, -114.0),
            row("D1", 101, 51.1, -114.1),
            row("D2", 100, 52.0, -113.0),
        ];

        let tracks = group_tracks(rows);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].sn, "D1");
        assert_eq!(tracks[0].points.len(), 2);
        assert_eq!(tracks[1].sn, "D2");
        assert_eq!(tracks[1].points.len(), 1);
    }

    #[test]
    fn test_group_tracks_preserves_ascending_order() {
        let rows = vec![row("D1", 100, 51.0, -114.0), row("D1", 200, 51.5, -114.5)];
        let tracks = group_tracks(rows);
        assert!(tracks[0].points[0].ts < tracks[0].points[1].ts);
    }

    #[test]
    fn test_group_tracks_empty() {
        assert!(group_tracks(Vec::new()).is_empty());
    }

    #[test]
    fn test_parse_timestamp_accepts_rfc3339() {
        let dt = parse_timestamp("from", "2026-08-23T10:00:00Z").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2026, 8, 23, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        let result = parse_timestamp("to", "yesterday");
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_view_params_use_map_corner_names() {
        let params: LatestInViewParams = serde_json::from_str(
            r#"{"swLat": 50.0, "swLng": -115.0, "neLat": 52.0, "neLng": -113.0}"#,
        )
        .unwrap();
        assert_eq!(params.sw_lat, 50.0);
        assert_eq!(params.minutes, 10);
    }
}
