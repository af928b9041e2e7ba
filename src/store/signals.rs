//! # Signal Store
//!
//! Inserts and read projections for the `drone_signals` table.
//!
//! Batch inserts are transactional (all-or-nothing). After a successful
//! commit a `pg_notify` carrying the reduced projection of the *last* row is
//! issued on the `signals` channel so the LISTEN path can also push; this
//! publish is fire-and-forget and its failure never unwinds into the
//! caller's error path. Bulk producers therefore forfeit per-row delivery on
//! the notify channel; the direct broadcast in the ingest handler covers
//! every row.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};

use super::errors::StoreResult;
use crate::signal::{BroadcastMessage, Signal};

/// Notification channel fed by the post-commit hook
pub const NOTIFY_CHANNEL: &str = "signals";

const MAX_CONNECTIONS: u32 = 8;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Latest-position row per sensor
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LatestRow {
    pub sn: String,
    pub ts: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub height_m: Option<f64>,
    pub speed_h_mps: Option<f64>,
    pub direction_deg: Option<i32>,
}

/// One position sample on a track
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TrackRow {
    pub sn: String,
    pub ts: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
}

/// A lat/lon rectangle with normalized bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewRect {
    pub lo_lat: f64,
    pub hi_lat: f64,
    pub lo_lng: f64,
    pub hi_lng: f64,
}

impl ViewRect {
    /// Build from two corners supplied in either order
    pub fn normalized(sw_lat: f64, sw_lng: f64, ne_lat: f64, ne_lng: f64) -> Self {
        Self {
            lo_lat: sw_lat.min(ne_lat),
            hi_lat: sw_lat.max(ne_lat),
            lo_lng: sw_lng.min(ne_lng),
            hi_lng: sw_lng.max(ne_lng),
        }
    }
}

/// Postgres-backed store for drone signals
#[derive(Debug, Clone)]
pub struct SignalStore {
    pool: PgPool,
}

impl SignalStore {
    /// Connect eagerly, verifying the database is reachable
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Build a pool without touching the database.
    ///
    /// Connections are established on first use; useful for tests that only
    /// exercise handlers which never reach the store.
    pub fn connect_lazy(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    /// Insert a batch of signals in one transaction.
    ///
    /// Partial success is not an outcome: any row failure rolls back the
    /// whole batch and surfaces as a `StoreError`.
    pub async fn insert_batch(&self, rows: &[Signal]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        for row in rows {
            sqlx::query(
                r#"INSERT INTO drone_signals
                   (ts, sn, uasid, drone_type, direction_deg, speed_h_mps, speed_v_mps,
                    lat, lon, height_m, operator_lat, operator_lon)
                   VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"#,
            )
            .bind(row.ts)
            .bind(&row.sn)
            .bind(&row.uasid)
            .bind(&row.drone_type)
            .bind(row.direction_deg)
            .bind(row.speed_h_mps)
            .bind(row.speed_v_mps)
            .bind(row.lat)
            .bind(row.lon)
            .bind(row.height_m)
            .bind(row.operator_lat)
            .bind(row.operator_lon)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        // Post-commit hook: wake the LISTEN path with the tail row. A crash
        // or error between commit and publish loses this event; the direct
        // broadcast path covers it.
        if let Some(last) = rows.last() {
            self.notify_inserted(last).await;
        }

        Ok(())
    }

    async fn notify_inserted(&self, row: &Signal) {
        let message = BroadcastMessage::from(row);
        let payload = match serde_json::to_string(&message) {
            Ok(json) => json,
            Err(_) => return,
        };

        if let Err(e) = sqlx::query("SELECT pg_notify($1, $2)")
            .bind(NOTIFY_CHANNEL)
            .bind(payload)
            .execute(&self.pool)
            .await
        {
            tracing::debug!(error = %e, "pg_notify after insert failed");
        }
    }

    /// Most recent row per sensor within the trailing window, position-fix
    /// rows only.
    pub async fn latest(&self, minutes: i64) -> StoreResult<Vec<LatestRow>> {
        let rows = sqlx::query_as::<_, LatestRow>(
            r#"SELECT DISTINCT ON (sn)
                 sn, ts, lat, lon, height_m, speed_h_mps, direction_deg
               FROM drone_signals
               WHERE ts > now() - make_interval(mins => $1::int)
                 AND lat IS NOT NULL AND lon IS NOT NULL
               ORDER BY sn, ts DESC"#,
        )
        .bind(minutes)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Same as [`latest`](Self::latest), bounded to a lat/lon rectangle
    pub async fn latest_in_view(&self, rect: ViewRect, minutes: i64) -> StoreResult<Vec<LatestRow>> {
        let rows = sqlx::query_as::<_, LatestRow>(
            r#"WITH latest AS (
                 SELECT DISTINCT ON (sn)
                   sn, ts, lat, lon, height_m, speed_h_mps, direction_deg
                 FROM drone_signals
                 WHERE ts > now() - make_interval(mins => $1::int)
                   AND lat IS NOT NULL AND lon IS NOT NULL
                 ORDER BY sn, ts DESC
               )
               SELECT * FROM latest
               WHERE lat BETWEEN $2 AND $3
                 AND lon BETWEEN $4 AND $5"#,
        )
        .bind(minutes)
        .bind(rect.lo_lat)
        .bind(rect.hi_lat)
        .bind(rect.lo_lng)
        .bind(rect.hi_lng)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Position samples within the trailing window, ascending per sensor.
    ///
    /// `max_points` caps the total row count, not the per-sensor count.
    pub async fn tracks(&self, minutes: i64, max_points: i64) -> StoreResult<Vec<TrackRow>> {
        let rows = sqlx::query_as::<_, TrackRow>(
            r#"SELECT sn, ts, lat, lon
               FROM drone_signals
               WHERE ts > now() - make_interval(mins => $1::int)
                 AND lat IS NOT NULL AND lon IS NOT NULL
               ORDER BY sn, ts ASC
               LIMIT $2"#,
        )
        .bind(minutes)
        .bind(max_points)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Position samples between two timestamps, optionally for one sensor
    pub async fn tracks_window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        sn: Option<&str>,
        max_points: i64,
    ) -> StoreResult<Vec<TrackRow>> {
        let rows = if let Some(sn) = sn {
            sqlx::query_as::<_, TrackRow>(
                r#"SELECT sn, ts, lat, lon
                   FROM drone_signals
                   WHERE ts BETWEEN $1 AND $2
                     AND lat IS NOT NULL AND lon IS NOT NULL
                     AND sn = $3
                   ORDER BY sn, ts ASC
                   LIMIT $4"#,
            )
            .bind(from)
            .bind(to)
            .bind(sn)
            .bind(max_points)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, TrackRow>(
                r#"SELECT sn, ts, lat, lon
                   FROM drone_signals
                   WHERE ts BETWEEN $1 AND $2
                     AND lat IS NOT NULL AND lon IS NOT NULL
                   ORDER BY sn, ts ASC
                   LIMIT $3"#,
            )
            .bind(from)
            .bind(to)
            .bind(max_points)
            .fetch_all(&self.pool)
            .await?
        };
        Ok(rows)
    }

    /// Distinct UAS identifiers seen since the start of the current day
    pub async fn today_unique_uasids(&self) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(DISTINCT uasid)
               FROM drone_signals
               WHERE uasid IS NOT NULL
                 AND ts >= date_trunc('day', now())"#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Distinct sensors that reported within the trailing window
    pub async fn online_drones(&self, minutes: i64) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(DISTINCT sn)
               FROM drone_signals
               WHERE ts > now() - make_interval(mins => $1::int)"#,
        )
        .bind(minutes)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
