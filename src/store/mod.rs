//! # Durable Store Adapter
//!
//! Postgres access for the signal pipeline: batch inserts with a best-effort
//! post-commit notification, plus the read projections served by the query
//! endpoints. The store is treated as an external collaborator reached
//! through a `sqlx::PgPool`.

pub mod errors;
pub mod signals;

pub use errors::{StoreError, StoreResult};
pub use signals::{LatestRow, SignalStore, TrackRow, ViewRect, NOTIFY_CHANNEL};
