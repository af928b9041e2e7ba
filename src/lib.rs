//! skytrack - real-time drone signal ingestion and fan-out
//!
//! One process hosts the HTTP/WebSocket API, the Postgres-backed signal
//! store, and a supervised LISTEN loop that re-derives fan-out events from
//! the store's notification channel.

pub mod config;
pub mod cot;
pub mod http_server;
pub mod liveness;
pub mod realtime;
pub mod signal;
pub mod store;
